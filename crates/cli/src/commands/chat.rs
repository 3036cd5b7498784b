//! `chatrelay chat`: Terminal chat, single-message or interactive.
//!
//! Responses are streamed to stdout as they arrive. Interactive sessions
//! always use a conversation id so earlier turns are remembered.

use std::io::Write;

use chatrelay_chat::{ChatDispatcher, ChatStream};
use chatrelay_config::AppConfig;
use chatrelay_core::message::ConversationId;
use futures::StreamExt;
use tokio::io::{AsyncBufReadExt, BufReader};

pub async fn run(
    message: Option<String>,
    conversation_id: Option<String>,
    rag: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    if !config.has_api_key() && config.default_provider != "ollama" {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    CHATRELAY_API_KEY=sk-...   (generic)");
        eprintln!("    OPENAI_API_KEY=sk-...      (OpenAI)");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    }

    let dispatcher = chatrelay_gateway::build_dispatcher(&config)?;

    if let Some(message) = message {
        let id = conversation_id.as_deref().map(ConversationId::from);
        let stream = open(&dispatcher, &message, id.as_ref(), rag).await?;
        print_stream(stream).await?;
        return Ok(());
    }

    let id = conversation_id
        .as_deref()
        .map(ConversationId::from)
        .unwrap_or_default();

    println!();
    println!("  ChatRelay: Interactive Mode");
    println!();
    println!("  Provider:      {}", config.default_provider);
    println!("  Model:         {}", dispatcher.settings().model);
    println!("  Conversation:  {id}");
    if rag {
        println!("  Retrieval:     on (top {})", dispatcher.settings().top_k);
    }
    println!();
    println!("  Type your message and press Enter.");
    println!("  Type 'exit' or Ctrl+C to quit.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "exit" || line == "quit" {
            break;
        }

        print!("  Assistant > ");
        std::io::stdout().flush()?;
        match open(&dispatcher, line, Some(&id), rag).await {
            Ok(stream) => {
                if let Err(e) = print_stream(stream).await {
                    eprintln!("\n  [Error] {e}");
                }
            }
            Err(e) => eprintln!("\n  [Error] {e}"),
        }
        println!();
    }

    println!();
    println!("  Goodbye!");
    println!();
    Ok(())
}

/// Retrieval chats are single-shot; the conversation id only applies
/// without `--rag`.
async fn open(
    dispatcher: &ChatDispatcher,
    input: &str,
    conversation_id: Option<&ConversationId>,
    rag: bool,
) -> Result<ChatStream, chatrelay_core::Error> {
    if rag {
        dispatcher.rag_stream_chat(input).await
    } else {
        dispatcher.stream_chat(input, conversation_id).await
    }
}

async fn print_stream(mut stream: ChatStream) -> Result<(), Box<dyn std::error::Error>> {
    let mut stdout = std::io::stdout();
    while let Some(fragment) = stream.next().await {
        stdout.write_all(fragment?.as_bytes())?;
        stdout.flush()?;
    }
    writeln!(stdout)?;
    Ok(())
}
