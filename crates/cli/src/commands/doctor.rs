//! `chatrelay doctor`: Diagnose configuration and connectivity.

use chatrelay_config::AppConfig;
use chatrelay_core::vector_store::VectorStore;
use chatrelay_memory::SimpleVectorStore;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("ChatRelay Doctor: System Diagnostics");
    println!("=====================================\n");

    let mut issues = 0;

    let config_path = AppConfig::config_dir().join("config.toml");
    if !config_path.exists() {
        println!("  [warn] No config file; defaults and environment in use (run `chatrelay onboard`)");
        issues += 1;
    }

    let config = match AppConfig::load() {
        Ok(config) => {
            println!("  [ok]   Configuration valid");
            config
        }
        Err(e) => {
            println!("  [fail] Configuration invalid: {e}");
            println!("\n  1 blocking issue found.");
            return Ok(());
        }
    };

    if config.has_api_key() {
        println!("  [ok]   API key configured");
    } else {
        println!("  [warn] No API key; set CHATRELAY_API_KEY or OPENAI_API_KEY");
        issues += 1;
    }

    let provider = match chatrelay_providers::router::build_from_config(&config)
        .ok()
        .and_then(|router| router.default())
    {
        Some(provider) => provider,
        None => {
            println!("  [fail] Provider '{}' could not be built", config.default_provider);
            println!("\n  {} issue(s) found.", issues + 1);
            return Ok(());
        }
    };

    match provider.health_check().await {
        Ok(true) => println!("  [ok]   Provider '{}' reachable", provider.name()),
        Ok(false) => {
            println!("  [warn] Provider '{}' responded but reported unhealthy", provider.name());
            issues += 1;
        }
        Err(e) => {
            println!("  [fail] Provider '{}' unreachable: {e}", provider.name());
            issues += 1;
        }
    }

    let store_path = config.vector_store_path();
    match SimpleVectorStore::load(provider, &config.rag.embedding_model, &store_path) {
        Ok(store) => {
            let count = store.count().await?;
            if count == 0 {
                println!(
                    "  [warn] Vector store is empty ({}); RAG answers will have no context",
                    store_path.display()
                );
                issues += 1;
            } else {
                println!("  [ok]   Vector store: {count} documents ({})", store_path.display());
            }
        }
        Err(e) => {
            println!("  [fail] Vector store unreadable: {e}");
            issues += 1;
        }
    }

    println!();
    if issues == 0 {
        println!("  All checks passed!");
    } else {
        println!("  {issues} issue(s) found. See above for details.");
    }

    Ok(())
}
