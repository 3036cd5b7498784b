//! `chatrelay ingest`: Split text files and add them to the vector store.

use std::path::PathBuf;

use chatrelay_config::AppConfig;
use chatrelay_core::vector_store::{Document, VectorStore};
use chatrelay_memory::{SimpleVectorStore, TextSplitter};
use tracing::info;

pub async fn run(files: Vec<PathBuf>) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    let router = chatrelay_providers::router::build_from_config(&config)?;
    let provider = router.default().ok_or("No default provider configured")?;

    let store_path = config.vector_store_path();
    let store = SimpleVectorStore::load(provider, &config.rag.embedding_model, &store_path)?;
    let splitter = TextSplitter::new(config.rag.chunk_tokens);

    let documents = load_documents(&files, &splitter)?;
    if documents.is_empty() {
        println!("Nothing to ingest: the files contain no text.");
        return Ok(());
    }

    let count = documents.len();
    store.add(documents).await?;
    store.save().await?;

    println!("Ingested {count} chunks from {} file(s) into {}", files.len(), store_path.display());
    Ok(())
}

/// Read and split every file, tagging chunks with their source and position.
fn load_documents(
    files: &[PathBuf],
    splitter: &TextSplitter,
) -> Result<Vec<Document>, Box<dyn std::error::Error>> {
    let mut documents = Vec::new();
    for path in files {
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read {}: {e}", path.display()))?;
        let chunks = splitter.split(&text);
        info!(file = %path.display(), chunks = chunks.len(), "File split");

        documents.extend(chunks.into_iter().enumerate().map(|(index, chunk)| {
            Document::new(chunk)
                .with_metadata("source", path.display().to_string())
                .with_metadata("chunk", index)
        }));
    }
    Ok(documents)
}
