//! Embeds a few sentences with the configured service and compares them.
//!
//! Run with `GEMINI_API_KEY=... cargo run -p docrag-embed --example simple_embedding`
//! or set `OPENAI_API_KEY` to use OpenAI instead.

use docrag_embed::{BatchEmbedder, EmbedConfig, create_provider};
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let config = match (std::env::var("GEMINI_API_KEY"), std::env::var("OPENAI_API_KEY")) {
        (Ok(key), _) => EmbedConfig::gemini(key),
        (_, Ok(key)) => EmbedConfig::openai(key),
        _ => return Err("set GEMINI_API_KEY or OPENAI_API_KEY".into()),
    }
    .with_batch_delay(Duration::from_millis(500))
    .with_normalize(true);

    println!("Provider: {} ({})", config.provider, config.model);
    println!("Batch size: {}", config.batch_size);

    let provider = create_provider(&config)?;
    let embedder = BatchEmbedder::from_config(provider, &config);

    let texts = vec![
        "Rust is a systems programming language.".to_string(),
        "Cargo is the Rust package manager.".to_string(),
        "Bread rises because of yeast.".to_string(),
    ];
    let outcome = embedder.embed_batch(&texts).await;
    if let Some(e) = &outcome.failure {
        println!("Stopped early: {e}");
    }
    println!(
        "Embedded {}/{} texts, dimension {}",
        outcome.result.len(),
        texts.len(),
        outcome.result.dimension
    );

    let query = embedder.embed_query("What language is Cargo for?").await?;
    for (text, embedding) in texts.iter().zip(&outcome.result.embeddings) {
        let score: f32 = query.iter().zip(embedding).map(|(a, b)| a * b).sum();
        println!("  {score:.4}  {text}");
    }

    Ok(())
}
