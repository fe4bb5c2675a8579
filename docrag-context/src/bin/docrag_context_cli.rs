use clap::Parser;
use docrag_context::text::{
    DEFAULT_CHUNK_OVERLAP, DEFAULT_CHUNK_SIZE, SplitterConfig, TextSplitter,
};
use std::fs;
use std::io::{self, Read};
use std::process;

/// A CLI tool to preview how docrag splits a text file into chunks.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the input text file. If not provided, reads from stdin.
    #[arg(short, long)]
    input: Option<String>,

    /// Maximum number of characters per chunk.
    #[arg(short, long, default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    /// Number of characters shared by consecutive chunks.
    #[arg(short, long, default_value_t = DEFAULT_CHUNK_OVERLAP)]
    overlap: usize,

    /// Print the chunks as JSON instead of a summary.
    #[arg(long)]
    json: bool,
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let file_content = if let Some(input_path) = args.input {
        fs::read_to_string(input_path)?
    } else {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        buffer
    };

    let config = SplitterConfig::new(args.chunk_size, args.overlap)?;
    let splitter = TextSplitter::new(config)?;
    let chunks: Vec<_> = splitter.split(&file_content).collect();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&chunks)?);
        return Ok(());
    }

    println!(
        "{} chunks ({})",
        chunks.len(),
        splitter.strategy_label()
    );
    for chunk in &chunks {
        let preview: String = chunk.text.chars().take(60).collect();
        println!(
            "  #{} chars {}..{} ({}): {}",
            chunk.sequence,
            chunk.start,
            chunk.end,
            chunk.char_len(),
            preview.replace('\n', " ")
        );
    }

    Ok(())
}
