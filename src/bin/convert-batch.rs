//! Batch Feature Converter CLI
//!
//! Turns a raw traffic-capture CSV into the 20-column CSV accepted by
//! `POST /predict`.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use traffic_classifier::converter::{convert_file, default_output_path, write_rows};
use traffic_classifier::schema::FEATURE_LAYOUT;

#[derive(Parser, Debug)]
#[command(name = "convert-batch")]
#[command(about = "Convert raw capture CSV rows into classifier feature rows")]
struct Args {
    /// Raw capture CSV
    input: PathBuf,

    /// Output CSV (default: <input>-formatted.csv)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Rows to preview after conversion
    #[arg(long, default_value = "5")]
    preview: usize,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "traffic_classifier=info".into()),
        )
        .init();

    let args = Args::parse();
    let output = args.output.unwrap_or_else(|| default_output_path(&args.input));

    let rows = convert_file(&args.input, &output).with_context(|| {
        format!("Failed to convert {} -> {}", args.input.display(), output.display())
    })?;

    println!("Converted {} records", rows.len());
    println!("Output saved to: {}", output.display());

    if args.preview > 0 && !rows.is_empty() {
        println!("\nFirst {} rows:", args.preview.min(rows.len()));
        let mut preview = Vec::new();
        write_rows(&mut preview, &rows[..args.preview.min(rows.len())])?;
        print!("{}", String::from_utf8_lossy(&preview));
    }

    println!("\nColumns ({}): {}", FEATURE_LAYOUT.len(), FEATURE_LAYOUT.join(", "));
    Ok(())
}
