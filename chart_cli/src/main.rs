use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::Context;
use chart_codec::DecodeConfig;
use chart_model::Song;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "chartc")]
#[command(about = "Chart codec CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Decode a chart (text or timed-event container, by extension) to JSON.
    Decode {
        input: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Encode a JSON song back out to a chart.
    Encode {
        input: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Write the timed-event container instead of text.
        #[arg(long)]
        midi: bool,
        /// Splice into this existing text chart, preserving its unrelated
        /// sections, instead of writing a fresh file.
        #[arg(long)]
        splice: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Decode { input, output } => {
            let song = chart_codec::decode_file(&input, &DecodeConfig::default())
                .with_context(|| format!("decode failed: {}", input.display()))?;

            let json =
                serde_json::to_string_pretty(&song).context("failed to serialize song")?;
            let out_path = output.unwrap_or_else(|| default_output_path(&input, "json"));
            fs::write(&out_path, json)
                .with_context(|| format!("failed to write: {}", out_path.display()))?;
        }
        Command::Encode {
            input,
            output,
            midi,
            splice,
        } => {
            let json = fs::read_to_string(&input)
                .with_context(|| format!("failed to read: {}", input.display()))?;
            let song: Song =
                serde_json::from_str(&json).context("failed to parse song JSON")?;

            if midi {
                let bytes = chart_codec::encode_midi(&song)
                    .with_context(|| format!("encode failed: {}", input.display()))?;
                let out_path = output.unwrap_or_else(|| default_output_path(&input, "mid"));
                fs::write(&out_path, bytes)
                    .with_context(|| format!("failed to write: {}", out_path.display()))?;
            } else {
                let text = match &splice {
                    Some(existing_path) => {
                        let existing = fs::read_to_string(existing_path).with_context(|| {
                            format!("failed to read: {}", existing_path.display())
                        })?;
                        chart_codec::splice_chart(&existing, &song)
                    }
                    None => chart_codec::encode_chart(&song),
                };
                let out_path = output
                    .or(splice)
                    .unwrap_or_else(|| default_output_path(&input, "chart"));
                fs::write(&out_path, text)
                    .with_context(|| format!("failed to write: {}", out_path.display()))?;
            }
        }
    }

    Ok(())
}

fn default_output_path(input: &Path, extension: &str) -> PathBuf {
    let mut out = input.to_path_buf();
    out.set_extension(extension);
    out
}
