// CLI configuration
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Retag - FLAC and MP3 tag inspection and rebuilding tool
#[derive(Parser, Debug)]
#[command(name = "retag")]
#[command(about = "Read, export and rebuild FLAC and ID3v2 metadata tags", long_about = None)]
#[command(version)]
pub struct Config {
    /// Output format
    #[arg(short, long, value_enum, default_value = "pretty", global = true)]
    pub format: OutputFormat,

    /// Quiet mode (suppress progress messages and logging)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose mode (debug logging)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand
    #[command(subcommand)]
    pub command: Commands,
}

impl Config {
    /// Default log filter when `RUST_LOG` is unset.
    pub fn log_level(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else {
            "info"
        }
    }
}

/// Output format for metadata
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Pretty-printed JSON
    #[default]
    Pretty,
    /// Compact JSON
    Json,
    /// Flattened key-value pairs
    KeyValue,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Read metadata from audio file(s)
    Read {
        /// Audio file path(s)
        #[arg(value_name = "FILE", required = true)]
        files: Vec<PathBuf>,

        /// Embed picture data as base64
        #[arg(long)]
        include_data: bool,

        /// Output to file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Detect tag format
    Detect {
        /// Audio file path(s)
        #[arg(value_name = "FILE", required = true)]
        files: Vec<PathBuf>,
    },

    /// Export cover art
    ExportCover {
        /// Audio file path
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Output directory for cover images
        #[arg(short, long)]
        output: PathBuf,

        /// Cover index (for files with multiple covers)
        #[arg(short, long)]
        index: Option<usize>,
    },

    /// Rebuild the tag of a file and write it, followed by the original audio, to a new file
    Retag {
        /// Audio file path
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Destination file
        #[arg(short, long)]
        output: PathBuf,

        /// Field to set (Vorbis field name for FLAC, frame id for MP3)
        #[arg(short, long = "set", value_name = "KEY=VALUE", value_parser = parse_key_value)]
        set: Vec<(String, String)>,

        /// Replace the embedded pictures with this image
        #[arg(short, long)]
        cover: Option<PathBuf>,

        /// Cover is PNG rather than JPEG
        #[arg(long, requires = "cover")]
        png: bool,

        /// Picture type code for the cover (0-20)
        #[arg(long, default_value_t = 3)]
        picture_type: u32,

        /// Overwrite the destination if it exists
        #[arg(long)]
        force: bool,
    },
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{}'", s)),
    }
}
