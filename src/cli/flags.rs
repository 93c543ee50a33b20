use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::report::OutputFormat;

#[derive(Parser, Debug)]
#[command(
    name = "typo-sniper",
    version,
    about = "Typosquatting detection with DNS probing, WHOIS and threat-intel enrichment"
)]
pub struct Cli {
    /// Input file with one monitored domain per line ('#' starts a comment)
    #[arg(short = 'i', long, value_name = "FILE")]
    pub input: PathBuf,

    /// Output directory for reports
    #[arg(short = 'o', long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Output formats (default: excel)
    #[arg(long, value_enum, num_args = 1..)]
    pub format: Vec<OutputFormatArg>,

    /// Only emit domains registered within the last N months (0 = off)
    #[arg(long, value_name = "N")]
    pub months: Option<u32>,

    /// YAML configuration file
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Worker pool size
    #[arg(long, value_name = "N")]
    pub max_workers: Option<usize>,

    /// Cache TTL in seconds
    #[arg(long, value_name = "SECONDS")]
    pub cache_ttl: Option<u64>,

    /// Disable the on-disk cache
    #[arg(long)]
    pub no_cache: bool,

    /// Enable the ML scorer
    #[arg(long)]
    pub ml: bool,

    /// Path to the ML model file
    #[arg(long, value_name = "PATH")]
    pub ml_model: Option<PathBuf>,

    /// Active-learning review budget
    #[arg(long, value_name = "N")]
    pub ml_review: Option<usize>,

    /// Verbose output
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Debug output
    #[arg(long)]
    pub debug: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormatArg {
    Excel,
    Json,
    Csv,
    Html,
}

impl From<OutputFormatArg> for OutputFormat {
    fn from(value: OutputFormatArg) -> Self {
        match value {
            OutputFormatArg::Excel => OutputFormat::Excel,
            OutputFormatArg::Json => OutputFormat::Json,
            OutputFormatArg::Csv => OutputFormat::Csv,
            OutputFormatArg::Html => OutputFormat::Html,
        }
    }
}
