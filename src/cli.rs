//! Command-line interface definitions for News Mood.
//!
//! Everything has a default in `config.yaml`; the flags here only override
//! single values for one run.

use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments for the News Mood application.
///
/// # Examples
///
/// ```sh
/// # Use config.yaml next to the executable
/// news_mood
///
/// # Explicit config, different source and output
/// news_mood -c ./config.yaml -u https://www.bbc.com/news -o ./today.pdf
///
/// # Point at another completion server
/// NEWS_MOOD_API_BASE=http://gpu-box:8080/v1 news_mood -n 10
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Path to config.yaml (defaults to the file next to the executable)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Output path for the PDF report
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// News front page to scan for headlines
    #[arg(short, long)]
    pub url: Option<String>,

    /// Maximum number of headlines to classify
    #[arg(short = 'n', long)]
    pub max_headlines: Option<usize>,

    /// Base URL of the OpenAI-compatible completion server
    #[arg(long, env = "NEWS_MOOD_API_BASE")]
    pub api_base: Option<String>,
}
