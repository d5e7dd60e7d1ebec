//! # News Mood
//!
//! A batch tool that reads one news front page, asks a local language model
//! whether each headline is depressing, and prints the verdicts as a
//! two-section PDF.
//!
//! ## Features
//!
//! - Finds headlines on arbitrary static HTML by adaptive pattern detection,
//!   with no site-specific selectors
//! - Classifies headlines one at a time through an OpenAI-compatible
//!   completion server (for example llama.cpp serving a GGUF model)
//! - Runs inference on a dedicated worker task with a bounded wait
//! - Writes a paginated PDF with "Ok News" and "Depressing News" sections
//!
//! ## Usage
//!
//! ```sh
//! news_mood -c ./config.yaml
//! ```
//!
//! ## Architecture
//!
//! The application follows a pipeline architecture:
//! 1. **Fetching**: Download the configured front page
//! 2. **Extraction**: Scan candidates, select the dominant pattern, extract headlines
//! 3. **Classification**: Send each headline to the model, sequentially
//! 4. **Output**: Partition by label and write the PDF report

use clap::Parser;
use futures::stream::{self, StreamExt};
use std::error::Error;
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod api;
mod classifier;
mod cli;
mod config;
mod models;
mod outputs;
mod scrapers;
mod utils;
mod worker;

use api::{HttpCompletion, RetryComplete};
use classifier::HeadlineClassifier;
use cli::Cli;
use config::{AppConfig, ConfigError, LogFormat, LoggingConfig};
use models::Classification;
use outputs::pdf::{RenderOptions, render_pdf, write_report};
use utils::{console_line, ensure_writable_parent};
use worker::InferenceWorker;

/// Delay before the first retry of a failed completion call.
const RETRY_BASE_DELAY: Duration = Duration::from_secs(1);

fn init_tracing(logging: &LoggingConfig, log_file: Option<&Path>) -> Result<(), Box<dyn Error>> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(logging.directive()?)?,
    };

    let writer = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            BoxMakeWriter::new(Mutex::new(file))
        }
        None => BoxMakeWriter::new(std::io::stderr),
    };

    let builder = tfmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(log_file.is_none())
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339());

    let installed = match logging.format {
        LogFormat::Full => builder.try_init(),
        LogFormat::Compact => builder.compact().try_init(),
    };
    installed.map_err(|e| -> Box<dyn Error> { e })
}

fn load_run_config(args: &Cli) -> Result<AppConfig, ConfigError> {
    let path = match &args.config {
        Some(path) => path.clone(),
        None => config::default_config_path()?,
    };
    config::load_config(&path)?.with_cli(args).validate()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let args = Cli::parse();

    // --- Config first: it decides where logs go ---
    let config = match load_run_config(&args) {
        Ok(config) => config,
        Err(e) => {
            let _ = tfmt().with_writer(std::io::stderr).try_init();
            error!(error = %e, "Configuration error; aborting");
            return Err(e.into());
        }
    };

    init_tracing(&config.logging, config.files.log_file.as_deref())?;

    let start_time = Instant::now();
    info!("news_mood starting up");
    debug!(
        source = %config.content.news_source,
        max_headlines = config.content.n_articles,
        output = %config.files.output_pdf.display(),
        api_base = %config.model.api_base,
        "Loaded configuration"
    );

    // Early check: the report must be writable before any expensive work
    if let Err(e) = ensure_writable_parent(&config.files.output_pdf).await {
        error!(
            path = %config.files.output_pdf.display(),
            error = %e,
            "Output directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }

    if !config.files.llm_path.exists() {
        warn!(
            path = %config.files.llm_path.display(),
            "Model weights not found locally; relying on the completion server to have them"
        );
    }

    // ---- Fetch and extract headlines ----
    let client = scrapers::build_client(&config.network)?;
    let headlines = scrapers::fetch_headlines(
        &client,
        &config.content.news_source,
        config.content.n_articles,
    )
    .await;
    info!(count = headlines.len(), "Headlines to classify");

    // ---- Start the inference worker ----
    let model_client = reqwest::Client::builder().build()?;
    let backend = RetryComplete::new(
        HttpCompletion::new(
            model_client,
            &config.model.api_base,
            config.files.llm_path.to_string_lossy(),
            config.model.api_key.clone(),
        ),
        config.model.max_retries,
        RETRY_BASE_DELAY,
    );
    let worker = InferenceWorker::spawn(backend, Duration::from_secs(config.model.timeout_secs));
    let classifier = HeadlineClassifier::from_config(worker, &config.model);

    // ---- Classify one headline at a time ----
    let classifier_ref = &classifier;
    let classified: Vec<Classification> = stream::iter(headlines.iter().enumerate())
        .then(move |(i, headline)| async move {
            match classifier_ref.classify(headline).await {
                Ok(classification) => {
                    println!(
                        "{}",
                        console_line(
                            classification.label,
                            &classification.response,
                            &classification.headline
                        )
                    );
                    Some(classification)
                }
                Err(e) => {
                    error!(index = i, error = %e, %headline, "Classification failed; skipping headline");
                    None
                }
            }
        })
        .filter_map(std::future::ready)
        .collect()
        .await;

    let failed = headlines.len() - classified.len();
    info!(
        total = headlines.len(),
        successful = classified.len(),
        failed,
        "Completed headline classification"
    );
    classifier.into_backend().shutdown().await;

    // ---- Report ----
    let report = outputs::partition(
        classified
            .into_iter()
            .map(|classification| (classification.headline, classification.label)),
    );
    info!(
        ok = report.ok.len(),
        depressing = report.depressing.len(),
        "Partitioned headlines"
    );
    if report.is_empty() {
        warn!("No headlines were classified; writing an empty report");
    }

    let options = RenderOptions::new(config.files.font_path.clone());
    let bytes = match render_pdf(&report, &options) {
        Ok(bytes) => bytes,
        Err(e) => {
            error!(error = %e, "Failed to render PDF");
            return Err(e.into());
        }
    };
    if let Err(e) = write_report(&config.files.output_pdf, &bytes).await {
        error!(path = %config.files.output_pdf.display(), error = %e, "Failed writing PDF");
        return Err(e.into());
    }

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );

    Ok(())
}
