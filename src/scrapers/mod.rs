//! Front page fetching and adaptive headline extraction.
//!
//! The source page is arbitrary, unversioned HTML, so headlines are located
//! without any site-specific selector. Extraction runs in three stages:
//!
//! 1. **Scanning** ([`candidates`]): collect every node that looks like a
//!    headline under three independent heuristics
//! 2. **Selection** ([`pattern`]): group candidates by structural signature
//!    (tag plus class tokens) and keep the largest group
//! 3. **Extraction** ([`headlines`]): re-query the page with the winning
//!    signature, fall back when that fails, dedupe and truncate
//!
//! # Failure Policy
//!
//! Nothing here aborts a run. A failed fetch is logged and yields no
//! headlines; a page with no recognisable pattern falls back to plain
//! headings, and an empty result is only a warning.

pub mod candidates;
pub mod headlines;
pub mod pattern;

use crate::config::NetworkConfig;
use headlines::analyze_document;
use reqwest::Client;
use std::time::Duration;
use tracing::{error, info, instrument};

/// HTTP client for the front page request.
///
/// Sends a browser User-Agent and gives up after `network.timeout_secs`.
pub fn build_client(network: &NetworkConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(network.user_agent.as_str())
        .timeout(Duration::from_secs(network.timeout_secs))
        .build()
}

/// Download the page at `url`, treating any non-2xx status as an error.
#[instrument(level = "info", skip(client))]
pub async fn fetch_page(client: &Client, url: &str) -> Result<String, reqwest::Error> {
    let response = client.get(url).send().await?.error_for_status()?;
    let body = response.text().await?;
    info!(bytes = body.len(), "Fetched front page");
    Ok(body)
}

/// Fetch `url` and extract up to `max` headlines from it.
///
/// # Returns
///
/// The headlines in page order. Network failures are logged and produce an
/// empty list so the run can still emit a (blank) report.
#[instrument(level = "info", skip(client))]
pub async fn fetch_headlines(client: &Client, url: &str, max: usize) -> Vec<String> {
    info!("Fetching news website");
    match fetch_page(client, url).await {
        Ok(html) => analyze_document(&html, max),
        Err(e) => {
            error!(error = %e, %url, "Error fetching the news website");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::{serve_once, serve_silence};

    #[test]
    fn test_build_client_from_defaults() {
        assert!(build_client(&NetworkConfig::default()).is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_source_yields_no_headlines() {
        let network = NetworkConfig {
            timeout_secs: 2,
            ..NetworkConfig::default()
        };
        let client = build_client(&network).unwrap();
        // Port 9 on localhost is the discard service; nothing listens there in CI.
        let headlines = fetch_headlines(&client, "http://127.0.0.1:9/news", 15).await;
        assert!(headlines.is_empty());
    }

    #[tokio::test]
    async fn test_server_error_status_is_an_error() {
        let base = serve_once(500, "text/html", "<h2>Internal error page with a long title</h2>").await;
        let client = build_client(&NetworkConfig::default()).unwrap();

        assert!(fetch_page(&client, &base).await.is_err());
    }

    #[tokio::test]
    async fn test_server_error_is_not_fatal() {
        let base = serve_once(500, "text/html", "oops").await;
        let client = build_client(&NetworkConfig::default()).unwrap();

        assert!(fetch_headlines(&client, &base, 15).await.is_empty());
    }

    #[tokio::test]
    async fn test_slow_source_times_out() {
        let base = serve_silence().await;
        let network = NetworkConfig {
            timeout_secs: 1,
            ..NetworkConfig::default()
        };
        let client = build_client(&network).unwrap();

        let err = fetch_page(&client, &base).await.unwrap_err();
        assert!(err.is_timeout());
        assert!(fetch_headlines(&client, &serve_silence().await, 15).await.is_empty());
    }

    #[tokio::test]
    async fn test_fetches_and_extracts_headlines() {
        let base = serve_once(
            200,
            "text/html; charset=utf-8",
            "<html><body><h2>Storm knocks out power to thousands overnight</h2>\
             <h2>Scientists find water ice near lunar south pole</h2></body></html>",
        )
        .await;
        let client = build_client(&NetworkConfig::default()).unwrap();

        assert_eq!(
            fetch_headlines(&client, &base, 15).await,
            vec![
                "Storm knocks out power to thousands overnight",
                "Scientists find water ice near lunar south pole"
            ]
        );
    }
}
