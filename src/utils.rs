//! Utility functions for logging, console output and file system checks.
//!
//! - String truncation for log fields
//! - ANSI colouring for the per-headline console lines
//! - Output location validation before any network or model work starts

use crate::models::Label;
use std::error::Error;
use std::fs as stdfs;
use std::path::Path;
use tokio::fs;
use tracing::{info, instrument};

/// Truncate a string for logging purposes.
///
/// Long strings are truncated to at most `max` bytes (on a character
/// boundary) with an ellipsis and byte count indicator appended.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(truncate_for_log("short", 100), "short");
/// assert_eq!(truncate_for_log(&"a".repeat(500), 10), "aaaaaaaaaa…(+490 bytes)");
/// ```
pub fn truncate_for_log(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut cut = max;
    while !s.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…(+{} bytes)", &s[..cut], s.len() - cut)
}

pub fn red(text: &str) -> String {
    format!("\x1b[91m{text}\x1b[0m")
}

pub fn green(text: &str) -> String {
    format!("\x1b[92m{text}\x1b[0m")
}

/// Console line for one classified headline, coloured by label.
pub fn console_line(label: Label, response: &str, headline: &str) -> String {
    let response = match label {
        Label::Depressing => red(response),
        Label::Ok => green(response),
    };
    format!("[{response}] {headline}")
}

/// Ensure the directory that will hold `path` exists and is writable.
///
/// This creates the directory if needed, then performs a write test by
/// creating and immediately deleting a probe file next to the target.
///
/// # Errors
///
/// Returns an error if the directory cannot be created or is not writable.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn ensure_writable_parent(path: &Path) -> Result<(), Box<dyn Error>> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).await?;

    let probe_path = dir.join("..__probe_write__");
    stdfs::File::create(&probe_path)?;
    let _ = stdfs::remove_file(&probe_path);
    info!(dir = %dir.display(), "Output directory is writable");
    Ok(())
}

/// Serve exactly one HTTP response on a fresh localhost port.
///
/// The request is read in full (headers plus `content-length` body) before
/// the reply is written. Returns the base URL, e.g. `http://127.0.0.1:41234`.
#[cfg(test)]
pub(crate) async fn serve_once(status: u16, content_type: &'static str, body: &'static str) -> String {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (mut socket, _) = listener.accept().await.unwrap();
        let mut request = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
            if let Some(end) = request.windows(4).position(|w| w == b"\r\n\r\n") {
                let head = String::from_utf8_lossy(&request[..end]).to_lowercase();
                let length = head
                    .lines()
                    .find_map(|line| line.strip_prefix("content-length:"))
                    .and_then(|value| value.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if request.len() >= end + 4 + length {
                    break;
                }
            }
        }
        let response = format!(
            "HTTP/1.1 {status} Test\r\ncontent-type: {content_type}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        socket.write_all(response.as_bytes()).await.unwrap();
        let _ = socket.shutdown().await;
    });
    format!("http://{addr}")
}

/// Accept one connection and never answer it.
#[cfg(test)]
pub(crate) async fn serve_silence() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (_socket, _) = listener.accept().await.unwrap();
        tokio::time::sleep(std::time::Duration::from_secs(30)).await;
    });
    format!("http://{addr}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_for_log_short_string() {
        let s = "Hello, world!";
        assert_eq!(truncate_for_log(s, 100), "Hello, world!");
    }

    #[test]
    fn test_truncate_for_log_long_string() {
        let s = "a".repeat(500);
        let result = truncate_for_log(&s, 100);
        assert!(result.starts_with(&"a".repeat(100)));
        assert!(result.contains("…(+400 bytes)"));
    }

    #[test]
    fn test_truncate_for_log_respects_char_boundaries() {
        let s = "é".repeat(10);
        let result = truncate_for_log(&s, 5);
        assert!(result.starts_with("éé…"));
        assert!(result.contains("(+16 bytes)"));
    }

    #[test]
    fn test_console_line_colours() {
        assert_eq!(
            console_line(Label::Depressing, "depressing news", "Floods"),
            "[\x1b[91mdepressing news\x1b[0m] Floods"
        );
        assert_eq!(
            console_line(Label::Ok, "ok news", "Sunshine"),
            "[\x1b[92mok news\x1b[0m] Sunshine"
        );
    }

    #[tokio::test]
    async fn test_ensure_writable_parent_creates_dir() {
        let dir = std::env::temp_dir().join(format!("news_mood_utils_{}", std::process::id()));
        let target = dir.join("deeper").join("report.pdf");

        ensure_writable_parent(&target).await.unwrap();
        assert!(dir.join("deeper").is_dir());
        assert!(!dir.join("deeper").join("..__probe_write__").exists());

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
