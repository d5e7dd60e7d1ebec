//! Run configuration loaded from `config.yaml`.
//!
//! Every key is optional and falls back to a default; only a missing or
//! unparseable file is fatal. Relative paths in the file are resolved
//! against the directory the file lives in, so a config placed next to the
//! executable can refer to the model and output by bare file name.
//!
//! ```yaml
//! files:
//!   output_pdf: news_summary.pdf
//!   log_file: news_mood.log
//!   llm_path: Meta-Llama-3.1-8B-Instruct-Q8_0.gguf
//! logging:
//!   level: INFO
//!   format: full
//! content:
//!   news_source: https://www.bbc.com/news
//!   n_articles: 15
//! model:
//!   api_base: http://127.0.0.1:8080/v1
//! ```

use crate::cli::Cli;
use crate::scrapers::headlines::DEFAULT_MAX_HEADLINES;
use serde::Deserialize;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::instrument;
use url::Url;

/// File name looked up next to the executable when `--config` is absent.
pub const CONFIG_FILE_NAME: &str = "config.yaml";

/// Browser identity sent with the front page request.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not locate the executable directory: {0}")]
    Locate(#[source] io::Error),

    #[error("configuration file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("could not read configuration file {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("error parsing YAML configuration file {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid URL for {field}: {value:?} ({source})")]
    InvalidUrl {
        field: &'static str,
        value: String,
        #[source]
        source: url::ParseError,
    },

    #[error("{0}")]
    Invalid(String),
}

/// Top-level configuration, threaded explicitly through the pipeline.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub files: FilesConfig,
    pub logging: LoggingConfig,
    pub content: ContentConfig,
    pub network: NetworkConfig,
    pub model: ModelConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FilesConfig {
    /// Where the PDF report is written.
    pub output_pdf: PathBuf,
    /// Log file; `None` logs to stderr.
    pub log_file: Option<PathBuf>,
    /// Model weights served by the completion endpoint.
    pub llm_path: PathBuf,
    /// Optional TrueType font for the report; builtin Times-Roman otherwise.
    pub font_path: Option<PathBuf>,
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            output_pdf: PathBuf::from("news_summary.pdf"),
            log_file: Some(PathBuf::from("news_mood.log")),
            llm_path: PathBuf::from("Meta-Llama-3.1-8B-Instruct-Q8_0.gguf"),
            font_path: None,
        }
    }
}

/// Output style of the log lines.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Full,
    Compact,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Level name, any case. `RUST_LOG` takes precedence when set.
    pub level: String,
    pub format: LogFormat,
}

impl LoggingConfig {
    /// The `EnvFilter` directive for `level`.
    ///
    /// Accepts the five tracing levels in any case, plus `warning`,
    /// `critical` and `fatal` as aliases. Anything else is rejected, since
    /// `EnvFilter` would read it as a target name and silence all output.
    pub fn directive(&self) -> Result<&'static str, ConfigError> {
        match self.level.trim().to_lowercase().as_str() {
            "trace" => Ok("trace"),
            "debug" => Ok("debug"),
            "info" => Ok("info"),
            "warn" | "warning" => Ok("warn"),
            "error" | "critical" | "fatal" => Ok("error"),
            _ => Err(ConfigError::Invalid(format!(
                "logging.level must be one of trace, debug, info, warn, error; got {:?}",
                self.level
            ))),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "INFO".to_string(),
            format: LogFormat::Full,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ContentConfig {
    /// Front page to scan for headlines.
    pub news_source: String,
    /// Maximum number of headlines to classify.
    pub n_articles: usize,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            news_source: "https://www.bbc.com/news".to_string(),
            n_articles: DEFAULT_MAX_HEADLINES,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Base URL of an OpenAI-compatible server exposing `/completions`.
    pub api_base: String,
    pub api_key: Option<String>,
    /// Token budget per completion.
    pub max_tokens: u32,
    pub temperature: f32,
    /// Upper bound on one inference round trip through the worker.
    pub timeout_secs: u64,
    /// Retries after a failed completion call.
    pub max_retries: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            api_base: "http://127.0.0.1:8080/v1".to_string(),
            api_key: None,
            max_tokens: 128,
            temperature: 0.7,
            timeout_secs: 300,
            max_retries: 2,
        }
    }
}

/// `config.yaml` in the directory holding the running executable.
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    let exe = std::env::current_exe().map_err(ConfigError::Locate)?;
    let dir = exe.parent().unwrap_or_else(|| Path::new("."));
    Ok(dir.join(CONFIG_FILE_NAME))
}

/// Load and parse a configuration file.
///
/// # Errors
///
/// Returns [`ConfigError::NotFound`] if the file does not exist,
/// [`ConfigError::Read`] if it cannot be read and [`ConfigError::Parse`] if
/// it is not valid YAML for [`AppConfig`]. Values are not validated here;
/// see [`AppConfig::validate`].
#[instrument(level = "debug", skip_all, fields(path = %path.display()))]
pub fn load_config(path: &Path) -> Result<AppConfig, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            ConfigError::NotFound(path.to_path_buf())
        } else {
            ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }
        }
    })?;

    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    AppConfig::from_yaml(&contents, base_dir).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn resolve(base_dir: &Path, path: &mut PathBuf) {
    if path.is_relative() {
        *path = base_dir.join(&*path);
    }
}

impl AppConfig {
    /// Parse YAML text, resolving relative file paths against `base_dir`.
    ///
    /// Blank input yields the defaults.
    pub fn from_yaml(contents: &str, base_dir: &Path) -> Result<Self, serde_yaml::Error> {
        let mut config: AppConfig = if contents.trim().is_empty() {
            AppConfig::default()
        } else {
            serde_yaml::from_str(contents)?
        };

        let files = &mut config.files;
        resolve(base_dir, &mut files.output_pdf);
        resolve(base_dir, &mut files.llm_path);
        if let Some(log_file) = files.log_file.as_mut() {
            resolve(base_dir, log_file);
        }
        if let Some(font_path) = files.font_path.as_mut() {
            resolve(base_dir, font_path);
        }
        Ok(config)
    }

    /// Apply command-line overrides on top of the file values.
    pub fn with_cli(mut self, cli: &Cli) -> Self {
        if let Some(output) = &cli.output {
            self.files.output_pdf = output.clone();
        }
        if let Some(url) = &cli.url {
            self.content.news_source = url.clone();
        }
        if let Some(max) = cli.max_headlines {
            self.content.n_articles = max;
        }
        if let Some(api_base) = &cli.api_base {
            self.model.api_base = api_base.clone();
        }
        self
    }

    /// Check values that deserialize fine but cannot drive a run.
    pub fn validate(self) -> Result<Self, ConfigError> {
        self.logging.directive()?;
        check_http_url("content.news_source", &self.content.news_source)?;
        check_http_url("model.api_base", &self.model.api_base)?;
        if self.content.n_articles == 0 {
            return Err(ConfigError::Invalid(
                "content.n_articles must be at least 1".to_string(),
            ));
        }
        if self.network.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "network.timeout_secs must be at least 1".to_string(),
            ));
        }
        if !(0.0..=2.0).contains(&self.model.temperature) {
            return Err(ConfigError::Invalid(format!(
                "model.temperature must be within 0.0..=2.0, got {}",
                self.model.temperature
            )));
        }
        Ok(self)
    }
}

fn check_http_url(field: &'static str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value).map_err(|source| ConfigError::InvalidUrl {
        field,
        value: value.to_string(),
        source,
    })?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ConfigError::Invalid(format!(
            "{field} must use http or https, got {other:?}"
        ))),
    }
}
