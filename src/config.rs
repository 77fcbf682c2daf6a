//! Process configuration — one JSON file, read once at startup.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ConfigError;

/// Process-wide configuration, immutable after load.
///
/// Field names are the wire contract of the config file. The
/// `telegram_file_base_url` is a template with two `%s` slots
/// consuming the bot credential and then the platform file path.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub telegram_api_key: String,
    /// Present in the file for operator tooling; the pipeline itself
    /// never reads it.
    #[serde(default)]
    pub telegram_chat_id: String,
    pub chat_gpt_api_key: String,
    pub telegram_file_base_url: String,
    pub chat_gpt_base_url: String,
    #[serde(default)]
    pub log_level: Option<String>,
    /// Staging directory for downloaded and transformed images.
    /// Defaults to the process working directory.
    #[serde(default)]
    pub work_dir: Option<PathBuf>,
}

impl Config {
    /// Read and validate the config file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config: Config =
            serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
                path: path.display().to_string(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("telegram_api_key", &self.telegram_api_key),
            ("chat_gpt_api_key", &self.chat_gpt_api_key),
            ("telegram_file_base_url", &self.telegram_file_base_url),
            ("chat_gpt_base_url", &self.chat_gpt_base_url),
        ];
        for (key, value) in required {
            if value.is_empty() {
                return Err(ConfigError::MissingRequired { key });
            }
        }

        let slots = self.telegram_file_base_url.matches("%s").count();
        if slots != 2 {
            return Err(ConfigError::InvalidValue {
                key: "telegram_file_base_url",
                message: format!("expected 2 `%s` slots (credential, file path), found {slots}"),
            });
        }
        Ok(())
    }

    /// Staging directory, defaulting to the working directory.
    pub fn work_dir(&self) -> PathBuf {
        self.work_dir.clone().unwrap_or_else(|| PathBuf::from("."))
    }
}

/// Map the configured log level onto a tracing directive.
///
/// Returns the directive plus whether an unrecognized value forced the
/// `info` fallback (the caller warns once tracing is up).
pub fn log_level_directive(raw: Option<&str>) -> (&'static str, bool) {
    match raw.map(str::to_ascii_lowercase).as_deref() {
        None | Some("") => ("info", false),
        Some("trace") => ("trace", false),
        Some("debug") => ("debug", false),
        Some("info") => ("info", false),
        Some("warn") => ("warn", false),
        Some("error") => ("error", false),
        Some(_) => ("info", true),
    }
}

/// Resolve the config-file path from the process arguments.
///
/// Accepts either a bare path or `--input <path>` (the historical flag
/// form). There is no further CLI surface.
pub fn config_path_from_args<I>(mut args: I) -> Option<PathBuf>
where
    I: Iterator<Item = String>,
{
    match args.next()?.as_str() {
        "--input" => args.next().map(PathBuf::from),
        path => Some(PathBuf::from(path)),
    }
}

// ── Tests ───────────────────────────────────────────────────────────
