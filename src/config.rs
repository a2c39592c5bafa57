use serde::Deserialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Errors that can occur when loading settings.
#[derive(Debug)]
pub enum ConfigError {
    /// Failed to read the settings file.
    ReadFile { path: PathBuf, source: std::io::Error },
    /// Failed to parse JSON.
    ParseJson { path: PathBuf, source: serde_json::Error },
    /// Validation error.
    Validation(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ReadFile { path, source } => {
                write!(f, "failed to read settings file '{}': {}", path.display(), source)
            }
            Self::ParseJson { path, source } => {
                write!(f, "failed to parse settings file '{}': {}", path.display(), source)
            }
            Self::Validation(msg) => write!(f, "settings validation error: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::ReadFile { source, .. } => Some(source),
            Self::ParseJson { source, .. } => Some(source),
            Self::Validation(_) => None,
        }
    }
}

#[derive(Deserialize)]
struct SettingsFile {
    /// Seconds a materialized model stays cached.
    model_cache_ttl: u64,
    /// Trailing window of raw-text lines kept in windowed mode.
    message_limit: usize,
    /// Grow the chain incrementally instead of rebuilding from the window.
    grow_chain: bool,
    /// Reject generated sentences overlapping the corpus beyond this ratio.
    max_overlap_ratio: f64,
    /// Generation retry budget per sentence.
    tries: u32,
    /// Language codes for optional NLP taggers, first entry is the
    /// default. Resolved against the caller's processor registry by
    /// `Tokenizer::for_languages`.
    #[serde(default)]
    languages: Vec<String>,
    /// Cap on raw-text lines kept in grow mode. Absent = full audit trail.
    history_limit: Option<usize>,
    /// SQLite database path. Absent = caller decides (e.g. in-memory).
    database_path: Option<String>,
}

/// Runtime settings for the generation core.
pub struct Settings {
    pub model_cache_ttl: Duration,
    pub message_limit: usize,
    pub grow_chain: bool,
    pub max_overlap_ratio: f64,
    pub tries: u32,
    pub languages: Vec<String>,
    pub history_limit: Option<usize>,
    pub database_path: Option<PathBuf>,
}

impl Settings {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref().to_path_buf();
        let content = std::fs::read_to_string(&path)
            .map_err(|e| ConfigError::ReadFile { path: path.clone(), source: e })?;
        let file: SettingsFile = serde_json::from_str(&content)
            .map_err(|e| ConfigError::ParseJson { path: path.clone(), source: e })?;

        if file.model_cache_ttl == 0 {
            return Err(ConfigError::Validation("model_cache_ttl must be positive".into()));
        }
        if file.message_limit == 0 {
            return Err(ConfigError::Validation("message_limit must be positive".into()));
        }
        if !(file.max_overlap_ratio > 0.0) {
            return Err(ConfigError::Validation("max_overlap_ratio must be positive".into()));
        }
        if file.tries == 0 {
            return Err(ConfigError::Validation("tries must be positive".into()));
        }
        if file.history_limit == Some(0) {
            return Err(ConfigError::Validation("history_limit must be positive when set".into()));
        }

        Ok(Self {
            model_cache_ttl: Duration::from_secs(file.model_cache_ttl),
            message_limit: file.message_limit,
            grow_chain: file.grow_chain,
            max_overlap_ratio: file.max_overlap_ratio,
            tries: file.tries,
            languages: file.languages,
            history_limit: file.history_limit,
            database_path: file.database_path.map(PathBuf::from),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_settings(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    fn assert_err(result: Result<Settings, ConfigError>) -> ConfigError {
        match result {
            Ok(_) => panic!("expected error, got Ok"),
            Err(e) => e,
        }
    }

    #[test]
    fn test_valid_settings() {
        let file = write_settings(r#"{
            "model_cache_ttl": 300,
            "message_limit": 5000,
            "grow_chain": true,
            "max_overlap_ratio": 0.7,
            "tries": 50,
            "languages": ["en", "es"]
        }"#);
        let settings = Settings::load(file.path()).expect("should load valid settings");
        assert_eq!(settings.model_cache_ttl, Duration::from_secs(300));
        assert_eq!(settings.message_limit, 5000);
        assert!(settings.grow_chain);
        assert_eq!(settings.tries, 50);
        assert_eq!(settings.languages, vec!["en", "es"]);
        assert_eq!(settings.history_limit, None);
        assert_eq!(settings.database_path, None);
    }

    #[test]
    fn test_zero_ttl() {
        let file = write_settings(r#"{
            "model_cache_ttl": 0,
            "message_limit": 5000,
            "grow_chain": false,
            "max_overlap_ratio": 0.7,
            "tries": 50
        }"#);
        let err = assert_err(Settings::load(file.path()));
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("model_cache_ttl"));
    }

    #[test]
    fn test_negative_overlap_ratio() {
        let file = write_settings(r#"{
            "model_cache_ttl": 300,
            "message_limit": 5000,
            "grow_chain": false,
            "max_overlap_ratio": -0.5,
            "tries": 50
        }"#);
        let err = assert_err(Settings::load(file.path()));
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("max_overlap_ratio"));
    }

    #[test]
    fn test_zero_tries() {
        let file = write_settings(r#"{
            "model_cache_ttl": 300,
            "message_limit": 5000,
            "grow_chain": false,
            "max_overlap_ratio": 0.7,
            "tries": 0
        }"#);
        let err = assert_err(Settings::load(file.path()));
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_zero_history_limit() {
        let file = write_settings(r#"{
            "model_cache_ttl": 300,
            "message_limit": 5000,
            "grow_chain": true,
            "max_overlap_ratio": 0.7,
            "tries": 50,
            "history_limit": 0
        }"#);
        let err = assert_err(Settings::load(file.path()));
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("history_limit"));
    }

    #[test]
    fn test_file_not_found() {
        let err = assert_err(Settings::load("/nonexistent/path/settings.json"));
        assert!(matches!(err, ConfigError::ReadFile { .. }));
    }

    #[test]
    fn test_invalid_json() {
        let file = write_settings("{ invalid json }");
        let err = assert_err(Settings::load(file.path()));
        assert!(matches!(err, ConfigError::ParseJson { .. }));
    }
}
