use std::path::PathBuf;
use std::time::Duration;

use eyre::Result;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::mirror::Mirror;
use crate::question::QuestionStyle;

pub const DEFAULT_PRIMARY_LANG: &str = "pt";
pub const DEFAULT_FALLBACK_LANG: &str = "en";
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";
pub const DEFAULT_SEGMENT_SECS: u64 = 60;

const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 15;
const MIN_HTTP_TIMEOUT_SECS: u64 = 5;
const MAX_HTTP_TIMEOUT_SECS: u64 = 30;

const DEFAULT_STT_TIMEOUT_SECS: u64 = 600;
const MIN_STT_TIMEOUT_SECS: u64 = 60;
const MAX_STT_TIMEOUT_SECS: u64 = 1800;

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub primary_lang: Option<String>,
    pub fallback_lang: Option<String>,
    pub model: Option<String>,
    pub count: Option<u8>,
    pub style: Option<QuestionStyle>,
    pub http_timeout_secs: Option<u64>,
    /// Whole-request bound for one transcription upload
    pub stt_timeout_secs: Option<u64>,
    pub segment_secs: Option<u64>,
    pub stt_model: Option<String>,
    pub whisper_bin: Option<PathBuf>,
    pub offline_model: Option<PathBuf>,
    pub mirrors: Option<Vec<Mirror>>,
}

impl Config {
    /// Load config from ~/.config/ytquiz/config.toml if it exists
    pub fn load() -> Result<Self> {
        let path = config_path();
        if path.exists() {
            debug!("Loading config from {}", path.display());
            let content = std::fs::read_to_string(&path)?;
            let config: Config = toml::from_str(&content)?;
            Ok(config)
        } else {
            debug!("No config file found at {}", path.display());
            Ok(Config::default())
        }
    }

    /// Per-request timeout for upstream calls, kept within 5..=30 seconds
    pub fn http_timeout(&self) -> Duration {
        let secs = self
            .http_timeout_secs
            .unwrap_or(DEFAULT_HTTP_TIMEOUT_SECS)
            .clamp(MIN_HTTP_TIMEOUT_SECS, MAX_HTTP_TIMEOUT_SECS);
        Duration::from_secs(secs)
    }

    /// Upload and transcription time for one audio file, kept within 60..=1800 seconds
    pub fn stt_timeout(&self) -> Duration {
        let secs = self
            .stt_timeout_secs
            .unwrap_or(DEFAULT_STT_TIMEOUT_SECS)
            .clamp(MIN_STT_TIMEOUT_SECS, MAX_STT_TIMEOUT_SECS);
        Duration::from_secs(secs)
    }

    pub fn segment_secs(&self) -> u64 {
        self.segment_secs.filter(|s| *s > 0).unwrap_or(DEFAULT_SEGMENT_SECS)
    }
}

pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from(".config"))
        .join("ytquiz")
        .join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mirror::MirrorKind;

    #[test]
    fn test_parse_config() {
        let toml_str = r#"
primary_lang = "es"
fallback_lang = "pt"
model = "gpt-4o"
count = 10
style = "multiple_choice"
http_timeout_secs = 20
stt_model = "gpt-4o-transcribe"
offline_model = "/models/ggml-base.bin"

[[mirrors]]
kind = "invidious"
url = "https://inv.example.org"

[[mirrors]]
kind = "piped"
url = "https://piped.example.org"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.primary_lang.as_deref(), Some("es"));
        assert_eq!(config.fallback_lang.as_deref(), Some("pt"));
        assert_eq!(config.model.as_deref(), Some("gpt-4o"));
        assert_eq!(config.count, Some(10));
        assert_eq!(config.style, Some(QuestionStyle::MultipleChoice));
        assert_eq!(config.http_timeout(), Duration::from_secs(20));
        assert_eq!(config.offline_model, Some(PathBuf::from("/models/ggml-base.bin")));

        let mirrors = config.mirrors.unwrap();
        assert_eq!(mirrors.len(), 2);
        assert_eq!(mirrors[1].kind, MirrorKind::Piped);
    }

    #[test]
    fn test_parse_empty_config() {
        let toml_str = "";
        let config: Config = toml::from_str(toml_str).unwrap();
        assert!(config.primary_lang.is_none());
        assert!(config.mirrors.is_none());
        assert_eq!(config.http_timeout(), Duration::from_secs(15));
        assert_eq!(config.segment_secs(), 60);
        assert_eq!(config.stt_timeout(), Duration::from_secs(600));
    }

    #[test]
    fn test_parse_partial_config() {
        let toml_str = r#"primary_lang = "fr""#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.primary_lang.as_deref(), Some("fr"));
        assert!(config.model.is_none());
    }

    #[test]
    fn test_http_timeout_clamped() {
        let low = Config {
            http_timeout_secs: Some(1),
            ..Config::default()
        };
        let high = Config {
            http_timeout_secs: Some(300),
            ..Config::default()
        };
        assert_eq!(low.http_timeout(), Duration::from_secs(5));
        assert_eq!(high.http_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_stt_timeout_clamped() {
        let low = Config {
            stt_timeout_secs: Some(10),
            ..Config::default()
        };
        let high = Config {
            stt_timeout_secs: Some(7200),
            ..Config::default()
        };
        assert_eq!(low.stt_timeout(), Duration::from_secs(60));
        assert_eq!(high.stt_timeout(), Duration::from_secs(1800));
    }

    #[test]
    fn test_zero_segment_ignored() {
        let config = Config {
            segment_secs: Some(0),
            ..Config::default()
        };
        assert_eq!(config.segment_secs(), 60);
    }
}
