pub mod audio;
pub mod cache;
pub mod capabilities;
pub mod chain;
pub mod config;
pub mod error;
pub mod generator;
pub mod llm;
pub mod mirror;
pub mod offline;
pub mod output;
pub mod question;
pub mod repair;
pub mod session;
pub mod synthetic;
pub mod whisper;
pub mod youtube;

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

pub use error::QuizError;

/// An 11-character YouTube video identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VideoRef(String);

impl VideoRef {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn watch_url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.0)
    }
}

impl std::fmt::Display for VideoRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which strategy produced a transcript
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranscriptSource {
    Caption,
    Mirror,
    CloudStt,
    OfflineStt,
    LlmAudio,
    Synthetic,
    Manual,
}

impl std::fmt::Display for TranscriptSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TranscriptSource::Caption => write!(f, "caption"),
            TranscriptSource::Mirror => write!(f, "mirror"),
            TranscriptSource::CloudStt => write!(f, "cloud speech-to-text"),
            TranscriptSource::OfflineStt => write!(f, "offline speech-to-text"),
            TranscriptSource::LlmAudio => write!(f, "llm audio transcription"),
            TranscriptSource::Synthetic => write!(f, "synthetic (from metadata)"),
            TranscriptSource::Manual => write!(f, "manual entry"),
        }
    }
}

/// A transcript obtained by one of the acquisition strategies
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptResult {
    pub text: String,
    /// True when the text was fabricated from metadata rather than taken from captions or audio
    pub synthetic: bool,
    pub source: TranscriptSource,
    #[serde(default)]
    pub language: Option<String>,
}

impl TranscriptResult {
    pub fn new(text: impl Into<String>, source: TranscriptSource) -> Self {
        Self {
            text: text.into(),
            synthetic: source == TranscriptSource::Synthetic,
            source,
            language: None,
        }
    }

    pub fn with_language(mut self, lang: impl Into<String>) -> Self {
        self.language = Some(lang.into());
        self
    }

    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }
}

static BARE_ID: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{11}$").unwrap());

// Host, then an optional path/query marker, then the id. The trailing group rejects ids longer than 11.
static URL_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?:https?://)?(?:www\.|m\.)?(?:youtube|youtu|youtube-nocookie)\.(?:com|be)/(?:watch\?v=|embed/|v/|shorts/|.+\?v=|.+&v=)?([A-Za-z0-9_-]{11})(?:[^A-Za-z0-9_-]|$)",
    )
    .unwrap()
});

/// Extract video ID from various YouTube URL formats
pub fn extract_video_id(input: &str) -> Option<VideoRef> {
    let input = input.trim();

    if BARE_ID.is_match(input) {
        return Some(VideoRef(input.to_string()));
    }

    URL_ID
        .captures(input)
        .map(|caps| VideoRef(caps[1].to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(input: &str) -> Option<String> {
        extract_video_id(input).map(|v| v.to_string())
    }

    #[test]
    fn test_bare_video_id() {
        assert_eq!(id("dQw4w9WgXcQ"), Some("dQw4w9WgXcQ".to_string()));
    }

    #[test]
    fn test_watch_url() {
        assert_eq!(
            id("https://www.youtube.com/watch?v=dQw4w9WgXcQ"),
            Some("dQw4w9WgXcQ".to_string())
        );
    }

    #[test]
    fn test_watch_url_with_extra_params() {
        assert_eq!(
            id("https://www.youtube.com/watch?v=dQw4w9WgXcQ&t=120"),
            Some("dQw4w9WgXcQ".to_string())
        );
    }

    #[test]
    fn test_recognized_shapes() {
        let shapes = [
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "http://youtube.com/watch?v=dQw4w9WgXcQ",
            "www.youtube.com/watch?v=dQw4w9WgXcQ",
            "youtube.com/watch?v=dQw4w9WgXcQ",
            "https://youtu.be/dQw4w9WgXcQ",
            "youtu.be/dQw4w9WgXcQ?si=abc",
            "https://www.youtube.com/embed/dQw4w9WgXcQ",
            "https://www.youtube-nocookie.com/embed/dQw4w9WgXcQ",
            "https://www.youtube.com/v/dQw4w9WgXcQ",
            "https://www.youtube.com/shorts/dQw4w9WgXcQ",
            "https://www.youtube.com/attribution_link?a=x&u=/watch?v=dQw4w9WgXcQ",
            "https://www.youtube.com/watch?feature=share&v=dQw4w9WgXcQ",
            "https://m.youtube.com/watch?v=dQw4w9WgXcQ",
        ];
        for url in shapes {
            assert_eq!(id(url), Some("dQw4w9WgXcQ".to_string()), "failed on {url}");
        }
    }

    #[test]
    fn test_id_with_underscore_and_dash() {
        assert_eq!(id("https://youtu.be/a_b-c_d-e_f"), Some("a_b-c_d-e_f".to_string()));
    }

    #[test]
    fn test_missing_identifier() {
        assert_eq!(id("https://www.youtube.com/watch?v="), None);
        assert_eq!(id("https://www.youtube.com/"), None);
    }

    #[test]
    fn test_wrong_length_token() {
        assert_eq!(id("https://youtu.be/dQw4w9"), None);
        assert_eq!(id("https://www.youtube.com/watch?v=dQw4w9WgXcQXYZ"), None);
    }

    #[test]
    fn test_other_host() {
        assert_eq!(id("https://vimeo.com/watch?v=dQw4w9WgXcQ"), None);
    }

    #[test]
    fn test_invalid_url() {
        assert_eq!(id("not-a-valid-id"), None);
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(id(""), None);
    }

    #[test]
    fn test_whitespace_trimming() {
        assert_eq!(id("  dQw4w9WgXcQ  "), Some("dQw4w9WgXcQ".to_string()));
    }

    #[test]
    fn test_watch_url_format() {
        let video = extract_video_id("dQw4w9WgXcQ").unwrap();
        assert_eq!(video.watch_url(), "https://www.youtube.com/watch?v=dQw4w9WgXcQ");
    }

    #[test]
    fn test_transcript_result_synthetic_flag() {
        assert!(TranscriptResult::new("x", TranscriptSource::Synthetic).synthetic);
        assert!(!TranscriptResult::new("x", TranscriptSource::Caption).synthetic);
    }
}
