use std::path::{Path, PathBuf};
use std::time::Duration;

use eyre::{Result, bail};
use log::debug;
use reqwest::multipart;

use crate::audio;
use crate::{TranscriptResult, TranscriptSource};

/// Maximum file size for a single transcription upload (25 MB)
const MAX_UPLOAD_BYTES: u64 = 25 * 1024 * 1024;

/// Chunk length when a file is over the upload limit; ~20 minutes stays under 25 MB at 64 kbps
const CHUNK_SECS: u64 = 1200;

/// Cloud transcription model
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum WhisperModel {
    Gpt4oMiniTranscribe,
    Gpt4oTranscribe,
    #[default]
    Whisper1,
}

impl WhisperModel {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "gpt-4o-mini-transcribe" => Some(WhisperModel::Gpt4oMiniTranscribe),
            "gpt-4o-transcribe" => Some(WhisperModel::Gpt4oTranscribe),
            "whisper-1" => Some(WhisperModel::Whisper1),
            _ => None,
        }
    }

    fn api_name(&self) -> &str {
        match self {
            WhisperModel::Gpt4oMiniTranscribe => "gpt-4o-mini-transcribe",
            WhisperModel::Gpt4oTranscribe => "gpt-4o-transcribe",
            WhisperModel::Whisper1 => "whisper-1",
        }
    }
}

/// Transcribe a downloaded audio file with the OpenAI transcription API.
///
/// `timeout` bounds each upload request as a whole; the shared client carries
/// the short connect bound.
pub async fn transcribe(
    client: &reqwest::Client,
    api_key: &str,
    audio_path: &Path,
    lang: &str,
    model: &WhisperModel,
    endpoint: &str,
    timeout: Duration,
) -> Result<TranscriptResult> {
    let upload = Upload {
        client,
        api_key,
        model,
        lang,
        endpoint,
        timeout,
    };

    let file_size = std::fs::metadata(audio_path)?.len();
    debug!("Audio file size: {file_size} bytes");

    let text = if file_size > MAX_UPLOAD_BYTES {
        let chunks = audio::split(audio_path, CHUNK_SECS).await?;
        upload.chunks(&chunks).await?
    } else {
        upload.file(audio_path).await?
    };

    if text.trim().is_empty() {
        bail!("transcription returned no text");
    }

    Ok(TranscriptResult::new(text, TranscriptSource::CloudStt).with_language(lang))
}

struct Upload<'a> {
    client: &'a reqwest::Client,
    api_key: &'a str,
    model: &'a WhisperModel,
    lang: &'a str,
    endpoint: &'a str,
    timeout: Duration,
}

impl Upload<'_> {
    /// Upload chunks in order and join their text; every chunk file is removed, even after a failure
    async fn chunks(&self, chunks: &[PathBuf]) -> Result<String> {
        debug!("Uploading {} chunks", chunks.len());

        let mut parts = Vec::with_capacity(chunks.len());
        let mut failure = None;
        for chunk in chunks {
            match self.file(chunk).await {
                Ok(text) => parts.push(text),
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }

        for chunk in chunks {
            let _ = std::fs::remove_file(chunk);
        }

        match failure {
            Some(e) => Err(e),
            None => Ok(parts.join(" ")),
        }
    }

    async fn file(&self, audio_path: &Path) -> Result<String> {
        debug!("Uploading {} to {}", audio_path.display(), self.endpoint);

        let file_bytes = std::fs::read(audio_path)?;
        let file_name = audio_path.file_name().unwrap_or_default().to_string_lossy().to_string();

        let file_part = multipart::Part::bytes(file_bytes)
            .file_name(file_name)
            .mime_str("audio/mpeg")?;

        let form = multipart::Form::new()
            .part("file", file_part)
            .text("model", self.model.api_name().to_string())
            .text("language", self.lang.to_string())
            .text("response_format", "json");

        let resp = self
            .client
            .post(self.endpoint)
            .bearer_auth(self.api_key)
            .timeout(self.timeout)
            .multipart(form)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            bail!("transcription API returned {status}: {body}");
        }

        let json: serde_json::Value = resp.json().await?;
        parse_whisper_response(&json)
    }
}

fn parse_whisper_response(json: &serde_json::Value) -> Result<String> {
    // verbose_json format has a "segments" array
    if let Some(segments) = json.get("segments").and_then(|s| s.as_array()) {
        return Ok(segments
            .iter()
            .filter_map(|seg| seg.get("text")?.as_str().map(str::trim))
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" "));
    }

    if let Some(text) = json.get("text").and_then(|t| t.as_str()) {
        return Ok(text.trim().to_string());
    }

    bail!("unexpected transcription API response format");
}
