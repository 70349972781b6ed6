//! The transcript acquisition chain.
//!
//! A [`Chain`] is an ordered list of [`Strategy`] objects. [`Chain::acquire`]
//! runs them one at a time and returns the first non-empty transcript. A
//! failing strategy is logged and recorded, never propagated, so the next one
//! still runs; only when every strategy has failed does the caller see an
//! error.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use eyre::{Result, bail};
use log::{debug, info, warn};

use crate::cache::ManualStore;
use crate::capabilities::{Capabilities, OfflineBackend};
use crate::config::{self, Config};
use crate::error::StrategyFailure;
use crate::llm::Llm;
use crate::mirror::{self, Mirror};
use crate::whisper::WhisperModel;
use crate::{QuizError, TranscriptResult, TranscriptSource, VideoRef, audio, offline, synthetic, whisper, youtube};

const OPENAI_TRANSCRIPTION_URL: &str = "https://api.openai.com/v1/audio/transcriptions";

/// One way of obtaining a transcript
#[async_trait]
pub trait Strategy: Send + Sync {
    fn name(&self) -> String;

    async fn attempt(&self, video: &VideoRef) -> Result<TranscriptResult>;
}

/// A transcript together with how it was obtained
#[derive(Debug, Clone)]
pub struct Acquisition {
    pub transcript: TranscriptResult,
    pub strategy: String,
    /// Strategies that failed before this one succeeded
    pub failures: Vec<StrategyFailure>,
}

pub struct Chain {
    strategies: Vec<Box<dyn Strategy>>,
}

impl Chain {
    pub fn new(strategies: Vec<Box<dyn Strategy>>) -> Self {
        Self { strategies }
    }

    /// The default fallback order, keeping only strategies the capabilities allow
    pub fn standard(
        http: reqwest::Client,
        settings: ChainSettings,
        caps: &Capabilities,
        llm: Option<Arc<dyn Llm>>,
        manual: ManualStrategy,
    ) -> Self {
        let settings = Arc::new(settings);
        let mut strategies: Vec<Box<dyn Strategy>> = vec![
            Box::new(CaptionStrategy {
                http: http.clone(),
                lang: settings.primary_lang.clone(),
                settings: settings.clone(),
            }),
            Box::new(CaptionStrategy {
                http: http.clone(),
                lang: settings.fallback_lang.clone(),
                settings: settings.clone(),
            }),
            Box::new(MirrorStrategy {
                http: http.clone(),
                settings: settings.clone(),
            }),
        ];

        match &caps.cloud_stt_key {
            Some(key) if caps.cloud_stt() => strategies.push(Box::new(CloudSttStrategy {
                http: http.clone(),
                api_key: key.clone(),
                settings: settings.clone(),
            })),
            _ => debug!("Cloud speech-to-text disabled"),
        }

        match &caps.offline {
            Some(backend) if caps.offline_stt() => strategies.push(Box::new(OfflineSttStrategy {
                backend: backend.clone(),
                settings: settings.clone(),
            })),
            _ => debug!("Offline speech-to-text disabled"),
        }

        if let Some(llm) = &llm {
            if caps.llm_audio_stt() {
                strategies.push(Box::new(LlmAudioStrategy {
                    llm: llm.clone(),
                    settings: settings.clone(),
                }));
            } else {
                debug!("LLM audio transcription disabled");
            }
            strategies.push(Box::new(SyntheticStrategy {
                http: http.clone(),
                llm: llm.clone(),
                settings: settings.clone(),
            }));
        }

        strategies.push(Box::new(manual));
        Self::new(strategies)
    }

    pub fn names(&self) -> Vec<String> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Try each strategy in order and return the first non-empty transcript
    pub async fn acquire(&self, video: &VideoRef) -> Result<Acquisition, QuizError> {
        let mut failures = Vec::new();

        for strategy in &self.strategies {
            let name = strategy.name();
            info!("Trying {name} for {video}");

            let reason = match strategy.attempt(video).await {
                Ok(transcript) if !transcript.text.trim().is_empty() => {
                    info!(
                        "Transcript from {name}: {} words, synthetic={}",
                        transcript.word_count(),
                        transcript.synthetic
                    );
                    return Ok(Acquisition {
                        transcript,
                        strategy: name,
                        failures,
                    });
                }
                Ok(_) => "returned an empty transcript".to_string(),
                Err(e) => format!("{e:#}"),
            };

            warn!("{name} failed: {reason}");
            failures.push(StrategyFailure { strategy: name, reason });
        }

        Err(QuizError::TranscriptUnavailable { failures })
    }
}

/// Settings shared by the standard strategies
#[derive(Debug, Clone)]
pub struct ChainSettings {
    pub primary_lang: String,
    pub fallback_lang: String,
    /// Per-request bound for caption, mirror and metadata calls; also the connect bound
    pub timeout: Duration,
    /// Whole-request bound for one transcription upload
    pub stt_timeout: Duration,
    pub youtube_base_url: String,
    pub mirrors: Vec<Mirror>,
    pub segment_secs: u64,
    pub stt_model: WhisperModel,
    pub stt_endpoint: String,
}

impl ChainSettings {
    /// Merge config file values over the built-in defaults
    pub fn from_config(config: &Config) -> Self {
        Self {
            primary_lang: config
                .primary_lang
                .clone()
                .unwrap_or_else(|| config::DEFAULT_PRIMARY_LANG.to_string()),
            fallback_lang: config
                .fallback_lang
                .clone()
                .unwrap_or_else(|| config::DEFAULT_FALLBACK_LANG.to_string()),
            timeout: config.http_timeout(),
            stt_timeout: config.stt_timeout(),
            youtube_base_url: youtube::YOUTUBE_BASE_URL.to_string(),
            mirrors: config.mirrors.clone().unwrap_or_else(mirror::default_mirrors),
            segment_secs: config.segment_secs(),
            stt_model: config
                .stt_model
                .as_deref()
                .and_then(WhisperModel::from_name)
                .unwrap_or_default(),
            stt_endpoint: OPENAI_TRANSCRIPTION_URL.to_string(),
        }
    }

    /// The shared HTTP client; connecting never takes longer than `timeout`
    pub fn http_client(&self) -> Result<reqwest::Client> {
        Ok(reqwest::Client::builder().connect_timeout(self.timeout).build()?)
    }
}

/// Captions from YouTube itself, in one language
pub struct CaptionStrategy {
    http: reqwest::Client,
    lang: String,
    settings: Arc<ChainSettings>,
}

#[async_trait]
impl Strategy for CaptionStrategy {
    fn name(&self) -> String {
        format!("captions ({})", self.lang)
    }

    async fn attempt(&self, video: &VideoRef) -> Result<TranscriptResult> {
        youtube::fetch_captions(
            &self.http,
            &self.settings.youtube_base_url,
            video,
            &self.lang,
            self.settings.timeout,
        )
        .await
    }
}

/// Captions through Invidious/Piped mirrors
pub struct MirrorStrategy {
    http: reqwest::Client,
    settings: Arc<ChainSettings>,
}

#[async_trait]
impl Strategy for MirrorStrategy {
    fn name(&self) -> String {
        "mirrors".to_string()
    }

    async fn attempt(&self, video: &VideoRef) -> Result<TranscriptResult> {
        let langs = [self.settings.primary_lang.as_str(), self.settings.fallback_lang.as_str()];
        mirror::fetch_captions(&self.http, &self.settings.mirrors, video, &langs, self.settings.timeout).await
    }
}

/// Downloaded audio sent to the OpenAI transcription API
pub struct CloudSttStrategy {
    http: reqwest::Client,
    api_key: String,
    settings: Arc<ChainSettings>,
}

#[async_trait]
impl Strategy for CloudSttStrategy {
    fn name(&self) -> String {
        "cloud speech-to-text".to_string()
    }

    async fn attempt(&self, video: &VideoRef) -> Result<TranscriptResult> {
        let audio_path = audio::download(video, self.settings.timeout).await?;
        whisper::transcribe(
            &self.http,
            &self.api_key,
            &audio_path,
            &self.settings.primary_lang,
            &self.settings.stt_model,
            &self.settings.stt_endpoint,
            self.settings.stt_timeout,
        )
        .await
    }
}

/// Downloaded audio transcribed locally by whisper.cpp
pub struct OfflineSttStrategy {
    backend: OfflineBackend,
    settings: Arc<ChainSettings>,
}

#[async_trait]
impl Strategy for OfflineSttStrategy {
    fn name(&self) -> String {
        "offline speech-to-text".to_string()
    }

    async fn attempt(&self, video: &VideoRef) -> Result<TranscriptResult> {
        let audio_path = audio::download(video, self.settings.timeout).await?;
        let backend = self.backend.clone();
        let lang = self.settings.primary_lang.clone();
        tokio::task::spawn_blocking(move || offline::transcribe(&backend.binary, &backend.model, &audio_path, &lang))
            .await?
    }
}

/// Downloaded audio cut into fixed-length segments, each transcribed by the generative model
pub struct LlmAudioStrategy {
    llm: Arc<dyn Llm>,
    settings: Arc<ChainSettings>,
}

impl LlmAudioStrategy {
    fn prompt(&self, index: usize, total: usize) -> String {
        format!(
            "This is segment {} of {total} of a video's audio track. Transcribe the speech verbatim in the \
             language with code \"{}\". Output only the spoken words, without timestamps, speaker labels or \
             commentary. If there is no speech, output nothing.",
            index + 1,
            self.settings.primary_lang,
        )
    }
}

#[async_trait]
impl Strategy for LlmAudioStrategy {
    fn name(&self) -> String {
        "llm audio transcription".to_string()
    }

    async fn attempt(&self, video: &VideoRef) -> Result<TranscriptResult> {
        let audio_path = audio::download(video, self.settings.timeout).await?;
        let segments = audio::split(&audio_path, self.settings.segment_secs).await?;
        let total = segments.len();

        let mut parts = Vec::with_capacity(total);
        for (i, segment) in segments.iter().enumerate() {
            let bytes = std::fs::read(segment)?;
            match self.llm.complete_with_audio(&self.prompt(i, total), &bytes, "audio/mp3").await {
                Ok(text) if !text.trim().is_empty() => parts.push(text.trim().to_string()),
                Ok(_) => debug!("Segment {} had no speech", i + 1),
                Err(e) => warn!("Segment {} of {total} failed: {e}", i + 1),
            }
            let _ = std::fs::remove_file(segment);
        }

        if parts.is_empty() {
            bail!("no segment produced any text");
        }

        Ok(TranscriptResult::new(parts.join(" "), TranscriptSource::LlmAudio).with_language(&self.settings.primary_lang))
    }
}

/// Transcript fabricated from title and description
pub struct SyntheticStrategy {
    http: reqwest::Client,
    llm: Arc<dyn Llm>,
    settings: Arc<ChainSettings>,
}

#[async_trait]
impl Strategy for SyntheticStrategy {
    fn name(&self) -> String {
        "synthetic from metadata".to_string()
    }

    async fn attempt(&self, video: &VideoRef) -> Result<TranscriptResult> {
        let metadata = youtube::fetch_metadata(
            &self.http,
            &self.settings.youtube_base_url,
            video,
            &self.settings.primary_lang,
            self.settings.timeout,
        )
        .await?;
        synthetic::fabricate(self.llm.as_ref(), &metadata, &self.settings.primary_lang).await
    }
}

/// Text supplied by the user, remembered per video
pub struct ManualStrategy {
    provided: Option<String>,
    store: ManualStore,
}

impl ManualStrategy {
    pub fn new(provided: Option<String>, store: ManualStore) -> Self {
        Self {
            provided: provided.filter(|t| !t.trim().is_empty()),
            store,
        }
    }
}

#[async_trait]
impl Strategy for ManualStrategy {
    fn name(&self) -> String {
        "manual entry".to_string()
    }

    async fn attempt(&self, video: &VideoRef) -> Result<TranscriptResult> {
        if let Some(text) = &self.provided {
            let transcript = TranscriptResult::new(text.trim(), TranscriptSource::Manual);
            if let Err(e) = self.store.save(video, &transcript) {
                warn!("Could not remember manual transcript: {e}");
            }
            return Ok(transcript);
        }

        match self.store.load(video) {
            Some(transcript) => {
                debug!("Reusing manual transcript saved earlier for {video}");
                Ok(transcript)
            }
            None => bail!("no transcript provided (pass --transcript <FILE> or - for stdin)"),
        }
    }
}
