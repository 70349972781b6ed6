//! Optional transcription backends, resolved once at startup.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use log::debug;

use crate::config::Config;

const WHISPER_CPP_BINARIES: &[&str] = &["whisper-cli", "whisper-cpp"];

/// First line of `<name> <flag>` output, if the tool runs
pub fn tool_version(name: &str, flag: &str) -> Option<String> {
    Command::new(name)
        .arg(flag)
        .stdin(Stdio::null())
        .output()
        .ok()
        .filter(|o| o.status.success())
        .map(|o| {
            String::from_utf8_lossy(&o.stdout)
                .trim()
                .lines()
                .next()
                .unwrap_or("")
                .to_string()
        })
}

fn spawns(binary: &Path) -> bool {
    Command::new(binary)
        .arg("--help")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .is_ok()
}

/// A whisper.cpp binary together with a model file it can load
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfflineBackend {
    pub binary: PathBuf,
    pub model: PathBuf,
}

/// Which optional strategies the acquisition chain can use
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub yt_dlp: bool,
    pub ffmpeg: bool,
    pub cloud_stt_key: Option<String>,
    pub offline: Option<OfflineBackend>,
    /// A generative model is configured
    pub llm: bool,
    /// The configured model accepts audio input
    pub llm_audio: bool,
}

impl Capabilities {
    /// Probe the local machine and environment.
    ///
    /// `stt_key` is the explicit speech-to-text key; `OPENAI_API_KEY` is used when absent.
    pub fn detect(config: &Config, stt_key: Option<&str>, llm: bool, llm_audio: bool) -> Self {
        let yt_dlp = tool_version("yt-dlp", "--version").is_some();
        let ffmpeg = tool_version("ffmpeg", "-version").is_some();

        let cloud_stt_key = stt_key
            .map(str::to_string)
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .filter(|k| !k.trim().is_empty());

        let offline = detect_offline(config);

        let caps = Self {
            yt_dlp,
            ffmpeg,
            cloud_stt_key,
            offline,
            llm,
            llm_audio,
        };
        debug!("Capabilities: {}", caps.summary());
        caps
    }

    /// Audio download is possible
    pub fn audio(&self) -> bool {
        self.yt_dlp
    }

    pub fn cloud_stt(&self) -> bool {
        self.audio() && self.cloud_stt_key.is_some()
    }

    pub fn offline_stt(&self) -> bool {
        self.audio() && self.ffmpeg && self.offline.is_some()
    }

    pub fn llm_audio_stt(&self) -> bool {
        self.audio() && self.ffmpeg && self.llm && self.llm_audio
    }

    pub fn summary(&self) -> String {
        let flag = |on: bool| if on { "on" } else { "off" };
        format!(
            "yt-dlp={} ffmpeg={} cloud-stt={} offline-stt={} llm={} llm-audio={}",
            flag(self.yt_dlp),
            flag(self.ffmpeg),
            flag(self.cloud_stt()),
            flag(self.offline_stt()),
            flag(self.llm),
            flag(self.llm_audio_stt()),
        )
    }
}

fn detect_offline(config: &Config) -> Option<OfflineBackend> {
    let model = config.offline_model.as_ref()?;
    if !model.is_file() {
        debug!("Offline model not found: {}", model.display());
        return None;
    }

    let binary = match &config.whisper_bin {
        Some(bin) => spawns(bin).then(|| bin.clone()),
        None => WHISPER_CPP_BINARIES
            .iter()
            .map(PathBuf::from)
            .find(|bin| spawns(bin)),
    }?;

    Some(OfflineBackend {
        binary,
        model: model.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_tool_has_no_version() {
        assert_eq!(tool_version("definitely-not-a-real-tool-ytquiz", "--version"), None);
    }

    #[test]
    fn test_offline_requires_model_file() {
        let config = Config {
            offline_model: Some(PathBuf::from("/nonexistent/ggml-base.bin")),
            ..Config::default()
        };
        assert_eq!(detect_offline(&config), None);
        assert_eq!(detect_offline(&Config::default()), None);
    }

    #[test]
    fn test_offline_requires_binary() {
        let dir = tempfile::tempdir().unwrap();
        let model = dir.path().join("ggml-base.bin");
        std::fs::write(&model, b"model").unwrap();
        let config = Config {
            offline_model: Some(model),
            whisper_bin: Some(PathBuf::from("/nonexistent/whisper-cli")),
            ..Config::default()
        };
        assert_eq!(detect_offline(&config), None);
    }

    #[test]
    fn test_derived_flags() {
        let caps = Capabilities {
            yt_dlp: true,
            ffmpeg: false,
            cloud_stt_key: Some("k".to_string()),
            offline: Some(OfflineBackend {
                binary: PathBuf::from("whisper-cli"),
                model: PathBuf::from("m.bin"),
            }),
            llm: true,
            llm_audio: true,
        };
        assert!(caps.cloud_stt());
        // both need ffmpeg for conversion or splitting
        assert!(!caps.offline_stt());
        assert!(!caps.llm_audio_stt());

        let no_audio = Capabilities {
            yt_dlp: false,
            ..caps
        };
        assert!(!no_audio.cloud_stt());
    }
}
