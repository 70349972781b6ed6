use std::path::PathBuf;

use eyre::Result;
use log::debug;

use crate::{TranscriptResult, VideoRef};

fn cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from(".cache"))
        .join("ytquiz")
        .join("manual")
}

/// Transcripts pasted by the user, kept per video so retries don't ask again
#[derive(Debug, Clone)]
pub struct ManualStore {
    dir: PathBuf,
}

impl Default for ManualStore {
    fn default() -> Self {
        Self { dir: cache_dir() }
    }
}

impl ManualStore {
    pub fn at(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, video: &VideoRef) -> PathBuf {
        self.dir.join(format!("{video}.json"))
    }

    /// Load a saved transcript, if available.
    pub fn load(&self, video: &VideoRef) -> Option<TranscriptResult> {
        let path = self.path(video);
        let data = std::fs::read_to_string(&path).ok()?;
        let transcript: TranscriptResult = serde_json::from_str(&data).ok()?;
        debug!("Cache hit: {}", path.display());
        Some(transcript)
    }

    /// Save a transcript for later runs.
    pub fn save(&self, video: &VideoRef, transcript: &TranscriptResult) -> Result<()> {
        let path = self.path(video);
        std::fs::create_dir_all(&self.dir)?;
        let data = serde_json::to_string_pretty(transcript)?;
        std::fs::write(&path, data)?;
        debug!("Cached transcript: {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TranscriptSource;

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = ManualStore::at(dir.path().join("nested"));
        let video = crate::extract_video_id("dQw4w9WgXcQ").unwrap();
        let transcript = TranscriptResult::new("texto colado", TranscriptSource::Manual);

        assert!(store.load(&video).is_none());
        store.save(&video, &transcript).unwrap();
        assert_eq!(store.load(&video), Some(transcript));
    }

    #[test]
    fn test_corrupt_entry_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let store = ManualStore::at(dir.path());
        let video = crate::extract_video_id("dQw4w9WgXcQ").unwrap();
        std::fs::write(dir.path().join("dQw4w9WgXcQ.json"), "{not json").unwrap();
        assert!(store.load(&video).is_none());
    }
}
