//! Local transcription through the whisper.cpp command-line binary.

use std::path::Path;
use std::process::{Command, Stdio};

use eyre::{Result, bail};
use log::debug;

use crate::audio;
use crate::{TranscriptResult, TranscriptSource};

/// Run whisper.cpp over an audio file and return the plain-text transcript
pub fn transcribe(binary: &Path, model: &Path, audio_path: &Path, lang: &str) -> Result<TranscriptResult> {
    let wav = audio::to_wav_16k(audio_path)?;
    debug!("Running {} on {}", binary.display(), wav.display());

    let output = Command::new(binary)
        .args([
            "-m",
            &model.to_string_lossy(),
            "-f",
            &wav.to_string_lossy(),
            "-l",
            lang,
            "--no-timestamps",
        ])
        .stdin(Stdio::null())
        .output();

    let output = match output {
        Ok(o) => o,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            bail!("{} not found", binary.display())
        }
        Err(e) => bail!("failed to run {}: {e}", binary.display()),
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!(
            "{} exited with status {}: {}",
            binary.display(),
            output.status,
            stderr.lines().last().unwrap_or_default()
        );
    }

    let text = clean_output(&String::from_utf8_lossy(&output.stdout));
    if text.is_empty() {
        bail!("offline transcription produced no text");
    }

    Ok(TranscriptResult::new(text, TranscriptSource::OfflineStt).with_language(lang))
}

// whisper.cpp marks silence and noise with bracketed tags
fn clean_output(stdout: &str) -> String {
    stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !(l.starts_with('[') && l.ends_with(']')))
        .collect::<Vec<_>>()
        .join(" ")
}
