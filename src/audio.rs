use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::Duration;

use eyre::{Result, bail};
use log::debug;

use crate::VideoRef;

fn work_dir() -> PathBuf {
    std::env::temp_dir().join("ytquiz")
}

/// Download the audio track of a video as mp3 via yt-dlp
pub fn download_audio(video: &VideoRef, socket_timeout: Duration) -> Result<PathBuf> {
    let dir = work_dir();
    std::fs::create_dir_all(&dir)?;

    let output_template = dir.join(format!("{video}.%(ext)s"));
    let output_path = dir.join(format!("{video}.mp3"));

    // Reuse existing file on retry (avoid re-downloading after API errors)
    if output_path.exists() {
        debug!(
            "Audio file already exists, skipping download: {}",
            output_path.display()
        );
        return Ok(output_path);
    }

    let url = video.watch_url();
    debug!("Downloading audio via yt-dlp: {url}");

    let status = Command::new("yt-dlp")
        .args([
            "--extract-audio",
            "--audio-format",
            "mp3",
            "--audio-quality",
            "9", // lowest quality = smallest file (speech doesn't need high quality)
            "--no-playlist",
            "--socket-timeout",
            &socket_timeout.as_secs().to_string(),
            "-o",
            &output_template.to_string_lossy(),
            &url,
        ])
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .status();

    match status {
        Ok(s) if s.success() => {}
        Ok(s) => bail!("yt-dlp exited with status {s}"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            bail!(
                "yt-dlp not found. Install it to enable audio transcription:\n  \
                 pip install yt-dlp\n  \
                 or: brew install yt-dlp"
            );
        }
        Err(e) => bail!("failed to run yt-dlp: {e}"),
    }

    if !output_path.exists() {
        bail!("yt-dlp did not produce expected output file: {}", output_path.display());
    }

    Ok(output_path)
}

/// [`download_audio`] on the blocking pool, for use from async code
pub async fn download(video: &VideoRef, socket_timeout: Duration) -> Result<PathBuf> {
    let video = video.clone();
    tokio::task::spawn_blocking(move || download_audio(&video, socket_timeout)).await?
}

/// [`split_audio`] on the blocking pool
pub async fn split(audio_path: &Path, segment_secs: u64) -> Result<Vec<PathBuf>> {
    let audio_path = audio_path.to_path_buf();
    tokio::task::spawn_blocking(move || split_audio(&audio_path, segment_secs)).await?
}

/// Remove every scratch file (download, WAV, segments, chunks) left for `video`
pub fn discard(video: &VideoRef) -> Result<usize> {
    discard_in(&work_dir(), video)
}

fn discard_in(dir: &Path, video: &VideoRef) -> Result<usize> {
    if !dir.is_dir() {
        return Ok(0);
    }
    let files = list_segments(dir, video.as_str())?;
    for path in &files {
        std::fs::remove_file(path)?;
    }
    debug!("Removed {} scratch files for {video}", files.len());
    Ok(files.len())
}

fn run_ffmpeg(args: &[&str]) -> Result<()> {
    let status = Command::new("ffmpeg")
        .args(["-hide_banner", "-loglevel", "error", "-y"])
        .args(args)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();

    match status {
        Ok(s) if s.success() => Ok(()),
        Ok(s) => bail!("ffmpeg exited with status {s}"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => bail!("ffmpeg not found"),
        Err(e) => bail!("failed to run ffmpeg: {e}"),
    }
}

/// Split an audio file into consecutive segments of `segment_secs` seconds.
///
/// Segments are written next to the source as `<stem>-seg<N>.<ext>` and
/// returned in playback order.
pub fn split_audio(audio_path: &Path, segment_secs: u64) -> Result<Vec<PathBuf>> {
    if segment_secs == 0 {
        bail!("segment length must be positive");
    }

    let dir = audio_path.parent().unwrap_or_else(|| Path::new("."));
    let stem = audio_path.file_stem().unwrap_or_default().to_string_lossy().to_string();
    let ext = audio_path
        .extension()
        .map(|e| e.to_string_lossy().to_string())
        .unwrap_or_else(|| "mp3".to_string());
    let prefix = format!("{stem}-seg{segment_secs}-");

    // Leftovers from an earlier split with the same prefix would be picked up below
    remove_segments(dir, &prefix)?;

    let pattern = dir.join(format!("{prefix}%03d.{ext}"));
    debug!("Splitting {} into {segment_secs}s segments", audio_path.display());

    run_ffmpeg(&[
        "-i",
        &audio_path.to_string_lossy(),
        "-f",
        "segment",
        "-segment_time",
        &segment_secs.to_string(),
        "-c",
        "copy",
        &pattern.to_string_lossy(),
    ])?;

    let segments = list_segments(dir, &prefix)?;
    if segments.is_empty() {
        bail!("ffmpeg produced no segments for {}", audio_path.display());
    }
    debug!("Produced {} segments", segments.len());
    Ok(segments)
}

fn list_segments(dir: &Path, prefix: &str) -> Result<Vec<PathBuf>> {
    let mut segments: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with(prefix))
        })
        .collect();
    // Zero-padded indices sort lexically
    segments.sort();
    Ok(segments)
}

fn remove_segments(dir: &Path, prefix: &str) -> Result<()> {
    for path in list_segments(dir, prefix)? {
        std::fs::remove_file(path)?;
    }
    Ok(())
}

/// Convert audio to the 16 kHz mono WAV whisper.cpp expects
pub fn to_wav_16k(audio_path: &Path) -> Result<PathBuf> {
    let wav_path = audio_path.with_extension("16k.wav");
    if wav_path.exists() {
        return Ok(wav_path);
    }
    run_ffmpeg(&[
        "-i",
        &audio_path.to_string_lossy(),
        "-ar",
        "16000",
        "-ac",
        "1",
        "-c:a",
        "pcm_s16le",
        &wav_path.to_string_lossy(),
    ])?;
    Ok(wav_path)
}
