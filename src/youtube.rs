use std::time::Duration;

use eyre::{Result, bail};
use log::debug;
use regex::Regex;
use serde::Deserialize;

use crate::{TranscriptResult, TranscriptSource, VideoRef};

pub const YOUTUBE_BASE_URL: &str = "https://www.youtube.com";

pub(crate) const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";

#[derive(Debug, Deserialize)]
struct InnerTubePlayerResponse {
    captions: Option<CaptionsData>,
    #[serde(rename = "videoDetails")]
    video_details: Option<VideoDetails>,
}

#[derive(Debug, Deserialize)]
struct VideoDetails {
    title: Option<String>,
    #[serde(rename = "shortDescription")]
    short_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CaptionsData {
    #[serde(rename = "playerCaptionsTracklistRenderer")]
    player_captions_tracklist_renderer: Option<CaptionTracklistRenderer>,
}

#[derive(Debug, Deserialize)]
struct CaptionTracklistRenderer {
    #[serde(rename = "captionTracks")]
    caption_tracks: Option<Vec<CaptionTrack>>,
}

#[derive(Debug, Deserialize)]
struct CaptionTrack {
    #[serde(rename = "baseUrl")]
    base_url: String,
    #[serde(rename = "languageCode")]
    language_code: String,
    /// "asr" for auto-generated tracks
    kind: Option<String>,
}

/// Title and description of a video
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VideoMetadata {
    pub title: String,
    pub description: String,
}

/// True if `code` is `lang` or a regional variant of it (pt matches pt-BR)
pub(crate) fn language_matches(code: &str, lang: &str) -> bool {
    code.eq_ignore_ascii_case(lang)
        || code
            .get(..lang.len() + 1)
            .is_some_and(|prefix| prefix.eq_ignore_ascii_case(&format!("{lang}-")))
}

async fn fetch_player(
    client: &reqwest::Client,
    base_url: &str,
    video: &VideoRef,
    lang: &str,
    timeout: Duration,
) -> Result<InnerTubePlayerResponse> {
    // Step 1: Fetch the watch page to get the InnerTube API key
    let base_url = base_url.trim_end_matches('/');
    let watch_url = format!("{base_url}/watch?v={video}");
    debug!("Fetching watch page: {watch_url}");

    let page_html = client
        .get(&watch_url)
        .header("User-Agent", USER_AGENT)
        .timeout(timeout)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;

    let api_key = extract_api_key(&page_html)?;
    debug!("Extracted InnerTube API key: {api_key}");

    // Step 2: Call InnerTube player endpoint
    let player_url = format!("{base_url}/youtubei/v1/player?key={api_key}&prettyPrint=false");

    let body = serde_json::json!({
        "context": {
            "client": {
                "hl": lang,
                "gl": "US",
                "clientName": "WEB",
                "clientVersion": "2.20241126.01.00"
            }
        },
        "videoId": video.as_str()
    });

    let resp = client
        .post(&player_url)
        .header("User-Agent", USER_AGENT)
        .header("Content-Type", "application/json")
        .timeout(timeout)
        .json(&body)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    Ok(resp)
}

/// Fetch the transcript from YouTube's own caption track in `lang`.
///
/// Unlike a generic extractor this never substitutes another language; the
/// acquisition chain asks for the fallback language as a separate step.
pub async fn fetch_captions(
    client: &reqwest::Client,
    base_url: &str,
    video: &VideoRef,
    lang: &str,
    timeout: Duration,
) -> Result<TranscriptResult> {
    let resp = fetch_player(client, base_url, video, lang, timeout).await?;

    let tracks = resp
        .captions
        .and_then(|c| c.player_captions_tracklist_renderer)
        .and_then(|r| r.caption_tracks)
        .unwrap_or_default();

    if tracks.is_empty() {
        bail!("no captions available for video {video}");
    }

    let Some(track) = select_track(&tracks, lang) else {
        let available: Vec<&str> = tracks.iter().map(|t| t.language_code.as_str()).collect();
        bail!("no '{lang}' caption track (available: {})", available.join(", "));
    };

    debug!("Using caption track: lang={} kind={:?}", track.language_code, track.kind);

    // Step 3: Fetch the caption XML
    let caption_xml = client
        .get(&track.base_url)
        .header("User-Agent", USER_AGENT)
        .timeout(timeout)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;

    let lines = parse_caption_xml(&caption_xml)?;
    if lines.is_empty() {
        bail!("caption track '{}' is empty", track.language_code);
    }

    Ok(TranscriptResult::new(lines.join(" "), TranscriptSource::Caption).with_language(&track.language_code))
}

/// Fetch only the title and description of a video
pub async fn fetch_metadata(
    client: &reqwest::Client,
    base_url: &str,
    video: &VideoRef,
    lang: &str,
    timeout: Duration,
) -> Result<VideoMetadata> {
    let resp = fetch_player(client, base_url, video, lang, timeout).await?;
    let details = resp
        .video_details
        .ok_or_else(|| eyre::eyre!("no video details returned for {video}"))?;

    let metadata = VideoMetadata {
        title: details.title.unwrap_or_default(),
        description: details.short_description.unwrap_or_default(),
    };
    if metadata.title.trim().is_empty() {
        bail!("video {video} has no title");
    }
    Ok(metadata)
}

// Creator-uploaded tracks before auto-generated ones
fn select_track<'a>(tracks: &'a [CaptionTrack], lang: &str) -> Option<&'a CaptionTrack> {
    let matching = || tracks.iter().filter(|t| language_matches(&t.language_code, lang));
    matching()
        .find(|t| t.kind.as_deref() != Some("asr"))
        .or_else(|| matching().next())
}

fn extract_api_key(html: &str) -> Result<String> {
    let re = Regex::new(r#""INNERTUBE_API_KEY"\s*:\s*"([^"]+)""#)?;
    if let Some(caps) = re.captures(html) {
        return Ok(caps[1].to_string());
    }

    // Fallback: try the newer pattern
    let re2 = Regex::new(r#"innertubeApiKey\s*[=:]\s*"([^"]+)""#)?;
    if let Some(caps) = re2.captures(html) {
        return Ok(caps[1].to_string());
    }

    bail!("could not extract InnerTube API key from watch page");
}

/// Text of every cue in a timed-text document (`<text>` in format 1, `<p>` in srv3)
fn parse_caption_xml(xml: &str) -> Result<Vec<String>> {
    use quick_xml::Reader;
    use quick_xml::events::Event;

    let mut reader = Reader::from_str(xml);
    let mut lines = Vec::new();
    let mut current: Option<String> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) if matches!(e.name().as_ref(), b"text" | b"p") => {
                current = Some(String::new());
            }
            Ok(Event::End(ref e)) if matches!(e.name().as_ref(), b"text" | b"p") => {
                if let Some(raw) = current.take() {
                    let text = html_escape::decode_html_entities(&raw).replace('\n', " ");
                    let text = text.trim();
                    if !text.is_empty() {
                        lines.push(text.to_string());
                    }
                }
            }
            Ok(Event::Text(ref e)) => {
                if let Some(buf) = current.as_mut() {
                    buf.push_str(&e.unescape().unwrap_or_default());
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => bail!("error parsing caption XML: {e}"),
            _ => {}
        }
    }

    Ok(lines)
}
