//! Caption lookups through third-party YouTube front ends (Invidious, Piped).

use std::sync::LazyLock;
use std::time::Duration;

use eyre::{Result, bail};
use log::{debug, warn};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::youtube::{USER_AGENT, language_matches};
use crate::{TranscriptResult, TranscriptSource, VideoRef};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MirrorKind {
    Invidious,
    Piped,
}

/// A mirror instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mirror {
    pub kind: MirrorKind,
    pub url: String,
}

impl Mirror {
    pub fn invidious(url: impl Into<String>) -> Self {
        Self {
            kind: MirrorKind::Invidious,
            url: url.into(),
        }
    }

    pub fn piped(url: impl Into<String>) -> Self {
        Self {
            kind: MirrorKind::Piped,
            url: url.into(),
        }
    }

    fn base(&self) -> &str {
        self.url.trim_end_matches('/')
    }
}

pub fn default_mirrors() -> Vec<Mirror> {
    vec![
        Mirror::invidious("https://inv.nadeko.net"),
        Mirror::invidious("https://yewtu.be"),
        Mirror::piped("https://pipedapi.kavin.rocks"),
    ]
}

#[derive(Debug, Deserialize)]
struct InvidiousCaptions {
    #[serde(default)]
    captions: Vec<InvidiousCaption>,
}

#[derive(Debug, Deserialize)]
struct InvidiousCaption {
    #[serde(rename = "languageCode")]
    language_code: String,
    url: String,
}

#[derive(Debug, Deserialize)]
struct PipedStreams {
    #[serde(default)]
    subtitles: Vec<PipedSubtitle>,
}

#[derive(Debug, Deserialize)]
struct PipedSubtitle {
    url: String,
    code: String,
    #[serde(rename = "autoGenerated", default)]
    auto_generated: bool,
}

/// A caption track advertised by a mirror, with an absolute URL
#[derive(Debug, Clone, PartialEq, Eq)]
struct MirrorTrack {
    language: String,
    url: String,
    auto_generated: bool,
}

/// Try each mirror in order; within a mirror, try `langs` in order
pub async fn fetch_captions(
    client: &reqwest::Client,
    mirrors: &[Mirror],
    video: &VideoRef,
    langs: &[&str],
    timeout: Duration,
) -> Result<TranscriptResult> {
    if mirrors.is_empty() {
        bail!("no mirrors configured");
    }

    let mut errors = Vec::new();
    for mirror in mirrors {
        match fetch_from_mirror(client, mirror, video, langs, timeout).await {
            Ok(result) => return Ok(result),
            Err(e) => {
                warn!("Mirror {} failed: {e}", mirror.url);
                errors.push(format!("{}: {e}", mirror.base()));
            }
        }
    }

    bail!("all mirrors failed ({})", errors.join("; "));
}

async fn fetch_from_mirror(
    client: &reqwest::Client,
    mirror: &Mirror,
    video: &VideoRef,
    langs: &[&str],
    timeout: Duration,
) -> Result<TranscriptResult> {
    let tracks = list_tracks(client, mirror, video, timeout).await?;
    if tracks.is_empty() {
        bail!("no caption tracks listed");
    }

    let Some(track) = pick_track(&tracks, langs) else {
        bail!("no track in {}", langs.join("/"));
    };
    debug!("Mirror {} track: lang={} url={}", mirror.base(), track.language, track.url);

    let vtt = client
        .get(&track.url)
        .header("User-Agent", USER_AGENT)
        .timeout(timeout)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;

    let text = vtt_to_text(&vtt);
    if text.is_empty() {
        bail!("caption track '{}' is empty", track.language);
    }

    Ok(TranscriptResult::new(text, TranscriptSource::Mirror).with_language(&track.language))
}

async fn list_tracks(
    client: &reqwest::Client,
    mirror: &Mirror,
    video: &VideoRef,
    timeout: Duration,
) -> Result<Vec<MirrorTrack>> {
    let base = mirror.base();
    let url = match mirror.kind {
        MirrorKind::Invidious => format!("{base}/api/v1/captions/{video}"),
        MirrorKind::Piped => format!("{base}/streams/{video}"),
    };
    debug!("Listing mirror captions: {url}");

    let resp = client
        .get(&url)
        .header("User-Agent", USER_AGENT)
        .timeout(timeout)
        .send()
        .await?
        .error_for_status()?;

    let tracks = match mirror.kind {
        MirrorKind::Invidious => {
            let body: InvidiousCaptions = resp.json().await?;
            body.captions
                .into_iter()
                .map(|c| MirrorTrack {
                    // Invidious returns paths relative to the instance
                    url: absolute_url(base, &c.url),
                    language: c.language_code,
                    auto_generated: false,
                })
                .collect()
        }
        MirrorKind::Piped => {
            let body: PipedStreams = resp.json().await?;
            body.subtitles
                .into_iter()
                .map(|s| MirrorTrack {
                    url: absolute_url(base, &s.url),
                    language: s.code,
                    auto_generated: s.auto_generated,
                })
                .collect()
        }
    };

    Ok(tracks)
}

fn absolute_url(base: &str, url: &str) -> String {
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("{base}/{}", url.trim_start_matches('/'))
    }
}

fn pick_track<'a>(tracks: &'a [MirrorTrack], langs: &[&str]) -> Option<&'a MirrorTrack> {
    langs.iter().find_map(|lang| {
        let matching = || tracks.iter().filter(|t| language_matches(&t.language, lang));
        matching().find(|t| !t.auto_generated).or_else(|| matching().next())
    })
}

static VTT_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").unwrap());

/// WebVTT to plain text.
///
/// Only lines inside a cue (after its `-->` timing line, up to the next blank
/// line) are text; the header, NOTE/STYLE blocks and cue ids are dropped.
/// Inline tags are stripped and the repeated lines rolling auto-captions
/// produce are collapsed.
pub fn vtt_to_text(vtt: &str) -> String {
    let mut lines: Vec<String> = Vec::new();
    let mut in_cue = false;

    for line in vtt.lines() {
        let l = line.trim();
        if l.is_empty() {
            in_cue = false;
            continue;
        }
        if l.contains("-->") {
            in_cue = true;
            continue;
        }
        if !in_cue {
            continue;
        }

        let cleaned = VTT_TAG.replace_all(l, "");
        let cleaned = html_escape::decode_html_entities(&cleaned);
        let cleaned = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
        if cleaned.is_empty() || lines.last() == Some(&cleaned) {
            continue;
        }
        lines.push(cleaned);
    }

    lines.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const VTT: &str = "WEBVTT\nKind: captions\nLanguage: pt\n\nNOTE gerado\nautomaticamente\n\n1\n00:00:00.000 --> 00:00:02.000\nOlá <c>pessoal</c>\n\n2\n00:00:02.000 --> 00:00:04.000\nOlá pessoal\nhoje vamos falar de Rust &amp; C\n";

    fn video() -> VideoRef {
        crate::extract_video_id("dQw4w9WgXcQ").unwrap()
    }

    #[test]
    fn test_vtt_to_text() {
        assert_eq!(vtt_to_text(VTT), "Olá pessoal hoje vamos falar de Rust & C");
    }

    #[test]
    fn test_vtt_keeps_numeric_cue_text() {
        let vtt = "WEBVTT\n\n00:00:00.000 --> 00:00:01.000\nO ano foi\n\n00:00:01.000 --> 00:00:02.000\n1964\n";
        assert_eq!(vtt_to_text(vtt), "O ano foi 1964");
    }

    #[test]
    fn test_vtt_drops_named_cue_ids() {
        let vtt = "WEBVTT\n\nintro\n00:00:00.000 --> 00:00:01.000\nBem-vindos\n\n42\n00:00:01.000 --> 00:00:02.000\nà aula 42\n";
        assert_eq!(vtt_to_text(vtt), "Bem-vindos à aula 42");
    }

    #[test]
    fn test_vtt_to_text_empty() {
        assert_eq!(vtt_to_text("WEBVTT\n\n"), "");
    }

    #[test]
    fn test_absolute_url() {
        assert_eq!(
            absolute_url("https://inv.example", "/api/v1/captions/x?label=pt"),
            "https://inv.example/api/v1/captions/x?label=pt"
        );
        assert_eq!(absolute_url("https://a", "https://b/c"), "https://b/c");
    }

    #[test]
    fn test_pick_track_prefers_primary_language() {
        let tracks = vec![
            MirrorTrack {
                language: "en".to_string(),
                url: "en".to_string(),
                auto_generated: false,
            },
            MirrorTrack {
                language: "pt-BR".to_string(),
                url: "pt".to_string(),
                auto_generated: true,
            },
        ];
        assert_eq!(pick_track(&tracks, &["pt", "en"]).unwrap().url, "pt");
        assert_eq!(pick_track(&tracks, &["es", "en"]).unwrap().url, "en");
        assert!(pick_track(&tracks, &["es"]).is_none());
    }

    #[tokio::test]
    async fn test_invidious_mirror() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/captions/dQw4w9WgXcQ"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "captions": [
                    {"label": "English", "languageCode": "en", "url": "/api/v1/captions/dQw4w9WgXcQ?label=English"},
                    {"label": "Portuguese", "languageCode": "pt", "url": "/vtt/pt"}
                ]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/vtt/pt"))
            .respond_with(ResponseTemplate::new(200).set_body_string(VTT))
            .mount(&server)
            .await;

        let mirrors = vec![Mirror::invidious(server.uri())];
        let result = fetch_captions(&reqwest::Client::new(), &mirrors, &video(), &["pt", "en"], Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(result.source, TranscriptSource::Mirror);
        assert_eq!(result.language.as_deref(), Some("pt"));
        assert!(!result.synthetic);
        assert!(result.text.starts_with("Olá pessoal"));
    }

    #[tokio::test]
    async fn test_falls_through_to_next_mirror() {
        let broken = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&broken)
            .await;

        let piped = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/streams/dQw4w9WgXcQ"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "subtitles": [
                    {"url": format!("{}/subs/en.vtt", piped.uri()), "code": "en", "mimeType": "text/vtt", "autoGenerated": false}
                ]
            })))
            .mount(&piped)
            .await;
        Mock::given(method("GET"))
            .and(path("/subs/en.vtt"))
            .respond_with(ResponseTemplate::new(200).set_body_string("WEBVTT\n\n00:00.000 --> 00:01.000\nhello there\n"))
            .mount(&piped)
            .await;

        let mirrors = vec![Mirror::invidious(broken.uri()), Mirror::piped(piped.uri())];
        let result = fetch_captions(&reqwest::Client::new(), &mirrors, &video(), &["pt", "en"], Duration::from_secs(5))
            .await
            .unwrap();
        assert_eq!(result.text, "hello there");
        assert_eq!(result.language.as_deref(), Some("en"));
    }

    #[tokio::test]
    async fn test_all_mirrors_fail() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({"captions": []})))
            .mount(&server)
            .await;

        let mirrors = vec![Mirror::invidious(server.uri())];
        let err = fetch_captions(&reqwest::Client::new(), &mirrors, &video(), &["pt"], Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("all mirrors failed"));
    }
}
