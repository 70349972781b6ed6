//! Last-resort transcript fabricated from a video's title and description.
//!
//! The output is a plausible reconstruction, not a record of what was said,
//! so every result from here carries `synthetic = true`.

use eyre::{Result, bail};
use log::debug;

use crate::llm::Llm;
use crate::youtube::VideoMetadata;
use crate::{TranscriptResult, TranscriptSource};

/// Technology areas with dedicated prompt framing, matched against title and description
const TECH_AREAS: &[(&str, &[&str])] = &[
    (
        "programming",
        &[
            "python", "javascript", "typescript", "rust", "java", "golang", "c++", "programming", "programação",
            "programacao", "código", "codigo", "algorithm", "algoritmo", "coding",
        ],
    ),
    (
        "data science and artificial intelligence",
        &[
            "machine learning", "deep learning", "aprendizado de máquina", "inteligência artificial",
            "inteligencia artificial", "ai", "ia", "llm", "neural", "data science", "ciência de dados", "pandas",
        ],
    ),
    (
        "web development",
        &["html", "css", "react", "vue", "angular", "frontend", "backend", "api", "node.js", "nodejs"],
    ),
    (
        "cloud and infrastructure",
        &["docker", "kubernetes", "aws", "azure", "cloud", "devops", "linux", "terraform"],
    ),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topic {
    Technology(&'static str),
    General,
}

fn words(text: &str) -> Vec<String> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '+' || c == '.'))
        .map(|w| w.trim_matches('.').to_string())
        .filter(|w| !w.is_empty())
        .collect()
}

/// Pick the prompt branch for a video
pub fn classify(metadata: &VideoMetadata) -> Topic {
    let haystack = format!("{} {}", metadata.title, metadata.description).to_lowercase();
    let tokens = words(&haystack);

    TECH_AREAS
        .iter()
        .find(|(_, keywords)| {
            keywords.iter().any(|kw| {
                if kw.contains(' ') {
                    haystack.contains(kw)
                } else {
                    tokens.iter().any(|t| t == kw)
                }
            })
        })
        .map(|(area, _)| Topic::Technology(*area))
        .unwrap_or(Topic::General)
}

pub fn build_prompt(metadata: &VideoMetadata, topic: Topic, lang: &str) -> String {
    let framing = match topic {
        Topic::Technology(area) => format!(
            "You are an experienced instructor in {area}. Reconstruct the spoken content of a technical \
             video lesson: explain the concepts step by step, name the tools, commands and terms the \
             presenter would use, and include the kind of short examples a tutorial walks through."
        ),
        Topic::General => "You are an educational content writer. Reconstruct the spoken content of an \
             informative video: introduce the subject, develop its main ideas with facts and examples, \
             and close with a summary of the key points."
            .to_string(),
    };

    let description = if metadata.description.trim().is_empty() {
        "(no description)"
    } else {
        metadata.description.trim()
    };

    format!(
        "{framing}\n\n\
         Video title: {title}\n\
         Video description:\n{description}\n\n\
         Write a detailed, plausible transcript of at least 600 words, in the language with code \
         \"{lang}\", as continuous narration by the presenter. Stay strictly on the topic implied by the \
         title and description. Output only the transcript text, without headings or commentary.",
        title = metadata.title.trim(),
    )
}

/// Ask the model for a transcript reconstructed from metadata
pub async fn fabricate(llm: &dyn Llm, metadata: &VideoMetadata, lang: &str) -> Result<TranscriptResult> {
    let topic = classify(metadata);
    debug!("Synthetic transcript topic: {topic:?}");

    let text = llm.complete(&build_prompt(metadata, topic, lang)).await?;
    let text = text.trim();
    if text.is_empty() {
        bail!("model returned an empty transcript");
    }

    Ok(TranscriptResult::new(text, TranscriptSource::Synthetic).with_language(lang))
}
