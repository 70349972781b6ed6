use log::{debug, error, info};

use crate::QuizError;
use crate::llm::Llm;
use crate::question::{self, Question, QuestionCount, QuestionStyle};

/// Result of one generation request
#[derive(Debug)]
pub struct Generation {
    /// The model's raw response, kept for inspection whatever the outcome
    pub raw: Option<String>,
    pub outcome: Result<Vec<Question>, QuizError>,
}

pub fn build_prompt(transcript: &str, count: QuestionCount, style: QuestionStyle) -> String {
    let n = count.get();
    match style {
        QuestionStyle::MultipleChoice => format!(
            r#"Based on the following transcript, write {n} multiple-choice questions that test understanding of its key concepts.

Transcript:
{transcript}

Return the {n} questions as a JSON array with exactly this structure:
[
    {{
        "pergunta": "Question 1",
        "opcoes": {{
            "a": "Option A",
            "b": "Option B",
            "c": "Option C",
            "d": "Option D",
            "e": "Option E"
        }},
        "resposta_correta": "a",
        "explicacao": "A detailed explanation of why option A is correct"
    }}
]

Make sure that:
1. Every question has exactly 5 options (a, b, c, d, e)
2. Exactly one option is correct
3. The explanation is detailed and educational
4. The questions are relevant to the content of the transcript
5. Questions, options and explanations are written in the language of the transcript
6. The JSON is valid, with no extra or missing commas, and nothing outside the array"#
        ),
        QuestionStyle::Essay => format!(
            r#"Based on the following transcript, write {n} open-ended (essay) questions that test understanding of its key concepts.

Transcript:
{transcript}

Return the {n} questions as a JSON array with exactly this structure:
[
    {{"pergunta": "Question 1", "resposta": "Answer 1"}},
    {{"pergunta": "Question 2", "resposta": "Answer 2"}}
]

Make sure that:
1. The questions are relevant to the content of the transcript
2. The answers are detailed and educational
3. Questions and answers are written in the language of the transcript
4. The JSON is valid, with no extra or missing commas, and nothing outside the array"#
        ),
    }
}

/// Ask the model once for `count` questions and decode its answer.
///
/// There is no retry: a failed request is reported and left for the user to re-run.
pub async fn generate(llm: &dyn Llm, transcript: &str, count: QuestionCount, style: QuestionStyle) -> Generation {
    let prompt = build_prompt(transcript, count, style);
    info!("Requesting {} {style} questions", count.get());

    let raw = match llm.complete(&prompt).await {
        Ok(raw) => raw,
        Err(e) => {
            error!("Model call failed: {e:#}");
            return Generation {
                raw: None,
                outcome: Err(QuizError::Generation(format!("{e:#}"))),
            };
        }
    };
    debug!("Raw model response:\n{raw}");

    let outcome = match question::decode(&raw, style) {
        Some(mut questions) => {
            if questions.len() > count.get() {
                debug!("Model returned {} questions, keeping {}", questions.len(), count.get());
                questions.truncate(count.get());
            }
            Ok(questions)
        }
        None => {
            error!("Could not parse questions from model response");
            Err(QuizError::MalformedOutput)
        }
    };

    Generation { raw: Some(raw), outcome }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use async_trait::async_trait;
    use eyre::{Result, bail};

    /// Returns a canned response and remembers the prompts it saw
    struct ScriptedLlm {
        response: Option<String>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedLlm {
        fn replying(response: &str) -> Self {
            Self {
                response: Some(response.to_string()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn failing() -> Self {
            Self {
                response: None,
                prompts: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl Llm for ScriptedLlm {
        async fn complete(&self, prompt: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            match &self.response {
                Some(r) => Ok(r.clone()),
                None => bail!("quota exceeded"),
            }
        }
    }

    fn transcript_of(words: usize) -> String {
        (0..words).map(|i| format!("palavra{i}")).collect::<Vec<_>>().join(" ")
    }

    fn essay_response(n: usize) -> String {
        let items: Vec<String> = (1..=n)
            .map(|i| format!(r#"{{"pergunta": "Pergunta {i}?", "resposta": "Resposta {i}."}}"#))
            .collect();
        format!("[{}]", items.join(","))
    }

    #[tokio::test]
    async fn test_five_essay_questions_from_long_transcript() {
        let transcript = transcript_of(500);
        let llm = ScriptedLlm::replying(&essay_response(5));

        let generation = generate(&llm, &transcript, QuestionCount::new(5).unwrap(), QuestionStyle::Essay).await;
        let questions = generation.outcome.unwrap();

        assert_eq!(questions.len(), 5);
        for q in &questions {
            match q {
                Question::Essay { prompt, answer } => {
                    assert!(!prompt.is_empty());
                    assert!(!answer.is_empty());
                }
                other => panic!("unexpected variant: {other:?}"),
            }
        }
        assert_eq!(llm.calls(), 1);
        assert!(llm.prompts.lock().unwrap()[0].contains("palavra499"));
    }

    #[tokio::test]
    async fn test_extra_questions_truncated() {
        let llm = ScriptedLlm::replying(&essay_response(7));
        let generation = generate(&llm, "t", QuestionCount::new(3).unwrap(), QuestionStyle::Essay).await;
        assert_eq!(generation.outcome.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_malformed_output_keeps_raw() {
        let llm = ScriptedLlm::replying("Sorry, I cannot help with that.");
        let generation = generate(&llm, "t", QuestionCount::default(), QuestionStyle::Essay).await;

        assert!(matches!(generation.outcome, Err(QuizError::MalformedOutput)));
        assert_eq!(generation.raw.as_deref(), Some("Sorry, I cannot help with that."));
        assert_eq!(llm.calls(), 1);
    }

    #[tokio::test]
    async fn test_model_failure_is_not_retried() {
        let llm = ScriptedLlm::failing();
        let generation = generate(&llm, "t", QuestionCount::default(), QuestionStyle::MultipleChoice).await;

        match generation.outcome {
            Err(QuizError::Generation(msg)) => assert!(msg.contains("quota exceeded")),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(generation.raw.is_none());
        assert_eq!(llm.calls(), 1);
    }

    #[tokio::test]
    async fn test_multiple_choice_repaired_response() {
        let response = r#"Here you go:
[
  {"pergunta": "Q1", "opcoes": {"a": "1", "b": "2", "c": "3", "d": "4", "e": "5"}, "resposta_correta": "c", "explicacao": "because",},
]"#;
        let llm = ScriptedLlm::replying(response);
        let generation =
            generate(&llm, "t", QuestionCount::new(1).unwrap(), QuestionStyle::MultipleChoice).await;
        let questions = generation.outcome.unwrap();
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].style(), QuestionStyle::MultipleChoice);
    }

    #[test]
    fn test_prompts_embed_transcript_and_shape() {
        let essay = build_prompt("TRANSCRIPT-BODY", QuestionCount::new(4).unwrap(), QuestionStyle::Essay);
        assert!(essay.contains("TRANSCRIPT-BODY"));
        assert!(essay.contains("write 4 open-ended"));
        assert!(essay.contains(r#"{"pergunta": "Question 1", "resposta": "Answer 1"}"#));

        let mc = build_prompt("TRANSCRIPT-BODY", QuestionCount::new(2).unwrap(), QuestionStyle::MultipleChoice);
        assert!(mc.contains("write 2 multiple-choice"));
        assert!(mc.contains(r#""resposta_correta": "a""#));
        assert!(mc.contains("exactly 5 options"));
    }
}
