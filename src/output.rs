use crate::TranscriptResult;
use crate::question::Question;
use crate::session::Verdict;

const PREVIEW_CHARS: usize = 600;

/// Short transcript preview, flagged when the text was fabricated
pub fn render_transcript_preview(transcript: &TranscriptResult) -> String {
    let mut out = String::new();
    if transcript.synthetic {
        out.push_str(
            "NOTE: no real transcript was found. This text was generated from the video's title and \
             description and may not reflect what is actually said.\n\n",
        );
    }

    let mut chars = transcript.text.chars();
    let preview: String = chars.by_ref().take(PREVIEW_CHARS).collect();
    out.push_str(&preview);
    if chars.next().is_some() {
        out.push_str(" [...]");
    }
    out
}

/// Render one question (1-based `number`); answers are shown only when `reveal` is set
pub fn render_question(number: usize, question: &Question, reveal: bool) -> String {
    match question {
        Question::Essay { prompt, answer } => {
            let mut out = format!("Question {number}: {prompt}");
            if reveal {
                out.push_str(&format!("\n  Answer: {answer}"));
            }
            out
        }
        Question::MultipleChoice {
            prompt,
            options,
            correct,
            explanation,
        } => {
            let mut lines = vec![format!("Question {number}: {prompt}")];
            lines.extend(options.iter().map(|(letter, text)| format!("  {letter}) {text}")));
            if reveal {
                lines.push(format!("  Correct answer: {correct}) {}", options.get(*correct)));
                lines.push(format!("  Explanation: {explanation}"));
            }
            lines.join("\n")
        }
    }
}

/// Render every question with its answer
pub fn render_questions(questions: &[Question]) -> String {
    questions
        .iter()
        .enumerate()
        .map(|(i, q)| render_question(i + 1, q, true))
        .collect::<Vec<_>>()
        .join("\n\n")
}

pub fn render_verdict(verdict: &Verdict) -> String {
    let headline = if verdict.correct {
        format!("Correct! You chose {}) {}", verdict.selected, verdict.correct_text)
    } else {
        format!(
            "Incorrect! You chose {}). The correct answer is: {}) {}",
            verdict.selected, verdict.correct_letter, verdict.correct_text
        )
    };
    format!("{headline}\nExplanation: {}", verdict.explanation)
}
