//! Quiz state for one interactive session.
//!
//! The state is owned by whoever drives the session and passed explicitly.
//! Call [`QuizState::begin_generation`] before requesting new questions so
//! stale questions are never shown next to an in-flight request.

use std::path::{Path, PathBuf};

use eyre::Result;
use log::debug;
use serde::Serialize;

use crate::QuizError;
use crate::question::{OptionLetter, Question, QuestionStyle};

/// Per-question answer state; `revealed` never goes back to false
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AnswerState {
    pub selected: Option<OptionLetter>,
    pub revealed: bool,
}

/// Outcome of checking a multiple-choice answer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verdict {
    pub correct: bool,
    pub selected: OptionLetter,
    pub correct_letter: OptionLetter,
    pub correct_text: String,
    pub explanation: String,
}

#[derive(Debug, Clone, Default)]
pub struct QuizState {
    questions: Vec<Question>,
    style: QuestionStyle,
    answers: Vec<AnswerState>,
}

impl QuizState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn style(&self) -> QuestionStyle {
        self.style
    }

    /// Drop everything from the previous generation
    pub fn begin_generation(&mut self) {
        debug!("Resetting quiz state ({} questions)", self.questions.len());
        self.questions.clear();
        self.answers.clear();
    }

    /// Replace the state with a freshly generated batch, all unanswered
    pub fn populate(&mut self, questions: Vec<Question>, style: QuestionStyle) {
        self.answers = vec![AnswerState::default(); questions.len()];
        self.questions = questions;
        self.style = style;
    }

    pub fn answer(&self, index: usize) -> Option<AnswerState> {
        self.answers.get(index).copied()
    }

    fn check_index(&self, index: usize) -> Result<(), QuizError> {
        if index >= self.questions.len() {
            return Err(QuizError::QuestionIndex {
                index,
                len: self.questions.len(),
            });
        }
        Ok(())
    }

    /// Record the user's choice for a multiple-choice question and reveal the result.
    ///
    /// Checking again replaces the stored selection; the question stays revealed.
    pub fn check_answer(&mut self, index: usize, selected: OptionLetter) -> Result<Verdict, QuizError> {
        self.check_index(index)?;
        let Question::MultipleChoice {
            options,
            correct,
            explanation,
            ..
        } = &self.questions[index]
        else {
            return Err(QuizError::NotMultipleChoice(index));
        };

        let verdict = Verdict {
            correct: selected == *correct,
            selected,
            correct_letter: *correct,
            correct_text: options.get(*correct).to_string(),
            explanation: explanation.clone(),
        };

        self.answers[index] = AnswerState {
            selected: Some(selected),
            revealed: true,
        };
        Ok(verdict)
    }

    /// Mark a question as revealed without an answer (essay questions)
    pub fn reveal(&mut self, index: usize) -> Result<(), QuizError> {
        self.check_index(index)?;
        self.answers[index].revealed = true;
        Ok(())
    }

    /// Number of revealed multiple-choice questions answered correctly
    pub fn score(&self) -> usize {
        self.questions
            .iter()
            .zip(&self.answers)
            .filter(|(q, a)| match q {
                Question::MultipleChoice { correct, .. } => a.revealed && a.selected == Some(*correct),
                Question::Essay { .. } => false,
            })
            .count()
    }

    /// The question list as pretty-printed JSON
    pub fn export_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.questions)?)
    }

    pub fn export_file_name(&self) -> String {
        export_file_name(self.style)
    }

    /// Write the export into `dir` and return the file's path
    pub fn export_to(&self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(self.export_file_name());
        std::fs::write(&path, self.export_json()?)?;
        debug!("Exported {} questions to {}", self.questions.len(), path.display());
        Ok(path)
    }
}

pub fn export_file_name(style: QuestionStyle) -> String {
    format!("youtube_questions_{}.json", style.slug())
}
