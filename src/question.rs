use log::warn;
use serde::{Deserialize, Serialize};

use crate::repair;

/// Which kind of question a batch contains
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum QuestionStyle {
    #[default]
    Essay,
    MultipleChoice,
}

impl QuestionStyle {
    /// Stable identifier used in file names and config
    pub fn slug(&self) -> &'static str {
        match self {
            QuestionStyle::Essay => "essay",
            QuestionStyle::MultipleChoice => "multiple_choice",
        }
    }
}

impl std::fmt::Display for QuestionStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QuestionStyle::Essay => write!(f, "essay"),
            QuestionStyle::MultipleChoice => write!(f, "multiple choice"),
        }
    }
}

/// Number of questions to request, always within 1..=20
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuestionCount(u8);

impl QuestionCount {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 20;

    pub fn new(n: u8) -> Option<Self> {
        (Self::MIN..=Self::MAX).contains(&n).then_some(Self(n))
    }

    pub fn get(&self) -> usize {
        self.0 as usize
    }
}

impl Default for QuestionCount {
    fn default() -> Self {
        Self(5)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum OptionLetter {
    #[serde(rename = "a", alias = "A")]
    A,
    #[serde(rename = "b", alias = "B")]
    B,
    #[serde(rename = "c", alias = "C")]
    C,
    #[serde(rename = "d", alias = "D")]
    D,
    #[serde(rename = "e", alias = "E")]
    E,
}

impl OptionLetter {
    pub const ALL: [OptionLetter; 5] = [
        OptionLetter::A,
        OptionLetter::B,
        OptionLetter::C,
        OptionLetter::D,
        OptionLetter::E,
    ];

    pub fn as_char(&self) -> char {
        match self {
            OptionLetter::A => 'a',
            OptionLetter::B => 'b',
            OptionLetter::C => 'c',
            OptionLetter::D => 'd',
            OptionLetter::E => 'e',
        }
    }

    pub fn parse(input: &str) -> Option<Self> {
        let mut chars = input.trim().chars();
        let c = chars.next()?.to_ascii_lowercase();
        // Accept "b" and "b)" alike
        if chars.any(|rest| rest != ')' && rest != '.') {
            return None;
        }
        Self::ALL.into_iter().find(|l| l.as_char() == c)
    }
}

impl std::fmt::Display for OptionLetter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// The five answer options of a multiple-choice question
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Choices {
    #[serde(alias = "A")]
    pub a: String,
    #[serde(alias = "B")]
    pub b: String,
    #[serde(alias = "C")]
    pub c: String,
    #[serde(alias = "D")]
    pub d: String,
    #[serde(alias = "E")]
    pub e: String,
}

impl Choices {
    pub fn get(&self, letter: OptionLetter) -> &str {
        match letter {
            OptionLetter::A => &self.a,
            OptionLetter::B => &self.b,
            OptionLetter::C => &self.c,
            OptionLetter::D => &self.d,
            OptionLetter::E => &self.e,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (OptionLetter, &str)> {
        OptionLetter::ALL.into_iter().map(|l| (l, self.get(l)))
    }
}

/// A generated question, serialized with the keys the prompts ask the model for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Question {
    MultipleChoice {
        #[serde(rename = "pergunta")]
        prompt: String,
        #[serde(rename = "opcoes")]
        options: Choices,
        #[serde(rename = "resposta_correta")]
        correct: OptionLetter,
        #[serde(rename = "explicacao", default)]
        explanation: String,
    },
    Essay {
        #[serde(rename = "pergunta")]
        prompt: String,
        #[serde(rename = "resposta")]
        answer: String,
    },
}

impl Question {
    pub fn prompt(&self) -> &str {
        match self {
            Question::Essay { prompt, .. } | Question::MultipleChoice { prompt, .. } => prompt,
        }
    }

    pub fn style(&self) -> QuestionStyle {
        match self {
            Question::Essay { .. } => QuestionStyle::Essay,
            Question::MultipleChoice { .. } => QuestionStyle::MultipleChoice,
        }
    }

    /// Reject questions with blank text fields
    pub fn validate(&self) -> Result<(), String> {
        if self.prompt().trim().is_empty() {
            return Err("empty question text".to_string());
        }
        match self {
            Question::Essay { answer, .. } if answer.trim().is_empty() => Err("empty answer".to_string()),
            Question::MultipleChoice { options, .. } => {
                match options.iter().find(|(_, text)| text.trim().is_empty()) {
                    Some((letter, _)) => Err(format!("option {letter} is empty")),
                    None => Ok(()),
                }
            }
            _ => Ok(()),
        }
    }
}

/// Repair and decode a model response into questions of the requested style.
///
/// Elements of the wrong style or with blank fields are dropped. Returns
/// `None` when nothing usable remains.
pub fn decode(text: &str, style: QuestionStyle) -> Option<Vec<Question>> {
    let items = repair::parse_array(text)?;
    let total = items.len();

    let questions: Vec<Question> = items
        .into_iter()
        .enumerate()
        .filter_map(|(i, item)| {
            let question: Question = match serde_json::from_value(item) {
                Ok(q) => q,
                Err(e) => {
                    warn!("Dropping question {}: {e}", i + 1);
                    return None;
                }
            };
            if question.style() != style {
                warn!("Dropping question {}: expected {style}, got {}", i + 1, question.style());
                return None;
            }
            if let Err(reason) = question.validate() {
                warn!("Dropping question {}: {reason}", i + 1);
                return None;
            }
            Some(question)
        })
        .collect();

    if questions.len() < total {
        warn!("Kept {} of {total} decoded questions", questions.len());
    }

    (!questions.is_empty()).then_some(questions)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MC_RESPONSE: &str = r#"[
        {
            "pergunta": "Qual é a capital do Brasil?",
            "opcoes": {"a": "Rio", "b": "Brasília", "c": "Salvador", "d": "Recife", "e": "Belém"},
            "resposta_correta": "b",
            "explicacao": "Brasília é a capital desde 1960."
        }
    ]"#;

    #[test]
    fn test_decode_multiple_choice() {
        let questions = decode(MC_RESPONSE, QuestionStyle::MultipleChoice).unwrap();
        assert_eq!(questions.len(), 1);
        match &questions[0] {
            Question::MultipleChoice { options, correct, .. } => {
                assert_eq!(*correct, OptionLetter::B);
                assert_eq!(options.get(*correct), "Brasília");
                assert_eq!(options.iter().count(), 5);
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn test_decode_essay() {
        let text = r#"[{"pergunta": "O que é ownership?", "resposta": "Regras de posse de memória."}]"#;
        let questions = decode(text, QuestionStyle::Essay).unwrap();
        assert_eq!(
            questions,
            vec![Question::Essay {
                prompt: "O que é ownership?".to_string(),
                answer: "Regras de posse de memória.".to_string(),
            }]
        );
    }

    #[test]
    fn test_uppercase_letters_accepted() {
        let text = MC_RESPONSE.replace(r#""resposta_correta": "b""#, r#""resposta_correta": "B""#);
        let questions = decode(&text, QuestionStyle::MultipleChoice).unwrap();
        assert_eq!(questions.len(), 1);
    }

    #[test]
    fn test_correct_letter_outside_options_dropped() {
        let text = MC_RESPONSE.replace(r#""resposta_correta": "b""#, r#""resposta_correta": "f""#);
        assert!(decode(&text, QuestionStyle::MultipleChoice).is_none());
    }

    #[test]
    fn test_four_options_dropped() {
        let text = r#"[{
            "pergunta": "Q",
            "opcoes": {"a": "1", "b": "2", "c": "3", "d": "4"},
            "resposta_correta": "a",
            "explicacao": "x"
        }]"#;
        assert!(decode(text, QuestionStyle::MultipleChoice).is_none());
    }

    #[test]
    fn test_six_options_dropped() {
        let text = r#"[{
            "pergunta": "Q",
            "opcoes": {"a": "1", "b": "2", "c": "3", "d": "4", "e": "5", "f": "6"},
            "resposta_correta": "a",
            "explicacao": "x"
        }]"#;
        assert!(decode(text, QuestionStyle::MultipleChoice).is_none());
    }

    #[test]
    fn test_wrong_style_dropped() {
        assert!(decode(MC_RESPONSE, QuestionStyle::Essay).is_none());
    }

    #[test]
    fn test_blank_answer_dropped() {
        let text = r#"[
            {"pergunta": "A", "resposta": " "},
            {"pergunta": "C", "resposta": "D"}
        ]"#;
        let questions = decode(text, QuestionStyle::Essay).unwrap();
        assert_eq!(questions.len(), 1);
        assert_eq!(questions[0].prompt(), "C");
    }

    #[test]
    fn test_serialize_uses_wire_keys() {
        let q = Question::Essay {
            prompt: "P".to_string(),
            answer: "R".to_string(),
        };
        let json = serde_json::to_value(&q).unwrap();
        assert_eq!(json, serde_json::json!({"pergunta": "P", "resposta": "R"}));
    }

    #[test]
    fn test_option_letter_parse() {
        assert_eq!(OptionLetter::parse("c"), Some(OptionLetter::C));
        assert_eq!(OptionLetter::parse(" E) "), Some(OptionLetter::E));
        assert_eq!(OptionLetter::parse("f"), None);
        assert_eq!(OptionLetter::parse("ab"), None);
        assert_eq!(OptionLetter::parse(""), None);
    }

    #[test]
    fn test_question_count_bounds() {
        assert!(QuestionCount::new(0).is_none());
        assert_eq!(QuestionCount::new(1).map(|c| c.get()), Some(1));
        assert_eq!(QuestionCount::new(20).map(|c| c.get()), Some(20));
        assert!(QuestionCount::new(21).is_none());
        assert_eq!(QuestionCount::default().get(), 5);
    }

    #[test]
    fn test_style_slug() {
        assert_eq!(QuestionStyle::Essay.slug(), "essay");
        assert_eq!(QuestionStyle::MultipleChoice.slug(), "multiple_choice");
    }
}
