use thiserror::Error;

/// One failed attempt recorded by the acquisition chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategyFailure {
    pub strategy: String,
    pub reason: String,
}

impl std::fmt::Display for StrategyFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.strategy, self.reason)
    }
}

#[derive(Debug, Error)]
pub enum QuizError {
    #[error("could not extract a video ID from: {0}")]
    InvalidUrl(String),

    #[error("no API key for {provider}: pass --api-key or set {env_var}")]
    MissingApiKey { provider: &'static str, env_var: &'static str },

    #[error("no transcript could be obtained after {} strategies", failures.len())]
    TranscriptUnavailable { failures: Vec<StrategyFailure> },

    #[error("question generation failed: {0}")]
    Generation(String),

    #[error("model response could not be parsed as a question list")]
    MalformedOutput,

    #[error("question {index} does not exist (quiz has {len})")]
    QuestionIndex { index: usize, len: usize },

    #[error("question {0} is not a multiple-choice question")]
    NotMultipleChoice(usize),
}
