use clap::Parser;
use std::path::PathBuf;

use ytquiz::question::QuestionStyle;

#[derive(Parser)]
#[command(
    name = "ytquiz",
    about = "Generate quiz questions from a YouTube video",
    version
)]
pub struct Cli {
    /// YouTube video URL or video ID (reads from stdin if omitted)
    pub url: Option<String>,

    /// Number of questions to generate (1-20) [default: 5]
    #[arg(short = 'n', long, value_parser = clap::value_parser!(u8).range(1..=20))]
    pub count: Option<u8>,

    /// Question style [default: essay]
    #[arg(short, long, value_enum)]
    pub style: Option<QuestionStyle>,

    /// API key for the generative model (falls back to the provider's environment variable)
    #[arg(long)]
    pub api_key: Option<String>,

    /// Generative model; the provider is chosen from the name (gemini-*, claude-*, otherwise OpenAI)
    #[arg(long)]
    pub model: Option<String>,

    /// API key for cloud speech-to-text (falls back to OPENAI_API_KEY)
    #[arg(long)]
    pub stt_key: Option<String>,

    /// Preferred transcript language [default: pt]
    #[arg(short, long)]
    pub lang: Option<String>,

    /// Caption language tried when the preferred one is missing [default: en]
    #[arg(long)]
    pub fallback_lang: Option<String>,

    /// Transcript to use if every automatic method fails (file path, or - for stdin)
    #[arg(short, long)]
    pub transcript: Option<PathBuf>,

    /// Write the questions as JSON into this directory
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Print all questions with answers instead of running the quiz
    #[arg(long)]
    pub no_interactive: bool,

    /// Print the raw model response
    #[arg(long)]
    pub show_raw: bool,

    /// Print a preview of the transcript
    #[arg(long)]
    pub show_transcript: bool,

    /// Show transcript source and progress on stderr
    #[arg(short, long)]
    pub verbose: bool,
}
