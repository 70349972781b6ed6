use std::io::{self, BufRead, IsTerminal, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use eyre::{Result, bail};
use log::{debug, info};

mod cli;

use cli::Cli;
use ytquiz::QuizError;
use ytquiz::cache::ManualStore;
use ytquiz::capabilities::{Capabilities, tool_version};
use ytquiz::chain::{Chain, ChainSettings, ManualStrategy};
use ytquiz::config::{self, Config};
use ytquiz::llm::{Llm, LlmClient, Provider, resolve_api_key};
use ytquiz::question::{OptionLetter, Question, QuestionCount, QuestionStyle};
use ytquiz::session::QuizState;
use ytquiz::{audio, generator, output};

fn setup_logging() -> Result<()> {
    let log_dir = log_dir();
    std::fs::create_dir_all(&log_dir)?;
    let log_file = log_dir.join("ytquiz.log");

    let target = Box::new(std::fs::OpenOptions::new().create(true).append(true).open(&log_file)?);

    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized: {}", log_file.display());
    Ok(())
}

fn log_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("ytquiz")
        .join("logs")
}

fn build_after_help() -> String {
    let tool_line = |name: &str, flag: &str, purpose: &str| match tool_version(name, flag) {
        Some(v) => format!("  \x1b[32m✅\x1b[0m {name:<12} {v}"),
        None => format!("  \x1b[31m❌\x1b[0m {name:<12} (not found, needed for {purpose})"),
    };

    let tools = [
        tool_line("yt-dlp", "--version", "audio transcription"),
        tool_line("ffmpeg", "-version", "offline and segmented transcription"),
    ];

    format!(
        "\nOPTIONAL TOOLS:\n{}\n\nConfig file: {}\nLogs are written to: {}",
        tools.join("\n"),
        config::config_path().display(),
        log_dir().join("ytquiz.log").display()
    )
}

fn read_url(cli: &Cli) -> Result<String> {
    if let Some(url) = &cli.url {
        return Ok(url.clone());
    }
    if cli.transcript.as_deref() == Some(Path::new("-")) {
        bail!("pass the URL as an argument when reading the transcript from stdin");
    }
    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        if !line.trim().is_empty() {
            return Ok(line);
        }
    }
    bail!("no URL or video ID provided\n\nUsage: ytquiz <URL>\n       echo <URL> | ytquiz");
}

fn read_manual_transcript(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut text = String::new();
        io::stdin().read_to_string(&mut text)?;
        Ok(text)
    } else {
        Ok(std::fs::read_to_string(path)?)
    }
}

fn prompt_line(prompt: &str) -> Result<Option<String>> {
    print!("{prompt}");
    io::stdout().flush()?;
    let mut line = String::new();
    if io::stdin().lock().read_line(&mut line)? == 0 {
        return Ok(None);
    }
    Ok(Some(line.trim().to_string()))
}

fn run_quiz(state: &mut QuizState) -> Result<()> {
    let total = state.len();
    for index in 0..total {
        let question = state.questions()[index].clone();
        println!("\n{}", output::render_question(index + 1, &question, false));

        match question {
            Question::Essay { answer, .. } => {
                if prompt_line("Press Enter to reveal the answer... ")?.is_none() {
                    return Ok(());
                }
                state.reveal(index)?;
                println!("  Answer: {answer}");
            }
            Question::MultipleChoice { .. } => loop {
                let Some(input) = prompt_line("Your answer (a-e, Enter to skip): ")? else {
                    return Ok(());
                };
                if input.is_empty() {
                    println!("{}", output::render_question(index + 1, &question, true));
                    state.reveal(index)?;
                    break;
                }
                match OptionLetter::parse(&input) {
                    Some(letter) => {
                        let verdict = state.check_answer(index, letter)?;
                        println!("{}", output::render_verdict(&verdict));
                        break;
                    }
                    None => println!("Please answer with a letter from a to e."),
                }
            },
        }
    }

    if state.style() == QuestionStyle::MultipleChoice {
        println!("\nScore: {}/{total}", state.score());
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    setup_logging()?;

    let after_help = build_after_help();
    let cmd = <Cli as clap::CommandFactory>::command().after_help(after_help);
    let matches = cmd.get_matches();
    let cli = <Cli as clap::FromArgMatches>::from_arg_matches(&matches)?;

    // Load config file (non-fatal if missing/invalid)
    let config = Config::load().unwrap_or_default();
    if cli.verbose {
        let config_path = config::config_path();
        if config_path.exists() {
            eprintln!("Config: {}", config_path.display());
        }
    }

    // Apply config defaults (CLI flags take priority)
    let mut settings = ChainSettings::from_config(&config);
    if let Some(lang) = &cli.lang {
        settings.primary_lang = lang.clone();
    }
    if let Some(lang) = &cli.fallback_lang {
        settings.fallback_lang = lang.clone();
    }
    let model = cli
        .model
        .clone()
        .or_else(|| config.model.clone())
        .unwrap_or_else(|| config::DEFAULT_MODEL.to_string());
    let style = cli.style.or(config.style).unwrap_or_default();
    let count = cli
        .count
        .or(config.count)
        .and_then(QuestionCount::new)
        .unwrap_or_default();

    // User-input errors stop here, before any network call
    let url_input = read_url(&cli)?;
    let video = ytquiz::extract_video_id(&url_input).ok_or_else(|| QuizError::InvalidUrl(url_input.trim().to_string()))?;
    let provider = Provider::for_model(&model);
    let api_key = resolve_api_key(cli.api_key.as_deref(), provider)?;
    let manual_text = cli.transcript.as_deref().map(read_manual_transcript).transpose()?;

    let http = settings.http_client()?;
    let llm_client = LlmClient::new(http.clone(), &model, api_key);
    info!("Using {} model {}", llm_client.provider().name(), llm_client.model());
    let caps = Capabilities::detect(&config, cli.stt_key.as_deref(), true, llm_client.accepts_audio());
    let llm: Arc<dyn Llm> = Arc::new(llm_client);

    if cli.verbose {
        eprintln!("Video: {video}\nModel: {model} ({})\nBackends: {}", provider.name(), caps.summary());
    }

    let chain = Chain::standard(
        http,
        settings,
        &caps,
        Some(llm.clone()),
        ManualStrategy::new(manual_text, ManualStore::default()),
    );
    debug!("Strategy order: {}", chain.names().join(" -> "));

    let acquired = chain.acquire(&video).await;
    match audio::discard(&video) {
        Ok(0) => {}
        Ok(n) => debug!("Removed {n} scratch audio files"),
        Err(e) => debug!("Could not remove scratch audio: {e}"),
    }

    let acquisition = match acquired {
        Ok(a) => a,
        Err(QuizError::TranscriptUnavailable { failures }) => {
            eprintln!("Could not obtain a transcript for {video}:");
            for failure in &failures {
                eprintln!("  - {failure}");
            }
            bail!(
                "no transcript available\n\nProvide one manually and run again:\n  \
                 ytquiz --transcript transcript.txt {url}\n  \
                 pbpaste | ytquiz --transcript - {url}",
                url = video.watch_url()
            );
        }
        Err(e) => return Err(e.into()),
    };
    let transcript = &acquisition.transcript;

    if cli.verbose {
        eprintln!(
            "Transcript: {} via {} ({} words, language {})",
            transcript.source,
            acquisition.strategy,
            transcript.word_count(),
            transcript.language.as_deref().unwrap_or("unknown"),
        );
    }
    if transcript.synthetic && !cli.show_transcript {
        eprintln!("Warning: no real transcript was found; questions are based on a transcript generated from the title and description.");
    }
    if cli.show_transcript {
        println!("--- Transcript ---\n{}\n", output::render_transcript_preview(transcript));
    }

    let mut state = QuizState::new();
    state.begin_generation();
    let generation = generator::generate(llm.as_ref(), &transcript.text, count, style).await;

    if cli.show_raw {
        match &generation.raw {
            Some(raw) => println!("--- Raw model response ---\n{raw}\n"),
            None => println!("--- Raw model response ---\n(none)\n"),
        }
    }

    let questions = match generation.outcome {
        Ok(questions) => questions,
        Err(e) => {
            if generation.raw.is_some() && !cli.show_raw {
                eprintln!("Run again with --show-raw to inspect the model response.");
            }
            return Err(e.into());
        }
    };
    state.populate(questions, style);

    if cli.no_interactive || !io::stdin().is_terminal() {
        println!("{}", output::render_questions(state.questions()));
    } else {
        run_quiz(&mut state)?;
    }

    if let Some(dir) = &cli.output_dir {
        let path = state.export_to(dir)?;
        eprintln!("Questions written to: {}", path.display());
    }

    Ok(())
}
