//! Command-line front end: runs a questionnaire on a worker thread and
//! answers its questions from the terminal.

mod questionnaire;
mod terminal;

use std::fs;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use qa_dispatcher::{Controller, RunStatus};
use qa_transport::DEFAULT_BUFFER_LEN;
use qa_worker::{InteractiveMode, SessionConfig};
use tracing_subscriber::{fmt, EnvFilter};

use crate::questionnaire::Questionnaire;
use crate::terminal::TerminalOperator;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Answer a questionnaire through a blocking worker exchange",
    long_about = None
)]
struct Cli {
    /// JSON array of questions to resolve.
    #[arg(long, value_name = "FILE")]
    questions: PathBuf,

    /// Answer every question from its default without prompting.
    #[arg(long)]
    skip_questions: bool,

    /// Give up on an unanswered question after this many seconds.
    #[arg(long, value_name = "SECS")]
    timeout_secs: Option<u64>,

    /// Size of the shared buffer in bytes, control slots included.
    #[arg(long, default_value_t = DEFAULT_BUFFER_LEN)]
    buffer_len: usize,

    /// Stamp buffer payloads with this schema version.
    #[arg(long, value_name = "N")]
    schema_version: Option<u32>,

    /// Write the answered questionnaire here.
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,
}

impl Cli {
    fn session_config(&self) -> SessionConfig {
        SessionConfig {
            buffer_len: self.buffer_len,
            wait_timeout: self.timeout_secs.map(Duration::from_secs),
            schema_version: self.schema_version,
            interactive: if self.skip_questions {
                InteractiveMode::Disabled
            } else {
                InteractiveMode::Auto
            },
            ..SessionConfig::default()
        }
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // Ignore error if already set (e.g., during tests).
    let _ = fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .try_init();
}

fn main() -> Result<ExitCode> {
    init_tracing();
    let cli = Cli::parse();

    let unit = Questionnaire::load(&cli.questions)?;
    if unit.is_empty() {
        tracing::warn!(path = %cli.questions.display(), "questionnaire has no questions");
    }
    let controller = Controller::new(cli.session_config());
    if !cli.skip_questions && !controller.interactive_available() {
        tracing::warn!("interactive questions are unavailable; answering from defaults");
    }
    tracing::info!(
        questions = unit.len(),
        interactive = controller.interactive_available(),
        "starting run"
    );

    let mut operator = TerminalOperator::new();
    let mut stdout = io::stdout();
    let report = controller.run(Box::new(unit), &mut operator, &mut stdout);

    match report.status {
        RunStatus::Succeeded { artifact } => {
            if let Some(path) = &cli.output {
                fs::write(path, &artifact)
                    .with_context(|| format!("failed to write {}", path.display()))?;
                tracing::info!(path = %path.display(), "answers written");
            }
            Ok(ExitCode::SUCCESS)
        }
        RunStatus::Failed { failure, message } => {
            tracing::error!(?failure, "run failed");
            eprintln!("error: {message}");
            Ok(ExitCode::FAILURE)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_map_onto_session_config() {
        let cli = Cli::try_parse_from([
            "qa-cli",
            "--questions",
            "qa.json",
            "--timeout-secs",
            "30",
            "--schema-version",
            "2",
            "--buffer-len",
            "4096",
        ])
        .unwrap();
        let config = cli.session_config();
        assert_eq!(config.wait_timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.schema_version, Some(2));
        assert_eq!(config.buffer_len, 4096);
        assert_eq!(config.interactive, InteractiveMode::Auto);
    }

    #[test]
    fn defaults_match_observed_behaviour() {
        let cli =
            Cli::try_parse_from(["qa-cli", "--questions", "qa.json", "--skip-questions"]).unwrap();
        let config = cli.session_config();
        assert_eq!(config.wait_timeout, None);
        assert_eq!(config.schema_version, None);
        assert_eq!(config.buffer_len, DEFAULT_BUFFER_LEN);
        assert_eq!(config.interactive, InteractiveMode::Disabled);
        assert!(cli.output.is_none());
    }

    #[test]
    fn questions_flag_is_required() {
        assert!(Cli::try_parse_from(["qa-cli"]).is_err());
    }
}
