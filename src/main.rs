//! Binary entry point for git-llama.
//!
//! Takes a single natural-language prompt, asks a local Ollama model for
//! the matching git command, stores the prompt's embedding in the local
//! vector database, and prints the command.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(missing_docs)]
// Allow prints in the main binary for CLI output
#![allow(clippy::print_stderr)]
#![allow(clippy::print_stdout)]

use clap::Parser;
use git_llama::config::{self, OllamaConfig};
use git_llama::llm::OllamaClient;
use git_llama::store::VectorDb;
use git_llama::{Error, observability};
use std::path::PathBuf;
use std::process::ExitCode;

/// Exit code when the Ollama server is not reachable.
const EXIT_OLLAMA_NOT_RUNNING: u8 = 2;
/// Exit code when the vector database cannot be opened.
const EXIT_VECTORDB_OPEN_FAIL: u8 = 3;

/// git-llama - turn natural-language prompts into git commands.
#[derive(Parser)]
#[command(name = "git-llama")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// The prompt, delimited by quotes.
    prompt: String,

    /// Ollama server endpoint.
    #[arg(long, env = "OLLAMA_HOST", default_value = OllamaConfig::DEFAULT_ENDPOINT)]
    endpoint: String,

    /// Model used for generation and embeddings.
    #[arg(long, env = "OLLAMA_MODEL", default_value = OllamaConfig::DEFAULT_MODEL)]
    model: String,

    /// Path to the embedding database (default: .git-llama.db in the
    /// working directory).
    #[arg(long)]
    db: Option<PathBuf>,

    /// Enable verbose output.
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = observability::init(cli.verbose) {
        eprintln!("Failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    match run(&cli) {
        Ok(response) => {
            println!("{response}");
            ExitCode::SUCCESS
        },
        Err(RunError::OllamaNotRunning) => {
            eprintln!("Ollama is not running! Please run `ollama serve` in another window");
            ExitCode::from(EXIT_OLLAMA_NOT_RUNNING)
        },
        Err(RunError::Store(e @ Error::OpenFailure { .. })) => {
            eprintln!("failed to open vector db: {e}");
            ExitCode::from(EXIT_VECTORDB_OPEN_FAIL)
        },
        Err(RunError::Store(e)) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        },
    }
}

/// Failure modes the binary maps to exit codes.
enum RunError {
    /// The Ollama server did not answer the health probe.
    OllamaNotRunning,
    /// A store or API operation failed.
    Store(Error),
}

impl From<Error> for RunError {
    fn from(e: Error) -> Self {
        Self::Store(e)
    }
}

/// Runs the prompt: generate the command, persist the embedding, return
/// the command for printing.
fn run(cli: &Cli) -> Result<String, RunError> {
    let config = OllamaConfig::default()
        .with_endpoint(cli.endpoint.clone())
        .with_model(cli.model.clone());
    let client = OllamaClient::new(&config);

    if !client.is_available() {
        return Err(RunError::OllamaNotRunning);
    }

    let db_path = cli.db.clone().unwrap_or_else(config::default_db_path);
    let db = VectorDb::open(db_path, &config.model)?;

    let dimension = client.model_dimension()?;
    db.create_table_idempotent(dimension)?;

    let response = client.generate(&wrap_prompt(&cli.prompt))?;
    let embedding = client.embed(&cli.prompt)?;

    // An insert failure (e.g. the model repeated an earlier command) is
    // recoverable: the user still gets the generated response.
    if let Err(e) = db.insert(&response, &embedding) {
        tracing::warn!(error = %e, "failed inserting embedding vector");
    }

    db.close()?;
    Ok(response)
}

/// Frames the user's prompt as a git-command request.
fn wrap_prompt(prompt: &str) -> String {
    format!("git command for {prompt} just the command, no text")
}
