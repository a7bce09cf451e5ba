//! Command-line interface for the whitesymex symbolic execution engine.

use clap::{Parser, ValueEnum};
use miette::{Diagnostic, NamedSource, SourceSpan};
use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::info;
use tracing_subscriber::EnvFilter;
use whitesymex_engine::{ExploreConfig, PathGroup, State, Strategy};

/// CLI error with source context for pretty printing.
#[derive(Debug, Error, Diagnostic)]
enum CliError {
    #[error("failed to read {path}: {message}")]
    IoError { path: String, message: String },

    #[error("parse error: {message}")]
    #[diagnostic(code(whitesymex::parse_error))]
    ParseError {
        message: String,
        #[source_code]
        src: NamedSource<Arc<String>>,
        #[label("here")]
        span: SourceSpan,
    },

    #[error("solver error: {message}")]
    SolverError { message: String },
}

impl CliError {
    fn from_parse_error(
        e: whitesymex_syntax::ParseError,
        source: Arc<String>,
        filename: &str,
    ) -> Self {
        let offset = e.span().offset.min(source.len().saturating_sub(1));
        CliError::ParseError {
            message: e.to_string(),
            src: NamedSource::new(filename, source),
            span: (offset, 1).into(),
        }
    }
}

type CliResult<T> = Result<T, CliError>;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum StrategyArg {
    Bfs,
    Dfs,
    Random,
}

impl From<StrategyArg> for Strategy {
    fn from(arg: StrategyArg) -> Self {
        match arg {
            StrategyArg::Bfs => Strategy::Bfs,
            StrategyArg::Dfs => Strategy::Dfs,
            StrategyArg::Random => Strategy::Random,
        }
    }
}

#[derive(Parser)]
#[command(name = "whitesymex", version)]
#[command(about = "Symbolic execution engine for the Whitespace language")]
struct Cli {
    /// Program to execute
    #[arg(value_name = "FILE")]
    file: PathBuf,

    /// String to find in the program's output
    #[arg(long, value_name = "BYTES")]
    find: Option<String>,

    /// String to avoid in the program's output
    #[arg(long, value_name = "BYTES")]
    avoid: Option<String>,

    /// Path exploration strategy
    #[arg(long, value_enum, default_value_t = StrategyArg::Bfs)]
    strategy: StrategyArg,

    /// Maximum number of iterations for symbolic loops (0 = unlimited)
    #[arg(long, value_name = "LIMIT", default_value_t = 10)]
    loop_limit: u32,

    /// Number of states to find before stopping
    #[arg(long, value_name = "N", default_value_t = 1)]
    num_find: usize,

    /// Maximum number of interpreter steps (0 = unlimited)
    #[arg(long, value_name = "N", default_value_t = 0)]
    max_steps: usize,

    /// Wall-clock budget in seconds (0 = unlimited)
    #[arg(long, value_name = "SECS", default_value_t = 0)]
    max_time: u64,

    /// RNG seed for the random strategy
    #[arg(long, value_name = "SEED")]
    seed: Option<u64>,

    /// Show verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match run(&cli) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{:?}", miette::Report::new(e));
            ExitCode::from(2)
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: &Cli) -> CliResult<ExitCode> {
    let filename = cli.file.display().to_string();
    let source = fs::read_to_string(&cli.file).map_err(|e| CliError::IoError {
        path: filename.clone(),
        message: e.to_string(),
    })?;
    let source = Arc::new(source);

    let instructions = whitesymex_syntax::parse(&source)
        .map_err(|e| CliError::from_parse_error(e, source.clone(), &filename))?;
    info!(instructions = instructions.len(), file = %filename, "parsed program");

    let state = State::create_entry_state(instructions, None);
    let mut group = PathGroup::new(state);
    let config = ExploreConfig {
        find: cli.find.as_ref().map(|s| s.clone().into_bytes()),
        avoid: cli.avoid.as_ref().map(|s| s.clone().into_bytes()),
        strategy: cli.strategy.into(),
        loop_limit: cli.loop_limit,
        num_find: cli.num_find,
        max_steps: cli.max_steps,
        max_time: (cli.max_time > 0).then(|| Duration::from_secs(cli.max_time)),
        seed: cli.seed,
    };
    let outcome = group.explore(&config);
    info!(?outcome, group = %group, "exploration finished");

    if cli.find.is_some() {
        // Goal mode: report the stdin bytes that reach the goal.
        match group.found.first_mut() {
            Some(found) => {
                let stdin = found.concretize().map_err(|e| CliError::SolverError {
                    message: e.to_string(),
                })?;
                println!("{}", String::from_utf8_lossy(&stdin));
                Ok(ExitCode::SUCCESS)
            }
            None => {
                eprintln!("No solution found.");
                Ok(ExitCode::FAILURE)
            }
        }
    } else {
        // Plain run: report the stdin that completes the first finished
        // path. With --avoid alone, this is the input that steers the
        // program clear of the forbidden output.
        match group.deadended.first_mut() {
            Some(state) => {
                let stdin = state.concretize().map_err(|e| CliError::SolverError {
                    message: e.to_string(),
                })?;
                println!("{}", String::from_utf8_lossy(&stdin));
                Ok(ExitCode::SUCCESS)
            }
            None => {
                eprintln!("No solution found.");
                Ok(ExitCode::FAILURE)
            }
        }
    }
}
