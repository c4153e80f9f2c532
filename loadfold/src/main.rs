//! loadfold CLI

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use loadfold::config::OptimizerSettings;
use loadfold::dialect::EvmDialect;
use loadfold::error::report_error;
use loadfold::optimize::{OptimizationPipeline, OptimizerStepContext};
use loadfold::source::{FileReader, SOURCE_KIND};

#[derive(Parser)]
#[command(name = "loadfold", version, about = "Resolve redundant loads and fold hashes in Yul-style programs")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Optimize a source file and print the result
    Optimize {
        /// Source file to optimize
        file: PathBuf,
        /// Optimizer settings (TOML)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Expected executions per deployment
        #[arg(long)]
        expected_executions: Option<u64>,
        /// Never resolve memory loads
        #[arg(long)]
        no_memory_loads: bool,
        /// Additional directory sources may be read from
        #[arg(long = "allow-path")]
        allow_paths: Vec<PathBuf>,
    },
    /// Parse and dump the tree as JSON (debug)
    Parse {
        /// Source file to parse
        file: PathBuf,
    },
    /// Tokenize and dump tokens (debug)
    Tokens {
        /// Source file to tokenize
        file: PathBuf,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Command::Optimize {
            file,
            config,
            expected_executions,
            no_memory_loads,
            allow_paths,
        } => optimize_file(&file, config.as_deref(), expected_executions, no_memory_loads, allow_paths),
        Command::Parse { file } => parse_file(&file),
        Command::Tokens { file } => tokenize_file(&file),
    };

    if let Err(e) = result {
        if !e.is::<Reported>() {
            eprintln!("Error: {e}");
        }
        std::process::exit(1);
    }
}

/// An error already rendered as a source diagnostic
#[derive(Debug, thiserror::Error)]
#[error("aborting due to previous error")]
struct Reported;

/// Read `path` through a reader allowed to see its directory and `extra`
fn read_source(path: &Path, extra: Vec<PathBuf>) -> Result<String, Box<dyn std::error::Error>> {
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let mut reader = FileReader::new(std::env::current_dir()?, extra);
    reader.allow_directory(directory);
    Ok(reader.read_file(SOURCE_KIND, &path.display().to_string())?)
}

/// Render errors that carry a source location; those come back as `Reported`
fn with_diagnostics<T>(filename: &str, source: &str, result: loadfold::Result<T>) -> Result<T, Box<dyn std::error::Error>> {
    result.map_err(|e| -> Box<dyn std::error::Error> {
        if e.span().is_some() {
            report_error(filename, source, &e);
            Box::new(Reported)
        } else {
            Box::new(e)
        }
    })
}

fn optimize_file(
    path: &Path,
    config: Option<&Path>,
    expected_executions: Option<u64>,
    no_memory_loads: bool,
    allow_paths: Vec<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut settings = match config {
        Some(config) => OptimizerSettings::load(config)?,
        None => OptimizerSettings::default(),
    };
    if expected_executions.is_some() {
        settings.expected_executions_per_deployment = expected_executions;
    }
    if no_memory_loads {
        settings.optimize_memory_loads = false;
    }

    let source = read_source(path, allow_paths)?;
    let filename = path.display().to_string();
    let mut ast = with_diagnostics(&filename, &source, loadfold::parse_program(&filename, &source))?;

    let dialect = EvmDialect::new();
    let context = OptimizerStepContext::from_settings(&dialect, &settings);
    let pipeline = OptimizationPipeline::from_settings(&settings);
    let stats = with_diagnostics(&filename, &source, pipeline.optimize(&context, &mut ast))?;
    tracing::info!(iterations = stats.iterations, steps = ?stats.step_counts, "optimized {}", filename);

    println!("{}", ast);
    Ok(())
}

fn parse_file(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let source = read_source(path, Vec::new())?;
    let filename = path.display().to_string();

    let ast = with_diagnostics(&filename, &source, loadfold::parse_program(&filename, &source))?;

    println!("{}", serde_json::to_string_pretty(&ast)?);
    Ok(())
}

fn tokenize_file(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let source = read_source(path, Vec::new())?;
    let filename = path.display().to_string();

    let tokens = with_diagnostics(&filename, &source, loadfold::lexer::tokenize(&source))?;
    for (token, span) in &tokens {
        println!("{} @ {}", token, span);
    }

    Ok(())
}
