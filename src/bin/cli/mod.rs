//! CLI command implementations.
//!
//! Early-exit actions (listing messages, printing the default config) are
//! resolved to a value before any pipeline is constructed; only a real
//! `check` run builds sessions and touches files.

mod args;

pub use args::{CheckArgs, Cli, Commands};

use std::path::PathBuf;

use walkdir::WalkDir;

use norn_rs::core::checkers::CheckerRegistry;
use norn_rs::core::config::NornConfig;
use norn_rs::core::orchestrator::ParallelOrchestrator;
use norn_rs::core::reporter::{TextReporter, USAGE_EXIT};
use norn_rs::lang::IndentParser;

/// What the parsed command line asks for, decided before any pipeline
/// exists.
enum Action {
    Check(CheckArgs),
    ListMessages,
    PrintDefaultConfig,
}

/// Execute the parsed command line, returning the process exit code.
pub fn execute(cli: Cli) -> anyhow::Result<i32> {
    let action = match cli.command {
        Commands::Check(args) => Action::Check(args),
        Commands::ListMsgs => Action::ListMessages,
        Commands::PrintDefaultConfig => Action::PrintDefaultConfig,
    };

    match action {
        Action::ListMessages => {
            list_messages()?;
            Ok(0)
        }
        Action::PrintDefaultConfig => {
            println!("{}", NornConfig::default().to_yaml_string()?);
            Ok(0)
        }
        Action::Check(args) => check(args),
    }
}

fn list_messages() -> anyhow::Result<()> {
    let registry = CheckerRegistry::with_builtin_checkers();
    let task = registry.task_config(&NornConfig::default());
    let session = norn_rs::core::checkers::Session::build(&registry, &task)?;
    for def in session.catalog.definitions() {
        println!("{} ({}): {}", def.id, def.symbol, def.description);
    }
    Ok(())
}

fn check(args: CheckArgs) -> anyhow::Result<i32> {
    let config = match build_config(&args) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("norn: {err}");
            return Ok(USAGE_EXIT);
        }
    };
    let files = match collect_files(&args.paths) {
        Ok(files) if files.is_empty() => {
            eprintln!("norn: no input files");
            return Ok(USAGE_EXIT);
        }
        Ok(files) => files,
        Err(err) => {
            eprintln!("norn: {err}");
            return Ok(USAGE_EXIT);
        }
    };

    let registry = CheckerRegistry::with_builtin_checkers();
    let parser = IndentParser::new();
    let mut reporter = TextReporter::stdout();
    let outcome =
        ParallelOrchestrator::new(&config, &registry, &parser).run(&files, &mut reporter)?;
    Ok(outcome.exit_code())
}

fn build_config(args: &CheckArgs) -> anyhow::Result<NornConfig> {
    let mut config = match &args.config {
        Some(path) => NornConfig::from_yaml_file(path)?,
        None => NornConfig::default(),
    };
    if let Some(jobs) = args.jobs {
        config.run.jobs = jobs;
    }
    config.messages.disable.extend(args.disable.iter().cloned());
    config.messages.enable.extend(args.enable.iter().cloned());
    if !args.confidence.is_empty() {
        config.messages.confidence = Some(args.confidence.clone());
    }
    if let Some(min) = args.min_similarity_lines {
        config.similarity.min_similarity_lines = min;
    }
    if let Some(max) = args.max_line_length {
        config.raw.max_line_length = max;
    }
    config.validate()?;
    Ok(config)
}

/// Expand path arguments: directories are walked for `.nn` sources in a
/// stable order, explicit files are taken as-is, missing paths are a usage
/// error.
fn collect_files(paths: &[PathBuf]) -> anyhow::Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_file() {
            files.push(path.clone());
        } else if path.is_dir() {
            let mut found: Vec<PathBuf> = WalkDir::new(path)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|entry| entry.ok())
                .filter(|entry| entry.file_type().is_file())
                .map(|entry| entry.into_path())
                .filter(|p| p.extension().is_some_and(|ext| ext == "nn"))
                .collect();
            files.append(&mut found);
        } else {
            anyhow::bail!("no such file or directory: {}", path.display());
        }
    }
    Ok(files)
}
