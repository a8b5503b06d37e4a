//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `lessonhub_core` linkage.
//! - Check that a deployment config loads and its store opens.

use clap::Parser;
use lessonhub_core::db::migrations::latest_version;
use lessonhub_core::{AppConfig, SqliteDataStore};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "lessonhub")]
#[command(about = "LessonHub core smoke probe", long_about = None)]
struct Cli {
    /// Deployment config (TOML). Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    println!("lessonhub_core ping={}", lessonhub_core::ping());
    println!("lessonhub_core version={}", lessonhub_core::core_version());
    println!("lessonhub_core schema={}", latest_version());

    let config = match &cli.config {
        Some(path) => match AppConfig::load(path) {
            Ok(config) => config,
            Err(err) => {
                eprintln!("config error: {err}");
                return ExitCode::FAILURE;
            }
        },
        None => AppConfig::default(),
    };
    if let Err(err) = config.start_logging() {
        eprintln!("logging error: {err}");
        return ExitCode::FAILURE;
    }

    let opened = match &config.database_path {
        Some(path) => SqliteDataStore::open(path),
        None => SqliteDataStore::open_in_memory(),
    };
    match opened {
        Ok(_) => {
            println!("lessonhub_core store=ok");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("store error: {err}");
            ExitCode::FAILURE
        }
    }
}
