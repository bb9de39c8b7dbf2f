//! Incremental PostgreSQL Backup Tool
//!
//! Dumps a dockerized PostgreSQL database, uploads it to S3-compatible
//! object storage when its content changed since the last upload, and prunes
//! local and remote backups past their retention windows.

// r2backup/src/main.rs
mod backup;
mod config;
mod errors;
mod listing;
mod retention;
mod state;
mod storage;
mod utils;

use anyhow::{Context, Result};
use config::AppConfig;
use std::env;
use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();

    let args: Vec<String> = env::args().collect();
    let mode = args.get(1).map(|s| s.trim()).unwrap_or("");

    match mode {
        "" | "--force" | "--list" => {}
        "--help" | "-h" => {
            print_usage();
            return ExitCode::SUCCESS;
        }
        other => {
            eprintln!("❌ Unknown option: {}", other);
            print_usage();
            return ExitCode::FAILURE;
        }
    }

    match run_app(mode).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("❌ Error: {:?}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run_app(mode: &str) -> Result<()> {
    // Listing is read-only and never talks to the database, so it loads the
    // narrower config that does not require DB_NAME/DB_USER.
    if mode == "--list" {
        let list_config = config::ListConfig::from_env()
            .context("Failed to load configuration from environment")?;
        return listing::run_list_flow(&list_config).await;
    }

    let app_config =
        AppConfig::from_env().context("Failed to load configuration from environment")?;
    backup::run_backup_flow(&app_config, mode == "--force").await
}

fn print_usage() {
    println!("Usage: r2backup [option]");
    println!();
    println!("  (none)   Incremental backup");
    println!("  --force  Force upload even when the dump is unchanged");
    println!("  --list   List local and remote backups");
    println!("  --help   Show this message");
}
