// r2backup/src/backup/db_dump.rs
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Local;
use tokio::process::Command;
use tokio::time::timeout;
use which::which;

use crate::config::AppConfig;
use crate::errors::{AppError, Result};
use crate::utils::naming;

const DUMP_TIMEOUT: Duration = Duration::from_secs(600);

/// Produces one complete database dump file per run. The backup flow treats
/// the producer as opaque: any failure is fatal to the run.
#[async_trait]
pub trait DumpProducer: Send + Sync {
    async fn produce(&self, backup_dir: &Path) -> Result<PathBuf>;
}

/// Dumps a PostgreSQL database by running `pg_dump` inside its Docker
/// container and streaming stdout to the artifact file.
pub struct DockerPgDump {
    container_name: String,
    db_name: String,
    db_user: String,
}

impl DockerPgDump {
    pub fn from_config(config: &AppConfig) -> Self {
        DockerPgDump {
            container_name: config.container_name.clone(),
            db_name: config.db_name.clone(),
            db_user: config.db_user.clone(),
        }
    }
}

fn find_docker_executable() -> Result<PathBuf> {
    which("docker").map_err(|e| {
        AppError::DumpProducer(format!(
            "docker executable not found in PATH: {}. Please ensure Docker is installed.",
            e
        ))
    })
}

/// Opens the artifact file for writing. Names embed a one-second timestamp,
/// so a rerun within the same second would otherwise truncate the previous
/// dump in place.
fn create_artifact_file(dump_path: &Path) -> Result<std::fs::File> {
    std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(dump_path)
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::AlreadyExists => AppError::DumpProducer(format!(
                "artifact {} already exists, refusing to overwrite it",
                dump_path.display()
            )),
            _ => AppError::Io(e),
        })
}

fn discard_partial(path: &Path) {
    if let Err(e) = std::fs::remove_file(path) {
        if e.kind() != std::io::ErrorKind::NotFound {
            eprintln!("⚠️ Failed to remove partial dump {}: {}", path.display(), e);
        }
    }
}

#[async_trait]
impl DumpProducer for DockerPgDump {
    async fn produce(&self, backup_dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(backup_dir)?;

        let docker_path = find_docker_executable()?;
        let file_name = naming::artifact_file_name(&self.db_name, Local::now().naive_local());
        let dump_path = backup_dir.join(&file_name);

        println!("Creating backup...");
        println!("  Container: {}", self.container_name);
        println!("  Database: {}", self.db_name);
        println!("  User: {}", self.db_user);

        let dump_file = create_artifact_file(&dump_path)?;

        let child = Command::new(&docker_path)
            .arg("exec")
            .arg(&self.container_name)
            .arg("pg_dump")
            .arg("-U")
            .arg(&self.db_user)
            .arg("-d")
            .arg(&self.db_name)
            .arg("--no-owner")
            .arg("--no-acl")
            .stdout(Stdio::from(dump_file))
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| AppError::DumpProducer(format!("failed to spawn docker exec: {}", e)))?;

        let output = match timeout(DUMP_TIMEOUT, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                discard_partial(&dump_path);
                return Err(AppError::DumpProducer(format!(
                    "failed to wait for pg_dump: {}",
                    e
                )));
            }
            Err(_) => {
                discard_partial(&dump_path);
                return Err(AppError::DumpProducer(format!(
                    "pg_dump timed out after {} seconds",
                    DUMP_TIMEOUT.as_secs()
                )));
            }
        };

        if !output.status.success() {
            discard_partial(&dump_path);
            return Err(AppError::DumpProducer(format!(
                "pg_dump in container {} exited with {}: {}",
                self.container_name,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let size = std::fs::metadata(&dump_path)?.len();
        if size == 0 {
            discard_partial(&dump_path);
            return Err(AppError::DumpProducer(
                "pg_dump produced an empty dump".to_string(),
            ));
        }

        println!(
            "  Created: {} ({:.2} MB)",
            file_name,
            size as f64 / (1024.0 * 1024.0)
        );
        Ok(dump_path)
    }
}
