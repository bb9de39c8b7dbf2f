// r2backup/src/listing/mod.rs
//
// Read-only enumeration of local and remote artifacts. Touches neither the
// state record nor retention.

use std::fs;
use std::path::Path;

use anyhow::Result;
use chrono::NaiveDateTime;

use crate::config::ListConfig;
use crate::storage::BlobStore;
use crate::storage::s3::S3BlobStore;
use crate::utils::naming;

pub async fn run_list_flow(config: &ListConfig) -> Result<()> {
    println!("==================================================");
    println!("  LOCAL BACKUPS");
    println!("==================================================");

    let local = collect_local(&config.backup_dir)?;
    if local.is_empty() {
        println!("  (none)");
    } else {
        for (name, size, taken_at) in &local {
            println!(
                "  {} | {:.2} MB | {}",
                name,
                *size as f64 / (1024.0 * 1024.0),
                taken_at.format("%Y-%m-%d %H:%M")
            );
        }
    }

    if let Some(remote_config) = &config.remote {
        println!();
        println!("==================================================");
        println!("  REMOTE BACKUPS");
        println!("==================================================");

        let store = S3BlobStore::connect(remote_config).await;
        let list_prefix = if remote_config.prefix.is_empty() {
            String::new()
        } else {
            format!("{}/", remote_config.prefix)
        };

        match store.list(&list_prefix).await {
            Ok(mut artifacts) => {
                // Artifact names embed a sortable timestamp, so key order is
                // chronological order.
                artifacts.sort_by(|a, b| b.key.cmp(&a.key));
                if artifacts.is_empty() {
                    println!("  (none)");
                }
                for artifact in artifacts {
                    let name = artifact.key.rsplit('/').next().unwrap_or(&artifact.key);
                    let taken_at = naming::parse_artifact_timestamp(name)
                        .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                        .or_else(|| {
                            artifact
                                .last_modified
                                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                        })
                        .unwrap_or_else(|| "-".to_string());
                    println!(
                        "  {} | {:.2} MB | {}",
                        name,
                        artifact.size as f64 / (1024.0 * 1024.0),
                        taken_at
                    );
                }
            }
            Err(e) => eprintln!("⚠️ Failed to list remote backups: {}", e),
        }
    }

    Ok(())
}

/// Local artifacts as `(file name, size, embedded timestamp)`, newest first.
/// Files that do not follow the naming convention are skipped.
fn collect_local(backup_dir: &Path) -> Result<Vec<(String, u64, NaiveDateTime)>> {
    let mut artifacts = Vec::new();
    if !backup_dir.is_dir() {
        return Ok(artifacts);
    }

    for entry in fs::read_dir(backup_dir)? {
        let entry = entry?;
        let Ok(file_name) = entry.file_name().into_string() else {
            continue;
        };
        if let Some(taken_at) = naming::parse_artifact_timestamp(&file_name) {
            let size = entry.metadata()?.len();
            artifacts.push((file_name, size, taken_at));
        }
    }

    artifacts.sort_by(|a, b| b.0.cmp(&a.0));
    Ok(artifacts)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_local_sorts_newest_first_and_skips_foreign_files() {
        let dir = tempfile::tempdir().unwrap();
        for name in [
            "backup_appdb_20260810_020000.sql",
            "backup_appdb_20260830_020000.sql",
            "backup_appdb_20260820_020000.sql",
            "notes.txt",
        ] {
            std::fs::write(dir.path().join(name), b"x").unwrap();
        }

        let local = collect_local(dir.path()).unwrap();
        let names: Vec<&str> = local.iter().map(|(n, _, _)| n.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "backup_appdb_20260830_020000.sql",
                "backup_appdb_20260820_020000.sql",
                "backup_appdb_20260810_020000.sql",
            ]
        );
    }

    #[test]
    fn test_collect_local_missing_dir_is_empty() {
        assert!(collect_local(Path::new("./no-such-dir")).unwrap().is_empty());
    }
}
