// r2backup/src/backup/logic.rs
use anyhow::{Context, Result};
use chrono::{Local, Utc};

use crate::backup::db_dump::DumpProducer;
use crate::backup::hasher;
use crate::config::AppConfig;
use crate::errors::AppError;
use crate::retention;
use crate::state::{BackupState, StateStore};
use crate::storage::{self, BlobStore};
use crate::utils::lock::RunLock;

/// Remote side of a run: the store plus the key prefix artifacts live under.
pub struct RemoteTarget<'a> {
    pub store: &'a dyn BlobStore,
    pub prefix: &'a str,
}

/// Change detection policy. Pure so the decision is testable in isolation:
/// upload iff forced, no prior state exists, or the fingerprint moved.
pub fn should_upload(current_fingerprint: &str, stored: Option<&BackupState>, force: bool) -> bool {
    force || stored.map_or(true, |state| state.last_hash != current_fingerprint)
}

fn remote_key(prefix: &str, file_name: &str) -> String {
    if prefix.is_empty() {
        file_name.to_string()
    } else {
        format!("{}/{}", prefix, file_name)
    }
}

/// Runs one backup: dump, hash, decide, upload if needed, persist state,
/// prune. Strictly sequential; the whole run is one critical section guarded
/// by a lock file next to the state file.
///
/// Dump and upload failures are fatal and leave the state record untouched,
/// so the next run retries against the same comparison baseline. Everything
/// after a successful upload degrades gracefully.
pub async fn perform_backup_orchestration(
    config: &AppConfig,
    producer: &dyn DumpProducer,
    remote: Option<RemoteTarget<'_>>,
    force: bool,
) -> Result<()> {
    println!("==================================================");
    println!("  INCREMENTAL BACKUP");
    println!("  {}", Local::now().format("%Y-%m-%d %H:%M:%S"));
    println!("==================================================");

    if let Some(parent) = config.state_file.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let _lock = RunLock::acquire(&config.state_file.with_extension("lock"))?;

    let state_store = StateStore::new(&config.state_file);
    let prior = match state_store.load() {
        Ok(prior) => prior,
        Err(e @ AppError::CorruptState(_)) => {
            eprintln!("⚠️ {} — treating as no prior backup", e);
            None
        }
        Err(e) => return Err(e.into()),
    };

    // Dumping. Fatal: no state update, no pruning, last-known-good preserved.
    let dump_path = producer.produce(&config.backup_dir).await?;
    let file_name = dump_path
        .file_name()
        .and_then(|n| n.to_str())
        .context("dump producer returned a path without a valid file name")?
        .to_string();

    // Hashing.
    let fingerprint = hasher::hash_file(&dump_path)?;

    // Deciding.
    if should_upload(&fingerprint, prior.as_ref(), force) {
        match &remote {
            Some(target) => {
                println!("\n  Changes detected");
                let key = remote_key(target.prefix, &file_name);
                println!("\nUploading to object storage...");
                let sent = storage::upload_file(target.store, &key, &dump_path).await?;
                println!("  Done: {} ({} bytes)", key, sent);

                // UpdatingState: only after the upload durably completed.
                state_store.save(&BackupState::new(
                    fingerprint,
                    Utc::now(),
                    file_name.clone(),
                ))?;
            }
            None => {
                // Local-only mode: state records successful uploads, so it
                // stays untouched here.
                println!("\n⚠️ Remote storage not configured, skipping upload");
            }
        }
    } else {
        println!("\n  No changes since last upload, skipping");
        // The redundant dump is dropped right away; older dumps are left to
        // the retention pass below.
        if let Err(e) = std::fs::remove_file(&dump_path) {
            eprintln!("⚠️ Failed to remove redundant dump {}: {}", dump_path.display(), e);
        }
    }

    // Pruning always runs, even on the skip path, and is never fatal.
    println!("\nCleanup:");
    let now = Local::now().naive_local();
    match retention::prune_local(&config.backup_dir, now, config.keep_local) {
        Ok(outcome) => outcome.report("local"),
        Err(e) => eprintln!("⚠️ Local cleanup failed: {}", e),
    }
    if let Some(target) = &remote {
        let list_prefix = if target.prefix.is_empty() {
            String::new()
        } else {
            format!("{}/", target.prefix)
        };
        match retention::prune_remote(target.store, &list_prefix, now, config.keep_remote).await {
            Ok(outcome) => outcome.report("remote"),
            Err(e) => eprintln!("⚠️ Remote cleanup failed: {}", e),
        }
    }

    println!("\n✅ Backup run completed");
    Ok(())
}
