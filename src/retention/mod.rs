// r2backup/src/retention/mod.rs
use std::fs;
use std::path::Path;

use chrono::{Duration, NaiveDateTime};

use crate::errors::Result;
use crate::storage::BlobStore;
use crate::utils::naming;

#[derive(Debug)]
pub struct PruneFailure {
    pub identifier: String,
    pub reason: String,
}

/// Result of one pruning pass. Per-artifact failures are data, not errors:
/// one artifact that cannot be deleted must never mask the others.
#[derive(Debug, Default)]
pub struct PruneOutcome {
    pub deleted: Vec<String>,
    pub failures: Vec<PruneFailure>,
}

impl PruneOutcome {
    pub fn report(&self, scope: &str) {
        if !self.deleted.is_empty() {
            println!("  Removed {} old {} backup(s)", self.deleted.len(), scope);
        }
        for failure in &self.failures {
            eprintln!(
                "⚠️ Failed to remove {} backup {}: {}",
                scope, failure.identifier, failure.reason
            );
        }
    }
}

/// Pure expiry decision over `(identifier, embedded timestamp)` pairs.
///
/// An artifact is expired iff its age is strictly greater than `keep`;
/// age exactly equal to the threshold is retained.
pub fn select_expired(
    artifacts: &[(String, NaiveDateTime)],
    now: NaiveDateTime,
    keep: Duration,
) -> Vec<String> {
    artifacts
        .iter()
        .filter(|(_, taken_at)| now.signed_duration_since(*taken_at) > keep)
        .map(|(identifier, _)| identifier.clone())
        .collect()
}

/// Deletes local dump files older than `keep`, judging age by the timestamp
/// embedded in each file name. Files that do not follow the naming
/// convention are left alone.
pub fn prune_local(backup_dir: &Path, now: NaiveDateTime, keep: Duration) -> Result<PruneOutcome> {
    let mut outcome = PruneOutcome::default();
    if !backup_dir.is_dir() {
        return Ok(outcome);
    }

    let mut artifacts = Vec::new();
    for entry in fs::read_dir(backup_dir)? {
        let entry = entry?;
        let Ok(file_name) = entry.file_name().into_string() else {
            continue;
        };
        if let Some(taken_at) = naming::parse_artifact_timestamp(&file_name) {
            artifacts.push((file_name, taken_at));
        }
    }

    for file_name in select_expired(&artifacts, now, keep) {
        match fs::remove_file(backup_dir.join(&file_name)) {
            Ok(()) => outcome.deleted.push(file_name),
            Err(e) => outcome.failures.push(PruneFailure {
                identifier: file_name,
                reason: e.to_string(),
            }),
        }
    }

    Ok(outcome)
}

/// Deletes remote artifacts older than `keep` under `prefix`, judging age by
/// the timestamp embedded in the key's file name rather than object-store
/// metadata, so pruning stays deterministic across storage backends.
///
/// Only the listing call can fail here; deletions degrade per artifact.
pub async fn prune_remote(
    store: &dyn BlobStore,
    prefix: &str,
    now: NaiveDateTime,
    keep: Duration,
) -> Result<PruneOutcome> {
    let mut outcome = PruneOutcome::default();

    let listing = store.list(prefix).await?;
    let artifacts: Vec<(String, NaiveDateTime)> = listing
        .iter()
        .filter_map(|artifact| {
            let file_name = artifact.key.rsplit('/').next()?;
            naming::parse_artifact_timestamp(file_name).map(|taken_at| (artifact.key.clone(), taken_at))
        })
        .collect();

    for key in select_expired(&artifacts, now, keep) {
        match store.delete(&key).await {
            Ok(()) => outcome.deleted.push(key),
            Err(e) => outcome.failures.push(PruneFailure {
                identifier: key,
                reason: e.to_string(),
            }),
        }
    }

    Ok(outcome)
}
