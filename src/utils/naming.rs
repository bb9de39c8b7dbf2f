// r2backup/src/utils/naming.rs
//
// Artifact naming convention: backup_{db}_{YYYYMMDD_HHMMSS}.sql
// The embedded timestamp is the only source of truth for artifact age and
// ordering; filesystem mtimes and object-store metadata are never consulted.

use chrono::NaiveDateTime;

const PREFIX: &str = "backup_";
const SUFFIX: &str = ".sql";
const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
// e.g. 20260830_142501
const TIMESTAMP_LEN: usize = 15;

/// Builds the artifact file name for a dump of `db_name` taken at `taken_at`.
pub fn artifact_file_name(db_name: &str, taken_at: NaiveDateTime) -> String {
    format!(
        "{}{}_{}{}",
        PREFIX,
        db_name,
        taken_at.format(TIMESTAMP_FORMAT),
        SUFFIX
    )
}

/// Extracts the embedded creation timestamp from an artifact file name.
///
/// Returns `None` for names that do not follow the convention, so callers
/// can skip foreign files found next to backups instead of failing.
pub fn parse_artifact_timestamp(file_name: &str) -> Option<NaiveDateTime> {
    let stem = file_name.strip_prefix(PREFIX)?.strip_suffix(SUFFIX)?;
    if stem.len() <= TIMESTAMP_LEN {
        return None;
    }
    let (head, ts) = stem.split_at(stem.len() - TIMESTAMP_LEN);
    if !head.ends_with('_') {
        return None;
    }
    NaiveDateTime::parse_from_str(ts, TIMESTAMP_FORMAT).ok()
}
