// r2backup/src/config/mod.rs
use std::collections::HashMap;
use std::path::PathBuf;

use chrono::Duration;

use crate::errors::{AppError, Result};

const DEFAULT_CONTAINER_NAME: &str = "postgres";
const DEFAULT_BACKUP_DIR: &str = "./dumps";
const DEFAULT_STATE_FILE: &str = "./backup_state.json";
const DEFAULT_REMOTE_PREFIX: &str = "backups";
const DEFAULT_KEEP_LOCAL_DAYS: u64 = 7;
const DEFAULT_KEEP_REMOTE_DAYS: u64 = 30;
// 100 years; anything past this is a typo, and it keeps the value well
// inside the range chrono::Duration::days accepts.
const MAX_KEEP_DAYS: u64 = 36_500;

/// Connection settings for the S3-compatible object store (Cloudflare R2).
///
/// All four required values must be present together; the endpoint is derived
/// from the account id.
#[derive(Debug, Clone)]
pub struct RemoteConfig {
    pub endpoint_url: String,
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub bucket: String,
    pub prefix: String,
}

/// Validated application configuration, parsed once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub container_name: String,
    pub db_name: String,
    pub db_user: String,
    pub backup_dir: PathBuf,
    pub state_file: PathBuf,
    pub remote: Option<RemoteConfig>,
    pub keep_local: Duration,
    pub keep_remote: Duration,
}

impl AppConfig {
    /// Loads configuration from the process environment (after dotenv).
    pub fn from_env() -> Result<Self> {
        let vars: HashMap<String, String> = std::env::vars().collect();
        Self::from_vars(&vars)
    }

    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self> {
        let get = |key: &str| vars.get(key).map(|v| v.trim()).filter(|v| !v.is_empty());

        let require = |key: &str| {
            get(key)
                .map(str::to_string)
                .ok_or_else(|| AppError::Config(format!("{} must be set", key)))
        };

        let db_name = require("DB_NAME")?;
        let db_user = require("DB_USER")?;
        let container_name = get("CONTAINER_NAME")
            .unwrap_or(DEFAULT_CONTAINER_NAME)
            .to_string();

        for (label, value) in [
            ("CONTAINER_NAME", &container_name),
            ("DB_NAME", &db_name),
            ("DB_USER", &db_user),
        ] {
            if value
                .contains(|c: char| !c.is_alphanumeric() && c != '_' && c != '-' && c != '.')
            {
                return Err(AppError::Config(format!(
                    "Invalid character in {}: {:?}",
                    label, value
                )));
            }
        }

        let backup_dir = PathBuf::from(get("LOCAL_BACKUP_DIR").unwrap_or(DEFAULT_BACKUP_DIR));
        let state_file = PathBuf::from(get("STATE_FILE").unwrap_or(DEFAULT_STATE_FILE));

        let keep_local = parse_keep_days(get("KEEP_LOCAL_DAYS"), "KEEP_LOCAL_DAYS", DEFAULT_KEEP_LOCAL_DAYS)?;
        let keep_remote = parse_keep_days(get("KEEP_REMOTE_DAYS"), "KEEP_REMOTE_DAYS", DEFAULT_KEEP_REMOTE_DAYS)?;

        let remote = load_remote_config(&get)?;

        Ok(AppConfig {
            container_name,
            db_name,
            db_user,
            backup_dir,
            state_file,
            remote,
            keep_local,
            keep_remote,
        })
    }
}

/// Settings for the read-only listing flow. Listing never touches the
/// database, so DB_NAME and DB_USER are not required here.
#[derive(Debug, Clone)]
pub struct ListConfig {
    pub backup_dir: PathBuf,
    pub remote: Option<RemoteConfig>,
}

impl ListConfig {
    pub fn from_env() -> Result<Self> {
        let vars: HashMap<String, String> = std::env::vars().collect();
        Self::from_vars(&vars)
    }

    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self> {
        let get = |key: &str| vars.get(key).map(|v| v.trim()).filter(|v| !v.is_empty());

        Ok(ListConfig {
            backup_dir: PathBuf::from(get("LOCAL_BACKUP_DIR").unwrap_or(DEFAULT_BACKUP_DIR)),
            remote: load_remote_config(&get)?,
        })
    }
}

/// The four R2 credentials form a unit: all present enables uploads, none
/// present means local-only mode, and a partial set is rejected at startup
/// rather than silently disabling the remote side of a backup tool.
fn load_remote_config<'a>(
    get: &impl Fn(&str) -> Option<&'a str>,
) -> Result<Option<RemoteConfig>> {
    const REQUIRED: [&str; 4] = [
        "R2_ACCOUNT_ID",
        "R2_ACCESS_KEY_ID",
        "R2_SECRET_ACCESS_KEY",
        "R2_BUCKET_NAME",
    ];

    if let (Some(account_id), Some(access_key_id), Some(secret_access_key), Some(bucket)) = (
        get("R2_ACCOUNT_ID"),
        get("R2_ACCESS_KEY_ID"),
        get("R2_SECRET_ACCESS_KEY"),
        get("R2_BUCKET_NAME"),
    ) {
        return Ok(Some(RemoteConfig {
            endpoint_url: format!("https://{}.r2.cloudflarestorage.com", account_id),
            region: "auto".to_string(),
            access_key_id: access_key_id.to_string(),
            secret_access_key: secret_access_key.to_string(),
            bucket: bucket.to_string(),
            prefix: get("R2_PREFIX")
                .unwrap_or(DEFAULT_REMOTE_PREFIX)
                .trim_matches('/')
                .to_string(),
        }));
    }

    let present: Vec<&str> = REQUIRED.iter().copied().filter(|k| get(k).is_some()).collect();
    if present.is_empty() {
        return Ok(None);
    }
    let missing: Vec<&str> = REQUIRED
        .iter()
        .copied()
        .filter(|k| get(k).is_none())
        .collect();
    Err(AppError::Config(format!(
        "Incomplete R2 configuration: {} set but {} missing",
        present.join(", "),
        missing.join(", ")
    )))
}

fn parse_keep_days(raw: Option<&str>, key: &str, default: u64) -> Result<Duration> {
    let days = match raw {
        Some(v) => v.parse::<u64>().map_err(|e| {
            AppError::Config(format!("{} must be a non-negative number of days: {}", key, e))
        })?,
        None => default,
    };
    if days > MAX_KEEP_DAYS {
        return Err(AppError::Config(format!(
            "{} must be at most {} days, got {}",
            key, MAX_KEEP_DAYS, days
        )));
    }
    Ok(Duration::days(days as i64))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_vars() -> HashMap<String, String> {
        [("DB_NAME", "appdb"), ("DB_USER", "app")]
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn with_remote(mut vars: HashMap<String, String>) -> HashMap<String, String> {
        for (k, v) in [
            ("R2_ACCOUNT_ID", "acct123"),
            ("R2_ACCESS_KEY_ID", "key"),
            ("R2_SECRET_ACCESS_KEY", "secret"),
            ("R2_BUCKET_NAME", "db-backups"),
        ] {
            vars.insert(k.to_string(), v.to_string());
        }
        vars
    }

    #[test]
    fn test_defaults_applied() {
        let config = AppConfig::from_vars(&base_vars()).unwrap();
        assert_eq!(config.container_name, "postgres");
        assert_eq!(config.backup_dir, PathBuf::from("./dumps"));
        assert_eq!(config.state_file, PathBuf::from("./backup_state.json"));
        assert_eq!(config.keep_local, Duration::days(7));
        assert_eq!(config.keep_remote, Duration::days(30));
        assert!(config.remote.is_none());
    }

    #[test]
    fn test_missing_db_name_rejected() {
        let mut vars = base_vars();
        vars.remove("DB_NAME");
        match AppConfig::from_vars(&vars) {
            Err(AppError::Config(msg)) => assert!(msg.contains("DB_NAME")),
            other => panic!("expected Config error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_full_remote_config() {
        let config = AppConfig::from_vars(&with_remote(base_vars())).unwrap();
        let remote = config.remote.expect("remote should be configured");
        assert_eq!(
            remote.endpoint_url,
            "https://acct123.r2.cloudflarestorage.com"
        );
        assert_eq!(remote.region, "auto");
        assert_eq!(remote.bucket, "db-backups");
        assert_eq!(remote.prefix, "backups");
    }

    #[test]
    fn test_partial_remote_config_rejected() {
        let mut vars = with_remote(base_vars());
        vars.remove("R2_SECRET_ACCESS_KEY");
        match AppConfig::from_vars(&vars) {
            Err(AppError::Config(msg)) => assert!(msg.contains("R2_SECRET_ACCESS_KEY")),
            other => panic!("expected Config error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_prefix_slashes_trimmed() {
        let mut vars = with_remote(base_vars());
        vars.insert("R2_PREFIX".to_string(), "/nightly/".to_string());
        let config = AppConfig::from_vars(&vars).unwrap();
        assert_eq!(config.remote.unwrap().prefix, "nightly");
    }

    #[test]
    fn test_bad_keep_days_rejected() {
        let mut vars = base_vars();
        vars.insert("KEEP_LOCAL_DAYS".to_string(), "-3".to_string());
        assert!(AppConfig::from_vars(&vars).is_err());

        let mut vars = base_vars();
        vars.insert("KEEP_REMOTE_DAYS".to_string(), "soon".to_string());
        assert!(AppConfig::from_vars(&vars).is_err());
    }

    #[test]
    fn test_oversized_keep_days_rejected() {
        // u64 values that fit the parse but not a sane retention window used
        // to wrap or overflow once converted to a signed day count.
        for value in ["18446744073709551611", "9223372036854775807", "200000000000"] {
            let mut vars = base_vars();
            vars.insert("KEEP_LOCAL_DAYS".to_string(), value.to_string());
            match AppConfig::from_vars(&vars) {
                Err(AppError::Config(msg)) => assert!(msg.contains("KEEP_LOCAL_DAYS")),
                other => panic!("expected Config error for {}, got {:?}", value, other.map(|_| ())),
            }
        }
    }

    #[test]
    fn test_max_keep_days_accepted() {
        let mut vars = base_vars();
        vars.insert("KEEP_REMOTE_DAYS".to_string(), "36500".to_string());
        let config = AppConfig::from_vars(&vars).unwrap();
        assert_eq!(config.keep_remote, Duration::days(36_500));
    }

    #[test]
    fn test_list_config_needs_no_db_settings() {
        let config = ListConfig::from_vars(&HashMap::new()).unwrap();
        assert_eq!(config.backup_dir, PathBuf::from("./dumps"));
        assert!(config.remote.is_none());

        let config = ListConfig::from_vars(&with_remote(HashMap::new())).unwrap();
        assert_eq!(config.remote.unwrap().bucket, "db-backups");
    }

    #[test]
    fn test_list_config_partial_remote_rejected() {
        let mut vars = with_remote(HashMap::new());
        vars.remove("R2_BUCKET_NAME");
        assert!(ListConfig::from_vars(&vars).is_err());
    }

    #[test]
    fn test_zero_keep_days_allowed() {
        let mut vars = base_vars();
        vars.insert("KEEP_LOCAL_DAYS".to_string(), "0".to_string());
        let config = AppConfig::from_vars(&vars).unwrap();
        assert_eq!(config.keep_local, Duration::days(0));
    }

    #[test]
    fn test_container_name_charset_checked() {
        let mut vars = base_vars();
        vars.insert(
            "CONTAINER_NAME".to_string(),
            "pg; rm -rf /".to_string(),
        );
        assert!(AppConfig::from_vars(&vars).is_err());
    }
}
