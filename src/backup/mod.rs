pub(crate) mod db_dump;
pub(crate) mod hasher;
mod logic;

use anyhow::Result;

use crate::config::AppConfig;
use crate::storage::s3::S3BlobStore;
use logic::RemoteTarget;

/// Public entry point for the backup flow: wires the Docker dump producer
/// and the S3 store (when configured) into the orchestration.
pub async fn run_backup_flow(config: &AppConfig, force: bool) -> Result<()> {
    let producer = db_dump::DockerPgDump::from_config(config);

    match &config.remote {
        Some(remote_config) => {
            let store = S3BlobStore::connect(remote_config).await;
            let target = RemoteTarget {
                store: &store,
                prefix: &remote_config.prefix,
            };
            logic::perform_backup_orchestration(config, &producer, Some(target), force).await
        }
        None => logic::perform_backup_orchestration(config, &producer, None, force).await,
    }
}
