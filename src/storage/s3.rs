// r2backup/src/storage/s3.rs
use async_trait::async_trait;
use aws_sdk_s3 as s3;
use chrono::{DateTime, Utc};
use s3::config::Region;
use s3::error::DisplayErrorContext;
use s3::primitives::ByteStream;
use s3::types::{CompletedMultipartUpload, CompletedPart};

use super::{BlobStore, RemoteArtifact};
use crate::config::RemoteConfig;
use crate::errors::{AppError, Result};

/// [`BlobStore`] backed by an S3-compatible service (Cloudflare R2 in the
/// original deployment).
pub struct S3BlobStore {
    client: s3::Client,
    bucket: String,
}

impl S3BlobStore {
    pub async fn connect(remote: &RemoteConfig) -> Self {
        let sdk_config = aws_config::defaults(s3::config::BehaviorVersion::latest())
            .endpoint_url(&remote.endpoint_url)
            .region(Region::new(remote.region.clone()))
            .credentials_provider(s3::config::Credentials::new(
                &remote.access_key_id,
                &remote.secret_access_key,
                None,     // session_token
                None,     // expiry
                "Static", // provider_name
            ))
            .load()
            .await;

        S3BlobStore {
            client: s3::Client::new(&sdk_config),
            bucket: remote.bucket.clone(),
        }
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| {
                AppError::Upload(format!(
                    "put_object {}/{}: {}",
                    self.bucket,
                    key,
                    DisplayErrorContext(&e)
                ))
            })?;
        Ok(())
    }

    async fn multipart_begin(&self, key: &str) -> Result<String> {
        let resp = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                AppError::Upload(format!(
                    "create_multipart_upload {}/{}: {}",
                    self.bucket,
                    key,
                    DisplayErrorContext(&e)
                ))
            })?;

        resp.upload_id()
            .map(str::to_string)
            .ok_or_else(|| AppError::Upload("store returned no upload id".to_string()))
    }

    async fn multipart_put_part(
        &self,
        key: &str,
        upload_id: &str,
        part_number: i32,
        bytes: Vec<u8>,
    ) -> Result<String> {
        let resp = self
            .client
            .upload_part()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .part_number(part_number)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .map_err(|e| {
                AppError::Upload(format!(
                    "upload_part {} of {}/{}: {}",
                    part_number,
                    self.bucket,
                    key,
                    DisplayErrorContext(&e)
                ))
            })?;

        resp.e_tag()
            .map(str::to_string)
            .ok_or_else(|| AppError::Upload(format!("part {} returned no etag", part_number)))
    }

    async fn multipart_complete(
        &self,
        key: &str,
        upload_id: &str,
        part_etags: Vec<String>,
    ) -> Result<()> {
        let parts: Vec<CompletedPart> = part_etags
            .into_iter()
            .enumerate()
            .map(|(i, etag)| {
                CompletedPart::builder()
                    .part_number(i as i32 + 1)
                    .e_tag(etag)
                    .build()
            })
            .collect();

        self.client
            .complete_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(
                CompletedMultipartUpload::builder()
                    .set_parts(Some(parts))
                    .build(),
            )
            .send()
            .await
            .map_err(|e| {
                AppError::Upload(format!(
                    "complete_multipart_upload {}/{}: {}",
                    self.bucket,
                    key,
                    DisplayErrorContext(&e)
                ))
            })?;
        Ok(())
    }

    async fn multipart_abort(&self, key: &str, upload_id: &str) -> Result<()> {
        self.client
            .abort_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .send()
            .await
            .map_err(|e| {
                AppError::Upload(format!(
                    "abort_multipart_upload {}/{}: {}",
                    self.bucket,
                    key,
                    DisplayErrorContext(&e)
                ))
            })?;
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<RemoteArtifact>> {
        let mut artifacts = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let mut request = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix);
            if let Some(token) = &continuation {
                request = request.continuation_token(token);
            }

            let resp = request.send().await.map_err(|e| {
                AppError::Storage(format!(
                    "list_objects_v2 {}/{}: {}",
                    self.bucket,
                    prefix,
                    DisplayErrorContext(&e)
                ))
            })?;

            for object in resp.contents() {
                let Some(key) = object.key() else { continue };
                artifacts.push(RemoteArtifact {
                    key: key.to_string(),
                    size: object.size().unwrap_or(0).max(0) as u64,
                    last_modified: object
                        .last_modified()
                        .and_then(|t| DateTime::<Utc>::from_timestamp(t.secs(), t.subsec_nanos())),
                });
            }

            match resp.next_continuation_token() {
                Some(token) => continuation = Some(token.to_string()),
                None => break,
            }
        }

        Ok(artifacts)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                AppError::Storage(format!(
                    "delete_object {}/{}: {}",
                    self.bucket,
                    key,
                    DisplayErrorContext(&e)
                ))
            })?;
        Ok(())
    }
}
