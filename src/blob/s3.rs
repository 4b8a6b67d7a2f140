//! S3-backed blob store.
//!
//! Presigns against AWS S3 or any S3-compatible endpoint (MinIO, R2). One
//! client is built at startup from [`StorageConfig`] and shared.

use super::{content_disposition, BlobError, BlobStore, Disposition};
use crate::api::PartRef;
use crate::config::StorageConfig;
use async_trait::async_trait;
use aws_credential_types::provider::SharedCredentialsProvider;
use aws_credential_types::Credentials;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart};
use aws_sdk_s3::Client;
use std::time::Duration;

/// S3 [`BlobStore`] implementation.
pub struct S3BlobStore {
    client: Client,
    bucket: String,
}

impl S3BlobStore {
    /// Build a client from storage configuration.
    ///
    /// Static credentials from the config win over the ambient environment;
    /// a custom endpoint switches to path-style addressing, which MinIO and
    /// most S3-compatible stores expect.
    pub async fn new(config: &StorageConfig) -> Self {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(aws_config::Region::new(config.region.clone()));

        if let (Some(access_key), Some(secret_key)) = (&config.access_key, &config.secret_key) {
            let credentials =
                Credentials::new(access_key.clone(), secret_key.clone(), None, None, "static");
            loader = loader.credentials_provider(SharedCredentialsProvider::new(credentials));
        }

        let sdk_config = loader.load().await;
        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config);
        if let Some(ref endpoint) = config.endpoint {
            builder = builder.endpoint_url(endpoint).force_path_style(true);
        }

        Self {
            client: Client::from_conf(builder.build()),
            bucket: config.bucket.clone(),
        }
    }

    fn presign_config(ttl: Duration) -> Result<PresigningConfig, BlobError> {
        PresigningConfig::expires_in(ttl).map_err(|e| BlobError::Presign(e.to_string()))
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    #[tracing::instrument(name = "blob.issue_put_url", skip(self), fields(bucket = %self.bucket), err)]
    async fn issue_put_url(
        &self,
        key: &str,
        mime_type: &str,
        ttl: Duration,
    ) -> Result<String, BlobError> {
        let presigned = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(mime_type)
            .presigned(Self::presign_config(ttl)?)
            .await
            .map_err(|e| BlobError::Presign(e.to_string()))?;

        Ok(presigned.uri().to_string())
    }

    #[tracing::instrument(name = "blob.begin_multipart", skip(self), fields(bucket = %self.bucket), err)]
    async fn begin_multipart(&self, key: &str, mime_type: &str) -> Result<String, BlobError> {
        let output = self
            .client
            .create_multipart_upload()
            .bucket(&self.bucket)
            .key(key)
            .content_type(mime_type)
            .send()
            .await
            .map_err(|e| BlobError::Storage(e.to_string()))?;

        let upload_id = output.upload_id().ok_or(BlobError::MissingUploadId)?;

        tracing::info!(key, upload_id, "Started multipart transaction");
        Ok(upload_id.to_string())
    }

    #[tracing::instrument(
        name = "blob.issue_part_put_url",
        skip(self),
        fields(bucket = %self.bucket, part_number),
        err
    )]
    async fn issue_part_put_url(
        &self,
        key: &str,
        upload_id: &str,
        part_number: u32,
        ttl: Duration,
    ) -> Result<String, BlobError> {
        let presigned = self
            .client
            .upload_part()
            .bucket(&self.bucket)
            .key(key)
            .upload_id(upload_id)
            .part_number(part_number as i32)
            .presigned(Self::presign_config(ttl)?)
            .await
            .map_err(|e| BlobError::Presign(e.to_string()))?;

        Ok(presigned.uri().to_string())
    }

    #[tracing::instrument(
        name = "blob.complete_multipart",
        skip(self, parts),
        fields(bucket = %self.bucket, parts_count = parts.len()),
        err
    )]
    async fn complete_multipart(
        &self,
        key: &str,
        upload_id: &str,
        parts: &[PartRef],
    ) -> Result<(), BlobError> {
        let completed: Vec<CompletedPart> = parts
            .iter()
            .map(|p| {
                CompletedPart::builder()
                    .part_number(p.part_number as i32)
                    .e_tag(&p.etag)
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
                    .set_parts(Some(completed))
                    .build(),
            )
            .send()
            .await
            .map_err(|e| BlobError::Storage(e.to_string()))?;

        tracing::info!(key, upload_id, parts = parts.len(), "Completed multipart transaction");
        Ok(())
    }

    #[tracing::instrument(name = "blob.issue_get_url", skip(self), fields(bucket = %self.bucket), err)]
    async fn issue_get_url(
        &self,
        key: &str,
        file_name: &str,
        ttl: Duration,
        disposition: Disposition,
    ) -> Result<String, BlobError> {
        let presigned = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .response_content_disposition(content_disposition(disposition, file_name))
            .presigned(Self::presign_config(ttl)?)
            .await
            .map_err(|e| BlobError::Presign(e.to_string()))?;

        Ok(presigned.uri().to_string())
    }

    #[tracing::instrument(name = "blob.delete_object", skip(self), fields(bucket = %self.bucket), err)]
    async fn delete_object(&self, key: &str) -> Result<(), BlobError> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| BlobError::Storage(e.to_string()))?;

        Ok(())
    }
}
