use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_sdk_s3::{
    error::{ProvideErrorMetadata, SdkError},
    operation::put_object::PutObjectError,
    primitives::ByteStream,
};
use tracing::{info, warn};

use crate::domain::repositories::invoices::InvoiceStorage;

use super::s3::{S3Config, build_s3_client, is_retryable_s3_error};

const INVOICE_CONTENT_TYPE: &str = "application/pdf";

#[derive(Debug, Clone)]
pub struct InvoiceStorageConfig {
    pub endpoint: String,
    pub region: String,
    pub bucket: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    /// Base of the links handed out for stored invoices. Defaults to
    /// `{endpoint}/{bucket}` when empty.
    pub public_base_url: String,
    pub prefix: String,
}

/// Keeps rendered invoices in an S3-compatible bucket.
pub struct S3InvoiceStorage {
    client: aws_sdk_s3::Client,
    bucket: String,
    prefix: String,
    public_base_url: String,
}

impl S3InvoiceStorage {
    pub async fn new(config: InvoiceStorageConfig) -> Result<Self> {
        let public_base_url = public_base_url(&config);

        let client = build_s3_client(&S3Config::new(
            config.endpoint,
            config.region,
            config.access_key_id,
            config.secret_access_key,
        ))
        .await
        .context("failed to build invoice storage s3 client")?;

        Ok(Self {
            client,
            bucket: config.bucket,
            prefix: normalize_prefix(&config.prefix),
            public_base_url,
        })
    }

    fn object_key(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key.trim_start_matches('/'))
    }
}

#[async_trait]
impl InvoiceStorage for S3InvoiceStorage {
    async fn store(&self, key: &str, bytes: Vec<u8>) -> Result<String> {
        let object_key = self.object_key(key);
        let size = bytes.len();

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&object_key)
            .body(ByteStream::from(bytes))
            .content_type(INVOICE_CONTENT_TYPE)
            .send()
            .await
            .map_err(|err| map_put_object_error(err, &self.bucket, &object_key))?;

        info!(
            bucket = %self.bucket,
            object_key = %object_key,
            size,
            "payments: invoice stored"
        );

        Ok(format!("{}/{}", self.public_base_url, object_key))
    }
}

fn public_base_url(config: &InvoiceStorageConfig) -> String {
    let base = config.public_base_url.trim();
    if base.is_empty() {
        format!(
            "{}/{}",
            config.endpoint.trim_end_matches('/'),
            config.bucket.trim_matches('/')
        )
    } else {
        base.trim_end_matches('/').to_string()
    }
}

fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{}/", trimmed)
    }
}

fn map_put_object_error(
    err: SdkError<PutObjectError>,
    bucket: &str,
    object_key: &str,
) -> anyhow::Error {
    let retryable = is_retryable_s3_error(&err);

    if let SdkError::ServiceError(service_err) = &err {
        let status = service_err.raw().status().as_u16();
        let code = service_err.err().code().unwrap_or("unknown");
        let message = service_err.err().message().unwrap_or_default();

        warn!(
            bucket = %bucket,
            object_key = %object_key,
            status,
            code = %code,
            retryable,
            "payments: invoice upload rejected"
        );

        let mut detail = format!(
            "failed to upload invoice (status {}, code {})",
            status, code
        );
        if !message.is_empty() {
            detail.push_str(&format!(": {}", message));
        }
        detail.push_str(&format!(" [bucket={}, key={}]", bucket, object_key));

        return anyhow::anyhow!(detail);
    }

    warn!(
        bucket = %bucket,
        object_key = %object_key,
        retryable,
        "payments: invoice upload failed"
    );
    anyhow::Error::new(err).context("failed to upload invoice")
}
