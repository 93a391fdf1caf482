//! Object storage for uploaded documents, on an S3 compatible bucket.
use rusoto_core::credential::{AwsCredentials, StaticProvider};
use rusoto_core::{HttpClient, Region};
use rusoto_s3::util::{PreSignedRequest, PreSignedRequestOption};
use rusoto_s3::{DeleteObjectRequest, GetObjectRequest, PutObjectRequest, S3Client, S3};
use std::str::FromStr;
use std::sync::OnceLock;
use std::time::Duration;
use uuid::Uuid;

use crate::base::{Config, SRError, SRResult};

pub struct Storage {
    client: OnceLock<S3Client>,
    region: Region,
    credentials: AwsCredentials,
    bucket: String,
    url_lifespan: Duration,
}

impl Storage {
    pub fn new(config: &Config) -> SRResult<Self> {
        let region = match &config.storage_endpoint {
            Some(endpoint) => Region::Custom { name: config.storage_region.clone(), endpoint: endpoint.clone() },
            None => Region::from_str(&config.storage_region).map_err(|e| SRError::StorageError(e.to_string()))?,
        };
        Ok(Storage {
            client: OnceLock::new(),
            region,
            credentials: AwsCredentials::new(config.storage_access_key.clone(), config.storage_secret_key.clone(), None, None),
            bucket: config.storage_bucket.clone(),
            url_lifespan: Duration::from_secs(config.signed_url_minutes * 60),
        })
    }

    /// The S3 client is built on first use, TLS roots are only loaded then.
    fn client(&self) -> SRResult<&S3Client> {
        if let Some(client) = self.client.get() {
            return Ok(client);
        }
        let http = HttpClient::new().map_err(|e| SRError::StorageError(e.to_string()))?;
        let provider = StaticProvider::new_minimal(self.credentials.aws_access_key_id().to_owned(), self.credentials.aws_secret_access_key().to_owned());
        Ok(self.client.get_or_init(|| S3Client::new_with(http, provider, self.region.clone())))
    }

    pub async fn put(&self, key: &str, data: Vec<u8>, mime: Option<String>) -> SRResult<()> {
        self.client()?.put_object(PutObjectRequest {
            bucket: self.bucket.clone(),
            key: key.to_owned(),
            content_length: Some(data.len() as i64),
            body: Some(data.into()),
            content_type: mime,
            ..Default::default()
        }).await?;
        Ok(())
    }

    pub async fn delete(&self, key: &str) -> SRResult<()> {
        self.client()?.delete_object(DeleteObjectRequest {
            bucket: self.bucket.clone(),
            key: key.to_owned(),
            ..Default::default()
        }).await?;
        Ok(())
    }

    /// A GET URL for the object, valid for the configured lifespan.
    pub fn signed_url(&self, key: &str, file_name: &str) -> String {
        GetObjectRequest {
            bucket: self.bucket.clone(),
            key: key.to_owned(),
            response_content_disposition: Some(format!("attachment; filename=\"{}\"", sanitize_name(file_name))),
            ..Default::default()
        }.get_presigned_url(&self.region, &self.credentials, &PreSignedRequestOption { expires_in: self.url_lifespan })
    }
}

/// Keeps file names safe for object keys and headers.
pub fn sanitize_name(name: &str) -> String {
    let base = name.rsplit(|c| c == '/' || c == '\\').next().unwrap_or(name);
    let cleaned: String = base
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '.' || c == '-' || c == '_' { c } else { '_' })
        .collect();
    let trimmed = cleaned.trim_matches('.');
    if trimmed.is_empty() {
        String::from("document")
    } else {
        trimmed.chars().take(120).collect()
    }
}

pub fn object_key(owner: Uuid, doc_id: Uuid, name: &str) -> String {
    format!("{}/{}/{}", owner, doc_id, sanitize_name(name))
}
