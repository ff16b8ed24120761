use std::path::PathBuf;

use async_trait::async_trait;
use reqwest::Client;
use tracing::{error, info};

use crate::error::ScrapeError;
use crate::settings::Settings;
use crate::table::QaTable;

const CSV_CONTENT_TYPE: &str = "text/csv";

/// Durable destination for serialized tables.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<(), ScrapeError>;

    /// Human-readable location, for logs.
    fn location(&self) -> String;
}

/// Writes blobs under a local directory, one file per key.
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl BlobStore for FsStore {
    async fn put(&self, key: &str, body: Vec<u8>, _content_type: &str) -> Result<(), ScrapeError> {
        let path = self.root.join(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, body).await?;
        Ok(())
    }

    fn location(&self) -> String {
        self.root.display().to_string()
    }
}

/// PUTs blobs to `{base_url}/{key}` (S3-compatible endpoints, presigned
/// prefixes, plain WebDAV).
pub struct HttpStore {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl HttpStore {
    pub fn new(client: Client, base_url: impl Into<String>, token: Option<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        }
    }
}

#[async_trait]
impl BlobStore for HttpStore {
    async fn put(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<(), ScrapeError> {
        let url = format!("{}/{}", self.base_url, key);
        let mut request = self
            .client
            .put(&url)
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(body);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let message = format!("PUT {} returned HTTP {}", url, status.as_u16());
            return Err(ScrapeError::Store(message));
        }
        Ok(())
    }

    fn location(&self) -> String {
        self.base_url.clone()
    }
}

/// Store selected by configuration: HTTP when `store_url` is set, else the
/// local directory.
pub fn from_settings(settings: &Settings, client: Client) -> Box<dyn BlobStore> {
    match &settings.store_url {
        Some(url) => Box::new(HttpStore::new(client, url.as_str(), settings.store_token.clone())),
        None => Box::new(FsStore::new(&settings.store_root)),
    }
}

/// Serialize the table to CSV and store it at `{folder}/{file_name}`.
/// Failures are logged and reported as `false`.
pub async fn upload_table(
    store: &dyn BlobStore,
    table: &QaTable,
    folder: &str,
    file_name: &str,
) -> bool {
    let key = format!("{}/{}", folder, file_name);
    let body = match table.to_csv() {
        Ok(b) => b,
        Err(e) => {
            error!("Error serializing table: {}", e);
            return false;
        }
    };
    match store.put(&key, body, CSV_CONTENT_TYPE).await {
        Ok(()) => {
            info!(
                rows = table.len(),
                "File {} uploaded successfully to {}/{}",
                file_name,
                store.location(),
                folder
            );
            true
        }
        Err(e) => {
            error!("Error uploading file: {}", e);
            false
        }
    }
}
