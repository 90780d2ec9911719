//! Yandex.Disk REST backend.
//!
//! Talks to `cloud-api.yandex.net/v1/disk`: `GET /resources` to list a
//! folder, `GET /resources/download` to resolve a one-shot download href,
//! then a plain streamed `GET` of that href.

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{BoxStream, StreamExt, TryStreamExt};
use serde::Deserialize;

use crate::driver::{ByteStream, EntryKind, StorageDriver, StorageEntry};
use crate::error::{Result, StorageError};

const BASE_URL: &str = "https://cloud-api.yandex.net/v1/disk";
const LIST_PAGE_SIZE: u32 = 200;

pub struct YandexDiskStorage {
    client: reqwest::Client,
    oauth_token: String,
}

impl YandexDiskStorage {
    pub fn new(oauth_token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(30))
                .build()
                .expect("reqwest client builds with default TLS backend"),
            oauth_token: oauth_token.into(),
        }
    }

    fn auth_header(&self) -> String {
        format!("OAuth {}", self.oauth_token)
    }

    async fn get_download_url(&self, path: &str) -> Result<String> {
        let resp = self
            .client
            .get(format!("{BASE_URL}/resources/download"))
            .header("Authorization", self.auth_header())
            .query(&[("path", path)])
            .send()
            .await?;

        let resp = map_status(resp).await?;
        let body: DownloadHrefResponse = resp.json().await?;
        body.href
            .ok_or_else(|| StorageError::NotFound(format!("no download href for {path}")))
    }
}

#[async_trait]
impl StorageDriver for YandexDiskStorage {
    async fn list(&self, path: &str) -> Result<Vec<StorageEntry>> {
        let mut out = Vec::new();
        let mut offset = 0u32;
        loop {
            let resp = self
                .client
                .get(format!("{BASE_URL}/resources"))
                .header("Authorization", self.auth_header())
                .query(&[
                    ("path", path.to_string()),
                    ("limit", LIST_PAGE_SIZE.to_string()),
                    ("offset", offset.to_string()),
                ])
                .send()
                .await?;
            let resp = map_status(resp).await?;
            let body: ResourceListResponse = resp.json().await?;
            let items = body.embedded.map(|e| e.items).unwrap_or_default();
            let page_len = items.len();

            out.extend(items.into_iter().map(|item| StorageEntry {
                name: item.name,
                path: item.path,
                kind: if item.kind == "dir" {
                    EntryKind::Folder
                } else {
                    EntryKind::File
                },
                size_bytes: item.size,
                content_fingerprint: item.md5,
            }));

            if page_len < LIST_PAGE_SIZE as usize {
                break;
            }
            offset += LIST_PAGE_SIZE;
        }
        Ok(out)
    }

    async fn stream(&self, path: &str) -> Result<ByteStream> {
        let href = self.get_download_url(path).await?;
        let resp = self.client.get(href).send().await?;
        let resp = map_status(resp).await?;

        let stream: BoxStream<'static, Result<Bytes>> = resp
            .bytes_stream()
            .map_err(StorageError::from)
            .boxed();
        Ok(stream)
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

async fn map_status(resp: reqwest::Response) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    match status.as_u16() {
        404 => Err(StorageError::NotFound(body)),
        401 | 403 => Err(StorageError::Denied(body)),
        429 | 500..=599 => Err(StorageError::Transient(body)),
        _ => Err(StorageError::Transient(format!("{status}: {body}"))),
    }
}

#[derive(Debug, Deserialize)]
struct DownloadHrefResponse {
    href: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResourceListResponse {
    #[serde(rename = "_embedded")]
    embedded: Option<EmbeddedItems>,
}

#[derive(Debug, Deserialize)]
struct EmbeddedItems {
    items: Vec<ResourceItem>,
}

#[derive(Debug, Deserialize)]
struct ResourceItem {
    name: String,
    path: String,
    #[serde(rename = "type")]
    kind: String,
    size: Option<i64>,
    md5: Option<String>,
}
