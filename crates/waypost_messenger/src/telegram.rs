//! Telegram Bot API backend.
//!
//! Three calls cover the whole contract: `sendMessage` for plain text,
//! multipart `sendDocument` with a fresh file for an upload, and JSON
//! `sendDocument` with a `file_id` to replay a cached handle. The
//! `(file_id, file_unique_id)` pair Telegram returns is exactly the
//! "content handle" pair in spec §3/§4.4.

use std::path::Path;

use serde::Deserialize;

use crate::driver::{ContentHandle, MessengerDriver};
use crate::error::{MessengerError, Result};

const BASE_URL: &str = "https://api.telegram.org";

pub struct TelegramMessenger {
    client: reqwest::Client,
    bot_token: String,
}

impl TelegramMessenger {
    pub fn new(bot_token: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(60))
                .build()
                .expect("reqwest client builds with default TLS backend"),
            bot_token: bot_token.into(),
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{BASE_URL}/bot{}/{method}", self.bot_token)
    }
}

#[async_trait::async_trait]
impl MessengerDriver for TelegramMessenger {
    async fn send_text(&self, chat_id: i64, text: &str) -> Result<()> {
        let resp = self
            .client
            .post(self.method_url("sendMessage"))
            .json(&serde_json::json!({ "chat_id": chat_id, "text": text }))
            .send()
            .await?;
        parse_envelope::<serde_json::Value>(resp).await?;
        Ok(())
    }

    async fn send_file(&self, chat_id: i64, local_path: &Path, caption: &str) -> Result<ContentHandle> {
        let bytes = tokio::fs::read(local_path).await?;
        let file_name = local_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "file".to_string());

        let part = reqwest::multipart::Part::bytes(bytes).file_name(file_name);
        let form = reqwest::multipart::Form::new()
            .text("chat_id", chat_id.to_string())
            .text("caption", caption.to_string())
            .part("document", part);

        let resp = self
            .client
            .post(self.method_url("sendDocument"))
            .multipart(form)
            .send()
            .await?;
        let envelope = parse_envelope::<SendDocumentResult>(resp).await?;
        document_handle(envelope)
    }

    async fn send_by_handle(&self, chat_id: i64, handle: &ContentHandle, caption: &str) -> Result<ContentHandle> {
        let resp = self
            .client
            .post(self.method_url("sendDocument"))
            .json(&serde_json::json!({
                "chat_id": chat_id,
                "document": handle.id,
                "caption": caption,
            }))
            .send()
            .await?;
        let envelope = parse_envelope::<SendDocumentResult>(resp).await;
        match envelope {
            Ok(result) => document_handle(result),
            Err(MessengerError::NotFound(msg)) => Err(MessengerError::HandleInvalid(msg)),
            Err(other) => Err(other),
        }
    }
}

fn document_handle(result: SendDocumentResult) -> Result<ContentHandle> {
    Ok(ContentHandle {
        id: result.document.file_id,
        unique_id: result.document.file_unique_id,
    })
}

async fn parse_envelope<T: for<'de> Deserialize<'de>>(resp: reqwest::Response) -> Result<T> {
    let status = resp.status();
    let body: ApiEnvelope<T> = resp.json().await?;

    if body.ok {
        return body
            .result
            .ok_or_else(|| MessengerError::Transient("telegram returned ok without a result".into()));
    }

    let description = body.description.unwrap_or_default();
    match body.error_code.unwrap_or(status.as_u16() as i64) {
        429 => {
            let retry_after = body
                .parameters
                .and_then(|p| p.retry_after)
                .unwrap_or(1) as u64;
            Err(MessengerError::FloodControl {
                retry_after_secs: retry_after,
                message: description,
            })
        }
        400 if description.to_lowercase().contains("file") || description.to_lowercase().contains("document") => {
            Err(MessengerError::NotFound(description))
        }
        401 | 403 => Err(MessengerError::Denied(description)),
        404 => Err(MessengerError::NotFound(description)),
        500..=599 => Err(MessengerError::Transient(description)),
        _ => Err(MessengerError::Transient(description)),
    }
}

#[derive(Debug, Deserialize)]
struct ApiEnvelope<T> {
    ok: bool,
    result: Option<T>,
    error_code: Option<i64>,
    description: Option<String>,
    parameters: Option<ApiParameters>,
}

#[derive(Debug, Deserialize)]
struct ApiParameters {
    retry_after: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct SendDocumentResult {
    document: TelegramDocument,
}

#[derive(Debug, Deserialize)]
struct TelegramDocument {
    file_id: String,
    file_unique_id: String,
}
