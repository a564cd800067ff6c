//! Bot API client

use super::types::{ApiResponse, File, Update};
use super::{classify_api_error, classify_http_error};
use crate::runtime::{
    BlobResolver, BlobStream, ProgressStage, ReplyMarkup, ReplySink, TransportError,
};
use crate::state_machine::ConversationId;
use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::path::Path;
use std::time::Duration;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(60);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
/// Extra time on top of the long-poll timeout before giving up on getUpdates
const POLL_HEADROOM: Duration = Duration::from_secs(10);

/// Telegram Bot API over HTTPS
#[derive(Clone)]
pub struct BotApi {
    client: Client,
    method_base: String,
    file_base: String,
}

impl BotApi {
    pub fn new(api_url: &str, token: &str) -> Result<Self, TransportError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(classify_http_error)?;
        let base = api_url.trim_end_matches('/');

        Ok(Self {
            client,
            method_base: format!("{base}/bot{token}"),
            file_base: format!("{base}/file/bot{token}"),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{method}", self.method_base)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: &Value,
    ) -> Result<T, TransportError> {
        let response = self
            .client
            .post(self.method_url(method))
            .json(body)
            .send()
            .await
            .map_err(classify_http_error)?;
        parse_response(response).await
    }

    /// Long-poll for updates after `offset`
    pub async fn get_updates(
        &self,
        offset: i64,
        timeout: Duration,
    ) -> Result<Vec<Update>, TransportError> {
        let body = json!({
            "offset": offset,
            "timeout": timeout.as_secs(),
            "allowed_updates": ["message"],
        });
        let response = self
            .client
            .post(self.method_url("getUpdates"))
            .timeout(timeout + POLL_HEADROOM)
            .json(&body)
            .send()
            .await
            .map_err(classify_http_error)?;
        parse_response(response).await
    }

    async fn get_file(&self, file_id: &str) -> Result<File, TransportError> {
        self.call("getFile", &json!({ "file_id": file_id })).await
    }
}

async fn parse_response<T: DeserializeOwned>(response: Response) -> Result<T, TransportError> {
    let status = response.status();
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        return Err(classify_api_error(Some(status.as_u16()), "Request Entity Too Large"));
    }
    let envelope: ApiResponse<T> = response.json().await.map_err(classify_http_error)?;
    envelope.into_result()
}

fn keyboard(markup: ReplyMarkup) -> Value {
    match markup {
        ReplyMarkup::RemoveKeyboard => json!({ "remove_keyboard": true }),
        ReplyMarkup::Choices(labels) => {
            let rows: Vec<Value> = labels
                .into_iter()
                .map(|label| json!([{ "text": label }]))
                .collect();
            json!({
                "keyboard": rows,
                "resize_keyboard": true,
                "one_time_keyboard": false,
                "selective": true,
            })
        }
    }
}

fn chat_action(stage: ProgressStage) -> &'static str {
    match stage {
        ProgressStage::Downloading | ProgressStage::Converting => "typing",
        ProgressStage::Sending => "upload_document",
    }
}

#[async_trait]
impl BlobResolver for BotApi {
    async fn fetch(&self, file_id: &str) -> Result<BlobStream, TransportError> {
        let file = self.get_file(file_id).await?;
        let file_path = file
            .file_path
            .ok_or_else(|| TransportError::other(format!("No download path for {file_id}")))?;

        let response = self
            .client
            .get(format!("{}/{file_path}", self.file_base))
            .send()
            .await
            .and_then(Response::error_for_status)
            .map_err(classify_http_error)?;

        let size = file.file_size.or_else(|| response.content_length());
        let chunks = response
            .bytes_stream()
            .map_ok(|bytes| bytes.to_vec())
            .map_err(classify_http_error)
            .boxed();
        Ok(BlobStream { size, chunks })
    }
}

#[async_trait]
impl ReplySink for BotApi {
    async fn send_text(
        &self,
        conversation: ConversationId,
        text: &str,
        markup: ReplyMarkup,
    ) -> Result<(), TransportError> {
        let body = json!({
            "chat_id": conversation.0,
            "text": text,
            "reply_markup": keyboard(markup),
        });
        self.call::<Value>("sendMessage", &body).await.map(|_| ())
    }

    async fn send_document(
        &self,
        conversation: ConversationId,
        path: &Path,
        filename: &str,
        caption: &str,
    ) -> Result<(), TransportError> {
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            TransportError::other(format!("Cannot read {}: {e}", path.display()))
        })?;
        let form = Form::new()
            .text("chat_id", conversation.0.to_string())
            .text("caption", caption.to_string())
            .text("reply_markup", keyboard(ReplyMarkup::RemoveKeyboard).to_string())
            .part("document", Part::bytes(bytes).file_name(filename.to_string()));

        let response = self
            .client
            .post(self.method_url("sendDocument"))
            .multipart(form)
            .send()
            .await
            .map_err(classify_http_error)?;
        parse_response::<Value>(response).await.map(|_| ())
    }

    async fn notify_progress(
        &self,
        conversation: ConversationId,
        stage: ProgressStage,
    ) -> Result<(), TransportError> {
        let body = json!({ "chat_id": conversation.0, "action": chat_action(stage) });
        self.call::<Value>("sendChatAction", &body).await.map(|_| ())
    }
}
