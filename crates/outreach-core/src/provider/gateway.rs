//! HTTP/JSON gateway provider.
//!
//! Uses the curl crate (libcurl). Each call is a blocking transfer run on
//! `spawn_blocking`. Endpoints:
//! - `GET {base}/users?phone=<phone>`: 200 with an identity, 404 when absent
//! - `POST {base}/messages` with `{content, targetId, channel}`
//!
//! HTTP 429 maps to [`ProviderErrorKind::RateLimited`]; other failures carry
//! the response body text so quota wording can still be recognized.

use async_trait::async_trait;
use serde::Serialize;
use std::time::Duration;

use super::{ChannelType, Provider, ProviderError, ProviderErrorKind, SendResult, UserIdentity};
use crate::config::ProviderConfig;

/// Upper bound for one gateway transfer; callers apply tighter send timeouts.
const TRANSFER_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct GatewayProvider {
    base_url: String,
    token: Option<String>,
    connect_timeout: Duration,
}

struct Response {
    code: u32,
    body: Vec<u8>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SendBody<'a> {
    content: &'a str,
    target_id: &'a str,
    channel: ChannelType,
}

impl GatewayProvider {
    pub fn new(cfg: &ProviderConfig) -> Self {
        Self {
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            token: cfg.token.clone(),
            connect_timeout: Duration::from_secs(cfg.connect_timeout_secs.max(1)),
        }
    }

    async fn request(
        &self,
        path: String,
        body: Option<Vec<u8>>,
    ) -> Result<Response, ProviderError> {
        let url = format!("{}{}", self.base_url, path);
        let token = self.token.clone();
        let connect_timeout = self.connect_timeout;
        tokio::task::spawn_blocking(move || perform(&url, token.as_deref(), connect_timeout, body))
            .await
            .map_err(|e| ProviderError::other(format!("gateway task join: {e}")))?
    }
}

fn perform(
    url: &str,
    token: Option<&str>,
    connect_timeout: Duration,
    body: Option<Vec<u8>>,
) -> Result<Response, ProviderError> {
    let transport = |e: curl::Error| ProviderError::new(classify_curl_error(&e), e.to_string());

    let mut easy = curl::easy::Easy::new();
    easy.url(url).map_err(transport)?;
    easy.connect_timeout(connect_timeout).map_err(transport)?;
    easy.timeout(TRANSFER_TIMEOUT).map_err(transport)?;

    let mut list = curl::easy::List::new();
    list.append("Accept: application/json").map_err(transport)?;
    if let Some(token) = token {
        list.append(&format!("Authorization: Bearer {}", token.trim()))
            .map_err(transport)?;
    }
    if let Some(body) = &body {
        list.append("Content-Type: application/json").map_err(transport)?;
        easy.post(true).map_err(transport)?;
        easy.post_fields_copy(body).map_err(transport)?;
    }
    easy.http_headers(list).map_err(transport)?;

    let mut out = Vec::new();
    {
        let mut transfer = easy.transfer();
        transfer
            .write_function(|data| {
                out.extend_from_slice(data);
                Ok(data.len())
            })
            .map_err(transport)?;
        transfer.perform().map_err(transport)?;
    }
    let code = easy.response_code().map_err(transport)?;
    Ok(Response { code, body: out })
}

fn classify_curl_error(e: &curl::Error) -> ProviderErrorKind {
    if e.is_couldnt_connect()
        || e.is_couldnt_resolve_host()
        || e.is_operation_timedout()
        || e.is_recv_error()
        || e.is_send_error()
        || e.is_got_nothing()
    {
        return ProviderErrorKind::Transport;
    }
    ProviderErrorKind::Other
}

/// Map a non-success status to a provider error, keeping the body text.
fn status_error(code: u32, body: &[u8]) -> ProviderError {
    let text = String::from_utf8_lossy(body).trim().to_string();
    let message = if text.is_empty() {
        format!("gateway returned HTTP {code}")
    } else {
        text
    };
    let kind = match code {
        429 => ProviderErrorKind::RateLimited,
        400..=499 => ProviderErrorKind::Rejected,
        _ => ProviderErrorKind::Other,
    };
    ProviderError::new(kind, message)
}

fn decode<T: serde::de::DeserializeOwned>(body: &[u8]) -> Result<T, ProviderError> {
    serde_json::from_slice(body)
        .map_err(|e| ProviderError::other(format!("gateway sent malformed JSON: {e}")))
}

#[async_trait]
impl Provider for GatewayProvider {
    async fn find_user(&self, phone: &str) -> Result<Option<UserIdentity>, ProviderError> {
        // Normalized phones are digits only; no escaping needed.
        let resp = self.request(format!("/users?phone={phone}"), None).await?;
        match resp.code {
            200..=299 => decode(&resp.body).map(Some),
            404 => Ok(None),
            code => Err(status_error(code, &resp.body)),
        }
    }

    async fn send_message(
        &self,
        content: &str,
        target_id: &str,
        channel: ChannelType,
    ) -> Result<SendResult, ProviderError> {
        let body = serde_json::to_vec(&SendBody {
            content,
            target_id,
            channel,
        })
        .map_err(|e| ProviderError::other(format!("encode message: {e}")))?;
        let resp = self.request("/messages".to_string(), Some(body)).await?;
        match resp.code {
            200..=299 if resp.body.iter().all(u8::is_ascii_whitespace) => Ok(SendResult::default()),
            200..=299 => decode(&resp.body),
            code => Err(status_error(code, &resp.body)),
        }
    }
}
