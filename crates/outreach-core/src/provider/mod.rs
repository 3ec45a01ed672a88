//! Provider capability: identity lookup and message sending.
//!
//! The engine only sees the [`Provider`] trait and is handed an implementation
//! at construction, so tests and alternative backends plug in without global
//! state. [`GatewayProvider`] talks to an HTTP/JSON gateway.

mod error;
mod gateway;

pub use error::{ProviderError, ProviderErrorKind};
pub use gateway::GatewayProvider;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Placeholder written for identity fields the provider leaves out.
pub const NOT_AVAILABLE: &str = "N/A";

/// Remote identity resolved from a phone number. Providers disagree on field
/// names, so several aliases are accepted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdentity {
    #[serde(default, alias = "zalo_name")]
    pub name: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default, alias = "userId")]
    pub uid: Option<String>,
    #[serde(default)]
    pub global_id: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default, alias = "avatarUrl")]
    pub avatar: Option<String>,
}

fn non_empty(v: &Option<String>) -> Option<&str> {
    v.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

impl UserIdentity {
    pub fn display_name(&self) -> &str {
        non_empty(&self.name)
            .or_else(|| non_empty(&self.display_name))
            .unwrap_or(NOT_AVAILABLE)
    }

    /// Id to address messages to; None if the provider gave no usable id.
    pub fn target_id(&self) -> Option<&str> {
        non_empty(&self.uid)
            .or_else(|| non_empty(&self.global_id))
            .filter(|id| *id != NOT_AVAILABLE)
    }

    pub fn phone_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        non_empty(&self.phone)
            .or(Some(fallback).filter(|s| !s.trim().is_empty()))
            .unwrap_or(NOT_AVAILABLE)
    }

    pub fn avatar(&self) -> &str {
        non_empty(&self.avatar).unwrap_or(NOT_AVAILABLE)
    }
}

/// Kind of conversation a message is sent to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChannelType {
    User,
    Group,
}

/// Provider acknowledgement of a sent message.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendResult {
    #[serde(default)]
    pub message_id: Option<String>,
}

/// Identity lookup and messaging, as consumed by the engine.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Resolve a normalized phone number; `Ok(None)` when no user matches.
    async fn find_user(&self, phone: &str) -> Result<Option<UserIdentity>, ProviderError>;

    /// Send `content` to `target_id`. Callers wrap this in their own timeout.
    async fn send_message(
        &self,
        content: &str,
        target_id: &str,
        channel: ChannelType,
    ) -> Result<SendResult, ProviderError>;
}
