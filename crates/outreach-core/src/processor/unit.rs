//! One row unit: look up the phone, then send one templated message.
//!
//! Units never touch the sheet or the counters. Each one reports a
//! [`RowOutcome`] back to the driver, which owns the rows, writes the output
//! cells and counts the outcome.

use std::sync::Arc;
use std::time::Duration;

use rand::seq::SliceRandom;
use tokio::sync::mpsc;

use crate::guard::RateLimitGuard;
use crate::job::JobId;
use crate::provider::{ChannelType, Provider, UserIdentity, NOT_AVAILABLE};
use crate::sheet::{
    Sheet, RESULT_COL, SEND_RESULT_COL, USER_AVATAR_COL, USER_ID_COL, USER_NAME_COL,
    USER_PHONE_COL,
};
use crate::unix_millis;

pub const FOUND: &str = "found";
pub const NOT_FOUND: &str = "not found";
pub const SENT: &str = "sent";
pub const SEND_NO_TARGET: &str = "send failed: no user id";
const LOOKUP_FAILED: &str = "lookup failed";

/// How the send step of a found row ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    Sent,
    Failed(String),
    TimedOut { after_ms: u64 },
    NoTarget,
}

/// Result of one row, applied to the sheet by the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome {
    NotFound,
    LookupFailed(String),
    Found {
        name: String,
        user_id: String,
        phone: String,
        avatar: String,
        send: SendOutcome,
    },
}

impl RowOutcome {
    pub fn write_to(&self, sheet: &mut Sheet, row: usize) {
        match self {
            RowOutcome::NotFound => sheet.set_cell(row, RESULT_COL, NOT_FOUND),
            RowOutcome::LookupFailed(msg) => sheet.set_cell(row, RESULT_COL, msg.as_str()),
            RowOutcome::Found {
                name,
                user_id,
                phone,
                avatar,
                send,
            } => {
                sheet.set_cell(row, RESULT_COL, FOUND);
                sheet.set_cell(row, USER_NAME_COL, name.as_str());
                sheet.set_cell(row, USER_ID_COL, user_id.as_str());
                sheet.set_cell(row, USER_PHONE_COL, phone.as_str());
                sheet.set_cell(row, USER_AVATAR_COL, avatar.as_str());
                let text = match send {
                    SendOutcome::Sent => SENT.to_string(),
                    SendOutcome::Failed(msg) => msg.clone(),
                    SendOutcome::TimedOut { after_ms } => format!("timeout after {after_ms} ms"),
                    SendOutcome::NoTarget => SEND_NO_TARGET.to_string(),
                };
                sheet.set_cell(row, SEND_RESULT_COL, text);
            }
        }
    }
}

#[derive(Debug)]
pub(crate) struct RowResult {
    pub row: usize,
    pub outcome: RowOutcome,
}

/// Shared by every unit of one run.
pub(crate) struct UnitContext {
    pub provider: Arc<dyn Provider>,
    pub guard: RateLimitGuard,
    pub job_id: JobId,
    pub send_timeout: Duration,
    pub templates: Arc<[String]>,
    pub results: mpsc::UnboundedSender<RowResult>,
}

/// Pick one template at random and fill in the recipient's name.
pub fn compose_message(templates: &[String], name: &str) -> String {
    let name = if name == NOT_AVAILABLE { "there" } else { name };
    templates
        .choose(&mut rand::thread_rng())
        .map(|t| t.replace("{name}", name))
        .unwrap_or_default()
}

pub(crate) async fn run_unit(ctx: Arc<UnitContext>, row: usize, phone: String) {
    let outcome = resolve_row(&ctx, &phone).await;
    tracing::debug!(job_id = %ctx.job_id, row, phone = %phone, ?outcome, "row resolved");
    // Driver gone means the run was abandoned; nothing left to record.
    let _ = ctx.results.send(RowResult { row, outcome });
}

async fn resolve_row(ctx: &UnitContext, phone: &str) -> RowOutcome {
    match ctx.provider.find_user(phone).await {
        Ok(None) => RowOutcome::NotFound,
        Err(e) => {
            tracing::warn!(job_id = %ctx.job_id, phone, error = %e, "lookup failed");
            ctx.guard.observe(ctx.job_id, &e, unix_millis());
            let text = e.cell_text();
            RowOutcome::LookupFailed(if text.is_empty() { LOOKUP_FAILED.to_string() } else { text })
        }
        Ok(Some(user)) => {
            let send = send_to(ctx, &user).await;
            RowOutcome::Found {
                name: user.display_name().to_string(),
                user_id: user.target_id().unwrap_or(NOT_AVAILABLE).to_string(),
                phone: user.phone_or(phone).to_string(),
                avatar: user.avatar().to_string(),
                send,
            }
        }
    }
}

async fn send_to(ctx: &UnitContext, user: &UserIdentity) -> SendOutcome {
    let Some(target) = user.target_id() else {
        return SendOutcome::NoTarget;
    };
    let message = compose_message(&ctx.templates, user.display_name());
    let send = ctx.provider.send_message(&message, target, ChannelType::User);
    match tokio::time::timeout(ctx.send_timeout, send).await {
        Ok(Ok(_)) => SendOutcome::Sent,
        Ok(Err(e)) => {
            tracing::warn!(job_id = %ctx.job_id, target, error = %e, "send failed");
            ctx.guard.observe(ctx.job_id, &e, unix_millis());
            let text = e.cell_text();
            SendOutcome::Failed(if text.is_empty() { "send failed".to_string() } else { text })
        }
        Err(_) => {
            let after_ms = ctx.send_timeout.as_millis() as u64;
            tracing::warn!(job_id = %ctx.job_id, target, after_ms, "send timed out");
            SendOutcome::TimedOut { after_ms }
        }
    }
}
