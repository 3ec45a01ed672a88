//! Classify provider failures as quota/abuse responses.

use crate::provider::{ProviderError, ProviderErrorKind};

/// Known provider wording for quota and abuse blocks, lowercase.
/// Fallback for providers that don't report a structured rate-limit kind.
pub const RATE_LIMIT_PHRASES: &[&str] = &[
    "tìm số điện thoại quá nhiều lần",
    "quá nhiều lần trong 1 giờ",
    "hoạt động bất thường",
    "vượt quá số request cho phép",
    "vượt quá số request",
    "request cho phép",
    "rate limit",
    "too many requests",
];

/// True if `message` contains a known quota phrase (case-insensitive).
pub fn is_rate_limit_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    RATE_LIMIT_PHRASES.iter().any(|p| lower.contains(p))
}

/// Structured kind first, phrase matching second.
pub fn is_rate_limit(err: &ProviderError) -> bool {
    err.kind == ProviderErrorKind::RateLimited || is_rate_limit_message(&err.message)
}
