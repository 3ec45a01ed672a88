//! Provider error type with a structured kind for rate-limit classification.

/// Broad class of a provider failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    /// Provider says we exceeded a quota (e.g. HTTP 429).
    RateLimited,
    /// Network-level failure (connect, DNS, reset).
    Transport,
    /// Provider refused the request (4xx other than 404/429).
    Rejected,
    /// Anything else; the message may still carry quota wording.
    Other,
}

/// Failure reported by a [`super::Provider`] call.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct ProviderError {
    pub kind: ProviderErrorKind,
    pub message: String,
}

impl ProviderError {
    pub fn new(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::RateLimited, message)
    }

    pub fn other(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Other, message)
    }

    /// Message flattened to one line, as written into a dataset cell.
    pub fn cell_text(&self) -> String {
        self.message
            .split(['\r', '\n'])
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_text_is_single_line() {
        let e = ProviderError::other("  quota exceeded\r\n try later \n");
        assert_eq!(e.cell_text(), "quota exceeded try later");
        assert_eq!(e.to_string(), "  quota exceeded\r\n try later \n");
    }
}
