use thiserror::Error;

/// Failures surfaced at the command boundary.
///
/// Once data has been accepted into a [`crate::ir::Forest`], identity
/// resolution, expansion and layout never fail; missing fields fall back to
/// defaults instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChartError {
    #[error("malformed chart data: {0}")]
    MalformedData(String),

    #[error("invalid payload for `{action}`: {reason}")]
    InvalidPayload { action: String, reason: String },

    #[error("message from untrusted origin `{0}` rejected")]
    UntrustedOrigin(String),
}

impl ChartError {
    pub fn invalid_payload(action: &str, reason: impl Into<String>) -> Self {
        Self::InvalidPayload {
            action: action.to_string(),
            reason: reason.into(),
        }
    }
}
