use thiserror::Error;

/// Flow-level error types.
///
/// Network failures during the session exchange and non-200 backend statuses
/// are recorded as request state, not returned as errors; a 403 on the
/// authorization check is a distinct phase, not an error. Everything here is
/// terminal for the current attempt — there are no retries.
#[derive(Debug, Error)]
pub enum AuthFlowError {
    /// The platform refused to open the popup window. The flow never
    /// started; the caller must not poll or focus anything.
    #[error("popup blocked: {0}")]
    PopupBlocked(String),

    /// The flow's cancellation token fired; no further state updates happen.
    #[error("login flow cancelled")]
    Cancelled,

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
}
