use thiserror::Error;

/// Failure outcomes of a gateway call.
///
/// A `Rejection` means the backend received the request and explicitly
/// refused it; `Transport` means the exchange never completed. The two must
/// not be conflated: a rejection is authoritative while a transport failure
/// leaves the remote state unknown.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// The call could not complete (connection, TLS, timeout, IO).
    #[error("transport failure: {0}")]
    Transport(String),

    /// The backend explicitly refused the operation.
    ///
    /// `code` is the backend-defined error code string, forwarded verbatim
    /// (it may carry trailing detail after the code itself).
    #[error("backend rejected request ({code}): {message}")]
    Rejection { code: String, message: String },

    /// The cancellation token fired while the call was in flight.
    #[error("call cancelled")]
    Cancelled,
}

impl GatewayError {
    /// Whether retrying the same call at the caller's discretion could
    /// plausibly succeed. Rejections are authoritative and never retryable
    /// as-is.
    pub fn is_transient(&self) -> bool {
        matches!(self, GatewayError::Transport(_))
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;
