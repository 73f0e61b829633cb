//! Error types for the billing core.
//!
//! `GatewayError` is the only error type that crosses the processor
//! boundary: the Stripe adapter translates every transport and API failure
//! into one of these variants, so nothing upstream ever inspects
//! processor-specific error shapes.

use thiserror::Error;

/// Result alias used throughout the gateway layer.
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Normalized failure vocabulary for processor operations.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// Missing or malformed configuration (bad API key, bad base URL).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Network-level failure: connect, timeout, TLS. Outcome of the remote
    /// call is unknown; treated like any other failure by the orchestrator.
    #[error("Transport error: {0}")]
    Transport(String),

    /// The processor accepted the request and returned a structured error.
    #[error("Processor error [{}]: {message}", .code.as_deref().unwrap_or("unknown"))]
    Api {
        /// Processor error code, when one was supplied.
        code: Option<String>,
        /// Raw processor message. Logged, never shown to end users.
        message: String,
    },

    /// The processor returned a 2xx body we could not decode.
    #[error("Unexpected processor response: {0}")]
    InvalidResponse(String),

    /// The initial charge needs additional customer authentication. This is
    /// a suspended operation, not a failure: the caller must confirm the
    /// referenced payment intent out-of-band.
    #[error("Payment requires additional confirmation (intent {payment_intent})")]
    IncompletePayment {
        /// Payment-intent reference the caller must resolve.
        payment_intent: String,
    },
}

impl GatewayError {
    /// Build an API-error variant from an optional code and a message.
    pub fn api(code: Option<String>, message: impl Into<String>) -> Self {
        GatewayError::Api {
            code,
            message: message.into(),
        }
    }

    /// True when the error is the duplicate-"default"-slot conflict.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            GatewayError::Api { code: Some(c), .. } if c == "resource_already_exists"
        )
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(err: reqwest::Error) -> Self {
        GatewayError::Transport(err.to_string())
    }
}
