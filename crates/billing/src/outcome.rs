//! The orchestrator's universal return shape.
//!
//! Every public subscription operation resolves to one of three arms so
//! callers never inspect processor-specific errors: the operation succeeded,
//! it is suspended pending customer authentication, or it failed. Callers
//! map these onto their own transport (200 / 402 / 400) outside this crate.

use serde::Serialize;

/// Three-way result of a billing operation.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum OperationOutcome<T> {
    /// The operation completed.
    Success {
        /// Operation payload (subscription, setup-intent secret, ...).
        payload: T,
        /// Human-readable confirmation for display.
        message: String,
    },
    /// The processor needs additional customer authentication before the
    /// charge can complete. Not a failure: the referenced payment intent
    /// must be confirmed out-of-band and the operation then resumes
    /// processor-side.
    ActionRequired {
        /// Payment-intent reference to confirm.
        payment_intent: String,
        /// Human-readable explanation for display.
        message: String,
    },
    /// The operation failed. `message` is generic and display-safe; raw
    /// processor detail is only ever logged.
    Failure {
        /// Human-readable failure message for display.
        message: String,
    },
}

impl<T> OperationOutcome<T> {
    pub fn success(payload: T, message: impl Into<String>) -> Self {
        OperationOutcome::Success {
            payload,
            message: message.into(),
        }
    }

    pub fn action_required(payment_intent: impl Into<String>, message: impl Into<String>) -> Self {
        OperationOutcome::ActionRequired {
            payment_intent: payment_intent.into(),
            message: message.into(),
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        OperationOutcome::Failure {
            message: message.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, OperationOutcome::Success { .. })
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, OperationOutcome::Failure { .. })
    }

    /// The payload, when the operation succeeded.
    pub fn payload(&self) -> Option<&T> {
        match self {
            OperationOutcome::Success { payload, .. } => Some(payload),
            _ => None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn accessors() {
        let ok: OperationOutcome<u32> = OperationOutcome::success(7, "done");
        assert!(ok.is_success());
        assert_eq!(ok.payload(), Some(&7));

        let failed: OperationOutcome<u32> = OperationOutcome::failure("nope");
        assert!(failed.is_failure());
        assert!(failed.payload().is_none());
    }

    #[test]
    fn serializes_tagged() {
        let pending: OperationOutcome<()> =
            OperationOutcome::action_required("pi_123", "confirm the payment");
        let json = serde_json::to_value(&pending).unwrap();
        assert_eq!(json["outcome"], "action_required");
        assert_eq!(json["payment_intent"], "pi_123");
    }
}
