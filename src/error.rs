//! Custom error types for the application.
//!
//! This module defines the primary error type, `SentinelError`, for the entire
//! application. Using the `thiserror` crate, it provides a centralized and
//! consistent way to handle the different failure classes that occur between
//! the telemetry link and the notification transport.
//!
//! ## Error Hierarchy
//!
//! `SentinelError` consolidates the following sources:
//!
//! - **`DecodeField`**: A telemetry fragment carried a field marker followed by
//!   a non-parseable value. Recoverable per field; the surrounding fragment is
//!   never aborted.
//! - **`Inference`**: The learned collision model failed to load or a predict
//!   call failed. Recoverable; callers fall back to the threshold rule.
//! - **`TransportRead`**: The telemetry link failed. Fatal to the reader loop
//!   only; surfaced to observers as a disconnect.
//! - **`EmptyRecipients`** / **`EmptyMessage`** / **`NoValidRecipients`**:
//!   Dispatch precondition failures. No message units are handed to the
//!   transport.
//! - **`GatewayRejected`**: The notification transport refused the hand-off
//!   for one recipient. The batch continues with the remaining recipients.
//! - **`Config`** / **`Configuration`**: Parse-level and semantic configuration
//!   failures respectively.
//! - **`FeatureNotEnabled`**: Functionality excluded at compile time via a
//!   feature flag, with a message naming the flag to rebuild with.
//!
//! By using `#[from]`, `SentinelError` can be seamlessly created from
//! underlying error types with the `?` operator.

use thiserror::Error;

/// Convenience alias for results using the application error type.
pub type AppResult<T> = std::result::Result<T, SentinelError>;

/// Application-wide error type.
#[derive(Error, Debug)]
pub enum SentinelError {
    #[error("Malformed {field} value in telemetry fragment: {raw:?}")]
    DecodeField {
        /// Field whose value failed to parse ("accel" or "gyro").
        field: &'static str,
        /// Raw substring that failed numeric parsing.
        raw: String,
    },

    #[error("Inference error: {0}")]
    Inference(String),

    #[error("Telemetry transport read failed: {0}")]
    TransportRead(#[source] std::io::Error),

    #[error("No emergency recipients configured")]
    EmptyRecipients,

    #[error("Emergency message is empty")]
    EmptyMessage,

    #[error("No valid recipients after filtering")]
    NoValidRecipients,

    #[error("Transport rejected hand-off for {phone}: {reason}")]
    GatewayRejected {
        /// Phone number of the refused recipient.
        phone: String,
        /// Transport-reported reason.
        reason: String,
    },

    #[error("Configuration error: {0}")]
    Config(#[from] figment::Error),

    #[error("Configuration validation error: {0}")]
    Configuration(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Feature '{0}' is not enabled. Please build with --features {0}")]
    FeatureNotEnabled(&'static str),
}

impl SentinelError {
    /// Whether the failure is local to one sample, unit, or call and the
    /// surrounding loop or batch may continue.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            SentinelError::DecodeField { .. }
                | SentinelError::Inference(_)
                | SentinelError::GatewayRejected { .. }
        )
    }
}
