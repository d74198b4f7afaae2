//! Failure classification for API calls
//!
//! Turns raw transport failures into a category plus a retryability verdict.
//! Classification keys off the transport layer's explicit signal: the
//! transport reports whether a response was received before any body
//! decoding happens, so an undecodable error page classifies as `Http`,
//! never as `Parse`.

use thiserror::Error;

use crate::transport::TransportError;

/// Failure categories, checked in declaration order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// No response was obtained at all
    Network,
    /// The deadline elapsed or the call was cancelled
    Timeout,
    /// The server answered with an error status
    Http,
    /// The response body violated the expected shape
    Parse,
    /// Anything else
    Unknown,
}

/// A classified API failure
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ClassifiedError {
    /// Which category the failure falls into
    pub category: ErrorCategory,
    /// HTTP status code, when a response was received
    pub http_status: Option<u16>,
    /// Human-readable description of the failure
    pub message: String,
    /// Whether retrying the call could plausibly succeed
    pub retryable: bool,
}

/// Statuses worth retrying: request timeout, rate limiting, and any server error
fn is_retryable_status(status: u16) -> bool {
    status == 408 || status == 429 || status >= 500
}

impl ClassifiedError {
    /// Classifies a transport failure
    pub fn from_transport(err: &TransportError) -> Self {
        match err {
            TransportError::Network(detail) => Self {
                category: ErrorCategory::Network,
                http_status: None,
                message: format!("Network connection failed: {}", detail),
                retryable: true,
            },
            TransportError::Timeout(deadline) => Self {
                category: ErrorCategory::Timeout,
                http_status: None,
                message: format!(
                    "Request timed out after {}ms. The server may be busy.",
                    deadline.as_millis()
                ),
                retryable: true,
            },
            TransportError::HttpStatus { status, status_text } => Self {
                category: ErrorCategory::Http,
                http_status: Some(*status),
                message: if *status >= 500 {
                    format!("Server error: {} {}", status, status_text)
                } else {
                    format!("Client error: {} {}", status, status_text)
                },
                retryable: is_retryable_status(*status),
            },
            TransportError::Decode(detail) => Self {
                category: ErrorCategory::Parse,
                http_status: None,
                message: format!("Invalid response format from server: {}", detail),
                retryable: false,
            },
        }
    }

    /// Wraps a failure that fits no known category
    #[allow(dead_code)]
    pub fn unknown(message: impl Into<String>) -> Self {
        Self {
            category: ErrorCategory::Unknown,
            http_status: None,
            message: message.into(),
            retryable: false,
        }
    }
}
