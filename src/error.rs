//! Error types for tracking-data and command processing.
//!
//! All errors implement the `std::error::Error` trait and carry structured
//! context. Expected failure modes (timeouts, malformed packets, controller
//! error replies) never panic and never cross the data or command call
//! boundary as anything other than a value.
//!
//! ## Error Categories
//!
//! - **Network Errors**: socket setup, send/receive, or connection failures
//! - **Timeouts**: a bounded wait expired without data or a reply
//! - **Parse Errors**: malformed tracking datagrams or command replies
//! - **Application Errors**: the controller answered with `err <code> "..."`
//! - **Size Limit Errors**: a command string exceeded the protocol maximum
//!
//! ## Recovery
//!
//! ```rust
//! use tracklink::TrackError;
//! use std::time::Duration;
//!
//! let error = TrackError::Timeout { duration: Duration::from_millis(1000) };
//! if error.is_retryable() {
//!     // poll again on the next cycle
//! }
//! ```

use std::time::Duration;
use thiserror::Error;

/// Result type alias for tracking operations.
pub type Result<T, E = TrackError> = std::result::Result<T, E>;

/// Main error type for tracking operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TrackError {
    #[error("Network error: {reason}")]
    Network {
        reason: String,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    #[error("Parse error in {context}: {details}")]
    Parse { context: String, details: String },

    #[error("Controller error {code}: {message}")]
    Application { code: i32, message: String },

    #[error("Command too long: {len} bytes (max {max})")]
    SizeLimit { len: usize, max: usize },

    #[error("Channel closed")]
    ChannelClosed,
}

impl TrackError {
    /// Returns whether this error is potentially recoverable through retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            TrackError::Network { .. } => true,
            TrackError::Timeout { .. } => true,
            TrackError::Parse { .. } => false,
            TrackError::Application { .. } => false,
            TrackError::SizeLimit { .. } => false,
            TrackError::ChannelClosed => false,
        }
    }

    /// Helper constructor for network errors without an I/O source.
    pub fn network(reason: impl Into<String>) -> Self {
        TrackError::Network { reason: reason.into(), source: None }
    }

    /// Helper constructor for network errors with an I/O source.
    pub fn network_with_source(reason: impl Into<String>, source: std::io::Error) -> Self {
        TrackError::Network { reason: reason.into(), source: Some(source) }
    }

    /// Helper constructor for parse errors with location context.
    pub fn parse(context: impl Into<String>, details: impl Into<String>) -> Self {
        TrackError::Parse { context: context.into(), details: details.into() }
    }
}

impl From<std::io::Error> for TrackError {
    fn from(err: std::io::Error) -> Self {
        TrackError::Network { reason: "I/O operation failed".to_string(), source: Some(err) }
    }
}

/// Sticky data-path error category, queryable after `receive()` returns.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum DataError {
    /// No error since the last call.
    #[default]
    None,
    /// Socket setup or receive failed.
    Network,
    /// No datagram arrived within the data timeout.
    Timeout,
    /// The datagram was malformed and decoding aborted.
    Parse,
}

/// Sticky command-path error category, queryable after a command returns.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ServerError {
    /// No error since the last command.
    #[default]
    None,
    /// Connection invalid, send/receive failed, or command oversize.
    Network,
    /// The controller did not reply within the command timeout.
    Timeout,
    /// The reply could not be classified or parsed.
    Parse,
}
