//! Error types for telemetry capture.
//!
//! Every fallible operation in the crate returns [`TelemetryError`]. The capture
//! loop absorbs most of them locally (a bad datagram, a torn shared-memory copy,
//! a failed lap upload) so that a session never stalls; only startup failures
//! reach the caller of [`Capture::start`](crate::Capture::start).
//!
//! ## Error Categories
//!
//! - **Connection Errors**: UDP bind/connect and handshake failures
//! - **Datagram Errors**: frames with the wrong identifier or too few bytes
//! - **Memory Errors**: shared-memory regions smaller than the vendor layout
//! - **Parse Errors**: undecodable fields and handshake responses
//! - **Ingest Errors**: lap or chunk delivery to the ingestion endpoint
//! - **Windows API Errors**: platform-specific mapping failures
//!
//! ## Recovery and Retry
//!
//! ```rust
//! use trailbreak::TelemetryError;
//!
//! let error = TelemetryError::connection_failed("Assetto Corsa not responding");
//! if error.is_retryable() {
//!     for suggestion in error.recovery_suggestions() {
//!         println!("  - {}", suggestion);
//!     }
//! }
//! ```

use std::time::Duration;
use thiserror::Error;

#[cfg(windows)]
use windows_core as core;

/// Result type alias for telemetry operations.
pub type Result<T, E = TelemetryError> = std::result::Result<T, E>;

/// Main error type for telemetry operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TelemetryError {
    #[error("Failed to connect to Assetto Corsa: {reason}")]
    Connection {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    #[error("I/O error during {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Memory access violation at offset {offset:#x}")]
    Memory {
        offset: usize,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Parse error in {context}: {details}")]
    Parse { context: String, details: String },

    #[error("Rejected datagram ({len} bytes): {reason}")]
    Datagram { len: usize, reason: String },

    #[error("Invalid configuration: {details}")]
    Config { details: String },

    #[error("Lap delivery failed: {reason}")]
    Ingest {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("{feature} is only available on {required_platform}")]
    UnsupportedPlatform { feature: String, required_platform: String },

    #[error("Windows API error: {operation}")]
    #[cfg(windows)]
    WindowsApi {
        operation: String,
        #[source]
        source: core::Error,
    },
}

impl TelemetryError {
    /// Returns whether this error is potentially recoverable through retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            TelemetryError::Connection { .. } => true,
            TelemetryError::Timeout { .. } => true,
            TelemetryError::Io { .. } => true,
            TelemetryError::Ingest { .. } => true,
            TelemetryError::Memory { .. } => false,
            TelemetryError::Parse { .. } => false,
            TelemetryError::Datagram { .. } => false,
            TelemetryError::Config { .. } => false,
            TelemetryError::UnsupportedPlatform { .. } => false,
            #[cfg(windows)]
            TelemetryError::WindowsApi { .. } => true,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            TelemetryError::Connection { .. } => vec![
                "Ensure Assetto Corsa is running and in a session",
                "Enable UDP remote telemetry in the Assetto Corsa settings",
                "Start an active driving session, not the menu",
            ],
            TelemetryError::Timeout { .. } => vec![
                "Increase the handshake timeout",
                "Check that nothing else is bound to the telemetry port",
                "Verify Assetto Corsa is not paused on a loading screen",
            ],
            TelemetryError::Io { .. } => vec![
                "Check local firewall rules for loopback UDP",
                "Verify the socket addresses in the configuration",
            ],
            TelemetryError::Memory { .. } => vec![
                "Check the shared memory segment names",
                "Verify the Assetto Corsa version exposes the full layout",
            ],
            TelemetryError::Parse { .. } => vec![
                "Check data format compatibility",
                "Verify the simulation version matches the decoder layout",
            ],
            TelemetryError::Datagram { .. } => vec![
                "Confirm the remote telemetry port belongs to Assetto Corsa",
                "Datagrams of other message types are expected and ignored",
            ],
            TelemetryError::Config { .. } => vec![
                "Check the YAML syntax of the configuration file",
                "Compare field names with the documented defaults",
            ],
            TelemetryError::Ingest { .. } => vec![
                "Verify the ingest URL is reachable",
                "Check the ingestion service logs",
                "The next completed lap will be delivered independently",
            ],
            TelemetryError::UnsupportedPlatform { .. } => vec![
                "Shared memory telemetry requires Windows",
                "UDP telemetry still works on other platforms",
            ],
            #[cfg(windows)]
            TelemetryError::WindowsApi { .. } => vec![
                "Check Windows API permissions",
                "Run the capture in the same user session as the simulation",
            ],
        }
    }

    /// Helper constructor for connection errors.
    pub fn connection_failed(reason: impl Into<String>) -> Self {
        TelemetryError::Connection { reason: reason.into(), source: None }
    }

    /// Helper constructor for connection errors with source.
    pub fn connection_failed_with_source(
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        TelemetryError::Connection { reason: reason.into(), source: Some(source) }
    }

    /// Helper constructor for I/O errors with context.
    pub fn io_error(context: impl Into<String>, source: std::io::Error) -> Self {
        TelemetryError::Io { context: context.into(), source }
    }

    /// Helper constructor for memory access errors.
    pub fn memory_access_error(offset: usize) -> Self {
        TelemetryError::Memory { offset, source: None }
    }

    /// Helper constructor for rejected datagrams.
    pub fn datagram_rejected(len: usize, reason: impl Into<String>) -> Self {
        TelemetryError::Datagram { len, reason: reason.into() }
    }

    /// Helper constructor for ingest failures.
    pub fn ingest_failed(reason: impl Into<String>) -> Self {
        TelemetryError::Ingest { reason: reason.into(), source: None }
    }

    /// Helper constructor for ingest failures with source.
    pub fn ingest_failed_with_source(
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        TelemetryError::Ingest { reason: reason.into(), source: Some(source) }
    }

    /// Helper constructor for Windows API errors.
    #[cfg(windows)]
    pub fn windows_api_error(operation: impl Into<String>, source: core::Error) -> Self {
        TelemetryError::WindowsApi { operation: operation.into(), source }
    }

    /// Helper constructor for unsupported platform errors.
    pub fn unsupported_platform(
        feature: impl Into<String>,
        required_platform: impl Into<String>,
    ) -> Self {
        TelemetryError::UnsupportedPlatform {
            feature: feature.into(),
            required_platform: required_platform.into(),
        }
    }
}

impl From<std::io::Error> for TelemetryError {
    fn from(err: std::io::Error) -> Self {
        TelemetryError::Io { context: "socket operation".to_string(), source: err }
    }
}

impl From<serde_yaml_ng::Error> for TelemetryError {
    fn from(err: serde_yaml_ng::Error) -> Self {
        TelemetryError::Config { details: err.to_string() }
    }
}

impl From<reqwest::Error> for TelemetryError {
    fn from(err: reqwest::Error) -> Self {
        TelemetryError::Ingest { reason: "HTTP request failed".to_string(), source: Some(Box::new(err)) }
    }
}

#[cfg(windows)]
impl From<core::Error> for TelemetryError {
    fn from(err: core::Error) -> Self {
        TelemetryError::WindowsApi {
            operation: "Unknown Windows operation".to_string(),
            source: err,
        }
    }
}
