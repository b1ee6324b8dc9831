//! Error types for cxl-doe.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Point in an exchange at which the data-object-ready bit was checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadyStage {
    /// Polling after the GO bit was written.
    AfterGo,
    /// Consistency check right before the final dword of a response.
    BeforeFinalAck,
}

impl fmt::Display for ReadyStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadyStage::AfterGo => f.write_str("after GO"),
            ReadyStage::BeforeFinalAck => f.write_str("before final acknowledgment"),
        }
    }
}

/// Main error type for all DOE operations.
#[derive(Debug, Error)]
pub enum DoeError {
    /// The memory device node could not be opened.
    #[error("failed to open device {}: {source}", path.display())]
    DeviceOpen {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// I/O error from the underlying register transport.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error while loading configuration.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The data-object-ready bit was not set when it had to be.
    #[error("data object not ready {stage} (status {status:#010x})")]
    ProtocolNotReady { stage: ReadyStage, status: u32 },

    /// The device raised the DOE error status bit.
    #[error("DOE error status set (status {status:#010x})")]
    DeviceError { status: u32 },

    /// Response object violated the framing rules.
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// CDAT retrieval never returned the last-entry handle.
    #[error("CDAT pagination did not reach the last entry within {pages} pages")]
    PaginationExhausted { pages: usize },

    /// Configuration value outside its valid range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Request object does not fit the 18-bit length field.
    #[error("request of {dwords} dwords exceeds the DOE length field")]
    RequestTooLong { dwords: usize },

    /// A mailbox command completed with a non-zero return code.
    #[error("mailbox command {id} failed with return code {retval:#x}")]
    CommandFailed { id: u32, retval: u32 },

    /// Another holder of the shared mailbox panicked mid-exchange.
    #[error("mailbox lock poisoned")]
    LockPoisoned,
}

/// Result type alias using DoeError.
pub type Result<T> = std::result::Result<T, DoeError>;
