use std::io;
use thiserror::Error;

/// Extra detail attached to protocol violations
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProtocolContext {
    pub expected_opcode: Option<u32>,
    pub received_opcode: Option<u32>,
    pub payload_size: Option<u32>,
}

impl ProtocolContext {
    /// Context for an opcode that arrived where another one was expected
    pub fn with_opcodes(expected: u32, received: u32) -> Self {
        Self {
            expected_opcode: Some(expected),
            received_opcode: Some(received),
            payload_size: None,
        }
    }

    /// Context for a frame whose declared payload size was rejected
    pub fn with_payload_size(received_opcode: u32, payload_size: u32) -> Self {
        Self {
            expected_opcode: None,
            received_opcode: Some(received_opcode),
            payload_size: Some(payload_size),
        }
    }
}

/// Broad grouping of [`RelayError`] variants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Transport level failures (bind, accept, read, write)
    Connection,
    /// A peer sent something the IPC protocol does not allow
    Protocol,
    /// The OS process list could not be read
    Enumeration,
    /// Bad configuration or catalog data
    Configuration,
    Other,
}

/// Errors raised by the presence relay
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to (de)serialize JSON payload: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Process list unavailable: {0}")]
    Enumeration(String),

    #[error("No free IPC slot among {attempted} candidates")]
    NoFreeSlot { attempted: u8 },

    #[error("Protocol violation: {message}")]
    ProtocolViolation {
        message: String,
        context: ProtocolContext,
    },

    #[error("Handshake not completed within {0}ms")]
    HandshakeTimeout(u64),

    #[error("Socket connection was closed")]
    SocketClosed,

    #[error("Invalid activity: {0}")]
    InvalidActivity(String),

    #[error("Invalid catalog: {0}")]
    InvalidCatalog(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(&'static str),

    #[error("System time error: {0}")]
    SystemTime(String),
}

impl RelayError {
    /// Build a [`RelayError::ProtocolViolation`]
    pub fn protocol_violation(message: impl Into<String>, context: ProtocolContext) -> Self {
        Self::ProtocolViolation {
            message: message.into(),
            context,
        }
    }

    /// Build a [`RelayError::Enumeration`] from anything displayable
    pub fn enumeration(cause: impl std::fmt::Display) -> Self {
        Self::Enumeration(cause.to_string())
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Io(_) | Self::NoFreeSlot { .. } | Self::SocketClosed => {
                ErrorCategory::Connection
            }
            Self::Serialization(_)
            | Self::ProtocolViolation { .. }
            | Self::HandshakeTimeout(_)
            | Self::InvalidActivity(_) => ErrorCategory::Protocol,
            Self::Enumeration(_) => ErrorCategory::Enumeration,
            Self::InvalidCatalog(_) | Self::InvalidConfig(_) => ErrorCategory::Configuration,
            Self::SystemTime(_) => ErrorCategory::Other,
        }
    }

    pub fn is_connection_error(&self) -> bool {
        self.category() == ErrorCategory::Connection
    }

    /// Whether retrying the same operation later can succeed.
    ///
    /// Enumeration failures clear up on a later poll and a closed socket only
    /// ends one client; bad data and exhausted slots do not fix themselves.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Enumeration(_) | Self::SocketClosed | Self::HandshakeTimeout(_)
        )
    }
}

/// Result type for relay operations
pub type Result<T = ()> = std::result::Result<T, RelayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_group_variants() {
        assert_eq!(RelayError::SocketClosed.category(), ErrorCategory::Connection);
        assert_eq!(
            RelayError::NoFreeSlot { attempted: 10 }.category(),
            ErrorCategory::Connection
        );
        assert_eq!(
            RelayError::enumeration("no /proc").category(),
            ErrorCategory::Enumeration
        );
        assert_eq!(
            RelayError::InvalidConfig("bad").category(),
            ErrorCategory::Configuration
        );
    }

    #[test]
    fn only_transient_errors_are_recoverable() {
        assert!(RelayError::enumeration("ps missing").is_recoverable());
        assert!(RelayError::SocketClosed.is_recoverable());
        assert!(!RelayError::NoFreeSlot { attempted: 10 }.is_recoverable());
        assert!(!RelayError::InvalidActivity("state".into()).is_recoverable());
    }

    #[test]
    fn display_includes_detail() {
        let err = RelayError::protocol_violation("frame before handshake", ProtocolContext::default());
        assert_eq!(err.to_string(), "Protocol violation: frame before handshake");
    }
}
