//! Error types for the FluxMQ wire library

use crate::protocol::errors::ErrorCode;
use crate::security::mechanism::MechanismError;

/// Structural failures raised by the field/schema codec.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    /// Not enough bytes left to read a value
    #[error("Buffer underrun reading '{field}': needed {needed} bytes, {available} available")]
    BufferUnderrun {
        field: &'static str,
        needed: usize,
        available: usize,
    },

    /// A declared length that cannot be valid
    #[error("Invalid length {length} for '{field}'")]
    InvalidLength { field: &'static str, length: i32 },

    /// String bytes are not UTF-8
    #[error("Invalid UTF-8 in '{field}'")]
    InvalidString { field: &'static str },

    /// Boolean byte other than 0 or 1
    #[error("Invalid boolean value {value} for '{field}'")]
    InvalidBoolean { field: &'static str, value: i8 },

    /// Version outside of the schema's supported range
    #[error("{api} does not support version {version}")]
    UnsupportedVersion { api: &'static str, version: i16 },

    /// Field required at this version was never set
    #[error("Missing required field '{field}' for version {version}")]
    MissingField { field: &'static str, version: i16 },

    /// Value does not match the declared field type
    #[error("Field '{field}' expected a value of type {expected}")]
    TypeMismatch {
        field: &'static str,
        expected: &'static str,
    },

    /// String does not fit the 2-byte length prefix
    #[error("String for '{field}' is too long: {length} bytes")]
    StringTooLong { field: &'static str, length: usize },

    /// API key not present in the catalog
    #[error("Unknown API key {0}")]
    UnknownApiKey(i16),
}

/// Main error type for FluxMQ wire operations
#[derive(Debug, thiserror::Error)]
pub enum FluxmqWireError {
    /// Codec errors
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Response correlation id differs from the outstanding request
    #[error("Correlation id for response ({actual}) does not match request ({expected})")]
    CorrelationMismatch { expected: i32, actual: i32 },

    /// Response of a different message type than the outstanding request
    #[error("Unexpected {actual} response while awaiting {expected}")]
    UnexpectedResponse {
        expected: &'static str,
        actual: &'static str,
    },

    /// Response bytes could not be decoded as the expected message
    #[error("Invalid SASL mechanism response, server may be expecting a different protocol: {source}")]
    InvalidSaslResponse {
        #[source]
        source: Box<FluxmqWireError>,
    },

    /// Server rejected the configured mechanism
    #[error("Client SASL mechanism '{mechanism}' not enabled in the server, enabled mechanisms are {enabled:?}")]
    UnsupportedSaslMechanism {
        mechanism: String,
        enabled: Vec<String>,
    },

    /// Exchange arrived in a state where it is not allowed
    #[error("{message}")]
    IllegalSaslState { message: String },

    /// Authenticator invoked after it failed or was closed
    #[error("SASL handshake with node {node} has already failed or was closed")]
    HandshakeTerminated { node: String },

    /// Server-side authentication failure
    #[error("SASL authentication failed: {message}")]
    SaslAuthentication { message: String },

    /// The local mechanism failed to evaluate a token
    #[error("An error occurred when evaluating SASL token received from {host} using mechanism {mechanism}: {source}")]
    Mechanism {
        mechanism: String,
        host: String,
        #[source]
        source: MechanismError,
    },

    /// Any other non-NONE error code returned by the server
    #[error("{api} failed with {code}: {message}")]
    Server {
        api: &'static str,
        code: ErrorCode,
        message: String,
    },

    /// Peer closed the connection mid-exchange
    #[error("Connection to node {node} closed during authentication")]
    ConnectionClosed { node: String },

    /// Timeout errors
    #[error("Operation timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// Invalid configuration
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },
}

impl FluxmqWireError {
    /// Create a new illegal SASL state error
    pub fn illegal_state<S: Into<String>>(message: S) -> Self {
        Self::IllegalSaslState {
            message: message.into(),
        }
    }

    /// Create a new authentication failure
    pub fn authentication<S: Into<String>>(message: S) -> Self {
        Self::SaslAuthentication {
            message: message.into(),
        }
    }

    /// Create a new invalid config error
    pub fn invalid_config<S: Into<String>>(message: S) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    /// Create a timeout error
    pub fn timeout(timeout_ms: u64) -> Self {
        Self::Timeout { timeout_ms }
    }

    /// Wrap a decode failure of a SASL exchange response
    pub fn invalid_sasl_response(source: FluxmqWireError) -> Self {
        Self::InvalidSaslResponse {
            source: Box::new(source),
        }
    }

    /// Check if this error is retryable on a fresh connection
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Io(_) => true,
            Self::Timeout { .. } => true,
            Self::ConnectionClosed { .. } => true,
            Self::Server { code, .. } => code.is_retriable(),
            _ => false,
        }
    }

    /// Check if the peer or the mechanism refused the credentials
    pub fn is_authentication_failure(&self) -> bool {
        matches!(
            self,
            Self::SaslAuthentication { .. }
                | Self::UnsupportedSaslMechanism { .. }
                | Self::IllegalSaslState { .. }
                | Self::Mechanism { .. }
        )
    }

    /// Check if this error is a timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}
