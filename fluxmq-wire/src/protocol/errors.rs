//! Kafka error code table
//!
//! Error codes travel as 2-byte signed integers in response bodies. Codes
//! that this library does not know are folded into
//! [`ErrorCode::UnknownServerError`], matching how Kafka clients treat codes
//! from newer brokers.

use std::fmt;

use crate::error::FluxmqWireError;

macro_rules! error_codes {
    ($( $variant:ident = $code:literal, $name:literal, retriable: $retriable:literal, $message:literal; )*) => {
        /// Kafka protocol error codes used by the authentication and
        /// replica control exchanges.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[repr(i16)]
        pub enum ErrorCode {
            $( $variant = $code, )*
        }

        impl ErrorCode {
            /// All known codes
            pub const ALL: &'static [ErrorCode] = &[$( ErrorCode::$variant, )*];

            /// Resolve a wire value; unknown codes become `UnknownServerError`
            pub fn from_i16(code: i16) -> Self {
                match code {
                    $( $code => ErrorCode::$variant, )*
                    _ => ErrorCode::UnknownServerError,
                }
            }

            /// Protocol name, e.g. `UNSUPPORTED_SASL_MECHANISM`
            pub fn name(self) -> &'static str {
                match self {
                    $( ErrorCode::$variant => $name, )*
                }
            }

            /// Check if the failed operation may succeed when retried
            pub fn is_retriable(self) -> bool {
                match self {
                    $( ErrorCode::$variant => $retriable, )*
                }
            }

            /// Default human-readable message
            pub fn message(self) -> &'static str {
                match self {
                    $( ErrorCode::$variant => $message, )*
                }
            }
        }
    };
}

error_codes! {
    UnknownServerError = -1, "UNKNOWN_SERVER_ERROR", retriable: false,
        "The server experienced an unexpected error when processing the request";
    None = 0, "NONE", retriable: false,
        "No error";
    OffsetOutOfRange = 1, "OFFSET_OUT_OF_RANGE", retriable: false,
        "The requested offset is not within the range of offsets maintained by the server";
    CorruptMessage = 2, "CORRUPT_MESSAGE", retriable: true,
        "The message contents does not match the message CRC or the message is otherwise corrupt";
    UnknownTopicOrPartition = 3, "UNKNOWN_TOPIC_OR_PARTITION", retriable: true,
        "This server does not host this topic-partition";
    LeaderNotAvailable = 5, "LEADER_NOT_AVAILABLE", retriable: true,
        "There is no leader for this topic-partition as we are in the middle of a leadership election";
    NotLeaderForPartition = 6, "NOT_LEADER_FOR_PARTITION", retriable: true,
        "This server is not the leader for that topic-partition";
    RequestTimedOut = 7, "REQUEST_TIMED_OUT", retriable: true,
        "The request timed out";
    BrokerNotAvailable = 8, "BROKER_NOT_AVAILABLE", retriable: false,
        "The broker is not available";
    ReplicaNotAvailable = 9, "REPLICA_NOT_AVAILABLE", retriable: false,
        "The replica is not available for the requested topic-partition";
    StaleControllerEpoch = 11, "STALE_CONTROLLER_EPOCH", retriable: false,
        "The controller moved to another broker";
    NetworkException = 13, "NETWORK_EXCEPTION", retriable: true,
        "The server disconnected before a response was received";
    ClusterAuthorizationFailed = 31, "CLUSTER_AUTHORIZATION_FAILED", retriable: false,
        "Cluster authorization failed";
    UnsupportedSaslMechanism = 33, "UNSUPPORTED_SASL_MECHANISM", retriable: false,
        "The broker does not support the requested SASL mechanism";
    IllegalSaslState = 34, "ILLEGAL_SASL_STATE", retriable: false,
        "Request is not valid given the current SASL state";
    UnsupportedVersion = 35, "UNSUPPORTED_VERSION", retriable: false,
        "The version of API is not supported";
    NotController = 41, "NOT_CONTROLLER", retriable: true,
        "This is not the correct controller for this cluster";
    InvalidRequest = 42, "INVALID_REQUEST", retriable: false,
        "This most likely occurs because of a request being malformed by the client library or the message was sent to an incompatible broker";
    SecurityDisabled = 54, "SECURITY_DISABLED", retriable: false,
        "Security features are disabled";
    KafkaStorageError = 56, "KAFKA_STORAGE_ERROR", retriable: true,
        "Disk error when trying to access log file on the disk";
    SaslAuthenticationFailed = 58, "SASL_AUTHENTICATION_FAILED", retriable: false,
        "SASL Authentication failed";
    StaleBrokerEpoch = 77, "STALE_BROKER_EPOCH", retriable: false,
        "Broker epoch has changed";
}

impl ErrorCode {
    /// Wire value
    pub fn code(self) -> i16 {
        self as i16
    }

    /// Map a non-NONE response code to the error raised to the caller.
    ///
    /// `api` names the response the code came from; `message` overrides the
    /// default text when the server supplied one.
    pub fn exception(self, api: &'static str, message: Option<&str>) -> FluxmqWireError {
        let message = message.unwrap_or(self.message()).to_string();
        match self {
            ErrorCode::SaslAuthenticationFailed => FluxmqWireError::SaslAuthentication { message },
            ErrorCode::IllegalSaslState => FluxmqWireError::IllegalSaslState { message },
            code => FluxmqWireError::Server { api, code, message },
        }
    }
}

impl Default for ErrorCode {
    fn default() -> Self {
        ErrorCode::None
    }
}

impl From<i16> for ErrorCode {
    fn from(code: i16) -> Self {
        ErrorCode::from_i16(code)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_conversion() {
        for code in ErrorCode::ALL {
            assert_eq!(ErrorCode::from_i16(code.code()), *code);
        }
        assert_eq!(ErrorCode::from_i16(33), ErrorCode::UnsupportedSaslMechanism);
        assert_eq!(ErrorCode::from_i16(34), ErrorCode::IllegalSaslState);
        assert_eq!(ErrorCode::from_i16(58), ErrorCode::SaslAuthenticationFailed);
    }

    #[test]
    fn test_unknown_code_folds() {
        assert_eq!(ErrorCode::from_i16(9999), ErrorCode::UnknownServerError);
        assert_eq!(ErrorCode::from(-42), ErrorCode::UnknownServerError);
    }

    #[test]
    fn test_exception_mapping() {
        let err = ErrorCode::SaslAuthenticationFailed.exception("SaslAuthenticate", Some("bad credentials"));
        assert!(matches!(err, FluxmqWireError::SaslAuthentication { ref message } if message == "bad credentials"));

        let err = ErrorCode::IllegalSaslState.exception("SaslAuthenticate", None);
        assert!(matches!(err, FluxmqWireError::IllegalSaslState { .. }));

        let err = ErrorCode::ClusterAuthorizationFailed.exception("StopReplica", None);
        match err {
            FluxmqWireError::Server { api, code, message } => {
                assert_eq!(api, "StopReplica");
                assert_eq!(code, ErrorCode::ClusterAuthorizationFailed);
                assert_eq!(message, "Cluster authorization failed");
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_error_display() {
        assert_eq!(
            ErrorCode::UnsupportedSaslMechanism.to_string(),
            "UNSUPPORTED_SASL_MECHANISM (33)"
        );
        assert!(ErrorCode::NotController.is_retriable());
        assert!(!ErrorCode::SaslAuthenticationFailed.is_retriable());
    }
}
