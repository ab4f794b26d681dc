//! SaslAuthenticate request and response (API key 36)

use std::collections::HashMap;

use bytes::Bytes;
use once_cell::sync::Lazy;

use super::{count_errors, AbstractRequest, AbstractResponse};
use crate::protocol::api_keys::ApiKey;
use crate::protocol::errors::ErrorCode;
use crate::protocol::types::{Field, FieldType, MessageSchema, Result, Struct, Value, VersionRange};

const SASL_AUTH_BYTES: &str = "sasl_auth_bytes";
const ERROR_CODE: &str = "error_code";
const ERROR_MESSAGE: &str = "error_message";
const SESSION_LIFETIME_MS: &str = "session_lifetime_ms";

pub(crate) static REQUEST_SCHEMA: Lazy<MessageSchema> = Lazy::new(|| {
    MessageSchema::new(
        "SaslAuthenticateRequest",
        VersionRange::new(0, 1),
        vec![Field::new(SASL_AUTH_BYTES, FieldType::Bytes)],
    )
});

pub(crate) static RESPONSE_SCHEMA: Lazy<MessageSchema> = Lazy::new(|| {
    MessageSchema::new(
        "SaslAuthenticateResponse",
        VersionRange::new(0, 1),
        vec![
            Field::new(ERROR_CODE, FieldType::Int16),
            Field::new(ERROR_MESSAGE, FieldType::NullableString),
            Field::new(SASL_AUTH_BYTES, FieldType::Bytes),
            Field::new(SESSION_LIFETIME_MS, FieldType::Int64).versions(VersionRange::since(1)),
        ],
    )
});

/// Carries one SASL token to the server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaslAuthenticateRequest {
    sasl_auth_bytes: Bytes,
    version: i16,
}

impl SaslAuthenticateRequest {
    pub fn new(sasl_auth_bytes: Bytes, version: i16) -> Self {
        Self {
            sasl_auth_bytes,
            version,
        }
    }

    pub fn sasl_auth_bytes(&self) -> &Bytes {
        &self.sasl_auth_bytes
    }
}

impl AbstractRequest for SaslAuthenticateRequest {
    const API_KEY: ApiKey = ApiKey::SaslAuthenticate;

    fn version(&self) -> i16 {
        self.version
    }

    fn to_struct(&self) -> Struct {
        Struct::new().with(SASL_AUTH_BYTES, Value::Bytes(self.sasl_auth_bytes.clone()))
    }

    fn from_struct(record: &Struct, version: i16) -> Result<Self> {
        Ok(Self::new(record.get_bytes(SASL_AUTH_BYTES)?, version))
    }
}

/// Carries the server's SASL token, or the reason authentication failed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaslAuthenticateResponse {
    error: ErrorCode,
    error_message: Option<String>,
    sasl_auth_bytes: Bytes,
    session_lifetime_ms: i64,
}

impl SaslAuthenticateResponse {
    pub fn new(
        error: ErrorCode,
        error_message: Option<String>,
        sasl_auth_bytes: Bytes,
        session_lifetime_ms: i64,
    ) -> Self {
        Self {
            error,
            error_message,
            sasl_auth_bytes,
            session_lifetime_ms,
        }
    }

    /// Successful response carrying `token`
    pub fn token(token: Bytes) -> Self {
        Self::new(ErrorCode::None, None, token, 0)
    }

    /// Failed response with an explanation
    pub fn failure<S: Into<String>>(error: ErrorCode, message: S) -> Self {
        Self::new(error, Some(message.into()), Bytes::new(), 0)
    }

    pub fn error(&self) -> ErrorCode {
        self.error
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn sasl_auth_bytes(&self) -> &Bytes {
        &self.sasl_auth_bytes
    }

    /// Zero when the server did not report a lifetime (version 0)
    pub fn session_lifetime_ms(&self) -> i64 {
        self.session_lifetime_ms
    }
}

impl AbstractResponse for SaslAuthenticateResponse {
    const API_KEY: ApiKey = ApiKey::SaslAuthenticate;

    fn to_struct(&self, version: i16) -> Struct {
        let mut record = Struct::new()
            .with(ERROR_CODE, Value::Int16(self.error.code()))
            .with(ERROR_MESSAGE, Value::NullableString(self.error_message.clone()))
            .with(SASL_AUTH_BYTES, Value::Bytes(self.sasl_auth_bytes.clone()));
        if version >= 1 {
            record.set(SESSION_LIFETIME_MS, Value::Int64(self.session_lifetime_ms));
        }
        record
    }

    fn from_struct(record: &Struct, version: i16) -> Result<Self> {
        let session_lifetime_ms = if version >= 1 {
            record.get_i64(SESSION_LIFETIME_MS)?
        } else {
            0
        };
        Ok(Self::new(
            ErrorCode::from_i16(record.get_i16(ERROR_CODE)?),
            record.get_nullable_string(ERROR_MESSAGE)?,
            record.get_bytes(SASL_AUTH_BYTES)?,
            session_lifetime_ms,
        ))
    }

    fn error_counts(&self) -> HashMap<ErrorCode, usize> {
        count_errors([self.error])
    }
}
