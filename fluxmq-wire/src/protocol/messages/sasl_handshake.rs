//! SaslHandshake request and response (API key 17)
//!
//! Version 0 is followed by raw size-delimited SASL tokens; version 1 means
//! tokens travel inside SaslAuthenticate messages.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use super::{count_errors, AbstractRequest, AbstractResponse};
use crate::protocol::api_keys::ApiKey;
use crate::protocol::errors::ErrorCode;
use crate::protocol::types::{Field, FieldType, MessageSchema, Result, Struct, Value, VersionRange};

const MECHANISM: &str = "mechanism";
const ERROR_CODE: &str = "error_code";
const ENABLED_MECHANISMS: &str = "enabled_mechanisms";

pub(crate) static REQUEST_SCHEMA: Lazy<MessageSchema> = Lazy::new(|| {
    MessageSchema::new(
        "SaslHandshakeRequest",
        VersionRange::new(0, 1),
        vec![Field::new(MECHANISM, FieldType::String)],
    )
});

pub(crate) static RESPONSE_SCHEMA: Lazy<MessageSchema> = Lazy::new(|| {
    MessageSchema::new(
        "SaslHandshakeResponse",
        VersionRange::new(0, 1),
        vec![
            Field::new(ERROR_CODE, FieldType::Int16),
            Field::new(ENABLED_MECHANISMS, FieldType::Array(Box::new(FieldType::String))),
        ],
    )
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaslHandshakeRequest {
    mechanism: String,
    version: i16,
}

impl SaslHandshakeRequest {
    pub fn new<S: Into<String>>(mechanism: S, version: i16) -> Self {
        Self {
            mechanism: mechanism.into(),
            version,
        }
    }

    pub fn mechanism(&self) -> &str {
        &self.mechanism
    }
}

impl AbstractRequest for SaslHandshakeRequest {
    const API_KEY: ApiKey = ApiKey::SaslHandshake;

    fn version(&self) -> i16 {
        self.version
    }

    fn to_struct(&self) -> Struct {
        Struct::new().with(MECHANISM, Value::String(self.mechanism.clone()))
    }

    fn from_struct(record: &Struct, version: i16) -> Result<Self> {
        Ok(Self::new(record.get_string(MECHANISM)?, version))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaslHandshakeResponse {
    error: ErrorCode,
    enabled_mechanisms: Vec<String>,
}

impl SaslHandshakeResponse {
    pub fn new(error: ErrorCode, enabled_mechanisms: Vec<String>) -> Self {
        Self {
            error,
            enabled_mechanisms,
        }
    }

    pub fn error(&self) -> ErrorCode {
        self.error
    }

    pub fn enabled_mechanisms(&self) -> &[String] {
        &self.enabled_mechanisms
    }
}

impl AbstractResponse for SaslHandshakeResponse {
    const API_KEY: ApiKey = ApiKey::SaslHandshake;

    fn to_struct(&self, _version: i16) -> Struct {
        Struct::new()
            .with(ERROR_CODE, Value::Int16(self.error.code()))
            .with(
                ENABLED_MECHANISMS,
                Value::Array(
                    self.enabled_mechanisms
                        .iter()
                        .map(|m| Value::String(m.clone()))
                        .collect(),
                ),
            )
    }

    fn from_struct(record: &Struct, _version: i16) -> Result<Self> {
        let enabled_mechanisms = record
            .get_array(ENABLED_MECHANISMS)?
            .iter()
            .map(|value| match value {
                Value::String(m) => Ok(m.clone()),
                _ => Err(crate::error::SchemaError::TypeMismatch {
                    field: ENABLED_MECHANISMS,
                    expected: "string",
                }),
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(
            ErrorCode::from_i16(record.get_i16(ERROR_CODE)?),
            enabled_mechanisms,
        ))
    }

    fn error_counts(&self) -> HashMap<ErrorCode, usize> {
        count_errors([self.error])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::{BufMut, BytesMut};

    #[test]
    fn test_request_layout() {
        let request = SaslHandshakeRequest::new("PLAIN", 1);
        let bytes = REQUEST_SCHEMA.encode(&request.to_struct(), 1).unwrap();
        assert_eq!(&bytes[..], &[0x00, 0x05, b'P', b'L', b'A', b'I', b'N']);
        assert_eq!(SaslHandshakeRequest::parse(bytes, 1).unwrap(), request);
    }

    #[test]
    fn test_response_decode() {
        let mut buf = BytesMut::new();
        buf.put_i16(33);
        buf.put_i32(2);
        buf.put_i16(5);
        buf.put_slice(b"PLAIN");
        buf.put_i16(13);
        buf.put_slice(b"SCRAM-SHA-256");

        let response = SaslHandshakeResponse::parse(buf.freeze(), 0).unwrap();
        assert_eq!(response.error(), ErrorCode::UnsupportedSaslMechanism);
        assert_eq!(response.enabled_mechanisms(), &["PLAIN", "SCRAM-SHA-256"]);
        assert_eq!(
            response.error_counts().get(&ErrorCode::UnsupportedSaslMechanism),
            Some(&1)
        );
    }
}
