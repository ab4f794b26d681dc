//! API key catalog

use std::fmt;

use super::messages::{api_versions, sasl_authenticate, sasl_handshake, stop_replica};
use super::types::MessageSchema;
use crate::error::SchemaError;

/// APIs this library can encode and decode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i16)]
pub enum ApiKey {
    StopReplica = 5,
    SaslHandshake = 17,
    ApiVersions = 18,
    SaslAuthenticate = 36,
}

impl ApiKey {
    pub const ALL: &'static [ApiKey] = &[
        ApiKey::StopReplica,
        ApiKey::SaslHandshake,
        ApiKey::ApiVersions,
        ApiKey::SaslAuthenticate,
    ];

    pub fn id(self) -> i16 {
        self as i16
    }

    pub fn from_id(id: i16) -> Result<Self, SchemaError> {
        ApiKey::ALL
            .iter()
            .copied()
            .find(|key| key.id() == id)
            .ok_or(SchemaError::UnknownApiKey(id))
    }

    pub fn name(self) -> &'static str {
        match self {
            ApiKey::StopReplica => "StopReplica",
            ApiKey::SaslHandshake => "SaslHandshake",
            ApiKey::ApiVersions => "ApiVersions",
            ApiKey::SaslAuthenticate => "SaslAuthenticate",
        }
    }

    pub fn request_schema(self) -> &'static MessageSchema {
        match self {
            ApiKey::StopReplica => &*stop_replica::REQUEST_SCHEMA,
            ApiKey::SaslHandshake => &*sasl_handshake::REQUEST_SCHEMA,
            ApiKey::ApiVersions => &*api_versions::REQUEST_SCHEMA,
            ApiKey::SaslAuthenticate => &*sasl_authenticate::REQUEST_SCHEMA,
        }
    }

    pub fn response_schema(self) -> &'static MessageSchema {
        match self {
            ApiKey::StopReplica => &*stop_replica::RESPONSE_SCHEMA,
            ApiKey::SaslHandshake => &*sasl_handshake::RESPONSE_SCHEMA,
            ApiKey::ApiVersions => &*api_versions::RESPONSE_SCHEMA,
            ApiKey::SaslAuthenticate => &*sasl_authenticate::RESPONSE_SCHEMA,
        }
    }

    pub fn oldest_version(self) -> i16 {
        self.request_schema().versions.low
    }

    pub fn latest_version(self) -> i16 {
        self.request_schema().versions.high
    }

    pub fn is_version_supported(self, version: i16) -> bool {
        self.request_schema().versions.contains(version)
    }
}

impl fmt::Display for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name(), self.id())
    }
}
