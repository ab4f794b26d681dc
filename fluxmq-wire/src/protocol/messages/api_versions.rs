//! ApiVersions request and response (API key 18)
//!
//! The response lists, per API key, the version range the peer accepts.
//! Version 1 appends a throttle time. Because a client may not know the
//! exact version a peer answered with, [`ApiVersionsResponse::parse`] falls
//! back to version 0 once when decoding at the requested version fails.

use std::collections::HashMap;

use bytes::Bytes;
use once_cell::sync::Lazy;
use tracing::debug;

use super::{count_errors, AbstractRequest, AbstractResponse};
use crate::protocol::api_keys::ApiKey;
use crate::protocol::errors::ErrorCode;
use crate::protocol::types::{
    Field, FieldType, MessageSchema, Result, Schema, Struct, Value, VersionRange,
};

const ERROR_CODE: &str = "error_code";
const API_VERSIONS: &str = "api_versions";
const API_KEY: &str = "api_key";
const MIN_VERSION: &str = "min_version";
const MAX_VERSION: &str = "max_version";
const THROTTLE_TIME_MS: &str = "throttle_time_ms";

pub(crate) static REQUEST_SCHEMA: Lazy<MessageSchema> =
    Lazy::new(|| MessageSchema::new("ApiVersionsRequest", VersionRange::new(0, 2), vec![]));

pub(crate) static RESPONSE_SCHEMA: Lazy<MessageSchema> = Lazy::new(|| {
    MessageSchema::new(
        "ApiVersionsResponse",
        VersionRange::new(0, 2),
        vec![
            Field::new(ERROR_CODE, FieldType::Int16),
            Field::new(
                API_VERSIONS,
                FieldType::array_of(Schema::new(vec![
                    Field::new(API_KEY, FieldType::Int16),
                    Field::new(MIN_VERSION, FieldType::Int16),
                    Field::new(MAX_VERSION, FieldType::Int16),
                ])),
            ),
            Field::new(THROTTLE_TIME_MS, FieldType::Int32).versions(VersionRange::since(1)),
        ],
    )
});

/// Supported version range for one API key
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ApiVersion {
    pub api_key: i16,
    pub min_version: i16,
    pub max_version: i16,
}

impl ApiVersion {
    pub fn new(api_key: i16, min_version: i16, max_version: i16) -> Self {
        Self {
            api_key,
            min_version,
            max_version,
        }
    }

    /// Range this library supports for `api_key`
    pub fn local(api_key: ApiKey) -> Self {
        Self::new(api_key.id(), api_key.oldest_version(), api_key.latest_version())
    }

    pub fn supports_version(&self, version: i16) -> bool {
        version >= self.min_version && version <= self.max_version
    }

    /// Highest version both this range and `latest` allow
    pub fn usable_version(&self, latest: i16) -> i16 {
        self.max_version.min(latest)
    }

    fn to_struct(self) -> Struct {
        Struct::new()
            .with(API_KEY, Value::Int16(self.api_key))
            .with(MIN_VERSION, Value::Int16(self.min_version))
            .with(MAX_VERSION, Value::Int16(self.max_version))
    }

    fn from_struct(record: &Struct) -> Result<Self> {
        Ok(Self::new(
            record.get_i16(API_KEY)?,
            record.get_i16(MIN_VERSION)?,
            record.get_i16(MAX_VERSION)?,
        ))
    }
}

/// Capability query; the body is empty at every version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiVersionsRequest {
    version: i16,
}

impl ApiVersionsRequest {
    pub fn new(version: i16) -> Self {
        Self { version }
    }
}

impl AbstractRequest for ApiVersionsRequest {
    const API_KEY: ApiKey = ApiKey::ApiVersions;

    fn version(&self) -> i16 {
        self.version
    }

    fn to_struct(&self) -> Struct {
        Struct::new()
    }

    fn from_struct(_record: &Struct, version: i16) -> Result<Self> {
        Ok(Self::new(version))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApiVersionsResponse {
    error: ErrorCode,
    api_versions: Vec<ApiVersion>,
    throttle_time_ms: i32,
}

impl ApiVersionsResponse {
    pub fn new(error: ErrorCode, api_versions: Vec<ApiVersion>, throttle_time_ms: i32) -> Self {
        Self {
            error,
            api_versions,
            throttle_time_ms,
        }
    }

    /// Response advertising every API key this library knows
    pub fn default_response() -> Self {
        Self::new(
            ErrorCode::None,
            ApiKey::ALL.iter().map(|key| ApiVersion::local(*key)).collect(),
            0,
        )
    }

    pub fn error(&self) -> ErrorCode {
        self.error
    }

    pub fn api_versions(&self) -> &[ApiVersion] {
        &self.api_versions
    }

    /// Advertised range for `api_key`, if the peer listed it
    pub fn api_version(&self, api_key: ApiKey) -> Option<&ApiVersion> {
        self.api_versions.iter().find(|v| v.api_key == api_key.id())
    }

    pub fn throttle_time_ms(&self) -> i32 {
        self.throttle_time_ms
    }

    /// Clients throttle themselves only from version 2
    pub fn should_client_throttle(version: i16) -> bool {
        version >= 2
    }

    fn parse_exact(mut buffer: Bytes, version: i16) -> Result<Self> {
        let record = RESPONSE_SCHEMA.read(&mut buffer, version)?;
        Self::from_struct(&record, version)
    }
}

impl AbstractResponse for ApiVersionsResponse {
    const API_KEY: ApiKey = ApiKey::ApiVersions;

    fn to_struct(&self, version: i16) -> Struct {
        let mut record = Struct::new()
            .with(ERROR_CODE, Value::Int16(self.error.code()))
            .with(
                API_VERSIONS,
                Value::Array(
                    self.api_versions
                        .iter()
                        .map(|v| Value::Struct(v.to_struct()))
                        .collect(),
                ),
            );
        if version >= 1 {
            record.set(THROTTLE_TIME_MS, Value::Int32(self.throttle_time_ms));
        }
        record
    }

    fn from_struct(record: &Struct, _version: i16) -> Result<Self> {
        let api_versions = record
            .get_struct_array(API_VERSIONS)?
            .into_iter()
            .map(ApiVersion::from_struct)
            .collect::<Result<Vec<_>>>()?;
        let throttle_time_ms = if record.has(THROTTLE_TIME_MS) {
            record.get_i32(THROTTLE_TIME_MS)?
        } else {
            0
        };
        Ok(Self::new(
            ErrorCode::from_i16(record.get_i16(ERROR_CODE)?),
            api_versions,
            throttle_time_ms,
        ))
    }

    fn error_counts(&self) -> HashMap<ErrorCode, usize> {
        count_errors([self.error])
    }

    /// Decode at `version`, retrying once at version 0 if that fails.
    ///
    /// A peer that does not support the requested version answers with a
    /// version 0 body, so the retry uses the same bytes from the start.
    fn parse(buffer: Bytes, version: i16) -> Result<Self> {
        match Self::parse_exact(buffer.clone(), version) {
            Ok(response) => Ok(response),
            Err(err) if version != 0 => {
                debug!(
                    "Failed to parse ApiVersionsResponse at version {} ({}), retrying with version 0",
                    version, err
                );
                Self::parse_exact(buffer, 0)
            }
            Err(err) => Err(err),
        }
    }
}
