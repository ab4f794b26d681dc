//! Versioned message types
//!
//! Each message converts to and from a [`Struct`] using the schema that its
//! [`ApiKey`] declares. Requests carry their own version; responses are
//! told the version to encode or decode at.

pub mod api_versions;
pub mod sasl_authenticate;
pub mod sasl_handshake;
pub mod stop_replica;

use std::collections::HashMap;
use std::fmt;

use bytes::{Bytes, BytesMut};

use super::api_keys::ApiKey;
use super::envelope::{RequestHeader, ResponseHeader};
use super::errors::ErrorCode;
use super::types::{Result, Struct};
use crate::error::FluxmqWireError;

pub use api_versions::{ApiVersion, ApiVersionsRequest, ApiVersionsResponse};
pub use sasl_authenticate::{SaslAuthenticateRequest, SaslAuthenticateResponse};
pub use sasl_handshake::{SaslHandshakeRequest, SaslHandshakeResponse};
pub use stop_replica::{StopReplicaRequest, StopReplicaResponse};

/// Topic and partition pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TopicPartition {
    pub topic: String,
    pub partition: i32,
}

impl TopicPartition {
    pub fn new<S: Into<String>>(topic: S, partition: i32) -> Self {
        Self {
            topic: topic.into(),
            partition,
        }
    }
}

impl fmt::Display for TopicPartition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.topic, self.partition)
    }
}

/// Count occurrences of each error code
pub(crate) fn count_errors<I>(errors: I) -> HashMap<ErrorCode, usize>
where
    I: IntoIterator<Item = ErrorCode>,
{
    let mut counts = HashMap::new();
    for error in errors {
        *counts.entry(error).or_insert(0) += 1;
    }
    counts
}

/// A request body bound to one API key
pub trait AbstractRequest: Sized {
    const API_KEY: ApiKey;

    fn version(&self) -> i16;

    fn to_struct(&self) -> Struct;

    fn from_struct(record: &Struct, version: i16) -> Result<Self>;

    /// Decode a request body at `version`
    fn parse(mut buffer: Bytes, version: i16) -> Result<Self> {
        let record = Self::API_KEY.request_schema().read(&mut buffer, version)?;
        Self::from_struct(&record, version)
    }

    /// Header followed by body, without the size prefix
    fn serialize(&self, header: &RequestHeader) -> Result<Bytes> {
        let mut buf = BytesMut::new();
        header.write(&mut buf)?;
        Self::API_KEY
            .request_schema()
            .write(&mut buf, &self.to_struct(), self.version())?;
        Ok(buf.freeze())
    }
}

/// A response body bound to one API key
pub trait AbstractResponse: Sized {
    const API_KEY: ApiKey;

    fn to_struct(&self, version: i16) -> Struct;

    fn from_struct(record: &Struct, version: i16) -> Result<Self>;

    /// Every error code in the response with its occurrence count
    fn error_counts(&self) -> HashMap<ErrorCode, usize>;

    /// Decode a response body at `version`
    fn parse(mut buffer: Bytes, version: i16) -> Result<Self> {
        let record = Self::API_KEY.response_schema().read(&mut buffer, version)?;
        Self::from_struct(&record, version)
    }

    /// Response header followed by body, without the size prefix
    fn serialize(&self, correlation_id: i32, version: i16) -> Result<Bytes> {
        let mut buf = BytesMut::new();
        ResponseHeader::new(correlation_id).write(&mut buf);
        Self::API_KEY
            .response_schema()
            .write(&mut buf, &self.to_struct(version), version)?;
        Ok(buf.freeze())
    }
}

/// A decoded response of any supported API
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseBody {
    ApiVersions(ApiVersionsResponse),
    SaslHandshake(SaslHandshakeResponse),
    SaslAuthenticate(SaslAuthenticateResponse),
    StopReplica(StopReplicaResponse),
}

impl ResponseBody {
    /// Decode the body of a response to a request for `api_key`
    pub fn parse(api_key: ApiKey, buffer: Bytes, version: i16) -> Result<Self> {
        Ok(match api_key {
            ApiKey::ApiVersions => Self::ApiVersions(ApiVersionsResponse::parse(buffer, version)?),
            ApiKey::SaslHandshake => {
                Self::SaslHandshake(SaslHandshakeResponse::parse(buffer, version)?)
            }
            ApiKey::SaslAuthenticate => {
                Self::SaslAuthenticate(SaslAuthenticateResponse::parse(buffer, version)?)
            }
            ApiKey::StopReplica => Self::StopReplica(StopReplicaResponse::parse(buffer, version)?),
        })
    }

    pub fn api_key(&self) -> ApiKey {
        match self {
            Self::ApiVersions(_) => ApiKey::ApiVersions,
            Self::SaslHandshake(_) => ApiKey::SaslHandshake,
            Self::SaslAuthenticate(_) => ApiKey::SaslAuthenticate,
            Self::StopReplica(_) => ApiKey::StopReplica,
        }
    }

    pub fn error_counts(&self) -> HashMap<ErrorCode, usize> {
        match self {
            Self::ApiVersions(r) => r.error_counts(),
            Self::SaslHandshake(r) => r.error_counts(),
            Self::SaslAuthenticate(r) => r.error_counts(),
            Self::StopReplica(r) => r.error_counts(),
        }
    }
}

macro_rules! response_body_conversion {
    ($variant:ident, $ty:ty) => {
        impl TryFrom<ResponseBody> for $ty {
            type Error = FluxmqWireError;

            fn try_from(body: ResponseBody) -> std::result::Result<Self, Self::Error> {
                match body {
                    ResponseBody::$variant(response) => Ok(response),
                    other => Err(FluxmqWireError::UnexpectedResponse {
                        expected: ApiKey::$variant.name(),
                        actual: other.api_key().name(),
                    }),
                }
            }
        }
    };
}

response_body_conversion!(ApiVersions, ApiVersionsResponse);
response_body_conversion!(SaslHandshake, SaslHandshakeResponse);
response_body_conversion!(SaslAuthenticate, SaslAuthenticateResponse);
response_body_conversion!(StopReplica, StopReplicaResponse);
