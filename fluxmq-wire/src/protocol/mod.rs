//! Kafka wire protocol: schema codec, envelopes and message types

pub mod api_keys;
pub mod envelope;
pub mod errors;
pub mod messages;
pub mod types;

pub use api_keys::ApiKey;
pub use envelope::{parse_response, RequestHeader, ResponseHeader};
pub use errors::ErrorCode;
pub use messages::{AbstractRequest, AbstractResponse, ResponseBody, TopicPartition};
pub use types::{Field, FieldType, MessageSchema, Schema, Struct, Value, VersionRange};
