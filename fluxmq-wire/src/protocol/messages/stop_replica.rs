//! StopReplica request and response (API key 5)

use std::collections::HashMap;

use once_cell::sync::Lazy;

use super::{count_errors, AbstractRequest, AbstractResponse, TopicPartition};
use crate::protocol::api_keys::ApiKey;
use crate::protocol::errors::ErrorCode;
use crate::protocol::types::{
    Field, FieldType, MessageSchema, Result, Schema, Struct, Value, VersionRange,
};

const CONTROLLER_ID: &str = "controller_id";
const CONTROLLER_EPOCH: &str = "controller_epoch";
const DELETE_PARTITIONS: &str = "delete_partitions";
const PARTITIONS: &str = "partitions";
const TOPIC: &str = "topic";
const PARTITION: &str = "partition";
const ERROR_CODE: &str = "error_code";

pub(crate) static REQUEST_SCHEMA: Lazy<MessageSchema> = Lazy::new(|| {
    MessageSchema::new(
        "StopReplicaRequest",
        VersionRange::new(0, 0),
        vec![
            Field::new(CONTROLLER_ID, FieldType::Int32),
            Field::new(CONTROLLER_EPOCH, FieldType::Int32),
            Field::new(DELETE_PARTITIONS, FieldType::Boolean),
            Field::new(
                PARTITIONS,
                FieldType::array_of(Schema::new(vec![
                    Field::new(TOPIC, FieldType::String),
                    Field::new(PARTITION, FieldType::Int32),
                ])),
            ),
        ],
    )
});

pub(crate) static RESPONSE_SCHEMA: Lazy<MessageSchema> = Lazy::new(|| {
    MessageSchema::new(
        "StopReplicaResponse",
        VersionRange::new(0, 0),
        vec![
            Field::new(ERROR_CODE, FieldType::Int16),
            Field::new(
                PARTITIONS,
                FieldType::array_of(Schema::new(vec![
                    Field::new(TOPIC, FieldType::String),
                    Field::new(PARTITION, FieldType::Int32),
                    Field::new(ERROR_CODE, FieldType::Int16),
                ])),
            ),
        ],
    )
});

fn topic_partition_from_struct(record: &Struct) -> Result<TopicPartition> {
    Ok(TopicPartition::new(
        record.get_string(TOPIC)?,
        record.get_i32(PARTITION)?,
    ))
}

/// Asks a broker to stop replicating a set of partitions
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopReplicaRequest {
    controller_id: i32,
    controller_epoch: i32,
    delete_partitions: bool,
    partitions: Vec<TopicPartition>,
    version: i16,
}

impl StopReplicaRequest {
    pub fn new(
        controller_id: i32,
        controller_epoch: i32,
        delete_partitions: bool,
        partitions: Vec<TopicPartition>,
        version: i16,
    ) -> Self {
        Self {
            controller_id,
            controller_epoch,
            delete_partitions,
            partitions,
            version,
        }
    }

    pub fn controller_id(&self) -> i32 {
        self.controller_id
    }

    pub fn controller_epoch(&self) -> i32 {
        self.controller_epoch
    }

    pub fn delete_partitions(&self) -> bool {
        self.delete_partitions
    }

    pub fn partitions(&self) -> &[TopicPartition] {
        &self.partitions
    }
}

impl AbstractRequest for StopReplicaRequest {
    const API_KEY: ApiKey = ApiKey::StopReplica;

    fn version(&self) -> i16 {
        self.version
    }

    fn to_struct(&self) -> Struct {
        let partitions = self
            .partitions
            .iter()
            .map(|tp| {
                Value::Struct(
                    Struct::new()
                        .with(TOPIC, Value::String(tp.topic.clone()))
                        .with(PARTITION, Value::Int32(tp.partition)),
                )
            })
            .collect();
        Struct::new()
            .with(CONTROLLER_ID, Value::Int32(self.controller_id))
            .with(CONTROLLER_EPOCH, Value::Int32(self.controller_epoch))
            .with(DELETE_PARTITIONS, Value::Boolean(self.delete_partitions))
            .with(PARTITIONS, Value::Array(partitions))
    }

    fn from_struct(record: &Struct, version: i16) -> Result<Self> {
        let partitions = record
            .get_struct_array(PARTITIONS)?
            .into_iter()
            .map(topic_partition_from_struct)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::new(
            record.get_i32(CONTROLLER_ID)?,
            record.get_i32(CONTROLLER_EPOCH)?,
            record.get_bool(DELETE_PARTITIONS)?,
            partitions,
            version,
        ))
    }
}

/// Top-level error plus one error per partition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopReplicaResponse {
    error: ErrorCode,
    responses: HashMap<TopicPartition, ErrorCode>,
}

impl StopReplicaResponse {
    pub fn new(error: ErrorCode, responses: HashMap<TopicPartition, ErrorCode>) -> Self {
        Self { error, responses }
    }

    pub fn error(&self) -> ErrorCode {
        self.error
    }

    pub fn responses(&self) -> &HashMap<TopicPartition, ErrorCode> {
        &self.responses
    }
}

impl AbstractResponse for StopReplicaResponse {
    const API_KEY: ApiKey = ApiKey::StopReplica;

    fn to_struct(&self, _version: i16) -> Struct {
        let mut entries: Vec<_> = self.responses.iter().collect();
        entries.sort();
        let partitions = entries
            .into_iter()
            .map(|(tp, error)| {
                Value::Struct(
                    Struct::new()
                        .with(TOPIC, Value::String(tp.topic.clone()))
                        .with(PARTITION, Value::Int32(tp.partition))
                        .with(ERROR_CODE, Value::Int16(error.code())),
                )
            })
            .collect();
        Struct::new()
            .with(ERROR_CODE, Value::Int16(self.error.code()))
            .with(PARTITIONS, Value::Array(partitions))
    }

    fn from_struct(record: &Struct, _version: i16) -> Result<Self> {
        let mut responses = HashMap::new();
        for partition in record.get_struct_array(PARTITIONS)? {
            let error = ErrorCode::from_i16(partition.get_i16(ERROR_CODE)?);
            responses.insert(topic_partition_from_struct(partition)?, error);
        }
        Ok(Self::new(
            ErrorCode::from_i16(record.get_i16(ERROR_CODE)?),
            responses,
        ))
    }

    /// The top-level error counts once, then each partition's error
    fn error_counts(&self) -> HashMap<ErrorCode, usize> {
        count_errors(std::iter::once(self.error).chain(self.responses.values().copied()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::{BufMut, BytesMut};

    #[test]
    fn test_response_decode() {
        let mut buf = BytesMut::new();
        buf.put_i16(0);
        buf.put_i32(2);
        buf.put_i16(6);
        buf.put_slice(b"orders");
        buf.put_i32(0);
        buf.put_i16(0);
        buf.put_i16(6);
        buf.put_slice(b"orders");
        buf.put_i32(1);
        buf.put_i16(56);

        let response = StopReplicaResponse::parse(buf.freeze(), 0).unwrap();
        assert_eq!(response.error(), ErrorCode::None);
        assert_eq!(
            response.responses().get(&TopicPartition::new("orders", 1)),
            Some(&ErrorCode::KafkaStorageError)
        );
        assert_eq!(response.responses().len(), 2);
    }

    #[test]
    fn test_error_counts_aggregate_partitions() {
        let mut responses = HashMap::new();
        responses.insert(TopicPartition::new("a", 0), ErrorCode::None);
        responses.insert(TopicPartition::new("a", 1), ErrorCode::KafkaStorageError);
        responses.insert(TopicPartition::new("b", 0), ErrorCode::KafkaStorageError);
        let response = StopReplicaResponse::new(ErrorCode::None, responses);

        let counts = response.error_counts();
        assert_eq!(counts.get(&ErrorCode::None), Some(&2));
        assert_eq!(counts.get(&ErrorCode::KafkaStorageError), Some(&2));
    }

    #[test]
    fn test_stale_epoch_response() {
        let response = StopReplicaResponse::new(ErrorCode::StaleControllerEpoch, HashMap::new());
        let bytes = RESPONSE_SCHEMA.encode(&response.to_struct(0), 0).unwrap();
        assert_eq!(&bytes[..], &[0x00, 0x0b, 0x00, 0x00, 0x00, 0x00]);
        let decoded = StopReplicaResponse::parse(bytes, 0).unwrap();
        assert_eq!(decoded, response);
        assert_eq!(decoded.error_counts().len(), 1);
    }

    #[test]
    fn test_request_round_trip() {
        let request = StopReplicaRequest::new(
            1,
            7,
            true,
            vec![TopicPartition::new("orders", 0), TopicPartition::new("orders", 2)],
            0,
        );
        let bytes = REQUEST_SCHEMA.encode(&request.to_struct(), 0).unwrap();
        assert_eq!(StopReplicaRequest::parse(bytes, 0).unwrap(), request);
    }

    #[test]
    fn test_unsupported_version() {
        let response = StopReplicaResponse::new(ErrorCode::None, HashMap::new());
        assert!(RESPONSE_SCHEMA.encode(&response.to_struct(1), 1).is_err());
    }
}
