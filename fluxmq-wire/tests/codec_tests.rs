use bytes::{Bytes, BytesMut};
use fluxmq_wire::{
    network::FrameCodec,
    protocol::{
        envelope::{parse_response, RequestHeader},
        messages::{ApiVersion, ApiVersionsResponse, StopReplicaRequest, StopReplicaResponse},
        AbstractRequest, AbstractResponse, ApiKey, ErrorCode, Field, FieldType, MessageSchema,
        ResponseBody, Schema, Struct, TopicPartition, Value, VersionRange,
    },
    FluxmqWireError, SchemaError,
};
use proptest::prelude::*;
use std::collections::HashMap;
use tokio_util::codec::{Decoder, Encoder};

fn member_schema() -> MessageSchema {
    MessageSchema::new(
        "Member",
        VersionRange::new(0, 3),
        vec![
            Field::new("id", FieldType::Int32),
            Field::new("name", FieldType::String),
            Field::new("rack", FieldType::NullableString).versions(VersionRange::since(1)),
            Field::new("epoch", FieldType::Int64).versions(VersionRange::new(2, 3)),
            Field::new(
                "tags",
                FieldType::array_of(Schema::new(vec![
                    Field::new("key", FieldType::String),
                    Field::new("value", FieldType::NullableBytes),
                ])),
            ),
        ],
    )
}

fn member(id: i32, name: String, rack: Option<String>, epoch: i64, tags: Vec<(String, Option<Vec<u8>>)>) -> Struct {
    Struct::new()
        .with("id", Value::Int32(id))
        .with("name", Value::String(name))
        .with("rack", Value::NullableString(rack))
        .with("epoch", Value::Int64(epoch))
        .with(
            "tags",
            Value::Array(
                tags.into_iter()
                    .map(|(key, value)| {
                        Value::Struct(
                            Struct::new()
                                .with("key", Value::String(key))
                                .with("value", Value::NullableBytes(value.map(Bytes::from))),
                        )
                    })
                    .collect(),
            ),
        )
}

proptest! {
    #[test]
    fn prop_decode_sees_only_fields_of_its_version(
        id in any::<i32>(),
        name in "[a-z]{0,16}",
        rack in proptest::option::of("[a-z0-9-]{1,8}"),
        epoch in any::<i64>(),
        tags in proptest::collection::vec(
            ("[a-z]{1,6}", proptest::option::of(proptest::collection::vec(any::<u8>(), 0..16))),
            0..4,
        ),
        version in 0i16..=3,
    ) {
        let schema = member_schema();
        let record = member(id, name.clone(), rack.clone(), epoch, tags.clone());
        let encoded = schema.encode(&record, version).unwrap();

        let mut buf = encoded.clone();
        let decoded = schema.read(&mut buf, version).unwrap();
        prop_assert_eq!(decoded.get_i32("id").unwrap(), id);
        prop_assert_eq!(decoded.get_string("name").unwrap(), name.as_str());
        prop_assert_eq!(decoded.has("rack"), version >= 1);
        prop_assert_eq!(decoded.has("epoch"), version >= 2);
        prop_assert_eq!(decoded.get_struct_array("tags").unwrap().len(), tags.len());
        if version >= 1 {
            prop_assert_eq!(decoded.get_nullable_string("rack").unwrap(), rack.clone());
        }

        // Fields of later versions add exactly their own width
        let v0 = schema.encode(&record, 0).unwrap();
        let rack_len = 2 + rack.as_ref().map_or(0, |r| r.len());
        let expected = v0.len()
            + if version >= 1 { rack_len } else { 0 }
            + if version >= 2 { 8 } else { 0 };
        prop_assert_eq!(encoded.len(), expected);
    }

    #[test]
    fn prop_truncated_body_never_decodes(
        name in "[a-z]{1,16}",
        cut in 1usize..8,
        version in 0i16..=3,
    ) {
        let schema = member_schema();
        let record = member(7, name, Some("r1".to_string()), 3, vec![("k".to_string(), None)]);
        let encoded = schema.encode(&record, version).unwrap();
        let cut = cut.min(encoded.len());
        let mut truncated = encoded.slice(..encoded.len() - cut);
        prop_assert!(schema.read(&mut truncated, version).is_err());
    }

    #[test]
    fn prop_frame_codec_splits_concatenated_frames(
        payloads in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 0..64), 1..6),
    ) {
        let mut codec = FrameCodec::new(1024);
        let mut wire = BytesMut::new();
        for payload in &payloads {
            codec.encode(Bytes::from(payload.clone()), &mut wire).unwrap();
        }
        for payload in &payloads {
            let frame = codec.decode(&mut wire).unwrap().unwrap();
            prop_assert_eq!(frame.as_ref(), payload.as_slice());
        }
        prop_assert!(codec.decode(&mut wire).unwrap().is_none());
    }
}

#[test]
fn test_api_versions_higher_version_falls_back_to_v0() {
    let response = ApiVersionsResponse::new(
        ErrorCode::None,
        vec![ApiVersion::new(ApiKey::SaslHandshake.id(), 0, 1)],
        0,
    );
    // Body written at v0, decoded as the newer version the client asked for
    let payload = response.serialize(11, 0).unwrap();
    let header = RequestHeader::new(ApiKey::ApiVersions, 2, None, 11);

    let body = parse_response(payload, &header).unwrap();
    let decoded: ApiVersionsResponse = body.try_into().unwrap();
    assert_eq!(decoded.error(), ErrorCode::None);
    assert_eq!(decoded.api_version(ApiKey::SaslHandshake), Some(&ApiVersion::new(17, 0, 1)));
    assert_eq!(decoded.throttle_time_ms(), 0);
}

#[test]
fn test_unknown_version_is_unsupported() {
    let err = StopReplicaRequest::new(0, 1, false, vec![], 3)
        .serialize(&RequestHeader::new(ApiKey::StopReplica, 3, None, 0))
        .unwrap_err();
    assert!(matches!(err, SchemaError::UnsupportedVersion { version: 3, .. }));
}

#[test]
fn test_stop_replica_exchange() {
    let request = StopReplicaRequest::new(
        1,
        42,
        true,
        vec![TopicPartition::new("orders", 0), TopicPartition::new("orders", 1)],
        0,
    );
    let header = RequestHeader::new(ApiKey::StopReplica, 0, Some("controller".to_string()), 9);
    let mut wire = request.serialize(&header).unwrap();
    let parsed_header = RequestHeader::parse(&mut wire).unwrap();
    assert_eq!(parsed_header, header);
    let parsed = StopReplicaRequest::parse(wire, 0).unwrap();
    assert_eq!(parsed, request);

    let mut responses = HashMap::new();
    responses.insert(TopicPartition::new("orders", 0), ErrorCode::None);
    responses.insert(TopicPartition::new("orders", 1), ErrorCode::KafkaStorageError);
    let response = StopReplicaResponse::new(ErrorCode::None, responses);
    let payload = response.serialize(9, 0).unwrap();

    let body = parse_response(payload, &header).unwrap();
    assert!(matches!(body, ResponseBody::StopReplica(_)));
    let counts = body.error_counts();
    assert_eq!(counts.get(&ErrorCode::None), Some(&2));
    assert_eq!(counts.get(&ErrorCode::KafkaStorageError), Some(&1));
}

#[test]
fn test_wrong_response_type_is_rejected() {
    let payload = StopReplicaResponse::new(ErrorCode::None, HashMap::new())
        .serialize(3, 0)
        .unwrap();
    let header = RequestHeader::new(ApiKey::StopReplica, 0, None, 3);
    let body = parse_response(payload, &header).unwrap();

    let err = ApiVersionsResponse::try_from(body).unwrap_err();
    assert!(matches!(
        err,
        FluxmqWireError::UnexpectedResponse {
            expected: "ApiVersions",
            actual: "StopReplica"
        }
    ));
}
