//! Request/response envelopes
//!
//! Every message on the wire is `[int32 size][header][body]`. The request
//! header names the API, its version, a client-chosen correlation id and an
//! optional client id; the response header echoes the correlation id. A
//! response carries no API key of its own, so it can only be decoded against
//! the header of the request it answers.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tracing::debug;

use super::api_keys::ApiKey;
use super::messages::{AbstractRequest, AbstractResponse, ResponseBody};
use super::types::{get_nullable_string, put_nullable_string, Result as SchemaResult};
use crate::error::SchemaError;
use crate::network::NetworkSend;
use crate::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHeader {
    pub api_key: ApiKey,
    pub api_version: i16,
    pub correlation_id: i32,
    pub client_id: Option<String>,
}

impl RequestHeader {
    pub fn new(
        api_key: ApiKey,
        api_version: i16,
        client_id: Option<String>,
        correlation_id: i32,
    ) -> Self {
        Self {
            api_key,
            api_version,
            correlation_id,
            client_id,
        }
    }

    pub fn write(&self, buf: &mut BytesMut) -> SchemaResult<()> {
        buf.put_i16(self.api_key.id());
        buf.put_i16(self.api_version);
        buf.put_i32(self.correlation_id);
        put_nullable_string(buf, "client_id", self.client_id.as_deref())
    }

    pub fn parse(buf: &mut Bytes) -> SchemaResult<Self> {
        if buf.remaining() < 8 {
            return Err(SchemaError::BufferUnderrun {
                field: "request_header",
                needed: 8,
                available: buf.remaining(),
            });
        }
        let api_key = ApiKey::from_id(buf.get_i16())?;
        let api_version = buf.get_i16();
        let correlation_id = buf.get_i32();
        let client_id = get_nullable_string(buf, "client_id")?;
        Ok(Self::new(api_key, api_version, client_id, correlation_id))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResponseHeader {
    pub correlation_id: i32,
}

impl ResponseHeader {
    pub fn new(correlation_id: i32) -> Self {
        Self { correlation_id }
    }

    pub fn write(&self, buf: &mut BytesMut) {
        buf.put_i32(self.correlation_id);
    }

    pub fn parse(buf: &mut Bytes) -> SchemaResult<Self> {
        if buf.remaining() < 4 {
            return Err(SchemaError::BufferUnderrun {
                field: "correlation_id",
                needed: 4,
                available: buf.remaining(),
            });
        }
        Ok(Self::new(buf.get_i32()))
    }
}

/// Size-prefixed send of `request` under `header`
pub fn to_send<R: AbstractRequest>(
    destination: &str,
    header: &RequestHeader,
    request: &R,
) -> Result<NetworkSend> {
    let payload = request.serialize(header)?;
    Ok(NetworkSend::new(destination, payload)?)
}

/// Size-prefixed send of `response` answering `correlation_id`
pub fn response_send<R: AbstractResponse>(
    destination: &str,
    correlation_id: i32,
    version: i16,
    response: &R,
) -> Result<NetworkSend> {
    let payload = response.serialize(correlation_id, version)?;
    Ok(NetworkSend::new(destination, payload)?)
}

/// Decode a response payload (size prefix already stripped) against the
/// header of the outstanding request.
pub fn parse_response(mut payload: Bytes, request_header: &RequestHeader) -> Result<ResponseBody> {
    let header = ResponseHeader::parse(&mut payload)?;
    if header.correlation_id != request_header.correlation_id {
        return Err(crate::FluxmqWireError::CorrelationMismatch {
            expected: request_header.correlation_id,
            actual: header.correlation_id,
        });
    }
    debug!(
        "Parsing {} response v{} ({} bytes, correlation id {})",
        request_header.api_key,
        request_header.api_version,
        payload.len(),
        header.correlation_id
    );
    Ok(ResponseBody::parse(
        request_header.api_key,
        payload,
        request_header.api_version,
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::errors::ErrorCode;
    use crate::protocol::messages::{ApiVersionsRequest, SaslHandshakeResponse};
    use crate::FluxmqWireError;

    #[test]
    fn test_request_header_layout() {
        let header = RequestHeader::new(ApiKey::ApiVersions, 0, Some("app".to_string()), 7);
        let mut buf = BytesMut::new();
        header.write(&mut buf).unwrap();
        assert_eq!(
            &buf[..],
            &[0x00, 0x12, 0x00, 0x00, 0x00, 0x00, 0x00, 0x07, 0x00, 0x03, b'a', b'p', b'p']
        );
        assert_eq!(RequestHeader::parse(&mut buf.freeze()).unwrap(), header);
    }

    #[test]
    fn test_null_client_id() {
        let header = RequestHeader::new(ApiKey::SaslHandshake, 1, None, -1);
        let mut buf = BytesMut::new();
        header.write(&mut buf).unwrap();
        assert_eq!(&buf[8..], &[0xff, 0xff]);
        assert_eq!(RequestHeader::parse(&mut buf.freeze()).unwrap().client_id, None);
    }

    #[test]
    fn test_to_send_is_size_prefixed() {
        let header = RequestHeader::new(ApiKey::ApiVersions, 0, None, 3);
        let send = to_send("node-1", &header, &ApiVersionsRequest::new(0)).unwrap();
        assert_eq!(send.destination(), "node-1");
        let bytes = send.remaining_bytes();
        assert_eq!(&bytes[..4], &[0, 0, 0, 10]);
        assert_eq!(bytes.len(), 14);
    }

    #[test]
    fn test_parse_response_matches_correlation() {
        let request_header = RequestHeader::new(ApiKey::SaslHandshake, 1, None, 5);
        let response = SaslHandshakeResponse::new(ErrorCode::None, vec!["PLAIN".to_string()]);
        let payload = response.serialize(5, 1).unwrap();
        let body = parse_response(payload, &request_header).unwrap();
        assert_eq!(body, ResponseBody::SaslHandshake(response));
    }

    #[test]
    fn test_parse_response_correlation_mismatch() {
        let request_header = RequestHeader::new(ApiKey::SaslHandshake, 1, None, 5);
        let response = SaslHandshakeResponse::new(ErrorCode::None, vec![]);
        let payload = response.serialize(6, 1).unwrap();
        let err = parse_response(payload, &request_header).unwrap_err();
        assert!(matches!(
            err,
            FluxmqWireError::CorrelationMismatch { expected: 5, actual: 6 }
        ));
    }

    #[test]
    fn test_parse_response_truncated_body() {
        let request_header = RequestHeader::new(ApiKey::SaslHandshake, 0, None, 1);
        let err = parse_response(Bytes::from_static(&[0, 0, 0, 1, 0]), &request_header).unwrap_err();
        assert!(matches!(err, FluxmqWireError::Schema(SchemaError::BufferUnderrun { .. })));
    }
}
