use std::io;

use bytes::{Bytes, BytesMut};
use tokio_util::codec::Decoder;

use super::frame::{FrameCodec, SIZE_PREFIX_LEN};
use super::transport::TransportLayer;

/// An inbound size-delimited frame being accumulated.
///
/// Reads never consume past the end of the current frame, so whatever
/// follows stays in the transport for the next receive.
#[derive(Debug)]
pub struct NetworkReceive {
    source: String,
    codec: FrameCodec,
    buffer: BytesMut,
    payload: Option<Bytes>,
}

impl NetworkReceive {
    pub fn new<S: Into<String>>(source: S, max_size: usize) -> Self {
        Self {
            source: source.into(),
            codec: FrameCodec::new(max_size),
            buffer: BytesMut::with_capacity(SIZE_PREFIX_LEN),
            payload: None,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn complete(&self) -> bool {
        self.payload.is_some()
    }

    /// Completed payload, size prefix stripped
    pub fn payload(&self) -> Option<&Bytes> {
        self.payload.as_ref()
    }

    pub fn into_payload(self) -> Option<Bytes> {
        self.payload
    }

    fn bytes_needed(&self) -> io::Result<usize> {
        match self.codec.peek_size(&self.buffer)? {
            Some(size) => Ok(SIZE_PREFIX_LEN + size - self.buffer.len()),
            None => Ok(SIZE_PREFIX_LEN - self.buffer.len()),
        }
    }

    /// Read what the transport has, up to the end of the frame.
    ///
    /// Returns bytes read. End of stream is reported as
    /// [`io::ErrorKind::UnexpectedEof`]; a size outside `0..=max_size` as
    /// [`io::ErrorKind::InvalidData`].
    pub fn read_from<T: TransportLayer>(&mut self, transport: &mut T) -> io::Result<usize> {
        let mut read = 0;
        while self.payload.is_none() {
            let needed = self.bytes_needed()?;
            if needed > 0 {
                let start = self.buffer.len();
                self.buffer.resize(start + needed, 0);
                let result = transport.read(&mut self.buffer[start..]);
                let n = match result {
                    Ok(0) => {
                        self.buffer.truncate(start);
                        return Err(io::Error::new(
                            io::ErrorKind::UnexpectedEof,
                            format!("Connection to {} closed", self.source),
                        ));
                    }
                    Ok(n) => n,
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => 0,
                    Err(e) => {
                        self.buffer.truncate(start);
                        if e.kind() == io::ErrorKind::WouldBlock {
                            break;
                        }
                        return Err(e);
                    }
                };
                self.buffer.truncate(start + n);
                read += n;
            }
            self.payload = self.codec.decode(&mut self.buffer)?;
        }
        Ok(read)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::MemoryTransport;

    #[test]
    fn test_accumulates_partial_reads() {
        let mut transport = MemoryTransport::new();
        let mut receive = NetworkReceive::new("0", 1024);

        transport.push_inbound(&[0, 0]);
        assert_eq!(receive.read_from(&mut transport).unwrap(), 2);
        assert!(!receive.complete());

        transport.push_inbound(&[0, 3, b'a']);
        assert_eq!(receive.read_from(&mut transport).unwrap(), 3);
        assert!(!receive.complete());

        transport.push_inbound(b"bc");
        receive.read_from(&mut transport).unwrap();
        assert_eq!(receive.payload(), Some(&Bytes::from_static(b"abc")));
    }

    #[test]
    fn test_stops_at_frame_boundary() {
        let mut transport = MemoryTransport::new();
        transport.push_inbound(&[0, 0, 0, 1, b'x', 0, 0, 0, 1, b'y']);

        let mut first = NetworkReceive::new("0", 1024);
        first.read_from(&mut transport).unwrap();
        assert_eq!(first.into_payload(), Some(Bytes::from_static(b"x")));

        let mut second = NetworkReceive::new("0", 1024);
        second.read_from(&mut transport).unwrap();
        assert_eq!(second.into_payload(), Some(Bytes::from_static(b"y")));
    }

    #[test]
    fn test_rejects_oversized_frame() {
        let mut transport = MemoryTransport::new();
        transport.push_inbound(&[0, 0, 4, 0]);
        let mut receive = NetworkReceive::new("0", 512);
        let err = receive.read_from(&mut transport).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_eof_is_reported() {
        let mut transport = MemoryTransport::new();
        transport.push_inbound(&[0, 0]);
        transport.close();
        let mut receive = NetworkReceive::new("0", 512);
        let err = receive.read_from(&mut transport).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_empty_transport_is_not_an_error() {
        let mut transport = MemoryTransport::new();
        let mut receive = NetworkReceive::new("0", 512);
        assert_eq!(receive.read_from(&mut transport).unwrap(), 0);
        assert!(!receive.complete());
    }
}
