use std::io;

use bytes::{Buf, Bytes, BytesMut};
use tokio_util::codec::Encoder;

use super::frame::FrameCodec;
use super::transport::TransportLayer;

/// An outbound size-prefixed frame and how much of it is still unwritten.
///
/// Bytes are consumed as the transport accepts them, so repeated
/// [`write_to`](Self::write_to) calls never resend anything.
#[derive(Debug, Clone)]
pub struct NetworkSend {
    destination: String,
    buffer: Bytes,
    size: usize,
}

impl NetworkSend {
    /// Frame `payload` with its 4-byte size prefix
    pub fn new<S: Into<String>>(destination: S, payload: Bytes) -> io::Result<Self> {
        let mut framed = BytesMut::new();
        FrameCodec::default().encode(payload, &mut framed)?;
        let buffer = framed.freeze();
        Ok(Self {
            destination: destination.into(),
            size: buffer.len(),
            buffer,
        })
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    /// Total framed size
    pub fn size(&self) -> usize {
        self.size
    }

    /// Bytes not yet written
    pub fn remaining_bytes(&self) -> &Bytes {
        &self.buffer
    }

    pub fn completed(&self) -> bool {
        !self.buffer.has_remaining()
    }

    /// Write as much as the transport accepts; returns bytes written.
    pub fn write_to<T: TransportLayer>(&mut self, transport: &mut T) -> io::Result<usize> {
        let mut written = 0;
        while self.buffer.has_remaining() {
            match transport.write(&self.buffer) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        format!("Failed to write to {}", self.destination),
                    ))
                }
                Ok(n) => {
                    self.buffer.advance(n);
                    written += n;
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::MemoryTransport;

    #[test]
    fn test_partial_writes_resume() {
        let mut transport = MemoryTransport::new();
        let mut send = NetworkSend::new("0", Bytes::from_static(b"abcdef")).unwrap();
        assert_eq!(send.size(), 10);

        transport.set_write_budget(Some(0));
        assert_eq!(send.write_to(&mut transport).unwrap(), 0);
        assert!(!send.completed());

        transport.set_write_budget(Some(3));
        assert_eq!(send.write_to(&mut transport).unwrap(), 3);
        assert_eq!(send.write_to(&mut transport).unwrap(), 0);

        transport.set_write_budget(None);
        assert_eq!(send.write_to(&mut transport).unwrap(), 7);
        assert!(send.completed());
        assert_eq!(
            &transport.take_outbound()[..],
            &[0, 0, 0, 6, b'a', b'b', b'c', b'd', b'e', b'f']
        );
    }

    #[test]
    fn test_write_after_close_fails() {
        let mut transport = MemoryTransport::new();
        transport.close();
        let mut send = NetworkSend::new("0", Bytes::from_static(b"x")).unwrap();
        assert!(send.write_to(&mut transport).is_err());
    }
}
