//! Size-delimited framing
//!
//! Frames are a 4-byte big-endian length followed by that many bytes. The
//! codec plugs into `tokio_util::codec` and is also driven by hand from the
//! non-blocking [`NetworkReceive`](super::NetworkReceive) and
//! [`NetworkSend`](super::NetworkSend) buffers.

use std::io;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

/// Length prefix width
pub const SIZE_PREFIX_LEN: usize = 4;

#[derive(Debug, Clone, Copy)]
pub struct FrameCodec {
    max_frame_size: usize,
}

impl FrameCodec {
    pub fn new(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }

    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    /// Validated payload size announced by a complete prefix
    pub fn peek_size(&self, src: &[u8]) -> io::Result<Option<usize>> {
        if src.len() < SIZE_PREFIX_LEN {
            return Ok(None);
        }
        let size = (&src[..SIZE_PREFIX_LEN]).get_i32();
        if size < 0 || size as usize > self.max_frame_size {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                format!(
                    "Invalid frame size {} (maximum {})",
                    size, self.max_frame_size
                ),
            ));
        }
        Ok(Some(size as usize))
    }
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(i32::MAX as usize)
    }
}

impl Decoder for FrameCodec {
    type Item = Bytes;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> io::Result<Option<Bytes>> {
        let size = match self.peek_size(src)? {
            Some(size) => size,
            None => return Ok(None),
        };
        let total = SIZE_PREFIX_LEN + size;
        if src.len() < total {
            src.reserve(total - src.len());
            return Ok(None);
        }
        let mut frame = src.split_to(total);
        frame.advance(SIZE_PREFIX_LEN);
        Ok(Some(frame.freeze()))
    }
}

impl Encoder<Bytes> for FrameCodec {
    type Error = io::Error;

    fn encode(&mut self, payload: Bytes, dst: &mut BytesMut) -> io::Result<()> {
        if payload.len() > self.max_frame_size || payload.len() > i32::MAX as usize {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("Frame of {} bytes exceeds maximum size", payload.len()),
            ));
        }
        dst.reserve(SIZE_PREFIX_LEN + payload.len());
        dst.put_i32(payload.len() as i32);
        dst.put_slice(&payload);
        Ok(())
    }
}
