//! In-memory transport for driving exchanges without sockets

use std::io;

use bytes::{Buf, Bytes, BytesMut};

use super::transport::TransportLayer;

/// A scriptable [`TransportLayer`].
///
/// Inbound bytes are queued with [`push_inbound`](Self::push_inbound);
/// whatever the owner writes accumulates until
/// [`take_outbound`](Self::take_outbound). Optional budgets cap how many
/// bytes the next reads or writes may move, which simulates a peer that
/// delivers or drains data slowly.
#[derive(Debug, Default)]
pub struct MemoryTransport {
    inbound: BytesMut,
    outbound: BytesMut,
    read_budget: Option<usize>,
    write_budget: Option<usize>,
    write_interest: bool,
    closed: bool,
}

fn would_block() -> io::Error {
    io::Error::from(io::ErrorKind::WouldBlock)
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_inbound(&mut self, data: &[u8]) {
        self.inbound.extend_from_slice(data);
    }

    pub fn inbound_len(&self) -> usize {
        self.inbound.len()
    }

    /// Drain everything written so far
    pub fn take_outbound(&mut self) -> Bytes {
        self.outbound.split().freeze()
    }

    pub fn outbound_len(&self) -> usize {
        self.outbound.len()
    }

    /// Limit the bytes readable from now on; `None` removes the limit
    pub fn set_read_budget(&mut self, budget: Option<usize>) {
        self.read_budget = budget;
    }

    /// Limit the bytes writable from now on; `None` removes the limit
    pub fn set_write_budget(&mut self, budget: Option<usize>) {
        self.write_budget = budget;
    }

    pub fn write_interest(&self) -> bool {
        self.write_interest
    }

    /// Simulate the peer closing: reads drain then hit end of stream,
    /// writes fail
    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl TransportLayer for MemoryTransport {
    fn read(&mut self, dst: &mut [u8]) -> io::Result<usize> {
        if self.inbound.is_empty() {
            return if self.closed { Ok(0) } else { Err(would_block()) };
        }
        let n = dst
            .len()
            .min(self.inbound.len())
            .min(self.read_budget.unwrap_or(usize::MAX));
        if n == 0 {
            return Err(would_block());
        }
        dst[..n].copy_from_slice(&self.inbound[..n]);
        self.inbound.advance(n);
        if let Some(budget) = self.read_budget.as_mut() {
            *budget -= n;
        }
        Ok(n)
    }

    fn write(&mut self, src: &[u8]) -> io::Result<usize> {
        if self.closed {
            return Err(io::Error::new(
                io::ErrorKind::BrokenPipe,
                "transport closed",
            ));
        }
        let n = src.len().min(self.write_budget.unwrap_or(usize::MAX));
        if n == 0 {
            return Err(would_block());
        }
        self.outbound.extend_from_slice(&src[..n]);
        if let Some(budget) = self.write_budget.as_mut() {
            *budget -= n;
        }
        Ok(n)
    }

    fn add_write_interest(&mut self) {
        self.write_interest = true;
    }

    fn remove_write_interest(&mut self) {
        self.write_interest = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_budget() {
        let mut transport = MemoryTransport::new();
        transport.push_inbound(b"hello");
        transport.set_read_budget(Some(2));

        let mut buf = [0u8; 8];
        assert_eq!(transport.read(&mut buf).unwrap(), 2);
        assert_eq!(
            transport.read(&mut buf).unwrap_err().kind(),
            io::ErrorKind::WouldBlock
        );
        transport.set_read_budget(None);
        assert_eq!(transport.read(&mut buf).unwrap(), 3);
        assert_eq!(&buf[..3], b"llo");
    }

    #[test]
    fn test_close_drains_then_eof() {
        let mut transport = MemoryTransport::new();
        transport.push_inbound(b"x");
        transport.close();
        let mut buf = [0u8; 4];
        assert_eq!(transport.read(&mut buf).unwrap(), 1);
        assert_eq!(transport.read(&mut buf).unwrap(), 0);
        assert!(transport.write(b"y").is_err());
    }

    #[test]
    fn test_write_interest_flag() {
        let mut transport = MemoryTransport::new();
        assert!(!transport.write_interest());
        transport.add_write_interest();
        assert!(transport.write_interest());
        transport.remove_write_interest();
        assert!(!transport.write_interest());
    }
}
