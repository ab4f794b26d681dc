//! tokio TCP adapter

use std::io;

use tokio::net::TcpStream;

use super::transport::TransportLayer;

/// [`TransportLayer`] over a tokio [`TcpStream`].
///
/// Reads and writes use the stream's non-blocking `try_read`/`try_write`;
/// [`ready`](Self::ready) waits for whichever readiness the current write
/// interest asks for.
#[derive(Debug)]
pub struct TcpTransport {
    stream: TcpStream,
    write_interest: bool,
}

impl TcpTransport {
    pub fn new(stream: TcpStream) -> Self {
        Self {
            stream,
            write_interest: false,
        }
    }

    pub fn write_interest(&self) -> bool {
        self.write_interest
    }

    pub fn stream(&self) -> &TcpStream {
        &self.stream
    }

    pub fn into_inner(self) -> TcpStream {
        self.stream
    }

    /// Wait until the stream is writable (with write interest) or readable
    pub async fn ready(&self) -> io::Result<()> {
        if self.write_interest {
            self.stream.writable().await
        } else {
            self.stream.readable().await
        }
    }
}

impl TransportLayer for TcpTransport {
    fn read(&mut self, dst: &mut [u8]) -> io::Result<usize> {
        self.stream.try_read(dst)
    }

    fn write(&mut self, src: &[u8]) -> io::Result<usize> {
        self.stream.try_write(src)
    }

    fn add_write_interest(&mut self) {
        self.write_interest = true;
    }

    fn remove_write_interest(&mut self) {
        self.write_interest = false;
    }
}
