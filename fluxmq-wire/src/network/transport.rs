//! Non-blocking transport contract

use std::io;

/// A non-blocking byte channel with a write-interest flag.
///
/// `read` returns `Ok(0)` once the peer has closed the connection and an
/// error of kind [`io::ErrorKind::WouldBlock`] when nothing is available.
/// `write` returns how many bytes were accepted, or `WouldBlock` when none
/// can be. Write interest tells the owning event loop to wake the caller
/// when the transport becomes writable again.
pub trait TransportLayer {
    fn read(&mut self, dst: &mut [u8]) -> io::Result<usize>;

    fn write(&mut self, src: &[u8]) -> io::Result<usize>;

    fn add_write_interest(&mut self);

    fn remove_write_interest(&mut self);
}
