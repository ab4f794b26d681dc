//! Non-blocking network plumbing: framing, in-flight buffers, transports

pub mod frame;
pub mod memory;
pub mod receive;
pub mod send;
pub mod tcp;
pub mod transport;

pub use frame::FrameCodec;
pub use memory::MemoryTransport;
pub use receive::NetworkReceive;
pub use send::NetworkSend;
pub use tcp::TcpTransport;
pub use transport::TransportLayer;
