//! # FluxMQ Wire
//!
//! Client-side connection setup for Kafka-compatible FluxMQ brokers: the
//! versioned binary codec and the non-blocking SASL authentication
//! handshake that runs over it.
//!
//! ## Features
//!
//! - **Schema Codec**: Fields carry version ranges, so one message definition
//!   serves every protocol version
//! - **Non-blocking Handshake**: The authenticator survives partial reads and
//!   writes and is safe to invoke on every readiness notification
//! - **Pluggable Mechanisms**: PLAIN and SCRAM-SHA-256/512 behind one trait
//! - **Observability**: Authentication metrics and tracing support
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use fluxmq_wire::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = SaslClientConfigBuilder::new()
//!         .mechanism("SCRAM-SHA-256")
//!         .client_id("billing")
//!         .build()?;
//!     let subject = Arc::new(Subject::with_password("alice", "alice-secret"));
//!
//!     let authenticator =
//!         connect_and_authenticate("localhost:9092", config, subject).await?;
//!     println!("Authenticated as {:?}", authenticator.principal());
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod metrics;
pub mod network;
pub mod protocol;
pub mod security;

pub use config::*;
pub use error::*;
pub use metrics::{global_metrics, AuthMetrics, AuthMetricsSnapshot};
pub use network::{MemoryTransport, TcpTransport, TransportLayer};
pub use protocol::{ApiKey, ErrorCode, TopicPartition};
pub use security::{
    authenticate_tcp, connect_and_authenticate, KafkaPrincipal, SaslClient,
    SaslClientAuthenticator, SaslState, Subject,
};

/// Wire library result type
pub type Result<T> = std::result::Result<T, FluxmqWireError>;

/// Wire library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
