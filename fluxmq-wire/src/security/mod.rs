//! SASL client authentication
//!
//! Mechanisms implement [`SaslClient`]; [`SaslClientAuthenticator`] drives
//! them over any [`TransportLayer`](crate::network::TransportLayer).

pub mod authenticator;
pub mod driver;
pub mod mechanism;
pub mod plain;
pub mod scram;
pub mod subject;

pub use authenticator::{SaslClientAuthenticator, SaslState};
pub use driver::{authenticate_tcp, connect_and_authenticate};
pub use mechanism::{create_sasl_client, MechanismError, SaslClient};
pub use plain::PlainSaslClient;
pub use scram::{ScramMechanism, ScramSaslClient};
pub use subject::{KafkaPrincipal, PasswordCredential, Subject};
