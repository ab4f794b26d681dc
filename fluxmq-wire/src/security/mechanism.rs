//! Pluggable SASL client mechanisms

use super::plain::PlainSaslClient;
use super::scram::{ScramMechanism, ScramSaslClient};
use super::subject::Subject;

/// Failures raised by a mechanism while producing or checking tokens
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MechanismError {
    #[error("Invalid server challenge: {0}")]
    InvalidChallenge(String),

    #[error("Server nonce does not extend the client nonce")]
    NonceMismatch,

    #[error("Requested iteration count {iterations} is below the minimum {minimum}")]
    TooFewIterations { iterations: u32, minimum: u32 },

    #[error("Server signature did not match")]
    ServerSignatureMismatch,

    #[error("Server reported error: {0}")]
    ServerError(String),

    #[error("No credentials available for mechanism {0}")]
    MissingCredentials(String),

    #[error("Unsupported SASL mechanism {0}")]
    UnsupportedMechanism(String),

    #[error("Authentication already completed")]
    AlreadyComplete,

    #[error("Principal could not be determined from the subject")]
    NoPrincipal,
}

/// Client side of a SASL mechanism.
///
/// The authenticator calls [`evaluate_challenge`](Self::evaluate_challenge)
/// with each server token (empty for the initial response) and sends any
/// token returned. `Ok(None)` means there is nothing to send.
pub trait SaslClient: Send {
    fn mechanism_name(&self) -> &str;

    /// Whether the first token is produced before any server challenge
    fn has_initial_response(&self) -> bool;

    fn evaluate_challenge(&mut self, challenge: &[u8]) -> Result<Option<Vec<u8>>, MechanismError>;

    fn is_complete(&self) -> bool;

    /// Release any secret material held by the exchange
    fn dispose(&mut self) {}
}

/// Build the client for `mechanism` from the subject's credentials
pub fn create_sasl_client(
    mechanism: &str,
    subject: &Subject,
) -> Result<Box<dyn SaslClient>, MechanismError> {
    let credential = || {
        subject
            .credential()
            .ok_or_else(|| MechanismError::MissingCredentials(mechanism.to_string()))
    };
    match mechanism {
        "PLAIN" => {
            let credential = credential()?;
            Ok(Box::new(PlainSaslClient::new(
                subject.authorization_id().map(str::to_string),
                credential.username(),
                credential.password(),
            )))
        }
        _ => match ScramMechanism::from_name(mechanism) {
            Some(scram) => {
                let credential = credential()?;
                Ok(Box::new(ScramSaslClient::new(
                    scram,
                    credential.username(),
                    credential.password(),
                )))
            }
            None => Err(MechanismError::UnsupportedMechanism(mechanism.to_string())),
        },
    }
}
