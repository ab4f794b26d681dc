//! SCRAM-SHA-256 / SCRAM-SHA-512 client (RFC 5802, RFC 7677)
//!
//! Three messages: client-first (initial response), client-final answering
//! the server-first challenge, and verification of the server-final
//! signature. Channel binding is not used (`n,,` GS2 header).

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use hmac::{Hmac, Mac};
use pbkdf2::pbkdf2_hmac;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha256, Sha512};
use subtle::ConstantTimeEq;

use super::mechanism::{MechanismError, SaslClient};

const GS2_HEADER: &str = "n,,";
/// base64 of the GS2 header, sent as channel binding data
const CHANNEL_BINDING: &str = "biws";
const NONCE_BYTES: usize = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScramMechanism {
    Sha256,
    Sha512,
}

impl ScramMechanism {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "SCRAM-SHA-256" => Some(Self::Sha256),
            "SCRAM-SHA-512" => Some(Self::Sha512),
            _ => None,
        }
    }

    pub fn mechanism_name(self) -> &'static str {
        match self {
            Self::Sha256 => "SCRAM-SHA-256",
            Self::Sha512 => "SCRAM-SHA-512",
        }
    }

    /// Lowest iteration count a server may ask for
    pub fn min_iterations(self) -> u32 {
        4096
    }

    pub(crate) fn salted_password(self, password: &[u8], salt: &[u8], iterations: u32) -> Vec<u8> {
        match self {
            Self::Sha256 => {
                let mut salted = [0_u8; 32];
                pbkdf2_hmac::<Sha256>(password, salt, iterations, &mut salted);
                salted.to_vec()
            }
            Self::Sha512 => {
                let mut salted = [0_u8; 64];
                pbkdf2_hmac::<Sha512>(password, salt, iterations, &mut salted);
                salted.to_vec()
            }
        }
    }

    pub(crate) fn hmac(self, key: &[u8], payload: &[u8]) -> Vec<u8> {
        // HMAC accepts keys of any length
        match self {
            Self::Sha256 => match Hmac::<Sha256>::new_from_slice(key) {
                Ok(mut mac) => {
                    mac.update(payload);
                    mac.finalize().into_bytes().to_vec()
                }
                Err(_) => Vec::new(),
            },
            Self::Sha512 => match Hmac::<Sha512>::new_from_slice(key) {
                Ok(mut mac) => {
                    mac.update(payload);
                    mac.finalize().into_bytes().to_vec()
                }
                Err(_) => Vec::new(),
            },
        }
    }

    pub(crate) fn hash(self, payload: &[u8]) -> Vec<u8> {
        match self {
            Self::Sha256 => Sha256::digest(payload).to_vec(),
            Self::Sha512 => Sha512::digest(payload).to_vec(),
        }
    }
}

#[derive(Debug)]
enum ScramState {
    SendClientFirst,
    ReceiveServerFirst {
        client_first_bare: String,
    },
    ReceiveServerFinal {
        expected_server_signature: Vec<u8>,
    },
    Complete,
    Failed,
}

pub struct ScramSaslClient {
    mechanism: ScramMechanism,
    username: String,
    password: String,
    client_nonce: String,
    state: ScramState,
}

/// `=` and `,` are escaped in SCRAM names
fn escape_username(username: &str) -> String {
    username.replace('=', "=3D").replace(',', "=2C")
}

fn generate_nonce() -> String {
    let mut nonce = [0_u8; NONCE_BYTES];
    OsRng.fill_bytes(&mut nonce);
    STANDARD.encode(nonce)
}

/// Split `a=x,b=y` into attribute/value pairs, keeping order
fn parse_attributes(message: &str) -> Result<Vec<(char, &str)>, MechanismError> {
    message
        .split(',')
        .map(|pair| {
            let malformed =
                || MechanismError::InvalidChallenge(format!("malformed attribute '{}'", pair));
            let (key, value) = pair.split_once('=').ok_or_else(malformed)?;
            let mut chars = key.chars();
            match (chars.next(), chars.next()) {
                (Some(key), None) => Ok((key, value)),
                _ => Err(malformed()),
            }
        })
        .collect()
}

fn attribute<'a>(attributes: &[(char, &'a str)], key: char) -> Result<&'a str, MechanismError> {
    attributes
        .iter()
        .find(|(k, _)| *k == key)
        .map(|(_, v)| *v)
        .ok_or_else(|| MechanismError::InvalidChallenge(format!("missing attribute '{}'", key)))
}

impl ScramSaslClient {
    pub fn new<U: Into<String>, P: Into<String>>(
        mechanism: ScramMechanism,
        username: U,
        password: P,
    ) -> Self {
        Self::with_nonce(mechanism, username, password, generate_nonce())
    }

    /// Client with a fixed nonce
    pub fn with_nonce<U: Into<String>, P: Into<String>, N: Into<String>>(
        mechanism: ScramMechanism,
        username: U,
        password: P,
        client_nonce: N,
    ) -> Self {
        Self {
            mechanism,
            username: username.into(),
            password: password.into(),
            client_nonce: client_nonce.into(),
            state: ScramState::SendClientFirst,
        }
    }

    fn client_first(&mut self) -> Vec<u8> {
        let client_first_bare = format!(
            "n={},r={}",
            escape_username(&self.username),
            self.client_nonce
        );
        let message = format!("{}{}", GS2_HEADER, client_first_bare);
        self.state = ScramState::ReceiveServerFirst { client_first_bare };
        message.into_bytes()
    }

    fn client_final(
        &self,
        client_first_bare: &str,
        server_first: &str,
    ) -> Result<(Vec<u8>, Vec<u8>), MechanismError> {
        let attributes = parse_attributes(server_first)?;
        if let Ok(extension) = attribute(&attributes, 'm') {
            return Err(MechanismError::InvalidChallenge(format!(
                "unsupported mandatory extension '{}'",
                extension
            )));
        }
        let nonce = attribute(&attributes, 'r')?;
        if !nonce.starts_with(&self.client_nonce) || nonce.len() == self.client_nonce.len() {
            return Err(MechanismError::NonceMismatch);
        }
        let salt = STANDARD
            .decode(attribute(&attributes, 's')?)
            .map_err(|e| MechanismError::InvalidChallenge(format!("invalid salt: {}", e)))?;
        let iterations: u32 = attribute(&attributes, 'i')?
            .parse()
            .map_err(|_| MechanismError::InvalidChallenge("invalid iteration count".to_string()))?;
        if iterations < self.mechanism.min_iterations() {
            return Err(MechanismError::TooFewIterations {
                iterations,
                minimum: self.mechanism.min_iterations(),
            });
        }

        let mechanism = self.mechanism;
        let salted = mechanism.salted_password(self.password.as_bytes(), &salt, iterations);
        let client_key = mechanism.hmac(&salted, b"Client Key");
        let stored_key = mechanism.hash(&client_key);
        let without_proof = format!("c={},r={}", CHANNEL_BINDING, nonce);
        let auth_message = format!("{},{},{}", client_first_bare, server_first, without_proof);
        let client_signature = mechanism.hmac(&stored_key, auth_message.as_bytes());
        let proof: Vec<u8> = client_key
            .iter()
            .zip(client_signature.iter())
            .map(|(k, s)| k ^ s)
            .collect();
        let server_key = mechanism.hmac(&salted, b"Server Key");
        let server_signature = mechanism.hmac(&server_key, auth_message.as_bytes());

        let message = format!("{},p={}", without_proof, STANDARD.encode(proof));
        Ok((message.into_bytes(), server_signature))
    }

    fn verify_server_final(expected: &[u8], server_final: &str) -> Result<(), MechanismError> {
        let attributes = parse_attributes(server_final)?;
        if let Ok(error) = attribute(&attributes, 'e') {
            return Err(MechanismError::ServerError(error.to_string()));
        }
        let signature = STANDARD
            .decode(attribute(&attributes, 'v')?)
            .map_err(|e| MechanismError::InvalidChallenge(format!("invalid signature: {}", e)))?;
        if bool::from(signature.as_slice().ct_eq(expected)) {
            Ok(())
        } else {
            Err(MechanismError::ServerSignatureMismatch)
        }
    }
}

impl SaslClient for ScramSaslClient {
    fn mechanism_name(&self) -> &str {
        self.mechanism.mechanism_name()
    }

    fn has_initial_response(&self) -> bool {
        true
    }

    fn evaluate_challenge(&mut self, challenge: &[u8]) -> Result<Option<Vec<u8>>, MechanismError> {
        let state = std::mem::replace(&mut self.state, ScramState::Failed);
        match state {
            ScramState::SendClientFirst => {
                if !challenge.is_empty() {
                    return Err(MechanismError::InvalidChallenge(
                        "unexpected challenge before client-first message".to_string(),
                    ));
                }
                Ok(Some(self.client_first()))
            }
            ScramState::ReceiveServerFirst { client_first_bare } => {
                let server_first = std::str::from_utf8(challenge).map_err(|_| {
                    MechanismError::InvalidChallenge("server-first is not UTF-8".to_string())
                })?;
                let (message, expected_server_signature) =
                    self.client_final(&client_first_bare, server_first)?;
                self.state = ScramState::ReceiveServerFinal {
                    expected_server_signature,
                };
                Ok(Some(message))
            }
            ScramState::ReceiveServerFinal {
                expected_server_signature,
            } => {
                let server_final = std::str::from_utf8(challenge).map_err(|_| {
                    MechanismError::InvalidChallenge("server-final is not UTF-8".to_string())
                })?;
                Self::verify_server_final(&expected_server_signature, server_final)?;
                self.state = ScramState::Complete;
                Ok(None)
            }
            ScramState::Complete => {
                self.state = ScramState::Complete;
                Err(MechanismError::AlreadyComplete)
            }
            ScramState::Failed => Err(MechanismError::InvalidChallenge(
                "exchange already failed".to_string(),
            )),
        }
    }

    fn is_complete(&self) -> bool {
        matches!(self.state, ScramState::Complete)
    }

    fn dispose(&mut self) {
        self.password.clear();
    }
}
