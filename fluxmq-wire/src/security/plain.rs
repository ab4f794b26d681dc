//! SASL PLAIN client (RFC 4616)

use super::mechanism::{MechanismError, SaslClient};

pub struct PlainSaslClient {
    authorization_id: Option<String>,
    username: String,
    password: String,
    completed: bool,
}

impl PlainSaslClient {
    pub fn new<U: Into<String>, P: Into<String>>(
        authorization_id: Option<String>,
        username: U,
        password: P,
    ) -> Self {
        Self {
            authorization_id,
            username: username.into(),
            password: password.into(),
            completed: false,
        }
    }
}

impl SaslClient for PlainSaslClient {
    fn mechanism_name(&self) -> &str {
        "PLAIN"
    }

    fn has_initial_response(&self) -> bool {
        true
    }

    /// `[authzid] NUL authcid NUL passwd`, produced once
    fn evaluate_challenge(&mut self, _challenge: &[u8]) -> Result<Option<Vec<u8>>, MechanismError> {
        if self.completed {
            return Err(MechanismError::AlreadyComplete);
        }
        let authzid = self.authorization_id.as_deref().unwrap_or("");
        let mut token =
            Vec::with_capacity(authzid.len() + self.username.len() + self.password.len() + 2);
        token.extend_from_slice(authzid.as_bytes());
        token.push(0);
        token.extend_from_slice(self.username.as_bytes());
        token.push(0);
        token.extend_from_slice(self.password.as_bytes());
        self.completed = true;
        Ok(Some(token))
    }

    fn is_complete(&self) -> bool {
        self.completed
    }

    fn dispose(&mut self) {
        self.password.clear();
    }
}
