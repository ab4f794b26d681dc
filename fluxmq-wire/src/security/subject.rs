//! Identity material used by SASL mechanisms
//!
//! A [`Subject`] is built once and shared as `Arc<Subject>` between
//! connections; nothing in this crate mutates it.

use std::fmt;

use super::mechanism::MechanismError;

/// Username and password pair
#[derive(Clone, PartialEq, Eq)]
pub struct PasswordCredential {
    username: String,
    password: String,
}

impl PasswordCredential {
    pub fn new<U: Into<String>, P: Into<String>>(username: U, password: P) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl fmt::Debug for PasswordCredential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PasswordCredential")
            .field("username", &self.username)
            .field("password", &"[redacted]")
            .finish()
    }
}

/// Principal names and credentials of the local party
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Subject {
    principal: Option<String>,
    authorization_id: Option<String>,
    credential: Option<PasswordCredential>,
}

impl Subject {
    /// Subject authenticating with a username and password
    pub fn with_password<U: Into<String>, P: Into<String>>(username: U, password: P) -> Self {
        Self {
            credential: Some(PasswordCredential::new(username, password)),
            ..Self::default()
        }
    }

    /// Subject known only by its principal name
    pub fn with_principal<S: Into<String>>(principal: S) -> Self {
        Self {
            principal: Some(principal.into()),
            ..Self::default()
        }
    }

    /// Authorization identity to act as (PLAIN `authzid`)
    pub fn authorization_id_as<S: Into<String>>(mut self, authorization_id: S) -> Self {
        self.authorization_id = Some(authorization_id.into());
        self
    }

    pub fn credential(&self) -> Option<&PasswordCredential> {
        self.credential.as_ref()
    }

    pub fn authorization_id(&self) -> Option<&str> {
        self.authorization_id.as_deref()
    }

    /// Explicit principal name, else the credential's username
    pub fn first_principal(&self) -> Result<&str, MechanismError> {
        self.principal
            .as_deref()
            .or_else(|| self.credential.as_ref().map(|c| c.username()))
            .ok_or(MechanismError::NoPrincipal)
    }
}

/// Authenticated identity of a connection
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KafkaPrincipal {
    pub principal_type: String,
    pub name: String,
}

impl KafkaPrincipal {
    pub const USER_TYPE: &'static str = "User";

    pub fn user<S: Into<String>>(name: S) -> Self {
        Self {
            principal_type: Self::USER_TYPE.to_string(),
            name: name.into(),
        }
    }
}

impl fmt::Display for KafkaPrincipal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.principal_type, self.name)
    }
}
