//! Configuration types for SASL client authentication

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::FluxmqWireError;

/// SASL client configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SaslClientConfig {
    /// SASL mechanism name (PLAIN, SCRAM-SHA-256, SCRAM-SHA-512)
    pub mechanism: String,
    /// Client identifier sent in every request header
    pub client_id: Option<String>,
    /// Negotiate capabilities and the mechanism before exchanging tokens.
    /// When disabled, raw size-delimited tokens are sent immediately.
    pub handshake_request_enable: bool,
    /// Largest inbound frame accepted during authentication
    pub max_receive_size: usize,
    /// TCP connect timeout in milliseconds
    pub connection_timeout_ms: u64,
    /// Upper bound on the whole exchange in milliseconds
    pub authentication_timeout_ms: u64,
}

impl Default for SaslClientConfig {
    fn default() -> Self {
        Self {
            mechanism: "PLAIN".to_string(),
            client_id: None,
            handshake_request_enable: true,
            max_receive_size: 512 * 1024,
            connection_timeout_ms: 30_000,
            authentication_timeout_ms: 30_000,
        }
    }
}

impl SaslClientConfig {
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_millis(self.connection_timeout_ms)
    }

    pub fn authentication_timeout(&self) -> Duration {
        Duration::from_millis(self.authentication_timeout_ms)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), FluxmqWireError> {
        if self.mechanism.trim().is_empty() {
            return Err(FluxmqWireError::invalid_config("mechanism must not be empty"));
        }
        if self.max_receive_size == 0 {
            return Err(FluxmqWireError::invalid_config(
                "max_receive_size must be greater than 0",
            ));
        }
        if self.max_receive_size > i32::MAX as usize {
            return Err(FluxmqWireError::invalid_config(
                "max_receive_size must fit in a 4-byte frame size",
            ));
        }
        if self.connection_timeout_ms == 0 || self.authentication_timeout_ms == 0 {
            return Err(FluxmqWireError::invalid_config("timeouts must be greater than 0"));
        }
        if let Some(client_id) = &self.client_id {
            if client_id.len() > i16::MAX as usize {
                return Err(FluxmqWireError::invalid_config("client_id is too long"));
            }
        }
        Ok(())
    }
}

/// Builder for SaslClientConfig
#[derive(Debug, Default)]
pub struct SaslClientConfigBuilder {
    config: SaslClientConfig,
}

impl SaslClientConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mechanism<S: Into<String>>(mut self, mechanism: S) -> Self {
        self.config.mechanism = mechanism.into();
        self
    }

    pub fn client_id<S: Into<String>>(mut self, client_id: S) -> Self {
        self.config.client_id = Some(client_id.into());
        self
    }

    pub fn handshake_request_enable(mut self, enable: bool) -> Self {
        self.config.handshake_request_enable = enable;
        self
    }

    pub fn max_receive_size(mut self, size: usize) -> Self {
        self.config.max_receive_size = size;
        self
    }

    pub fn connection_timeout(mut self, timeout: Duration) -> Self {
        self.config.connection_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn authentication_timeout(mut self, timeout: Duration) -> Self {
        self.config.authentication_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn build(self) -> Result<SaslClientConfig, FluxmqWireError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = SaslClientConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.mechanism, "PLAIN");
        assert!(config.handshake_request_enable);
        assert_eq!(config.authentication_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_config_builder() {
        let config = SaslClientConfigBuilder::new()
            .mechanism("SCRAM-SHA-512")
            .client_id("billing")
            .handshake_request_enable(false)
            .max_receive_size(4096)
            .authentication_timeout(Duration::from_secs(5))
            .build()
            .unwrap();

        assert_eq!(config.mechanism, "SCRAM-SHA-512");
        assert_eq!(config.client_id.as_deref(), Some("billing"));
        assert!(!config.handshake_request_enable);
        assert_eq!(config.max_receive_size, 4096);
        assert_eq!(config.authentication_timeout_ms, 5000);
    }

    #[test]
    fn test_validation_errors() {
        assert!(SaslClientConfigBuilder::new().mechanism(" ").build().is_err());
        assert!(SaslClientConfigBuilder::new().max_receive_size(0).build().is_err());
        assert!(SaslClientConfigBuilder::new()
            .connection_timeout(Duration::ZERO)
            .build()
            .is_err());
    }

    #[test]
    fn test_load_from_json_with_defaults() {
        let config: SaslClientConfig =
            serde_json::from_str(r#"{"mechanism": "SCRAM-SHA-256", "client_id": "svc"}"#).unwrap();
        assert_eq!(config.mechanism, "SCRAM-SHA-256");
        assert_eq!(config.client_id.as_deref(), Some("svc"));
        assert_eq!(config.max_receive_size, 512 * 1024);
        assert!(config.handshake_request_enable);

        let json = serde_json::to_string(&config).unwrap();
        let back: SaslClientConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back, config);
    }
}
