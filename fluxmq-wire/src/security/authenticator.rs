//! Non-blocking SASL client authenticator
//!
//! [`SaslClientAuthenticator::authenticate`] is invoked by the owner every
//! time the transport becomes readable or writable. Each call advances the
//! exchange as far as it can without blocking and returns; the caller checks
//! [`complete`](SaslClientAuthenticator::complete) to learn when it is done.
//!
//! ```text
//! SendApiVersionsRequest -> ReceiveApiVersionsResponse
//!   => SendHandshakeRequest -> ReceiveHandshakeResponse
//!   => Initial -> Intermediate -> [ClientComplete ->] Complete
//! ```
//!
//! `=>` marks a transition taken within the same call. With the handshake
//! disabled the exchange starts at `Initial` and tokens travel as raw
//! size-delimited frames. Any error moves the authenticator to `Failed`.
//!
//! A state change requested while an outbound frame is still partially
//! written is held as pending and committed once the frame is flushed, so
//! the authenticator never waits for a response to bytes the peer has not
//! received.

use std::sync::Arc;

use bytes::Bytes;
use tracing::{debug, info, warn};

use super::mechanism::{create_sasl_client, MechanismError, SaslClient};
use super::subject::{KafkaPrincipal, Subject};
use crate::config::SaslClientConfig;
use crate::error::FluxmqWireError;
use crate::metrics::{global_metrics, AuthMetrics};
use crate::network::{NetworkReceive, NetworkSend, TransportLayer};
use crate::protocol::api_keys::ApiKey;
use crate::protocol::envelope::{parse_response, to_send, RequestHeader};
use crate::protocol::errors::ErrorCode;
use crate::protocol::messages::{
    AbstractRequest, ApiVersionsRequest, ApiVersionsResponse, ResponseBody,
    SaslAuthenticateRequest, SaslAuthenticateResponse, SaslHandshakeRequest,
    SaslHandshakeResponse,
};
use crate::Result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SaslState {
    SendApiVersionsRequest,
    ReceiveApiVersionsResponse,
    SendHandshakeRequest,
    ReceiveHandshakeResponse,
    /// About to send the first mechanism token
    Initial,
    /// Exchanging mechanism tokens
    Intermediate,
    /// Mechanism finished; waiting for the server's final response
    ClientComplete,
    Complete,
    Failed,
}

impl SaslState {
    pub fn is_terminal(self) -> bool {
        matches!(self, SaslState::Complete | SaslState::Failed)
    }
}

/// What the driver loop does after a state handler returns
enum Flow {
    /// Wait for the next readiness notification
    Yield,
    /// Run the handler of the given state within the same call
    FallThrough(SaslState),
}

/// Decide where `Intermediate` goes once the mechanism reports completion.
///
/// Without SaslAuthenticate framing the server sends nothing after the last
/// token. With it, a response is still owed unless one was just received and
/// nothing was sent in reply.
pub fn state_after_client_complete(
    authenticate_enabled: bool,
    no_responses_pending: bool,
) -> SaslState {
    if !authenticate_enabled || no_responses_pending {
        SaslState::Complete
    } else {
        SaslState::ClientComplete
    }
}

/// Check a handshake response for the configured mechanism
pub fn check_handshake_response(
    response: &SaslHandshakeResponse,
    mechanism: &str,
) -> Result<()> {
    let enabled = response.enabled_mechanisms();
    match response.error() {
        ErrorCode::None => Ok(()),
        ErrorCode::UnsupportedSaslMechanism => Err(FluxmqWireError::UnsupportedSaslMechanism {
            mechanism: mechanism.to_string(),
            enabled: enabled.to_vec(),
        }),
        ErrorCode::IllegalSaslState => Err(FluxmqWireError::illegal_state(format!(
            "Unexpected handshake request with client mechanism {}, enabled mechanisms are {:?}",
            mechanism, enabled
        ))),
        code => Err(FluxmqWireError::authentication(format!(
            "Unknown error code {}, client mechanism is {}, enabled mechanisms are {:?}",
            code, mechanism, enabled
        ))),
    }
}

pub struct SaslClientAuthenticator<T> {
    config: SaslClientConfig,
    node: String,
    host: String,
    subject: Arc<Subject>,
    transport: T,
    sasl_client: Box<dyn SaslClient>,
    metrics: Arc<AuthMetrics>,
    started: bool,

    state: SaslState,
    pending_state: Option<SaslState>,
    net_in: Option<NetworkReceive>,
    net_out: Option<NetworkSend>,

    correlation_id: i32,
    current_request_header: Option<RequestHeader>,
    sasl_handshake_version: i16,
    /// `None` when tokens travel as raw frames
    sasl_authenticate_version: Option<i16>,
}

impl<T: TransportLayer> SaslClientAuthenticator<T> {
    /// Authenticator using the mechanism named in `config`
    pub fn new(
        config: SaslClientConfig,
        node: impl Into<String>,
        host: impl Into<String>,
        subject: Arc<Subject>,
        transport: T,
    ) -> Result<Self> {
        config.validate()?;
        let host = host.into();
        let sasl_client = create_sasl_client(&config.mechanism, &subject).map_err(|source| {
            FluxmqWireError::Mechanism {
                mechanism: config.mechanism.clone(),
                host: host.clone(),
                source,
            }
        })?;
        Ok(Self::with_sasl_client(
            config,
            node,
            host,
            subject,
            transport,
            sasl_client,
        ))
    }

    /// Authenticator using a caller-provided mechanism
    pub fn with_sasl_client(
        config: SaslClientConfig,
        node: impl Into<String>,
        host: impl Into<String>,
        subject: Arc<Subject>,
        transport: T,
        sasl_client: Box<dyn SaslClient>,
    ) -> Self {
        let state = if config.handshake_request_enable {
            SaslState::SendApiVersionsRequest
        } else {
            SaslState::Initial
        };
        Self {
            config,
            node: node.into(),
            host: host.into(),
            subject,
            transport,
            sasl_client,
            metrics: global_metrics(),
            started: false,
            state,
            pending_state: None,
            net_in: None,
            net_out: None,
            correlation_id: -1,
            current_request_header: None,
            sasl_handshake_version: 0,
            sasl_authenticate_version: None,
        }
    }

    /// Record into `metrics` instead of the global collector
    pub fn with_metrics(mut self, metrics: Arc<AuthMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn state(&self) -> SaslState {
        self.state
    }

    pub fn pending_state(&self) -> Option<SaslState> {
        self.pending_state
    }

    pub fn complete(&self) -> bool {
        self.state == SaslState::Complete
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Version negotiated for SaslAuthenticate, `None` for raw tokens
    pub fn sasl_authenticate_version(&self) -> Option<i16> {
        self.sasl_authenticate_version
    }

    /// Authenticated identity, available once complete
    pub fn principal(&self) -> Option<KafkaPrincipal> {
        if !self.complete() {
            return None;
        }
        self.subject.first_principal().ok().map(KafkaPrincipal::user)
    }

    /// Release mechanism resources and in-flight buffers.
    ///
    /// An exchange that has not completed cannot be resumed afterwards.
    pub fn close(&mut self) {
        self.sasl_client.dispose();
        if !self.state.is_terminal() {
            self.state = SaslState::Failed;
            self.pending_state = None;
            self.transport.remove_write_interest();
        }
        self.net_in = None;
        self.net_out = None;
        self.current_request_header = None;
        debug!("Closed SASL authenticator for node {}", self.node);
    }

    /// Advance the exchange as far as possible without blocking.
    ///
    /// Returns `Ok(())` when waiting for I/O or done; any error is fatal and
    /// leaves the authenticator in [`SaslState::Failed`].
    pub fn authenticate(&mut self) -> Result<()> {
        if self.state == SaslState::Failed {
            return Err(FluxmqWireError::HandshakeTerminated {
                node: self.node.clone(),
            });
        }
        if !self.started {
            self.started = true;
            self.metrics.record_authentication_started();
        }
        match self.advance() {
            Ok(()) => Ok(()),
            Err(err) => {
                self.fail(&err);
                Err(err)
            }
        }
    }

    fn advance(&mut self) -> Result<()> {
        if self.net_out.is_some() && !self.flush_net_out_and_update_interest()? {
            return Ok(());
        }
        let mut current = self.state;
        loop {
            let flow = match current {
                SaslState::SendApiVersionsRequest => self.send_api_versions_request()?,
                SaslState::ReceiveApiVersionsResponse => self.receive_api_versions_response()?,
                SaslState::SendHandshakeRequest => self.send_handshake_request()?,
                SaslState::ReceiveHandshakeResponse => self.receive_handshake_response()?,
                SaslState::Initial => self.send_initial_token()?,
                SaslState::Intermediate => self.exchange_tokens()?,
                SaslState::ClientComplete => self.receive_final_response()?,
                SaslState::Complete | SaslState::Failed => Flow::Yield,
            };
            match flow {
                Flow::Yield => return Ok(()),
                Flow::FallThrough(next) => current = next,
            }
        }
    }

    // ------------------------------------------------------------------
    // State handlers
    // ------------------------------------------------------------------

    fn send_api_versions_request(&mut self) -> Result<Flow> {
        let request = ApiVersionsRequest::new(ApiKey::ApiVersions.oldest_version());
        self.send_request(&request)?;
        self.set_state(SaslState::ReceiveApiVersionsResponse);
        Ok(Flow::Yield)
    }

    fn receive_api_versions_response(&mut self) -> Result<Flow> {
        let response: ApiVersionsResponse = match self.receive_kafka_response()? {
            Some(body) => body.try_into()?,
            None => return Ok(Flow::Yield),
        };
        if response.error() != ErrorCode::None {
            return Err(response.error().exception(ApiKey::ApiVersions.name(), None));
        }
        self.sasl_handshake_version = response
            .api_version(ApiKey::SaslHandshake)
            .map(|v| v.usable_version(ApiKey::SaslHandshake.latest_version()))
            .unwrap_or(0);
        self.sasl_authenticate_version = response
            .api_version(ApiKey::SaslAuthenticate)
            .map(|v| v.usable_version(ApiKey::SaslAuthenticate.latest_version()));
        debug!(
            "Node {} supports SaslHandshake v{} and SaslAuthenticate {:?}",
            self.node, self.sasl_handshake_version, self.sasl_authenticate_version
        );
        self.set_state(SaslState::SendHandshakeRequest);
        Ok(Flow::FallThrough(SaslState::SendHandshakeRequest))
    }

    fn send_handshake_request(&mut self) -> Result<Flow> {
        let request =
            SaslHandshakeRequest::new(self.config.mechanism.clone(), self.sasl_handshake_version);
        self.send_request(&request)?;
        self.set_state(SaslState::ReceiveHandshakeResponse);
        Ok(Flow::Yield)
    }

    fn receive_handshake_response(&mut self) -> Result<Flow> {
        let response: SaslHandshakeResponse = match self.receive_kafka_response()? {
            Some(body) => body.try_into()?,
            None => return Ok(Flow::Yield),
        };
        check_handshake_response(&response, &self.config.mechanism)?;
        self.set_state(SaslState::Initial);
        Ok(Flow::FallThrough(SaslState::Initial))
    }

    fn send_initial_token(&mut self) -> Result<Flow> {
        self.send_sasl_client_token(&[], true)?;
        self.set_state(SaslState::Intermediate);
        Ok(Flow::Yield)
    }

    fn exchange_tokens(&mut self) -> Result<Flow> {
        let no_responses_pending = match self.receive_token()? {
            Some(server_token) => !self.send_sasl_client_token(&server_token, false)?,
            None => false,
        };
        if self.sasl_client.is_complete() {
            self.set_state(state_after_client_complete(
                self.sasl_authenticate_version.is_some(),
                no_responses_pending,
            ));
        }
        Ok(Flow::Yield)
    }

    fn receive_final_response(&mut self) -> Result<Flow> {
        if self.receive_token()?.is_some() {
            self.set_state(SaslState::Complete);
        }
        Ok(Flow::Yield)
    }

    // ------------------------------------------------------------------
    // Outbound
    // ------------------------------------------------------------------

    fn next_request_header(&mut self, api_key: ApiKey, version: i16) -> RequestHeader {
        let header = RequestHeader::new(
            api_key,
            version,
            self.config.client_id.clone(),
            self.correlation_id,
        );
        self.correlation_id = self.correlation_id.wrapping_add(1);
        self.current_request_header = Some(header.clone());
        header
    }

    fn send_request<R: AbstractRequest>(&mut self, request: &R) -> Result<()> {
        let header = self.next_request_header(R::API_KEY, request.version());
        let send = to_send(&self.node, &header, request)?;
        self.metrics.record_request_sent();
        self.send(send)
    }

    /// Produce and send the next mechanism token.
    ///
    /// Returns false when the mechanism had nothing to send.
    fn send_sasl_client_token(&mut self, server_token: &[u8], is_initial: bool) -> Result<bool> {
        if self.sasl_client.is_complete() {
            return Ok(false);
        }
        let token = match self.create_sasl_token(server_token, is_initial)? {
            Some(token) => Bytes::from(token),
            None => return Ok(false),
        };
        match self.sasl_authenticate_version {
            Some(version) => {
                let request = SaslAuthenticateRequest::new(token, version);
                self.send_request(&request)?;
            }
            None => {
                let send = NetworkSend::new(self.node.as_str(), token)?;
                self.send(send)?;
            }
        }
        Ok(true)
    }

    fn create_sasl_token(&mut self, server_token: &[u8], is_initial: bool) -> Result<Option<Vec<u8>>> {
        if is_initial && !self.sasl_client.has_initial_response() {
            return Ok(Some(server_token.to_vec()));
        }
        self.sasl_client
            .evaluate_challenge(server_token)
            .map_err(|source| self.mechanism_error(source))
    }

    fn mechanism_error(&self, source: MechanismError) -> FluxmqWireError {
        FluxmqWireError::Mechanism {
            mechanism: self.config.mechanism.clone(),
            host: self.host.clone(),
            source,
        }
    }

    fn send(&mut self, send: NetworkSend) -> Result<()> {
        self.net_out = Some(send);
        self.flush_net_out_and_update_interest()?;
        Ok(())
    }

    /// Write what the transport accepts; returns true once nothing is left
    fn flush_net_out_and_update_interest(&mut self) -> Result<bool> {
        let flushed = match self.net_out.as_mut() {
            Some(send) => {
                let written = match send.write_to(&mut self.transport) {
                    Ok(written) => written,
                    Err(e) => return Err(self.io_error(e)),
                };
                self.metrics.record_bytes_sent(written);
                send.completed()
            }
            None => true,
        };
        if flushed {
            self.net_out = None;
            self.transport.remove_write_interest();
            if let Some(pending) = self.pending_state.take() {
                self.set_state(pending);
            }
        } else {
            self.transport.add_write_interest();
        }
        Ok(flushed)
    }

    fn set_state(&mut self, state: SaslState) {
        if self.net_out.is_some() {
            self.pending_state = Some(state);
            return;
        }
        self.pending_state = None;
        debug!("Set SASL client state to {:?} for node {}", state, self.node);
        self.state = state;
        if state == SaslState::Complete {
            self.transport.remove_write_interest();
            self.metrics.record_authentication_succeeded();
            info!(
                "Successfully authenticated with node {} using mechanism {}",
                self.node, self.config.mechanism
            );
        }
    }

    /// Fail an exchange abandoned by its driver, e.g. on timeout
    pub(crate) fn abort(&mut self, err: &FluxmqWireError) {
        if !self.state.is_terminal() {
            self.fail(err);
        }
    }

    fn fail(&mut self, err: &FluxmqWireError) {
        warn!(
            "SASL authentication with node {} ({}) failed in state {:?}: {}",
            self.node, self.host, self.state, err
        );
        self.state = SaslState::Failed;
        self.pending_state = None;
        self.net_out = None;
        self.net_in = None;
        self.current_request_header = None;
        self.transport.remove_write_interest();
        self.metrics.record_authentication_failed();
    }

    // ------------------------------------------------------------------
    // Inbound
    // ------------------------------------------------------------------

    fn io_error(&self, err: std::io::Error) -> FluxmqWireError {
        match err.kind() {
            std::io::ErrorKind::UnexpectedEof
            | std::io::ErrorKind::BrokenPipe
            | std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::ConnectionAborted => FluxmqWireError::ConnectionClosed {
                node: self.node.clone(),
            },
            _ => FluxmqWireError::Io(err),
        }
    }

    /// A complete inbound frame, or `None` if it has not fully arrived
    fn receive_response_or_token(&mut self) -> Result<Option<Bytes>> {
        let max_size = self.config.max_receive_size;
        let receive = self
            .net_in
            .get_or_insert_with(|| NetworkReceive::new(self.node.clone(), max_size));
        let read = match receive.read_from(&mut self.transport) {
            Ok(read) => read,
            // Size prefix out of range: the peer is not speaking this protocol
            Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                return Err(FluxmqWireError::invalid_sasl_response(FluxmqWireError::Io(e)))
            }
            Err(e) => return Err(self.io_error(e)),
        };
        self.metrics.record_bytes_received(read);
        if !receive.complete() {
            return Ok(None);
        }
        Ok(self.net_in.take().and_then(NetworkReceive::into_payload))
    }

    /// Decode the response to the outstanding request
    fn receive_kafka_response(&mut self) -> Result<Option<ResponseBody>> {
        let payload = match self.receive_response_or_token()? {
            Some(payload) => payload,
            None => return Ok(None),
        };
        let header = self.current_request_header.take().ok_or_else(|| {
            FluxmqWireError::illegal_state("Received a response with no request outstanding")
        })?;
        match parse_response(payload, &header) {
            Ok(body) => {
                self.metrics.record_response(&body.error_counts());
                Ok(Some(body))
            }
            Err(err @ FluxmqWireError::Schema(_)) => {
                debug!(
                    "Invalid SASL mechanism response from node {}, server may be expecting only raw tokens",
                    self.node
                );
                Err(FluxmqWireError::invalid_sasl_response(err))
            }
            Err(err) => Err(err),
        }
    }

    /// The next server token, unwrapped from SaslAuthenticate if in use
    fn receive_token(&mut self) -> Result<Option<Bytes>> {
        if self.sasl_authenticate_version.is_none() {
            return self.receive_response_or_token();
        }
        let response: SaslAuthenticateResponse = match self.receive_kafka_response()? {
            Some(body) => body.try_into()?,
            None => return Ok(None),
        };
        if response.error() != ErrorCode::None {
            return Err(response
                .error()
                .exception(ApiKey::SaslAuthenticate.name(), response.error_message()));
        }
        Ok(Some(response.sasl_auth_bytes().clone()))
    }
}

impl<T> std::fmt::Debug for SaslClientAuthenticator<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SaslClientAuthenticator")
            .field("node", &self.node)
            .field("mechanism", &self.config.mechanism)
            .field("state", &self.state)
            .field("pending_state", &self.pending_state)
            .field("correlation_id", &self.correlation_id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_after_client_complete() {
        assert_eq!(state_after_client_complete(false, false), SaslState::Complete);
        assert_eq!(state_after_client_complete(false, true), SaslState::Complete);
        assert_eq!(state_after_client_complete(true, true), SaslState::Complete);
        assert_eq!(state_after_client_complete(true, false), SaslState::ClientComplete);
    }

    #[test]
    fn test_handshake_unsupported_mechanism() {
        let response = SaslHandshakeResponse::new(
            ErrorCode::UnsupportedSaslMechanism,
            vec!["PLAIN".to_string(), "SCRAM-SHA-256".to_string()],
        );
        let err = check_handshake_response(&response, "SCRAM-SHA-512").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("PLAIN"));
        assert!(message.contains("SCRAM-SHA-256"));
        assert!(matches!(err, FluxmqWireError::UnsupportedSaslMechanism { .. }));
    }

    #[test]
    fn test_handshake_illegal_state_and_unknown() {
        let response = SaslHandshakeResponse::new(ErrorCode::IllegalSaslState, vec!["PLAIN".to_string()]);
        let err = check_handshake_response(&response, "PLAIN").unwrap_err();
        assert!(matches!(err, FluxmqWireError::IllegalSaslState { .. }));
        assert!(err.to_string().contains("PLAIN"));

        let response = SaslHandshakeResponse::new(ErrorCode::UnknownServerError, vec![]);
        let err = check_handshake_response(&response, "PLAIN").unwrap_err();
        assert!(matches!(err, FluxmqWireError::SaslAuthentication { .. }));
    }

    #[test]
    fn test_handshake_ok() {
        let response = SaslHandshakeResponse::new(ErrorCode::None, vec!["PLAIN".to_string()]);
        assert!(check_handshake_response(&response, "PLAIN").is_ok());
    }

    #[test]
    fn test_terminal_states() {
        assert!(SaslState::Complete.is_terminal());
        assert!(SaslState::Failed.is_terminal());
        assert!(!SaslState::ClientComplete.is_terminal());
    }
}
