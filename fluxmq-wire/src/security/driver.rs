//! Async driver for authenticating tokio TCP connections

use std::sync::Arc;

use tokio::net::{TcpStream, ToSocketAddrs};
use tokio::time::timeout;
use tracing::{debug, info};

use super::authenticator::SaslClientAuthenticator;
use super::subject::Subject;
use crate::config::SaslClientConfig;
use crate::error::FluxmqWireError;
use crate::network::TcpTransport;
use crate::Result;

/// Run the exchange to completion, invoking the authenticator on every
/// readiness notification of the socket.
///
/// Bounded by the configured authentication timeout; on expiry the
/// authenticator is moved to `Failed`.
pub async fn authenticate_tcp(
    authenticator: &mut SaslClientAuthenticator<TcpTransport>,
    config: &SaslClientConfig,
) -> Result<()> {
    let limit = config.authentication_timeout();
    let outcome = timeout(limit, drive(authenticator)).await;
    match outcome {
        Ok(result) => result,
        Err(_) => {
            let err = FluxmqWireError::timeout(limit.as_millis() as u64);
            authenticator.abort(&err);
            Err(err)
        }
    }
}

async fn drive(authenticator: &mut SaslClientAuthenticator<TcpTransport>) -> Result<()> {
    authenticator.authenticate()?;
    while !authenticator.complete() {
        authenticator.transport().ready().await?;
        authenticator.authenticate()?;
    }
    Ok(())
}

/// Connect to `addr` and authenticate the new connection
pub async fn connect_and_authenticate<A>(
    addr: A,
    config: SaslClientConfig,
    subject: Arc<Subject>,
) -> Result<SaslClientAuthenticator<TcpTransport>>
where
    A: ToSocketAddrs + std::fmt::Display,
{
    config.validate()?;
    let node = addr.to_string();
    debug!("Connecting to {} for SASL authentication", node);

    let stream = timeout(config.connection_timeout(), TcpStream::connect(addr))
        .await
        .map_err(|_| FluxmqWireError::timeout(config.connection_timeout_ms))??;
    stream.set_nodelay(true)?;
    let host = stream.peer_addr()?.ip().to_string();

    let mut authenticator = SaslClientAuthenticator::new(
        config.clone(),
        node.clone(),
        host,
        subject,
        TcpTransport::new(stream),
    )?;
    authenticate_tcp(&mut authenticator, &config).await?;
    info!("Authenticated connection to {}", node);
    Ok(authenticator)
}
