//! # Dialing the worker.
//!
//! A [`Dialer`] performs exactly one connect call. Retry policy lives in
//! [`ConnectionAttempt`](crate::ConnectionAttempt); failures are classified
//! through [`DialError::is_refusal`].

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

use crate::config::Endpoint;
use crate::error::DialError;

/// Bidirectional byte stream usable as a link.
pub trait LinkIo: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

impl<T> LinkIo for T where T: AsyncRead + AsyncWrite + Send + Unpin + 'static {}

/// Owned, type-erased link stream. Dropping it closes the connection.
pub type LinkStream = Box<dyn LinkIo>;

/// Opens one connection to an endpoint.
#[async_trait]
pub trait Dialer: Send + Sync + 'static {
    /// Performs a single dial.
    ///
    /// Dropping the returned future must abandon the dial and release the socket.
    async fn dial(&self, endpoint: &Endpoint) -> Result<LinkStream, DialError>;
}

/// [`Dialer`] backed by `tokio::net::TcpStream`.
#[derive(Clone, Copy, Debug, Default)]
pub struct TcpDialer;

#[async_trait]
impl Dialer for TcpDialer {
    async fn dial(&self, endpoint: &Endpoint) -> Result<LinkStream, DialError> {
        let stream = TcpStream::connect((endpoint.host.as_str(), endpoint.port))
            .await
            .map_err(|e| DialError::new(endpoint.to_string(), e))?;
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(error = %e, "could not disable nagle");
        }
        Ok(Box::new(stream))
    }
}
