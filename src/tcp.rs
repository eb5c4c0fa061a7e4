//! TCP and TLS-over-TCP connectors.

use std::sync::Arc;

use rustls::pki_types::ServerName;
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;

use crate::error::Result;
use crate::link::{Connector, StreamLink};
use crate::tls;
use crate::trial::TrialKind;

/// Opens a fresh TCP connection per sweep step.
pub struct TcpConnector {
    addr: String,
}

impl TcpConnector {
    /// Connector for `host:port`.
    pub fn new(host: &str, port: u16) -> Self {
        TcpConnector {
            addr: format!("{host}:{port}"),
        }
    }
}

impl Connector for TcpConnector {
    type Link = StreamLink<TcpStream>;

    fn protocol(&self) -> &str {
        "TCP"
    }

    fn kind(&self) -> TrialKind {
        TrialKind::Raw
    }

    async fn connect(&self) -> Result<Self::Link> {
        let stream = TcpStream::connect(&self.addr).await?;
        stream.set_nodelay(true)?;
        Ok(StreamLink::new(stream))
    }
}

/// Opens a fresh TLS session over TCP per sweep step.
pub struct TlsConnector {
    addr: String,
    server_name: ServerName<'static>,
    connector: tokio_rustls::TlsConnector,
}

impl TlsConnector {
    /// Connector for `host:port`. See [`tls::client_config`] for `verify`.
    pub fn new(host: &str, port: u16, verify: bool) -> Result<Self> {
        let config = tls::client_config(verify, &[])?;
        Ok(TlsConnector {
            addr: format!("{host}:{port}"),
            server_name: ServerName::try_from(host.to_owned())?,
            connector: tokio_rustls::TlsConnector::from(Arc::new(config)),
        })
    }
}

impl Connector for TlsConnector {
    type Link = StreamLink<TlsStream<TcpStream>>;

    fn protocol(&self) -> &str {
        "TCP_TLS"
    }

    fn kind(&self) -> TrialKind {
        TrialKind::Raw
    }

    async fn connect(&self) -> Result<Self::Link> {
        let stream = TcpStream::connect(&self.addr).await?;
        stream.set_nodelay(true)?;
        let stream = self
            .connector
            .connect(self.server_name.clone(), stream)
            .await?;
        Ok(StreamLink::new(stream))
    }
}
