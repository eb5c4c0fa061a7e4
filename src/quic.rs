//! QUIC connector.
//!
//! Sequential batches flood the single bidirectional stream opened at
//! connect time. Multiplexed batches open one fresh stream per transfer on
//! the same connection.

use std::net::SocketAddr;
use std::sync::Arc;

use quinn::{Connection, Endpoint, RecvStream, SendStream};

use crate::channel::DuplexChannel;
use crate::error::{MeterError, Result};
use crate::flood;
use crate::link::{Connector, Link, MultiplexLink};
use crate::params;
use crate::payload::Payload;
use crate::tls;
use crate::trial::TrialKind;

/// Both directions of one QUIC bidirectional stream.
pub struct QuicStream {
    send: SendStream,
    recv: RecvStream,
}

impl QuicStream {
    /// Pair up the halves returned by `open_bi` / `accept_bi`.
    pub fn new(send: SendStream, recv: RecvStream) -> Self {
        QuicStream { send, recv }
    }

    /// Gracefully end the sending direction.
    pub fn finish(&mut self) {
        // already closed or reset: nothing left to flush
        let _ = self.send.finish();
    }
}

impl DuplexChannel for QuicStream {
    type Reader<'a> = &'a mut RecvStream;
    type Writer<'a> = &'a mut SendStream;

    fn halves(&mut self) -> (Self::Reader<'_>, Self::Writer<'_>) {
        (&mut self.recv, &mut self.send)
    }
}

/// Resolve `host:port` and build a client endpoint offering `alpn`.
pub(crate) async fn client_endpoint(
    host: &str,
    port: u16,
    verify: bool,
    alpn: &[u8],
) -> Result<(Endpoint, SocketAddr)> {
    let addr = tokio::net::lookup_host((host, port))
        .await?
        .next()
        .ok_or_else(|| MeterError::NoAddress(format!("{host}:{port}")))?;

    let crypto = tls::client_config(verify, &[alpn])?;
    let crypto = quinn::crypto::rustls::QuicClientConfig::try_from(crypto)
        .map_err(|e| MeterError::QuicCrypto(e.to_string()))?;
    let mut config = quinn::ClientConfig::new(Arc::new(crypto));
    let mut transport = quinn::TransportConfig::default();
    transport.keep_alive_interval(Some(std::time::Duration::from_secs(5)));
    config.transport_config(Arc::new(transport));

    let bind: SocketAddr = if addr.is_ipv6() {
        (std::net::Ipv6Addr::UNSPECIFIED, 0).into()
    } else {
        (std::net::Ipv4Addr::UNSPECIFIED, 0).into()
    };
    let mut endpoint = Endpoint::client(bind)?;
    endpoint.set_default_client_config(config);
    Ok((endpoint, addr))
}

/// Opens a fresh QUIC connection per sweep step from one client endpoint.
pub struct QuicConnector {
    endpoint: Endpoint,
    addr: SocketAddr,
    server_name: String,
    protocol: String,
}

impl QuicConnector {
    /// Connector for `host:port`. See [`tls::client_config`] for `verify`.
    pub async fn new(host: &str, port: u16, verify: bool) -> Result<Self> {
        let (endpoint, addr) = client_endpoint(host, port, verify, params::QUIC_ALPN).await?;
        Ok(QuicConnector {
            endpoint,
            addr,
            server_name: host.to_owned(),
            protocol: "QUIC".to_owned(),
        })
    }

    /// Label reports of this connector as multiplexed.
    pub fn multiplexed(mut self) -> Self {
        self.protocol = "QUIC (Multiplex)".to_owned();
        self
    }
}

impl Connector for QuicConnector {
    type Link = QuicLink;

    fn protocol(&self) -> &str {
        &self.protocol
    }

    fn kind(&self) -> TrialKind {
        TrialKind::Raw
    }

    async fn connect(&self) -> Result<QuicLink> {
        let conn = self
            .endpoint
            .connect(self.addr, &self.server_name)?
            .await?;
        let (send, recv) = conn.open_bi().await?;
        Ok(QuicLink {
            conn,
            stream: QuicStream::new(send, recv),
        })
    }
}

/// An established QUIC connection and its first stream.
pub struct QuicLink {
    conn: Connection,
    stream: QuicStream,
}

impl Link for QuicLink {
    async fn probe(&mut self) {
        flood::first_byte(&mut self.stream).await;
    }

    async fn transfer(&mut self, payload: &Payload, size: usize) -> Result<()> {
        flood::flood(&mut self.stream, payload, size).await
    }
}

impl MultiplexLink for QuicLink {
    fn transfer_shared(
        &self,
        payload: Payload,
        size: usize,
    ) -> impl Future<Output = Result<()>> + Send + 'static {
        let conn = self.conn.clone();
        async move {
            let (send, recv) = conn.open_bi().await?;
            let mut stream = QuicStream::new(send, recv);
            let result = flood::flood(&mut stream, &payload, size).await;
            stream.finish();
            result
        }
    }
}

impl Drop for QuicLink {
    fn drop(&mut self) {
        self.stream.finish();
        self.conn.close(0u32.into(), b"done");
    }
}
