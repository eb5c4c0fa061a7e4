//! HTTP/3 connector.
//!
//! Every sweep step opens a QUIC connection and an HTTP/3 session on it;
//! the session driver runs as its own task until the link is dropped.
//! Transfers are POSTs like the HTTP/1 and HTTP/2 ones, each on its own
//! request stream, so multiplexed batches share the connection.

use std::net::SocketAddr;

use bytes::{BufMut, Bytes};
use futures_util::future;
use h3::client::SendRequest;
use h3_quinn::OpenStreams;
use quinn::{Connection, Endpoint};
use tokio::task::JoinHandle;

use crate::ack;
use crate::error::{MeterError, Result};
use crate::flood;
use crate::link::{Connector, Link, MultiplexLink};
use crate::params;
use crate::payload::Payload;
use crate::quic;
use crate::trial::TrialKind;

/// Opens one HTTP/3 session per sweep step.
pub struct Http3Connector {
    endpoint: Endpoint,
    addr: SocketAddr,
    server_name: String,
    uri: http::Uri,
    protocol: String,
}

impl Http3Connector {
    /// Connector for `https://host:port/`. See
    /// [`crate::tls::client_config`] for `verify`.
    pub async fn new(host: &str, port: u16, verify: bool) -> Result<Self> {
        let (endpoint, addr) = quic::client_endpoint(host, port, verify, params::H3_ALPN).await?;
        let uri = format!("https://{host}:{port}/").parse::<http::Uri>().map_err(http::Error::from)?;
        Ok(Http3Connector {
            endpoint,
            addr,
            server_name: host.to_owned(),
            uri,
            protocol: "HTTP/3 (QUIC)".to_owned(),
        })
    }

    /// Label reports of this connector as multiplexed.
    pub fn multiplexed(mut self) -> Self {
        self.protocol.push_str(" (Multiplex)");
        self
    }
}

impl Connector for Http3Connector {
    type Link = Http3Link;

    fn protocol(&self) -> &str {
        &self.protocol
    }

    fn kind(&self) -> TrialKind {
        TrialKind::Http
    }

    async fn connect(&self) -> Result<Http3Link> {
        let conn = self
            .endpoint
            .connect(self.addr, &self.server_name)?
            .await?;
        let (mut driver, requests) = h3::client::new(h3_quinn::Connection::new(conn.clone())).await?;
        let driver = tokio::spawn(async move {
            if let Err(e) = future::poll_fn(|cx| driver.poll_close(cx)).await {
                tracing::debug!("HTTP/3 session closed: {e}");
            }
        });
        Ok(Http3Link {
            conn,
            requests,
            driver,
            uri: self.uri.clone(),
        })
    }
}

/// An HTTP/3 session on one QUIC connection.
pub struct Http3Link {
    conn: Connection,
    requests: SendRequest<OpenStreams, Bytes>,
    driver: JoinHandle<()>,
    uri: http::Uri,
}

impl Http3Link {
    fn post(&self, body: Bytes) -> impl Future<Output = Result<usize>> + Send + 'static {
        let mut requests = self.requests.clone();
        let uri = self.uri.clone();
        async move {
            let request = http::Request::post(uri)
                .header(http::header::CONTENT_TYPE, "application/octet-stream")
                .body(())?;
            let mut stream = requests.send_request(request).await?;
            for chunk in flood::chunks(body.len()) {
                stream.send_data(body.slice(chunk)).await?;
            }
            stream.finish().await?;

            let response = stream.recv_response().await?;
            if !response.status().is_success() {
                return Err(MeterError::Status(response.status()));
            }
            let mut frame = Vec::with_capacity(params::ACK_FRAME_LEN);
            while let Some(chunk) = stream.recv_data().await? {
                frame.put(chunk);
            }
            Ok(ack::decode(&frame).unwrap_or(0))
        }
    }
}

impl Link for Http3Link {
    async fn probe(&mut self) {
        if let Err(e) = self.post(Bytes::from_static(&[0])).await {
            tracing::debug!("first byte probe failed: {e}");
        }
    }

    async fn transfer(&mut self, payload: &Payload, size: usize) -> Result<()> {
        self.transfer_shared(payload.clone(), size).await
    }
}

impl MultiplexLink for Http3Link {
    fn transfer_shared(
        &self,
        payload: Payload,
        size: usize,
    ) -> impl Future<Output = Result<()>> + Send + 'static {
        let acked = self.post(payload.prefix(size));
        async move {
            let acked = acked.await?;
            if acked != size {
                return Err(MeterError::AckMismatch {
                    expected: size,
                    acked,
                });
            }
            Ok(())
        }
    }
}

impl Drop for Http3Link {
    fn drop(&mut self) {
        self.conn.close(0u32.into(), b"done");
        self.driver.abort();
    }
}
