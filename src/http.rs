//! HTTP/1 and HTTP/2 connectors.
//!
//! One `reqwest::Client` lives for the whole sweep; its idle pool is
//! closed when the connector is dropped. Each sweep step starts with a
//! HEAD request, so a dead server surfaces as a connection error. Each
//! transfer is a POST whose response body is the acknowledgment frame
//! for the request body.

use url::Url;

use crate::ack;
use crate::error::{MeterError, Result};
use crate::link::{Connector, Link, MultiplexLink};
use crate::payload::Payload;
use crate::tls;
use crate::trial::TrialKind;

/// Which HTTP version a connector speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpVersion {
    /// Plain-text HTTP/1.1.
    Http1,
    /// HTTP/2 over TLS.
    Http2,
}

/// Hands out links sharing one persistent HTTP client.
pub struct HttpConnector {
    client: reqwest::Client,
    url: Url,
    protocol: String,
}

impl HttpConnector {
    /// Connector for `host:port`. HTTP/2 uses TLS; see
    /// [`tls::client_config`] for `verify`.
    pub fn new(host: &str, port: u16, version: HttpVersion, verify: bool) -> Result<Self> {
        let (client, url, protocol) = match version {
            HttpVersion::Http1 => (
                reqwest::Client::builder().http1_only().build()?,
                Url::parse(&format!("http://{host}:{port}/"))?,
                "HTTP/1",
            ),
            HttpVersion::Http2 => (
                reqwest::Client::builder()
                    .use_preconfigured_tls(tls::client_config(verify, &[tls::ALPN_H2])?)
                    .http2_prior_knowledge()
                    .build()?,
                Url::parse(&format!("https://{host}:{port}/"))?,
                "HTTP/2",
            ),
        };

        Ok(HttpConnector {
            client,
            url,
            protocol: protocol.to_owned(),
        })
    }

    /// Label reports of this connector as multiplexed.
    pub fn multiplexed(mut self) -> Self {
        self.protocol.push_str(" (Multiplex)");
        self
    }
}

impl Connector for HttpConnector {
    type Link = HttpLink;

    fn protocol(&self) -> &str {
        &self.protocol
    }

    fn kind(&self) -> TrialKind {
        TrialKind::Http
    }

    // The pool connects lazily; a HEAD forces the dial (and TLS handshake)
    // so an unreachable server fails here. Any status means we got through.
    async fn connect(&self) -> Result<HttpLink> {
        let response = self.client.head(self.url.clone()).send().await?;
        tracing::trace!(status = %response.status(), url = %self.url, "connected");
        Ok(HttpLink {
            client: self.client.clone(),
            url: self.url.clone(),
        })
    }
}

/// A handle on the shared client for one sweep step.
pub struct HttpLink {
    client: reqwest::Client,
    url: Url,
}

impl HttpLink {
    fn post(&self, body: bytes::Bytes) -> impl Future<Output = Result<usize>> + Send + 'static {
        let request = self
            .client
            .post(self.url.clone())
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(body);
        async move {
            let frame = request.send().await?.error_for_status()?.bytes().await?;
            Ok(ack::decode(&frame).unwrap_or(0))
        }
    }
}

impl Link for HttpLink {
    async fn probe(&mut self) {
        if let Err(e) = self.post(bytes::Bytes::from_static(&[0])).await {
            tracing::debug!("first byte probe failed: {e}");
        }
    }

    async fn transfer(&mut self, payload: &Payload, size: usize) -> Result<()> {
        self.transfer_shared(payload.clone(), size).await
    }
}

impl MultiplexLink for HttpLink {
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
