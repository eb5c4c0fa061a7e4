//! Echo server: answers every read with an acknowledgment frame.
//!
//! Stream transports (TCP, TLS over TCP, QUIC bidirectional streams) go
//! through [`reflect`]; the HTTP listeners (HTTP/1, HTTP/2 and HTTP/3)
//! answer each request with the frame for the request body length.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::body::Bytes;
use bytes::Buf;
use axum::extract::DefaultBodyLimit;
use axum::http::StatusCode;
use axum::routing::post;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;

use crate::ack;
use crate::channel::DuplexChannel;
use crate::error::{MeterError, Result};
use crate::params;
use crate::quic::QuicStream;
use crate::tls::{self, Identity};

/// Acknowledge everything read from `channel` until the peer closes it.
///
/// Returns the total number of bytes consumed.
pub async fn reflect<C: DuplexChannel>(mut channel: C) -> Result<u64> {
    let (mut reader, mut writer) = channel.halves();
    let mut buf = vec![0u8; params::CHUNK_SIZE];
    let mut total = 0u64;

    loop {
        let n = reader.read(&mut buf).await?;
        if n == 0 {
            return Ok(total);
        }
        writer.write_all(&ack::encode(n)?).await?;
        total += n as u64;
    }
}

/// Accept TCP connections forever, optionally wrapping each in TLS.
pub async fn serve_tcp(listener: TcpListener, tls: Option<TlsAcceptor>) -> Result<()> {
    loop {
        let (stream, peer) = listener.accept().await?;
        stream.set_nodelay(true)?;
        tracing::debug!(%peer, tls = tls.is_some(), "accepted connection");

        let tls = tls.clone();
        tokio::spawn(async move {
            let result = match tls {
                Some(acceptor) => match acceptor.accept(stream).await {
                    Ok(stream) => reflect(stream).await,
                    Err(e) => Err(e.into()),
                },
                None => reflect(stream).await,
            };
            match result {
                Ok(total) => tracing::debug!(%peer, total, "connection closed"),
                Err(e) => tracing::debug!(%peer, "connection ended: {e}"),
            }
        });
    }
}

/// Build a QUIC server endpoint bound to `addr`, offering `alpn`
/// ([`params::QUIC_ALPN`] for raw streams, [`params::H3_ALPN`] for HTTP/3).
pub fn quic_endpoint(addr: SocketAddr, identity: &Identity, alpn: &[u8]) -> Result<quinn::Endpoint> {
    let crypto = tls::server_config(identity, &[alpn])?;
    let crypto = quinn::crypto::rustls::QuicServerConfig::try_from(crypto)
        .map_err(|e| MeterError::QuicCrypto(e.to_string()))?;

    let mut config = quinn::ServerConfig::with_crypto(Arc::new(crypto));
    let mut transport = quinn::TransportConfig::default();
    transport.max_concurrent_bidi_streams(128u32.into());
    config.transport_config(Arc::new(transport));

    Ok(quinn::Endpoint::server(config, addr)?)
}

/// Accept QUIC connections until the endpoint is closed, reflecting every
/// bidirectional stream each connection opens.
pub async fn serve_quic(endpoint: quinn::Endpoint) -> Result<()> {
    while let Some(incoming) = endpoint.accept().await {
        tokio::spawn(async move {
            let conn = match incoming.await {
                Ok(conn) => conn,
                Err(e) => {
                    tracing::warn!("QUIC handshake failed: {e}");
                    return;
                }
            };
            let peer = conn.remote_address();
            tracing::debug!(%peer, "accepted QUIC connection");

            loop {
                let (send, recv) = match conn.accept_bi().await {
                    Ok(stream) => stream,
                    Err(e) => {
                        tracing::debug!(%peer, "QUIC connection ended: {e}");
                        return;
                    }
                };
                tokio::spawn(async move {
                    if let Err(e) = reflect(QuicStream::new(send, recv)).await {
                        tracing::debug!(%peer, "QUIC stream ended: {e}");
                    }
                });
            }
        });
    }
    Ok(())
}

/// Accept HTTP/3 connections until the endpoint is closed, answering
/// every request with the acknowledgment frame of its body.
pub async fn serve_http3(endpoint: quinn::Endpoint) -> Result<()> {
    while let Some(incoming) = endpoint.accept().await {
        tokio::spawn(async move {
            let conn = match incoming.await {
                Ok(conn) => conn,
                Err(e) => {
                    tracing::warn!("QUIC handshake failed: {e}");
                    return;
                }
            };
            let peer = conn.remote_address();
            if let Err(e) = answer_http3(conn).await {
                tracing::debug!(%peer, "HTTP/3 connection ended: {e}");
            }
        });
    }
    Ok(())
}

async fn answer_http3(conn: quinn::Connection) -> Result<()> {
    let mut session: h3::server::Connection<h3_quinn::Connection, Bytes> =
        h3::server::Connection::new(h3_quinn::Connection::new(conn)).await?;

    while let Some((_request, stream)) = session.accept().await? {
        tokio::spawn(async move {
            if let Err(e) = echo_http3(stream).await {
                tracing::debug!("HTTP/3 request failed: {e}");
            }
        });
    }
    Ok(())
}

async fn echo_http3(
    mut stream: h3::server::RequestStream<h3_quinn::BidiStream<Bytes>, Bytes>,
) -> Result<usize> {
    let mut total = 0;
    while let Some(chunk) = stream.recv_data().await? {
        total += chunk.remaining();
    }

    let response = http::Response::builder().status(StatusCode::OK).body(())?;
    stream.send_response(response).await?;
    stream.send_data(Bytes::copy_from_slice(&ack::encode(total)?)).await?;
    stream.finish().await?;
    Ok(total)
}

async fn echo_handler(body: Bytes) -> std::result::Result<Vec<u8>, StatusCode> {
    ack::encode(body.len())
        .map(|frame| frame.to_vec())
        .map_err(|_| StatusCode::PAYLOAD_TOO_LARGE)
}

/// Router answering `POST /` with the acknowledgment frame of the body.
pub fn http_router() -> Router {
    Router::new()
        .route("/", post(echo_handler))
        .layer(DefaultBodyLimit::disable())
}

/// Serve plain HTTP on `listener`.
pub async fn serve_http(listener: TcpListener) -> Result<()> {
    axum::serve(listener, http_router()).await?;
    Ok(())
}

/// Serve HTTPS (HTTP/2 and HTTP/1.1) on `listener`.
pub async fn serve_https(listener: std::net::TcpListener, identity: &Identity) -> Result<()> {
    let config = tls::server_config(identity, &[tls::ALPN_H2, tls::ALPN_HTTP11])?;
    let config = axum_server::tls_rustls::RustlsConfig::from_config(Arc::new(config));
    listener.set_nonblocking(true)?;

    axum_server::from_tcp_rustls(listener, config)
        .serve(http_router().into_make_service())
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reflects_each_read() {
        let (mut local, remote) = tokio::io::duplex(1024);
        let echo = tokio::spawn(reflect(remote));

        local.write_all(b"hello").await.unwrap();
        let mut frame = [0u8; params::ACK_FRAME_LEN];
        local.read_exact(&mut frame).await.unwrap();
        assert_eq!(ack::decode(&frame), Some(5));

        drop(local);
        assert_eq!(echo.await.unwrap().unwrap(), 5);
    }

    #[tokio::test]
    async fn http_echo_frame() {
        let frame = echo_handler(Bytes::from(vec![7u8; 4096])).await.unwrap();
        assert_eq!(ack::decode(&frame), Some(4096));
    }

    #[tokio::test]
    async fn tcp_listener_reflects() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(serve_tcp(listener, None));

        let mut stream = tokio::net::TcpStream::connect(addr).await.unwrap();
        stream.write_all(&[1, 2, 3]).await.unwrap();
        let mut frame = [0u8; params::ACK_FRAME_LEN];
        stream.read_exact(&mut frame).await.unwrap();
        assert_eq!(ack::decode(&frame), Some(3));
    }
}
