use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use netmeter::params;
use netmeter::server;
use netmeter::tls::{self, Identity};
use tokio::net::TcpListener;
use tokio::task::JoinSet;
use tokio_rustls::TlsAcceptor;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
struct Cli {
    /// Address to bind
    #[arg(long, default_value = "0.0.0.0")]
    host: String,
    /// QUIC port (0 disables)
    #[arg(long, default_value_t = params::QUIC_PORT)]
    quic: u16,
    /// TCP port (0 disables)
    #[arg(long, default_value_t = params::TCP_PORT)]
    tcp: u16,
    /// TLS over TCP port (0 disables)
    #[arg(long, default_value_t = params::TCP_TLS_PORT)]
    tcp_tls: u16,
    /// HTTP/1 port (0 disables)
    #[arg(long, default_value_t = params::HTTP_PORT)]
    http: u16,
    /// HTTPS port, HTTP/2 and HTTP/1.1 (0 disables)
    #[arg(long, default_value_t = params::HTTPS_PORT)]
    https: u16,
    /// HTTP/3 port (0 disables)
    #[arg(long, default_value_t = params::HTTP3_PORT)]
    http3: u16,
    /// Log level, overridden by RUST_LOG
    #[arg(long, default_value = "info")]
    log_level: LevelFilter,
}

impl Cli {
    fn addr(&self, port: u16) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, port).parse()
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(cli.log_level.into())
                .from_env_lossy(),
        )
        .init();

    let identity = Arc::new(Identity::self_signed()?);
    let mut servers = JoinSet::new();

    if cli.quic > 0 {
        let endpoint = server::quic_endpoint(cli.addr(cli.quic)?, &identity, params::QUIC_ALPN)?;
        tracing::info!("QUIC server listening on {}", endpoint.local_addr()?);
        servers.spawn(server::serve_quic(endpoint));
    }

    if cli.tcp > 0 {
        let listener = TcpListener::bind(cli.addr(cli.tcp)?).await?;
        tracing::info!("TCP server listening on {}", listener.local_addr()?);
        servers.spawn(server::serve_tcp(listener, None));
    }

    if cli.tcp_tls > 0 {
        let config = tls::server_config(&identity, &[])?;
        let listener = TcpListener::bind(cli.addr(cli.tcp_tls)?).await?;
        tracing::info!("TCP TLS server listening on {}", listener.local_addr()?);
        servers.spawn(server::serve_tcp(
            listener,
            Some(TlsAcceptor::from(Arc::new(config))),
        ));
    }

    if cli.http > 0 {
        let listener = TcpListener::bind(cli.addr(cli.http)?).await?;
        tracing::info!("HTTP server listening on {}", listener.local_addr()?);
        servers.spawn(server::serve_http(listener));
    }

    if cli.https > 0 {
        let listener = std::net::TcpListener::bind(cli.addr(cli.https)?)?;
        tracing::info!("HTTPS server listening on {}", listener.local_addr()?);
        let identity = identity.clone();
        servers.spawn(async move { server::serve_https(listener, &identity).await });
    }

    if cli.http3 > 0 {
        let endpoint = server::quic_endpoint(cli.addr(cli.http3)?, &identity, params::H3_ALPN)?;
        tracing::info!("HTTP/3 server listening on {}", endpoint.local_addr()?);
        servers.spawn(server::serve_http3(endpoint));
    }

    if servers.is_empty() {
        eprintln!("error: nothing to do, every listener is disabled");
        std::process::exit(1);
    }

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutting down");
        }
        Some(done) = servers.join_next() => {
            // listeners only return on failure
            done??;
        }
    }

    Ok(())
}
