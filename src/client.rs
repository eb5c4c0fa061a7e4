//! Runs the whole protocol matrix against one echo server.

use crate::emitter::Emitter;
use crate::error::Result;
use crate::http::{HttpConnector, HttpVersion};
use crate::http3::Http3Connector;
use crate::params;
use crate::payload::Payload;
use crate::quic::QuicConnector;
use crate::sampler::ResourceSampler;
use crate::sweep::{Sweep, SweepPlan};
use crate::tcp::{TcpConnector, TlsConnector};

/// Ports of the echo server under test. A port of 0 skips that protocol.
#[derive(Debug, Clone)]
pub struct Targets {
    /// Host name or address; also the TLS server name.
    pub host: String,
    /// QUIC echo port.
    pub quic: u16,
    /// Raw TCP echo port.
    pub tcp: u16,
    /// TLS over TCP echo port.
    pub tcp_tls: u16,
    /// Plain HTTP/1 port.
    pub http: u16,
    /// HTTPS port, used for the HTTP/2 sweeps.
    pub https: u16,
    /// HTTP/3 port (UDP).
    pub http3: u16,
}

impl Default for Targets {
    fn default() -> Self {
        Targets {
            host: "localhost".into(),
            quic: params::QUIC_PORT,
            tcp: params::TCP_PORT,
            tcp_tls: params::TCP_TLS_PORT,
            http: params::HTTP_PORT,
            https: params::HTTPS_PORT,
            http3: params::HTTP3_PORT,
        }
    }
}

/// Runs the whole protocol matrix against one server.
pub struct Client {
    /// Label carried by every trial.
    pub environment: String,
    /// Where the echo server listens.
    pub targets: Targets,
    /// Sizes and batch length shared by every sweep.
    pub plan: SweepPlan,
    /// Verify server certificates against the webpki roots instead of
    /// accepting the echo server's self-signed one.
    pub verify_certs: bool,
}

impl Client {
    /// Client with the default plan and certificate checks off.
    pub fn new(environment: String, targets: Targets) -> Self {
        Client {
            environment,
            targets,
            plan: SweepPlan::default(),
            verify_certs: false,
        }
    }

    /// One pass over every enabled protocol: QUIC first, then HTTP/1,
    /// HTTP/2 and HTTP/3, then the raw TCP transports.
    pub async fn run_round<S, E>(&self, payload: &Payload, sampler: &mut S, emitter: &mut E) -> Result<()>
    where
        S: ResourceSampler + ?Sized,
        E: Emitter + ?Sized,
    {
        let host = self.targets.host.as_str();
        let verify = self.verify_certs;
        let mut sweep = Sweep::new(&self.environment, payload, self.plan, sampler, emitter);

        if self.targets.quic > 0 {
            let quic = QuicConnector::new(host, self.targets.quic, verify).await?;
            sweep.run(&quic).await?;

            let quic = quic.multiplexed();
            for streams in params::MULTIPLEX_WIDTHS {
                sweep.run_multiplexed(&quic, streams).await?;
            }
        }

        if self.targets.http > 0 {
            let http = HttpConnector::new(host, self.targets.http, HttpVersion::Http1, verify)?;
            sweep.run(&http).await?;
        }

        if self.targets.https > 0 {
            {
                let h2 = HttpConnector::new(host, self.targets.https, HttpVersion::Http2, verify)?;
                sweep.run(&h2).await?;
            }

            for streams in params::MULTIPLEX_WIDTHS {
                let h2 = HttpConnector::new(host, self.targets.https, HttpVersion::Http2, verify)?
                    .multiplexed();
                sweep.run_multiplexed(&h2, streams).await?;
            }
        }

        if self.targets.http3 > 0 {
            let h3 = Http3Connector::new(host, self.targets.http3, verify).await?;
            sweep.run(&h3).await?;

            let h3 = h3.multiplexed();
            for streams in params::MULTIPLEX_WIDTHS {
                sweep.run_multiplexed(&h3, streams).await?;
            }
        }

        if self.targets.tcp > 0 {
            sweep.run(&TcpConnector::new(host, self.targets.tcp)).await?;
        }

        if self.targets.tcp_tls > 0 {
            let tls = TlsConnector::new(host, self.targets.tcp_tls, verify)?;
            sweep.run(&tls).await?;
        }

        Ok(())
    }
}
