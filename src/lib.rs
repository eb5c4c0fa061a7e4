//! Throughput and latency sweeps across TCP, TLS over TCP, HTTP/1,
//! HTTP/2, HTTP/3 and QUIC.
//!
//! For every transport the client opens a connection, times a one-byte
//! probe, then pushes payloads whose size doubles from 1 byte to 64 MiB.
//! Each size is sent a fixed number of times (sequentially, or
//! concurrently on multiplexing transports) and recorded as one
//! [`trial::Trial`] with wall-clock timings and host resource deltas.
//!
//! The echo side answers every read with an 8-byte acknowledgment frame
//! (see [`ack`]); [`server`] implements it for every transport.
//!
//! # Quick start
//!
//! ```no_run
//! use netmeter::emitter::HumanReadableEmitter;
//! use netmeter::payload::Payload;
//! use netmeter::sampler::HostSampler;
//! use netmeter::sweep::{Sweep, SweepPlan};
//! use netmeter::tcp::TcpConnector;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let payload = Payload::for_sweep();
//! let mut sampler = HostSampler::new();
//! let mut emitter = HumanReadableEmitter::new(std::io::stdout());
//!
//! let mut sweep = Sweep::new("Local", &payload, SweepPlan::default(), &mut sampler, &mut emitter);
//! sweep.run(&TcpConnector::new("localhost", 4243)).await?;
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod ack;
pub mod channel;
pub mod client;
pub mod emitter;
pub mod error;
pub mod flood;
pub mod http;
pub mod http3;
pub mod link;
pub mod params;
pub mod payload;
pub mod quic;
pub mod sampler;
pub mod server;
pub mod sweep;
pub mod tcp;
pub mod tls;
pub mod trial;
