//! Sweep bounds, wire constants and default ports.

/// First payload size of a sweep (1 byte).
pub const INITIAL_MESSAGE_SIZE: usize = 1;

/// Last payload size of a sweep, inclusive (64 MiB).
pub const FINAL_MESSAGE_SIZE: usize = 1 << 26;

/// Largest single write issued by the flood sender (1 MiB). The echo
/// server reads with a buffer of the same size.
pub const CHUNK_SIZE: usize = 1 << 20;

/// Transfers per size in a sequential batch.
pub const FILES_TO_SEND: usize = 10;

/// Concurrent stream counts for the multiplexed sweeps.
pub const MULTIPLEX_WIDTHS: [usize; 3] = [2, 4, 8];

/// How many times the whole protocol matrix is run by default.
pub const SAMPLE_ROUNDS: usize = 5;

/// Length of an acknowledgment frame.
pub const ACK_FRAME_LEN: usize = 8;

/// Consecutive malformed or zero acknowledgment frames tolerated before a
/// flood is declared stalled.
pub const MAX_STALLED_ACKS: usize = 64;

/// Trials smaller than this are printed but not persisted.
pub const MIN_PERSISTED_SIZE: usize = 32;

/// ALPN token spoken by the raw QUIC client and server.
pub const QUIC_ALPN: &[u8] = b"netmeter";

/// ALPN token for HTTP/3.
pub const H3_ALPN: &[u8] = b"h3";

/// Server name presented in TLS handshakes and in the self-signed cert.
pub const SERVER_NAME: &str = "localhost";

/// Default ports, shared by client and server.
pub const QUIC_PORT: u16 = 4242;
/// Raw TCP port.
pub const TCP_PORT: u16 = 4243;
/// TLS over TCP port.
pub const TCP_TLS_PORT: u16 = 4244;
/// Plain HTTP/1 port.
pub const HTTP_PORT: u16 = 4245;
/// HTTPS port (HTTP/2, with HTTP/1.1 fallback).
pub const HTTPS_PORT: u16 = 4246;
/// HTTP/3 port (UDP).
pub const HTTP3_PORT: u16 = 4247;

/// Default directory for CSV output.
pub const OUTPUT_DIR: &str = "/var/log/output";
