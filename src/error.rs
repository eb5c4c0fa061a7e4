use thiserror::Error;

#[derive(Debug, Error)]
pub enum MeterError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
    #[error("TLS error: {0}")]
    Tls(#[from] rustls::Error),
    #[error("certificate generation failed: {0}")]
    Certificate(#[from] rcgen::Error),
    #[error("invalid server name: {0}")]
    ServerName(#[from] rustls::pki_types::InvalidDnsNameError),
    #[error("QUIC connect failed: {0}")]
    QuicConnect(#[from] quinn::ConnectError),
    #[error("QUIC connection error: {0}")]
    QuicConnection(#[from] quinn::ConnectionError),
    #[error("QUIC crypto setup failed: {0}")]
    QuicCrypto(String),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("HTTP/3 error: {0}")]
    H3(#[from] h3::Error),
    #[error("bad HTTP request: {0}")]
    Request(#[from] http::Error),
    #[error("server answered {0}")]
    Status(http::StatusCode),
    #[error("bad endpoint URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("serialize/deserialize error: {0}")]
    JsonError(#[from] serde_json::Error),
    #[error("CSV error: {0}")]
    Csv(Box<csv::Error>),
    #[error("transfer task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
    #[cfg(target_os = "linux")]
    #[error("reading host statistics failed: {0}")]
    Proc(#[from] procfs::ProcError),
    #[error("no address found for {0}")]
    NoAddress(String),
    #[error("count {0} does not fit in an acknowledgment frame")]
    AckOverflow(usize),
    #[error("{0} consecutive acknowledgment frames carried no byte count")]
    StalledAcks(usize),
    #[error("acknowledged {acked} bytes, expected {expected}")]
    AckMismatch { expected: usize, acked: usize },
    #[error("{protocol}: {size} did not finish")]
    Incomplete {
        protocol: String,
        size: usize,
        #[source]
        source: Box<MeterError>,
    },
}

// csv::Error is a large enum, keep MeterError small by boxing it
impl From<csv::Error> for MeterError {
    fn from(e: csv::Error) -> Self {
        MeterError::Csv(Box::new(e))
    }
}

impl MeterError {
    /// Wrap a transfer failure with the protocol and size it happened at.
    pub fn incomplete(protocol: &str, size: usize, source: MeterError) -> Self {
        MeterError::Incomplete {
            protocol: protocol.to_owned(),
            size,
            source: Box::new(source),
        }
    }
}

pub type Result<T> = std::result::Result<T, MeterError>;
