use std::path::PathBuf;

use clap::Parser;
use netmeter::client::{Client, Targets};
use netmeter::emitter::{CsvEmitter, Emitter, Fanout, HumanReadableEmitter, JsonEmitter};
use netmeter::params;
use netmeter::payload::Payload;
use netmeter::sampler::HostSampler;
use netmeter::sweep::SweepPlan;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Clone, Debug, clap::ValueEnum)]
enum Format {
    Human,
    Json,
}

#[derive(Parser, Debug)]
struct Cli {
    /// Echo server host
    #[arg(long, default_value = "localhost")]
    host: String,
    /// Environment label written to every record and to the CSV file name
    #[arg(long, default_value = "Local")]
    env: String,
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
    /// HTTPS port for the HTTP/2 sweeps (0 disables)
    #[arg(long, default_value_t = params::HTTPS_PORT)]
    https: u16,
    /// HTTP/3 port (0 disables)
    #[arg(long, default_value_t = params::HTTP3_PORT)]
    http3: u16,
    /// How many times to run the whole protocol matrix
    #[arg(long, default_value_t = params::SAMPLE_ROUNDS)]
    samples: usize,
    /// Transfers per size in sequential sweeps
    #[arg(long, default_value_t = params::FILES_TO_SEND)]
    files: usize,
    /// Directory receiving meter_<env>.csv
    #[arg(long, default_value = params::OUTPUT_DIR)]
    output_dir: PathBuf,
    /// Console format: 'human' or 'json' for batch processing
    #[arg(long, default_value = "human")]
    format: Format,
    /// Verify server certificates instead of accepting self-signed ones
    #[arg(long)]
    verify_certs: bool,
    /// Log level, overridden by RUST_LOG
    #[arg(long, default_value = "info")]
    log_level: LevelFilter,
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
        .with_writer(std::io::stderr)
        .init();

    let console: Box<dyn Emitter> = match cli.format {
        Format::Human => Box::new(HumanReadableEmitter::new(std::io::stdout())),
        Format::Json => Box::new(JsonEmitter::new(std::io::stdout())),
    };
    let mut emitter = Fanout::default()
        .with(console)
        .with(Box::new(CsvEmitter::append(&cli.output_dir, &cli.env)?));

    let targets = Targets {
        host: cli.host,
        quic: cli.quic,
        tcp: cli.tcp,
        tcp_tls: cli.tcp_tls,
        http: cli.http,
        https: cli.https,
        http3: cli.http3,
    };
    let mut client = Client::new(cli.env, targets);
    client.plan = SweepPlan {
        files: cli.files,
        ..SweepPlan::default()
    };
    client.verify_certs = cli.verify_certs;

    let mut sampler = HostSampler::new();

    for round in 0..cli.samples {
        // fresh random data every round
        let payload = Payload::for_sweep();
        tracing::info!(round, host = %client.targets.host, "starting clients");
        client.run_round(&payload, &mut sampler, &mut emitter).await?;
    }

    Ok(())
}
