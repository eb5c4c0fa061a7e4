//! Output formatting for sweep events.
//!
//! The [`Emitter`] trait defines callbacks for each stage of a sweep.
//! Implementations:
//! - [`HumanReadableEmitter`]: one console line per trial.
//! - [`JsonEmitter`]: one JSON object per line, suitable for machine consumption.
//! - [`CsvEmitter`]: the persisted per-trial record.
//! - [`Fanout`]: forwards every event to several emitters.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use serde::Serialize;

use crate::error::Result;
use crate::params;
use crate::trial::{Trial, human_size};

#[derive(Serialize)]
#[serde(tag = "type")]
enum Event<'a> {
    Starting { protocol: &'a str },
    Error { protocol: &'a str, size: usize, error: &'a str },
    Trial { trial: &'a Trial, goodput: f64 },
    Complete { protocol: &'a str },
}

/// Callbacks for sweep lifecycle events.
pub trait Emitter {
    /// Called when the sweep of a protocol is about to begin.
    fn on_starting(&mut self, protocol: &str) -> Result<()>;
    /// Called when a batch failed; no trial is emitted for that size.
    fn on_error(&mut self, protocol: &str, size: usize, err: &str) -> Result<()>;
    /// Called once per completed batch.
    fn on_trial(&mut self, trial: &Trial) -> Result<()>;
    /// Called when the sweep of a protocol finishes.
    fn on_complete(&mut self, protocol: &str) -> Result<()>;
}

/// Emits human-readable progress and results to a writer.
pub struct HumanReadableEmitter<W: Write> {
    out: W,
}

impl<W: Write> HumanReadableEmitter<W> {
    /// Create a new emitter writing to `out`.
    pub fn new(out: W) -> Self {
        HumanReadableEmitter { out }
    }
}

impl<W: Write> Emitter for HumanReadableEmitter<W> {
    fn on_starting(&mut self, protocol: &str) -> Result<()> {
        writeln!(self.out, "Testing {protocol}...")?;
        Ok(())
    }

    fn on_error(&mut self, protocol: &str, size: usize, err: &str) -> Result<()> {
        writeln!(self.out, "{protocol}: {size} did not finish: {err}")?;
        Ok(())
    }

    fn on_trial(&mut self, t: &Trial) -> Result<()> {
        writeln!(
            self.out,
            "[{} - {}] [{} files] setup: {:?}, firstbyte: {:?}, sent: {}, duration: {:?} (goodput: {:.0} kbps)",
            t.protocol,
            t.environment,
            t.files,
            t.setup,
            t.first_byte,
            human_size(t.size),
            t.duration,
            t.goodput() / 1024.0
        )?;
        self.out.flush()?;
        Ok(())
    }

    fn on_complete(&mut self, _protocol: &str) -> Result<()> {
        Ok(())
    }
}

/// Emits one JSON object per line for each event.
pub struct JsonEmitter<W: Write> {
    out: W,
}

impl<W: Write> JsonEmitter<W> {
    /// Create a new JSON emitter writing to `out`.
    pub fn new(out: W) -> Self {
        JsonEmitter { out }
    }

    fn emit(&mut self, event: &Event) -> Result<()> {
        let json = serde_json::to_string(event)?;
        writeln!(self.out, "{}", json)?;
        Ok(())
    }
}

impl<W: Write> Emitter for JsonEmitter<W> {
    fn on_starting(&mut self, protocol: &str) -> Result<()> {
        self.emit(&Event::Starting { protocol })
    }

    fn on_error(&mut self, protocol: &str, size: usize, err: &str) -> Result<()> {
        self.emit(&Event::Error {
            protocol,
            size,
            error: err,
        })
    }

    fn on_trial(&mut self, trial: &Trial) -> Result<()> {
        self.emit(&Event::Trial {
            trial,
            goodput: trial.goodput(),
        })
    }

    fn on_complete(&mut self, protocol: &str) -> Result<()> {
        self.emit(&Event::Complete { protocol })
    }
}

/// Appends one headerless CSV row per trial of at least
/// [`params::MIN_PERSISTED_SIZE`] bytes.
pub struct CsvEmitter<W: Write> {
    out: csv::Writer<W>,
}

impl<W: Write> CsvEmitter<W> {
    /// Create a CSV emitter writing to `out`.
    pub fn new(out: W) -> Self {
        CsvEmitter {
            out: csv::WriterBuilder::new().has_headers(false).from_writer(out),
        }
    }
}

impl CsvEmitter<std::fs::File> {
    /// Append to `<dir>/meter_<environment>.csv`, creating it if needed.
    pub fn append(dir: &Path, environment: &str) -> Result<Self> {
        let file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(dir.join(format!("meter_{environment}.csv")))?;
        Ok(Self::new(file))
    }
}

const MIB: i64 = 1 << 20;

impl<W: Write> Emitter for CsvEmitter<W> {
    fn on_starting(&mut self, _protocol: &str) -> Result<()> {
        Ok(())
    }

    fn on_error(&mut self, _protocol: &str, _size: usize, _err: &str) -> Result<()> {
        Ok(())
    }

    fn on_trial(&mut self, t: &Trial) -> Result<()> {
        if t.size < params::MIN_PERSISTED_SIZE {
            return Ok(());
        }
        self.out.write_record([
            t.protocol.clone(),
            t.kind.as_str().to_owned(),
            t.environment.clone(),
            t.files.to_string(),
            t.setup.as_micros().to_string(),
            t.first_byte.as_micros().to_string(),
            human_size(t.size),
            t.duration.as_micros().to_string(),
            format!("{:.6}", t.goodput()),
            t.resources.cpu_user.to_string(),
            t.resources.cpu_system.to_string(),
            t.resources.cpu_total.to_string(),
            (t.resources.memory_delta / MIB).to_string(),
            (t.resources.memory_used as i64 / MIB).to_string(),
        ])?;
        self.out.flush()?;
        Ok(())
    }

    fn on_complete(&mut self, _protocol: &str) -> Result<()> {
        Ok(())
    }
}

/// Forwards every event to each inner emitter in order.
#[derive(Default)]
pub struct Fanout {
    emitters: Vec<Box<dyn Emitter>>,
}

impl Fanout {
    /// Add an emitter.
    pub fn with(mut self, emitter: Box<dyn Emitter>) -> Self {
        self.emitters.push(emitter);
        self
    }
}

impl Emitter for Fanout {
    fn on_starting(&mut self, protocol: &str) -> Result<()> {
        self.emitters
            .iter_mut()
            .try_for_each(|e| e.on_starting(protocol))
    }

    fn on_error(&mut self, protocol: &str, size: usize, err: &str) -> Result<()> {
        self.emitters
            .iter_mut()
            .try_for_each(|e| e.on_error(protocol, size, err))
    }

    fn on_trial(&mut self, trial: &Trial) -> Result<()> {
        self.emitters.iter_mut().try_for_each(|e| e.on_trial(trial))
    }

    fn on_complete(&mut self, protocol: &str) -> Result<()> {
        self.emitters
            .iter_mut()
            .try_for_each(|e| e.on_complete(protocol))
    }
}
