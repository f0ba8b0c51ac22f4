// src/logging.rs
//
// Episode telemetry sinks.
// - EpisodeSink: trait the cross-product logs committed steps through
// - NoopSink:    discards all records (the default)
// - JsonlSink:   writes one JSON line per step for offline analysis

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::events::EventSet;
use crate::machine::StateId;

/// One committed cross-product step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    /// Step index within the episode (1-based).
    pub step: u64,
    pub machine_state: StateId,
    pub counters: Vec<i64>,
    pub events: EventSet,
    pub reward: f64,
    pub terminated: bool,
    pub truncated: bool,
}

/// Abstract sink for per-step telemetry. Sinks observe committed steps
/// only; they cannot influence the episode.
pub trait EpisodeSink {
    fn log_step(&mut self, record: &StepRecord);
}

/// Sink that discards all records.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl EpisodeSink for NoopSink {
    fn log_step(&mut self, _record: &StepRecord) {
        // intentionally no-op
    }
}

/// JSONL file sink: each step is one JSON object on its own line.
pub struct JsonlSink {
    writer: BufWriter<File>,
}

impl JsonlSink {
    /// Create a new sink writing to `path`.
    pub fn create<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(JsonlSink {
            writer: BufWriter::new(file),
        })
    }

    /// Flush buffered records to disk. Also happens on drop.
    pub fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

impl EpisodeSink for JsonlSink {
    fn log_step(&mut self, record: &StepRecord) {
        // Telemetry is best-effort: a failed write never aborts a step.
        if let Ok(line) = serde_json::to_string(record) {
            let _ = writeln!(self.writer, "{line}");
        }
    }
}
