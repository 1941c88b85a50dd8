//! Append-only text sinks for walker trajectories and observable values.
//!
//! Both sinks are best effort: a path that cannot be opened or a failing
//! write is reported on the log channel and otherwise ignored, so file
//! trouble can never abort an integration.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Configuration of one sink: where to write and how often.
#[derive(Debug, Clone)]
pub(crate) struct SinkConfig {
    path: PathBuf,
    freq: u64,
}

impl SinkConfig {
    pub(crate) fn new(path: impl AsRef<Path>, freq: u64) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            freq: freq.max(1),
        }
    }

    /// Opens the sink for one sampling run.
    pub(crate) fn open(&self) -> Option<StepWriter> {
        match File::create(&self.path) {
            Ok(file) => Some(StepWriter {
                out: BufWriter::new(file),
                freq: self.freq,
            }),
            Err(err) => {
                log::warn!("cannot open sink {}: {}", self.path.display(), err);
                None
            }
        }
    }
}

/// An open sink writing `ridx v0 v1 ...` lines.
pub(crate) struct StepWriter {
    out: BufWriter<File>,
    freq: u64,
}

impl StepWriter {
    /// Whether step `ridx` is due for output.
    pub(crate) fn due(&self, ridx: u64) -> bool {
        ridx % self.freq == 0
    }

    /// Writes one line for step `ridx` with the given values.
    pub(crate) fn write_values<'a>(
        &mut self,
        ridx: u64,
        values: impl Iterator<Item = &'a [f64]>,
    ) {
        let mut line = ridx.to_string();
        for chunk in values {
            for v in chunk {
                line.push_str("   ");
                line.push_str(&v.to_string());
            }
        }
        line.push('\n');
        if let Err(err) = self.out.write_all(line.as_bytes()) {
            log::warn!("sink write failed: {}", err);
        }
    }

    /// Flushes buffered output at the end of a run.
    pub(crate) fn flush(&mut self) {
        if let Err(err) = self.out.flush() {
            log::warn!("sink flush failed: {}", err);
        }
    }
}
