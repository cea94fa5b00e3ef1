//! Reference host boundary: one JSON object per fixture update
//!
//! Stands in for a scene host. Each line on the writer is a serialized
//! [`FixtureUpdate`]; rotation writes appear in apply order via the
//! `released` list followed by `pan` and `tilt`.

use beamsync_core::{FixtureUpdate, SyncOutcome, SyncSink};
use std::io::Write;
use tracing::warn;

pub struct JsonLinesSink<W: Write> {
    writer: W,
    written: u64,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer, written: 0 }
    }

    /// Number of updates written so far
    pub fn written(&self) -> u64 {
        self.written
    }

    pub fn flush(&mut self) {
        if let Err(e) = self.writer.flush() {
            warn!("Failed to flush fixture updates: {}", e);
        }
    }

    fn write_line(&mut self, update: &FixtureUpdate) -> anyhow::Result<()> {
        serde_json::to_writer(&mut self.writer, update)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }
}

impl<W: Write> SyncSink for JsonLinesSink<W> {
    fn apply(&mut self, update: &FixtureUpdate) -> SyncOutcome {
        match self.write_line(update) {
            Ok(()) => self.written += 1,
            Err(e) => warn!("Failed to write update for {}: {}", update.fixture, e),
        }
        SyncOutcome::Applied
    }
}
