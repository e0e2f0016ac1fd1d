use super::Record;
use anyhow::Result;
use std::path::Path;

/// Writes a record to an output destination with [`Recorder::write`].
pub trait Recorder {
    /// Write a record to the [`Recorder`].
    fn write(&mut self, record: Record);

    /// Flushes buffered records to the destination.
    fn flush(&mut self) {}

    /// Flushes and releases the destination.
    fn close(&mut self) {
        self.flush();
    }
}

/// Opens [`Recorder`]s.
///
/// Recorders are never shared between workers: each test run opens its own one.
pub trait RecorderFactory: Send + Sync {
    /// Opens a recorder writing into `logdir`.
    fn open(&self, logdir: &Path) -> Result<Box<dyn Recorder>>;
}
