use super::{Record, Recorder, RecorderFactory};
use anyhow::Result;
use std::{
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

/// Buffered recorder.
///
/// Keeps records in memory. Clones share the same buffer, which makes it
/// possible to inspect what a [`PlanningLogger`](crate::PlanningLogger) wrote.
#[derive(Default, Clone)]
pub struct BufferedRecorder {
    buf: Arc<Mutex<Vec<Record>>>,
    n_flushes: Arc<Mutex<usize>>,
}

impl BufferedRecorder {
    /// Construct the recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the records written so far.
    pub fn records(&self) -> Vec<Record> {
        match self.buf.lock() {
            Ok(buf) => buf.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Number of calls to [`Recorder::flush`].
    pub fn n_flushes(&self) -> usize {
        match self.n_flushes.lock() {
            Ok(n) => *n,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }
}

impl Recorder for BufferedRecorder {
    /// Write a [`Record`] to the buffer.
    fn write(&mut self, record: Record) {
        if let Ok(mut buf) = self.buf.lock() {
            buf.push(record);
        }
    }

    fn flush(&mut self) {
        if let Ok(mut n) = self.n_flushes.lock() {
            *n += 1;
        }
    }
}

/// Hands out [`BufferedRecorder`]s sharing one buffer and remembers the opened directories.
#[derive(Default, Clone)]
pub struct BufferedRecorderFactory {
    recorder: BufferedRecorder,
    logdirs: Arc<Mutex<Vec<PathBuf>>>,
}

impl BufferedRecorderFactory {
    /// Constructs a factory.
    pub fn new() -> Self {
        Self::default()
    }

    /// The recorder shared by every opened handle.
    pub fn recorder(&self) -> &BufferedRecorder {
        &self.recorder
    }

    /// Directories passed to [`RecorderFactory::open`].
    pub fn logdirs(&self) -> Vec<PathBuf> {
        self.logdirs
            .lock()
            .map(|dirs| dirs.clone())
            .unwrap_or_default()
    }
}

impl RecorderFactory for BufferedRecorderFactory {
    fn open(&self, logdir: &Path) -> Result<Box<dyn Recorder>> {
        if let Ok(mut dirs) = self.logdirs.lock() {
            dirs.push(logdir.to_path_buf());
        }
        Ok(Box::new(self.recorder.clone()))
    }
}
