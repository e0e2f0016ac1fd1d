//! Recorder writing planning test metrics to TFRecord.
use anyhow::Result;
use log::warn;
use planning_core::record::{Record, RecordValue, Recorder, RecorderFactory};
use std::{
    fs::{self, File, OpenOptions},
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};
use tensorboard_rs::summary_writer::SummaryWriter;

/// File receiving text values, next to the event files.
pub const TEXT_SUMMARIES_FILE: &str = "text_summaries.txt";

/// Write records to TFRecord.
///
/// Text values are appended to [`TEXT_SUMMARIES_FILE`] as `step\ttag\ttext` lines.
pub struct TensorboardRecorder {
    writer: SummaryWriter,
    logdir: PathBuf,
    text_writer: Option<BufWriter<File>>,
    step_key: String,
}

impl TensorboardRecorder {
    /// Construct a [`TensorboardRecorder`].
    ///
    /// TFRecord will be stored in `logdir`.
    pub fn new<P: AsRef<Path>>(logdir: P) -> Self {
        Self {
            writer: SummaryWriter::new(&logdir),
            logdir: logdir.as_ref().to_path_buf(),
            text_writer: None,
            step_key: "step".to_string(),
        }
    }

    fn write_text(&mut self, tag: &str, text: &str, step: usize) -> Result<()> {
        if self.text_writer.is_none() {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(self.logdir.join(TEXT_SUMMARIES_FILE))?;
            self.text_writer = Some(BufWriter::new(file));
        }
        if let Some(w) = self.text_writer.as_mut() {
            writeln!(w, "{}\t{}\t{}", step, tag, text.replace('\n', " "))?;
        }
        Ok(())
    }
}

impl Recorder for TensorboardRecorder {
    /// Write a given [Record] into a TFRecord.
    ///
    /// Scalars go to the event file, strings to [`TEXT_SUMMARIES_FILE`].
    fn write(&mut self, record: Record) {
        let step = match record.get_scalar(&self.step_key) {
            Ok(v) => v as usize,
            Err(e) => {
                warn!("Record without step is discarded: {}", e);
                return;
            }
        };

        for (k, v) in record.iter() {
            if *k == self.step_key {
                continue;
            }
            match v {
                RecordValue::Scalar(v) => self.writer.add_scalar(k, *v, step),
                RecordValue::String(s) => {
                    if let Err(e) = self.write_text(k, s, step) {
                        warn!("Failed to write text of {}: {}", k, e);
                    }
                }
            }
        }
    }

    fn flush(&mut self) {
        self.writer.flush();
        if let Some(w) = self.text_writer.as_mut() {
            if let Err(e) = w.flush() {
                warn!("Failed to flush text summaries: {}", e);
            }
        }
    }
}

/// Opens a [`TensorboardRecorder`] for each test run.
#[derive(Debug, Clone, Default)]
pub struct TensorboardRecorderFactory;

impl TensorboardRecorderFactory {
    /// Constructs a factory.
    pub fn new() -> Self {
        Self
    }
}

impl RecorderFactory for TensorboardRecorderFactory {
    fn open(&self, logdir: &Path) -> Result<Box<dyn Recorder>> {
        fs::create_dir_all(logdir)?;
        Ok(Box::new(TensorboardRecorder::new(logdir)))
    }
}
