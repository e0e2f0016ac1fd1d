//! Types and traits for recording telemetry of planning tests.
//!
//! A [`Record`] is a set of key-value pairs written to a [`Recorder`]. The
//! [`PlanningLogger`](crate::PlanningLogger) builds records for trial rewards,
//! trial summaries and agent settings, and writes them to a recorder opened with
//! a [`RecorderFactory`] at the beginning of each test.
//!
//! ```rust
//! use planning_core::record::{Record, RecordValue};
//!
//! let mut record = Record::from_scalar("step", 3.0);
//! record.insert("forward/Total reward per trial", RecordValue::Scalar(42.0));
//! assert_eq!(record.get_scalar("step").unwrap(), 3.0);
//! ```
mod base;
mod buffered_recorder;
mod null_recorder;
mod recorder;

pub use base::{Record, RecordValue};
pub use buffered_recorder::{BufferedRecorder, BufferedRecorderFactory};
pub use null_recorder::{NullRecorder, NullRecorderFactory};
pub use recorder::{Recorder, RecorderFactory};
