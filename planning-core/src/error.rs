//! Errors in the library.
use std::path::PathBuf;
use thiserror::Error;

/// Errors in the library.
#[derive(Error, Debug)]
pub enum PlanningError {
    /// The requested session file does not exist.
    #[error("Planning session not found: {0:?}")]
    SessionNotFound(PathBuf),

    /// The session file could not be decoded.
    #[error("Failed to decode planning session {path:?}: {source}")]
    SessionFormat {
        /// Path of the session file.
        path: PathBuf,

        /// Underlying decoding error.
        #[source]
        source: serde_json::Error,
    },

    /// A test is not defined by the test suite.
    #[error("Unknown test: {0}")]
    UnknownTest(String),

    /// The per-trial lists of a test result differ in length.
    #[error("Inconsistent test result {name}: {actions} action histories, {rewards} rewards, {elites} elite sequences, {seeds} seeds")]
    InconsistentTestResult {
        /// Name of the test.
        name: String,
        /// Number of action histories.
        actions: usize,
        /// Number of rewards.
        rewards: usize,
        /// Number of elite sequences.
        elites: usize,
        /// Number of seeds.
        seeds: usize,
    },

    /// A test has no trial to choose from.
    #[error("No trial reward recorded for test {0}")]
    EmptyRewards(String),

    /// Record key error.
    #[error("Record key error: {0}")]
    RecordKeyError(String),

    /// Record value type error.
    #[error("Record value type error: {0}")]
    RecordValueTypeError(String),
}
