#![warn(missing_docs)]
//! Planning tests on the car racing environment.
//!
//! [`CarRacingSuite`] defines scenarios on a race track: whole tracks, straight
//! lines, turns, and recoveries from positions reached by scripted pre-actions.
//! Each scenario carries the rewards of a manual and of a random drive after its
//! step budget, used as baselines in trial summaries.
mod act;
mod suite;
pub use act::CarAction;
pub use suite::{CarRacingSuite, TEST_NAMES};
