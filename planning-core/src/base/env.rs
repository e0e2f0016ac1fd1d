//! Environment.
use super::{Act, Step};
use anyhow::Result;

/// Represents the real environment a trial is run against.
///
/// Implementations typically wrap a simulator living outside of Rust. They are
/// assumed to be non-reentrant: every worker builds its own instance from
/// [`Env::Config`] and never shares it.
pub trait Env {
    /// Configurations.
    type Config: Clone + Send + Sync;

    /// Observation of the environment.
    type Obs;

    /// Action of the environment.
    type Act: Act;

    /// Builds an environment.
    fn build(config: &Self::Config) -> Result<Self>
    where
        Self: Sized;

    /// Resets the environment.
    ///
    /// If `seed` is `None`, the environment generates one. The seed actually used
    /// is available with [`Env::seed`] after this call.
    fn reset(&mut self, seed: Option<u64>) -> Result<Self::Obs>;

    /// The random seed used by the last reset.
    fn seed(&self) -> Option<u64>;

    /// Forces a scenario specific starting configuration, e.g. a position on a track.
    ///
    /// The default implementation ignores the request.
    #[allow(unused_variables)]
    fn set_start(&mut self, start_track: usize) -> Result<()> {
        Ok(())
    }

    /// Performs an environment step.
    ///
    /// With `ignore_is_done`, the environment keeps accepting steps after it
    /// reported a terminal state.
    fn step(&mut self, act: &Self::Act, ignore_is_done: bool) -> Result<Step<Self>>
    where
        Self: Sized;

    /// The cumulative reward since the last reset.
    fn cumulative_reward(&self) -> f32;

    /// Renders the current state.
    fn render(&mut self) -> Result<()> {
        Ok(())
    }

    /// Releases resources held by the environment.
    fn close(&mut self) {}
}
