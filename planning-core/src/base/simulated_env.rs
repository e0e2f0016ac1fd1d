//! Simulated environment.
use super::{Env, SimStep};
use anyhow::Result;

/// A learned world model which can be rolled out in place of the real environment.
///
/// The model is made of an encoder, mapping observations of `E` to latent states,
/// and a recurrent dynamics model carrying a hidden state between steps.
pub trait SimulatedEnv<E: Env> {
    /// Configurations, typically paths of the trained weights.
    type Config: Clone + Send + Sync;

    /// Compressed representation of an observation.
    type Latent: Clone;

    /// Recurrent memory of the dynamics model.
    type Hidden: Clone;

    /// Builds the world model.
    fn build(config: &Self::Config) -> Result<Self>
    where
        Self: Sized;

    /// Resets the internal state of the model.
    fn reset(&mut self) -> Result<()>;

    /// Encodes an observation of the real environment.
    fn encode(&mut self, obs: &E::Obs) -> Result<Self::Latent>;

    /// The initial hidden state.
    fn hidden_zeros(&self) -> Self::Hidden;

    /// Predicts the next latent state, reward and termination.
    ///
    /// `is_simulation_real_environment` is set when the step mirrors a step taken
    /// in the real environment.
    fn step(
        &mut self,
        act: &E::Act,
        hidden: &Self::Hidden,
        latent: &Self::Latent,
        is_simulation_real_environment: bool,
    ) -> Result<SimStep<E, Self>>
    where
        Self: Sized;

    /// Renders the predicted observation.
    fn render(&mut self) -> Result<()> {
        Ok(())
    }
}
