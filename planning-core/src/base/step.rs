//! Environment step.
use super::{Env, SimulatedEnv};
use crate::record::Record;

/// Represents an observation, reward and termination flag emitted by [`Env::step`].
pub struct Step<E: Env> {
    /// Observation.
    pub obs: E::Obs,

    /// Reward.
    pub reward: f32,

    /// Flag denoting if the episode is terminated.
    pub is_done: bool,

    /// Information defined by the environment.
    pub info: Record,
}

impl<E: Env> Step<E> {
    /// Constructs a [`Step`] object.
    pub fn new(obs: E::Obs, reward: f32, is_done: bool, info: Record) -> Self {
        Step {
            obs,
            reward,
            is_done,
            info,
        }
    }
}

/// Output of a step of the learned world model.
pub struct SimStep<E: Env, S: SimulatedEnv<E>> {
    /// Next latent state.
    pub latent: S::Latent,

    /// Predicted reward.
    pub reward: f32,

    /// Predicted termination.
    pub is_done: bool,

    /// Next hidden state of the recurrent model.
    pub hidden: S::Hidden,
}
