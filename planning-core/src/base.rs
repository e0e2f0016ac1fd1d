//! Contracts of the collaborators driven by the planning tester.
mod agent;
mod env;
mod simulated_env;
mod step;
pub use agent::{ActionSearch, AgentKind, AgentSettings, Elite, Plan, PlanningAgent, PopulationFree};
pub use env::Env;
pub use simulated_env::SimulatedEnv;
pub use step::{SimStep, Step};
use serde::{de::DeserializeOwned, Serialize};
use std::fmt::Debug;

/// An action of the environment.
///
/// Actions are recorded in trial histories, persisted in sessions and sent back
/// from worker threads, hence the serialization and thread-safety bounds.
pub trait Act: Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static {}

impl<T> Act for T where T: Clone + Debug + Serialize + DeserializeOwned + Send + Sync + 'static {}
