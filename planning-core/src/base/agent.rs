//! Planning agent.
use super::{Env, SimulatedEnv};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{fmt, marker::PhantomData};

/// Tags of the supported planning algorithms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AgentKind {
    /// Rolling horizon evolutionary algorithm.
    #[serde(rename = "RHEA")]
    Rhea,

    /// Random mutation hill climbing.
    #[serde(rename = "RMHC")]
    Rmhc,

    /// Random shooting.
    #[serde(rename = "RANDOM")]
    Random,

    /// Monte Carlo tree search.
    #[serde(rename = "MCTS")]
    Mcts,
}

impl AgentKind {
    /// The tag used in file names and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            AgentKind::Rhea => "RHEA",
            AgentKind::Rmhc => "RMHC",
            AgentKind::Random => "RANDOM",
            AgentKind::Mcts => "MCTS",
        }
    }

    /// Returns `true` for evolutionary algorithms, whose evolution settings are
    /// stored with the agent parameters.
    pub fn is_evolutionary(&self) -> bool {
        matches!(self, AgentKind::Rhea | AgentKind::Rmhc)
    }
}

impl fmt::Display for AgentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A candidate solution kept by a population based planner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Elite<A> {
    /// Fitness of the candidate, i.e. the return predicted by the world model.
    pub fitness: f32,

    /// Planned actions.
    pub action_sequence: Vec<A>,
}

impl<A> Elite<A> {
    /// Constructs an elite.
    pub fn new(fitness: f32, action_sequence: Vec<A>) -> Self {
        Self {
            fitness,
            action_sequence,
        }
    }
}

/// The result of one planning step.
#[derive(Debug, Clone)]
pub struct Plan<A> {
    /// The action to be taken.
    pub action: A,

    /// Elites retained at this planning step, empty for agents without a population.
    pub elites: Vec<Elite<A>>,
}

impl<A> Plan<A> {
    /// A plan without elites.
    pub fn action_only(action: A) -> Self {
        Self {
            action,
            elites: vec![],
        }
    }
}

/// Settings of a planner used for naming runs and logging.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AgentSettings {
    /// Planning horizon.
    pub horizon: usize,

    /// Number of generations (or iterations) per planning step.
    pub max_generations: usize,

    /// Size of the population, `0` for agents without one.
    pub population_size: usize,

    /// Whether the action sequence is warm-started between planning steps.
    pub is_shift_buffer: bool,
}

/// A planner searching the next action in a simulated environment.
pub trait PlanningAgent<E: Env, S: SimulatedEnv<E>> {
    /// Configuration, persisted with sessions for reproducibility.
    type Config: Clone + Send + Sync + Serialize;

    /// Builds the agent.
    fn build(config: &Self::Config) -> Result<Self>
    where
        Self: Sized;

    /// Plans the next action from the given latent and hidden states.
    fn search(
        &mut self,
        sim: &mut S,
        latent: &S::Latent,
        hidden: &S::Hidden,
    ) -> Result<Plan<E::Act>>;

    /// Settings of the agent.
    fn settings(&self) -> AgentSettings;
}

/// A planner returning only an action, e.g. tree search.
///
/// Wrap it with [`PopulationFree`] to use it as a [`PlanningAgent`].
pub trait ActionSearch<E: Env, S: SimulatedEnv<E>> {
    /// Configuration.
    type Config: Clone + Send + Sync + Serialize;

    /// Builds the planner.
    fn build(config: &Self::Config) -> Result<Self>
    where
        Self: Sized;

    /// Plans the next action.
    fn search(&mut self, sim: &mut S, latent: &S::Latent, hidden: &S::Hidden)
        -> Result<E::Act>;

    /// Settings of the planner.
    fn settings(&self) -> AgentSettings;
}

/// Adapts an [`ActionSearch`] to [`PlanningAgent`] with empty elite populations.
pub struct PopulationFree<T, E, S> {
    inner: T,
    phantom: PhantomData<(E, S)>,
}

impl<T, E, S> PopulationFree<T, E, S> {
    /// Wraps a planner.
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            phantom: PhantomData,
        }
    }

    /// Returns the wrapped planner.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T, E, S> PlanningAgent<E, S> for PopulationFree<T, E, S>
where
    E: Env,
    S: SimulatedEnv<E>,
    T: ActionSearch<E, S>,
{
    type Config = T::Config;

    fn build(config: &Self::Config) -> Result<Self> {
        Ok(Self::new(T::build(config)?))
    }

    fn search(
        &mut self,
        sim: &mut S,
        latent: &S::Latent,
        hidden: &S::Hidden,
    ) -> Result<Plan<E::Act>> {
        let action = self.inner.search(sim, latent, hidden)?;
        Ok(Plan::action_only(action))
    }

    fn settings(&self) -> AgentSettings {
        self.inner.settings()
    }
}
