//! Argument bundle of a test.
use crate::Elite;

/// Arguments of a test, shared by all its trials.
///
/// A bundle carrying an [`TestArgs::action_history`] is replayed instead of planned.
#[derive(Debug, Clone, PartialEq)]
pub struct TestArgs<A> {
    /// Label of the test used in logs and summaries.
    pub test_name: String,

    /// Seed of the environment. The environment generates one if `None`.
    pub custom_seed: Option<u64>,

    /// Actions applied before planning starts, to put the agent in a scenario state.
    pub pre_actions: Option<Vec<A>>,

    /// Scenario specific start offset, applied when a custom seed is given.
    pub start_track: usize,

    /// Step budget of a trial.
    pub optimal_steps: usize,

    /// Reward of a manual drive after [`TestArgs::optimal_steps`].
    pub optimal_reward: f32,

    /// Reward of a random drive after [`TestArgs::optimal_steps`].
    pub random_reward: f32,

    /// Progress target of the scenario, e.g. the number of track tiles.
    pub tiles_to_complete: usize,

    /// Recorded actions to be replayed.
    pub action_history: Option<Vec<A>>,

    /// Recorded elites of the replayed actions.
    pub elites: Option<Vec<Vec<Elite<A>>>>,

    /// Recorded seed of the replayed trial.
    ///
    /// Only resets the environment. The start offset is still applied only if
    /// [`TestArgs::custom_seed`] is given, as in the recorded trial.
    replay_seed: Option<u64>,
}

impl<A> TestArgs<A> {
    /// Constructs arguments with the given label and step budget.
    pub fn new(test_name: impl Into<String>, optimal_steps: usize) -> Self {
        Self {
            test_name: test_name.into(),
            custom_seed: None,
            pre_actions: None,
            start_track: 1,
            optimal_steps,
            optimal_reward: 0.0,
            random_reward: 0.0,
            tiles_to_complete: 0,
            action_history: None,
            elites: None,
            replay_seed: None,
        }
    }

    /// Sets the seed.
    pub fn custom_seed(mut self, v: Option<u64>) -> Self {
        self.custom_seed = v;
        self
    }

    /// Sets the actions applied before planning.
    pub fn pre_actions(mut self, v: Vec<A>) -> Self {
        self.pre_actions = Some(v);
        self
    }

    /// Sets the start offset.
    pub fn start_track(mut self, v: usize) -> Self {
        self.start_track = v;
        self
    }

    /// Sets the baselines.
    pub fn baselines(mut self, optimal_reward: f32, random_reward: f32) -> Self {
        self.optimal_reward = optimal_reward;
        self.random_reward = random_reward;
        self
    }

    /// Sets the progress target.
    pub fn tiles_to_complete(mut self, v: usize) -> Self {
        self.tiles_to_complete = v;
        self
    }

    /// Injects a recorded trial to be replayed.
    pub fn replay(
        mut self,
        action_history: Vec<A>,
        elites: Vec<Vec<Elite<A>>>,
        seed: Option<u64>,
    ) -> Self {
        self.action_history = Some(action_history);
        self.elites = Some(elites);
        self.replay_seed = seed;
        self
    }

    /// Seed resetting the environment of a replay.
    ///
    /// The recorded seed, or [`TestArgs::custom_seed`] for records without one.
    pub fn replay_seed(&self) -> Option<u64> {
        self.replay_seed.or(self.custom_seed)
    }

    /// Returns `true` if the bundle carries a recorded action history.
    pub fn is_replay(&self) -> bool {
        self.action_history.is_some()
    }
}
