//! Persisted results of a planning test session.
mod store;
use crate::{error::PlanningError, Act, Elite};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
pub use store::{SessionStore, SESSION_EXTENSION};

/// Results of the trials of one named test.
///
/// The per-trial lists are indexed by trial. A session file stores it as the
/// tuple `(name, action_histories, total_rewards, elites, seeds)`; files written
/// before seeds were recorded lack the last element and are read with `None`
/// seeds.
#[derive(Debug, Clone, PartialEq)]
pub struct TestResult<A> {
    /// Name of the test.
    pub name: String,

    /// Actions taken in each trial.
    pub action_histories: Vec<Vec<A>>,

    /// Total reward of each trial.
    pub total_rewards: Vec<f32>,

    /// Elite populations of each step of each trial.
    pub elites: Vec<Vec<Vec<Elite<A>>>>,

    /// Seed used to reset the environment in each trial.
    pub seeds: Vec<Option<u64>>,
}

/// The best trial of a [`TestResult`].
#[derive(Debug, Clone, PartialEq)]
pub struct BestTrial<A> {
    /// 1-indexed trial number.
    pub trial: usize,

    /// Actions taken in the trial.
    pub action_history: Vec<A>,

    /// Total reward of the trial.
    pub reward: f32,

    /// Elite populations of the trial.
    pub elites: Vec<Vec<Elite<A>>>,

    /// Seed of the trial.
    pub seed: Option<u64>,
}

impl<A: Act> TestResult<A> {
    /// An empty result.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            action_histories: vec![],
            total_rewards: vec![],
            elites: vec![],
            seeds: vec![],
        }
    }

    /// Appends the outcome of a trial.
    pub fn push(
        &mut self,
        action_history: Vec<A>,
        total_reward: f32,
        elites: Vec<Vec<Elite<A>>>,
        seed: Option<u64>,
    ) {
        self.action_histories.push(action_history);
        self.total_rewards.push(total_reward);
        self.elites.push(elites);
        self.seeds.push(seed);
    }

    /// Number of trials.
    pub fn len(&self) -> usize {
        self.total_rewards.len()
    }

    /// Returns `true` if no trial is recorded.
    pub fn is_empty(&self) -> bool {
        self.total_rewards.is_empty()
    }

    /// Checks that every per-trial list has one entry per trial.
    pub fn validate(&self) -> Result<(), PlanningError> {
        let n = self.total_rewards.len();
        if self.action_histories.len() != n || self.elites.len() != n || self.seeds.len() != n {
            return Err(PlanningError::InconsistentTestResult {
                name: self.name.clone(),
                actions: self.action_histories.len(),
                rewards: n,
                elites: self.elites.len(),
                seeds: self.seeds.len(),
            });
        }
        Ok(())
    }

    /// The highest total reward among the trials.
    pub fn best_reward(&self) -> Option<f32> {
        self.total_rewards
            .iter()
            .copied()
            .fold(None, |best, r| match best {
                Some(b) if b >= r => Some(b),
                _ => Some(r),
            })
    }

    /// The trial with the highest total reward, the first one on ties.
    pub fn best_trial(&self) -> Result<BestTrial<A>, PlanningError> {
        self.validate()?;
        let mut index_max: Option<usize> = None;
        for (i, r) in self.total_rewards.iter().enumerate() {
            match index_max {
                Some(j) if self.total_rewards[j] >= *r => {}
                _ => index_max = Some(i),
            }
        }
        let ix = index_max.ok_or_else(|| PlanningError::EmptyRewards(self.name.clone()))?;
        Ok(BestTrial {
            trial: ix + 1,
            action_history: self.action_histories[ix].clone(),
            reward: self.total_rewards[ix],
            elites: self.elites[ix].clone(),
            seed: self.seeds[ix],
        })
    }
}

/// Shapes of a test result in session files.
#[derive(Deserialize)]
#[serde(untagged)]
#[serde(bound = "A: Act")]
enum TestResultRecord<A> {
    WithSeeds(
        String,
        Vec<Vec<A>>,
        Vec<f32>,
        Vec<Vec<Vec<Elite<A>>>>,
        Vec<Option<u64>>,
    ),
    WithoutSeeds(String, Vec<Vec<A>>, Vec<f32>, Vec<Vec<Vec<Elite<A>>>>),
}

impl<A> From<TestResultRecord<A>> for TestResult<A> {
    fn from(record: TestResultRecord<A>) -> Self {
        match record {
            TestResultRecord::WithSeeds(name, action_histories, total_rewards, elites, seeds) => {
                Self {
                    name,
                    action_histories,
                    total_rewards,
                    elites,
                    seeds,
                }
            }
            TestResultRecord::WithoutSeeds(name, action_histories, total_rewards, elites) => {
                let seeds = vec![None; total_rewards.len()];
                Self {
                    name,
                    action_histories,
                    total_rewards,
                    elites,
                    seeds,
                }
            }
        }
    }
}

impl<A: Act> Serialize for TestResult<A> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        (
            &self.name,
            &self.action_histories,
            &self.total_rewards,
            &self.elites,
            &self.seeds,
        )
            .serialize(serializer)
    }
}

impl<'de, A: Act> Deserialize<'de> for TestResult<A> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        TestResultRecord::deserialize(deserializer).map(Into::into)
    }
}

/// Sum over tests of the best total reward among the trials of each test.
pub fn total_best_reward<A: Act>(test_results: &BTreeMap<String, TestResult<A>>) -> f32 {
    test_results
        .values()
        .filter_map(|result| result.best_reward())
        .sum()
}

/// A planning test session, the unit of persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(bound = "A: Act")]
pub struct Session<A> {
    /// Tag of the planning agent.
    pub agent_type: String,

    /// Parameters of the planning agent.
    pub agent_params: serde_json::Value,

    /// Results keyed by test name.
    pub test_results: BTreeMap<String, TestResult<A>>,
}

impl<A: Act> Session<A> {
    /// Sum over tests of the best trial reward.
    pub fn total_best_reward(&self) -> f32 {
        total_best_reward(&self.test_results)
    }
}
