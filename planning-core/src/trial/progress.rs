//! Success metrics of a running trial.
use super::TestArgs;
use crate::util::{reward_diff_percentage, round_to};
use std::time::Duration;

/// Running success metrics of one trial.
///
/// The value is replaced at every step by [`TrialProgress::update`], both when
/// planning and when replaying.
#[derive(Debug, Clone, PartialEq)]
pub struct TrialProgress {
    /// Label of the test.
    pub test_name: String,

    /// The highest cumulative reward observed, starting from zero.
    pub max_reward: f32,

    /// Whether the progress target has been reached.
    pub test_success: bool,

    /// Steps with a positive reward, counted up to one past the target.
    pub tiles: usize,

    /// Steps taken when the target was first reached, zero otherwise.
    pub steps_at_success: usize,

    /// Cumulative reward while the target is reached.
    pub reward_at_success: f32,

    /// Cumulative reward after exactly [`TrialProgress::optimal_steps`] steps.
    pub reward_at_optimum_steps: f32,

    /// Step budget.
    pub optimal_steps: usize,

    /// Manual drive baseline.
    pub optimal_reward: f32,

    /// Random drive baseline.
    pub random_reward: f32,

    /// Progress target.
    pub tiles_to_complete: usize,
}

impl TrialProgress {
    /// Initial metrics of a trial of the given test.
    pub fn new<A>(args: &TestArgs<A>) -> Self {
        Self {
            test_name: args.test_name.clone(),
            max_reward: 0.0,
            test_success: false,
            tiles: 0,
            steps_at_success: 0,
            reward_at_success: 0.0,
            reward_at_optimum_steps: 0.0,
            optimal_steps: args.optimal_steps,
            optimal_reward: args.optimal_reward,
            random_reward: args.random_reward,
            tiles_to_complete: args.tiles_to_complete,
        }
    }

    /// Metrics after a step with `reward`, given the cumulative reward and steps so far.
    ///
    /// Success is evaluated on the tile count before this step.
    pub fn update(self, reward: f32, total_reward: f32, steps_ran: usize) -> Self {
        let tiles = self.tiles;
        let target = self.tiles_to_complete;
        let reached = tiles == target;

        let (test_success, steps_at_success) = if tiles <= target {
            let steps = match (reached, self.test_success) {
                (true, true) => self.steps_at_success,
                (true, false) => steps_ran,
                (false, _) => 0,
            };
            (reached, steps)
        } else {
            (self.test_success, self.steps_at_success)
        };

        Self {
            max_reward: if total_reward > self.max_reward {
                total_reward
            } else {
                self.max_reward
            },
            tiles: if reward > 0.0 && tiles <= target {
                tiles + 1
            } else {
                tiles
            },
            test_success,
            steps_at_success,
            reward_at_success: if reached {
                total_reward
            } else {
                self.reward_at_success
            },
            reward_at_optimum_steps: if steps_ran == self.optimal_steps {
                total_reward
            } else {
                self.reward_at_optimum_steps
            },
            ..self
        }
    }

    /// Human readable summary of a trial.
    ///
    /// `trial` and `elapsed` are omitted for replayed trials.
    pub fn summary(
        &self,
        trial: Option<usize>,
        seed: Option<u64>,
        elapsed: Option<Duration>,
        total_reward: f32,
        steps_ran: usize,
    ) -> String {
        let reward_at_optimum_steps = round_to(self.reward_at_optimum_steps, 2);
        let optimal_reward_diff =
            reward_diff_percentage(reward_at_optimum_steps, self.optimal_reward);
        let random_reward_diff =
            reward_diff_percentage(reward_at_optimum_steps, self.random_reward);

        let trial_str = trial.map_or(String::new(), |t| format!("Planning trial: {} | ", t));
        let elapsed_str =
            elapsed.map_or(String::new(), |e| format!("Elapsed time: {}s | ", e.as_secs()));
        let seed_str = seed.map_or("None".to_string(), |s| s.to_string());
        let success_str = if self.test_success {
            format!(
                "Test success: true | Reward at success: {} | Steps on success: {}",
                round_to(self.reward_at_success, 2),
                self.steps_at_success
            )
        } else {
            "Test success: false".to_string()
        };

        format!(
            "{}: {}{}seed: {} | Total reward: {} | Max reward: {} | Steps on exit: {}\n\
             | {}\n\
             | Agent reward at optimal step {} : {}\n\
             | Manual drive reward at step {} : {} | Reward Diff: {} %\n\
             | Random drive reward at step {} : {} | Reward Diff: {} %",
            self.test_name,
            trial_str,
            elapsed_str,
            seed_str,
            round_to(total_reward, 2),
            round_to(self.max_reward, 2),
            steps_ran,
            success_str,
            self.optimal_steps,
            reward_at_optimum_steps,
            self.optimal_steps,
            self.optimal_reward,
            optimal_reward_diff,
            self.optimal_steps,
            self.random_reward,
            random_reward_diff,
        )
    }
}

/// Counts consecutive non-positive rewards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NegativeStreak {
    count: usize,
    limit: usize,
}

impl NegativeStreak {
    /// A counter exhausted after `limit` consecutive non-positive rewards.
    pub fn new(limit: usize) -> Self {
        Self { count: 0, limit }
    }

    /// Resets on a positive reward, increments otherwise.
    pub fn observe(&mut self, reward: f32) {
        self.count = if reward > 0.0 { 0 } else { self.count + 1 };
    }

    /// Current length of the streak.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Returns `true` when the streak reached the limit.
    pub fn is_exhausted(&self) -> bool {
        self.count >= self.limit
    }
}
