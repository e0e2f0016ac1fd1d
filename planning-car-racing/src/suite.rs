//! Scenarios on the car racing track.
use crate::CarAction;
use anyhow::Result;
use log::debug;
use planning_core::{error::PlanningError, TestArgs, TestSuite};

/// Keys of the tests, in the order they are run.
pub const TEST_NAMES: [&str; 12] = [
    "planning_whole_random_track",
    "planning_specific_track",
    "planning_whole_track_no_right_turns_test",
    "planning_forward_left_side",
    "planning_forward_right_side",
    "planning_head_to_grass_right",
    "planning_head_to_grass_left",
    "planning_forward_test",
    "planning_left_turn_test",
    "planning_right_turn_test",
    "planning_s_turn_test",
    "planning_u_turn_test",
];

/// Seed of the track most scenarios are defined on.
const TRACK_SEED: u64 = 9214;

/// Concatenates runs of a repeated action.
fn repeat(runs: &[(usize, [f32; 3])]) -> Vec<CarAction> {
    runs.iter()
        .flat_map(|(n, act)| std::iter::repeat(CarAction(*act)).take(*n))
        .collect()
}

/// Scenario on a whole track.
fn whole_track(name: &str, random_reward: f32, seed: Option<u64>) -> TestArgs<CarAction> {
    TestArgs::new(name, 1000)
        .baselines(900.0, random_reward)
        .tiles_to_complete(1200)
        .custom_seed(seed)
        .start_track(1)
}

/// Scenario on a section of the track of [`TRACK_SEED`].
fn section(
    name: &str,
    optimal_steps: usize,
    baselines: (f32, f32),
    tiles: usize,
    start_track: usize,
) -> TestArgs<CarAction> {
    TestArgs::new(name, optimal_steps)
        .baselines(baselines.0, baselines.1)
        .tiles_to_complete(tiles)
        .custom_seed(Some(TRACK_SEED))
        .start_track(start_track)
}

/// The straight section at the start of the track of [`TRACK_SEED`].
fn forward_section(name: &str) -> TestArgs<CarAction> {
    section(name, 100, (66.0, -7.0), 25, 25)
}

fn args_of(key: &str) -> Option<TestArgs<CarAction>> {
    let args = match key {
        "planning_whole_random_track" => whole_track("planning_whole_random_track", -3.0, None),
        "planning_specific_track" => whole_track(
            &format!("planning_specific_track - seed: {}", TRACK_SEED),
            -3.0,
            Some(TRACK_SEED),
        ),
        "planning_whole_track_no_right_turns_test" => {
            whole_track("planning_whole_track_no_right_turns_test", -32.0, Some(30))
        }
        "planning_forward_left_side" => forward_section(key).pre_actions(repeat(&[
            (30, [-1.0, 0.1, 0.0]),
            (5, [1.0, 0.1, 0.0]),
            (35, [0.15, 0.1, 0.0]),
            (30, [0.0, 0.1, 0.0]),
        ])),
        "planning_forward_right_side" => forward_section(key).pre_actions(repeat(&[
            (25, [1.0, 0.1, 0.0]),
            (5, [-1.0, 0.1, 0.0]),
            (35, [-0.15, 0.1, 0.0]),
            (30, [0.0, 0.1, 0.0]),
        ])),
        "planning_head_to_grass_right" => forward_section(key).pre_actions(repeat(&[
            (25, [-1.0, 0.1, 0.0]),
            (30, [0.15, 0.1, 0.0]),
            (20, [-0.05, 0.1, 0.0]),
            (15, [1.0, 0.0, 0.0]),
            (10, [0.1, 0.0, 0.01]),
        ])),
        "planning_head_to_grass_left" => forward_section(key).pre_actions(repeat(&[
            (25, [1.0, 0.1, 0.0]),
            (5, [-1.0, 0.1, 0.0]),
            (30, [-0.15, 0.1, 0.0]),
            (25, [0.05, 0.1, 0.0]),
            (15, [-1.0, 0.0, 0.0]),
            (20, [-0.1, 0.0, 0.01]),
        ])),
        "planning_forward_test" => forward_section(key),
        "planning_left_turn_test" => section(key, 100, (23.0, -3.0), 10, 14),
        "planning_right_turn_test" => section(key, 100, (33.0, -3.0), 11, 222).custom_seed(Some(2)),
        "planning_s_turn_test" => section(key, 100, (43.0, -3.0), 16, 250),
        "planning_u_turn_test" => section(key, 280, (40.0, -5.0), 15, 103),
        _ => return None,
    };
    Some(args)
}

/// The car racing test suite.
///
/// Scenarios other than the whole random track reset the environment with a
/// fixed seed and start the car at a tile of the track, see
/// [`Env::set_start`](planning_core::Env::set_start). Start tile `1` is the
/// default start of the track.
#[derive(Debug, Clone)]
pub struct CarRacingSuite {
    keys: Vec<&'static str>,
}

impl Default for CarRacingSuite {
    fn default() -> Self {
        Self {
            keys: TEST_NAMES.to_vec(),
        }
    }
}

impl CarRacingSuite {
    /// The suite of all tests.
    pub fn new() -> Self {
        Self::default()
    }

    /// The suite of the given tests, in the order of [`TEST_NAMES`].
    pub fn with_tests(names: &[&str]) -> Result<Self> {
        if let Some(name) = names.iter().find(|name| !TEST_NAMES.contains(*name)) {
            return Err(PlanningError::UnknownTest(name.to_string()).into());
        }
        let keys: Vec<_> = TEST_NAMES
            .iter()
            .copied()
            .filter(|key| names.contains(key))
            .collect();
        debug!("Car racing tests: {:?}", keys);
        Ok(Self { keys })
    }

    /// Keys of the tests of the suite.
    pub fn keys(&self) -> &[&'static str] {
        &self.keys
    }
}

impl TestSuite<CarAction> for CarRacingSuite {
    fn tests(&self) -> Vec<(String, TestArgs<CarAction>)> {
        self.keys
            .iter()
            .filter_map(|key| args_of(key).map(|args| (key.to_string(), args)))
            .collect()
    }

    fn test(&self, key: &str) -> Option<TestArgs<CarAction>> {
        if self.keys.iter().any(|k| *k == key) {
            args_of(key)
        } else {
            None
        }
    }
}
