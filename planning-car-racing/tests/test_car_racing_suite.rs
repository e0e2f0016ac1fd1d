use anyhow::Result;
use planning_car_racing::{CarAction, CarRacingSuite};
use planning_core::{
    record::{NullRecorderFactory, Record},
    AgentSettings, Elite, Env, Plan, PlanningAgent, PlanningTester, SimStep, SimulatedEnv, Step,
    TesterConfig,
};
use serde::Serialize;
use std::sync::Arc;
use tempdir::TempDir;
use test_log::test;

/// A straight track rewarding gas, with a start tile.
struct StraightTrack {
    seed: Option<u64>,
    tile: usize,
    cumulative_reward: f32,
}

impl Env for StraightTrack {
    type Config = ();
    type Obs = usize;
    type Act = CarAction;

    fn build(_config: &()) -> Result<Self> {
        Ok(Self {
            seed: None,
            tile: 0,
            cumulative_reward: 0.0,
        })
    }

    fn reset(&mut self, seed: Option<u64>) -> Result<usize> {
        self.seed = Some(seed.unwrap_or(7));
        self.tile = 0;
        self.cumulative_reward = 0.0;
        Ok(self.tile)
    }

    fn seed(&self) -> Option<u64> {
        self.seed
    }

    fn set_start(&mut self, start_track: usize) -> Result<()> {
        self.tile = start_track;
        Ok(())
    }

    fn step(&mut self, act: &CarAction, _ignore_is_done: bool) -> Result<Step<Self>> {
        let reward = act.gas() - 0.5 * act.steering().abs() - 0.1;
        self.tile += 1;
        self.cumulative_reward += reward;
        Ok(Step::new(self.tile, reward, false, Record::empty()))
    }

    fn cumulative_reward(&self) -> f32 {
        self.cumulative_reward
    }
}

/// A world model predicting the reward of the track.
struct TrackModel;

impl SimulatedEnv<StraightTrack> for TrackModel {
    type Config = ();
    type Latent = usize;
    type Hidden = ();

    fn build(_config: &()) -> Result<Self> {
        Ok(Self)
    }

    fn reset(&mut self) -> Result<()> {
        Ok(())
    }

    fn encode(&mut self, obs: &usize) -> Result<usize> {
        Ok(*obs)
    }

    fn hidden_zeros(&self) -> Self::Hidden {}

    fn step(
        &mut self,
        act: &CarAction,
        _hidden: &(),
        latent: &usize,
        _is_simulation_real_environment: bool,
    ) -> Result<SimStep<StraightTrack, Self>> {
        Ok(SimStep {
            latent: latent + 1,
            reward: act.gas() - 0.5 * act.steering().abs() - 0.1,
            is_done: false,
            hidden: (),
        })
    }
}

#[derive(Clone, Serialize)]
struct HillClimbingConfig {
    horizon: usize,
}

/// Picks the best of a few fixed actions, the tile parity alternating the throttle.
struct HillClimbing {
    config: HillClimbingConfig,
}

impl PlanningAgent<StraightTrack, TrackModel> for HillClimbing {
    type Config = HillClimbingConfig;

    fn build(config: &Self::Config) -> Result<Self> {
        Ok(Self {
            config: config.clone(),
        })
    }

    fn search(
        &mut self,
        sim: &mut TrackModel,
        latent: &usize,
        hidden: &(),
    ) -> Result<Plan<CarAction>> {
        let gas = if latent % 2 == 0 { 1.0 } else { 0.5 };
        let mut elites = vec![];
        for act in [CarAction::new(-1.0, gas, 0.0), CarAction::new(0.0, gas, 0.0)].iter() {
            let fitness = sim.step(act, hidden, latent, false)?.reward;
            elites.push(Elite::new(fitness, vec![*act; self.config.horizon]));
        }
        elites.sort_by(|a, b| a.fitness.total_cmp(&b.fitness));
        Ok(Plan {
            action: elites[1].action_sequence[0],
            elites,
        })
    }

    fn settings(&self) -> AgentSettings {
        AgentSettings {
            horizon: self.config.horizon,
            max_generations: 1,
            population_size: 2,
            is_shift_buffer: false,
        }
    }
}

type Tester = PlanningTester<StraightTrack, TrackModel, HillClimbing, CarRacingSuite>;

fn car_tester(dir: &std::path::Path, reload: Option<String>) -> Result<Tester> {
    let mut config = TesterConfig::default()
        .experiment_name("straight")
        .trials(2)
        .planning_test_log_dir(dir)
        .render_dream(true);
    if let Some(session) = reload {
        config = config.reload_planning_session(session);
    }
    let suite = CarRacingSuite::with_tests(&["planning_forward_test", "planning_left_turn_test"])?;
    Tester::build(
        config,
        (),
        (),
        HillClimbingConfig { horizon: 2 },
        suite,
        Arc::new(NullRecorderFactory::default()),
    )
}

#[test]
fn test_session_of_car_actions() -> Result<()> {
    let tmp = TempDir::new("car_racing")?;
    let mut tester = car_tester(tmp.path(), None)?;
    let total = tester.run_tests(Some("straight_run"))?;
    // The first action is planned from the reset tile, then from the start tile onwards.
    // Forward: 51 steps at 0.9 and 49 at 0.4. Left turn: 50 and 50.
    assert!((total - 130.5).abs() < 1e-3);

    let entry = std::fs::read_dir(tmp.path())?.next().unwrap()?;
    let stem = entry.path().file_stem().unwrap().to_string_lossy().to_string();
    assert!(stem.starts_with("car_racing_RHEA_straight_planning_session_"));

    let session = tester.store().load::<CarAction>(&stem)?;
    let forward = &session.test_results["planning_forward_test"];
    assert_eq!(forward.seeds, vec![Some(9214); 2]);
    assert_eq!(forward.action_histories[0].len(), 100);
    assert_eq!(forward.action_histories[0][0], CarAction::new(0.0, 1.0, 0.0));
    assert_eq!(forward.action_histories[0][1], CarAction::new(0.0, 1.0, 0.0));
    assert_eq!(forward.action_histories[0][2], CarAction::new(0.0, 0.5, 0.0));
    assert_eq!(forward.elites[0][0].len(), 2);

    let mut tester = car_tester(tmp.path(), Some(stem))?;
    assert!((tester.run_tests(None)? - total).abs() < 1e-3);
    Ok(())
}
