//! Deterministic components used for tests.
//!
//! [`ScriptedEnv`] emits rewards from a script shifted by the action taken,
//! [`EchoSimulatedEnv`] predicts the reward of an action as the action itself,
//! and the agents plan from the latent step index only, so that results do not
//! depend on which worker ran a trial.
use crate::{
    record::Record, ActionSearch, AgentSettings, Elite, Env, Plan, PlanningAgent, SimStep,
    SimulatedEnv, Step,
};
use anyhow::{bail, Result};
use serde::Serialize;
use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    thread::sleep,
    time::Duration,
};

/// Observation of [`ScriptedEnv`].
#[derive(Clone, Debug, PartialEq)]
pub struct ScriptedObs {
    /// Number of steps since the last reset.
    pub step: usize,

    /// Start offset set with [`Env::set_start`], `1` after a reset.
    pub start_track: usize,
}

/// Counts the [`ScriptedEnv`]s being built at the same time.
///
/// Clones share their counters.
#[derive(Clone, Debug, Default)]
pub struct BuildGauge {
    live: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl BuildGauge {
    /// The largest number of concurrent builds observed.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    fn enter(&self) {
        let live = self.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(live, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Configuration of [`ScriptedEnv`].
#[derive(Clone, Debug)]
pub struct ScriptedEnvConfig {
    /// Base reward of each step, `0` after the end of the script.
    pub rewards: Vec<f32>,

    /// Weight of the action added to the base reward.
    pub act_weight: f32,

    /// The environment reports a terminal state after this number of steps.
    pub episode_len: usize,

    /// The action term is multiplied by the start offset.
    pub scale_by_start: bool,

    /// Time taken by [`Env::build`].
    pub build_delay: Duration,

    /// Gauge of the builds of environments of this configuration.
    pub build_gauge: BuildGauge,
}

impl Default for ScriptedEnvConfig {
    fn default() -> Self {
        Self {
            rewards: vec![],
            act_weight: 1.0,
            episode_len: usize::MAX,
            scale_by_start: false,
            build_delay: Duration::ZERO,
            build_gauge: BuildGauge::default(),
        }
    }
}

impl ScriptedEnvConfig {
    /// A configuration with the given base rewards.
    pub fn with_rewards(rewards: Vec<f32>) -> Self {
        Self {
            rewards,
            ..Default::default()
        }
    }

    /// Sets the weight of the action.
    pub fn act_weight(mut self, v: f32) -> Self {
        self.act_weight = v;
        self
    }

    /// Sets the episode length.
    pub fn episode_len(mut self, v: usize) -> Self {
        self.episode_len = v;
        self
    }

    /// Multiplies the action term by the start offset.
    pub fn scale_by_start(mut self, v: bool) -> Self {
        self.scale_by_start = v;
        self
    }

    /// Sets the time taken by a build.
    pub fn build_delay(mut self, v: Duration) -> Self {
        self.build_delay = v;
        self
    }
}

/// An environment rewarding `rewards[t] + act_weight * act` at step `t`.
///
/// With [`ScriptedEnvConfig::scale_by_start`], the action term is multiplied by
/// the start offset.
pub struct ScriptedEnv {
    config: ScriptedEnvConfig,
    seed: Option<u64>,
    step: usize,
    start_track: usize,
    cumulative_reward: f32,
}

impl Env for ScriptedEnv {
    type Config = ScriptedEnvConfig;
    type Obs = ScriptedObs;
    type Act = f32;

    fn build(config: &Self::Config) -> Result<Self> {
        config.build_gauge.enter();
        if !config.build_delay.is_zero() {
            sleep(config.build_delay);
        }
        config.build_gauge.leave();
        Ok(Self {
            config: config.clone(),
            seed: None,
            step: 0,
            start_track: 1,
            cumulative_reward: 0.0,
        })
    }

    fn reset(&mut self, seed: Option<u64>) -> Result<Self::Obs> {
        self.seed = Some(seed.unwrap_or_else(|| fastrand::u64(..)));
        self.step = 0;
        self.start_track = 1;
        self.cumulative_reward = 0.0;
        Ok(self.obs())
    }

    fn seed(&self) -> Option<u64> {
        self.seed
    }

    fn set_start(&mut self, start_track: usize) -> Result<()> {
        self.start_track = start_track;
        Ok(())
    }

    fn step(&mut self, act: &f32, ignore_is_done: bool) -> Result<Step<Self>> {
        if self.is_done() && !ignore_is_done {
            bail!("Episode terminated after {} steps", self.step);
        }
        let base = self.config.rewards.get(self.step).copied().unwrap_or(0.0);
        let scale = match self.config.scale_by_start {
            true => self.start_track as f32,
            false => 1.0,
        };
        let reward = base + self.config.act_weight * act * scale;
        self.step += 1;
        self.cumulative_reward += reward;
        Ok(Step::new(self.obs(), reward, self.is_done(), Record::empty()))
    }

    fn cumulative_reward(&self) -> f32 {
        self.cumulative_reward
    }
}

impl ScriptedEnv {
    fn obs(&self) -> ScriptedObs {
        ScriptedObs {
            step: self.step,
            start_track: self.start_track,
        }
    }

    fn is_done(&self) -> bool {
        self.step >= self.config.episode_len
    }
}

/// Configuration of [`EchoSimulatedEnv`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EchoSimConfig;

/// A world model whose latent state is the step index and whose predicted reward is the action.
#[derive(Default)]
pub struct EchoSimulatedEnv {
    n_steps: usize,
}

impl EchoSimulatedEnv {
    /// Number of steps predicted since the last reset, including rollouts.
    pub fn n_steps(&self) -> usize {
        self.n_steps
    }
}

impl SimulatedEnv<ScriptedEnv> for EchoSimulatedEnv {
    type Config = EchoSimConfig;
    type Latent = usize;
    type Hidden = f32;

    fn build(_config: &Self::Config) -> Result<Self> {
        Ok(Self::default())
    }

    fn reset(&mut self) -> Result<()> {
        self.n_steps = 0;
        Ok(())
    }

    fn encode(&mut self, obs: &ScriptedObs) -> Result<usize> {
        Ok(obs.step)
    }

    fn hidden_zeros(&self) -> f32 {
        0.0
    }

    fn step(
        &mut self,
        act: &f32,
        hidden: &f32,
        latent: &usize,
        _is_simulation_real_environment: bool,
    ) -> Result<SimStep<ScriptedEnv, Self>> {
        self.n_steps += 1;
        Ok(SimStep {
            latent: latent + 1,
            reward: *act,
            is_done: false,
            hidden: hidden + act,
        })
    }
}

/// Configuration of [`ScriptedAgent`].
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ScriptedAgentConfig {
    /// Action taken at latent step `t` is `actions[t % actions.len()]`.
    pub actions: Vec<f32>,

    /// Number of elites returned by each search.
    pub population_size: usize,

    /// Length of the action sequence of the elites.
    pub horizon: usize,
}

impl Default for ScriptedAgentConfig {
    fn default() -> Self {
        Self {
            actions: vec![1.0],
            population_size: 2,
            horizon: 3,
        }
    }
}

/// A population based agent following a script.
pub struct ScriptedAgent {
    config: ScriptedAgentConfig,
}

impl PlanningAgent<ScriptedEnv, EchoSimulatedEnv> for ScriptedAgent {
    type Config = ScriptedAgentConfig;

    fn build(config: &Self::Config) -> Result<Self> {
        if config.actions.is_empty() {
            bail!("ScriptedAgent needs at least one action");
        }
        Ok(Self {
            config: config.clone(),
        })
    }

    fn search(
        &mut self,
        _sim: &mut EchoSimulatedEnv,
        latent: &usize,
        _hidden: &f32,
    ) -> Result<Plan<f32>> {
        let actions = &self.config.actions;
        let action = actions[latent % actions.len()];
        // Ascending fitness, the best elite comes last.
        let elites = (0..self.config.population_size)
            .map(|i| Elite::new(i as f32, vec![action; self.config.horizon]))
            .collect();
        Ok(Plan { action, elites })
    }

    fn settings(&self) -> AgentSettings {
        AgentSettings {
            horizon: self.config.horizon,
            max_generations: 1,
            population_size: self.config.population_size,
            is_shift_buffer: false,
        }
    }
}

/// Configuration of [`GreedySearch`].
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct GreedySearchConfig {
    /// Actions evaluated at each search.
    pub candidates: Vec<f32>,
}

impl Default for GreedySearchConfig {
    fn default() -> Self {
        Self {
            candidates: vec![-1.0, 0.0, 1.0],
        }
    }
}

/// A one step lookahead planner without a population.
pub struct GreedySearch {
    config: GreedySearchConfig,
}

impl ActionSearch<ScriptedEnv, EchoSimulatedEnv> for GreedySearch {
    type Config = GreedySearchConfig;

    fn build(config: &Self::Config) -> Result<Self> {
        if config.candidates.is_empty() {
            bail!("GreedySearch needs at least one candidate action");
        }
        Ok(Self {
            config: config.clone(),
        })
    }

    fn search(&mut self, sim: &mut EchoSimulatedEnv, latent: &usize, hidden: &f32) -> Result<f32> {
        let mut best = (f32::NEG_INFINITY, self.config.candidates[0]);
        for act in self.config.candidates.iter() {
            let reward = sim.step(act, hidden, latent, false)?.reward;
            if reward > best.0 {
                best = (reward, *act);
            }
        }
        Ok(best.1)
    }

    fn settings(&self) -> AgentSettings {
        AgentSettings {
            horizon: 1,
            max_generations: self.config.candidates.len(),
            population_size: 0,
            is_shift_buffer: false,
        }
    }
}

/// Configuration of [`RandomShootingAgent`].
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RandomShootingConfig {
    /// Actions sampled in the sequences.
    pub candidates: Vec<f32>,

    /// Number of sequences evaluated at each search.
    pub population_size: usize,

    /// Length of the sequences.
    pub horizon: usize,

    /// Seed of the random number generator.
    pub seed: u64,
}

impl Default for RandomShootingConfig {
    fn default() -> Self {
        Self {
            candidates: vec![-1.0, 0.0, 1.0],
            population_size: 4,
            horizon: 3,
            seed: 42,
        }
    }
}

/// Evaluates random action sequences in the world model and follows the best one.
pub struct RandomShootingAgent {
    config: RandomShootingConfig,
    rng: fastrand::Rng,
}

impl PlanningAgent<ScriptedEnv, EchoSimulatedEnv> for RandomShootingAgent {
    type Config = RandomShootingConfig;

    fn build(config: &Self::Config) -> Result<Self> {
        if config.candidates.is_empty() || config.population_size == 0 || config.horizon == 0 {
            bail!("RandomShootingAgent needs candidates, a population and a horizon");
        }
        Ok(Self {
            config: config.clone(),
            rng: fastrand::Rng::with_seed(config.seed),
        })
    }

    fn search(
        &mut self,
        sim: &mut EchoSimulatedEnv,
        latent: &usize,
        hidden: &f32,
    ) -> Result<Plan<f32>> {
        let candidates = &self.config.candidates;
        let mut elites = Vec::with_capacity(self.config.population_size);
        for _ in 0..self.config.population_size {
            let mut actions = Vec::with_capacity(self.config.horizon);
            for _ in 0..self.config.horizon {
                actions.push(candidates[self.rng.usize(..candidates.len())]);
            }
            let (mut latent, mut hidden) = (*latent, *hidden);
            let mut fitness = 0.0;
            for act in actions.iter() {
                let step = sim.step(act, &hidden, &latent, false)?;
                fitness += step.reward;
                latent = step.latent;
                hidden = step.hidden;
            }
            elites.push(Elite::new(fitness, actions));
        }
        elites.sort_by(|a, b| a.fitness.total_cmp(&b.fitness));
        let action = elites
            .last()
            .map(|elite| elite.action_sequence[0])
            .unwrap_or(candidates[0]);
        Ok(Plan { action, elites })
    }

    fn settings(&self) -> AgentSettings {
        AgentSettings {
            horizon: self.config.horizon,
            max_generations: 1,
            population_size: self.config.population_size,
            is_shift_buffer: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_env_rewards() -> Result<()> {
        let config = ScriptedEnvConfig::with_rewards(vec![1.0, -2.0]).act_weight(0.5);
        let mut env = ScriptedEnv::build(&config)?;
        env.reset(Some(3))?;
        assert_eq!(env.seed(), Some(3));
        assert_eq!(env.step(&2.0, false)?.reward, 2.0);
        assert_eq!(env.step(&0.0, false)?.reward, -2.0);
        assert_eq!(env.step(&0.0, false)?.reward, 0.0);
        assert_eq!(env.cumulative_reward(), 0.0);
        Ok(())
    }

    #[test]
    fn test_scripted_env_generates_seed() -> Result<()> {
        let mut env = ScriptedEnv::build(&ScriptedEnvConfig::default())?;
        env.reset(None)?;
        assert!(env.seed().is_some());
        Ok(())
    }

    #[test]
    fn test_scripted_env_scales_by_start() -> Result<()> {
        let config = ScriptedEnvConfig::default().scale_by_start(true);
        let mut env = ScriptedEnv::build(&config)?;
        env.reset(Some(1))?;
        assert_eq!(env.step(&1.0, false)?.reward, 1.0);
        env.reset(Some(1))?;
        env.set_start(5)?;
        assert_eq!(env.step(&1.0, false)?.obs.start_track, 5);
        assert_eq!(env.cumulative_reward(), 5.0);
        Ok(())
    }

    #[test]
    fn test_step_after_terminal_state() -> Result<()> {
        let config = ScriptedEnvConfig::default().episode_len(1);
        let mut env = ScriptedEnv::build(&config)?;
        env.reset(Some(0))?;
        assert!(env.step(&0.0, false)?.is_done);
        assert!(env.step(&0.0, false).is_err());
        assert!(env.step(&0.0, true).is_ok());
        Ok(())
    }

    #[test]
    fn test_random_shooting_is_seeded() -> Result<()> {
        let config = RandomShootingConfig::default();
        let mut sim = EchoSimulatedEnv::default();
        let mut a = RandomShootingAgent::build(&config)?;
        let mut b = RandomShootingAgent::build(&config)?;
        for _ in 0..3 {
            let pa = a.search(&mut sim, &0, &0.0)?;
            let pb = b.search(&mut sim, &0, &0.0)?;
            assert_eq!(pa.action, pb.action);
            assert_eq!(pa.elites, pb.elites);
            assert_eq!(pa.elites.len(), 4);
        }
        Ok(())
    }
}
