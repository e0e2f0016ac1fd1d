//! Run a trial of a test.
mod args;
mod progress;
use crate::{AgentKind, Elite, Env, PlanningAgent, SimulatedEnv, TesterConfig};
use anyhow::{anyhow, Result};
pub use args::TestArgs;
use log::{debug, info};
pub use progress::{NegativeStreak, TrialProgress};
use std::{
    sync::{Arc, Mutex},
    time::Instant,
};

/// A trial stops once its cumulative reward exceeds this value.
pub const REWARD_CEILING: f32 = 900.0;

/// Outcome of a planned trial.
#[derive(Debug, Clone, PartialEq)]
pub struct TrialResult<A> {
    /// Elite populations of each step taken.
    pub elites: Vec<Vec<Elite<A>>>,

    /// Actions taken.
    pub action_history: Vec<A>,

    /// Cumulative reward when the trial ended.
    pub total_reward: f32,

    /// The highest cumulative reward observed during the trial.
    pub max_reward: f32,

    /// Seed the environment was reset with.
    pub seed: Option<u64>,

    /// Summary of the trial.
    pub custom_message: String,

    /// Number of steps taken after the pre-actions.
    pub steps_ran: usize,
}

/// Outcome of a replayed trial.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayResult<A> {
    /// Replayed actions.
    pub action_history: Vec<A>,

    /// Cumulative reward after the replay.
    pub total_reward: f32,

    /// Summary of the replay.
    pub custom_message: String,
}

/// Options of [`TrialRunner`] taken from [`TesterConfig`].
#[derive(Debug, Clone, PartialEq)]
pub struct TrialOptions {
    /// A trial stops after this number of consecutive non-positive rewards.
    pub max_negative_count: usize,

    /// Renders the real environment at every step.
    pub is_render: bool,

    /// Rolls out the best elite of every step in the world model.
    pub is_render_dream: bool,

    /// Tag of the planning agent.
    pub agent_kind: AgentKind,
}

impl TrialOptions {
    /// Options of the given configuration.
    pub fn from_config(config: &TesterConfig) -> Self {
        Self {
            max_negative_count: config.test_suite.max_negative_count,
            is_render: config.visualization.is_render,
            is_render_dream: config.visualization.is_render_dream,
            agent_kind: config.planning.planning_agent,
        }
    }
}

struct Transition<L, H> {
    reward: f32,
    is_done: bool,
    latent: L,
    hidden: H,
}

/// Runs trials with a world model and a planning agent.
///
/// A runner owns its world model and agent. A fresh environment is built from
/// the configuration for every trial, behind the guard given with
/// [`TrialRunner::with_env_guard`] if any.
///
/// A trial alternates planning and stepping for at most
/// [`TestArgs::optimal_steps`] iterations:
///
/// 1. The agent searches the next action from the current latent and hidden states.
/// 2. If dream rollouts are enabled, the best elite is rolled out in the world model.
/// 3. The trial stops if the streak of non-positive rewards reached
///    [`TrialOptions::max_negative_count`] or the cumulative reward exceeds
///    [`REWARD_CEILING`].
/// 4. The action is applied to the real environment and to the world model.
/// 5. The streak and the [`TrialProgress`] are updated.
///
/// A terminal state reported by the environment does not stop the trial.
pub struct TrialRunner<E, S, P>
where
    E: Env,
    S: SimulatedEnv<E>,
    P: PlanningAgent<E, S>,
{
    env_config: E::Config,
    sim: S,
    agent: P,
    options: TrialOptions,
    env_guard: Option<Arc<Mutex<()>>>,
}

impl<E, S, P> TrialRunner<E, S, P>
where
    E: Env,
    S: SimulatedEnv<E>,
    P: PlanningAgent<E, S>,
{
    /// Constructs a runner.
    pub fn new(env_config: E::Config, sim: S, agent: P, options: TrialOptions) -> Self {
        Self {
            env_config,
            sim,
            agent,
            options,
            env_guard: None,
        }
    }

    /// Builds the world model and the agent from their configurations.
    pub fn build(
        env_config: &E::Config,
        sim_config: &S::Config,
        agent_config: &P::Config,
        options: TrialOptions,
    ) -> Result<Self> {
        Ok(Self::new(
            env_config.clone(),
            S::build(sim_config)?,
            P::build(agent_config)?,
            options,
        ))
    }

    /// Builds environments while holding `guard`, shared by runners whose
    /// environments must not be built concurrently.
    pub fn with_env_guard(mut self, guard: Option<Arc<Mutex<()>>>) -> Self {
        self.env_guard = guard;
        self
    }

    /// The planning agent.
    pub fn agent(&self) -> &P {
        &self.agent
    }

    /// Options of the runner.
    pub fn options(&self) -> &TrialOptions {
        &self.options
    }

    fn build_env(&self) -> Result<E> {
        match &self.env_guard {
            Some(guard) => {
                let _guard = guard.lock().unwrap_or_else(|e| e.into_inner());
                E::build(&self.env_config)
            }
            None => E::build(&self.env_config),
        }
    }

    fn step(
        env: &mut E,
        sim: &mut S,
        act: &E::Act,
        hidden: &S::Hidden,
        is_render: bool,
    ) -> Result<Transition<S::Latent, S::Hidden>> {
        let step = env.step(act, true)?;
        let latent = sim.encode(&step.obs)?;
        let sim_step = sim.step(act, hidden, &latent, true)?;
        if is_render {
            env.render()?;
        }
        Ok(Transition {
            reward: step.reward,
            is_done: step.is_done,
            latent,
            hidden: sim_step.hidden,
        })
    }

    /// Resets the environment and the world model and applies the pre-actions.
    ///
    /// The latent state is the encoded observation. The hidden state is carried
    /// by the world model stepping along the real environment.
    fn prepare(
        &mut self,
        env: &mut E,
        args: &TestArgs<E::Act>,
        seed: Option<u64>,
    ) -> Result<(S::Latent, S::Hidden)> {
        let obs = env.reset(seed)?;
        if args.custom_seed.is_some() {
            env.set_start(args.start_track)?;
        }
        self.sim.reset()?;
        let mut latent = self.sim.encode(&obs)?;
        let mut hidden = self.sim.hidden_zeros();

        if let Some(pre_actions) = &args.pre_actions {
            for act in pre_actions.iter() {
                let tr = Self::step(env, &mut self.sim, act, &hidden, self.options.is_render)?;
                latent = tr.latent;
                hidden = tr.hidden;
            }
        }
        Ok((latent, hidden))
    }

    /// Rolls out the action sequence of an elite in the world model and returns
    /// the predicted return.
    fn simulate_dream(
        &mut self,
        elite: Option<&Elite<E::Act>>,
        latent: &S::Latent,
        hidden: &S::Hidden,
    ) -> Result<Option<f32>> {
        if !self.options.is_render_dream || self.options.agent_kind == AgentKind::Random {
            return Ok(None);
        }
        let elite = match elite {
            Some(elite) => elite,
            None => return Ok(None),
        };

        let mut latent = latent.clone();
        let mut hidden = hidden.clone();
        let mut total_reward = 0.0;
        for act in elite.action_sequence.iter() {
            let sim_step = self.sim.step(act, &hidden, &latent, true)?;
            total_reward += sim_step.reward;
            latent = sim_step.latent;
            hidden = sim_step.hidden;
            self.sim.render()?;
        }
        debug!("Expected dream reward: {:.2}", total_reward);
        Ok(Some(total_reward))
    }

    /// Plans and runs trial `trial` of a test.
    pub fn run_trial(
        &mut self,
        trial: usize,
        args: &TestArgs<E::Act>,
        seed: Option<u64>,
    ) -> Result<TrialResult<E::Act>> {
        let mut env = self.build_env()?;
        let (mut latent, mut hidden) = self.prepare(&mut env, args, seed)?;
        let seed = env.seed();

        let mut progress = TrialProgress::new(args);
        let mut streak = NegativeStreak::new(self.options.max_negative_count);
        let mut elites = vec![];
        let mut action_history = vec![];
        let mut total_reward = 0.0;
        let mut steps_ran = 0;
        let start_time = Instant::now();

        for _ in 0..args.optimal_steps {
            let plan = self.agent.search(&mut self.sim, &latent, &hidden)?;
            self.simulate_dream(plan.elites.last(), &latent, &hidden)?;

            if streak.is_exhausted() || total_reward > REWARD_CEILING {
                break;
            }

            let is_render = self.options.is_render;
            let tr = Self::step(&mut env, &mut self.sim, &plan.action, &hidden, is_render)?;
            if tr.is_done {
                debug!("Environment reported a terminal state at step {}", steps_ran);
            }
            latent = tr.latent;
            hidden = tr.hidden;
            streak.observe(tr.reward);

            action_history.push(plan.action);
            elites.push(plan.elites);
            total_reward = env.cumulative_reward();
            steps_ran += 1;
            progress = progress.update(tr.reward, total_reward, steps_ran);

            debug!(
                "{} | step {}/{} | total_reward={:.3} | max_reward={:.3} | negative_counter={}/{}",
                args.test_name,
                steps_ran,
                args.optimal_steps,
                total_reward,
                progress.max_reward,
                streak.count(),
                self.options.max_negative_count
            );
        }

        env.close();
        let elapsed = Some(start_time.elapsed());
        let custom_message = progress.summary(Some(trial), seed, elapsed, total_reward, steps_ran);
        info!("{}", custom_message);

        Ok(TrialResult {
            elites,
            action_history,
            total_reward,
            max_reward: progress.max_reward,
            seed,
            custom_message,
            steps_ran,
        })
    }

    /// Replays the recorded actions of `args`.
    ///
    /// The environment is reset with [`TestArgs::replay_seed`], the seed
    /// injected by [`TestArgs::replay`].
    pub fn replay(&mut self, args: &TestArgs<E::Act>) -> Result<ReplayResult<E::Act>> {
        let actions = args
            .action_history
            .as_ref()
            .ok_or_else(|| anyhow!("No action history to replay for {}", args.test_name))?;
        let mut env = self.build_env()?;
        let (mut latent, mut hidden) = self.prepare(&mut env, args, args.replay_seed())?;
        let seed = env.seed();

        let mut progress = TrialProgress::new(args);
        let mut total_reward = 0.0;
        let mut steps_ran = 0;

        for (i, act) in actions.iter().enumerate() {
            let tr = Self::step(&mut env, &mut self.sim, act, &hidden, self.options.is_render)?;
            latent = tr.latent;
            hidden = tr.hidden;
            total_reward = env.cumulative_reward();
            steps_ran += 1;
            progress = progress.update(tr.reward, total_reward, steps_ran);

            let elite = args
                .elites
                .as_ref()
                .and_then(|elites| elites.get(i))
                .and_then(|step_elites| step_elites.last());
            self.simulate_dream(elite, &latent, &hidden)?;
        }

        env.close();
        let custom_message = progress.summary(None, seed, None, total_reward, steps_ran);
        info!("{}", custom_message);

        Ok(ReplayResult {
            action_history: actions.clone(),
            total_reward,
            custom_message,
        })
    }
}
