//! Session orchestrator.
use crate::{
    error::PlanningError,
    pool::{available_cores, effective_workers, WorkerPool},
    record::RecorderFactory,
    session::{total_best_reward, Session, SessionStore, TestResult},
    trial::{ReplayResult, TestArgs, TrialOptions, TrialResult, TrialRunner},
    Env, PlanningAgent, PlanningLogger, SimulatedEnv, TesterConfig,
};
use anyhow::Result;
use chrono::Local;
use log::{info, warn};
use serde_json::{json, Value};
use std::{collections::BTreeMap, marker::PhantomData, sync::Arc};

/// A table of named tests.
///
/// Keys are unique. They identify tests in session files, while
/// [`TestArgs::test_name`] is the label used in logs.
pub trait TestSuite<A> {
    /// Tests of the suite in the order they are run.
    fn tests(&self) -> Vec<(String, TestArgs<A>)>;

    /// The test with the given key.
    fn test(&self, key: &str) -> Option<TestArgs<A>> {
        self.tests()
            .into_iter()
            .find(|(k, _)| k == key)
            .map(|(_, args)| args)
    }
}

/// Trials of a planned test.
#[derive(Debug, Clone, PartialEq)]
pub struct TestRun<A> {
    /// Actions, total rewards, elites and seeds of the trials.
    pub result: TestResult<A>,

    /// Max reward of each trial.
    pub max_rewards: Vec<f32>,

    /// Summary of each trial.
    pub messages: Vec<String>,
}

/// Outcome of [`PlanningTester::run_plan_or_replay`].
#[derive(Debug, Clone, PartialEq)]
pub enum TestOutcome<A> {
    /// The test was planned.
    Planned(TestRun<A>),

    /// Recorded actions were replayed.
    Replayed(ReplayResult<A>),
}

/// Outcome of replaying a cached session.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedSessionReport {
    /// Sum over tests of the replayed reward of the best trial.
    pub replayed_reward: f32,

    /// Total best reward recorded in the session.
    pub total_best_reward: f32,
}

/// The parts of a [`PlanningTester`] shared with worker threads.
struct TestContext<E, S, P>
where
    E: Env,
    S: SimulatedEnv<E>,
    P: PlanningAgent<E, S>,
{
    config: TesterConfig,
    env_config: E::Config,
    sim_config: S::Config,
    agent_config: P::Config,
    recorder_factory: Arc<dyn RecorderFactory>,
    session_name: String,
    phantom: PhantomData<fn() -> (E, S, P)>,
}

impl<E, S, P> TestContext<E, S, P>
where
    E: Env,
    S: SimulatedEnv<E>,
    P: PlanningAgent<E, S>,
{
    fn runner(&self) -> Result<TrialRunner<E, S, P>> {
        TrialRunner::build(
            &self.env_config,
            &self.sim_config,
            &self.agent_config,
            TrialOptions::from_config(&self.config),
        )
    }

    /// Runs the trials of a test, on a worker pool if `is_pooled`.
    fn run_planning_test(
        &self,
        runner: &mut TrialRunner<E, S, P>,
        key: &str,
        args: &TestArgs<E::Act>,
        is_pooled: bool,
    ) -> Result<TestRun<E::Act>> {
        let trials = self.config.test_suite.trials;
        let test_name = args.test_name.as_str();
        let mut logger = PlanningLogger::new(
            self.config.test_suite.is_logging,
            &self.config.test_suite.log_dir,
            self.recorder_factory.clone(),
        );
        logger.start(&self.session_name);
        logger.log_agent_settings(
            test_name,
            self.config.planning.planning_agent.as_str(),
            &serde_json::to_string(&self.agent_config)?,
        );

        info!("Planning test on {} with {} trials", test_name, trials);
        let seed = args.custom_seed;
        let results: Vec<TrialResult<E::Act>> = if is_pooled {
            let workers = effective_workers(self.config.test_suite.fixed_cores, available_cores());
            let pool = WorkerPool::new(workers, self.config.test_suite.spawn);
            let guard = pool.env_guard();
            pool.map_with_init(
                (0..trials).collect(),
                |_| Ok(self.runner()?.with_env_guard(guard.clone())),
                |runner, trial| runner.run_trial(trial, args, seed),
            )?
        } else {
            (0..trials)
                .map(|trial| runner.run_trial(trial, args, seed))
                .collect::<Result<_>>()?
        };

        let mut run = TestRun {
            result: TestResult::new(key),
            max_rewards: Vec::with_capacity(trials),
            messages: Vec::with_capacity(trials),
        };
        for (trial, res) in results.into_iter().enumerate() {
            logger.log_trial_reward(test_name, trial, res.total_reward, res.max_reward);
            logger.log_custom_result(test_name, trial, &res.custom_message);
            run.result
                .push(res.action_history, res.total_reward, res.elites, res.seed);
            run.max_rewards.push(res.max_reward);
            run.messages.push(res.custom_message);
        }
        logger.log_reward_mean_std(test_name, &run.result.total_rewards);
        logger.close();
        Ok(run)
    }

    fn run_plan_or_replay(
        &self,
        runner: &mut TrialRunner<E, S, P>,
        key: &str,
        args: &TestArgs<E::Act>,
        is_pooled: bool,
    ) -> Result<TestOutcome<E::Act>> {
        info!("{}", args.test_name);
        if args.is_replay() {
            Ok(TestOutcome::Replayed(runner.replay(args)?))
        } else {
            Ok(TestOutcome::Planned(
                self.run_planning_test(runner, key, args, is_pooled)?,
            ))
        }
    }
}

/// Runs the tests of a [`TestSuite`], persists and replays sessions.
///
/// Depending on [`TestSuiteConfig`](crate::TestSuiteConfig), tests run one after
/// another, each on its own worker with sequential trials
/// (`is_multithread_tests`), or one after another with the trials of each test
/// on a worker pool (`is_multithread_trials`). Workers build their own
/// environment, world model and agent from the configurations.
pub struct PlanningTester<E, S, P, T>
where
    E: Env,
    S: SimulatedEnv<E>,
    P: PlanningAgent<E, S>,
    T: TestSuite<E::Act>,
{
    context: TestContext<E, S, P>,
    suite: T,
    runner: TrialRunner<E, S, P>,
    store: SessionStore,
    is_tuning: bool,
}

impl<E, S, P, T> PlanningTester<E, S, P, T>
where
    E: Env,
    S: SimulatedEnv<E>,
    P: PlanningAgent<E, S>,
    T: TestSuite<E::Act>,
{
    /// Builds a tester.
    ///
    /// The world model and the agent used by sequential runs are built here,
    /// workers build their own.
    pub fn build(
        config: TesterConfig,
        env_config: E::Config,
        sim_config: S::Config,
        agent_config: P::Config,
        suite: T,
        recorder_factory: Arc<dyn RecorderFactory>,
    ) -> Result<Self> {
        let runner = TrialRunner::build(
            &env_config,
            &sim_config,
            &agent_config,
            TrialOptions::from_config(&config),
        )?;
        let store = SessionStore::new(&config.test_suite.planning_test_log_dir);
        let mut tester = Self {
            context: TestContext {
                config,
                env_config,
                sim_config,
                agent_config,
                recorder_factory,
                session_name: String::new(),
                phantom: PhantomData,
            },
            suite,
            runner,
            store,
            is_tuning: false,
        };
        tester.context.session_name = tester.make_session_name(None);
        Ok(tester)
    }

    /// Marks sessions as produced by a tuning loop.
    pub fn tuning(mut self, v: bool) -> Self {
        self.is_tuning = v;
        self
    }

    /// The session store.
    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// The test suite.
    pub fn suite(&self) -> &T {
        &self.suite
    }

    /// Name of the metrics run of the current session.
    pub fn session_name(&self) -> &str {
        &self.context.session_name
    }

    /// Name of the metrics run, `custom_name` if given.
    ///
    /// `{experiment}_{YYYY_MM_DD_HH_MM}_{agent}_h{horizon}_g{max_generations}_sb{is_shift_buffer}`.
    pub fn make_session_name(&self, custom_name: Option<&str>) -> String {
        match custom_name {
            Some(name) => name.to_string(),
            None => {
                let settings = self.runner.agent().settings();
                format!(
                    "{}_{}_{}_h{}_g{}_sb{}",
                    self.context.config.experiment_name,
                    Local::now().format("%Y_%m_%d_%H_%M"),
                    self.context.config.planning.planning_agent,
                    settings.horizon,
                    settings.max_generations,
                    settings.is_shift_buffer
                )
            }
        }
    }

    /// Parameters of the agent persisted with sessions.
    ///
    /// Evolution settings are included for evolutionary agents.
    pub fn agent_parameters(&self) -> Result<Value> {
        let agent_parameters = serde_json::to_value(&self.context.agent_config)?;
        let mut params = json!({ "agent_parameters": agent_parameters });
        if self.context.config.planning.planning_agent.is_evolutionary() {
            params["evolution_settings"] = self
                .context
                .config
                .planning
                .evolution_handler
                .clone()
                .unwrap_or(Value::Null);
        }
        Ok(params)
    }

    /// Runs all tests and returns the total best reward of the session.
    ///
    /// If reloading is enabled and the session to load exists, the best trial of
    /// each of its tests is replayed instead. A missing session falls back to a
    /// new run.
    pub fn run_tests(&mut self, session_name: Option<&str>) -> Result<f32> {
        self.context.session_name = self.make_session_name(session_name);
        info!("------- Planning tests params -------");
        info!("trials per test: {}", self.context.config.test_suite.trials);
        info!("Planning agent: {}", self.context.config.planning.planning_agent);
        info!("{:?}", self.runner.agent().settings());

        let suite_config = &self.context.config.test_suite;
        if suite_config.is_reload_planning_session {
            let name = suite_config.planning_session_to_load.clone();
            if self.store.exists(&name) {
                info!("Found session: {:?}", self.store.path_of(&name));
                return Ok(self.run_cached_session(&name)?.total_best_reward);
            }
            warn!(
                "Could not find session {:?}, runs a new session",
                self.store.path_of(&name)
            );
        }
        self.run_new_session()
    }

    /// Runs the test with the given key and returns its trials.
    pub fn run_specific_test(
        &mut self,
        key: &str,
        session_name: Option<&str>,
    ) -> Result<TestRun<E::Act>> {
        self.context.session_name = self.make_session_name(session_name);
        let args = self
            .suite
            .test(key)
            .ok_or_else(|| PlanningError::UnknownTest(key.to_string()))?;
        let is_pooled = self.context.config.test_suite.is_multithread_trials;
        self.context
            .run_planning_test(&mut self.runner, key, &args, is_pooled)
    }

    /// Plans the test, or replays it if `args` carries recorded actions.
    pub fn run_plan_or_replay(
        &mut self,
        key: &str,
        args: &TestArgs<E::Act>,
    ) -> Result<TestOutcome<E::Act>> {
        let is_pooled = self.context.config.test_suite.is_multithread_trials;
        self.context
            .run_plan_or_replay(&mut self.runner, key, args, is_pooled)
    }

    /// Replays the best trial of every test of a stored session.
    pub fn run_cached_session(&mut self, session_name: &str) -> Result<CachedSessionReport> {
        info!("--- Running cached planning tests ---");
        let session: Session<E::Act> = self.store.load(session_name)?;
        let mut replayed_reward = 0.0;

        for (key, result) in session.test_results.iter() {
            let best = result.best_trial()?;
            info!(
                "Reload actions from {}, trial {} with best reward {}",
                key, best.trial, best.reward
            );
            let args = self
                .suite
                .test(key)
                .ok_or_else(|| PlanningError::UnknownTest(key.clone()))?
                .replay(best.action_history, best.elites, best.seed);
            replayed_reward += self.runner.replay(&args)?.total_reward;
        }

        info!("Total session reward: {}", replayed_reward);
        Ok(CachedSessionReport {
            replayed_reward,
            total_best_reward: session.total_best_reward(),
        })
    }

    fn run_new_session(&mut self) -> Result<f32> {
        info!("--- Running new planning tests ---");
        let tests = self.suite.tests();
        let agent_kind = self.context.config.planning.planning_agent;

        let runs = if self.context.config.test_suite.is_multithread_tests {
            let context = &self.context;
            let pool = WorkerPool::new(available_cores(), self.context.config.test_suite.spawn);
            let guard = pool.env_guard();
            let runs = pool.map_with_init(
                tests,
                |_| Ok(context.runner()?.with_env_guard(guard.clone())),
                |runner, (key, args)| {
                    let run = context.run_planning_test(runner, &key, &args, false)?;
                    Ok((key, run))
                },
            )?;
            for (key, run) in runs.iter() {
                let rewards = &run.result.total_rewards;
                if rewards.len() > 1 {
                    info!(
                        "{} - {} - Average reward over {} trials: {}",
                        agent_kind,
                        key,
                        rewards.len(),
                        rewards.iter().sum::<f32>() / rewards.len() as f32
                    );
                }
            }
            runs
        } else {
            let is_pooled = self.context.config.test_suite.is_multithread_trials;
            let mut runs = vec![];
            for (key, args) in tests.into_iter() {
                let run = self
                    .context
                    .run_planning_test(&mut self.runner, &key, &args, is_pooled)?;
                let rewards = &run.result.total_rewards;
                if !rewards.is_empty() {
                    info!(
                        "Average reward over {} trials: {}",
                        rewards.len(),
                        rewards.iter().sum::<f32>() / rewards.len() as f32
                    );
                }
                runs.push((key, run));
            }
            runs
        };

        let test_results: BTreeMap<String, TestResult<E::Act>> = runs
            .into_iter()
            .map(|(key, run)| (key, run.result))
            .collect();
        let total = total_best_reward(&test_results);
        let session = Session {
            agent_type: agent_kind.to_string(),
            agent_params: self.agent_parameters()?,
            test_results,
        };
        let config = &self.context.config;
        self.store
            .save(&session, &config.game, &config.experiment_name, self.is_tuning)?;
        Ok(total)
    }
}
