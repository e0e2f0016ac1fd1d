//! Configuration of [`PlanningTester`](crate::PlanningTester).
use crate::AgentKind;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, Write},
    path::{Path, PathBuf},
};

/// How worker threads initialise their environment stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpawnDiscipline {
    /// Workers build their environments one at a time behind a shared guard.
    Serialized,

    /// Workers build their environments concurrently.
    Concurrent,
}

impl Default for SpawnDiscipline {
    fn default() -> Self {
        SpawnDiscipline::Serialized
    }
}

/// Configuration of the test suite.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
#[serde(default)]
pub struct TestSuiteConfig {
    /// The number of trials per test.
    pub trials: usize,

    /// Runs every test on its own worker, trials of a test run sequentially.
    pub is_multithread_tests: bool,

    /// Runs the trials of a test on a worker pool.
    pub is_multithread_trials: bool,

    /// Upper bound of the number of workers. The number of available cores is used if `None`.
    pub fixed_cores: Option<usize>,

    /// Enables the metrics writer.
    pub is_logging: bool,

    /// Replays the best trials of [`TestSuiteConfig::planning_session_to_load`] if it exists.
    pub is_reload_planning_session: bool,

    /// File stem of the session to be replayed.
    pub planning_session_to_load: String,

    /// Directory of the session files.
    pub planning_test_log_dir: PathBuf,

    /// Root directory of the metrics writer.
    pub log_dir: PathBuf,

    /// A trial stops after this number of consecutive non-positive rewards.
    pub max_negative_count: usize,

    /// Initialisation discipline of worker threads.
    pub spawn: SpawnDiscipline,
}

impl Default for TestSuiteConfig {
    fn default() -> Self {
        Self {
            trials: 1,
            is_multithread_tests: false,
            is_multithread_trials: false,
            fixed_cores: None,
            is_logging: false,
            is_reload_planning_session: false,
            planning_session_to_load: String::new(),
            planning_test_log_dir: PathBuf::from("planning_sessions"),
            log_dir: PathBuf::from("logs"),
            max_negative_count: 50,
            spawn: SpawnDiscipline::default(),
        }
    }
}

/// Configuration of the planning agent.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct PlanningConfig {
    /// Planning algorithm.
    pub planning_agent: AgentKind,

    /// Settings of the evolution handler, persisted with evolutionary agents.
    #[serde(default)]
    pub evolution_handler: Option<serde_json::Value>,
}

impl Default for PlanningConfig {
    fn default() -> Self {
        Self {
            planning_agent: AgentKind::Rhea,
            evolution_handler: None,
        }
    }
}

/// Render toggles. They do not affect trial results.
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone, Default)]
#[serde(default)]
pub struct VisualizationConfig {
    /// Renders the real environment at every step.
    pub is_render: bool,

    /// Rolls out the best elite in the world model at every step.
    pub is_render_dream: bool,
}

/// Configuration of [`PlanningTester`](crate::PlanningTester).
#[derive(Debug, Deserialize, Serialize, PartialEq, Clone)]
pub struct TesterConfig {
    /// Name of the game, used in session file names.
    pub game: String,

    /// Name of the experiment.
    pub experiment_name: String,

    /// Test suite.
    #[serde(default)]
    pub test_suite: TestSuiteConfig,

    /// Planning agent.
    #[serde(default)]
    pub planning: PlanningConfig,

    /// Visualization.
    #[serde(default)]
    pub visualization: VisualizationConfig,
}

impl Default for TesterConfig {
    fn default() -> Self {
        Self {
            game: "car_racing".to_string(),
            experiment_name: "experiment".to_string(),
            test_suite: TestSuiteConfig::default(),
            planning: PlanningConfig::default(),
            visualization: VisualizationConfig::default(),
        }
    }
}

impl TesterConfig {
    /// Sets the name of the game.
    pub fn game(mut self, v: impl Into<String>) -> Self {
        self.game = v.into();
        self
    }

    /// Sets the name of the experiment.
    pub fn experiment_name(mut self, v: impl Into<String>) -> Self {
        self.experiment_name = v.into();
        self
    }

    /// Sets the number of trials per test.
    pub fn trials(mut self, v: usize) -> Self {
        self.test_suite.trials = v;
        self
    }

    /// Runs tests on separate workers.
    pub fn multithread_tests(mut self, v: bool) -> Self {
        self.test_suite.is_multithread_tests = v;
        self
    }

    /// Runs trials on separate workers.
    pub fn multithread_trials(mut self, v: bool) -> Self {
        self.test_suite.is_multithread_trials = v;
        self
    }

    /// Sets the upper bound of the number of workers.
    pub fn fixed_cores(mut self, v: Option<usize>) -> Self {
        self.test_suite.fixed_cores = v;
        self
    }

    /// Enables the metrics writer.
    pub fn logging(mut self, v: bool) -> Self {
        self.test_suite.is_logging = v;
        self
    }

    /// Replays the best trials of the given session, if it exists, instead of running new trials.
    pub fn reload_planning_session(mut self, session: impl Into<String>) -> Self {
        self.test_suite.is_reload_planning_session = true;
        self.test_suite.planning_session_to_load = session.into();
        self
    }

    /// Sets the directory of session files.
    pub fn planning_test_log_dir(mut self, v: impl AsRef<Path>) -> Self {
        self.test_suite.planning_test_log_dir = v.as_ref().to_path_buf();
        self
    }

    /// Sets the root directory of the metrics writer.
    pub fn log_dir(mut self, v: impl AsRef<Path>) -> Self {
        self.test_suite.log_dir = v.as_ref().to_path_buf();
        self
    }

    /// Sets the number of consecutive non-positive rewards ending a trial.
    pub fn max_negative_count(mut self, v: usize) -> Self {
        self.test_suite.max_negative_count = v;
        self
    }

    /// Sets the initialisation discipline of workers.
    pub fn spawn(mut self, v: SpawnDiscipline) -> Self {
        self.test_suite.spawn = v;
        self
    }

    /// Sets the planning agent.
    pub fn planning_agent(mut self, v: AgentKind) -> Self {
        self.planning.planning_agent = v;
        self
    }

    /// Enables dream rollouts of the best elite.
    pub fn render_dream(mut self, v: bool) -> Self {
        self.visualization.is_render_dream = v;
        self
    }

    /// Constructs [`TesterConfig`] from YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        let rdr = BufReader::new(file);
        let b = serde_yaml::from_reader(rdr)?;
        Ok(b)
    }

    /// Saves [`TesterConfig`].
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut file = File::create(path)?;
        file.write_all(serde_yaml::to_string(&self)?.as_bytes())?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn test_serde_tester_config() -> Result<()> {
        let config = TesterConfig::default()
            .experiment_name("rhea_h20")
            .trials(5)
            .multithread_trials(true)
            .fixed_cores(Some(4))
            .reload_planning_session("some_session")
            .planning_agent(AgentKind::Mcts);

        let dir = TempDir::new("tester_config")?;
        let path = dir.path().join("tester_config.yaml");
        config.save(&path)?;
        let config_ = TesterConfig::load(&path)?;
        assert_eq!(config, config_);
        Ok(())
    }

    #[test]
    fn test_partial_yaml_uses_defaults() -> Result<()> {
        let yaml = "
game: car_racing
experiment_name: test
test_suite:
  trials: 3
  fixed_cores: ~
planning:
  planning_agent: RMHC
  evolution_handler:
    mutation_rate: 0.5
";
        let config: TesterConfig = serde_yaml::from_str(yaml)?;
        assert_eq!(config.test_suite.trials, 3);
        assert_eq!(config.test_suite.fixed_cores, None);
        assert_eq!(config.test_suite.spawn, SpawnDiscipline::Serialized);
        assert_eq!(config.planning.planning_agent, AgentKind::Rmhc);
        assert_eq!(
            config.planning.evolution_handler,
            Some(serde_json::json!({"mutation_rate": 0.5}))
        );
        assert!(!config.visualization.is_render);
        Ok(())
    }
}
