#![warn(missing_docs)]
//! A library for testing planning agents with learned world models.
//!
//! A [`TrialRunner`] plans actions in a [`SimulatedEnv`] and applies them to an
//! [`Env`]. A [`PlanningTester`] runs the tests of a [`TestSuite`], logs metrics
//! through a [`PlanningLogger`] and persists sessions in a [`SessionStore`], from
//! which the best trials can be replayed.
pub mod dummy;
pub mod error;
pub mod pool;
pub mod record;
pub mod util;

mod base;
pub use base::{
    Act, ActionSearch, AgentKind, AgentSettings, Elite, Env, Plan, PlanningAgent, PopulationFree,
    SimStep, SimulatedEnv, Step,
};

mod config;
pub use config::{
    PlanningConfig, SpawnDiscipline, TestSuiteConfig, TesterConfig, VisualizationConfig,
};

mod metrics;
pub use metrics::PlanningLogger;

pub mod session;
pub use session::{Session, SessionStore, TestResult};

mod trial;
pub use trial::{
    NegativeStreak, ReplayResult, TestArgs, TrialOptions, TrialProgress, TrialResult, TrialRunner,
    REWARD_CEILING,
};

mod orchestrator;
pub use orchestrator::{CachedSessionReport, PlanningTester, TestOutcome, TestRun, TestSuite};
