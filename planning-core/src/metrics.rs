//! Metrics reporter of planning tests.
use crate::{
    record::{Record, RecordValue, Recorder, RecorderFactory},
    util::mean_std,
};
use log::warn;
use std::{path::PathBuf, sync::Arc};

const STEP_KEY: &str = "step";

/// Writes rewards, trial summaries and agent settings of planning tests.
///
/// Every method is a no-op when logging is disabled, or when the writer could
/// not be opened. Failures of the writer never reach the caller.
pub struct PlanningLogger {
    is_logging: bool,
    log_dir: PathBuf,
    factory: Arc<dyn RecorderFactory>,
    writer: Option<Box<dyn Recorder>>,
}

impl PlanningLogger {
    /// Constructs a logger. The writer is opened with [`PlanningLogger::start`].
    pub fn new(
        is_logging: bool,
        log_dir: impl Into<PathBuf>,
        factory: Arc<dyn RecorderFactory>,
    ) -> Self {
        Self {
            is_logging,
            log_dir: log_dir.into(),
            factory,
            writer: None,
        }
    }

    /// Opens the writer in `{log_dir}/planning_test/{name}`.
    pub fn start(&mut self, name: &str) {
        if !self.is_logging {
            return;
        }
        let logdir = self.log_dir.join("planning_test").join(name);
        match self.factory.open(&logdir) {
            Ok(writer) => self.writer = Some(writer),
            Err(e) => warn!("Failed to open metrics writer in {:?}: {}", logdir, e),
        }
    }

    /// Logs the total and max reward of a trial.
    pub fn log_trial_reward(
        &mut self,
        test_name: &str,
        trial: usize,
        total_reward: f32,
        max_reward: f32,
    ) {
        let tag = format!("{}/Max reward per trial", test_name);
        self.write_scalar(&tag, max_reward, trial);
        let tag = format!("{}/Total reward per trial", test_name);
        self.write_scalar(&tag, total_reward, trial);
    }

    /// Logs the summary message of a trial.
    pub fn log_custom_result(&mut self, test_name: &str, trial: usize, text: &str) {
        self.write_text(&format!("{}/results", test_name), text, trial);
    }

    /// Logs the settings of the planning agent.
    pub fn log_agent_settings(&mut self, test_name: &str, agent: &str, settings: &str) {
        self.write_text(&format!("{}/{}", test_name, agent), settings, 0);
    }

    /// Logs the mean and standard deviation of the total rewards of the trials of a test.
    pub fn log_reward_mean_std(&mut self, test_name: &str, rewards: &[f32]) {
        if let Some((mean, std)) = mean_std(rewards) {
            let tag = format!("{}/Mean and stddev reward of {} trials", test_name, rewards.len());
            self.write_text(&tag, &format!("Mean: {} +- {}", mean, std), 0);
        }
    }

    /// Logs the max reward averaged over trials at a tuning iteration.
    pub fn log_iteration_max_reward(
        &mut self,
        test_name: &str,
        trials: usize,
        iteration: usize,
        max_reward: f32,
    ) {
        let tag = format!("{}/Average Max reward  of {} trials per iteration", test_name, trials);
        self.write_scalar(&tag, max_reward, iteration);
    }

    /// Logs the total reward averaged over trials at a tuning iteration.
    pub fn log_iteration_avg_reward(
        &mut self,
        test_name: &str,
        trials: usize,
        iteration: usize,
        avg_reward: f32,
    ) {
        let tag = format!("{}/Average Total reward of {} trials per iteration", test_name, trials);
        self.write_scalar(&tag, avg_reward, iteration);
    }

    /// Flushes the writer.
    pub fn flush(&mut self) {
        if let Some(writer) = self.writer.as_mut() {
            writer.flush();
        }
    }

    /// Flushes and closes the writer.
    pub fn close(&mut self) {
        if let Some(mut writer) = self.writer.take() {
            writer.close();
        }
    }

    fn write_scalar(&mut self, tag: &str, value: f32, step: usize) {
        self.write(tag, RecordValue::Scalar(value), step);
    }

    fn write_text(&mut self, tag: &str, text: &str, step: usize) {
        self.write(tag, RecordValue::String(text.to_string()), step);
    }

    fn write(&mut self, tag: &str, value: RecordValue, step: usize) {
        if let Some(writer) = self.writer.as_mut() {
            let record = Record::from_slice(&[
                (STEP_KEY.to_string(), RecordValue::Scalar(step as f32)),
                (tag.to_string(), value),
            ]);
            writer.write(record);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::BufferedRecorderFactory;
    use std::path::Path;

    fn logger(is_logging: bool) -> (PlanningLogger, BufferedRecorderFactory) {
        let factory = BufferedRecorderFactory::new();
        let logger = PlanningLogger::new(is_logging, "logs", Arc::new(factory.clone()));
        (logger, factory)
    }

    #[test]
    fn test_disabled_logger_writes_nothing() {
        let (mut logger, factory) = logger(false);
        logger.start("session");
        logger.log_trial_reward("forward", 0, 1.0, 2.0);
        logger.close();
        assert!(factory.logdirs().is_empty());
        assert!(factory.recorder().records().is_empty());
    }

    #[test]
    fn test_trial_rewards_and_summaries() {
        let (mut logger, factory) = logger(true);
        logger.start("session");
        logger.log_trial_reward("forward", 3, 10.0, 12.0);
        logger.log_custom_result("forward", 3, "done");
        logger.log_reward_mean_std("forward", &[1.0, 3.0]);
        logger.close();

        assert_eq!(
            factory.logdirs(),
            vec![Path::new("logs").join("planning_test").join("session")]
        );
        let records = factory.recorder().records();
        assert_eq!(records.len(), 4);
        assert_eq!(records[0].get_scalar("forward/Max reward per trial").unwrap(), 12.0);
        assert_eq!(records[1].get_scalar("forward/Total reward per trial").unwrap(), 10.0);
        assert_eq!(records[1].get_scalar(STEP_KEY).unwrap(), 3.0);
        assert_eq!(records[2].get_string("forward/results").unwrap(), "done");
        assert_eq!(
            records[3]
                .get_string("forward/Mean and stddev reward of 2 trials")
                .unwrap(),
            "Mean: 2 +- 1"
        );
        assert_eq!(factory.recorder().n_flushes(), 1);
    }

    #[test]
    fn test_iteration_rewards_and_flush() {
        let (mut logger, factory) = logger(true);
        logger.start("tuning");
        logger.log_iteration_max_reward("forward", 3, 2, 8.0);
        logger.log_iteration_avg_reward("forward", 3, 2, 6.0);
        logger.flush();
        assert_eq!(factory.recorder().n_flushes(), 1);

        let records = factory.recorder().records();
        assert_eq!(records.len(), 2);
        assert_eq!(
            records[0]
                .get_scalar("forward/Average Max reward  of 3 trials per iteration")
                .unwrap(),
            8.0
        );
        assert_eq!(
            records[1]
                .get_scalar("forward/Average Total reward of 3 trials per iteration")
                .unwrap(),
            6.0
        );
        assert!(records.iter().all(|r| r.get_scalar(STEP_KEY).unwrap() == 2.0));

        logger.close();
        assert_eq!(factory.recorder().n_flushes(), 2);
        // Closed loggers drop events.
        logger.log_iteration_avg_reward("forward", 3, 3, 1.0);
        logger.flush();
        assert_eq!(factory.recorder().records().len(), 2);
        assert_eq!(factory.recorder().n_flushes(), 2);
    }
}
