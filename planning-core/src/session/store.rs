use super::{Session, TestResult};
use crate::{error::PlanningError, util::round_to, Act};
use anyhow::Result;
use chrono::{DateTime, Local};
use log::info;
use std::{
    collections::BTreeMap,
    fs::{self, File},
    io::{BufReader, BufWriter, Write},
    path::{Path, PathBuf},
};

/// Extension of session files.
pub const SESSION_EXTENSION: &str = "json";

/// Stores sessions as JSON files in a directory.
///
/// Every save creates a new file named after the game, the agent, the
/// experiment, the time of the save and the total best reward of the session.
pub struct SessionStore {
    planning_dir: PathBuf,
}

impl SessionStore {
    /// Constructs a store writing into `planning_dir`.
    pub fn new(planning_dir: impl Into<PathBuf>) -> Self {
        Self {
            planning_dir: planning_dir.into(),
        }
    }

    /// The directory of the session files.
    pub fn dir(&self) -> &Path {
        &self.planning_dir
    }

    /// File stem of a session.
    ///
    /// `{game}_{NTBEA_}{agent_type}_{experiment_name}_planning_session_{YYYY-MM-DD-HH.MM}_total_session_best_reward_{reward}`,
    /// where `NTBEA_` marks sessions run while tuning and the reward is rounded to 4 digits.
    pub fn session_name(
        game: &str,
        is_tuning: bool,
        agent_type: &str,
        experiment_name: &str,
        time: &DateTime<Local>,
        total_best_reward: f32,
    ) -> String {
        format!(
            "{}_{}{}_{}_planning_session_{}_total_session_best_reward_{}",
            game,
            if is_tuning { "NTBEA_" } else { "" },
            agent_type,
            experiment_name,
            time.format("%Y-%m-%d-%H.%M"),
            round_to(total_best_reward, 4)
        )
    }

    /// Path of the session file with the given stem.
    pub fn path_of(&self, session_name: &str) -> PathBuf {
        self.planning_dir
            .join(format!("{}.{}", session_name, SESSION_EXTENSION))
    }

    /// Returns `true` if the session file exists.
    pub fn exists(&self, session_name: &str) -> bool {
        self.path_of(session_name).is_file()
    }

    /// Writes a session and returns the path of the new file.
    pub fn save<A: Act>(
        &self,
        session: &Session<A>,
        game: &str,
        experiment_name: &str,
        is_tuning: bool,
    ) -> Result<PathBuf> {
        fs::create_dir_all(&self.planning_dir)?;
        let name = Self::session_name(
            game,
            is_tuning,
            &session.agent_type,
            experiment_name,
            &Local::now(),
            session.total_best_reward(),
        );
        let path = self.path_of(&name);
        let mut writer = BufWriter::new(File::create(&path)?);
        serde_json::to_writer(&mut writer, session)?;
        writer.flush()?;
        info!("Results saved at: {:?}", path);
        Ok(path)
    }

    /// Reads the session file with the given stem.
    ///
    /// Fails with [`PlanningError::SessionNotFound`] if the file does not exist and
    /// with [`PlanningError::SessionFormat`] if it cannot be decoded.
    pub fn load<A: Act>(&self, session_name: &str) -> Result<Session<A>> {
        let path = self.path_of(session_name);
        if !path.is_file() {
            return Err(PlanningError::SessionNotFound(path).into());
        }
        let rdr = BufReader::new(File::open(&path)?);
        let session: Session<A> = serde_json::from_reader(rdr)
            .map_err(|source| PlanningError::SessionFormat {
                path: path.clone(),
                source,
            })?;
        for result in session.test_results.values() {
            result.validate()?;
        }
        info!("Loaded session {:?}", path);
        info!("Agent parameters: {}", session.agent_params);
        Ok(session)
    }

    /// Reads the test results of a session.
    pub fn load_test_results<A: Act>(
        &self,
        session_name: &str,
    ) -> Result<BTreeMap<String, TestResult<A>>> {
        Ok(self.load(session_name)?.test_results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Elite;
    use chrono::TimeZone;
    use tempdir::TempDir;

    fn session() -> Session<Vec<f32>> {
        let mut a = TestResult::new("planning_forward_test");
        a.push(
            vec![vec![0.0, 1.0, 0.0], vec![0.5, 0.5, 0.0]],
            12.5,
            vec![
                vec![Elite::new(3.25, vec![vec![0.0, 1.0, 0.0]])],
                vec![Elite::new(4.0, vec![vec![0.5, 0.5, 0.0]])],
            ],
            Some(9214),
        );
        a.push(vec![vec![1.0, 0.0, 0.0]], -3.0, vec![vec![]], None);
        let mut test_results = BTreeMap::new();
        test_results.insert(a.name.clone(), a);
        Session {
            agent_type: "RHEA".to_string(),
            agent_params: serde_json::json!({"agent_parameters": {"horizon": 20}}),
            test_results,
        }
    }

    #[test]
    fn test_session_name() {
        let time = Local.with_ymd_and_hms(2021, 3, 4, 15, 7, 59).unwrap();
        let name = SessionStore::session_name("car_racing", true, "RHEA", "exp", &time, 33.123456);
        assert_eq!(
            name,
            "car_racing_NTBEA_RHEA_exp_planning_session_2021-03-04-15.07_total_session_best_reward_33.1235"
        );
        let name = SessionStore::session_name("car_racing", false, "MCTS", "exp", &time, 33.0);
        assert_eq!(
            name,
            "car_racing_MCTS_exp_planning_session_2021-03-04-15.07_total_session_best_reward_33"
        );
    }

    #[test]
    fn test_save_and_load() -> Result<()> {
        let dir = TempDir::new("session_store")?;
        let store = SessionStore::new(dir.path().join("sessions"));
        let session = session();
        let path = store.save(&session, "car_racing", "exp", false)?;
        assert!(path.is_file());

        let stem = path.file_stem().unwrap().to_str().unwrap().to_string();
        assert!(stem.ends_with("_total_session_best_reward_12.5"));
        assert!(store.exists(&stem));
        let loaded: Session<Vec<f32>> = store.load(&stem)?;
        assert_eq!(loaded, session);
        Ok(())
    }

    #[test]
    fn test_load_missing_session() -> Result<()> {
        let dir = TempDir::new("session_store")?;
        let store = SessionStore::new(dir.path());
        assert!(!store.exists("nothing"));
        let e = store.load::<f32>("nothing").unwrap_err();
        assert!(matches!(
            e.downcast_ref::<PlanningError>(),
            Some(PlanningError::SessionNotFound(_))
        ));
        Ok(())
    }

    #[test]
    fn test_load_corrupt_session() -> Result<()> {
        let dir = TempDir::new("session_store")?;
        let store = SessionStore::new(dir.path());
        fs::write(store.path_of("corrupt"), b"{\"agent_type\": 3")?;
        let e = store.load::<f32>("corrupt").unwrap_err();
        assert!(matches!(
            e.downcast_ref::<PlanningError>(),
            Some(PlanningError::SessionFormat { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_load_legacy_session() -> Result<()> {
        let dir = TempDir::new("session_store")?;
        let store = SessionStore::new(dir.path());
        let json = r#"{
            "agent_type": "RMHC",
            "agent_params": {},
            "test_results": {
                "planning_left_turn_test": ["planning_left_turn_test", [[1.0], [2.0], [3.0]], [1.0, 7.0, 2.0], [[], [], []]]
            }
        }"#;
        fs::write(store.path_of("legacy"), json)?;
        let results = store.load_test_results::<f32>("legacy")?;
        let result = &results["planning_left_turn_test"];
        assert_eq!(result.seeds, vec![None, None, None]);
        let best = result.best_trial()?;
        assert_eq!(best.trial, 2);
        assert_eq!(best.action_history, vec![2.0]);
        Ok(())
    }
}
