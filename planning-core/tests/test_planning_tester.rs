use anyhow::Result;
use planning_core::{
    dummy::{
        EchoSimConfig, EchoSimulatedEnv, ScriptedAgent, ScriptedAgentConfig, ScriptedEnv,
        ScriptedEnvConfig,
    },
    error::PlanningError,
    record::{BufferedRecorderFactory, NullRecorderFactory, RecorderFactory},
    session::SESSION_EXTENSION,
    PlanningTester, SpawnDiscipline, TestArgs, TestOutcome, TestSuite, TesterConfig,
};
use std::{path::Path, sync::Arc};
use tempdir::TempDir;
use test_log::test;

struct Suite;

impl TestSuite<f32> for Suite {
    fn tests(&self) -> Vec<(String, TestArgs<f32>)> {
        vec![
            (
                "forward".to_string(),
                TestArgs::new("forward", 5)
                    .custom_seed(Some(1))
                    .baselines(5.0, 0.0),
            ),
            (
                "turn".to_string(),
                TestArgs::new("turn - seed: 2", 4)
                    .custom_seed(Some(2))
                    .start_track(3)
                    .pre_actions(vec![1.0]),
            ),
        ]
    }
}

type Tester = PlanningTester<ScriptedEnv, EchoSimulatedEnv, ScriptedAgent, Suite>;

fn config(dir: &Path) -> TesterConfig {
    TesterConfig::default()
        .game("dummy")
        .experiment_name("it")
        .trials(3)
        .planning_test_log_dir(dir.join("sessions"))
        .log_dir(dir.join("logs"))
}

fn tester(config: TesterConfig, factory: Arc<dyn RecorderFactory>) -> Result<Tester> {
    let env_config = ScriptedEnvConfig::with_rewards(vec![0.5, -1.0, 2.0, 0.0, 1.0]);
    let agent_config = ScriptedAgentConfig {
        actions: vec![1.0, -0.5],
        ..Default::default()
    };
    Tester::build(config, env_config, EchoSimConfig, agent_config, Suite, factory)
}

fn session_stems(dir: &Path) -> Result<Vec<String>> {
    let mut stems = vec![];
    for entry in std::fs::read_dir(dir.join("sessions"))? {
        let path = entry?.path();
        assert_eq!(path.extension().unwrap(), SESSION_EXTENSION);
        stems.push(path.file_stem().unwrap().to_string_lossy().to_string());
    }
    Ok(stems)
}

#[test]
fn test_sequential_session_is_saved() -> Result<()> {
    let tmp = TempDir::new("planning_tester")?;
    let mut tester = tester(config(tmp.path()), Arc::new(NullRecorderFactory::default()))?;
    let total = tester.run_tests(None)?;
    assert_eq!(total, 9.0);

    let stems = session_stems(tmp.path())?;
    assert_eq!(stems.len(), 1);
    assert!(stems[0].starts_with("dummy_RHEA_it_planning_session_"));
    assert!(stems[0].ends_with("_total_session_best_reward_9"));

    let session = tester.store().load::<f32>(&stems[0])?;
    assert_eq!(session.agent_type, "RHEA");
    assert_eq!(session.agent_params["agent_parameters"]["actions"][1], -0.5);
    assert!(session.agent_params["evolution_settings"].is_null());
    assert_eq!(session.total_best_reward(), total);

    let forward = &session.test_results["forward"];
    assert_eq!(forward.total_rewards, vec![4.5; 3]);
    assert_eq!(forward.seeds, vec![Some(1); 3]);
    assert_eq!(forward.action_histories[0], vec![1.0, -0.5, 1.0, -0.5, 1.0]);
    assert_eq!(forward.elites[0].len(), 5);

    let turn = &session.test_results["turn"];
    assert_eq!(turn.action_histories[0].len(), 4);
    Ok(())
}

#[test]
fn test_pooled_runs_match_sequential_run() -> Result<()> {
    let tmp = TempDir::new("planning_tester")?;
    let factory: Arc<dyn RecorderFactory> = Arc::new(NullRecorderFactory::default());

    let base = config(tmp.path());
    let configs = vec![
        base.clone(),
        base.clone().multithread_trials(true).fixed_cores(Some(2)),
        base.clone()
            .multithread_trials(true)
            .spawn(SpawnDiscipline::Concurrent),
        base.clone().multithread_tests(true),
    ];

    let mut results = vec![];
    for config in configs.into_iter() {
        let mut tester = tester(config, factory.clone())?;
        let forward = tester.run_specific_test("forward", None)?.result;
        let turn = tester.run_specific_test("turn", None)?.result;
        results.push((forward, turn));
    }
    for r in results.iter().skip(1) {
        assert_eq!(r, &results[0]);
    }
    Ok(())
}

#[test]
fn test_multithread_tests_session() -> Result<()> {
    let tmp = TempDir::new("planning_tester")?;
    let config = config(tmp.path()).multithread_tests(true);
    let mut tester = tester(config, Arc::new(NullRecorderFactory::default()))?;
    assert_eq!(tester.run_tests(None)?, 9.0);

    let stems = session_stems(tmp.path())?;
    let session = tester.store().load::<f32>(&stems[0])?;
    assert_eq!(
        session.test_results.keys().collect::<Vec<_>>(),
        vec!["forward", "turn"]
    );
    Ok(())
}

#[test]
fn test_cached_session_is_replayed() -> Result<()> {
    let tmp = TempDir::new("planning_tester")?;
    let factory: Arc<dyn RecorderFactory> = Arc::new(NullRecorderFactory::default());
    let total = tester(config(tmp.path()), factory.clone())?.run_tests(None)?;
    let stem = session_stems(tmp.path())?.remove(0);

    let config = config(tmp.path()).reload_planning_session(stem.clone());
    let mut tester = tester(config, factory)?;
    assert_eq!(tester.run_tests(None)?, total);
    assert_eq!(session_stems(tmp.path())?.len(), 1);

    let report = tester.run_cached_session(&stem)?;
    assert_eq!(report.total_best_reward, total);
    assert_eq!(report.replayed_reward, total);
    Ok(())
}

#[test]
fn test_missing_cached_session_runs_new_session() -> Result<()> {
    let tmp = TempDir::new("planning_tester")?;
    let config = config(tmp.path()).reload_planning_session("missing");
    let mut tester = tester(config, Arc::new(NullRecorderFactory::default()))?;
    assert_eq!(tester.run_tests(None)?, 9.0);
    assert_eq!(session_stems(tmp.path())?.len(), 1);
    Ok(())
}

#[test]
fn test_run_plan_or_replay() -> Result<()> {
    let tmp = TempDir::new("planning_tester")?;
    let mut tester = tester(config(tmp.path()), Arc::new(NullRecorderFactory::default()))?;
    let args = tester.suite().test("forward").unwrap();

    let run = match tester.run_plan_or_replay("forward", &args)? {
        TestOutcome::Planned(run) => run,
        TestOutcome::Replayed(_) => panic!("expected a planned test"),
    };
    let best = run.result.best_trial()?;
    assert_eq!(best.trial, 1);

    let replay_args = args.replay(best.action_history.clone(), best.elites, best.seed);
    match tester.run_plan_or_replay("forward", &replay_args)? {
        TestOutcome::Replayed(replay) => {
            assert_eq!(replay.action_history, best.action_history);
            assert_eq!(replay.total_reward, best.reward);
        }
        TestOutcome::Planned(_) => panic!("expected a replay"),
    }
    Ok(())
}

#[test]
fn test_unknown_test() -> Result<()> {
    let tmp = TempDir::new("planning_tester")?;
    let mut tester = tester(config(tmp.path()), Arc::new(NullRecorderFactory::default()))?;
    let err = tester.run_specific_test("reverse", None).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<PlanningError>(),
        Some(PlanningError::UnknownTest(name)) if name == "reverse"
    ));
    Ok(())
}

#[test]
fn test_metrics_of_a_test() -> Result<()> {
    let tmp = TempDir::new("planning_tester")?;
    let factory = BufferedRecorderFactory::new();
    let config = config(tmp.path()).logging(true);
    let mut tester = tester(config, Arc::new(factory.clone()))?;
    let run = tester.run_specific_test("turn", Some("custom_run"))?;
    assert_eq!(tester.session_name(), "custom_run");
    assert_eq!(run.messages.len(), 3);
    assert_eq!(run.max_rewards.len(), 3);

    assert_eq!(
        factory.logdirs(),
        vec![tmp.path().join("logs").join("planning_test").join("custom_run")]
    );
    let records = factory.recorder().records();
    let tag = "turn - seed: 2/Total reward per trial";
    let steps: Vec<f32> = records
        .iter()
        .filter(|r| r.get(tag).is_some())
        .map(|r| r.get_scalar("step").unwrap())
        .collect();
    assert_eq!(steps, vec![0.0, 1.0, 2.0]);
    assert!(records.iter().any(|r| r.get("turn - seed: 2/RHEA").is_some()));
    assert!(records
        .iter()
        .any(|r| r.get("turn - seed: 2/Mean and stddev reward of 3 trials").is_some()));
    Ok(())
}
