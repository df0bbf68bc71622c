//! Grid-search tuning against a hand-labeled ground truth.

use std::path::{Path, PathBuf};

use logminer::{Error, MinerConfig, ParserTuner};

const LOG: &str = "10:00 User alice logged in\n\
                   10:01 User bob logged in\n\
                   10:02 Connection from host1 closed\n\
                   10:03 Connection from host2 closed\n\
                   10:04 User carol logged out\n";

fn write_fixture(dir: &Path, st_max: f64) -> (PathBuf, PathBuf) {
    std::fs::write(dir.join("app.log"), LOG).unwrap();

    // ground truth: logins together, connections together, logout alone
    let truth = dir.join("app.log_structured.csv");
    let mut writer = csv::Writer::from_path(&truth).unwrap();
    writer.write_record(["LineId", "EventId"]).unwrap();
    for (line, event) in [(1, "E1"), (2, "E1"), (3, "E2"), (4, "E2"), (5, "E3")] {
        writer.write_record([line.to_string(), event.to_string()]).unwrap();
    }
    writer.flush().unwrap();

    let config = dir.join("tuning.yaml");
    std::fs::write(
        &config,
        format!(
            "log_format: \"<Time> <Content>\"\n\
             preprocess: []\n\
             logparser:\n\
             \x20 method: drain\n\
             \x20 parameters:\n\
             \x20\x20\x20 st: {{min: 0.2, max: {st_max}, step: 0.2}}\n\
             \x20\x20\x20 depth: {{min: 4, max: 4, step: 1}}\n"
        ),
    )
    .unwrap();
    (config, truth)
}

#[test]
fn selects_the_accuracy_maximizing_grid_point() {
    let dir = tempfile::tempdir().unwrap();
    let (config, truth) = write_fixture(dir.path(), 0.6);

    let mut tuner = ParserTuner::from_config_file(&config).unwrap();
    assert_eq!(tuner.grid().len(), 3); // st in [0.2, 0.4, 0.6]

    let out_dir = dir.path().join("tuning");
    let outcome = tuner.tune("app.log", dir.path(), &out_dir, &truth).unwrap();

    // at st 0.2/0.4 the logout line merges into the login cluster; only
    // st 0.6 reproduces the ground-truth grouping exactly
    assert_eq!(outcome.optimal_index, 2);
    assert!((outcome.optimal_parameters["st"] - 0.6).abs() < 1e-9);
    assert_eq!(outcome.records.len(), 3);
    assert!(outcome.records[2].scores.accuracy > outcome.records[0].scores.accuracy);

    // every grid point left its artifacts behind
    for idx in 0..3 {
        assert!(out_dir
            .join(format!("run_{idx}"))
            .join("app.log_structured.csv")
            .exists());
    }
    assert!(outcome.record_path.exists());

    // the human-readable companion log sits next to the record table
    let has_tuning_log = std::fs::read_dir(&out_dir).unwrap().any(|entry| {
        entry
            .unwrap()
            .file_name()
            .to_string_lossy()
            .starts_with("data_miner_tuning_log_")
    });
    assert!(has_tuning_log);
}

#[test]
fn ties_resolve_to_the_first_grid_point() {
    let dir = tempfile::tempdir().unwrap();
    // only the easy lines: every st in [0.2, 0.4] clusters them identically
    std::fs::write(
        dir.path().join("app.log"),
        "10:00 User alice logged in\n10:01 User bob logged in\n",
    )
    .unwrap();
    let truth = dir.path().join("truth.csv");
    std::fs::write(&truth, "LineId,EventId\n1,E1\n2,E1\n").unwrap();
    let config = dir.path().join("tuning.yaml");
    std::fs::write(
        &config,
        "log_format: \"<Time> <Content>\"\n\
         logparser:\n\
         \x20 method: drain\n\
         \x20 parameters:\n\
         \x20\x20\x20 st: {min: 0.2, max: 0.4, step: 0.2}\n",
    )
    .unwrap();

    let mut tuner = ParserTuner::from_config_file(&config).unwrap();
    let outcome = tuner
        .tune("app.log", dir.path(), &dir.path().join("tuning"), &truth)
        .unwrap();
    assert_eq!(outcome.records.len(), 2);
    assert_eq!(
        outcome.records[0].scores.accuracy,
        outcome.records[1].scores.accuracy
    );
    assert_eq!(outcome.optimal_index, 0);
}

#[test]
fn rerunning_is_deterministic() {
    let dir = tempfile::tempdir().unwrap();
    let (config, truth) = write_fixture(dir.path(), 0.6);

    let mut first = ParserTuner::from_config_file(&config).unwrap();
    let a = first
        .tune("app.log", dir.path(), &dir.path().join("t1"), &truth)
        .unwrap();
    let mut second = ParserTuner::from_config_file(&config).unwrap();
    let b = second
        .tune("app.log", dir.path(), &dir.path().join("t2"), &truth)
        .unwrap();

    assert_eq!(a.optimal_index, b.optimal_index);
    assert_eq!(a.optimal_parameters, b.optimal_parameters);
    let a_scores: Vec<_> = a.records.iter().map(|r| r.scores.accuracy).collect();
    let b_scores: Vec<_> = b.records.iter().map(|r| r.scores.accuracy).collect();
    assert_eq!(a_scores, b_scores);
}

#[test]
fn a_failing_grid_point_aborts_with_its_index() {
    let dir = tempfile::tempdir().unwrap();
    let (config, truth) = write_fixture(dir.path(), 0.6);
    // break every backend construction with a malformed preprocess rule
    let broken = std::fs::read_to_string(&config)
        .unwrap()
        .replace("preprocess: []", "preprocess: ['(unclosed']");
    std::fs::write(&config, broken).unwrap();

    let mut tuner = ParserTuner::from_config_file(&config).unwrap();
    let err = tuner
        .tune("app.log", dir.path(), &dir.path().join("tuning"), &truth)
        .unwrap_err();
    match err {
        Error::GridPoint { index, parameters, .. } => {
            assert_eq!(index, 0);
            assert!(parameters.contains_key("st"));
        }
        other => panic!("expected GridPoint error, got {other}"),
    }
}

#[test]
fn optimal_config_template_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let (config, truth) = write_fixture(dir.path(), 0.6);

    let mut tuner = ParserTuner::from_config_file(&config).unwrap();
    let out_dir = dir.path().join("tuning");
    let outcome = tuner.tune("app.log", dir.path(), &out_dir, &truth).unwrap();

    let new_config = tuner.write_optimal_config(&out_dir).unwrap();
    let reloaded = MinerConfig::from_file(&new_config).unwrap();
    let fixed = reloaded.fixed_parameters().unwrap();
    assert_eq!(fixed["st"], outcome.optimal_parameters["st"]);
    assert_eq!(fixed["depth"], 4.0);
}
