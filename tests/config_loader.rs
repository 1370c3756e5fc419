// tests/config_loader.rs

use std::error::Error;
use std::io::Write;

use jobflow::config::loader::{load_and_validate, load_from_path};
use jobflow::errors::JobflowError;
use jobflow::types::ExecutionMode;
use tempfile::NamedTempFile;

type TestResult = Result<(), Box<dyn Error>>;

fn write_config(contents: &str) -> Result<NamedTempFile, Box<dyn Error>> {
    let mut file = NamedTempFile::new()?;
    file.write_all(contents.as_bytes())?;
    file.flush()?;
    Ok(file)
}

fn config_error(contents: &str) -> String {
    let file = write_config(contents).unwrap();
    match load_and_validate(file.path()) {
        Err(JobflowError::ConfigError(msg)) => msg,
        other => panic!("expected ConfigError, got {other:?}"),
    }
}

const PIPELINE: &str = r#"
[config]
mode = "standalone"
max_nb_of_workers = 3

[data_node.raw]
path = "raw.txt"

[data_node.clean]
path = "clean.txt"
validity_secs = 60

[task.clean]
cmd = "cp $JOBFLOW_INPUT_RAW $JOBFLOW_OUTPUT_CLEAN"
inputs = ["raw"]
outputs = ["clean"]
skippable = true

[task.report]
cmd = "wc -l $JOBFLOW_INPUT_CLEAN"
inputs = ["clean"]
"#;

#[test]
fn valid_pipeline_loads() -> TestResult {
    let file = write_config(PIPELINE)?;
    let cfg = load_and_validate(file.path())?;

    assert_eq!(cfg.config.mode, ExecutionMode::Standalone);
    assert_eq!(cfg.config.max_nb_of_workers, 3);
    assert_eq!(cfg.data_node.len(), 2);
    assert_eq!(cfg.data_node["clean"].validity_secs, Some(60));
    assert_eq!(cfg.data_node["raw"].validity_secs, None);

    let clean = &cfg.task["clean"];
    assert!(clean.skippable);
    assert_eq!(clean.inputs, vec!["raw"]);
    assert!(!cfg.task["report"].skippable);
    assert!(cfg.task["report"].outputs.is_empty());

    assert_eq!(cfg.producer_of("clean"), Some("clean"));
    assert_eq!(cfg.producer_of("raw"), None);
    Ok(())
}

#[test]
fn config_section_defaults_to_development_with_one_worker() -> TestResult {
    let file = write_config(
        r#"
[task.hello]
cmd = "echo hello"
"#,
    )?;
    let cfg = load_and_validate(file.path())?;
    assert_eq!(cfg.config.mode, ExecutionMode::Development);
    assert_eq!(cfg.config.max_nb_of_workers, 1);
    Ok(())
}

#[test]
fn unknown_data_node_is_rejected() {
    let msg = config_error(
        r#"
[task.t]
cmd = "true"
inputs = ["missing"]
"#,
    );
    assert!(msg.contains("unknown data node 'missing'"), "{msg}");
    assert!(msg.contains("`inputs`"), "{msg}");
}

#[test]
fn two_producers_for_one_node_are_rejected() {
    let msg = config_error(
        r#"
[data_node.out]
path = "out.txt"

[task.a]
cmd = "true"
outputs = ["out"]

[task.b]
cmd = "true"
outputs = ["out"]
"#,
    );
    assert!(msg.contains("written by both 'a' and 'b'"), "{msg}");
}

#[test]
fn task_reading_its_own_output_is_rejected() {
    let msg = config_error(
        r#"
[data_node.x]
path = "x.txt"

[task.t]
cmd = "true"
inputs = ["x"]
outputs = ["x"]
"#,
    );
    assert!(msg.contains("cannot read its own output 'x'"), "{msg}");
}

#[test]
fn cycle_between_tasks_is_rejected() -> TestResult {
    let file = write_config(
        r#"
[data_node.a]
path = "a.txt"

[data_node.b]
path = "b.txt"

[task.ping]
cmd = "true"
inputs = ["b"]
outputs = ["a"]

[task.pong]
cmd = "true"
inputs = ["a"]
outputs = ["b"]
"#,
    )?;

    match load_and_validate(file.path()) {
        Err(JobflowError::DagCycle(msg)) => assert!(msg.contains("cycle detected")),
        other => panic!("expected DagCycle, got {other:?}"),
    }
    Ok(())
}

#[test]
fn zero_workers_is_rejected() {
    let msg = config_error(
        r#"
[config]
max_nb_of_workers = 0

[task.t]
cmd = "true"
"#,
    );
    assert!(msg.contains("max_nb_of_workers"), "{msg}");
}

#[test]
fn unknown_mode_is_rejected() {
    let msg = config_error(
        r#"
[config]
mode = "cluster"

[task.t]
cmd = "true"
"#,
    );
    assert!(msg.contains("cluster"), "{msg}");
}

#[test]
fn empty_command_is_rejected() {
    let msg = config_error(
        r#"
[task.t]
cmd = "   "
"#,
    );
    assert!(msg.contains("empty `cmd`"), "{msg}");
}

#[test]
fn workflow_without_tasks_is_rejected() {
    let msg = config_error(
        r#"
[data_node.a]
path = "a.txt"
"#,
    );
    assert!(msg.contains("at least one"), "{msg}");
}

#[test]
fn invalid_toml_is_a_parse_error() -> TestResult {
    let file = write_config("[task.t\ncmd = ")?;
    assert!(matches!(
        load_from_path(file.path()),
        Err(JobflowError::TomlError(_))
    ));
    Ok(())
}

#[test]
fn missing_file_is_an_io_error() {
    assert!(matches!(
        load_and_validate("/definitely/not/here/Jobflow.toml"),
        Err(JobflowError::IoError(_))
    ));
}
