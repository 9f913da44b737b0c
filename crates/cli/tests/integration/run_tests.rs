//! Tests for `capsa run` against real processes.

use predicates::prelude::*;
use serial_test::serial;

use crate::common::TestEnv;

#[test]
fn run_streams_prefixed_output() {
  let env = TestEnv::with_manifest(
    r#"{ "components": [
      { "id": "a", "status": "modified", "config": { "run": { "build": ["echo built"] } } }
    ] }"#,
  );

  env
    .capsa_cmd()
    .args(["run", "build"])
    .assert()
    .success()
    .stdout(predicate::str::contains("[a] built"))
    .stdout(predicate::str::contains("1 succeeded, 0 failed"));
}

#[test]
fn run_skips_component_without_pipeline() {
  let env = TestEnv::with_manifest(
    r#"{ "components": [
      { "id": "core/utils", "status": "new", "config": { "run": { "build": ["echo built"] } } }
    ] }"#,
  );

  env
    .capsa_cmd()
    .args(["run", "test"])
    .assert()
    .success()
    .stdout(predicate::str::contains(
      "skipping component core/utils, it has no defined 'test'",
    ));
}

#[test]
fn failing_component_fails_run_but_not_others() {
  let env = TestEnv::with_manifest(
    r#"{ "components": [
      { "id": "a", "status": "modified", "config": { "run": { "build": ["echo fine"] } } },
      { "id": "b", "status": "modified", "config": { "run": { "build": ["./fail.sh", "echo unreachable"] } } }
    ] }"#,
  );
  env.write_script("b/fail.sh", "#!/bin/sh\necho about to fail\nexit 1\n");

  env
    .capsa_cmd()
    .args(["run", "build"])
    .assert()
    .code(1)
    .stdout(predicate::str::contains("[a] fine"))
    .stdout(predicate::str::contains("[b] about to fail"))
    .stdout(predicate::str::contains("b failed at step 0"))
    .stdout(predicate::str::contains("unreachable").not())
    .stdout(predicate::str::contains("1 succeeded, 1 failed"));
}

#[test]
fn explicit_components_override_selection() {
  let env = TestEnv::with_manifest(
    r#"{ "components": [
      { "id": "a", "config": { "run": { "build": ["echo from-a"] } } },
      { "id": "b", "status": "modified", "config": { "run": { "build": ["echo from-b"] } } }
    ] }"#,
  );

  env
    .capsa_cmd()
    .args(["run", "build", "a"])
    .assert()
    .success()
    .stdout(predicate::str::contains("[a] from-a"))
    .stdout(predicate::str::contains("from-b").not());
}

#[test]
fn unknown_component_aborts_run() {
  let env = TestEnv::with_manifest(
    r#"{ "components": [
      { "id": "a", "config": { "run": { "build": ["echo from-a"] } } }
    ] }"#,
  );

  env
    .capsa_cmd()
    .args(["run", "build", "a", "ghost"])
    .assert()
    .failure()
    .stdout(predicate::str::contains("from-a").not())
    .stderr(predicate::str::contains("component not found: ghost"));
}

#[test]
fn builtin_describe_task_runs_in_process() {
  let env = TestEnv::with_manifest(
    r#"{ "components": [
      { "id": "a", "status": "new", "config": { "run": { "build": ["describe"] } } }
    ] }"#,
  );

  env
    .capsa_cmd()
    .args(["run", "build"])
    .assert()
    .success()
    .stdout(predicate::str::contains("[a] component a"))
    .stdout(predicate::str::contains("[a] pipelines: build"));
}

#[test]
fn json_summary_reports_outcomes() {
  let env = TestEnv::with_manifest(
    r#"{ "components": [
      { "id": "a", "status": "modified", "config": { "run": { "build": ["true"] } } },
      { "id": "b", "status": "modified", "config": { "run": { "build": ["false"] } } },
      { "id": "c", "status": "new", "config": { "run": { "test": ["true"] } } }
    ] }"#,
  );

  let output = env
    .capsa_cmd()
    .args(["run", "build", "--output", "json"])
    .output()
    .unwrap();
  assert_eq!(output.status.code(), Some(1));

  let summary: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  assert_eq!(summary["pipeline"], "build");
  assert_eq!(summary["success"], false);
  assert_eq!(summary["components"][0]["outcome"], "succeeded");
  assert_eq!(summary["components"][1]["outcome"], "failed");
  assert_eq!(summary["components"][1]["failed_step"], 0);
  assert_eq!(summary["components"][1]["exit_code"], 1);
  assert_eq!(summary["components"][2]["outcome"], "skipped");
}

#[test]
#[serial]
fn timeout_cancels_long_running_step() {
  let env = TestEnv::with_manifest(
    r#"{ "components": [
      { "id": "slow", "status": "modified", "config": { "run": { "build": ["sleep 30", "echo after"] } } }
    ] }"#,
  );

  env
    .capsa_cmd()
    .args(["run", "build", "--timeout", "300ms"])
    .timeout(std::time::Duration::from_secs(20))
    .assert()
    .code(1)
    .stdout(predicate::str::contains("slow cancelled"))
    .stdout(predicate::str::contains("after").not());
}

#[test]
#[serial]
fn parallelism_from_environment() {
  let env = TestEnv::with_manifest(
    r#"{ "components": [
      { "id": "a", "status": "modified", "config": { "run": { "build": ["echo one"] } } },
      { "id": "b", "status": "modified", "config": { "run": { "build": ["echo two"] } } }
    ] }"#,
  );

  env
    .capsa_cmd()
    .env("CAPSA_PARALLELISM", "1")
    .args(["run", "build"])
    .assert()
    .success()
    .stdout(predicate::str::contains("2 succeeded"));
}

#[test]
fn env_flag_reaches_commands() {
  let env = TestEnv::with_manifest(
    r#"{ "components": [
      { "id": "a", "status": "modified", "config": { "run": { "build": ["./greet.sh"] } } }
    ] }"#,
  );
  env.write_script("a/greet.sh", "#!/bin/sh\necho \"greeting=$GREETING\"\n");

  env
    .capsa_cmd()
    .args(["run", "build", "--env", "GREETING=hello"])
    .assert()
    .success()
    .stdout(predicate::str::contains("[a] greeting=hello"));
}

#[test]
fn without_host_path_bare_programs_are_not_found() {
  let env = TestEnv::with_manifest(
    r#"{ "components": [
      { "id": "a", "status": "modified", "config": { "run": { "build": ["echo hi"] } } }
    ] }"#,
  );

  env
    .capsa_cmd()
    .args(["run", "build", "--no-inherit-path"])
    .assert()
    .code(1)
    .stdout(predicate::str::contains("a failed at step 0 'echo hi': failed to start"));
}
