//! Tests for `capsa list`.

use predicates::prelude::*;

use crate::common::TestEnv;

const WORKSPACE: &str = r#"{
  "components": [
    {
      "id": "ui/button",
      "path": "components/button",
      "status": "modified",
      "config": { "run": { "build": ["echo build"], "test": ["echo test"] } }
    },
    { "id": "core/utils" }
  ]
}"#;

#[test]
fn list_shows_components_and_pipelines() {
  let env = TestEnv::with_manifest(WORKSPACE);

  env
    .capsa_cmd()
    .arg("list")
    .assert()
    .success()
    .stdout(predicate::str::contains("ui/button [modified]"))
    .stdout(predicate::str::contains("components/button"))
    .stdout(predicate::str::contains("build, test"))
    .stdout(predicate::str::contains("core/utils [clean]"))
    .stdout(predicate::str::contains("(none)"));
}

#[test]
fn list_as_json() {
  let env = TestEnv::with_manifest(WORKSPACE);

  let output = env.capsa_cmd().args(["list", "--output", "json"]).output().unwrap();
  assert!(output.status.success());

  let listing: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
  let components = listing.as_array().unwrap();
  assert_eq!(components.len(), 2);
  assert_eq!(components[0]["id"], "ui/button");
  assert_eq!(components[0]["status"], "modified");
  assert_eq!(components[0]["pipelines"], serde_json::json!(["build", "test"]));
  assert_eq!(components[1]["path"], "core/utils");
}
