mod support;

use predicates::str::contains;
use serde_json::Value;

use support::{stm_cmd, TestDir};

#[test]
fn stm_help_works() {
    stm_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("Smart Task Manager"));
}

#[test]
fn subcommand_help_works() {
    let subcommands = [
        "init", "add", "list", "show", "edit", "done", "reopen", "toggle", "delete", "subtasks",
        "suggest", "stats",
    ];

    for cmd in subcommands {
        stm_cmd().arg(cmd).arg("--help").assert().success();
    }
}

#[test]
fn unknown_subcommand_is_usage_error() {
    stm_cmd().arg("frobnicate").assert().code(2);
}

#[test]
fn init_creates_dir_and_config() {
    let root = TestDir::new();
    let data = root.path().join("data");

    let value = {
        let output = stm_cmd()
            .arg("--dir")
            .arg(&data)
            .args(["init", "--json"])
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        serde_json::from_slice::<Value>(&output).expect("json")
    };
    assert_eq!(value["schema_version"], "stm.v1");
    assert_eq!(value["command"], "init");
    assert_eq!(value["data"]["created"]["dir"], true);
    assert_eq!(value["data"]["created"]["config"], true);
    assert!(data.join("config.toml").is_file());

    stm_cmd()
        .arg("--dir")
        .arg(&data)
        .arg("init")
        .assert()
        .success()
        .stdout(contains("nothing to do"));
}

#[test]
fn empty_store_lists_nothing() {
    let dir = TestDir::new();
    dir.cmd()
        .arg("list")
        .assert()
        .success()
        .stdout(contains("No tasks yet"));

    let value = dir.json(&["stats"]);
    assert_eq!(value["data"]["total"], 0);
    assert_eq!(value["data"]["overdue"], 0);
}

#[test]
fn quiet_suppresses_human_output() {
    let dir = TestDir::new();
    dir.cmd()
        .args(["add", "Quiet task", "--due", "2030-01-01", "--quiet"])
        .assert()
        .success()
        .stdout("");
    assert_eq!(dir.read_tasks().len(), 1);
}
