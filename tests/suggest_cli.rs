mod support;

use std::time::Duration;

use predicates::str::contains;
use serde_json::json;

use support::{serve_once, TestDir};

const KEY_ENV: &str = "STM_TEST_GEMINI_KEY";

fn endpoint_config(dir: &TestDir, base: &str) {
    dir.write_config(&format!(
        "[suggest]\nprovider = \"endpoint\"\nurl = \"{base}/api/subtasks\"\ntimeout_secs = 5\n"
    ));
}

fn gemini_config(dir: &TestDir, base: &str) {
    dir.write_config(&format!(
        "[suggest]\nprovider = \"gemini\"\nendpoint = \"{base}\"\napi_key_env = \"{KEY_ENV}\"\ntimeout_secs = 5\n"
    ));
}

#[test]
fn endpoint_suggestions_replace_subtasks() {
    let dir = TestDir::new();
    let (base, requests) = serve_once(
        200,
        r#"{"subtasks":["1. Measure rooms","","Pick paint","One per line please"]}"#,
    );
    endpoint_config(&dir, &base);

    let id = dir.json(&["add", "Paint house", "--due", "2030-05-01", "-d", "two floors"])["data"]
        ["task"]["id"]
        .as_str()
        .expect("id")
        .to_string();
    dir.json(&["subtasks", "set", &id, "old step"]);

    let value = dir.json(&["suggest", &id]);
    assert_eq!(value["data"]["applied"], true);
    assert_eq!(
        value["data"]["subtasks"],
        json!(["Measure rooms", "Pick paint"])
    );
    assert_eq!(
        dir.read_tasks()[0].subtasks,
        vec!["Measure rooms".to_string(), "Pick paint".to_string()]
    );

    let request = requests
        .recv_timeout(Duration::from_secs(5))
        .expect("captured request");
    assert!(request.request_line.starts_with("POST /api/subtasks "));
    assert_eq!(
        request.json(),
        json!({"taskTitle": "Paint house", "taskDescription": "two floors"})
    );
}

#[test]
fn gemini_suggestions_use_model_url_and_key() {
    let dir = TestDir::new();
    let (base, requests) = serve_once(
        200,
        r#"{"candidates":[{"content":{"parts":[{"text":"Here you go, each on a new line:\n1. Pack boxes\n2. Hire van\n\n3. Clean kitchen"}]}}]}"#,
    );
    gemini_config(&dir, &base);
    let id = dir.add_task("Move house", "2030-05-01");

    let output = dir
        .cmd()
        .env(KEY_ENV, "test-key")
        .args(["suggest", &id, "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let value: serde_json::Value = serde_json::from_slice(&output).expect("json");
    assert_eq!(
        value["data"]["subtasks"],
        json!(["Pack boxes", "Hire van", "Clean kitchen"])
    );

    let request = requests
        .recv_timeout(Duration::from_secs(5))
        .expect("captured request");
    assert!(request
        .request_line
        .starts_with("POST /models/gemini-2.5-flash:generateContent "));
    assert_eq!(request.header("x-goog-api-key"), Some("test-key"));
    let prompt = request.json()["contents"][0]["parts"][0]["text"]
        .as_str()
        .expect("prompt")
        .to_string();
    assert!(prompt.contains("Task: Move house"));
    assert!(!prompt.contains("Description:"));
}

#[test]
fn service_failure_leaves_task_unchanged() {
    let dir = TestDir::new();
    let (base, _requests) = serve_once(500, r#"{"error":"boom"}"#);
    endpoint_config(&dir, &base);
    let id = dir.add_task("Fragile", "2030-05-01");
    dir.json(&["subtasks", "set", &id, "keep me"]);
    let before = dir.read_tasks();

    let value = dir.json(&["suggest", &id]);
    assert_eq!(value["data"]["applied"], false);
    assert!(value["data"]["error"]
        .as_str()
        .expect("error")
        .contains("500"));
    assert!(!value["warnings"].as_array().expect("warnings").is_empty());

    assert_eq!(dir.read_tasks(), before);
}

#[test]
fn filtered_out_suggestions_clear_subtasks() {
    let dir = TestDir::new();
    let (base, _requests) = serve_once(
        200,
        r#"{"subtasks":["", "Set a deadline", "Check the timeline"]}"#,
    );
    endpoint_config(&dir, &base);
    let id = dir.add_task("Nothing to do", "2030-05-01");
    dir.json(&["subtasks", "set", &id, "stale step"]);

    dir.cmd()
        .args(["suggest", &id])
        .assert()
        .success()
        .stdout(contains("subtasks cleared"));
    assert!(dir.read_tasks()[0].subtasks.is_empty());
}

#[test]
fn missing_api_key_is_user_error() {
    let dir = TestDir::new();
    gemini_config(&dir, "http://127.0.0.1:9");
    let id = dir.add_task("Needs key", "2030-05-01");

    dir.cmd()
        .env_remove(KEY_ENV)
        .args(["suggest", &id])
        .assert()
        .code(2)
        .stderr(contains(KEY_ENV))
        .stderr(contains(format!("export {KEY_ENV}=<api key>")));
}
