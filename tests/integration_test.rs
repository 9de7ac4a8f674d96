use assert_cmd::Command;
use predicates::prelude::*;

const FIXTURE: &str = r#"[
  {"_id": {"$oid": "root0001"}, "owner_id": "ann", "content": "opening post",
   "tweet_type": "Original", "created_at": "2024-01-01T10:00:00Z"},
  {"_id": {"$oid": "a0000001"}, "owner_id": "bob", "content": "first reply",
   "tweet_type": "Reply", "replied_to_tweet_id": {"$oid": "root0001"},
   "reply_depth": 1, "created_at": {"$date": "2024-01-01T10:01:00Z"}},
  {"_id": {"$oid": "b0000001"}, "owner_id": "cat", "content": "later answer",
   "tweet_type": "Reply", "replied_to_tweet_id": {"$oid": "a0000001"},
   "reply_depth": 2, "created_at": "2024-01-01T10:04:00Z"},
  {"_id": {"$oid": "c0000001"}, "owner_id": "dan", "content": "earlier answer",
   "tweet_type": "Reply", "replied_to_tweet_id": {"$oid": "a0000001"},
   "reply_depth": 2, "created_at": "2024-01-01T10:03:00Z"},
  {"_id": {"$oid": "d0000001"}, "owner_id": "eve", "content": "nested answer",
   "tweet_type": "Reply", "replied_to_tweet_id": {"$oid": "c0000001"},
   "reply_depth": 3, "created_at": {"$date": 1704103500000}}
]"#;

fn cmd(data_dir: &str) -> Command {
    let mut cmd = Command::cargo_bin("threadview").unwrap();
    cmd.env("THREADVIEW_DATA_DIR", data_dir)
        .env_remove("THREADVIEW_API_URL")
        .env_remove("THREADVIEW_LIMIT")
        .env_remove("THREADVIEW_LOG");
    cmd
}

/// Test helper: create a temp dir and return its path as a String.
fn test_dir() -> (tempfile::TempDir, String) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().to_str().unwrap().to_string();
    (dir, path)
}

/// Test helper: import `FIXTURE` into the local store.
fn seed(data_dir: &str) {
    cmd(data_dir)
        .arg("import")
        .write_stdin(FIXTURE)
        .assert()
        .success()
        .stdout("5\n");
}

fn stdout_of(assert: assert_cmd::assert::Assert) -> String {
    String::from_utf8(assert.get_output().stdout.clone()).unwrap()
}

#[test]
fn help_prints_subcommands() {
    let (_dir, data_dir) = test_dir();
    cmd(&data_dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Assemble and display reply threads"))
        .stdout(predicate::str::contains("show"))
        .stdout(predicate::str::contains("orphans"))
        .stdout(predicate::str::contains("import"));
}

#[test]
fn show_local_nests_replies_in_reading_order() {
    let (_dir, data_dir) = test_dir();
    seed(&data_dir);

    let out = stdout_of(
        cmd(&data_dir)
            .args(["show", "a0000001", "--local"])
            .assert()
            .success(),
    );
    let lines: Vec<&str> = out.lines().collect();

    assert_eq!(lines.len(), 6, "unexpected output:\n{}", out);
    assert!(lines[0].starts_with("^ ") && lines[0].contains("@ann: opening post"));
    assert!(lines[1].starts_with("> ") && lines[1].contains("@bob: first reply"));
    assert!(lines[2].starts_with("  [") && lines[2].contains("earlier answer"));
    assert!(lines[3].starts_with("    [") && lines[3].contains("nested answer"));
    assert!(lines[4].starts_with("  [") && lines[4].contains("later answer"));
    assert_eq!(lines[5], "3 replies");
}

#[test]
fn show_local_json_reports_depths() {
    let (_dir, data_dir) = test_dir();
    seed(&data_dir);

    let out = stdout_of(
        cmd(&data_dir)
            .args(["show", "root0001", "--local", "--format", "json"])
            .assert()
            .success(),
    );
    let value: serde_json::Value = serde_json::from_str(&out).unwrap();

    let rendered: Vec<(String, u64)> = value["replies"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| {
            (
                r["post"]["id"].as_str().unwrap().to_string(),
                r["depth"].as_u64().unwrap(),
            )
        })
        .collect();
    assert_eq!(
        rendered,
        vec![
            ("a0000001".to_string(), 0),
            ("c0000001".to_string(), 1),
            ("d0000001".to_string(), 2),
            ("b0000001".to_string(), 1),
        ]
    );
    assert_eq!(value["ancestors"], serde_json::json!([]));
    assert_eq!(value["orphaned"], serde_json::json!([]));
}

#[test]
fn show_leaf_says_no_replies() {
    let (_dir, data_dir) = test_dir();
    seed(&data_dir);

    cmd(&data_dir)
        .args(["show", "d0000001", "--local"])
        .assert()
        .success()
        .stdout(predicate::str::ends_with("no replies yet\n"));
}

#[test]
fn show_missing_post_fails() {
    let (_dir, data_dir) = test_dir();
    seed(&data_dir);

    cmd(&data_dir)
        .args(["show", "nope", "--local"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("post not found: nope"));
}

#[test]
fn show_without_api_url_is_input_error() {
    let (_dir, data_dir) = test_dir();

    cmd(&data_dir)
        .args(["show", "a0000001"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("no API URL"));
}

#[test]
fn show_rejects_non_http_api_url() {
    let (_dir, data_dir) = test_dir();

    cmd(&data_dir)
        .args(["show", "a0000001", "--api-url", "ftp://example.com"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("unsupported URL scheme"));
}

#[test]
fn show_unreachable_api_reports_transport_error() {
    let (_dir, data_dir) = test_dir();

    cmd(&data_dir)
        .args(["show", "a0000001", "--api-url", "http://127.0.0.1:9", "--retries", "1"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("transport error"));
}

#[test]
fn api_url_from_env_is_used() {
    let (_dir, data_dir) = test_dir();

    cmd(&data_dir)
        .env("THREADVIEW_API_URL", "http://127.0.0.1:9")
        .args(["show", "a0000001"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("transport error"));
}

#[test]
fn import_from_file_skips_malformed_records() {
    let (dir, data_dir) = test_dir();
    let file = dir.path().join("posts.json");
    std::fs::write(
        &file,
        r#"[
          {"id": "p1", "content": "kept", "created_at": 1700000000000},
          {"content": "no id", "created_at": 1700000000000},
          {"id": "p2", "content": "no timestamp"}
        ]"#,
    )
    .unwrap();

    cmd(&data_dir)
        .arg("import")
        .arg(&file)
        .assert()
        .success()
        .stdout("1\n")
        .stderr(predicate::str::contains("skipped 2 malformed records"));
}

#[test]
fn import_accepts_thread_response() {
    let (_dir, data_dir) = test_dir();
    let body = r#"{
      "tweet": {"_id": {"$oid": "t1"}, "content": "anchor", "created_at": "2024-02-01T00:00:00Z"},
      "parents": [],
      "replies": [
        {"_id": {"$oid": "t2"}, "content": "reply", "replied_to_tweet_id": {"$oid": "t1"},
         "created_at": "2024-02-01T00:01:00Z"}
      ]
    }"#;

    cmd(&data_dir)
        .arg("import")
        .write_stdin(body)
        .assert()
        .success()
        .stdout("2\n");

    cmd(&data_dir)
        .args(["show", "t1", "--local"])
        .assert()
        .success()
        .stdout(predicate::str::contains("  [").and(predicate::str::ends_with("1 reply\n")));
}

#[test]
fn import_invalid_json_is_input_error() {
    let (_dir, data_dir) = test_dir();

    cmd(&data_dir)
        .arg("import")
        .write_stdin("not json")
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("parse error"));
}

#[test]
fn orphans_reports_fully_reachable_thread() {
    let (_dir, data_dir) = test_dir();
    seed(&data_dir);

    cmd(&data_dir)
        .args(["orphans", "root0001", "--local", "--format", "json"])
        .assert()
        .success()
        .stdout("[]\n");

    cmd(&data_dir)
        .args(["orphans", "root0001", "--local"])
        .assert()
        .success()
        .stderr(predicate::str::contains("every reply in thread root0001 is reachable"));
}

#[test]
fn bad_limit_env_is_input_error() {
    let (_dir, data_dir) = test_dir();

    cmd(&data_dir)
        .env("THREADVIEW_LIMIT", "lots")
        .args(["show", "a0000001", "--local"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("THREADVIEW_LIMIT"));
}

#[test]
fn zero_limit_is_rejected() {
    let (_dir, data_dir) = test_dir();

    cmd(&data_dir)
        .args(["show", "a0000001", "--api-url", "http://127.0.0.1:9", "--limit", "0"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("--limit"));

    cmd(&data_dir)
        .env("THREADVIEW_LIMIT", "0")
        .args(["show", "a0000001", "--local"])
        .assert()
        .failure()
        .code(2)
        .stderr(predicate::str::contains("THREADVIEW_LIMIT must be a positive integer"));
}
