use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_gradetrackd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn gradetrackd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn names_of(classes: &serde_json::Value) -> Vec<String> {
    classes
        .as_array()
        .expect("class array")
        .iter()
        .map(|c| c["name"].as_str().expect("name").to_string())
        .collect()
}

#[test]
fn migration_moves_classes_on_date_boundaries_and_is_idempotent() {
    let workspace = temp_dir("gradetrack-lifecycle");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "session.open",
        json!({ "userId": "user-a" }),
    );

    // Starts exactly today: must migrate (>= comparison).
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "futureClasses.create",
        json!({
            "name": "Organic Chemistry",
            "startDate": "2025-09-01",
            "endDate": "2025-12-15",
            "semester": "Fall 2025",
        }),
    );
    // Starts next term: must stay future.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "futureClasses.create",
        json!({
            "name": "Linear Algebra",
            "startDate": "2026-01-05",
            "semester": "Spring 2026",
        }),
    );
    // Ended before today: must become past.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "classes.create",
        json!({
            "name": "Summer Writing",
            "startDate": "2025-06-01",
            "endDate": "2025-08-30",
        }),
    );
    // Ends exactly today: must stay current (strict > comparison).
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "classes.create",
        json!({
            "name": "Statistics",
            "startDate": "2025-06-01",
            "endDate": "2025-09-01",
        }),
    );

    let migrated = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "classes.migrate",
        json!({ "today": "2025-09-01" }),
    );
    assert_eq!(migrated["started"].as_array().expect("started").len(), 1);
    assert_eq!(migrated["completed"].as_array().expect("completed").len(), 1);

    let listed = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "classes.list",
        json!({ "today": "2025-09-01" }),
    );
    let current = names_of(&listed["currentClasses"]);
    assert!(current.contains(&"Organic Chemistry".to_string()), "{current:?}");
    assert!(current.contains(&"Statistics".to_string()), "{current:?}");
    let past = names_of(&listed["pastClasses"]);
    assert_eq!(past, vec!["Summer Writing".to_string()]);

    // The migrated class is active on its start day.
    let organic = listed["currentClasses"]
        .as_array()
        .expect("current")
        .iter()
        .find(|c| c["name"] == json!("Organic Chemistry"))
        .expect("organic chemistry")
        .clone();
    assert_eq!(organic["active"], json!(true));

    // It has left the future collection; only the spring class remains.
    let future = request_ok(
        &mut stdin,
        &mut reader,
        "9",
        "futureClasses.list",
        json!({}),
    );
    let semesters = future["semesters"].as_array().expect("semesters");
    assert_eq!(semesters.len(), 1);
    assert_eq!(semesters[0]["semester"], json!("Spring 2026"));

    // Second run on the same day: nothing left to move.
    let again = request_ok(
        &mut stdin,
        &mut reader,
        "10",
        "classes.migrate",
        json!({ "today": "2025-09-01" }),
    );
    assert_eq!(again["started"].as_array().expect("started").len(), 0);
    assert_eq!(again["completed"].as_array().expect("completed").len(), 0);

    let relisted = request_ok(
        &mut stdin,
        &mut reader,
        "11",
        "classes.list",
        json!({ "today": "2025-09-01" }),
    );
    assert_eq!(names_of(&relisted["pastClasses"]), vec!["Summer Writing".to_string()]);
    assert_eq!(
        names_of(&relisted["currentClasses"]).len(),
        names_of(&listed["currentClasses"]).len()
    );

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn future_class_without_start_date_never_migrates() {
    let workspace = temp_dir("gradetrack-lifecycle-nodate");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "session.open",
        json!({ "userId": "user-a" }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "futureClasses.create",
        json!({ "name": "Sometime Seminar", "semester": "TBD" }),
    );

    let migrated = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "classes.migrate",
        json!({ "today": "2030-01-01" }),
    );
    assert_eq!(migrated["started"].as_array().expect("started").len(), 0);

    let future = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "futureClasses.list",
        json!({}),
    );
    assert_eq!(future["semesters"].as_array().expect("semesters").len(), 1);

    drop(stdin);
    let _ = child.wait();
}
