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

fn request(
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
    value
}

fn error_code(resp: &serde_json::Value) -> Option<&str> {
    resp.get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
}

#[test]
fn router_dispatch_smoke_covers_handler_families() {
    let workspace = temp_dir("gradetrack-router-smoke");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let health = request(&mut stdin, &mut reader, "1", "health", json!({}));
    assert_eq!(health["ok"], json!(true));
    assert!(health["result"]["version"].is_string());

    // Collection operations are gated on workspace and session, in that order.
    let gated = request(&mut stdin, &mut reader, "2", "classes.list", json!({}));
    assert_eq!(error_code(&gated), Some("no_workspace"));

    let selected = request(
        &mut stdin,
        &mut reader,
        "3",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    assert_eq!(selected["ok"], json!(true));

    let gated = request(&mut stdin, &mut reader, "4", "classes.list", json!({}));
    assert_eq!(error_code(&gated), Some("no_session"));

    let session = request(
        &mut stdin,
        &mut reader,
        "5",
        "session.open",
        json!({ "userId": "user-a" }),
    );
    assert_eq!(session["result"]["userId"], json!("user-a"));

    let created = request(
        &mut stdin,
        &mut reader,
        "6",
        "classes.create",
        json!({
            "name": "Biology 101",
            "code": "BIO101",
            "startDate": "2025-09-01",
            "endDate": "2025-12-15",
            "instructor": "Dr. Vance",
        }),
    );
    assert_eq!(created["ok"], json!(true));
    let class_id = created["result"]["class"]["id"]
        .as_str()
        .expect("class id")
        .to_string();

    // Duplicate names are rejected case-insensitively before any write.
    let dup = request(
        &mut stdin,
        &mut reader,
        "7",
        "classes.create",
        json!({
            "name": "biology 101",
            "startDate": "2025-09-01",
            "endDate": "2025-12-15",
        }),
    );
    assert_eq!(error_code(&dup), Some("bad_params"));

    let listed = request(&mut stdin, &mut reader, "8", "classes.list", json!({}));
    assert_eq!(
        listed["result"]["currentClasses"]
            .as_array()
            .expect("current classes")
            .len(),
        1
    );

    let future = request(
        &mut stdin,
        &mut reader,
        "9",
        "futureClasses.create",
        json!({ "name": "Chemistry 201", "semester": "Spring 2026" }),
    );
    assert_eq!(future["ok"], json!(true));
    let future_list = request(
        &mut stdin,
        &mut reader,
        "10",
        "futureClasses.list",
        json!({}),
    );
    assert_eq!(
        future_list["result"]["semesters"][0]["semester"],
        json!("Spring 2026")
    );

    let assignment = request(
        &mut stdin,
        &mut reader,
        "11",
        "assignments.create",
        json!({
            "classId": class_id,
            "name": "Lab report",
            "type": "Homework",
            "dueDate": "2025-09-10",
            "status": "not-started",
        }),
    );
    assert_eq!(assignment["ok"], json!(true));

    let assessment = request(
        &mut stdin,
        &mut reader,
        "12",
        "assessments.create",
        json!({
            "classId": class_id,
            "name": "Midterm",
            "date": "2025-10-20",
            "topics": "Cells, genetics",
            "status": "not-started",
        }),
    );
    assert_eq!(assessment["ok"], json!(true));

    let weeks = request(
        &mut stdin,
        &mut reader,
        "13",
        "assignments.listWeeks",
        json!({}),
    );
    assert_eq!(weeks["result"]["weeks"].as_array().expect("weeks").len(), 1);

    let summary = request(&mut stdin, &mut reader, "14", "grades.summary", json!({}));
    assert_eq!(summary["ok"], json!(true));

    let poll = request(&mut stdin, &mut reader, "15", "sync.poll", json!({}));
    assert!(poll["result"]["collections"]["classes"]["revision"].is_i64());

    let auth_msg = request(
        &mut stdin,
        &mut reader,
        "16",
        "auth.describeError",
        json!({ "code": "auth/wrong-password", "context": "signIn" }),
    );
    assert_eq!(
        auth_msg["result"]["message"],
        json!("Invalid email or password.")
    );

    let weak = request(
        &mut stdin,
        &mut reader,
        "17",
        "auth.validateSignup",
        json!({ "password": "abc", "confirmPassword": "abc" }),
    );
    assert_eq!(error_code(&weak), Some("bad_params"));

    let unknown = request(&mut stdin, &mut reader, "18", "no.such.method", json!({}));
    assert_eq!(error_code(&unknown), Some("not_implemented"));

    drop(stdin);
    let _ = child.wait();
}
