use crate::db;
use crate::ipc::error::ok;
use crate::ipc::helpers::{
    load_assessments, load_assignments, load_classes, load_future_classes, load_grades,
    require_session, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

const COLLECTIONS: [&str; 5] = [
    "classes",
    "futureClasses",
    "assignments",
    "assessments",
    "grades",
];

/// Cursor-based change feed. The client sends the last revision it saw per
/// collection; any collection that moved past it comes back as a complete
/// snapshot. Last snapshot wins: the client replaces, never merges.
fn run_poll(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let (conn, user_id) = require_session(state)?;

    let cursor = req.params.get("cursor").and_then(|v| v.as_object());
    let cursor_rev = |collection: &str| -> i64 {
        cursor
            .and_then(|c| c.get(collection))
            .and_then(|v| v.as_i64())
            .unwrap_or(0)
    };

    let revisions = db::revisions(conn, user_id).map_err(HandlerErr::query)?;

    let mut collections = serde_json::Map::new();
    for collection in COLLECTIONS {
        let revision = revisions.get(collection).copied().unwrap_or(0);
        if revision <= cursor_rev(collection) {
            continue;
        }
        let records = match collection {
            "classes" => load_classes(conn, user_id)?,
            "futureClasses" => load_future_classes(conn, user_id)?,
            "assignments" => load_assignments(conn, user_id)?,
            "assessments" => load_assessments(conn, user_id)?,
            "grades" => load_grades(conn, user_id)?,
            _ => unreachable!(),
        };
        collections.insert(
            collection.to_string(),
            json!({ "revision": revision, "records": records }),
        );
    }

    Ok(json!({ "collections": collections }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "sync.poll" => Some(match run_poll(state, req) {
            Ok(v) => ok(&req.id, v),
            Err(e) => e.response(&req.id),
        }),
        _ => None,
    }
}
