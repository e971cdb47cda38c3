use crate::ipc::error::err;
use crate::ipc::types::AppState;
use chrono::NaiveDate;
use rusqlite::Connection;
use serde_json::json;

pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerErr {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn bad_params(message: impl Into<String>) -> Self {
        Self::new("bad_params", message)
    }

    pub fn query(e: rusqlite::Error) -> Self {
        Self::new("db_query_failed", e.to_string())
    }

    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }
}

/// Workspace and session must both be established before any collection
/// operation runs.
pub fn require_session(state: &AppState) -> Result<(&Connection, &str), HandlerErr> {
    let conn = state
        .db
        .as_ref()
        .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))?;
    let user_id = state
        .user_id
        .as_deref()
        .ok_or_else(|| HandlerErr::new("no_session", "open a session first"))?;
    Ok((conn, user_id))
}

pub fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

pub fn get_opt_str(params: &serde_json::Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

pub fn get_required_f64(params: &serde_json::Value, key: &str) -> Result<f64, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_f64())
        .ok_or_else(|| HandlerErr::bad_params(format!("missing {}", key)))
}

/// Absent and null both mean None; anything else must be a number.
pub fn get_opt_f64(params: &serde_json::Value, key: &str) -> Result<Option<f64>, HandlerErr> {
    match params.get(key) {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => v
            .as_f64()
            .map(Some)
            .ok_or_else(|| HandlerErr::bad_params(format!("{} must be a number or null", key))),
    }
}

pub fn parse_date(value: &str, key: &str) -> Result<NaiveDate, HandlerErr> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| HandlerErr::bad_params(format!("{} must be YYYY-MM-DD", key)))
}

/// Optional `today` override for the date-driven operations; defaults to the
/// local date.
pub fn today_param(params: &serde_json::Value) -> Result<NaiveDate, HandlerErr> {
    match params.get("today").and_then(|v| v.as_str()) {
        Some(s) => parse_date(s, "today"),
        None => Ok(chrono::Local::now().date_naive()),
    }
}

// Full-collection snapshot loaders, shared between the per-family list
// handlers and sync.poll.

pub fn load_classes(conn: &Connection, user_id: &str) -> Result<Vec<serde_json::Value>, HandlerErr> {
    let mut stmt = conn
        .prepare(
            "SELECT id, name, code, start_date, end_date, instructor, status
             FROM classes
             WHERE user_id = ?
             ORDER BY rowid",
        )
        .map_err(HandlerErr::query)?;
    stmt.query_map([user_id], |r| {
        Ok(json!({
            "id": r.get::<_, String>(0)?,
            "name": r.get::<_, String>(1)?,
            "code": r.get::<_, Option<String>>(2)?,
            "startDate": r.get::<_, Option<String>>(3)?,
            "endDate": r.get::<_, Option<String>>(4)?,
            "instructor": r.get::<_, Option<String>>(5)?,
            "status": r.get::<_, String>(6)?,
        }))
    })
    .and_then(|it| it.collect::<Result<Vec<_>, _>>())
    .map_err(HandlerErr::query)
}

pub fn load_future_classes(
    conn: &Connection,
    user_id: &str,
) -> Result<Vec<serde_json::Value>, HandlerErr> {
    let mut stmt = conn
        .prepare(
            "SELECT id, name, code, start_date, end_date, semester, notes
             FROM future_classes
             WHERE user_id = ?
             ORDER BY rowid",
        )
        .map_err(HandlerErr::query)?;
    stmt.query_map([user_id], |r| {
        Ok(json!({
            "id": r.get::<_, String>(0)?,
            "name": r.get::<_, String>(1)?,
            "code": r.get::<_, Option<String>>(2)?,
            "startDate": r.get::<_, Option<String>>(3)?,
            "endDate": r.get::<_, Option<String>>(4)?,
            "semester": r.get::<_, Option<String>>(5)?,
            "notes": r.get::<_, Option<String>>(6)?,
        }))
    })
    .and_then(|it| it.collect::<Result<Vec<_>, _>>())
    .map_err(HandlerErr::query)
}

pub fn load_assignments(
    conn: &Connection,
    user_id: &str,
) -> Result<Vec<serde_json::Value>, HandlerErr> {
    let mut stmt = conn
        .prepare(
            "SELECT id, class_id, name, kind, due_date, status
             FROM assignments
             WHERE user_id = ?
             ORDER BY rowid",
        )
        .map_err(HandlerErr::query)?;
    stmt.query_map([user_id], |r| {
        Ok(json!({
            "id": r.get::<_, String>(0)?,
            "classId": r.get::<_, String>(1)?,
            "name": r.get::<_, String>(2)?,
            "type": r.get::<_, String>(3)?,
            "dueDate": r.get::<_, String>(4)?,
            "status": r.get::<_, String>(5)?,
        }))
    })
    .and_then(|it| it.collect::<Result<Vec<_>, _>>())
    .map_err(HandlerErr::query)
}

pub fn load_assessments(
    conn: &Connection,
    user_id: &str,
) -> Result<Vec<serde_json::Value>, HandlerErr> {
    let mut stmt = conn
        .prepare(
            "SELECT id, class_id, name, date, topics, status
             FROM assessments
             WHERE user_id = ?
             ORDER BY rowid",
        )
        .map_err(HandlerErr::query)?;
    stmt.query_map([user_id], |r| {
        Ok(json!({
            "id": r.get::<_, String>(0)?,
            "classId": r.get::<_, String>(1)?,
            "name": r.get::<_, String>(2)?,
            "date": r.get::<_, String>(3)?,
            "topics": r.get::<_, Option<String>>(4)?,
            "status": r.get::<_, String>(5)?,
        }))
    })
    .and_then(|it| it.collect::<Result<Vec<_>, _>>())
    .map_err(HandlerErr::query)
}

pub fn grade_row_json(
    id: String,
    class_id: String,
    task_name: String,
    task_type: String,
    points_earned: f64,
    points_total: f64,
    weight: Option<f64>,
    date: Option<String>,
    link_kind: Option<String>,
    link_id: Option<String>,
) -> serde_json::Value {
    let link = match (link_kind, link_id) {
        (Some(kind), Some(id)) => json!({ "kind": kind, "id": id }),
        _ => serde_json::Value::Null,
    };
    json!({
        "id": id,
        "classId": class_id,
        "taskName": task_name,
        "taskType": task_type,
        "pointsEarned": points_earned,
        "pointsTotal": points_total,
        "weight": weight,
        "date": date,
        "link": link,
    })
}

pub fn load_grades(conn: &Connection, user_id: &str) -> Result<Vec<serde_json::Value>, HandlerErr> {
    let mut stmt = conn
        .prepare(
            "SELECT id, class_id, task_name, task_type, points_earned, points_total,
                    weight, date, link_kind, link_id
             FROM grades
             WHERE user_id = ?
             ORDER BY rowid",
        )
        .map_err(HandlerErr::query)?;
    stmt.query_map([user_id], |r| {
        Ok(grade_row_json(
            r.get(0)?,
            r.get(1)?,
            r.get(2)?,
            r.get(3)?,
            r.get(4)?,
            r.get(5)?,
            r.get(6)?,
            r.get(7)?,
            r.get(8)?,
            r.get(9)?,
        ))
    })
    .and_then(|it| it.collect::<Result<Vec<_>, _>>())
    .map_err(HandlerErr::query)
}
