use crate::db;
use crate::ipc::error::ok;
use crate::ipc::helpers::{
    get_opt_str, get_required_str, parse_date, require_session, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use rusqlite::OptionalExtension;
use serde_json::json;
use uuid::Uuid;

fn run_create(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let (conn, user_id) = require_session(state)?;

    let name = get_required_str(&req.params, "name")?.trim().to_string();
    if name.is_empty() {
        return Err(HandlerErr::bad_params("name must not be empty"));
    }

    // Planned classes may not have firm dates yet; validate only when given.
    let start_date = get_opt_str(&req.params, "startDate").filter(|s| !s.is_empty());
    if let Some(s) = &start_date {
        parse_date(s, "startDate")?;
    }
    let end_date = get_opt_str(&req.params, "endDate").filter(|s| !s.is_empty());
    if let Some(s) = &end_date {
        parse_date(s, "endDate")?;
    }
    let code = get_opt_str(&req.params, "code").map(|s| s.trim().to_string());
    let semester = get_opt_str(&req.params, "semester").map(|s| s.trim().to_string());
    let notes = get_opt_str(&req.params, "notes").map(|s| s.trim().to_string());

    let taken: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM future_classes WHERE user_id = ? AND LOWER(name) = LOWER(?)",
            (user_id, &name),
            |r| r.get(0),
        )
        .optional()
        .map_err(HandlerErr::query)?;
    if taken.is_some() {
        return Err(HandlerErr::bad_params(format!(
            "a future class named \"{}\" already exists",
            name
        )));
    }

    let class_id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO future_classes(id, user_id, name, code, start_date, end_date, semester, notes)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
        (
            &class_id,
            user_id,
            &name,
            &code,
            &start_date,
            &end_date,
            &semester,
            &notes,
        ),
    )
    .map_err(|e| HandlerErr::new("db_insert_failed", e.to_string()))?;
    db::bump_revision(conn, user_id, "futureClasses").map_err(HandlerErr::query)?;

    Ok(json!({
        "futureClass": {
            "id": class_id,
            "name": name,
            "code": code,
            "startDate": start_date,
            "endDate": end_date,
            "semester": semester,
            "notes": notes,
        }
    }))
}

fn run_list(state: &AppState, _req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let (conn, user_id) = require_session(state)?;

    let mut stmt = conn
        .prepare(
            "SELECT id, name, code, start_date, end_date, semester, notes
             FROM future_classes
             WHERE user_id = ?
             ORDER BY name",
        )
        .map_err(HandlerErr::query)?;
    let rows: Vec<(serde_json::Value, String)> = stmt
        .query_map([user_id], |r| {
            let semester: Option<String> = r.get(5)?;
            let label = semester
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .unwrap_or("Unspecified")
                .to_string();
            Ok((
                json!({
                    "id": r.get::<_, String>(0)?,
                    "name": r.get::<_, String>(1)?,
                    "code": r.get::<_, Option<String>>(2)?,
                    "startDate": r.get::<_, Option<String>>(3)?,
                    "endDate": r.get::<_, Option<String>>(4)?,
                    "semester": semester,
                    "notes": r.get::<_, Option<String>>(6)?,
                }),
                label,
            ))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(HandlerErr::query)?;

    // Group by semester label, groups sorted by label.
    let mut semesters: Vec<(String, Vec<serde_json::Value>)> = Vec::new();
    for (class, label) in rows {
        match semesters.iter_mut().find(|(l, _)| *l == label) {
            Some((_, group)) => group.push(class),
            None => semesters.push((label, vec![class])),
        }
    }
    semesters.sort_by(|a, b| a.0.cmp(&b.0));

    let groups: Vec<serde_json::Value> = semesters
        .into_iter()
        .map(|(semester, classes)| json!({ "semester": semester, "classes": classes }))
        .collect();

    Ok(json!({ "semesters": groups }))
}

fn run_delete(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let (conn, user_id) = require_session(state)?;
    let class_id = get_required_str(&req.params, "futureClassId")?;

    let exists: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM future_classes WHERE id = ? AND user_id = ?",
            (&class_id, user_id),
            |r| r.get(0),
        )
        .optional()
        .map_err(HandlerErr::query)?;
    if exists.is_none() {
        return Err(HandlerErr::new("not_found", "future class not found"));
    }

    conn.execute(
        "DELETE FROM future_classes WHERE id = ? AND user_id = ?",
        (&class_id, user_id),
    )
    .map_err(|e| HandlerErr::new("db_delete_failed", e.to_string()))?;
    db::bump_revision(conn, user_id, "futureClasses").map_err(HandlerErr::query)?;

    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let respond = |result: Result<serde_json::Value, HandlerErr>| match result {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    };
    match req.method.as_str() {
        "futureClasses.create" => Some(respond(run_create(state, req))),
        "futureClasses.list" => Some(respond(run_list(state, req))),
        "futureClasses.delete" => Some(respond(run_delete(state, req))),
        _ => None,
    }
}
