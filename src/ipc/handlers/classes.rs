use crate::calc::{self, GradePoints};
use crate::db;
use crate::ipc::error::ok;
use crate::ipc::helpers::{
    get_opt_str, get_required_str, parse_date, require_session, today_param, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::lifecycle::{self, ClassDates};
use chrono::NaiveDate;
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;
use std::collections::HashMap;
use uuid::Uuid;

fn class_name_taken(conn: &Connection, user_id: &str, name: &str) -> Result<bool, HandlerErr> {
    conn.query_row(
        "SELECT 1 FROM classes WHERE user_id = ? AND LOWER(name) = LOWER(?)",
        (user_id, name),
        |r| r.get::<_, i64>(0),
    )
    .optional()
    .map(|v| v.is_some())
    .map_err(HandlerErr::query)
}

fn run_create(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let (conn, user_id) = require_session(state)?;

    let name = get_required_str(&req.params, "name")?.trim().to_string();
    if name.is_empty() {
        return Err(HandlerErr::bad_params("name must not be empty"));
    }
    let start_date = get_required_str(&req.params, "startDate")?;
    parse_date(&start_date, "startDate")?;
    let end_date = get_required_str(&req.params, "endDate")?;
    parse_date(&end_date, "endDate")?;
    let code = get_opt_str(&req.params, "code").map(|s| s.trim().to_string());
    let instructor = get_opt_str(&req.params, "instructor").map(|s| s.trim().to_string());

    // Name uniqueness is enforced at creation time only; classes are never
    // renamed.
    if class_name_taken(conn, user_id, &name)? {
        return Err(HandlerErr::bad_params(format!(
            "a class named \"{}\" already exists",
            name
        )));
    }

    let class_id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO classes(id, user_id, name, code, start_date, end_date, instructor, status)
         VALUES(?, ?, ?, ?, ?, ?, ?, 'current')",
        (
            &class_id,
            user_id,
            &name,
            &code,
            &start_date,
            &end_date,
            &instructor,
        ),
    )
    .map_err(|e| HandlerErr::new("db_insert_failed", e.to_string()))?;
    db::bump_revision(conn, user_id, "classes").map_err(HandlerErr::query)?;

    Ok(json!({
        "class": {
            "id": class_id,
            "name": name,
            "code": code,
            "startDate": start_date,
            "endDate": end_date,
            "instructor": instructor,
            "status": "current",
        }
    }))
}

fn grade_points_by_class(
    conn: &Connection,
    user_id: &str,
) -> Result<HashMap<String, Vec<GradePoints>>, HandlerErr> {
    let mut stmt = conn
        .prepare(
            "SELECT class_id, points_earned, points_total, weight
             FROM grades
             WHERE user_id = ?",
        )
        .map_err(HandlerErr::query)?;
    let rows = stmt
        .query_map([user_id], |r| {
            Ok((
                r.get::<_, String>(0)?,
                GradePoints {
                    earned: r.get(1)?,
                    total: r.get(2)?,
                    weight: r.get(3)?,
                },
            ))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(HandlerErr::query)?;

    let mut by_class: HashMap<String, Vec<GradePoints>> = HashMap::new();
    for (class_id, points) in rows {
        by_class.entry(class_id).or_default().push(points);
    }
    Ok(by_class)
}

fn run_list(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let (conn, user_id) = require_session(state)?;
    let today = today_param(&req.params)?;
    let grades_by_class = grade_points_by_class(conn, user_id)?;

    struct ClassRow {
        id: String,
        name: String,
        code: Option<String>,
        start_date: Option<String>,
        end_date: Option<String>,
        instructor: Option<String>,
    }

    let fetch = |status: &str, order: &str| -> Result<Vec<ClassRow>, HandlerErr> {
        let sql = format!(
            "SELECT id, name, code, start_date, end_date, instructor
             FROM classes
             WHERE user_id = ? AND status = ?
             ORDER BY {}",
            order
        );
        let mut stmt = conn.prepare(&sql).map_err(HandlerErr::query)?;
        stmt.query_map((user_id, status), |r| {
            Ok(ClassRow {
                id: r.get(0)?,
                name: r.get(1)?,
                code: r.get(2)?,
                start_date: r.get(3)?,
                end_date: r.get(4)?,
                instructor: r.get(5)?,
            })
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        .map_err(HandlerErr::query)
    };

    let date_of = |s: &Option<String>| -> Option<NaiveDate> {
        s.as_deref()
            .and_then(|v| NaiveDate::parse_from_str(v, "%Y-%m-%d").ok())
    };

    let current: Vec<serde_json::Value> = fetch("current", "start_date")?
        .into_iter()
        .map(|row| {
            let start = date_of(&row.start_date);
            let end = date_of(&row.end_date);
            let active = match (start, end) {
                (Some(s), Some(e)) => s <= today && today <= e,
                _ => false,
            };
            json!({
                "id": row.id,
                "name": row.name,
                "code": row.code,
                "startDate": row.start_date,
                "endDate": row.end_date,
                "instructor": row.instructor,
                "status": "current",
                "active": active,
            })
        })
        .collect();

    let past: Vec<serde_json::Value> = fetch("past", "end_date DESC")?
        .into_iter()
        .map(|row| {
            let final_grade = grades_by_class
                .get(&row.id)
                .and_then(|grades| calc::class_average(grades));
            json!({
                "id": row.id,
                "name": row.name,
                "code": row.code,
                "startDate": row.start_date,
                "endDate": row.end_date,
                "instructor": row.instructor,
                "status": "past",
                "finalGrade": final_grade,
            })
        })
        .collect();

    Ok(json!({ "currentClasses": current, "pastClasses": past }))
}

fn run_delete(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let (conn, user_id) = require_session(state)?;
    let class_id = get_required_str(&req.params, "classId")?;

    let exists: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM classes WHERE id = ? AND user_id = ?",
            (&class_id, user_id),
            |r| r.get(0),
        )
        .optional()
        .map_err(HandlerErr::query)?;
    if exists.is_none() {
        return Err(HandlerErr::new("not_found", "class not found"));
    }

    // Soft references: assignments, assessments and grades of this class are
    // left in place.
    conn.execute(
        "DELETE FROM classes WHERE id = ? AND user_id = ?",
        (&class_id, user_id),
    )
    .map_err(|e| HandlerErr::new("db_delete_failed", e.to_string()))?;
    db::bump_revision(conn, user_id, "classes").map_err(HandlerErr::query)?;

    Ok(json!({ "ok": true }))
}

fn class_dates(
    conn: &Connection,
    user_id: &str,
    sql: &str,
) -> Result<Vec<ClassDates>, HandlerErr> {
    let mut stmt = conn.prepare(sql).map_err(HandlerErr::query)?;
    stmt.query_map([user_id], |r| {
        let parse = |s: Option<String>| {
            s.and_then(|v| NaiveDate::parse_from_str(&v, "%Y-%m-%d").ok())
        };
        Ok(ClassDates {
            id: r.get(0)?,
            start_date: parse(r.get(1)?),
            end_date: parse(r.get(2)?),
        })
    })
    .and_then(|it| it.collect::<Result<Vec<_>, _>>())
    .map_err(HandlerErr::query)
}

fn run_migrate(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let (conn, user_id) = require_session(state)?;
    let today = today_param(&req.params)?;

    let future = class_dates(
        conn,
        user_id,
        "SELECT id, start_date, end_date FROM future_classes WHERE user_id = ?",
    )?;
    let current = class_dates(
        conn,
        user_id,
        "SELECT id, start_date, end_date FROM classes WHERE user_id = ? AND status = 'current'",
    )?;

    let plan = lifecycle::plan_migrations(today, &future, &current);

    // Each transition is an upsert plus, for starts, a removal from the
    // future collection. Writes are independent per record; there is no
    // cross-collection transaction, matching the store contract.
    for id in &plan.to_current {
        let row: Option<(String, Option<String>, Option<String>, Option<String>)> = conn
            .query_row(
                "SELECT name, code, start_date, end_date
                 FROM future_classes
                 WHERE id = ? AND user_id = ?",
                (id, user_id),
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)),
            )
            .optional()
            .map_err(HandlerErr::query)?;
        let Some((name, code, start_date, end_date)) = row else {
            continue;
        };
        conn.execute(
            "INSERT OR REPLACE INTO classes(id, user_id, name, code, start_date, end_date, instructor, status)
             VALUES(?, ?, ?, ?, ?, ?, NULL, 'current')",
            (id, user_id, &name, &code, &start_date, &end_date),
        )
        .map_err(|e| HandlerErr::new("db_insert_failed", e.to_string()))?;
        conn.execute(
            "DELETE FROM future_classes WHERE id = ? AND user_id = ?",
            (id, user_id),
        )
        .map_err(|e| HandlerErr::new("db_delete_failed", e.to_string()))?;
    }

    for id in &plan.to_past {
        conn.execute(
            "UPDATE classes SET status = 'past' WHERE id = ? AND user_id = ?",
            (id, user_id),
        )
        .map_err(|e| HandlerErr::new("db_update_failed", e.to_string()))?;
    }

    if !plan.is_empty() {
        db::bump_revision(conn, user_id, "classes").map_err(HandlerErr::query)?;
    }
    if !plan.to_current.is_empty() {
        db::bump_revision(conn, user_id, "futureClasses").map_err(HandlerErr::query)?;
    }

    Ok(json!({
        "started": plan.to_current,
        "completed": plan.to_past,
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let respond = |result: Result<serde_json::Value, HandlerErr>| match result {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    };
    match req.method.as_str() {
        "classes.create" => Some(respond(run_create(state, req))),
        "classes.list" => Some(respond(run_list(state, req))),
        "classes.delete" => Some(respond(run_delete(state, req))),
        "classes.migrate" => Some(respond(run_migrate(state, req))),
        _ => None,
    }
}
