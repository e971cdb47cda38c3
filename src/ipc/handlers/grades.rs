use crate::calc::{self, GradePoints};
use crate::db;
use crate::ipc::error::ok;
use crate::ipc::helpers::{
    get_opt_f64, get_opt_str, get_required_f64, get_required_str, grade_row_json, parse_date,
    require_session, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;
use uuid::Uuid;

fn run_create(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let (conn, user_id) = require_session(state)?;

    let class_id = get_required_str(&req.params, "classId")?;
    if class_id.trim().is_empty() {
        return Err(HandlerErr::bad_params("classId must not be empty"));
    }
    let task_name = get_required_str(&req.params, "taskName")?.trim().to_string();
    if task_name.is_empty() {
        return Err(HandlerErr::bad_params("taskName must not be empty"));
    }
    let task_type = get_required_str(&req.params, "taskType")?;
    let date = get_required_str(&req.params, "date")?;
    parse_date(&date, "date")?;

    let earned = get_required_f64(&req.params, "pointsEarned")?;
    let total = get_required_f64(&req.params, "pointsTotal")?;
    if earned < 0.0 || total < 0.0 {
        return Err(HandlerErr::bad_params("points must not be negative"));
    }
    let weight = get_opt_f64(&req.params, "weight")?;
    if let Some(w) = weight {
        if w < 0.0 {
            return Err(HandlerErr::bad_params("weight must not be negative"));
        }
    }
    // Rejected before any write; the edit path clamps instead.
    if total > 0.0 && earned > total {
        return Err(HandlerErr::bad_params(
            "points earned cannot exceed points total",
        ));
    }

    let grade_id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO grades(id, user_id, class_id, task_name, task_type,
                            points_earned, points_total, weight, date, link_kind, link_id)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, NULL, NULL)",
        (
            &grade_id,
            user_id,
            &class_id,
            &task_name,
            &task_type,
            earned,
            total,
            weight,
            &date,
        ),
    )
    .map_err(|e| HandlerErr::new("db_insert_failed", e.to_string()))?;
    db::bump_revision(conn, user_id, "grades").map_err(HandlerErr::query)?;

    Ok(json!({
        "grade": grade_row_json(
            grade_id,
            class_id,
            task_name,
            task_type,
            earned,
            total,
            weight,
            Some(date),
            None,
            None,
        )
    }))
}

struct GradeRow {
    class_id: String,
    task_name: String,
    task_type: String,
    earned: f64,
    total: f64,
    weight: Option<f64>,
    date: Option<String>,
    link_kind: Option<String>,
    link_id: Option<String>,
}

fn fetch_grade(conn: &Connection, user_id: &str, grade_id: &str) -> Result<GradeRow, HandlerErr> {
    conn.query_row(
        "SELECT class_id, task_name, task_type, points_earned, points_total,
                weight, date, link_kind, link_id
         FROM grades
         WHERE id = ? AND user_id = ?",
        (grade_id, user_id),
        |r| {
            Ok(GradeRow {
                class_id: r.get(0)?,
                task_name: r.get(1)?,
                task_type: r.get(2)?,
                earned: r.get(3)?,
                total: r.get(4)?,
                weight: r.get(5)?,
                date: r.get(6)?,
                link_kind: r.get(7)?,
                link_id: r.get(8)?,
            })
        },
    )
    .optional()
    .map_err(HandlerErr::query)?
    .ok_or_else(|| HandlerErr::new("not_found", "grade not found"))
}

fn run_update_points(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let (conn, user_id) = require_session(state)?;
    let grade_id = get_required_str(&req.params, "gradeId")?;
    let field = get_required_str(&req.params, "field")?;

    let mut grade = fetch_grade(conn, user_id, &grade_id)?;
    let value = get_opt_f64(&req.params, "value")?;

    match field.as_str() {
        // A cleared points input means 0, not "unknown".
        "earned" => {
            let v = value.unwrap_or(0.0);
            if v < 0.0 {
                return Err(HandlerErr::bad_params("points must not be negative"));
            }
            grade.earned = v;
        }
        "total" => {
            let v = value.unwrap_or(0.0);
            if v < 0.0 {
                return Err(HandlerErr::bad_params("points must not be negative"));
            }
            grade.total = v;
        }
        "weight" => {
            if let Some(w) = value {
                if w < 0.0 {
                    return Err(HandlerErr::bad_params("weight must not be negative"));
                }
            }
            grade.weight = value;
        }
        _ => {
            return Err(HandlerErr::bad_params(
                "field must be earned, total or weight",
            ))
        }
    }

    // Persist the clamped value rather than dropping the edit.
    let clamped_earned = calc::clamp_earned(grade.earned, grade.total);
    let clamped = clamped_earned != grade.earned;
    grade.earned = clamped_earned;

    conn.execute(
        "UPDATE grades
         SET points_earned = ?, points_total = ?, weight = ?
         WHERE id = ? AND user_id = ?",
        (grade.earned, grade.total, grade.weight, &grade_id, user_id),
    )
    .map_err(|e| HandlerErr::new("db_update_failed", e.to_string()))?;
    db::bump_revision(conn, user_id, "grades").map_err(HandlerErr::query)?;

    Ok(json!({
        "grade": grade_row_json(
            grade_id,
            grade.class_id,
            grade.task_name,
            grade.task_type,
            grade.earned,
            grade.total,
            grade.weight,
            grade.date,
            grade.link_kind,
            grade.link_id,
        ),
        "clamped": clamped,
    }))
}

fn run_delete(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let (conn, user_id) = require_session(state)?;
    let grade_id = get_required_str(&req.params, "gradeId")?;

    let deleted = conn
        .execute(
            "DELETE FROM grades WHERE id = ? AND user_id = ?",
            (&grade_id, user_id),
        )
        .map_err(|e| HandlerErr::new("db_delete_failed", e.to_string()))?;
    if deleted == 0 {
        return Err(HandlerErr::new("not_found", "grade not found"));
    }
    db::bump_revision(conn, user_id, "grades").map_err(HandlerErr::query)?;

    Ok(json!({ "ok": true }))
}

fn run_summary(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let (conn, user_id) = require_session(state)?;
    let class_filter = get_opt_str(&req.params, "classId").filter(|s| !s.is_empty());

    let mut sql = String::from(
        "SELECT id, class_id, task_name, task_type, points_earned, points_total,
                weight, date, link_kind, link_id
         FROM grades
         WHERE user_id = ?",
    );
    if class_filter.is_some() {
        sql.push_str(" AND class_id = ?");
    }
    let mut stmt = conn.prepare(&sql).map_err(HandlerErr::query)?;

    struct Row {
        class_id: String,
        earned: f64,
        total: f64,
        weight: Option<f64>,
        date: Option<String>,
        json: serde_json::Value,
    }
    let map_row = |r: &rusqlite::Row<'_>| -> rusqlite::Result<Row> {
        let class_id: String = r.get(1)?;
        let earned: f64 = r.get(4)?;
        let total: f64 = r.get(5)?;
        let weight: Option<f64> = r.get(6)?;
        let date: Option<String> = r.get(7)?;
        let mut json = grade_row_json(
            r.get(0)?,
            class_id.clone(),
            r.get(2)?,
            r.get(3)?,
            earned,
            total,
            weight,
            date.clone(),
            r.get(8)?,
            r.get(9)?,
        );
        json["percent"] = json!(calc::grade_percent(earned, total));
        json["ungraded"] = json!(total <= 0.0);
        Ok(Row {
            class_id,
            earned,
            total,
            weight,
            date,
            json,
        })
    };
    let rows: Vec<Row> = match &class_filter {
        Some(class_id) => stmt
            .query_map((user_id, class_id), map_row)
            .and_then(|it| it.collect()),
        None => stmt.query_map([user_id], map_row).and_then(|it| it.collect()),
    }
    .map_err(HandlerErr::query)?;

    // Group rows per class, keeping first-seen order until the final sort.
    let mut sections: Vec<(String, Vec<Row>)> = Vec::new();
    for row in rows {
        match sections.iter_mut().find(|(id, _)| *id == row.class_id) {
            Some((_, group)) => group.push(row),
            None => sections.push((row.class_id.clone(), vec![row])),
        }
    }

    let class_name = |class_id: &str| -> Result<Option<String>, HandlerErr> {
        conn.query_row(
            "SELECT name FROM classes WHERE id = ? AND user_id = ?",
            (class_id, user_id),
            |r| r.get(0),
        )
        .optional()
        .map_err(HandlerErr::query)
    };

    let mut out: Vec<serde_json::Value> = Vec::with_capacity(sections.len());
    for (class_id, mut group) in sections {
        let name = class_name(&class_id)?.unwrap_or_else(|| "Unknown Class".to_string());

        let points: Vec<GradePoints> = group
            .iter()
            .map(|r| GradePoints {
                earned: r.earned,
                total: r.total,
                weight: r.weight,
            })
            .collect();
        // Running average renders 0 while everything is still ungraded.
        let average = calc::class_average(&points).unwrap_or(0.0);
        let ungraded_count = group.iter().filter(|r| r.total <= 0.0).count();

        // Newest first; dateless grades sink to the bottom.
        group.sort_by(|a, b| b.date.cmp(&a.date));

        out.push(json!({
            "classId": class_id,
            "className": name,
            "average": average,
            "ungradedCount": ungraded_count,
            "grades": group.into_iter().map(|r| r.json).collect::<Vec<_>>(),
        }));
    }

    out.sort_by(|a, b| {
        let name_a = a["className"].as_str().unwrap_or_default();
        let name_b = b["className"].as_str().unwrap_or_default();
        name_a.cmp(name_b)
    });

    Ok(json!({ "classes": out }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let respond = |result: Result<serde_json::Value, HandlerErr>| match result {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    };
    match req.method.as_str() {
        "grades.create" => Some(respond(run_create(state, req))),
        "grades.updatePoints" => Some(respond(run_update_points(state, req))),
        "grades.delete" => Some(respond(run_delete(state, req))),
        "grades.summary" => Some(respond(run_summary(state, req))),
        _ => None,
    }
}
