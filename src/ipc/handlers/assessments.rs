use crate::db;
use crate::ipc::error::ok;
use crate::ipc::helpers::{
    get_opt_str, get_required_str, parse_date, require_session, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::schedule;
use chrono::NaiveDate;
use rusqlite::OptionalExtension;
use serde_json::json;
use uuid::Uuid;

struct AssessmentFields {
    class_id: String,
    name: String,
    date: String,
    topics: Option<String>,
    status: String,
}

fn read_fields(params: &serde_json::Value) -> Result<AssessmentFields, HandlerErr> {
    let class_id = get_required_str(params, "classId")?;
    if class_id.trim().is_empty() {
        return Err(HandlerErr::bad_params("classId must not be empty"));
    }
    let name = get_required_str(params, "name")?.trim().to_string();
    if name.is_empty() {
        return Err(HandlerErr::bad_params("name must not be empty"));
    }
    let date = get_required_str(params, "date")?;
    parse_date(&date, "date")?;
    let topics = get_opt_str(params, "topics");
    let status = get_opt_str(params, "status").unwrap_or_else(|| "not-started".to_string());
    Ok(AssessmentFields {
        class_id,
        name,
        date,
        topics,
        status,
    })
}

fn assessment_json(id: &str, f: &AssessmentFields) -> serde_json::Value {
    json!({
        "id": id,
        "classId": f.class_id,
        "name": f.name,
        "date": f.date,
        "topics": f.topics,
        "status": f.status,
    })
}

fn run_create(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let (conn, user_id) = require_session(state)?;
    let fields = read_fields(&req.params)?;

    let assessment_id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO assessments(id, user_id, class_id, name, date, topics, status)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        (
            &assessment_id,
            user_id,
            &fields.class_id,
            &fields.name,
            &fields.date,
            &fields.topics,
            &fields.status,
        ),
    )
    .map_err(|e| HandlerErr::new("db_insert_failed", e.to_string()))?;

    // Assessments get a grade entry up front, typed as an exam.
    let grade_id = Uuid::new_v4().to_string();
    conn.execute(
        "INSERT INTO grades(id, user_id, class_id, task_name, task_type,
                            points_earned, points_total, weight, date, link_kind, link_id)
         VALUES(?, ?, ?, ?, 'Exam', 0, 0, NULL, ?, 'assessment', ?)",
        (
            &grade_id,
            user_id,
            &fields.class_id,
            &fields.name,
            &fields.date,
            &assessment_id,
        ),
    )
    .map_err(|e| HandlerErr::new("db_insert_failed", e.to_string()))?;

    db::bump_revision(conn, user_id, "assessments").map_err(HandlerErr::query)?;
    db::bump_revision(conn, user_id, "grades").map_err(HandlerErr::query)?;

    Ok(json!({
        "assessment": assessment_json(&assessment_id, &fields),
        "linkedGradeId": grade_id,
    }))
}

fn run_update(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let (conn, user_id) = require_session(state)?;
    let assessment_id = get_required_str(&req.params, "assessmentId")?;
    let fields = read_fields(&req.params)?;

    let updated = conn
        .execute(
            "UPDATE assessments
             SET class_id = ?, name = ?, date = ?, topics = ?, status = ?
             WHERE id = ? AND user_id = ?",
            (
                &fields.class_id,
                &fields.name,
                &fields.date,
                &fields.topics,
                &fields.status,
                &assessment_id,
                user_id,
            ),
        )
        .map_err(|e| HandlerErr::new("db_update_failed", e.to_string()))?;
    if updated == 0 {
        return Err(HandlerErr::new("not_found", "assessment not found"));
    }

    // The linked grade keeps its task type; assessments carry no type field.
    let grade_updated = conn
        .execute(
            "UPDATE grades
             SET class_id = ?, task_name = ?, date = ?
             WHERE user_id = ? AND link_kind = 'assessment' AND link_id = ?",
            (
                &fields.class_id,
                &fields.name,
                &fields.date,
                user_id,
                &assessment_id,
            ),
        )
        .map_err(|e| HandlerErr::new("db_update_failed", e.to_string()))?;

    db::bump_revision(conn, user_id, "assessments").map_err(HandlerErr::query)?;
    if grade_updated > 0 {
        db::bump_revision(conn, user_id, "grades").map_err(HandlerErr::query)?;
    }

    Ok(json!({ "assessment": assessment_json(&assessment_id, &fields) }))
}

fn run_delete(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let (conn, user_id) = require_session(state)?;
    let assessment_id = get_required_str(&req.params, "assessmentId")?;

    let exists: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM assessments WHERE id = ? AND user_id = ?",
            (&assessment_id, user_id),
            |r| r.get(0),
        )
        .optional()
        .map_err(HandlerErr::query)?;
    if exists.is_none() {
        return Err(HandlerErr::new("not_found", "assessment not found"));
    }

    let grades_deleted = conn
        .execute(
            "DELETE FROM grades
             WHERE user_id = ? AND link_kind = 'assessment' AND link_id = ?",
            (user_id, &assessment_id),
        )
        .map_err(|e| HandlerErr::new("db_delete_failed", e.to_string()))?;
    conn.execute(
        "DELETE FROM assessments WHERE id = ? AND user_id = ?",
        (&assessment_id, user_id),
    )
    .map_err(|e| HandlerErr::new("db_delete_failed", e.to_string()))?;

    db::bump_revision(conn, user_id, "assessments").map_err(HandlerErr::query)?;
    if grades_deleted > 0 {
        db::bump_revision(conn, user_id, "grades").map_err(HandlerErr::query)?;
    }

    Ok(json!({ "ok": true, "linkedGradeDeleted": grades_deleted > 0 }))
}

struct WeekItem {
    date: NaiveDate,
    completed: bool,
    json: serde_json::Value,
}

fn run_list_weeks(state: &AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let (conn, user_id) = require_session(state)?;
    let class_filter = get_opt_str(&req.params, "classId").filter(|s| !s.is_empty());

    let mut sql = String::from(
        "SELECT id, class_id, name, date, topics, status
         FROM assessments
         WHERE user_id = ?",
    );
    if class_filter.is_some() {
        sql.push_str(" AND class_id = ?");
    }
    let mut stmt = conn.prepare(&sql).map_err(HandlerErr::query)?;

    let map_row = |r: &rusqlite::Row<'_>| -> rusqlite::Result<(String, serde_json::Value, String)> {
        let date: String = r.get(3)?;
        let status: String = r.get(5)?;
        let value = json!({
            "id": r.get::<_, String>(0)?,
            "classId": r.get::<_, String>(1)?,
            "name": r.get::<_, String>(2)?,
            "date": date,
            "topics": r.get::<_, Option<String>>(4)?,
            "status": status,
        });
        Ok((date, value, status))
    };
    let rows: Vec<(String, serde_json::Value, String)> = match &class_filter {
        Some(class_id) => stmt
            .query_map((user_id, class_id), map_row)
            .and_then(|it| it.collect()),
        None => stmt.query_map([user_id], map_row).and_then(|it| it.collect()),
    }
    .map_err(HandlerErr::query)?;

    let mut items: Vec<WeekItem> = Vec::with_capacity(rows.len());
    for (date, value, status) in rows {
        items.push(WeekItem {
            date: parse_date(&date, "date")?,
            completed: status == "completed",
            json: value,
        });
    }

    let buckets = schedule::bucket_into_weeks(items, |i| i.date, |i| i.completed);
    let weeks: Vec<serde_json::Value> = buckets
        .into_iter()
        .map(|b| {
            json!({
                "week": b.label,
                "header": schedule::week_range_header(&b.label),
                "range": {
                    "start": b.start.format("%Y-%m-%d").to_string(),
                    "end": b.end.format("%Y-%m-%d").to_string(),
                },
                "allCompleted": b.all_completed,
                "assessments": b.items.into_iter().map(|i| i.json).collect::<Vec<_>>(),
            })
        })
        .collect();

    Ok(json!({ "weeks": weeks }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let respond = |result: Result<serde_json::Value, HandlerErr>| match result {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    };
    match req.method.as_str() {
        "assessments.create" => Some(respond(run_create(state, req))),
        "assessments.update" => Some(respond(run_update(state, req))),
        "assessments.delete" => Some(respond(run_delete(state, req))),
        "assessments.listWeeks" => Some(respond(run_list_weeks(state, req))),
        _ => None,
    }
}
