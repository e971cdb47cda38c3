use rusqlite::Connection;
use std::collections::HashMap;
use std::path::Path;

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join("gradetrack.sqlite3");
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS classes(
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            name TEXT NOT NULL,
            code TEXT,
            start_date TEXT,
            end_date TEXT,
            instructor TEXT,
            status TEXT NOT NULL DEFAULT 'current'
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_classes_user ON classes(user_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_classes_user_status ON classes(user_id, status)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS future_classes(
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            name TEXT NOT NULL,
            code TEXT,
            start_date TEXT,
            end_date TEXT,
            semester TEXT,
            notes TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_future_classes_user ON future_classes(user_id)",
        [],
    )?;

    // class_id is a soft reference on purpose: deleting a class leaves its
    // assignments, assessments and grades in place.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS assignments(
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            class_id TEXT NOT NULL,
            name TEXT NOT NULL,
            kind TEXT NOT NULL,
            due_date TEXT NOT NULL,
            status TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_assignments_user ON assignments(user_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_assignments_user_class ON assignments(user_id, class_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS assessments(
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            class_id TEXT NOT NULL,
            name TEXT NOT NULL,
            date TEXT NOT NULL,
            topics TEXT,
            status TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_assessments_user ON assessments(user_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_assessments_user_class ON assessments(user_id, class_id)",
        [],
    )?;

    // link_kind/link_id form a tagged optional reference to the assignment or
    // assessment this grade was auto-created for. At most one link per grade.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS grades(
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            class_id TEXT NOT NULL,
            task_name TEXT NOT NULL,
            task_type TEXT NOT NULL,
            points_earned REAL NOT NULL DEFAULT 0,
            points_total REAL NOT NULL DEFAULT 0,
            weight REAL,
            date TEXT,
            link_kind TEXT,
            link_id TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_grades_user ON grades(user_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_grades_user_class ON grades(user_id, class_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_grades_link ON grades(user_id, link_kind, link_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS collection_revisions(
            user_id TEXT NOT NULL,
            collection TEXT NOT NULL,
            revision INTEGER NOT NULL DEFAULT 0,
            PRIMARY KEY(user_id, collection)
        )",
        [],
    )?;

    Ok(conn)
}

/// Advance a collection's revision counter after a write so sync.poll clients
/// know to refetch the snapshot.
pub fn bump_revision(conn: &Connection, user_id: &str, collection: &str) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO collection_revisions(user_id, collection, revision)
         VALUES(?, ?, 1)
         ON CONFLICT(user_id, collection) DO UPDATE SET revision = revision + 1",
        (user_id, collection),
    )?;
    Ok(())
}

pub fn revisions(conn: &Connection, user_id: &str) -> rusqlite::Result<HashMap<String, i64>> {
    let mut stmt =
        conn.prepare("SELECT collection, revision FROM collection_revisions WHERE user_id = ?")?;
    let rows = stmt.query_map([user_id], |r| {
        Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)?))
    })?;
    let mut out = HashMap::new();
    for row in rows {
        let (collection, revision) = row?;
        out.insert(collection, revision);
    }
    Ok(out)
}
