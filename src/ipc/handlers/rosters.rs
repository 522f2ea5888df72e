use rusqlite::Connection;
use serde_json::{json, Value};

use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};

fn list_master_data(conn: &Connection) -> Result<Value, rusqlite::Error> {
    let mut stmt = conn.prepare("SELECT id, level FROM grades ORDER BY CAST(level AS INTEGER)")?;
    let grades = stmt
        .query_map([], |r| {
            Ok(json!({ "id": r.get::<_, String>(0)?, "level": r.get::<_, String>(1)? }))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut stmt = conn.prepare("SELECT id, number FROM rooms ORDER BY number")?;
    let rooms = stmt
        .query_map([], |r| {
            Ok(json!({ "id": r.get::<_, String>(0)?, "number": r.get::<_, String>(1)? }))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut stmt = conn.prepare(
        "SELECT s.id, s.name, g.level, r.number
         FROM sections s
         JOIN grades g ON g.id = s.grade_id
         LEFT JOIN rooms r ON r.id = s.room_id
         ORDER BY CAST(g.level AS INTEGER), s.name",
    )?;
    let sections = stmt
        .query_map([], |r| {
            let name: String = r.get(1)?;
            let level: String = r.get(2)?;
            Ok(json!({
                "id": r.get::<_, String>(0)?,
                "name": name,
                "grade": level,
                "room": r.get::<_, Option<String>>(3)?,
                "displayName": format!("{} - {}", level, name),
            }))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut stmt = conn.prepare("SELECT id, code, name FROM subjects ORDER BY code")?;
    let subjects = stmt
        .query_map([], |r| {
            Ok(json!({
                "id": r.get::<_, String>(0)?,
                "code": r.get::<_, String>(1)?,
                "name": r.get::<_, String>(2)?,
            }))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    let mut stmt = conn.prepare(
        "SELECT sc.id, g.level, sc.class_start, sc.class_end, sc.grace_minutes
         FROM grade_schedules sc
         JOIN grades g ON g.id = sc.grade_id
         ORDER BY CAST(g.level AS INTEGER)",
    )?;
    let schedules = stmt
        .query_map([], |r| {
            Ok(json!({
                "id": r.get::<_, String>(0)?,
                "grade": r.get::<_, String>(1)?,
                "classStart": r.get::<_, String>(2)?,
                "classEnd": r.get::<_, String>(3)?,
                "graceMinutes": r.get::<_, i64>(4)?,
            }))
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(json!({
        "grades": grades,
        "rooms": rooms,
        "sections": sections,
        "subjects": subjects,
        "schedules": schedules,
    }))
}

fn list_students(conn: &Connection) -> Result<Value, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT st.id, st.lrn, st.first_name, st.middle_name, st.last_name,
                g.level, se.name, st.guardian_name, st.guardian_phone,
                st.contact_phone, st.email
         FROM students st
         JOIN grades g ON g.id = st.grade_id
         JOIN sections se ON se.id = st.section_id
         ORDER BY st.last_name, st.first_name",
    )?;
    let students = stmt
        .query_map([], |r| {
            Ok(json!({
                "id": r.get::<_, String>(0)?,
                "lrn": r.get::<_, String>(1)?,
                "firstName": r.get::<_, String>(2)?,
                "middleName": r.get::<_, Option<String>>(3)?,
                "lastName": r.get::<_, String>(4)?,
                "grade": r.get::<_, String>(5)?,
                "section": r.get::<_, String>(6)?,
                "guardianName": r.get::<_, Option<String>>(7)?,
                "guardianPhone": r.get::<_, Option<String>>(8)?,
                "phone": r.get::<_, Option<String>>(9)?,
                "email": r.get::<_, Option<String>>(10)?,
            }))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(json!({ "students": students }))
}

fn list_teachers(conn: &Connection) -> Result<Value, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT t.id, t.employee_id, t.first_name, t.middle_name, t.last_name,
                t.email, t.phone, t.status,
                (SELECT COUNT(*) FROM teacher_subjects ts WHERE ts.teacher_id = t.id),
                (SELECT COUNT(*) FROM teacher_sections tc WHERE tc.teacher_id = t.id),
                (SELECT COUNT(*) FROM teacher_subject_sections tss WHERE tss.teacher_id = t.id),
                (SELECT se.name FROM teacher_sections tc
                 JOIN sections se ON se.id = tc.section_id
                 WHERE tc.teacher_id = t.id AND tc.is_adviser = 1)
         FROM teachers t
         ORDER BY t.last_name, t.first_name",
    )?;
    let teachers = stmt
        .query_map([], |r| {
            Ok(json!({
                "id": r.get::<_, String>(0)?,
                "employeeId": r.get::<_, String>(1)?,
                "firstName": r.get::<_, String>(2)?,
                "middleName": r.get::<_, Option<String>>(3)?,
                "lastName": r.get::<_, String>(4)?,
                "email": r.get::<_, Option<String>>(5)?,
                "phone": r.get::<_, Option<String>>(6)?,
                "status": r.get::<_, Option<String>>(7)?,
                "subjectCount": r.get::<_, i64>(8)?,
                "sectionCount": r.get::<_, i64>(9)?,
                "subjectSectionCount": r.get::<_, i64>(10)?,
                "adviserSection": r.get::<_, Option<String>>(11)?,
            }))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(json!({ "teachers": teachers }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let handler: fn(&Connection) -> Result<Value, rusqlite::Error> = match req.method.as_str() {
        "masterData.list" => list_master_data,
        "students.list" => list_students,
        "teachers.list" => list_teachers,
        _ => return None,
    };
    let Some(conn) = state.db.as_ref() else {
        return Some(err(&req.id, "no_workspace", "select a workspace first", None));
    };
    Some(match handler(conn) {
        Ok(result) => ok(&req.id, result),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    })
}
