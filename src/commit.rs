use std::collections::HashSet;

use chrono::Utc;
use rusqlite::{params_from_iter, Connection};

use crate::db;
use crate::error::ImportError;
use crate::normalize::{StudentRecord, TeacherRecord};

/// Outcome of a master-data upsert: the canonical id, and whether this
/// call created the row.
pub struct Upserted {
    pub id: String,
    pub inserted: bool,
}

/// SQLite's default variable limit is 999; stay well under it.
const IN_CHUNK: usize = 500;

fn fetch_id(conn: &Connection, sql: &str, key: &str) -> Result<String, ImportError> {
    let mut stmt = conn.prepare(sql)?;
    let id = stmt.query_row([key], |row| row.get::<_, String>(0))?;
    Ok(id)
}

/// Insert-or-fetch on the natural key. A unique-constraint conflict
/// means the row already exists; the canonical id is fetched and the
/// import continues, which keeps master-data re-runs idempotent.
pub fn upsert_grade(conn: &Connection, level: &str) -> Result<Upserted, ImportError> {
    let affected = conn.execute(
        "INSERT INTO grades(id, level) VALUES(?, ?) ON CONFLICT(level) DO NOTHING",
        (db::new_id(), level),
    )?;
    let id = fetch_id(conn, "SELECT id FROM grades WHERE level = ?", level)?;
    Ok(Upserted {
        id,
        inserted: affected == 1,
    })
}

pub fn upsert_room(conn: &Connection, number: &str) -> Result<Upserted, ImportError> {
    let affected = conn.execute(
        "INSERT INTO rooms(id, number) VALUES(?, ?) ON CONFLICT(number) DO NOTHING",
        (db::new_id(), number),
    )?;
    let id = fetch_id(conn, "SELECT id FROM rooms WHERE number = ?", number)?;
    Ok(Upserted {
        id,
        inserted: affected == 1,
    })
}

pub fn upsert_section(
    conn: &Connection,
    grade_id: &str,
    name: &str,
    room_id: &str,
) -> Result<Upserted, ImportError> {
    let affected = conn.execute(
        "INSERT INTO sections(id, grade_id, name, room_id) VALUES(?, ?, ?, ?)
         ON CONFLICT(grade_id, name) DO NOTHING",
        (db::new_id(), grade_id, name, room_id),
    )?;
    let mut stmt = conn.prepare("SELECT id FROM sections WHERE grade_id = ? AND name = ?")?;
    let id = stmt.query_row([grade_id, name], |row| row.get::<_, String>(0))?;
    Ok(Upserted {
        id,
        inserted: affected == 1,
    })
}

pub fn upsert_subject(conn: &Connection, code: &str, name: &str) -> Result<Upserted, ImportError> {
    let affected = conn.execute(
        "INSERT INTO subjects(id, code, name) VALUES(?, ?, ?) ON CONFLICT(code) DO NOTHING",
        (db::new_id(), code, name),
    )?;
    let id = fetch_id(conn, "SELECT id FROM subjects WHERE code = ?", code)?;
    Ok(Upserted {
        id,
        inserted: affected == 1,
    })
}

/// At most one schedule per grade: update in place when one exists,
/// insert otherwise. Returns true when this call inserted.
pub fn upsert_schedule(
    conn: &Connection,
    grade_id: &str,
    class_start: &str,
    class_end: &str,
    grace_minutes: i64,
) -> Result<bool, ImportError> {
    let mut stmt = conn.prepare("SELECT id FROM grade_schedules WHERE grade_id = ?")?;
    let existing = stmt
        .query_map([grade_id], |row| row.get::<_, String>(0))?
        .next()
        .transpose()?;

    match existing {
        Some(id) => {
            conn.execute(
                "UPDATE grade_schedules
                 SET class_start = ?, class_end = ?, grace_minutes = ?
                 WHERE id = ?",
                (class_start, class_end, grace_minutes, id),
            )?;
            Ok(false)
        }
        None => {
            conn.execute(
                "INSERT INTO grade_schedules(id, grade_id, class_start, class_end, grace_minutes)
                 VALUES(?, ?, ?, ?, ?)",
                (db::new_id(), grade_id, class_start, class_end, grace_minutes),
            )?;
            Ok(true)
        }
    }
}

/// One batched existence check over a natural-key set. Returns the keys
/// that already have rows, so the caller can partition {new, existing}.
pub fn existing_keys(
    conn: &Connection,
    table: &str,
    column: &str,
    keys: &[String],
) -> Result<HashSet<String>, ImportError> {
    let mut found = HashSet::new();
    for chunk in keys.chunks(IN_CHUNK) {
        let placeholders = vec!["?"; chunk.len()].join(", ");
        let sql = format!(
            "SELECT {} FROM {} WHERE {} IN ({})",
            column, table, column, placeholders
        );
        let mut stmt = conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(chunk.iter()))?;
        while let Some(row) = rows.next()? {
            found.insert(row.get::<_, String>(0)?);
        }
    }
    Ok(found)
}

pub fn insert_student(
    conn: &Connection,
    rec: &StudentRecord,
    lrn: &str,
    grade_id: &str,
    section_id: &str,
) -> Result<(), ImportError> {
    conn.execute(
        "INSERT INTO students(
            id, lrn, first_name, middle_name, last_name,
            grade_id, section_id, guardian_name, guardian_phone,
            contact_phone, email, created_at
         ) VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        (
            db::new_id(),
            lrn,
            rec.first_name.as_deref().unwrap_or(""),
            rec.middle_name.as_deref(),
            rec.last_name.as_deref().unwrap_or(""),
            grade_id,
            section_id,
            rec.guardian_name.as_deref(),
            rec.guardian_phone.as_deref(),
            rec.contact_phone.as_deref(),
            rec.email.as_deref(),
            Utc::now().to_rfc3339(),
        ),
    )?;
    Ok(())
}

pub fn insert_teacher(
    conn: &Connection,
    rec: &TeacherRecord,
    employee_id: &str,
) -> Result<String, ImportError> {
    let id = db::new_id();
    conn.execute(
        "INSERT INTO teachers(
            id, employee_id, first_name, middle_name, last_name,
            email, phone, status, created_at
         ) VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?)",
        (
            &id,
            employee_id,
            rec.first_name.as_deref().unwrap_or(""),
            rec.middle_name.as_deref(),
            rec.last_name.as_deref().unwrap_or(""),
            rec.email.as_deref(),
            rec.phone.as_deref(),
            rec.status.as_deref(),
            Utc::now().to_rfc3339(),
        ),
    )?;
    Ok(id)
}

#[derive(Clone, Copy, Debug, Default)]
pub struct AssignmentCounts {
    pub subjects: usize,
    pub sections: usize,
    pub subject_sections: usize,
}

/// Cross-link a teacher's resolved subjects and sections. The adviser
/// section joins the teaching set when not already listed; the
/// subject-in-section relation gets the full cross-product. Every write
/// is conflict-ignore, so re-linking the same file changes nothing.
pub fn link_assignments(
    conn: &Connection,
    teacher_id: &str,
    subject_ids: &[String],
    section_ids: &[String],
    adviser_section_id: Option<&str>,
) -> Result<AssignmentCounts, ImportError> {
    let mut teaching = Vec::new();
    for id in section_ids {
        if !teaching.contains(id) {
            teaching.push(id.clone());
        }
    }
    if let Some(adviser) = adviser_section_id {
        if !teaching.iter().any(|id| id == adviser) {
            teaching.push(adviser.to_string());
        }
    }

    let mut counts = AssignmentCounts::default();
    for subject_id in subject_ids {
        counts.subjects += conn.execute(
            "INSERT OR IGNORE INTO teacher_subjects(teacher_id, subject_id) VALUES(?, ?)",
            (teacher_id, subject_id),
        )?;
    }
    for section_id in &teaching {
        let is_adviser = adviser_section_id == Some(section_id.as_str());
        counts.sections += conn.execute(
            "INSERT OR IGNORE INTO teacher_sections(teacher_id, section_id, is_adviser)
             VALUES(?, ?, ?)",
            (teacher_id, section_id, is_adviser as i64),
        )?;
    }
    for subject_id in subject_ids {
        for section_id in &teaching {
            counts.subject_sections += conn.execute(
                "INSERT OR IGNORE INTO teacher_subject_sections(teacher_id, subject_id, section_id)
                 VALUES(?, ?, ?)",
                (teacher_id, subject_id, section_id),
            )?;
        }
    }
    Ok(counts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalize::TeacherRecord;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().expect("open");
        db::init_schema(&conn).expect("schema");
        conn
    }

    #[test]
    fn master_upserts_are_idempotent_and_return_the_same_id() {
        let conn = conn();
        let first = upsert_grade(&conn, "7").expect("insert");
        assert!(first.inserted);
        let second = upsert_grade(&conn, "7").expect("re-upsert");
        assert!(!second.inserted);
        assert_eq!(first.id, second.id);

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM grades", [], |r| r.get(0))
            .expect("count");
        assert_eq!(count, 1);
    }

    #[test]
    fn schedule_updates_in_place_for_an_existing_grade() {
        let conn = conn();
        let grade = upsert_grade(&conn, "7").expect("grade");
        assert!(upsert_schedule(&conn, &grade.id, "07:30", "16:00", 15).expect("insert"));
        assert!(!upsert_schedule(&conn, &grade.id, "08:00", "17:00", 10).expect("update"));

        let (start, count): (String, i64) = conn
            .query_row(
                "SELECT class_start, (SELECT COUNT(*) FROM grade_schedules) FROM grade_schedules",
                [],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .expect("row");
        assert_eq!(start, "08:00");
        assert_eq!(count, 1);
    }

    #[test]
    fn existing_keys_partitions_a_batch() {
        let conn = conn();
        let grade = upsert_grade(&conn, "7").expect("grade");
        let room = upsert_room(&conn, "101").expect("room");
        let section = upsert_section(&conn, &grade.id, "1", &room.id).expect("section");
        let rec = StudentRecord {
            row: 2,
            lrn: Some("1001".to_string()),
            first_name: Some("Ana".to_string()),
            middle_name: None,
            last_name: Some("Reyes".to_string()),
            grade: Some("7".to_string()),
            section: Some("7-1".to_string()),
            guardian_name: None,
            guardian_phone: None,
            contact_phone: None,
            email: None,
        };
        insert_student(&conn, &rec, "1001", &grade.id, &section.id).expect("insert");

        let keys = vec!["1001".to_string(), "1002".to_string()];
        let existing = existing_keys(&conn, "students", "lrn", &keys).expect("check");
        assert!(existing.contains("1001"));
        assert!(!existing.contains("1002"));
    }

    #[test]
    fn two_subjects_by_three_sections_yield_six_cross_rows() {
        let conn = conn();
        let grade = upsert_grade(&conn, "7").expect("grade");
        let room = upsert_room(&conn, "TBD").expect("room");
        let sections = ["1", "2", "3"]
            .iter()
            .map(|name| upsert_section(&conn, &grade.id, name, &room.id).expect("section").id)
            .collect::<Vec<_>>();
        let math = upsert_subject(&conn, "MATH7", "Mathematics 7").expect("subject").id;
        let sci = upsert_subject(&conn, "SCI7", "Science 7").expect("subject").id;

        let teacher = TeacherRecord {
            row: 2,
            employee_id: Some("T-01".to_string()),
            first_name: Some("Jo".to_string()),
            middle_name: None,
            last_name: Some("Cruz".to_string()),
            email: None,
            phone: None,
            status: Some("active".to_string()),
            subjects: vec![],
            sections: vec![],
            adviser_section: None,
        };
        let teacher_id = insert_teacher(&conn, &teacher, "T-01").expect("teacher");

        let subjects = vec![math, sci];
        let counts = link_assignments(&conn, &teacher_id, &subjects, &sections, Some(&sections[0]))
            .expect("link");
        assert_eq!(counts.subjects, 2);
        assert_eq!(counts.sections, 3);
        assert_eq!(counts.subject_sections, 6);

        // Second pass is a no-op on every relation.
        let again = link_assignments(&conn, &teacher_id, &subjects, &sections, Some(&sections[0]))
            .expect("relink");
        assert_eq!(again.subjects, 0);
        assert_eq!(again.subject_sections, 0);

        let adviser: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM teacher_sections WHERE is_adviser = 1",
                [],
                |r| r.get(0),
            )
            .expect("adviser count");
        assert_eq!(adviser, 1);
    }

    #[test]
    fn adviser_section_joins_the_teaching_set_when_absent() {
        let conn = conn();
        let grade = upsert_grade(&conn, "8").expect("grade");
        let room = upsert_room(&conn, "TBD").expect("room");
        let s1 = upsert_section(&conn, &grade.id, "1", &room.id).expect("section").id;
        let s2 = upsert_section(&conn, &grade.id, "2", &room.id).expect("section").id;
        let subj = upsert_subject(&conn, "ENG8", "English 8").expect("subject").id;

        let teacher = TeacherRecord {
            row: 2,
            employee_id: Some("T-02".to_string()),
            first_name: Some("Ed".to_string()),
            middle_name: None,
            last_name: Some("Santos".to_string()),
            email: None,
            phone: None,
            status: None,
            subjects: vec![],
            sections: vec![],
            adviser_section: None,
        };
        let teacher_id = insert_teacher(&conn, &teacher, "T-02").expect("teacher");
        let counts =
            link_assignments(&conn, &teacher_id, &[subj], &[s1], Some(&s2)).expect("link");
        // One listed section plus the adviser section, 1 subject x 2.
        assert_eq!(counts.sections, 2);
        assert_eq!(counts.subject_sections, 2);
    }
}
