use std::collections::HashMap;

use crate::classify::{cell, Field};

/// Grade/section/room row after field cleaning.
#[derive(Clone, Debug)]
pub struct GsrRecord {
    pub row: usize,
    pub grade: Option<String>,
    pub section: Option<String>,
    pub room: String,
}

#[derive(Clone, Debug)]
pub struct SubjectRecord {
    pub row: usize,
    pub code: Option<String>,
    pub name: Option<String>,
}

#[derive(Clone, Debug)]
pub struct ScheduleRecord {
    pub row: usize,
    pub grade: Option<String>,
    pub class_start: Option<String>,
    pub class_end: Option<String>,
    pub grace: String,
}

#[derive(Clone, Debug)]
pub struct StudentRecord {
    pub row: usize,
    pub lrn: Option<String>,
    pub first_name: Option<String>,
    pub middle_name: Option<String>,
    pub last_name: Option<String>,
    pub grade: Option<String>,
    pub section: Option<String>,
    pub guardian_name: Option<String>,
    pub guardian_phone: Option<String>,
    pub contact_phone: Option<String>,
    pub email: Option<String>,
}

#[derive(Clone, Debug)]
pub struct TeacherRecord {
    pub row: usize,
    pub employee_id: Option<String>,
    pub first_name: Option<String>,
    pub middle_name: Option<String>,
    pub last_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    /// Invalid incoming status strings coerce to None here, silently.
    pub status: Option<String>,
    pub subjects: Vec<String>,
    pub sections: Vec<String>,
    pub adviser_section: Option<String>,
}

/// Trim; empty becomes None. The default transform for scalar fields.
pub fn clean(s: &str) -> Option<String> {
    let t = s.trim();
    if t.is_empty() {
        None
    } else {
        Some(t.to_string())
    }
}

/// Strip a grade value to digits only; empty result becomes None.
pub fn digits_only(s: &str) -> Option<String> {
    let digits = s.chars().filter(|c| c.is_ascii_digit()).collect::<String>();
    if digits.is_empty() {
        None
    } else {
        Some(digits)
    }
}

/// Blank, "null" and "n/a" room values collapse to the TBD sentinel.
pub fn room_or_tbd(s: &str) -> String {
    let t = s.trim();
    if t.is_empty() || t.eq_ignore_ascii_case("null") || t.eq_ignore_ascii_case("n/a") {
        "TBD".to_string()
    } else {
        t.to_string()
    }
}

/// Extract the leading integer of a grace-period value ("15 mins" ->
/// "15"); blank falls back to the workspace default.
pub fn grace_or_default(s: &str, default_minutes: i64) -> String {
    let t = s.trim();
    let leading = t
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect::<String>();
    if leading.is_empty() {
        if t.is_empty() {
            default_minutes.to_string()
        } else {
            // Non-numeric junk is kept for the validator to flag.
            t.to_string()
        }
    } else {
        leading
    }
}

/// Canonicalize a phone value to international form. Separators are
/// stripped; an 11-digit local number starting with 0 becomes +63 plus
/// the remaining digits, and a bare country-code form gains its +.
pub fn canonical_phone(s: &str) -> Option<String> {
    let t = s.trim();
    if t.is_empty() {
        return None;
    }
    let digits = t.chars().filter(|c| c.is_ascii_digit()).collect::<String>();
    if digits.is_empty() {
        return Some(t.to_string());
    }
    if digits.len() == 11 && digits.starts_with('0') {
        return Some(format!("+63{}", &digits[1..]));
    }
    if digits.len() == 12 && digits.starts_with("63") {
        return Some(format!("+{}", digits));
    }
    if t.starts_with('+') {
        return Some(format!("+{}", digits));
    }
    Some(digits)
}

const TEACHER_STATUSES: &[&str] = &["pending", "active", "inactive"];

/// Lowercase a teacher status; anything outside the accepted set is
/// nulled rather than rejected.
pub fn teacher_status(s: &str) -> Option<String> {
    let t = s.trim().to_ascii_lowercase();
    if TEACHER_STATUSES.contains(&t.as_str()) {
        Some(t)
    } else {
        None
    }
}

/// Split a comma-separated list field into trimmed non-empty items.
pub fn split_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .map(|p| p.to_string())
        .collect()
}

pub fn normalize_gsr(row: &[String], map: &HashMap<Field, usize>, row_no: usize) -> GsrRecord {
    GsrRecord {
        row: row_no,
        grade: digits_only(cell(row, map, Field::Grade)),
        section: clean(cell(row, map, Field::Section)),
        room: room_or_tbd(cell(row, map, Field::Room)),
    }
}

pub fn normalize_subject(
    row: &[String],
    map: &HashMap<Field, usize>,
    row_no: usize,
) -> SubjectRecord {
    SubjectRecord {
        row: row_no,
        code: clean(cell(row, map, Field::SubjectCode)),
        name: clean(cell(row, map, Field::SubjectName)),
    }
}

pub fn normalize_schedule(
    row: &[String],
    map: &HashMap<Field, usize>,
    row_no: usize,
    default_grace: i64,
) -> ScheduleRecord {
    ScheduleRecord {
        row: row_no,
        grade: digits_only(cell(row, map, Field::Grade)),
        class_start: clean(cell(row, map, Field::ClassStart)),
        class_end: clean(cell(row, map, Field::ClassEnd)),
        grace: grace_or_default(cell(row, map, Field::GracePeriod), default_grace),
    }
}

pub fn normalize_student(
    row: &[String],
    map: &HashMap<Field, usize>,
    row_no: usize,
) -> StudentRecord {
    StudentRecord {
        row: row_no,
        lrn: clean(cell(row, map, Field::Lrn)),
        first_name: clean(cell(row, map, Field::FirstName)),
        middle_name: clean(cell(row, map, Field::MiddleName)),
        last_name: clean(cell(row, map, Field::LastName)),
        grade: digits_only(cell(row, map, Field::Grade)),
        section: clean(cell(row, map, Field::Section)),
        guardian_name: clean(cell(row, map, Field::GuardianName)),
        guardian_phone: canonical_phone(cell(row, map, Field::GuardianPhone)),
        contact_phone: canonical_phone(cell(row, map, Field::Phone)),
        email: clean(cell(row, map, Field::Email)),
    }
}

pub fn normalize_teacher(
    row: &[String],
    map: &HashMap<Field, usize>,
    row_no: usize,
) -> TeacherRecord {
    TeacherRecord {
        row: row_no,
        employee_id: clean(cell(row, map, Field::EmployeeId)),
        first_name: clean(cell(row, map, Field::FirstName)),
        middle_name: clean(cell(row, map, Field::MiddleName)),
        last_name: clean(cell(row, map, Field::LastName)),
        email: clean(cell(row, map, Field::Email)),
        phone: canonical_phone(cell(row, map, Field::Phone)),
        status: teacher_status(cell(row, map, Field::Status)),
        subjects: split_list(cell(row, map, Field::Subjects)),
        sections: split_list(cell(row, map, Field::Sections)),
        adviser_section: clean(cell(row, map, Field::AdviserSection)),
    }
}
