use std::collections::{BTreeMap, HashSet};

use crate::normalize::{GsrRecord, ScheduleRecord, StudentRecord, SubjectRecord, TeacherRecord};

/// Field -> message for one row. A row is valid iff the map is empty.
pub type FieldErrors = BTreeMap<&'static str, String>;

fn is_digits(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

/// Strict 24-hour "HH:MM".
pub fn is_hhmm(s: &str) -> bool {
    let b = s.as_bytes();
    if b.len() != 5 || b[2] != b':' {
        return false;
    }
    let hh = &s[..2];
    let mm = &s[3..];
    if !is_digits(hh) || !is_digits(mm) {
        return false;
    }
    let h: u32 = hh.parse().unwrap_or(99);
    let m: u32 = mm.parse().unwrap_or(99);
    h <= 23 && m <= 59
}

/// Same-day comparison; both sides must already be valid HH:MM.
pub fn hhmm_before(start: &str, end: &str) -> bool {
    start < end
}

fn is_email(s: &str) -> bool {
    let Some(at) = s.find('@') else {
        return false;
    };
    let (local, domain) = s.split_at(at);
    let domain = &domain[1..];
    !local.is_empty()
        && !domain.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !s.contains(char::is_whitespace)
}

fn is_phone(s: &str) -> bool {
    let digits = s.strip_prefix('+').unwrap_or(s);
    (7..=15).contains(&digits.len()) && digits.chars().all(|c| c.is_ascii_digit())
}

fn require<'a>(errors: &mut FieldErrors, field: &'static str, value: &'a Option<String>) -> Option<&'a str> {
    match value.as_deref() {
        Some(v) => Some(v),
        None => {
            errors.insert(field, format!("{} is required", field));
            None
        }
    }
}

pub fn validate_gsr(rec: &GsrRecord) -> FieldErrors {
    let mut errors = FieldErrors::new();
    // grade has already been stripped to digits; None covers both the
    // missing and the non-numeric case.
    if rec.grade.is_none() {
        errors.insert("grade", "grade is required and must be numeric".to_string());
    }
    require(&mut errors, "section", &rec.section);
    errors
}

pub fn validate_subject(rec: &SubjectRecord) -> FieldErrors {
    let mut errors = FieldErrors::new();
    require(&mut errors, "subject_code", &rec.code);
    require(&mut errors, "subject_name", &rec.name);
    errors
}

pub fn validate_schedule(rec: &ScheduleRecord) -> FieldErrors {
    let mut errors = FieldErrors::new();
    if rec.grade.is_none() {
        errors.insert("grade", "grade is required and must be numeric".to_string());
    }
    let start = require(&mut errors, "class_start", &rec.class_start);
    let end = require(&mut errors, "class_end", &rec.class_end);
    if let Some(start) = start {
        if !is_hhmm(start) {
            errors.insert("class_start", "class_start must be 24-hour HH:MM".to_string());
        }
    }
    if let Some(end) = end {
        if !is_hhmm(end) {
            errors.insert("class_end", "class_end must be 24-hour HH:MM".to_string());
        }
    }
    if let (Some(start), Some(end)) = (rec.class_start.as_deref(), rec.class_end.as_deref()) {
        if is_hhmm(start) && is_hhmm(end) && !hhmm_before(start, end) {
            errors.insert(
                "class_end",
                "class_end must be later than class_start".to_string(),
            );
        }
    }
    match rec.grace.parse::<i64>() {
        Ok(n) if (0..=120).contains(&n) => {}
        _ => {
            errors.insert(
                "grace_period",
                "grace_period must be an integer between 0 and 120".to_string(),
            );
        }
    }
    errors
}

fn validate_contact(errors: &mut FieldErrors, email: &Option<String>, phone_fields: &[(&'static str, &Option<String>)]) {
    if let Some(email) = email.as_deref() {
        if !is_email(email) {
            errors.insert("email", "email address is not valid".to_string());
        }
    }
    for (field, value) in phone_fields {
        if let Some(phone) = value.as_deref() {
            if !is_phone(phone) {
                errors.insert(field, format!("{} is not a valid phone number", field));
            }
        }
    }
}

/// Validate a student batch. Required/format rules apply per row; a
/// second occurrence of an lrn within the batch is flagged on the later
/// row.
pub fn validate_students(batch: &[StudentRecord]) -> Vec<FieldErrors> {
    let mut seen_lrn = HashSet::new();
    batch
        .iter()
        .map(|rec| {
            let mut errors = FieldErrors::new();
            if let Some(lrn) = require(&mut errors, "lrn", &rec.lrn) {
                if !seen_lrn.insert(lrn.to_string()) {
                    errors.insert("lrn", format!("duplicate lrn {} in this file", lrn));
                }
            }
            require(&mut errors, "first_name", &rec.first_name);
            require(&mut errors, "last_name", &rec.last_name);
            if rec.grade.is_none() {
                errors.insert("grade", "grade is required and must be numeric".to_string());
            }
            require(&mut errors, "section", &rec.section);
            validate_contact(
                &mut errors,
                &rec.email,
                &[
                    ("phone", &rec.contact_phone),
                    ("guardian_phone", &rec.guardian_phone),
                ],
            );
            errors
        })
        .collect()
}

/// Validate a teacher batch. Duplicate employee ids and duplicate email
/// addresses within the batch are flagged; an invalid status never is,
/// since normalization already nulled it.
pub fn validate_teachers(batch: &[TeacherRecord]) -> Vec<FieldErrors> {
    let mut seen_employee = HashSet::new();
    let mut seen_email = HashSet::new();
    batch
        .iter()
        .map(|rec| {
            let mut errors = FieldErrors::new();
            if let Some(id) = require(&mut errors, "employee_id", &rec.employee_id) {
                if !seen_employee.insert(id.to_string()) {
                    errors.insert(
                        "employee_id",
                        format!("duplicate employee_id {} in this file", id),
                    );
                }
            }
            require(&mut errors, "first_name", &rec.first_name);
            require(&mut errors, "last_name", &rec.last_name);
            validate_contact(&mut errors, &rec.email, &[("phone", &rec.phone)]);
            if let Some(email) = rec.email.as_deref() {
                if !seen_email.insert(email.to_ascii_lowercase()) {
                    errors.insert("email", format!("duplicate email {} in this file", email));
                }
            }
            errors
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn student(lrn: &str, first: &str, last: &str, grade: &str, section: &str) -> StudentRecord {
        StudentRecord {
            row: 2,
            lrn: if lrn.is_empty() { None } else { Some(lrn.to_string()) },
            first_name: if first.is_empty() { None } else { Some(first.to_string()) },
            middle_name: None,
            last_name: if last.is_empty() { None } else { Some(last.to_string()) },
            grade: if grade.is_empty() { None } else { Some(grade.to_string()) },
            section: if section.is_empty() { None } else { Some(section.to_string()) },
            guardian_name: None,
            guardian_phone: None,
            contact_phone: None,
            email: None,
        }
    }

    #[test]
    fn hhmm_accepts_only_zero_padded_24_hour_times() {
        assert!(is_hhmm("07:30"));
        assert!(is_hhmm("23:59"));
        assert!(!is_hhmm("7:30"));
        assert!(!is_hhmm("24:00"));
        assert!(!is_hhmm("12:60"));
        assert!(!is_hhmm("0730"));
    }

    #[test]
    fn schedule_requires_start_before_end() {
        let rec = ScheduleRecord {
            row: 2,
            grade: Some("7".to_string()),
            class_start: Some("16:00".to_string()),
            class_end: Some("07:30".to_string()),
            grace: "15".to_string(),
        };
        let errors = validate_schedule(&rec);
        assert!(errors.contains_key("class_end"));
    }

    #[test]
    fn schedule_grace_must_be_in_range() {
        let mut rec = ScheduleRecord {
            row: 2,
            grade: Some("7".to_string()),
            class_start: Some("07:30".to_string()),
            class_end: Some("16:00".to_string()),
            grace: "121".to_string(),
        };
        assert!(validate_schedule(&rec).contains_key("grace_period"));
        rec.grace = "0".to_string();
        assert!(validate_schedule(&rec).is_empty());
    }

    #[test]
    fn duplicate_lrn_within_batch_flags_the_second_row() {
        let batch = vec![
            student("1001", "Ana", "Reyes", "7", "7-1"),
            student("1001", "Ben", "Cruz", "7", "7-1"),
        ];
        let results = validate_students(&batch);
        assert!(results[0].is_empty());
        assert!(results[1]
            .get("lrn")
            .map(|m| m.contains("duplicate"))
            .unwrap_or(false));
    }

    #[test]
    fn missing_lrn_invalidates_only_that_row() {
        let batch = vec![
            student("", "Ana", "Reyes", "7", "7-1"),
            student("1002", "Ben", "Cruz", "7", "7-1"),
        ];
        let results = validate_students(&batch);
        assert!(results[0].contains_key("lrn"));
        assert!(results[1].is_empty());
    }

    #[test]
    fn teacher_duplicate_email_is_flagged() {
        let make = |id: &str, email: &str| TeacherRecord {
            row: 2,
            employee_id: Some(id.to_string()),
            first_name: Some("Jo".to_string()),
            middle_name: None,
            last_name: Some("Cruz".to_string()),
            email: Some(email.to_string()),
            phone: None,
            status: None,
            subjects: vec![],
            sections: vec![],
            adviser_section: None,
        };
        let results = validate_teachers(&[make("T1", "jo@school.ph"), make("T2", "JO@school.ph")]);
        assert!(results[0].is_empty());
        assert!(results[1].contains_key("email"));
    }

    #[test]
    fn invalid_email_and_phone_are_reported() {
        let mut rec = student("1001", "Ana", "Reyes", "7", "7-1");
        rec.email = Some("not-an-email".to_string());
        rec.contact_phone = Some("12345".to_string());
        let results = validate_students(&[rec]);
        assert!(results[0].contains_key("email"));
        assert!(results[0].contains_key("phone"));
    }
}
