use std::collections::HashMap;

/// Canonical upload fields across every entity family. Each route maps
/// sheet headers onto a subset of these through the alias tables below.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Field {
    Grade,
    Section,
    Room,
    SubjectCode,
    SubjectName,
    ClassStart,
    ClassEnd,
    GracePeriod,
    Lrn,
    FirstName,
    MiddleName,
    LastName,
    Email,
    Phone,
    GuardianName,
    GuardianPhone,
    EmployeeId,
    Status,
    Subjects,
    Sections,
    AdviserSection,
}

impl Field {
    /// Accepted header spellings, most common first. Matching is against
    /// the normalized header (lowercased, underscores collapsed to
    /// spaces), so only the space form is listed.
    pub fn aliases(self) -> &'static [&'static str] {
        match self {
            Field::Grade => &["grade", "grade level", "year level", "level"],
            Field::Section => &["section", "section name"],
            Field::Room => &["room", "room number", "room no", "room no."],
            Field::SubjectCode => &["subject code", "code"],
            Field::SubjectName => &["subject name", "subject", "description"],
            Field::ClassStart => &["class start", "start time", "time in", "start"],
            Field::ClassEnd => &["class end", "end time", "time out", "end"],
            Field::GracePeriod => &["grace period", "grace minutes", "grace"],
            Field::Lrn => &["lrn", "learner reference number"],
            Field::FirstName => &["first name", "given name"],
            Field::MiddleName => &["middle name"],
            Field::LastName => &["last name", "surname", "family name"],
            Field::Email => &["email", "email address"],
            Field::Phone => &["phone", "phone number", "contact number", "mobile"],
            Field::GuardianName => &["guardian name", "guardian", "parent name"],
            Field::GuardianPhone => &["guardian phone", "guardian contact", "parent phone"],
            Field::EmployeeId => &["employee id", "employee no", "employee number"],
            Field::Status => &["status"],
            Field::Subjects => &["subjects", "subjects handled", "subject codes"],
            Field::Sections => &["sections", "sections handled", "teaching sections"],
            Field::AdviserSection => &["adviser section", "advisory section", "advisory"],
        }
    }
}

/// The eight fields the master-data classifier tests for presence.
pub const MASTER_FIELDS: &[Field] = &[
    Field::Grade,
    Field::Section,
    Field::Room,
    Field::SubjectCode,
    Field::SubjectName,
    Field::ClassStart,
    Field::ClassEnd,
    Field::GracePeriod,
];

/// Fixed alias set for the student upload route (no classification).
pub const STUDENT_FIELDS: &[Field] = &[
    Field::Lrn,
    Field::FirstName,
    Field::MiddleName,
    Field::LastName,
    Field::Grade,
    Field::Section,
    Field::GuardianName,
    Field::GuardianPhone,
    Field::Phone,
    Field::Email,
];

/// Fixed alias set for the teacher upload route (no classification).
pub const TEACHER_FIELDS: &[Field] = &[
    Field::EmployeeId,
    Field::FirstName,
    Field::MiddleName,
    Field::LastName,
    Field::Email,
    Field::Phone,
    Field::Status,
    Field::Subjects,
    Field::Sections,
    Field::AdviserSection,
];

/// What a master-data sheet turned out to be.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SheetKind {
    GradeSchedule,
    GradeSectionRoom,
    Subject,
    Unrecognized,
}

fn normalize_header(h: &str) -> String {
    let mut s = h
        .trim()
        .trim_end_matches(':')
        .trim_end_matches('*')
        .to_ascii_lowercase()
        .replace('_', " ");
    while s.contains("  ") {
        s = s.replace("  ", " ");
    }
    s.trim().to_string()
}

/// Map sheet headers to column indexes for the given field set. First
/// matching column wins; later duplicates are ignored.
pub fn map_headers(headers: &[String], fields: &[Field]) -> HashMap<Field, usize> {
    let normalized = headers.iter().map(|h| normalize_header(h)).collect::<Vec<_>>();
    let mut map = HashMap::new();
    for &field in fields {
        for alias in field.aliases() {
            if let Some(col) = normalized.iter().position(|h| h == alias) {
                map.entry(field).or_insert(col);
                break;
            }
        }
    }
    map
}

/// Decide a master-data sheet's entity type from its header signature.
/// Schedule is tested before grade/section because both carry "grade";
/// first match wins.
pub fn classify(headers: &[String]) -> SheetKind {
    let map = map_headers(headers, MASTER_FIELDS);
    let has = |f: Field| map.contains_key(&f);

    if has(Field::Grade) && has(Field::ClassStart) && has(Field::ClassEnd) {
        SheetKind::GradeSchedule
    } else if has(Field::Grade) && has(Field::Section) {
        SheetKind::GradeSectionRoom
    } else if has(Field::SubjectCode) && has(Field::SubjectName) {
        SheetKind::Subject
    } else {
        SheetKind::Unrecognized
    }
}

/// Cell text for a mapped field, or "" when the column is absent or the
/// row is short.
pub fn cell<'a>(row: &'a [String], map: &HashMap<Field, usize>, field: Field) -> &'a str {
    map.get(&field)
        .and_then(|&col| row.get(col))
        .map(|s| s.as_str())
        .unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn grade_section_room_header_classifies() {
        let h = headers(&["Grade", "Section", "Room"]);
        assert_eq!(classify(&h), SheetKind::GradeSectionRoom);
    }

    #[test]
    fn schedule_wins_over_grade_section_when_both_match() {
        // Shares "grade" and "section" with the roster shape; the start
        // and end columns must take precedence.
        let h = headers(&["Grade", "Section", "Class Start", "Class End", "Grace Period"]);
        assert_eq!(classify(&h), SheetKind::GradeSchedule);
    }

    #[test]
    fn subject_header_classifies() {
        let h = headers(&["Subject Code", "Subject Name"]);
        assert_eq!(classify(&h), SheetKind::Subject);
    }

    #[test]
    fn header_matching_is_case_insensitive_and_tolerates_underscores() {
        let h = headers(&["GRADE_LEVEL", "Section_Name", "ROOM_NUMBER"]);
        assert_eq!(classify(&h), SheetKind::GradeSectionRoom);
        let map = map_headers(&h, MASTER_FIELDS);
        assert_eq!(map.get(&Field::Room), Some(&2));
    }

    #[test]
    fn unrelated_headers_are_unrecognized() {
        let h = headers(&["Name", "Address", "Remarks"]);
        assert_eq!(classify(&h), SheetKind::Unrecognized);
    }

    #[test]
    fn student_field_mapping_finds_lrn_and_names() {
        let h = headers(&["LRN", "First Name", "Middle Name", "Last Name", "Grade", "Section"]);
        let map = map_headers(&h, STUDENT_FIELDS);
        assert_eq!(map.get(&Field::Lrn), Some(&0));
        assert_eq!(map.get(&Field::LastName), Some(&3));
        let row = vec![
            "123456789012".to_string(),
            "Ana".to_string(),
            "".to_string(),
            "Reyes".to_string(),
            "7".to_string(),
            "7-Andres".to_string(),
        ];
        assert_eq!(cell(&row, &map, Field::Section), "7-Andres");
        assert_eq!(cell(&row, &map, Field::Email), "");
    }
}
