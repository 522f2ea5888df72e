use std::collections::HashMap;

use rusqlite::Connection;

/// Named-section spellings that translate to the numeric section token
/// used by schools that register sections as "1", "2", ... The table is
/// closed; anything outside it must match a stored section name
/// directly.
pub const SECTION_ALIASES: &[(&str, &str)] = &[
    ("andres", "1"),
    ("bonifacio", "2"),
    ("mabini", "3"),
    ("rizal", "4"),
    ("luna", "5"),
    ("silang", "6"),
    ("del pilar", "7"),
    ("aguinaldo", "8"),
];

/// Translate a named section to its numeric token; purely numeric names
/// pass through unchanged.
pub fn section_token(name: &str) -> Option<String> {
    let key = name.trim().to_ascii_lowercase();
    if !key.is_empty() && key.chars().all(|c| c.is_ascii_digit()) {
        return Some(key);
    }
    SECTION_ALIASES
        .iter()
        .find(|(alias, _)| *alias == key)
        .map(|(_, token)| token.to_string())
}

/// Split a composite "grade-section" string. Accepted spellings:
/// "7-Andres", "7 Andres", "7-1". Returns (grade digits, section part).
pub fn parse_composite(s: &str) -> Option<(String, String)> {
    let t = s.trim();
    let sep = t.find(|c: char| c == '-' || c.is_whitespace())?;
    let grade = t[..sep].trim();
    let rest = t[sep..]
        .trim_start_matches(|c: char| c == '-' || c.is_whitespace())
        .trim();
    if grade.is_empty() || rest.is_empty() || !grade.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }
    Some((grade.to_string(), rest.to_string()))
}

/// A student sheet may carry either a composite "7-Andres" section or a
/// bare name next to a separate grade column; join the latter so both
/// spellings go down the same lookup path.
pub fn composite_or_join(grade: &str, section: &str) -> String {
    if parse_composite(section).is_some() {
        section.to_string()
    } else {
        format!("{}-{}", grade, section.trim())
    }
}

/// Request-scoped lookup maps over the store's natural keys. Built with
/// one SELECT per table so a batch resolves in O(unique keys), and kept
/// current by `record_*` as master rows commit mid-request.
pub struct ResolveCtx {
    grades: HashMap<String, String>,
    rooms: HashMap<String, String>,
    /// (grade_id, lowercased section name) -> section id.
    sections: HashMap<(String, String), String>,
    subjects: HashMap<String, String>,
}

impl ResolveCtx {
    pub fn load(conn: &Connection) -> rusqlite::Result<Self> {
        let mut grades = HashMap::new();
        let mut stmt = conn.prepare("SELECT level, id FROM grades")?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            grades.insert(row.get::<_, String>(0)?, row.get::<_, String>(1)?);
        }

        let mut rooms = HashMap::new();
        let mut stmt = conn.prepare("SELECT number, id FROM rooms")?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            rooms.insert(row.get::<_, String>(0)?, row.get::<_, String>(1)?);
        }

        let mut sections = HashMap::new();
        let mut stmt = conn.prepare("SELECT grade_id, name, id FROM sections")?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let grade_id: String = row.get(0)?;
            let name: String = row.get(1)?;
            sections.insert((grade_id, name.to_ascii_lowercase()), row.get::<_, String>(2)?);
        }

        let mut subjects = HashMap::new();
        let mut stmt = conn.prepare("SELECT code, id FROM subjects")?;
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            subjects.insert(row.get::<_, String>(0)?, row.get::<_, String>(1)?);
        }

        Ok(ResolveCtx {
            grades,
            rooms,
            sections,
            subjects,
        })
    }

    pub fn grade_id(&self, level: &str) -> Option<&str> {
        self.grades.get(level).map(|s| s.as_str())
    }

    pub fn room_id(&self, number: &str) -> Option<&str> {
        self.rooms.get(number).map(|s| s.as_str())
    }

    pub fn subject_id(&self, code: &str) -> Option<&str> {
        self.subjects.get(code).map(|s| s.as_str())
    }

    /// Resolve a composite "grade-section" string. The grade must
    /// resolve first; the section part is then matched directly against
    /// stored names ("<grade> - <name>" display form, case-insensitive)
    /// and, on a miss, through the named-section alias table. A miss is
    /// the caller's warning, never a hard failure.
    pub fn section_id(&self, composite: &str) -> Option<&str> {
        let (grade, rest) = parse_composite(composite)?;
        let grade_id = self.grades.get(&grade)?;

        let direct = (grade_id.clone(), rest.to_ascii_lowercase());
        if let Some(id) = self.sections.get(&direct) {
            return Some(id.as_str());
        }

        let token = section_token(&rest)?;
        self.sections
            .get(&(grade_id.clone(), token))
            .map(|s| s.as_str())
    }

    pub fn record_grade(&mut self, level: &str, id: &str) {
        self.grades.insert(level.to_string(), id.to_string());
    }

    pub fn record_room(&mut self, number: &str, id: &str) {
        self.rooms.insert(number.to_string(), id.to_string());
    }

    pub fn record_section(&mut self, grade_id: &str, name: &str, id: &str) {
        self.sections.insert(
            (grade_id.to_string(), name.to_ascii_lowercase()),
            id.to_string(),
        );
    }

    pub fn record_subject(&mut self, code: &str, id: &str) {
        self.subjects.insert(code.to_string(), id.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> ResolveCtx {
        let mut ctx = ResolveCtx {
            grades: HashMap::new(),
            rooms: HashMap::new(),
            sections: HashMap::new(),
            subjects: HashMap::new(),
        };
        ctx.record_grade("7", "g7");
        ctx.record_room("101", "r101");
        ctx.record_section("g7", "1", "s71");
        ctx.record_section("g7", "Masikap", "s7m");
        ctx.record_subject("MATH7", "subj-math");
        ctx
    }

    #[test]
    fn composite_accepts_three_spellings() {
        assert_eq!(
            parse_composite("7-Andres"),
            Some(("7".to_string(), "Andres".to_string()))
        );
        assert_eq!(
            parse_composite("7 Andres"),
            Some(("7".to_string(), "Andres".to_string()))
        );
        assert_eq!(
            parse_composite("7-1"),
            Some(("7".to_string(), "1".to_string()))
        );
        assert_eq!(
            parse_composite("7 - Andres"),
            Some(("7".to_string(), "Andres".to_string()))
        );
        assert_eq!(parse_composite("Andres"), None);
        assert_eq!(parse_composite(""), None);
    }

    #[test]
    fn equivalent_composite_spellings_resolve_to_the_same_section() {
        let ctx = ctx();
        let a = ctx.section_id("7-Andres").map(|s| s.to_string());
        let b = ctx.section_id("7 Andres").map(|s| s.to_string());
        let c = ctx.section_id("7-1").map(|s| s.to_string());
        assert_eq!(a, Some("s71".to_string()));
        assert_eq!(a, b);
        assert_eq!(a, c);
    }

    #[test]
    fn direct_name_match_wins_before_alias_translation() {
        let ctx = ctx();
        assert_eq!(ctx.section_id("7-Masikap"), Some("s7m"));
        assert_eq!(ctx.section_id("7-MASIKAP"), Some("s7m"));
    }

    #[test]
    fn unknown_grade_or_section_misses() {
        let ctx = ctx();
        assert_eq!(ctx.section_id("9-Andres"), None);
        assert_eq!(ctx.section_id("7-Neptune"), None);
    }

    #[test]
    fn bare_section_names_join_with_the_grade_column() {
        assert_eq!(composite_or_join("7", "Andres"), "7-Andres");
        assert_eq!(composite_or_join("7", "7-Andres"), "7-Andres");
    }

    #[test]
    fn alias_table_translates_named_sections() {
        assert_eq!(section_token("Andres"), Some("1".to_string()));
        assert_eq!(section_token("del pilar"), Some("7".to_string()));
        assert_eq!(section_token("3"), Some("3".to_string()));
        assert_eq!(section_token("Neptune"), None);
    }
}
