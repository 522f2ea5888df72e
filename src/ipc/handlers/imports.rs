use std::path::Path;

use rusqlite::Connection;
use serde_json::{json, Value};

use crate::classify::{self, SheetKind, MASTER_FIELDS, STUDENT_FIELDS, TEACHER_FIELDS};
use crate::commit;
use crate::error::ImportError;
use crate::ipc::error::{err, ok};
use crate::ipc::handlers::setup::{import_settings, ImportSettings};
use crate::ipc::types::{AppState, Request};
use crate::normalize::{self, StudentRecord, TeacherRecord};
use crate::report::Report;
use crate::resolve::{composite_or_join, ResolveCtx};
use crate::sheet::{self, Sheet};
use crate::validate;

struct HandlerErr {
    code: &'static str,
    message: String,
    details: Option<Value>,
}

impl HandlerErr {
    fn response(self, id: &str) -> Value {
        err(id, self.code, self.message, self.details)
    }
}

fn get_required_str(params: &Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| HandlerErr {
            code: "bad_params",
            message: format!("missing {}", key),
            details: None,
        })
}

/// Read and decode an upload. The declared extension comes off the
/// path; the parser enforces the whitelist and the size cap.
fn read_upload(in_path: &str) -> Result<Vec<Sheet>, HandlerErr> {
    let extension = Path::new(in_path)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_string();
    let bytes = std::fs::read(in_path).map_err(|e| HandlerErr {
        code: "parse_failed",
        message: e.to_string(),
        details: Some(json!({ "path": in_path })),
    })?;
    sheet::parse_file(&bytes, &extension).map_err(|e| HandlerErr {
        code: "bad_file",
        message: e.to_string(),
        details: Some(json!({ "path": in_path })),
    })
}

fn store_fatal(id: &str, e: ImportError) -> Value {
    err(id, "db_update_failed", e.to_string(), None)
}

// ---------------------------------------------------------------------------
// Master data: classify each sheet, then commit row by row. Failing rows
// are skipped and reported; valid rows commit independently.

fn handle_import_master(state: &mut AppState, req: &Request) -> Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let in_path = match get_required_str(&req.params, "inPath") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let sheets = match read_upload(&in_path) {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let settings = import_settings(conn);
    let mut ctx = match ResolveCtx::load(conn) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let mut report = Report::new(settings.error_sample_cap);
    for entity in ["grades", "rooms", "sections", "subjects", "schedules"] {
        report.tally_mut(entity);
    }
    let mut recognized = 0usize;
    let mut skipped_sheets = 0usize;

    for sheet in &sheets {
        let kind = classify::classify(&sheet.headers);
        match kind {
            SheetKind::Unrecognized => {
                skipped_sheets += 1;
                tracing::warn!(sheet = %sheet.name, "unrecognized sheet skipped");
                report.warn(format!(
                    "sheet \"{}\" was not recognized and was skipped",
                    sheet.name
                ));
            }
            SheetKind::GradeSectionRoom => {
                recognized += 1;
                import_gsr_sheet(conn, sheet, &mut ctx, &mut report);
            }
            SheetKind::Subject => {
                recognized += 1;
                import_subject_sheet(conn, sheet, &mut ctx, &mut report);
            }
            SheetKind::GradeSchedule => {
                recognized += 1;
                import_schedule_sheet(conn, sheet, &ctx, &mut report, &settings);
            }
        }
    }

    let success = report.errors_total() == 0;
    let message = if success {
        format!("processed {} sheet(s)", recognized)
    } else {
        format!(
            "processed {} sheet(s) with {} row error(s)",
            recognized,
            report.errors_total()
        )
    };
    tracing::info!(
        path = %in_path,
        recognized,
        skipped_sheets,
        errors = report.errors_total(),
        "master data import finished"
    );
    ok(
        &req.id,
        json!({
            "success": success,
            "summary": report.summary_json(),
            "sheets": { "processed": recognized, "skipped": skipped_sheets },
            "warnings": report.warnings_json(),
            "errors": report.errors_json(),
            "message": message,
        }),
    )
}

fn import_gsr_sheet(conn: &Connection, sheet: &Sheet, ctx: &mut ResolveCtx, report: &mut Report) {
    let map = classify::map_headers(&sheet.headers, MASTER_FIELDS);
    for (i, row) in sheet.rows.iter().enumerate() {
        let row_no = Sheet::row_number(i);
        let rec = normalize::normalize_gsr(row, &map, row_no);
        let errors = validate::validate_gsr(&rec);
        if !errors.is_empty() {
            report.tally_mut("sections").invalid += 1;
            for (field, message) in errors {
                report.row_error(&sheet.name, rec.row, Some(field), message);
            }
            continue;
        }
        let (Some(grade), Some(section)) = (rec.grade.as_deref(), rec.section.as_deref()) else {
            continue;
        };

        let outcome: Result<(), ImportError> = (|| {
            // Known keys resolve from the request-scoped maps; only a
            // miss reaches the store.
            let grade_id = match ctx.grade_id(grade) {
                Some(id) => id.to_string(),
                None => {
                    let g = commit::upsert_grade(conn, grade)?;
                    if g.inserted {
                        report.tally_mut("grades").inserted += 1;
                    }
                    ctx.record_grade(grade, &g.id);
                    g.id
                }
            };

            let room_id = match ctx.room_id(&rec.room) {
                Some(id) => id.to_string(),
                None => {
                    let r = commit::upsert_room(conn, &rec.room)?;
                    if r.inserted {
                        report.tally_mut("rooms").inserted += 1;
                    }
                    ctx.record_room(&rec.room, &r.id);
                    r.id
                }
            };

            let s = commit::upsert_section(conn, &grade_id, section, &room_id)?;
            let tally = report.tally_mut("sections");
            if s.inserted {
                tally.inserted += 1;
            } else {
                tally.skipped += 1;
            }
            ctx.record_section(&grade_id, section, &s.id);
            Ok(())
        })();

        if let Err(e) = outcome {
            tracing::error!(row = rec.row, error = %e, "grade/section/room row failed");
            report.tally_mut("sections").skipped += 1;
            report.row_error(&sheet.name, rec.row, None, e.to_string());
        }
    }
}

fn import_subject_sheet(
    conn: &Connection,
    sheet: &Sheet,
    ctx: &mut ResolveCtx,
    report: &mut Report,
) {
    let map = classify::map_headers(&sheet.headers, MASTER_FIELDS);
    for (i, row) in sheet.rows.iter().enumerate() {
        let row_no = Sheet::row_number(i);
        let rec = normalize::normalize_subject(row, &map, row_no);
        let errors = validate::validate_subject(&rec);
        if !errors.is_empty() {
            report.tally_mut("subjects").invalid += 1;
            for (field, message) in errors {
                report.row_error(&sheet.name, rec.row, Some(field), message);
            }
            continue;
        }
        let (Some(code), Some(name)) = (rec.code.as_deref(), rec.name.as_deref()) else {
            continue;
        };
        match commit::upsert_subject(conn, code, name) {
            Ok(upserted) => {
                let tally = report.tally_mut("subjects");
                if upserted.inserted {
                    tally.inserted += 1;
                } else {
                    tally.skipped += 1;
                }
                ctx.record_subject(code, &upserted.id);
            }
            Err(e) => {
                tracing::error!(row = rec.row, error = %e, "subject row failed");
                report.tally_mut("subjects").skipped += 1;
                report.row_error(&sheet.name, rec.row, None, e.to_string());
            }
        }
    }
}

fn import_schedule_sheet(
    conn: &Connection,
    sheet: &Sheet,
    ctx: &ResolveCtx,
    report: &mut Report,
    settings: &ImportSettings,
) {
    let map = classify::map_headers(&sheet.headers, MASTER_FIELDS);
    for (i, row) in sheet.rows.iter().enumerate() {
        let row_no = Sheet::row_number(i);
        let rec = normalize::normalize_schedule(row, &map, row_no, settings.default_grace_minutes);
        let errors = validate::validate_schedule(&rec);
        if !errors.is_empty() {
            report.tally_mut("schedules").invalid += 1;
            for (field, message) in errors {
                report.row_error(&sheet.name, rec.row, Some(field), message);
            }
            continue;
        }
        let (Some(grade), Some(start), Some(end)) = (
            rec.grade.as_deref(),
            rec.class_start.as_deref(),
            rec.class_end.as_deref(),
        ) else {
            continue;
        };
        let Some(grade_id) = ctx.grade_id(grade) else {
            // Referential gap, not a row error: the grade sheet simply
            // has not been imported yet.
            tracing::warn!(row = rec.row, grade, "schedule skipped, grade not found");
            report.tally_mut("schedules").skipped += 1;
            report.warn_once("import grades before schedules: some rows referenced grade levels that do not exist yet");
            continue;
        };
        let grace: i64 = rec.grace.parse().unwrap_or(settings.default_grace_minutes);
        match commit::upsert_schedule(conn, grade_id, start, end, grace) {
            Ok(true) => report.tally_mut("schedules").inserted += 1,
            Ok(false) => report.tally_mut("schedules").updated += 1,
            Err(e) => {
                tracing::error!(row = rec.row, error = %e, "schedule row failed");
                report.tally_mut("schedules").skipped += 1;
                report.row_error(&sheet.name, rec.row, None, e.to_string());
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Students: all-or-nothing. Any invalid row voids the batch; resolution
// misses drop single rows with a warning; existing lrns are skipped and
// never updated.

fn handle_import_students(state: &mut AppState, req: &Request) -> Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let in_path = match get_required_str(&req.params, "inPath") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let sheets = match read_upload(&in_path) {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let settings = import_settings(conn);
    // Single-entity route: the roster lives on the first sheet.
    let Some(sheet) = sheets.first() else {
        return err(&req.id, "bad_file", "file contains no sheets", None);
    };
    let map = classify::map_headers(&sheet.headers, STUDENT_FIELDS);

    let records = sheet
        .rows
        .iter()
        .enumerate()
        .map(|(i, row)| normalize::normalize_student(row, &map, Sheet::row_number(i)))
        .collect::<Vec<_>>();
    let total = records.len();
    let results = validate::validate_students(&records);
    let invalid_count = results.iter().filter(|e| !e.is_empty()).count();

    let mut report = Report::new(settings.error_sample_cap);
    report.tally_mut("students");
    if invalid_count > 0 {
        report.tally_mut("students").invalid = invalid_count;
        for (rec, errors) in records.iter().zip(&results) {
            for (field, message) in errors {
                report.row_error(&sheet.name, rec.row, Some(*field), message.as_str());
            }
        }
        tracing::warn!(path = %in_path, invalid_count, total, "student batch rejected");
        return ok(
            &req.id,
            json!({
                "success": false,
                "summary": {
                    "students": report.summary_json()["students"],
                    "totalRecords": total,
                    "invalidCount": invalid_count,
                    "existingRecordsSkipped": 0,
                },
                "warnings": report.warnings_json(),
                "errors": report.errors_json(),
                "message": "no records were imported: fix the reported rows and re-upload",
            }),
        );
    }

    let ctx = match ResolveCtx::load(conn) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    // Resolve every row before touching the store.
    let mut pending: Vec<(&StudentRecord, String, String, String)> = Vec::new();
    for rec in &records {
        let (Some(lrn), Some(grade), Some(section)) = (
            rec.lrn.as_deref(),
            rec.grade.as_deref(),
            rec.section.as_deref(),
        ) else {
            continue;
        };
        let Some(grade_id) = ctx.grade_id(grade) else {
            report.tally_mut("students").skipped += 1;
            report.warn(format!(
                "row {}: grade {} does not exist; row skipped",
                rec.row, grade
            ));
            report.warn_once("import grades and sections before students");
            continue;
        };
        let composite = composite_or_join(grade, section);
        let Some(section_id) = ctx.section_id(&composite) else {
            report.tally_mut("students").skipped += 1;
            report.warn(format!(
                "row {}: section \"{}\" could not be resolved; row skipped",
                rec.row, composite
            ));
            continue;
        };
        pending.push((
            rec,
            lrn.to_string(),
            grade_id.to_string(),
            section_id.to_string(),
        ));
    }

    let lrns = pending.iter().map(|(_, lrn, _, _)| lrn.clone()).collect::<Vec<_>>();
    let existing = match commit::existing_keys(conn, "students", "lrn", &lrns) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let mut existing_skipped = 0usize;
    for (rec, lrn, grade_id, section_id) in &pending {
        if existing.contains(lrn.as_str()) {
            existing_skipped += 1;
            report.tally_mut("students").skipped += 1;
            continue;
        }
        if let Err(e) = commit::insert_student(conn, rec, lrn, grade_id, section_id) {
            // Validation already passed; a store failure here fails the
            // request rather than silently dropping part of the batch.
            tracing::error!(row = rec.row, error = %e, "student insert failed");
            return store_fatal(&req.id, e);
        }
        report.tally_mut("students").inserted += 1;
    }

    let inserted = report.tally("students").inserted;
    tracing::info!(path = %in_path, inserted, existing_skipped, total, "student import finished");
    ok(
        &req.id,
        json!({
            "success": true,
            "summary": {
                "students": report.summary_json()["students"],
                "totalRecords": total,
                "invalidCount": 0,
                "existingRecordsSkipped": existing_skipped,
            },
            "warnings": report.warnings_json(),
            "errors": report.errors_json(),
            "message": format!("{} student(s) imported, {} already existed", inserted, existing_skipped),
        }),
    )
}

// ---------------------------------------------------------------------------
// Teachers: all-or-nothing at validation; assignment resolution failures
// after that surface as warnings while the teacher row still commits.

fn handle_import_teachers(state: &mut AppState, req: &Request) -> Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let in_path = match get_required_str(&req.params, "inPath") {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let sheets = match read_upload(&in_path) {
        Ok(v) => v,
        Err(e) => return e.response(&req.id),
    };
    let settings = import_settings(conn);
    let Some(sheet) = sheets.first() else {
        return err(&req.id, "bad_file", "file contains no sheets", None);
    };
    let map = classify::map_headers(&sheet.headers, TEACHER_FIELDS);

    let records = sheet
        .rows
        .iter()
        .enumerate()
        .map(|(i, row)| normalize::normalize_teacher(row, &map, Sheet::row_number(i)))
        .collect::<Vec<_>>();
    let total = records.len();
    let results = validate::validate_teachers(&records);
    let invalid_count = results.iter().filter(|e| !e.is_empty()).count();

    let mut report = Report::new(settings.error_sample_cap);
    report.tally_mut("teachers");
    if invalid_count > 0 {
        report.tally_mut("teachers").invalid = invalid_count;
        for (rec, errors) in records.iter().zip(&results) {
            for (field, message) in errors {
                report.row_error(&sheet.name, rec.row, Some(*field), message.as_str());
            }
        }
        tracing::warn!(path = %in_path, invalid_count, total, "teacher batch rejected");
        return ok(
            &req.id,
            json!({
                "success": false,
                "summary": {
                    "teachers": report.summary_json()["teachers"],
                    "totalRecords": total,
                    "invalidCount": invalid_count,
                    "existingRecordsSkipped": 0,
                },
                "warnings": report.warnings_json(),
                "errors": report.errors_json(),
                "message": "no records were imported: fix the reported rows and re-upload",
            }),
        );
    }

    let ctx = match ResolveCtx::load(conn) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let employee_ids = records
        .iter()
        .filter_map(|r| r.employee_id.clone())
        .collect::<Vec<_>>();
    let existing = match commit::existing_keys(conn, "teachers", "employee_id", &employee_ids) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let mut existing_skipped = 0usize;
    let mut assignments = commit::AssignmentCounts::default();
    for rec in &records {
        let Some(employee_id) = rec.employee_id.as_deref() else {
            continue;
        };
        if existing.contains(employee_id) {
            existing_skipped += 1;
            report.tally_mut("teachers").skipped += 1;
            continue;
        }

        let teacher_id = match commit::insert_teacher(conn, rec, employee_id) {
            Ok(id) => id,
            Err(e) => {
                tracing::error!(row = rec.row, error = %e, "teacher insert failed");
                return store_fatal(&req.id, e);
            }
        };
        report.tally_mut("teachers").inserted += 1;

        // Assignment resolution happens after the teacher row is
        // committed; misses degrade to warnings, never a rollback.
        let (subject_ids, section_ids, adviser_id) =
            resolve_assignments(rec, &ctx, &mut report);
        match commit::link_assignments(
            conn,
            &teacher_id,
            &subject_ids,
            &section_ids,
            adviser_id.as_deref(),
        ) {
            Ok(counts) => {
                assignments.subjects += counts.subjects;
                assignments.sections += counts.sections;
                assignments.subject_sections += counts.subject_sections;
            }
            Err(e) => {
                tracing::error!(row = rec.row, error = %e, "assignment link failed");
                return store_fatal(&req.id, e);
            }
        }
    }

    let inserted = report.tally("teachers").inserted;
    tracing::info!(path = %in_path, inserted, existing_skipped, total, "teacher import finished");
    ok(
        &req.id,
        json!({
            "success": true,
            "summary": {
                "teachers": report.summary_json()["teachers"],
                "totalRecords": total,
                "invalidCount": 0,
                "existingRecordsSkipped": existing_skipped,
                "assignments": {
                    "subjects": assignments.subjects,
                    "sections": assignments.sections,
                    "subjectSections": assignments.subject_sections,
                },
            },
            "warnings": report.warnings_json(),
            "errors": report.errors_json(),
            "message": format!("{} teacher(s) imported, {} already existed", inserted, existing_skipped),
        }),
    )
}

fn resolve_assignments(
    rec: &TeacherRecord,
    ctx: &ResolveCtx,
    report: &mut Report,
) -> (Vec<String>, Vec<String>, Option<String>) {
    let mut subject_ids = Vec::new();
    for code in &rec.subjects {
        match ctx.subject_id(code) {
            Some(id) => subject_ids.push(id.to_string()),
            None => report.warn(format!(
                "row {}: unknown subject code \"{}\"; assignment skipped",
                rec.row, code
            )),
        }
    }

    let mut section_ids = Vec::new();
    for composite in &rec.sections {
        match ctx.section_id(composite) {
            Some(id) => section_ids.push(id.to_string()),
            None => report.warn(format!(
                "row {}: section \"{}\" could not be resolved; assignment skipped",
                rec.row, composite
            )),
        }
    }

    let adviser_id = rec.adviser_section.as_deref().and_then(|composite| {
        let resolved = ctx.section_id(composite);
        if resolved.is_none() {
            report.warn(format!(
                "row {}: adviser section \"{}\" could not be resolved",
                rec.row, composite
            ));
        }
        resolved.map(|id| id.to_string())
    });

    (subject_ids, section_ids, adviser_id)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<Value> {
    match req.method.as_str() {
        "imports.masterData" => Some(handle_import_master(state, req)),
        "imports.students" => Some(handle_import_students(state, req)),
        "imports.teachers" => Some(handle_import_teachers(state, req)),
        _ => None,
    }
}
