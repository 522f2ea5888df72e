use serde_json::{json, Map, Value};

use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};

#[derive(Clone, Copy)]
enum SetupSection {
    Imports,
}

impl SetupSection {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "imports" => Some(Self::Imports),
            _ => None,
        }
    }

    fn key(self) -> &'static str {
        match self {
            Self::Imports => "setup.imports",
        }
    }
}

fn default_section(section: SetupSection) -> Value {
    match section {
        SetupSection::Imports => json!({
            "errorSampleCap": 10,
            "defaultGraceMinutes": 15
        }),
    }
}

fn parse_i64_range(v: &Value, key: &str, min: i64, max: i64) -> Result<i64, String> {
    let n = v
        .as_i64()
        .ok_or_else(|| format!("{} must be integer", key))?;
    if !(min..=max).contains(&n) {
        return Err(format!("{} must be in {}..={}", key, min, max));
    }
    Ok(n)
}

fn merge_section_patch(
    section: SetupSection,
    current: &mut Value,
    patch: &Map<String, Value>,
) -> Result<(), String> {
    let obj = current
        .as_object_mut()
        .ok_or_else(|| "internal setup object must be a JSON object".to_string())?;
    for (k, v) in patch {
        match section {
            SetupSection::Imports => match k.as_str() {
                "errorSampleCap" => {
                    obj.insert(k.clone(), Value::from(parse_i64_range(v, k, 2, 50)?));
                }
                "defaultGraceMinutes" => {
                    obj.insert(k.clone(), Value::from(parse_i64_range(v, k, 0, 120)?));
                }
                _ => return Err(format!("unknown imports field: {}", k)),
            },
        }
    }
    Ok(())
}

fn load_section(conn: &rusqlite::Connection, section: SetupSection) -> anyhow::Result<Value> {
    let mut current = default_section(section);
    if let Some(saved) = db::settings_get_json(conn, section.key())? {
        if let Some(saved_obj) = saved.as_object() {
            // Best-effort apply: malformed historical values should not
            // block the imports UI.
            let _ = merge_section_patch(section, &mut current, saved_obj);
        }
    }
    Ok(current)
}

/// Imports settings resolved against defaults, for the import handlers.
pub struct ImportSettings {
    pub error_sample_cap: usize,
    pub default_grace_minutes: i64,
}

pub fn import_settings(conn: &rusqlite::Connection) -> ImportSettings {
    let section =
        load_section(conn, SetupSection::Imports).unwrap_or_else(|_| default_section(SetupSection::Imports));
    ImportSettings {
        error_sample_cap: section
            .get("errorSampleCap")
            .and_then(|v| v.as_u64())
            .unwrap_or(10) as usize,
        default_grace_minutes: section
            .get("defaultGraceMinutes")
            .and_then(|v| v.as_i64())
            .unwrap_or(15),
    }
}

fn handle_setup_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let imports = match load_section(conn, SetupSection::Imports) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    ok(&req.id, json!({ "imports": imports }))
}

fn handle_setup_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(section_raw) = req.params.get("section").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing section", None);
    };
    let Some(section) = SetupSection::parse(section_raw) else {
        return err(&req.id, "bad_params", "unknown section", None);
    };
    let Some(patch_obj) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "patch must be an object", None);
    };

    let mut current = match load_section(conn, section) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    if let Err(msg) = merge_section_patch(section, &mut current, patch_obj) {
        return err(&req.id, "bad_params", msg, None);
    }
    if let Err(e) = db::settings_set_json(conn, section.key(), &current) {
        return err(&req.id, "db_update_failed", e.to_string(), None);
    }
    ok(&req.id, json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "setup.get" => Some(handle_setup_get(state, req)),
        "setup.update" => Some(handle_setup_update(state, req)),
        _ => None,
    }
}
