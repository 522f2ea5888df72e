mod test_support;

use serde_json::json;
use test_support::{request, request_ok, spawn_sidecar, temp_dir};

#[test]
fn imports_section_roundtrip_and_validation() {
    let workspace = temp_dir("rosterd-setup-imports");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let defaults = request_ok(&mut stdin, &mut reader, "2", "setup.get", json!({}));
    assert_eq!(defaults["imports"]["errorSampleCap"], 10);
    assert_eq!(defaults["imports"]["defaultGraceMinutes"], 15);

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "setup.update",
        json!({ "section": "imports", "patch": { "errorSampleCap": 3 } }),
    );
    let updated = request_ok(&mut stdin, &mut reader, "4", "setup.get", json!({}));
    assert_eq!(updated["imports"]["errorSampleCap"], 3);
    assert_eq!(updated["imports"]["defaultGraceMinutes"], 15);

    // Out-of-range values are rejected.
    let invalid = request(
        &mut stdin,
        &mut reader,
        "5",
        "setup.update",
        json!({ "section": "imports", "patch": { "errorSampleCap": 1 } }),
    );
    assert_eq!(
        invalid.pointer("/error/code").and_then(|v| v.as_str()),
        Some("bad_params")
    );
    let unknown = request(
        &mut stdin,
        &mut reader,
        "6",
        "setup.update",
        json!({ "section": "imports", "patch": { "colorScheme": "dark" } }),
    );
    assert_eq!(
        unknown.pointer("/error/code").and_then(|v| v.as_str()),
        Some("bad_params")
    );
}

#[test]
fn error_sample_cap_limits_samples_but_not_the_count() {
    let workspace = temp_dir("rosterd-setup-cap");
    let csv_path = workspace.join("gsr.csv");
    // Five malformed grades, one valid row.
    std::fs::write(
        &csv_path,
        "Grade,Section,Room\nA,1,101\nB,2,101\nC,3,101\nD,4,101\nE,5,101\n7,1,101\n",
    )
    .expect("write csv");
    let (_child, mut stdin, mut reader) = spawn_sidecar();

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "setup.update",
        json!({ "section": "imports", "patch": { "errorSampleCap": 2 } }),
    );
    let result = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "imports.masterData",
        json!({ "inPath": csv_path.to_string_lossy() }),
    );
    assert_eq!(result["errors"]["count"], 5);
    assert_eq!(result["errors"]["samples"].as_array().unwrap().len(), 2);
    assert_eq!(result["summary"]["sections"]["inserted"], 1);
}
