mod test_support;

use serde_json::json;
use std::io::{BufRead, Write};
use test_support::{error_code, request, spawn_sidecar, str_field, temp_dir};

#[test]
fn router_dispatch_smoke_covers_handler_families() {
    let workspace = temp_dir("reportcardd-router-smoke");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let health = request(&mut stdin, &mut reader, "1", "health", json!({}));
    assert_eq!(health["result"]["workspacePath"], json!(null));

    let early = request(
        &mut stdin,
        &mut reader,
        "2",
        "reportCards.list",
        json!({ "classId": "c1" }),
    );
    assert_eq!(error_code(&early), Some("no_workspace"));

    let _ = request(
        &mut stdin,
        &mut reader,
        "3",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    assert!(workspace.join("reportcards.sqlite3").is_file());

    let created = request(
        &mut stdin,
        &mut reader,
        "4",
        "classes.create",
        json!({ "name": "Smoke Class" }),
    );
    let class_id = str_field(&created["result"], "classId");

    let methods = [
        ("forms.list", json!({})),
        ("classes.list", json!({})),
        ("students.list", json!({ "classId": class_id })),
        ("subjects.list", json!({ "classId": class_id })),
        (
            "reportCards.generate",
            json!({ "classId": class_id, "academicYear": "2025-2026", "term": 1 }),
        ),
        ("reportCards.list", json!({ "classId": class_id })),
        ("reportCards.open", json!({ "reportCardId": "missing" })),
        ("reportCards.forStudent", json!({ "studentId": "missing" })),
        (
            "reportCards.update",
            json!({ "reportCardId": "missing", "patch": {} }),
        ),
        (
            "reportCards.sendToReview",
            json!({ "classId": class_id, "academicYear": "2025-2026", "term": 1 }),
        ),
        (
            "reportCards.publish",
            json!({ "classId": class_id, "academicYear": "2025-2026", "term": 1 }),
        ),
        (
            "reportCards.updateStatus",
            json!({ "reportCardIds": ["missing"], "status": "REVIEW" }),
        ),
        (
            "reportCards.deleteDrafts",
            json!({ "classId": class_id, "academicYear": "2025-2026", "term": 1 }),
        ),
        (
            "reportCards.updateSubjectComment",
            json!({ "gradeId": "missing", "comment": "x" }),
        ),
        ("reportCards.teacherReview", json!({ "teacherId": "missing" })),
    ];
    for (i, (method, params)) in methods.into_iter().enumerate() {
        let id = format!("m{}", i);
        let resp = request(&mut stdin, &mut reader, &id, method, params);
        assert_ne!(
            error_code(&resp),
            Some("not_implemented"),
            "unexpected unknown method for {}",
            method
        );
    }

    let unknown = request(&mut stdin, &mut reader, "99", "reportCards.print", json!({}));
    assert_eq!(error_code(&unknown), Some("not_implemented"));

    writeln!(stdin, "{{not json").expect("write garbage");
    stdin.flush().expect("flush garbage");
    let mut line = String::new();
    reader.read_line(&mut line).expect("read bad_json reply");
    let bad: serde_json::Value = serde_json::from_str(line.trim()).expect("reply is json");
    assert_eq!(error_code(&bad), Some("bad_json"));

    let after = request(&mut stdin, &mut reader, "100", "health", json!({}));
    assert_eq!(after["ok"], json!(true));

    let _ = child.kill();
    let _ = child.wait();
}

#[test]
fn missing_params_are_rejected_with_bad_params() {
    let workspace = temp_dir("reportcardd-router-params");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let no_term = request(
        &mut stdin,
        &mut reader,
        "2",
        "reportCards.generate",
        json!({ "classId": "c1", "academicYear": "2025-2026" }),
    );
    assert_eq!(error_code(&no_term), Some("bad_params"));

    let zero_term = request(
        &mut stdin,
        &mut reader,
        "3",
        "reportCards.sendToReview",
        json!({ "classId": "c1", "academicYear": "2025-2026", "term": 0 }),
    );
    assert_eq!(error_code(&zero_term), Some("bad_params"));

    let bad_status = request(
        &mut stdin,
        &mut reader,
        "4",
        "reportCards.updateStatus",
        json!({ "reportCardIds": ["x"], "status": "ARCHIVED" }),
    );
    assert_eq!(error_code(&bad_status), Some("bad_params"));

    let no_path = request(&mut stdin, &mut reader, "5", "workspace.select", json!({}));
    assert_eq!(error_code(&no_path), Some("bad_params"));

    let _ = child.kill();
    let _ = child.wait();
}
