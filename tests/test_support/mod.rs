#![allow(dead_code)]

use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

pub fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

pub fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_reportcardd");
    let mut child = Command::new(exe)
        .env_remove("REPORTCARDD_WORKSPACE")
        .env("REPORTCARDD_LOG", "warn")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn reportcardd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

pub fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

pub fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(true),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

pub fn error_code(value: &serde_json::Value) -> Option<&str> {
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
}

pub fn str_field(value: &serde_json::Value, key: &str) -> String {
    value
        .get(key)
        .and_then(|v| v.as_str())
        .unwrap_or_else(|| panic!("missing {} in {}", key, value))
        .to_string()
}

/// A running sidecar with a fresh workspace selected.
pub struct Session {
    pub child: Child,
    pub stdin: ChildStdin,
    pub reader: BufReader<ChildStdout>,
    next_id: u64,
}

impl Session {
    pub fn start(prefix: &str) -> Self {
        let workspace = temp_dir(prefix);
        let (child, stdin, reader) = spawn_sidecar();
        let mut s = Session {
            child,
            stdin,
            reader,
            next_id: 0,
        };
        s.ok(
            "workspace.select",
            json!({ "path": workspace.to_string_lossy() }),
        );
        s
    }

    fn id(&mut self) -> String {
        self.next_id += 1;
        self.next_id.to_string()
    }

    pub fn call(&mut self, method: &str, params: serde_json::Value) -> serde_json::Value {
        let id = self.id();
        request(&mut self.stdin, &mut self.reader, &id, method, params)
    }

    pub fn ok(&mut self, method: &str, params: serde_json::Value) -> serde_json::Value {
        let id = self.id();
        request_ok(&mut self.stdin, &mut self.reader, &id, method, params)
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Ids created by `seed_class`.
pub struct SeededClass {
    pub form_id: String,
    pub class_id: String,
    pub teacher_id: String,
    pub student_ids: Vec<String>,
    pub class_subject_ids: Vec<String>,
}

/// One form, one class, one teacher teaching every subject, and the named
/// students on the roster in order.
pub fn seed_class(s: &mut Session, students: &[&str], subjects: &[&str]) -> SeededClass {
    let form = s.ok("forms.create", json!({ "name": "Form 4", "formNumber": 4 }));
    let form_id = str_field(&form, "formId");
    let class = s.ok(
        "classes.create",
        json!({ "name": "4 Science", "classCode": "4S", "formId": form_id }),
    );
    let class_id = str_field(&class, "classId");
    let teacher = s.ok(
        "teachers.create",
        json!({ "name": "Ms Tan", "email": "tan@school.example" }),
    );
    let teacher_id = str_field(&teacher, "teacherId");

    let student_ids = students
        .iter()
        .map(|name| {
            let r = s.ok(
                "students.create",
                json!({ "classId": class_id, "name": name }),
            );
            str_field(&r, "studentId")
        })
        .collect();
    let class_subject_ids = subjects
        .iter()
        .map(|subject| {
            let r = s.ok(
                "subjects.assign",
                json!({ "classId": class_id, "subjectName": subject, "teacherId": teacher_id }),
            );
            str_field(&r, "classSubjectId")
        })
        .collect();

    SeededClass {
        form_id,
        class_id,
        teacher_id,
        student_ids,
        class_subject_ids,
    }
}

pub fn add_assessment(s: &mut Session, class_subject_id: &str, kind: &str, term: i64) -> String {
    let r = s.ok(
        "assessments.create",
        json!({
            "classSubjectId": class_subject_id,
            "title": format!("{} term {}", kind, term),
            "assessmentType": kind,
            "term": term,
            "totalMarks": 100
        }),
    );
    str_field(&r, "assessmentId")
}

pub fn record_grade(s: &mut Session, assessment_id: &str, student_id: &str, marks: f64) {
    s.ok(
        "grades.record",
        json!({ "assessmentId": assessment_id, "studentId": student_id, "marksObtained": marks }),
    );
}

pub fn cohort(class_id: &str) -> serde_json::Value {
    json!({ "classId": class_id, "academicYear": "2025-2026", "term": 1 })
}
