//! Data-entry methods for the inputs report-card generation reads: forms,
//! classes, people and rosters, subject assignments, assessments, grades,
//! lessons and attendance.

use crate::calc::AttendanceStatus;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, optional_str, required_f64, required_i64, required_str};
use crate::ipc::types::{AppState, Request};
use crate::store;
use rusqlite::{Connection, OptionalExtension};
use serde_json::json;
use uuid::Uuid;

fn exists(conn: &Connection, sql: &str, id: &str) -> Result<bool, rusqlite::Error> {
    conn.query_row(sql, [id], |r| r.get::<_, i64>(0))
        .optional()
        .map(|v| v.is_some())
}

fn require_row(
    conn: &Connection,
    req: &Request,
    sql: &str,
    id: &str,
    what: &str,
) -> Result<(), serde_json::Value> {
    match exists(conn, sql, id) {
        Ok(true) => Ok(()),
        Ok(false) => Err(err(&req.id, "not_found", format!("{} not found", what), None)),
        Err(e) => Err(err(&req.id, "db_query_failed", e.to_string(), None)),
    }
}

fn handle_forms_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let name = match required_str(req, "name") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let form_number = match required_i64(req, "formNumber") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let form_id = Uuid::new_v4().to_string();
    if let Err(e) = conn.execute(
        "INSERT INTO forms(id, name, form_number, is_active) VALUES(?, ?, ?, 1)",
        (&form_id, &name, form_number),
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "forms" })),
        );
    }
    ok(
        &req.id,
        json!({ "formId": form_id, "name": name, "formNumber": form_number }),
    )
}

fn handle_forms_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "forms": [] }));
    };
    let mut stmt = match conn.prepare(
        "SELECT id, name, form_number
         FROM forms
         WHERE is_active = 1
         ORDER BY form_number, name",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let rows = stmt
        .query_map([], |r| {
            Ok(json!({
                "id": r.get::<_, String>(0)?,
                "name": r.get::<_, String>(1)?,
                "formNumber": r.get::<_, i64>(2)?,
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());
    match rows {
        Ok(forms) => ok(&req.id, json!({ "forms": forms })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_classes_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let name = match required_str(req, "name") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let class_code = match optional_str(req, "classCode") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let form_id = match optional_str(req, "formId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    if let Some(fid) = form_id.as_deref() {
        if let Err(e) = require_row(conn, req, "SELECT 1 FROM forms WHERE id = ?", fid, "form") {
            return e;
        }
    }

    let class_id = Uuid::new_v4().to_string();
    if let Err(e) = conn.execute(
        "INSERT INTO classes(id, name, class_code, form_id, is_active) VALUES(?, ?, ?, ?, 1)",
        (&class_id, &name, &class_code, &form_id),
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "classes" })),
        );
    }
    ok(
        &req.id,
        json!({ "classId": class_id, "name": name, "formId": form_id }),
    )
}

fn handle_classes_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "classes": [] }));
    };
    let form_id = match optional_str(req, "formId") {
        Ok(v) => v,
        Err(e) => return e,
    };

    // Correlated subqueries keep the counts from multiplying across joins.
    let mut stmt = match conn.prepare(
        "SELECT
           c.id,
           c.name,
           c.class_code,
           c.form_id,
           (SELECT COUNT(*) FROM student_class_assignments a
              WHERE a.class_id = c.id AND a.is_active = 1) AS student_count,
           (SELECT COUNT(*) FROM class_subjects cs WHERE cs.class_id = c.id) AS subject_count
         FROM classes c
         WHERE c.is_active = 1 AND (?1 IS NULL OR c.form_id = ?1)
         ORDER BY c.name",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let rows = stmt
        .query_map([&form_id], |r| {
            Ok(json!({
                "id": r.get::<_, String>(0)?,
                "name": r.get::<_, String>(1)?,
                "classCode": r.get::<_, Option<String>>(2)?,
                "formId": r.get::<_, Option<String>>(3)?,
                "studentCount": r.get::<_, i64>(4)?,
                "subjectCount": r.get::<_, i64>(5)?,
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());
    match rows {
        Ok(classes) => ok(&req.id, json!({ "classes": classes })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_teachers_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let name = match required_str(req, "name") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let email = match optional_str(req, "email") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let teacher_id = Uuid::new_v4().to_string();
    if let Err(e) = conn.execute(
        "INSERT INTO users(id, name, email, role) VALUES(?, ?, ?, 'teacher')",
        (&teacher_id, &name, &email),
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "users" })),
        );
    }
    ok(&req.id, json!({ "teacherId": teacher_id, "name": name }))
}

fn handle_students_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let class_id = match required_str(req, "classId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let name = match required_str(req, "name") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let email = match optional_str(req, "email") {
        Ok(v) => v,
        Err(e) => return e,
    };
    if let Err(e) = require_row(conn, req, "SELECT 1 FROM classes WHERE id = ?", &class_id, "class") {
        return e;
    }

    let tx = match conn.unchecked_transaction() {
        Ok(t) => t,
        Err(e) => return err(&req.id, "db_tx_failed", e.to_string(), None),
    };
    let sort_order: i64 = match tx.query_row(
        "SELECT COALESCE(MAX(sort_order), -1) + 1 FROM student_class_assignments WHERE class_id = ?",
        [&class_id],
        |r| r.get(0),
    ) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    let student_id = Uuid::new_v4().to_string();
    if let Err(e) = tx.execute(
        "INSERT INTO users(id, name, email, role) VALUES(?, ?, ?, 'student')",
        (&student_id, &name, &email),
    ) {
        let _ = tx.rollback();
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "users" })),
        );
    }
    if let Err(e) = tx.execute(
        "INSERT INTO student_class_assignments(id, class_id, student_id, is_active, sort_order)
         VALUES(?, ?, ?, 1, ?)",
        (Uuid::new_v4().to_string(), &class_id, &student_id, sort_order),
    ) {
        let _ = tx.rollback();
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "student_class_assignments" })),
        );
    }
    if let Err(e) = tx.commit() {
        return err(&req.id, "db_commit_failed", e.to_string(), None);
    }

    ok(
        &req.id,
        json!({ "studentId": student_id, "classId": class_id, "sortOrder": sort_order }),
    )
}

fn handle_students_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let class_id = match required_str(req, "classId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let mut stmt = match conn.prepare(
        "SELECT u.id, u.name, u.email, a.is_active, a.sort_order
         FROM student_class_assignments a
         JOIN users u ON u.id = a.student_id
         WHERE a.class_id = ?
         ORDER BY a.sort_order",
    ) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let rows = stmt
        .query_map([&class_id], |r| {
            Ok(json!({
                "id": r.get::<_, String>(0)?,
                "name": r.get::<_, String>(1)?,
                "email": r.get::<_, Option<String>>(2)?,
                "active": r.get::<_, i64>(3)? != 0,
                "sortOrder": r.get::<_, i64>(4)?,
            }))
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());
    match rows {
        Ok(students) => ok(&req.id, json!({ "students": students })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_students_set_active(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let class_id = match required_str(req, "classId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(active) = req.params.get("active").and_then(|v| v.as_bool()) else {
        return err(&req.id, "bad_params", "missing active", None);
    };

    match conn.execute(
        "UPDATE student_class_assignments SET is_active = ? WHERE class_id = ? AND student_id = ?",
        (active as i64, &class_id, &student_id),
    ) {
        Ok(0) => err(&req.id, "not_found", "student is not on this class roster", None),
        Ok(_) => ok(&req.id, json!({ "studentId": student_id, "active": active })),
        Err(e) => err(&req.id, "db_update_failed", e.to_string(), None),
    }
}

fn handle_subjects_assign(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let class_id = match required_str(req, "classId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let subject_name = match required_str(req, "subjectName") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let teacher_id = match optional_str(req, "teacherId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    if let Err(e) = require_row(conn, req, "SELECT 1 FROM classes WHERE id = ?", &class_id, "class") {
        return e;
    }
    if let Some(tid) = teacher_id.as_deref() {
        if let Err(e) = require_row(
            conn,
            req,
            "SELECT 1 FROM users WHERE id = ? AND role = 'teacher'",
            tid,
            "teacher",
        ) {
            return e;
        }
    }

    let tx = match conn.unchecked_transaction() {
        Ok(t) => t,
        Err(e) => return err(&req.id, "db_tx_failed", e.to_string(), None),
    };
    if let Err(e) = tx.execute(
        "INSERT OR IGNORE INTO subjects(id, name) VALUES(?, ?)",
        (Uuid::new_v4().to_string(), &subject_name),
    ) {
        let _ = tx.rollback();
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "subjects" })),
        );
    }
    let subject_id: String = match tx.query_row(
        "SELECT id FROM subjects WHERE name = ?",
        [&subject_name],
        |r| r.get(0),
    ) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    // Re-assigning an existing subject only changes its teacher.
    let existing: Option<String> = match tx
        .query_row(
            "SELECT id FROM class_subjects WHERE class_id = ? AND subject_id = ?",
            (&class_id, &subject_id),
            |r| r.get(0),
        )
        .optional()
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let class_subject_id = match existing {
        Some(cs_id) => {
            if let Err(e) = tx.execute(
                "UPDATE class_subjects SET teacher_id = ? WHERE id = ?",
                (&teacher_id, &cs_id),
            ) {
                let _ = tx.rollback();
                return err(&req.id, "db_update_failed", e.to_string(), None);
            }
            cs_id
        }
        None => {
            let cs_id = Uuid::new_v4().to_string();
            if let Err(e) = tx.execute(
                "INSERT INTO class_subjects(id, class_id, subject_id, teacher_id, sort_order)
                 VALUES(?, ?, ?, ?,
                   (SELECT COALESCE(MAX(sort_order), -1) + 1 FROM class_subjects WHERE class_id = ?))",
                (&cs_id, &class_id, &subject_id, &teacher_id, &class_id),
            ) {
                let _ = tx.rollback();
                return err(
                    &req.id,
                    "db_insert_failed",
                    e.to_string(),
                    Some(json!({ "table": "class_subjects" })),
                );
            }
            cs_id
        }
    };
    if let Err(e) = tx.commit() {
        return err(&req.id, "db_commit_failed", e.to_string(), None);
    }

    ok(
        &req.id,
        json!({
            "classSubjectId": class_subject_id,
            "subjectId": subject_id,
            "subjectName": subject_name,
            "teacherId": teacher_id,
        }),
    )
}

fn handle_subjects_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let class_id = match required_str(req, "classId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match store::fetch_class_subjects(conn, &class_id) {
        Ok(subjects) => ok(&req.id, json!({ "subjects": subjects })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_assessments_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let class_subject_id = match required_str(req, "classSubjectId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let title = match required_str(req, "title") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let assessment_type = match required_str(req, "assessmentType") {
        Ok(v) => v.to_ascii_uppercase(),
        Err(e) => return e,
    };
    let term = match required_i64(req, "term") {
        Ok(v) if v >= 1 => v,
        Ok(_) => return err(&req.id, "bad_params", "term must be >= 1", None),
        Err(e) => return e,
    };
    let total_marks = match required_f64(req, "totalMarks") {
        Ok(v) if v > 0.0 => v,
        Ok(_) => return err(&req.id, "bad_params", "totalMarks must be > 0", None),
        Err(e) => return e,
    };
    if let Err(e) = require_row(
        conn,
        req,
        "SELECT 1 FROM class_subjects WHERE id = ?",
        &class_subject_id,
        "class subject",
    ) {
        return e;
    }

    let assessment_id = Uuid::new_v4().to_string();
    if let Err(e) = conn.execute(
        "INSERT INTO subject_assessments(id, class_subject_id, title, assessment_type, term, total_marks)
         VALUES(?, ?, ?, ?, ?, ?)",
        (
            &assessment_id,
            &class_subject_id,
            &title,
            &assessment_type,
            term,
            total_marks,
        ),
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "subject_assessments" })),
        );
    }
    ok(
        &req.id,
        json!({
            "assessmentId": assessment_id,
            "assessmentType": assessment_type,
            "term": term,
            "totalMarks": total_marks,
        }),
    )
}

fn handle_grades_record(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let assessment_id = match required_str(req, "assessmentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let marks = match required_f64(req, "marksObtained") {
        Ok(v) if v >= 0.0 => v,
        Ok(_) => return err(&req.id, "bad_params", "marksObtained must be >= 0", None),
        Err(e) => return e,
    };

    let total: Option<f64> = match conn
        .query_row(
            "SELECT total_marks FROM subject_assessments WHERE id = ?",
            [&assessment_id],
            |r| r.get(0),
        )
        .optional()
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let Some(total) = total else {
        return err(&req.id, "not_found", "assessment not found", None);
    };
    if marks > total {
        return err(
            &req.id,
            "bad_params",
            "marksObtained exceeds totalMarks",
            Some(json!({ "totalMarks": total })),
        );
    }
    if let Err(e) = require_row(
        conn,
        req,
        "SELECT 1 FROM users WHERE id = ? AND role = 'student'",
        &student_id,
        "student",
    ) {
        return e;
    }

    let percentage = marks * 100.0 / total;
    if let Err(e) = conn.execute(
        "INSERT INTO student_grades(id, assessment_id, student_id, marks_obtained, percentage, updated_at)
         VALUES(?, ?, ?, ?, ?, ?)
         ON CONFLICT(assessment_id, student_id) DO UPDATE SET
           marks_obtained = excluded.marks_obtained,
           percentage = excluded.percentage,
           updated_at = excluded.updated_at",
        (
            Uuid::new_v4().to_string(),
            &assessment_id,
            &student_id,
            marks,
            percentage,
            store::now_ts(),
        ),
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "student_grades" })),
        );
    }
    ok(
        &req.id,
        json!({
            "assessmentId": assessment_id,
            "studentId": student_id,
            "marksObtained": marks,
            "percentage": percentage,
        }),
    )
}

fn handle_lessons_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let class_subject_id = match required_str(req, "classSubjectId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let title = match optional_str(req, "title") {
        Ok(v) => v.unwrap_or_else(|| "Lesson".to_string()),
        Err(e) => return e,
    };
    let lesson_date = match optional_str(req, "lessonDate") {
        Ok(v) => v,
        Err(e) => return e,
    };
    if let Some(d) = lesson_date.as_deref() {
        if chrono::NaiveDate::parse_from_str(d, "%Y-%m-%d").is_err() {
            return err(&req.id, "bad_params", "lessonDate must be YYYY-MM-DD", None);
        }
    }
    if let Err(e) = require_row(
        conn,
        req,
        "SELECT 1 FROM class_subjects WHERE id = ?",
        &class_subject_id,
        "class subject",
    ) {
        return e;
    }

    let lesson_id = Uuid::new_v4().to_string();
    if let Err(e) = conn.execute(
        "INSERT INTO lessons(id, class_subject_id, title, lesson_date) VALUES(?, ?, ?, ?)",
        (&lesson_id, &class_subject_id, &title, &lesson_date),
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "lessons" })),
        );
    }
    ok(&req.id, json!({ "lessonId": lesson_id }))
}

fn handle_attendance_mark(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let lesson_id = match required_str(req, "lessonId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let status = match required_str(req, "status") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(status) = AttendanceStatus::parse(&status) else {
        return err(
            &req.id,
            "bad_params",
            "status must be one of PRESENT, ABSENT, LATE, EXCUSED, SICK",
            None,
        );
    };
    if let Err(e) = require_row(conn, req, "SELECT 1 FROM lessons WHERE id = ?", &lesson_id, "lesson") {
        return e;
    }

    if let Err(e) = conn.execute(
        "INSERT INTO lesson_attendance(id, lesson_id, student_id, status)
         VALUES(?, ?, ?, ?)
         ON CONFLICT(lesson_id, student_id) DO UPDATE SET status = excluded.status",
        (
            Uuid::new_v4().to_string(),
            &lesson_id,
            &student_id,
            status.as_str(),
        ),
    ) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "lesson_attendance" })),
        );
    }
    ok(
        &req.id,
        json!({ "lessonId": lesson_id, "studentId": student_id, "status": status.as_str() }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "forms.create" => Some(handle_forms_create(state, req)),
        "forms.list" => Some(handle_forms_list(state, req)),
        "classes.create" => Some(handle_classes_create(state, req)),
        "classes.list" => Some(handle_classes_list(state, req)),
        "teachers.create" => Some(handle_teachers_create(state, req)),
        "students.create" => Some(handle_students_create(state, req)),
        "students.list" => Some(handle_students_list(state, req)),
        "students.setActive" => Some(handle_students_set_active(state, req)),
        "subjects.assign" => Some(handle_subjects_assign(state, req)),
        "subjects.list" => Some(handle_subjects_list(state, req)),
        "assessments.create" => Some(handle_assessments_create(state, req)),
        "grades.record" => Some(handle_grades_record(state, req)),
        "lessons.create" => Some(handle_lessons_create(state, req)),
        "attendance.mark" => Some(handle_attendance_mark(state, req)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_schema;
    use serde_json::Value;

    fn state() -> AppState {
        let conn = Connection::open_in_memory().expect("open memory db");
        init_schema(&conn).expect("schema");
        AppState {
            workspace: None,
            db: Some(conn),
        }
    }

    fn call(state: &mut AppState, method: &str, params: Value) -> Value {
        let req = Request {
            id: "t".to_string(),
            method: method.to_string(),
            params,
        };
        try_handle(state, &req).expect("handled")
    }

    fn result(resp: Value) -> Value {
        assert_eq!(resp["ok"], json!(true), "unexpected failure: {}", resp);
        resp["result"].clone()
    }

    #[test]
    fn grade_percentage_is_marks_over_total() {
        let mut st = state();
        let class_id = result(call(&mut st, "classes.create", json!({ "name": "4A" })))["classId"]
            .as_str()
            .expect("classId")
            .to_string();
        let student_id = result(call(
            &mut st,
            "students.create",
            json!({ "classId": class_id, "name": "Ada" }),
        ))["studentId"]
            .as_str()
            .expect("studentId")
            .to_string();
        let cs_id = result(call(
            &mut st,
            "subjects.assign",
            json!({ "classId": class_id, "subjectName": "Maths" }),
        ))["classSubjectId"]
            .as_str()
            .expect("classSubjectId")
            .to_string();
        let assessment_id = result(call(
            &mut st,
            "assessments.create",
            json!({ "classSubjectId": cs_id, "title": "Quiz", "assessmentType": "quiz", "term": 1, "totalMarks": 40 }),
        ))["assessmentId"]
            .as_str()
            .expect("assessmentId")
            .to_string();

        let graded = result(call(
            &mut st,
            "grades.record",
            json!({ "assessmentId": assessment_id, "studentId": student_id, "marksObtained": 30 }),
        ));
        assert_eq!(graded["percentage"], json!(75.0));

        let regraded = result(call(
            &mut st,
            "grades.record",
            json!({ "assessmentId": assessment_id, "studentId": student_id, "marksObtained": 34 }),
        ));
        assert_eq!(regraded["percentage"], json!(85.0));
        let rows: i64 = st
            .db
            .as_ref()
            .expect("db")
            .query_row("SELECT COUNT(*) FROM student_grades", [], |r| r.get(0))
            .expect("count");
        assert_eq!(rows, 1);

        let over = call(
            &mut st,
            "grades.record",
            json!({ "assessmentId": assessment_id, "studentId": student_id, "marksObtained": 41 }),
        );
        assert_eq!(over["error"]["code"], json!("bad_params"));
    }

    #[test]
    fn attendance_status_is_normalized() {
        let mut st = state();
        let class_id = result(call(&mut st, "classes.create", json!({ "name": "4A" })))["classId"]
            .as_str()
            .expect("classId")
            .to_string();
        let student_id = result(call(
            &mut st,
            "students.create",
            json!({ "classId": class_id, "name": "Ada" }),
        ))["studentId"]
            .as_str()
            .expect("studentId")
            .to_string();
        let cs_id = result(call(
            &mut st,
            "subjects.assign",
            json!({ "classId": class_id, "subjectName": "Maths" }),
        ))["classSubjectId"]
            .as_str()
            .expect("classSubjectId")
            .to_string();
        let lesson_id = result(call(
            &mut st,
            "lessons.create",
            json!({ "classSubjectId": cs_id, "lessonDate": "2025-09-01" }),
        ))["lessonId"]
            .as_str()
            .expect("lessonId")
            .to_string();

        let marked = result(call(
            &mut st,
            "attendance.mark",
            json!({ "lessonId": lesson_id, "studentId": student_id, "status": "late" }),
        ));
        assert_eq!(marked["status"], json!("LATE"));

        let bad = call(
            &mut st,
            "attendance.mark",
            json!({ "lessonId": lesson_id, "studentId": student_id, "status": "tardy" }),
        );
        assert_eq!(bad["error"]["code"], json!("bad_params"));
    }

    #[test]
    fn reassigning_a_subject_keeps_one_class_subject() {
        let mut st = state();
        let class_id = result(call(&mut st, "classes.create", json!({ "name": "4A" })))["classId"]
            .as_str()
            .expect("classId")
            .to_string();
        let teacher_id = result(call(&mut st, "teachers.create", json!({ "name": "Ms Tan" })))
            ["teacherId"]
            .as_str()
            .expect("teacherId")
            .to_string();
        let first = result(call(
            &mut st,
            "subjects.assign",
            json!({ "classId": class_id, "subjectName": "Maths" }),
        ));
        let second = result(call(
            &mut st,
            "subjects.assign",
            json!({ "classId": class_id, "subjectName": "Maths", "teacherId": teacher_id }),
        ));
        assert_eq!(first["classSubjectId"], second["classSubjectId"]);

        let listed = result(call(&mut st, "subjects.list", json!({ "classId": class_id })));
        let subjects = listed["subjects"].as_array().expect("subjects");
        assert_eq!(subjects.len(), 1);
        assert_eq!(subjects[0]["teacherName"], json!("Ms Tan"));
    }
}
