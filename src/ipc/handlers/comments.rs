use crate::comments::{self, parse_effort_grade};
use crate::ipc::error::{domain_err, ok};
use crate::ipc::helpers::{db_conn, optional_str, required_str};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_update_subject_comment(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let grade_id = match required_str(req, "gradeId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let comment = match optional_str(req, "comment") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let effort_raw = match optional_str(req, "effortGrade") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let effort = match parse_effort_grade(effort_raw.as_deref()) {
        Ok(v) => v,
        Err(e) => return domain_err(&req.id, &e),
    };

    match comments::update_subject_comment(conn, &grade_id, comment.as_deref(), effort) {
        Ok(row) => ok(&req.id, json!({ "grade": row })),
        Err(e) => domain_err(&req.id, &e),
    }
}

fn handle_teacher_review(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let teacher_id = match required_str(req, "teacherId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match comments::teacher_review_cards(conn, &teacher_id) {
        Ok(cards) => ok(&req.id, json!({ "reportCards": cards })),
        Err(e) => domain_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "reportCards.updateSubjectComment" => Some(handle_update_subject_comment(state, req)),
        "reportCards.teacherReview" => Some(handle_teacher_review(state, req)),
        _ => None,
    }
}
