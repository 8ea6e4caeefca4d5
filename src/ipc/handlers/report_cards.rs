use crate::comments::{self, ReportCardPatch};
use crate::generate::{self, GenerateRequest};
use crate::ipc::error::{domain_err, err, ok};
use crate::ipc::helpers::{cohort_params, db_conn, optional_i64, optional_str, patch_str, required_str};
use crate::ipc::types::{AppState, Request};
use crate::store;
use crate::workflow::{self, ReportCardStatus};
use serde_json::json;
use tracing::warn;

fn handle_generate(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let cohort = match cohort_params(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let generated_by = match optional_str(req, "generatedBy") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let gen = GenerateRequest {
        class_id: cohort.class_id,
        academic_year: cohort.academic_year,
        term: cohort.term,
        generated_by,
    };
    match generate::generate_report_cards(conn, &gen) {
        Ok(summary) => ok(&req.id, json!(summary)),
        Err(e) => {
            if !e.is_precondition() {
                warn!(class_id = %gen.class_id, error = %e, "report card generation failed");
            }
            domain_err(&req.id, &e)
        }
    }
}

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let class_id = match required_str(req, "classId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let academic_year = match optional_str(req, "academicYear") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let term = match optional_i64(req, "term") {
        Ok(v) => v,
        Err(e) => return e,
    };

    match store::fetch_class_cards(conn, &class_id, academic_year.as_deref(), term) {
        Ok(cards) => ok(&req.id, json!({ "reportCards": cards })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_open(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let report_card_id = match required_str(req, "reportCardId") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let card = match store::fetch_report_card(conn, &report_card_id) {
        Ok(Some(c)) => c,
        Ok(None) => return err(&req.id, "not_found", "report card not found", None),
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let class_name = match store::fetch_class(conn, &card.class_id) {
        Ok(c) => c.map(|c| c.name),
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let form_name = match card.form_id.as_deref() {
        Some(fid) => match store::fetch_form_name(conn, fid) {
            Ok(v) => v,
            Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
        },
        None => None,
    };
    let grades = match store::fetch_grade_rows_for_card(conn, &report_card_id) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    ok(
        &req.id,
        json!({
            "reportCard": card,
            "className": class_name,
            "formName": form_name,
            "grades": grades,
        }),
    )
}

/// Students and parents only ever see published cards.
fn handle_for_student(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let student_id = match required_str(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match store::fetch_student_cards(conn, &student_id, ReportCardStatus::Published) {
        Ok(cards) => ok(&req.id, json!({ "reportCards": cards })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let report_card_id = match required_str(req, "reportCardId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(patch) = req.params.get("patch").filter(|v| v.is_object()) else {
        return err(&req.id, "bad_params", "missing patch", None);
    };

    let patch = ReportCardPatch {
        principal_comment: patch_str(patch, "principalComment"),
        form_teacher_comment: patch_str(patch, "formTeacherComment"),
        conduct_grade: patch_str(patch, "conductGrade"),
        next_term_begins: patch_str(patch, "nextTermBegins"),
    };
    if let Some(Some(d)) = &patch.next_term_begins {
        if chrono::NaiveDate::parse_from_str(d, "%Y-%m-%d").is_err() {
            return err(&req.id, "bad_params", "nextTermBegins must be YYYY-MM-DD", None);
        }
    }

    match comments::update_report_card(conn, &report_card_id, &patch) {
        Ok(card) => ok(&req.id, json!({ "reportCard": card })),
        Err(e) => domain_err(&req.id, &e),
    }
}

fn handle_delete_drafts(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let cohort = match cohort_params(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match workflow::delete_drafts(conn, &cohort.cohort()) {
        Ok(deleted) => ok(&req.id, json!({ "deleted": deleted })),
        Err(e) => domain_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "reportCards.generate" => Some(handle_generate(state, req)),
        "reportCards.list" => Some(handle_list(state, req)),
        "reportCards.open" => Some(handle_open(state, req)),
        "reportCards.forStudent" => Some(handle_for_student(state, req)),
        "reportCards.update" => Some(handle_update(state, req)),
        "reportCards.deleteDrafts" => Some(handle_delete_drafts(state, req)),
        _ => None,
    }
}
