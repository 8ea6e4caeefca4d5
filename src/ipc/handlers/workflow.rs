use crate::ipc::error::{domain_err, err, ok};
use crate::ipc::helpers::{cohort_params, db_conn, optional_str, required_str, required_str_list};
use crate::ipc::types::{AppState, Request};
use crate::workflow::{self, ReportCardStatus};
use serde_json::json;

fn handle_send_to_review(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let cohort = match cohort_params(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match workflow::send_to_review(conn, &cohort.cohort()) {
        Ok(change) => ok(&req.id, json!(change)),
        Err(e) => domain_err(&req.id, &e),
    }
}

fn handle_publish(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let cohort = match cohort_params(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let actor_id = match optional_str(req, "actorId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match workflow::publish(conn, &cohort.cohort(), actor_id.as_deref()) {
        Ok(change) => ok(&req.id, json!(change)),
        Err(e) => domain_err(&req.id, &e),
    }
}

fn handle_update_status(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let ids = match required_str_list(req, "reportCardIds") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let status = match required_str(req, "status") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let Some(to) = ReportCardStatus::parse(&status) else {
        return err(
            &req.id,
            "bad_params",
            "status must be one of DRAFT, REVIEW, PUBLISHED",
            None,
        );
    };
    let actor_id = match optional_str(req, "actorId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match workflow::update_status(conn, &ids, to, actor_id.as_deref()) {
        Ok(change) => ok(&req.id, json!(change)),
        Err(e) => domain_err(&req.id, &e),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "reportCards.sendToReview" => Some(handle_send_to_review(state, req)),
        "reportCards.publish" => Some(handle_publish(state, req)),
        "reportCards.updateStatus" => Some(handle_update_status(state, req)),
        _ => None,
    }
}
