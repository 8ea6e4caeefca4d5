use serde_json::json;

use crate::error::ReportCardError;

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

/// Failed reply for a domain error, keeping its machine code and details.
pub fn domain_err(id: &str, e: &ReportCardError) -> serde_json::Value {
    err(id, e.code(), e.to_string(), e.details())
}
