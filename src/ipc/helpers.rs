//! Parameter extraction shared by the handler families. Each helper returns
//! the ready-made error reply on failure so handlers can `match` and return.

use rusqlite::Connection;
use serde_json::Value;

use crate::ipc::error::err;
use crate::ipc::types::{AppState, Request};
use crate::store::Cohort;

pub fn db_conn<'a>(state: &'a AppState, req: &Request) -> Result<&'a Connection, Value> {
    state
        .db
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

/// A present, non-blank string parameter, trimmed.
pub fn required_str(req: &Request, key: &str) -> Result<String, Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

/// `None` for a missing, null or blank parameter. Non-string values are
/// rejected rather than ignored.
pub fn optional_str(req: &Request, key: &str) -> Result<Option<String>, Value> {
    match req.params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => {
            let t = s.trim();
            Ok(if t.is_empty() { None } else { Some(t.to_string()) })
        }
        Some(_) => Err(err(
            &req.id,
            "bad_params",
            format!("{} must be a string", key),
            None,
        )),
    }
}

/// Integer parameter. Accepts JSON numbers and numeric strings, since hosts
/// pass form field values through unchanged.
pub fn optional_i64(req: &Request, key: &str) -> Result<Option<i64>, Value> {
    match req.params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_i64()
            .or_else(|| v.as_str().and_then(|s| s.trim().parse::<i64>().ok()))
            .map(Some)
            .ok_or_else(|| {
                err(
                    &req.id,
                    "bad_params",
                    format!("{} must be an integer", key),
                    None,
                )
            }),
    }
}

pub fn required_i64(req: &Request, key: &str) -> Result<i64, Value> {
    optional_i64(req, key)?
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))
}

pub fn required_f64(req: &Request, key: &str) -> Result<f64, Value> {
    let v = req
        .params
        .get(key)
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing {}", key), None))?;
    v.as_f64()
        .or_else(|| v.as_str().and_then(|s| s.trim().parse::<f64>().ok()))
        .filter(|n| n.is_finite())
        .ok_or_else(|| err(&req.id, "bad_params", format!("{} must be a number", key), None))
}

pub fn required_str_list(req: &Request, key: &str) -> Result<Vec<String>, Value> {
    let Some(arr) = req.params.get(key).and_then(|v| v.as_array()) else {
        return Err(err(&req.id, "bad_params", format!("missing {}", key), None));
    };
    arr.iter()
        .map(|v| {
            v.as_str().map(|s| s.trim().to_string()).ok_or_else(|| {
                err(
                    &req.id,
                    "bad_params",
                    format!("{} must be an array of strings", key),
                    None,
                )
            })
        })
        .collect()
}

/// `classId`, `academicYear` and `term` naming one report-card cohort.
pub struct CohortParams {
    pub class_id: String,
    pub academic_year: String,
    pub term: i64,
}

impl CohortParams {
    pub fn cohort(&self) -> Cohort<'_> {
        Cohort {
            class_id: &self.class_id,
            academic_year: &self.academic_year,
            term: self.term,
        }
    }
}

pub fn cohort_params(req: &Request) -> Result<CohortParams, Value> {
    let class_id = required_str(req, "classId")?;
    let academic_year = required_str(req, "academicYear")?;
    let term = required_i64(req, "term")?;
    if term < 1 {
        return Err(err(&req.id, "bad_params", "term must be >= 1", None));
    }
    Ok(CohortParams {
        class_id,
        academic_year,
        term,
    })
}

/// Patch semantics: absent key is `None`, explicit null or blank string
/// clears (`Some(None)`).
pub fn patch_str(obj: &Value, key: &str) -> Option<Option<String>> {
    match obj.get(key) {
        None => None,
        Some(Value::String(s)) if !s.trim().is_empty() => Some(Some(s.trim().to_string())),
        Some(_) => Some(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn req(params: Value) -> Request {
        Request {
            id: "1".to_string(),
            method: "test".to_string(),
            params,
        }
    }

    #[test]
    fn required_str_rejects_blank() {
        let r = req(json!({ "classId": "  " }));
        let resp = required_str(&r, "classId").expect_err("blank");
        assert_eq!(resp["error"]["code"], json!("bad_params"));
        let r = req(json!({ "classId": " c1 " }));
        assert_eq!(required_str(&r, "classId").expect("value"), "c1");
    }

    #[test]
    fn integers_accept_numeric_strings() {
        let r = req(json!({ "term": "2", "other": 3, "bad": "two" }));
        assert_eq!(required_i64(&r, "term").expect("term"), 2);
        assert_eq!(required_i64(&r, "other").expect("other"), 3);
        assert!(required_i64(&r, "bad").is_err());
        assert_eq!(optional_i64(&r, "missing").expect("missing"), None);
    }

    #[test]
    fn cohort_requires_positive_term() {
        let r = req(json!({ "classId": "c1", "academicYear": "2025-2026", "term": 0 }));
        assert!(cohort_params(&r).is_err());
        let r = req(json!({ "classId": "c1", "academicYear": "2025-2026", "term": 2 }));
        let p = cohort_params(&r).expect("cohort");
        assert_eq!(p.cohort().term, 2);
    }

    #[test]
    fn patch_distinguishes_absent_from_cleared() {
        let patch = json!({ "principalComment": null, "conductGrade": "Good" });
        assert_eq!(patch_str(&patch, "formTeacherComment"), None);
        assert_eq!(patch_str(&patch, "principalComment"), Some(None));
        assert_eq!(patch_str(&patch, "conductGrade"), Some(Some("Good".into())));
    }
}
