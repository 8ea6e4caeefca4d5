//! Teacher and admin edits on generated report cards: per-subject comments
//! and effort grades, card-level comments and conduct, and the teacher's
//! review queue.

use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};
use serde::Serialize;
use std::collections::HashMap;
use tracing::info;

use crate::error::{ReportCardError, ReportCardResult};
use crate::store::{self, ReportCardGradeRow, ReportCardRow};
use crate::workflow::ReportCardStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EffortGrade {
    A,
    B,
    C,
    D,
    E,
}

impl EffortGrade {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "A" => Some(EffortGrade::A),
            "B" => Some(EffortGrade::B),
            "C" => Some(EffortGrade::C),
            "D" => Some(EffortGrade::D),
            "E" => Some(EffortGrade::E),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EffortGrade::A => "A",
            EffortGrade::B => "B",
            EffortGrade::C => "C",
            EffortGrade::D => "D",
            EffortGrade::E => "E",
        }
    }
}

pub const CONDUCT_GRADES: [&str; 5] = [
    "Excellent",
    "Very Good",
    "Good",
    "Satisfactory",
    "Needs Improvement",
];

/// Canonical spelling of a conduct grade, matched case-insensitively.
pub fn normalize_conduct_grade(raw: &str) -> Option<&'static str> {
    let t = raw.trim();
    CONDUCT_GRADES
        .iter()
        .copied()
        .find(|g| g.eq_ignore_ascii_case(t))
}

/// `None` and blank strings clear the effort grade.
pub fn parse_effort_grade(raw: Option<&str>) -> ReportCardResult<Option<EffortGrade>> {
    match raw.map(str::trim) {
        None | Some("") => Ok(None),
        Some(v) => EffortGrade::parse(v).map(Some).ok_or_else(|| {
            ReportCardError::BadParams(format!(
                "effortGrade must be one of A, B, C, D, E (got {:?})",
                v
            ))
        }),
    }
}

fn ensure_editable(conn: &Connection, report_card_id: &str) -> ReportCardResult<ReportCardRow> {
    let card = store::fetch_report_card(conn, report_card_id)?
        .ok_or(ReportCardError::NotFound("report card"))?;
    match ReportCardStatus::parse(&card.status) {
        Some(status) if !status.is_editable() => {
            Err(ReportCardError::Locked(card.report_card_id))
        }
        _ => Ok(card),
    }
}

pub fn update_subject_comment(
    conn: &Connection,
    grade_id: &str,
    teacher_comment: Option<&str>,
    effort_grade: Option<EffortGrade>,
) -> ReportCardResult<ReportCardGradeRow> {
    let row = store::fetch_grade_row(conn, grade_id)?
        .ok_or(ReportCardError::NotFound("report card grade"))?;
    ensure_editable(conn, &row.report_card_id)?;
    store::update_subject_comment(
        conn,
        grade_id,
        teacher_comment,
        effort_grade.map(EffortGrade::as_str),
    )?;
    info!(grade_id, report_card_id = %row.report_card_id, "subject comment updated");
    store::fetch_grade_row(conn, grade_id)?.ok_or(ReportCardError::NotFound("report card grade"))
}

/// Card-level fields an admin may edit. The outer `Option` is "field given";
/// the inner one allows clearing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReportCardPatch {
    pub principal_comment: Option<Option<String>>,
    pub form_teacher_comment: Option<Option<String>>,
    pub conduct_grade: Option<Option<String>>,
    pub next_term_begins: Option<Option<String>>,
}

pub fn update_report_card(
    conn: &Connection,
    report_card_id: &str,
    patch: &ReportCardPatch,
) -> ReportCardResult<ReportCardRow> {
    ensure_editable(conn, report_card_id)?;

    let mut set_parts: Vec<&str> = Vec::new();
    let mut values: Vec<Value> = Vec::new();
    let text = |v: &Option<String>| match v {
        Some(s) => Value::Text(s.clone()),
        None => Value::Null,
    };

    if let Some(v) = &patch.principal_comment {
        set_parts.push("principal_comment = ?");
        values.push(text(v));
    }
    if let Some(v) = &patch.form_teacher_comment {
        set_parts.push("form_teacher_comment = ?");
        values.push(text(v));
    }
    if let Some(v) = &patch.conduct_grade {
        let normalized = match v.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(normalize_conduct_grade(raw).ok_or_else(|| {
                ReportCardError::BadParams(format!(
                    "conductGrade must be one of: {}",
                    CONDUCT_GRADES.join(", ")
                ))
            })?),
        };
        set_parts.push("conduct_grade = ?");
        values.push(match normalized {
            Some(g) => Value::Text(g.to_string()),
            None => Value::Null,
        });
    }
    if let Some(v) = &patch.next_term_begins {
        set_parts.push("next_term_begins = ?");
        values.push(text(v));
    }
    set_parts.push("updated_at = ?");
    values.push(Value::Text(store::now_ts()));
    values.push(Value::Text(report_card_id.to_string()));

    let sql = format!(
        "UPDATE report_cards SET {} WHERE id = ?",
        set_parts.join(", ")
    );
    conn.execute(&sql, params_from_iter(values))?;
    info!(report_card_id, "report card updated");
    store::fetch_report_card(conn, report_card_id)?.ok_or(ReportCardError::NotFound("report card"))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TeacherReviewCard {
    #[serde(flatten)]
    pub report_card: ReportCardRow,
    pub class_name: Option<String>,
    pub subjects: Vec<ReportCardGradeRow>,
}

/// REVIEW-status cards holding at least one subject taught by `teacher_id`,
/// each with only that teacher's subject rows.
pub fn teacher_review_cards(
    conn: &Connection,
    teacher_id: &str,
) -> ReportCardResult<Vec<TeacherReviewCard>> {
    let sql = format!(
        "SELECT {}
         FROM report_card_grades g
         JOIN report_cards rc ON rc.id = g.report_card_id
         WHERE g.teacher_id = ? AND rc.status = ?
         ORDER BY rc.rowid, g.subject_name",
        store::grade_row_columns(Some("g"))
    );
    let mut stmt = conn.prepare(&sql)?;
    let grade_rows = stmt
        .query_map(
            (teacher_id, ReportCardStatus::Review.as_str()),
            store::grade_row_from_row,
        )?
        .collect::<Result<Vec<_>, _>>()?;

    let mut order: Vec<String> = Vec::new();
    let mut by_card: HashMap<String, Vec<ReportCardGradeRow>> = HashMap::new();
    for row in grade_rows {
        if !by_card.contains_key(&row.report_card_id) {
            order.push(row.report_card_id.clone());
        }
        by_card.entry(row.report_card_id.clone()).or_default().push(row);
    }

    let mut out = Vec::with_capacity(order.len());
    for id in order {
        let Some(report_card) = store::fetch_report_card(conn, &id)? else {
            continue;
        };
        let class_name = store::fetch_class(conn, &report_card.class_id)?.map(|c| c.name);
        out.push(TeacherReviewCard {
            report_card,
            class_name,
            subjects: by_card.remove(&id).unwrap_or_default(),
        });
    }
    Ok(out)
}
