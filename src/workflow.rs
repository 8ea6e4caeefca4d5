//! DRAFT -> REVIEW -> PUBLISHED lifecycle of report cards.

use rusqlite::Connection;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use tracing::info;

use crate::error::{ReportCardError, ReportCardResult};
use crate::store::{self, Cohort};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReportCardStatus {
    Draft,
    Review,
    Published,
}

impl ReportCardStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ReportCardStatus::Draft => "DRAFT",
            ReportCardStatus::Review => "REVIEW",
            ReportCardStatus::Published => "PUBLISHED",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "DRAFT" => Some(ReportCardStatus::Draft),
            "REVIEW" => Some(ReportCardStatus::Review),
            "PUBLISHED" => Some(ReportCardStatus::Published),
            _ => None,
        }
    }

    /// The only stage a card in this state may move to.
    pub fn next(self) -> Option<Self> {
        match self {
            ReportCardStatus::Draft => Some(ReportCardStatus::Review),
            ReportCardStatus::Review => Some(ReportCardStatus::Published),
            ReportCardStatus::Published => None,
        }
    }

    pub fn previous(self) -> Option<Self> {
        match self {
            ReportCardStatus::Draft => None,
            ReportCardStatus::Review => Some(ReportCardStatus::Draft),
            ReportCardStatus::Published => Some(ReportCardStatus::Review),
        }
    }

    pub fn can_transition_to(self, to: ReportCardStatus) -> bool {
        self.next() == Some(to)
    }

    pub fn is_editable(self) -> bool {
        !matches!(self, ReportCardStatus::Published)
    }
}

impl fmt::Display for ReportCardStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChange {
    pub status: ReportCardStatus,
    pub updated: usize,
    pub report_card_ids: Vec<String>,
}

/// Move every card of the cohort that sits in `from` one stage forward.
pub fn advance_cohort(
    conn: &Connection,
    cohort: &Cohort<'_>,
    from: ReportCardStatus,
    actor_id: Option<&str>,
) -> ReportCardResult<StatusChange> {
    let Some(to) = from.next() else {
        return Err(ReportCardError::BadParams(format!(
            "{} report cards cannot be advanced",
            from
        )));
    };
    let ids = store::cohort_ids_with_status(conn, cohort, from)?;
    if ids.is_empty() {
        return Err(ReportCardError::NothingToAdvance(from));
    }
    let updated = store::bulk_update_status(conn, &ids, from, to, actor_id)?;
    info!(
        class_id = cohort.class_id,
        academic_year = cohort.academic_year,
        term = cohort.term,
        from = from.as_str(),
        to = to.as_str(),
        updated,
        "report card status advanced"
    );
    Ok(StatusChange {
        status: to,
        updated,
        report_card_ids: ids,
    })
}

pub fn send_to_review(conn: &Connection, cohort: &Cohort<'_>) -> ReportCardResult<StatusChange> {
    advance_cohort(conn, cohort, ReportCardStatus::Draft, None)
}

pub fn publish(
    conn: &Connection,
    cohort: &Cohort<'_>,
    actor_id: Option<&str>,
) -> ReportCardResult<StatusChange> {
    advance_cohort(conn, cohort, ReportCardStatus::Review, actor_id)
}

/// Bulk transition by id. Every card must be exactly one stage behind `to`;
/// if any is not, nothing is written.
pub fn update_status(
    conn: &Connection,
    report_card_ids: &[String],
    to: ReportCardStatus,
    actor_id: Option<&str>,
) -> ReportCardResult<StatusChange> {
    if report_card_ids.is_empty() {
        return Err(ReportCardError::BadParams(
            "reportCardIds must not be empty".to_string(),
        ));
    }
    let Some(from) = to.previous() else {
        return Err(ReportCardError::BadParams(format!(
            "report cards cannot be moved back to {}",
            to
        )));
    };

    let current: HashMap<String, String> = store::fetch_statuses(conn, report_card_ids)?
        .into_iter()
        .collect();
    for id in report_card_ids {
        let Some(raw) = current.get(id) else {
            return Err(ReportCardError::NotFound("report card"));
        };
        let Some(status) = ReportCardStatus::parse(raw) else {
            return Err(ReportCardError::BadParams(format!(
                "report card {} has unknown status {}",
                id, raw
            )));
        };
        if !status.can_transition_to(to) {
            return Err(ReportCardError::InvalidTransition {
                id: id.clone(),
                from: status,
                to,
            });
        }
    }

    let mut ids = report_card_ids.to_vec();
    ids.sort();
    ids.dedup();
    let updated = store::bulk_update_status(conn, &ids, from, to, actor_id)?;
    info!(to = to.as_str(), updated, "report card status updated");
    Ok(StatusChange {
        status: to,
        updated,
        report_card_ids: ids,
    })
}

/// Only DRAFT cards are removed; cards already sent for review or published
/// for the same cohort stay.
pub fn delete_drafts(conn: &Connection, cohort: &Cohort<'_>) -> ReportCardResult<usize> {
    let deleted = store::delete_draft_report_cards(conn, cohort)?;
    info!(
        class_id = cohort.class_id,
        academic_year = cohort.academic_year,
        term = cohort.term,
        deleted,
        "draft report cards deleted"
    );
    Ok(deleted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_schema;

    fn seeded() -> Connection {
        let conn = Connection::open_in_memory().expect("open memory db");
        init_schema(&conn).expect("schema");
        conn.execute_batch(
            "INSERT INTO classes(id, name) VALUES('c1', '4A');
             INSERT INTO users(id, name, role) VALUES('s1', 'Ada', 'student');
             INSERT INTO users(id, name, role) VALUES('s2', 'Ben', 'student');
             INSERT INTO users(id, name, role) VALUES('s3', 'Cy', 'student');
             INSERT INTO report_cards(id, student_id, class_id, academic_year, term, status,
               days_present, days_absent, days_late, total_school_days, created_at, updated_at)
               VALUES('rc1', 's1', 'c1', '2025', 1, 'DRAFT', 0, 0, 0, 0, 't', 't');
             INSERT INTO report_cards(id, student_id, class_id, academic_year, term, status,
               days_present, days_absent, days_late, total_school_days, created_at, updated_at)
               VALUES('rc2', 's2', 'c1', '2025', 1, 'REVIEW', 0, 0, 0, 0, 't', 't');
             INSERT INTO report_cards(id, student_id, class_id, academic_year, term, status,
               days_present, days_absent, days_late, total_school_days, created_at, updated_at)
               VALUES('rc3', 's3', 'c1', '2025', 1, 'PUBLISHED', 0, 0, 0, 0, 't', 't');",
        )
        .expect("seed");
        conn
    }

    fn cohort() -> Cohort<'static> {
        Cohort {
            class_id: "c1",
            academic_year: "2025",
            term: 1,
        }
    }

    fn status_of(conn: &Connection, id: &str) -> String {
        conn.query_row("SELECT status FROM report_cards WHERE id = ?", [id], |r| r.get(0))
            .expect("status")
    }

    #[test]
    fn transitions_only_step_forward() {
        use ReportCardStatus::*;
        assert!(Draft.can_transition_to(Review));
        assert!(Review.can_transition_to(Published));
        assert!(!Draft.can_transition_to(Published));
        assert!(!Published.can_transition_to(Draft));
        assert!(!Review.can_transition_to(Draft));
        assert_eq!(Published.next(), None);
        assert_eq!(ReportCardStatus::parse("review"), Some(Review));
        assert_eq!(ReportCardStatus::parse("archived"), None);
    }

    #[test]
    fn send_to_review_moves_only_drafts() {
        let conn = seeded();
        let change = send_to_review(&conn, &cohort()).expect("advance");
        assert_eq!(change.updated, 1);
        assert_eq!(change.report_card_ids, vec!["rc1".to_string()]);
        assert_eq!(status_of(&conn, "rc1"), "REVIEW");
        assert_eq!(status_of(&conn, "rc3"), "PUBLISHED");

        let again = send_to_review(&conn, &cohort());
        assert!(matches!(
            again,
            Err(ReportCardError::NothingToAdvance(ReportCardStatus::Draft))
        ));
    }

    #[test]
    fn publish_stamps_actor_and_time() {
        let conn = seeded();
        let change = publish(&conn, &cohort(), Some("principal")).expect("publish");
        assert_eq!(change.updated, 1);
        let (by, at): (Option<String>, Option<String>) = conn
            .query_row(
                "SELECT published_by, published_at FROM report_cards WHERE id = 'rc2'",
                [],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .expect("row");
        assert_eq!(by.as_deref(), Some("principal"));
        assert!(at.is_some());
    }

    #[test]
    fn update_status_rejects_skipping_a_stage() {
        let conn = seeded();
        let res = update_status(
            &conn,
            &["rc1".to_string()],
            ReportCardStatus::Published,
            Some("principal"),
        );
        assert!(matches!(res, Err(ReportCardError::InvalidTransition { .. })));
        assert_eq!(status_of(&conn, "rc1"), "DRAFT");
    }

    #[test]
    fn update_status_is_all_or_nothing() {
        let conn = seeded();
        let res = update_status(
            &conn,
            &["rc1".to_string(), "rc2".to_string()],
            ReportCardStatus::Review,
            None,
        );
        assert!(matches!(res, Err(ReportCardError::InvalidTransition { .. })));
        assert_eq!(status_of(&conn, "rc1"), "DRAFT");

        let res = update_status(&conn, &["missing".to_string()], ReportCardStatus::Review, None);
        assert!(matches!(res, Err(ReportCardError::NotFound(_))));
    }

    #[test]
    fn delete_drafts_leaves_review_and_published() {
        let conn = seeded();
        assert_eq!(delete_drafts(&conn, &cohort()).expect("delete"), 1);
        let left: i64 = conn
            .query_row("SELECT COUNT(*) FROM report_cards", [], |r| r.get(0))
            .expect("count");
        assert_eq!(left, 2);
        assert_eq!(status_of(&conn, "rc2"), "REVIEW");
        assert_eq!(status_of(&conn, "rc3"), "PUBLISHED");
    }
}
