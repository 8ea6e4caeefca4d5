//! Domain errors for report-card operations.
//!
//! Each kind maps onto a stable machine code that the IPC layer puts in the
//! `error.code` field of a failed reply.

use serde_json::json;

use crate::workflow::ReportCardStatus;

#[derive(Debug, thiserror::Error)]
pub enum ReportCardError {
    #[error("{0}")]
    BadParams(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("class not found")]
    ClassNotFound,

    #[error("no students found in this class")]
    NoStudents,

    #[error("no subjects assigned to this class")]
    NoSubjects,

    #[error("report cards already exist for this class/term ({existing} found)")]
    AlreadyGenerated { existing: usize },

    #[error("cannot move report card {id} from {from} to {to}")]
    InvalidTransition {
        id: String,
        from: ReportCardStatus,
        to: ReportCardStatus,
    },

    #[error("no {0} report cards for this class/term")]
    NothingToAdvance(ReportCardStatus),

    #[error("report card {0} is published and can no longer be edited")]
    Locked(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),
}

pub type ReportCardResult<T> = Result<T, ReportCardError>;

impl ReportCardError {
    pub fn code(&self) -> &'static str {
        match self {
            ReportCardError::BadParams(_) => "bad_params",
            ReportCardError::NotFound(_) => "not_found",
            ReportCardError::ClassNotFound => "class_not_found",
            ReportCardError::NoStudents => "no_students",
            ReportCardError::NoSubjects => "no_subjects",
            ReportCardError::AlreadyGenerated { .. } => "already_generated",
            ReportCardError::InvalidTransition { .. } => "invalid_transition",
            ReportCardError::NothingToAdvance(_) => "nothing_to_advance",
            ReportCardError::Locked(_) => "report_card_locked",
            ReportCardError::Database(_) => "db_query_failed",
        }
    }

    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            ReportCardError::AlreadyGenerated { existing } => {
                Some(json!({ "existing": existing }))
            }
            ReportCardError::InvalidTransition { id, from, to } => Some(json!({
                "reportCardId": id,
                "from": from.as_str(),
                "to": to.as_str(),
            })),
            ReportCardError::NothingToAdvance(status) => {
                Some(json!({ "status": status.as_str() }))
            }
            ReportCardError::Locked(id) => Some(json!({ "reportCardId": id })),
            _ => None,
        }
    }

    /// Precondition failures are raised before any write and can be retried
    /// once the condition is fixed.
    pub fn is_precondition(&self) -> bool {
        matches!(
            self,
            ReportCardError::ClassNotFound
                | ReportCardError::NoStudents
                | ReportCardError::NoSubjects
                | ReportCardError::AlreadyGenerated { .. }
        )
    }
}
