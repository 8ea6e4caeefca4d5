//! Report-card generation: load the class roster and its subjects, roll grades
//! and attendance up per student, insert DRAFT cards, then rank the cohort.

use rusqlite::Connection;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::{debug, info, warn, Level};

use crate::calc::{self, AttendanceSummary, SubjectBucket};
use crate::error::{ReportCardError, ReportCardResult};
use crate::store::{self, Assessment, ClassSubject, Cohort, Grade, NewGradeRow, NewReportCard};

#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub class_id: String,
    pub academic_year: String,
    pub term: i64,
    pub generated_by: Option<String>,
}

impl GenerateRequest {
    pub fn cohort(&self) -> Cohort<'_> {
        Cohort {
            class_id: &self.class_id,
            academic_year: &self.academic_year,
            term: self.term,
        }
    }

    fn validate(&self) -> ReportCardResult<()> {
        if self.class_id.trim().is_empty() {
            return Err(ReportCardError::BadParams("missing classId".to_string()));
        }
        if self.academic_year.trim().is_empty() {
            return Err(ReportCardError::BadParams("missing academicYear".to_string()));
        }
        if self.term < 1 {
            return Err(ReportCardError::BadParams("term must be >= 1".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedStudent {
    pub student_id: String,
    pub message: String,
}

/// Outcome of one generation run. `generated < total - skippedExisting`
/// means some inserts failed; they are listed in `failed`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateSummary {
    pub generated: usize,
    pub total: usize,
    pub skipped_existing: usize,
    pub report_card_ids: Vec<String>,
    pub failed: Vec<FailedStudent>,
    pub ranked: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rank_error: Option<String>,
    pub unranked: Vec<String>,
}

/// Per-subject marks of one student, in class-subject order.
#[derive(Debug, Clone)]
pub struct StudentRollup<'a> {
    pub grades: Vec<NewGradeRow<'a>>,
    pub overall_average: Option<f64>,
    pub attendance: AttendanceSummary,
}

type BucketKey = (String, String);

/// Group grade percentages by (student, class subject). Grades whose
/// assessment is not in `assessments` are dropped.
pub fn bucket_grades(assessments: &[Assessment], grades: &[Grade]) -> HashMap<BucketKey, SubjectBucket> {
    let by_id: HashMap<&str, &Assessment> = assessments
        .iter()
        .map(|a| (a.assessment_id.as_str(), a))
        .collect();
    let mut buckets: HashMap<BucketKey, SubjectBucket> = HashMap::new();
    for g in grades {
        let Some(a) = by_id.get(g.assessment_id.as_str()) else {
            continue;
        };
        buckets
            .entry((g.student_id.clone(), a.class_subject_id.clone()))
            .or_default()
            .push(&a.assessment_type, g.percentage);
    }
    buckets
}

pub fn rollup_student<'a>(
    student_id: &str,
    subjects: &'a [ClassSubject],
    buckets: &HashMap<BucketKey, SubjectBucket>,
    attendance_statuses: &[&str],
) -> StudentRollup<'a> {
    let empty = SubjectBucket::default();
    let grades: Vec<NewGradeRow<'a>> = subjects
        .iter()
        .map(|cs| {
            let bucket = buckets
                .get(&(student_id.to_string(), cs.class_subject_id.clone()))
                .unwrap_or(&empty);
            NewGradeRow {
                subject: cs,
                mark: calc::subject_mark(bucket),
            }
        })
        .collect();
    let overall_average = calc::overall_average(grades.iter().map(|g| g.mark.final_mark));
    StudentRollup {
        grades,
        overall_average,
        attendance: calc::attendance_summary(attendance_statuses.iter().copied()),
    }
}

pub fn generate_report_cards(
    conn: &Connection,
    req: &GenerateRequest,
) -> ReportCardResult<GenerateSummary> {
    req.validate()?;
    let cohort = req.cohort();

    let roster = store::fetch_active_roster(conn, &req.class_id)?;
    if roster.is_empty() {
        return Err(ReportCardError::NoStudents);
    }
    let class = store::fetch_class(conn, &req.class_id)?.ok_or(ReportCardError::ClassNotFound)?;
    let subjects = store::fetch_class_subjects(conn, &req.class_id)?;
    if subjects.is_empty() {
        return Err(ReportCardError::NoSubjects);
    }
    let cs_ids: Vec<String> = subjects.iter().map(|s| s.class_subject_id.clone()).collect();

    let assessments = store::fetch_assessments(conn, &cs_ids, req.term)?;
    let assessment_ids: Vec<String> = assessments.iter().map(|a| a.assessment_id.clone()).collect();
    let grades = store::fetch_grades(conn, &assessment_ids)?;
    let lesson_ids = store::fetch_lesson_ids(conn, &cs_ids)?;
    let attendance = store::fetch_attendance(conn, &lesson_ids)?;
    if tracing::enabled!(Level::DEBUG) {
        let lessons_marked: HashSet<&str> =
            attendance.iter().map(|a| a.lesson_id.as_str()).collect();
        debug!(
            class_id = %req.class_id,
            students = roster.len(),
            subjects = subjects.len(),
            assessments = assessments.len(),
            grades = grades.len(),
            attendance_rows = attendance.len(),
            lessons_marked = lessons_marked.len(),
            "report card inputs loaded"
        );
    }

    let existing = store::fetch_existing_cards(conn, &cohort)?;
    let existing_students: HashSet<&str> = existing.iter().map(|e| e.student_id.as_str()).collect();
    let new_students: Vec<&str> = roster
        .iter()
        .map(|s| s.student_id.as_str())
        .filter(|sid| !existing_students.contains(sid))
        .collect();
    if new_students.is_empty() && !existing.is_empty() {
        return Err(ReportCardError::AlreadyGenerated {
            existing: existing.len(),
        });
    }

    let buckets = bucket_grades(&assessments, &grades);
    let mut attendance_by_student: HashMap<&str, Vec<&str>> = HashMap::new();
    for row in &attendance {
        attendance_by_student
            .entry(row.student_id.as_str())
            .or_default()
            .push(row.status.as_str());
    }

    let mut summary = GenerateSummary {
        total: roster.len(),
        skipped_existing: roster.len() - new_students.len(),
        ..GenerateSummary::default()
    };

    for student_id in new_students {
        let statuses = attendance_by_student
            .get(student_id)
            .map(Vec::as_slice)
            .unwrap_or(&[]);
        let rollup = rollup_student(student_id, &subjects, &buckets, statuses);
        let card = NewReportCard {
            student_id,
            cohort,
            form_id: class.form_id.as_deref(),
            overall_average: rollup.overall_average,
            attendance: rollup.attendance,
            generated_by: req.generated_by.as_deref(),
        };
        match store::insert_report_card(conn, &card, &rollup.grades) {
            Ok(id) => summary.report_card_ids.push(id),
            Err(e) => {
                warn!(
                    class_id = %req.class_id,
                    student_id,
                    error = %e,
                    "failed to insert report card; skipping student"
                );
                summary.failed.push(FailedStudent {
                    student_id: student_id.to_string(),
                    message: e.to_string(),
                });
            }
        }
    }
    summary.generated = summary.report_card_ids.len();

    if summary.generated > 0 {
        match rank_cohort(conn, &cohort) {
            Ok(n) => summary.ranked = n,
            Err(e) => {
                warn!(class_id = %req.class_id, error = %e, "class ranking failed");
                summary.rank_error = Some(e.to_string());
                summary.unranked = unranked_cards(conn, &cohort, &summary.report_card_ids);
            }
        }
    }

    info!(
        class_id = %req.class_id,
        class_name = %class.name,
        academic_year = %req.academic_year,
        term = req.term,
        generated = summary.generated,
        total = summary.total,
        failed = summary.failed.len(),
        ranked = summary.ranked,
        "report cards generated"
    );
    Ok(summary)
}

/// Cards left without a rank after a ranking failure. Falls back to the cards
/// inserted by this run when the cohort cannot be re-read.
fn unranked_cards(conn: &Connection, cohort: &Cohort<'_>, inserted: &[String]) -> Vec<String> {
    match store::fetch_cohort_averages(conn, cohort) {
        Ok(rows) => rows.into_iter().map(|(id, _)| id).collect(),
        Err(e) => {
            warn!(
                class_id = %cohort.class_id,
                error = %e,
                "could not re-read cohort after ranking failure"
            );
            inserted.to_vec()
        }
    }
}

/// Re-rank every card of the cohort, not only the ones just inserted.
pub fn rank_cohort(conn: &Connection, cohort: &Cohort<'_>) -> rusqlite::Result<usize> {
    let cards = store::fetch_cohort_averages(conn, cohort)?;
    let averages: Vec<Option<f64>> = cards.iter().map(|(_, avg)| *avg).collect();
    let ranks: Vec<(String, i64)> = calc::rank_order(&averages)
        .into_iter()
        .enumerate()
        .map(|(pos, idx)| (cards[idx].0.clone(), pos as i64 + 1))
        .collect();
    store::update_ranks(conn, &ranks)
}
