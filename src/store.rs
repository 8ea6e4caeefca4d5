//! Row-store operations the report-card pipeline runs against the workspace
//! database. Every function takes a borrowed connection and returns plain row
//! structs; composition lives in `generate`, `workflow` and `comments`.

use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use serde::Serialize;
use uuid::Uuid;

use crate::calc::{letter_marker, AttendanceSummary, SubjectMark};
use crate::workflow::ReportCardStatus;

/// One (class, academic year, term) group of report cards. Ranks and bulk
/// status changes always apply to a whole cohort.
#[derive(Debug, Clone, Copy)]
pub struct Cohort<'a> {
    pub class_id: &'a str,
    pub academic_year: &'a str,
    pub term: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterStudent {
    pub student_id: String,
    pub student_name: String,
    pub student_email: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ClassInfo {
    pub name: String,
    pub form_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassSubject {
    pub class_subject_id: String,
    pub teacher_id: Option<String>,
    pub teacher_name: String,
    pub subject_id: String,
    pub subject_name: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Assessment {
    pub assessment_id: String,
    pub class_subject_id: String,
    pub assessment_type: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Grade {
    pub assessment_id: String,
    pub student_id: String,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttendanceRecord {
    pub lesson_id: String,
    pub student_id: String,
    pub status: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExistingCard {
    pub student_id: String,
}

#[derive(Debug, Clone)]
pub struct NewReportCard<'a> {
    pub student_id: &'a str,
    pub cohort: Cohort<'a>,
    pub form_id: Option<&'a str>,
    pub overall_average: Option<f64>,
    pub attendance: AttendanceSummary,
    pub generated_by: Option<&'a str>,
}

#[derive(Debug, Clone)]
pub struct NewGradeRow<'a> {
    pub subject: &'a ClassSubject,
    pub mark: SubjectMark,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportCardRow {
    pub report_card_id: String,
    pub student_id: String,
    pub student_name: Option<String>,
    pub student_email: Option<String>,
    pub class_id: String,
    pub form_id: Option<String>,
    pub academic_year: String,
    pub term: i64,
    pub status: String,
    pub overall_average: Option<f64>,
    pub class_rank: Option<i64>,
    pub attendance_percentage: Option<f64>,
    pub days_present: i64,
    pub days_absent: i64,
    pub days_late: i64,
    pub total_school_days: i64,
    pub conduct_grade: Option<String>,
    pub form_teacher_comment: Option<String>,
    pub principal_comment: Option<String>,
    pub next_term_begins: Option<String>,
    pub generated_by: Option<String>,
    pub published_by: Option<String>,
    pub published_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportCardGradeRow {
    pub id: String,
    pub report_card_id: String,
    pub subject_id: Option<String>,
    pub subject_name: String,
    pub teacher_id: Option<String>,
    pub teacher_name: String,
    pub coursework_avg: Option<f64>,
    pub exam_mark: Option<f64>,
    pub final_mark: Option<f64>,
    pub grade_letter: String,
    pub effort_grade: Option<String>,
    pub teacher_comment: Option<String>,
    pub updated_at: Option<String>,
}

pub const REPORT_CARD_COLUMNS: &str = "rc.id, rc.student_id, u.name, u.email, rc.class_id, rc.form_id,
     rc.academic_year, rc.term, rc.status, rc.overall_average, rc.class_rank,
     rc.attendance_percentage, rc.days_present, rc.days_absent, rc.days_late,
     rc.total_school_days, rc.conduct_grade, rc.form_teacher_comment,
     rc.principal_comment, rc.next_term_begins, rc.generated_by, rc.published_by,
     rc.published_at, rc.created_at, rc.updated_at";

const GRADE_ROW_FIELDS: [&str; 13] = [
    "id",
    "report_card_id",
    "subject_id",
    "subject_name",
    "teacher_id",
    "teacher_name",
    "coursework_avg",
    "exam_mark",
    "final_mark",
    "grade_letter",
    "effort_grade",
    "teacher_comment",
    "updated_at",
];

/// Column list matching `grade_row_from_row`, qualified with `alias` when
/// the query joins other tables.
pub fn grade_row_columns(alias: Option<&str>) -> String {
    GRADE_ROW_FIELDS
        .iter()
        .map(|f| match alias {
            Some(a) => format!("{}.{}", a, f),
            None => f.to_string(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn report_card_from_row(r: &Row<'_>) -> rusqlite::Result<ReportCardRow> {
    Ok(ReportCardRow {
        report_card_id: r.get(0)?,
        student_id: r.get(1)?,
        student_name: r.get(2)?,
        student_email: r.get(3)?,
        class_id: r.get(4)?,
        form_id: r.get(5)?,
        academic_year: r.get(6)?,
        term: r.get(7)?,
        status: r.get(8)?,
        overall_average: r.get(9)?,
        class_rank: r.get(10)?,
        attendance_percentage: r.get(11)?,
        days_present: r.get(12)?,
        days_absent: r.get(13)?,
        days_late: r.get(14)?,
        total_school_days: r.get(15)?,
        conduct_grade: r.get(16)?,
        form_teacher_comment: r.get(17)?,
        principal_comment: r.get(18)?,
        next_term_begins: r.get(19)?,
        generated_by: r.get(20)?,
        published_by: r.get(21)?,
        published_at: r.get(22)?,
        created_at: r.get(23)?,
        updated_at: r.get(24)?,
    })
}

pub fn grade_row_from_row(r: &Row<'_>) -> rusqlite::Result<ReportCardGradeRow> {
    Ok(ReportCardGradeRow {
        id: r.get(0)?,
        report_card_id: r.get(1)?,
        subject_id: r.get(2)?,
        subject_name: r.get(3)?,
        teacher_id: r.get(4)?,
        teacher_name: r.get(5)?,
        coursework_avg: r.get(6)?,
        exam_mark: r.get(7)?,
        final_mark: r.get(8)?,
        grade_letter: r.get(9)?,
        effort_grade: r.get(10)?,
        teacher_comment: r.get(11)?,
        updated_at: r.get(12)?,
    })
}

pub fn now_ts() -> String {
    chrono::Utc::now().to_rfc3339()
}

fn placeholders(n: usize) -> String {
    std::iter::repeat("?").take(n).collect::<Vec<_>>().join(", ")
}

pub fn fetch_active_roster(conn: &Connection, class_id: &str) -> rusqlite::Result<Vec<RosterStudent>> {
    let mut stmt = conn.prepare(
        "SELECT u.id, u.name, u.email
         FROM student_class_assignments a
         JOIN users u ON u.id = a.student_id
         WHERE a.class_id = ? AND a.is_active = 1
         ORDER BY a.sort_order, u.name",
    )?;
    let rows = stmt
        .query_map([class_id], |r| {
            Ok(RosterStudent {
                student_id: r.get(0)?,
                student_name: r.get(1)?,
                student_email: r.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn fetch_class(conn: &Connection, class_id: &str) -> rusqlite::Result<Option<ClassInfo>> {
    conn.query_row(
        "SELECT name, form_id FROM classes WHERE id = ?",
        [class_id],
        |r| {
            Ok(ClassInfo {
                name: r.get(0)?,
                form_id: r.get(1)?,
            })
        },
    )
    .optional()
}

pub fn fetch_class_subjects(conn: &Connection, class_id: &str) -> rusqlite::Result<Vec<ClassSubject>> {
    let mut stmt = conn.prepare(
        "SELECT cs.id, cs.teacher_id, COALESCE(t.name, ''), s.id, s.name
         FROM class_subjects cs
         JOIN subjects s ON s.id = cs.subject_id
         LEFT JOIN users t ON t.id = cs.teacher_id
         WHERE cs.class_id = ?
         ORDER BY cs.sort_order",
    )?;
    let rows = stmt
        .query_map([class_id], |r| {
            Ok(ClassSubject {
                class_subject_id: r.get(0)?,
                teacher_id: r.get(1)?,
                teacher_name: r.get(2)?,
                subject_id: r.get(3)?,
                subject_name: r.get(4)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn fetch_assessments(
    conn: &Connection,
    class_subject_ids: &[String],
    term: i64,
) -> rusqlite::Result<Vec<Assessment>> {
    if class_subject_ids.is_empty() {
        return Ok(Vec::new());
    }
    let sql = format!(
        "SELECT id, class_subject_id, assessment_type
         FROM subject_assessments
         WHERE class_subject_id IN ({}) AND term = ?",
        placeholders(class_subject_ids.len())
    );
    let mut values: Vec<rusqlite::types::Value> = class_subject_ids
        .iter()
        .map(|s| rusqlite::types::Value::Text(s.clone()))
        .collect();
    values.push(rusqlite::types::Value::Integer(term));
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(values), |r| {
            Ok(Assessment {
                assessment_id: r.get(0)?,
                class_subject_id: r.get(1)?,
                assessment_type: r.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn fetch_grades(conn: &Connection, assessment_ids: &[String]) -> rusqlite::Result<Vec<Grade>> {
    if assessment_ids.is_empty() {
        return Ok(Vec::new());
    }
    let sql = format!(
        "SELECT assessment_id, student_id, percentage
         FROM student_grades
         WHERE assessment_id IN ({})
         ORDER BY rowid",
        placeholders(assessment_ids.len())
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(assessment_ids.iter()), |r| {
            Ok(Grade {
                assessment_id: r.get(0)?,
                student_id: r.get(1)?,
                percentage: r.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn fetch_lesson_ids(conn: &Connection, class_subject_ids: &[String]) -> rusqlite::Result<Vec<String>> {
    if class_subject_ids.is_empty() {
        return Ok(Vec::new());
    }
    let sql = format!(
        "SELECT id FROM lessons WHERE class_subject_id IN ({})",
        placeholders(class_subject_ids.len())
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(class_subject_ids.iter()), |r| r.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(rows)
}

pub fn fetch_attendance(conn: &Connection, lesson_ids: &[String]) -> rusqlite::Result<Vec<AttendanceRecord>> {
    if lesson_ids.is_empty() {
        return Ok(Vec::new());
    }
    let sql = format!(
        "SELECT lesson_id, student_id, status
         FROM lesson_attendance
         WHERE lesson_id IN ({})",
        placeholders(lesson_ids.len())
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(lesson_ids.iter()), |r| {
            Ok(AttendanceRecord {
                lesson_id: r.get(0)?,
                student_id: r.get(1)?,
                status: r.get(2)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn fetch_existing_cards(conn: &Connection, cohort: &Cohort<'_>) -> rusqlite::Result<Vec<ExistingCard>> {
    let mut stmt = conn.prepare(
        "SELECT student_id
         FROM report_cards
         WHERE class_id = ? AND academic_year = ? AND term = ?
         ORDER BY rowid",
    )?;
    let rows = stmt
        .query_map(
            params![cohort.class_id, cohort.academic_year, cohort.term],
            |r| {
                Ok(ExistingCard {
                    student_id: r.get(0)?,
                })
            },
        )?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Insert one DRAFT card and its per-subject rows. The card and its rows land
/// together or not at all.
pub fn insert_report_card(
    conn: &Connection,
    card: &NewReportCard<'_>,
    grades: &[NewGradeRow<'_>],
) -> rusqlite::Result<String> {
    let tx = conn.unchecked_transaction()?;
    let report_card_id = Uuid::new_v4().to_string();
    let ts = now_ts();
    tx.execute(
        "INSERT INTO report_cards(
            id, student_id, class_id, form_id, academic_year, term, status,
            overall_average, class_rank, attendance_percentage, days_present, days_absent,
            days_late, total_school_days, generated_by, created_at, updated_at
         ) VALUES(?, ?, ?, ?, ?, ?, ?, ?, NULL, ?, ?, ?, ?, ?, ?, ?, ?)",
        params![
            report_card_id,
            card.student_id,
            card.cohort.class_id,
            card.form_id,
            card.cohort.academic_year,
            card.cohort.term,
            ReportCardStatus::Draft.as_str(),
            card.overall_average,
            card.attendance.attendance_percentage,
            card.attendance.days_present,
            card.attendance.days_absent,
            card.attendance.days_late,
            card.attendance.total_school_days,
            card.generated_by,
            ts,
            ts
        ],
    )?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO report_card_grades(
                id, report_card_id, subject_id, subject_name, teacher_id, teacher_name,
                coursework_avg, exam_mark, final_mark, grade_letter, effort_grade, teacher_comment
             ) VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, NULL, NULL)",
        )?;
        for g in grades {
            stmt.execute(params![
                Uuid::new_v4().to_string(),
                report_card_id,
                g.subject.subject_id,
                g.subject.subject_name,
                g.subject.teacher_id,
                g.subject.teacher_name,
                g.mark.coursework_avg,
                g.mark.exam_mark,
                g.mark.final_mark,
                letter_marker(g.mark.grade_letter),
            ])?;
        }
    }
    tx.commit()?;
    Ok(report_card_id)
}

/// Cohort cards in insertion order with their overall averages.
pub fn fetch_cohort_averages(
    conn: &Connection,
    cohort: &Cohort<'_>,
) -> rusqlite::Result<Vec<(String, Option<f64>)>> {
    let mut stmt = conn.prepare(
        "SELECT id, overall_average
         FROM report_cards
         WHERE class_id = ? AND academic_year = ? AND term = ?
         ORDER BY rowid",
    )?;
    let rows = stmt
        .query_map(
            params![cohort.class_id, cohort.academic_year, cohort.term],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Apply a full set of ranks with a single `UPDATE ... CASE` statement, so
/// either every card gets its rank or none does.
pub fn update_ranks(conn: &Connection, ranks: &[(String, i64)]) -> rusqlite::Result<usize> {
    if ranks.is_empty() {
        return Ok(0);
    }
    let mut values: Vec<rusqlite::types::Value> = Vec::with_capacity(ranks.len() * 3);
    for (id, rank) in ranks {
        values.push(rusqlite::types::Value::Text(id.clone()));
        values.push(rusqlite::types::Value::Integer(*rank));
    }
    values.extend(
        ranks
            .iter()
            .map(|(id, _)| rusqlite::types::Value::Text(id.clone())),
    );
    let sql = format!(
        "UPDATE report_cards
         SET class_rank = CASE id {} END
         WHERE id IN ({})",
        std::iter::repeat("WHEN ? THEN ?")
            .take(ranks.len())
            .collect::<Vec<_>>()
            .join(" "),
        placeholders(ranks.len())
    );
    conn.execute(&sql, params_from_iter(values))
}

pub fn fetch_statuses(conn: &Connection, ids: &[String]) -> rusqlite::Result<Vec<(String, String)>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let sql = format!(
        "SELECT id, status FROM report_cards WHERE id IN ({})",
        placeholders(ids.len())
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(ids.iter()), |r| Ok((r.get(0)?, r.get(1)?)))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn cohort_ids_with_status(
    conn: &Connection,
    cohort: &Cohort<'_>,
    status: ReportCardStatus,
) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT id FROM report_cards
         WHERE class_id = ? AND academic_year = ? AND term = ? AND status = ?
         ORDER BY rowid",
    )?;
    let rows = stmt
        .query_map(
            params![
                cohort.class_id,
                cohort.academic_year,
                cohort.term,
                status.as_str()
            ],
            |r| r.get(0),
        )?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(rows)
}

/// One statement over all `ids` still in `from`. Publishing also stamps who
/// published and when.
pub fn bulk_update_status(
    conn: &Connection,
    ids: &[String],
    from: ReportCardStatus,
    to: ReportCardStatus,
    actor_id: Option<&str>,
) -> rusqlite::Result<usize> {
    if ids.is_empty() {
        return Ok(0);
    }
    let ts = now_ts();
    let mut values: Vec<rusqlite::types::Value> = vec![
        rusqlite::types::Value::Text(to.as_str().to_string()),
        rusqlite::types::Value::Text(ts.clone()),
    ];
    let mut set_clause = String::from("status = ?, updated_at = ?");
    if to == ReportCardStatus::Published {
        set_clause.push_str(", published_by = ?, published_at = ?");
        values.push(match actor_id {
            Some(a) => rusqlite::types::Value::Text(a.to_string()),
            None => rusqlite::types::Value::Null,
        });
        values.push(rusqlite::types::Value::Text(ts));
    }
    values.push(rusqlite::types::Value::Text(from.as_str().to_string()));
    values.extend(
        ids.iter()
            .map(|s| rusqlite::types::Value::Text(s.clone())),
    );
    let sql = format!(
        "UPDATE report_cards SET {} WHERE status = ? AND id IN ({})",
        set_clause,
        placeholders(ids.len())
    );
    conn.execute(&sql, params_from_iter(values))
}

/// Removes DRAFT cards of the cohort; grade rows go with them through the
/// foreign-key cascade.
pub fn delete_draft_report_cards(conn: &Connection, cohort: &Cohort<'_>) -> rusqlite::Result<usize> {
    conn.execute(
        "DELETE FROM report_cards
         WHERE class_id = ? AND academic_year = ? AND term = ? AND status = ?",
        params![
            cohort.class_id,
            cohort.academic_year,
            cohort.term,
            ReportCardStatus::Draft.as_str()
        ],
    )
}

pub fn fetch_report_card(conn: &Connection, report_card_id: &str) -> rusqlite::Result<Option<ReportCardRow>> {
    let sql = format!(
        "SELECT {}
         FROM report_cards rc
         LEFT JOIN users u ON u.id = rc.student_id
         WHERE rc.id = ?",
        REPORT_CARD_COLUMNS
    );
    conn.query_row(&sql, [report_card_id], report_card_from_row)
        .optional()
}

/// Cards of a class, optionally narrowed to one year and term. Ranked cards
/// come first in rank order; unranked ones follow by student name.
pub fn fetch_class_cards(
    conn: &Connection,
    class_id: &str,
    academic_year: Option<&str>,
    term: Option<i64>,
) -> rusqlite::Result<Vec<ReportCardRow>> {
    let mut sql = format!(
        "SELECT {}
         FROM report_cards rc
         LEFT JOIN users u ON u.id = rc.student_id
         WHERE rc.class_id = ?",
        REPORT_CARD_COLUMNS
    );
    let mut values: Vec<rusqlite::types::Value> =
        vec![rusqlite::types::Value::Text(class_id.to_string())];
    if let Some(year) = academic_year {
        sql.push_str(" AND rc.academic_year = ?");
        values.push(rusqlite::types::Value::Text(year.to_string()));
    }
    if let Some(term) = term {
        sql.push_str(" AND rc.term = ?");
        values.push(rusqlite::types::Value::Integer(term));
    }
    sql.push_str(
        " ORDER BY rc.class_rank IS NULL, rc.class_rank, u.name, rc.academic_year DESC, rc.term DESC",
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(values), report_card_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// A student's cards in one status, newest academic year and term first.
pub fn fetch_student_cards(
    conn: &Connection,
    student_id: &str,
    status: ReportCardStatus,
) -> rusqlite::Result<Vec<ReportCardRow>> {
    let sql = format!(
        "SELECT {}
         FROM report_cards rc
         LEFT JOIN users u ON u.id = rc.student_id
         WHERE rc.student_id = ? AND rc.status = ?
         ORDER BY rc.academic_year DESC, rc.term DESC",
        REPORT_CARD_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![student_id, status.as_str()], report_card_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn fetch_form_name(conn: &Connection, form_id: &str) -> rusqlite::Result<Option<String>> {
    conn.query_row("SELECT name FROM forms WHERE id = ?", [form_id], |r| r.get(0))
        .optional()
}

pub fn fetch_grade_row(conn: &Connection, grade_id: &str) -> rusqlite::Result<Option<ReportCardGradeRow>> {
    let sql = format!(
        "SELECT {} FROM report_card_grades WHERE id = ?",
        grade_row_columns(None)
    );
    conn.query_row(&sql, [grade_id], grade_row_from_row).optional()
}

pub fn fetch_grade_rows_for_card(
    conn: &Connection,
    report_card_id: &str,
) -> rusqlite::Result<Vec<ReportCardGradeRow>> {
    let sql = format!(
        "SELECT {} FROM report_card_grades WHERE report_card_id = ? ORDER BY subject_name, id",
        grade_row_columns(None)
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([report_card_id], grade_row_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn update_subject_comment(
    conn: &Connection,
    grade_id: &str,
    teacher_comment: Option<&str>,
    effort_grade: Option<&str>,
) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE report_card_grades
         SET teacher_comment = ?, effort_grade = ?, updated_at = ?
         WHERE id = ?",
        params![teacher_comment, effort_grade, now_ts(), grade_id],
    )
}
