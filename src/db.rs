use rusqlite::Connection;
use std::path::Path;

pub const DB_FILE_NAME: &str = "reportcards.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(db_path)?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS forms(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            form_number INTEGER NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS classes(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            class_code TEXT,
            form_id TEXT,
            is_active INTEGER NOT NULL DEFAULT 1,
            FOREIGN KEY(form_id) REFERENCES forms(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_classes_form ON classes(form_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS users(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            email TEXT,
            role TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS student_class_assignments(
            id TEXT PRIMARY KEY,
            class_id TEXT NOT NULL,
            student_id TEXT NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1,
            sort_order INTEGER NOT NULL,
            FOREIGN KEY(class_id) REFERENCES classes(id),
            FOREIGN KEY(student_id) REFERENCES users(id),
            UNIQUE(class_id, student_id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_assignments_class ON student_class_assignments(class_id, sort_order)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS subjects(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS class_subjects(
            id TEXT PRIMARY KEY,
            class_id TEXT NOT NULL,
            subject_id TEXT NOT NULL,
            teacher_id TEXT,
            sort_order INTEGER NOT NULL,
            FOREIGN KEY(class_id) REFERENCES classes(id),
            FOREIGN KEY(subject_id) REFERENCES subjects(id),
            FOREIGN KEY(teacher_id) REFERENCES users(id),
            UNIQUE(class_id, subject_id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_class_subjects_class ON class_subjects(class_id, sort_order)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS subject_assessments(
            id TEXT PRIMARY KEY,
            class_subject_id TEXT NOT NULL,
            title TEXT NOT NULL,
            assessment_type TEXT NOT NULL,
            term INTEGER NOT NULL,
            total_marks REAL NOT NULL,
            FOREIGN KEY(class_subject_id) REFERENCES class_subjects(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_assessments_subject_term ON subject_assessments(class_subject_id, term)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS student_grades(
            id TEXT PRIMARY KEY,
            assessment_id TEXT NOT NULL,
            student_id TEXT NOT NULL,
            marks_obtained REAL NOT NULL,
            percentage REAL NOT NULL,
            updated_at TEXT,
            FOREIGN KEY(assessment_id) REFERENCES subject_assessments(id),
            FOREIGN KEY(student_id) REFERENCES users(id),
            UNIQUE(assessment_id, student_id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_grades_assessment ON student_grades(assessment_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS lessons(
            id TEXT PRIMARY KEY,
            class_subject_id TEXT NOT NULL,
            title TEXT NOT NULL,
            lesson_date TEXT,
            FOREIGN KEY(class_subject_id) REFERENCES class_subjects(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_lessons_subject ON lessons(class_subject_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS lesson_attendance(
            id TEXT PRIMARY KEY,
            lesson_id TEXT NOT NULL,
            student_id TEXT NOT NULL,
            status TEXT NOT NULL,
            FOREIGN KEY(lesson_id) REFERENCES lessons(id),
            FOREIGN KEY(student_id) REFERENCES users(id),
            UNIQUE(lesson_id, student_id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_attendance_lesson ON lesson_attendance(lesson_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS report_cards(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            class_id TEXT NOT NULL,
            form_id TEXT,
            academic_year TEXT NOT NULL,
            term INTEGER NOT NULL,
            status TEXT NOT NULL,
            overall_average REAL,
            class_rank INTEGER,
            attendance_percentage REAL,
            days_present INTEGER NOT NULL,
            days_absent INTEGER NOT NULL,
            days_late INTEGER NOT NULL,
            total_school_days INTEGER NOT NULL,
            conduct_grade TEXT,
            form_teacher_comment TEXT,
            principal_comment TEXT,
            next_term_begins TEXT,
            generated_by TEXT,
            published_by TEXT,
            published_at TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            FOREIGN KEY(student_id) REFERENCES users(id),
            FOREIGN KEY(class_id) REFERENCES classes(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE UNIQUE INDEX IF NOT EXISTS idx_report_cards_cohort_student
         ON report_cards(class_id, academic_year, term, student_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_report_cards_student ON report_cards(student_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS report_card_grades(
            id TEXT PRIMARY KEY,
            report_card_id TEXT NOT NULL,
            subject_id TEXT,
            subject_name TEXT NOT NULL,
            teacher_id TEXT,
            teacher_name TEXT NOT NULL,
            coursework_avg REAL,
            exam_mark REAL,
            final_mark REAL,
            grade_letter TEXT NOT NULL,
            effort_grade TEXT,
            teacher_comment TEXT,
            updated_at TEXT,
            FOREIGN KEY(report_card_id) REFERENCES report_cards(id) ON DELETE CASCADE
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_report_card_grades_card ON report_card_grades(report_card_id)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_report_card_grades_teacher ON report_card_grades(teacher_id)",
        [],
    )?;

    Ok(())
}
