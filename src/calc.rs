use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;

/// Share of the final mark carried by the coursework average when both parts exist.
pub const COURSEWORK_WEIGHT: f64 = 0.6;
/// Share of the final mark carried by the exam mark when both parts exist.
pub const EXAM_WEIGHT: f64 = 0.4;

/// Half-up 1-decimal rounding used for every stored mark and percentage:
/// `floor(10*x + 0.5) / 10`
pub fn round_off_1_decimal(x: f64) -> f64 {
    ((10.0 * x) + 0.5).floor() / 10.0
}

/// `num / den` as a percentage, rounded half-up to one decimal. Works in
/// whole tenths so exact halves such as 23/80 (28.75%) round up.
pub fn percent_1dp(num: i64, den: i64) -> Option<f64> {
    if den <= 0 || num < 0 {
        return None;
    }
    let tenths = (2000 * num + den) / (2 * den);
    Some(tenths as f64 / 10.0)
}

/// Arithmetic mean rounded to one decimal; `None` for an empty slice.
pub fn mean_1dp(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let sum: f64 = values.iter().sum();
    Some(round_off_1_decimal(sum / values.len() as f64))
}

/// Assessment types that feed the exam half of a subject mark. Everything
/// else is coursework.
pub fn is_exam_type(assessment_type: &str) -> bool {
    let t = assessment_type.trim();
    t.eq_ignore_ascii_case("EXAM") || t.eq_ignore_ascii_case("MOCK_EXAM")
}

/// Per-student, per-subject percentages split by assessment kind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubjectBucket {
    pub coursework: Vec<f64>,
    pub exam: Vec<f64>,
}

impl SubjectBucket {
    pub fn push(&mut self, assessment_type: &str, percentage: f64) {
        if is_exam_type(assessment_type) {
            self.exam.push(percentage);
        } else {
            self.coursework.push(percentage);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum LetterGrade {
    A,
    B,
    C,
    D,
    F,
}

impl LetterGrade {
    pub fn as_str(self) -> &'static str {
        match self {
            LetterGrade::A => "A",
            LetterGrade::B => "B",
            LetterGrade::C => "C",
            LetterGrade::D => "D",
            LetterGrade::F => "F",
        }
    }

    /// Step function over a final mark. Intervals are half-open at each
    /// threshold: 80.0 is an A, 79.9 a B.
    pub fn from_mark(mark: f64) -> Self {
        if mark >= 80.0 {
            LetterGrade::A
        } else if mark >= 70.0 {
            LetterGrade::B
        } else if mark >= 60.0 {
            LetterGrade::C
        } else if mark >= 50.0 {
            LetterGrade::D
        } else {
            LetterGrade::F
        }
    }
}

impl fmt::Display for LetterGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stored/wire form of an optional letter. An ungraded subject is the empty
/// string, which is what existing report-card rows already hold.
pub fn letter_marker(letter: Option<LetterGrade>) -> &'static str {
    letter.map(LetterGrade::as_str).unwrap_or("")
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectMark {
    pub coursework_avg: Option<f64>,
    pub exam_mark: Option<f64>,
    pub final_mark: Option<f64>,
    pub grade_letter: Option<LetterGrade>,
}

/// Combine the two halves of a subject. With both present the result is the
/// weighted blend, rounded; with one present it is that (already rounded)
/// value unchanged.
pub fn final_mark(coursework_avg: Option<f64>, exam_mark: Option<f64>) -> Option<f64> {
    match (coursework_avg, exam_mark) {
        (Some(cw), Some(ex)) => Some(round_off_1_decimal(
            cw * COURSEWORK_WEIGHT + ex * EXAM_WEIGHT,
        )),
        (Some(cw), None) => Some(cw),
        (None, Some(ex)) => Some(ex),
        (None, None) => None,
    }
}

pub fn subject_mark(bucket: &SubjectBucket) -> SubjectMark {
    let coursework_avg = mean_1dp(&bucket.coursework);
    let exam_mark = mean_1dp(&bucket.exam);
    let final_mark = final_mark(coursework_avg, exam_mark);
    SubjectMark {
        coursework_avg,
        exam_mark,
        final_mark,
        grade_letter: final_mark.map(LetterGrade::from_mark),
    }
}

/// Mean of the subjects that actually have a final mark. Subjects without
/// one are left out of both the sum and the count.
pub fn overall_average<I>(finals: I) -> Option<f64>
where
    I: IntoIterator<Item = Option<f64>>,
{
    let mut total = 0.0;
    let mut count: usize = 0;
    for v in finals.into_iter().flatten() {
        total += v;
        count += 1;
    }
    if count == 0 {
        None
    } else {
        Some(round_off_1_decimal(total / count as f64))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
    Excused,
    Sick,
}

impl AttendanceStatus {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "PRESENT" => Some(AttendanceStatus::Present),
            "ABSENT" => Some(AttendanceStatus::Absent),
            "LATE" => Some(AttendanceStatus::Late),
            "EXCUSED" => Some(AttendanceStatus::Excused),
            "SICK" => Some(AttendanceStatus::Sick),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AttendanceStatus::Present => "PRESENT",
            AttendanceStatus::Absent => "ABSENT",
            AttendanceStatus::Late => "LATE",
            AttendanceStatus::Excused => "EXCUSED",
            AttendanceStatus::Sick => "SICK",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceSummary {
    pub days_present: i64,
    pub days_absent: i64,
    pub days_late: i64,
    pub total_school_days: i64,
    pub attendance_percentage: Option<f64>,
}

/// Every row counts toward the total, including statuses this module does not
/// recognise. Late days count as attended for the percentage and are also
/// reported on their own.
pub fn attendance_summary<'a, I>(statuses: I) -> AttendanceSummary
where
    I: IntoIterator<Item = &'a str>,
{
    let mut out = AttendanceSummary::default();
    for raw in statuses {
        out.total_school_days += 1;
        match AttendanceStatus::parse(raw) {
            Some(AttendanceStatus::Present) => out.days_present += 1,
            Some(AttendanceStatus::Absent) => out.days_absent += 1,
            Some(AttendanceStatus::Late) => out.days_late += 1,
            _ => {}
        }
    }
    out.attendance_percentage =
        percent_1dp(out.days_present + out.days_late, out.total_school_days);
    out
}

/// Indices of `averages` in rank order: highest first, missing averages
/// sorted as 0. The sort is stable, so ties keep their input order.
pub fn rank_order(averages: &[Option<f64>]) -> Vec<usize> {
    let mut idx: Vec<usize> = (0..averages.len()).collect();
    idx.sort_by(|&a, &b| {
        let av = averages[a].unwrap_or(0.0);
        let bv = averages[b].unwrap_or(0.0);
        bv.partial_cmp(&av).unwrap_or(Ordering::Equal)
    });
    idx
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bucket(coursework: &[f64], exam: &[f64]) -> SubjectBucket {
        SubjectBucket {
            coursework: coursework.to_vec(),
            exam: exam.to_vec(),
        }
    }

    #[test]
    fn round_off_is_half_up() {
        assert_eq!(round_off_1_decimal(0.0), 0.0);
        assert_eq!(round_off_1_decimal(3.54), 3.5);
        assert_eq!(round_off_1_decimal(3.55), 3.6);
        assert_eq!(round_off_1_decimal(35.6818), 35.7);
        assert_eq!(round_off_1_decimal(66.666_666), 66.7);
    }

    #[test]
    fn exam_types_route_to_exam_bucket() {
        let mut b = SubjectBucket::default();
        b.push("EXAM", 80.0);
        b.push("MOCK_EXAM", 70.0);
        b.push("HOMEWORK", 90.0);
        b.push("QUIZ", 60.0);
        assert_eq!(b.exam, vec![80.0, 70.0]);
        assert_eq!(b.coursework, vec![90.0, 60.0]);
    }

    #[test]
    fn both_parts_blend_sixty_forty() {
        let m = subject_mark(&bucket(&[90.0], &[80.0]));
        assert_eq!(m.coursework_avg, Some(90.0));
        assert_eq!(m.exam_mark, Some(80.0));
        assert_eq!(m.final_mark, Some(86.0));
        assert_eq!(m.grade_letter, Some(LetterGrade::A));

        let m = subject_mark(&bucket(&[71.0, 72.0], &[55.5]));
        assert_eq!(m.coursework_avg, Some(71.5));
        assert_eq!(m.exam_mark, Some(55.5));
        assert_eq!(m.final_mark, Some(round_off_1_decimal(71.5 * 0.6 + 55.5 * 0.4)));
    }

    #[test]
    fn single_part_passes_through_unchanged() {
        let m = subject_mark(&bucket(&[66.0, 67.0, 67.0], &[]));
        assert_eq!(m.coursework_avg, Some(66.7));
        assert_eq!(m.final_mark, Some(66.7));
        assert_eq!(m.grade_letter, Some(LetterGrade::C));

        let m = subject_mark(&bucket(&[], &[45.25]));
        assert_eq!(m.exam_mark, Some(45.3));
        assert_eq!(m.final_mark, Some(45.3));
        assert_eq!(m.grade_letter, Some(LetterGrade::F));
    }

    #[test]
    fn empty_bucket_is_ungraded() {
        let m = subject_mark(&SubjectBucket::default());
        assert_eq!(m.coursework_avg, None);
        assert_eq!(m.exam_mark, None);
        assert_eq!(m.final_mark, None);
        assert_eq!(m.grade_letter, None);
        assert_eq!(letter_marker(m.grade_letter), "");
    }

    #[test]
    fn letter_boundaries_are_half_open() {
        assert_eq!(LetterGrade::from_mark(80.0), LetterGrade::A);
        assert_eq!(LetterGrade::from_mark(79.9), LetterGrade::B);
        assert_eq!(LetterGrade::from_mark(70.0), LetterGrade::B);
        assert_eq!(LetterGrade::from_mark(69.9), LetterGrade::C);
        assert_eq!(LetterGrade::from_mark(60.0), LetterGrade::C);
        assert_eq!(LetterGrade::from_mark(50.0), LetterGrade::D);
        assert_eq!(LetterGrade::from_mark(49.9), LetterGrade::F);
        assert_eq!(LetterGrade::from_mark(0.0), LetterGrade::F);
    }

    #[test]
    fn overall_average_skips_missing_subjects() {
        assert_eq!(overall_average([Some(80.0), None, Some(70.0)]), Some(75.0));
        assert_eq!(overall_average([Some(66.7), Some(70.0), Some(70.0)]), Some(68.9));
        assert_eq!(overall_average([None, None]), None);
        assert_eq!(overall_average(Vec::<Option<f64>>::new()), None);
    }

    #[test]
    fn attendance_counts_late_as_attended() {
        let s = attendance_summary(["PRESENT", "present", "Late", "ABSENT", "SICK", "EXCUSED"]);
        assert_eq!(s.days_present, 2);
        assert_eq!(s.days_late, 1);
        assert_eq!(s.days_absent, 1);
        assert_eq!(s.total_school_days, 6);
        assert_eq!(s.attendance_percentage, Some(50.0));

        let s = attendance_summary(["PRESENT", "PRESENT", "ABSENT"]);
        assert_eq!(s.attendance_percentage, Some(66.7));

        for (attended, total, expected) in [(23, 80, 28.8), (41, 80, 51.3), (51, 80, 63.8)] {
            let statuses: Vec<&str> = (0..total)
                .map(|i| if i < attended { "PRESENT" } else { "ABSENT" })
                .collect();
            let s = attendance_summary(statuses);
            assert_eq!(s.attendance_percentage, Some(expected), "{attended}/{total}");
        }
    }

    #[test]
    fn percent_rounds_exact_halves_up() {
        assert_eq!(percent_1dp(23, 80), Some(28.8));
        assert_eq!(percent_1dp(1, 8), Some(12.5));
        assert_eq!(percent_1dp(1, 16), Some(6.3));
        assert_eq!(percent_1dp(0, 5), Some(0.0));
        assert_eq!(percent_1dp(5, 5), Some(100.0));
        assert_eq!(percent_1dp(1, 0), None);
    }

    #[test]
    fn attendance_without_rows_has_no_percentage() {
        let s = attendance_summary(Vec::<&str>::new());
        assert_eq!(s.total_school_days, 0);
        assert_eq!(s.attendance_percentage, None);
    }

    #[test]
    fn rank_order_is_descending_with_missing_as_zero() {
        let order = rank_order(&[Some(70.0), None, Some(90.0), Some(90.0)]);
        assert_eq!(order, vec![2, 3, 0, 1]);
    }

    #[test]
    fn tied_top_averages_take_the_top_ranks() {
        let averages = [Some(90.0), Some(70.0), Some(90.0)];
        let order = rank_order(&averages);
        let rank_of = |i: usize| order.iter().position(|&x| x == i).unwrap() + 1;
        assert_ne!(rank_of(0), 3);
        assert_ne!(rank_of(2), 3);
        assert_eq!(rank_of(1), 3);
    }
}
