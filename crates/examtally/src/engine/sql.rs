use rusqlite::Connection;

use et_frame::DataFrame;
use et_io::{read_sql, write_sql};

use crate::error::AggregateError;
use crate::model::{AttendanceRecord, Examination, Student, Subject};
use crate::tables::{examinations_frame, records_from_frame, students_frame, subjects_frame};

/// Cross product of students and subjects, left-joined to the exam rows.
/// `COUNT(e.subject_name)` ignores the null produced for unmatched pairs, so
/// those count as zero.
pub const ATTENDANCE_QUERY: &str = "\
SELECT s.student_id, s.student_name, sub.subject_name, \
COUNT(e.subject_name) AS attended_exams \
FROM Students s \
CROSS JOIN Subjects sub \
LEFT JOIN Examinations e \
ON s.student_id = e.student_id AND sub.subject_name = e.subject_name \
GROUP BY s.student_id, s.student_name, sub.subject_name \
ORDER BY s.student_id, sub.subject_name";

pub fn aggregate_sql(
    students: &[Student],
    subjects: &[Subject],
    examinations: &[Examination],
) -> Result<Vec<AttendanceRecord>, AggregateError> {
    let mut conn = Connection::open_in_memory()?;
    let out = query_attendance(
        &mut conn,
        &students_frame(students)?,
        &subjects_frame(subjects)?,
        &examinations_frame(examinations)?,
    )?;
    Ok(records_from_frame(&out)?)
}

/// Load the three frames as `Students`, `Subjects` and `Examinations` and run
/// [`ATTENDANCE_QUERY`].
pub fn query_attendance(
    conn: &mut Connection,
    students: &DataFrame,
    subjects: &DataFrame,
    examinations: &DataFrame,
) -> Result<DataFrame, AggregateError> {
    write_sql(conn, "Students", students)?;
    write_sql(conn, "Subjects", subjects)?;
    write_sql(conn, "Examinations", examinations)?;

    let out = read_sql(conn, ATTENDANCE_QUERY)?;

    #[cfg(feature = "tracing")]
    tracing::debug!(rows = out.len(), "sql engine");

    Ok(out)
}
