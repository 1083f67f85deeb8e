use et_frame::DataFrame;
use et_groupby::{COUNT_COLUMN, GroupByOptions, groupby_count};
use et_join::{JoinType, cross_join, merge};
use et_types::Scalar;

use crate::error::AggregateError;
use crate::model::{AttendanceRecord, Examination, Student, Subject};
use crate::tables::{
    ATTENDED_EXAMS, STUDENT_ID, STUDENT_NAME, SUBJECT_NAME, examinations_frame, records_from_frame,
    students_frame, subjects_frame,
};

pub fn aggregate_frame(
    students: &[Student],
    subjects: &[Subject],
    examinations: &[Examination],
) -> Result<Vec<AttendanceRecord>, AggregateError> {
    let out = aggregate_frames(
        &students_frame(students)?,
        &subjects_frame(subjects)?,
        &examinations_frame(examinations)?,
    )?;
    Ok(records_from_frame(&out)?)
}

/// The attendance pipeline over frames.
///
/// Equivalent to
/// `students.merge(subjects, how="cross").merge(exams.groupby([...]).size(), how="left")`
/// followed by `fillna(0)` and a sort on `student_id, subject_name`. The
/// output columns are `student_id, student_name, subject_name,
/// attended_exams`.
pub fn aggregate_frames(
    students: &DataFrame,
    subjects: &DataFrame,
    examinations: &DataFrame,
) -> Result<DataFrame, AggregateError> {
    let keys = [STUDENT_ID, SUBJECT_NAME];

    let pairs = cross_join(students, subjects)?;
    let tally = groupby_count(examinations, &keys, GroupByOptions::default())?;
    let merged = merge(&pairs, &tally, &keys, JoinType::Left)?;

    #[cfg(feature = "tracing")]
    tracing::debug!(
        pairs = pairs.len(),
        tally_keys = tally.len(),
        merged = merged.len(),
        "frame engine"
    );

    let out = merged
        .fillna_column(COUNT_COLUMN, &Scalar::Int64(0))?
        .rename_column(COUNT_COLUMN, ATTENDED_EXAMS)?
        .sort_values(&keys, true)?
        .select_columns(&[STUDENT_ID, STUDENT_NAME, SUBJECT_NAME, ATTENDED_EXAMS])?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use et_types::{DType, Scalar};

    use super::{aggregate_frame, aggregate_frames};
    use crate::model::{Examination, Student, Subject};
    use crate::tables::{examinations_frame, students_frame, subjects_frame};

    #[test]
    fn pipeline_fills_unmatched_pairs_with_zero() {
        let students = students_frame(&[Student::new(2, "Bob"), Student::new(1, "Alice")])
            .expect("students");
        let subjects = subjects_frame(&[Subject::new("Physics"), Subject::new("Math")])
            .expect("subjects");
        let exams = examinations_frame(&[
            Examination::new(1, "Math"),
            Examination::new(1, "Math"),
            Examination::new(2, "Math"),
        ])
        .expect("exams");

        let out = aggregate_frames(&students, &subjects, &exams).expect("pipeline");
        assert_eq!(
            out.column_names(),
            &[
                "student_id".to_owned(),
                "student_name".to_owned(),
                "subject_name".to_owned(),
                "attended_exams".to_owned()
            ]
        );
        let counts = out.column("attended_exams").expect("counts");
        assert_eq!(counts.dtype(), DType::Int64);
        assert_eq!(
            counts.values(),
            &[
                Scalar::Int64(2),
                Scalar::Int64(0),
                Scalar::Int64(1),
                Scalar::Int64(0)
            ]
        );
        assert_eq!(counts.null_count(), 0);
    }

    #[test]
    fn empty_examinations_still_enumerate_every_pair() {
        let records = aggregate_frame(
            &[Student::new(1, "Alice")],
            &[Subject::new("Math"), Subject::new("Art")],
            &[],
        )
        .expect("records");
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|record| record.attended_exams == 0));
        assert_eq!(records[0].subject_name, "Art");
    }

    #[test]
    fn empty_dimension_yields_no_rows() {
        let records = aggregate_frame(&[], &[Subject::new("Math")], &[Examination::new(1, "Math")])
            .expect("records");
        assert!(records.is_empty());
    }
}
