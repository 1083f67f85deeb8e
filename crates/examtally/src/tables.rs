use std::path::Path;

use et_columnar::{Column, ColumnError};
use et_frame::{DataFrame, FrameError};
use et_io::{CsvReadOptions, IoError, read_csv_path, read_csv_str};
use et_types::{DType, Scalar};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{AttendanceRecord, Examination, Student, Subject};

pub const STUDENT_ID: &str = "student_id";
pub const STUDENT_NAME: &str = "student_name";
pub const SUBJECT_NAME: &str = "subject_name";
pub const ATTENDED_EXAMS: &str = "attended_exams";

pub const STUDENTS_FILE: &str = "students.csv";
pub const SUBJECTS_FILE: &str = "subjects.csv";
pub const EXAMINATIONS_FILE: &str = "examinations.csv";

#[derive(Debug, Error)]
pub enum TablesError {
    #[error("{table}.{column} row {row}: {detail}")]
    InvalidValue {
        table: &'static str,
        column: &'static str,
        row: usize,
        detail: String,
    },
    #[error(transparent)]
    Io(#[from] IoError),
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error(transparent)]
    Column(#[from] ColumnError),
}

/// The three input tables of one aggregation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tables {
    pub students: Vec<Student>,
    pub subjects: Vec<Subject>,
    pub examinations: Vec<Examination>,
}

impl Tables {
    #[must_use]
    pub fn new(
        students: Vec<Student>,
        subjects: Vec<Subject>,
        examinations: Vec<Examination>,
    ) -> Self {
        Self {
            students,
            subjects,
            examinations,
        }
    }

    pub fn from_frames(
        students: &DataFrame,
        subjects: &DataFrame,
        examinations: &DataFrame,
    ) -> Result<Self, TablesError> {
        Ok(Self {
            students: students_from_frame(students)?,
            subjects: subjects_from_frame(subjects)?,
            examinations: examinations_from_frame(examinations)?,
        })
    }

    /// Parse the three tables from CSV text. Name columns are read verbatim,
    /// surrounding whitespace included, so a subject called `007` stays text.
    pub fn from_csv_strs(
        students: &str,
        subjects: &str,
        examinations: &str,
    ) -> Result<Self, TablesError> {
        let options = csv_options();
        Self::from_frames(
            &read_csv_str(students, &options)?,
            &read_csv_str(subjects, &options)?,
            &read_csv_str(examinations, &options)?,
        )
    }

    pub fn from_paths(
        students: &Path,
        subjects: &Path,
        examinations: &Path,
    ) -> Result<Self, TablesError> {
        let options = csv_options();
        Self::from_frames(
            &read_csv_path(students, &options)?,
            &read_csv_path(subjects, &options)?,
            &read_csv_path(examinations, &options)?,
        )
    }

    /// Load `students.csv`, `subjects.csv` and `examinations.csv` from `dir`.
    pub fn from_dir(dir: &Path) -> Result<Self, TablesError> {
        Self::from_paths(
            &dir.join(STUDENTS_FILE),
            &dir.join(SUBJECTS_FILE),
            &dir.join(EXAMINATIONS_FILE),
        )
    }
}

fn csv_options() -> CsvReadOptions {
    CsvReadOptions::with_utf8_columns(&[STUDENT_NAME, SUBJECT_NAME])
}

pub fn students_frame(students: &[Student]) -> Result<DataFrame, TablesError> {
    let ids = students.iter().map(|s| Scalar::Int64(s.student_id)).collect();
    let names = students
        .iter()
        .map(|s| Scalar::Utf8(s.student_name.clone()))
        .collect();
    Ok(DataFrame::from_columns(vec![
        (STUDENT_ID.to_owned(), Column::new(DType::Int64, ids)?),
        (STUDENT_NAME.to_owned(), Column::new(DType::Utf8, names)?),
    ])?)
}

pub fn subjects_frame(subjects: &[Subject]) -> Result<DataFrame, TablesError> {
    let names = subjects
        .iter()
        .map(|s| Scalar::Utf8(s.subject_name.clone()))
        .collect();
    Ok(DataFrame::from_columns(vec![(
        SUBJECT_NAME.to_owned(),
        Column::new(DType::Utf8, names)?,
    )])?)
}

pub fn examinations_frame(examinations: &[Examination]) -> Result<DataFrame, TablesError> {
    let ids = examinations
        .iter()
        .map(|e| Scalar::Int64(e.student_id))
        .collect();
    let names = examinations
        .iter()
        .map(|e| Scalar::Utf8(e.subject_name.clone()))
        .collect();
    Ok(DataFrame::from_columns(vec![
        (STUDENT_ID.to_owned(), Column::new(DType::Int64, ids)?),
        (SUBJECT_NAME.to_owned(), Column::new(DType::Utf8, names)?),
    ])?)
}

pub fn records_frame(records: &[AttendanceRecord]) -> Result<DataFrame, TablesError> {
    let mut ids = Vec::with_capacity(records.len());
    let mut students = Vec::with_capacity(records.len());
    let mut subjects = Vec::with_capacity(records.len());
    let mut counts = Vec::with_capacity(records.len());
    for record in records {
        ids.push(Scalar::Int64(record.student_id));
        students.push(Scalar::Utf8(record.student_name.clone()));
        subjects.push(Scalar::Utf8(record.subject_name.clone()));
        counts.push(Scalar::Int64(
            i64::try_from(record.attended_exams).unwrap_or(i64::MAX),
        ));
    }
    Ok(DataFrame::from_columns(vec![
        (STUDENT_ID.to_owned(), Column::new(DType::Int64, ids)?),
        (STUDENT_NAME.to_owned(), Column::new(DType::Utf8, students)?),
        (SUBJECT_NAME.to_owned(), Column::new(DType::Utf8, subjects)?),
        (ATTENDED_EXAMS.to_owned(), Column::new(DType::Int64, counts)?),
    ])?)
}

pub fn students_from_frame(frame: &DataFrame) -> Result<Vec<Student>, TablesError> {
    let ids = frame.require_column(STUDENT_ID)?;
    let names = frame.require_column(STUDENT_NAME)?;
    (0..frame.len())
        .map(|row| -> Result<Student, TablesError> {
            Ok(Student::new(
                int_cell("students", STUDENT_ID, ids, row)?,
                text_cell("students", STUDENT_NAME, names, row)?,
            ))
        })
        .collect()
}

pub fn subjects_from_frame(frame: &DataFrame) -> Result<Vec<Subject>, TablesError> {
    let names = frame.require_column(SUBJECT_NAME)?;
    (0..frame.len())
        .map(|row| -> Result<Subject, TablesError> {
            Ok(Subject::new(text_cell("subjects", SUBJECT_NAME, names, row)?))
        })
        .collect()
}

pub fn examinations_from_frame(frame: &DataFrame) -> Result<Vec<Examination>, TablesError> {
    let ids = frame.require_column(STUDENT_ID)?;
    let names = frame.require_column(SUBJECT_NAME)?;
    (0..frame.len())
        .map(|row| -> Result<Examination, TablesError> {
            Ok(Examination::new(
                int_cell("examinations", STUDENT_ID, ids, row)?,
                text_cell("examinations", SUBJECT_NAME, names, row)?,
            ))
        })
        .collect()
}

/// Read an attendance frame back into records. `attended_exams` must be a
/// non-negative integer on every row.
pub fn records_from_frame(frame: &DataFrame) -> Result<Vec<AttendanceRecord>, TablesError> {
    let ids = frame.require_column(STUDENT_ID)?;
    let students = frame.require_column(STUDENT_NAME)?;
    let subjects = frame.require_column(SUBJECT_NAME)?;
    let counts = frame.require_column(ATTENDED_EXAMS)?;
    (0..frame.len())
        .map(|row| -> Result<AttendanceRecord, TablesError> {
            let count = int_cell("attendance", ATTENDED_EXAMS, counts, row)?;
            let attended_exams = u64::try_from(count).map_err(|_| TablesError::InvalidValue {
                table: "attendance",
                column: ATTENDED_EXAMS,
                row,
                detail: format!("negative count {count}"),
            })?;
            Ok(AttendanceRecord {
                student_id: int_cell("attendance", STUDENT_ID, ids, row)?,
                student_name: text_cell("attendance", STUDENT_NAME, students, row)?,
                subject_name: text_cell("attendance", SUBJECT_NAME, subjects, row)?,
                attended_exams,
            })
        })
        .collect()
}

fn cell<'a>(
    table: &'static str,
    column: &'static str,
    values: &'a Column,
    row: usize,
) -> Result<&'a Scalar, TablesError> {
    match values.value(row) {
        Some(Scalar::Null) | None => Err(TablesError::InvalidValue {
            table,
            column,
            row,
            detail: "missing value".to_owned(),
        }),
        Some(value) => Ok(value),
    }
}

fn int_cell(
    table: &'static str,
    column: &'static str,
    values: &Column,
    row: usize,
) -> Result<i64, TablesError> {
    match cell(table, column, values, row)? {
        Scalar::Int64(v) => Ok(*v),
        other => Err(TablesError::InvalidValue {
            table,
            column,
            row,
            detail: format!("expected an integer, found {other:?}"),
        }),
    }
}

fn text_cell(
    table: &'static str,
    column: &'static str,
    values: &Column,
    row: usize,
) -> Result<String, TablesError> {
    match cell(table, column, values, row)? {
        Scalar::Utf8(v) => Ok(v.clone()),
        other => Err(TablesError::InvalidValue {
            table,
            column,
            row,
            detail: format!("expected text, found {other:?}"),
        }),
    }
}
