use et_frame::FrameError;
use et_groupby::GroupByError;
use et_io::IoError;
use et_join::JoinError;
use thiserror::Error;

use crate::tables::TablesError;

#[derive(Debug, Error)]
pub enum AggregateError {
    #[error("students table has duplicate student_id values: {ids:?}")]
    DuplicateStudents { ids: Vec<i64> },
    #[error("subjects table has duplicate subject_name values: {names:?}")]
    DuplicateSubjects { names: Vec<String> },
    #[error("cross product of {rows} rows exceeds the cap of {cap}")]
    CrossProductTooLarge { rows: usize, cap: usize },
    #[error("unknown engine {0:?} (expected typed, frame or sql)")]
    UnknownEngine(String),
    #[error("unknown output format {0:?} (expected table, csv or json)")]
    UnknownFormat(String),
    #[error(transparent)]
    Tables(#[from] TablesError),
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error(transparent)]
    GroupBy(#[from] GroupByError),
    #[error(transparent)]
    Join(#[from] JoinError),
    #[error(transparent)]
    Io(#[from] IoError),
    #[cfg(feature = "sql-sqlite")]
    #[error(transparent)]
    Sql(#[from] rusqlite::Error),
}
