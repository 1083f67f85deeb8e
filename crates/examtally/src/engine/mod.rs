use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::aggregate::aggregate;
use crate::error::AggregateError;
use crate::model::{AttendanceRecord, Examination, Student, Subject};

pub mod frame;
#[cfg(feature = "sql-sqlite")]
pub mod sql;

/// One rendering of the attendance aggregation. Every engine returns the
/// same records for the same tables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Engine {
    /// Hash-map tally looked up by the students × subjects product.
    #[default]
    Typed,
    /// Cross join, group count, left merge and fillna over `DataFrame`s.
    Frame,
    /// The canonical query against an in-memory SQLite database.
    #[cfg(feature = "sql-sqlite")]
    Sql,
}

impl Engine {
    #[must_use]
    pub fn all() -> &'static [Self] {
        &[
            Self::Typed,
            Self::Frame,
            #[cfg(feature = "sql-sqlite")]
            Self::Sql,
        ]
    }

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Typed => "typed",
            Self::Frame => "frame",
            #[cfg(feature = "sql-sqlite")]
            Self::Sql => "sql",
        }
    }

    pub fn run(
        self,
        students: &[Student],
        subjects: &[Subject],
        examinations: &[Examination],
    ) -> Result<Vec<AttendanceRecord>, AggregateError> {
        match self {
            Self::Typed => Ok(aggregate(students, subjects, examinations)),
            Self::Frame => frame::aggregate_frame(students, subjects, examinations),
            #[cfg(feature = "sql-sqlite")]
            Self::Sql => sql::aggregate_sql(students, subjects, examinations),
        }
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Engine {
    type Err = AggregateError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::all()
            .iter()
            .copied()
            .find(|engine| engine.name() == value)
            .ok_or_else(|| AggregateError::UnknownEngine(value.to_owned()))
    }
}
