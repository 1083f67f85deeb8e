#![forbid(unsafe_code)]

use std::cmp::Ordering;
use std::collections::BTreeMap;

use et_columnar::{Column, ColumnError};
use et_index::{Index, IndexError};
use et_types::Scalar;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use et_index::IndexLabel;

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("index length ({index_len}) does not match column length ({column_len})")]
    LengthMismatch { index_len: usize, column_len: usize },
    #[error("column '{0}' not found")]
    MissingColumn(String),
    #[error("duplicate column name '{0}'")]
    DuplicateColumn(String),
    #[error("column order does not match the column set")]
    ColumnOrderMismatch,
    #[error(transparent)]
    Column(#[from] ColumnError),
    #[error(transparent)]
    Index(#[from] IndexError),
}

/// A row index plus named, equal-length columns in an explicit order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataFrame {
    index: Index,
    columns: BTreeMap<String, Column>,
    column_order: Vec<String>,
}

impl DataFrame {
    pub fn new(
        index: Index,
        columns: BTreeMap<String, Column>,
        column_order: Vec<String>,
    ) -> Result<Self, FrameError> {
        if column_order.len() != columns.len()
            || column_order.iter().any(|name| !columns.contains_key(name))
        {
            return Err(FrameError::ColumnOrderMismatch);
        }

        for column in columns.values() {
            if column.len() != index.len() {
                return Err(FrameError::LengthMismatch {
                    index_len: index.len(),
                    column_len: column.len(),
                });
            }
        }

        Ok(Self {
            index,
            columns,
            column_order,
        })
    }

    /// Build a frame with a `0..n` row index from columns in the given order.
    pub fn from_columns(named: Vec<(String, Column)>) -> Result<Self, FrameError> {
        let len = named.first().map_or(0, |(_, column)| column.len());
        let mut columns = BTreeMap::new();
        let mut column_order = Vec::with_capacity(named.len());

        for (name, column) in named {
            if columns.contains_key(&name) {
                return Err(FrameError::DuplicateColumn(name));
            }
            column_order.push(name.clone());
            columns.insert(name, column);
        }

        Self::new(Index::range(len)?, columns, column_order)
    }

    #[must_use]
    pub fn index(&self) -> &Index {
        &self.index
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    #[must_use]
    pub fn num_columns(&self) -> usize {
        self.column_order.len()
    }

    #[must_use]
    pub fn column_names(&self) -> &[String] {
        &self.column_order
    }

    #[must_use]
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.get(name)
    }

    pub fn require_column(&self, name: &str) -> Result<&Column, FrameError> {
        self.columns
            .get(name)
            .ok_or_else(|| FrameError::MissingColumn(name.to_owned()))
    }

    /// Columns in frame order.
    pub fn columns(&self) -> impl Iterator<Item = (&str, &Column)> {
        self.column_order
            .iter()
            .filter_map(|name| self.columns.get(name).map(|column| (name.as_str(), column)))
    }

    /// The values of row `position`, in column order.
    #[must_use]
    pub fn row(&self, position: usize) -> Option<Vec<&Scalar>> {
        if position >= self.len() {
            return None;
        }
        self.columns()
            .map(|(_, column)| column.value(position))
            .collect()
    }

    /// Return a new frame with only the named columns, in the given order.
    pub fn select_columns(&self, names: &[&str]) -> Result<Self, FrameError> {
        let mut columns = BTreeMap::new();
        let mut column_order = Vec::with_capacity(names.len());
        for &name in names {
            let column = self.require_column(name)?;
            if columns.insert(name.to_owned(), column.clone()).is_some() {
                return Err(FrameError::DuplicateColumn(name.to_owned()));
            }
            column_order.push(name.to_owned());
        }
        Self::new(self.index.clone(), columns, column_order)
    }

    pub fn rename_column(&self, from: &str, to: &str) -> Result<Self, FrameError> {
        if from != to && self.columns.contains_key(to) {
            return Err(FrameError::DuplicateColumn(to.to_owned()));
        }
        let mut columns = self.columns.clone();
        let column = columns
            .remove(from)
            .ok_or_else(|| FrameError::MissingColumn(from.to_owned()))?;
        columns.insert(to.to_owned(), column);

        let column_order = self
            .column_order
            .iter()
            .map(|name| if name == from { to.to_owned() } else { name.clone() })
            .collect();
        Self::new(self.index.clone(), columns, column_order)
    }

    /// Insert or replace a column; new names are appended to the order.
    pub fn with_column(&self, name: &str, column: Column) -> Result<Self, FrameError> {
        let mut columns = self.columns.clone();
        let mut column_order = self.column_order.clone();
        if columns.insert(name.to_owned(), column).is_none() {
            column_order.push(name.to_owned());
        }
        Self::new(self.index.clone(), columns, column_order)
    }

    /// Gather rows by position; index labels travel with their rows.
    pub fn take_rows(&self, positions: &[usize]) -> Result<Self, FrameError> {
        let index = self.index.take(positions)?;
        let mut columns = BTreeMap::new();
        for (name, column) in &self.columns {
            columns.insert(name.clone(), column.take(positions)?);
        }
        Self::new(index, columns, self.column_order.clone())
    }

    /// Fill nulls in one column with `fill_value`.
    ///
    /// Matches `df[name] = df[name].fillna(value)`.
    pub fn fillna_column(&self, name: &str, fill_value: &Scalar) -> Result<Self, FrameError> {
        let column = self.require_column(name)?;
        #[cfg(feature = "tracing")]
        tracing::debug!(column = name, nulls = column.null_count(), "fillna_column");
        let filled = column.fillna(fill_value)?;
        self.with_column(name, filled)
    }

    /// Return a new frame sorted by one or more columns.
    ///
    /// Matches `df.sort_values(by=[...], ascending=..., kind="stable")` with
    /// `na_position='last'`. Ties on every key keep their input order.
    pub fn sort_values(&self, by: &[&str], ascending: bool) -> Result<Self, FrameError> {
        let keys = by
            .iter()
            .map(|name| self.require_column(name))
            .collect::<Result<Vec<_>, _>>()?;

        let mut order = (0..self.len()).collect::<Vec<_>>();
        order.sort_by(|&left_pos, &right_pos| {
            keys.iter()
                .map(|column| {
                    compare_scalars_with_na_last(
                        &column.values()[left_pos],
                        &column.values()[right_pos],
                        ascending,
                    )
                })
                .find(|ordering| ordering.is_ne())
                .unwrap_or(Ordering::Equal)
        });

        #[cfg(feature = "tracing")]
        tracing::debug!(rows = self.len(), keys = by.len(), "sort_values");

        self.take_rows(&order)
    }
}

fn compare_non_missing_scalars_for_sort(left: &Scalar, right: &Scalar) -> Ordering {
    match (left, right) {
        (Scalar::Bool(lhs), Scalar::Bool(rhs)) => lhs.cmp(rhs),
        (Scalar::Int64(lhs), Scalar::Int64(rhs)) => lhs.cmp(rhs),
        (Scalar::Utf8(lhs), Scalar::Utf8(rhs)) => lhs.cmp(rhs),
        // Columns are dtype-homogeneous; mixed pairs only order by dtype.
        _ => left.dtype().cmp(&right.dtype()),
    }
}

fn compare_scalars_with_na_last(left: &Scalar, right: &Scalar, ascending: bool) -> Ordering {
    match (left.is_missing(), right.is_missing()) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => {
            let order = compare_non_missing_scalars_for_sort(left, right);
            if ascending { order } else { order.reverse() }
        }
    }
}
