#![forbid(unsafe_code)]

use std::collections::{HashMap, HashSet};

use et_columnar::{Column, ColumnError};
use et_frame::{DataFrame, FrameError};
use et_types::Scalar;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinType {
    Inner,
    Left,
}

#[derive(Debug, Error)]
pub enum JoinError {
    #[error("column '{0}' exists on both sides of the join")]
    ColumnCollision(String),
    #[error("merge requires at least one key column")]
    NoKeys,
    #[error("cross join of {left} x {right} rows overflows usize")]
    CardinalityOverflow { left: usize, right: usize },
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error(transparent)]
    Column(#[from] ColumnError),
}

/// Pair every left row with every right row, left-major.
///
/// Matches `left.merge(right, how="cross")` except that overlapping column
/// names are rejected instead of suffixed.
pub fn cross_join(left: &DataFrame, right: &DataFrame) -> Result<DataFrame, JoinError> {
    if let Some(name) = right
        .column_names()
        .iter()
        .find(|name| left.column(name).is_some())
    {
        return Err(JoinError::ColumnCollision(name.clone()));
    }

    let rows = left
        .len()
        .checked_mul(right.len())
        .ok_or(JoinError::CardinalityOverflow {
            left: left.len(),
            right: right.len(),
        })?;

    let mut left_positions = Vec::with_capacity(rows);
    let mut right_positions = Vec::with_capacity(rows);
    for left_pos in 0..left.len() {
        for right_pos in 0..right.len() {
            left_positions.push(left_pos);
            right_positions.push(right_pos);
        }
    }

    #[cfg(feature = "tracing")]
    tracing::debug!(left = left.len(), right = right.len(), rows, "cross_join");

    let mut named = Vec::with_capacity(left.num_columns() + right.num_columns());
    for (name, column) in left.columns() {
        named.push((name.to_owned(), column.take(&left_positions)?));
    }
    for (name, column) in right.columns() {
        named.push((name.to_owned(), column.take(&right_positions)?));
    }

    Ok(DataFrame::from_columns(named)?)
}

/// Hash merge on equal-named key columns.
///
/// The right side is hashed once and looked up for each left row; left order is
/// preserved and each left row expands to one output row per right match. A
/// key with any null component never matches. `JoinType::Left` keeps unmatched
/// left rows with nulls in the right-only columns. Key columns appear once,
/// taken from the left side.
pub fn merge(
    left: &DataFrame,
    right: &DataFrame,
    on: &[&str],
    join_type: JoinType,
) -> Result<DataFrame, JoinError> {
    if on.is_empty() {
        return Err(JoinError::NoKeys);
    }

    let left_keys = key_columns(left, on)?;
    let right_keys = key_columns(right, on)?;

    let key_set = on.iter().copied().collect::<HashSet<_>>();
    let right_payload = right
        .columns()
        .filter(|(name, _)| !key_set.contains(name))
        .collect::<Vec<_>>();
    if let Some((name, _)) = right_payload
        .iter()
        .find(|(name, _)| left.column(name).is_some())
    {
        return Err(JoinError::ColumnCollision((*name).to_owned()));
    }

    let mut right_map = HashMap::<Vec<&Scalar>, Vec<usize>>::new();
    for right_pos in 0..right.len() {
        if let Some(key) = row_key(&right_keys, right_pos) {
            right_map.entry(key).or_default().push(right_pos);
        }
    }

    let mut left_positions = Vec::<usize>::new();
    let mut right_positions = Vec::<Option<usize>>::new();
    for left_pos in 0..left.len() {
        let found = row_key(&left_keys, left_pos).and_then(|key| right_map.get(&key));
        match found {
            Some(matches) => {
                for right_pos in matches {
                    left_positions.push(left_pos);
                    right_positions.push(Some(*right_pos));
                }
            }
            None if matches!(join_type, JoinType::Left) => {
                left_positions.push(left_pos);
                right_positions.push(None);
            }
            None => {}
        }
    }

    #[cfg(feature = "tracing")]
    tracing::debug!(
        left = left.len(),
        right = right.len(),
        rows = left_positions.len(),
        ?join_type,
        "merge"
    );

    let mut named = Vec::with_capacity(left.num_columns() + right_payload.len());
    for (name, column) in left.columns() {
        named.push((name.to_owned(), column.take(&left_positions)?));
    }
    for (name, column) in right_payload {
        named.push((
            name.to_owned(),
            column.reindex_by_positions(&right_positions)?,
        ));
    }

    Ok(DataFrame::from_columns(named)?)
}

fn key_columns<'a>(frame: &'a DataFrame, on: &[&str]) -> Result<Vec<&'a Column>, JoinError> {
    on.iter()
        .map(|name| frame.require_column(name).map_err(JoinError::from))
        .collect()
}

fn row_key<'a>(keys: &[&'a Column], row: usize) -> Option<Vec<&'a Scalar>> {
    keys.iter()
        .map(|column| column.value(row).filter(|value| !value.is_missing()))
        .collect()
}
