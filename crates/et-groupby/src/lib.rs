#![forbid(unsafe_code)]

use std::collections::HashMap;

use et_columnar::{Column, ColumnError};
use et_frame::{DataFrame, FrameError};
use et_types::{DType, Scalar};
use thiserror::Error;

/// Name of the output column holding per-group row counts.
pub const COUNT_COLUMN: &str = "count";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupByOptions {
    pub dropna: bool,
}

impl Default for GroupByOptions {
    fn default() -> Self {
        Self { dropna: true }
    }
}

#[derive(Debug, Error)]
pub enum GroupByError {
    #[error("groupby requires at least one key column")]
    NoKeys,
    #[error("key column '{0}' collides with the count output column")]
    CountColumnCollision(String),
    #[error(transparent)]
    Frame(#[from] FrameError),
    #[error(transparent)]
    Column(#[from] ColumnError),
}

/// Count rows per distinct composite key.
///
/// Matches `df.groupby(by, sort=False, dropna=...).size().reset_index(name="count")`:
/// one output row per key in first-seen order, the key columns keep their
/// dtypes, and `count` is `Int64`. With `dropna` a row whose key has any null
/// component is skipped.
pub fn groupby_count(
    frame: &DataFrame,
    by: &[&str],
    options: GroupByOptions,
) -> Result<DataFrame, GroupByError> {
    if by.is_empty() {
        return Err(GroupByError::NoKeys);
    }
    if let Some(name) = by.iter().find(|name| **name == COUNT_COLUMN) {
        return Err(GroupByError::CountColumnCollision((*name).to_owned()));
    }

    let keys = by
        .iter()
        .map(|name| frame.require_column(name))
        .collect::<Result<Vec<_>, _>>()?;

    let (first_positions, counts) = match keys.as_slice() {
        [single] => try_count_dense_int64(single.values(), options.dropna)
            .unwrap_or_else(|| count_by_hash(&keys, frame.len(), options.dropna)),
        _ => count_by_hash(&keys, frame.len(), options.dropna),
    };

    #[cfg(feature = "tracing")]
    tracing::debug!(
        rows = frame.len(),
        groups = first_positions.len(),
        "groupby_count"
    );

    let mut named = Vec::with_capacity(by.len() + 1);
    for (name, column) in by.iter().zip(&keys) {
        named.push(((*name).to_owned(), column.take(&first_positions)?));
    }
    let count_values = counts
        .into_iter()
        .map(|count| Scalar::Int64(i64::try_from(count).unwrap_or(i64::MAX)))
        .collect();
    named.push((COUNT_COLUMN.to_owned(), Column::new(DType::Int64, count_values)?));

    Ok(DataFrame::from_columns(named)?)
}

/// Generic path: borrowed composite keys in a hash map, so building the tally
/// never clones key strings.
fn count_by_hash(keys: &[&Column], rows: usize, dropna: bool) -> (Vec<usize>, Vec<usize>) {
    let mut first_positions = Vec::<usize>::new();
    let mut counts = Vec::<usize>::new();
    let mut slot = HashMap::<Vec<&Scalar>, usize>::new();

    for row in 0..rows {
        let key = keys
            .iter()
            .map(|column| &column.values()[row])
            .collect::<Vec<_>>();
        if dropna && key.iter().any(|part| part.is_missing()) {
            continue;
        }

        let group = *slot.entry(key).or_insert_with(|| {
            first_positions.push(row);
            counts.push(0);
            counts.len() - 1
        });
        counts[group] += 1;
    }

    (first_positions, counts)
}

const DENSE_INT_KEY_RANGE_LIMIT: i128 = 65_536;

/// Dense-bucket fast path for a single `Int64` key.
///
/// Falls back to the hash path unless every non-dropped key is `Int64` and
/// the key span is within a bounded range budget.
fn try_count_dense_int64(keys: &[Scalar], dropna: bool) -> Option<(Vec<usize>, Vec<usize>)> {
    let mut min_key = i64::MAX;
    let mut max_key = i64::MIN;
    let mut saw_int_key = false;

    for key in keys {
        match key {
            Scalar::Int64(v) => {
                saw_int_key = true;
                min_key = min_key.min(*v);
                max_key = max_key.max(*v);
            }
            Scalar::Null if dropna => continue,
            _ => return None,
        }
    }

    if !saw_int_key {
        return Some((Vec::new(), Vec::new()));
    }

    let span = i128::from(max_key) - i128::from(min_key) + 1;
    if span <= 0 || span > DENSE_INT_KEY_RANGE_LIMIT {
        return None;
    }

    let bucket_len = usize::try_from(span).ok()?;
    // bucket -> group ordinal, assigned on first sight
    let mut group_of = vec![usize::MAX; bucket_len];
    let mut first_positions = Vec::<usize>::new();
    let mut counts = Vec::<usize>::new();

    for (row, key) in keys.iter().enumerate() {
        let key = match key {
            Scalar::Int64(v) => *v,
            _ => continue,
        };

        let bucket = usize::try_from(i128::from(key) - i128::from(min_key)).ok()?;
        if group_of[bucket] == usize::MAX {
            group_of[bucket] = counts.len();
            first_positions.push(row);
            counts.push(0);
        }
        counts[group_of[bucket]] += 1;
    }

    Some((first_positions, counts))
}

#[cfg(test)]
mod tests {
    use et_columnar::Column;
    use et_frame::DataFrame;
    use et_types::{DType, Scalar};

    use super::{COUNT_COLUMN, GroupByError, GroupByOptions, groupby_count};

    fn exams(ids: Vec<Scalar>, subjects: Vec<Scalar>) -> DataFrame {
        DataFrame::from_columns(vec![
            ("student_id".to_owned(), Column::from_values(ids).expect("ids")),
            (
                "subject_name".to_owned(),
                Column::from_values(subjects).expect("subjects"),
            ),
        ])
        .expect("frame")
    }

    #[test]
    fn composite_keys_count_in_first_seen_order() {
        let df = exams(
            vec![
                Scalar::Int64(2),
                Scalar::Int64(1),
                Scalar::Int64(2),
                Scalar::Int64(1),
                Scalar::Int64(1),
            ],
            vec![
                Scalar::from("Math"),
                Scalar::from("Math"),
                Scalar::from("Math"),
                Scalar::from("Physics"),
                Scalar::from("Math"),
            ],
        );

        let out = groupby_count(
            &df,
            &["student_id", "subject_name"],
            GroupByOptions::default(),
        )
        .expect("groupby");

        assert_eq!(
            out.column_names(),
            &[
                "student_id".to_owned(),
                "subject_name".to_owned(),
                COUNT_COLUMN.to_owned()
            ]
        );
        assert_eq!(
            out.column("student_id").expect("ids").values(),
            &[Scalar::Int64(2), Scalar::Int64(1), Scalar::Int64(1)]
        );
        assert_eq!(
            out.column("subject_name").expect("subjects").values(),
            &[
                Scalar::from("Math"),
                Scalar::from("Math"),
                Scalar::from("Physics")
            ]
        );
        assert_eq!(
            out.column(COUNT_COLUMN).expect("count").values(),
            &[Scalar::Int64(2), Scalar::Int64(2), Scalar::Int64(1)]
        );
    }

    #[test]
    fn dense_int_path_preserves_first_seen_order() {
        let df = exams(
            vec![
                Scalar::Int64(10),
                Scalar::Int64(5),
                Scalar::Int64(10),
                Scalar::Int64(-2),
            ],
            vec![Scalar::from("a"); 4],
        );

        let out = groupby_count(&df, &["student_id"], GroupByOptions::default()).expect("groupby");
        assert_eq!(
            out.column("student_id").expect("ids").values(),
            &[Scalar::Int64(10), Scalar::Int64(5), Scalar::Int64(-2)]
        );
        assert_eq!(
            out.column(COUNT_COLUMN).expect("count").values(),
            &[Scalar::Int64(2), Scalar::Int64(1), Scalar::Int64(1)]
        );
    }

    #[test]
    fn wide_int_keys_fall_back_to_hash_path() {
        let df = exams(
            vec![Scalar::Int64(i64::MIN), Scalar::Int64(i64::MAX), Scalar::Int64(i64::MIN)],
            vec![Scalar::from("a"); 3],
        );

        let out = groupby_count(&df, &["student_id"], GroupByOptions::default()).expect("groupby");
        assert_eq!(
            out.column(COUNT_COLUMN).expect("count").values(),
            &[Scalar::Int64(2), Scalar::Int64(1)]
        );
    }

    #[test]
    fn null_keys_drop_by_default_and_group_when_kept() {
        let df = exams(
            vec![Scalar::Int64(1), Scalar::Null, Scalar::Int64(1)],
            vec![Scalar::from("Math"), Scalar::from("Math"), Scalar::from("Math")],
        );

        let dropped = groupby_count(
            &df,
            &["student_id", "subject_name"],
            GroupByOptions::default(),
        )
        .expect("groupby");
        assert_eq!(dropped.len(), 1);

        let kept = groupby_count(
            &df,
            &["student_id", "subject_name"],
            GroupByOptions { dropna: false },
        )
        .expect("groupby");
        assert_eq!(
            kept.column("student_id").expect("ids").values(),
            &[Scalar::Int64(1), Scalar::Null]
        );
        assert_eq!(
            kept.column(COUNT_COLUMN).expect("count").values(),
            &[Scalar::Int64(2), Scalar::Int64(1)]
        );
    }

    #[test]
    fn empty_frame_yields_typed_empty_groups() {
        let df = DataFrame::from_columns(vec![
            (
                "student_id".to_owned(),
                Column::new(DType::Int64, Vec::new()).expect("ids"),
            ),
            (
                "subject_name".to_owned(),
                Column::new(DType::Utf8, Vec::new()).expect("subjects"),
            ),
        ])
        .expect("frame");

        let out = groupby_count(
            &df,
            &["student_id", "subject_name"],
            GroupByOptions::default(),
        )
        .expect("groupby");
        assert!(out.is_empty());
        assert_eq!(out.column("student_id").expect("ids").dtype(), DType::Int64);
        assert_eq!(out.column(COUNT_COLUMN).expect("count").dtype(), DType::Int64);
    }

    #[test]
    fn rejects_empty_and_colliding_keys() {
        let df = exams(vec![Scalar::Int64(1)], vec![Scalar::from("a")]);
        assert!(matches!(
            groupby_count(&df, &[], GroupByOptions::default()),
            Err(GroupByError::NoKeys)
        ));
        assert!(matches!(
            groupby_count(&df, &["count"], GroupByOptions::default()),
            Err(GroupByError::CountColumnCollision(_))
        ));
    }
}
