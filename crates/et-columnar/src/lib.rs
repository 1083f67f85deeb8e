#![forbid(unsafe_code)]

use et_types::{DType, Scalar, TypeError, cast_scalar, common_dtype, infer_dtype};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidityMask {
    bits: Vec<bool>,
}

impl ValidityMask {
    #[must_use]
    pub fn from_values(values: &[Scalar]) -> Self {
        let bits = values.iter().map(|value| !value.is_missing()).collect();
        Self { bits }
    }

    #[must_use]
    pub fn count_invalid(&self) -> usize {
        self.bits.iter().filter(|bit| !**bit).count()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    dtype: DType,
    values: Vec<Scalar>,
    validity: ValidityMask,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ColumnError {
    #[error("column position {position} out of bounds for length {len}")]
    PositionOutOfBounds { position: usize, len: usize },
    #[error(transparent)]
    Type(#[from] TypeError),
}

impl Column {
    /// Construct a column, coercing values to the target dtype.
    /// Values that already carry `dtype` are moved through without a cast.
    pub fn new(dtype: DType, values: Vec<Scalar>) -> Result<Self, ColumnError> {
        let needs_coercion = values.iter().any(|v| {
            let d = v.dtype();
            d != dtype && d != DType::Null
        });

        let coerced = if needs_coercion {
            values
                .into_iter()
                .map(|value| cast_scalar(value, dtype))
                .collect::<Result<Vec<_>, _>>()?
        } else {
            values
        };

        let validity = ValidityMask::from_values(&coerced);

        Ok(Self {
            dtype,
            values: coerced,
            validity,
        })
    }

    pub fn from_values(values: Vec<Scalar>) -> Result<Self, ColumnError> {
        let dtype = infer_dtype(&values)?;
        Self::new(dtype, values)
    }

    #[must_use]
    pub fn dtype(&self) -> DType {
        self.dtype
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[must_use]
    pub fn values(&self) -> &[Scalar] {
        &self.values
    }

    #[must_use]
    pub fn value(&self, idx: usize) -> Option<&Scalar> {
        self.values.get(idx)
    }

    #[must_use]
    pub fn null_count(&self) -> usize {
        self.validity.count_invalid()
    }

    /// Gather rows by optional position; `None` slots become nulls.
    pub fn reindex_by_positions(&self, positions: &[Option<usize>]) -> Result<Self, ColumnError> {
        let values = positions
            .iter()
            .map(|slot| match slot {
                Some(idx) => self.values.get(*idx).cloned().unwrap_or(Scalar::Null),
                None => Scalar::Null,
            })
            .collect::<Vec<_>>();

        Self::new(self.dtype, values)
    }

    /// Gather rows by position. Unlike `reindex_by_positions`, an out-of-range
    /// position is an error rather than a null.
    pub fn take(&self, positions: &[usize]) -> Result<Self, ColumnError> {
        let values = positions
            .iter()
            .map(|&position| {
                self.values
                    .get(position)
                    .cloned()
                    .ok_or(ColumnError::PositionOutOfBounds {
                        position,
                        len: self.len(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Self::new(self.dtype, values)
    }

    /// Replace every null with `fill_value`.
    ///
    /// The output dtype is the common dtype of the column and the fill value,
    /// so an all-null column produced by an unmatched left join adopts the
    /// dtype of the fill.
    pub fn fillna(&self, fill_value: &Scalar) -> Result<Self, ColumnError> {
        let out_dtype = common_dtype(self.dtype, fill_value.dtype())?;
        let values = self
            .values
            .iter()
            .map(|value| {
                if value.is_missing() {
                    fill_value.clone()
                } else {
                    value.clone()
                }
            })
            .collect::<Vec<_>>();

        Self::new(out_dtype, values)
    }
}
