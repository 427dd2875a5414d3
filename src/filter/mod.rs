//! Query filters over transactions, transfers and outputs
//!
//! A filter is a conjunction of optional clauses; an unset clause matches
//! everything. Filters are validated when built, so evaluation never fails.

pub mod output;
pub mod transaction;
pub mod transfer;

pub use output::{OutputFilter, OutputFilterBuilder};
pub use transaction::{TransactionFilter, TransactionFilterBuilder};
pub use transfer::{TransferFilter, TransferFilterBuilder};

use thiserror::Error;

/// Filter construction errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    #[error("Invalid filter state: {0}")]
    InvalidFilterState(String),
}

impl FilterError {
    pub(crate) fn invalid(reason: impl Into<String>) -> Self {
        FilterError::InvalidFilterState(reason.into())
    }
}

/// A predicate over `T`
pub trait Filter<T: ?Sized> {
    fn meets_criteria(&self, item: &T) -> bool;

    /// Items that satisfy the filter, in input order
    fn apply<'a>(&self, items: &'a [T]) -> Vec<&'a T>
    where
        T: Sized,
    {
        items.iter().filter(|item| self.meets_criteria(item)).collect()
    }
}

/// Build a filter from raw JSON, reporting bad shapes as invalid state
pub(crate) fn from_json<R, F>(value: &serde_json::Value) -> Result<F, FilterError>
where
    R: serde::de::DeserializeOwned,
    F: TryFrom<R, Error = FilterError>,
{
    let raw: R = R::deserialize(value).map_err(|e| FilterError::invalid(e.to_string()))?;
    F::try_from(raw)
}

/// `true` when a set-valued clause is absent or contains `value`
pub(crate) fn in_set<T: PartialEq>(set: &Option<Vec<T>>, value: Option<&T>) -> bool {
    match set {
        None => true,
        Some(set) => value.is_some_and(|v| set.contains(v)),
    }
}

/// `true` when a scalar clause is absent or equals a known `value`
pub(crate) fn equals<T: PartialEq>(expected: &Option<T>, value: Option<&T>) -> bool {
    match expected {
        None => true,
        Some(expected) => value == Some(expected),
    }
}
