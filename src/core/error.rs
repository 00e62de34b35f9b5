//! Error types for loading and aggregating an allocation tree.

use rust_decimal::Decimal;
use thiserror::Error;

/// Result type for allocation operations.
pub type AllocationResult<T> = Result<T, AllocationError>;

/// Errors that abort an allocation run.
#[derive(Error, Debug)]
pub enum AllocationError {
    /// The class skeleton is malformed (missing parent, duplicate id, cycle).
    #[error("Integrity error: {0}")]
    Integrity(String),

    /// A class carries both child classes and holdings.
    #[error("Asset class '{class}' has both child classes and holdings")]
    MixedClass { class: String },

    /// No exchange rate is known for a currency.
    #[error("No rate found for {currency}")]
    RateUnavailable { currency: String },

    /// A holding reached the engine without a value in the base currency.
    #[error("Holding '{holding}' has no value in the base currency")]
    MissingBaseValue { holding: String },

    /// A value does not fit the decimal range.
    #[error("Arithmetic overflow while computing {context}")]
    Overflow { context: String },

    /// The model was handed to the projector before `compute` succeeded.
    #[error("Allocation model has not been computed")]
    NotComputed,

    #[error(transparent)]
    Source(#[from] anyhow::Error),
}

/// The first allocation invariant violation found by validation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationFailure {
    /// An internal class's target differs from the sum of its children's targets.
    #[error("The sum of child allocations {found} invalid for {class} (expected {expected})")]
    ChildSum {
        class: String,
        expected: Decimal,
        found: Decimal,
    },
    /// Top-level targets do not add up to 100.
    #[error("The sum of all allocations ({found}) does not equal 100")]
    TopLevelSum { found: Decimal },
}
