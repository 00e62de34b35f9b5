//! Core allocation model, loading and aggregation

pub mod config;
pub mod currency;
pub mod engine;
pub mod error;
pub mod loader;
pub mod log;
pub mod model;
pub mod sources;
pub mod view;

// Re-export main types for cleaner imports
pub use error::{AllocationError, AllocationResult, ValidationFailure};
pub use loader::{AssetAllocationLoader, RatePolicy};
pub use model::{AssetAllocationModel, AssetClass, Holding, HoldingKind};
pub use sources::{AllocationStore, Ledger, Price, PriceFeed};
pub use view::{RowKind, ViewRow, linearize};
