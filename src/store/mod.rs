//! Collaborators backed by files, a local database or memory.

pub mod ledger;
pub mod memory;
pub mod pricedb;
pub mod targets;

pub use ledger::LedgerFile;
pub use memory::MemoryBook;
pub use pricedb::PriceDb;
pub use targets::{AllocationFile, ClassEdit};
