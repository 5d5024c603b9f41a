//! In-memory persistence for the two services.
//!
//! Each service owns one [`IndexedTable`] keyed by surrogate id with one
//! unique secondary index (department code, employee email). Unique keys are
//! claimed through `DashMap::entry`, so two concurrent writers cannot both
//! win the same key.

pub mod departments;
pub mod employees;
pub mod table;

pub use departments::InMemoryDepartmentRepository;
pub use employees::InMemoryEmployeeRepository;
pub use table::{IndexedTable, Row};

/// Storage-level failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    /// Another row already holds the unique key.
    #[error("{field} already exists: {value}")]
    Duplicate { field: &'static str, value: String },

    #[error("no row with id {id}")]
    NotFound { id: i64 },
}
