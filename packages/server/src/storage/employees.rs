//! In-memory [`EmployeeRepository`] backed by an [`IndexedTable`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use orgmesh_core::{Employee, NewEmployee};

use super::table::{IndexedTable, Row};
use super::StorageError;
use crate::traits::EmployeeRepository;

impl Row for Employee {
    const UNIQUE_FIELD: &'static str = "email";

    fn id(&self) -> i64 {
        self.id
    }

    fn unique_key(&self) -> &str {
        &self.email
    }
}

/// Employee store with a unique index on `email`.
#[derive(Default)]
pub struct InMemoryEmployeeRepository {
    table: IndexedTable<Employee>,
}

impl InMemoryEmployeeRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EmployeeRepository for InMemoryEmployeeRepository {
    async fn insert(&self, new: NewEmployee, now: DateTime<Utc>) -> Result<Employee, StorageError> {
        self.table.insert_with(|id| Employee::from_new(id, new, now))
    }

    async fn replace(&self, employee: Employee) -> Result<Employee, StorageError> {
        self.table.replace(employee)
    }

    async fn get(&self, id: i64) -> Option<Employee> {
        self.table.get(id)
    }

    async fn email_taken(&self, email: &str, excluding: Option<i64>) -> bool {
        self.table.key_taken(email, excluding)
    }

    async fn all(&self) -> Vec<Employee> {
        self.table.snapshot()
    }

    async fn remove(&self, id: i64) -> Result<Employee, StorageError> {
        self.table.remove(id)
    }

    async fn count(&self) -> u64 {
        self.table.len()
    }
}
