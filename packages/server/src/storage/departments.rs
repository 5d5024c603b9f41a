//! In-memory [`DepartmentRepository`] backed by an [`IndexedTable`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use orgmesh_core::{Department, NewDepartment};

use super::table::{IndexedTable, Row};
use super::StorageError;
use crate::traits::DepartmentRepository;

impl Row for Department {
    const UNIQUE_FIELD: &'static str = "code";

    fn id(&self) -> i64 {
        self.id
    }

    fn unique_key(&self) -> &str {
        &self.code
    }
}

/// Department store with a unique index on `code`.
#[derive(Default)]
pub struct InMemoryDepartmentRepository {
    table: IndexedTable<Department>,
}

impl InMemoryDepartmentRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DepartmentRepository for InMemoryDepartmentRepository {
    async fn insert(
        &self,
        new: NewDepartment,
        now: DateTime<Utc>,
    ) -> Result<Department, StorageError> {
        self.table.insert_with(|id| Department::from_new(id, new, now))
    }

    async fn replace(&self, department: Department) -> Result<Department, StorageError> {
        self.table.replace(department)
    }

    async fn get(&self, id: i64) -> Option<Department> {
        self.table.get(id)
    }

    async fn find_by_code(&self, code: &str) -> Option<Department> {
        self.table.find_unique(code)
    }

    async fn code_taken(&self, code: &str, excluding: Option<i64>) -> bool {
        self.table.key_taken(code, excluding)
    }

    async fn all(&self) -> Vec<Department> {
        self.table.snapshot()
    }

    async fn remove(&self, id: i64) -> Result<Department, StorageError> {
        self.table.remove(id)
    }

    async fn count(&self) -> u64 {
        self.table.len()
    }
}

#[cfg(test)]
mod tests {
    use orgmesh_core::DepartmentUpdate;

    use super::*;

    fn new_department(code: &str) -> NewDepartment {
        NewDepartment {
            code: code.to_string(),
            name: format!("{code} department"),
            description: None,
        }
    }

    #[tokio::test]
    async fn insert_trims_and_indexes_code() {
        let repo = InMemoryDepartmentRepository::new();
        let dept = repo.insert(new_department(" FIN "), Utc::now()).await.unwrap();
        assert_eq!(dept.code, "FIN");
        assert_eq!(repo.find_by_code("FIN").await.unwrap().id, dept.id);
        assert!(repo.code_taken("FIN", None).await);
        assert!(!repo.code_taken("FIN", Some(dept.id)).await);
    }

    #[tokio::test]
    async fn duplicate_code_conflicts() {
        let repo = InMemoryDepartmentRepository::new();
        repo.insert(new_department("HR"), Utc::now()).await.unwrap();
        let err = repo.insert(new_department("HR"), Utc::now()).await.unwrap_err();
        assert_eq!(err.to_string(), "code already exists: HR");
        assert_eq!(repo.count().await, 1);
    }

    #[tokio::test]
    async fn replace_renames_code() {
        let repo = InMemoryDepartmentRepository::new();
        let mut dept = repo.insert(new_department("OPS"), Utc::now()).await.unwrap();
        dept.apply(
            DepartmentUpdate {
                code: Some("PLAT".to_string()),
                ..DepartmentUpdate::default()
            },
            Utc::now(),
        );
        repo.replace(dept).await.unwrap();
        assert!(repo.find_by_code("OPS").await.is_none());
        assert!(repo.find_by_code("PLAT").await.is_some());
    }

    #[tokio::test]
    async fn remove_missing_is_not_found() {
        let repo = InMemoryDepartmentRepository::new();
        assert_eq!(repo.remove(5).await, Err(StorageError::NotFound { id: 5 }));
        assert!(repo.all().await.is_empty());
    }
}
