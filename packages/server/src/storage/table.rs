//! Concurrent row table with a unique secondary index, backed by [`DashMap`].

use std::sync::atomic::{AtomicI64, Ordering};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use super::StorageError;

/// A storable entity with a surrogate id and one unique business key.
pub trait Row: Clone + Send + Sync + 'static {
    /// Wire name of the unique field, used in conflict messages.
    const UNIQUE_FIELD: &'static str;

    fn id(&self) -> i64;

    fn unique_key(&self) -> &str;
}

/// Rows keyed by id plus a unique index from business key to id.
///
/// Lock order is always rows shard before index shard, and no method holds an
/// index guard while touching `rows`.
pub struct IndexedTable<T: Row> {
    rows: DashMap<i64, T>,
    unique: DashMap<String, i64>,
    next_id: AtomicI64,
}

impl<T: Row> IndexedTable<T> {
    /// Creates an empty table whose first id is 1.
    #[must_use]
    pub fn new() -> Self {
        Self {
            rows: DashMap::new(),
            unique: DashMap::new(),
            next_id: AtomicI64::new(1),
        }
    }

    /// Allocates an id, builds the row and stores it if its key is free.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Duplicate`] if another row holds the key. The
    /// allocated id is not reused.
    pub fn insert_with(&self, build: impl FnOnce(i64) -> T) -> Result<T, StorageError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let row = build(id);
        self.claim(row.unique_key(), id)?;
        self.rows.insert(id, row.clone());
        Ok(row)
    }

    /// Overwrites the row with the same id.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if the id is not stored, or
    /// [`StorageError::Duplicate`] if the new key belongs to another row.
    pub fn replace(&self, row: T) -> Result<T, StorageError> {
        let id = row.id();
        let mut slot = self.rows.get_mut(&id).ok_or(StorageError::NotFound { id })?;
        let old_key = slot.unique_key().to_string();
        let key_changed = old_key != row.unique_key();
        if key_changed {
            self.claim(row.unique_key(), id)?;
        }
        *slot = row.clone();
        drop(slot);

        if key_changed {
            self.unique.remove_if(&old_key, |_, owner| *owner == id);
        }
        Ok(row)
    }

    #[must_use]
    pub fn get(&self, id: i64) -> Option<T> {
        self.rows.get(&id).map(|r| r.value().clone())
    }

    /// Looks a row up by its unique key.
    #[must_use]
    pub fn find_unique(&self, key: &str) -> Option<T> {
        let id = self.unique.get(key).map(|owner| *owner)?;
        self.get(id)
    }

    /// Whether `key` is held by any row other than `excluding`.
    #[must_use]
    pub fn key_taken(&self, key: &str, excluding: Option<i64>) -> bool {
        self.unique
            .get(key)
            .is_some_and(|owner| Some(*owner) != excluding)
    }

    /// Removes a row and releases its key.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NotFound`] if the id is not stored.
    pub fn remove(&self, id: i64) -> Result<T, StorageError> {
        let (_, row) = self.rows.remove(&id).ok_or(StorageError::NotFound { id })?;
        self.unique.remove_if(row.unique_key(), |_, owner| *owner == id);
        Ok(row)
    }

    /// Point-in-time copy of every row, in no particular order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<T> {
        self.rows.iter().map(|entry| entry.value().clone()).collect()
    }

    #[must_use]
    pub fn len(&self) -> u64 {
        self.rows.len() as u64
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn claim(&self, key: &str, id: i64) -> Result<(), StorageError> {
        match self.unique.entry(key.to_string()) {
            Entry::Occupied(owner) if *owner.get() != id => Err(StorageError::Duplicate {
                field: T::UNIQUE_FIELD,
                value: key.to_string(),
            }),
            Entry::Occupied(_) => Ok(()),
            Entry::Vacant(slot) => {
                slot.insert(id);
                Ok(())
            }
        }
    }
}

impl<T: Row> Default for IndexedTable<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Tag {
        id: i64,
        label: String,
    }

    impl Row for Tag {
        const UNIQUE_FIELD: &'static str = "label";

        fn id(&self) -> i64 {
            self.id
        }

        fn unique_key(&self) -> &str {
            &self.label
        }
    }

    fn tag(label: &str) -> impl FnOnce(i64) -> Tag + '_ {
        move |id| Tag {
            id,
            label: label.to_string(),
        }
    }

    #[test]
    fn ids_increase_from_one() {
        let table = IndexedTable::new();
        assert_eq!(table.insert_with(tag("a")).unwrap().id, 1);
        assert_eq!(table.insert_with(tag("b")).unwrap().id, 2);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn duplicate_key_is_rejected() {
        let table = IndexedTable::new();
        table.insert_with(tag("a")).unwrap();
        let err = table.insert_with(tag("a")).unwrap_err();
        assert_eq!(
            err,
            StorageError::Duplicate {
                field: "label",
                value: "a".to_string()
            }
        );
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn replace_moves_key() {
        let table = IndexedTable::new();
        let mut row = table.insert_with(tag("a")).unwrap();
        row.label = "b".to_string();
        table.replace(row).unwrap();
        assert!(!table.key_taken("a", None));
        assert!(table.key_taken("b", None));
        assert!(!table.key_taken("b", Some(1)));
        assert_eq!(table.find_unique("b").unwrap().id, 1);
        // The released key is free again.
        assert!(table.insert_with(tag("a")).is_ok());
    }

    #[test]
    fn replace_into_taken_key_keeps_old_row() {
        let table = IndexedTable::new();
        table.insert_with(tag("a")).unwrap();
        let mut second = table.insert_with(tag("b")).unwrap();
        second.label = "a".to_string();
        assert!(matches!(table.replace(second), Err(StorageError::Duplicate { .. })));
        assert_eq!(table.get(2).unwrap().label, "b");
    }

    #[test]
    fn remove_releases_key() {
        let table = IndexedTable::new();
        table.insert_with(tag("a")).unwrap();
        table.remove(1).unwrap();
        assert!(table.get(1).is_none());
        assert!(table.is_empty());
        assert_eq!(table.remove(1), Err(StorageError::NotFound { id: 1 }));
        assert!(table.insert_with(tag("a")).is_ok());
    }

    #[test]
    fn concurrent_inserts_claim_key_once() {
        let table = Arc::new(IndexedTable::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let table = Arc::clone(&table);
                std::thread::spawn(move || table.insert_with(tag("same")).is_ok())
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
        assert_eq!(table.len(), 1);
    }
}
