use std::cmp::Reverse;
use std::sync::Arc;

use async_trait::async_trait;
use mongodb::bson::oid::ObjectId;
use parking_lot::RwLock;

use super::{Record, Repository, StoreError, Window};

/// Process-local collection used by tests and by deployments without `MONGODB_URL`.
pub struct MemoryStore<T> {
    records: Arc<RwLock<Vec<T>>>,
}

impl<T> Default for MemoryStore<T> {
    fn default() -> Self {
        Self {
            records: Arc::new(RwLock::new(Vec::new())),
        }
    }
}

impl<T> Clone for MemoryStore<T> {
    fn clone(&self) -> Self {
        Self {
            records: Arc::clone(&self.records),
        }
    }
}

impl<T: Record> MemoryStore<T> {
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Snapshot of every stored record, newest first.
    pub fn snapshot(&self) -> Vec<T> {
        let mut records = self.records.read().clone();
        sort_newest_first(&mut records);
        records
    }

    /// Run `f` against the record with `id` while holding the write lock.
    pub(crate) fn modify<R>(&self, id: ObjectId, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        let mut guard = self.records.write();
        guard.iter_mut().find(|record| record.id() == id).map(f)
    }

    fn ensure_unique(records: &[T], candidate: &T) -> Result<(), StoreError> {
        let candidate_id = candidate.id();
        for (field, value) in candidate.unique_keys() {
            let clash = records
                .iter()
                .filter(|existing| existing.id() != candidate_id)
                .any(|existing| {
                    existing
                        .unique_keys()
                        .iter()
                        .any(|(other_field, other)| *other_field == field && *other == value)
                });
            if clash {
                return Err(StoreError::Duplicate {
                    field: field.to_string(),
                });
            }
        }
        Ok(())
    }
}

fn sort_newest_first<T: Record>(records: &mut [T]) {
    records.sort_by_key(|record| Reverse((record.sort_key(), record.id())));
}

#[async_trait]
impl<T: Record> Repository<T> for MemoryStore<T> {
    async fn insert(&self, record: T) -> Result<T, StoreError> {
        let mut guard = self.records.write();
        if guard.iter().any(|existing| existing.id() == record.id()) {
            return Err(StoreError::Duplicate {
                field: "_id".to_string(),
            });
        }
        Self::ensure_unique(&guard, &record)?;
        guard.push(record.clone());
        Ok(record)
    }

    async fn get(&self, id: ObjectId) -> Result<Option<T>, StoreError> {
        let guard = self.records.read();
        Ok(guard.iter().find(|record| record.id() == id).cloned())
    }

    async fn find(&self, filter: &T::Filter, window: Window) -> Result<Vec<T>, StoreError> {
        let mut matched: Vec<T> = {
            let guard = self.records.read();
            guard
                .iter()
                .filter(|record| record.matches(filter))
                .cloned()
                .collect()
        };
        sort_newest_first(&mut matched);

        let offset = usize::try_from(window.offset).unwrap_or(usize::MAX);
        let limit = window
            .limit
            .map(|limit| usize::try_from(limit).unwrap_or(usize::MAX))
            .unwrap_or(usize::MAX);

        Ok(matched.into_iter().skip(offset).take(limit).collect())
    }

    async fn count(&self, filter: &T::Filter) -> Result<u64, StoreError> {
        let guard = self.records.read();
        Ok(guard.iter().filter(|record| record.matches(filter)).count() as u64)
    }

    async fn update(&self, id: ObjectId, patch: &T::Patch) -> Result<Option<T>, StoreError> {
        let mut guard = self.records.write();
        let Some(index) = guard.iter().position(|record| record.id() == id) else {
            return Ok(None);
        };

        let mut updated = guard[index].clone();
        updated.apply(patch);
        Self::ensure_unique(&guard, &updated)?;
        guard[index] = updated.clone();
        Ok(Some(updated))
    }

    async fn update_many(&self, filter: &T::Filter, patch: &T::Patch) -> Result<u64, StoreError> {
        let mut guard = self.records.write();
        let mut modified = 0;
        for record in guard.iter_mut().filter(|record| record.matches(filter)) {
            record.apply(patch);
            modified += 1;
        }
        Ok(modified)
    }

    async fn delete(&self, id: ObjectId) -> Result<bool, StoreError> {
        let mut guard = self.records.write();
        let before = guard.len();
        guard.retain(|record| record.id() != id);
        Ok(guard.len() != before)
    }

    async fn delete_many(&self, filter: &T::Filter) -> Result<u64, StoreError> {
        let mut guard = self.records.write();
        let before = guard.len();
        guard.retain(|record| !record.matches(filter));
        Ok((before - guard.len()) as u64)
    }
}
