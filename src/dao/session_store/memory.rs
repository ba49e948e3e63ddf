use std::{sync::Arc, time::SystemTime};

use dashmap::{DashMap, mapref::entry::Entry};
use futures::future::{self, BoxFuture, FutureExt};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::debug;
use uuid::Uuid;

use super::{Change, ChangeKind, ChangeStream, Filter, NewRecord, Record, SessionStore, Table};
use crate::dao::storage::{StorageError, StorageResult};

const DEFAULT_FEED_CAPACITY: usize = 256;

/// In-process [`SessionStore`] backed by a concurrent map and a broadcast change feed.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<MemoryInner>,
}

struct MemoryInner {
    records: DashMap<(Table, String), Record>,
    feed: broadcast::Sender<Change>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Create an empty store with the default change-feed capacity.
    pub fn new() -> Self {
        Self::with_feed_capacity(DEFAULT_FEED_CAPACITY)
    }

    /// Create an empty store whose change feed buffers `capacity` notifications per subscriber.
    pub fn with_feed_capacity(capacity: usize) -> Self {
        let (feed, _receiver) = broadcast::channel(capacity);
        Self {
            inner: Arc::new(MemoryInner {
                records: DashMap::new(),
                feed,
            }),
        }
    }

    /// Number of records currently stored in `table`.
    pub fn len(&self, table: Table) -> usize {
        self.inner
            .records
            .iter()
            .filter(|entry| entry.key().0 == table)
            .count()
    }

    /// Whether `table` holds no records.
    pub fn is_empty(&self, table: Table) -> bool {
        self.len(table) == 0
    }
}

impl MemoryInner {
    fn publish(&self, table: Table, kind: ChangeKind, record: Record) {
        // No subscribers is not an error.
        let _ = self.feed.send(Change {
            table,
            kind,
            record,
        });
    }

    fn get(&self, table: Table, key: String) -> Option<Record> {
        self.records
            .get(&(table, key))
            .map(|entry| entry.value().clone())
    }

    fn select(&self, table: Table, filter: &Filter) -> Vec<Record> {
        let mut records: Vec<Record> = self
            .records
            .iter()
            .filter(|entry| entry.key().0 == table && filter.matches(entry.value()))
            .map(|entry| entry.value().clone())
            .collect();
        records.sort_by(|a, b| a.key.cmp(&b.key));
        records
    }

    fn insert(&self, table: Table, new: NewRecord) -> StorageResult<Record> {
        let record = match self.records.entry((table, new.key.clone())) {
            Entry::Occupied(_) => {
                return Err(StorageError::Conflict {
                    table,
                    key: new.key,
                });
            }
            Entry::Vacant(slot) => {
                let record = Record {
                    id: Uuid::new_v4(),
                    key: new.key,
                    session: new.session,
                    data: new.data,
                    version: 1,
                    updated_at: SystemTime::now(),
                };
                slot.insert(record.clone());
                record
            }
        };

        self.publish(table, ChangeKind::Insert, record.clone());
        Ok(record)
    }

    fn update(&self, table: Table, key: String, expected: Option<&Value>, patch: Value) -> bool {
        let updated = match self.records.get_mut(&(table, key.clone())) {
            Some(mut entry) => {
                let record = entry.value_mut();
                if expected.is_some_and(|expected| !fields_match(&record.data, expected)) {
                    None
                } else {
                    merge_patch(&mut record.data, patch);
                    record.version += 1;
                    record.updated_at = SystemTime::now();
                    Some(record.clone())
                }
            }
            None => None,
        };

        match updated {
            Some(record) => {
                self.publish(table, ChangeKind::Update, record);
                true
            }
            None => {
                debug!(%table, key, "update ignored: record missing or guard mismatch");
                false
            }
        }
    }

    fn delete(&self, table: Table, filter: &Filter) {
        let keys: Vec<(Table, String)> = self
            .records
            .iter()
            .filter(|entry| entry.key().0 == table && filter.matches(entry.value()))
            .map(|entry| entry.key().clone())
            .collect();

        for key in keys {
            if let Some((_, record)) = self.records.remove(&key) {
                self.publish(table, ChangeKind::Delete, record);
            }
        }
    }
}

/// Whether every field of the object `expected` has the same value in `data`.
fn fields_match(data: &Value, expected: &Value) -> bool {
    match expected {
        Value::Object(fields) => fields
            .iter()
            .all(|(field, value)| data.get(field) == Some(value)),
        other => data == other,
    }
}

/// Shallow merge of a JSON object patch; non-object patches replace the payload.
fn merge_patch(target: &mut Value, patch: Value) {
    match (target, patch) {
        (Value::Object(target), Value::Object(patch)) => {
            for (field, value) in patch {
                target.insert(field, value);
            }
        }
        (target, patch) => *target = patch,
    }
}

impl SessionStore for MemoryStore {
    fn get(&self, table: Table, key: String) -> BoxFuture<'static, StorageResult<Option<Record>>> {
        future::ready(Ok(self.inner.get(table, key))).boxed()
    }

    fn select(
        &self,
        table: Table,
        filter: Filter,
    ) -> BoxFuture<'static, StorageResult<Vec<Record>>> {
        future::ready(Ok(self.inner.select(table, &filter))).boxed()
    }

    fn insert(&self, table: Table, record: NewRecord) -> BoxFuture<'static, StorageResult<Record>> {
        future::ready(self.inner.insert(table, record)).boxed()
    }

    fn update(
        &self,
        table: Table,
        key: String,
        patch: Value,
    ) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.update(table, key, None, patch);
        future::ready(Ok(())).boxed()
    }

    fn update_if(
        &self,
        table: Table,
        key: String,
        expected: Value,
        patch: Value,
    ) -> BoxFuture<'static, StorageResult<bool>> {
        let written = self.inner.update(table, key, Some(&expected), patch);
        future::ready(Ok(written)).boxed()
    }

    fn delete(&self, table: Table, filter: Filter) -> BoxFuture<'static, StorageResult<()>> {
        self.inner.delete(table, &filter);
        future::ready(Ok(())).boxed()
    }

    fn subscribe(&self, table: Table, filter: Filter) -> ChangeStream {
        ChangeStream::new(table, filter, self.inner.feed.subscribe())
    }
}
