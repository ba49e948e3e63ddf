pub mod memory;

use std::{fmt, time::SystemTime};

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast::{self, error::RecvError};
use uuid::Uuid;

use crate::dao::storage::StorageResult;

pub use self::memory::MemoryStore;

/// Tables exposed by the session store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    /// One record per room, keyed by the session code.
    Sessions,
    /// One record per claimed seat, keyed by `code/index`.
    Seats,
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Table::Sessions => f.write_str("sessions"),
            Table::Seats => f.write_str("seats"),
        }
    }
}

/// A stored record as returned by the backend.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// Backend-assigned identifier.
    pub id: Uuid,
    /// Unique key within its table.
    pub key: String,
    /// Code of the session the record belongs to, used for filtering.
    pub session: String,
    /// JSON payload.
    pub data: Value,
    /// Incremented on every update.
    pub version: u64,
    /// Last write time.
    pub updated_at: SystemTime,
}

/// Values for a record about to be inserted.
#[derive(Debug, Clone)]
pub struct NewRecord {
    pub key: String,
    pub session: String,
    pub data: Value,
}

/// Row selection used by `select`, `delete` and `subscribe`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Filter {
    /// Every record of the table.
    All,
    /// Records belonging to one session code.
    Session(String),
    /// A single record by key.
    Key(String),
}

impl Filter {
    /// Whether `record` is selected by this filter.
    pub fn matches(&self, record: &Record) -> bool {
        match self {
            Filter::All => true,
            Filter::Session(code) => record.session == *code,
            Filter::Key(key) => record.key == *key,
        }
    }
}

/// Kind of mutation carried by a change notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// A single change notification; `record` holds the new value (or the removed one).
#[derive(Debug, Clone)]
pub struct Change {
    pub table: Table,
    pub kind: ChangeKind,
    pub record: Record,
}

/// Item yielded by a [`ChangeStream`].
#[derive(Debug, Clone)]
pub enum ChangeNotice {
    /// A change matching the subscription filter.
    Changed(Change),
    /// The subscriber fell behind and `n` notifications were dropped; callers must resync.
    Missed(u64),
}

/// Filtered view over the store's change feed.
pub struct ChangeStream {
    table: Table,
    filter: Filter,
    receiver: broadcast::Receiver<Change>,
}

impl ChangeStream {
    /// Wrap a raw broadcast receiver, keeping only changes of `table` matching `filter`.
    pub fn new(table: Table, filter: Filter, receiver: broadcast::Receiver<Change>) -> Self {
        Self {
            table,
            filter,
            receiver,
        }
    }

    /// Wait for the next matching notice. Returns `None` once the feed is closed.
    pub async fn next(&mut self) -> Option<ChangeNotice> {
        loop {
            match self.receiver.recv().await {
                Ok(change) => {
                    if change.table == self.table && self.filter.matches(&change.record) {
                        return Some(ChangeNotice::Changed(change));
                    }
                }
                Err(RecvError::Lagged(missed)) => return Some(ChangeNotice::Missed(missed)),
                Err(RecvError::Closed) => return None,
            }
        }
    }
}

/// Keyed record store with at-least-once change notification.
///
/// Plain updates are last-write-wins per record. Concurrency control is limited to the uniqueness
/// of `(table, key)` enforced by `insert`, which fails with [`StorageError::Conflict`], and to
/// `update_if`, which checks field values and merges under the same record lock.
///
/// [`StorageError::Conflict`]: crate::dao::storage::StorageError::Conflict
pub trait SessionStore: Send + Sync {
    fn get(&self, table: Table, key: String) -> BoxFuture<'static, StorageResult<Option<Record>>>;
    fn select(&self, table: Table, filter: Filter)
    -> BoxFuture<'static, StorageResult<Vec<Record>>>;
    fn insert(&self, table: Table, record: NewRecord) -> BoxFuture<'static, StorageResult<Record>>;
    /// Shallow-merge the JSON object `patch` into the record. Missing records are left alone.
    fn update(&self, table: Table, key: String, patch: Value)
    -> BoxFuture<'static, StorageResult<()>>;
    /// Merge `patch` only if every field of the JSON object `expected` holds the same value in
    /// the record. Resolves to whether the patch was written.
    fn update_if(
        &self,
        table: Table,
        key: String,
        expected: Value,
        patch: Value,
    ) -> BoxFuture<'static, StorageResult<bool>>;
    fn delete(&self, table: Table, filter: Filter) -> BoxFuture<'static, StorageResult<()>>;
    fn subscribe(&self, table: Table, filter: Filter) -> ChangeStream;
}
