use std::sync::Arc;

use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;

use crate::{
    dao::{
        models::{
            SeatEntity, SeatPatch, SessionEntity, SessionGuard, SessionPatch, seat_key,
            session_key,
        },
        session_store::{ChangeStream, Filter, NewRecord, Record, SessionStore, Table},
        storage::{StorageError, StorageResult},
    },
    state::game::{Seat, SeatIndex, Session, SessionCode},
};

/// Typed access to the session and seat tables.
#[derive(Clone)]
pub struct SessionRepository {
    store: Arc<dyn SessionStore>,
}

impl SessionRepository {
    pub fn new(store: Arc<dyn SessionStore>) -> Self {
        Self { store }
    }

    /// Cheap read used by the health check to tell whether the store answers.
    pub async fn ping(&self) -> StorageResult<()> {
        self.store.get(Table::Sessions, String::new()).await.map(|_| ())
    }

    /// Load the session identified by `code`.
    pub async fn find_session(&self, code: &SessionCode) -> StorageResult<Option<Session>> {
        let Some(record) = self.store.get(Table::Sessions, session_key(code)).await? else {
            return Ok(None);
        };
        let entity: SessionEntity = decode(&record)?;
        let session = Session::try_from(entity).map_err(|err| {
            StorageError::unavailable(format!("corrupt session record `{}`", record.key), err)
        })?;
        Ok(Some(session))
    }

    /// Insert a new session; fails with a conflict when the code is already taken.
    pub async fn insert_session(&self, session: &Session) -> StorageResult<()> {
        let key = session_key(&session.code);
        let data = encode(&key, &SessionEntity::from(session))?;
        self.store
            .insert(
                Table::Sessions,
                NewRecord {
                    key,
                    session: session.code.to_string(),
                    data,
                },
            )
            .await?;
        Ok(())
    }

    /// Write `patch` only while the record still matches `guard`. Returns whether it was written.
    pub async fn update_session_if(
        &self,
        code: &SessionCode,
        guard: &SessionGuard,
        patch: &SessionPatch,
    ) -> StorageResult<bool> {
        let key = session_key(code);
        let expected = encode(&key, guard)?;
        let data = encode(&key, patch)?;
        self.store
            .update_if(Table::Sessions, key, expected, data)
            .await
    }

    /// Claimed seats of `code`, ordered by index.
    pub async fn seats(&self, code: &SessionCode) -> StorageResult<Vec<Seat>> {
        let records = self
            .store
            .select(Table::Seats, Filter::Session(code.to_string()))
            .await?;
        let mut seats = records
            .iter()
            .map(|record| decode::<SeatEntity>(record).map(Seat::from))
            .collect::<StorageResult<Vec<_>>>()?;
        seats.sort_by_key(|seat| seat.index);
        Ok(seats)
    }

    pub async fn find_seat(
        &self,
        code: &SessionCode,
        index: SeatIndex,
    ) -> StorageResult<Option<Seat>> {
        match self.store.get(Table::Seats, seat_key(code, index)).await? {
            Some(record) => Ok(Some(decode::<SeatEntity>(&record)?.into())),
            None => Ok(None),
        }
    }

    /// Insert a seat claim; fails with a conflict when the index is already held.
    pub async fn insert_seat(&self, code: &SessionCode, seat: SeatEntity) -> StorageResult<Seat> {
        let key = seat_key(code, seat.index);
        let data = encode(&key, &seat)?;
        self.store
            .insert(
                Table::Seats,
                NewRecord {
                    key,
                    session: code.to_string(),
                    data,
                },
            )
            .await?;
        Ok(seat.into())
    }

    pub async fn update_seat(
        &self,
        code: &SessionCode,
        index: SeatIndex,
        patch: &SeatPatch,
    ) -> StorageResult<()> {
        let key = seat_key(code, index);
        let data = encode(&key, patch)?;
        self.store.update(Table::Seats, key, data).await
    }

    /// Drop every seat claim of `code`.
    pub async fn delete_seats(&self, code: &SessionCode) -> StorageResult<()> {
        self.store
            .delete(Table::Seats, Filter::Session(code.to_string()))
            .await
    }

    /// Drop the session record itself.
    pub async fn delete_session(&self, code: &SessionCode) -> StorageResult<()> {
        self.store
            .delete(Table::Sessions, Filter::Key(session_key(code)))
            .await
    }

    /// Change notifications for the session record of `code`.
    pub fn watch_session(&self, code: &SessionCode) -> ChangeStream {
        self.store
            .subscribe(Table::Sessions, Filter::Key(session_key(code)))
    }

    /// Change notifications for every seat of `code`.
    pub fn watch_seats(&self, code: &SessionCode) -> ChangeStream {
        self.store
            .subscribe(Table::Seats, Filter::Session(code.to_string()))
    }
}

fn decode<T: DeserializeOwned>(record: &Record) -> StorageResult<T> {
    serde_json::from_value(record.data.clone()).map_err(|err| {
        StorageError::unavailable(format!("corrupt record `{}`", record.key), err)
    })
}

fn encode<T: Serialize>(key: &str, value: &T) -> StorageResult<Value> {
    serde_json::to_value(value)
        .map_err(|err| StorageError::unavailable(format!("cannot encode record `{key}`"), err))
}
