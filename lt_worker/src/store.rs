//! Persistence seams.
//!
//! The updater is the only writer of [`RankedUpdate`]s, history, and LP events. Owner-facing
//! routes are the only writers of [`PlayerMetadata`]. Nothing synchronizes the two: concurrent
//! writes to one player are last-write-wins.

use std::fmt;
use std::future::Future;

use chrono::{DateTime, Utc};
use tokio_postgres::error::SqlState;

use crate::db::{
    LpEvent, NewHistory, NewLpEvent, NewPlayer, Player, PlayerHistory, PlayerMetadata,
    RankedUpdate,
};
use crate::rank::RankSnapshot;

/// Failed store operation.
#[derive(Debug)]
pub enum StoreError {
    /// Could not build the connection pool.
    CreatePool(deadpool_postgres::CreatePoolError),
    /// Could not get a pooled connection.
    Pool(deadpool_postgres::PoolError),
    /// Query failed.
    Postgres(tokio_postgres::Error),
    /// Row contained an unexpected value.
    Decode(String),
    /// No player with this ID.
    NotFound(i64),
    /// Insert would violate a unique constraint, named here.
    Duplicate(String),
}
impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::CreatePool(e) => write!(f, "Failed to create pool: {}", e),
            StoreError::Pool(e) => write!(f, "Failed to get connection: {}", e),
            StoreError::Postgres(e) => write!(f, "Query failed: {}", e),
            StoreError::Decode(msg) => write!(f, "Bad row: {}", msg),
            StoreError::NotFound(id) => write!(f, "No player with ID {}", id),
            StoreError::Duplicate(constraint) => write!(f, "Duplicate `{}`", constraint),
        }
    }
}
impl std::error::Error for StoreError {}
impl From<deadpool_postgres::CreatePoolError> for StoreError {
    fn from(value: deadpool_postgres::CreatePoolError) -> Self {
        Self::CreatePool(value)
    }
}
impl From<deadpool_postgres::PoolError> for StoreError {
    fn from(value: deadpool_postgres::PoolError) -> Self {
        Self::Pool(value)
    }
}
impl From<tokio_postgres::Error> for StoreError {
    fn from(value: tokio_postgres::Error) -> Self {
        if value.code() != Some(&SqlState::UNIQUE_VIOLATION) {
            return Self::Postgres(value);
        }
        let constraint = value
            .as_db_error()
            .and_then(|e| e.constraint())
            .unwrap_or("unique")
            .to_owned();
        Self::Duplicate(constraint)
    }
}

/// `players` table.
pub trait PlayerStore: Send + Sync {
    /// All players, by ID.
    fn list_players(&self) -> impl Future<Output = Result<Vec<Player>, StoreError>> + Send;
    /// One player.
    fn get_player(&self, id: i64)
        -> impl Future<Output = Result<Option<Player>, StoreError>> + Send;
    /// The player tracking this PUUID, if any.
    fn get_player_by_puuid(
        &self,
        puuid: &str,
    ) -> impl Future<Output = Result<Option<Player>, StoreError>> + Send;
    /// Register a new player. Fails with [`StoreError::Duplicate`] if the PUUID is tracked.
    fn insert_player(
        &self,
        player: &NewPlayer,
    ) -> impl Future<Output = Result<Player, StoreError>> + Send;
    /// Owner edit. Returns `None` if no such player.
    fn update_metadata(
        &self,
        id: i64,
        metadata: &PlayerMetadata,
    ) -> impl Future<Output = Result<Option<Player>, StoreError>> + Send;
    /// Updater write. Fails with [`StoreError::NotFound`] if no such player.
    fn update_ranked(
        &self,
        id: i64,
        update: &RankedUpdate,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
    /// Delete a player, cascading to its history and LP events. Returns if a row was deleted.
    fn delete_player(&self, id: i64) -> impl Future<Output = Result<bool, StoreError>> + Send;
}

/// `player_history` table.
pub trait HistoryStore: Send + Sync {
    /// Most recent entry for the player.
    fn latest_history(
        &self,
        player_id: i64,
    ) -> impl Future<Output = Result<Option<PlayerHistory>, StoreError>> + Send;
    /// Append an entry.
    fn insert_history(
        &self,
        entry: &NewHistory,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
    /// Up to `limit` entries, newest first.
    fn list_history(
        &self,
        player_id: i64,
        limit: i64,
    ) -> impl Future<Output = Result<Vec<PlayerHistory>, StoreError>> + Send;
}

/// `lp_tracker` table.
pub trait LpEventStore: Send + Sync {
    /// If an event with the same tier, division, and current LP exists at or after `since`.
    fn has_lp_event_since(
        &self,
        player_id: i64,
        current: &RankSnapshot,
        since: DateTime<Utc>,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;
    /// Append an event.
    fn insert_lp_event(
        &self,
        event: &NewLpEvent,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
    /// Up to `limit` events, newest first.
    fn list_lp_events(
        &self,
        player_id: i64,
        limit: i64,
    ) -> impl Future<Output = Result<Vec<LpEvent>, StoreError>> + Send;
}

/// All three tables.
pub trait Store: PlayerStore + HistoryStore + LpEventStore {}
impl<T> Store for T where T: PlayerStore + HistoryStore + LpEventStore {}
