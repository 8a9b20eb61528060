//! Postgres-backed [`Store`](crate::store::Store).

use std::str::FromStr;

use chrono::{DateTime, Utc};
use deadpool_postgres::{Pool, Runtime};
use secrecy::{ExposeSecret, SecretString};
use tokio_postgres::{NoTls, Row};

use crate::db::{
    LpEvent, NewHistory, NewLpEvent, NewPlayer, Player, PlayerHistory, PlayerMetadata,
    RankedUpdate,
};
use crate::rank::{RankSnapshot, Tier};
use crate::store::{HistoryStore, LpEventStore, PlayerStore, StoreError};

const PLAYER_COLUMNS: &str = "id, puuid, summoner_name, tier, rank, league_points, wins, losses, \
    in_game, profile_icon_id, player_name, role, is_main, last_update";
const HISTORY_COLUMNS: &str = "id, player_id, tier, rank, league_points, wins, losses, timestamp";
const LP_EVENT_COLUMNS: &str = "id, player_id, summoner_name, previous_tier, previous_rank, \
    previous_lp, tier, rank, current_lp, difference, timestamp";

/// Connection pool over the hosted database.
#[derive(Clone)]
pub struct PgStore {
    pool: Pool,
}
impl PgStore {
    /// Create the pool. Connections are opened lazily.
    // TODO: TLS connector for hosted endpoints which reject plaintext connections.
    pub fn connect(database_url: &SecretString) -> Result<Self, StoreError> {
        let mut config = deadpool_postgres::Config::new();
        config.url = Some(database_url.expose_secret().clone());
        let pool = config.create_pool(Some(Runtime::Tokio1), NoTls)?;
        Ok(Self { pool })
    }

    /// Check a connection can be made.
    pub async fn ping(&self) -> Result<(), StoreError> {
        let client = self.pool.get().await?;
        client.simple_query("SELECT 1").await?;
        log::info!("postgres ok");
        Ok(())
    }

    async fn query(
        &self,
        sql: &str,
        params: &[&(dyn tokio_postgres::types::ToSql + Sync)],
    ) -> Result<Vec<Row>, StoreError> {
        let client = self.pool.get().await?;
        let statement = client.prepare_cached(sql).await?;
        Ok(client.query(&statement, params).await?)
    }

    async fn execute(
        &self,
        sql: &str,
        params: &[&(dyn tokio_postgres::types::ToSql + Sync)],
    ) -> Result<u64, StoreError> {
        let client = self.pool.get().await?;
        let statement = client.prepare_cached(sql).await?;
        Ok(client.execute(&statement, params).await?)
    }
}

fn parse_opt<T>(row: &Row, column: &str) -> Result<Option<T>, StoreError>
where
    T: FromStr<Err = String>,
{
    row.try_get::<_, Option<String>>(column)?
        .map(|s| s.parse().map_err(|e| StoreError::Decode(format!("`{}`: {}", column, e))))
        .transpose()
}

fn player_from_row(row: &Row) -> Result<Player, StoreError> {
    Ok(Player {
        id: row.try_get("id")?,
        puuid: row.try_get("puuid")?,
        summoner_name: row.try_get("summoner_name")?,
        tier: parse_opt(row, "tier")?,
        rank: parse_opt(row, "rank")?,
        league_points: row.try_get("league_points")?,
        wins: row.try_get("wins")?,
        losses: row.try_get("losses")?,
        in_game: row.try_get("in_game")?,
        profile_icon_id: row.try_get("profile_icon_id")?,
        player_name: row.try_get("player_name")?,
        role: row.try_get("role")?,
        is_main: row.try_get("is_main")?,
        last_update: row.try_get("last_update")?,
    })
}

fn history_from_row(row: &Row) -> Result<PlayerHistory, StoreError> {
    Ok(PlayerHistory {
        id: row.try_get("id")?,
        player_id: row.try_get("player_id")?,
        tier: parse_opt(row, "tier")?,
        rank: parse_opt(row, "rank")?,
        league_points: row.try_get("league_points")?,
        wins: row.try_get("wins")?,
        losses: row.try_get("losses")?,
        timestamp: row.try_get("timestamp")?,
    })
}

fn lp_event_from_row(row: &Row) -> Result<LpEvent, StoreError> {
    Ok(LpEvent {
        id: row.try_get("id")?,
        player_id: row.try_get("player_id")?,
        summoner_name: row.try_get("summoner_name")?,
        previous_tier: parse_opt(row, "previous_tier")?,
        previous_rank: parse_opt(row, "previous_rank")?,
        previous_lp: row.try_get("previous_lp")?,
        tier: parse_opt(row, "tier")?,
        rank: parse_opt(row, "rank")?,
        current_lp: row.try_get("current_lp")?,
        difference: row.try_get("difference")?,
        timestamp: row.try_get("timestamp")?,
    })
}

fn tier_str(snapshot: &RankSnapshot) -> Option<&'static str> {
    snapshot.tier.map(Tier::as_str)
}

fn rank_str(snapshot: &RankSnapshot) -> Option<&'static str> {
    snapshot.rank.map(|rank| rank.as_str())
}

impl PlayerStore for PgStore {
    async fn list_players(&self) -> Result<Vec<Player>, StoreError> {
        let sql = format!("SELECT {} FROM players ORDER BY id", PLAYER_COLUMNS);
        self.query(&sql, &[]).await?.iter().map(player_from_row).collect()
    }

    async fn get_player(&self, id: i64) -> Result<Option<Player>, StoreError> {
        let sql = format!("SELECT {} FROM players WHERE id = $1", PLAYER_COLUMNS);
        self.query(&sql, &[&id])
            .await?
            .first()
            .map(player_from_row)
            .transpose()
    }

    async fn get_player_by_puuid(&self, puuid: &str) -> Result<Option<Player>, StoreError> {
        let sql = format!("SELECT {} FROM players WHERE puuid = $1", PLAYER_COLUMNS);
        self.query(&sql, &[&puuid])
            .await?
            .first()
            .map(player_from_row)
            .transpose()
    }

    async fn insert_player(&self, player: &NewPlayer) -> Result<Player, StoreError> {
        let sql = format!(
            "INSERT INTO players(puuid, summoner_name, tier, rank, league_points, wins, losses,
                in_game, profile_icon_id, player_name, role, is_main, last_update)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, NOW())
            RETURNING {}",
            PLAYER_COLUMNS
        );
        let ranked = &player.ranked;
        let rows = self
            .query(
                &sql,
                &[
                    &player.puuid,
                    &player.summoner_name,
                    &tier_str(&ranked.snapshot),
                    &rank_str(&ranked.snapshot),
                    &ranked.snapshot.league_points,
                    &ranked.wins,
                    &ranked.losses,
                    &ranked.in_game,
                    &ranked.profile_icon_id,
                    &player.metadata.player_name,
                    &player.metadata.role,
                    &player.metadata.is_main,
                ],
            )
            .await?;
        let row = rows
            .first()
            .ok_or_else(|| StoreError::Decode("INSERT returned no row".to_owned()))?;
        player_from_row(row)
    }

    async fn update_metadata(
        &self,
        id: i64,
        metadata: &PlayerMetadata,
    ) -> Result<Option<Player>, StoreError> {
        let sql = format!(
            "UPDATE players SET player_name = $2, role = $3, is_main = $4 WHERE id = $1
            RETURNING {}",
            PLAYER_COLUMNS
        );
        self.query(
            &sql,
            &[&id, &metadata.player_name, &metadata.role, &metadata.is_main],
        )
        .await?
        .first()
        .map(player_from_row)
        .transpose()
    }

    async fn update_ranked(&self, id: i64, update: &RankedUpdate) -> Result<(), StoreError> {
        let ranked = &update.ranked;
        let updated = self
            .execute(
                "UPDATE players SET
                    puuid = $2,
                    summoner_name = $3,
                    tier = $4,
                    rank = $5,
                    league_points = $6,
                    wins = $7,
                    losses = $8,
                    in_game = $9,
                    profile_icon_id = $10,
                    last_update = $11
                WHERE id = $1",
                &[
                    &id,
                    &update.puuid,
                    &update.summoner_name,
                    &tier_str(&ranked.snapshot),
                    &rank_str(&ranked.snapshot),
                    &ranked.snapshot.league_points,
                    &ranked.wins,
                    &ranked.losses,
                    &ranked.in_game,
                    &ranked.profile_icon_id,
                    &update.last_update,
                ],
            )
            .await?;
        if 0 == updated {
            return Err(StoreError::NotFound(id));
        }
        Ok(())
    }

    async fn delete_player(&self, id: i64) -> Result<bool, StoreError> {
        let deleted = self
            .execute("DELETE FROM players WHERE id = $1", &[&id])
            .await?;
        Ok(0 < deleted)
    }
}

impl HistoryStore for PgStore {
    async fn latest_history(&self, player_id: i64) -> Result<Option<PlayerHistory>, StoreError> {
        let sql = format!(
            "SELECT {} FROM player_history WHERE player_id = $1 ORDER BY timestamp DESC LIMIT 1",
            HISTORY_COLUMNS
        );
        self.query(&sql, &[&player_id])
            .await?
            .first()
            .map(history_from_row)
            .transpose()
    }

    async fn insert_history(&self, entry: &NewHistory) -> Result<(), StoreError> {
        self.execute(
            "INSERT INTO player_history(player_id, tier, rank, league_points, wins, losses,
                timestamp)
            VALUES ($1, $2, $3, $4, $5, $6, $7)",
            &[
                &entry.player_id,
                &tier_str(&entry.snapshot),
                &rank_str(&entry.snapshot),
                &entry.snapshot.league_points,
                &entry.wins,
                &entry.losses,
                &entry.timestamp,
            ],
        )
        .await?;
        Ok(())
    }

    async fn list_history(
        &self,
        player_id: i64,
        limit: i64,
    ) -> Result<Vec<PlayerHistory>, StoreError> {
        let sql = format!(
            "SELECT {} FROM player_history WHERE player_id = $1 ORDER BY timestamp DESC LIMIT $2",
            HISTORY_COLUMNS
        );
        self.query(&sql, &[&player_id, &limit])
            .await?
            .iter()
            .map(history_from_row)
            .collect()
    }
}

impl LpEventStore for PgStore {
    async fn has_lp_event_since(
        &self,
        player_id: i64,
        current: &RankSnapshot,
        since: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let rows = self
            .query(
                "SELECT EXISTS(
                    SELECT 1 FROM lp_tracker
                    WHERE player_id = $1
                        AND tier IS NOT DISTINCT FROM $2
                        AND rank IS NOT DISTINCT FROM $3
                        AND current_lp = $4
                        AND timestamp >= $5
                )",
                &[
                    &player_id,
                    &tier_str(current),
                    &rank_str(current),
                    &current.league_points,
                    &since,
                ],
            )
            .await?;
        let row = rows
            .first()
            .ok_or_else(|| StoreError::Decode("EXISTS returned no row".to_owned()))?;
        Ok(row.try_get(0)?)
    }

    async fn insert_lp_event(&self, event: &NewLpEvent) -> Result<(), StoreError> {
        self.execute(
            "INSERT INTO lp_tracker(player_id, summoner_name, previous_tier, previous_rank,
                previous_lp, tier, rank, current_lp, difference, timestamp)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
            &[
                &event.player_id,
                &event.summoner_name,
                &tier_str(&event.previous),
                &rank_str(&event.previous),
                &event.previous.league_points,
                &tier_str(&event.current),
                &rank_str(&event.current),
                &event.current.league_points,
                &event.difference,
                &event.timestamp,
            ],
        )
        .await?;
        Ok(())
    }

    async fn list_lp_events(&self, player_id: i64, limit: i64) -> Result<Vec<LpEvent>, StoreError> {
        let sql = format!(
            "SELECT {} FROM lp_tracker WHERE player_id = $1 ORDER BY timestamp DESC LIMIT $2",
            LP_EVENT_COLUMNS
        );
        self.query(&sql, &[&player_id, &limit])
            .await?
            .iter()
            .map(lp_event_from_row)
            .collect()
    }
}
