//! Model structs corresponding to database tables. Must be kept in sync with migrations.

use chrono::{DateTime, Utc};
use serde_with::serde_as;

use crate::rank::{Division, RankSnapshot, Tier};

/// A tracked Riot account.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Player {
    /// PK ID.
    pub id: i64,

    /// Riot PUUID (player universally unique ID). The only provider identity stored.
    pub puuid: String,
    /// Riot ID, `game_name#tag_line`.
    pub summoner_name: String,

    /// Solo queue tier, `None` if unranked.
    pub tier: Option<Tier>,
    /// Solo queue division, `None` if unranked.
    pub rank: Option<Division>,
    /// League points.
    pub league_points: i32,
    /// Solo queue wins.
    pub wins: i32,
    /// Solo queue losses.
    pub losses: i32,
    /// If currently in a game.
    pub in_game: bool,
    /// Profile icon ID.
    pub profile_icon_id: Option<i32>,

    /// Human owner of the account.
    pub player_name: String,
    /// Preferred role.
    pub role: Option<String>,
    /// If this is the owner's main account.
    pub is_main: bool,

    /// Last successful update (unix epoch milliseconds).
    #[serde_as(as = "Option<serde_with::TimestampMilliSeconds<i64>>")]
    pub last_update: Option<DateTime<Utc>>,
}
impl Player {
    /// Current solo queue standing.
    pub fn snapshot(&self) -> RankSnapshot {
        RankSnapshot {
            tier: self.tier,
            rank: self.rank,
            league_points: self.league_points,
        }
    }
}

/// Fields written when an owner registers an account.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewPlayer {
    /// Resolved PUUID.
    pub puuid: String,
    /// Resolved Riot ID.
    pub summoner_name: String,
    /// Initial ranked state.
    pub ranked: RankedFields,
    /// Owner metadata.
    pub metadata: PlayerMetadata,
}

/// Owner-editable fields. Never written by the updater.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PlayerMetadata {
    /// Human owner of the account.
    pub player_name: String,
    /// Preferred role.
    #[serde(default)]
    pub role: Option<String>,
    /// If this is the owner's main account.
    #[serde(default)]
    pub is_main: bool,
}

/// Ranked fields, shared by registration and updates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RankedFields {
    /// Tier/division/LP.
    pub snapshot: RankSnapshot,
    /// Wins.
    pub wins: i32,
    /// Losses.
    pub losses: i32,
    /// If currently in a game.
    pub in_game: bool,
    /// Profile icon ID.
    pub profile_icon_id: i32,
}

/// Fields written by the updater. Never touches [`PlayerMetadata`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RankedUpdate {
    /// Resolved PUUID.
    pub puuid: String,
    /// Resolved Riot ID.
    pub summoner_name: String,
    /// New ranked state.
    pub ranked: RankedFields,
    /// Time of this update.
    pub last_update: DateTime<Utc>,
}

/// Periodic ranked snapshot.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PlayerHistory {
    /// PK ID.
    pub id: i64,
    /// FK [`Player::id`].
    pub player_id: i64,
    /// Tier.
    pub tier: Option<Tier>,
    /// Division.
    pub rank: Option<Division>,
    /// League points.
    pub league_points: i32,
    /// Wins.
    pub wins: i32,
    /// Losses.
    pub losses: i32,
    /// When the snapshot was taken (unix epoch milliseconds).
    #[serde_as(as = "serde_with::TimestampMilliSeconds<i64>")]
    pub timestamp: DateTime<Utc>,
}

/// Insert payload for [`PlayerHistory`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewHistory {
    /// FK [`Player::id`].
    pub player_id: i64,
    /// Tier/division/LP.
    pub snapshot: RankSnapshot,
    /// Wins.
    pub wins: i32,
    /// Losses.
    pub losses: i32,
    /// When the snapshot was taken.
    pub timestamp: DateTime<Utc>,
}

/// A rank change, as seen between two updates.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct LpEvent {
    /// PK ID.
    pub id: i64,
    /// FK [`Player::id`].
    pub player_id: i64,
    /// Riot ID at the time of the change.
    pub summoner_name: String,
    /// Previous tier.
    pub previous_tier: Option<Tier>,
    /// Previous division.
    pub previous_rank: Option<Division>,
    /// Previous league points.
    pub previous_lp: i32,
    /// New tier.
    pub tier: Option<Tier>,
    /// New division.
    pub rank: Option<Division>,
    /// New league points.
    pub current_lp: i32,
    /// Signed LP change, see [`crate::rank::lp_delta`].
    pub difference: i32,
    /// When the change was seen (unix epoch milliseconds).
    #[serde_as(as = "serde_with::TimestampMilliSeconds<i64>")]
    pub timestamp: DateTime<Utc>,
}

/// Insert payload for [`LpEvent`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewLpEvent {
    /// FK [`Player::id`].
    pub player_id: i64,
    /// Riot ID at the time of the change.
    pub summoner_name: String,
    /// Stored standing before the update.
    pub previous: RankSnapshot,
    /// Standing after the update.
    pub current: RankSnapshot,
    /// Signed LP change.
    pub difference: i32,
    /// When the change was seen.
    pub timestamp: DateTime<Utc>,
}
