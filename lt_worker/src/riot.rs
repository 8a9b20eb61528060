//! Riot Games API access, through [`riven`].
//!
//! The [`RiotApi`] is built with retries turned off, so every call is one attempt and
//! [`crate::retry`] alone decides how 404/429/503 are handled.

use std::fmt;
use std::future::Future;
use std::time::Duration;

use riven::consts::{PlatformRoute, QueueType, RegionalRoute, Team};
use riven::models::account_v1::Account;
use riven::models::league_v4::LeagueEntry;
use riven::models::match_v5;
use riven::models::summoner_v4::Summoner;
use riven::reqwest::header::{HeaderMap, HeaderValue, RETRY_AFTER};
use riven::reqwest::{ClientBuilder, StatusCode};
use riven::{RiotApi, RiotApiConfig, RiotApiError};
use secrecy::{ExposeSecret, SecretString};

use crate::rank::{Division, RankSnapshot, Tier};
use crate::retry::{Classify, Failure};

/// Per-request timeout.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Identity resolved from account-v1 and summoner-v4.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Identity {
    /// Riot PUUID.
    pub puuid: String,
    /// Riot ID game name, may be missing in partial responses.
    pub game_name: Option<String>,
    /// Riot ID tag line, may be missing in partial responses.
    pub tag_line: Option<String>,
    /// Profile icon ID.
    pub profile_icon_id: i32,
}
impl Identity {
    /// Joins an account and its summoner.
    pub fn new(account: Account, summoner: Summoner) -> Self {
        Self {
            puuid: account.puuid,
            game_name: account.game_name,
            tag_line: account.tag_line,
            profile_icon_id: summoner.profile_icon_id,
        }
    }

    /// `gameName#tagLine`, with `undefined` standing in for missing parts.
    pub fn display_name(&self) -> String {
        format!(
            "{}#{}",
            self.game_name.as_deref().unwrap_or("undefined"),
            self.tag_line.as_deref().unwrap_or("undefined"),
        )
    }
}

/// Solo queue standing, extracted from a player's league entries.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SoloStats {
    /// Tier/division/LP.
    pub snapshot: RankSnapshot,
    /// Wins.
    pub wins: i32,
    /// Losses.
    pub losses: i32,
}
impl SoloStats {
    /// Picks the solo queue entry. No entry (including an empty list) means unranked.
    ///
    /// Tiers and divisions outside the ranked ladder (e.g. `UNRANKED`, `V`) map to `None`.
    pub fn from_entries(entries: &[LeagueEntry]) -> Self {
        entries
            .iter()
            .find(|entry| entry.queue_type == QueueType::RANKED_SOLO_5x5)
            .map(|entry| Self {
                snapshot: RankSnapshot {
                    tier: entry.tier.and_then(|tier| tier.as_ref().parse::<Tier>().ok()),
                    rank: entry.rank.and_then(|rank| rank.as_ref().parse::<Division>().ok()),
                    league_points: entry.league_points,
                },
                wins: entry.wins,
                losses: entry.losses,
            })
            .unwrap_or_default()
    }
}

/// A finished match, reduced from [`match_v5::Match`] to what the games view shows.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GameRecord {
    /// Match ID, e.g. `NA1_1234`.
    pub match_id: String,
    /// Start time, unix epoch milliseconds.
    pub game_start_timestamp: i64,
    /// Seconds.
    pub game_duration: i64,
    /// Queue ID.
    pub queue_id: u16,
    /// All participants.
    pub participants: Vec<GamePlayer>,
}
impl From<match_v5::Match> for GameRecord {
    fn from(game: match_v5::Match) -> Self {
        Self {
            match_id: game.metadata.match_id,
            game_start_timestamp: game.info.game_start_timestamp,
            game_duration: game.info.game_duration,
            queue_id: game.info.queue_id.0,
            participants: game.info.participants.iter().map(GamePlayer::from).collect(),
        }
    }
}

/// One participant of a [`GameRecord`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GamePlayer {
    /// Riot PUUID.
    pub puuid: String,
    /// Riot ID game name.
    pub riot_id_game_name: Option<String>,
    /// Champion name.
    pub champion_name: String,
    /// Team.
    pub team_id: Team,
    /// If this participant's team won.
    pub win: bool,
    /// Kills.
    pub kills: i32,
    /// Deaths.
    pub deaths: i32,
    /// Assists.
    pub assists: i32,
    /// Damage dealt to champions.
    pub total_damage_dealt_to_champions: i32,
    /// Item slots 0 to 5, then the trinket.
    pub items: [i32; 7],
}
impl GamePlayer {
    /// Non-empty item slots.
    pub fn items(&self) -> Vec<i32> {
        self.items.into_iter().filter(|&item| item != 0).collect()
    }
}
impl From<&match_v5::Participant> for GamePlayer {
    fn from(p: &match_v5::Participant) -> Self {
        Self {
            puuid: p.puuid.clone(),
            riot_id_game_name: p.riot_id_game_name.clone(),
            champion_name: p.champion_name.clone(),
            team_id: p.team_id,
            win: p.win,
            kills: p.kills,
            deaths: p.deaths,
            assists: p.assists,
            total_damage_dealt_to_champions: p.total_damage_dealt_to_champions,
            items: [p.item0, p.item1, p.item2, p.item3, p.item4, p.item5, p.item6],
        }
    }
}

/// Failed Riot API request.
#[derive(Debug)]
pub enum RiotError {
    /// Non-2xx response.
    Status {
        /// Response status.
        status: StatusCode,
        /// Raw `Retry-After` header.
        retry_after: Option<String>,
        /// Request path.
        path: String,
    },
    /// Connection, timeout, or body decoding failure.
    Request(RiotApiError),
    /// The endpoint answered 404 (or 204) for this resource.
    NotFound(String),
    /// Client could not be built.
    Config(String),
}
impl RiotError {
    /// Response status, if a response was received.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            RiotError::Status { status, .. } => Some(*status),
            RiotError::Request(e) => e.status_code(),
            RiotError::NotFound(_) => Some(StatusCode::NOT_FOUND),
            RiotError::Config(_) => None,
        }
    }

    /// If the resource does not exist.
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(StatusCode::NOT_FOUND)
    }
}
impl fmt::Display for RiotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiotError::Status { status, path, .. } => {
                write!(f, "Riot API `{}` returned {}", path, status)
            }
            RiotError::Request(e) => write!(f, "Riot API request failed: {}", e),
            RiotError::NotFound(what) => write!(f, "Riot API has no {}", what),
            RiotError::Config(msg) => write!(f, "Bad Riot API config: {}", msg),
        }
    }
}
impl std::error::Error for RiotError {}
impl From<RiotApiError> for RiotError {
    fn from(value: RiotApiError) -> Self {
        let Some(status) = value.status_code().filter(|status| !status.is_success()) else {
            return Self::Request(value);
        };
        let response = value.response();
        let retry_after = response
            .and_then(|r| r.headers().get(RETRY_AFTER))
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let path = response
            .map(|r| r.url().path().to_owned())
            .unwrap_or_default();
        log::debug!("GET `{}` -> {}", path, status);
        Self::Status {
            status,
            retry_after,
            path,
        }
    }
}
impl Classify for RiotError {
    fn classify(&self) -> Failure {
        match self {
            RiotError::Status {
                status: StatusCode::TOO_MANY_REQUESTS,
                retry_after,
                ..
            } => Failure::RateLimited {
                retry_after: retry_after.clone(),
            },
            _ => match self.status() {
                Some(StatusCode::SERVICE_UNAVAILABLE) => Failure::Unavailable,
                Some(StatusCode::NOT_FOUND) => Failure::NotFound,
                _ => Failure::Other,
            },
        }
    }
}

/// The ranked-game provider, as used by reconciliation and the HTTP routes.
pub trait RankedApi: Send + Sync {
    /// account-v1 by Riot ID.
    fn account_by_riot_id(
        &self,
        game_name: &str,
        tag_line: &str,
    ) -> impl Future<Output = Result<Account, RiotError>> + Send;
    /// account-v1 by PUUID.
    fn account_by_puuid(&self, puuid: &str)
        -> impl Future<Output = Result<Account, RiotError>> + Send;
    /// summoner-v4 by PUUID.
    fn summoner_by_puuid(
        &self,
        puuid: &str,
    ) -> impl Future<Output = Result<Summoner, RiotError>> + Send;
    /// league-v4 entries by PUUID.
    fn league_entries(
        &self,
        puuid: &str,
    ) -> impl Future<Output = Result<Vec<LeagueEntry>, RiotError>> + Send;
    /// spectator-v5: if the player is currently in a game.
    fn in_game(&self, puuid: &str) -> impl Future<Output = Result<bool, RiotError>> + Send;
    /// match-v5 recent match IDs, newest first.
    fn recent_match_ids(
        &self,
        puuid: &str,
        count: u32,
    ) -> impl Future<Output = Result<Vec<String>, RiotError>> + Send;
    /// match-v5 match details.
    fn match_by_id(
        &self,
        match_id: &str,
    ) -> impl Future<Output = Result<GameRecord, RiotError>> + Send;
}

/// Riot API client for one platform and its regional cluster.
pub struct RiotClient {
    rgapi: RiotApi,
    platform: PlatformRoute,
    region: RegionalRoute,
}
impl RiotClient {
    /// Build the client. `base_url` is normally [`RiotApiConfig::DEFAULT_BASE_URL`], where `{}`
    /// is replaced by the route.
    pub fn new(
        api_key: SecretString,
        platform: PlatformRoute,
        region: RegionalRoute,
        base_url: impl Into<String>,
    ) -> Result<Self, RiotError> {
        let mut token = HeaderValue::from_str(api_key.expose_secret())
            .map_err(|e| RiotError::Config(format!("`RGAPI_KEY`: {}", e)))?;
        token.set_sensitive(true);
        let mut headers = HeaderMap::new();
        headers.insert(RiotApiConfig::RIOT_KEY_HEADER, token);
        let client_builder = ClientBuilder::new()
            .user_agent(concat!("lptracker/", env!("CARGO_PKG_VERSION")))
            .timeout(REQUEST_TIMEOUT)
            .default_headers(headers);
        let config = RiotApiConfig::with_client_builder(client_builder)
            .set_base_url(base_url)
            .set_retries(0);
        let rgapi = RiotApi::new(config);
        log::info!("rgapi initialized for {} ({})", platform, region);
        Ok(Self {
            rgapi,
            platform,
            region,
        })
    }
}
impl RankedApi for RiotClient {
    async fn account_by_riot_id(
        &self,
        game_name: &str,
        tag_line: &str,
    ) -> Result<Account, RiotError> {
        self.rgapi
            .account_v1()
            .get_by_riot_id(self.region, game_name, tag_line)
            .await?
            .ok_or_else(|| RiotError::NotFound(format!("account `{}#{}`", game_name, tag_line)))
    }

    async fn account_by_puuid(&self, puuid: &str) -> Result<Account, RiotError> {
        Ok(self.rgapi.account_v1().get_by_puuid(self.region, puuid).await?)
    }

    async fn summoner_by_puuid(&self, puuid: &str) -> Result<Summoner, RiotError> {
        self.rgapi
            .summoner_v4()
            .get_by_puuid(self.platform, puuid)
            .await?
            .ok_or_else(|| RiotError::NotFound(format!("summoner `{}`", puuid)))
    }

    async fn league_entries(&self, puuid: &str) -> Result<Vec<LeagueEntry>, RiotError> {
        Ok(self
            .rgapi
            .league_v4()
            .get_league_entries_by_puuid(self.platform, puuid)
            .await?)
    }

    async fn in_game(&self, puuid: &str) -> Result<bool, RiotError> {
        let game = self
            .rgapi
            .spectator_v5()
            .get_current_game_info_by_puuid(self.platform, puuid)
            .await?;
        Ok(game.is_some())
    }

    async fn recent_match_ids(&self, puuid: &str, count: u32) -> Result<Vec<String>, RiotError> {
        let count = i32::try_from(count).unwrap_or(i32::MAX);
        Ok(self
            .rgapi
            .match_v5()
            .get_match_ids_by_puuid(self.region, puuid, Some(count), None, None, None, None, None)
            .await?)
    }

    async fn match_by_id(&self, match_id: &str) -> Result<GameRecord, RiotError> {
        self.rgapi
            .match_v5()
            .get_match(self.region, match_id)
            .await?
            .map(GameRecord::from)
            .ok_or_else(|| RiotError::NotFound(format!("match `{}`", match_id)))
    }
}
