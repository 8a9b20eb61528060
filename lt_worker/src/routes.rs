//! Internal HTTP API consumed by the frontend.

use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use http::header::CONTENT_TYPE;
use http::{Method, StatusCode};
use itertools::Itertools;
use serde_with::serde_as;
use tower_http::cors::{Any, CorsLayer};

use crate::db::{LpEvent, NewPlayer, Player, PlayerHistory, PlayerMetadata};
use crate::error::LtError;
use crate::retry::RetryPolicy;
use crate::riot::{GamePlayer, GameRecord, RankedApi};
use crate::schedule::RunSummary;
use crate::store::Store;
use crate::util::AppState;
use crate::webjob::{fetch_ranked, resolve_identity, split_riot_id, validate_identity};

/// Default and max rows returned by the history and LP routes.
const DEFAULT_LIMIT: i64 = 100;
const MAX_LIMIT: i64 = 1000;

/// Build the router.
pub fn router<S, A>(state: AppState<S, A>) -> Router
where
    S: Store + 'static,
    A: RankedApi + 'static,
{
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route(
            "/api/players",
            get(players_get::<S, A>).post(players_post::<S, A>),
        )
        .route("/api/leaderboard", get(leaderboard_get::<S, A>))
        .route(
            "/api/players/:id",
            get(player_get::<S, A>)
                .patch(player_patch::<S, A>)
                .delete(player_delete::<S, A>),
        )
        .route("/api/players/:id/history", get(history_get::<S, A>))
        .route("/api/players/:id/lp", get(lp_get::<S, A>))
        .route("/api/players/:id/games", get(games_get::<S, A>))
        .route("/api/update", post(update_post::<S, A>))
        .layer(cors)
        .with_state(state)
}

/// `POST /api/players` body.
#[derive(Clone, Debug, serde::Deserialize)]
pub struct AddPlayer {
    /// Riot ID, `gameName#tagLine`.
    pub summoner_name: String,
    /// Owner fields.
    #[serde(flatten)]
    pub metadata: PlayerMetadata,
}

/// `?limit=` for list routes.
#[derive(Clone, Copy, Debug, Default, serde::Deserialize)]
pub struct Limit {
    limit: Option<i64>,
}
impl Limit {
    fn get(self) -> i64 {
        self.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT)
    }
}

/// One player in a [`GameSummary`].
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct TeamMember {
    /// Riot ID game name.
    pub game_name: Option<String>,
    /// Champion name.
    pub champion_name: String,
}
impl From<&GamePlayer> for TeamMember {
    fn from(participant: &GamePlayer) -> Self {
        Self {
            game_name: participant.riot_id_game_name.clone(),
            champion_name: participant.champion_name.clone(),
        }
    }
}

/// One recent game, from one player's point of view.
#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize)]
pub struct GameSummary {
    /// Match ID.
    pub match_id: String,
    /// Start time (unix epoch milliseconds).
    #[serde_as(as = "serde_with::TimestampMilliSeconds<i64>")]
    pub game_start: DateTime<Utc>,
    /// Seconds.
    pub game_duration: i64,
    /// Queue ID.
    pub queue_id: u16,
    /// Champion played.
    pub champion_name: String,
    /// If the player's team won.
    pub win: bool,
    /// Kills.
    pub kills: i32,
    /// Deaths.
    pub deaths: i32,
    /// Assists.
    pub assists: i32,
    /// Damage dealt to champions.
    pub damage: i64,
    /// Non-empty item slots.
    pub items: Vec<i32>,
    /// Teammates, excluding the player.
    pub allies: Vec<TeamMember>,
    /// Opponents.
    pub enemies: Vec<TeamMember>,
}
impl GameSummary {
    /// Summarize `game` for `puuid`. `None` if the player is not a participant.
    pub fn new(game: &GameRecord, puuid: &str) -> Option<Self> {
        let me = game.participants.iter().find(|p| p.puuid == puuid)?;
        let (allies, enemies): (Vec<_>, Vec<_>) = game
            .participants
            .iter()
            .filter(|p| p.puuid != puuid)
            .partition(|p| p.team_id == me.team_id);
        Some(Self {
            match_id: game.match_id.clone(),
            game_start: DateTime::from_timestamp_millis(game.game_start_timestamp)?,
            game_duration: game.game_duration,
            queue_id: game.queue_id,
            champion_name: me.champion_name.clone(),
            win: me.win,
            kills: me.kills,
            deaths: me.deaths,
            assists: me.assists,
            damage: me.total_damage_dealt_to_champions.into(),
            items: me.items(),
            allies: allies.into_iter().map(TeamMember::from).collect(),
            enemies: enemies.into_iter().map(TeamMember::from).collect(),
        })
    }
}

async fn find_player<S: Store, A>(state: AppState<S, A>, id: i64) -> Result<Player, LtError> {
    state
        .scheduler
        .store
        .get_player(id)
        .await?
        .ok_or_else(|| LtError::NotFound(format!("No player with ID {}.", id)))
}

/// `GET /api/players`
pub async fn players_get<S: Store, A: RankedApi>(
    State(state): State<AppState<S, A>>,
) -> Result<Json<Vec<Player>>, LtError> {
    Ok(Json(state.scheduler.store.list_players().await?))
}

/// `GET /api/leaderboard`: highest rank first, unranked last.
pub async fn leaderboard_get<S: Store, A: RankedApi>(
    State(state): State<AppState<S, A>>,
) -> Result<Json<Vec<Player>>, LtError> {
    let players = state
        .scheduler
        .store
        .list_players()
        .await?
        .into_iter()
        .sorted_by(|a, b| {
            b.snapshot()
                .cmp(&a.snapshot())
                .then_with(|| a.summoner_name.cmp(&b.summoner_name))
        })
        .collect();
    Ok(Json(players))
}

/// `GET /api/players/:id`
pub async fn player_get<S: Store, A: RankedApi>(
    State(state): State<AppState<S, A>>,
    Path(id): Path<i64>,
) -> Result<Json<Player>, LtError> {
    Ok(Json(find_player(state, id).await?))
}

/// `POST /api/players`: resolve the Riot ID and current standing, without retries, then store.
pub async fn players_post<S: Store, A: RankedApi>(
    State(state): State<AppState<S, A>>,
    Json(body): Json<AddPlayer>,
) -> Result<(StatusCode, Json<Player>), LtError> {
    let AddPlayer {
        summoner_name,
        metadata,
    } = body;
    if metadata.player_name.trim().is_empty() {
        return Err(LtError::BadRequest("`player_name` is required.".to_owned()));
    }
    let riot_id = split_riot_id(summoner_name.trim())
        .ok_or_else(|| LtError::BadRequest("Expected Riot ID `gameName#tagLine`.".to_owned()))?;

    let (store, api) = (&state.scheduler.store, &state.scheduler.api);
    let retry = RetryPolicy::none();
    let identity = resolve_identity(api, &retry, riot_id, "").await?;
    let summoner_name = validate_identity(&identity)?;
    if store.get_player_by_puuid(&identity.puuid).await?.is_some() {
        return Err(LtError::BadRequest(format!(
            "`{}` is already tracked.",
            summoner_name
        )));
    }
    let ranked = fetch_ranked(api, &retry, &identity).await?;

    let player = store
        .insert_player(&NewPlayer {
            puuid: identity.puuid,
            summoner_name,
            ranked,
            metadata,
        })
        .await?;
    log::info!("Added `{}` (ID {}).", player.summoner_name, player.id);
    Ok((StatusCode::CREATED, Json(player)))
}

/// `PATCH /api/players/:id`: owner fields only.
pub async fn player_patch<S: Store, A: RankedApi>(
    State(state): State<AppState<S, A>>,
    Path(id): Path<i64>,
    Json(metadata): Json<PlayerMetadata>,
) -> Result<Json<Player>, LtError> {
    if metadata.player_name.trim().is_empty() {
        return Err(LtError::BadRequest("`player_name` is required.".to_owned()));
    }
    state
        .scheduler
        .store
        .update_metadata(id, &metadata)
        .await?
        .map(Json)
        .ok_or_else(|| LtError::NotFound(format!("No player with ID {}.", id)))
}

/// `DELETE /api/players/:id`
pub async fn player_delete<S: Store, A: RankedApi>(
    State(state): State<AppState<S, A>>,
    Path(id): Path<i64>,
) -> Result<StatusCode, LtError> {
    if state.scheduler.store.delete_player(id).await? {
        log::info!("Deleted player ID {}.", id);
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(LtError::NotFound(format!("No player with ID {}.", id)))
    }
}

/// `GET /api/players/:id/history`
pub async fn history_get<S: Store, A: RankedApi>(
    State(state): State<AppState<S, A>>,
    Path(id): Path<i64>,
    Query(limit): Query<Limit>,
) -> Result<Json<Vec<PlayerHistory>>, LtError> {
    let player = find_player(state, id).await?;
    let history = state
        .scheduler
        .store
        .list_history(player.id, limit.get())
        .await?;
    Ok(Json(history))
}

/// `GET /api/players/:id/lp`
pub async fn lp_get<S: Store, A: RankedApi>(
    State(state): State<AppState<S, A>>,
    Path(id): Path<i64>,
    Query(limit): Query<Limit>,
) -> Result<Json<Vec<LpEvent>>, LtError> {
    let player = find_player(state, id).await?;
    let events = state
        .scheduler
        .store
        .list_lp_events(player.id, limit.get())
        .await?;
    Ok(Json(events))
}

/// `GET /api/players/:id/games`: recent matches. Matches which fail to load are skipped.
pub async fn games_get<S: Store, A: RankedApi>(
    State(state): State<AppState<S, A>>,
    Path(id): Path<i64>,
) -> Result<Json<Vec<GameSummary>>, LtError> {
    let player = find_player(state, id).await?;
    let api = &state.scheduler.api;
    let match_ids = api
        .recent_match_ids(&player.puuid, state.games_count)
        .await?;
    let matches = join_all(match_ids.iter().map(|match_id| api.match_by_id(match_id))).await;
    let games = matches
        .into_iter()
        .zip(match_ids.iter())
        .filter_map(|(result, match_id)| match result {
            Ok(game) => GameSummary::new(&game, &player.puuid),
            Err(e) => {
                log::warn!("Failed to get match `{}`: {}", match_id, e);
                None
            }
        })
        .collect();
    Ok(Json(games))
}

/// `POST /api/update`: update every player now. `409` if an update is already running.
pub async fn update_post<S: Store, A: RankedApi>(
    State(state): State<AppState<S, A>>,
) -> Result<Json<RunSummary>, LtError> {
    let summary = state.scheduler.update_all_now().await?;
    log::info!("Manual update complete: {:?}", summary);
    Ok(Json(summary))
}
