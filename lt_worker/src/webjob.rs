//! Per-player update: refresh one player's identity and solo queue standing from the Riot API,
//! then record history and LP changes.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use futures::future::join;

use crate::db::{NewHistory, NewLpEvent, Player, RankedFields, RankedUpdate};
use crate::rank::{lp_delta, RankSnapshot};
use crate::retry::{with_retry, RetryPolicy};
use crate::riot::{Identity, RankedApi, RiotError, SoloStats};
use crate::store::{Store, StoreError};

/// A new history entry is written only once the latest one is strictly older than this many
/// hours. An entry exactly this old does not count as stale.
pub const HISTORY_INTERVAL_HOURS: i64 = 12;
/// Identical LP events within this many hours are dropped.
pub const LP_EVENT_DEDUP_HOURS: i64 = 1;

/// Placeholder produced by partial upstream responses.
const UNDEFINED_RIOT_ID: &str = "undefined#undefined";

/// Why a player was not updated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FailReason {
    /// Stored name is not `gameName#tagLine`.
    MalformedName,
    /// Neither the Riot ID nor the stored PUUID resolve.
    NotFound,
    /// Riot API failed after retries.
    Upstream(String),
    /// Resolved identity is missing parts.
    InvalidIdentity(String),
    /// Composed update is inconsistent.
    InvalidUpdate(String),
}
impl fmt::Display for FailReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailReason::MalformedName => f.write_str("malformed summoner name"),
            FailReason::NotFound => f.write_str("account not found by riot id or puuid"),
            FailReason::Upstream(msg) => write!(f, "riot api error: {}", msg),
            FailReason::InvalidIdentity(msg) => write!(f, "invalid identity: {}", msg),
            FailReason::InvalidUpdate(msg) => write!(f, "invalid update: {}", msg),
        }
    }
}
impl From<RiotError> for FailReason {
    fn from(value: RiotError) -> Self {
        if value.is_not_found() {
            Self::NotFound
        } else {
            Self::Upstream(value.to_string())
        }
    }
}

/// Result of updating one player.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Stored record was refreshed.
    Updated {
        /// Riot ID after the update.
        resolved_name: String,
    },
    /// Nothing was written to the player record.
    Failed {
        /// Stored Riot ID.
        name: String,
        /// Why.
        reason: FailReason,
    },
}
impl UpdateOutcome {
    /// If [`Self::Updated`].
    pub fn is_success(&self) -> bool {
        matches!(self, UpdateOutcome::Updated { .. })
    }
}

/// What an update needs.
pub struct UpdateContext<'a, S, A> {
    /// Database.
    pub store: &'a S,
    /// Riot API.
    pub api: &'a A,
    /// Retry policy for each Riot API call.
    pub retry: &'a RetryPolicy,
}
impl<S, A> Clone for UpdateContext<'_, S, A> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<S, A> Copy for UpdateContext<'_, S, A> {}

/// Splits `gameName#tagLine`. Both parts must be non-empty.
pub fn split_riot_id(name: &str) -> Option<(&str, &str)> {
    let (game_name, tag_line) = name.split_once('#')?;
    (!game_name.trim().is_empty() && !tag_line.trim().is_empty()).then_some((game_name, tag_line))
}

/// Checks a resolved identity is complete. Returns the `gameName#tagLine` display name.
pub fn validate_identity(identity: &Identity) -> Result<String, FailReason> {
    if identity.puuid.trim().is_empty() {
        return Err(FailReason::InvalidIdentity("empty puuid".to_owned()));
    }
    let game_name = identity.game_name.as_deref().unwrap_or_default();
    let tag_line = identity.tag_line.as_deref().unwrap_or_default();
    if game_name.trim().is_empty() || tag_line.trim().is_empty() {
        return Err(FailReason::InvalidIdentity(format!(
            "missing game name or tag line for {}",
            identity.puuid
        )));
    }
    let name = identity.display_name();
    if UNDEFINED_RIOT_ID == name {
        return Err(FailReason::InvalidIdentity(format!(
            "placeholder riot id for {}",
            identity.puuid
        )));
    }
    Ok(name)
}

/// Checks an update before it is written.
pub fn validate_update(update: &RankedUpdate) -> Result<(), FailReason> {
    let invalid = |msg: &str| -> Result<(), FailReason> {
        Err(FailReason::InvalidUpdate(msg.to_owned()))
    };
    let ranked = &update.ranked;
    if update.puuid.trim().is_empty() {
        return invalid("empty puuid");
    }
    if split_riot_id(&update.summoner_name).is_none() {
        return invalid("bad summoner name");
    }
    if ranked.snapshot.league_points < 0 || ranked.wins < 0 || ranked.losses < 0 {
        return invalid("negative league points, wins, or losses");
    }
    if ranked.snapshot.tier.is_some() != ranked.snapshot.rank.is_some() {
        return invalid("tier and division must both be present or absent");
    }
    Ok(())
}

/// Looks up the account by Riot ID, falling back to `stored_puuid` if the Riot ID no longer
/// exists, then its summoner.
pub async fn resolve_identity<A: RankedApi>(
    api: &A,
    retry: &RetryPolicy,
    (game_name, tag_line): (&str, &str),
    stored_puuid: &str,
) -> Result<Identity, FailReason> {
    let context = format!("account {}#{}", game_name, tag_line);
    let by_riot_id = with_retry(retry, &context, || api.account_by_riot_id(game_name, tag_line));
    let account = match by_riot_id.await {
        Ok(account) => account,
        Err(e) if e.is_not_found() && !stored_puuid.is_empty() => {
            log::info!("{} not found, falling back to puuid {}.", context, stored_puuid);
            let context = format!("account puuid {}", stored_puuid);
            with_retry(retry, &context, || api.account_by_puuid(stored_puuid)).await?
        }
        Err(e) => return Err(e.into()),
    };
    let context = format!("summoner {}", account.puuid);
    let summoner = with_retry(retry, &context, || api.summoner_by_puuid(&account.puuid)).await?;
    Ok(Identity::new(account, summoner))
}

/// Fetches the solo queue standing and in-game flag together.
pub async fn fetch_ranked<A: RankedApi>(
    api: &A,
    retry: &RetryPolicy,
    identity: &Identity,
) -> Result<RankedFields, FailReason> {
    let puuid = identity.puuid.as_str();
    let league_context = format!("league {}", puuid);
    let game_context = format!("spectator {}", puuid);
    let (entries, in_game) = join(
        with_retry(retry, &league_context, || api.league_entries(puuid)),
        with_retry(retry, &game_context, || api.in_game(puuid)),
    )
    .await;
    let solo = SoloStats::from_entries(&entries?);
    Ok(RankedFields {
        snapshot: solo.snapshot,
        wins: solo.wins,
        losses: solo.losses,
        in_game: in_game?,
        profile_icon_id: identity.profile_icon_id,
    })
}

/// Update one player.
///
/// Lookup and validation failures are returned as [`UpdateOutcome::Failed`] and leave the stored
/// record untouched. History and LP event failures are logged and skipped. A failure to write
/// the player record itself is returned as `Err`.
pub async fn update_player<S: Store, A: RankedApi>(
    ctx: UpdateContext<'_, S, A>,
    player: &Player,
    now: DateTime<Utc>,
) -> Result<UpdateOutcome, StoreError> {
    let failed = |reason: FailReason| -> Result<UpdateOutcome, StoreError> {
        log::warn!("Failed to update `{}` (ID {}): {}", player.summoner_name, player.id, reason);
        Ok(UpdateOutcome::Failed {
            name: player.summoner_name.clone(),
            reason,
        })
    };

    let Some(riot_id) = split_riot_id(&player.summoner_name) else {
        return failed(FailReason::MalformedName);
    };
    let identity = match resolve_identity(ctx.api, ctx.retry, riot_id, &player.puuid).await {
        Ok(identity) => identity,
        Err(reason) => return failed(reason),
    };
    let resolved_name = match validate_identity(&identity) {
        Ok(name) => name,
        Err(reason) => return failed(reason),
    };
    let ranked = match fetch_ranked(ctx.api, ctx.retry, &identity).await {
        Ok(ranked) => ranked,
        Err(reason) => return failed(reason),
    };
    let update = RankedUpdate {
        puuid: identity.puuid,
        summoner_name: resolved_name.clone(),
        ranked,
        last_update: now,
    };
    if let Err(reason) = validate_update(&update) {
        return failed(reason);
    }

    if let Err(e) = record_history(ctx.store, player.id, &update, now).await {
        log::error!("Failed to record history for `{}`: {}", resolved_name, e);
    }
    if let Err(e) = record_lp_event(ctx.store, player, &update, now).await {
        log::error!("Failed to record LP event for `{}`: {}", resolved_name, e);
    }

    ctx.store.update_ranked(player.id, &update).await?;
    if resolved_name != player.summoner_name {
        log::info!("`{}` is now `{}`.", player.summoner_name, resolved_name);
    }
    log::debug!("Updated `{}`: {:?}", resolved_name, update.ranked);
    Ok(UpdateOutcome::Updated { resolved_name })
}

/// Appends a history entry if the update has ranked data and the latest entry is missing or
/// more than [`HISTORY_INTERVAL_HOURS`] old. Returns if an entry was written.
pub async fn record_history<S: Store>(
    store: &S,
    player_id: i64,
    update: &RankedUpdate,
    now: DateTime<Utc>,
) -> Result<bool, StoreError> {
    if !update.ranked.snapshot.is_ranked() {
        return Ok(false);
    }
    if let Some(latest) = store.latest_history(player_id).await? {
        if now - latest.timestamp <= Duration::hours(HISTORY_INTERVAL_HOURS) {
            return Ok(false);
        }
    }
    store
        .insert_history(&NewHistory {
            player_id,
            snapshot: update.ranked.snapshot,
            wins: update.ranked.wins,
            losses: update.ranked.losses,
            timestamp: now,
        })
        .await?;
    Ok(true)
}

/// Appends an LP event if the standing changed and no identical event was recorded in the last
/// [`LP_EVENT_DEDUP_HOURS`]. Returns if an event was written.
pub async fn record_lp_event<S: Store>(
    store: &S,
    player: &Player,
    update: &RankedUpdate,
    now: DateTime<Utc>,
) -> Result<bool, StoreError> {
    let previous: RankSnapshot = player.snapshot();
    let current = update.ranked.snapshot;
    if previous == current {
        return Ok(false);
    }
    let since = now - Duration::hours(LP_EVENT_DEDUP_HOURS);
    if store.has_lp_event_since(player.id, &current, since).await? {
        log::debug!("Skipping duplicate LP event for `{}`.", update.summoner_name);
        return Ok(false);
    }
    let difference = lp_delta(&previous, &current);
    store
        .insert_lp_event(&NewLpEvent {
            player_id: player.id,
            summoner_name: update.summoner_name.clone(),
            previous,
            current,
            difference,
            timestamp: now,
        })
        .await?;
    log::info!(
        "`{}`: {:?} {:?} {} -> {:?} {:?} {} ({:+})",
        update.summoner_name,
        previous.tier,
        previous.rank,
        previous.league_points,
        current.tier,
        current.rank,
        current.league_points,
        difference,
    );
    Ok(true)
}
