//! In-memory [`Store`](crate::store::Store) and [`RankedApi`] for tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration as StdDuration;

use chrono::{DateTime, TimeZone, Utc};
use riven::consts::{Division as RivenDivision, QueueType, Tier as RivenTier};
use riven::models::account_v1::Account;
use riven::models::league_v4::LeagueEntry;
use riven::models::summoner_v4::Summoner;
use riven::reqwest::StatusCode;
use tokio::time::Instant;

use crate::db::{
    LpEvent, NewHistory, NewLpEvent, NewPlayer, Player, PlayerHistory, PlayerMetadata,
    RankedUpdate,
};
use crate::rank::RankSnapshot;
use crate::riot::{GameRecord, RankedApi, RiotError};
use crate::store::{HistoryStore, LpEventStore, PlayerStore, StoreError};

/// Fixed "now" for tests.
pub fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

/// Paused-clock sleeps round up to the millisecond.
pub fn assert_elapsed(start: Instant, expected: StdDuration) {
    let elapsed = start.elapsed();
    assert!(
        expected <= elapsed && elapsed < expected + StdDuration::from_millis(5),
        "expected {:?}, elapsed {:?}",
        expected,
        elapsed
    );
}

fn status(status: StatusCode) -> RiotError {
    RiotError::Status {
        status,
        retry_after: None,
        path: "/fake".to_owned(),
    }
}

fn account(puuid: &str, game_name: Option<&str>, tag_line: Option<&str>) -> Account {
    serde_json::from_value(serde_json::json!({
        "puuid": puuid,
        "gameName": game_name,
        "tagLine": tag_line,
    }))
    .unwrap()
}

#[derive(Clone)]
struct FakeAccount {
    puuid: String,
    game_name: Option<String>,
    tag_line: Option<String>,
    riot_id: (String, String),
    snapshot: RankSnapshot,
    in_game: bool,
}

/// Fake Riot API. Unknown accounts are 404s.
#[derive(Default)]
pub struct FakeApi {
    accounts: Mutex<Vec<FakeAccount>>,
    /// Remaining scripted failures per PUUID, returned by `league_entries`.
    league_failures: Mutex<HashMap<String, Vec<StatusCode>>>,
    /// Newest last.
    matches: Mutex<Vec<GameRecord>>,
    calls: Mutex<Vec<&'static str>>,
}
impl FakeApi {
    /// Add a complete account.
    pub fn add_account(
        &self,
        puuid: &str,
        game_name: &str,
        tag_line: &str,
        snapshot: RankSnapshot,
    ) {
        self.accounts.lock().unwrap().push(FakeAccount {
            puuid: puuid.to_owned(),
            game_name: Some(game_name.to_owned()),
            tag_line: Some(tag_line.to_owned()),
            riot_id: (game_name.to_owned(), tag_line.to_owned()),
            snapshot,
            in_game: false,
        });
    }

    /// Add an account found by Riot ID whose response lacks `gameName` and `tagLine`.
    pub fn add_partial_account(&self, puuid: &str, game_name: &str, tag_line: &str) {
        self.accounts.lock().unwrap().push(FakeAccount {
            puuid: puuid.to_owned(),
            game_name: None,
            tag_line: None,
            riot_id: (game_name.to_owned(), tag_line.to_owned()),
            snapshot: RankSnapshot::UNRANKED,
            in_game: false,
        });
    }

    /// Change an account's standing.
    pub fn set_snapshot(&self, puuid: &str, snapshot: RankSnapshot) {
        for account in self.accounts.lock().unwrap().iter_mut() {
            if account.puuid == puuid {
                account.snapshot = snapshot;
            }
        }
    }

    /// Make the next `league_entries` calls for `puuid` fail with `statuses`, in order.
    pub fn fail_league(&self, puuid: &str, statuses: &[StatusCode]) {
        let mut statuses = statuses.to_vec();
        statuses.reverse();
        self.league_failures
            .lock()
            .unwrap()
            .insert(puuid.to_owned(), statuses);
    }

    /// Add a finished match.
    pub fn add_match(&self, game: GameRecord) {
        self.matches.lock().unwrap().push(game);
    }

    /// Total API calls.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Calls to one endpoint.
    pub fn calls_to(&self, name: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|&&c| c == name)
            .count()
    }

    fn record(&self, name: &'static str) {
        self.calls.lock().unwrap().push(name);
    }

    fn find(&self, pred: impl Fn(&FakeAccount) -> bool) -> Result<FakeAccount, RiotError> {
        self.accounts
            .lock()
            .unwrap()
            .iter()
            .find(|account| pred(account))
            .cloned()
            .ok_or_else(|| RiotError::NotFound("account".to_owned()))
    }
}
impl RankedApi for FakeApi {
    async fn account_by_riot_id(
        &self,
        game_name: &str,
        tag_line: &str,
    ) -> Result<Account, RiotError> {
        self.record("account_by_riot_id");
        let found = self.find(|a| a.riot_id.0 == game_name && a.riot_id.1 == tag_line)?;
        Ok(account(&found.puuid, found.game_name.as_deref(), found.tag_line.as_deref()))
    }

    async fn account_by_puuid(&self, puuid: &str) -> Result<Account, RiotError> {
        self.record("account_by_puuid");
        let found = self.find(|a| a.puuid == puuid)?;
        Ok(account(&found.puuid, found.game_name.as_deref(), found.tag_line.as_deref()))
    }

    async fn summoner_by_puuid(&self, puuid: &str) -> Result<Summoner, RiotError> {
        self.record("summoner_by_puuid");
        let found = self.find(|a| a.puuid == puuid)?;
        Ok(Summoner {
            profile_icon_id: 29,
            revision_date: 0,
            puuid: found.puuid,
            summoner_level: 300,
            id: None,
        })
    }

    async fn league_entries(&self, puuid: &str) -> Result<Vec<LeagueEntry>, RiotError> {
        self.record("league_entries");
        if let Some(failure) = self
            .league_failures
            .lock()
            .unwrap()
            .get_mut(puuid)
            .and_then(Vec::pop)
        {
            return Err(status(failure));
        }
        let found = self.find(|a| a.puuid == puuid)?;
        let snapshot = found.snapshot;
        if !snapshot.is_ranked() {
            return Ok(Vec::new());
        }
        Ok(vec![LeagueEntry {
            league_id: None,
            puuid: found.puuid,
            queue_type: QueueType::RANKED_SOLO_5x5,
            tier: snapshot.tier.map(|tier| tier.as_str().parse::<RivenTier>().unwrap()),
            rank: snapshot.rank.map(|rank| rank.as_str().parse::<RivenDivision>().unwrap()),
            league_points: snapshot.league_points,
            wins: 20,
            losses: 18,
            hot_streak: false,
            veteran: false,
            fresh_blood: false,
            inactive: false,
            mini_series: None,
            summoner_id: None,
        }])
    }

    async fn in_game(&self, puuid: &str) -> Result<bool, RiotError> {
        self.record("in_game");
        Ok(self.find(|a| a.puuid == puuid)?.in_game)
    }

    async fn recent_match_ids(&self, puuid: &str, count: u32) -> Result<Vec<String>, RiotError> {
        self.record("recent_match_ids");
        Ok(self
            .matches
            .lock()
            .unwrap()
            .iter()
            .rev()
            .filter(|game| game.participants.iter().any(|p| p.puuid == puuid))
            .take(count as usize)
            .map(|game| game.match_id.clone())
            .collect())
    }

    async fn match_by_id(&self, match_id: &str) -> Result<GameRecord, RiotError> {
        self.record("match_by_id");
        self.matches
            .lock()
            .unwrap()
            .iter()
            .find(|game| game.match_id == match_id)
            .cloned()
            .ok_or_else(|| RiotError::NotFound(format!("match `{}`", match_id)))
    }
}

#[derive(Default)]
struct MemState {
    next_id: i64,
    players: Vec<Player>,
    history: Vec<PlayerHistory>,
    events: Vec<LpEvent>,
}
impl MemState {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-memory store.
#[derive(Default)]
pub struct MemStore {
    state: Mutex<MemState>,
    writes: AtomicUsize,
    fail_player_writes: AtomicBool,
    fail_list: AtomicBool,
}
impl MemStore {
    /// Add a player directly, bypassing write counting.
    pub fn add_player(&self, summoner_name: &str, puuid: &str, snapshot: RankSnapshot) -> Player {
        let mut state = self.state.lock().unwrap();
        let player = Player {
            id: state.next_id(),
            puuid: puuid.to_owned(),
            summoner_name: summoner_name.to_owned(),
            tier: snapshot.tier,
            rank: snapshot.rank,
            league_points: snapshot.league_points,
            wins: 0,
            losses: 0,
            in_game: false,
            profile_icon_id: None,
            player_name: "owner".to_owned(),
            role: None,
            is_main: true,
            last_update: None,
        };
        state.players.push(player.clone());
        player
    }

    /// Number of writes made through the store traits.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Make `update_ranked` fail.
    pub fn fail_player_writes(&self, fail: bool) {
        self.fail_player_writes.store(fail, Ordering::SeqCst);
    }

    /// Make `list_players` fail.
    pub fn fail_list(&self, fail: bool) {
        self.fail_list.store(fail, Ordering::SeqCst);
    }

    fn write(&self) {
        self.writes.fetch_add(1, Ordering::SeqCst);
    }
}
impl PlayerStore for MemStore {
    async fn list_players(&self) -> Result<Vec<Player>, StoreError> {
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(StoreError::Decode("list failed".to_owned()));
        }
        Ok(self.state.lock().unwrap().players.clone())
    }

    async fn get_player(&self, id: i64) -> Result<Option<Player>, StoreError> {
        let state = self.state.lock().unwrap();
        Ok(state.players.iter().find(|p| p.id == id).cloned())
    }

    async fn get_player_by_puuid(&self, puuid: &str) -> Result<Option<Player>, StoreError> {
        let state = self.state.lock().unwrap();
        Ok(state.players.iter().find(|p| p.puuid == puuid).cloned())
    }

    async fn insert_player(&self, player: &NewPlayer) -> Result<Player, StoreError> {
        let mut state = self.state.lock().unwrap();
        if state.players.iter().any(|p| p.puuid == player.puuid) {
            return Err(StoreError::Duplicate("players_puuid_key".to_owned()));
        }
        self.write();
        let ranked = &player.ranked;
        let player = Player {
            id: state.next_id(),
            puuid: player.puuid.clone(),
            summoner_name: player.summoner_name.clone(),
            tier: ranked.snapshot.tier,
            rank: ranked.snapshot.rank,
            league_points: ranked.snapshot.league_points,
            wins: ranked.wins,
            losses: ranked.losses,
            in_game: ranked.in_game,
            profile_icon_id: Some(ranked.profile_icon_id),
            player_name: player.metadata.player_name.clone(),
            role: player.metadata.role.clone(),
            is_main: player.metadata.is_main,
            last_update: Some(now()),
        };
        state.players.push(player.clone());
        Ok(player)
    }

    async fn update_metadata(
        &self,
        id: i64,
        metadata: &PlayerMetadata,
    ) -> Result<Option<Player>, StoreError> {
        self.write();
        let mut state = self.state.lock().unwrap();
        Ok(state.players.iter_mut().find(|p| p.id == id).map(|p| {
            p.player_name = metadata.player_name.clone();
            p.role = metadata.role.clone();
            p.is_main = metadata.is_main;
            p.clone()
        }))
    }

    async fn update_ranked(&self, id: i64, update: &RankedUpdate) -> Result<(), StoreError> {
        if self.fail_player_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Decode("write failed".to_owned()));
        }
        self.write();
        let mut state = self.state.lock().unwrap();
        let player = state
            .players
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(StoreError::NotFound(id))?;
        let ranked = &update.ranked;
        player.puuid = update.puuid.clone();
        player.summoner_name = update.summoner_name.clone();
        player.tier = ranked.snapshot.tier;
        player.rank = ranked.snapshot.rank;
        player.league_points = ranked.snapshot.league_points;
        player.wins = ranked.wins;
        player.losses = ranked.losses;
        player.in_game = ranked.in_game;
        player.profile_icon_id = Some(ranked.profile_icon_id);
        player.last_update = Some(update.last_update);
        Ok(())
    }

    async fn delete_player(&self, id: i64) -> Result<bool, StoreError> {
        self.write();
        let mut state = self.state.lock().unwrap();
        let before = state.players.len();
        state.players.retain(|p| p.id != id);
        state.history.retain(|h| h.player_id != id);
        state.events.retain(|e| e.player_id != id);
        Ok(state.players.len() < before)
    }
}
impl HistoryStore for MemStore {
    async fn latest_history(&self, player_id: i64) -> Result<Option<PlayerHistory>, StoreError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .history
            .iter()
            .filter(|h| h.player_id == player_id)
            .max_by_key(|h| h.timestamp)
            .cloned())
    }

    async fn insert_history(&self, entry: &NewHistory) -> Result<(), StoreError> {
        self.write();
        let mut state = self.state.lock().unwrap();
        let id = state.next_id();
        state.history.push(PlayerHistory {
            id,
            player_id: entry.player_id,
            tier: entry.snapshot.tier,
            rank: entry.snapshot.rank,
            league_points: entry.snapshot.league_points,
            wins: entry.wins,
            losses: entry.losses,
            timestamp: entry.timestamp,
        });
        Ok(())
    }

    async fn list_history(
        &self,
        player_id: i64,
        limit: i64,
    ) -> Result<Vec<PlayerHistory>, StoreError> {
        let state = self.state.lock().unwrap();
        let mut history: Vec<_> = state
            .history
            .iter()
            .filter(|h| h.player_id == player_id)
            .cloned()
            .collect();
        history.sort_by_key(|h| std::cmp::Reverse(h.timestamp));
        history.truncate(limit.max(0) as usize);
        Ok(history)
    }
}
impl LpEventStore for MemStore {
    async fn has_lp_event_since(
        &self,
        player_id: i64,
        current: &RankSnapshot,
        since: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let state = self.state.lock().unwrap();
        Ok(state.events.iter().any(|e| {
            e.player_id == player_id
                && e.tier == current.tier
                && e.rank == current.rank
                && e.current_lp == current.league_points
                && e.timestamp >= since
        }))
    }

    async fn insert_lp_event(&self, event: &NewLpEvent) -> Result<(), StoreError> {
        self.write();
        let mut state = self.state.lock().unwrap();
        let id = state.next_id();
        state.events.push(LpEvent {
            id,
            player_id: event.player_id,
            summoner_name: event.summoner_name.clone(),
            previous_tier: event.previous.tier,
            previous_rank: event.previous.rank,
            previous_lp: event.previous.league_points,
            tier: event.current.tier,
            rank: event.current.rank,
            current_lp: event.current.league_points,
            difference: event.difference,
            timestamp: event.timestamp,
        });
        Ok(())
    }

    async fn list_lp_events(&self, player_id: i64, limit: i64) -> Result<Vec<LpEvent>, StoreError> {
        let state = self.state.lock().unwrap();
        let mut events: Vec<_> = state
            .events
            .iter()
            .filter(|e| e.player_id == player_id)
            .cloned()
            .collect();
        events.sort_by_key(|e| std::cmp::Reverse(e.timestamp));
        events.truncate(limit.max(0) as usize);
        Ok(events)
    }
}
