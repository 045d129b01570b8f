// Test fixtures for the engine handlers.
//
// - TestHarness: Deps wired to the in-memory store, channel and cache, with
//   handles kept for assertions and failure injection
// - report()/roster(): ReportRecord builders on a fixed day, hours as offsets

use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};

use raidlog_common::{CharacterId, GuildId, PlayerRecord, ReportPlayer, ReportRecord};
use raidlog_events::MemoryChannel;
use raidlog_store::{MemoryRecordStore, RecordStore, RecordingGuildStatsCache};

use crate::deps::{Deps, EngineConfig};

// ---------------------------------------------------------------------------
// TestHarness
// ---------------------------------------------------------------------------

pub struct TestHarness {
    pub store: Arc<MemoryRecordStore>,
    pub channel: Arc<MemoryChannel>,
    pub cache: Arc<RecordingGuildStatsCache>,
    pub deps: Deps,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let store = Arc::new(MemoryRecordStore::new());
        let channel = Arc::new(MemoryChannel::new());
        let cache = Arc::new(RecordingGuildStatsCache::new());
        let deps = Deps::new(store.clone(), channel.clone(), cache.clone()).with_config(config);
        Self {
            store,
            channel,
            cache,
            deps,
        }
    }

    pub async fn put_report(&self, code: &str, report: &ReportRecord) {
        self.store
            .put_report(code, report)
            .await
            .expect("memory store put_report");
    }

    pub async fn put_player(&self, id: CharacterId, player: &PlayerRecord) {
        self.store
            .put_player(id, player)
            .await
            .expect("memory store put_player");
    }

    pub fn player(&self, id: CharacterId) -> PlayerRecord {
        self.store
            .player(id)
            .unwrap_or_else(|| panic!("player {id} not stored"))
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Record builders
// ---------------------------------------------------------------------------

/// `hour` hours after midnight on the fixture day.
pub fn at(hour: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0)
        .single()
        .expect("valid fixture date")
        + Duration::hours(hour)
}

pub fn roster_player(id: CharacterId) -> ReportPlayer {
    ReportPlayer {
        id,
        name: format!("Char{id}"),
        class: "Paladin".into(),
        server: "Firemaw".into(),
        spec: "Retribution".into(),
        role: "dps".into(),
    }
}

pub fn roster(ids: &[CharacterId]) -> Vec<ReportPlayer> {
    ids.iter().map(|&id| roster_player(id)).collect()
}

/// A report spanning `[start, end)` hours with the given guild and roster.
pub fn report(start: i64, end: i64, guild_id: GuildId, players: &[CharacterId]) -> ReportRecord {
    ReportRecord {
        title: "Molten Core".into(),
        created_at: at(end),
        start_time: at(start),
        end_time: at(end),
        zone: "Molten Core".into(),
        guild_id,
        guild_name: if guild_id == 0 {
            String::new()
        } else {
            format!("Guild{guild_id}")
        },
        players: roster(players),
        claimed_accounts_by_character: Default::default(),
        schema_version: 1,
    }
}

/// A current-schema record for `id` that has claimed `account`.
pub fn claimed_player(id: CharacterId, account: &str) -> PlayerRecord {
    PlayerRecord {
        claimed_account: Some(account.to_string()),
        ..PlayerRecord::seeded(&roster_player(id))
    }
}
