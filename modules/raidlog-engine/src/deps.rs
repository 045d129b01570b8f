use std::sync::Arc;

use raidlog_events::EventChannel;
use raidlog_store::{GuildStatsCache, RecordStore};

/// A coraider keeps receiving a character's claim until the two have shared
/// this many raids.
pub const BROADCAST_CEILING: i64 = 3;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub broadcast_ceiling: i64,
    /// Reject account claims whose name matches no stored character.
    pub require_known_account_name: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            broadcast_ceiling: BROADCAST_CEILING,
            require_known_account_name: false,
        }
    }
}

/// Handles every handler needs. Built once at startup and shared.
#[derive(Clone)]
pub struct Deps {
    pub store: Arc<dyn RecordStore>,
    pub channel: Arc<dyn EventChannel>,
    pub guild_cache: Arc<dyn GuildStatsCache>,
    pub config: EngineConfig,
}

impl Deps {
    pub fn new(
        store: Arc<dyn RecordStore>,
        channel: Arc<dyn EventChannel>,
        guild_cache: Arc<dyn GuildStatsCache>,
    ) -> Self {
        Self {
            store,
            channel,
            guild_cache,
            config: EngineConfig::default(),
        }
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }
}
