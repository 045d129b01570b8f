//! Stored aggregates: one `PlayerRecord` per character, one `ReportRecord` per
//! combat-log report code.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Combat-log service character id.
pub type CharacterId = i64;

/// Combat-log service guild id. Zero means the report has no guild.
pub type GuildId = i32;

/// Records below this version are wiped and rebuilt from the next event on.
pub const CURRENT_PLAYER_SCHEMA_VERSION: i64 = 2;

// ---------------------------------------------------------------------------
// ReportRecord
// ---------------------------------------------------------------------------

/// A character's participation entry as seen in a report's roster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportPlayer {
    pub id: CharacterId,
    pub name: String,
    pub class: String,
    pub server: String,
    #[serde(default)]
    pub spec: String,
    #[serde(default)]
    pub role: String,
}

/// A fetched report. Written by ingestion; only the account claims are
/// mutated by this workspace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRecord {
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub zone: String,
    #[serde(default)]
    pub guild_id: GuildId,
    #[serde(default)]
    pub guild_name: String,
    pub players: Vec<ReportPlayer>,
    #[serde(default)]
    pub claimed_accounts_by_character: BTreeMap<CharacterId, String>,
    #[serde(default)]
    pub schema_version: i32,
}

impl ReportRecord {
    /// Reports whose window is empty or inverted carry no attendance.
    pub fn is_empty_window(&self) -> bool {
        self.end_time <= self.start_time
    }

    pub fn has_guild(&self) -> bool {
        self.guild_id != 0
    }

    /// First roster entry for `id`.
    pub fn player(&self, id: CharacterId) -> Option<&ReportPlayer> {
        self.players.iter().find(|p| p.id == id)
    }
}

// ---------------------------------------------------------------------------
// PlayerRecord
// ---------------------------------------------------------------------------

/// One report in a character's raid history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RaidParticipation {
    pub report_code: String,
    pub title: String,
    #[serde(default)]
    pub zone: String,
    #[serde(default)]
    pub guild_id: GuildId,
    #[serde(default)]
    pub guild_name: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub spec: String,
    /// Set when this session overlaps one already recorded for the character.
    #[serde(default)]
    pub duplicate: bool,
}

impl RaidParticipation {
    pub fn from_report(code: &str, report: &ReportRecord, player: &ReportPlayer) -> Self {
        Self {
            report_code: code.to_string(),
            title: report.title.clone(),
            zone: report.zone.clone(),
            guild_id: report.guild_id,
            guild_name: report.guild_name.clone(),
            start_time: report.start_time,
            end_time: report.end_time,
            role: player.role.clone(),
            spec: player.spec.clone(),
            duplicate: false,
        }
    }

    pub fn same_guild_as(&self, report: &ReportRecord) -> bool {
        self.guild_id == report.guild_id && self.guild_name == report.guild_name
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coraider {
    pub name: String,
    pub class: String,
    pub server: String,
    pub count: i64,
}

impl Coraider {
    pub fn first_seen(player: &ReportPlayer) -> Self {
        Self {
            name: player.name.clone(),
            class: player.class.clone(),
            server: player.server.clone(),
            count: 1,
        }
    }
}

/// A claim event owed to another aggregate, stored with the commit that
/// decided it so a failed publish can be re-sent on redelivery. The account
/// name is read from the record at send time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PendingClaim {
    Coraider { player_id: CharacterId },
    Report { report_code: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub name: String,
    pub class: String,
    pub server: String,
    #[serde(default)]
    pub claimed_account: Option<String>,
    /// Descending by `start_time`, one entry per report code.
    #[serde(default)]
    pub raid_history: Vec<RaidParticipation>,
    #[serde(default)]
    pub coraider_tally: BTreeMap<CharacterId, Coraider>,
    /// Account names of coraiders, learned from their own claims.
    #[serde(default)]
    pub coraider_account_hints: BTreeMap<CharacterId, String>,
    /// Claim events committed but not yet known to be published.
    #[serde(default)]
    pub pending_claims: Vec<PendingClaim>,
    #[serde(default)]
    pub schema_version: i64,
}

impl PlayerRecord {
    /// A fresh record for a character first seen in a report roster.
    pub fn seeded(player: &ReportPlayer) -> Self {
        Self {
            name: player.name.clone(),
            class: player.class.clone(),
            server: player.server.clone(),
            schema_version: CURRENT_PLAYER_SCHEMA_VERSION,
            ..Self::default()
        }
    }

    /// The claimed account, treating an empty name as unclaimed.
    pub fn account(&self) -> Option<&str> {
        self.claimed_account.as_deref().filter(|a| !a.is_empty())
    }

    pub fn needs_migration(&self) -> bool {
        self.schema_version < CURRENT_PLAYER_SCHEMA_VERSION
    }

    /// Drop history and tally so they rebuild in the current format.
    pub fn migrate(&mut self) {
        self.raid_history.clear();
        self.coraider_tally.clear();
        self.schema_version = CURRENT_PLAYER_SCHEMA_VERSION;
    }

    /// Append claims not already pending.
    pub fn queue_claims(&mut self, claims: impl IntoIterator<Item = PendingClaim>) {
        for claim in claims {
            if !self.pending_claims.contains(&claim) {
                self.pending_claims.push(claim);
            }
        }
    }

    pub fn history_entry_mut(&mut self, code: &str) -> Option<&mut RaidParticipation> {
        self.raid_history.iter_mut().find(|r| r.report_code == code)
    }

    pub fn history_entry(&self, code: &str) -> Option<&RaidParticipation> {
        self.raid_history.iter().find(|r| r.report_code == code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn roster_entry() -> ReportPlayer {
        ReportPlayer {
            id: 71133535,
            name: "Jaythe".into(),
            class: "Priest".into(),
            server: "Firemaw".into(),
            spec: "Holy".into(),
            role: "healer".into(),
        }
    }

    #[test]
    fn seeded_record_is_current_and_unclaimed() {
        let record = PlayerRecord::seeded(&roster_entry());
        assert_eq!(record.name, "Jaythe");
        assert_eq!(record.server, "Firemaw");
        assert!(!record.needs_migration());
        assert!(record.account().is_none());
    }

    #[test]
    fn empty_account_name_counts_as_unclaimed() {
        let mut record = PlayerRecord::seeded(&roster_entry());
        record.claimed_account = Some(String::new());
        assert!(record.account().is_none());

        record.claimed_account = Some("Jaythe".into());
        assert_eq!(record.account(), Some("Jaythe"));
    }

    #[test]
    fn migrate_clears_history_and_tally_but_keeps_claims() {
        let entry = roster_entry();
        let mut record = PlayerRecord {
            claimed_account: Some("Jaythe".into()),
            schema_version: 1,
            ..PlayerRecord::seeded(&entry)
        };
        record.coraider_tally.insert(1, Coraider::first_seen(&entry));
        record.coraider_account_hints.insert(1, "Other".into());
        record.queue_claims([PendingClaim::Coraider { player_id: 1 }]);

        assert!(record.needs_migration());
        record.migrate();

        assert!(record.coraider_tally.is_empty());
        assert!(record.raid_history.is_empty());
        assert_eq!(record.account(), Some("Jaythe"));
        assert_eq!(record.coraider_account_hints.len(), 1);
        assert_eq!(record.pending_claims.len(), 1);
        assert_eq!(record.schema_version, CURRENT_PLAYER_SCHEMA_VERSION);
    }

    #[test]
    fn legacy_player_json_without_new_fields_decodes_as_outdated() {
        let json = r#"{"name":"Jaythe","class":"Priest","server":"Firemaw"}"#;
        let record: PlayerRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.schema_version, 0);
        assert!(record.needs_migration());
    }

    #[test]
    fn tally_keys_survive_json_as_strings() {
        let mut record = PlayerRecord::seeded(&roster_entry());
        record.coraider_tally.insert(38937027, Coraider::first_seen(&roster_entry()));

        let json = serde_json::to_value(&record).unwrap();
        assert!(json["coraider_tally"].get("38937027").is_some());

        let back: PlayerRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back.coraider_tally[&38937027].count, 1);
    }

    #[test]
    fn queued_claims_are_deduplicated_and_tagged_in_json() {
        let mut record = PlayerRecord::seeded(&roster_entry());
        let report = PendingClaim::Report {
            report_code: "R1".into(),
        };
        record.queue_claims([PendingClaim::Coraider { player_id: 2 }, report.clone()]);
        record.queue_claims([report]);

        assert_eq!(record.pending_claims.len(), 2);

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["pending_claims"][0]["kind"], "coraider");
        assert_eq!(json["pending_claims"][1]["report_code"], "R1");

        let back: PlayerRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back.pending_claims, record.pending_claims);
    }

    #[test]
    fn report_window_and_roster_lookup() {
        let start = Utc.with_ymd_and_hms(2023, 3, 1, 19, 0, 0).unwrap();
        let report = ReportRecord {
            title: "Naxxramas".into(),
            created_at: start,
            start_time: start,
            end_time: start,
            zone: "Naxxramas".into(),
            guild_id: 0,
            guild_name: String::new(),
            players: vec![roster_entry()],
            claimed_accounts_by_character: BTreeMap::new(),
            schema_version: 1,
        };

        assert!(report.is_empty_window());
        assert!(!report.has_guild());
        assert!(report.player(71133535).is_some());
        assert!(report.player(1).is_none());
    }
}
