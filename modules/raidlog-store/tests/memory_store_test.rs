//! MemoryRecordStore transaction semantics. No database required.

use chrono::{TimeZone, Utc};
use raidlog_common::{PlayerRecord, ReportPlayer, ReportRecord};
use raidlog_store::{GuildStatsCache, MemoryRecordStore, RecordStore, RecordingGuildStatsCache};

fn player(name: &str) -> PlayerRecord {
    PlayerRecord::seeded(&ReportPlayer {
        id: 1,
        name: name.into(),
        class: "Mage".into(),
        server: "Firemaw".into(),
        spec: String::new(),
        role: String::new(),
    })
}

fn report() -> ReportRecord {
    ReportRecord {
        title: "Naxxramas".into(),
        created_at: Utc.with_ymd_and_hms(2024, 3, 1, 22, 0, 0).unwrap(),
        start_time: Utc.with_ymd_and_hms(2024, 3, 1, 19, 0, 0).unwrap(),
        end_time: Utc.with_ymd_and_hms(2024, 3, 1, 22, 0, 0).unwrap(),
        zone: "Naxxramas".into(),
        guild_id: 42,
        guild_name: "Fourth Place".into(),
        players: vec![],
        claimed_accounts_by_character: Default::default(),
        schema_version: 1,
    }
}

#[tokio::test]
async fn committed_write_is_visible() {
    let store = MemoryRecordStore::new();

    let mut tx = store.begin_player(1).await.unwrap();
    assert!(tx.get().await.unwrap().is_none());
    tx.commit(&player("Jaythe")).await.unwrap();

    assert_eq!(store.get_player(1).await.unwrap().unwrap().name, "Jaythe");
    assert_eq!(store.player_version(1), 1);
}

#[tokio::test]
async fn rolled_back_transaction_writes_nothing() {
    let store = MemoryRecordStore::new();

    let mut tx = store.begin_player(1).await.unwrap();
    tx.get().await.unwrap();
    tx.rollback().await.unwrap();

    assert!(store.player(1).is_none());
}

#[tokio::test]
async fn conflicting_commit_is_rejected() {
    let store = MemoryRecordStore::new();
    store.put_player(1, &player("Jaythe")).await.unwrap();

    let mut first = store.begin_player(1).await.unwrap();
    let mut second = store.begin_player(1).await.unwrap();
    first.get().await.unwrap();
    second.get().await.unwrap();

    first.commit(&player("First")).await.unwrap();
    let err = second.commit(&player("Second")).await.unwrap_err();

    assert!(err.to_string().contains("conflict"));
    assert_eq!(store.player(1).unwrap().name, "First");
}

#[tokio::test]
async fn injected_commit_failure_is_consumed() {
    let store = MemoryRecordStore::new();
    store.fail_next_commits(1);

    let mut tx = store.begin_player(1).await.unwrap();
    tx.get().await.unwrap();
    assert!(tx.commit(&player("Jaythe")).await.is_err());
    assert!(store.player(1).is_none());

    let mut tx = store.begin_player(1).await.unwrap();
    tx.get().await.unwrap();
    tx.commit(&player("Jaythe")).await.unwrap();
    assert!(store.player(1).is_some());
}

#[tokio::test]
async fn finished_transaction_cannot_commit_again() {
    let store = MemoryRecordStore::new();

    let mut tx = store.begin_player(1).await.unwrap();
    tx.get().await.unwrap();
    tx.commit(&player("Jaythe")).await.unwrap();

    assert!(tx.commit(&player("Again")).await.is_err());
}

#[tokio::test]
async fn read_failures_apply_to_plain_and_transactional_reads() {
    let store = MemoryRecordStore::new();
    store.put_report("abc", &report()).await.unwrap();
    store.fail_reads(true);

    assert!(store.get_report("abc").await.is_err());
    let mut tx = store.begin_report("abc").await.unwrap();
    assert!(tx.get().await.is_err());

    store.fail_reads(false);
    assert!(store.get_report("abc").await.unwrap().is_some());
}

#[tokio::test]
async fn report_transaction_updates_claims() {
    let store = MemoryRecordStore::new();
    store.put_report("abc", &report()).await.unwrap();

    let mut tx = store.begin_report("abc").await.unwrap();
    let mut record = tx.get().await.unwrap().unwrap();
    record
        .claimed_accounts_by_character
        .insert(7, "Foo".into());
    tx.commit(&record).await.unwrap();

    let stored = store.report("abc").unwrap();
    assert_eq!(stored.claimed_accounts_by_character[&7], "Foo");
}

#[tokio::test]
async fn count_players_named_matches_exactly() {
    let store = MemoryRecordStore::new();
    store.put_player(1, &player("Jaythe")).await.unwrap();
    store.put_player(2, &player("Jaythe")).await.unwrap();
    store.put_player(3, &player("jaythe")).await.unwrap();

    assert_eq!(store.count_players_named("Jaythe").await.unwrap(), 2);
    assert_eq!(store.count_players_named("Nobody").await.unwrap(), 0);
}

#[tokio::test]
async fn recording_cache_records_and_fails_on_demand() {
    let cache = RecordingGuildStatsCache::new();
    cache.fail_next_invalidations(1);

    assert!(cache.invalidate(42).await.is_err());
    cache.invalidate(42).await.unwrap();
    cache.invalidate(7).await.unwrap();

    assert_eq!(cache.invalidated(), vec![42, 7]);
}
