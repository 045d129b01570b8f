//! In-memory record store for tests. No database required.
//!
//! Transactions are optimistic: `get` remembers the version it saw and
//! `commit` fails if another transaction committed the same key since.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard};

use anyhow::{bail, Result};
use async_trait::async_trait;

use raidlog_common::{CharacterId, PlayerRecord, ReportRecord};

use crate::traits::{RecordStore, RecordTx};

struct Versioned<T> {
    version: u64,
    record: T,
}

#[derive(Default)]
struct Tables {
    players: HashMap<CharacterId, Versioned<PlayerRecord>>,
    reports: HashMap<String, Versioned<ReportRecord>>,
    commit_failures: usize,
    read_failures: bool,
}

/// Selects the table a record type lives in.
trait Table: Clone + Send + Sync + 'static {
    type Key: Clone + Eq + Hash + Send + Sync + 'static;

    fn table(tables: &mut Tables) -> &mut HashMap<Self::Key, Versioned<Self>>;
}

impl Table for PlayerRecord {
    type Key = CharacterId;

    fn table(tables: &mut Tables) -> &mut HashMap<CharacterId, Versioned<Self>> {
        &mut tables.players
    }
}

impl Table for ReportRecord {
    type Key = String;

    fn table(tables: &mut Tables) -> &mut HashMap<String, Versioned<Self>> {
        &mut tables.reports
    }
}

fn lock(tables: &Mutex<Tables>) -> MutexGuard<'_, Tables> {
    tables.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn read<T: Table>(tables: &Mutex<Tables>, key: &T::Key) -> Result<Option<(u64, T)>> {
    let mut tables = lock(tables);
    if tables.read_failures {
        bail!("MemoryRecordStore: injected read failure");
    }
    Ok(T::table(&mut tables)
        .get(key)
        .map(|v| (v.version, v.record.clone())))
}

fn write<T: Table>(tables: &Mutex<Tables>, key: T::Key, record: T) {
    let mut tables = lock(tables);
    let table = T::table(&mut tables);
    let version = table.get(&key).map(|v| v.version + 1).unwrap_or(1);
    table.insert(key, Versioned { version, record });
}

// ---------------------------------------------------------------------------
// MemoryRecordStore
// ---------------------------------------------------------------------------

/// Thread-safe map-backed store. Clones share the same tables.
#[derive(Clone, Default)]
pub struct MemoryRecordStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The next `n` commits fail without writing.
    pub fn fail_next_commits(&self, n: usize) {
        lock(&self.tables).commit_failures = n;
    }

    /// While set, every read (plain or transactional) fails.
    pub fn fail_reads(&self, failing: bool) {
        lock(&self.tables).read_failures = failing;
    }

    /// Read a player without failure injection (for test assertions).
    pub fn player(&self, id: CharacterId) -> Option<PlayerRecord> {
        lock(&self.tables).players.get(&id).map(|v| v.record.clone())
    }

    /// Read a report without failure injection (for test assertions).
    pub fn report(&self, code: &str) -> Option<ReportRecord> {
        lock(&self.tables).reports.get(code).map(|v| v.record.clone())
    }

    /// How many times a player has been written (for test assertions).
    pub fn player_version(&self, id: CharacterId) -> u64 {
        lock(&self.tables)
            .players
            .get(&id)
            .map(|v| v.version)
            .unwrap_or(0)
    }

    fn begin<T: Table>(&self, key: T::Key) -> MemoryTx<T> {
        MemoryTx {
            tables: self.tables.clone(),
            key,
            seen: None,
            finished: false,
        }
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn get_report(&self, code: &str) -> Result<Option<ReportRecord>> {
        Ok(read::<ReportRecord>(&self.tables, &code.to_string())?.map(|(_, r)| r))
    }

    async fn put_report(&self, code: &str, report: &ReportRecord) -> Result<()> {
        write(&self.tables, code.to_string(), report.clone());
        Ok(())
    }

    async fn get_player(&self, id: CharacterId) -> Result<Option<PlayerRecord>> {
        Ok(read::<PlayerRecord>(&self.tables, &id)?.map(|(_, p)| p))
    }

    async fn put_player(&self, id: CharacterId, player: &PlayerRecord) -> Result<()> {
        write(&self.tables, id, player.clone());
        Ok(())
    }

    async fn begin_player(&self, id: CharacterId) -> Result<Box<dyn RecordTx<PlayerRecord>>> {
        Ok(Box::new(self.begin::<PlayerRecord>(id)))
    }

    async fn begin_report(&self, code: &str) -> Result<Box<dyn RecordTx<ReportRecord>>> {
        Ok(Box::new(self.begin::<ReportRecord>(code.to_string())))
    }

    async fn count_players_named(&self, name: &str) -> Result<u64> {
        let tables = lock(&self.tables);
        if tables.read_failures {
            bail!("MemoryRecordStore: injected read failure");
        }
        Ok(tables
            .players
            .values()
            .filter(|v| v.record.name == name)
            .count() as u64)
    }
}

// ---------------------------------------------------------------------------
// MemoryTx
// ---------------------------------------------------------------------------

struct MemoryTx<T: Table> {
    tables: Arc<Mutex<Tables>>,
    key: T::Key,
    /// Version observed by `get`; `Some(0)` means the key was absent.
    seen: Option<u64>,
    finished: bool,
}

#[async_trait]
impl<T: Table> RecordTx<T> for MemoryTx<T> {
    async fn get(&mut self) -> Result<Option<T>> {
        if self.finished {
            bail!("MemoryRecordStore: transaction already finished");
        }
        let found = read::<T>(&self.tables, &self.key)?;
        self.seen = Some(found.as_ref().map(|(v, _)| *v).unwrap_or(0));
        Ok(found.map(|(_, r)| r))
    }

    async fn commit(&mut self, record: &T) -> Result<()> {
        if self.finished {
            bail!("MemoryRecordStore: transaction already finished");
        }
        self.finished = true;

        let mut tables = lock(&self.tables);
        if tables.commit_failures > 0 {
            tables.commit_failures -= 1;
            bail!("MemoryRecordStore: injected commit failure");
        }

        let table = T::table(&mut tables);
        let current = table.get(&self.key).map(|v| v.version).unwrap_or(0);
        if let Some(seen) = self.seen {
            if seen != current {
                bail!("MemoryRecordStore: transaction conflict (saw version {seen}, found {current})");
            }
        }

        table.insert(
            self.key.clone(),
            Versioned {
                version: current + 1,
                record: record.clone(),
            },
        );
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        self.finished = true;
        Ok(())
    }
}
