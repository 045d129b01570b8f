use anyhow::Result;
use async_trait::async_trait;

use raidlog_common::{CharacterId, PlayerRecord, ReportRecord};

/// A single-aggregate transaction.
///
/// `get` reads under the transaction, `commit` writes the new value and ends
/// it. A transaction that is dropped without `commit` writes nothing.
#[async_trait]
pub trait RecordTx<T: Send + Sync>: Send {
    /// Read the record. `None` when the key has never been written.
    async fn get(&mut self) -> Result<Option<T>>;

    /// Write `record` and end the transaction. Fails if a conflicting write
    /// committed since `get`; the caller should treat that as retryable.
    async fn commit(&mut self, record: &T) -> Result<()>;

    /// End the transaction without writing.
    async fn rollback(&mut self) -> Result<()>;
}

/// Keyed store of `PlayerRecord` (by character id) and `ReportRecord` (by code).
///
/// Implemented by `PgRecordStore` (postgres) and `MemoryRecordStore` (tests).
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn get_report(&self, code: &str) -> Result<Option<ReportRecord>>;

    async fn put_report(&self, code: &str, report: &ReportRecord) -> Result<()>;

    async fn get_player(&self, id: CharacterId) -> Result<Option<PlayerRecord>>;

    async fn put_player(&self, id: CharacterId, player: &PlayerRecord) -> Result<()>;

    async fn begin_player(&self, id: CharacterId) -> Result<Box<dyn RecordTx<PlayerRecord>>>;

    async fn begin_report(&self, code: &str) -> Result<Box<dyn RecordTx<ReportRecord>>>;

    /// Number of stored characters whose name is exactly `name`.
    async fn count_players_named(&self, name: &str) -> Result<u64>;
}
