//! Transactional record store for player and report aggregates.
//!
//! Every mutation is a single-aggregate read-modify-write through a
//! `RecordTx`. There are no cross-aggregate transactions.

pub mod cache;
pub mod memory;
pub mod postgres;
pub mod traits;

pub use cache::{GuildStatsCache, NoopGuildStatsCache, PgGuildStatsCache, RecordingGuildStatsCache};
pub use memory::MemoryRecordStore;
pub use postgres::PgRecordStore;
pub use traits::{RecordStore, RecordTx};
