//! Player aggregate update and account-identity propagation.
//!
//! A `player-report` event merges one report into one character's history and
//! coraider tally. When that character has claimed an account, the claim is
//! gossiped to recently-met coraiders and into the report itself. The three
//! claim events are idempotent upserts into their target aggregate.

pub mod claims;
pub mod deps;
pub mod error;
pub mod interval;
pub mod router;
pub mod tally;
pub mod update;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use claims::{claim_account, coraider_account_claim, report_account_claim};
pub use deps::{Deps, EngineConfig, BROADCAST_CEILING};
pub use error::HandlerError;
pub use router::{route, Outcome};
pub use update::{update_player_report, MergeSummary, UpdateOutcome};
