//! Outbox consumer that feeds delivered messages through the engine router.

pub mod retry;
pub mod worker;

pub use retry::RetryPolicy;
pub use worker::{Worker, WorkerStats};
