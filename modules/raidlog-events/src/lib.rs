//! Event channel contract for the claim-propagation gossip.
//!
//! Every message is a topic plus a flat string-to-string attribute map. The
//! transport is at-least-once; consumers must tolerate redelivery.

pub mod channel;
pub mod consumer;
pub mod memory;
pub mod message;
pub mod outbox;
pub mod topic;

pub use channel::{publish_all, EventChannel, OutboundMessage, PublishError};
pub use consumer::{DeliveredMessage, MessageSource};
pub use memory::MemoryChannel;
pub use message::{
    AccountClaimMessage, Attributes, CoraiderAccountClaimMessage, GuildReportsMessage, Message,
    MessageError, PlayerReportMessage, RecentCharacterReportsMessage, ReportAccountClaimMessage,
    ReportMessage, UserReportsMessage,
};
pub use outbox::PgOutbox;
pub use topic::Topic;
