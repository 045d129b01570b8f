//! Topic dispatch for delivered messages.

use raidlog_events::{
    AccountClaimMessage, Attributes, CoraiderAccountClaimMessage, Message, PlayerReportMessage,
    ReportAccountClaimMessage, Topic,
};
use tracing::debug;

use crate::claims::{claim_account, coraider_account_claim, report_account_claim};
use crate::deps::Deps;
use crate::error::HandlerError;
use crate::update::{update_player_report, UpdateOutcome};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    PlayerReport(UpdateOutcome),
    AccountClaimed { notified: usize },
    CoraiderHintStored,
    ReportClaimStored { guild_invalidated: bool },
    /// A topic this engine publishes but does not consume.
    Skipped { topic: Topic },
}

/// Decode `attributes` for `topic` and run its handler.
///
/// An unknown topic id or undecodable attributes are `Malformed` (fatal).
pub async fn route(topic: &str, attributes: &Attributes, deps: &Deps) -> Result<Outcome, HandlerError> {
    let topic: Topic = topic.parse()?;

    match topic {
        Topic::PlayerReport => {
            let message = PlayerReportMessage::from_attributes(attributes)?;
            Ok(Outcome::PlayerReport(update_player_report(&message, deps).await?))
        }
        Topic::AccountClaim => {
            let message = AccountClaimMessage::from_attributes(attributes)?;
            let notified = claim_account(&message, deps).await?;
            Ok(Outcome::AccountClaimed { notified })
        }
        Topic::CoraiderAccountClaim => {
            let message = CoraiderAccountClaimMessage::from_attributes(attributes)?;
            coraider_account_claim(&message, deps).await?;
            Ok(Outcome::CoraiderHintStored)
        }
        Topic::ReportAccountClaim => {
            let message = ReportAccountClaimMessage::from_attributes(attributes)?;
            let guild_invalidated = report_account_claim(&message, deps).await?;
            Ok(Outcome::ReportClaimStored { guild_invalidated })
        }
        Topic::Report | Topic::GuildReports | Topic::UserReports | Topic::RecentCharacterReports => {
            debug!(topic = %topic, "No handler for topic, skipping");
            Ok(Outcome::Skipped { topic })
        }
    }
}
