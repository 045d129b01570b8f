//! player-report handler: merge one report into one character's aggregate.

use raidlog_common::{CharacterId, PendingClaim, PlayerRecord, RaidParticipation};
use raidlog_events::{
    publish_all, CoraiderAccountClaimMessage, OutboundMessage, PlayerReportMessage,
    ReportAccountClaimMessage,
};
use raidlog_store::RecordTx;
use tracing::{info, warn};

use crate::deps::Deps;
use crate::error::HandlerError;
use crate::interval::{insert_sorted, is_duplicate};
use crate::tally::record_coraiders;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The report's window is empty; nothing was written.
    EmptyReport,
    /// The report was already merged with the same guild. Claims left pending
    /// by an earlier failed publish are re-sent; nothing else is written.
    AlreadyProcessed { republished: usize },
    /// A new history entry was added.
    Merged(MergeSummary),
    /// An existing entry's guild fields were refreshed.
    GuildUpdated(MergeSummary),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeSummary {
    /// Whether the history entry overlaps another session.
    pub duplicate: bool,
    /// Coraiders the claimed account was broadcast to (or would have been, if
    /// the character had one).
    pub eligible: Vec<CharacterId>,
    /// Claim events published after the commit, including any still pending
    /// from earlier events.
    pub published: usize,
}

/// Merge report `message.code` into the record of `message.player_id`, then
/// propagate the character's claimed account if it has one.
///
/// The claims to send are committed with the merge as `pending_claims` and
/// published afterwards. A publish failure is returned as a retryable error
/// even though the merge is durable; the redelivered event takes the
/// `AlreadyProcessed` path and re-sends whatever is still pending.
pub async fn update_player_report(
    message: &PlayerReportMessage,
    deps: &Deps,
) -> Result<UpdateOutcome, HandlerError> {
    let code = message.code.as_str();
    let player_id = message.player_id;

    let report = deps
        .store
        .get_report(code)
        .await
        .map_err(HandlerError::store)?
        .ok_or_else(|| HandlerError::ReportNotFound {
            code: code.to_string(),
        })?;

    if report.is_empty_window() {
        info!(report_code = code, player_id, "Got empty report, not updating player");
        return Ok(UpdateOutcome::EmptyReport);
    }

    let participant = report
        .player(player_id)
        .ok_or_else(|| HandlerError::PlayerNotInReport {
            code: code.to_string(),
            player_id,
        })?;

    let mut tx = deps
        .store
        .begin_player(player_id)
        .await
        .map_err(HandlerError::store)?;
    let mut record = tx
        .get()
        .await
        .map_err(HandlerError::store)?
        .unwrap_or_else(|| PlayerRecord::seeded(participant));

    if record.needs_migration() {
        info!(player_id, from = record.schema_version, "Outdated entry for player, replacing entry");
        record.migrate();
    }

    // A redelivery either changes nothing or carries refreshed guild fields.
    let merged_with_same_guild = record.history_entry(code).map(|e| e.same_guild_as(&report));
    let guild_updated = match merged_with_same_guild {
        Some(true) => {
            rollback(&mut *tx, player_id).await;
            let republished = propagate(player_id, &record, deps).await?;
            info!(report_code = code, player_id, republished, "Report already reported for player");
            return Ok(UpdateOutcome::AlreadyProcessed { republished });
        }
        Some(false) => {
            if let Some(entry) = record.history_entry_mut(code) {
                entry.guild_id = report.guild_id;
                entry.guild_name = report.guild_name.clone();
            }
            true
        }
        None => false,
    };

    let (duplicate, eligible) = if guild_updated {
        let duplicate = record.history_entry(code).is_some_and(|e| e.duplicate);
        (duplicate, Vec::new())
    } else {
        let duplicate = is_duplicate(&record.raid_history, report.start_time, report.end_time);
        let mut entry = RaidParticipation::from_report(code, &report, participant);
        entry.duplicate = duplicate;
        insert_sorted(&mut record.raid_history, entry);

        let eligible = if duplicate {
            Vec::new()
        } else {
            record_coraiders(
                &mut record.coraider_tally,
                player_id,
                &report.players,
                deps.config.broadcast_ceiling,
            )
        };
        (duplicate, eligible)
    };

    if record.account().is_some() {
        let coraiders = eligible
            .iter()
            .map(|&target| PendingClaim::Coraider { player_id: target });
        let report_claim = report.has_guild().then(|| PendingClaim::Report {
            report_code: code.to_string(),
        });
        record.queue_claims(coraiders.chain(report_claim));
    }

    tx.commit(&record)
        .await
        .map_err(|e| HandlerError::commit(format!("player {player_id}"), e))?;

    let published = propagate(player_id, &record, deps).await?;

    let summary = MergeSummary {
        duplicate,
        eligible,
        published,
    };

    if guild_updated {
        info!(
            report_code = code,
            player_id,
            guild_id = report.guild_id,
            published,
            "Updated report for player"
        );
        Ok(UpdateOutcome::GuildUpdated(summary))
    } else {
        info!(
            report_code = code,
            player_id,
            duplicate,
            coraiders = summary.eligible.len(),
            published,
            "Processed report for player"
        );
        Ok(UpdateOutcome::Merged(summary))
    }
}

/// Roll back a no-op transaction. Failure only means the store cleans up later.
async fn rollback<T: Send + Sync>(tx: &mut dyn RecordTx<T>, player_id: CharacterId) {
    if let Err(e) = tx.rollback().await {
        warn!(error = %e, player_id, "Rollback failed (non-fatal)");
    }
}

/// Publish `record`'s pending claims, then drop the sent ones from the stored
/// record. Returns the number published.
async fn propagate(
    player_id: CharacterId,
    record: &PlayerRecord,
    deps: &Deps,
) -> Result<usize, HandlerError> {
    let Some(account) = record.account() else {
        return Ok(0);
    };
    if record.pending_claims.is_empty() {
        return Ok(0);
    }

    let messages: Vec<OutboundMessage> = record
        .pending_claims
        .iter()
        .map(|claim| claim_message(claim, player_id, account))
        .collect();
    let published = publish_all(deps.channel.as_ref(), &messages).await?;

    if let Err(e) = clear_pending(player_id, &record.pending_claims, deps).await {
        warn!(error = %e, player_id, "Failed to clear sent claims, they will be sent again");
    }
    Ok(published)
}

fn claim_message(claim: &PendingClaim, player_id: CharacterId, account: &str) -> OutboundMessage {
    match claim {
        PendingClaim::Coraider { player_id: target } => {
            OutboundMessage::new(&CoraiderAccountClaimMessage {
                player_id: *target,
                claimed_player_id: player_id,
                claimed_account_name: account.to_string(),
            })
        }
        PendingClaim::Report { report_code } => OutboundMessage::new(&ReportAccountClaimMessage {
            report_code: report_code.clone(),
            claimed_player_id: player_id,
            claimed_account_name: account.to_string(),
        }),
    }
}

/// Claims queued by a concurrent event since `sent` was read are kept.
async fn clear_pending(
    player_id: CharacterId,
    sent: &[PendingClaim],
    deps: &Deps,
) -> anyhow::Result<()> {
    let mut tx = deps.store.begin_player(player_id).await?;
    let Some(mut record) = tx.get().await? else {
        return tx.rollback().await;
    };
    record.pending_claims.retain(|claim| !sent.contains(claim));
    tx.commit(&record).await
}
