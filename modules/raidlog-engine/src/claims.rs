//! Claim handlers. Each one is a last-writer-wins upsert into one aggregate,
//! so redelivered or duplicated claim events are harmless.

use raidlog_events::{
    publish_all, AccountClaimMessage, CoraiderAccountClaimMessage, OutboundMessage,
    ReportAccountClaimMessage,
};
use tracing::info;

use crate::deps::Deps;
use crate::error::HandlerError;

/// A character claims an account name. The claim is stored and gossiped to
/// every coraider in the character's tally. Returns the number of coraiders
/// notified.
pub async fn claim_account(message: &AccountClaimMessage, deps: &Deps) -> Result<usize, HandlerError> {
    let player_id = message.player_id;
    let account_name = message.account_name.as_str();

    if account_name.is_empty() {
        return Err(HandlerError::EmptyAccountName { player_id });
    }

    if deps.config.require_known_account_name {
        let known = deps
            .store
            .count_players_named(account_name)
            .await
            .map_err(HandlerError::store)?;
        if known == 0 {
            return Err(HandlerError::UnknownAccountName {
                account_name: account_name.to_string(),
            });
        }
    }

    let mut tx = deps
        .store
        .begin_player(player_id)
        .await
        .map_err(HandlerError::store)?;
    let mut record = tx
        .get()
        .await
        .map_err(HandlerError::store)?
        .ok_or(HandlerError::PlayerNotFound { player_id })?;

    record.claimed_account = Some(account_name.to_string());

    tx.commit(&record)
        .await
        .map_err(|e| HandlerError::commit(format!("player {player_id}"), e))?;

    let messages: Vec<OutboundMessage> = record
        .coraider_tally
        .keys()
        .map(|&target| {
            OutboundMessage::new(&CoraiderAccountClaimMessage {
                player_id: target,
                claimed_player_id: player_id,
                claimed_account_name: account_name.to_string(),
            })
        })
        .collect();

    let notified = publish_all(deps.channel.as_ref(), &messages).await?;

    info!(player_id, account_name, notified, "Claimed account for player");
    Ok(notified)
}

/// Tell `message.player_id` which account one of its coraiders belongs to.
pub async fn coraider_account_claim(
    message: &CoraiderAccountClaimMessage,
    deps: &Deps,
) -> Result<(), HandlerError> {
    let player_id = message.player_id;

    let mut tx = deps
        .store
        .begin_player(player_id)
        .await
        .map_err(HandlerError::store)?;
    let mut record = tx
        .get()
        .await
        .map_err(HandlerError::store)?
        .ok_or(HandlerError::PlayerNotFound { player_id })?;

    record
        .coraider_account_hints
        .insert(message.claimed_player_id, message.claimed_account_name.clone());

    tx.commit(&record)
        .await
        .map_err(|e| HandlerError::commit(format!("player {player_id}"), e))?;

    info!(
        player_id,
        claimed_player_id = message.claimed_player_id,
        claimed_account_name = %message.claimed_account_name,
        "Updated coraider account claim"
    );
    Ok(())
}

/// Attribute a report participant to an account. Returns whether a guild
/// stats cache entry was invalidated.
pub async fn report_account_claim(
    message: &ReportAccountClaimMessage,
    deps: &Deps,
) -> Result<bool, HandlerError> {
    let code = message.report_code.as_str();

    let mut tx = deps
        .store
        .begin_report(code)
        .await
        .map_err(HandlerError::store)?;
    let mut report = tx
        .get()
        .await
        .map_err(HandlerError::store)?
        .ok_or_else(|| HandlerError::ReportNotFound {
            code: code.to_string(),
        })?;

    report
        .claimed_accounts_by_character
        .insert(message.claimed_player_id, message.claimed_account_name.clone());

    tx.commit(&report)
        .await
        .map_err(|e| HandlerError::commit(format!("report {code}"), e))?;

    let invalidated = report.has_guild();
    if invalidated {
        deps.guild_cache
            .invalidate(report.guild_id)
            .await
            .map_err(|e| HandlerError::CacheInvalidation {
                guild_id: report.guild_id,
                source: e.into(),
            })?;
    }

    info!(
        report_code = code,
        claimed_player_id = message.claimed_player_id,
        claimed_account_name = %message.claimed_account_name,
        guild_id = report.guild_id,
        "Updated report account claim"
    );
    Ok(invalidated)
}
