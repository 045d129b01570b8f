use raidlog_common::{CharacterId, GuildId};
use raidlog_events::{MessageError, PublishError};
use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Handler failure, split into what a redelivery can fix and what it cannot.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("malformed message: {0}")]
    Malformed(#[from] MessageError),

    #[error("report {code} not found")]
    ReportNotFound { code: String },

    #[error("player {player_id} not in report {code}")]
    PlayerNotInReport { code: String, player_id: CharacterId },

    #[error("player {player_id} not found")]
    PlayerNotFound { player_id: CharacterId },

    #[error("empty account name claimed for player {player_id}")]
    EmptyAccountName { player_id: CharacterId },

    #[error("no character named {account_name}")]
    UnknownAccountName { account_name: String },

    #[error("store read failed: {0}")]
    Store(#[source] BoxError),

    #[error("commit of {what} failed: {source}")]
    Commit {
        what: String,
        #[source]
        source: BoxError,
    },

    #[error("{failed} of {total} publishes failed")]
    Publish { failed: usize, total: usize },

    #[error("guild stats invalidation for guild {guild_id} failed: {source}")]
    CacheInvalidation {
        guild_id: GuildId,
        #[source]
        source: BoxError,
    },
}

impl HandlerError {
    /// Whether redelivering the same message may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Store(_) | Self::Commit { .. } | Self::Publish { .. } | Self::CacheInvalidation { .. }
        )
    }

    pub(crate) fn store(e: anyhow::Error) -> Self {
        Self::Store(e.into())
    }

    pub(crate) fn commit(what: impl Into<String>, e: anyhow::Error) -> Self {
        Self::Commit {
            what: what.into(),
            source: e.into(),
        }
    }
}

impl From<PublishError> for HandlerError {
    fn from(e: PublishError) -> Self {
        Self::Publish {
            failed: e.failed,
            total: e.total,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn contract_violations_are_fatal() {
        let fatal = [
            HandlerError::ReportNotFound { code: "abc".into() },
            HandlerError::PlayerNotInReport {
                code: "abc".into(),
                player_id: 1,
            },
            HandlerError::PlayerNotFound { player_id: 1 },
            HandlerError::EmptyAccountName { player_id: 1 },
            HandlerError::Malformed(MessageError::MissingAttribute { name: "code" }),
        ];
        assert!(fatal.iter().all(|e| !e.is_retryable()));
    }

    #[test]
    fn infrastructure_failures_are_retryable() {
        let retryable = [
            HandlerError::store(anyhow::anyhow!("connection reset")),
            HandlerError::commit("player 1", anyhow::anyhow!("conflict")),
            HandlerError::from(PublishError { failed: 1, total: 3 }),
            HandlerError::CacheInvalidation {
                guild_id: 42,
                source: "timeout".into(),
            },
        ];
        assert!(retryable.iter().all(HandlerError::is_retryable));
    }

    #[test]
    fn publish_error_keeps_counts() {
        let err = HandlerError::from(PublishError { failed: 2, total: 5 });
        assert_eq!(err.to_string(), "2 of 5 publishes failed");
    }
}
