//! Typed messages and their attribute-map encoding.

use std::collections::BTreeMap;
use std::num::ParseIntError;

use thiserror::Error;

use crate::topic::Topic;

/// Flat attribute map carried by every channel message.
pub type Attributes = BTreeMap<String, String>;

#[derive(Debug, Error)]
pub enum MessageError {
    #[error("missing attribute {name}")]
    MissingAttribute { name: &'static str },

    #[error("attribute {name} is not a valid id: {value:?}")]
    InvalidId {
        name: &'static str,
        value: String,
        #[source]
        source: ParseIntError,
    },

    #[error("unknown topic {0:?}")]
    UnknownTopic(String),
}

/// A message with a fixed topic and a lossless attribute encoding.
pub trait Message: Sized + Send + Sync {
    const TOPIC: Topic;

    fn to_attributes(&self) -> Attributes;

    fn from_attributes(attributes: &Attributes) -> Result<Self, MessageError>;
}

// ---------------------------------------------------------------------------
// Attribute helpers
// ---------------------------------------------------------------------------

fn id<T>(attributes: &Attributes, name: &'static str) -> Result<T, MessageError>
where
    T: std::str::FromStr<Err = ParseIntError>,
{
    let raw = attributes
        .get(name)
        .ok_or(MessageError::MissingAttribute { name })?;
    raw.parse().map_err(|source| MessageError::InvalidId {
        name,
        value: raw.clone(),
        source,
    })
}

/// Absent text attributes decode as empty strings.
fn text(attributes: &Attributes, name: &str) -> String {
    attributes.get(name).cloned().unwrap_or_default()
}

fn required_text(attributes: &Attributes, name: &'static str) -> Result<String, MessageError> {
    match attributes.get(name) {
        Some(value) if !value.is_empty() => Ok(value.clone()),
        _ => Err(MessageError::MissingAttribute { name }),
    }
}

fn attributes<const N: usize>(pairs: [(&str, String); N]) -> Attributes {
    pairs
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
}

// ---------------------------------------------------------------------------
// Consumed messages
// ---------------------------------------------------------------------------

/// A character appears in report `code`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerReportMessage {
    pub code: String,
    pub player_id: i64,
}

impl Message for PlayerReportMessage {
    const TOPIC: Topic = Topic::PlayerReport;

    fn to_attributes(&self) -> Attributes {
        attributes([
            ("code", self.code.clone()),
            ("player_id", self.player_id.to_string()),
        ])
    }

    fn from_attributes(attributes: &Attributes) -> Result<Self, MessageError> {
        Ok(Self {
            code: required_text(attributes, "code")?,
            player_id: id(attributes, "player_id")?,
        })
    }
}

/// `player_id` should record that `claimed_player_id` belongs to
/// `claimed_account_name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoraiderAccountClaimMessage {
    pub player_id: i64,
    pub claimed_player_id: i64,
    pub claimed_account_name: String,
}

impl Message for CoraiderAccountClaimMessage {
    const TOPIC: Topic = Topic::CoraiderAccountClaim;

    fn to_attributes(&self) -> Attributes {
        attributes([
            ("player_id", self.player_id.to_string()),
            ("claimed_player_id", self.claimed_player_id.to_string()),
            ("claimed_account_name", self.claimed_account_name.clone()),
        ])
    }

    fn from_attributes(attributes: &Attributes) -> Result<Self, MessageError> {
        Ok(Self {
            player_id: id(attributes, "player_id")?,
            claimed_player_id: id(attributes, "claimed_player_id")?,
            claimed_account_name: text(attributes, "claimed_account_name"),
        })
    }
}

/// Report `report_code` should record that `claimed_player_id` belongs to
/// `claimed_account_name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportAccountClaimMessage {
    pub report_code: String,
    pub claimed_player_id: i64,
    pub claimed_account_name: String,
}

impl Message for ReportAccountClaimMessage {
    const TOPIC: Topic = Topic::ReportAccountClaim;

    fn to_attributes(&self) -> Attributes {
        attributes([
            ("report_code", self.report_code.clone()),
            ("claimed_player_id", self.claimed_player_id.to_string()),
            ("claimed_account_name", self.claimed_account_name.clone()),
        ])
    }

    fn from_attributes(attributes: &Attributes) -> Result<Self, MessageError> {
        Ok(Self {
            report_code: required_text(attributes, "report_code")?,
            claimed_player_id: id(attributes, "claimed_player_id")?,
            claimed_account_name: text(attributes, "claimed_account_name"),
        })
    }
}

/// Explicit, user-initiated claim of `account_name` for `player_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountClaimMessage {
    pub player_id: i64,
    pub account_name: String,
}

impl Message for AccountClaimMessage {
    const TOPIC: Topic = Topic::AccountClaim;

    fn to_attributes(&self) -> Attributes {
        attributes([
            ("player_id", self.player_id.to_string()),
            ("account_name", self.account_name.clone()),
        ])
    }

    fn from_attributes(attributes: &Attributes) -> Result<Self, MessageError> {
        Ok(Self {
            player_id: id(attributes, "player_id")?,
            account_name: text(attributes, "account_name"),
        })
    }
}

// ---------------------------------------------------------------------------
// Producer-side messages (consumed by the report-fetch pipeline)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportMessage {
    pub code: String,
}

impl Message for ReportMessage {
    const TOPIC: Topic = Topic::Report;

    fn to_attributes(&self) -> Attributes {
        attributes([("code", self.code.clone())])
    }

    fn from_attributes(attributes: &Attributes) -> Result<Self, MessageError> {
        Ok(Self {
            code: required_text(attributes, "code")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuildReportsMessage {
    pub guild_id: i32,
}

impl Message for GuildReportsMessage {
    const TOPIC: Topic = Topic::GuildReports;

    fn to_attributes(&self) -> Attributes {
        attributes([("guild_id", self.guild_id.to_string())])
    }

    fn from_attributes(attributes: &Attributes) -> Result<Self, MessageError> {
        Ok(Self {
            guild_id: id(attributes, "guild_id")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserReportsMessage {
    pub user_id: i64,
}

impl Message for UserReportsMessage {
    const TOPIC: Topic = Topic::UserReports;

    fn to_attributes(&self) -> Attributes {
        attributes([("user_id", self.user_id.to_string())])
    }

    fn from_attributes(attributes: &Attributes) -> Result<Self, MessageError> {
        Ok(Self {
            user_id: id(attributes, "user_id")?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecentCharacterReportsMessage {
    pub character_id: i64,
}

impl Message for RecentCharacterReportsMessage {
    const TOPIC: Topic = Topic::RecentCharacterReports;

    fn to_attributes(&self) -> Attributes {
        attributes([("character_id", self.character_id.to_string())])
    }

    fn from_attributes(attributes: &Attributes) -> Result<Self, MessageError> {
        Ok(Self {
            character_id: id(attributes, "character_id")?,
        })
    }
}
