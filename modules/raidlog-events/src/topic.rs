use std::fmt;
use std::str::FromStr;

use crate::message::MessageError;

/// Channel topics. The string ids are the wire names shared with producers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Topic {
    /// A report was fetched; one message per report code.
    Report,
    /// A character appears in a fetched report.
    PlayerReport,
    /// A character explicitly claims an account name.
    AccountClaim,
    /// A coraider's claimed account, pushed to a character who raided with them.
    CoraiderAccountClaim,
    /// A character's claimed account, pushed into a guild report's roster.
    ReportAccountClaim,
    GuildReports,
    UserReports,
    RecentCharacterReports,
}

impl Topic {
    pub const ALL: [Topic; 8] = [
        Topic::Report,
        Topic::PlayerReport,
        Topic::AccountClaim,
        Topic::CoraiderAccountClaim,
        Topic::ReportAccountClaim,
        Topic::GuildReports,
        Topic::UserReports,
        Topic::RecentCharacterReports,
    ];

    pub fn id(self) -> &'static str {
        match self {
            Topic::Report => "report",
            Topic::PlayerReport => "playerreport",
            Topic::AccountClaim => "accountclaim",
            Topic::CoraiderAccountClaim => "coraideraccountclaim",
            Topic::ReportAccountClaim => "reportaccountclaim",
            Topic::GuildReports => "guildreports",
            Topic::UserReports => "userreports",
            Topic::RecentCharacterReports => "recentcharacterreports",
        }
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Topic {
    type Err = MessageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Topic::ALL
            .into_iter()
            .find(|t| t.id() == s)
            .ok_or_else(|| MessageError::UnknownTopic(s.to_string()))
    }
}
