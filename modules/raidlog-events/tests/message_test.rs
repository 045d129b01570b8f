//! Attribute codec tests. These pin the wire names shared with producers.

use raidlog_events::{
    AccountClaimMessage, Attributes, CoraiderAccountClaimMessage, GuildReportsMessage, Message,
    MessageError, OutboundMessage, PlayerReportMessage, ReportAccountClaimMessage, Topic,
};

fn attrs(pairs: &[(&str, &str)]) -> Attributes {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

// =========================================================================
// Wire names
// =========================================================================

#[test]
fn player_report_uses_code_and_player_id() {
    let message = PlayerReportMessage {
        code: "q1ZxbNt74DB6zFr2".into(),
        player_id: 71133535,
    };

    assert_eq!(
        message.to_attributes(),
        attrs(&[("code", "q1ZxbNt74DB6zFr2"), ("player_id", "71133535")])
    );
}

#[test]
fn coraider_claim_uses_target_and_claimed_ids() {
    let attributes = attrs(&[
        ("player_id", "11296426"),
        ("claimed_player_id", "38937027"),
        ("claimed_account_name", "Jaythe"),
    ]);

    let message = CoraiderAccountClaimMessage::from_attributes(&attributes).unwrap();
    assert_eq!(message.player_id, 11296426);
    assert_eq!(message.claimed_player_id, 38937027);
    assert_eq!(message.claimed_account_name, "Jaythe");
    assert_eq!(message.to_attributes(), attributes);
}

#[test]
fn report_claim_uses_report_code() {
    let message = ReportAccountClaimMessage {
        report_code: "aBcD".into(),
        claimed_player_id: 5,
        claimed_account_name: "Foo".into(),
    };
    let attributes = message.to_attributes();

    assert_eq!(attributes["report_code"], "aBcD");
    assert_eq!(attributes["claimed_player_id"], "5");
    assert_eq!(attributes["claimed_account_name"], "Foo");
}

#[test]
fn topic_ids_parse_back() {
    for topic in Topic::ALL {
        assert_eq!(topic.id().parse::<Topic>().unwrap(), topic);
    }
    assert_eq!(Topic::CoraiderAccountClaim.id(), "coraideraccountclaim");
    assert_eq!(Topic::ReportAccountClaim.id(), "reportaccountclaim");
    assert_eq!(Topic::PlayerReport.id(), "playerreport");
}

// =========================================================================
// Malformed input
// =========================================================================

#[test]
fn non_numeric_player_id_is_rejected() {
    let err = PlayerReportMessage::from_attributes(&attrs(&[
        ("code", "abc"),
        ("player_id", "not-a-number"),
    ]))
    .unwrap_err();

    assert!(matches!(
        err,
        MessageError::InvalidId {
            name: "player_id",
            ..
        }
    ));
}

#[test]
fn missing_id_is_rejected() {
    let err = AccountClaimMessage::from_attributes(&attrs(&[("account_name", "Foo")])).unwrap_err();
    assert!(matches!(
        err,
        MessageError::MissingAttribute { name: "player_id" }
    ));
}

#[test]
fn empty_report_code_is_rejected() {
    let err = PlayerReportMessage::from_attributes(&attrs(&[("code", ""), ("player_id", "1")]))
        .unwrap_err();
    assert!(matches!(err, MessageError::MissingAttribute { name: "code" }));
}

#[test]
fn missing_account_name_decodes_as_empty() {
    let message = CoraiderAccountClaimMessage::from_attributes(&attrs(&[
        ("player_id", "1"),
        ("claimed_player_id", "2"),
    ]))
    .unwrap();
    assert_eq!(message.claimed_account_name, "");
}

#[test]
fn guild_id_out_of_i32_range_is_rejected() {
    let err =
        GuildReportsMessage::from_attributes(&attrs(&[("guild_id", "9999999999")])).unwrap_err();
    assert!(matches!(err, MessageError::InvalidId { .. }));
}

#[test]
fn unknown_topic_id_is_rejected() {
    let err = "fetchreport".parse::<Topic>().unwrap_err();
    assert!(matches!(err, MessageError::UnknownTopic(ref t) if t == "fetchreport"));
}

// =========================================================================
// OutboundMessage
// =========================================================================

#[test]
fn outbound_decode_checks_topic() {
    let outbound = OutboundMessage::new(&PlayerReportMessage {
        code: "abc".into(),
        player_id: 7,
    });

    assert_eq!(outbound.topic, Topic::PlayerReport);
    assert!(outbound.decode::<PlayerReportMessage>().is_some());
    assert!(outbound.decode::<AccountClaimMessage>().is_none());
}
