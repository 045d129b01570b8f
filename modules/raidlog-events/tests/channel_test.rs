//! Fan-out publish and in-memory delivery tests. No database required.

use std::sync::Arc;

use raidlog_events::{
    publish_all, CoraiderAccountClaimMessage, EventChannel, MemoryChannel, MessageSource,
    OutboundMessage, PlayerReportMessage, PublishError, ReportAccountClaimMessage, Topic,
};

fn coraider_claim(target: i64) -> OutboundMessage {
    OutboundMessage::new(&CoraiderAccountClaimMessage {
        player_id: target,
        claimed_player_id: 1,
        claimed_account_name: "Foo".into(),
    })
}

fn report_claim(code: &str) -> OutboundMessage {
    OutboundMessage::new(&ReportAccountClaimMessage {
        report_code: code.into(),
        claimed_player_id: 1,
        claimed_account_name: "Foo".into(),
    })
}

// =========================================================================
// publish_all
// =========================================================================

#[tokio::test]
async fn publish_all_sends_every_message() {
    let channel = MemoryChannel::new();
    let messages = vec![coraider_claim(2), coraider_claim(3), report_claim("abc")];

    let sent = publish_all(&channel, &messages).await.unwrap();

    assert_eq!(sent, 3);
    let claims = channel.published_as::<CoraiderAccountClaimMessage>();
    let mut targets: Vec<i64> = claims.iter().map(|c| c.player_id).collect();
    targets.sort();
    assert_eq!(targets, vec![2, 3]);
    assert_eq!(channel.published_as::<ReportAccountClaimMessage>().len(), 1);
}

#[tokio::test]
async fn publish_all_of_nothing_succeeds() {
    let channel = MemoryChannel::new();
    assert_eq!(publish_all(&channel, &[]).await.unwrap(), 0);
}

#[tokio::test]
async fn publish_all_aggregates_partial_failure() {
    let channel = MemoryChannel::new();
    channel.fail_topic(Topic::ReportAccountClaim);

    let messages = vec![coraider_claim(2), report_claim("abc"), report_claim("def")];
    let err = publish_all(&channel, &messages).await.unwrap_err();

    assert_eq!(err, PublishError { failed: 2, total: 3 });
    // The successful publish is not retracted.
    assert_eq!(channel.published().len(), 1);
}

#[tokio::test]
async fn injected_failures_are_consumed() {
    let channel = MemoryChannel::new();
    channel.fail_next_publishes(1);

    assert!(channel.publish(&coraider_claim(2)).await.is_err());
    assert!(channel.publish(&coraider_claim(2)).await.is_ok());
}

#[tokio::test]
async fn arc_channel_publishes_through() {
    let channel = Arc::new(MemoryChannel::new());
    let shared: Arc<dyn EventChannel> = channel.clone();

    shared.publish(&report_claim("abc")).await.unwrap();
    assert_eq!(channel.published().len(), 1);
}

// =========================================================================
// MemoryChannel as a MessageSource
// =========================================================================

#[tokio::test]
async fn consumer_sees_messages_after_its_cursor() {
    let channel = MemoryChannel::new();
    for player_id in 1..=3 {
        channel
            .publish(&OutboundMessage::new(&PlayerReportMessage {
                code: "abc".into(),
                player_id,
            }))
            .await
            .unwrap();
    }

    let batch = channel.next_batch("worker", 10).await.unwrap();
    assert_eq!(batch.iter().map(|m| m.seq).collect::<Vec<_>>(), vec![1, 2, 3]);
    assert!(batch.iter().all(|m| m.topic == "playerreport"));

    channel.acknowledge("worker", 2).await.unwrap();
    let batch = channel.next_batch("worker", 10).await.unwrap();
    assert_eq!(batch.len(), 1);
    assert_eq!(batch[0].seq, 3);

    // Cursors are per consumer.
    assert_eq!(channel.next_batch("other", 10).await.unwrap().len(), 3);
}

#[tokio::test]
async fn next_batch_respects_limit() {
    let channel = MemoryChannel::new();
    for target in 0..5 {
        channel.publish(&coraider_claim(target)).await.unwrap();
    }

    assert_eq!(channel.next_batch("worker", 2).await.unwrap().len(), 2);
}

#[tokio::test]
async fn cursor_cannot_move_backwards() {
    let channel = MemoryChannel::new();
    channel.acknowledge("worker", 5).await.unwrap();
    assert!(channel.acknowledge("worker", 4).await.is_err());
}

#[tokio::test]
async fn dead_letters_are_recorded_with_reason() {
    let channel = MemoryChannel::new();
    channel.publish(&coraider_claim(2)).await.unwrap();
    let batch = channel.next_batch("worker", 1).await.unwrap();

    channel
        .dead_letter("worker", &batch[0], "player 2 not found")
        .await
        .unwrap();

    let dead = channel.dead_letters();
    assert_eq!(dead.len(), 1);
    assert_eq!(dead[0].1, "player 2 not found");
}
