//! Integration tests for the notification dispatcher: precondition failures,
//! recipient filtering, confirmation aggregation, and cancellation.

use crash_sentinel::error::SentinelError;
use crash_sentinel::gateway::MockGateway;
use crash_sentinel::notify::{
    BatchEvent, DeliveryOutcome, Dispatcher, Recipient, RecipientCategory, SendOutcome,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

fn recipient(phone: &str) -> Recipient {
    Recipient {
        name: String::new(),
        phone: phone.to_string(),
        category: RecipientCategory::Other,
    }
}

/// Drain events until one matches, with a timeout.
async fn wait_for_event<F>(
    rx: &mut broadcast::Receiver<BatchEvent>,
    mut matches: F,
) -> BatchEvent
where
    F: FnMut(&BatchEvent) -> bool,
{
    let deadline = Duration::from_secs(2);
    tokio::time::timeout(deadline, async {
        loop {
            match rx.recv().await {
                Ok(event) if matches(&event) => return event,
                Ok(_) => continue,
                Err(err) => panic!("event stream ended: {err}"),
            }
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for batch event"))
}

#[tokio::test]
async fn empty_recipients_fails_without_sending() {
    let gateway = Arc::new(MockGateway::auto());
    let dispatcher = Dispatcher::new(Arc::clone(&gateway) as _);
    let mut events = dispatcher.subscribe();

    let result = dispatcher.dispatch(&[], "help").await;
    assert!(matches!(result, Err(SentinelError::EmptyRecipients)));
    assert_eq!(gateway.submission_count(), 0);

    let event = wait_for_event(&mut events, |e| matches!(e, BatchEvent::Error(_))).await;
    match event {
        BatchEvent::Error(message) => assert!(message.contains("recipients")),
        other => panic!("unexpected event: {other:?}"),
    }
}

#[tokio::test]
async fn empty_message_fails_without_sending() {
    let gateway = Arc::new(MockGateway::auto());
    let dispatcher = Dispatcher::new(Arc::clone(&gateway) as _);

    let result = dispatcher.dispatch(&[recipient("+15550100")], "").await;
    assert!(matches!(result, Err(SentinelError::EmptyMessage)));
    assert_eq!(gateway.submission_count(), 0);
}

#[tokio::test]
async fn all_invalid_phones_fails_with_no_valid_recipients() {
    let gateway = Arc::new(MockGateway::auto());
    let dispatcher = Dispatcher::new(Arc::clone(&gateway) as _);

    let result = dispatcher
        .dispatch(&[recipient(""), recipient("")], "help")
        .await;
    assert!(matches!(result, Err(SentinelError::NoValidRecipients)));
    assert_eq!(gateway.submission_count(), 0);
}

#[tokio::test]
async fn two_recipients_one_part_completes_with_two_units() {
    let gateway = Arc::new(MockGateway::manual());
    let dispatcher = Dispatcher::new(Arc::clone(&gateway) as _);
    let mut events = dispatcher.subscribe();

    let batch = dispatcher
        .dispatch(&[recipient("+1"), recipient("+2")], "short message")
        .await
        .unwrap_or_else(|e| panic!("{e}"));
    assert_eq!(batch.total, 2);
    assert_eq!(batch.parts, 1);
    assert_eq!(gateway.submission_count(), 2);

    gateway.confirm_sent("+1", 0, SendOutcome::Accepted);
    gateway.confirm_sent("+2", 0, SendOutcome::Accepted);
    let all_sent =
        wait_for_event(&mut events, |e| matches!(e, BatchEvent::AllSent { .. })).await;
    assert_eq!(all_sent, BatchEvent::AllSent { total: 2, sent: 2 });

    gateway.confirm_delivered("+1", 0, DeliveryOutcome::Acknowledged);
    gateway.confirm_delivered("+2", 0, DeliveryOutcome::Acknowledged);
    // The completion predicate is a combined sent+delivered sum, so delivered
    // events can fire more than once; the final one carries the full count.
    let mut last_delivered = None;
    for _ in 0..2 {
        let event = wait_for_event(&mut events, |e| {
            matches!(e, BatchEvent::AllDelivered { .. })
        })
        .await;
        last_delivered = Some(event);
    }
    assert_eq!(
        last_delivered,
        Some(BatchEvent::AllDelivered {
            total: 2,
            delivered: 2
        })
    );
}

#[tokio::test]
async fn failed_send_outcomes_do_not_count_toward_completion() {
    let gateway = Arc::new(MockGateway::manual());
    let dispatcher = Dispatcher::new(Arc::clone(&gateway) as _);
    let mut events = dispatcher.subscribe();

    dispatcher
        .dispatch(&[recipient("+1"), recipient("+2")], "short message")
        .await
        .unwrap_or_else(|e| panic!("{e}"));

    // A radio failure is logged but never incremented.
    gateway.confirm_sent("+1", 0, SendOutcome::RadioOff);
    gateway.confirm_sent("+2", 0, SendOutcome::Accepted);
    gateway.confirm_delivered("+1", 0, DeliveryOutcome::Acknowledged);

    // sent=1 + delivered=1 reaches total=2 via the combined predicate.
    let event = wait_for_event(&mut events, |e| {
        matches!(e, BatchEvent::AllDelivered { .. })
    })
    .await;
    assert_eq!(
        event,
        BatchEvent::AllDelivered {
            total: 2,
            delivered: 1
        }
    );
}

#[tokio::test]
async fn rejected_hand_off_shrinks_expected_total() {
    let gateway = Arc::new(MockGateway::manual());
    gateway.reject("+2");
    let dispatcher = Dispatcher::new(Arc::clone(&gateway) as _);
    let mut events = dispatcher.subscribe();

    let batch = dispatcher
        .dispatch(&[recipient("+1"), recipient("+2")], "short message")
        .await
        .unwrap_or_else(|e| panic!("{e}"));
    assert_eq!(batch.total, 1);
    assert_eq!(gateway.submission_count(), 1);

    gateway.confirm_sent("+1", 0, SendOutcome::Accepted);
    let event = wait_for_event(&mut events, |e| matches!(e, BatchEvent::AllSent { .. })).await;
    assert_eq!(event, BatchEvent::AllSent { total: 1, sent: 1 });
}

#[tokio::test]
async fn long_message_yields_units_per_part() {
    let gateway = Arc::new(MockGateway::auto());
    let dispatcher = Dispatcher::new(Arc::clone(&gateway) as _);

    let message = "x".repeat(200); // 2 parts
    let batch = dispatcher
        .dispatch(&[recipient("+1")], &message)
        .await
        .unwrap_or_else(|e| panic!("{e}"));
    assert_eq!(batch.parts, 2);
    assert_eq!(batch.total, 2);

    let submissions = gateway.submissions();
    assert_eq!(submissions.len(), 1);
    assert_eq!(submissions[0].1.len(), 2);
}

#[tokio::test]
async fn cancel_suppresses_completion_and_emits_once() {
    let gateway = Arc::new(MockGateway::manual());
    let dispatcher = Dispatcher::new(Arc::clone(&gateway) as _);
    let mut events = dispatcher.subscribe();

    dispatcher
        .dispatch(&[recipient("+1")], "short message")
        .await
        .unwrap_or_else(|e| panic!("{e}"));

    dispatcher.cancel();
    let cancelled = wait_for_event(&mut events, |e| matches!(e, BatchEvent::Cancelled)).await;
    assert_eq!(cancelled, BatchEvent::Cancelled);

    // Confirmations arriving after cancellation must not complete the batch.
    gateway.confirm_sent("+1", 0, SendOutcome::Accepted);
    gateway.confirm_delivered("+1", 0, DeliveryOutcome::Acknowledged);
    tokio::time::sleep(Duration::from_millis(100)).await;

    let mut saw_completion = false;
    while let Ok(event) = events.try_recv() {
        if matches!(
            event,
            BatchEvent::AllSent { .. } | BatchEvent::AllDelivered { .. }
        ) {
            saw_completion = true;
        }
    }
    assert!(!saw_completion);
}
