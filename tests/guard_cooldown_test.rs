//! Guard behavior across the pipeline: cooldown windows, error re-arming.

use crash_sentinel::classifier::{Classifier, ThresholdRule};
use crash_sentinel::gateway::{MessageGateway, MockGateway};
use crash_sentinel::guard::AlertGuard;
use crash_sentinel::notify::{Dispatcher, Recipient, RecipientCategory};
use crash_sentinel::orchestrator::{Orchestrator, SentinelEvent};
use crash_sentinel::providers::{StaticLocation, StaticRecipients};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::sync::broadcast;

fn build(recipients: Vec<Recipient>, cooldown: Duration) -> (Arc<Orchestrator>, Arc<MockGateway>) {
    let gateway = Arc::new(MockGateway::auto());
    let dispatcher = Arc::new(Dispatcher::new(
        Arc::clone(&gateway) as Arc<dyn MessageGateway>
    ));
    let orchestrator = Arc::new(Orchestrator::new(
        Arc::new(Classifier::threshold_only(ThresholdRule::default())),
        Arc::new(AlertGuard::new(cooldown)),
        dispatcher,
        Arc::new(StaticRecipients::new(recipients)),
        Arc::new(StaticLocation::default()),
    ));
    (orchestrator, gateway)
}

fn one_recipient() -> Vec<Recipient> {
    vec![Recipient {
        name: String::new(),
        phone: "+15550100".into(),
        category: RecipientCategory::Other,
    }]
}

async fn wait_for<F>(rx: &mut broadcast::Receiver<SentinelEvent>, mut matches: F) -> SentinelEvent
where
    F: FnMut(&SentinelEvent) -> bool,
{
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            match rx.recv().await {
                Ok(event) if matches(&event) => return event,
                Ok(_) => continue,
                Err(err) => panic!("event stream ended: {err}"),
            }
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for event"))
}

#[tokio::test(start_paused = true)]
async fn cooldown_expiry_allows_a_new_automatic_alert() {
    let (orchestrator, gateway) = build(one_recipient(), Duration::from_secs(300));

    orchestrator.trigger_automatic().await;
    assert_eq!(gateway.submission_count(), 1);

    orchestrator.trigger_automatic().await;
    assert_eq!(gateway.submission_count(), 1);

    // Let the cooldown window elapse; the guard re-arms itself.
    tokio::time::sleep(Duration::from_secs(301)).await;

    orchestrator.trigger_automatic().await;
    assert_eq!(gateway.submission_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn triggers_inside_the_window_stay_suppressed() {
    let (orchestrator, gateway) = build(one_recipient(), Duration::from_secs(300));

    orchestrator.trigger_automatic().await;
    tokio::time::sleep(Duration::from_secs(150)).await;
    orchestrator.trigger_automatic().await;
    tokio::time::sleep(Duration::from_secs(149)).await;
    orchestrator.trigger_automatic().await;

    assert_eq!(gateway.submission_count(), 1);
}

#[tokio::test]
async fn dispatch_error_re_arms_the_guard() {
    // No recipients: every dispatch fails with a batch error, which must
    // re-arm the guard so a later alert can go out.
    let (orchestrator, gateway) = build(Vec::new(), Duration::from_secs(300));
    let mut events = orchestrator.subscribe();

    let (device, mut host) = tokio::io::duplex(256);
    let runner = Arc::clone(&orchestrator);
    let run = tokio::spawn(async move { runner.run(Box::new(device)).await });

    host.write_all(b"ACCEL:25.0 GYRO:1.0\n")
        .await
        .unwrap_or_else(|e| panic!("{e}"));
    wait_for(&mut events, |e| {
        matches!(e, SentinelEvent::AlertTriggered { manual: false })
    })
    .await;

    // The failed dispatch resets the guard; observe the re-arm transition.
    wait_for(&mut events, |e| {
        matches!(e, SentinelEvent::Guard(status) if !status.sent)
    })
    .await;

    host.write_all(b"ACCEL:26.0 GYRO:1.0\n")
        .await
        .unwrap_or_else(|e| panic!("{e}"));
    wait_for(&mut events, |e| {
        matches!(e, SentinelEvent::AlertTriggered { manual: false })
    })
    .await;

    drop(host);
    run.await
        .unwrap_or_else(|e| panic!("{e}"))
        .unwrap_or_else(|e| panic!("{e}"));
    assert_eq!(gateway.submission_count(), 0);
}
