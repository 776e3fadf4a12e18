mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use common::{fill, RecordingMirror, RecordingNotifier, ScriptedApi};
use fillwatch::coordinator::{BatchOutcome, Coordinator, IngestBatch};
use fillwatch::health::HealthCounters;
use fillwatch::mirror::Mirror;
use fillwatch::poller::FillsPoller;
use fillwatch::types::SourceKind;
use serde_json::json;
use tokio::sync::{mpsc, watch};

fn coordinator(
    notifier: Arc<RecordingNotifier>,
) -> Coordinator<RecordingNotifier, RecordingMirror> {
    Coordinator::new(
        notifier,
        RecordingMirror::default(),
        Arc::new(HealthCounters::default()),
    )
}

#[tokio::test]
async fn second_poll_only_announces_new_fill() {
    let api = Arc::new(ScriptedApi::default());
    let btc = fill("BTC", 1000, "B", "0.5", "60000");
    let eth = fill("ETH", 2000, "S", "2", "3000");
    api.push_fills(vec![btc.clone()]);
    api.push_fills(vec![eth, btc]);

    let notifier = Arc::new(RecordingNotifier::default());
    let mut coord = coordinator(notifier.clone());
    let mut poller = FillsPoller::new(api.clone(), "0xabc".to_string(), 10);

    let first = poller.poll_once().await.expect("poll 1");
    coord.process_batch(IngestBatch::new(SourceKind::Poll, first)).await;
    let msgs = notifier.messages();
    assert_eq!(msgs.len(), 1);
    assert!(msgs[0].contains("BUY BTC"), "{}", msgs[0]);
    assert!(msgs[0].contains("Size: 0.50"), "{}", msgs[0]);
    assert!(msgs[0].contains("$30,000.00"), "{}", msgs[0]);

    let second = poller.poll_once().await.expect("poll 2");
    let outcome = coord
        .process_batch(IngestBatch::new(SourceKind::Poll, second))
        .await;
    assert_eq!(
        outcome,
        BatchOutcome {
            novel: 1,
            duplicates: 1,
            malformed: 0,
            notify_failed: 0,
        }
    );
    let msgs = notifier.messages();
    assert_eq!(msgs.len(), 2);
    assert!(msgs[1].contains("SELL ETH"), "{}", msgs[1]);

    // Metadata is fetched on the cold start only.
    assert_eq!(api.meta_calls.load(Ordering::SeqCst), 1);
    assert_eq!(poller.cached_markets().map(|m| m.len()), Some(2));
}

#[tokio::test]
async fn poll_takes_first_records_in_api_order() {
    let api = Arc::new(ScriptedApi::default());
    api.push_fills(
        (0..15)
            .map(|i| fill("SOL", 10_000 - i, "B", "1", "150"))
            .collect(),
    );
    let mut poller = FillsPoller::new(api, "0xabc".to_string(), 10);
    let records = poller.poll_once().await.expect("poll");
    assert_eq!(records.len(), 10);
    assert_eq!(records[0]["time"], 10_000);
    assert_eq!(records[9]["time"], 9_991);
}

#[tokio::test]
async fn failed_fetch_aborts_cycle_and_next_one_proceeds() {
    let api = Arc::new(ScriptedApi::default());
    api.push_fills_err("HTTP 502");
    api.push_fills(vec![fill("BTC", 1, "B", "1", "1")]);
    let mut poller = FillsPoller::new(api, "0xabc".to_string(), 10);

    assert!(poller.poll_once().await.is_err());
    assert_eq!(poller.poll_once().await.expect("recovered").len(), 1);
}

#[tokio::test]
async fn metadata_failure_blocks_cold_start_until_it_succeeds() {
    let api = Arc::new(ScriptedApi::default());
    api.meta_fail.store(true, Ordering::SeqCst);
    api.push_fills(vec![fill("BTC", 1, "B", "1", "1")]);
    api.push_fills(vec![fill("ETH", 2, "A", "1", "1")]);
    let mut poller = FillsPoller::new(api.clone(), "0xabc".to_string(), 10);

    assert!(poller.poll_once().await.is_err());
    assert!(poller.cached_markets().is_none());
    // Fills were never requested.
    assert_eq!(api.fills.lock().expect("lock").len(), 2);

    api.meta_fail.store(false, Ordering::SeqCst);
    let first = poller.poll_once().await.expect("cold start");
    assert_eq!(first[0]["coin"], "BTC");
    let second = poller.poll_once().await.expect("warm");
    assert_eq!(second[0]["coin"], "ETH");

    assert_eq!(api.meta_calls.load(Ordering::SeqCst), 2);
    assert_eq!(poller.cached_markets().map(|m| m.len()), Some(2));
}

#[tokio::test]
async fn push_batch_notifies_in_array_order() {
    let notifier = Arc::new(RecordingNotifier::default());
    let mut coord = coordinator(notifier.clone());

    let outcome = coord
        .process_batch(IngestBatch::new(
            SourceKind::Push,
            vec![
                fill("ETH", 5, "A", "1.5", "3000"),
                fill("BTC", 6, "B", "0.1", "60000"),
            ],
        ))
        .await;
    assert_eq!(outcome.novel, 2);

    let msgs = notifier.messages();
    assert_eq!(msgs.len(), 2);
    assert!(msgs[0].contains("SELL ETH"));
    assert!(msgs[1].contains("BUY BTC"));
}

#[tokio::test]
async fn poll_and_push_interleaving_sends_once_per_identity() {
    let notifier = Arc::new(RecordingNotifier::default());
    let mut coord = coordinator(notifier.clone());

    let a = fill("BTC", 100, "B", "0.5", "60000");
    // Same identity as `a`; price and numeric encoding differ.
    let a_push = json!({"coin": "BTC", "time": "100", "side": "B", "sz": 0.5, "px": 60010.0});
    let b = fill("ETH", 200, "A", "2", "3000");
    let c = fill("BTC", 100, "A", "0.5", "60000");

    let batches = vec![
        IngestBatch::new(SourceKind::Push, vec![a_push.clone()]),
        IngestBatch::new(SourceKind::Poll, vec![b.clone(), a.clone()]),
        IngestBatch::new(SourceKind::Push, vec![b.clone(), c.clone()]),
        IngestBatch::new(SourceKind::Poll, vec![c, b, a]),
        IngestBatch::new(SourceKind::Push, vec![a_push]),
    ];
    for batch in batches {
        coord.process_batch(batch).await;
    }

    let msgs = notifier.messages();
    assert_eq!(msgs.len(), 3, "{msgs:#?}");
    assert_eq!(coord.seen_count(), 3);
    assert_eq!(msgs.iter().filter(|m| m.contains("BUY BTC")).count(), 1);
    assert_eq!(msgs.iter().filter(|m| m.contains("SELL BTC")).count(), 1);
    assert_eq!(msgs.iter().filter(|m| m.contains("SELL ETH")).count(), 1);
}

#[tokio::test]
async fn replay_of_seen_fill_is_silent() {
    let notifier = Arc::new(RecordingNotifier::default());
    let mut coord = coordinator(notifier.clone());
    let f = fill("BTC", 1000, "B", "0.5", "60000");

    coord
        .process_batch(IngestBatch::new(SourceKind::Poll, vec![f.clone()]))
        .await;
    for _ in 0..5 {
        let outcome = coord
            .process_batch(IngestBatch::new(SourceKind::Push, vec![f.clone()]))
            .await;
        assert_eq!(outcome.novel, 0);
        assert_eq!(outcome.duplicates, 1);
    }
    assert_eq!(notifier.attempts.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn malformed_record_is_dropped_and_batch_continues() {
    let notifier = Arc::new(RecordingNotifier::default());
    let mut coord = coordinator(notifier.clone());

    let outcome = coord
        .process_batch(IngestBatch::new(
            SourceKind::Poll,
            vec![
                json!({"time": 1, "side": "B", "sz": "1", "px": "1"}),
                fill("BTC", 2, "B", "1", "1"),
                json!({"coin": "ETH", "side": "B", "sz": "1"}),
                json!({"coin": "ETH", "time": 3, "sz": "1"}),
                json!({"coin": "ETH", "time": 3, "side": "A"}),
                json!(42),
                fill("ETH", 4, "A", "1", "1"),
            ],
        ))
        .await;

    assert_eq!(outcome.malformed, 5);
    assert_eq!(outcome.novel, 2);
    assert_eq!(notifier.messages().len(), 2);
}

#[tokio::test]
async fn failed_notification_is_not_retried() {
    let notifier = Arc::new(RecordingNotifier::failing());
    let mut coord = coordinator(notifier.clone());
    let f = fill("BTC", 1000, "B", "0.5", "60000");

    let outcome = coord
        .process_batch(IngestBatch::new(SourceKind::Poll, vec![f.clone()]))
        .await;
    assert_eq!(outcome.notify_failed, 1);

    notifier.fail.store(false, Ordering::SeqCst);
    coord
        .process_batch(IngestBatch::new(SourceKind::Poll, vec![f]))
        .await;
    assert_eq!(notifier.attempts.load(Ordering::SeqCst), 1);
    assert!(notifier.messages().is_empty());
}

#[tokio::test]
async fn mirror_fires_once_per_new_fill_even_when_it_fails() {
    let notifier = Arc::new(RecordingNotifier::default());
    let mirror = RecordingMirror {
        fail: true,
        ..RecordingMirror::armed()
    };
    let mirrored = mirror.mirrored.clone();
    let mut coord = Coordinator::new(notifier.clone(), mirror, Arc::new(HealthCounters::default()));

    let f = fill("BTC", 1000, "B", "0.5", "60000");
    let g = fill("ETH", 2000, "A", "2", "3000");
    coord
        .process_batch(IngestBatch::new(SourceKind::Push, vec![f.clone(), g.clone()]))
        .await;
    let outcome = coord
        .process_batch(IngestBatch::new(SourceKind::Poll, vec![g, f]))
        .await;

    assert_eq!(outcome.duplicates, 2);
    assert_eq!(notifier.messages().len(), 2);
    let mirrored = mirrored.lock().expect("lock");
    assert_eq!(mirrored.len(), 2);
    assert_eq!(mirrored[0].asset, "BTC");
    assert_eq!(mirrored[1].asset, "ETH");
}

#[tokio::test]
async fn disarmed_mirror_stays_quiet() {
    let notifier = Arc::new(RecordingNotifier::default());
    let health = Arc::new(HealthCounters::default());
    let mut coord = Coordinator::new(notifier.clone(), Mirror::Off, health.clone());

    coord
        .process_batch(IngestBatch::new(
            SourceKind::Poll,
            vec![fill("BTC", 1, "B", "1", "1")],
        ))
        .await;
    let snap = health.snapshot();
    assert_eq!(snap.mirror_fired, 0);
    assert_eq!(snap.fills_notified, 1);
}

#[tokio::test]
async fn run_loop_consumes_both_producers() {
    let notifier = Arc::new(RecordingNotifier::default());
    let coord = coordinator(notifier.clone());
    let (tx, rx) = mpsc::channel(16);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = tokio::spawn(coord.run(rx, shutdown_rx));

    let poll_tx = tx.clone();
    let push_tx = tx;
    let f = fill("BTC", 1000, "B", "0.5", "60000");
    let poll = {
        let f = f.clone();
        tokio::spawn(async move {
            for _ in 0..20 {
                poll_tx
                    .send(IngestBatch::new(SourceKind::Poll, vec![f.clone()]))
                    .await
                    .expect("send poll");
            }
        })
    };
    let push = tokio::spawn(async move {
        for _ in 0..20 {
            push_tx
                .send(IngestBatch::new(SourceKind::Push, vec![f.clone()]))
                .await
                .expect("send push");
        }
    });
    poll.await.expect("poll producer");
    push.await.expect("push producer");

    // Both senders are gone, so the loop drains the queue and stops.
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("coordinator stops")
        .expect("join")
        .expect("run");
    drop(shutdown_tx);

    assert_eq!(notifier.messages().len(), 1);
}
