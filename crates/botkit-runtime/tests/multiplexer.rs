//! End-to-end multiplexer behaviour over the in-memory transport.

use std::sync::Arc;
use std::time::Duration;

use botkit_core::types::{KxCompleted, ReceivedPm, ReceivedTip};
use botkit_core::{EventKind, MemoryTransport, TransportError};
use botkit_log::{LogBackend, LogConfig};
use botkit_runtime::{Bot, NotificationRoutes, Route, RunError};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

const WAIT: Duration = Duration::from_secs(2);

fn backend() -> LogBackend {
    LogBackend::new(LogConfig {
        debug_level: "debug".into(),
        use_stdout: false,
        ..LogConfig::default()
    })
    .expect("backend")
}

fn pm(seq: u64) -> ReceivedPm {
    ReceivedPm {
        uid: "alice-uid".into(),
        nick: "alice".into(),
        message: format!("message {seq}"),
        timestamp_ms: 1_700_000_000_000,
        sequence_id: seq,
    }
}

fn tip(seq: u64) -> ReceivedTip {
    ReceivedTip {
        uid: "bob-uid".into(),
        amount_matoms: 5_000,
        sequence_id: seq,
    }
}

#[tokio::test]
async fn first_failure_stops_every_subscription() {
    let backend = backend();
    let (transport, feed) = MemoryTransport::new();
    let transport = Arc::new(transport);

    let (pm_tx, mut pm_rx) = mpsc::channel(8);
    let (tip_tx, mut tip_rx) = mpsc::channel(8);
    let (kx_tx, mut kx_rx) = mpsc::channel::<KxCompleted>(8);
    let routes = NotificationRoutes {
        private_messages: Some(Route::new(pm_tx, backend.logger("PM"))),
        tips_received: Some(Route::new(tip_tx, backend.logger("TIPR"))),
        kx_completed: Some(Route::new(kx_tx, backend.logger("KX"))),
        ..NotificationRoutes::default()
    };
    let bot = Bot::new(Arc::clone(&transport), routes, backend.logger("BOT"));
    let run = tokio::spawn(bot.run(CancellationToken::new()));

    feed.push(pm(1)).expect("push pm");
    let first = timeout(WAIT, pm_rx.recv())
        .await
        .expect("pm arrives")
        .expect("pm channel open");
    assert_eq!(first.sequence_id, 1);

    feed.push(tip(10)).expect("push tip");
    feed.push(tip(11)).expect("push tip");
    feed.fail(EventKind::TipReceived, TransportError::Rpc("connection reset".into()))
        .expect("inject failure");

    let outcome = timeout(WAIT, run)
        .await
        .expect("bot stops")
        .expect("join")
        .expect_err("never succeeds");
    match outcome {
        RunError::Stream { kind, source } => {
            assert_eq!(kind, EventKind::TipReceived);
            assert!(matches!(source, TransportError::Rpc(ref m) if m == "connection reset"));
        }
        other => panic!("unexpected outcome: {other}"),
    }

    assert_eq!(tip_rx.recv().await.expect("tip").sequence_id, 10);
    assert_eq!(tip_rx.recv().await.expect("tip").sequence_id, 11);
    assert!(tip_rx.recv().await.is_none(), "route dropped with its task");
    assert!(pm_rx.recv().await.is_none(), "sibling stopped");
    assert!(kx_rx.recv().await.is_none(), "sibling stopped");

    assert_eq!(
        transport.acked(),
        vec![
            (EventKind::PrivateMessage, 1),
            (EventKind::TipReceived, 10),
            (EventKind::TipReceived, 11),
        ]
    );
}

#[tokio::test]
async fn caller_cancellation_stops_active_subscriptions() {
    let backend = backend();
    let (transport, _feed) = MemoryTransport::new();
    let (pm_tx, mut pm_rx) = mpsc::channel::<ReceivedPm>(1);
    let routes = NotificationRoutes {
        private_messages: Some(Route::new(pm_tx, backend.logger("PM"))),
        ..NotificationRoutes::default()
    };
    let bot = Bot::new(Arc::new(transport), routes, backend.logger("BOT"));
    let cancel = CancellationToken::new();
    let run = tokio::spawn(bot.run(cancel.clone()));

    tokio::time::sleep(Duration::from_millis(20)).await;
    cancel.cancel();

    let outcome = timeout(WAIT, run)
        .await
        .expect("bot stops")
        .expect("join")
        .expect_err("cancelled");
    assert!(outcome.is_cancelled());
    assert!(pm_rx.recv().await.is_none());
}

#[tokio::test]
async fn zero_subscriptions_return_cancelled() {
    let backend = backend();
    let (transport, _feed) = MemoryTransport::new();
    let bot = Bot::new(
        Arc::new(transport),
        NotificationRoutes::default(),
        backend.logger("BOT"),
    );
    assert!(bot.active_kinds().is_empty());

    let cancel = CancellationToken::new();
    cancel.cancel();
    let outcome = timeout(WAIT, bot.run(cancel))
        .await
        .expect("returns")
        .expect_err("cancelled");
    assert!(matches!(outcome, RunError::Cancelled));
}

#[tokio::test]
async fn open_failure_is_the_group_outcome() {
    let backend = backend();
    let (transport, _feed) = MemoryTransport::new();
    transport.fail_open(EventKind::KxCompleted, "kx streams unavailable");
    let (pm_tx, _pm_rx) = mpsc::channel::<ReceivedPm>(1);
    let (kx_tx, _kx_rx) = mpsc::channel::<KxCompleted>(1);
    let routes = NotificationRoutes {
        private_messages: Some(Route::new(pm_tx, backend.logger("PM"))),
        kx_completed: Some(Route::new(kx_tx, backend.logger("KX"))),
        ..NotificationRoutes::default()
    };
    let bot = Bot::new(Arc::new(transport), routes, backend.logger("BOT"));

    let outcome = timeout(WAIT, bot.run(CancellationToken::new()))
        .await
        .expect("returns")
        .expect_err("fails");
    assert!(matches!(outcome, RunError::Open { kind: EventKind::KxCompleted, .. }));
    assert_eq!(outcome.kind(), Some(EventKind::KxCompleted));
}

#[tokio::test]
async fn dropped_consumer_is_the_group_outcome() {
    let backend = backend();
    let (transport, feed) = MemoryTransport::new();
    let (tip_tx, tip_rx) = mpsc::channel::<ReceivedTip>(1);
    drop(tip_rx);
    let routes = NotificationRoutes {
        tips_received: Some(Route::new(tip_tx, backend.logger("TIPR"))),
        ..NotificationRoutes::default()
    };
    let bot = Bot::new(Arc::new(transport), routes, backend.logger("BOT"));
    feed.push(tip(3)).expect("push");

    let outcome = timeout(WAIT, bot.run(CancellationToken::new()))
        .await
        .expect("returns")
        .expect_err("fails");
    assert!(matches!(outcome, RunError::ConsumerClosed { kind: EventKind::TipReceived }));
}

#[tokio::test]
async fn wrong_kind_on_a_stream_is_skipped() {
    let backend = backend();
    let (transport, feed) = MemoryTransport::new();
    let transport = Arc::new(transport);
    let (pm_tx, mut pm_rx) = mpsc::channel::<ReceivedPm>(4);
    let routes = NotificationRoutes {
        private_messages: Some(Route::new(pm_tx, backend.logger("PM"))),
        ..NotificationRoutes::default()
    };
    let bot = Bot::new(Arc::clone(&transport), routes, backend.logger("BOT"));
    let cancel = CancellationToken::new();
    let run = tokio::spawn(bot.run(cancel.clone()));

    feed.push_to(EventKind::PrivateMessage, tip(99)).expect("push");
    feed.push(pm(4)).expect("push");

    let got = timeout(WAIT, pm_rx.recv())
        .await
        .expect("pm arrives")
        .expect("open");
    assert_eq!(got.sequence_id, 4);
    assert_eq!(transport.acked(), vec![(EventKind::PrivateMessage, 4)]);

    cancel.cancel();
    let outcome = timeout(WAIT, run)
        .await
        .expect("bot stops")
        .expect("join")
        .expect_err("cancelled");
    assert!(outcome.is_cancelled());
}
