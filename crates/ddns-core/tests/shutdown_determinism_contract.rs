//! Architectural Contract Test: Shutdown Determinism
//!
//! This test verifies that shutdown is deterministic and complete.
//!
//! Constraints verified:
//! - Engine terminates on shutdown signal
//! - A Stopped event is emitted
//! - An in-flight tick finishes before the engine stops
//! - The first tick runs immediately on start
//!
//! If this test fails, someone has added:
//! - Detached background tasks
//! - Tasks that ignore cancellation
//! - Leaked futures

mod common;

use common::*;
use ddns_core::{DdnsEngine, EngineEvent};
use std::time::Duration;

#[tokio::test]
async fn shutdown_signal_terminates_engine() {
    let config = StaticConfigSource::new(vec![zone("example.com.", "127.0.0.1", &["host1"])]);

    let (engine, mut events) = DdnsEngine::new(
        Box::new(StaticAddressSource::new(&["203.0.113.5"])),
        Box::new(MockUpdateClient::new()),
        Box::new(config),
        test_config(),
    )
    .expect("engine construction succeeds");

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();

    let engine_handle =
        tokio::spawn(async move { engine.run_with_shutdown(Some(shutdown_rx)).await });

    // Wait for startup
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert!(shutdown_tx.send(()).is_ok(), "shutdown signal send succeeds");

    let result = tokio::time::timeout(Duration::from_secs(5), engine_handle).await;
    assert!(result.is_ok(), "Engine should terminate within 5 seconds");

    let engine_result = result.unwrap().unwrap();
    assert!(
        engine_result.is_ok(),
        "Engine should shut down successfully: {:?}",
        engine_result
    );

    let events = drain_events(&mut events);
    assert!(matches!(events.first(), Some(EngineEvent::Started { .. })));
    assert!(matches!(events.last(), Some(EngineEvent::Stopped { .. })));
}

#[tokio::test]
async fn first_tick_runs_immediately() {
    let client = MockUpdateClient::new();
    let config = StaticConfigSource::new(vec![zone("example.com.", "127.0.0.1", &["host1"])]);
    let engine_config = ddns_core::EngineConfig {
        interval_secs: 3600,
        ..test_config()
    };

    let (engine, _events) = DdnsEngine::new(
        Box::new(StaticAddressSource::new(&["203.0.113.5"])),
        Box::new(client.clone()),
        Box::new(config),
        engine_config,
    )
    .expect("engine construction succeeds");

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let engine_handle =
        tokio::spawn(async move { engine.run_with_shutdown(Some(shutdown_rx)).await });

    tokio::time::sleep(Duration::from_millis(100)).await;
    shutdown_tx.send(()).unwrap();
    engine_handle.await.unwrap().unwrap();

    assert_eq!(client.call_count(), 1);
}

#[tokio::test]
async fn in_flight_tick_completes_before_stop() {
    let client = MockUpdateClient::new();
    let config = StaticConfigSource::new(vec![zone("example.com.", "127.0.0.1", &["host1"])]);

    let (engine, mut events) = DdnsEngine::new(
        Box::new(
            StaticAddressSource::new(&["203.0.113.5"]).with_delay(Duration::from_millis(200)),
        ),
        Box::new(client.clone()),
        Box::new(config),
        test_config(),
    )
    .expect("engine construction succeeds");

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel();
    let engine_handle =
        tokio::spawn(async move { engine.run_with_shutdown(Some(shutdown_rx)).await });

    // Signal while the first tick is still discovering
    tokio::time::sleep(Duration::from_millis(50)).await;
    shutdown_tx.send(()).unwrap();
    engine_handle.await.unwrap().unwrap();

    assert_eq!(client.call_count(), 1, "the started tick was not cut short");
    let events = drain_events(&mut events);
    let completed = events
        .iter()
        .position(|e| matches!(e, EngineEvent::TickCompleted { .. }))
        .expect("tick completed");
    let stopped = events
        .iter()
        .position(|e| matches!(e, EngineEvent::Stopped { .. }))
        .expect("engine stopped");
    assert!(completed < stopped);
}
