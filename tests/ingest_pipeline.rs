use futures::future::join_all;
use std::time::Duration;
use telemetry_analytics::monitoring::{AnalyticsConfig, AnalyticsEngine, Sample, Snapshot};
use telemetry_analytics::errors::AnalyticsError;

fn config(window_capacity: usize, queue_capacity: usize) -> AnalyticsConfig {
    AnalyticsConfig {
        window_capacity,
        queue_capacity,
        ..AnalyticsConfig::default()
    }
}

async fn wait_for_processed(engine: &AnalyticsEngine, expected: u64) -> Snapshot {
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            let snapshot = engine.snapshot().await;
            if snapshot.total_processed >= expected {
                return snapshot;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .expect("engine did not catch up in time")
}

// Retry until the queue has room; the engine itself never retries.
async fn enqueue_eventually(engine: &AnalyticsEngine, sample: Sample) {
    while !engine.enqueue(sample.clone()) {
        tokio::task::yield_now().await;
    }
}

#[tokio::test]
async fn invalid_configuration_is_rejected_at_start() {
    let cases = [
        AnalyticsConfig { window_capacity: 0, ..AnalyticsConfig::default() },
        AnalyticsConfig { queue_capacity: 0, ..AnalyticsConfig::default() },
        AnalyticsConfig { max_in_flight: 0, ..AnalyticsConfig::default() },
        AnalyticsConfig { anomaly_threshold: 0.0, ..AnalyticsConfig::default() },
        AnalyticsConfig { anomaly_threshold: -2.0, ..AnalyticsConfig::default() },
    ];
    for case in cases {
        let err = AnalyticsEngine::start(case.clone()).err();
        assert!(
            matches!(err, Some(AnalyticsError::InvalidConfig { .. })),
            "{:?} should be rejected",
            case
        );
    }
}

#[tokio::test]
async fn overflow_drops_without_blocking() -> anyhow::Result<()> {
    // current-thread runtime: the dispatcher cannot run until we yield
    let engine = AnalyticsEngine::start(config(50, 1))?;

    let first = engine.enqueue(Sample::new("device_1", 1, 10.0, 100.0));
    let second = engine.enqueue(Sample::new("device_2", 1, 10.0, 100.0));
    assert!(first);
    assert!(!second);

    let stats = engine.ingest_stats();
    assert_eq!(stats.accepted, 1);
    assert_eq!(stats.dropped, 1);

    let snapshot = wait_for_processed(&engine, 1).await;
    assert_eq!(snapshot.total_processed, 1);
    engine.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn every_accepted_sample_is_applied_once() -> anyhow::Result<()> {
    let engine = AnalyticsEngine::start(config(50, 16))?;

    for i in 0..500 {
        enqueue_eventually(&engine, Sample::new("device_1", 1, 0.0, (i % 37) as f64)).await;
    }
    let snapshot = wait_for_processed(&engine, 500).await;
    assert_eq!(snapshot.total_processed, 500);

    let summary = engine.shutdown().await.expect("dispatcher summary");
    assert_eq!(summary.dispatched, 500);
    assert_eq!(summary.failed, 0);

    let resident = engine.window().resident_rps().await;
    assert_eq!(resident.len(), 50);
    let mean = resident.iter().sum::<f64>() / resident.len() as f64;
    let snapshot = engine.snapshot().await;
    assert!((snapshot.rolling_average - mean).abs() < 1e-9);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_producers_share_one_window() -> anyhow::Result<()> {
    let engine = AnalyticsEngine::start(config(50, 32))?;
    let mut handles = vec![];

    for device in 0..8 {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            for i in 0..50 {
                let rps = 100.0 + ((device * 50 + i) % 11) as f64;
                enqueue_eventually(&engine, Sample::new(format!("device_{}", device), 1, 0.0, rps)).await;
            }
        }));
    }

    let results = join_all(handles).await;
    assert!(results.iter().all(|r| r.is_ok()));

    let snapshot = wait_for_processed(&engine, 400).await;
    assert_eq!(snapshot.total_processed, 400);
    assert!(snapshot.anomaly_count <= snapshot.total_processed);
    assert_eq!(engine.window().len().await, 50);
    assert_eq!(snapshot.window_capacity, 50);
    engine.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn snapshots_never_mix_two_mutations() -> anyhow::Result<()> {
    let engine = AnalyticsEngine::start(config(50, 64))?;

    let producer = {
        let engine = engine.clone();
        tokio::spawn(async move {
            for i in 0..2_000u32 {
                let rps = if i % 17 == 0 { 900.0 } else { 100.0 + (i % 23) as f64 };
                enqueue_eventually(&engine, Sample::new("device_1", 1, 0.0, rps)).await;
            }
        })
    };

    let mut last_processed = 0;
    let mut last_anomalies = 0;
    while last_processed < 2_000 {
        let snapshot = engine.snapshot().await;
        assert!(snapshot.total_processed >= last_processed);
        assert!(snapshot.anomaly_count >= last_anomalies);
        assert!(snapshot.anomaly_count <= snapshot.total_processed);
        if snapshot.total_processed >= 10 {
            // once warm, both are written from the same computation
            assert_eq!(snapshot.rolling_average, snapshot.mean);
        }
        last_processed = snapshot.total_processed;
        last_anomalies = snapshot.anomaly_count;
        tokio::task::yield_now().await;
    }

    producer.await?;
    engine.shutdown().await;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn shutdown_drains_in_flight_and_closes_queue() -> anyhow::Result<()> {
    let engine = AnalyticsEngine::start(config(50, 100))?;
    for i in 0..100 {
        engine.enqueue(Sample::new("device_1", 1, 0.0, i as f64));
    }

    let summary = engine.shutdown().await.expect("dispatcher summary");
    let snapshot = engine.snapshot().await;
    assert_eq!(snapshot.total_processed, summary.dispatched);
    assert!(summary.dispatched <= 100);

    // the dispatcher is gone, nothing can be accepted any more
    assert!(!engine.enqueue(Sample::new("device_1", 1, 0.0, 1.0)));

    // second call is a no-op
    assert!(engine.shutdown().await.is_none());
    Ok(())
}
