//! Test the whole pipeline: feed socket, parser, writer, lookup service,
//! eviction and archive.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::aircraft::AircraftRecord;
use crate::e2e_tests::helpers::*;
use crate::eviction::{EvictionConfig, spawn_eviction_task};
use crate::feed::{FeedConfig, spawn_feed_reader};
use crate::lookup::HttpMetadataLookup;
use crate::queue::{AircraftStorage, spawn_writer_task};
use crate::storage::{Archive, BTreeStorage, ManualClock, MapStorage};

fn feed_lines() -> Vec<String> {
    [
        "MSG,1,1,1,4CA2D6,1,2024/01/15,12:34:57.000,2024/01/15,12:34:57.001,RYR1234 ,,,,,,,,,,,",
        "MSG,3,1,1,4CA2D6,1,2024/01/15,12:34:58.000,2024/01/15,12:34:58.001,,37000,,,51.47000,-0.45430,,,0,0,0,0",
        "this is not a feed line",
        "MSG,3,1,1,4ca2d6,1,2024/01/15,12:34:59.000,2024/01/15,12:34:59.001,,37050,,,51.48000,-0.46000,,,0,0,0,0",
        "STA,,1,1,4CA2D6,1,2024/01/15,12:35:00.000,2024/01/15,12:35:00.000,RM",
        "MSG,4,1,1,A1B2C3,1,2024/01/15,12:35:00.000,2024/01/15,12:35:00.000,,,452.5,273,,,-1280,,,,,0",
        "MSG,3,1,1,000000,1,,,,,,12000,,,,,,,,,,",
        "MSG,5,1,1,ABCDEF,1,,,,,,12000,,,,,,,,,,",
    ]
    .into_iter()
    .map(str::to_owned)
    .collect()
}

async fn run_pipeline(storage: AircraftStorage) {
    let feed = FeedServer::start(feed_lines()).await;
    let lookup_addr =
        start_lookup_server(&[("4CA2D6", "EI-", "DCL"), ("A1B2C3", "N", "12345")]).await;
    let dir = tempfile::tempdir().expect("temp dir");
    let archive = Arc::new(Archive::open(dir.path(), "pipeline.db").expect("open archive"));

    let clock = Arc::new(ManualClock::default_start());
    let lookup = Arc::new(HttpMetadataLookup::new(lookup_addr, Duration::from_secs(2)));
    let (writer, writer_task) = spawn_writer_task(storage, lookup, clock, 64);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let reader = spawn_feed_reader(
        FeedConfig::new("127.0.0.1", feed.port),
        writer.clone(),
        shutdown_rx.clone(),
    );
    let eviction = spawn_eviction_task(
        writer.clone(),
        Arc::clone(&archive),
        EvictionConfig {
            stale_after: Duration::from_secs(60),
            sweep_interval: Duration::from_millis(50),
        },
        shutdown_rx,
    );

    wait_for_aircraft(&writer, 3).await;
    // The last line may still be queued behind the snapshot.
    tokio::time::sleep(Duration::from_millis(100)).await;

    let snapshot = writer.snapshot().await.expect("writer running");
    let mut tracked: Vec<&str> = snapshot.iter().map(|r| r.icao.as_str()).collect();
    tracked.sort_unstable();
    assert_eq!(tracked, vec!["4CA2D6", "A1B2C3", "ABCDEF"]);
    assert_eq!(archive.count().expect("count"), 0, "nothing is stale yet");

    shutdown_tx.send(true).expect("tasks listening");
    reader.await.expect("reader exits");
    let report = eviction.await.expect("eviction exits");
    assert_eq!(report.evicted, 3);
    assert_eq!(report.failed, 0);

    assert!(writer.snapshot().await.expect("writer running").is_empty());
    drop(writer);
    let stats = writer_task.await.expect("writer exits");
    assert_eq!(stats.messages, 5);
    assert_eq!(stats.created, 3);
    assert_eq!(stats.updated, 2);
    assert_eq!(stats.deleted, 3);
    assert_eq!(stats.lookup_failures, 1);

    assert_eq!(archive.count().expect("count"), 3);
    let ryanair: AircraftRecord = archive
        .latest("4CA2D6")
        .expect("query")
        .expect("archived");
    assert_eq!(ryanair.tail_number.as_deref(), Some("EI-DCL"));
    assert_eq!(ryanair.callsign.as_deref(), Some("RYR1234"));
    assert_eq!(ryanair.msg_count, 3);
    assert_eq!(ryanair.altitude.len(), 1, "a 50 ft change is below the threshold");
    assert_eq!(ryanair.coordinates.len(), 2);

    let unknown = archive
        .latest("ABCDEF")
        .expect("query")
        .expect("archived");
    assert_eq!(unknown.tail_number, None);
    assert_eq!(unknown.current_altitude(), Some(12000.0));
}

#[tokio::test]
async fn test_pipeline_with_btree_storage() {
    let storage = BTreeStorage::<AircraftRecord>::new(2).expect("valid degree");
    run_pipeline(Arc::new(storage)).await;
}

#[tokio::test]
async fn test_pipeline_with_map_storage() {
    run_pipeline(Arc::new(MapStorage::<AircraftRecord>::new())).await;
}
