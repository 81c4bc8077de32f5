//! Background eviction of aircraft that left receiver range.
//!
//! Every sweep asks the writer for records that have been silent for at
//! least `stale_after`, writes each one to the archive, and only then
//! removes it from the live aggregate. A record whose archive write fails
//! stays live and is retried on the next sweep.
//!
//! On shutdown the task performs one last sweep with a zero threshold, so
//! every aircraft still tracked is archived before the process exits.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::aircraft::AircraftRecord;
use crate::queue::{QueueError, WriterHandle};
use crate::storage::{Archive, ArchiveError};

/// Timing for the eviction task.
#[derive(Debug, Clone, Copy)]
pub struct EvictionConfig {
    /// Silence after which an aircraft counts as gone.
    pub stale_after: Duration,
    /// Time between sweeps.
    pub sweep_interval: Duration,
}

impl Default for EvictionConfig {
    fn default() -> Self {
        Self {
            stale_after: Duration::from_secs(10),
            sweep_interval: Duration::from_secs(5),
        }
    }
}

/// Outcome of one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Records archived and removed.
    pub evicted: usize,
    /// Records archived but kept because they were heard from again.
    pub refreshed: usize,
    /// Records whose archive write failed; still live.
    pub failed: usize,
}

impl SweepReport {
    const fn absorb(&mut self, other: Self) {
        self.evicted += other.evicted;
        self.refreshed += other.refreshed;
        self.failed += other.failed;
    }
}

/// Spawn the eviction task.
///
/// # Returns
/// A `JoinHandle` resolving to the totals over every sweep, including the
/// final flush.
pub fn spawn_eviction_task(
    writer: WriterHandle,
    archive: Arc<Archive>,
    config: EvictionConfig,
    shutdown: watch::Receiver<bool>,
) -> JoinHandle<SweepReport> {
    tokio::spawn(async move { eviction_loop(writer, archive, config, shutdown).await })
}

async fn eviction_loop(
    writer: WriterHandle,
    archive: Arc<Archive>,
    config: EvictionConfig,
    mut shutdown: watch::Receiver<bool>,
) -> SweepReport {
    let stale_after_ms = i64::try_from(config.stale_after.as_millis()).unwrap_or(i64::MAX);
    let mut interval = tokio::time::interval(config.sweep_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately.
    interval.tick().await;

    let mut total = SweepReport::default();
    loop {
        if *shutdown.borrow() {
            break;
        }
        tokio::select! {
            _ = interval.tick() => {}
            _ = shutdown.changed() => break,
        }

        match sweep(&writer, &archive, stale_after_ms).await {
            Ok(report) => total.absorb(report),
            Err(QueueError::Closed) => {
                tracing::warn!("writer closed, stopping eviction without final flush");
                return total;
            }
            Err(e) => tracing::error!("sweep failed: {e}"),
        }
    }

    tracing::info!("flushing all tracked aircraft to the archive");
    match sweep(&writer, &archive, 0).await {
        Ok(report) => total.absorb(report),
        Err(e) => tracing::error!("final flush failed: {e}"),
    }
    total
}

/// Archive and remove every record silent for at least `stale_after_ms`.
pub async fn sweep(
    writer: &WriterHandle,
    archive: &Arc<Archive>,
    stale_after_ms: i64,
) -> Result<SweepReport, QueueError> {
    let stale = writer.collect_stale(stale_after_ms).await?;
    let mut report = SweepReport::default();

    for record in stale {
        let key = record.key;
        let seen_at = record.last_seen;
        let icao = record.icao.clone();

        if let Err(e) = archive_record(archive, record).await {
            report.failed += 1;
            tracing::error!(%icao, "failed to archive aircraft: {e}");
            continue;
        }

        match writer.evict(key, seen_at).await {
            Ok(Some(_)) => {
                report.evicted += 1;
                tracing::info!(%icao, "archived and evicted aircraft");
            }
            Ok(None) => report.refreshed += 1,
            Err(QueueError::Closed) => return Err(QueueError::Closed),
            Err(e) => tracing::warn!(%icao, "archived aircraft could not be evicted: {e}"),
        }
    }

    if report != SweepReport::default() {
        tracing::debug!(?report, "sweep finished");
    }
    Ok(report)
}

/// SQLite calls block, so they run on the blocking pool.
async fn archive_record(archive: &Arc<Archive>, record: AircraftRecord) -> Result<(), ArchiveError> {
    let archive = Arc::clone(archive);
    tokio::task::spawn_blocking(move || archive.insert(&record))
        .await
        .map_err(|e| ArchiveError::Io(std::io::Error::other(e)))?
}
