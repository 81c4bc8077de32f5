//! Single-writer queue for the live aircraft aggregate.
//!
//! Every mutation of the aggregate goes through one task that drains a
//! bounded channel in arrival order. The feed reader and the eviction task
//! only ever talk to the storage through a [`WriterHandle`].
//!
//! # Design
//!
//! The storage already serializes individual calls, but an update is a
//! search followed by an insert. Funnelling those pairs through one task
//! keeps them from interleaving, so two messages for the same aircraft can
//! never race to create it twice.
//!
//! The writer exits once every handle has been dropped and the channel is
//! drained.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::aircraft::AircraftRecord;
use crate::feed::FeedMessage;
use crate::lookup::MetadataLookup;
use crate::storage::{Key, KeyedStorage, StorageError, TimeSource};

/// Shared handle to the live aggregate.
pub type AircraftStorage = Arc<dyn KeyedStorage<AircraftRecord>>;

/// Work items processed by the writer.
#[derive(Debug)]
pub enum Command {
    /// Fold a message into its aircraft, creating the record on first sight.
    /// `applied` fires once the record has been written.
    UpdateOrAdd {
        message: FeedMessage,
        applied: Option<oneshot::Sender<()>>,
    },
    /// Fetch one record.
    Search {
        key: Key,
        reply: oneshot::Sender<Result<AircraftRecord, StorageError>>,
    },
    /// Remove one record, replying with what was removed.
    Delete {
        key: Key,
        reply: oneshot::Sender<Result<AircraftRecord, StorageError>>,
    },
    /// Remove one record unless it was heard from after `seen_at`.
    Evict {
        key: Key,
        seen_at: i64,
        reply: oneshot::Sender<Result<Option<AircraftRecord>, StorageError>>,
    },
    /// Clone every record not heard from for at least `stale_after_ms`.
    CollectStale {
        stale_after_ms: i64,
        reply: oneshot::Sender<Vec<AircraftRecord>>,
    },
    /// Clone every record.
    Snapshot {
        reply: oneshot::Sender<Vec<AircraftRecord>>,
    },
}

/// Errors returned by [`WriterHandle`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum QueueError {
    #[error("writer queue is closed")]
    Closed,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Counters reported by the writer when it exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterStats {
    pub messages: u64,
    pub created: u64,
    pub updated: u64,
    pub deleted: u64,
    pub lookup_failures: u64,
    pub storage_failures: u64,
}

/// Cloneable sender side of the writer queue.
#[derive(Debug, Clone)]
pub struct WriterHandle {
    sender: mpsc::Sender<Command>,
}

impl WriterHandle {
    /// Queue a feed message. Waits while the queue is full but returns
    /// before the writer has folded it in.
    pub async fn update_or_add(&self, message: FeedMessage) -> Result<(), QueueError> {
        self.send(Command::UpdateOrAdd {
            message,
            applied: None,
        })
        .await
    }

    /// Queue a feed message and wait until the writer has folded it in.
    ///
    /// Anything the caller does afterwards, such as moving a clock, cannot
    /// affect the timestamps recorded for this message.
    pub async fn apply(&self, message: FeedMessage) -> Result<(), QueueError> {
        let (applied, done) = oneshot::channel();
        self.send(Command::UpdateOrAdd {
            message,
            applied: Some(applied),
        })
        .await?;
        done.await.map_err(|_| QueueError::Closed)
    }

    /// Fetch the current record for `key`.
    pub async fn search(&self, key: Key) -> Result<AircraftRecord, QueueError> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Search { key, reply }).await?;
        response
            .await
            .map_err(|_| QueueError::Closed)?
            .map_err(QueueError::from)
    }

    /// Remove `key` from the aggregate and return the removed record.
    pub async fn delete(&self, key: Key) -> Result<AircraftRecord, QueueError> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Delete { key, reply }).await?;
        response
            .await
            .map_err(|_| QueueError::Closed)?
            .map_err(QueueError::from)
    }

    /// Remove `key` only if its `last_seen` is still `seen_at`.
    ///
    /// Returns `None` when the aircraft was heard from again in the
    /// meantime and has been kept.
    pub async fn evict(&self, key: Key, seen_at: i64) -> Result<Option<AircraftRecord>, QueueError> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Evict {
            key,
            seen_at,
            reply,
        })
        .await?;
        response
            .await
            .map_err(|_| QueueError::Closed)?
            .map_err(QueueError::from)
    }

    /// Records not heard from for at least `stale_after_ms`.
    pub async fn collect_stale(
        &self,
        stale_after_ms: i64,
    ) -> Result<Vec<AircraftRecord>, QueueError> {
        let (reply, response) = oneshot::channel();
        self.send(Command::CollectStale {
            stale_after_ms,
            reply,
        })
        .await?;
        response.await.map_err(|_| QueueError::Closed)
    }

    /// Every record currently tracked, in traversal order.
    pub async fn snapshot(&self) -> Result<Vec<AircraftRecord>, QueueError> {
        let (reply, response) = oneshot::channel();
        self.send(Command::Snapshot { reply }).await?;
        response.await.map_err(|_| QueueError::Closed)
    }

    /// Whether the writer has stopped accepting commands.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    async fn send(&self, command: Command) -> Result<(), QueueError> {
        self.sender
            .send(command)
            .await
            .map_err(|_| QueueError::Closed)
    }
}

/// Spawn the writer task.
///
/// # Arguments
/// * `storage` - the live aggregate; the writer is its only mutator
/// * `lookup` - metadata source consulted once per new aircraft
/// * `clock` - time source for `first_seen`, `last_seen` and staleness
/// * `capacity` - queue depth before senders wait
///
/// # Returns
/// The handle for submitting commands, and the task's `JoinHandle`, which
/// resolves to the writer's counters once every handle is dropped.
pub fn spawn_writer_task<L: MetadataLookup>(
    storage: AircraftStorage,
    lookup: Arc<L>,
    clock: Arc<dyn TimeSource>,
    capacity: usize,
) -> (WriterHandle, JoinHandle<WriterStats>) {
    let (sender, receiver) = mpsc::channel(capacity.max(1));
    let writer = Writer {
        storage,
        lookup,
        clock,
        stats: WriterStats::default(),
    };
    let task = tokio::spawn(writer.run(receiver));
    (WriterHandle { sender }, task)
}

struct Writer<L> {
    storage: AircraftStorage,
    lookup: Arc<L>,
    clock: Arc<dyn TimeSource>,
    stats: WriterStats,
}

impl<L: MetadataLookup> Writer<L> {
    async fn run(mut self, mut receiver: mpsc::Receiver<Command>) -> WriterStats {
        while let Some(command) = receiver.recv().await {
            self.handle(command).await;
        }
        tracing::debug!(stats = ?self.stats, "writer stopped");
        self.stats
    }

    // A dropped reply receiver only means the caller stopped waiting.
    async fn handle(&mut self, command: Command) {
        match command {
            Command::UpdateOrAdd { message, applied } => {
                self.update_or_add(message).await;
                if let Some(applied) = applied {
                    let _ = applied.send(());
                }
            }
            Command::Search { key, reply } => {
                let _ = reply.send(self.storage.search(key));
            }
            Command::Delete { key, reply } => {
                let result = self.storage.delete(key);
                match &result {
                    Ok(record) => {
                        self.stats.deleted += 1;
                        tracing::debug!(icao = %record.icao, "removed aircraft from storage");
                    }
                    Err(e) => tracing::warn!(key, "could not remove aircraft: {e}"),
                }
                let _ = reply.send(result);
            }
            Command::Evict {
                key,
                seen_at,
                reply,
            } => {
                let _ = reply.send(self.evict(key, seen_at));
            }
            Command::CollectStale {
                stale_after_ms,
                reply,
            } => {
                let now = self.clock.now_ms();
                let _ = reply.send(self.collect(|record| record.is_stale(now, stale_after_ms)));
            }
            Command::Snapshot { reply } => {
                let _ = reply.send(self.collect(|_| true));
            }
        }
    }

    async fn update_or_add(&mut self, message: FeedMessage) {
        self.stats.messages += 1;

        let record = match self.storage.search(message.key) {
            Ok(mut record) => {
                record.observe(&message, self.clock.now_ms());
                self.stats.updated += 1;
                record
            }
            Err(StorageError::NotFound(_)) => {
                let tail_number = match self.lookup.lookup(&message.icao).await {
                    Ok(metadata) => metadata.tail_number(),
                    Err(e) => {
                        self.stats.lookup_failures += 1;
                        tracing::warn!(icao = %message.icao, "metadata lookup failed: {e}");
                        None
                    }
                };
                let record =
                    AircraftRecord::from_message(&message, tail_number, self.clock.now_ms());
                self.stats.created += 1;
                tracing::info!(
                    icao = %record.icao,
                    tail_number = record.tail_number.as_deref().unwrap_or("-"),
                    "new aircraft"
                );
                record
            }
            Err(e) => {
                self.stats.storage_failures += 1;
                tracing::error!(icao = %message.icao, "storage search failed: {e}");
                return;
            }
        };

        if let Err(e) = self.storage.insert(message.key, record) {
            self.stats.storage_failures += 1;
            tracing::error!(icao = %message.icao, "storage insert failed: {e}");
        }
    }

    fn evict(&mut self, key: Key, seen_at: i64) -> Result<Option<AircraftRecord>, StorageError> {
        let current = self.storage.search(key)?;
        if current.last_seen > seen_at {
            tracing::debug!(icao = %current.icao, "aircraft heard again, keeping it");
            return Ok(None);
        }
        let removed = self.storage.delete(key)?;
        self.stats.deleted += 1;
        Ok(Some(removed))
    }

    fn collect(&self, keep: impl Fn(&AircraftRecord) -> bool) -> Vec<AircraftRecord> {
        let mut records = Vec::new();
        let visited = self.storage.traverse(&mut |entry| {
            if keep(&entry.value) {
                records.push(entry.value.clone());
            }
        });
        if let Err(e) = visited {
            tracing::error!("storage traversal failed: {e}");
        }
        records
    }
}
