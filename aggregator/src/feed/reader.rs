//! TCP reader for an SBS-1 feed.
//!
//! Connects to the receiver, reads newline-terminated messages and forwards
//! every parsed one to the writer queue. Any connection problem (refused
//! connect, I/O error, EOF, or silence longer than the read timeout) drops
//! the connection and retries after a jittered delay. Unparseable lines are
//! logged and skipped; they never end a session. A line longer than
//! [`MAX_LINE_LEN`] does end it, since the feed is no longer framing
//! messages.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use crate::feed::FeedMessage;
use crate::queue::WriterHandle;

/// Longest accepted feed line, terminator included. SBS-1 lines are well
/// under 200 bytes.
pub const MAX_LINE_LEN: usize = 1024;

/// Connection settings for the feed reader.
#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub host: String,
    pub port: u16,
    /// Longest silence tolerated before reconnecting.
    pub read_timeout: Duration,
    /// Base delay between reconnect attempts; up to half again is added as
    /// jitter.
    pub reconnect_delay: Duration,
}

impl FeedConfig {
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            read_timeout: Duration::from_secs(5),
            reconnect_delay: Duration::from_secs(1),
        }
    }
}

/// Why a feed session ended.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("failed to connect: {0}")]
    Connect(#[source] std::io::Error),
    #[error("read failed: {0}")]
    Read(#[source] std::io::Error),
    #[error("no data for {0:?}")]
    Timeout(Duration),
    #[error("feed closed the connection")]
    Eof,
    #[error("line exceeds {MAX_LINE_LEN} bytes without a terminator")]
    LineTooLong,
    #[error("writer queue is closed")]
    WriterClosed,
}

/// Spawn the reader task.
///
/// The task runs until `shutdown` flips to `true` (or its sender is dropped)
/// or the writer queue closes.
pub fn spawn_feed_reader(
    config: FeedConfig,
    writer: WriterHandle,
    shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        feed_loop(config, writer, shutdown).await;
    })
}

async fn feed_loop(config: FeedConfig, writer: WriterHandle, mut shutdown: watch::Receiver<bool>) {
    let mut rng = StdRng::from_os_rng();

    loop {
        if *shutdown.borrow() {
            break;
        }

        let ended = tokio::select! {
            ended = read_session(&config, &writer) => ended,
            _ = shutdown.changed() => break,
        };

        match ended {
            SessionError::WriterClosed => {
                tracing::info!("writer queue closed, stopping feed reader");
                break;
            }
            error => tracing::warn!(
                host = %config.host,
                port = config.port,
                "feed session ended: {error}"
            ),
        }

        let delay = reconnect_delay(config.reconnect_delay, &mut rng);
        tracing::debug!(?delay, "reconnecting to feed");
        tokio::select! {
            () = tokio::time::sleep(delay) => {}
            _ = shutdown.changed() => break,
        }
    }

    tracing::debug!("feed reader stopped");
}

/// Run one connection until it fails. Never returns success.
async fn read_session(config: &FeedConfig, writer: &WriterHandle) -> SessionError {
    let connect = TcpStream::connect((config.host.as_str(), config.port));
    let stream = match timeout(config.read_timeout, connect).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(e)) => return SessionError::Connect(e),
        Err(_) => return SessionError::Timeout(config.read_timeout),
    };
    tracing::info!(host = %config.host, port = config.port, "connected to feed");

    let mut reader = BufReader::new(stream);
    let mut buffer = Vec::with_capacity(256);

    loop {
        buffer.clear();
        let mut limited = AsyncReadExt::take(&mut reader, MAX_LINE_LEN as u64);
        match timeout(config.read_timeout, limited.read_until(b'\n', &mut buffer)).await {
            Err(_) => return SessionError::Timeout(config.read_timeout),
            Ok(Err(e)) => return SessionError::Read(e),
            Ok(Ok(0)) => return SessionError::Eof,
            Ok(Ok(_)) => {}
        }
        if buffer.len() >= MAX_LINE_LEN && buffer.last() != Some(&b'\n') {
            return SessionError::LineTooLong;
        }

        let line = String::from_utf8_lossy(&buffer);
        if line.trim().is_empty() {
            continue;
        }
        match FeedMessage::parse(&line) {
            Ok(message) => {
                if writer.update_or_add(message).await.is_err() {
                    return SessionError::WriterClosed;
                }
            }
            Err(e) => tracing::debug!(line = %line.trim_end(), "skipping feed line: {e}"),
        }
    }
}

/// `base` plus up to 50% random jitter.
fn reconnect_delay<R: Rng>(base: Duration, rng: &mut R) -> Duration {
    let base_ms = u64::try_from(base.as_millis()).unwrap_or(u64::MAX);
    let jitter_ms = rng.random_range(0..=base_ms / 2);
    Duration::from_millis(base_ms.saturating_add(jitter_ms))
}
