//! Common helpers for end-to-end tests.

use std::collections::{BTreeSet, HashMap};
use std::time::Duration;

use axum::extract::Query;
use axum::routing::get;
use axum::{Json, Router};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use crate::queue::WriterHandle;
use crate::storage::{BTreeStorage, Key, KeyedStorage, MapStorage};

/// Keys of the sample tree in insertion order, each with a one-byte payload.
pub const SAMPLE: [(Key, u8); 7] = [
    (1, b'c'),
    (2, b'm'),
    (3, b'o'),
    (4, b'p'),
    (5, b'q'),
    (-1, b'r'),
    (6, b's'),
];

/// A degree-2 tree holding [`SAMPLE`].
#[must_use]
pub fn sample_tree() -> BTreeStorage<u8> {
    let tree = BTreeStorage::new(2).expect("valid degree");
    fill(&tree);
    tree
}

/// A hash map holding [`SAMPLE`].
#[must_use]
pub fn sample_map() -> MapStorage<u8> {
    let map = MapStorage::new();
    fill(&map);
    map
}

fn fill(storage: &dyn KeyedStorage<u8>) {
    for (key, payload) in SAMPLE {
        storage.insert(key, payload).expect("nonzero key");
    }
}

/// Every payload a traversal visits.
#[must_use]
pub fn payloads(storage: &dyn KeyedStorage<u8>) -> BTreeSet<u8> {
    let mut seen = BTreeSet::new();
    storage
        .traverse(&mut |entry| {
            assert!(seen.insert(entry.value), "payload visited twice");
        })
        .expect("traverse");
    seen
}

/// Keys in traversal order.
#[must_use]
pub fn traversal_keys(storage: &dyn KeyedStorage<u8>) -> Vec<Key> {
    let mut keys = Vec::new();
    storage
        .traverse(&mut |entry| keys.push(entry.key))
        .expect("traverse");
    keys
}

/// An SBS-1 feed that serves `lines` to the first client, then holds the
/// connection open until dropped.
pub struct FeedServer {
    pub port: u16,
    _stop: oneshot::Sender<()>,
}

impl FeedServer {
    pub async fn start(lines: Vec<String>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind feed");
        let port = listener.local_addr().expect("local addr").port();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();

        tokio::spawn(async move {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            for line in lines {
                if socket.write_all(format!("{line}\r\n").as_bytes()).await.is_err() {
                    return;
                }
            }
            let _ = stop_rx.await;
        });

        Self {
            port,
            _stop: stop_tx,
        }
    }
}

/// A tail number service answering from a fixed table; unknown ICAO
/// addresses get a 404.
pub async fn start_lookup_server(table: &[(&str, &str, &str)]) -> String {
    let table: HashMap<String, (String, String)> = table
        .iter()
        .map(|(icao, prefix, number)| {
            ((*icao).to_owned(), ((*prefix).to_owned(), (*number).to_owned()))
        })
        .collect();

    let app = Router::new().route(
        "/icaoTranslate",
        get(move |Query(params): Query<HashMap<String, String>>| {
            let found = params
                .get("icao")
                .and_then(|icao| table.get(icao))
                .cloned();
            async move {
                match found {
                    Some((prefix, number)) => Ok(Json(
                        serde_json::json!({ "prefix": prefix, "number": number }),
                    )),
                    None => Err(axum::http::StatusCode::NOT_FOUND),
                }
            }
        }),
    );

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind lookup");
    let addr = listener.local_addr().expect("local addr").to_string();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

/// Poll the writer until it tracks `count` aircraft.
pub async fn wait_for_aircraft(writer: &WriterHandle, count: usize) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    loop {
        let tracked = writer.snapshot().await.expect("writer running").len();
        if tracked >= count {
            return;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "only {tracked} of {count} aircraft arrived"
        );
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}
