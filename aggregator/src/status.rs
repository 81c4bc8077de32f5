//! Read-only HTTP view of the live aggregate.
//!
//! # Routes
//!
//! - `GET /health`: `200 ok` while the writer is running, `503` after
//! - `GET /aircraft`: summary of every tracked aircraft
//! - `GET /aircraft/{icao}`: the full record, series included

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::aircraft::{AircraftRecord, Coordinate};
use crate::feed::icao_to_key;
use crate::queue::{QueueError, WriterHandle};
use crate::storage::StorageError;

/// One line of the `/aircraft` listing.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AircraftSummary {
    pub icao: String,
    pub tail_number: Option<String>,
    pub callsign: Option<String>,
    pub first_seen: i64,
    pub last_seen: i64,
    pub msg_count: u64,
    pub altitude: Option<f32>,
    pub position: Option<Coordinate>,
    pub squawk: Option<i32>,
}

impl From<&AircraftRecord> for AircraftSummary {
    fn from(record: &AircraftRecord) -> Self {
        Self {
            icao: record.icao.clone(),
            tail_number: record.tail_number.clone(),
            callsign: record.callsign.clone(),
            first_seen: record.first_seen,
            last_seen: record.last_seen,
            msg_count: record.msg_count,
            altitude: record.current_altitude(),
            position: record.current_position(),
            squawk: record.squawk.last().map(|sample| sample.value),
        }
    }
}

/// Errors mapped onto HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum StatusError {
    #[error("invalid ICAO address {0:?}")]
    BadRequest(String),
    #[error("aircraft {0} is not tracked")]
    NotFound(String),
    #[error("aggregator is shutting down")]
    Unavailable,
    #[error("storage error: {0}")]
    Storage(StorageError),
}

impl From<QueueError> for StatusError {
    fn from(error: QueueError) -> Self {
        match error {
            QueueError::Closed => Self::Unavailable,
            QueueError::Storage(e) => Self::Storage(e),
        }
    }
}

impl IntoResponse for StatusError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unavailable => StatusCode::SERVICE_UNAVAILABLE,
            Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (status, body).into_response()
    }
}

/// Routes over a writer handle.
pub fn router(writer: WriterHandle) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/aircraft", get(list_aircraft))
        .route("/aircraft/{icao}", get(get_aircraft))
        .with_state(writer)
}

/// Serve [`router`] on `listener` until `shutdown` flips to `true`.
pub fn spawn_status_server(
    listener: TcpListener,
    writer: WriterHandle,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<std::io::Result<()>> {
    tokio::spawn(async move {
        axum::serve(listener, router(writer))
            .with_graceful_shutdown(async move {
                // A dropped sender also ends the server.
                let _ = shutdown.wait_for(|stop| *stop).await;
            })
            .await
    })
}

async fn health(State(writer): State<WriterHandle>) -> Result<&'static str, StatusError> {
    if writer.is_closed() {
        return Err(StatusError::Unavailable);
    }
    Ok("ok")
}

async fn list_aircraft(
    State(writer): State<WriterHandle>,
) -> Result<Json<Vec<AircraftSummary>>, StatusError> {
    let mut records = writer.snapshot().await?;
    records.sort_by(|a, b| a.icao.cmp(&b.icao));
    Ok(Json(records.iter().map(AircraftSummary::from).collect()))
}

async fn get_aircraft(
    State(writer): State<WriterHandle>,
    Path(icao): Path<String>,
) -> Result<Json<AircraftRecord>, StatusError> {
    let icao = icao.to_ascii_uppercase();
    let key = icao_to_key(&icao).map_err(|_| StatusError::BadRequest(icao.clone()))?;
    match writer.search(key).await {
        Ok(record) => Ok(Json(record)),
        Err(QueueError::Storage(StorageError::NotFound(_))) => Err(StatusError::NotFound(icao)),
        Err(e) => Err(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::feed::FeedMessage;
    use crate::lookup::{StaticLookup, http_get};
    use crate::queue::spawn_writer_task;
    use crate::storage::{BTreeStorage, ManualClock};

    async fn start() -> (String, WriterHandle, watch::Sender<bool>) {
        let storage = Arc::new(BTreeStorage::<AircraftRecord>::new(2).expect("valid degree"));
        let lookup = Arc::new(StaticLookup::new().with("4CA2D6", "EI-", "DCL"));
        let (writer, _task) =
            spawn_writer_task(storage, lookup, Arc::new(ManualClock::new(1000)), 16);

        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr").to_string();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let _server = spawn_status_server(listener, writer.clone(), shutdown_rx);
        (addr, writer, shutdown_tx)
    }

    #[tokio::test]
    async fn test_health() {
        let (addr, _writer, _shutdown) = start().await;
        let response = http_get(&addr, "/health").await.expect("request");
        assert_eq!(response.status, 200);
        assert_eq!(response.body, b"ok");
    }

    #[tokio::test]
    async fn test_list_and_get_aircraft() {
        let (addr, writer, _shutdown) = start().await;
        let line = "MSG,3,1,1,4CA2D6,1,,,,,,37000,,,51.47,-0.4543,,,,,,";
        writer
            .update_or_add(FeedMessage::parse(line).expect("valid line"))
            .await
            .expect("queued");

        let response = http_get(&addr, "/aircraft").await.expect("request");
        assert_eq!(response.status, 200);
        let listing: serde_json::Value =
            serde_json::from_slice(&response.body).expect("json body");
        assert_eq!(listing[0]["icao"], "4CA2D6");
        assert_eq!(listing[0]["tail_number"], "EI-DCL");
        assert_eq!(listing[0]["altitude"], 37000.0);

        let response = http_get(&addr, "/aircraft/4ca2d6").await.expect("request");
        assert_eq!(response.status, 200);
        let record: serde_json::Value = serde_json::from_slice(&response.body).expect("json body");
        assert_eq!(record["msg_count"], 1);
        assert_eq!(record["coordinates"][0]["lat"], 51.47);
    }

    #[tokio::test]
    async fn test_unknown_and_invalid_aircraft() {
        let (addr, _writer, _shutdown) = start().await;

        let response = http_get(&addr, "/aircraft/ABCDEF").await.expect("request");
        assert_eq!(response.status, 404);

        let response = http_get(&addr, "/aircraft/000000").await.expect("request");
        assert_eq!(response.status, 400);
        let body: serde_json::Value = serde_json::from_slice(&response.body).expect("json body");
        assert!(body["error"].as_str().is_some_and(|e| e.contains("000000")));
    }
}
