//! NDJSON streaming body: a channel-backed `futures::Stream` of `Bytes` drained
//! from a job's `EventLog` (spec §4.7, §6 streaming format).

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures::StreamExt;
use tokio_stream::wrappers::ReceiverStream;

use crate::event_log::EventLog;

const CHANNEL_CAPACITY: usize = 64;

/// Builds the `application/x-ndjson` response for a job's stream, starting at
/// `after_seq` and following new events until `stream_finished` — or until the
/// client disconnects, which drops the channel receiver and ends the forwarding
/// task without affecting the job itself (spec §5: closing the connection
/// cancels the stream reader, not the job).
pub fn ndjson_stream(log: Arc<EventLog>, after_seq: u64) -> Response {
    let (tx, rx) = tokio::sync::mpsc::channel::<Bytes>(CHANNEL_CAPACITY);

    tokio::spawn(async move {
        let mut cursor = after_seq;
        loop {
            let events = log.since(cursor).await;
            let mut saw_finished = false;
            for event in &events {
                if let Some(seq) = event.get("seq").and_then(|v| v.as_u64()) {
                    cursor = seq;
                }
                let mut line = match serde_json::to_vec(event) {
                    Ok(bytes) => bytes,
                    Err(_) => continue,
                };
                line.push(b'\n');
                if tx.send(Bytes::from(line)).await.is_err() {
                    return;
                }
                if event.get("event").and_then(|v| v.as_str()) == Some("stream_finished") {
                    saw_finished = true;
                }
            }
            if saw_finished {
                return;
            }
            if events.is_empty() && log.is_finished() {
                return;
            }
            log.wait_for_more().await;
        }
    });

    let stream = ReceiverStream::new(rx).map(Ok::<_, std::io::Error>);
    let body = Body::from_stream(stream);

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/x-ndjson")],
        body,
    )
        .into_response()
}
