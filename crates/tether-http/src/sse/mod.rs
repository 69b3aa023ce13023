//! SSE transport: byte stream to stream records

mod decoder;

pub use decoder::{SseDecoder, SseEvent};

use futures::StreamExt;
use parking_lot::Mutex;
use serde_json::Value;
use std::sync::Arc;
use tether_core::{EventStream, StreamRecord, TetherError, TetherResult};

/// Convert one SSE frame into a stream record
///
/// JSON data becomes the payload as-is; anything else is carried as a JSON
/// string so text-only frames still reach the dispatcher.
pub fn to_record(event: SseEvent) -> StreamRecord {
    let payload = serde_json::from_str(&event.data).unwrap_or(Value::String(event.data));
    StreamRecord {
        id: event.id,
        event_type: event.event_type.unwrap_or_else(|| "message".to_string()),
        payload,
    }
}

/// Decode an SSE byte stream into an [`EventStream`]
///
/// A transport error becomes a single `Err` item; the coordinator treats it
/// as a connection fault and stops reading.
pub fn sse_record_stream<S, B, E>(byte_stream: S) -> EventStream
where
    S: futures::Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    let decoder = Arc::new(Mutex::new(SseDecoder::new()));
    let tail = decoder.clone();

    let records = byte_stream.flat_map(move |chunk_result| {
        let items: Vec<TetherResult<StreamRecord>> = match chunk_result {
            Ok(chunk) => decoder
                .lock()
                .feed(chunk.as_ref())
                .into_iter()
                .map(|event| Ok(to_record(event)))
                .collect(),
            Err(e) => vec![Err(TetherError::connection(format!(
                "event stream read failed: {}",
                e
            )))],
        };
        futures::stream::iter(items)
    });

    let flush = futures::stream::once(async move { tail.lock().finish().map(to_record) })
        .filter_map(|record| async move { record.map(Ok) });

    Box::pin(records.chain(flush))
}
