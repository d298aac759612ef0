use std::convert::Infallible;

use axum::{
    extract::State,
    response::sse::{Event as SseEvent, KeepAlive, Sse},
    routing::get,
    Router,
};
use futures::stream::Stream;
use tokio::sync::broadcast;

use crate::AppState;

/// Admin change feed. The payload names what changed; clients re-fetch
/// the affected collection rather than applying deltas. Disconnecting
/// drops the broadcast receiver, which is the unsubscribe.
pub fn stream_routes() -> Router<AppState> {
    Router::new().route("/orders/stream", get(order_events))
}

async fn order_events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<SseEvent, Infallible>>> {
    let rx = state.event_bus.subscribe();

    let stream = futures::stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(event) if event.concerns_orders() => {
                    let payload = serde_json::to_string(&event)
                        .unwrap_or_else(|_| "{}".to_string());
                    let sse_event = SseEvent::default().event("order").data(payload);
                    return Some((Ok(sse_event), rx));
                }
                // Not an order event; keep waiting
                Ok(_) => continue,
                // Missed messages just mean extra re-fetches were skipped
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
