use std::convert::Infallible;

use axum::{
    extract::{Extension, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::get,
    Router,
};
use futures_util::{Stream, StreamExt};
use tokio_stream::wrappers::BroadcastStream;

use halador_core::auth::AuthContext;

use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/v1/events/stream", get(stream_events))
}

/// One SSE stream per session, carrying only the events addressed to the
/// authenticated user. Clients treat this as the primary refresh signal
/// and fall back to their polling interval when it drops.
async fn stream_events(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.notify_tx.subscribe();
    let user_id = auth.user_id;

    let stream = BroadcastStream::new(rx).filter_map(move |result| async move {
        match result {
            Ok(notification) if notification.recipient == user_id => {
                let data = serde_json::to_string(&notification.event).ok()?;
                Some(Ok::<_, Infallible>(
                    Event::default()
                        .event(notification.event.name())
                        .data(data),
                ))
            }
            // Lagged receivers just skip ahead; polling covers the gap.
            _ => None,
        }
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}
