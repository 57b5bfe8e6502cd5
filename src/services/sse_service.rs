//! Per-identity SSE subscriptions, bridging the broadcast hubs into axum
//! response streams and handling disconnect bookkeeping.

use std::{convert::Infallible, time::Duration};

use axum::response::sse::{Event, KeepAlive, Sse};
use futures::Stream;
use tokio::sync::{
    broadcast::{self, error::RecvError},
    mpsc,
};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{info, warn};

use crate::{
    dto::sse::{Handshake, ServerEvent},
    services::{identity::AuthorizedIdentity, session_service},
    state::SharedState,
};

/// Subscribe to the identity's personal event stream, creating its hub on
/// first use.
pub fn subscribe(state: &SharedState, identity: &AuthorizedIdentity) -> broadcast::Receiver<ServerEvent> {
    state.sse().subscribe(identity.as_str())
}

/// Greet a freshly connected subscriber on its own stream.
pub fn broadcast_handshake(state: &SharedState, identity: &AuthorizedIdentity) {
    if let Ok(event) = ServerEvent::json(
        Some("handshake".to_string()),
        &Handshake {
            identity: identity.as_str().to_string(),
            message: "event stream connected".to_string(),
        },
    ) {
        state.sse().publish(identity.as_str(), event);
    }
}

/// Convert a broadcast receiver into an SSE response, forwarding events and
/// cleaning up once the client disconnects.
///
/// A dropped stream counts as a disconnect for the whole product: the hub is
/// pruned and any live session the identity participates in is abandoned.
pub fn to_sse_stream(
    state: SharedState,
    identity: AuthorizedIdentity,
    mut receiver: broadcast::Receiver<ServerEvent>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // small bounded channel between forwarder and response
    let (tx, rx) = mpsc::channel::<Result<Event, Infallible>>(8);

    // forwarder task: reads from broadcast and pushes into mpsc
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = tx.closed() => break,
                recv_result = receiver.recv() => {
                    match recv_result {
                        Ok(payload) => {
                            let mut event = Event::default().data(payload.data);
                            if let Some(name) = payload.event {
                                event = event.event(name);
                            }

                            if tx.send(Ok(event)).await.is_err() {
                                break;
                            }
                        }
                        Err(RecvError::Closed) => break,
                        Err(RecvError::Lagged(skipped)) => {
                            // Keep the stream alive; the client can resync
                            // through the session and history endpoints.
                            warn!(%identity, skipped, "slow SSE subscriber dropped events");
                            continue;
                        }
                    }
                }
            }
        }

        // Own the state inside the spawned task so cleanup runs even after
        // the request context dropped.
        drop(receiver);
        state.sse().prune(identity.as_str());
        if !state.sse().is_connected(identity.as_str()) {
            session_service::abandon_on_disconnect(&state, &identity).await;
        }
        info!(%identity, "SSE stream disconnected");
    });

    // response stream reads from mpsc; when client disconnects axum drops this stream
    let stream = ReceiverStream::new(rx);
    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}
