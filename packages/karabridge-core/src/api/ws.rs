//! Bridge WebSocket endpoint.
//!
//! Each upgraded connection gets its own [`ConnectionCoordinator`] which
//! bridges it to a fresh upstream session for the channel named in the
//! upgrade request.

use std::future;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use futures::sink::SinkExt;
use futures::stream::StreamExt;

use crate::api::AppState;
use crate::coordinator::ConnectionCoordinator;
use crate::error::{BridgeError, BridgeResult};
use crate::protocol_constants::CHANNEL_HEADER;

/// Extracts the channel identifier from the upgrade request headers.
fn channel_from_headers(headers: &HeaderMap) -> BridgeResult<String> {
    let value = headers
        .get(CHANNEL_HEADER)
        .ok_or_else(|| BridgeError::MissingChannel(CHANNEL_HEADER.to_string()))?;
    let channel = value
        .to_str()
        .map_err(|_| BridgeError::InvalidRequest(format!("{} is not valid text", CHANNEL_HEADER)))?
        .trim();
    if channel.is_empty() {
        return Err(BridgeError::MissingChannel(CHANNEL_HEADER.to_string()));
    }
    Ok(channel.to_string())
}

/// WebSocket upgrade handler. Rejects requests without a channel.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    headers: HeaderMap,
    State(state): State<AppState>,
) -> Response {
    let channel = match channel_from_headers(&headers) {
        Ok(channel) => channel,
        Err(e) => {
            log::warn!("[WS] Rejected upgrade: {}", e);
            return e.into_response();
        }
    };
    ws.on_upgrade(move |socket| handle_ws(socket, state, channel))
}

async fn handle_ws(socket: WebSocket, state: AppState, channel: String) {
    let conn_guard = state.ws_manager.register(&channel);
    let cancel = conn_guard.cancel_token().clone();
    log::info!(
        "[WS] New connection established: {} channel={}",
        conn_guard.id(),
        channel
    );

    let (sender, receiver) = socket.split();

    // Text frames only; the stream ends at the first close frame or error.
    let inbound = Box::pin(
        receiver
            .take_while(|frame| {
                future::ready(matches!(frame, Ok(msg) if !matches!(msg, Message::Close(_))))
            })
            .filter_map(|frame| {
                future::ready(match frame {
                    Ok(Message::Text(text)) => Some(text.as_str().to_owned()),
                    _ => None,
                })
            }),
    );
    let mut outbound = Box::pin(sender.with(|text: String| {
        future::ready(Ok::<_, axum::Error>(Message::Text(text.into())))
    }));

    let coordinator = ConnectionCoordinator::new(channel, state.config.clone());
    let final_state = coordinator
        .run(state.connector.as_ref(), inbound, &mut outbound, cancel)
        .await;

    // Flushes any final notification before the close frame.
    let _ = outbound.close().await;
    log::info!(
        "[WS] Connection finished: {} ({:?})",
        conn_guard.id(),
        final_state
    );
}
