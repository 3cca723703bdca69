//! Socket.IO client for the upstream service.
//!
//! Each session runs a transport task that owns the WebSocket. The session
//! handle talks to it over channels, which keeps
//! [`UpstreamSession::next_event`] cancel-safe and lets the task answer
//! keepalive pings on its own.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use url::Url;

use super::engine_io::{self, EnginePacket, SocketPacket};
use super::{UpstreamConnector, UpstreamError, UpstreamResult, UpstreamSession};
use crate::protocol::{UpstreamCall, UpstreamEvent};
use crate::protocol_constants::{UPSTREAM_CHANNEL_PREFIX, UPSTREAM_CHANNEL_QUERY};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Builds the Socket.IO WebSocket URL for a channel.
///
/// `http`/`https` endpoints are mapped to `ws`/`wss`. A bare host path gets
/// the default `/socket.io/` mount point.
pub fn upstream_url_for_channel(base: &str, channel: &str) -> UpstreamResult<Url> {
    let mut url = Url::parse(base).map_err(|e| UpstreamError::InvalidUrl(e.to_string()))?;

    let scheme = match url.scheme() {
        "ws" | "http" => "ws",
        "wss" | "https" => "wss",
        other => {
            return Err(UpstreamError::InvalidUrl(format!(
                "unsupported scheme {:?}",
                other
            )))
        }
    };
    url.set_scheme(scheme)
        .map_err(|()| UpstreamError::InvalidUrl(format!("cannot use scheme {}", scheme)))?;

    if url.path().is_empty() || url.path() == "/" {
        url.set_path("/socket.io/");
    }

    url.query_pairs_mut()
        .append_pair("EIO", "4")
        .append_pair("transport", "websocket")
        .append_pair(
            UPSTREAM_CHANNEL_QUERY,
            &format!("{}{}", UPSTREAM_CHANNEL_PREFIX, channel),
        );
    Ok(url)
}

/// Opens Socket.IO sessions against a fixed endpoint.
#[derive(Debug, Clone)]
pub struct SocketIoConnector {
    base_url: String,
}

impl SocketIoConnector {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl UpstreamConnector for SocketIoConnector {
    async fn connect(&self, channel: &str) -> UpstreamResult<Box<dyn UpstreamSession>> {
        let url = upstream_url_for_channel(&self.base_url, channel)?;
        log::info!("[Upstream] Connecting to {} for channel {}", url, channel);

        let (ws, _response) = connect_async(url.as_str()).await?;

        let (calls_tx, calls_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        tokio::spawn(run_transport(
            ws,
            channel.to_string(),
            calls_rx,
            events_tx,
            cancel.clone(),
        ));

        Ok(Box::new(SocketIoSession {
            calls: calls_tx,
            events: events_rx,
            cancel,
        }))
    }
}

/// Handle to a running transport task.
struct SocketIoSession {
    calls: mpsc::UnboundedSender<String>,
    events: mpsc::UnboundedReceiver<UpstreamEvent>,
    cancel: CancellationToken,
}

#[async_trait]
impl UpstreamSession for SocketIoSession {
    async fn emit(&mut self, call: UpstreamCall) -> UpstreamResult<()> {
        let frame = engine_io::encode_event(call.event_name(), call.args());
        self.calls.send(frame).map_err(|_| UpstreamError::Closed)
    }

    async fn next_event(&mut self) -> Option<UpstreamEvent> {
        self.events.recv().await
    }

    async fn close(&mut self) {
        self.cancel.cancel();
    }
}

impl Drop for SocketIoSession {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Owns the WebSocket until the session is closed or the peer goes away.
///
/// Calls emitted before the namespace is connected are buffered and flushed
/// in order once the server acknowledges the connect.
async fn run_transport(
    ws: WsStream,
    channel: String,
    mut calls: mpsc::UnboundedReceiver<String>,
    events: mpsc::UnboundedSender<UpstreamEvent>,
    cancel: CancellationToken,
) {
    let (mut writer, mut reader) = ws.split();
    let mut connected = false;
    let mut pending: Vec<String> = Vec::new();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                log::info!("[Upstream] Closing session for channel {}", channel);
                let _ = writer.send(Message::Text(engine_io::DISCONNECT.to_string().into())).await;
                let _ = writer.close().await;
                break;
            }
            call = calls.recv() => {
                let Some(frame) = call else { break };
                if connected {
                    if let Err(e) = writer.send(Message::Text(frame.into())).await {
                        log::warn!("[Upstream] Write failed for channel {}: {}", channel, e);
                        break;
                    }
                } else {
                    pending.push(frame);
                }
            }
            frame = reader.next() => {
                let text = match frame {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(_))) | None => {
                        log::info!("[Upstream] Server closed session for channel {}", channel);
                        break;
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => {
                        log::warn!("[Upstream] Read failed for channel {}: {}", channel, e);
                        break;
                    }
                };

                let packet = match engine_io::decode(text.as_str()) {
                    Ok(packet) => packet,
                    Err(e) => {
                        log::warn!("[Upstream] Ignoring frame on channel {}: {}", channel, e);
                        continue;
                    }
                };

                let reply = match packet {
                    EnginePacket::Open(_) => Some(engine_io::CONNECT.to_string()),
                    EnginePacket::Ping => Some(engine_io::PONG.to_string()),
                    EnginePacket::Close => break,
                    EnginePacket::Pong | EnginePacket::Noop => None,
                    EnginePacket::Message(SocketPacket::Connect) => {
                        log::debug!("[Upstream] Namespace connected for channel {}", channel);
                        connected = true;
                        let mut failed = false;
                        for frame in pending.drain(..) {
                            if writer.send(Message::Text(frame.into())).await.is_err() {
                                failed = true;
                                break;
                            }
                        }
                        if failed {
                            break;
                        }
                        None
                    }
                    EnginePacket::Message(SocketPacket::Disconnect) => {
                        log::info!("[Upstream] Namespace disconnected for channel {}", channel);
                        break;
                    }
                    EnginePacket::Message(SocketPacket::ConnectError(reason)) => {
                        log::warn!("[Upstream] Connect refused for channel {}: {}", channel, reason);
                        break;
                    }
                    EnginePacket::Message(SocketPacket::Event { name, args }) => {
                        tracing::debug!(channel = %channel, event = %name, "upstream_event");
                        if let Some(event) = UpstreamEvent::from_socket_event(&name, &args) {
                            if events.send(event).is_err() {
                                break;
                            }
                        }
                        None
                    }
                    EnginePacket::Message(SocketPacket::Unsupported(kind)) => {
                        log::debug!("[Upstream] Ignoring socket packet type {:?}", kind);
                        None
                    }
                };

                if let Some(reply) = reply {
                    if writer.send(Message::Text(reply.into())).await.is_err() {
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_gets_socket_io_path_and_channel_query() {
        let url = upstream_url_for_channel("wss://www.karafun.co.uk/", "347021").unwrap();
        assert_eq!(url.scheme(), "wss");
        assert_eq!(url.path(), "/socket.io/");
        let query: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert!(query.contains(&("EIO".into(), "4".into())));
        assert!(query.contains(&("transport".into(), "websocket".into())));
        assert!(query.contains(&("remote".into(), "kf347021".into())));
    }

    #[test]
    fn http_schemes_map_to_websocket_schemes() {
        let url = upstream_url_for_channel("https://example.com", "1").unwrap();
        assert_eq!(url.scheme(), "wss");
        let url = upstream_url_for_channel("http://localhost:3000/custom/", "1").unwrap();
        assert_eq!(url.scheme(), "ws");
        assert_eq!(url.path(), "/custom/");
    }

    #[test]
    fn invalid_urls_are_rejected() {
        assert!(matches!(
            upstream_url_for_channel("not a url", "1"),
            Err(UpstreamError::InvalidUrl(_))
        ));
        assert!(matches!(
            upstream_url_for_channel("ftp://example.com", "1"),
            Err(UpstreamError::InvalidUrl(_))
        ));
    }
}
