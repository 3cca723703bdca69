//! Per-connection bridge coordinator.
//!
//! One [`ConnectionCoordinator`] runs for every downstream connection. It
//! owns the upstream session and the [`SessionContext`], waits on whichever
//! peer speaks next, and routes the message through the matching
//! translator.
//!
//! ```text
//! Connecting ──► AuthPending ──► Active ──► Closed
//!      │              │                       ▲
//!      └──────────────┴───────────────────────┘  (error, logout, close)
//! ```

use std::sync::Arc;

use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio_util::sync::CancellationToken;

use crate::context::SessionContext;
use crate::error::ErrorCode;
use crate::protocol::{AuthRequest, DownstreamEvent, InboundMessage, UpstreamCall, UpstreamEvent};
use crate::state::Config;
use crate::translate::{translate_command, translate_event, SessionDirective};
use crate::upstream::{randomized_login, UpstreamConnector, UpstreamSession};

/// Lifecycle of one bridged connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Opening the upstream session.
    Connecting,
    /// `authenticate` sent, waiting for the first permissions event.
    AuthPending,
    Active,
    /// Terminal.
    Closed,
}

/// Whether the event loop keeps going after handling a message.
#[derive(Debug, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

/// Drives one downstream connection against one upstream session.
pub struct ConnectionCoordinator {
    ctx: SessionContext,
    config: Arc<Config>,
    state: ConnectionState,
    /// Login collisions since the last successful authentication.
    login_collisions: u32,
}

impl ConnectionCoordinator {
    /// Creates a coordinator for the given channel.
    pub fn new(channel_id: impl Into<String>, config: Arc<Config>) -> Self {
        Self {
            ctx: SessionContext::new(channel_id),
            config,
            state: ConnectionState::Connecting,
            login_collisions: 0,
        }
    }

    /// Runs the bridge until either side ends or `cancel` fires.
    ///
    /// `inbound` yields raw text frames from the downstream peer; `outbound`
    /// receives serialized downstream events. The upstream session is
    /// always closed before this returns.
    pub async fn run<R, W>(
        mut self,
        connector: &dyn UpstreamConnector,
        mut inbound: R,
        mut outbound: W,
        cancel: CancellationToken,
    ) -> ConnectionState
    where
        R: Stream<Item = String> + Unpin + Send,
        W: Sink<String> + Unpin + Send,
    {
        let channel = self.ctx.channel_id().to_string();

        let connected = tokio::select! {
            _ = cancel.cancelled() => None,
            result = connector.connect(&channel) => Some(result),
        };
        let mut session = match connected {
            Some(Ok(session)) => session,
            Some(Err(e)) => {
                log::warn!(
                    "[Bridge] Upstream connect failed for channel {}: {} ({})",
                    channel,
                    e,
                    e.code()
                );
                deliver(&mut outbound, &DownstreamEvent::ServerUnreachable {}).await;
                self.state = ConnectionState::Closed;
                return self.state;
            }
            None => {
                self.state = ConnectionState::Closed;
                return self.state;
            }
        };

        let auth = AuthRequest::participant(
            self.config.login.clone(),
            channel.clone(),
            self.config.app_name.clone(),
        );
        if let Err(e) = session.emit(UpstreamCall::Authenticate(auth)).await {
            log::warn!("[Bridge] authenticate failed for channel {}: {}", channel, e);
            deliver(&mut outbound, &DownstreamEvent::ServerUnreachable {}).await;
            return self.shutdown(session.as_mut()).await;
        }
        self.state = ConnectionState::AuthPending;
        log::info!("[Bridge] Session started for channel {}", channel);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    log::info!("[Bridge] Session cancelled for channel {}", channel);
                    break;
                }
                frame = inbound.next() => {
                    let Some(text) = frame else {
                        log::info!("[Bridge] Downstream closed for channel {}", channel);
                        break;
                    };
                    if self.on_downstream(session.as_mut(), &text).await == Flow::Stop {
                        deliver(&mut outbound, &DownstreamEvent::ServerUnreachable {}).await;
                        break;
                    }
                }
                event = session.next_event() => {
                    let flow = match event {
                        Some(event) => self.on_upstream(session.as_mut(), &mut outbound, event).await,
                        None => {
                            log::warn!("[Bridge] Upstream transport lost for channel {}", channel);
                            deliver(&mut outbound, &DownstreamEvent::ServerUnreachable {}).await;
                            Flow::Stop
                        }
                    };
                    if flow == Flow::Stop {
                        break;
                    }
                }
            }
        }

        self.shutdown(session.as_mut()).await
    }

    /// Handles one text frame from the downstream peer.
    ///
    /// Malformed or unroutable commands are dropped. Only a failed upstream
    /// write stops the session.
    async fn on_downstream(&mut self, session: &mut dyn UpstreamSession, text: &str) -> Flow {
        let message = match InboundMessage::parse(text) {
            Ok(message) => message,
            Err(e) => {
                log::warn!(
                    "[Bridge] Ignoring malformed frame on channel {}: {}",
                    self.ctx.channel_id(),
                    e
                );
                return Flow::Continue;
            }
        };

        let kind = message.kind.clone();
        let call = match translate_command(&self.ctx, message) {
            Ok(call) => call,
            Err(e) => {
                log::warn!(
                    "[Bridge] Dropping {} on channel {}: {} ({})",
                    kind,
                    self.ctx.channel_id(),
                    e,
                    e.code()
                );
                return Flow::Continue;
            }
        };

        tracing::debug!(
            channel = %self.ctx.channel_id(),
            command = %kind,
            call = call.event_name(),
            "downstream_command"
        );
        match session.emit(call).await {
            Ok(()) => Flow::Continue,
            Err(e) => {
                log::warn!(
                    "[Bridge] Upstream write failed on channel {}: {} ({})",
                    self.ctx.channel_id(),
                    e,
                    e.code()
                );
                Flow::Stop
            }
        }
    }

    /// Handles one upstream event: forwards the translation, then applies
    /// its directive.
    async fn on_upstream<W>(
        &mut self,
        session: &mut dyn UpstreamSession,
        outbound: &mut W,
        event: UpstreamEvent,
    ) -> Flow
    where
        W: Sink<String> + Unpin + Send,
    {
        let name = event.name();
        let translation = translate_event(&mut self.ctx, &self.config.profile, event);
        tracing::debug!(
            channel = %self.ctx.channel_id(),
            event = name,
            messages = translation.messages.len(),
            tracks = self.ctx.track_count(),
            "upstream_event"
        );

        if self.state == ConnectionState::AuthPending && self.ctx.is_authenticated() {
            log::info!("[Bridge] Authenticated on channel {}", self.ctx.channel_id());
            self.state = ConnectionState::Active;
            self.login_collisions = 0;
        }

        for message in &translation.messages {
            deliver(outbound, message).await;
        }

        match translation.directive {
            None => Flow::Continue,
            Some(SessionDirective::Terminate) => {
                log::info!(
                    "[Bridge] Upstream ended session on channel {} ({})",
                    self.ctx.channel_id(),
                    name
                );
                Flow::Stop
            }
            Some(SessionDirective::Reauthenticate) => self.reauthenticate(session, outbound).await,
        }
    }

    async fn reauthenticate<W>(&mut self, session: &mut dyn UpstreamSession, outbound: &mut W) -> Flow
    where
        W: Sink<String> + Unpin + Send,
    {
        self.login_collisions += 1;
        if self.login_collisions > self.config.max_login_retries {
            log::warn!(
                "[Bridge] Giving up on channel {} after {} login collisions",
                self.ctx.channel_id(),
                self.login_collisions
            );
            deliver(outbound, &DownstreamEvent::ServerUnreachable {}).await;
            return Flow::Stop;
        }

        let login = randomized_login(&self.config.login);
        log::info!(
            "[Bridge] Login taken on channel {}, retrying as {}",
            self.ctx.channel_id(),
            login
        );
        let auth = AuthRequest::participant(
            login,
            self.ctx.channel_id().to_string(),
            self.config.app_name.clone(),
        );
        match session.emit(UpstreamCall::Authenticate(auth)).await {
            Ok(()) => Flow::Continue,
            Err(e) => {
                log::warn!(
                    "[Bridge] Re-authenticate failed on channel {}: {}",
                    self.ctx.channel_id(),
                    e
                );
                deliver(outbound, &DownstreamEvent::ServerUnreachable {}).await;
                Flow::Stop
            }
        }
    }

    async fn shutdown(&mut self, session: &mut dyn UpstreamSession) -> ConnectionState {
        session.close().await;
        self.state = ConnectionState::Closed;
        log::info!("[Bridge] Session closed for channel {}", self.ctx.channel_id());
        self.state
    }
}

/// Sends one event downstream. A closed downstream is not an error.
async fn deliver<W>(outbound: &mut W, event: &DownstreamEvent)
where
    W: Sink<String> + Unpin,
{
    let Some(json) = event.to_json() else {
        log::error!("[Bridge] Failed to serialize {}", event.kind());
        return;
    };
    if outbound.send(json).await.is_err() {
        log::debug!("[Bridge] Downstream gone, dropped {}", event.kind());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use futures::channel::mpsc as fmpsc;
    use parking_lot::Mutex;
    use serde_json::{json, Value};
    use tokio::sync::mpsc;
    use tokio_stream::wrappers::UnboundedReceiverStream;

    use crate::protocol::downstream::kinds;
    use crate::protocol::UpstreamStatus;
    use crate::upstream::{UpstreamError, UpstreamResult};

    struct MockSession {
        calls: mpsc::UnboundedSender<UpstreamCall>,
        events: mpsc::UnboundedReceiver<UpstreamEvent>,
        closes: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl UpstreamSession for MockSession {
        async fn emit(&mut self, call: UpstreamCall) -> UpstreamResult<()> {
            self.calls.send(call).map_err(|_| UpstreamError::Closed)
        }

        async fn next_event(&mut self) -> Option<UpstreamEvent> {
            self.events.recv().await
        }

        async fn close(&mut self) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct MockConnector {
        session: Mutex<Option<MockSession>>,
        channels: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl UpstreamConnector for MockConnector {
        async fn connect(&self, channel: &str) -> UpstreamResult<Box<dyn UpstreamSession>> {
            self.channels.lock().push(channel.to_string());
            match self.session.lock().take() {
                Some(session) => Ok(Box::new(session)),
                None => Err(UpstreamError::Protocol("connection refused".into())),
            }
        }
    }

    /// Test-side ends of one bridged connection.
    struct Harness {
        downstream_tx: Option<mpsc::UnboundedSender<String>>,
        downstream_rx: fmpsc::UnboundedReceiver<String>,
        events_tx: mpsc::UnboundedSender<UpstreamEvent>,
        calls_rx: mpsc::UnboundedReceiver<UpstreamCall>,
        closes: Arc<AtomicUsize>,
        cancel: CancellationToken,
        task: tokio::task::JoinHandle<ConnectionState>,
    }

    impl Harness {
        fn start(config: Config) -> Self {
            let (calls_tx, calls_rx) = mpsc::unbounded_channel();
            let (events_tx, events_rx) = mpsc::unbounded_channel();
            let closes = Arc::new(AtomicUsize::new(0));
            let connector = Arc::new(MockConnector {
                session: Mutex::new(Some(MockSession {
                    calls: calls_tx,
                    events: events_rx,
                    closes: Arc::clone(&closes),
                })),
                channels: Mutex::new(Vec::new()),
            });
            let (downstream_tx, inbound_rx) = mpsc::unbounded_channel();
            let (outbound_tx, downstream_rx) = fmpsc::unbounded();
            let cancel = CancellationToken::new();

            let coordinator = ConnectionCoordinator::new("347021", Arc::new(config));
            let token = cancel.clone();
            let task = tokio::spawn(async move {
                coordinator
                    .run(
                        connector.as_ref(),
                        UnboundedReceiverStream::new(inbound_rx),
                        outbound_tx,
                        token,
                    )
                    .await
            });

            Self {
                downstream_tx: Some(downstream_tx),
                downstream_rx,
                events_tx,
                calls_rx,
                closes,
                cancel,
                task,
            }
        }

        fn send_downstream(&self, message: Value) {
            if let Some(tx) = &self.downstream_tx {
                tx.send(message.to_string()).unwrap();
            }
        }

        fn send_upstream(&self, event: UpstreamEvent) {
            self.events_tx.send(event).unwrap();
        }

        async fn next_call(&mut self) -> UpstreamCall {
            tokio::time::timeout(Duration::from_secs(1), self.calls_rx.recv())
                .await
                .expect("timed out waiting for upstream call")
                .expect("call channel closed")
        }

        async fn next_message(&mut self) -> Value {
            let text = tokio::time::timeout(Duration::from_secs(1), self.downstream_rx.next())
                .await
                .expect("timed out waiting for downstream message")
                .expect("downstream channel closed");
            serde_json::from_str(&text).unwrap()
        }

        async fn finish(self) -> (ConnectionState, usize) {
            let state = tokio::time::timeout(Duration::from_secs(1), self.task)
                .await
                .expect("coordinator did not stop")
                .unwrap();
            (state, self.closes.load(Ordering::SeqCst))
        }
    }

    fn auth_login(call: &UpstreamCall) -> String {
        match call {
            UpstreamCall::Authenticate(auth) => auth.login.clone(),
            other => panic!("expected authenticate, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn authenticates_immediately_with_configured_login() {
        let mut h = Harness::start(Config::default());

        match h.next_call().await {
            UpstreamCall::Authenticate(auth) => {
                assert_eq!(auth.login, "proxy");
                assert_eq!(auth.channel, "347021");
                assert_eq!(auth.role, "participant");
                assert_eq!(auth.app, "karafun");
                assert_eq!(auth.socket_id, None);
            }
            other => panic!("unexpected {:?}", other),
        }

        h.cancel.cancel();
        let (state, closes) = h.finish().await;
        assert_eq!(state, ConnectionState::Closed);
        assert_eq!(closes, 1);
    }

    #[tokio::test]
    async fn authenticated_notification_is_sent_once() {
        let mut h = Harness::start(Config::default());
        h.next_call().await;

        h.send_upstream(UpstreamEvent::Permissions(vec!["addToQueue".into()]));
        assert_eq!(h.next_message().await["type"], "core.AuthenticatedEvent");
        let update = h.next_message().await;
        assert_eq!(update["type"], "remote.PermissionsUpdateEvent");
        assert_eq!(update["payload"]["permissions"]["addToQueue"], true);

        h.send_upstream(UpstreamEvent::Permissions(vec![]));
        assert_eq!(h.next_message().await["type"], "remote.PermissionsUpdateEvent");

        h.cancel.cancel();
        h.finish().await;
    }

    #[tokio::test]
    async fn login_collision_reauthenticates_without_downstream_message() {
        let mut h = Harness::start(Config::default());
        assert_eq!(auth_login(&h.next_call().await), "proxy");

        h.send_upstream(UpstreamEvent::LoginAlreadyTaken);
        let retry = auth_login(&h.next_call().await);
        assert!(retry.starts_with("proxy-"));
        assert_ne!(retry, "proxy");

        // The next message downstream is the authenticated notification,
        // so nothing was emitted for the collision itself.
        h.send_upstream(UpstreamEvent::Permissions(vec![]));
        assert_eq!(h.next_message().await["type"], "core.AuthenticatedEvent");

        h.cancel.cancel();
        h.finish().await;
    }

    #[tokio::test]
    async fn too_many_login_collisions_end_the_session() {
        let config = Config {
            max_login_retries: 1,
            ..Config::default()
        };
        let mut h = Harness::start(config);
        h.next_call().await;

        h.send_upstream(UpstreamEvent::LoginAlreadyTaken);
        h.next_call().await;
        h.send_upstream(UpstreamEvent::LoginAlreadyTaken);

        assert_eq!(h.next_message().await["type"], "ServerUnreachable");
        let (state, closes) = h.finish().await;
        assert_eq!(state, ConnectionState::Closed);
        assert_eq!(closes, 1);
    }

    #[tokio::test]
    async fn queue_item_id_round_trips_to_remove() {
        let mut h = Harness::start(Config::default());
        h.next_call().await;

        let entries = serde_json::from_value(json!([
            {"id": 918, "singer": "Ana", "title": "Song", "artist": "Band", "songId": 42}
        ]))
        .unwrap();
        h.send_upstream(UpstreamEvent::Queue(entries));
        let queue = h.next_message().await;
        let item_id = queue["payload"]["queue"]["items"][0]["id"].clone();
        assert_eq!(item_id, "918");

        h.send_downstream(json!({
            "type": kinds::REMOVE_FROM_QUEUE,
            "payload": {"queueItemId": item_id}
        }));
        assert_eq!(
            h.next_call().await,
            UpstreamCall::QueueRemove {
                queue_id: json!("918")
            }
        );

        h.cancel.cancel();
        h.finish().await;
    }

    #[tokio::test]
    async fn status_assigns_ids_used_by_volume_commands() {
        let mut h = Harness::start(Config::default());
        h.next_call().await;

        let status: UpstreamStatus = serde_json::from_value(json!({
            "state": "playing",
            "volumeBv": 50,
            "volumeLd": {"Alice": 70}
        }))
        .unwrap();
        h.send_upstream(UpstreamEvent::Status(status));
        let message = h.next_message().await;
        assert_eq!(message["payload"]["status"]["tracks"][1]["track"]["type"], 5);

        h.send_downstream(json!({
            "type": kinds::TRACK_VOLUME,
            "payload": {"type": 5, "volume": 80}
        }));
        assert_eq!(
            h.next_call().await,
            UpstreamCall::VolumeLd {
                name: "Alice".into(),
                volume: json!(80)
            }
        );

        h.cancel.cancel();
        h.finish().await;
    }

    #[tokio::test]
    async fn malformed_and_unknown_commands_are_dropped() {
        let mut h = Harness::start(Config::default());
        h.next_call().await;

        h.downstream_tx.as_ref().unwrap().send("not json".into()).unwrap();
        h.send_downstream(json!({"type": "remote.DanceRequest", "payload": {}}));
        h.send_downstream(json!({
            "type": kinds::TRACK_VOLUME,
            "payload": {"type": 9, "volume": 10}
        }));
        h.send_downstream(json!({"type": kinds::PLAY, "payload": {}}));

        // Commands are handled in order, so the play call proves the
        // earlier ones were dropped without an upstream call.
        assert_eq!(h.next_call().await, UpstreamCall::Play);
        assert!(h.downstream_rx.try_next().is_err());

        h.cancel.cancel();
        h.finish().await;
    }

    #[tokio::test]
    async fn volume_for_evicted_track_is_dropped() {
        let mut h = Harness::start(Config::default());
        h.next_call().await;

        let status = |tracks: Value| -> UpstreamStatus {
            serde_json::from_value(json!({"state": "idle", "volumeLd": tracks})).unwrap()
        };
        h.send_upstream(UpstreamEvent::Status(status(json!({"Alice": 70}))));
        h.next_message().await;
        h.send_upstream(UpstreamEvent::Status(status(json!({}))));
        h.next_message().await;

        h.send_downstream(json!({
            "type": kinds::TRACK_VOLUME,
            "payload": {"type": 5, "volume": 30}
        }));
        h.send_downstream(json!({"type": kinds::PAUSE, "payload": {}}));

        assert_eq!(h.next_call().await, UpstreamCall::Pause);
        assert!(h.downstream_rx.try_next().is_err());

        h.cancel.cancel();
        h.finish().await;
    }

    #[tokio::test]
    async fn upstream_logout_notifies_and_closes() {
        let mut h = Harness::start(Config::default());
        h.next_call().await;

        h.send_upstream(UpstreamEvent::Logout);
        assert_eq!(h.next_message().await["type"], "Logout");

        let (state, closes) = h.finish().await;
        assert_eq!(state, ConnectionState::Closed);
        assert_eq!(closes, 1);
    }

    #[tokio::test]
    async fn upstream_transport_loss_reports_unreachable() {
        let mut h = Harness::start(Config::default());
        h.next_call().await;

        let (replacement, _) = mpsc::unbounded_channel();
        drop(std::mem::replace(&mut h.events_tx, replacement));

        assert_eq!(h.next_message().await["type"], "ServerUnreachable");
        let (state, closes) = h.finish().await;
        assert_eq!(state, ConnectionState::Closed);
        assert_eq!(closes, 1);
    }

    #[tokio::test]
    async fn downstream_close_closes_upstream_once() {
        let mut h = Harness::start(Config::default());
        h.next_call().await;

        h.downstream_tx.take();
        let (state, closes) = h.finish().await;
        assert_eq!(state, ConnectionState::Closed);
        assert_eq!(closes, 1);
    }

    #[tokio::test]
    async fn closed_downstream_does_not_stop_translation() {
        let mut h = Harness::start(Config::default());
        h.next_call().await;

        h.downstream_rx.close();
        h.send_upstream(UpstreamEvent::Permissions(vec![]));
        h.send_downstream(json!({"type": kinds::NEXT, "payload": {}}));
        assert_eq!(h.next_call().await, UpstreamCall::Next);

        h.cancel.cancel();
        h.finish().await;
    }

    #[tokio::test]
    async fn connect_failure_reports_unreachable() {
        let connector = MockConnector {
            session: Mutex::new(None),
            channels: Mutex::new(Vec::new()),
        };
        let (_inbound_tx, inbound_rx) = mpsc::unbounded_channel::<String>();
        let (outbound_tx, mut outbound_rx) = fmpsc::unbounded();

        let coordinator = ConnectionCoordinator::new("42", Arc::new(Config::default()));
        let state = coordinator
            .run(
                &connector,
                UnboundedReceiverStream::new(inbound_rx),
                outbound_tx,
                CancellationToken::new(),
            )
            .await;

        assert_eq!(state, ConnectionState::Closed);
        assert_eq!(*connector.channels.lock(), vec!["42".to_string()]);
        let text = outbound_rx.next().await.unwrap();
        assert_eq!(text, r#"{"type":"ServerUnreachable","payload":{}}"#);
    }

    #[test]
    fn new_coordinator_starts_connecting() {
        let coordinator = ConnectionCoordinator::new("1", Arc::new(Config::default()));
        assert_eq!(coordinator.state, ConnectionState::Connecting);
    }
}
