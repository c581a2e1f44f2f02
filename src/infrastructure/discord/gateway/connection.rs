use std::sync::Arc;

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message as WsMessage;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, trace, warn};

use super::constants::{
    CONNECTION_TIMEOUT, GATEWAY_QUERY, GatewayIntents, GatewayOpcode, HELLO_TIMEOUT,
    IDENTIFY_TIMEOUT,
};
use super::error::{GatewayError, GatewayResult};
use super::events::{DispatchEvent, EventParser, GatewayEventKind};
use super::heartbeat::HeartbeatState;
use super::payloads::{GatewayMessage, GatewayPayload};
use super::session::SessionInfo;
use super::state::ConnectionState;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsWriter = SplitSink<WsStream, WsMessage>;
type WsReader = SplitStream<WsStream>;

/// Frame transport under the handshake logic.
#[async_trait]
pub trait GatewayConnection: Send {
    async fn connect(&mut self, url: &str) -> GatewayResult<()>;
    async fn disconnect(&mut self) -> GatewayResult<()>;
    async fn send(&mut self, payload: &GatewayPayload) -> GatewayResult<()>;
    async fn receive(&mut self) -> GatewayResult<GatewayMessage>;
}

#[derive(Default)]
pub struct WebSocketConnection {
    writer: Option<WsWriter>,
    reader: Option<WsReader>,
}

impl WebSocketConnection {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            writer: None,
            reader: None,
        }
    }
}

#[async_trait]
impl GatewayConnection for WebSocketConnection {
    async fn connect(&mut self, url: &str) -> GatewayResult<()> {
        let (ws_stream, _) = timeout(CONNECTION_TIMEOUT, connect_async(url))
            .await
            .map_err(|_| GatewayError::timeout("connection"))?
            .map_err(|e| GatewayError::connection_failed(e.to_string()))?;

        let (writer, reader) = ws_stream.split();
        self.writer = Some(writer);
        self.reader = Some(reader);
        Ok(())
    }

    async fn disconnect(&mut self) -> GatewayResult<()> {
        if let Some(mut writer) = self.writer.take() {
            let _ = writer.close().await;
        }
        self.reader = None;
        debug!("WebSocket connection closed");
        Ok(())
    }

    async fn send(&mut self, payload: &GatewayPayload) -> GatewayResult<()> {
        let writer = self.writer.as_mut().ok_or(GatewayError::NotConnected)?;

        let json = serde_json::to_string(payload)
            .map_err(|e| GatewayError::serialization(e.to_string()))?;

        writer
            .send(WsMessage::Text(json.into()))
            .await
            .map_err(|e| GatewayError::websocket(e.to_string()))
    }

    async fn receive(&mut self) -> GatewayResult<GatewayMessage> {
        let reader = self.reader.as_mut().ok_or(GatewayError::NotConnected)?;

        loop {
            match reader.next().await {
                Some(Ok(WsMessage::Text(text))) => return EventParser::parse_message(&text),
                Some(Ok(WsMessage::Binary(data))) => {
                    let text = std::str::from_utf8(&data)
                        .map_err(|e| GatewayError::serialization(e.to_string()))?;
                    return EventParser::parse_message(text);
                }
                Some(Ok(WsMessage::Close(frame))) => {
                    let (code, reason) = frame.map_or_else(
                        || (1000, "Normal closure".to_string()),
                        |f| (f.code.into(), f.reason.to_string()),
                    );
                    return Err(GatewayError::ConnectionClosed { code, reason });
                }
                Some(Ok(WsMessage::Ping(data))) => {
                    if let Some(writer) = self.writer.as_mut() {
                        let _ = writer.send(WsMessage::Pong(data)).await;
                    }
                }
                Some(Ok(WsMessage::Pong(_) | WsMessage::Frame(_))) => {}
                Some(Err(e)) => return Err(GatewayError::websocket(e.to_string())),
                None => {
                    return Err(GatewayError::ConnectionClosed {
                        code: 1000,
                        reason: "Stream ended".to_string(),
                    });
                }
            }
        }
    }
}

/// Drives one connection: handshake, then the read loop.
pub struct GatewayConnectionHandler {
    connection: Box<dyn GatewayConnection>,
    state: ConnectionState,
    session: SessionInfo,
    heartbeat: Arc<HeartbeatState>,
    heartbeat_interval_ms: Option<u64>,
    gateway_url: String,
    token: String,
    intents: GatewayIntents,
    event_tx: mpsc::UnboundedSender<GatewayEventKind>,
}

impl GatewayConnectionHandler {
    pub fn new(
        connection: Box<dyn GatewayConnection>,
        session: SessionInfo,
        gateway_url: String,
        token: String,
        intents: GatewayIntents,
        event_tx: mpsc::UnboundedSender<GatewayEventKind>,
    ) -> Self {
        Self {
            connection,
            state: ConnectionState::Disconnected,
            session,
            heartbeat: Arc::new(HeartbeatState::default()),
            heartbeat_interval_ms: None,
            gateway_url,
            token,
            intents,
            event_tx,
        }
    }

    pub async fn connect(&mut self) -> GatewayResult<()> {
        let url = self
            .session
            .resume_target()
            .and(self.session.resume_gateway_url())
            .map_or_else(
                || self.gateway_url.clone(),
                |resume| format!("{}{GATEWAY_QUERY}", resume.trim_end_matches('/')),
            );
        debug!(url = %url, "Connecting to gateway");
        self.connection.connect(&url).await?;

        self.state = ConnectionState::WaitingForHello;
        self.await_hello().await?;

        if let Some((session_id, sequence)) = self.session.resume_target() {
            let payload = GatewayPayload::resume(&self.token, session_id, sequence);
            debug!(session_id = %session_id, sequence, "Sending Resume");
            self.state = ConnectionState::Resuming;
            self.connection.send(&payload).await?;
            Ok(())
        } else {
            self.identify().await
        }
    }

    async fn await_hello(&mut self) -> GatewayResult<()> {
        let message = timeout(HELLO_TIMEOUT, self.connection.receive())
            .await
            .map_err(|_| GatewayError::timeout("Hello"))??;

        let opcode = GatewayOpcode::from_u8(message.op);
        if opcode != Some(GatewayOpcode::Hello) {
            return Err(GatewayError::UnexpectedOpcode { opcode });
        }

        let data = message
            .d
            .ok_or_else(|| GatewayError::protocol("Hello missing data"))?;
        let hello = EventParser::parse_hello(data)?;
        self.heartbeat_interval_ms = Some(hello.heartbeat_interval);

        debug!(
            interval_ms = hello.heartbeat_interval,
            "Received Hello from gateway"
        );
        Ok(())
    }

    async fn identify(&mut self) -> GatewayResult<()> {
        self.state = ConnectionState::Identifying;

        let payload = GatewayPayload::identify(&self.token, self.intents.as_u32());
        self.connection.send(&payload).await?;

        let message = timeout(IDENTIFY_TIMEOUT, self.connection.receive())
            .await
            .map_err(|_| GatewayError::timeout("Ready"))??;

        match GatewayOpcode::from_u8(message.op) {
            Some(GatewayOpcode::Dispatch) if message.t.as_deref() == Some("READY") => {
                self.session.observe(message.s);
                self.heartbeat.record_sequence(message.s);
                self.handle_dispatch("READY", message.d)
            }
            Some(GatewayOpcode::InvalidSession) => {
                self.session.clear();
                Err(GatewayError::SessionInvalidated { resumable: false })
            }
            _ => Err(GatewayError::protocol("Expected Ready event")),
        }
    }

    /// Reads until the connection fails, the heartbeat gives up, or shutdown is signalled.
    pub async fn run(
        &mut self,
        payload_rx: &mut mpsc::Receiver<GatewayPayload>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> GatewayResult<()> {
        while self.state.is_connected() || self.state.is_handshaking() {
            tokio::select! {
                result = self.connection.receive() => {
                    self.handle_message(result?).await?;
                }

                payload = payload_rx.recv() => match payload {
                    Some(payload) => self.connection.send(&payload).await?,
                    None => return Err(GatewayError::HeartbeatTimeout),
                },

                _ = shutdown.changed() => {
                    info!("Gateway shutdown requested");
                    self.state = ConnectionState::Disconnected;
                    self.connection.disconnect().await?;
                }
            }
        }

        Ok(())
    }

    async fn handle_message(&mut self, message: GatewayMessage) -> GatewayResult<()> {
        self.session.observe(message.s);
        self.heartbeat.record_sequence(message.s);

        let opcode = GatewayOpcode::from_u8(message.op);
        match opcode {
            Some(GatewayOpcode::Dispatch) => {
                if let Some(event_type) = message.t.as_deref() {
                    trace!(event = event_type, "Raw dispatch received");
                    if event_type == "RESUMED" {
                        info!("Session resumed successfully");
                        self.state = ConnectionState::Connected;
                        let _ = self.event_tx.send(GatewayEventKind::Resumed);
                    } else if let Err(e) = self.handle_dispatch(event_type, message.d) {
                        warn!(event = event_type, error = %e, "Failed to parse dispatch event");
                    }
                }
            }
            Some(GatewayOpcode::HeartbeatAck) => self.heartbeat.acknowledge(),
            Some(GatewayOpcode::Heartbeat) => {
                debug!("Gateway requested immediate heartbeat");
                self.connection.send(&self.heartbeat.payload()).await?;
            }
            Some(GatewayOpcode::Reconnect) => {
                info!("Gateway requested reconnect");
                return Err(GatewayError::ConnectionClosed {
                    code: 4000,
                    reason: "Reconnect requested".to_string(),
                });
            }
            Some(GatewayOpcode::InvalidSession) => {
                let resumable = message.d.and_then(|d| d.as_bool()).unwrap_or(false);
                warn!(resumable, "Session invalidated");
                if !resumable {
                    self.session.clear();
                }
                return Err(GatewayError::SessionInvalidated { resumable });
            }
            _ => debug!(opcode = ?opcode, "Unhandled opcode"),
        }

        Ok(())
    }

    fn handle_dispatch(
        &mut self,
        event_type: &str,
        data: Option<serde_json::Value>,
    ) -> GatewayResult<()> {
        let event = EventParser::parse_dispatch(event_type, data)?;

        if let DispatchEvent::Ready {
            session_id,
            resume_gateway_url,
            user_id,
        } = &event
        {
            self.session
                .ready(session_id.clone(), resume_gateway_url.clone(), user_id.clone());
            self.state = ConnectionState::Connected;
            info!(session_id = %session_id, user_id = %user_id, "Gateway ready");

            let _ = self.event_tx.send(GatewayEventKind::Connected {
                session_id: session_id.clone(),
                user_id: user_id.clone(),
            });
        }

        debug!(event = event_type, "Dispatching event");
        let _ = self.event_tx.send(GatewayEventKind::Dispatch(event));
        Ok(())
    }

    #[must_use]
    pub const fn heartbeat_interval(&self) -> Option<u64> {
        self.heartbeat_interval_ms
    }

    #[must_use]
    pub fn heartbeat_state(&self) -> Arc<HeartbeatState> {
        self.heartbeat.clone()
    }

    #[must_use]
    pub fn into_session(self) -> SessionInfo {
        self.session
    }
}
