use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::FutureExt;
use tokio::sync::{mpsc, watch};
use tokio::time::sleep;
use tracing::{error, info, warn};

use super::connection::{GatewayConnectionHandler, WebSocketConnection};
use super::constants::{
    GATEWAY_URL, GatewayIntents, MAX_RECONNECT_ATTEMPTS, RECONNECT_DELAY_BASE,
    RECONNECT_DELAY_MAX, RECONNECT_JITTER_MAX,
};
use super::error::{GatewayCloseCode, GatewayError, GatewayResult};
use super::events::GatewayEventKind;
use super::heartbeat::HeartbeatManager;
use super::session::SessionInfo;

pub struct GatewayClientConfig {
    pub intents: GatewayIntents,
    pub gateway_url: String,
    pub auto_reconnect: bool,
    pub max_reconnect_attempts: u32,
}

impl Default for GatewayClientConfig {
    fn default() -> Self {
        Self {
            intents: GatewayIntents::bot(),
            gateway_url: GATEWAY_URL.to_string(),
            auto_reconnect: true,
            max_reconnect_attempts: MAX_RECONNECT_ATTEMPTS,
        }
    }
}

impl GatewayClientConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn with_auto_reconnect(mut self, enabled: bool) -> Self {
        self.auto_reconnect = enabled;
        self
    }

    #[must_use]
    pub const fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }
}

/// Owns the background gateway task and its shutdown signal.
pub struct GatewayClient {
    config: GatewayClientConfig,
    running: Arc<AtomicBool>,
    shutdown: watch::Sender<bool>,
}

impl GatewayClient {
    #[must_use]
    pub fn new(config: GatewayClientConfig) -> Self {
        Self {
            config,
            running: Arc::new(AtomicBool::new(false)),
            shutdown: watch::Sender::new(false),
        }
    }

    #[must_use]
    pub fn with_default_config() -> Self {
        Self::new(GatewayClientConfig::default())
    }

    /// # Errors
    ///
    /// Returns `GatewayError::AlreadyConnected` if connection is already active.
    pub fn connect(
        &mut self,
        token: &str,
    ) -> GatewayResult<mpsc::UnboundedReceiver<GatewayEventKind>> {
        if self.running.load(Ordering::SeqCst) {
            return Err(GatewayError::AlreadyConnected);
        }

        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let config = GatewayLoopConfig {
            token: token.to_string(),
            gateway_url: self.config.gateway_url.clone(),
            intents: self.config.intents,
            auto_reconnect: self.config.auto_reconnect,
            max_attempts: self.config.max_reconnect_attempts,
        };
        let running = self.running.clone();
        self.shutdown.send_replace(false);
        let shutdown = self.shutdown.subscribe();

        running.store(true, Ordering::SeqCst);

        tokio::spawn(async move {
            let result = std::panic::AssertUnwindSafe(run_gateway_loop(
                config,
                event_tx.clone(),
                running.clone(),
                shutdown,
            ));

            if let Err(panic_info) = result.catch_unwind().await {
                let panic_msg = if let Some(s) = panic_info.downcast_ref::<&str>() {
                    (*s).to_string()
                } else if let Some(s) = panic_info.downcast_ref::<String>() {
                    s.clone()
                } else {
                    "Unknown panic".to_string()
                };

                error!(panic = %panic_msg, "Gateway task panicked");
                running.store(false, Ordering::SeqCst);
                let _ = event_tx.send(GatewayEventKind::Error {
                    message: format!("Gateway task panicked: {panic_msg}"),
                    recoverable: false,
                });
            }
        });

        Ok(event_rx)
    }

    /// Stops the reconnect loop and closes the live connection.
    pub fn disconnect(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.shutdown.send_replace(true);
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

struct GatewayLoopConfig {
    token: String,
    gateway_url: String,
    intents: GatewayIntents,
    auto_reconnect: bool,
    max_attempts: u32,
}

async fn run_gateway_loop(
    config: GatewayLoopConfig,
    event_tx: mpsc::UnboundedSender<GatewayEventKind>,
    running: Arc<AtomicBool>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut reconnect_attempts: u32 = 0;
    let mut session = SessionInfo::new();

    while running.load(Ordering::SeqCst) {
        let handler = GatewayConnectionHandler::new(
            Box::new(WebSocketConnection::new()),
            std::mem::take(&mut session),
            config.gateway_url.clone(),
            config.token.clone(),
            config.intents,
            event_tx.clone(),
        );

        let (result, returned) = run_single_connection(handler, &mut shutdown).await;
        session = returned;

        match result {
            ConnectionResult::Closed => {
                reconnect_attempts = 0;
            }
            ConnectionResult::Error(e) => {
                error!(error = %e, "Failed to connect to gateway");

                let _ = event_tx.send(GatewayEventKind::Error {
                    message: e.to_string(),
                    recoverable: e.should_reconnect(),
                });

                if !e.should_reconnect() || !config.auto_reconnect {
                    break;
                }

                reconnect_attempts += 1;
            }
            ConnectionResult::Disconnected(e) => {
                reconnect_attempts = 0;
                if !handle_connection_error(&e, &event_tx, &mut session) {
                    break;
                }
            }
        }

        if !running.load(Ordering::SeqCst) {
            break;
        }

        if !config.auto_reconnect {
            let _ = event_tx.send(GatewayEventKind::Disconnected {
                reason: "Connection closed".to_string(),
                can_resume: session.resume_target().is_some(),
            });
            break;
        }

        if reconnect_attempts >= config.max_attempts {
            error!(
                attempts = reconnect_attempts,
                "Max reconnection attempts exceeded"
            );
            let _ = event_tx.send(GatewayEventKind::Error {
                message: format!(
                    "Max reconnection attempts ({}) exceeded",
                    config.max_attempts
                ),
                recoverable: false,
            });
            break;
        }

        let delay = calculate_backoff_delay(reconnect_attempts);
        info!(
            attempt = reconnect_attempts,
            delay_ms = delay.as_millis(),
            "Reconnecting to gateway"
        );

        let _ = event_tx.send(GatewayEventKind::Reconnecting {
            attempt: reconnect_attempts,
        });

        tokio::select! {
            () = sleep(delay) => {}
            _ = shutdown.changed() => break,
        }
    }

    running.store(false, Ordering::SeqCst);
    info!("Gateway loop terminated");
}

enum ConnectionResult {
    /// The read loop ended without an error, which only happens on shutdown.
    Closed,
    /// The handshake failed.
    Error(GatewayError),
    /// An established connection dropped.
    Disconnected(GatewayError),
}

async fn run_single_connection(
    mut handler: GatewayConnectionHandler,
    shutdown: &mut watch::Receiver<bool>,
) -> (ConnectionResult, SessionInfo) {
    if let Err(e) = handler.connect().await {
        return (ConnectionResult::Error(e), handler.into_session());
    }
    info!("Gateway connected");

    let Some(interval) = handler.heartbeat_interval() else {
        let error = GatewayError::protocol("Hello carried no heartbeat interval");
        return (ConnectionResult::Error(error), handler.into_session());
    };

    let (payload_tx, mut payload_rx) = mpsc::channel(8);
    let heartbeat = HeartbeatManager::new(interval, handler.heartbeat_state());
    let _heartbeat_handle = heartbeat.start(payload_tx);

    let run_result = handler.run(&mut payload_rx, shutdown).await;
    heartbeat.stop();

    let result = match run_result {
        Ok(()) => ConnectionResult::Closed,
        Err(e) => ConnectionResult::Disconnected(e),
    };
    (result, handler.into_session())
}

/// Reports the drop and prunes session state. Returns whether to reconnect.
fn handle_connection_error(
    error: &GatewayError,
    event_tx: &mpsc::UnboundedSender<GatewayEventKind>,
    session: &mut SessionInfo,
) -> bool {
    warn!(error = %error, "Connection error");

    if !error.can_resume() {
        session.clear();
    }

    if let Some(code) = error.close_code()
        && let Some(close_code) = GatewayCloseCode::from_u16(code)
        && (close_code.drops_session() || close_code.is_fatal())
    {
        session.clear();
    }

    let _ = event_tx.send(GatewayEventKind::Disconnected {
        reason: error.to_string(),
        can_resume: session.resume_target().is_some(),
    });

    error.should_reconnect()
}

#[allow(clippy::cast_possible_truncation)]
fn calculate_backoff_delay(attempt: u32) -> Duration {
    let base_delay = RECONNECT_DELAY_BASE.as_millis() as u64;
    let max_delay = RECONNECT_DELAY_MAX.as_millis() as u64;
    let jitter_max = RECONNECT_JITTER_MAX.as_millis() as u64;

    let exponential_delay = base_delay.saturating_mul(2_u64.saturating_pow(attempt.min(6)));
    let capped_delay = exponential_delay.min(max_delay);

    let jitter = rand_jitter(jitter_max);
    Duration::from_millis(capped_delay.saturating_add(jitter))
}

fn rand_jitter(max: u64) -> u64 {
    use std::time::SystemTime;

    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| u64::from(d.subsec_nanos()))
        .unwrap_or(0);

    nanos % max
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = GatewayClientConfig::new()
            .with_auto_reconnect(false)
            .with_max_reconnect_attempts(5);

        assert!(!config.auto_reconnect);
        assert_eq!(config.max_reconnect_attempts, 5);
        assert_eq!(config.gateway_url, GATEWAY_URL);
        assert_eq!(config.intents, GatewayIntents::bot());
    }

    #[test]
    fn test_backoff_delay() {
        let delay0 = calculate_backoff_delay(0);
        let delay1 = calculate_backoff_delay(1);
        let delay2 = calculate_backoff_delay(2);

        assert!(delay0 < delay1);
        assert!(delay1 < delay2);

        let delay_max = calculate_backoff_delay(100);
        assert!(delay_max <= RECONNECT_DELAY_MAX + RECONNECT_JITTER_MAX);
    }

    #[test]
    fn test_client_initial_state() {
        let client = GatewayClient::with_default_config();
        assert!(!client.is_running());
    }

    #[test]
    fn test_fatal_close_clears_session_and_stops() {
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let mut session = SessionInfo::new();
        session.ready("s".into(), None, "99".into());
        session.observe(Some(3));

        let error = GatewayError::ConnectionClosed {
            code: 4004,
            reason: "Authentication failed".into(),
        };
        assert!(!handle_connection_error(&error, &event_tx, &mut session));
        assert!(session.resume_target().is_none());
        assert!(matches!(
            event_rx.try_recv(),
            Ok(GatewayEventKind::Disconnected {
                can_resume: false,
                ..
            })
        ));
    }

    #[test]
    fn test_transient_close_keeps_session() {
        let (event_tx, _event_rx) = mpsc::unbounded_channel();
        let mut session = SessionInfo::new();
        session.ready("s".into(), None, "99".into());
        session.observe(Some(3));

        let error = GatewayError::ConnectionClosed {
            code: 1006,
            reason: "abnormal".into(),
        };
        assert!(handle_connection_error(&error, &event_tx, &mut session));
        assert_eq!(session.resume_target(), Some(("s", 3)));
    }

    #[test]
    fn test_non_resumable_invalidation_identifies_next() {
        let (event_tx, _event_rx) = mpsc::unbounded_channel();
        let mut session = SessionInfo::new();
        session.ready("s".into(), None, "99".into());
        session.observe(Some(3));

        let error = GatewayError::SessionInvalidated { resumable: false };
        assert!(handle_connection_error(&error, &event_tx, &mut session));
        assert!(session.resume_target().is_none());
    }
}
