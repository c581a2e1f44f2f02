use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{Instant, interval_at};
use tracing::{debug, warn};

use super::constants::HEARTBEAT_JITTER_PERCENT;
use super::payloads::GatewayPayload;

/// Sequence and ack flag shared between the reader and the heartbeat task.
#[derive(Debug)]
pub struct HeartbeatState {
    sequence: AtomicU64,
    acked: AtomicBool,
}

impl Default for HeartbeatState {
    fn default() -> Self {
        Self {
            sequence: AtomicU64::new(0),
            acked: AtomicBool::new(true),
        }
    }
}

impl HeartbeatState {
    pub fn record_sequence(&self, sequence: Option<u64>) {
        if let Some(seq) = sequence {
            self.sequence.store(seq, Ordering::SeqCst);
        }
    }

    pub fn acknowledge(&self) {
        self.acked.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn payload(&self) -> GatewayPayload {
        let seq = self.sequence.load(Ordering::SeqCst);
        GatewayPayload::heartbeat((seq != 0).then_some(seq))
    }
}

pub struct HeartbeatManager {
    interval_ms: u64,
    state: Arc<HeartbeatState>,
    running: Arc<AtomicBool>,
}

impl HeartbeatManager {
    #[must_use]
    pub fn new(interval_ms: u64, state: Arc<HeartbeatState>) -> Self {
        Self {
            interval_ms,
            state,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Spawns the beat loop. A beat that goes unacknowledged until the next
    /// tick ends the loop and drops `payload_tx`, which the reader treats as
    /// a dead connection.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_sign_loss,
        clippy::cast_precision_loss
    )]
    pub fn start(&self, payload_tx: mpsc::Sender<GatewayPayload>) -> tokio::task::JoinHandle<()> {
        let interval_ms = self.interval_ms;
        let state = self.state.clone();
        let running = self.running.clone();

        running.store(true, Ordering::SeqCst);
        state.acknowledge();

        tokio::spawn(async move {
            let jitter = (interval_ms as f64 * HEARTBEAT_JITTER_PERCENT) as u64;
            let first_delay = Duration::from_millis(interval_ms - jitter);
            let mut ticker = interval_at(
                Instant::now() + first_delay,
                Duration::from_millis(interval_ms),
            );

            while running.load(Ordering::SeqCst) {
                ticker.tick().await;

                if !running.load(Ordering::SeqCst) {
                    break;
                }

                if !state.acked.swap(false, Ordering::SeqCst) {
                    warn!("Heartbeat ACK not received, connection is dead");
                    break;
                }

                let payload = state.payload();
                if payload_tx.send(payload).await.is_err() {
                    debug!("Heartbeat channel closed");
                    break;
                }
                debug!("Sent heartbeat");
            }

            debug!("Heartbeat loop stopped");
        })
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

impl Drop for HeartbeatManager {
    fn drop(&mut self) {
        self.stop();
    }
}
