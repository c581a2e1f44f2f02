//! Bounded wait for a link preview that arrives after the message itself.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::debug;

use crate::domain::entities::{Embed, Message, MessageId};

/// Default time to wait for the platform to attach an embed.
pub const DEFAULT_EMBED_DEADLINE: Duration = Duration::from_secs(3);

type PendingTable = Arc<Mutex<HashMap<MessageId, (u64, oneshot::Sender<Embed>)>>>;

/// Pairs inbound messages with their later update events.
pub struct EmbedWaiter {
    pending: PendingTable,
    next_token: AtomicU64,
    deadline: Duration,
}

impl Default for EmbedWaiter {
    fn default() -> Self {
        Self::new(DEFAULT_EMBED_DEADLINE)
    }
}

impl EmbedWaiter {
    /// Creates a waiter with the given deadline.
    #[must_use]
    pub fn new(deadline: Duration) -> Self {
        Self {
            pending: Arc::new(Mutex::new(HashMap::new())),
            next_token: AtomicU64::new(0),
            deadline,
        }
    }

    /// Returns the configured deadline.
    #[must_use]
    pub const fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Starts listening for the message's embed.
    ///
    /// Registration happens immediately so updates delivered before the
    /// returned wait is polled are not lost.
    #[must_use]
    pub fn listen(&self, message: &Message) -> EmbedWait {
        if let Some(embed) = message.first_embed() {
            return EmbedWait {
                immediate: Some(embed.clone()),
                receiver: None,
                guard: None,
                deadline: self.deadline,
            };
        }

        let (tx, rx) = oneshot::channel();
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        self.pending.lock().insert(message.id(), (token, tx));
        debug!(message_id = %message.id(), "Waiting for embed");

        EmbedWait {
            immediate: None,
            receiver: Some(rx),
            guard: Some(ListenerGuard {
                pending: Arc::clone(&self.pending),
                message_id: message.id(),
                token,
            }),
            deadline: self.deadline,
        }
    }

    /// Waits for the first embed on the message, up to the deadline.
    pub async fn wait_for_embed(&self, message: &Message) -> Option<Embed> {
        self.listen(message).wait().await
    }

    /// Feeds a message update to a pending wait.
    ///
    /// Returns true if a waiter was resolved. Updates without embeds, or for
    /// messages nobody waits on, are ignored.
    pub fn notify_update(&self, message: &Message) -> bool {
        let Some(embed) = message.first_embed() else {
            return false;
        };
        let Some((_, sender)) = self.pending.lock().remove(&message.id()) else {
            return false;
        };
        debug!(message_id = %message.id(), "Embed arrived");
        sender.send(embed.clone()).is_ok()
    }

    /// Number of registered listeners.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }
}

/// A registered embed wait.
pub struct EmbedWait {
    immediate: Option<Embed>,
    receiver: Option<oneshot::Receiver<Embed>>,
    guard: Option<ListenerGuard>,
    deadline: Duration,
}

impl EmbedWait {
    /// Resolves with the embed, or `None` once the deadline passes.
    pub async fn wait(self) -> Option<Embed> {
        if let Some(embed) = self.immediate {
            return Some(embed);
        }
        let receiver = self.receiver?;
        let _guard = self.guard;

        match tokio::time::timeout(self.deadline, receiver).await {
            Ok(Ok(embed)) => Some(embed),
            Ok(Err(_)) | Err(_) => None,
        }
    }
}

/// Removes the listener on every exit path.
struct ListenerGuard {
    pending: PendingTable,
    message_id: MessageId,
    token: u64,
}

impl Drop for ListenerGuard {
    fn drop(&mut self) {
        let mut pending = self.pending.lock();
        // A newer listener for the same id owns the slot now.
        if pending
            .get(&self.message_id)
            .is_some_and(|(token, _)| *token == self.token)
        {
            pending.remove(&self.message_id);
        }
    }
}
