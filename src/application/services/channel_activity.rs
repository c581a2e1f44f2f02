use std::collections::HashMap;

use parking_lot::Mutex;

use crate::domain::entities::{ChannelId, MessageId};

/// Tracks the newest message seen in each channel.
///
/// Used to decide whether a reply still sits next to the message that
/// triggered it.
#[derive(Default)]
pub struct ChannelActivity {
    last_message: Mutex<HashMap<ChannelId, MessageId>>,
}

impl ChannelActivity {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a message. Older ids never replace newer ones.
    pub fn record(&self, channel_id: ChannelId, message_id: MessageId) {
        let mut last = self.last_message.lock();
        let entry = last.entry(channel_id).or_insert(message_id);
        if message_id > *entry {
            *entry = message_id;
        }
    }

    /// Returns the message to reference if the channel moved on since `message_id`.
    #[must_use]
    pub fn reply_reference(&self, channel_id: ChannelId, message_id: MessageId) -> Option<MessageId> {
        match self.last_message.lock().get(&channel_id) {
            Some(last) if *last != message_id => Some(message_id),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latest_message_needs_no_reference() {
        let activity = ChannelActivity::new();
        activity.record(ChannelId(1), MessageId(100));
        assert_eq!(activity.reply_reference(ChannelId(1), MessageId(100)), None);
    }

    #[test]
    fn test_newer_message_forces_reference() {
        let activity = ChannelActivity::new();
        activity.record(ChannelId(1), MessageId(100));
        activity.record(ChannelId(1), MessageId(101));
        assert_eq!(
            activity.reply_reference(ChannelId(1), MessageId(100)),
            Some(MessageId(100))
        );
    }

    #[test]
    fn test_out_of_order_record_is_ignored() {
        let activity = ChannelActivity::new();
        activity.record(ChannelId(1), MessageId(101));
        activity.record(ChannelId(1), MessageId(100));
        assert_eq!(activity.reply_reference(ChannelId(1), MessageId(101)), None);
    }

    #[test]
    fn test_channels_are_independent() {
        let activity = ChannelActivity::new();
        activity.record(ChannelId(1), MessageId(100));
        activity.record(ChannelId(2), MessageId(200));
        assert_eq!(activity.reply_reference(ChannelId(1), MessageId(100)), None);
    }
}
