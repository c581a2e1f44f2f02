/// Lifecycle of a single websocket connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    WaitingForHello,
    Identifying,
    Resuming,
    Connected,
}

impl ConnectionState {
    #[must_use]
    pub const fn is_connected(self) -> bool {
        matches!(self, Self::Connected)
    }

    #[must_use]
    pub const fn is_handshaking(self) -> bool {
        matches!(
            self,
            Self::WaitingForHello | Self::Identifying | Self::Resuming
        )
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::WaitingForHello => write!(f, "Waiting for Hello"),
            Self::Identifying => write!(f, "Identifying"),
            Self::Resuming => write!(f, "Resuming"),
            Self::Connected => write!(f, "Connected"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_predicates() {
        assert!(ConnectionState::Connected.is_connected());
        assert!(!ConnectionState::Resuming.is_connected());
        assert!(ConnectionState::Identifying.is_handshaking());
        assert!(!ConnectionState::Disconnected.is_handshaking());
        assert_eq!(ConnectionState::WaitingForHello.to_string(), "Waiting for Hello");
    }
}
