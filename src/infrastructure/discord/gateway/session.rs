/// Resume state carried across reconnects.
#[derive(Debug, Clone, Default)]
pub struct SessionInfo {
    session_id: Option<String>,
    resume_gateway_url: Option<String>,
    sequence: Option<u64>,
    user_id: Option<String>,
}

impl SessionInfo {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            session_id: None,
            resume_gateway_url: None,
            sequence: None,
            user_id: None,
        }
    }

    pub fn ready(&mut self, session_id: String, resume_url: Option<String>, user_id: String) {
        self.session_id = Some(session_id);
        self.resume_gateway_url = resume_url;
        self.user_id = Some(user_id);
    }

    pub const fn observe(&mut self, sequence: Option<u64>) {
        if let Some(seq) = sequence {
            self.sequence = Some(seq);
        }
    }

    #[must_use]
    pub const fn sequence(&self) -> Option<u64> {
        self.sequence
    }

    /// Session id and last sequence, when both are known.
    #[must_use]
    pub fn resume_target(&self) -> Option<(&str, u64)> {
        self.session_id.as_deref().zip(self.sequence)
    }

    #[must_use]
    pub fn resume_gateway_url(&self) -> Option<&str> {
        self.resume_gateway_url.as_deref()
    }

    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// Forgets the resumable session. The bot user id survives.
    pub fn clear(&mut self) {
        self.session_id = None;
        self.resume_gateway_url = None;
        self.sequence = None;
    }
}
