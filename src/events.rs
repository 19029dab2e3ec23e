use tokio::sync::broadcast;

const CHANNEL_CAPACITY: usize = 16;

/// Emitted whenever the stored session is invalidated. Carries no payload:
/// listeners re-read the session store themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuthChanged;

/// AuthEvents
///
/// Fire-and-forget notification channel for session changes. Any number of
/// listeners may subscribe; notifying with no listeners is not an error.
#[derive(Debug, Clone)]
pub struct AuthEvents {
    sender: broadcast::Sender<AuthChanged>,
}

impl AuthEvents {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AuthChanged> {
        self.sender.subscribe()
    }

    /// Returns how many listeners received the notification.
    pub fn notify(&self) -> usize {
        self.sender.send(AuthChanged).unwrap_or(0)
    }
}

impl Default for AuthEvents {
    fn default() -> Self {
        Self::new()
    }
}
