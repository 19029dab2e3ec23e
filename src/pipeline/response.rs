use std::sync::{Arc, Mutex, PoisonError};

use reqwest::StatusCode;

use crate::{
    error::{ApiError, TransportFailure},
    events::AuthEvents,
    routes::{LOGIN_PATH, NavigatorState},
    session::SessionState,
};

/// ResponseInterceptor
///
/// Sees the terminal failure of every call. A 401 logs the user out (clear
/// session, notify listeners, send the UI to the login route); every failure is
/// normalized into an [`ApiError`] and handed back to the caller.
#[derive(Clone)]
pub struct ResponseInterceptor {
    session: SessionState,
    events: AuthEvents,
    navigator: NavigatorState,
    // Serializes check-then-redirect so concurrent 401s redirect once.
    redirect_lock: Arc<Mutex<()>>,
}

impl ResponseInterceptor {
    pub fn new(session: SessionState, events: AuthEvents, navigator: NavigatorState) -> Self {
        Self {
            session,
            events,
            navigator,
            redirect_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn on_error(&self, failure: TransportFailure) -> ApiError {
        if failure.status() == Some(StatusCode::UNAUTHORIZED) {
            self.invalidate_session();
        }

        let error = ApiError::from_failure(&failure);
        tracing::debug!(status = ?error.status, message = %error.message, "request failed");
        error
    }

    fn invalidate_session(&self) {
        self.session.clear_session();
        let listeners = self.events.notify();
        tracing::info!(listeners, "session rejected by server; logged out");

        let _guard = self
            .redirect_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if self.navigator.current_path() != LOGIN_PATH {
            tracing::info!(to = LOGIN_PATH, "redirecting to login");
            self.navigator.replace(LOGIN_PATH);
        }
    }
}
