use std::sync::Arc;

use tokio::{sync::broadcast::error::RecvError, task::JoinHandle};

// --- Module Structure ---

pub mod config;
pub mod endpoint;
pub mod error;
pub mod events;
pub mod pipeline;
pub mod request;
pub mod session;
pub mod transport;

// Client-side navigation: route table, guard, router.
pub mod routes;

// --- Public Re-exports ---

pub use config::{Env, GateConfig};
pub use error::{ApiError, TransportFailure};
pub use events::{AuthChanged, AuthEvents};
pub use pipeline::{ApiClient, InterceptorLayer, RequestInterceptor, ResponseInterceptor};
pub use request::{ApiRequest, ApiResponse, FormPart, RequestBody};
pub use routes::{ClientRouter, GuardDecision, RouteGuard, RouteTable};
pub use session::{FileSessionStore, MemorySessionStore, Right, SessionRecord, SessionState};

/// AppState
///
/// Everything the hosting application needs, wired together. The API client and the
/// router never call each other: they share the session store, and the router is
/// the navigator the 401 handler drives.
#[derive(Clone)]
pub struct AppState {
    pub config: GateConfig,
    pub session: SessionState,
    pub events: AuthEvents,
    pub router: Arc<ClientRouter>,
    pub client: ApiClient,
}

impl AppState {
    pub fn build(config: GateConfig, session: SessionState) -> Result<Self, reqwest::Error> {
        let events = AuthEvents::new();
        let guard = RouteGuard::new(session.clone(), Arc::new(RouteTable::portal()));
        let router = Arc::new(ClientRouter::new(guard));
        let client = ApiClient::new(&config, session.clone(), events.clone(), router.clone())?;

        Ok(Self {
            config,
            session,
            events,
            router,
            client,
        })
    }
}

/// watch_auth_changes
///
/// Re-guards the router's current location every time the session is invalidated.
/// The task ends when every [`AuthEvents`] handle has been dropped.
pub fn watch_auth_changes(events: &AuthEvents, router: Arc<ClientRouter>) -> JoinHandle<()> {
    let mut receiver = events.subscribe();
    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(AuthChanged) => {
                    router.revalidate();
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "auth listener lagged; revalidating once");
                    router.revalidate();
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}
