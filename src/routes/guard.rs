use std::sync::Arc;

use crate::{
    routes::{HOME_PATH, LOGIN_PATH, RouteDescriptor, RouteTable},
    session::{Right, Rights, SessionRecord, SessionState},
};

/// Outcome of evaluating one navigation attempt. Redirects always replace the
/// pending history entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    Proceed,
    RedirectToLogin,
    RedirectToFallback(String),
}

impl GuardDecision {
    pub fn redirect_target(&self) -> Option<&str> {
        match self {
            GuardDecision::Proceed => None,
            GuardDecision::RedirectToLogin => Some(LOGIN_PATH),
            GuardDecision::RedirectToFallback(path) => Some(path),
        }
    }
}

/// RouteGuard
///
/// Decides, before a view mounts, whether the current session may see it.
/// Authorization failures are routing decisions, never errors.
///
/// The decision depends only on the destination and the stored session, so
/// evaluating the same pair twice gives the same answer.
#[derive(Clone)]
pub struct RouteGuard {
    session: SessionState,
    routes: Arc<RouteTable>,
}

impl RouteGuard {
    pub fn new(session: SessionState, routes: Arc<RouteTable>) -> Self {
        Self { session, routes }
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    pub fn evaluate(&self, destination: &RouteDescriptor) -> GuardDecision {
        let session = self.session.read_session();
        let authenticated = session.as_ref().is_some_and(SessionRecord::is_authenticated);

        if !destination.is_login() && !authenticated {
            return GuardDecision::RedirectToLogin;
        }

        let rights = session.map(|s| s.rights).unwrap_or_default();
        let denied = destination
            .required_right
            .is_some_and(|right| !rights.grants(right));

        if !(destination.is_login() && authenticated) && !denied {
            return GuardDecision::Proceed;
        }

        let target = self.first_allowed_path(&rights);
        if target == destination.path {
            // Nothing better is reachable; redirecting here again would cycle.
            tracing::debug!(path = %target, "redirect target equals destination; proceeding");
            return GuardDecision::Proceed;
        }

        tracing::debug!(from = %destination.path, to = %target, "redirecting to first allowed page");
        GuardDecision::RedirectToFallback(target)
    }

    /// The landing page of the highest-priority granted right, or home.
    pub fn first_allowed_path(&self, rights: &Rights) -> String {
        rights
            .granted()
            .find_map(|right: Right| self.routes.first_requiring(right))
            .map(|route| route.path.clone())
            .unwrap_or_else(|| HOME_PATH.to_string())
    }
}
