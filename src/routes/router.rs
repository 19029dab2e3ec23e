use std::sync::{Mutex, PoisonError};

use crate::routes::{GuardDecision, HOME_PATH, Navigator, RouteGuard, normalize_path};

/// Upper bound on guard redirects followed by one navigation.
pub const MAX_REDIRECTS: usize = 5;

/// One evaluated location on the way to the settled path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationStep {
    pub path: String,
    pub decision: GuardDecision,
}

/// Navigation
///
/// Result of settling a navigation: where it ended up and how it got there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigation {
    pub path: String,
    pub trail: Vec<NavigationStep>,
}

impl Navigation {
    pub fn redirected(&self) -> bool {
        self.trail.len() > 1
    }
}

/// ClientRouter
///
/// In-process history stack. Every navigation is settled through the guard
/// before it touches the history; a redirected navigation replaces the current
/// entry instead of pushing, so going back never lands on a page that bounces.
pub struct ClientRouter {
    guard: RouteGuard,
    history: Mutex<Vec<String>>,
}

impl ClientRouter {
    /// Starts at the home route without evaluating it; call [`ClientRouter::push`]
    /// or [`ClientRouter::revalidate`] for the first guarded navigation.
    pub fn new(guard: RouteGuard) -> Self {
        Self {
            guard,
            history: Mutex::new(vec![HOME_PATH.to_string()]),
        }
    }

    /// settle
    ///
    /// Follows guard redirects from `path` until a location is allowed. Unknown
    /// paths fall through to the home route first, as the catch-all route does.
    pub fn settle(&self, path: &str) -> Navigation {
        let mut target = normalize_path(path);
        let mut trail = Vec::new();

        for _ in 0..=MAX_REDIRECTS {
            let decision = match self.guard.routes().resolve(&target) {
                Some(route) => self.guard.evaluate(route),
                None => GuardDecision::RedirectToFallback(HOME_PATH.to_string()),
            };
            let next = decision.redirect_target().map(str::to_string);
            trail.push(NavigationStep {
                path: target.clone(),
                decision,
            });

            match next {
                Some(next) => target = next,
                None => return Navigation { path: target, trail },
            }
        }

        tracing::warn!(path = %target, hops = trail.len(), "redirect limit reached; stopping");
        Navigation { path: target, trail }
    }

    pub fn push(&self, path: &str) -> Navigation {
        let navigation = self.settle(path);
        let mut history = self.lock_history();
        if navigation.redirected() {
            replace_last(&mut history, &navigation.path);
        } else {
            history.push(navigation.path.clone());
        }
        tracing::debug!(path = %navigation.path, redirected = navigation.redirected(), "navigated");
        navigation
    }

    pub fn replace_with(&self, path: &str) -> Navigation {
        let navigation = self.settle(path);
        replace_last(&mut self.lock_history(), &navigation.path);
        tracing::debug!(path = %navigation.path, "replaced location");
        navigation
    }

    /// Drops the current entry and re-guards the one underneath it.
    pub fn back(&self) -> Navigation {
        let previous = {
            let mut history = self.lock_history();
            if history.len() > 1 {
                history.pop();
            }
            history.last().cloned().unwrap_or_else(|| HOME_PATH.to_string())
        };
        self.replace_with(&previous)
    }

    /// Re-runs the guard on the current location, e.g. after the session changed.
    pub fn revalidate(&self) -> Navigation {
        let current = self.current();
        let navigation = self.settle(&current);
        if navigation.path == current {
            return navigation;
        }

        let mut history = self.lock_history();
        // A navigation that landed while settling wins over this one.
        if history.last().map(String::as_str) != Some(current.as_str()) {
            tracing::debug!(from = %current, "location changed during revalidation; keeping it");
            return navigation;
        }
        replace_last(&mut history, &navigation.path);
        tracing::info!(from = %current, to = %navigation.path, "location no longer allowed");
        navigation
    }

    pub fn current(&self) -> String {
        self.lock_history()
            .last()
            .cloned()
            .unwrap_or_else(|| HOME_PATH.to_string())
    }

    pub fn history(&self) -> Vec<String> {
        self.lock_history().clone()
    }

    fn lock_history(&self) -> std::sync::MutexGuard<'_, Vec<String>> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Navigator for ClientRouter {
    fn current_path(&self) -> String {
        self.current()
    }

    fn replace(&self, path: &str) {
        self.replace_with(path);
    }
}

fn replace_last(history: &mut Vec<String>, path: &str) {
    match history.last_mut() {
        Some(last) => *last = path.to_string(),
        None => history.push(path.to_string()),
    }
}
