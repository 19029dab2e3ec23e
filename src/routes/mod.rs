//! Route Module Index
//!
//! Client-side navigation: the static route table, the guard deciding whether a
//! destination may be shown, and the in-process router that applies those
//! decisions to its history.

use std::sync::Arc;

use crate::session::Right;

pub mod guard;
pub mod router;

pub use guard::{GuardDecision, RouteGuard};
pub use router::{ClientRouter, Navigation, NavigationStep};

/// The login view. Reachable without a session.
pub const LOGIN_PATH: &str = "/login";
/// Landing page used when no right-specific page is reachable.
pub const HOME_PATH: &str = "/";

/// Navigator
///
/// The navigation surface the response interceptor drives on logout.
pub trait Navigator: Send + Sync {
    fn current_path(&self) -> String;
    /// Replaces the current history entry with `path`.
    fn replace(&self, path: &str);
}

pub type NavigatorState = Arc<dyn Navigator>;

/// RouteDescriptor
///
/// One entry of the route table. `view` identifies the component the host renders;
/// it is opaque here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteDescriptor {
    pub path: String,
    pub name: Option<String>,
    pub required_right: Option<Right>,
    pub view: String,
}

impl RouteDescriptor {
    pub fn new(path: &str, view: impl Into<String>) -> Self {
        Self {
            path: normalize_path(path),
            name: None,
            required_right: None,
            view: view.into(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn requires(mut self, right: Right) -> Self {
        self.required_right = Some(right);
        self
    }

    pub fn is_login(&self) -> bool {
        self.path == LOGIN_PATH
    }
}

/// RouteTable
///
/// Ordered route list. Order matters: the first route requiring a right is that
/// right's landing page.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<RouteDescriptor>,
}

impl RouteTable {
    pub fn new(routes: Vec<RouteDescriptor>) -> Self {
        Self { routes }
    }

    /// The portal's routes, grouped by the right that opens them.
    pub fn portal() -> Self {
        Self::new(vec![
            RouteDescriptor::new(HOME_PATH, "Home").named("home"),
            RouteDescriptor::new(LOGIN_PATH, "auth/AppLogin").named("login"),
            RouteDescriptor::new("/students", "students/TableStudent").requires(Right::Students),
            RouteDescriptor::new("/teachers", "teachers/TableTeachers").requires(Right::Teachers),
            RouteDescriptor::new("/contracts", "contracts/TableContracts")
                .requires(Right::Contracts),
            RouteDescriptor::new("/equipment/os", "equipment/os/TableOS")
                .requires(Right::Equipment),
            RouteDescriptor::new("/equipment/mz-tech", "equipment/mz/TableMZ")
                .requires(Right::Equipment),
            RouteDescriptor::new("/equipment/mz-hoz", "equipment/mz/TableMZHOZ")
                .requires(Right::Equipment),
            RouteDescriptor::new("/analysis/os", "analysis/AnalizBD").requires(Right::Analysis),
            RouteDescriptor::new("/analysis/os-archive", "analysis/AnalizBDarhiv")
                .requires(Right::Analysis),
            RouteDescriptor::new("/analysis/mz-off", "analysis/AnalizMZ")
                .requires(Right::Analysis),
            RouteDescriptor::new("/analysis/mz-off-archive", "analysis/AnalizMZarhiv")
                .requires(Right::Analysis),
            RouteDescriptor::new("/analysis/mol", "analysis/PerecMOL").requires(Right::Analysis),
            RouteDescriptor::new("/analysis/filials", "analysis/TableFil")
                .requires(Right::Analysis),
        ])
    }

    pub fn resolve(&self, path: &str) -> Option<&RouteDescriptor> {
        let path = normalize_path(path);
        self.routes.iter().find(|route| route.path == path)
    }

    pub fn first_requiring(&self, right: Right) -> Option<&RouteDescriptor> {
        self.routes
            .iter()
            .find(|route| route.required_right == Some(right))
    }

    pub fn routes(&self) -> &[RouteDescriptor] {
        &self.routes
    }
}

/// Strips query and fragment, forces a leading slash and drops a trailing one.
pub fn normalize_path(path: &str) -> String {
    let path = path.split(['?', '#']).next().unwrap_or_default();
    let trimmed = path.trim().trim_end_matches('/');
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}
