//! Route admission.
//!
//! `admit` is a pure function of the session state, the loading flag and the route's
//! access rule. It is re-evaluated on every navigation; nothing here caches a decision,
//! since the 401 handler can drop the session between two navigations.

use parking_lot::Mutex;
use tracing::{debug, info};

use super::profile::{Role, UserProfile};
use super::session::{SessionCell, SessionState};

pub const ROOT_PATH: &str = "/";
pub const LOGIN_PATH: &str = "/login";
pub const REGISTER_PATH: &str = "/register";
pub const CITIZEN_HOME: &str = "/citizen/dashboard";
pub const OFFICER_HOME: &str = "/officer/dashboard";

const CITIZEN_ONLY: &[Role] = &[Role::Citizen];
const STAFF_ONLY: &[Role] = &[Role::Officer, Role::Admin];

// Upper bound on redirect chains; the route table resolves in at most two hops.
const MAX_REDIRECTS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Login,
    Register,
    CitizenDashboard,
    OfficerDashboard,
    Root,
    Unmatched,
}

/// What a route requires before it may render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Login/register: only for anonymous users.
    Public,
    /// Requires an authenticated user whose role is in the set.
    Protected(&'static [Role]),
    /// Never renders; always sends the user to their home (or to login).
    RedirectOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteDecision {
    /// Session restoration still running; render nothing yet.
    Pending,
    Render,
    RedirectLogin,
    RedirectHome(&'static str),
}

impl RouteDecision {
    pub fn redirect_target(&self) -> Option<&'static str> {
        match self {
            RouteDecision::RedirectLogin => Some(LOGIN_PATH),
            RouteDecision::RedirectHome(p) => Some(*p),
            RouteDecision::Pending | RouteDecision::Render => None,
        }
    }
}

impl Route {
    pub fn parse(path: &str) -> Route {
        let p = path.split(['?', '#']).next().unwrap_or("");
        let p = if p.len() > 1 { p.trim_end_matches('/') } else { p };
        match p {
            "" | ROOT_PATH => Route::Root,
            LOGIN_PATH => Route::Login,
            REGISTER_PATH => Route::Register,
            CITIZEN_HOME => Route::CitizenDashboard,
            OFFICER_HOME => Route::OfficerDashboard,
            _ => Route::Unmatched,
        }
    }

    pub fn access(&self) -> Access {
        match self {
            Route::Login | Route::Register => Access::Public,
            Route::CitizenDashboard => Access::Protected(CITIZEN_ONLY),
            Route::OfficerDashboard => Access::Protected(STAFF_ONLY),
            Route::Root | Route::Unmatched => Access::RedirectOnly,
        }
    }
}

/// Dashboard a role lands on.
pub fn home_path(role: Role) -> &'static str {
    match role {
        Role::Citizen => CITIZEN_HOME,
        Role::Officer | Role::Admin => OFFICER_HOME,
    }
}

pub fn admit(state: &SessionState, loading: bool, route: Route) -> RouteDecision {
    admit_access(state.user(), loading, route.access())
}

pub fn admit_access(user: Option<&UserProfile>, loading: bool, access: Access) -> RouteDecision {
    if loading {
        return RouteDecision::Pending;
    }
    match (access, user) {
        (Access::Protected(_), None) => RouteDecision::RedirectLogin,
        (Access::Protected(roles), Some(u)) => {
            if roles.contains(&u.role) { RouteDecision::Render } else { RouteDecision::RedirectHome(home_path(u.role)) }
        }
        (Access::Public, Some(u)) => RouteDecision::RedirectHome(home_path(u.role)),
        (Access::Public, None) => RouteDecision::Render,
        (Access::RedirectOnly, Some(u)) => RouteDecision::RedirectHome(home_path(u.role)),
        (Access::RedirectOnly, None) => RouteDecision::RedirectLogin,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigation {
    pub requested: String,
    /// Where the user ended up after following redirects.
    pub path: String,
    pub decision: RouteDecision,
    pub redirects: usize,
}

/// Current location plus redirect resolution against the live session.
#[derive(Debug)]
pub struct Navigator {
    current: Mutex<String>,
}

impl Default for Navigator {
    fn default() -> Self { Self { current: Mutex::new(ROOT_PATH.to_string()) } }
}

impl Navigator {
    pub fn new() -> Self { Self::default() }

    pub fn current(&self) -> String { self.current.lock().clone() }

    /// Unconditional jump, used when the session is dropped out from under the user.
    pub fn force(&self, path: &str) {
        info!(target: "session", "forced navigation to {}", path);
        *self.current.lock() = path.to_string();
    }

    pub fn navigate(&self, cell: &SessionCell, path: &str) -> Navigation {
        let (state, loading) = cell.snapshot();
        let mut at = path.to_string();
        let mut redirects = 0usize;
        let decision = loop {
            let d = admit(&state, loading, Route::parse(&at));
            match d.redirect_target() {
                Some(next) if redirects < MAX_REDIRECTS => {
                    debug!(target: "session", "route {} -> {}", at, next);
                    at = next.to_string();
                    redirects += 1;
                }
                _ => break d,
            }
        };
        *self.current.lock() = at.clone();
        Navigation { requested: path.to_string(), path: at, decision, redirects }
    }
}
