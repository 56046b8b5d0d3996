//! Authentication gate consulted before every route transition.
//!
//! # Design
//! The guard is fail-closed. Routes require authentication unless they opt
//! out, and any failure while resolving the session counts as "not logged
//! in". Resolution happens at most once per session lifetime (or once per
//! logout), behind the session's init lock, so a burst of navigations at
//! startup triggers one CSRF priming and one current-user lookup between
//! them.
//!
//! Deciding is split from resolving: `decide` is a pure function of the
//! target route and the auth state.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::client::AdminClient;
use crate::http::Transport;
use crate::session::AuthState;

/// The route a navigation is heading to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteTarget {
    /// Route name, if the route table assigns one.
    pub name: Option<String>,
    /// Path plus query, preserved for the post-login redirect.
    pub full_path: String,
    /// `Some(false)` opts the route out of authentication.
    pub requires_auth: Option<bool>,
}

impl RouteTarget {
    pub fn new(name: impl Into<String>, full_path: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            full_path: full_path.into(),
            requires_auth: None,
        }
    }

    /// Marks the route as reachable without logging in.
    pub fn public(mut self) -> Self {
        self.requires_auth = Some(false);
        self
    }

    pub fn requires_auth(&self) -> bool {
        self.requires_auth != Some(false)
    }
}

/// Outcome of a guarded navigation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationDecision {
    Allow,
    /// Go to the login route; `redirect` is where to return afterwards.
    RedirectToLogin { redirect: String },
    RedirectToHome,
}

/// Names of the routes the guard redirects to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardRoutes {
    pub login: String,
    pub home: String,
}

impl Default for GuardRoutes {
    fn default() -> Self {
        Self {
            login: "login".to_string(),
            home: "home".to_string(),
        }
    }
}

/// Applies the redirect rules for a resolved auth state. `Unknown` is
/// treated like `Unauthenticated`.
pub fn decide(routes: &GuardRoutes, to: &RouteTarget, auth: AuthState) -> NavigationDecision {
    let authenticated = auth.is_authenticated();
    if to.requires_auth() && !authenticated {
        return NavigationDecision::RedirectToLogin {
            redirect: to.full_path.clone(),
        };
    }
    if authenticated && to.name.as_deref() == Some(routes.login.as_str()) {
        return NavigationDecision::RedirectToHome;
    }
    NavigationDecision::Allow
}

pub struct NavigationGuard<T> {
    client: Arc<AdminClient<T>>,
    routes: GuardRoutes,
}

impl<T: Transport> NavigationGuard<T> {
    pub fn new(client: Arc<AdminClient<T>>) -> Self {
        Self::with_routes(client, GuardRoutes::default())
    }

    pub fn with_routes(client: Arc<AdminClient<T>>, routes: GuardRoutes) -> Self {
        Self { client, routes }
    }

    pub async fn before_each(&self, to: &RouteTarget) -> NavigationDecision {
        let auth = self.resolve().await;
        let decision = decide(&self.routes, to, auth);
        debug!(target_path = %to.full_path, ?auth, ?decision, "navigation guarded");
        decision
    }

    /// Primes CSRF and resolves the auth state if not done yet.
    ///
    /// A login or logout that completes while the lookup is in flight wins
    /// over the lookup's answer.
    async fn resolve(&self) -> AuthState {
        let session = self.client.session();
        let _init = session.init_lock().await;

        if let Err(err) = self.client.prime_csrf().await {
            warn!(error = %err, "CSRF priming failed, continuing");
        }

        let auth = session.auth_state();
        if auth != AuthState::Unknown {
            return auth;
        }

        let generation = session.auth_generation();
        let resolved = match self.client.get_current_user().await {
            Ok(Some(_)) => AuthState::Authenticated,
            Ok(None) => AuthState::Unauthenticated,
            Err(err) => {
                warn!(error = %err, "could not resolve current user, treating as logged out");
                AuthState::Unauthenticated
            }
        };
        let settled = session.settle_auth(generation, resolved);
        if settled != resolved {
            debug!(?resolved, ?settled, "auth changed during lookup, keeping newer state");
        }
        settled
    }
}
