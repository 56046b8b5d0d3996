//! Session state shared by the client and the navigation guard.
//!
//! # Design
//! A `Session` is created once per application lifetime and handed to both
//! the `AdminClient` (which reads and writes cookies and flags) and the
//! `NavigationGuard` (which resolves the auth state). Nothing here is
//! persisted; dropping the session is equivalent to a page reload.
//!
//! Plain state sits behind a `std::sync::Mutex` whose critical sections never
//! span an `.await`. Initialization (CSRF priming plus the first current-user
//! lookup) is serialized by a separate async mutex so concurrent first
//! navigations share one resolution instead of racing.

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, MutexGuard as AsyncMutexGuard};

/// Cached answer to "is somebody logged in?".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthState {
    /// Not resolved yet, or reset by logout.
    #[default]
    Unknown,
    Authenticated,
    Unauthenticated,
}

impl AuthState {
    pub fn is_authenticated(self) -> bool {
        self == AuthState::Authenticated
    }
}

#[derive(Debug, Default)]
struct SessionState {
    csrf_primed: bool,
    auth: AuthState,
    /// Bumped on every explicit auth change.
    auth_generation: u64,
    cookies: BTreeMap<String, String>,
}

#[derive(Debug, Default)]
pub struct Session {
    state: Mutex<SessionState>,
    init: AsyncMutex<()>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts with cookies the host already holds.
    pub fn with_cookies<I, K, V>(cookies: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let session = Self::new();
        {
            let mut state = session.lock();
            state
                .cookies
                .extend(cookies.into_iter().map(|(k, v)| (k.into(), v.into())));
        }
        session
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn csrf_primed(&self) -> bool {
        self.lock().csrf_primed
    }

    pub(crate) fn mark_csrf_primed(&self) {
        self.lock().csrf_primed = true;
    }

    pub fn auth_state(&self) -> AuthState {
        self.lock().auth
    }

    pub fn set_auth_state(&self, auth: AuthState) {
        let mut state = self.lock();
        state.auth = auth;
        state.auth_generation += 1;
    }

    /// Forgets the cached auth state so the next guarded navigation
    /// resolves it again.
    pub fn reset_auth(&self) {
        self.set_auth_state(AuthState::Unknown);
    }

    /// Current auth generation. Take it before a lookup and hand it back to
    /// `settle_auth` afterwards.
    pub(crate) fn auth_generation(&self) -> u64 {
        self.lock().auth_generation
    }

    /// Stores a looked-up auth state unless login or logout changed the
    /// state since `generation` was read. Returns the state now in effect.
    pub(crate) fn settle_auth(&self, generation: u64, resolved: AuthState) -> AuthState {
        let mut state = self.lock();
        if state.auth_generation == generation {
            state.auth = resolved;
            state.auth_generation += 1;
        }
        state.auth
    }

    pub fn cookie(&self, name: &str) -> Option<String> {
        self.lock().cookies.get(name).cloned()
    }

    /// `Cookie` request header value, or `None` when the jar is empty.
    pub fn cookie_header(&self) -> Option<String> {
        let state = self.lock();
        if state.cookies.is_empty() {
            return None;
        }
        let pairs: Vec<String> = state.cookies.iter().map(|(k, v)| format!("{k}={v}")).collect();
        Some(pairs.join("; "))
    }

    /// Applies one `Set-Cookie` response header. Attributes other than
    /// `Max-Age=0` are ignored; an empty value also deletes the cookie.
    pub fn store_set_cookie(&self, header: &str) {
        let mut parts = header.split(';');
        let Some((name, value)) = parts.next().and_then(|pair| pair.split_once('=')) else {
            return;
        };
        let name = name.trim();
        if name.is_empty() {
            return;
        }
        let value = value.trim().trim_matches('"');
        let expired = parts.any(|attr| {
            attr.split_once('=')
                .is_some_and(|(k, v)| k.trim().eq_ignore_ascii_case("max-age") && v.trim() == "0")
        });

        let mut state = self.lock();
        if expired || value.is_empty() {
            state.cookies.remove(name);
        } else {
            state.cookies.insert(name.to_string(), value.to_string());
        }
    }

    /// Waits for exclusive right to run session initialization.
    pub(crate) async fn init_lock(&self) -> AsyncMutexGuard<'_, ()> {
        self.init.lock().await
    }
}
