//! Typed operations against the trust management API.
//!
//! # Design
//! Every operation follows the same pipeline: validate the caller's options
//! against their shape (failing before any I/O), execute through the
//! `TransportCore`, then validate the decoded body against the expected
//! output shape. A body that does not match is a contract mismatch and
//! surfaces as `ValidationError`, distinct from transport failures, which
//! pass through unchanged as `FetchError`.
//!
//! The one deliberate exception is `get_current_user`: a 401 there is the
//! normal "nobody is logged in" answer and becomes `Ok(None)`.

use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};

use crate::config::ClientConfig;
use crate::error::{FetchError, Result, ValidationError};
use crate::http::{HttpMethod, Transport};
use crate::schema::{validate_input, Schema};
use crate::session::{AuthState, Session};
use crate::transport::{RequestOptions, TransportCore};
use crate::types::{
    DomainFilter, EntityConfig, EntityStatement, Envelope, FetchConfigOptions, LoginOptions, Pagination, Subordinate,
    SubordinateCreateOptions, SubordinateUpdateOptions, TrustMark, TrustMarkCreateOptions, TrustMarkType,
    TrustMarkTypeCreateOptions, TrustMarkTypeUpdateOptions, TrustMarkUpdateOptions, User,
};

const OUTPUT_MISMATCH: &str = "Failed to validate data";

/// Async client for the trust management API.
#[derive(Debug)]
pub struct AdminClient<T> {
    core: TransportCore<T>,
}

impl<T: Transport> AdminClient<T> {
    /// Creates a client with a fresh session.
    pub fn new(config: ClientConfig, transport: T) -> Self {
        Self::with_session(config, transport, Arc::new(Session::new()))
    }

    pub fn with_session(config: ClientConfig, transport: T, session: Arc<Session>) -> Self {
        Self {
            core: TransportCore::new(config, session, transport),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        self.core.config()
    }

    pub fn session(&self) -> &Arc<Session> {
        self.core.session()
    }

    #[cfg(test)]
    pub(crate) fn core_transport(&self) -> &T {
        self.core.transport()
    }

    /// Raw access to the transport core for endpoints without a typed
    /// wrapper.
    pub async fn execute(&self, method: HttpMethod, path: &str, options: RequestOptions) -> Result<Value, FetchError> {
        self.core.execute(method, path, options).await
    }

    // -----------------------------------------------------------------------
    // Session and auth
    // -----------------------------------------------------------------------

    /// Asks the service to set the CSRF cookie. No-op once it succeeded.
    ///
    /// Serialized with the navigation guard's session initialization, so
    /// concurrent callers share one request.
    pub async fn init_csrf(&self) -> Result<()> {
        let _init = self.session().init_lock().await;
        self.prime_csrf().await
    }

    /// `init_csrf` for callers already holding the session's init lock.
    pub(crate) async fn prime_csrf(&self) -> Result<()> {
        if self.session().csrf_primed() {
            return Ok(());
        }
        self.request(HttpMethod::Get, "/auth/csrf", RequestOptions::default()).await?;
        self.session().mark_csrf_primed();
        Ok(())
    }

    pub async fn login(&self, options: &LoginOptions) -> Result<User> {
        let body = check_input(options, "Failed to validate login options")?;
        let user: User = self.send(HttpMethod::Post, "/auth/login", RequestOptions::with_body(body)).await?;
        self.session().set_auth_state(AuthState::Authenticated);
        info!(username = %user.username, "logged in");
        Ok(user)
    }

    /// Ends the server session. The cached auth state is reset even when the
    /// request fails, so the next guarded navigation asks again.
    pub async fn logout(&self) -> Result<()> {
        let result = self.request(HttpMethod::Post, "/auth/logout", RequestOptions::default()).await;
        self.session().reset_auth();
        result?;
        info!("logged out");
        Ok(())
    }

    /// Returns the logged-in user, or `None` when the service answers 401.
    pub async fn get_current_user(&self) -> Result<Option<User>> {
        match self.core.execute(HttpMethod::Get, "/auth/me", RequestOptions::default()).await {
            Ok(value) => Ok(Some(check_output(value)?)),
            Err(err) if err.is_unauthorized() => Ok(None),
            Err(err) => {
                warn!(error = %err, "current user lookup failed");
                Err(err.into())
            }
        }
    }

    // -----------------------------------------------------------------------
    // Trust mark types
    // -----------------------------------------------------------------------

    pub async fn create_trust_mark_type(&self, options: &TrustMarkTypeCreateOptions) -> Result<TrustMarkType> {
        let body = check_input(options, "Failed to validate trustmark type creation options")?;
        self.send(HttpMethod::Post, "/trustmarktypes", RequestOptions::with_body(body)).await
    }

    pub async fn list_trust_mark_types(&self, page: Option<Pagination>) -> Result<Envelope<TrustMarkType>> {
        self.send(HttpMethod::Get, "/trustmarktypes", paginated(RequestOptions::default(), page)).await
    }

    pub async fn get_trust_mark_type(&self, id: u64) -> Result<TrustMarkType> {
        self.send(HttpMethod::Get, &format!("/trustmarktypes/{id}"), RequestOptions::default()).await
    }

    pub async fn update_trust_mark_type(&self, id: u64, options: &TrustMarkTypeUpdateOptions) -> Result<TrustMarkType> {
        let body = check_input(options, "Failed to validate trustmark type update options")?;
        self.send(HttpMethod::Put, &format!("/trustmarktypes/{id}"), RequestOptions::with_body(body)).await
    }

    // -----------------------------------------------------------------------
    // Trust marks
    // -----------------------------------------------------------------------

    pub async fn create_trust_mark(&self, options: &TrustMarkCreateOptions) -> Result<TrustMark> {
        let body = check_input(options, "Failed to validate trustmark creation options")?;
        self.send(HttpMethod::Post, "/trustmarks", RequestOptions::with_body(body)).await
    }

    pub async fn list_trust_marks(&self, page: Option<Pagination>) -> Result<Envelope<TrustMark>> {
        self.send(HttpMethod::Get, "/trustmarks", paginated(RequestOptions::default(), page)).await
    }

    /// Lists the trust marks issued for `domain`.
    pub async fn list_trust_marks_by_domain(
        &self,
        domain: &str,
        page: Option<Pagination>,
    ) -> Result<Envelope<TrustMark>> {
        let filter = DomainFilter {
            domain: domain.to_string(),
        };
        let body = check_input(&filter, "Failed to validate trustmark domain filter")?;
        self.send(HttpMethod::Post, "/trustmarks/list", paginated(RequestOptions::with_body(body), page)).await
    }

    pub async fn get_trust_mark(&self, id: u64) -> Result<TrustMark> {
        self.send(HttpMethod::Get, &format!("/trustmarks/{id}"), RequestOptions::default()).await
    }

    pub async fn update_trust_mark(&self, id: u64, options: &TrustMarkUpdateOptions) -> Result<TrustMark> {
        let body = check_input(options, "Failed to validate trustmark update options")?;
        self.send(HttpMethod::Put, &format!("/trustmarks/{id}"), RequestOptions::with_body(body)).await
    }

    /// Re-signs the mark; the service computes the new expiry.
    pub async fn renew_trust_mark(&self, id: u64) -> Result<TrustMark> {
        self.send(HttpMethod::Post, &format!("/trustmarks/{id}/renew"), RequestOptions::default()).await
    }

    // -----------------------------------------------------------------------
    // Subordinates
    // -----------------------------------------------------------------------

    pub async fn create_subordinate(&self, options: &SubordinateCreateOptions) -> Result<Subordinate> {
        let body = check_input(options, "Failed to validate subordinate creation options")?;
        self.send(HttpMethod::Post, "/subordinates", RequestOptions::with_body(body)).await
    }

    pub async fn list_subordinates(&self, page: Option<Pagination>) -> Result<Envelope<Subordinate>> {
        self.send(HttpMethod::Get, "/subordinates", paginated(RequestOptions::default(), page)).await
    }

    pub async fn get_subordinate(&self, id: u64) -> Result<Subordinate> {
        self.send(HttpMethod::Get, &format!("/subordinates/{id}"), RequestOptions::default()).await
    }

    pub async fn update_subordinate(&self, id: u64, options: &SubordinateUpdateOptions) -> Result<Subordinate> {
        let body = check_input(options, "Failed to validate subordinate update options")?;
        self.send(HttpMethod::Put, &format!("/subordinates/{id}"), RequestOptions::with_body(body)).await
    }

    pub async fn renew_subordinate(&self, id: u64) -> Result<Subordinate> {
        self.send(HttpMethod::Post, &format!("/subordinates/{id}/renew"), RequestOptions::default()).await
    }

    /// Has the service fetch and verify the entity configuration published
    /// at `url`.
    pub async fn fetch_entity_config(&self, url: &str) -> Result<EntityConfig> {
        let options = FetchConfigOptions { url: url.to_string() };
        let body = check_input(&options, "Failed to validate entity configuration url")?;
        self.send(HttpMethod::Post, "/subordinates/fetch-config", RequestOptions::with_body(body)).await
    }

    // -----------------------------------------------------------------------
    // Server maintenance
    // -----------------------------------------------------------------------

    /// Re-signs the trust anchor's own entity statement.
    pub async fn regenerate_entity(&self) -> Result<EntityStatement> {
        self.send(HttpMethod::Post, "/server/entity", RequestOptions::default()).await
    }

    /// Publishes retired signing keys alongside the current ones.
    pub async fn sync_historical_keys(&self) -> Result<()> {
        self.request(HttpMethod::Post, "/server/historical_keys", RequestOptions::default())
            .await?;
        Ok(())
    }

    async fn send<O: Schema>(&self, method: HttpMethod, path: &str, options: RequestOptions) -> Result<O> {
        let value = self.request(method, path, options).await?;
        Ok(check_output(value)?)
    }

    async fn request(&self, method: HttpMethod, path: &str, options: RequestOptions) -> Result<Value, FetchError> {
        self.core.execute(method, path, options).await.inspect_err(|err| {
            warn!(%method, path, status = ?err.status(), kind = err.kind().as_str(), "request failed");
        })
    }
}

fn paginated(mut options: RequestOptions, page: Option<Pagination>) -> RequestOptions {
    if let Some(page) = page {
        if let Some(limit) = page.limit {
            options = options.filter("limit", limit);
        }
        if let Some(offset) = page.offset {
            options = options.filter("offset", offset);
        }
    }
    options
}

fn check_input<I: Schema>(input: &I, message: &str) -> Result<Value, ValidationError> {
    validate_input(input).map_err(|issues| {
        warn!(shape = I::NAME, issues = issues.len(), "rejected input");
        ValidationError::new(message, issues)
    })
}

fn check_output<O: Schema>(value: Value) -> Result<O, ValidationError> {
    O::validate(&value).map_err(|issues| {
        warn!(shape = O::NAME, ?issues, "response does not match schema");
        ValidationError::new(OUTPUT_MISMATCH, issues)
    })
}
