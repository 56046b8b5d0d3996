//! Typed async client core for a federation trust management service.
//!
//! # Overview
//! Builds requests for the service's admin API, executes them through a
//! host-provided `Transport`, and validates every payload in both
//! directions against runtime shape descriptors. A `NavigationGuard` built
//! on the same client gates route transitions on the session's auth state.
//!
//! # Design
//! - Host-does-IO: the core produces `HttpRequest` values and consumes
//!   `HttpResponse` values; it never opens a socket.
//! - `Session` is explicit, shared state (cookie jar, CSRF flag, auth cache),
//!   injected into both the client and the guard.
//! - Errors are a closed tagged union: `AdminError::Validation` for contract
//!   violations, `AdminError::Fetch` for classified transport failures.
//! - DTOs are defined independently from the mock-server crate; integration
//!   tests catch schema drift.

pub mod client;
pub mod config;
pub mod error;
pub mod guard;
pub mod http;
pub mod schema;
pub mod session;
pub mod transport;
pub mod types;

#[cfg(test)]
mod testing;

pub use client::AdminClient;
pub use config::{ClientConfig, ConfigError};
pub use error::{AdminError, FetchError, FetchErrorKind, Result, ValidationError};
pub use guard::{decide, GuardRoutes, NavigationDecision, NavigationGuard, RouteTarget};
pub use http::{HttpMethod, HttpRequest, HttpResponse, Transport, TransportError};
pub use schema::{Schema, ValidationIssue};
pub use session::{AuthState, Session};
pub use transport::{build_request, parse_response, FilterValue, RequestOptions, TransportCore};
pub use types::{
    DomainFilter, EntityConfig, EntityStatement, Envelope, FetchConfigOptions, JsonObject, LoginOptions, Pagination,
    Subordinate, SubordinateCreateOptions, SubordinateUpdateOptions, TrustMark, TrustMarkCreateOptions, TrustMarkType,
    TrustMarkTypeCreateOptions, TrustMarkTypeUpdateOptions, TrustMarkUpdateOptions, User,
};
