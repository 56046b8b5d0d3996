//! Request construction and outcome classification.
//!
//! # Design
//! `TransportCore` owns everything between a typed client call and the
//! host's `Transport`: target normalization, query encoding, header
//! assembly (cookies, CSRF), and turning every possible outcome into either a
//! decoded JSON value or a classified `FetchError`. `build_request` and
//! `parse_response` are pure so they can be checked without any network;
//! `execute` glues them to the host transport and the session cookie jar.

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::debug;
use url::Url;

use crate::config::ClientConfig;
use crate::error::FetchError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse, Transport};
use crate::session::Session;

/// A primitive query filter value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterValue {
    Str(String),
    Int(i64),
    Bool(bool),
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterValue::Str(s) => f.write_str(s),
            FilterValue::Int(n) => write!(f, "{n}"),
            FilterValue::Bool(b) => write!(f, "{b}"),
        }
    }
}

impl From<&str> for FilterValue {
    fn from(value: &str) -> Self {
        FilterValue::Str(value.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(value: String) -> Self {
        FilterValue::Str(value)
    }
}

impl From<i64> for FilterValue {
    fn from(value: i64) -> Self {
        FilterValue::Int(value)
    }
}

impl From<u32> for FilterValue {
    fn from(value: u32) -> Self {
        FilterValue::Int(i64::from(value))
    }
}

impl From<bool> for FilterValue {
    fn from(value: bool) -> Self {
        FilterValue::Bool(value)
    }
}

/// Optional parts of a request.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    pub body: Option<Value>,
    /// Appended to the URL as query parameters, in order.
    pub filters: Vec<(String, FilterValue)>,
    /// Extra headers, sent after the standard ones.
    pub headers: Vec<(String, String)>,
}

impl RequestOptions {
    pub fn with_body(body: Value) -> Self {
        Self {
            body: Some(body),
            ..Self::default()
        }
    }

    pub fn filter(mut self, key: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        self.filters.push((key.into(), value.into()));
        self
    }
}

/// Places `path` under the versioned API prefix of `base`.
///
/// All leading and trailing slashes of `path` are dropped first, so `"x"`,
/// `"/x"`, `"x/"` and `"//x//"` all resolve to the same target.
pub fn api_url(base: &Url, prefix: &str, path: &str, filters: &[(String, FilterValue)]) -> Url {
    let mut url = base.clone();
    url.set_fragment(None);
    url.set_query(None);
    url.set_path(&format!("/{}/{}", prefix.trim_matches('/'), path.trim_matches('/')));
    if !filters.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in filters {
            pairs.append_pair(key, &value.to_string());
        }
    }
    url
}

/// Builds the wire request for `method path` from the current session.
///
/// `path` is a bare resource path. Query parameters go through
/// `RequestOptions::filters`; a path containing `?` or `#` is rejected.
pub fn build_request(
    config: &ClientConfig,
    session: &Session,
    method: HttpMethod,
    path: &str,
    options: &RequestOptions,
) -> Result<HttpRequest, FetchError> {
    if path.contains(['?', '#']) {
        return Err(FetchError::unknown(format!(
            "request path {path:?} must not carry a query or fragment, pass query parameters as filters"
        )));
    }
    let url = api_url(config.api_url(), config.api_prefix(), path, &options.filters);

    let mut headers = vec![("Accept".to_string(), "application/json".to_string())];
    if let Some(cookie) = session.cookie_header() {
        headers.push(("Cookie".to_string(), cookie));
    }
    if method.is_unsafe() {
        headers.push(("Content-Type".to_string(), "application/json".to_string()));
        if let Some(token) = session.cookie(config.csrf_cookie()) {
            headers.push((config.csrf_header().to_string(), token));
        }
    }
    headers.extend(options.headers.iter().cloned());

    let body = options
        .body
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| FetchError::unknown(e.to_string()))?;

    Ok(HttpRequest {
        method,
        url: url.into(),
        headers,
        body,
    })
}

/// Decodes a response body or classifies the failure.
///
/// An empty body decodes to `{}`. A non-2xx status always yields a
/// `FetchError` carrying the status and, when the body is a JSON object
/// with a string `message`, that message.
pub fn parse_response(response: &HttpResponse) -> Result<Value, FetchError> {
    let decoded = if response.body.trim().is_empty() {
        Ok(Value::Object(Map::new()))
    } else {
        serde_json::from_str::<Value>(&response.body)
    };

    if !response.is_success() {
        let message = decoded
            .ok()
            .as_ref()
            .and_then(|body| body.get("message"))
            .and_then(Value::as_str)
            .map(str::to_string);
        return Err(FetchError::from_status(response.status, message));
    }

    decoded.map_err(|e| FetchError::unknown(format!("invalid JSON in response body: {e}")))
}

/// Executes requests for an `AdminClient` through a host `Transport`.
#[derive(Debug)]
pub struct TransportCore<T> {
    config: ClientConfig,
    session: Arc<Session>,
    transport: T,
}

impl<T: Transport> TransportCore<T> {
    pub fn new(config: ClientConfig, session: Arc<Session>, transport: T) -> Self {
        Self {
            config,
            session,
            transport,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.session
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Sends one request and returns the decoded body. Fails only with
    /// `FetchError`.
    pub async fn execute(&self, method: HttpMethod, path: &str, options: RequestOptions) -> Result<Value, FetchError> {
        let request = build_request(&self.config, &self.session, method, path, &options)?;
        debug!(method = %request.method, url = %request.url, "sending request");

        let result = match self.transport.send(request).await {
            Ok(response) => {
                for cookie in response.header_values("set-cookie") {
                    self.session.store_set_cookie(cookie);
                }
                parse_response(&response)
            }
            Err(e) => Err(FetchError::unknown(e.to_string())),
        };

        if let Err(err) = &result {
            debug!(
                %method,
                path,
                status = ?err.status(),
                kind = err.kind().as_str(),
                message = err.message(),
                "request failed"
            );
        }
        result
    }
}
