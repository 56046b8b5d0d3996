//! End-to-end lifecycle against the live mock server.
//!
//! # Design
//! Starts the mock server on a random port, then drives the client and the
//! navigation guard over real HTTP through a ureq-backed `Transport`. Cookies
//! travel only through the core's session jar, so this also checks that CSRF
//! priming, token rotation on login and session teardown work against a
//! server that enforces them.

use std::sync::Arc;

use serde_json::json;
use trustadmin_core::{
    AdminClient, AdminError, AuthState, ClientConfig, FetchErrorKind, HttpMethod, HttpRequest, HttpResponse,
    LoginOptions, NavigationDecision, NavigationGuard, Pagination, RouteTarget, SubordinateCreateOptions,
    SubordinateUpdateOptions, Transport, TransportError, TrustMarkCreateOptions, TrustMarkTypeCreateOptions,
    TrustMarkUpdateOptions,
};

const RP: &str = "https://rp.example.org";

/// Executes requests with a blocking ureq agent on the blocking pool.
///
/// ureq's status-as-error behavior is off so 4xx/5xx come back as data and
/// the core does the classification.
#[derive(Clone)]
struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    fn new() -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .new_agent();
        Self { agent }
    }
}

impl Transport for UreqTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let agent = self.agent.clone();
        let response = tokio::task::spawn_blocking(move || execute(&agent, request)).await??;
        Ok(response)
    }
}

fn with_headers<B>(mut builder: ureq::RequestBuilder<B>, headers: &[(String, String)]) -> ureq::RequestBuilder<B> {
    for (name, value) in headers {
        builder = builder.header(name, value);
    }
    builder
}

fn send_body(
    builder: ureq::RequestBuilder<ureq::typestate::WithBody>,
    body: Option<String>,
) -> Result<ureq::http::Response<ureq::Body>, ureq::Error> {
    match body {
        Some(body) => builder.send(body.as_bytes()),
        None => builder.send_empty(),
    }
}

fn execute(agent: &ureq::Agent, req: HttpRequest) -> Result<HttpResponse, ureq::Error> {
    let url = req.url.as_str();
    let mut response = match req.method {
        HttpMethod::Get => with_headers(agent.get(url), &req.headers).call()?,
        HttpMethod::Delete => with_headers(agent.delete(url), &req.headers).call()?,
        HttpMethod::Post => send_body(with_headers(agent.post(url), &req.headers), req.body)?,
        HttpMethod::Put => send_body(with_headers(agent.put(url), &req.headers), req.body)?,
        HttpMethod::Patch => send_body(with_headers(agent.patch(url), &req.headers), req.body)?,
    };

    let status = response.status().as_u16();
    let headers = response
        .headers()
        .iter()
        .filter_map(|(name, value)| Some((name.as_str().to_string(), value.to_str().ok()?.to_string())))
        .collect();
    let body = response.body_mut().read_to_string()?;

    Ok(HttpResponse { status, headers, body })
}

async fn start_server(store: mock_server::Store) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(mock_server::serve(listener, store));
    format!("http://{addr}")
}

fn fetch_kind(err: &AdminError) -> FetchErrorKind {
    err.as_fetch().expect("expected a fetch error").kind()
}

#[tokio::test(flavor = "multi_thread")]
async fn admin_lifecycle() {
    let entity_config = json!({
        "metadata": {"openid_relying_party": {"client_name": "RP"}},
        "jwks": {"keys": [{"kty": "EC", "kid": "k1"}]},
        "authority_hints": ["https://ta.example.org"],
    });
    let store = mock_server::Store::new().with_entity_config(RP, entity_config);
    let base = start_server(store).await;

    let client = Arc::new(AdminClient::new(ClientConfig::new(&base).unwrap(), UreqTransport::new()));
    let guard = NavigationGuard::new(client.clone());
    let home = RouteTarget::new("home", "/");
    let login_route = RouteTarget::new("login", "/login").public();

    // Step 1: first navigation primes CSRF and finds nobody logged in.
    let decision = guard.before_each(&RouteTarget::new("trustmarks", "/trustmarks?page=2")).await;
    assert_eq!(
        decision,
        NavigationDecision::RedirectToLogin {
            redirect: "/trustmarks?page=2".to_string()
        }
    );
    assert!(client.session().csrf_primed());
    let primed_token = client.session().cookie("csrftoken").expect("csrf cookie");
    assert_eq!(guard.before_each(&login_route).await, NavigationDecision::Allow);

    // Step 2: bad credentials are an auth error, good ones open a session.
    let bad = LoginOptions {
        username: mock_server::ADMIN_USERNAME.to_string(),
        password: "wrong".to_string(),
    };
    let err = client.login(&bad).await.unwrap_err();
    assert_eq!(fetch_kind(&err), FetchErrorKind::AuthError);
    assert_eq!(err.as_fetch().unwrap().message(), "Invalid credentials");

    let good = LoginOptions {
        username: mock_server::ADMIN_USERNAME.to_string(),
        password: mock_server::ADMIN_PASSWORD.to_string(),
    };
    let user = client.login(&good).await.unwrap();
    assert_eq!(user.username, mock_server::ADMIN_USERNAME);
    assert_eq!(client.session().auth_state(), AuthState::Authenticated);
    assert_ne!(client.session().cookie("csrftoken").unwrap(), primed_token);
    assert_eq!(guard.before_each(&login_route).await, NavigationDecision::RedirectToHome);
    assert_eq!(guard.before_each(&home).await, NavigationDecision::Allow);

    // Step 3: trust mark types.
    let tmt = client
        .create_trust_mark_type(&TrustMarkTypeCreateOptions {
            tmtype: "https://ta.example.org/tm/member".to_string(),
            valid_for: Some(720),
            renewal_time: Some(24),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(tmt.valid_for, 720);
    assert!(tmt.active);

    let err = client
        .create_trust_mark_type(&TrustMarkTypeCreateOptions {
            tmtype: "https://ta.example.org/tm/member".to_string(),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert_eq!(fetch_kind(&err), FetchErrorKind::ClientError);
    assert_eq!(err.as_fetch().unwrap().status(), Some(409));

    let err = client
        .create_trust_mark_type(&TrustMarkTypeCreateOptions::default())
        .await
        .unwrap_err();
    assert!(err.as_validation().is_some());

    client
        .create_trust_mark_type(&TrustMarkTypeCreateOptions {
            tmtype: "https://ta.example.org/tm/sirtfi".to_string(),
            ..Default::default()
        })
        .await
        .unwrap();
    let page = client.list_trust_mark_types(Some(Pagination::new(1, 1))).await.unwrap();
    assert_eq!(page.count, 2);
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].tmtype, "https://ta.example.org/tm/sirtfi");
    assert_eq!(client.get_trust_mark_type(tmt.id).await.unwrap(), tmt);

    // Step 4: trust marks.
    let mark = client
        .create_trust_mark(&TrustMarkCreateOptions {
            tmt: tmt.id,
            domain: RP.to_string(),
            additional_claims: Some(json!({"ref": "https://rp.example.org/policy"}).as_object().unwrap().clone()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(mark.valid_for, Some(720));
    assert!(mark.mark.is_some());

    let mut changes = TrustMarkUpdateOptions::from(&mark);
    changes.active = Some(false);
    let updated = client.update_trust_mark(mark.id, &changes).await.unwrap();
    assert!(!updated.active);
    assert_eq!(updated.additional_claims, mark.additional_claims);

    let renewed = client.renew_trust_mark(mark.id).await.unwrap();
    assert_ne!(renewed.mark, mark.mark);
    assert!(renewed.expire_at >= mark.expire_at);

    let by_domain = client.list_trust_marks_by_domain(RP, None).await.unwrap();
    assert_eq!(by_domain.count, 1);
    assert_eq!(by_domain.items[0].id, mark.id);
    assert_eq!(client.list_trust_marks(None).await.unwrap().count, 1);

    let err = client.get_trust_mark(999).await.unwrap_err();
    assert_eq!(fetch_kind(&err), FetchErrorKind::ClientError);
    assert_eq!(err.as_fetch().unwrap().status(), Some(404));

    // Step 5: subordinates seeded from a fetched entity configuration.
    let config = client.fetch_entity_config(RP).await.unwrap();
    assert_eq!(config.authority_hints(), ["https://ta.example.org".to_string()]);

    let sub = client
        .create_subordinate(&SubordinateCreateOptions::from_entity_config(RP, &config))
        .await
        .unwrap();
    assert_eq!(&sub.metadata, config.metadata());
    assert_eq!(&sub.jwks, config.jwks());

    let updated = client
        .update_subordinate(
            sub.id,
            &SubordinateUpdateOptions {
                required_trustmarks: Some("https://ta.example.org/tm/member".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.required_trustmarks.as_deref(), Some("https://ta.example.org/tm/member"));
    assert_eq!(client.renew_subordinate(sub.id).await.unwrap().id, sub.id);
    assert_eq!(client.get_subordinate(sub.id).await.unwrap(), updated);
    assert_eq!(client.list_subordinates(None).await.unwrap().count, 1);

    let err = client.fetch_entity_config("https://unknown.example.org").await.unwrap_err();
    assert_eq!(fetch_kind(&err), FetchErrorKind::ClientError);

    // Step 6: server maintenance.
    let statement = client.regenerate_entity().await.unwrap();
    assert_eq!(statement.entity_statement.split('.').count(), 3);
    client.sync_historical_keys().await.unwrap();

    // Step 7: logout resets the cached state, so the guard asks again.
    client.logout().await.unwrap();
    assert_eq!(client.session().auth_state(), AuthState::Unknown);
    assert!(client.session().cookie("sessionid").is_none());
    let decision = guard.before_each(&home).await;
    assert_eq!(decision, NavigationDecision::RedirectToLogin { redirect: "/".to_string() });
    assert_eq!(client.session().auth_state(), AuthState::Unauthenticated);

    let err = client.list_subordinates(None).await.unwrap_err();
    assert_eq!(fetch_kind(&err), FetchErrorKind::AuthError);
}

#[tokio::test(flavor = "multi_thread")]
async fn unreachable_server_is_unknown_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = AdminClient::new(ClientConfig::new(&format!("http://{addr}")).unwrap(), UreqTransport::new());
    let err = client.init_csrf().await.unwrap_err();
    assert_eq!(fetch_kind(&err), FetchErrorKind::UnknownError);
    assert_eq!(err.as_fetch().unwrap().status(), None);
    assert!(!client.session().csrf_primed());

    let guard = NavigationGuard::new(Arc::new(client));
    let decision = guard.before_each(&RouteTarget::new("home", "/")).await;
    assert_eq!(decision, NavigationDecision::RedirectToLogin { redirect: "/".to_string() });
}
