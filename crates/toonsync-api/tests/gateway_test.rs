#![allow(clippy::unwrap_used)]
// Integration tests for the `ApiClient` request gateway using wiremock.

use std::sync::Arc;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use tokio_util::sync::CancellationToken;
use url::Url;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use toonsync_api::{
    ACCESS_TOKEN_KEY, ApiClient, AuthState, Credentials, Error, ListQuery, MemoryStorage,
    REFRESH_TOKEN_KEY, Registration, SessionStore, TokenStorage, WebtoonPatch, WebtoonPayload,
};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, ApiClient, Arc<MemoryStorage>) {
    let server = MockServer::start().await;
    let storage = Arc::new(MemoryStorage::new());
    let client = client_for(&format!("{}/api", server.uri()), storage.clone());
    (server, client, storage)
}

fn client_for(base: &str, storage: Arc<MemoryStorage>) -> ApiClient {
    let session = Arc::new(SessionStore::new(storage));
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap();
    ApiClient::with_client(http, Url::parse(base).unwrap(), session)
}

fn profile_json() -> serde_json::Value {
    json!({
        "id": 42,
        "username": "reader",
        "email": "reader@example.com",
        "role": "user",
        "is_superuser": false,
        "features": ["webtoon_management"]
    })
}

fn webtoon_json(id: u64, title: &str, chapter: u32) -> serde_json::Value {
    json!({
        "id": id,
        "title": title,
        "type": "manhwa",
        "language": "en",
        "rating": 4.5,
        "chapter": chapter,
        "link": "https://example.com",
        "status": "reading",
        "image_url": ""
    })
}

fn page_json(ids: std::ops::RangeInclusive<u64>, next: Option<&str>) -> serde_json::Value {
    let results: Vec<_> = ids.map(|id| webtoon_json(id, &format!("Title {id}"), 1)).collect();
    json!({ "count": results.len(), "next": next, "previous": null, "results": results })
}

fn password(value: &str) -> SecretString {
    SecretString::from(value.to_owned())
}

/// Mount login + profile mocks and sign in with tokens `a1`/`r1`.
async fn sign_in(server: &MockServer, client: &ApiClient) {
    Mock::given(method("POST"))
        .and(path("/api/auth/login/"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "access": "a1", "refresh": "r1" })),
        )
        .up_to_n_times(1)
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/auth/me/"))
        .and(header("authorization", "Bearer a1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(profile_json()))
        .up_to_n_times(1)
        .mount(server)
        .await;

    client
        .login(&Credentials::new("reader", password("hunter2")))
        .await
        .unwrap();
}

// ── Session flows ───────────────────────────────────────────────────

#[tokio::test]
async fn test_login_persists_tokens_and_profile() {
    let (server, client, storage) = setup().await;
    sign_in(&server, &client).await;

    let session = client.session();
    assert!(session.is_authenticated());
    assert_eq!(session.state(), AuthState::Authenticated);
    assert_eq!(session.owner_id(), Some(42));
    assert!(session.has_feature("webtoon_management"));
    assert_eq!(storage.read(ACCESS_TOKEN_KEY).unwrap().as_deref(), Some("a1"));
    assert_eq!(storage.read(REFRESH_TOKEN_KEY).unwrap().as_deref(), Some("r1"));
}

#[tokio::test]
async fn test_login_rejected_is_authentication_error() {
    let (server, client, _storage) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/auth/login/"))
        .respond_with(ResponseTemplate::new(401).set_body_json(
            json!({ "detail": "No active account found with the given credentials" }),
        ))
        .mount(&server)
        .await;
    // Anonymous endpoints never trigger the refresh flow.
    Mock::given(method("POST"))
        .and(path("/api/auth/refresh/"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let result = client
        .login(&Credentials::new("reader", password("wrong")))
        .await;

    match result {
        Err(Error::Authentication { message }) => {
            assert_eq!(message, "No active account found with the given credentials");
        }
        other => panic!("expected Authentication error, got: {other:?}"),
    }
    assert!(!client.session().is_authenticated());
}

#[tokio::test]
async fn test_register_reports_login_failure_distinctly() {
    let (server, client, _storage) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/auth/register/"))
        .and(body_json(json!({
            "username": "newbie",
            "email": "newbie@example.com",
            "password": "s3cret"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({ "id": 7 })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/login/"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let result = client
        .register(&Registration {
            username: "newbie".into(),
            email: "newbie@example.com".into(),
            password: password("s3cret"),
        })
        .await;

    assert!(
        matches!(result, Err(Error::RegisteredButLoginFailed { .. })),
        "expected RegisteredButLoginFailed, got: {result:?}"
    );
}

#[tokio::test]
async fn test_logout_clears_storage() {
    let (server, client, storage) = setup().await;
    sign_in(&server, &client).await;

    client.logout();
    client.logout();

    assert!(client.session().access_token().is_none());
    assert!(client.session().profile().is_none());
    assert!(storage.is_empty());
}

// ── Restore ─────────────────────────────────────────────────────────

fn seeded_storage() -> Arc<MemoryStorage> {
    let storage = Arc::new(MemoryStorage::new());
    storage.write(ACCESS_TOKEN_KEY, "a1").unwrap();
    storage.write(REFRESH_TOKEN_KEY, "r1").unwrap();
    storage
}

#[tokio::test]
async fn test_restore_validates_stored_token() {
    let server = MockServer::start().await;
    let client = client_for(&format!("{}/api/", server.uri()), seeded_storage());

    Mock::given(method("GET"))
        .and(path("/api/auth/me/"))
        .and(header("authorization", "Bearer a1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(profile_json()))
        .mount(&server)
        .await;

    let profile = client.restore().await.unwrap().unwrap();
    assert_eq!(profile.username, "reader");
    assert_eq!(client.session().state(), AuthState::Authenticated);
}

#[tokio::test]
async fn test_restore_rejected_session_is_cleared() {
    let server = MockServer::start().await;
    let storage = seeded_storage();
    let client = client_for(&format!("{}/api/", server.uri()), storage.clone());

    Mock::given(method("GET"))
        .and(path("/api/auth/me/"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    assert!(client.restore().await.unwrap().is_none());
    assert!(storage.is_empty());
    assert_eq!(client.session().state(), AuthState::Anonymous);
}

#[tokio::test]
async fn test_restore_offline_keeps_stored_tokens() {
    let storage = seeded_storage();
    // Nothing listens on port 1.
    let client = client_for("http://127.0.0.1:1/api/", storage.clone());

    let result = client.restore().await;

    assert!(
        matches!(result, Err(Error::NetworkUnreachable { .. })),
        "expected NetworkUnreachable, got: {result:?}"
    );
    assert_eq!(storage.len(), 2);
    assert!(client.session().access_token().is_none());
}

#[tokio::test]
async fn test_restore_without_tokens_is_noop() {
    let (_server, client, _storage) = setup().await;
    assert!(client.restore().await.unwrap().is_none());
}

// ── Refresh and replay ──────────────────────────────────────────────

#[tokio::test]
async fn test_401_refreshes_and_replays_once() {
    let (server, client, storage) = setup().await;
    sign_in(&server, &client).await;

    Mock::given(method("GET"))
        .and(path("/api/webtoons/"))
        .and(header("authorization", "Bearer a1"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({ "detail": "Token expired" })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/refresh/"))
        .and(body_json(json!({ "refresh": "r1" })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "access": "a2", "refresh": "r2" })),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/webtoons/"))
        .and(header("authorization", "Bearer a2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_json(1..=3, None)))
        .expect(1)
        .mount(&server)
        .await;

    let page = client
        .list_webtoons(&ListQuery::default(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(page.results.len(), 3);
    assert_eq!(client.session().access_token().unwrap().expose_secret(), "a2");
    assert_eq!(client.session().state(), AuthState::Authenticated);
    assert_eq!(storage.read(REFRESH_TOKEN_KEY).unwrap().as_deref(), Some("r2"));
}

#[tokio::test]
async fn test_refresh_keeps_refresh_token_when_not_rotated() {
    let (server, client, _storage) = setup().await;
    sign_in(&server, &client).await;

    Mock::given(method("POST"))
        .and(path("/api/auth/refresh/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "access": "a2" })))
        .mount(&server)
        .await;

    client.refresh().await.unwrap();

    assert_eq!(client.session().access_token().unwrap().expose_secret(), "a2");
    assert_eq!(client.session().refresh_token().unwrap().expose_secret(), "r1");
}

#[tokio::test]
async fn test_refresh_rotates_pair_anonymously() {
    let (server, client, storage) = setup().await;
    sign_in(&server, &client).await;

    Mock::given(method("POST"))
        .and(path("/api/auth/refresh/"))
        .and(body_json(json!({ "refresh": "r1" })))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "access": "a2", "refresh": "r2" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    client.refresh().await.unwrap();

    assert_eq!(client.session().access_token().unwrap().expose_secret(), "a2");
    assert_eq!(client.session().state(), AuthState::Authenticated);
    assert_eq!(storage.read(ACCESS_TOKEN_KEY).unwrap().as_deref(), Some("a2"));
    assert_eq!(storage.read(REFRESH_TOKEN_KEY).unwrap().as_deref(), Some("r2"));

    let requests = server.received_requests().await.unwrap();
    let refresh = requests
        .iter()
        .find(|r| r.url.path() == "/api/auth/refresh/")
        .unwrap();
    assert!(!refresh.headers.contains_key("authorization"));
}

#[tokio::test]
async fn test_refresh_rejected_is_not_retried() {
    let (server, client, storage) = setup().await;
    sign_in(&server, &client).await;

    Mock::given(method("POST"))
        .and(path("/api/auth/refresh/"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({ "detail": "Token is invalid or expired" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let result = client.refresh().await;

    assert!(
        matches!(result, Err(Error::SessionExpired)),
        "expected SessionExpired, got: {result:?}"
    );
    assert!(client.session().access_token().is_none());
    assert!(storage.is_empty());
}

#[tokio::test]
async fn test_refresh_failure_is_session_expired() {
    let (server, client, storage) = setup().await;
    sign_in(&server, &client).await;

    Mock::given(method("GET"))
        .and(path("/api/webtoons/"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/refresh/"))
        .respond_with(
            ResponseTemplate::new(401)
                .set_body_json(json!({ "detail": "Token is invalid or expired" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let result = client
        .list_webtoons(&ListQuery::default(), &CancellationToken::new())
        .await;

    assert!(
        matches!(result, Err(Error::SessionExpired)),
        "expected SessionExpired, got: {result:?}"
    );
    assert!(client.session().access_token().is_none());
    assert!(client.session().profile().is_none());
    assert!(storage.is_empty());
}

#[tokio::test]
async fn test_replay_rejected_is_session_expired() {
    let (server, client, _storage) = setup().await;
    sign_in(&server, &client).await;

    Mock::given(method("GET"))
        .and(path("/api/webtoons/"))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/refresh/"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "access": "a2", "refresh": "r2" })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let result = client
        .list_webtoons(&ListQuery::default(), &CancellationToken::new())
        .await;

    assert!(matches!(result, Err(Error::SessionExpired)));
    assert!(!client.session().is_authenticated());
}

#[tokio::test]
async fn test_concurrent_401s_share_one_refresh() {
    let (server, client, _storage) = setup().await;
    sign_in(&server, &client).await;

    Mock::given(method("GET"))
        .and(path("/api/webtoons/"))
        .and(header("authorization", "Bearer a1"))
        .respond_with(ResponseTemplate::new(401))
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/auth/refresh/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "access": "a2", "refresh": "r2" }))
                .set_delay(Duration::from_millis(100)),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/webtoons/"))
        .and(header("authorization", "Bearer a2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_json(1..=2, None)))
        .expect(2)
        .mount(&server)
        .await;

    let cancel = CancellationToken::new();
    let query = ListQuery::default();
    let (first, second) = tokio::join!(
        client.list_webtoons(&query, &cancel),
        client.list_webtoons(&query, &cancel),
    );

    assert_eq!(first.unwrap().results.len(), 2);
    assert_eq!(second.unwrap().results.len(), 2);
}

// ── Cancellation ────────────────────────────────────────────────────

#[tokio::test]
async fn test_cancelled_request_resolves_as_cancelled() {
    let (server, client, _storage) = setup().await;
    sign_in(&server, &client).await;

    Mock::given(method("GET"))
        .and(path("/api/webtoons/"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(page_json(1..=1, None))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let result = client.list_webtoons(&ListQuery::default(), &cancel).await;
    assert!(
        matches!(result, Err(Error::Cancelled)),
        "expected Cancelled, got: {result:?}"
    );
}

// ── Collection endpoints ────────────────────────────────────────────

#[tokio::test]
async fn test_list_sends_page_and_search() {
    let (server, client, _storage) = setup().await;
    sign_in(&server, &client).await;

    Mock::given(method("GET"))
        .and(path("/api/webtoons/"))
        .and(query_param("page", "2"))
        .and(query_param("search", "tower"))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_json(21..=25, None)))
        .expect(1)
        .mount(&server)
        .await;

    let page = client
        .list_webtoons(
            &ListQuery::page(2).with_search(" tower "),
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(page.results.first().unwrap().id, 21);
    assert!(!page.has_more());
}

#[tokio::test]
async fn test_patch_sends_only_chapter() {
    let (server, client, _storage) = setup().await;
    sign_in(&server, &client).await;

    Mock::given(method("PATCH"))
        .and(path("/api/webtoons/9/"))
        .and(body_json(json!({ "chapter": 12 })))
        .respond_with(ResponseTemplate::new(200).set_body_json(webtoon_json(9, "Omniscient", 12)))
        .expect(1)
        .mount(&server)
        .await;

    let updated = client
        .patch_webtoon(9, &WebtoonPatch::chapter(12), &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(updated.chapter, 12);
}

#[tokio::test]
async fn test_delete_accepts_no_content() {
    let (server, client, _storage) = setup().await;
    sign_in(&server, &client).await;

    Mock::given(method("DELETE"))
        .and(path("/api/webtoons/9/"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    client
        .delete_webtoon(9, &CancellationToken::new())
        .await
        .unwrap();
}

// ── Error derivation ────────────────────────────────────────────────

#[tokio::test]
async fn test_field_error_becomes_validation_message() {
    let (server, client, _storage) = setup().await;
    sign_in(&server, &client).await;

    Mock::given(method("POST"))
        .and(path("/api/webtoons/"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(json!({ "title": ["This field may not be blank."] })),
        )
        .mount(&server)
        .await;

    let result = client
        .create_webtoon(&WebtoonPayload::default(), &CancellationToken::new())
        .await;

    let err = result.unwrap_err();
    assert!(matches!(err, Error::ValidationFailed { status: 400, .. }));
    assert_eq!(err.user_message(), "title: This field may not be blank.");
}

#[tokio::test]
async fn test_forbidden_carries_server_detail() {
    let (server, client, _storage) = setup().await;
    sign_in(&server, &client).await;

    Mock::given(method("GET"))
        .and(path("/api/webtoons/"))
        .respond_with(ResponseTemplate::new(403).set_body_json(
            json!({ "detail": "You do not have permission to perform this action." }),
        ))
        .mount(&server)
        .await;

    let result = client
        .list_webtoons(&ListQuery::default(), &CancellationToken::new())
        .await;

    match result {
        Err(Error::Forbidden { message }) => {
            assert_eq!(message, "You do not have permission to perform this action.");
        }
        other => panic!("expected Forbidden, got: {other:?}"),
    }
    // 403 is not an auth failure; the session survives.
    assert!(client.session().is_authenticated());
}

#[tokio::test]
async fn test_server_error_falls_back_to_reason() {
    let (server, client, _storage) = setup().await;
    sign_in(&server, &client).await;

    Mock::given(method("GET"))
        .and(path("/api/webtoons/7/"))
        .respond_with(ResponseTemplate::new(502).set_body_string("<html>bad gateway</html>"))
        .mount(&server)
        .await;

    let err = client
        .get_webtoon(7, &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.status(), Some(502));
    assert!(err.is_transient());
    assert_eq!(err.user_message(), "Bad Gateway");
}
