//! End-to-end tests for the gateway router.
//!
//! Backends are wiremock servers; the static bundle lives in a temp dir.

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use serde_json::json;
use tempfile::TempDir;
use tower::ServiceExt;
use wiremock::matchers::{body_json, header as header_eq, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use tradedesk_gateway::{create_router, GatewayConfig, GatewayState, RouteTable};

const INDEX: &str = "<!doctype html><div id=\"root\"></div>";

struct Harness {
    app: Router,
    auth: MockServer,
    account: MockServer,
    client: MockServer,
    _bundle: TempDir,
}

async fn harness() -> Harness {
    let auth = MockServer::start().await;
    let account = MockServer::start().await;
    let client = MockServer::start().await;

    let bundle = tempfile::tempdir().unwrap();
    std::fs::write(bundle.path().join("index.html"), INDEX).unwrap();
    std::fs::create_dir(bundle.path().join("assets")).unwrap();
    std::fs::write(bundle.path().join("assets/app.js"), "console.log(1)").unwrap();

    let config = GatewayConfig {
        static_dir: bundle.path().to_path_buf(),
        ..GatewayConfig::default()
    };
    let routes = RouteTable::new()
        .register("/api/auth", &auth.uri())
        .register("/api/account", &account.uri())
        .register("/api/client", &client.uri());

    let app = create_router(GatewayState::new(routes, config).unwrap());

    Harness {
        app,
        auth,
        account,
        client,
        _bundle: bundle,
    }
}

async fn send(app: &Router, request: Request<Body>) -> Response {
    app.clone().oneshot(request).await.unwrap()
}

async fn body_string(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

fn assert_cors(response: &Response) {
    let headers = response.headers();
    assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    assert_eq!(
        headers[header::ACCESS_CONTROL_ALLOW_HEADERS],
        "Content-Type, Authorization"
    );
    assert_eq!(
        headers[header::ACCESS_CONTROL_ALLOW_METHODS],
        "GET, POST, PUT, DELETE, OPTIONS"
    );
}

#[tokio::test]
async fn forwards_to_matching_backend_with_path_and_method() {
    let h = harness().await;

    Mock::given(method("POST"))
        .and(path("/api/auth/login"))
        .and(body_json(json!({"username": "alice", "password": "secret"})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"token": "T1", "user": {"username": "alice"}})),
        )
        .expect(1)
        .mount(&h.auth)
        .await;

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/auth/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"username":"alice","password":"secret"}"#))
        .unwrap();

    let response = send(&h.app, request).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_cors(&response);

    let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(body["token"], "T1");
}

#[tokio::test]
async fn every_prefix_reaches_its_own_backend() {
    let h = harness().await;

    for (server, prefix) in [
        (&h.auth, "/api/auth"),
        (&h.account, "/api/account"),
        (&h.client, "/api/client"),
    ] {
        for (verb, suffix) in [("GET", "/items/7"), ("PUT", "/items/7"), ("DELETE", "")] {
            Mock::given(method(verb))
                .and(path(format!("{prefix}{suffix}")))
                .respond_with(ResponseTemplate::new(200).set_body_string(prefix))
                .expect(1)
                .mount(server)
                .await;
        }
    }

    for prefix in ["/api/auth", "/api/account", "/api/client"] {
        for (verb, suffix) in [
            (Method::GET, "/items/7"),
            (Method::PUT, "/items/7"),
            (Method::DELETE, ""),
        ] {
            let request = Request::builder()
                .method(verb)
                .uri(format!("{prefix}{suffix}"))
                .body(Body::empty())
                .unwrap();
            let response = send(&h.app, request).await;
            assert_eq!(response.status(), StatusCode::OK);
            assert_eq!(body_string(response).await, prefix);
        }
    }
}

#[tokio::test]
async fn forwards_query_and_headers() {
    let h = harness().await;

    Mock::given(method("GET"))
        .and(path("/api/account/crypto/trading/prices"))
        .and(query_param("currency", "usd"))
        .and(header_eq("authorization", "Bearer T1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"bitcoin": 1})))
        .expect(1)
        .mount(&h.account)
        .await;

    let request = Request::builder()
        .uri("/api/account/crypto/trading/prices?currency=usd")
        .header(header::AUTHORIZATION, "Bearer T1")
        .body(Body::empty())
        .unwrap();

    let response = send(&h.app, request).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn backend_errors_pass_through_verbatim() {
    let h = harness().await;

    Mock::given(method("GET"))
        .and(path("/api/account/crypto/trading/portfolio"))
        .respond_with(
            ResponseTemplate::new(401)
                .insert_header("x-backend", "account")
                .insert_header("access-control-allow-origin", "http://elsewhere")
                .set_body_string("token expired"),
        )
        .mount(&h.account)
        .await;

    let request = Request::builder()
        .uri("/api/account/crypto/trading/portfolio")
        .body(Body::empty())
        .unwrap();

    let response = send(&h.app, request).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(response.headers()["x-backend"], "account");
    assert_cors(&response);
    assert_eq!(body_string(response).await, "token expired");
}

#[tokio::test]
async fn redirects_are_not_followed() {
    let h = harness().await;

    Mock::given(method("GET"))
        .and(path("/api/client/old"))
        .respond_with(ResponseTemplate::new(302).insert_header("location", "/api/client/new"))
        .mount(&h.client)
        .await;

    let request = Request::builder()
        .uri("/api/client/old")
        .body(Body::empty())
        .unwrap();

    let response = send(&h.app, request).await;
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(response.headers()[header::LOCATION], "/api/client/new");
}

#[tokio::test]
async fn options_short_circuits_with_cors() {
    let h = harness().await;

    Mock::given(method("OPTIONS"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&h.auth)
        .await;

    for uri in ["/api/auth/login", "/anything", "/"] {
        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri(uri)
            .body(Body::empty())
            .unwrap();

        let response = send(&h.app, request).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_cors(&response);
        assert!(body_string(response).await.is_empty());
    }
}

#[tokio::test]
async fn unreachable_backend_is_bad_gateway() {
    let bundle = tempfile::tempdir().unwrap();
    let config = GatewayConfig {
        static_dir: bundle.path().to_path_buf(),
        ..GatewayConfig::default()
    };
    let routes = RouteTable::new().register("/api/auth", "http://127.0.0.1:1");
    let app = create_router(GatewayState::new(routes, config).unwrap());

    let request = Request::builder()
        .uri("/api/auth/validate")
        .body(Body::empty())
        .unwrap();

    let response = send(&app, request).await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_cors(&response);

    let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(body["error"]["code"], "upstream_unavailable");
}

#[tokio::test]
async fn serves_existing_static_asset() {
    let h = harness().await;

    let request = Request::builder()
        .uri("/assets/app.js")
        .body(Body::empty())
        .unwrap();

    let response = send(&h.app, request).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_cors(&response);
    assert!(response.headers()[header::CONTENT_TYPE]
        .to_str()
        .unwrap()
        .contains("javascript"));
    assert_eq!(body_string(response).await, "console.log(1)");
}

#[tokio::test]
async fn unmatched_path_gets_main_document() {
    let h = harness().await;

    for uri in ["/crypto", "/account/settings", "/api/unknown/thing"] {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        let response = send(&h.app, request).await;
        assert_eq!(response.status(), StatusCode::OK, "{uri}");
        assert_cors(&response);
        assert_eq!(body_string(response).await, INDEX);
    }
}

#[tokio::test]
async fn non_get_unmatched_path_gets_main_document() {
    let h = harness().await;

    let request = Request::builder()
        .method(Method::POST)
        .uri("/login")
        .body(Body::empty())
        .unwrap();

    let response = send(&h.app, request).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, INDEX);
}

#[tokio::test]
async fn prefix_lookalike_is_not_forwarded() {
    let h = harness().await;

    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&h.auth)
        .await;

    let request = Request::builder()
        .uri("/api/authority")
        .body(Body::empty())
        .unwrap();

    let response = send(&h.app, request).await;
    assert_eq!(body_string(response).await, INDEX);
}

fn small_limit_app(bundle: &TempDir, auth: &str) -> Router {
    let config = GatewayConfig {
        static_dir: bundle.path().to_path_buf(),
        max_body_bytes: 1024,
        ..GatewayConfig::default()
    };
    let routes = RouteTable::new().register("/api/auth", auth);
    create_router(GatewayState::new(routes, config).unwrap())
}

#[tokio::test]
async fn options_with_oversized_body_is_still_preflight() {
    let auth = MockServer::start().await;
    let bundle = tempfile::tempdir().unwrap();
    let app = small_limit_app(&bundle, &auth.uri());

    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/auth/login")
        .header(header::CONTENT_LENGTH, "4096")
        .body(Body::from(vec![b'x'; 4096]))
        .unwrap();

    let response = send(&app, request).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_cors(&response);
    assert!(body_string(response).await.is_empty());
}

#[tokio::test]
async fn oversized_body_is_rejected_with_cors() {
    let auth = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&auth)
        .await;

    let bundle = tempfile::tempdir().unwrap();
    let app = small_limit_app(&bundle, &auth.uri());

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/auth/login")
        .header(header::CONTENT_LENGTH, "4096")
        .body(Body::from(vec![b'x'; 4096]))
        .unwrap();

    let response = send(&app, request).await;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_cors(&response);
}

#[tokio::test]
async fn missing_main_document_is_not_found_with_cors() {
    let bundle = tempfile::tempdir().unwrap();
    let config = GatewayConfig {
        static_dir: bundle.path().to_path_buf(),
        ..GatewayConfig::default()
    };
    let app = create_router(GatewayState::new(RouteTable::new(), config).unwrap());

    let request = Request::builder()
        .uri("/dashboard")
        .body(Body::empty())
        .unwrap();

    let response = send(&app, request).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_cors(&response);

    let body: serde_json::Value = serde_json::from_str(&body_string(response).await).unwrap();
    assert_eq!(body["error"]["code"], "not_found");
}
