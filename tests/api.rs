//! End-to-end tests of the HTTP surface against mocked downstream services.
//!
//! Each test starts its own `wiremock` servers standing in for the users and
//! analytics services and drives the router in-process with `oneshot`.
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, Response, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use switchyard::config::AppConfig;
use switchyard::templates::init_templates;
use switchyard::{create_router, AppState};

const DEFAULT_CHECKS: [&str; 5] = [
    "service-1-health",
    "service-2-health",
    "fetch-users",
    "fetch-analytics",
    "cross-service",
];

fn config(users_url: &str, analytics_url: &str, extra: &str) -> AppConfig {
    let toml = format!(
        r#"
[services]
service_1_url = "{}"
service_2_url = "{}"
request_timeout_seconds = 1

{}
"#,
        users_url, analytics_url, extra
    );
    let config = AppConfig::from_toml_str(&toml).unwrap();
    config.validate().unwrap();
    config
}

fn app(config: AppConfig) -> axum::Router {
    let tera = init_templates(&config.ui).unwrap();
    create_router(AppState::new(config, tera).unwrap())
}

/// A loopback URL nothing is listening on
fn unreachable_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{}", port)
}

async fn mock_json(server: &MockServer, verb: &str, route: &str, status: u16, body: Value) {
    Mock::given(method(verb))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status).set_body_json(body))
        .mount(server)
        .await;
}

/// Users and analytics services that answer every default check successfully
async fn healthy_services() -> (MockServer, MockServer) {
    let users = MockServer::start().await;
    let analytics = MockServer::start().await;

    mock_json(&users, "GET", "/health", 200, json!({"status": "healthy", "service": "user-service"})).await;
    mock_json(&users, "GET", "/users", 200, json!([{"id": 1, "name": "Alice Johnson"}])).await;
    mock_json(&analytics, "GET", "/health", 200, json!({"status": "healthy"})).await;
    mock_json(&analytics, "GET", "/analytics", 200, json!({"total_users": 1})).await;
    mock_json(&analytics, "GET", "/cross-service-test", 200, json!({"ok": true})).await;

    (users, analytics)
}

fn request(verb: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(verb)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response.into_body().collect().await.unwrap().to_bytes().to_vec()
}

async fn response_json(response: Response<Body>) -> Value {
    let bytes = body_bytes(response).await;
    serde_json::from_slice(&bytes)
        .unwrap_or_else(|e| panic!("JSON parse error: {}. Body: {:?}", e, String::from_utf8_lossy(&bytes)))
}

fn result<'a>(report: &'a Value, check: &str) -> &'a Value {
    report["results"]
        .as_array()
        .unwrap()
        .iter()
        .find(|r| r["check"] == check)
        .unwrap_or_else(|| panic!("no result for check {}", check))
}

fn check_names(report: &Value) -> Vec<String> {
    report["results"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["check"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn test_run_tests_all_healthy() {
    let (users, analytics) = healthy_services().await;
    let app = app(config(&users.uri(), &analytics.uri(), ""));

    let response = app.oneshot(request("POST", "/api/run-tests")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["cache-control"], "no-store");

    let report = response_json(response).await;
    assert_eq!(report["overall_status"], "OK");
    assert_eq!(check_names(&report), DEFAULT_CHECKS);
    assert_eq!(report["summary"]["passed"], 5);
    assert_eq!(report["message"], "Tests completed: 5/5 successful");
    assert_eq!(
        result(&report, "fetch-users")["payload"],
        json!([{"id": 1, "name": "Alice Johnson"}])
    );
    assert!(result(&report, "fetch-users")["latency_ms"].is_u64());
}

#[tokio::test]
async fn test_unreachable_analytics_does_not_short_circuit() {
    let users = MockServer::start().await;
    mock_json(&users, "GET", "/health", 200, json!({"status": "healthy"})).await;
    mock_json(&users, "GET", "/users", 200, json!([])).await;

    let app = app(config(&users.uri(), &unreachable_url(), ""));
    let response = app.oneshot(request("POST", "/api/run-tests")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let report = response_json(response).await;
    assert_eq!(report["overall_status"], "FAIL");
    assert_eq!(check_names(&report), DEFAULT_CHECKS);

    assert_eq!(result(&report, "service-1-health")["status"], "OK");
    assert_eq!(result(&report, "fetch-users")["status"], "OK");
    for check in ["service-2-health", "fetch-analytics", "cross-service"] {
        let r = result(&report, check);
        assert_eq!(r["status"], "FAIL", "{}", check);
        assert!(r["error"].as_str().unwrap().contains("unreachable"));
        assert!(r.get("payload").is_none());
    }
}

#[tokio::test]
async fn test_slow_downstream_is_timeout_not_fail() {
    let (users, analytics) = healthy_services().await;
    let slow = MockServer::start().await;
    mock_json(&slow, "GET", "/health", 200, json!({"status": "healthy"})).await;
    mock_json(&slow, "GET", "/cross-service-test", 200, json!({})).await;
    Mock::given(method("GET"))
        .and(path("/analytics"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"total_users": 0}))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&slow)
        .await;
    drop(analytics);

    let app = app(config(&users.uri(), &slow.uri(), ""));
    let report = response_json(app.oneshot(request("POST", "/api/run-tests")).await.unwrap()).await;

    let r = result(&report, "fetch-analytics");
    assert_eq!(r["status"], "TIMEOUT");
    assert_eq!(r["latency_ms"], 1000);
    assert_eq!(report["overall_status"], "FAIL");
    assert_eq!(report["summary"]["timed_out"], 1);
    assert_eq!(result(&report, "cross-service")["status"], "OK");
}

#[tokio::test]
async fn test_run_timeout_abandons_inflight_checks() {
    let users = MockServer::start().await;
    mock_json(&users, "GET", "/health", 200, json!({})).await;
    Mock::given(method("GET"))
        .and(path("/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])).set_delay(Duration::from_secs(4)))
        .mount(&users)
        .await;
    let analytics = MockServer::start().await;
    mock_json(&analytics, "GET", "/health", 200, json!({})).await;

    let extra = r#"
[run]
timeout_seconds = 1

[[check]]
name = "service-1-health"
service = "users"
path = "/health"

[[check]]
name = "fetch-users"
service = "users"
path = "/users"

[[check]]
name = "service-2-health"
service = "analytics"
path = "/health"
"#;
    let mut config = config(&users.uri(), &analytics.uri(), extra);
    config.services.request_timeout_seconds = 10;

    let report = response_json(app(config).oneshot(request("POST", "/api/run-tests")).await.unwrap()).await;

    assert_eq!(check_names(&report), ["service-1-health", "fetch-users", "service-2-health"]);
    assert_eq!(result(&report, "service-1-health")["status"], "OK");
    assert_eq!(result(&report, "service-2-health")["status"], "OK");
    let abandoned = result(&report, "fetch-users");
    assert_eq!(abandoned["status"], "TIMEOUT");
    assert_eq!(abandoned["latency_ms"], 1000);
    assert!(abandoned["error"].as_str().unwrap().contains("run timeout"));
}

#[tokio::test]
async fn test_report_order_follows_definitions_not_completion() {
    let (users, analytics) = healthy_services().await;
    let slow_users = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})).set_delay(Duration::from_millis(300)))
        .mount(&slow_users)
        .await;
    mock_json(&slow_users, "GET", "/users", 200, json!([])).await;
    drop(users);

    let app = app(config(&slow_users.uri(), &analytics.uri(), ""));
    let report = response_json(app.oneshot(request("POST", "/api/run-tests")).await.unwrap()).await;

    assert_eq!(check_names(&report), DEFAULT_CHECKS);
    assert_eq!(report["overall_status"], "OK");
    assert!(result(&report, "service-1-health")["latency_ms"].as_u64().unwrap() >= 300);
}

#[tokio::test]
async fn test_post_check_with_expected_field() {
    let users = MockServer::start().await;
    let analytics = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/users"))
        .and(body_json(json!({"name": "Bob Smith", "email": "bob@company.com", "age": 35})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 7, "name": "Bob Smith"})))
        .mount(&users)
        .await;
    mock_json(&analytics, "GET", "/analytics", 200, json!({"total_users": 1})).await;

    let extra = r#"
[[check]]
name = "create-user"
service = "users"
method = "POST"
path = "/users"
body = { name = "Bob Smith", email = "bob@company.com", age = 35 }
expect_field = "id"

[[check]]
name = "analytics-has-averages"
service = "analytics"
path = "/analytics"
expect_field = "average_age"
"#;
    let app = app(config(&users.uri(), &analytics.uri(), extra));
    let report = response_json(app.oneshot(request("POST", "/api/run-tests")).await.unwrap()).await;

    let created = result(&report, "create-user");
    assert_eq!(created["status"], "OK");
    assert_eq!(created["payload"]["id"], 7);

    let analytics = result(&report, "analytics-has-averages");
    assert_eq!(analytics["status"], "FAIL");
    assert!(analytics["error"].as_str().unwrap().contains("average_age"));
}

#[tokio::test]
async fn test_non_2xx_is_fail_with_status_in_error() {
    let (users, analytics) = healthy_services().await;
    let broken = MockServer::start().await;
    mock_json(&broken, "GET", "/health", 200, json!({})).await;
    Mock::given(method("GET"))
        .and(path("/users"))
        .respond_with(ResponseTemplate::new(500).set_body_string("database unavailable"))
        .mount(&broken)
        .await;
    drop(users);

    let app = app(config(&broken.uri(), &analytics.uri(), ""));
    let report = response_json(app.oneshot(request("POST", "/api/run-tests")).await.unwrap()).await;

    let r = result(&report, "fetch-users");
    assert_eq!(r["status"], "FAIL");
    let error = r["error"].as_str().unwrap();
    assert!(error.contains("500"));
    assert!(error.contains("database unavailable"));
}

#[tokio::test]
async fn test_health_ok_when_both_services_healthy() {
    let (users, analytics) = healthy_services().await;
    let app = app(config(&users.uri(), &analytics.uri(), ""));

    let response = app.oneshot(request("GET", "/api/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = response_json(response).await;
    assert_eq!(body["status"], "ok");
    let services = body["services"].as_array().unwrap();
    assert_eq!(services.len(), 2);
    assert!(services.iter().all(|s| s["status"] == "healthy"));
}

#[tokio::test]
async fn test_health_fail_when_one_service_unhealthy() {
    let users = MockServer::start().await;
    mock_json(&users, "GET", "/health", 200, json!({"status": "healthy"})).await;
    let analytics = MockServer::start().await;
    mock_json(&analytics, "GET", "/health", 503, json!({"status": "degraded"})).await;

    let app = app(config(&users.uri(), &analytics.uri(), ""));
    let body = response_json(app.oneshot(request("GET", "/api/health")).await.unwrap()).await;

    assert_eq!(body["status"], "fail");
    assert_eq!(body["services"][0]["status"], "healthy");
    assert_eq!(body["services"][1]["status"], "unhealthy");
}

#[tokio::test]
async fn test_users_passthrough_is_verbatim() {
    let users = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users"))
        .respond_with(ResponseTemplate::new(200).set_body_raw(r#"{"users": []}"#, "application/json"))
        .mount(&users)
        .await;

    let app = app(config(&users.uri(), &unreachable_url(), ""));
    let response = app.oneshot(request("GET", "/api/users")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "application/json");
    assert_eq!(body_bytes(response).await, br#"{"users": []}"#);
}

#[tokio::test]
async fn test_analytics_passthrough() {
    let analytics = MockServer::start().await;
    mock_json(&analytics, "GET", "/analytics", 200, json!({"total_users": 4, "average_age": 33.25})).await;

    let app = app(config(&unreachable_url(), &analytics.uri(), ""));
    let response = app.oneshot(request("GET", "/api/analytics")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body, json!({"total_users": 4, "average_age": 33.25}));
}

#[tokio::test]
async fn test_passthrough_unreachable_is_bad_gateway() {
    let app = app(config(&unreachable_url(), &unreachable_url(), ""));
    let response = app.oneshot(request("GET", "/api/users")).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    let body = response_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("users"));
    assert!(body["request_id"].is_string());
}

#[tokio::test]
async fn test_passthrough_non_2xx_and_malformed_are_bad_gateway() {
    let analytics = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/analytics"))
        .respond_with(ResponseTemplate::new(404).set_body_string("not here"))
        .mount(&analytics)
        .await;
    let users = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&users)
        .await;

    let app = app(config(&users.uri(), &analytics.uri(), ""));

    let response = app.clone().oneshot(request("GET", "/api/analytics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert!(response_json(response).await["error"].as_str().unwrap().contains("404"));

    let response = app.oneshot(request("GET", "/api/users")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert!(response_json(response).await["error"].as_str().unwrap().contains("malformed"));
}

#[tokio::test]
async fn test_passthrough_timeout_is_gateway_timeout() {
    let users = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])).set_delay(Duration::from_secs(3)))
        .mount(&users)
        .await;

    let app = app(config(&users.uri(), &unreachable_url(), ""));
    let response = app.oneshot(request("GET", "/api/users")).await.unwrap();
    assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
}

#[tokio::test]
async fn test_dashboard_lists_checks() {
    let app = app(config(&unreachable_url(), &unreachable_url(), ""));
    let response = app.oneshot(request("GET", "/")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["cache-control"], "public, max-age=60");
    let html = String::from_utf8(body_bytes(response).await).unwrap();
    assert!(html.contains("Microservices Test Dashboard"));
    for check in DEFAULT_CHECKS {
        assert!(html.contains(check), "dashboard is missing {}", check);
    }
}

#[tokio::test]
async fn test_dashboard_server_side_run() {
    let (users, analytics) = healthy_services().await;
    let app = app(config(&users.uri(), &analytics.uri(), ""));

    let response = app.oneshot(request("GET", "/?run=true")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["cache-control"], "no-store");
    let html = String::from_utf8(body_bytes(response).await).unwrap();
    assert!(html.contains("status-ok"));
    assert!(html.contains("Tests completed: 5"));
    assert!(html.contains(" ms"));
}

#[tokio::test]
async fn test_dashboard_run_flag_is_lenient() {
    let (users, analytics) = healthy_services().await;
    let app = app(config(&users.uri(), &analytics.uri(), ""));

    for uri in ["/?run", "/?run=1"] {
        let response = app.clone().oneshot(request("GET", uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK, "{}", uri);
        assert_eq!(response.headers()["cache-control"], "no-store");
        let html = String::from_utf8(body_bytes(response).await).unwrap();
        assert!(html.contains("Tests completed: 5"), "{}", uri);
    }

    let response = app.oneshot(request("GET", "/")).await.unwrap();
    assert_eq!(response.headers()["cache-control"], "public, max-age=60");
}

#[tokio::test]
async fn test_liveness_and_request_id_header() {
    let app = app(config(&unreachable_url(), &unreachable_url(), ""));
    let response = app.oneshot(request("GET", "/healthz")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    assert_eq!(body_bytes(response).await, b"ok");
}
