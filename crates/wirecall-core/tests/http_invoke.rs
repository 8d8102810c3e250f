//! Integration tests for remote calls over real HTTP.
//!
//! These tests run the `reqwest` transport against an in-process axum server
//! that echoes what it received back inside a `{"result": ...}` payload.

use axum::body::Body;
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Redirect, Response};
use axum::{Json, Router};
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use wirecall_core::{
    CallerContext, ClientConfig, HttpTransport, HttpVerb, Invoker, PageStatus, RedirectMode,
    ReferrerPolicy, RemoteRequest, RemoteValue, RequestPolicy, Transport, TransportResponse,
    WirecallError,
};

fn header(headers: &HeaderMap, name: &str) -> Value {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| Value::String(v.to_string()))
        .unwrap_or(Value::Null)
}

async fn echo(method: Method, uri: Uri, headers: HeaderMap, body: String) -> Response {
    let path = uri.path().to_string();

    if path.contains("/moved/") {
        let target = uri.to_string().replacen("/moved/", "/rpc/", 1);
        return Redirect::temporary(&target).into_response();
    }
    if path.ends_with("/brokenPayload.json") {
        return (StatusCode::OK, "<html>not a payload</html>").into_response();
    }
    if path.ends_with("/stallBody.json") {
        // Headers and the first chunk arrive, then the body hangs
        let chunks = futures::stream::unfold(false, |sent| async move {
            if sent {
                tokio::time::sleep(Duration::from_secs(5)).await;
                None
            } else {
                Some((Ok::<_, std::io::Error>("{\"result\":"), true))
            }
        });
        return (StatusCode::OK, Body::from_stream(chunks)).into_response();
    }
    if path.ends_with("/slowCall.json") {
        tokio::time::sleep(Duration::from_secs(5)).await;
    }

    let status = if path.ends_with("/brewTea.json") {
        StatusCode::IM_A_TEAPOT
    } else {
        StatusCode::OK
    };

    let payload = json!({
        "result": {
            "method": method.as_str(),
            "path": path,
            "query": uri.query(),
            "body": body,
            "session": header(&headers, "x-session"),
            "cacheControl": header(&headers, "cache-control"),
            "referer": header(&headers, "referer"),
            "servedAt": "2024-03-01T10:00:00.000Z",
        }
    });
    (status, Json(payload)).into_response()
}

async fn start_echo_server() -> SocketAddr {
    let app = Router::new().fallback(echo);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind echo server");
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("Echo server error");
    });
    addr
}

fn invoker_for(config: ClientConfig) -> (Invoker, Arc<PageStatus>) {
    let page = Arc::new(PageStatus::new());
    let transport = HttpTransport::from_config(&config).unwrap();
    let invoker = Invoker::builder(config, transport)
        .status_sink(page.clone())
        .build()
        .unwrap();
    (invoker, page)
}

fn field<'a>(value: &'a RemoteValue, key: &str) -> &'a RemoteValue {
    value
        .get(key)
        .unwrap_or_else(|| panic!("missing field {key} in {value:?}"))
}

#[tokio::test]
async fn test_get_call_over_http() {
    let addr = start_echo_server().await;
    let (invoker, page) = invoker_for(ClientConfig::new(format!("http://{}", addr)));

    let result = invoker
        .build("getUser", "abc")
        .call(&CallerContext::new("abc"), Some(json!({"id": 1})))
        .await
        .expect("call should return a result");

    assert_eq!(field(&result, "method").as_str(), Some("GET"));
    assert_eq!(field(&result, "path").as_str(), Some("/rpc/abc/getUser.json"));
    assert_eq!(
        field(&result, "query").as_str(),
        Some("payload=%7B%22id%22%3A1%7D")
    );
    assert_eq!(field(&result, "body").as_str(), Some(""));
    assert!(field(&result, "servedAt").as_datetime().is_some());
    assert_eq!(page.status(), Some(200));
    assert!(invoker.dispatch().is_responsive());
    assert!(!invoker.dispatch().is_fetching());
}

#[tokio::test]
async fn test_cross_build_delete_over_http() {
    let addr = start_echo_server().await;
    let (invoker, _page) = invoker_for(ClientConfig::new(format!("http://{}", addr)));

    let result = invoker
        .build("deleteUser", "abc")
        .call(&CallerContext::new("xyz"), Some(json!({"id": 1})))
        .await
        .unwrap();

    assert_eq!(field(&result, "method").as_str(), Some("DELETE"));
    assert_eq!(
        field(&result, "path").as_str(),
        Some("/rpc/abc-xyz/deleteUser.json")
    );
    assert_eq!(field(&result, "body").as_str(), Some(r#"{"id":1}"#));
    assert!(field(&result, "query").is_null());
}

#[tokio::test]
async fn test_request_policy_headers() {
    let addr = start_echo_server().await;
    let (invoker, _page) = invoker_for(
        ClientConfig::new(format!("http://{}", addr)).with_header("x-session", "s1"),
    );

    let result = invoker
        .build("saveUser", "abc")
        .call(&CallerContext::new("abc"), None)
        .await
        .unwrap();

    assert_eq!(field(&result, "method").as_str(), Some("POST"));
    assert_eq!(field(&result, "body").as_str(), Some("{}"));
    assert_eq!(field(&result, "session").as_str(), Some("s1"));
    assert_eq!(field(&result, "cacheControl").as_str(), Some("no-cache"));
    assert!(field(&result, "referer").is_null());
}

#[tokio::test]
async fn test_redirect_is_followed() {
    let addr = start_echo_server().await;
    let (invoker, page) =
        invoker_for(ClientConfig::new(format!("http://{}", addr)).with_prefix("moved"));

    let result = invoker
        .build("putUser", "abc")
        .call(&CallerContext::new("abc"), Some(json!({"name": "Ada"})))
        .await
        .unwrap();

    // 307 keeps the verb and body
    assert_eq!(field(&result, "method").as_str(), Some("PUT"));
    assert_eq!(field(&result, "path").as_str(), Some("/rpc/abc/putUser.json"));
    assert_eq!(field(&result, "body").as_str(), Some(r#"{"name":"Ada"}"#));
    assert_eq!(page.status(), Some(200));
}

#[tokio::test]
async fn test_non_success_status_passes_through() {
    let addr = start_echo_server().await;
    let (invoker, page) = invoker_for(ClientConfig::new(format!("http://{}", addr)));

    let result = invoker
        .build("brewTea", "abc")
        .call(&CallerContext::new("abc"), None)
        .await;

    assert!(result.is_some());
    assert_eq!(page.status(), Some(418));
    assert!(invoker.dispatch().is_responsive());
}

#[tokio::test]
async fn test_malformed_payload_over_http() {
    let addr = start_echo_server().await;
    let (invoker, page) = invoker_for(ClientConfig::new(format!("http://{}", addr)));

    let result = invoker
        .build("brokenPayload", "abc")
        .call(&CallerContext::new("abc"), None)
        .await;

    assert_eq!(result, None);
    assert_eq!(page.status(), Some(200));
    assert!(!invoker.dispatch().is_responsive());
    assert!(!invoker.dispatch().has_queue("brokenPayload"));
}

#[tokio::test]
async fn test_unreachable_server_is_absorbed() {
    // Reserve a port, then free it so nothing is listening
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let (invoker, page) = invoker_for(ClientConfig::new(format!("http://{}", addr)));
    let result = invoker
        .build("getUser", "abc")
        .call(&CallerContext::new("abc"), None)
        .await;

    assert_eq!(result, None);
    assert_eq!(page.status(), None);
    let dispatch = invoker.dispatch();
    assert!(!dispatch.is_responsive());
    assert!(!dispatch.is_fetching());
    assert!(!dispatch.has_queue("getUser"));
    assert!(dispatch.last_failure().unwrap().transport);
}

#[tokio::test]
async fn test_opt_in_timeout_is_absorbed() {
    let addr = start_echo_server().await;
    let (invoker, _page) = invoker_for(
        ClientConfig::new(format!("http://{}", addr))
            .with_request_timeout(Duration::from_millis(200)),
    );

    let result = invoker
        .build("slowCall", "abc")
        .call(&CallerContext::new("abc"), None)
        .await;

    assert_eq!(result, None);
    assert!(!invoker.dispatch().is_responsive());
    assert!(!invoker.dispatch().is_fetching());
    assert!(invoker.dispatch().last_failure().unwrap().transport);
}

#[tokio::test]
async fn test_timeout_while_reading_body_reports_duration() {
    let addr = start_echo_server().await;
    let (invoker, page) = invoker_for(
        ClientConfig::new(format!("http://{}", addr))
            .with_request_timeout(Duration::from_millis(300)),
    );

    let result = invoker
        .build("stallBody", "abc")
        .call(&CallerContext::new("abc"), None)
        .await;

    assert_eq!(result, None);
    assert_eq!(page.status(), Some(200));
    let failure = invoker.dispatch().last_failure().unwrap();
    assert!(failure.transport);
    assert!(failure.message.contains("300ms"), "{}", failure.message);
}

fn direct_request(addr: SocketAddr, path: &str, policy: RequestPolicy) -> RemoteRequest {
    RemoteRequest {
        verb: HttpVerb::Post,
        url: format!("http://{}{}", addr, path),
        headers: Default::default(),
        body: Some("{}".to_string()),
        policy,
    }
}

#[tokio::test]
async fn test_redirect_refused_when_policy_errors() {
    let addr = start_echo_server().await;
    let transport = HttpTransport::new().unwrap();
    let policy = RequestPolicy {
        redirect: RedirectMode::Error,
        ..RequestPolicy::REMOTE_CALL
    };

    let err = transport
        .send(direct_request(addr, "/moved/abc/saveUser.json", policy))
        .await
        .unwrap_err();
    assert!(matches!(err, WirecallError::Network { .. }), "{err:?}");

    // Non-redirected requests still go through under the same policy
    let response = transport
        .send(direct_request(addr, "/rpc/abc/saveUser.json", policy))
        .await
        .unwrap();
    assert_eq!(response.status(), 200);
}

#[tokio::test]
async fn test_referrer_policy_controls_redirect_referer() {
    let addr = start_echo_server().await;
    let transport = HttpTransport::new().unwrap();

    let body = transport
        .send(direct_request(
            addr,
            "/moved/abc/saveUser.json",
            RequestPolicy::REMOTE_CALL,
        ))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    let echoed: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(echoed["result"]["path"], "/rpc/abc/saveUser.json");
    assert!(echoed["result"]["referer"].is_null());

    let policy = RequestPolicy {
        referrer: ReferrerPolicy::Default,
        ..RequestPolicy::REMOTE_CALL
    };
    let body = transport
        .send(direct_request(addr, "/moved/abc/saveUser.json", policy))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    let echoed: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(echoed["result"]["path"], "/rpc/abc/saveUser.json");
    assert_eq!(
        echoed["result"]["referer"],
        format!("http://{}/moved/abc/saveUser.json", addr)
    );
}

#[tokio::test]
async fn test_many_concurrent_calls_drain() {
    let addr = start_echo_server().await;
    let (invoker, _page) = invoker_for(ClientConfig::new(format!("http://{}", addr)));
    let get_user = invoker.build("getUser", "abc");
    let caller = CallerContext::new("abc");

    let calls = (0..5).map(|id| get_user.call(&caller, Some(json!({ "id": id }))));
    let results = futures::future::join_all(calls).await;

    assert!(results.iter().all(Option::is_some));
    assert!(!invoker.dispatch().has_queue("getUser"));
    assert!(!invoker.dispatch().is_fetching());
}
