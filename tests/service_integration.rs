//! Integration tests for the HTTP service client, the connectivity probe, and
//! phase concurrency against live mock servers.

mod support;
use support::harness;
use support::socket_guard::{closed_port, socket_skip_return, start_mock_pair_or_skip, start_mock_server_or_skip};

use std::sync::Arc;
use std::time::Duration;

use loadtest_core::service::{DataOwner, HttpTargetService, TargetService};
use loadtest_core::{
    ConnectivityProbe, HostCheck, Identity, MemorySessionStore, ProbeTarget, RequestError,
    SessionArtifact, identities,
};
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_partial_json, body_string, header, method, path};
use wiremock::{Mock, ResponseTemplate};

// ==================== HTTP Service Tests ====================

#[tokio::test]
async fn test_register_posts_identity_json() {
    let Some((auth, profile)) = start_mock_pair_or_skip().await else {
        return socket_skip_return();
    };
    Mock::given(method("POST"))
        .and(path("/register"))
        .and(body_partial_json(json!({
            "username": "user12",
            "password": "user12",
            "name": "User 12",
            "email": "user12@example.com",
            "contact": "+91 9876540012",
            "address": "1200 Main St, Anytown, AnyState",
        })))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&auth)
        .await;

    let service =
        HttpTargetService::new(harness::endpoints(&auth, &profile, None), Duration::from_secs(5))
            .unwrap();
    let status = service.register(&Identity::from_index(12)).await.unwrap();
    assert_eq!(status, 200);
}

#[tokio::test]
async fn test_login_captures_cookies_without_following_redirect() {
    let Some((auth, profile)) = start_mock_pair_or_skip().await else {
        return socket_skip_return();
    };
    Mock::given(method("POST"))
        .and(path("/login"))
        .and(body_string("username=user1&password=user1"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("Location", "/dashboard")
                .append_header("Set-Cookie", "sid=abc123; Path=/")
                .append_header("Set-Cookie", "csrf=xyz; Path=/"),
        )
        .mount(&auth)
        .await;
    Mock::given(method("GET"))
        .and(path("/dashboard"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&auth)
        .await;

    let service =
        HttpTargetService::new(harness::endpoints(&auth, &profile, None), Duration::from_secs(5))
            .unwrap();
    let response = service.login("user1", "user1").await.unwrap();

    assert_eq!(response.status, 302);
    assert_eq!(
        response.artifact,
        Some(SessionArtifact::new("sid=abc123; csrf=xyz"))
    );
}

#[tokio::test]
async fn test_login_without_cookies_has_no_artifact() {
    let Some((auth, profile)) = start_mock_pair_or_skip().await else {
        return socket_skip_return();
    };
    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&auth)
        .await;

    let service =
        HttpTargetService::new(harness::endpoints(&auth, &profile, None), Duration::from_secs(5))
            .unwrap();
    let response = service.login("user1", "user1").await.unwrap();
    assert_eq!(response.status, 200);
    assert!(response.artifact.is_none());
}

#[tokio::test]
async fn test_logout_sends_stored_cookie() {
    let Some((auth, profile)) = start_mock_pair_or_skip().await else {
        return socket_skip_return();
    };
    Mock::given(method("GET"))
        .and(path("/logout"))
        .and(header("cookie", "sid=abc123"))
        .respond_with(ResponseTemplate::new(302))
        .expect(1)
        .mount(&auth)
        .await;

    let service =
        HttpTargetService::new(harness::endpoints(&auth, &profile, None), Duration::from_secs(5))
            .unwrap();
    let status = service
        .logout(&SessionArtifact::new("sid=abc123"))
        .await
        .unwrap();
    assert_eq!(status, 302);
}

#[tokio::test]
async fn test_clear_data_hits_owning_service() {
    let Some((auth, profile)) = start_mock_pair_or_skip().await else {
        return socket_skip_return();
    };
    Mock::given(method("POST"))
        .and(path("/clearData"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&auth)
        .await;
    Mock::given(method("POST"))
        .and(path("/clearData"))
        .respond_with(ResponseTemplate::new(404))
        .expect(1)
        .mount(&profile)
        .await;

    let service =
        HttpTargetService::new(harness::endpoints(&auth, &profile, None), Duration::from_secs(5))
            .unwrap();
    assert_eq!(service.clear_data(DataOwner::Auth, "user3").await.unwrap(), 200);
    assert_eq!(
        service.clear_data(DataOwner::Profile, "user3").await.unwrap(),
        404
    );
}

#[tokio::test]
async fn test_slow_response_is_timeout_error() {
    let Some((auth, profile)) = start_mock_pair_or_skip().await else {
        return socket_skip_return();
    };
    Mock::given(method("POST"))
        .and(path("/register"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&auth)
        .await;

    let service = HttpTargetService::new(
        harness::endpoints(&auth, &profile, None),
        Duration::from_millis(200),
    )
    .unwrap();
    let err = service.register(&Identity::from_index(1)).await.unwrap_err();
    assert!(matches!(err, RequestError::Timeout { .. }), "got {err:?}");
}

// ==================== Probe Tests ====================

fn target(server_uri: &str, route: &str, name: &str) -> ProbeTarget {
    ProbeTarget {
        url: Url::parse(server_uri).unwrap().join(route).unwrap(),
        name: name.to_string(),
    }
}

#[tokio::test]
async fn test_probe_accepts_success_redirect_and_not_found() {
    let Some(server) = start_mock_server_or_skip().await else {
        return socket_skip_return();
    };
    Mock::given(method("GET"))
        .and(path("/ok"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/moved"))
        .respond_with(ResponseTemplate::new(301).insert_header("Location", "/elsewhere"))
        .mount(&server)
        .await;

    let probe = ConnectivityProbe::new(
        "127.0.0.1",
        vec![
            target(&server.uri(), "ok", "ok"),
            target(&server.uri(), "moved", "moved"),
            target(&server.uri(), "missing", "missing"),
        ],
        HostCheck::Skip,
        Duration::from_secs(2),
    )
    .unwrap();

    let report = probe.run().await;
    assert!(report.all_reachable());
    let statuses: Vec<Option<u16>> = report.endpoints.iter().map(|e| e.status).collect();
    assert_eq!(statuses, [Some(200), Some(301), Some(404)]);
}

#[tokio::test]
async fn test_probe_rejects_server_error_and_closed_port() {
    let Some(server) = start_mock_server_or_skip().await else {
        return socket_skip_return();
    };
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let closed = format!("http://127.0.0.1:{}/", closed_port());
    let probe = ConnectivityProbe::new(
        "127.0.0.1",
        vec![
            target(&server.uri(), "/", "Authentication service"),
            target(&closed, "/", "Customer info service"),
        ],
        HostCheck::Skip,
        Duration::from_secs(2),
    )
    .unwrap();

    let report = probe.run().await;
    assert!(!report.all_reachable());
    assert_eq!(
        report.unreachable("127.0.0.1"),
        ["Authentication service", "Customer info service"]
    );
    assert_eq!(report.endpoints[0].status, Some(500));
    assert!(report.endpoints[1].error.is_some());
}

#[tokio::test]
async fn test_tcp_host_check_gates_http_probes() {
    let Some(server) = start_mock_server_or_skip().await else {
        return socket_skip_return();
    };
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let probe = ConnectivityProbe::new(
        "127.0.0.1",
        vec![target(&server.uri(), "/", "Authentication service")],
        HostCheck::Tcp(closed_port()),
        Duration::from_secs(2),
    )
    .unwrap();

    let report = probe.run().await;
    assert!(!report.host_reachable);
    assert!(report.endpoints.is_empty());
}

#[tokio::test]
async fn test_tcp_host_check_passes_for_listening_port() {
    let Some(server) = start_mock_server_or_skip().await else {
        return socket_skip_return();
    };
    let port = server.address().port();

    let probe = ConnectivityProbe::new(
        "127.0.0.1",
        vec![target(&server.uri(), "/", "Authentication service")],
        HostCheck::Tcp(port),
        Duration::from_secs(2),
    )
    .unwrap();

    assert!(probe.run().await.all_reachable());
}

// ==================== Concurrency Tests ====================

#[tokio::test]
async fn test_ceiling_serializes_slow_registrations() {
    let Some((auth, profile)) = start_mock_pair_or_skip().await else {
        return socket_skip_return();
    };
    Mock::given(method("POST"))
        .and(path("/register"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(100)))
        .expect(10)
        .mount(&auth)
        .await;

    let executor = harness::executor(
        harness::endpoints(&auth, &profile, None),
        Arc::new(MemorySessionStore::new()),
        1,
    );
    let summary = executor.register(identities(1..=10), 2).await.unwrap();

    assert_eq!(summary.processed, 10);
    assert!(summary.peak_in_flight <= 2);
    assert!(
        summary.elapsed >= Duration::from_millis(500),
        "elapsed {:?}",
        summary.elapsed
    );
    assert_eq!(executor.stats().registered_count(), 10);
}

#[tokio::test]
async fn test_retry_exhaustion_makes_exactly_max_attempts() {
    let Some((auth, profile)) = start_mock_pair_or_skip().await else {
        return socket_skip_return();
    };
    Mock::given(method("POST"))
        .and(path("/register"))
        .respond_with(ResponseTemplate::new(502))
        .expect(3)
        .mount(&auth)
        .await;

    let executor = harness::executor(
        harness::endpoints(&auth, &profile, None),
        Arc::new(MemorySessionStore::new()),
        3,
    );
    executor.register(identities(1..=1), 5).await.unwrap();

    let snapshot = executor.stats().snapshot();
    assert_eq!(snapshot.register_failed, 1);
    assert!(snapshot.registered.is_empty());
}
