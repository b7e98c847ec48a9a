//! HTTP surface tests over a mock control API

use axum::Router;
use axum::body::{Body, to_bytes};
use axum::http::{Method, Request, StatusCode};
use serde_json::Value;
use syncpilot_cli::server::{AppState, ErrorResponse, create_router};
use syncpilot_core::control::Endpoint;
use syncpilot_core::{InstanceSnapshot, Phase};
use syncpilot_test_utils::{MockOutcome, ProgressBuilder, ProgressReply, TestHarness};
use tower::ServiceExt;

fn router(h: &TestHarness) -> Router {
    create_router(AppState::new(h.controller.clone()))
}

async fn send(app: Router, method: Method, uri: &str) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

mod operation_tests {
    use super::*;

    #[tokio::test]
    async fn test_start_returns_running_snapshot() {
        // Arrange
        let h = TestHarness::new();

        // Act
        let (status, body) = send(router(&h), Method::POST, "/start_sync/27601").await;

        // Assert
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["instance"], "27601");
        assert_eq!(body["message"], "Sync started on instance 27601");
        assert_eq!(body["snapshot"]["phase"], "running");
        assert_eq!(body["snapshot"]["monitoring"], true);
        assert_eq!(h.mock.calls_to(Endpoint::Start), 1);
        h.controller.shutdown().await;
    }

    #[tokio::test]
    async fn test_full_lifecycle_over_http() {
        let h = TestHarness::new();

        let (status, _) = send(router(&h), Method::POST, "/start_sync/27601").await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = send(router(&h), Method::POST, "/commit_sync/27601").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["snapshot"]["phase"], "committed");
        assert_eq!(body["snapshot"]["monitoring"], false);

        let (status, body) = send(router(&h), Method::POST, "/reverse_sync/27601").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["snapshot"]["phase"], "reversed");

        let (status, body) = send(router(&h), Method::POST, "/stop_sync/27601").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["snapshot"]["phase"], "stopped");
    }

    #[tokio::test]
    async fn test_invalid_transition_is_conflict() {
        let h = TestHarness::new();

        let (status, body) = send(router(&h), Method::POST, "/commit_sync/27601").await;

        assert_eq!(status, StatusCode::CONFLICT);
        let error: ErrorResponse = serde_json::from_value(body).unwrap();
        assert!(!error.success);
        assert_eq!(error.instance.as_deref(), Some("27601"));
        assert_eq!(error.code, "INVALID_TRANSITION");
        assert_eq!(error.error, "Cannot commit instance '27601' while it is idle");
        assert_eq!(h.mock.calls_to(Endpoint::Commit), 0);
    }

    #[tokio::test]
    async fn test_unknown_instance_is_not_found() {
        let h = TestHarness::new();

        let (status, body) = send(router(&h), Method::POST, "/start_sync/9999").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "UNKNOWN_INSTANCE");
        assert_eq!(body["success"], false);
        assert_eq!(body["instance"], "9999");
        assert_eq!(h.mock.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_control_failure_is_bad_gateway() {
        let h = TestHarness::new();
        h.mock.set_outcome(Endpoint::Start, MockOutcome::Unreachable);

        let (status, body) = send(router(&h), Method::POST, "/start_sync/27601").await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["code"], "CONTROL_API_FAILURE");
        assert_eq!(body["success"], false);
        assert_eq!(body["instance"], "27601");
        let snapshot = h.controller.snapshot(h.first()).await.unwrap();
        assert_eq!(snapshot.phase, Phase::Idle);
    }

    #[tokio::test]
    async fn test_rejected_start_names_instance() {
        let h = TestHarness::new();
        h.mock.set_outcome(Endpoint::Start, MockOutcome::Rejected);

        let (status, body) = send(router(&h), Method::POST, "/start_sync/27601").await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        let error: ErrorResponse = serde_json::from_value(body).unwrap();
        assert!(!error.success);
        assert_eq!(error.instance.as_deref(), Some("27601"));
        assert_eq!(error.error, "Instance '27601' refused start");
    }

    #[tokio::test]
    async fn test_concurrent_operation_is_conflict() {
        let h = TestHarness::new();
        h.mock.hold(Endpoint::Start);

        let app = router(&h);
        let first = tokio::spawn(send(app.clone(), Method::POST, "/start_sync/27601"));
        h.mock.wait_for_calls(Endpoint::Start, 1).await;

        let (status, body) = send(app, Method::POST, "/stop_sync/27601").await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["code"], "OPERATION_IN_PROGRESS");
        assert_eq!(body["success"], false);
        assert_eq!(body["instance"], "27601");

        h.mock.release(Endpoint::Start);
        let (status, _) = first.await.unwrap();
        assert_eq!(status, StatusCode::OK);
        h.controller.shutdown().await;
    }

    #[tokio::test]
    async fn test_get_is_not_an_operation() {
        let h = TestHarness::new();
        let request = Request::builder()
            .method(Method::GET)
            .uri("/start_sync/27601")
            .body(Body::empty())
            .unwrap();

        let response = router(&h).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(h.mock.total_calls(), 0);
    }
}

mod status_tests {
    use super::*;

    #[tokio::test]
    async fn test_status_refreshes_progress() {
        let h = TestHarness::new();
        h.mock
            .set_progress(h.first(), ProgressBuilder::new().lag(12).state("IDLE").reply());

        let (status, body) = send(router(&h), Method::GET, "/sync_status/27601").await;

        assert_eq!(status, StatusCode::OK);
        let snapshot: InstanceSnapshot = serde_json::from_value(body).unwrap();
        assert_eq!(snapshot.phase, Phase::Idle);
        assert_eq!(snapshot.progress.lag_seconds(), Some(12.0));
        assert!(snapshot.last_update.is_some());
        assert_eq!(h.mock.calls_to(Endpoint::Progress), 1);
    }

    #[tokio::test]
    async fn test_status_of_unreachable_instance_is_last_known() {
        let h = TestHarness::new();
        h.mock.set_progress(h.first(), ProgressReply::Unreachable);

        let (status, body) = send(router(&h), Method::GET, "/sync_status/27601").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["phase"], "idle");
        assert_eq!(body["last_update"], Value::Null);
    }

    #[tokio::test]
    async fn test_status_of_unknown_instance() {
        let h = TestHarness::new();

        let (status, body) = send(router(&h), Method::GET, "/sync_status/nope").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Unknown instance: nope");
        assert_eq!(body["instance"], "nope");
    }

    #[tokio::test]
    async fn test_list_instances_does_not_poll() {
        let h = TestHarness::new();

        let (status, body) = send(router(&h), Method::GET, "/instances").await;

        assert_eq!(status, StatusCode::OK);
        let snapshots: Vec<InstanceSnapshot> = serde_json::from_value(body).unwrap();
        let ids: Vec<_> = snapshots.iter().map(|s| s.instance.clone()).collect();
        assert_eq!(ids, h.ids);
        assert_eq!(h.mock.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_health() {
        let h = TestHarness::new();

        let (status, body) = send(router(&h), Method::GET, "/health").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }
}
