//! Operator operation tests
//!
//! Drive the controller against the mock control API and check phase
//! transitions, reservations and the calls that reach the instances.

use std::sync::Arc;
use std::time::Duration;
use syncpilot_core::control::Endpoint;
use syncpilot_core::*;
use syncpilot_test_utils::{MockOutcome, ProgressBuilder, ProgressReply, TestHarness};

#[cfg(test)]
mod start_tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_start_runs_and_monitors() {
        // Arrange
        let h = TestHarness::new();
        let id = h.first().clone();

        // Act
        let snapshot = h.controller.start(&id).await.unwrap();

        // Assert
        assert_eq!(snapshot.phase, Phase::Running);
        assert!(snapshot.monitoring);
        assert_eq!(h.mock.calls_for(&id, Endpoint::Start), 1);
        assert_eq!(h.mock.start_requests(), vec![StartRequest::default()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_start_is_rejected_without_call() {
        let h = TestHarness::new();
        let id = h.first().clone();
        h.controller.start(&id).await.unwrap();

        let err = h.controller.start(&id).await.unwrap_err();

        assert!(err.is_rejected_transition());
        assert!(matches!(
            err,
            Error::Transition(TransitionError::InvalidTransition {
                operation: Operation::Start,
                phase: Phase::Running,
                ..
            })
        ));
        assert_eq!(h.mock.calls_for(&id, Endpoint::Start), 1);
        assert_eq!(h.controller.snapshot(&id).await.unwrap().phase, Phase::Running);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_start_stays_idle() {
        let h = TestHarness::new();
        let id = h.first().clone();
        h.mock.set_outcome(Endpoint::Start, MockOutcome::Rejected);

        let err = h.controller.start(&id).await.unwrap_err();

        assert!(err.is_control_failure());
        let snapshot = h.controller.snapshot(&id).await.unwrap();
        assert_eq!(snapshot.phase, Phase::Idle);
        assert!(!snapshot.monitoring);

        // No monitor means no polling
        tokio::time::sleep(h.poll_interval() * 3).await;
        assert_eq!(h.mock.calls_to(Endpoint::Progress), 0);

        // A later start is still allowed
        h.mock.set_outcome(Endpoint::Start, MockOutcome::Success);
        let snapshot = h.controller.start(&id).await.unwrap();
        assert_eq!(snapshot.phase, Phase::Running);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreachable_start_reports_control_error() {
        let h = TestHarness::new();
        let id = h.first().clone();
        h.mock.set_outcome(Endpoint::Start, MockOutcome::Unreachable);

        let err = h.controller.start(&id).await.unwrap_err();

        match err {
            Error::Control(control) => {
                assert!(control.is_transient());
                assert_eq!(control.instance(), id.as_str());
            }
            other => panic!("expected control error, got {other:?}"),
        }
        assert_eq!(h.controller.snapshot(&id).await.unwrap().phase, Phase::Idle);
    }

    #[tokio::test]
    async fn test_start_from_stopped_is_rejected() {
        let h = TestHarness::new();
        let id = h.first().clone();
        h.controller.stop(&id).await.unwrap();

        let err = h.controller.start(&id).await.unwrap_err();

        assert!(err.is_rejected_transition());
        assert_eq!(h.mock.calls_to(Endpoint::Start), 0);
    }
}

#[cfg(test)]
mod stop_tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_stop_while_running_ends_monitoring() {
        let h = TestHarness::new();
        let id = h.first().clone();
        h.mock
            .set_progress(&id, ProgressBuilder::new().lag(30).can_commit(false).reply());
        h.controller.start(&id).await.unwrap();

        let snapshot = h.controller.stop(&id).await.unwrap();
        assert_eq!(snapshot.phase, Phase::Stopped);
        assert!(!snapshot.monitoring);

        let polls = h.mock.calls_to(Endpoint::Progress);
        tokio::time::sleep(h.poll_interval() * 3).await;

        assert_eq!(h.mock.calls_to(Endpoint::Progress), polls);
        assert_eq!(h.mock.calls_to(Endpoint::Commit), 0);
        assert_eq!(h.controller.snapshot(&id).await.unwrap().phase, Phase::Stopped);
    }

    #[tokio::test]
    async fn test_stop_from_idle() {
        let h = TestHarness::new();
        let id = h.first().clone();

        let snapshot = h.controller.stop(&id).await.unwrap();

        assert_eq!(snapshot.phase, Phase::Stopped);
        assert_eq!(h.mock.calls_for(&id, Endpoint::Stop), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_stop_keeps_running_and_monitoring() {
        let h = TestHarness::new();
        let id = h.first().clone();
        h.controller.start(&id).await.unwrap();
        h.mock.set_outcome(Endpoint::Stop, MockOutcome::HttpStatus(500));

        let err = h.controller.stop(&id).await.unwrap_err();

        assert!(err.is_control_failure());
        let snapshot = h.controller.snapshot(&id).await.unwrap();
        assert_eq!(snapshot.phase, Phase::Running);
        assert!(snapshot.monitoring);
    }
}

#[cfg(test)]
mod commit_and_reverse_tests {
    use super::*;

    #[tokio::test]
    async fn test_commit_requires_running() {
        let h = TestHarness::new();
        let id = h.first().clone();

        let err = h.controller.commit(&id).await.unwrap_err();

        assert!(err.is_rejected_transition());
        assert_eq!(h.mock.calls_to(Endpoint::Commit), 0);
        assert_eq!(h.controller.snapshot(&id).await.unwrap().phase, Phase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_manual_commit_from_running() {
        let h = TestHarness::new();
        let id = h.first().clone();
        h.controller.start(&id).await.unwrap();

        let snapshot = h.controller.commit(&id).await.unwrap();

        assert_eq!(snapshot.phase, Phase::Committed);
        assert!(!snapshot.monitoring);

        let polls = h.mock.calls_to(Endpoint::Progress);
        tokio::time::sleep(h.poll_interval() * 2).await;
        assert_eq!(h.mock.calls_to(Endpoint::Progress), polls);
    }

    #[tokio::test]
    async fn test_reverse_from_any_phase() {
        let h = TestHarness::new();
        let id = h.first().clone();

        let snapshot = h.controller.reverse(&id).await.unwrap();
        assert_eq!(snapshot.phase, Phase::Reversed);

        // Reversing again is a plain external call
        let snapshot = h.controller.reverse(&id).await.unwrap();
        assert_eq!(snapshot.phase, Phase::Reversed);
        assert_eq!(h.mock.calls_for(&id, Endpoint::Reverse), 2);
    }

    #[tokio::test]
    async fn test_failed_reverse_keeps_phase() {
        let h = TestHarness::new();
        let id = h.first().clone();
        h.controller.stop(&id).await.unwrap();
        h.mock.set_outcome(Endpoint::Reverse, MockOutcome::Rejected);

        let err = h.controller.reverse(&id).await.unwrap_err();

        assert!(matches!(err, Error::Control(ControlError::Rejected { .. })));
        assert_eq!(h.controller.snapshot(&id).await.unwrap().phase, Phase::Stopped);
    }
}

#[cfg(test)]
mod query_tests {
    use super::*;

    #[tokio::test]
    async fn test_query_records_progress() {
        let h = TestHarness::new();
        let id = h.first().clone();
        h.mock
            .set_progress(&id, ProgressBuilder::new().lag(7).can_commit(false).reply());

        let snapshot = h.controller.query(&id).await.unwrap();

        assert_eq!(snapshot.phase, Phase::Idle);
        assert_eq!(snapshot.progress.lag_seconds(), Some(7.0));
        assert!(snapshot.last_update.is_some());
    }

    #[tokio::test]
    async fn test_failed_query_returns_last_known_snapshot() {
        let h = TestHarness::new();
        let id = h.first().clone();
        h.mock.script_progress(
            &id,
            [ProgressBuilder::new().lag(4).reply(), ProgressReply::Unreachable],
        );
        let before = h.controller.query(&id).await.unwrap();

        let after = h.controller.query(&id).await.unwrap();

        assert_eq!(after, before);
        assert_eq!(h.mock.calls_for(&id, Endpoint::Progress), 2);
    }

    #[tokio::test]
    async fn test_query_without_progress_document() {
        let h = TestHarness::new();
        let id = h.first().clone();
        h.mock.set_progress(&id, ProgressReply::Empty);

        let snapshot = h.controller.query(&id).await.unwrap();

        assert!(snapshot.progress.is_empty());
        assert!(snapshot.last_update.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_query_adopts_running_instance() {
        let h = TestHarness::new();
        let id = h.first().clone();
        h.mock
            .set_progress(&id, ProgressBuilder::new().lag(20).running().reply());

        let snapshot = h.controller.query(&id).await.unwrap();

        assert_eq!(snapshot.phase, Phase::Running);
        assert!(snapshot.monitoring);
        assert_eq!(h.mock.calls_to(Endpoint::Start), 0);
    }

    #[tokio::test]
    async fn test_query_through_execute() {
        let h = TestHarness::new();
        let id = h.first().clone();

        let snapshot = h.controller.execute(&id, Operation::Query).await.unwrap();

        assert_eq!(snapshot.instance, id);
        assert_eq!(h.mock.calls_for(&id, Endpoint::Progress), 1);
    }

    #[tokio::test]
    async fn test_empty_progress_document_keeps_last_snapshot() {
        let h = TestHarness::new();
        let id = h.first().clone();
        h.mock.script_progress(
            &id,
            [ProgressBuilder::new().lag(6).reply(), ProgressBuilder::new().reply()],
        );
        let before = h.controller.query(&id).await.unwrap();

        let after = h.controller.query(&id).await.unwrap();

        assert_eq!(after, before);
        assert_eq!(after.progress.lag_seconds(), Some(6.0));
    }

    /// Run `operations` on the first instance, then have it report RUNNING
    /// and ready to commit, query it and let two poll intervals pass
    async fn running_report_after(h: &TestHarness, operations: &[Operation]) -> InstanceSnapshot {
        let id = h.first().clone();
        for operation in operations {
            h.controller.execute(&id, *operation).await.unwrap();
        }
        h.mock.set_progress(&id, ProgressBuilder::caught_up().reply());

        let snapshot = h.controller.query(&id).await.unwrap();
        tokio::time::sleep(h.poll_interval() * 2 + Duration::from_secs(1)).await;
        snapshot
    }

    #[tokio::test(start_paused = true)]
    async fn test_running_report_does_not_revive_stopped_instance() {
        let h = TestHarness::new();

        let snapshot = running_report_after(&h, &[Operation::Start, Operation::Stop]).await;

        assert_eq!(snapshot.phase, Phase::Stopped);
        assert!(!snapshot.monitoring);
        assert_eq!(snapshot.progress.lag_seconds(), Some(0.0));
        assert_eq!(h.controller.snapshot(h.first()).await.unwrap().phase, Phase::Stopped);
        assert_eq!(h.mock.calls_to(Endpoint::Commit), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_running_report_does_not_revive_committed_instance() {
        let h = TestHarness::new();

        let snapshot = running_report_after(&h, &[Operation::Start, Operation::Commit]).await;

        assert_eq!(snapshot.phase, Phase::Committed);
        assert!(!snapshot.monitoring);
        assert_eq!(h.controller.snapshot(h.first()).await.unwrap().phase, Phase::Committed);
        assert_eq!(h.mock.calls_to(Endpoint::Commit), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_running_report_after_reverse_is_not_auto_committed() {
        let h = TestHarness::new();

        let snapshot =
            running_report_after(&h, &[Operation::Start, Operation::Stop, Operation::Reverse])
                .await;

        assert_eq!(snapshot.phase, Phase::Reversed);
        assert!(!snapshot.monitoring);
        let later = h.controller.snapshot(h.first()).await.unwrap();
        assert_eq!(later.phase, Phase::Reversed);
        assert!(!later.monitoring);
        assert_eq!(h.mock.calls_to(Endpoint::Commit), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_running_report_does_not_undo_stop() {
        let h = TestHarness::new();
        let id = h.first().clone();
        h.controller.start(&id).await.unwrap();
        h.mock.wait_for_calls(Endpoint::Progress, 1).await;

        // A query reads RUNNING, but its answer arrives after the stop
        h.mock
            .set_progress(&id, ProgressBuilder::new().lag(10).running().reply());
        h.mock.hold(Endpoint::Progress);
        let polls = h.mock.calls_to(Endpoint::Progress);
        let query = {
            let controller = h.controller.clone();
            let id = id.clone();
            tokio::spawn(async move { controller.query(&id).await })
        };
        h.mock.wait_for_calls(Endpoint::Progress, polls + 1).await;

        let stopped = h.controller.stop(&id).await.unwrap();
        assert_eq!(stopped.phase, Phase::Stopped);

        h.mock.release(Endpoint::Progress);
        let snapshot = query.await.unwrap().unwrap();

        assert_eq!(snapshot.phase, Phase::Stopped);
        assert!(!snapshot.monitoring);
        assert_eq!(snapshot.progress.lag_seconds(), Some(10.0));
        assert_eq!(h.controller.snapshot(&id).await.unwrap().phase, Phase::Stopped);
    }
}

#[cfg(test)]
mod concurrency_tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_operation_in_progress_is_rejected() {
        let h = TestHarness::new();
        let id = h.first().clone();
        h.mock.hold(Endpoint::Start);

        let first = {
            let controller = h.controller.clone();
            let id = id.clone();
            tokio::spawn(async move { controller.start(&id).await })
        };
        h.mock.wait_for_calls(Endpoint::Start, 1).await;

        let err = h.controller.start(&id).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Transition(TransitionError::OperationInProgress {
                operation: Operation::Start,
                pending: Operation::Start,
                ..
            })
        ));
        let err = h.controller.stop(&id).await.unwrap_err();
        assert!(err.is_rejected_transition());
        assert_eq!(h.mock.calls_to(Endpoint::Stop), 0);

        // Queries never wait for the reservation
        let snapshot = h.controller.query(&id).await.unwrap();
        assert_eq!(snapshot.phase, Phase::Idle);

        h.mock.release(Endpoint::Start);
        let snapshot = first.await.unwrap().unwrap();
        assert_eq!(snapshot.phase, Phase::Running);
        assert_eq!(h.mock.calls_to(Endpoint::Start), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_caller_does_not_leave_instance_reserved() {
        let h = TestHarness::new();
        let id = h.first().clone();
        h.mock.hold(Endpoint::Stop);

        let caller = {
            let controller = h.controller.clone();
            let id = id.clone();
            tokio::spawn(async move { controller.stop(&id).await })
        };
        h.mock.wait_for_calls(Endpoint::Stop, 1).await;
        caller.abort();
        h.mock.release(Endpoint::Stop);

        for _ in 0..10 {
            if h.controller.snapshot(&id).await.unwrap().phase == Phase::Stopped {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(h.controller.snapshot(&id).await.unwrap().phase, Phase::Stopped);

        let snapshot = h.controller.reverse(&id).await.unwrap();
        assert_eq!(snapshot.phase, Phase::Reversed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_instances_are_independent() {
        let h = TestHarness::new();
        let a = h.ids[0].clone();
        let b = h.ids[1].clone();
        h.mock.hold(Endpoint::Start);

        let held = {
            let controller = h.controller.clone();
            let a = a.clone();
            tokio::spawn(async move { controller.start(&a).await })
        };
        h.mock.wait_for_calls(Endpoint::Start, 1).await;

        // A held call on one instance does not reserve another
        let snapshot = h.controller.stop(&b).await.unwrap();
        assert_eq!(snapshot.phase, Phase::Stopped);

        h.mock.release(Endpoint::Start);
        held.await.unwrap().unwrap();
        assert_eq!(h.controller.snapshot(&a).await.unwrap().phase, Phase::Running);
        assert_eq!(h.controller.snapshot(&b).await.unwrap().phase, Phase::Stopped);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_queries_never_observe_torn_snapshots() {
        let h = TestHarness::new();
        let id = h.first().clone();
        h.mock.script_progress(
            &id,
            (0..50u64).map(|i| {
                ProgressBuilder::new()
                    .lag(i)
                    .field("sequence", serde_json::json!(i))
                    .reply()
            }),
        );

        let controller = Arc::new(h.controller.clone());
        let tasks: Vec<_> = (0..50)
            .map(|_| {
                let controller = controller.clone();
                let id = id.clone();
                tokio::spawn(async move { controller.query(&id).await })
            })
            .collect();

        for task in futures::future::join_all(tasks).await {
            let snapshot = task.unwrap().unwrap();
            let lag = snapshot.progress.lag_seconds().unwrap();
            let sequence = snapshot.progress.get("sequence").and_then(|v| v.as_f64());
            assert_eq!(Some(lag), sequence);
            assert!(snapshot.last_update.is_some());
        }
    }
}

#[cfg(test)]
mod lifecycle_tests {
    use super::*;

    #[tokio::test]
    async fn test_unknown_instance() {
        let h = TestHarness::new();
        let unknown = InstanceId::from("27699");

        assert!(h.controller.start(&unknown).await.unwrap_err().is_unknown_instance());
        assert!(h.controller.query(&unknown).await.unwrap_err().is_unknown_instance());
        assert!(h.controller.snapshot(&unknown).await.unwrap_err().is_unknown_instance());
        assert_eq!(h.mock.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_snapshots_list_every_instance() {
        let h = TestHarness::new();

        let snapshots = h.controller.snapshots().await;

        assert_eq!(snapshots.len(), 3);
        assert!(snapshots.iter().all(|s| s.phase == Phase::Idle));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_stops_monitors_and_keeps_phases() {
        let h = TestHarness::new();
        h.controller.start(&h.ids[0]).await.unwrap();
        h.controller.start(&h.ids[1]).await.unwrap();

        h.controller.shutdown().await;

        assert!(h.controller.is_closed());
        for id in &h.ids[..2] {
            let snapshot = h.controller.snapshot(id).await.unwrap();
            assert_eq!(snapshot.phase, Phase::Running);
            assert!(!snapshot.monitoring);
        }

        let polls = h.mock.calls_to(Endpoint::Progress);
        tokio::time::sleep(h.poll_interval() * 3).await;
        assert_eq!(h.mock.calls_to(Endpoint::Progress), polls);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_after_shutdown_spawns_no_monitor() {
        let h = TestHarness::new();
        h.controller.shutdown().await;

        let snapshot = h.controller.start(h.first()).await.unwrap();

        assert_eq!(snapshot.phase, Phase::Running);
        assert!(!snapshot.monitoring);
    }
}
