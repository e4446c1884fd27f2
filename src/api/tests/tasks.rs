use super::*;
use crate::orchestrator::test_helpers::wait_until;

#[tokio::test]
async fn start_reports_started_then_queued_then_no_op() {
    let (app, orchestrator, _fetcher, gate) = test_app();

    let (status, body) = send(&app, "POST", "/tasks", Some(work_json("a", 3))).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["status"], "started");

    let (status, body) = send(&app, "POST", "/tasks", Some(work_json("b", 3))).await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body, serde_json::json!({"status": "queued", "position": 0}));

    let (status, body) = send(&app, "POST", "/tasks", Some(work_json("a", 3))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "already_running");

    let (status, body) = send(&app, "POST", "/tasks", Some(work_json("b", 3))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "already_queued");

    release_and_shutdown(&orchestrator, &gate).await;
}

#[tokio::test]
async fn start_without_chapters_is_unprocessable() {
    let (app, _orchestrator, _fetcher, _gate) = test_app();

    let (status, body) = send(&app, "POST", "/tasks", Some(work_json("a", 0))).await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["error"]["code"], "no_chapters");
}

#[tokio::test]
async fn start_during_shutdown_is_unavailable() {
    let (app, orchestrator, _fetcher, _gate) = test_app();
    orchestrator.shutdown().await.unwrap();

    let (status, body) = send(&app, "POST", "/tasks", Some(work_json("a", 3))).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"]["code"], "shutting_down");
}

#[tokio::test]
async fn snapshot_and_task_state() {
    let (app, orchestrator, _fetcher, gate) = test_app();
    send(&app, "POST", "/tasks", Some(work_json("a", 6))).await;
    send(&app, "POST", "/tasks", Some(work_json("b", 3))).await;

    let (status, body) = send(&app, "GET", "/tasks", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["active"], "a");
    assert_eq!(body["queue"], serde_json::json!(["b"]));
    assert_eq!(
        body["tasks"]["a"],
        serde_json::json!({"current": 0, "total": 6, "status": "running"})
    );

    let (status, body) = send(&app, "GET", "/tasks/a", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 6);

    let (status, body) = send(&app, "GET", "/tasks/b", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "task_not_found");

    let (_, body) = send(&app, "GET", "/queue", None).await;
    assert_eq!(body, serde_json::json!(["b"]));

    release_and_shutdown(&orchestrator, &gate).await;
}

#[tokio::test]
async fn pause_resume_and_stop_round_trip() {
    let (app, orchestrator, _fetcher, gate) = test_app();
    send(&app, "POST", "/tasks", Some(work_json("a", 6))).await;

    let (status, _) = send(&app, "POST", "/tasks/a/pause", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, body) = send(&app, "GET", "/tasks/a", None).await;
    assert_eq!(body["status"], "paused");

    let (status, _) = send(&app, "POST", "/tasks/a/resume", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, body) = send(&app, "GET", "/tasks/a", None).await;
    assert_eq!(body["status"], "running");

    let (status, _) = send(&app, "DELETE", "/tasks/a", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, "GET", "/tasks/a", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    for uri in ["/tasks/a/pause", "/tasks/a/resume"] {
        let (status, _) = send(&app, "POST", uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
    }
    let (status, _) = send(&app, "DELETE", "/tasks/a", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    release_and_shutdown(&orchestrator, &gate).await;
}

#[tokio::test]
async fn prioritize_moves_queued_work_into_the_slot() {
    let (app, orchestrator, fetcher, gate) = test_app();
    send(&app, "POST", "/tasks", Some(work_json("a", 6))).await;
    send(&app, "POST", "/tasks", Some(work_json("b", 3))).await;
    wait_until("a's batch in flight", || fetcher.in_flight() == 3).await;

    let (status, body) = send(&app, "POST", "/tasks/b/prioritize", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        serde_json::json!({"outcome": "started", "displaced": "a"})
    );
    assert_eq!(orchestrator.active_id(), Some("b".into()));

    let (status, _) = send(&app, "POST", "/tasks/ghost/prioritize", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    release_and_shutdown(&orchestrator, &gate).await;
}

#[tokio::test]
async fn queue_entries_can_be_removed() {
    let (app, orchestrator, _fetcher, gate) = test_app();
    send(&app, "POST", "/tasks", Some(work_json("a", 3))).await;
    send(&app, "POST", "/tasks", Some(work_json("b", 3))).await;

    let (status, _) = send(&app, "DELETE", "/queue/b", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = send(&app, "DELETE", "/queue/b", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    // The active work is not in the queue
    let (status, _) = send(&app, "DELETE", "/queue/a", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    release_and_shutdown(&orchestrator, &gate).await;
}

#[tokio::test]
async fn url_work_ids_are_percent_decoded() {
    let (app, orchestrator, _fetcher, gate) = test_app();
    let id = "https://example.com/novel/7";
    send(&app, "POST", "/tasks", Some(work_json(id, 3))).await;

    let uri = format!("/tasks/{}", urlencoding::encode(id));
    let (status, body) = send(&app, "GET", &uri, None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 3);
    release_and_shutdown(&orchestrator, &gate).await;
}
