//! Integration tests for pagination

use super::*;
use overdrive_reports::{
    FileSink, InMemorySink, PaginationWalker, ReportsError, StorageSink, TerminalHttpError,
    WalkOptions, WalkState,
};
use wiremock::matchers::query_param;

#[tokio::test]
async fn test_walk_writes_every_page_in_order() {
    let server = setup_mock_server().await;
    mount_token(&server, "tok", 3600).await;

    Mock::given(method("GET"))
        .and(path("/v1/checkouts"))
        .and(query_param("startDateUtc", "2024-01-01"))
        .and(query_param("endDateUtc", "2024-01-03"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "checkouts": [{"id": 1}],
            "nextPageUrl": format!("{}/v1/checkouts?page=2", server.uri()),
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/checkouts"))
        .and(query_param("page", "2"))
        .and(query_param("startDateUtc", "2024-01-01"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "checkouts": [{"id": 2}],
            "nextPageUrl": "checkouts?page=3",
        })))
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/checkouts"))
        .and(query_param("page", "3"))
        .and(query_param("endDateUtc", "2024-01-03"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "checkouts": [{"id": 3}],
            "nextPageUrl": null,
        })))
        .with_priority(1)
        .expect(1)
        .mount(&server)
        .await;

    let t = test_client(config_for(&server, 2));
    let output = tempfile::tempdir().unwrap();
    let mut sink = FileSink::timestamped(output.path(), epoch());

    let mut walker = PaginationWalker::new(&t.client, "checkouts", dates(), WalkOptions::new());
    let summary = walker.walk(&mut sink).await.unwrap();

    assert_eq!(summary.pages_delivered, 3);
    assert_eq!(summary.last_cursor.as_deref(), Some("checkouts?page=3"));
    assert_eq!(walker.state(), &WalkState::Done);
    assert!(sink.dir().ends_with("overdrive_20240101_000000"));

    let ids: Vec<serde_json::Value> = sink
        .written()
        .iter()
        .map(|file| {
            let envelope: serde_json::Value =
                serde_json::from_slice(&std::fs::read(file).unwrap()).unwrap();
            envelope["body"]["checkouts"][0]["id"].clone()
        })
        .collect();
    assert_eq!(ids, vec![json!(1), json!(2), json!(3)]);
}

#[tokio::test]
async fn test_walk_stops_on_terminal_status_when_required() {
    let server = setup_mock_server().await;
    mount_token(&server, "tok", 3600).await;

    Mock::given(method("GET"))
        .and(path("/v1/checkouts"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"nextPageUrl": "checkouts?page=2"})),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/checkouts"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(500).set_body_string("report unavailable"))
        .with_priority(1)
        .expect(2)
        .mount(&server)
        .await;

    let t = test_client(config_for(&server, 1));
    let mut sink = InMemorySink::new();
    let mut walker = PaginationWalker::new(
        &t.client,
        "checkouts",
        vec![],
        WalkOptions::new().with_require_success(true),
    );

    let error = walker.walk(&mut sink).await.unwrap_err();
    match error {
        ReportsError::Http(TerminalHttpError { status, body, .. }) => {
            assert_eq!(status, 500);
            assert_eq!(body, "report unavailable");
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert_eq!(sink.len(), 1);
    assert_eq!(walker.state().pending_cursor(), Some("checkouts?page=2"));
}

#[tokio::test]
async fn test_walk_resumes_from_recorded_cursor() {
    let server = setup_mock_server().await;
    mount_token(&server, "tok", 3600).await;

    Mock::given(method("GET"))
        .and(path("/v1/checkouts"))
        .and(query_param("page", "4"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"nextPageUrl": ""})))
        .expect(1)
        .mount(&server)
        .await;

    let t = test_client(config_for(&server, 0));
    let mut sink = InMemorySink::new();
    let summary = PaginationWalker::new(
        &t.client,
        "checkouts",
        dates(),
        WalkOptions::new().resume_from("checkouts?page=4"),
    )
    .walk(&mut sink as &mut dyn StorageSink)
    .await
    .unwrap();

    assert_eq!(summary.pages_delivered, 1);
    assert_eq!(sink.pages()[0].sequence, 1);
}
