use crate::helpers::{InMemoryStore, RecordingSink, TestApp, build_json, test_settings, wait_until};
use std::sync::Arc;
use std::time::Duration;
use travisbot::{Application, HOW_REPLY, START_REPLY, STOP_REPLY, UNKNOWN_REPLY};
use wiremock::{
    Mock, MockServer, ResponseTemplate,
    matchers::{method, path},
};

struct Harness {
    app: TestApp,
    store: Arc<InMemoryStore>,
    sink: Arc<RecordingSink>,
    application: Application,
}

async fn spawn_app(api_base_url: String) -> Harness {
    let store = Arc::new(InMemoryStore::default());
    let sink = Arc::new(RecordingSink::default());
    let application =
        Application::build_with(test_settings(api_base_url), store.clone(), sink.clone()).unwrap();
    let app = TestApp::serve(application.router.clone()).await;
    Harness {
        app,
        store,
        sink,
        application,
    }
}

#[tokio::test]
async fn health_check_works() {
    let harness = spawn_app("http://127.0.0.1:9".to_string()).await;

    let response = harness
        .app
        .client()
        .get(harness.app.get_url("/health"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(response.text().await.unwrap(), "OK");
    harness.application.shutdown().await;
}

#[tokio::test]
async fn how_and_unknown_commands_are_answered() {
    let harness = spawn_app("http://127.0.0.1:9".to_string()).await;

    assert_eq!(harness.app.send_text(77, "/how").await.status(), 200);
    assert_eq!(harness.app.send_text(77, "good morning").await.status(), 200);

    assert_eq!(harness.sink.messages_for(77), vec![HOW_REPLY, UNKNOWN_REPLY]);
    harness.application.shutdown().await;
}

#[tokio::test]
async fn registering_a_link_starts_notifications() {
    // Arrange
    let travis = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/repos/emberjs/ember.js"))
        .respond_with(ResponseTemplate::new(200).set_body_json(build_json(43, "passed", "OK")))
        .mount(&travis)
        .await;
    let harness = spawn_app(travis.uri()).await;

    // Act
    let response = harness
        .app
        .send_text(5, "https://travis-ci.org/emberjs/ember.js")
        .await;

    // Assert
    assert_eq!(response.status(), 200);
    let subscription = harness.store.get(5).unwrap();
    assert_eq!(subscription.source_url, "https://travis-ci.org/emberjs/ember.js");
    assert_eq!(
        subscription.status_url,
        format!("{}/repos/emberjs/ember.js", travis.uri())
    );

    let sink = harness.sink.clone();
    let notified = wait_until(Duration::from_secs(4), || sink.messages_for(5).len() == 2).await;
    assert!(notified, "no build notification arrived");
    let messages = harness.sink.messages_for(5);
    assert_eq!(messages[0], START_REPLY);
    assert!(messages[1].contains("Build #43 passed"));

    let link = harness.app.send_text(5, "/link").await;
    assert_eq!(link.status(), 200);
    assert_eq!(
        harness.sink.messages_for(5).last().unwrap(),
        "https://travis-ci.org/emberjs/ember.js"
    );
    harness.application.shutdown().await;
}

#[tokio::test]
async fn stop_suppresses_build_messages_but_still_records_builds() {
    // Arrange
    let travis = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(build_json(8, "errored", "")))
        .mount(&travis)
        .await;
    let harness = spawn_app(travis.uri()).await;

    // Act
    harness.app.send_text(6, "/stop").await;
    harness
        .app
        .send_text(6, "https://travis-ci.com/owner/repo")
        .await;
    let store = harness.store.clone();
    let recorded = wait_until(Duration::from_secs(4), || {
        store.get(6).and_then(|s| s.curr_build) == Some(8)
    })
    .await;
    harness.app.send_text(6, "/start").await;
    tokio::time::sleep(Duration::from_millis(1500)).await;

    // Assert
    assert!(recorded, "build was not persisted while stopped");
    assert_eq!(
        harness.sink.messages_for(6),
        vec![STOP_REPLY, START_REPLY, START_REPLY]
    );
    harness.application.shutdown().await;
}

#[tokio::test]
async fn delete_forgets_the_subscription() {
    let harness = spawn_app("http://127.0.0.1:9".to_string()).await;

    harness
        .app
        .send_text(8, "https://travis-ci.org/owner/repo")
        .await;
    assert!(harness.store.get(8).is_some());

    harness.app.send_text(8, "/delete").await;
    assert!(harness.store.get(8).is_none());
    harness.application.shutdown().await;
}

#[tokio::test]
async fn updates_without_text_are_acknowledged_silently() {
    let harness = spawn_app("http://127.0.0.1:9".to_string()).await;

    let response = harness
        .app
        .client()
        .post(harness.app.get_url("/webhook"))
        .json(&serde_json::json!({
            "update_id": 3,
            "edited_message": {"chat": {"id": 1}, "text": "/stop"}
        }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    assert_eq!(harness.sink.count(), 0);
    harness.application.shutdown().await;
}

#[tokio::test]
async fn malformed_updates_are_acknowledged_without_a_reply() {
    let harness = spawn_app("http://127.0.0.1:9".to_string()).await;

    let not_json = harness
        .app
        .client()
        .post(harness.app.get_url("/webhook"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    let wrong_shape = harness
        .app
        .client()
        .post(harness.app.get_url("/webhook"))
        .body(r#"{"message": 5}"#)
        .send()
        .await
        .unwrap();

    assert_eq!(not_json.status(), 200);
    assert_eq!(wrong_shape.status(), 200);
    assert_eq!(harness.sink.count(), 0);

    // The endpoint keeps serving well-formed updates afterwards.
    let response = harness.app.send_text(8, "/how").await;
    assert_eq!(response.status(), 200);
    assert_eq!(harness.sink.messages_for(8), vec![HOW_REPLY]);
    harness.application.shutdown().await;
}
