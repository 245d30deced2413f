//! End-to-end delivery tests: page agent, relay agent and a mock backend.
//!
//! The relay and the direct path tag their requests with different
//! `channel` values so the mock can count each path separately.

use fbridge_core::config::{BackendConfig, RelayConfig};
use fbridge_core::{FbridgeError, TransportOutcome};
use fbridge_page::{Page, PageAgent, RecordingNotifier};
use fbridge_relay::{RelayAgent, RelayHandle};
use fbridge_transport::{BackendClient, RuntimeChannel};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_json, body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn backend(server: &MockServer, channel: &str) -> BackendClient {
    BackendClient::new(&BackendConfig {
        base_url: server.uri(),
        channel: Some(channel.to_string()),
        ..Default::default()
    })
    .unwrap()
}

fn start_relay(server: &MockServer, channel: &RuntimeChannel) -> RelayHandle {
    RelayAgent::new(backend(server, "relay")).spawn(channel, 8)
}

fn agent_for(
    page: &Page,
    server: &MockServer,
    channel: &RuntimeChannel,
) -> (PageAgent, Arc<RecordingNotifier>) {
    let notifier = Arc::new(RecordingNotifier::new());
    let agent = PageAgent::new(
        page.history.clone(),
        channel.clone(),
        backend(server, "direct"),
        notifier.clone(),
    );
    (agent, notifier)
}

async fn mount(server: &MockServer, channel: &str, response: ResponseTemplate, calls: u64) {
    Mock::given(method("POST"))
        .and(path("/feishu/upload_record"))
        .and(body_partial_json(json!({ "channel": channel })))
        .respond_with(response)
        .expect(calls)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_relay_success_never_falls_back() {
    let server = MockServer::start().await;
    mount(
        &server,
        "relay",
        ResponseTemplate::new(200).set_body_json(json!({"ok": true, "message": "uploaded"})),
        1,
    )
    .await;
    mount(&server, "direct", ResponseTemplate::new(200), 0).await;

    let channel = RuntimeChannel::new(Some(Duration::from_secs(5)));
    let relay = start_relay(&server, &channel);
    let page = Page::open("https://x.test/video/123");
    let (agent, notifier) = agent_for(&page, &server, &channel);

    let delivery = agent.initiate_delivery().await.unwrap();

    assert_eq!(delivery.path, vec![TransportOutcome::RelaySucceeded]);
    assert!(delivery.result.success);
    assert_eq!(delivery.result.message.as_deref(), Some("uploaded"));
    assert_eq!(notifier.messages(), vec!["uploaded".to_string()]);
    relay.stop();
}

#[tokio::test]
async fn test_relay_failure_reply_is_final() {
    let server = MockServer::start().await;
    mount(
        &server,
        "relay",
        ResponseTemplate::new(500).set_body_json(json!({"ok": false, "message": "video upload failed"})),
        1,
    )
    .await;
    mount(&server, "direct", ResponseTemplate::new(200), 0).await;

    let channel = RuntimeChannel::new(Some(Duration::from_secs(5)));
    let relay = start_relay(&server, &channel);
    let page = Page::open("https://x.test/video/123");
    let (agent, notifier) = agent_for(&page, &server, &channel);

    let delivery = agent.initiate_delivery().await.unwrap();

    assert_eq!(delivery.path, vec![TransportOutcome::RelayRejected]);
    assert!(!delivery.result.success);
    assert_eq!(
        notifier.messages(),
        vec!["Upload failed: video upload failed".to_string()]
    );
    relay.stop();
}

#[tokio::test]
async fn test_unreachable_relay_then_unparsable_500() {
    let server = MockServer::start().await;
    mount(
        &server,
        "direct",
        ResponseTemplate::new(500).set_body_string("Internal Server Error"),
        1,
    )
    .await;

    // No relay ever connected
    let channel = RuntimeChannel::new(Some(Duration::from_secs(5)));
    let page = Page::open("https://x.test/video/123");
    let (agent, notifier) = agent_for(&page, &server, &channel);

    let delivery = agent.initiate_delivery().await.unwrap();

    assert_eq!(
        delivery.path,
        vec![TransportOutcome::RelayUnavailable, TransportOutcome::DirectFailed]
    );
    assert!(!delivery.result.success);
    assert!(delivery.result.message.unwrap().contains("HTTP 500"));
    assert!(notifier.messages()[0].contains("HTTP 500"));
}

#[tokio::test]
async fn test_unreachable_relay_then_direct_success() {
    let server = MockServer::start().await;
    mount(
        &server,
        "direct",
        ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "message": "already uploaded",
            "exists": true
        })),
        1,
    )
    .await;

    let channel = RuntimeChannel::new(Some(Duration::from_secs(5)));
    let relay = start_relay(&server, &channel);
    relay.stop();

    let page = Page::open("https://x.test/video/123");
    let (agent, _notifier) = agent_for(&page, &server, &channel);

    let delivery = agent.initiate_delivery().await.unwrap();

    assert_eq!(
        delivery.path,
        vec![TransportOutcome::RelayUnavailable, TransportOutcome::DirectSucceeded]
    );
    assert!(delivery.result.success);
    assert!(delivery.result.already_existed());
}

#[tokio::test]
async fn test_empty_page_url_makes_no_calls() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let channel = RuntimeChannel::new(Some(Duration::from_secs(5)));
    let relay = start_relay(&server, &channel);
    let page = Page::open("");
    let (agent, notifier) = agent_for(&page, &server, &channel);

    let err = agent.initiate_delivery().await.unwrap_err();

    assert!(matches!(err, FbridgeError::InvalidRequest(_)));
    assert!(notifier.messages()[0].starts_with("Upload failed"));
    relay.stop();
}

#[tokio::test]
async fn test_url_without_marker_still_delivers() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_json(json!({
            "page_url": "https://x.test/discover",
            "channel": "relay"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let channel = RuntimeChannel::new(Some(Duration::from_secs(5)));
    let relay = start_relay(&server, &channel);
    let page = Page::open("https://x.test/discover");
    let (agent, notifier) = agent_for(&page, &server, &channel);

    let delivery = agent.initiate_delivery().await.unwrap();

    assert!(delivery.result.success);
    assert_eq!(notifier.messages(), vec!["Uploaded successfully".to_string()]);
    relay.stop();
}

#[tokio::test]
async fn test_silent_relay_times_out_into_fallback() {
    let server = MockServer::start().await;
    mount(
        &server,
        "direct",
        ResponseTemplate::new(200).set_body_json(json!({"ok": true, "message": "direct"})),
        1,
    )
    .await;

    let channel = RuntimeChannel::new(Some(Duration::from_millis(50)));
    let mut inbox = channel.connect_listener(4);
    let silent = tokio::spawn(async move {
        let mut held = Vec::new();
        while let Some(envelope) = inbox.recv().await {
            held.push(envelope);
        }
    });

    let page = Page::open("https://x.test/video/9");
    let (agent, _notifier) = agent_for(&page, &server, &channel);
    let delivery = agent.initiate_delivery().await.unwrap();

    assert_eq!(delivery.outcome(), Some(TransportOutcome::DirectSucceeded));
    assert!(delivery.used_fallback());
    silent.abort();
}

#[tokio::test]
async fn test_relay_torn_down_mid_flight_falls_back_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(body_partial_json(json!({ "channel": "relay" })))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"ok": true}))
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;
    mount(
        &server,
        "direct",
        ResponseTemplate::new(200).set_body_json(json!({"ok": true, "message": "direct"})),
        1,
    )
    .await;

    let channel = RuntimeChannel::new(None);
    let relay = start_relay(&server, &channel);
    let page = Page::open("https://x.test/video/9");
    let (agent, _notifier) = agent_for(&page, &server, &channel);

    let pending = tokio::spawn(async move { agent.initiate_delivery().await });
    tokio::time::sleep(Duration::from_millis(200)).await;
    relay.stop();

    let delivery = pending.await.unwrap().unwrap();
    assert_eq!(
        delivery.path,
        vec![TransportOutcome::RelayUnavailable, TransportOutcome::DirectSucceeded]
    );
    assert_eq!(delivery.result.message.as_deref(), Some("direct"));
}

#[tokio::test]
async fn test_slow_relay_under_default_config_uploads_once() {
    let server = MockServer::start().await;
    mount(
        &server,
        "relay",
        ResponseTemplate::new(200)
            .set_body_json(json!({"ok": true, "message": "uploaded"}))
            .set_delay(Duration::from_millis(400)),
        1,
    )
    .await;
    mount(&server, "direct", ResponseTemplate::new(200), 0).await;

    let channel = RuntimeChannel::new(RelayConfig::default().reply_timeout());
    let relay = start_relay(&server, &channel);
    let page = Page::open("https://x.test/video/123");
    let (agent, notifier) = agent_for(&page, &server, &channel);

    let delivery = agent.initiate_delivery().await.unwrap();

    assert_eq!(delivery.path, vec![TransportOutcome::RelaySucceeded]);
    assert!(!delivery.used_fallback());
    assert_eq!(notifier.messages(), vec!["uploaded".to_string()]);
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
    relay.stop();
}
