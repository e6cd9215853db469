use std::time::Duration;

use agentwire_client::test_utils::MockTransport;
use agentwire_client::{
    ClientConfig, ClientError, ConnectionStatus, Frame, ReconnectConfig, Role, Session,
    SessionState,
};
use agentwire_core::WorkflowStatus;
use serde_json::{json, Value};

fn config(max_attempts: u32) -> ClientConfig {
    ClientConfig::new("ws://localhost:8000/ws").with_reconnect(ReconnectConfig {
        max_attempts,
        base_delay_ms: 1,
    })
}

async fn wait_until(session: &Session<MockTransport>, pred: impl Fn(&SessionState) -> bool) {
    let mut changes = session.changes();
    let reached = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            if pred(&session.state()) {
                return;
            }
            if changes.changed().await.is_err() {
                return;
            }
        }
    })
    .await;
    assert!(reached.is_ok(), "condition not reached in time");
}

fn sent_json(transport: &MockTransport) -> Vec<Value> {
    transport
        .sent()
        .iter()
        .map(|s| serde_json::from_str(s).unwrap())
        .collect()
}

#[tokio::test]
async fn test_streamed_message_reaches_state() {
    let transport = MockTransport::new();
    let server = transport.live_socket();
    let session = Session::new(config(5), transport.clone());

    session.connect("s1").await.unwrap();
    assert_eq!(transport.urls(), vec!["ws://localhost:8000/ws/s1".to_string()]);

    server.send_event("message_start", json!({"message_id": "A"}));
    server.send_event("thinking", json!({"message": "x"}));
    server.send_event("thinking", json!({"message": "xy"}));
    server.send_event("message_chunk", json!({"message_id": "A", "content": "hello"}));
    server.send_event("message_complete", json!({"message_id": "A"}));

    wait_until(&session, |s| !s.messages().is_empty()).await;

    let state = session.state();
    assert!(state.is_connected());
    assert_eq!(state.messages().len(), 1);
    let message = &state.messages()[0];
    assert_eq!(message.content, "hello");
    assert_eq!(message.reasoning_blocks()[0].content, "xy");
    assert!(!message.reasoning_blocks()[0].is_streaming);
}

#[tokio::test]
async fn test_malformed_frames_are_skipped() {
    let transport = MockTransport::new();
    let server = transport.live_socket();
    let session = Session::new(config(5), transport);
    session.connect("s1").await.unwrap();

    server.send_text("not json");
    server.send_text(r#"{"data":{}}"#);
    server.send_event("error", json!({"message": "upstream failed"}));

    wait_until(&session, |s| !s.messages().is_empty()).await;
    let state = session.state();
    assert_eq!(state.messages()[0].role, Role::System);
    assert_eq!(state.messages()[0].content, "Error: upstream failed");
}

#[tokio::test]
async fn test_send_message_records_then_sends() {
    let transport = MockTransport::new();
    let _server = transport.live_socket();
    let session = Session::new(config(5), transport.clone());
    session.connect("s1").await.unwrap();

    session.send_message("hi there").await.unwrap();
    wait_until(&session, |s| !s.messages().is_empty()).await;

    {
        let state = session.state();
        assert_eq!(state.messages()[0].role, Role::User);
        assert_eq!(state.messages()[0].content, "hi there");
        assert!(state.active_workflow().is_some());
    }

    tokio::time::timeout(Duration::from_secs(2), async {
        while transport.sent().is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
    assert_eq!(
        sent_json(&transport),
        vec![json!({"type": "message", "content": "hi there"})]
    );
}

#[tokio::test]
async fn test_send_without_connection_fails_cleanly() {
    let session = Session::new(config(5), MockTransport::new());
    let result = session.send_message("hello?").await;
    assert!(matches!(result, Err(ClientError::NotConnected)));

    let result = session.approve_plan("c1").await;
    assert!(matches!(result, Err(ClientError::NotConnected)));

    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(session.state().messages().is_empty());
}

#[tokio::test]
async fn test_plan_approval_round_trip() {
    let transport = MockTransport::new();
    let server = transport.live_socket();
    let session = Session::new(config(5), transport.clone());
    session.connect("s1").await.unwrap();

    server.send_event(
        "plan_generated",
        json!({"plan": "Do it", "steps": ["One", "Two"], "confirmation_id": "c1"}),
    );
    server.send_event("awaiting_confirmation", json!({}));
    wait_until(&session, |s| {
        s.active_workflow()
            .is_some_and(|w| w.plan.awaiting_confirmation)
    })
    .await;

    session.approve_plan("c1").await.unwrap();
    wait_until(&session, |s| {
        s.active_workflow()
            .is_some_and(|w| w.status == WorkflowStatus::Running)
    })
    .await;
    assert!(!session.state().active_workflow().unwrap().plan.awaiting_confirmation);

    tokio::time::timeout(Duration::from_secs(2), async {
        while transport.sent().is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
    assert_eq!(
        sent_json(&transport),
        vec![json!({"type": "approve_plan", "confirmation_id": "c1"})]
    );
}

#[tokio::test]
async fn test_initial_handshake_failure_is_not_retried() {
    let transport = MockTransport::new()
        .with_refusal("connection refused")
        .with_open_socket();
    let session = Session::new(config(5), transport.clone());

    let result = session.connect("s1").await;
    assert!(matches!(result, Err(ClientError::Handshake(_))));

    wait_until(&session, |s| {
        matches!(s.connection_status(), ConnectionStatus::SetupFailed { .. })
    })
    .await;
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(transport.connect_count(), 1);
    assert!(!session.state().is_connected());
}

#[tokio::test]
async fn test_reconnect_gives_up_after_max_attempts() {
    // One good connection that drops, then six failed handshakes
    let mut transport = MockTransport::new().with_frames(vec![Frame::Closed { clean: false }]);
    for _ in 0..6 {
        transport = transport.with_refusal("refused");
    }
    let session = Session::new(config(5), transport.clone());
    session.connect("s1").await.unwrap();

    wait_until(&session, |s| {
        matches!(s.connection_status(), ConnectionStatus::Exhausted { .. })
    })
    .await;
    assert_eq!(
        session.state().connection_status(),
        &ConnectionStatus::Exhausted { attempts: 5 }
    );
    assert!(!session.state().is_connected());
    assert_eq!(transport.connect_count(), 6);

    // Nothing else is scheduled
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(transport.connect_count(), 6);
}

#[tokio::test]
async fn test_reconnect_after_drop_resumes_streaming() {
    let transport = MockTransport::new()
        .with_frames(vec![Frame::Closed { clean: true }])
        .with_refusal("still down");
    let server = transport.live_socket();
    let session = Session::new(config(5), transport.clone());
    session.connect("s1").await.unwrap();

    server.send_event("message", json!({"role": "assistant", "content": "back"}));
    wait_until(&session, |s| !s.messages().is_empty()).await;

    assert_eq!(transport.connect_count(), 3);
    assert!(session.state().is_connected());
    assert_eq!(session.state().messages()[0].content, "back");
}

#[tokio::test]
async fn test_disconnect_stops_everything() {
    let transport = MockTransport::new();
    let server = transport.live_socket();
    let session = Session::new(config(5), transport.clone());
    session.connect("s1").await.unwrap();

    server.send_event("message_start", json!({"message_id": "A"}));
    server.send_event("message_chunk", json!({"content": "partial"}));
    wait_until(&session, |s| s.assistant_message("A").is_some()).await;

    session.disconnect().await;
    wait_until(&session, |s| {
        s.connection_status() == &ConnectionStatus::Disconnected
    })
    .await;

    let state = session.state();
    assert!(state.cursors().message_id.is_none());
    assert!(!state.assistant_message("A").unwrap().answer_blocks[0].is_streaming);
    drop(state);

    server.close(false);
    tokio::time::sleep(Duration::from_millis(30)).await;
    assert_eq!(transport.connect_count(), 1);
    assert_eq!(transport.close_count(), 1);
}

#[tokio::test]
async fn test_connecting_again_replaces_the_socket() {
    let transport = MockTransport::new();
    let first = transport.live_socket();
    let second = transport.live_socket();
    let session = Session::new(config(5), transport.clone());

    session.connect("s1").await.unwrap();
    session.connect("s2").await.unwrap();
    assert_eq!(transport.close_count(), 1);

    // The detached socket no longer feeds the session or triggers a reconnect
    first.send_event("message", json!({"role": "assistant", "content": "stale"}));
    first.close(false);
    second.send_event("message", json!({"role": "assistant", "content": "fresh"}));

    wait_until(&session, |s| !s.messages().is_empty()).await;
    tokio::time::sleep(Duration::from_millis(30)).await;

    let state = session.state();
    assert_eq!(state.messages().len(), 1);
    assert_eq!(state.messages()[0].content, "fresh");
    assert!(state.is_connected());
    assert_eq!(transport.connect_count(), 2);
}
