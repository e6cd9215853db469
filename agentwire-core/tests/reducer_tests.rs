use agentwire_core::{
    reduce, Action, ConnectionStatus, RawEvent, Role, SessionState, StepStatus, WorkflowStatus,
};

/// Feed wire frames through the reducer the way the client does.
fn replay(state: &mut SessionState, frames: &[&str]) {
    for frame in frames {
        match RawEvent::parse(frame) {
            Ok(raw) => reduce(state, Action::Event(raw)),
            Err(e) => panic!("frame did not decode: {} ({})", frame, e),
        }
    }
}

#[test]
fn test_full_conversation_transcript() {
    let mut state = SessionState::new();
    reduce(&mut state, Action::Connection(ConnectionStatus::Connected));
    reduce(
        &mut state,
        Action::UserMessage {
            content: "What's the capital of France?".into(),
        },
    );

    replay(
        &mut state,
        &[
            r#"{"type":"message_start","timestamp":100.0,"data":{"message_id":"m1"}}"#,
            r#"{"type":"thinking","timestamp":100.1,"data":{"message":"The user asks"}}"#,
            r#"{"type":"thinking","timestamp":100.2,"data":{"message":"The user asks about France."}}"#,
            r#"{"type":"tool_call","timestamp":100.3,"data":{"tool_name":"lookup","args":{"country":"FR"}}}"#,
            r#"{"type":"tool_result","timestamp":100.4,"data":{"content":"Paris"}}"#,
            r#"{"type":"message_chunk","timestamp":100.5,"data":{"message_id":"m1","content":"The capital"}}"#,
            r#"{"type":"message_chunk","timestamp":100.6,"data":{"message_id":"m1","content":"The capital is Paris."}}"#,
            r#"{"type":"message_complete","timestamp":100.7,"data":{"message_id":"m1","content":"The capital is Paris."}}"#,
        ],
    );

    let messages = state.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, Role::User);

    let answer = &messages[1];
    assert_eq!(answer.role, Role::Assistant);
    assert_eq!(answer.content, "The capital is Paris.");
    assert_eq!(answer.reasoning_blocks().len(), 1);
    assert_eq!(
        answer.reasoning_blocks()[0].content,
        "The user asks about France.\n\n[tool] lookup({\"country\":\"FR\"})\n[result] Paris"
    );

    let pairs = answer.pairs();
    assert_eq!(pairs.len(), 1);
    assert!(pairs[0].reasoning.is_some() && pairs[0].answer.is_some());
    assert!(state.in_flight().is_empty());
}

#[test]
fn test_sender_timestamps_do_not_affect_order() {
    let mut state = SessionState::new();
    // Sender clocks run backwards; receipt order still wins
    replay(
        &mut state,
        &[
            r#"{"type":"message_start","timestamp":50.0,"data":{"message_id":"m1"}}"#,
            r#"{"type":"thinking","timestamp":40.0,"data":{"message":"first thought"}}"#,
            r#"{"type":"message_chunk","timestamp":30.0,"data":{"content":"first answer"}}"#,
            r#"{"type":"thinking","timestamp":20.0,"data":{"message":"second thought"}}"#,
            r#"{"type":"message_chunk","timestamp":10.0,"data":{"content":"second answer"}}"#,
            r#"{"type":"message_complete","data":{}}"#,
        ],
    );

    let message = &state.messages()[0];
    let order: Vec<(String, String)> = message
        .pairs()
        .iter()
        .map(|p| {
            let r = p.reasoning.as_ref().map(|b| message.reasoning_blocks()[b.index].content.clone());
            let a = p.answer.as_ref().map(|b| message.answer_blocks()[b.index].content.clone());
            (r.unwrap_or_default(), a.unwrap_or_default())
        })
        .collect();
    assert_eq!(
        order,
        vec![
            ("first thought".to_string(), "first answer".to_string()),
            ("second thought".to_string(), "second answer".to_string()),
        ]
    );
}

#[test]
fn test_workflow_transcript() {
    let mut state = SessionState::new();
    reduce(
        &mut state,
        Action::UserMessage {
            content: "Write a report".into(),
        },
    );

    replay(
        &mut state,
        &[
            r#"{"type":"plan_thinking_chunk","data":{"content":"Breaking this "}}"#,
            r#"{"type":"plan_thinking_chunk","data":{"content":"down."}}"#,
            r#"{"type":"plan_generated","data":{"plan":"Two steps","steps":[{"title":"Research"},{"description":"Write"}],"confirmation_id":"conf-1"}}"#,
            r#"{"type":"awaiting_confirmation","data":{}}"#,
        ],
    );

    let workflow = state.active_workflow().unwrap();
    assert_eq!(workflow.status, WorkflowStatus::AwaitingConfirmation);
    assert_eq!(workflow.plan.plan_thinking, "Breaking this down.");
    assert_eq!(workflow.plan.steps, vec!["Research", "Write"]);

    reduce(
        &mut state,
        Action::PlanResponse {
            confirmation_id: "conf-1".into(),
            approved: true,
        },
    );

    replay(
        &mut state,
        &[
            r#"{"type":"step_start","data":{"step":"1"}}"#,
            r#"{"type":"thinking_chunk","data":{"content":"Searching"}}"#,
            r#"{"type":"response_chunk","data":{"content":"Found "}}"#,
            r#"{"type":"response_chunk","data":{"content":"sources"}}"#,
            r#"{"type":"step_complete","data":{"step":1}}"#,
            r#"{"type":"step_start","data":{"step":2,"title":"Write it"}}"#,
            r#"{"type":"response_chunk","data":{"content":"The report."}}"#,
            r#"{"type":"workflow_complete","data":{}}"#,
        ],
    );

    let workflow = state.active_workflow().unwrap();
    assert_eq!(workflow.status, WorkflowStatus::Completed);
    let steps: Vec<_> = workflow.ordered_steps().collect();
    assert_eq!(steps.len(), 2);
    assert_eq!(steps[0].title, "Research");
    assert_eq!(steps[0].response, "Found sources");
    assert_eq!(steps[1].title, "Write it");
    assert!(steps.iter().all(|s| s.status == StepStatus::Completed));
    assert_eq!(workflow.final_result.as_deref(), Some("The report."));
}

#[test]
fn test_bad_frames_do_not_disturb_state() {
    let mut state = SessionState::new();
    replay(
        &mut state,
        &[
            r#"{"type":"message_start","data":{"message_id":"m1"}}"#,
            r#"{"type":"message_chunk","data":{"content":"ok"}}"#,
            r#"{"type":"message_chunk","data":{}}"#,
            r#"{"type":"mystery","data":{"content":"??"}}"#,
        ],
    );

    assert_eq!(state.dropped_events(), 2);
    let message = state.assistant_message("m1").unwrap();
    assert_eq!(message.answer_blocks.len(), 1);
    assert_eq!(message.answer_blocks[0].content, "ok");
    assert!(message.answer_blocks[0].is_streaming);
}
