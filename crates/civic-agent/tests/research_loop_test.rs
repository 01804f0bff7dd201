//! End-to-end behaviour of the research loop against a scripted model and
//! the in-memory record store.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use futures::StreamExt;
use serde_json::json;
use uuid::Uuid;

use civic_agent::{
    cited_indices_valid, spawn_research, AgentConfig, ResearchAgent, ResearchRequest,
    ToolRegistry,
};
use civic_core::mock::InMemoryStore;
use civic_core::{
    AgentEvent, AnswerStore, ConfidenceLevel, ConversationTurn, EvidenceItem, MotionEvidence,
    ResearchBackend, ResearchMessage, StatementEvidence, VoteRecord,
};
use civic_inference::mock::ScriptedBackend;
use civic_search::{HybridSearchEngine, QueryEmbedder};

const QUESTION: &str = "What did council decide about the parking bylaw?";

fn parking_motion() -> MotionEvidence {
    MotionEvidence {
        id: Uuid::from_u128(1),
        title: "Parking bylaw amendment".to_string(),
        snippet: "That council adopt the amended parking bylaw.".to_string(),
        meeting_id: Uuid::from_u128(100),
        meeting_date: NaiveDate::from_ymd_opt(2024, 3, 12).unwrap(),
        mover: Some("Cllr. Diaz".to_string()),
        seconder: Some("Cllr. Okafor".to_string()),
        result: Some("carried".to_string()),
        score: 0.0,
    }
}

fn parking_statement() -> EvidenceItem {
    EvidenceItem::Statement(StatementEvidence {
        id: Uuid::from_u128(2),
        title: "Debate on parking bylaw".to_string(),
        snippet: "The parking bylaw will help downtown merchants.".to_string(),
        meeting_id: Uuid::from_u128(100),
        meeting_date: NaiveDate::from_ymd_opt(2024, 3, 12).unwrap(),
        speaker: "Cllr. Diaz".to_string(),
        score: 0.0,
    })
}

fn store() -> InMemoryStore {
    let motion = parking_motion();
    InMemoryStore::new()
        .with_item(EvidenceItem::Motion(motion.clone()))
        .with_item(parking_statement())
        .with_vote(VoteRecord {
            motion,
            person: "Cllr. Okafor".to_string(),
            vote: "no".to_string(),
        })
}

fn agent(backend: &ScriptedBackend, store: &InMemoryStore, config: AgentConfig) -> Arc<ResearchAgent> {
    let records = Arc::new(store.clone());
    let engine = HybridSearchEngine::new(records.clone(), QueryEmbedder::disabled());
    let tools = ToolRegistry::civic(Arc::new(engine), records);
    let llm: Arc<dyn ResearchBackend> = Arc::new(backend.clone());
    Arc::new(
        ResearchAgent::new(llm, tools)
            .with_config(config)
            .with_answer_store(Arc::new(store.clone())),
    )
}

async fn run(agent: Arc<ResearchAgent>, request: ResearchRequest) -> Vec<AgentEvent> {
    spawn_research(agent, request).collect().await
}

fn event_types(events: &[AgentEvent]) -> Vec<&'static str> {
    events.iter().map(AgentEvent::event_type).collect()
}

fn answer_text(events: &[AgentEvent]) -> String {
    events
        .iter()
        .filter_map(|e| match e {
            AgentEvent::FinalAnswerChunk { text } => Some(text.as_str()),
            _ => None,
        })
        .collect()
}

fn sources_event(events: &[AgentEvent]) -> (usize, usize, ConfidenceLevel) {
    events
        .iter()
        .find_map(|e| match e {
            AgentEvent::Sources {
                sources,
                source_count,
                confidence,
            } => Some((sources.len(), *source_count, *confidence)),
            _ => None,
        })
        .expect("sources event")
}

#[tokio::test]
async fn test_question_produces_cited_answer() {
    let backend = ScriptedBackend::new()
        .then_call("search_motions", json!({"query": "parking bylaw"}))
        .then_answer()
        .with_answer(["The parking bylaw ", "amendment carried [1]."])
        .with_suggestions("Who voted against it?\nWhen does it take effect?");
    let store = store();
    let events = run(agent(&backend, &store, AgentConfig::default()), ResearchRequest::new(QUESTION)).await;

    let types = event_types(&events);
    assert_eq!(types[0], "tool_call");
    assert_eq!(types[1], "tool_observation");
    assert!(types.contains(&"final_answer_chunk"));
    assert_eq!(types.iter().filter(|t| **t == "sources").count(), 1);
    assert_eq!(*types.last().unwrap(), "done");

    match &events[1] {
        AgentEvent::ToolObservation { name, summary, error } => {
            assert_eq!(name, "search_motions");
            assert_eq!(summary.as_deref(), Some("Found 1 motion"));
            assert!(error.is_none());
        }
        other => panic!("unexpected event: {:?}", other),
    }

    let answer = answer_text(&events);
    assert_eq!(answer, "The parking bylaw amendment carried [1].");
    let (listed, count, confidence) = sources_event(&events);
    assert_eq!((listed, count), (1, 1));
    assert_eq!(confidence, ConfidenceLevel::Low);
    assert!(cited_indices_valid(&answer, count));

    let (answer_id, suggestions) = match events.last().unwrap() {
        AgentEvent::Done {
            answer_id,
            suggestions,
        } => (answer_id.expect("answer cached"), suggestions.clone()),
        other => panic!("unexpected event: {:?}", other),
    };
    assert_eq!(suggestions.len(), 2);

    let cached = store.get(answer_id).await.unwrap().expect("cached answer");
    assert_eq!(cached.query, QUESTION);
    assert_eq!(cached.answer, answer);
    assert_eq!(cached.source_count, 1);
    assert_eq!(cached.suggestions, suggestions);
    assert_eq!(store.answer_count(), 1);
}

#[tokio::test]
async fn test_answer_is_chunked_by_word() {
    let backend = ScriptedBackend::new().with_answer(["No records mention ", "that topic."]);
    let events = run(
        agent(&backend, &store(), AgentConfig::default()),
        ResearchRequest::new(QUESTION),
    )
    .await;

    let chunks: Vec<String> = events
        .iter()
        .filter_map(|e| match e {
            AgentEvent::FinalAnswerChunk { text } => Some(text.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(chunks, vec!["No ", "records ", "mention ", "that ", "topic."]);
}

#[tokio::test]
async fn test_observation_lists_source_indices_for_next_step() {
    let backend = ScriptedBackend::new()
        .then_call("search_statements", json!({"query": "parking"}))
        .then_call("search_motions", json!({"query": "parking bylaw"}))
        .then_answer();
    run(
        agent(&backend, &store(), AgentConfig::default()),
        ResearchRequest::new(QUESTION),
    )
    .await;

    let transcripts = backend.transcripts();
    assert_eq!(transcripts.len(), 3);
    let last = transcripts.last().unwrap();
    let results: Vec<&str> = last
        .iter()
        .filter_map(|m| match m {
            ResearchMessage::ToolResult { content, .. } => Some(content.as_str()),
            _ => None,
        })
        .collect();
    assert!(results[0].starts_with("[1] Debate on parking bylaw"));
    assert!(results[1].starts_with("[2] Parking bylaw amendment"));
    assert_eq!(backend.offered_tools().len(), 7);
}

#[tokio::test]
async fn test_tool_failure_is_observed_and_loop_continues() {
    let backend = ScriptedBackend::new()
        .then_call("search_motions", json!({"query": "parking bylaw"}))
        .then_call("get_statements_by_person", json!({"person": "Diaz", "bogus": 1}))
        .then_answer();
    let store = store().failing_text();
    let events = run(agent(&backend, &store, AgentConfig::default()), ResearchRequest::new(QUESTION)).await;

    let errors: Vec<&str> = events
        .iter()
        .filter_map(|e| match e {
            AgentEvent::ToolObservation { error: Some(err), .. } => Some(err.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(errors.len(), 2);
    assert!(errors[0].starts_with("search_motions failed"));
    assert!(errors[1].starts_with("invalid arguments for get_statements_by_person"));

    assert_eq!(backend.planning_calls(), 3);
    assert!(event_types(&events).contains(&"final_answer_chunk"));
    assert!(!event_types(&events).contains(&"error"));
    assert_eq!(*event_types(&events).last().unwrap(), "done");
}

#[tokio::test]
async fn test_unknown_tool_is_an_observation() {
    let backend = ScriptedBackend::new()
        .then_call("drop_tables", json!({}))
        .then_answer();
    let events = run(
        agent(&backend, &store(), AgentConfig::default()),
        ResearchRequest::new(QUESTION),
    )
    .await;

    assert_eq!(
        events[1],
        AgentEvent::observation_err("drop_tables", "unknown tool: drop_tables")
    );
    assert_eq!(*event_types(&events).last().unwrap(), "done");
}

#[tokio::test]
async fn test_step_budget_forces_synthesis_with_no_evidence() {
    let backend = ScriptedBackend::new()
        .then_call("search_motions", json!({"query": "zeppelin"}))
        .then_call("search_document_sections", json!({"query": "zeppelin"}))
        .then_call("search_statements", json!({"query": "zeppelin"}))
        .with_answer(["No records were found."]);
    let events = run(
        agent(&backend, &store(), AgentConfig::default().with_max_steps(2)),
        ResearchRequest::new(QUESTION),
    )
    .await;

    assert_eq!(backend.planning_calls(), 2);
    assert_eq!(backend.synthesis_calls().len(), 1);
    assert!(backend.synthesis_calls()[0].prompt.contains("none were found"));
    let (listed, count, confidence) = sources_event(&events);
    assert_eq!((listed, count), (0, 0));
    assert_eq!(confidence, ConfidenceLevel::Low);
    assert_eq!(*event_types(&events).last().unwrap(), "done");
}

#[tokio::test]
async fn test_parallel_calls_keep_event_order() {
    let backend = ScriptedBackend::new()
        .then_call_many([
            ("search_motions", json!({"query": "parking bylaw"})),
            ("get_voting_history", json!({"person": "Okafor"})),
            ("get_current_date", json!({})),
        ])
        .then_answer();
    let events = run(
        agent(&backend, &store(), AgentConfig::default()),
        ResearchRequest::new(QUESTION),
    )
    .await;

    assert_eq!(
        event_types(&events)[..6],
        [
            "tool_call",
            "tool_call",
            "tool_call",
            "tool_observation",
            "tool_observation",
            "tool_observation"
        ]
    );
    let observed: Vec<&str> = events[3..6]
        .iter()
        .filter_map(|e| match e {
            AgentEvent::ToolObservation { name, .. } => Some(name.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(
        observed,
        vec!["search_motions", "get_voting_history", "get_current_date"]
    );

    // the voted-on motion is the searched motion: registered once
    let (listed, count, _) = sources_event(&events);
    assert_eq!((listed, count), (1, 1));
}

#[tokio::test]
async fn test_out_of_range_citations_are_removed() {
    let backend = ScriptedBackend::new()
        .then_call("search_motions", json!({"query": "parking bylaw"}))
        .with_answer(["It carried [1] ", "after debate [4] ", "in the [2024] budget. ", "See [0]."]);
    let events = run(
        agent(&backend, &store(), AgentConfig::default()),
        ResearchRequest::new(QUESTION),
    )
    .await;

    let answer = answer_text(&events);
    assert_eq!(answer, "It carried [1] after debate  in the [2024] budget. See .");
    assert!(cited_indices_valid(&answer, 1));
}

#[tokio::test]
async fn test_planning_failure_emits_error_then_done() {
    let backend = ScriptedBackend::new().then_fail("LLM service server error (502): upstream");
    let store = store();
    let events = run(agent(&backend, &store, AgentConfig::default()), ResearchRequest::new(QUESTION)).await;

    assert_eq!(event_types(&events), vec!["error", "done"]);
    match &events[0] {
        AgentEvent::Error { message } => assert!(message.contains("502")),
        other => panic!("unexpected event: {:?}", other),
    }
    assert_eq!(events[1], AgentEvent::done_empty());
    assert!(backend.synthesis_calls().is_empty());
    assert_eq!(store.answer_count(), 0);
}

#[tokio::test]
async fn test_failure_after_tool_calls_still_terminates() {
    let backend = ScriptedBackend::new()
        .then_call("search_motions", json!({"query": "parking bylaw"}))
        .then_fail("rate limited");
    let events = run(
        agent(&backend, &store(), AgentConfig::default()),
        ResearchRequest::new(QUESTION),
    )
    .await;
    assert_eq!(
        event_types(&events),
        vec!["tool_call", "tool_observation", "error", "done"]
    );
}

#[tokio::test]
async fn test_mid_stream_failure_emits_error_then_done() {
    let backend = ScriptedBackend::new()
        .with_answer(["The ", "bylaw ", "carried."])
        .with_stream_failure_after(2);
    let store = store();
    let events = run(agent(&backend, &store, AgentConfig::default()), ResearchRequest::new(QUESTION)).await;

    assert_eq!(
        event_types(&events),
        vec!["final_answer_chunk", "final_answer_chunk", "error", "done"]
    );
    assert_eq!(store.answer_count(), 0);
    assert_eq!(backend.generate_calls(), 0);
}

#[tokio::test]
async fn test_stream_start_failure_emits_error_then_done() {
    let backend = ScriptedBackend::new().with_stream_start_failure();
    let events = run(
        agent(&backend, &store(), AgentConfig::default()),
        ResearchRequest::new(QUESTION),
    )
    .await;
    assert_eq!(event_types(&events), vec!["error", "done"]);
}

#[tokio::test(start_paused = true)]
async fn test_planning_timeout_is_terminal() {
    let backend = ScriptedBackend::new().then_hang();
    let config = AgentConfig::default().with_call_timeout(Duration::from_secs(5));
    let events = run(agent(&backend, &store(), config), ResearchRequest::new(QUESTION)).await;

    assert_eq!(event_types(&events), vec!["error", "done"]);
    match &events[0] {
        AgentEvent::Error { message } => assert!(message.contains("did not respond in time")),
        other => panic!("unexpected event: {:?}", other),
    }
}

#[tokio::test]
async fn test_suggestion_failure_is_not_fatal() {
    let backend = ScriptedBackend::new()
        .then_call("search_motions", json!({"query": "parking bylaw"}))
        .with_answer(["Carried [1]."])
        .with_failing_suggestions();
    let events = run(
        agent(&backend, &store(), AgentConfig::default()),
        ResearchRequest::new(QUESTION),
    )
    .await;

    match events.last().unwrap() {
        AgentEvent::Done {
            answer_id,
            suggestions,
        } => {
            assert!(answer_id.is_some());
            assert!(suggestions.is_empty());
        }
        other => panic!("unexpected event: {:?}", other),
    }
    assert!(!event_types(&events).contains(&"error"));
}

#[tokio::test]
async fn test_suggestions_capped_at_three() {
    let backend = ScriptedBackend::new().with_suggestions("1. One?\n2. Two?\n3. Three?\n4. Four?");
    let events = run(
        agent(&backend, &store(), AgentConfig::default()),
        ResearchRequest::new(QUESTION),
    )
    .await;
    match events.last().unwrap() {
        AgentEvent::Done { suggestions, .. } => {
            assert_eq!(suggestions, &vec!["One?", "Two?", "Three?"])
        }
        other => panic!("unexpected event: {:?}", other),
    }
}

#[tokio::test]
async fn test_answer_store_failure_is_not_surfaced() {
    struct BrokenStore;

    #[async_trait::async_trait]
    impl AnswerStore for BrokenStore {
        async fn insert_if_absent(&self, _: &civic_core::CachedAnswer) -> civic_core::Result<bool> {
            Err(civic_core::Error::Internal("disk full".to_string()))
        }

        async fn get(&self, _: Uuid) -> civic_core::Result<Option<civic_core::CachedAnswer>> {
            Ok(None)
        }
    }

    let backend = ScriptedBackend::new();
    let records = Arc::new(store());
    let engine = HybridSearchEngine::new(records.clone(), QueryEmbedder::disabled());
    let agent = Arc::new(
        ResearchAgent::new(
            Arc::new(backend.clone()),
            ToolRegistry::civic(Arc::new(engine), records),
        )
        .with_answer_store(Arc::new(BrokenStore)),
    );

    let events = run(agent, ResearchRequest::new(QUESTION)).await;
    assert_eq!(*events.last().unwrap(), AgentEvent::done_empty());
    assert!(!event_types(&events).contains(&"error"));
}

#[tokio::test]
async fn test_conversation_context_reaches_planner() {
    let turns = vec![ConversationTurn {
        question: "What happened to the parking bylaw?".to_string(),
        answer: "The parking bylaw amendment carried [1].".to_string(),
    }];

    let backend = ScriptedBackend::new();
    run(
        agent(&backend, &store(), AgentConfig::default()),
        ResearchRequest::new("Who voted against the bylaw?").with_turns(turns.clone()),
    )
    .await;
    let first_user = |backend: &ScriptedBackend| match &backend.transcripts()[0][1] {
        ResearchMessage::User { content } => content.clone(),
        other => panic!("unexpected message: {:?}", other),
    };
    assert!(first_user(&backend).contains("Earlier in this conversation"));

    let fresh = ScriptedBackend::new();
    run(
        agent(&fresh, &store(), AgentConfig::default()),
        ResearchRequest::new("Who voted against the bylaw?")
            .with_turns(turns.clone())
            .with_new_search(true),
    )
    .await;
    assert_eq!(first_user(&fresh), "Question: Who voted against the bylaw?");

    let off_topic = ScriptedBackend::new();
    run(
        agent(&off_topic, &store(), AgentConfig::default()),
        ResearchRequest::new("Library opening hours").with_turns(turns),
    )
    .await;
    assert_eq!(first_user(&off_topic), "Question: Library opening hours");
}

#[tokio::test]
async fn test_context_holds_at_most_five_turns() {
    let turns: Vec<ConversationTurn> = (1..=9)
        .map(|i| ConversationTurn {
            question: format!("parking question {i}"),
            answer: format!("parking answer {i}"),
        })
        .collect();
    let backend = ScriptedBackend::new();
    run(
        agent(&backend, &store(), AgentConfig::default()),
        ResearchRequest::new("parking follow-up").with_turns(turns),
    )
    .await;

    let content = match &backend.transcripts()[0][1] {
        ResearchMessage::User { content } => content.clone(),
        other => panic!("unexpected message: {:?}", other),
    };
    assert_eq!(content.matches("Q: ").count(), 5);
    assert!(!content.contains("question 4"));
    assert!(content.contains("question 5"));
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_cancels_producer() {
    let backend = ScriptedBackend::new()
        .then_call("search_motions", json!({"query": "parking bylaw"}))
        .then_hang();
    let config = AgentConfig::default().with_call_timeout(Duration::from_secs(3600));
    let agent = agent(&backend, &store(), config);

    let mut events = spawn_research(agent.clone(), ResearchRequest::new(QUESTION));
    let first = events.next().await.expect("first event");
    assert_eq!(first.event_type(), "tool_call");
    drop(events);

    for _ in 0..100 {
        if Arc::strong_count(&agent) == 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(Arc::strong_count(&agent), 1, "producer task still running");
    assert!(backend.synthesis_calls().is_empty());
}
