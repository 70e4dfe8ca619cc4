use std::sync::Arc;

use brain_domain::intent::Intent;
use brain_service::{
	Agent, AgentContext, AgentResponse, BoxFuture, LlmManager, MessageDirector, agents,
};
use brain_testkit::{Harness, ScriptedChat};

const LONG_MESSAGE: &str = "I keep thinking about how the garden should be laid out next spring \
                            with raised beds along the fence";

struct Echo {
	name: &'static str,
	score: f32,
}
impl Agent for Echo {
	fn name(&self) -> &'static str {
		self.name
	}

	fn description(&self) -> &'static str {
		"Echoes the message."
	}

	fn can_handle(&self, _message: &str, _ctx: &AgentContext) -> f32 {
		self.score
	}

	fn process<'a>(
		&'a self,
		message: &'a str,
		_ctx: &'a AgentContext,
	) -> BoxFuture<'a, AgentResponse> {
		Box::pin(async move { AgentResponse::ok(format!("{}: {message}", self.name)) })
	}
}

fn llm(harness: &Harness) -> Arc<LlmManager> {
	harness.service.ai.as_ref().expect("AI services are missing.").llm.clone()
}

fn director(harness: &Harness, names: &[&'static str]) -> MessageDirector {
	let mut director = MessageDirector::new(llm(harness), 15);

	for name in names {
		director.register(Arc::new(Echo { name, score: 0.5 }));
	}

	director
}

#[tokio::test]
async fn short_messages_are_classified_without_the_model() {
	let harness = Harness::new(ScriptedChat::new("question"));
	let director = director(&harness, &[]);

	assert_eq!(director.analyze_intent("/reindex now").await, Intent::Command);
	assert_eq!(director.analyze_intent("where is my passport?").await, Intent::Question);
	assert_eq!(director.analyze_intent("buy milk").await, Intent::Note);
	assert!(harness.chat.requests().is_empty());
}

#[tokio::test]
async fn long_messages_are_classified_by_the_model() {
	let harness = Harness::new(
		ScriptedChat::new("note").reply_when("Classify the user's message", "Question."),
	);
	let director = director(&harness, &[]);

	assert_eq!(director.analyze_intent(LONG_MESSAGE).await, Intent::Question);

	let requests = harness.chat.requests();

	assert_eq!(requests.len(), 1);
	assert_eq!(requests[0].max_tokens, Some(10));
	assert_eq!(requests[0].messages[1].content, LONG_MESSAGE);
}

#[tokio::test]
async fn unclear_or_failed_classification_falls_back_to_note() {
	let harness = Harness::new(ScriptedChat::new("banana"));
	let director = director(&harness, &[]);

	assert_eq!(director.analyze_intent(LONG_MESSAGE).await, Intent::Note);

	harness.chat.set_failing(true);

	assert_eq!(director.analyze_intent(LONG_MESSAGE).await, Intent::Note);
}

#[tokio::test]
async fn intents_route_to_their_agents() {
	let harness = Harness::new(ScriptedChat::new("note"));
	let director = director(&harness, &[agents::NOTE_TAKER, agents::QA, agents::RESEARCH]);
	let ctx = AgentContext::default();

	assert_eq!(director.route("why is the sky blue?", &ctx).await.text, "qa: why is the sky blue?");
	assert_eq!(director.route("buy milk", &ctx).await.text, "note_taker: buy milk");
	assert_eq!(director.route("/sync", &ctx).await.text, "note_taker: /sync");
}

#[tokio::test]
async fn research_mode_takes_priority_over_intent() {
	let harness = Harness::new(ScriptedChat::new("note"));
	let ctx = AgentContext { awaiting_research: true, ..AgentContext::default() };
	let with_research = director(&harness, &[agents::QA, agents::RESEARCH]);

	assert_eq!(with_research.route("rust?", &ctx).await.text, "research: rust?");

	let without_research = director(&harness, &[agents::QA]);

	assert_eq!(without_research.route("rust?", &ctx).await.text, "qa: rust?");
}

#[tokio::test]
async fn missing_agents_produce_a_failed_response() {
	let harness = Harness::new(ScriptedChat::new("note"));
	let director = director(&harness, &[agents::QA]);
	let response = director.route("buy milk", &AgentContext::default()).await;

	assert!(!response.success);
	assert_eq!(response.text, "No agents available to handle this message.");
}

#[tokio::test]
async fn questions_fall_back_to_the_note_taker() {
	let harness = Harness::new(ScriptedChat::new("note"));
	let ctx = AgentContext::default();
	let note_only = director(&harness, &[agents::NOTE_TAKER]);

	assert_eq!(note_only.route("why is the sky blue?", &ctx).await.text, "note_taker: why is the sky blue?");

	let empty = director(&harness, &[]);
	let response = empty.route("why is the sky blue?", &ctx).await;

	assert!(!response.success);
	assert_eq!(response.text, "No agents available to handle this message.");
}

#[tokio::test]
async fn registering_a_name_twice_replaces_the_agent() {
	let harness = Harness::new(ScriptedChat::new("note"));
	let mut director = director(&harness, &[agents::QA]);

	director.register(Arc::new(Echo { name: agents::QA, score: 0.9 }));

	assert_eq!(director.agents(), vec![agents::QA]);
	assert_eq!(
		director.agent(agents::QA).map(|agent| agent.can_handle("", &AgentContext::default())),
		Some(0.9)
	);
}

#[tokio::test]
async fn select_best_ignores_low_confidence_agents() {
	let harness = Harness::new(ScriptedChat::new("note"));
	let mut director = MessageDirector::new(llm(&harness), 15);
	let ctx = AgentContext::default();

	director.register(Arc::new(Echo { name: "low", score: 0.3 }));

	assert!(director.select_best("anything", &ctx).is_none());

	director.register(Arc::new(Echo { name: "mid", score: 0.6 }));
	director.register(Arc::new(Echo { name: "high", score: 0.8 }));

	assert_eq!(director.select_best("anything", &ctx).map(|agent| agent.name()), Some("high"));
}

#[tokio::test]
async fn service_director_registers_the_builtin_agents() {
	let harness = Harness::new(ScriptedChat::new("note"));
	let ai = harness.service.ai.as_ref().expect("AI services are missing.");

	assert_eq!(ai.director.agents(), vec![agents::NOTE_TAKER, agents::QA, agents::RESEARCH]);
}
