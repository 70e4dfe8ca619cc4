use std::sync::Arc;

use brain_providers::chat::ChatMessage;
use brain_service::{Error, LlmManager};
use brain_testkit::{Harness, ScriptedChat, config};

fn llm(harness: &Harness) -> Arc<LlmManager> {
	harness.service.ai.as_ref().expect("AI services are missing.").llm.clone()
}

#[tokio::test]
async fn default_provider_completes_with_the_given_settings() {
	let harness = Harness::new(ScriptedChat::new("pong"));
	let llm = llm(&harness);

	assert_eq!(llm.default_provider(), "claude");
	assert_eq!(llm.provider_names(), vec!["claude".to_string()]);

	let reply = llm
		.complete(vec![ChatMessage::user("ping")], 0.2, Some(42))
		.await
		.expect("Failed to complete.");
	let requests = harness.chat.requests();

	assert_eq!(reply, "pong");
	assert_eq!(requests.len(), 1);
	assert_eq!(requests[0].temperature, 0.2);
	assert_eq!(requests[0].max_tokens, Some(42));
	assert!(!requests[0].json);
}

#[tokio::test]
async fn unknown_providers_are_rejected_before_any_request() {
	let harness = Harness::new(ScriptedChat::new("pong"));
	let err = llm(&harness)
		.complete_with("gpt", vec![ChatMessage::user("ping")], 0.5, None)
		.await
		.expect_err("Unknown provider was accepted.");

	assert!(matches!(err, Error::InvalidRequest { .. }));
	assert!(harness.chat.requests().is_empty());
}

#[tokio::test]
async fn json_completions_parse_fenced_objects() {
	let harness = Harness::new(ScriptedChat::new("```json\n{\"category\": \"Ideas\"}\n```"));
	let value = llm(&harness)
		.complete_json(vec![ChatMessage::user("classify")], 0.3, None)
		.await
		.expect("Failed to complete JSON.");

	assert_eq!(value["category"], "Ideas");
	assert!(harness.chat.requests()[0].json);
}

#[tokio::test]
async fn embed_text_returns_one_vector() {
	let harness = Harness::new(ScriptedChat::new(""));
	let vector = llm(&harness).embed_text("tokio runtime").await.expect("Failed to embed.");

	assert_eq!(vector, harness.embedding.vector("tokio runtime"));

	harness.embedding.set_failing(true);

	let err = llm(&harness).embed_text("tokio").await.expect_err("Embedding failure was hidden.");

	assert!(matches!(err, Error::Provider { .. }));
}

#[tokio::test]
async fn rerank_needs_a_configured_provider() {
	let mut cfg = config();

	if let Some(providers) = cfg.providers.as_mut() {
		providers.rerank = None;
	}

	let harness = Harness::with_config(cfg, ScriptedChat::new(""));
	let llm = llm(&harness);

	assert!(!llm.has_rerank());

	let err = llm
		.rerank("query", &["doc".to_string()], 1)
		.await
		.expect_err("Rerank ran without a provider.");

	assert!(matches!(err, Error::Unavailable { .. }));
	assert_eq!(harness.rerank.calls(), 0);
}
