use reqwest::header::AUTHORIZATION;
use serde_json::{Map, Value, json};
use wiremock::{
	Mock, MockServer, ResponseTemplate,
	matchers::{body_partial_json, header, method, path},
};

use brain_config::{ApiStyle, EmbeddingProviderConfig, LlmProviderConfig, ProviderConfig};
use brain_providers::{
	chat::{self, ChatMessage, ChatRequest},
	embedding, rerank,
};

fn llm_config(server: &MockServer, api_style: ApiStyle, path: &str) -> LlmProviderConfig {
	LlmProviderConfig {
		api_style,
		api_base: server.uri(),
		api_key: "secret".to_string(),
		path: path.to_string(),
		model: "test-model".to_string(),
		max_tokens: 256,
		timeout_ms: 5_000,
		default_headers: Map::new(),
	}
}

fn embedding_config(server: &MockServer, dimensions: u32) -> EmbeddingProviderConfig {
	EmbeddingProviderConfig {
		provider_id: "openai".to_string(),
		api_base: server.uri(),
		api_key: "secret".to_string(),
		path: "/v1/embeddings".to_string(),
		model: "text-embedding-3-small".to_string(),
		dimensions,
		timeout_ms: 5_000,
		default_headers: Map::new(),
	}
}

fn rerank_config(server: &MockServer) -> ProviderConfig {
	ProviderConfig {
		provider_id: "cohere".to_string(),
		api_base: server.uri(),
		api_key: "secret".to_string(),
		path: "/v1/rerank".to_string(),
		model: "rerank-english-v3.0".to_string(),
		timeout_ms: 5_000,
		default_headers: Map::new(),
	}
}

fn openai_reply(content: &str) -> Value {
	json!({ "choices": [{ "message": { "role": "assistant", "content": content } }] })
}

#[test]
fn builds_bearer_auth_header() {
	let headers =
		brain_providers::auth_headers("secret", &Map::new()).expect("Failed to build headers.");
	let value = headers.get(AUTHORIZATION).expect("Missing authorization header.");

	assert_eq!(value, "Bearer secret");
}

#[test]
fn rejects_non_string_default_headers() {
	let mut defaults = Map::new();

	defaults.insert("x-team".to_string(), json!(7));

	assert!(brain_providers::auth_headers("secret", &defaults).is_err());
}

#[tokio::test]
async fn anthropic_completion_uses_messages_api() {
	let server = MockServer::start().await;

	Mock::given(method("POST"))
		.and(path("/v1/messages"))
		.and(header("x-api-key", "secret"))
		.and(header("anthropic-version", brain_providers::ANTHROPIC_VERSION))
		.and(body_partial_json(json!({ "system": "Be brief.", "max_tokens": 1000 })))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({
			"content": [{ "type": "text", "text": "Paris." }]
		})))
		.expect(1)
		.mount(&server)
		.await;

	let cfg = llm_config(&server, ApiStyle::Anthropic, "/v1/messages");
	let req = ChatRequest::new(vec![
		ChatMessage::system("Be brief."),
		ChatMessage::user("Capital of France?"),
	])
	.max_tokens(1000);
	let reply = chat::complete(&cfg, &req).await.expect("Completion failed.");

	assert_eq!(reply, "Paris.");
}

#[tokio::test]
async fn openai_completion_reports_http_errors() {
	let server = MockServer::start().await;

	Mock::given(method("POST"))
		.and(path("/v1/chat/completions"))
		.respond_with(ResponseTemplate::new(429).set_body_string("rate limited"))
		.mount(&server)
		.await;

	let cfg = llm_config(&server, ApiStyle::OpenAi, "/v1/chat/completions");
	let req = ChatRequest::new(vec![ChatMessage::user("hi")]);
	let err = chat::complete(&cfg, &req).await.expect_err("Expected HTTP error.");

	assert!(
		matches!(err, brain_providers::Error::Status { status: 429, ref body } if body == "rate limited")
	);
}

#[tokio::test]
async fn json_completion_parses_the_reply() {
	let server = MockServer::start().await;

	Mock::given(method("POST"))
		.and(path("/v1/chat/completions"))
		.and(body_partial_json(json!({ "response_format": { "type": "json_object" } })))
		.respond_with(
			ResponseTemplate::new(200).set_body_json(openai_reply("{\"category\": \"Ideas\"}")),
		)
		.mount(&server)
		.await;

	let cfg = llm_config(&server, ApiStyle::OpenAi, "/v1/chat/completions");
	let req = ChatRequest::new(vec![ChatMessage::user("classify")]).temperature(0.3);
	let value = chat::complete_json(&cfg, &req).await.expect("JSON completion failed.");

	assert_eq!(value["category"], "Ideas");
}

#[tokio::test]
async fn json_completion_sends_one_request_and_fails_on_bad_reply() {
	let server = MockServer::start().await;

	Mock::given(method("POST"))
		.and(path("/v1/chat/completions"))
		.respond_with(ResponseTemplate::new(200).set_body_json(openai_reply("not json")))
		.mount(&server)
		.await;

	let cfg = llm_config(&server, ApiStyle::OpenAi, "/v1/chat/completions");
	let req = ChatRequest::new(vec![ChatMessage::user("classify")]);
	let err = chat::complete_json(&cfg, &req).await.expect_err("Expected a JSON error.");
	let requests = server.received_requests().await.expect("Request recording is disabled.");

	assert!(matches!(err, brain_providers::Error::InvalidResponse { .. }));
	assert_eq!(requests.len(), 1);
}

#[tokio::test]
async fn embeddings_are_checked_against_dimensions() {
	let server = MockServer::start().await;

	Mock::given(method("POST"))
		.and(path("/v1/embeddings"))
		.and(body_partial_json(json!({ "dimensions": 3 })))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({
			"data": [{ "index": 0, "embedding": [0.1, 0.2, 0.3] }]
		})))
		.mount(&server)
		.await;

	let texts = vec!["hello".to_string()];
	let vectors = embedding::embed(&embedding_config(&server, 3), &texts)
		.await
		.expect("Embedding failed.");

	assert_eq!(vectors, vec![vec![0.1, 0.2, 0.3]]);

	let mismatch = embedding::embed(&embedding_config(&server, 4), &texts).await;

	assert!(mismatch.is_err());
}

#[tokio::test]
async fn rerank_returns_best_hits_first() {
	let server = MockServer::start().await;

	Mock::given(method("POST"))
		.and(path("/v1/rerank"))
		.and(body_partial_json(json!({ "query": "rust", "top_n": 2 })))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({
			"results": [
				{ "index": 2, "relevance_score": 0.4 },
				{ "index": 0, "relevance_score": 0.8 }
			]
		})))
		.mount(&server)
		.await;

	let docs = vec!["tokio".to_string(), "python".to_string(), "cargo".to_string()];
	let hits = rerank::rerank(&rerank_config(&server), "rust", &docs, 2)
		.await
		.expect("Rerank failed.");
	let order: Vec<usize> = hits.iter().map(|hit| hit.index).collect();

	assert_eq!(order, vec![0, 2]);
}
