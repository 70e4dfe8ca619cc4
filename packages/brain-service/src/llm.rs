use std::collections::BTreeMap;

use serde_json::Value;

use brain_config::{EmbeddingProviderConfig, LlmProviderConfig, ProviderConfig};
use brain_providers::{
	chat::{ChatMessage, ChatRequest},
	rerank::RerankHit,
};

use crate::{Error, Providers, Result};

/// Embedding inputs are cut to this many characters.
pub const MAX_EMBED_CHARS: usize = 8_000;

/// Named chat providers plus the embedding and rerank endpoints.
pub struct LlmManager {
	llm: BTreeMap<String, LlmProviderConfig>,
	default_llm: String,
	embedding: EmbeddingProviderConfig,
	rerank: Option<ProviderConfig>,
	providers: Providers,
}
impl LlmManager {
	pub fn new(cfg: &brain_config::Providers, providers: Providers) -> Self {
		Self {
			llm: cfg.llm.clone(),
			default_llm: cfg.default_llm.clone(),
			embedding: cfg.embedding.clone(),
			rerank: cfg.rerank.clone(),
			providers,
		}
	}

	pub fn default_provider(&self) -> &str {
		&self.default_llm
	}

	pub fn provider_names(&self) -> Vec<String> {
		self.llm.keys().cloned().collect()
	}

	pub fn has_rerank(&self) -> bool {
		self.rerank.is_some()
	}

	/// Completes with the default provider.
	pub async fn complete(
		&self,
		messages: Vec<ChatMessage>,
		temperature: f32,
		max_tokens: Option<u32>,
	) -> Result<String> {
		self.complete_with(&self.default_llm, messages, temperature, max_tokens).await
	}

	pub async fn complete_with(
		&self,
		provider: &str,
		messages: Vec<ChatMessage>,
		temperature: f32,
		max_tokens: Option<u32>,
	) -> Result<String> {
		let cfg = self.provider(provider)?;
		let req = request(messages, temperature, max_tokens);

		self.providers.chat.complete(cfg, &req).await
	}

	/// Completes in JSON mode with the default provider and returns the parsed object.
	pub async fn complete_json(
		&self,
		messages: Vec<ChatMessage>,
		temperature: f32,
		max_tokens: Option<u32>,
	) -> Result<Value> {
		let cfg = self.provider(&self.default_llm)?;
		let req = request(messages, temperature, max_tokens).json();

		self.providers.chat.complete_json(cfg, &req).await
	}

	pub async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
		self.providers.embedding.embed(&self.embedding, texts).await
	}

	/// Embeds one text, truncated to [`MAX_EMBED_CHARS`].
	pub async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
		let input = vec![brain_domain::paths::truncate_chars(text, MAX_EMBED_CHARS).to_string()];

		self.embed(&input).await?.into_iter().next().ok_or_else(|| Error::Provider {
			message: "Embedding provider returned no vectors.".to_string(),
		})
	}

	/// Reranks `docs` against `query`. Fails with [`Error::Unavailable`] without a rerank provider.
	pub async fn rerank(
		&self,
		query: &str,
		docs: &[String],
		top_n: usize,
	) -> Result<Vec<RerankHit>> {
		let Some(cfg) = &self.rerank else {
			return Err(Error::Unavailable {
				message: "No rerank provider is configured.".to_string(),
			});
		};

		self.providers.rerank.rerank(cfg, query, docs, top_n).await
	}

	fn provider(&self, name: &str) -> Result<&LlmProviderConfig> {
		self.llm.get(name).ok_or_else(|| Error::InvalidRequest {
			message: format!("Unknown LLM provider {name:?}."),
		})
	}
}

fn request(messages: Vec<ChatMessage>, temperature: f32, max_tokens: Option<u32>) -> ChatRequest {
	let req = ChatRequest::new(messages).temperature(temperature);

	match max_tokens {
		Some(max_tokens) => req.max_tokens(max_tokens),
		None => req,
	}
}
