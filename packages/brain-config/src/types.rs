use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Clone, Debug, Deserialize)]
pub struct Config {
	#[serde(default)]
	pub service: Service,
	pub security: Security,
	pub storage: Storage,
	/// Optional. Without providers the system runs in basic mode: notes are stored verbatim and
	/// neither the agent layer nor the indexer is started.
	pub providers: Option<Providers>,
	#[serde(default)]
	pub telegram: Telegram,
	#[serde(default)]
	pub agents: Agents,
	#[serde(default)]
	pub indexer: Indexer,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Service {
	pub http_bind: String,
	pub log_level: String,
}
impl Default for Service {
	fn default() -> Self {
		Self { http_bind: "0.0.0.0:8000".to_string(), log_level: "info".to_string() }
	}
}

#[derive(Clone, Debug, Deserialize)]
pub struct Security {
	/// Shared secret expected in the `X-API-Token` header.
	#[serde(default)]
	pub api_token: String,
	#[serde(default)]
	pub cors_allow_any: bool,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Storage {
	#[serde(default)]
	pub couchdb: CouchDb,
	#[serde(default)]
	pub qdrant: Qdrant,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct CouchDb {
	pub url: String,
	pub user: String,
	pub password: String,
	pub database: String,
	pub timeout_ms: u64,
}
impl Default for CouchDb {
	fn default() -> Self {
		Self {
			url: "http://couchdb:5984".to_string(),
			user: "admin".to_string(),
			password: String::new(),
			database: "obsidian_notes".to_string(),
			timeout_ms: 30_000,
		}
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Qdrant {
	/// gRPC endpoint.
	pub url: String,
	pub collection: String,
	pub vector_dim: u32,
}
impl Default for Qdrant {
	fn default() -> Self {
		Self {
			url: "http://qdrant:6334".to_string(),
			collection: "second_brain_notes".to_string(),
			vector_dim: 1536,
		}
	}
}

#[derive(Clone, Debug, Deserialize)]
pub struct Providers {
	#[serde(default = "default_llm")]
	pub default_llm: String,
	/// Chat providers keyed by the name used in `default_llm`.
	pub llm: BTreeMap<String, LlmProviderConfig>,
	pub embedding: EmbeddingProviderConfig,
	pub rerank: Option<ProviderConfig>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApiStyle {
	Anthropic,
	#[serde(rename = "openai")]
	OpenAi,
}

#[derive(Clone, Debug, Deserialize)]
pub struct LlmProviderConfig {
	pub api_style: ApiStyle,
	pub api_base: String,
	#[serde(default)]
	pub api_key: String,
	pub path: String,
	pub model: String,
	#[serde(default = "default_max_tokens")]
	pub max_tokens: u32,
	#[serde(default = "default_llm_timeout_ms")]
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	#[serde(default)]
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	#[serde(default = "default_provider_timeout_ms")]
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	#[serde(default)]
	pub api_key: String,
	pub path: String,
	pub model: String,
	#[serde(default = "default_provider_timeout_ms")]
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default)]
pub struct Telegram {
	pub bot_token: String,
	/// The only Telegram user the bot answers.
	pub admin_id: i64,
}
impl Telegram {
	pub fn enabled(&self) -> bool {
		!self.bot_token.trim().is_empty()
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Agents {
	/// Messages with fewer words than this are saved as notes without asking the LLM.
	pub note_word_threshold: usize,
	pub vector_limit: u64,
	pub vector_score_threshold: f32,
	pub fulltext_limit: usize,
	pub qa_candidate_limit: usize,
	pub qa_top_k: usize,
	pub research_candidate_limit: usize,
	pub research_top_k: usize,
}
impl Default for Agents {
	fn default() -> Self {
		Self {
			note_word_threshold: 15,
			vector_limit: 30,
			vector_score_threshold: 0.3,
			fulltext_limit: 30,
			qa_candidate_limit: 50,
			qa_top_k: 10,
			research_candidate_limit: 100,
			research_top_k: 30,
		}
	}
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Indexer {
	pub enabled: bool,
	pub initial_delay_seconds: u64,
	pub batch_size: usize,
	pub batch_delay_seconds: u64,
	pub scan_interval_seconds: u64,
	pub error_backoff_seconds: u64,
	pub scan_limit: usize,
	pub max_pending: usize,
	/// Write the AI frontmatter back into CouchDB after a note is embedded.
	pub write_frontmatter: bool,
}
impl Default for Indexer {
	fn default() -> Self {
		Self {
			enabled: true,
			initial_delay_seconds: 30,
			batch_size: 5,
			batch_delay_seconds: 12,
			scan_interval_seconds: 600,
			error_backoff_seconds: 60,
			scan_limit: 500,
			max_pending: 50,
			write_frontmatter: true,
		}
	}
}

fn default_llm() -> String {
	"claude".to_string()
}

fn default_max_tokens() -> u32 {
	2_000
}

fn default_llm_timeout_ms() -> u64 {
	60_000
}

fn default_provider_timeout_ms() -> u64 {
	30_000
}
