mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Agents, ApiStyle, Config, CouchDb, EmbeddingProviderConfig, Indexer, LlmProviderConfig,
	ProviderConfig, Providers, Qdrant, Security, Service, Storage, Telegram,
};

use std::{env, fs, path::Path};

/// Loads the config file and applies overrides from the process environment.
pub fn load(path: &Path) -> Result<Config> {
	load_with_env(path, |key| env::var(key).ok())
}

/// Same as [`load`], reading overrides through `lookup` instead of the process environment.
pub fn load_with_env<F>(path: &Path, lookup: F) -> Result<Config>
where
	F: Fn(&str) -> Option<String>,
{
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	apply_env(&mut cfg, lookup)?;
	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

/// Overrides config values with non-empty environment variables.
///
/// Provider keys only fill providers whose key is still empty, so a key written in the file wins
/// over the shared environment key.
pub fn apply_env<F>(cfg: &mut Config, lookup: F) -> Result<()>
where
	F: Fn(&str) -> Option<String>,
{
	let var =
		|key: &str| lookup(key).map(|value| value.trim().to_string()).filter(|v| !v.is_empty());

	if let Some(value) = var("COUCHDB_URL") {
		cfg.storage.couchdb.url = value;
	}
	if let Some(value) = var("COUCHDB_USER") {
		cfg.storage.couchdb.user = value;
	}
	if let Some(value) = var("COUCHDB_PASSWORD") {
		cfg.storage.couchdb.password = value;
	}
	if let Some(value) = var("COUCHDB_DATABASE") {
		cfg.storage.couchdb.database = value;
	}
	if let Some(value) = var("NOTES_API_TOKEN") {
		cfg.security.api_token = value;
	}
	if let Some(value) = var("TELEGRAM_BOT_TOKEN") {
		cfg.telegram.bot_token = value;
	}
	if let Some(value) = var("TELEGRAM_ADMIN_ID") {
		cfg.telegram.admin_id = value.parse().map_err(|_| Error::Environment {
			key: "TELEGRAM_ADMIN_ID".to_string(),
			message: "expected an integer user id.".to_string(),
		})?;
	}
	if let Some(value) = var("QDRANT_URL") {
		cfg.storage.qdrant.url = value;
	}
	if let Some(value) = var("QDRANT_COLLECTION") {
		cfg.storage.qdrant.collection = value;
	}

	let dimensions = match var("EMBEDDING_DIMENSIONS") {
		Some(value) => Some(value.parse::<u32>().map_err(|_| Error::Environment {
			key: "EMBEDDING_DIMENSIONS".to_string(),
			message: "expected a positive integer.".to_string(),
		})?),
		None => None,
	};

	if let Some(dimensions) = dimensions {
		cfg.storage.qdrant.vector_dim = dimensions;
	}

	let Some(providers) = cfg.providers.as_mut() else {
		return Ok(());
	};

	if let Some(dimensions) = dimensions {
		providers.embedding.dimensions = dimensions;
	}
	if let Some(value) = var("DEFAULT_LLM_PROVIDER") {
		providers.default_llm = value;
	}

	let anthropic_key = var("ANTHROPIC_API_KEY");
	let openai_key = var("OPENAI_API_KEY");

	for llm in providers.llm.values_mut() {
		let key = match llm.api_style {
			ApiStyle::Anthropic => anthropic_key.as_ref(),
			ApiStyle::OpenAi => openai_key.as_ref(),
		};

		if let Some(key) = key
			&& llm.api_key.trim().is_empty()
		{
			llm.api_key = key.clone();
		}
	}

	if let Some(key) = openai_key
		&& providers.embedding.api_key.trim().is_empty()
	{
		providers.embedding.api_key = key;
	}
	if let Some(key) = var("COHERE_API_KEY")
		&& let Some(rerank) = providers.rerank.as_mut()
		&& rerank.api_key.trim().is_empty()
	{
		rerank.api_key = key;
	}

	Ok(())
}

pub fn validate(cfg: &Config) -> Result<()> {
	for (label, value) in [
		("service.http_bind", &cfg.service.http_bind),
		("security.api_token", &cfg.security.api_token),
		("storage.couchdb.url", &cfg.storage.couchdb.url),
		("storage.couchdb.database", &cfg.storage.couchdb.database),
		("storage.qdrant.url", &cfg.storage.qdrant.url),
		("storage.qdrant.collection", &cfg.storage.qdrant.collection),
	] {
		if value.trim().is_empty() {
			return Err(Error::Validation { message: format!("{label} must be non-empty.") });
		}
	}

	if cfg.storage.couchdb.timeout_ms == 0 {
		return Err(Error::Validation {
			message: "storage.couchdb.timeout_ms must be greater than zero.".to_string(),
		});
	}
	if cfg.storage.qdrant.vector_dim == 0 {
		return Err(Error::Validation {
			message: "storage.qdrant.vector_dim must be greater than zero.".to_string(),
		});
	}
	if cfg.telegram.enabled() && cfg.telegram.admin_id == 0 {
		return Err(Error::Validation {
			message: "telegram.admin_id must be set when telegram.bot_token is configured."
				.to_string(),
		});
	}

	validate_agents(&cfg.agents)?;
	validate_indexer(&cfg.indexer)?;

	if let Some(providers) = cfg.providers.as_ref() {
		validate_providers(providers, cfg.storage.qdrant.vector_dim)?;
	}

	Ok(())
}

fn validate_agents(agents: &Agents) -> Result<()> {
	if !agents.vector_score_threshold.is_finite()
		|| agents.vector_score_threshold <= 0.0
		|| agents.vector_score_threshold > 1.0
	{
		return Err(Error::Validation {
			message: "agents.vector_score_threshold must be in the range (0.0, 1.0].".to_string(),
		});
	}

	for (label, value) in [
		("agents.vector_limit", agents.vector_limit as usize),
		("agents.fulltext_limit", agents.fulltext_limit),
		("agents.qa_candidate_limit", agents.qa_candidate_limit),
		("agents.qa_top_k", agents.qa_top_k),
		("agents.research_candidate_limit", agents.research_candidate_limit),
		("agents.research_top_k", agents.research_top_k),
	] {
		if value == 0 {
			return Err(Error::Validation { message: format!("{label} must be greater than zero.") });
		}
	}

	if agents.qa_top_k > agents.qa_candidate_limit {
		return Err(Error::Validation {
			message: "agents.qa_top_k must not exceed agents.qa_candidate_limit.".to_string(),
		});
	}
	if agents.research_top_k > agents.research_candidate_limit {
		return Err(Error::Validation {
			message: "agents.research_top_k must not exceed agents.research_candidate_limit."
				.to_string(),
		});
	}

	Ok(())
}

fn validate_indexer(indexer: &Indexer) -> Result<()> {
	if indexer.batch_size == 0 {
		return Err(Error::Validation {
			message: "indexer.batch_size must be greater than zero.".to_string(),
		});
	}
	if indexer.scan_limit == 0 {
		return Err(Error::Validation {
			message: "indexer.scan_limit must be greater than zero.".to_string(),
		});
	}
	if indexer.max_pending == 0 {
		return Err(Error::Validation {
			message: "indexer.max_pending must be greater than zero.".to_string(),
		});
	}
	if indexer.scan_interval_seconds == 0 {
		return Err(Error::Validation {
			message: "indexer.scan_interval_seconds must be greater than zero.".to_string(),
		});
	}

	Ok(())
}

fn validate_providers(providers: &Providers, vector_dim: u32) -> Result<()> {
	if providers.llm.is_empty() {
		return Err(Error::Validation {
			message: "providers.llm must configure at least one provider.".to_string(),
		});
	}
	if !providers.llm.contains_key(&providers.default_llm) {
		return Err(Error::Validation {
			message: format!(
				"providers.default_llm names an unknown provider: {}.",
				providers.default_llm
			),
		});
	}

	for (name, llm) in &providers.llm {
		if llm.api_key.trim().is_empty() {
			return Err(Error::Validation {
				message: format!("Provider llm.{name} api_key must be non-empty."),
			});
		}
		if llm.model.trim().is_empty() {
			return Err(Error::Validation {
				message: format!("Provider llm.{name} model must be non-empty."),
			});
		}
		if llm.max_tokens == 0 {
			return Err(Error::Validation {
				message: format!("Provider llm.{name} max_tokens must be greater than zero."),
			});
		}
	}

	if providers.embedding.dimensions == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must be greater than zero.".to_string(),
		});
	}
	if providers.embedding.dimensions != vector_dim {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must match storage.qdrant.vector_dim."
				.to_string(),
		});
	}
	if providers.embedding.api_key.trim().is_empty() {
		return Err(Error::Validation {
			message: "Provider embedding api_key must be non-empty.".to_string(),
		});
	}
	if let Some(rerank) = providers.rerank.as_ref()
		&& rerank.api_key.trim().is_empty()
	{
		return Err(Error::Validation {
			message: "Provider rerank api_key must be non-empty.".to_string(),
		});
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	let couchdb = &mut cfg.storage.couchdb;

	couchdb.url = couchdb.url.trim().trim_end_matches('/').to_string();
	couchdb.database = couchdb.database.trim().to_string();
	cfg.security.api_token = cfg.security.api_token.trim().to_string();
	cfg.telegram.bot_token = cfg.telegram.bot_token.trim().to_string();

	if let Some(providers) = cfg.providers.as_mut() {
		providers.default_llm = providers.default_llm.trim().to_string();

		for llm in providers.llm.values_mut() {
			llm.api_base = llm.api_base.trim_end_matches('/').to_string();
		}

		providers.embedding.api_base =
			providers.embedding.api_base.trim_end_matches('/').to_string();

		if let Some(rerank) = providers.rerank.as_mut() {
			rerank.api_base = rerank.api_base.trim_end_matches('/').to_string();
		}
	}
}
