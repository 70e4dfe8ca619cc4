use std::{
	collections::HashMap,
	env, fs,
	path::PathBuf,
	sync::atomic::{AtomicU64, Ordering},
	time::{SystemTime, UNIX_EPOCH},
};

use toml::Value;

use brain_config::{ApiStyle, Config, Error};

const SAMPLE_CONFIG_TEMPLATE_TOML: &str = include_str!("fixtures/sample_config.template.toml");

fn provider_env() -> HashMap<&'static str, &'static str> {
	HashMap::from([("ANTHROPIC_API_KEY", "anthropic-key"), ("OPENAI_API_KEY", "openai-key")])
}

fn write_temp_config(payload: String) -> PathBuf {
	static COUNTER: AtomicU64 = AtomicU64::new(0);

	let nanos = SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.expect("System time must be valid.")
		.as_nanos();
	let ordinal = COUNTER.fetch_add(1, Ordering::SeqCst);
	let pid = std::process::id();
	let mut path = env::temp_dir();

	path.push(format!("brain_config_test_{nanos}_{pid}_{ordinal}.toml"));

	fs::write(&path, payload).expect("Failed to write test config.");

	path
}

fn load_with(
	payload: String,
	vars: HashMap<&'static str, &'static str>,
) -> brain_config::Result<Config> {
	let path = write_temp_config(payload);
	let result =
		brain_config::load_with_env(&path, |key| vars.get(key).map(|value| value.to_string()));

	fs::remove_file(&path).expect("Failed to remove test config.");

	result
}

fn edited_template(edit: impl FnOnce(&mut toml::Table)) -> String {
	let mut value: Value =
		toml::from_str(SAMPLE_CONFIG_TEMPLATE_TOML).expect("Failed to parse template config.");
	let root = value.as_table_mut().expect("Template config must be a table.");

	edit(root);

	toml::to_string(&value).expect("Failed to render template config.")
}

fn base_config() -> Config {
	load_with(SAMPLE_CONFIG_TEMPLATE_TOML.to_string(), provider_env())
		.expect("Template config must load with provider keys.")
}

#[test]
fn provider_keys_come_from_environment_by_api_style() {
	let cfg = base_config();
	let providers = cfg.providers.as_ref().expect("Providers must be configured.");
	let claude = &providers.llm["claude"];
	let openai = &providers.llm["openai"];

	assert_eq!(claude.api_style, ApiStyle::Anthropic);
	assert_eq!(claude.api_key, "anthropic-key");
	assert_eq!(openai.api_key, "openai-key");
	assert_eq!(providers.embedding.api_key, "openai-key");
	assert_eq!(providers.rerank.as_ref().map(|r| r.api_key.as_str()), Some("cohere-key"));
}

#[test]
fn file_keys_win_over_environment() {
	let payload = edited_template(|root| {
		let claude = root
			.get_mut("providers")
			.and_then(Value::as_table_mut)
			.and_then(|providers| providers.get_mut("llm"))
			.and_then(Value::as_table_mut)
			.and_then(|llm| llm.get_mut("claude"))
			.and_then(Value::as_table_mut)
			.expect("Template config must include [providers.llm.claude].");

		claude.insert("api_key".to_string(), Value::String("file-key".to_string()));
	});
	let cfg = load_with(payload, provider_env()).expect("Config must load.");

	let providers = cfg.providers.expect("Providers must be configured.");

	assert_eq!(providers.llm["claude"].api_key, "file-key");
}

#[test]
fn missing_provider_key_is_rejected() {
	let err = load_with(SAMPLE_CONFIG_TEMPLATE_TOML.to_string(), HashMap::new())
		.expect_err("Expected api_key validation error.");

	assert!(
		err.to_string().contains("Provider llm.claude api_key must be non-empty."),
		"Unexpected error: {err}"
	);
}

#[test]
fn providers_section_is_optional() {
	let payload = edited_template(|root| {
		root.remove("providers");
	});
	let cfg = load_with(payload, HashMap::new()).expect("Basic mode config must load.");

	assert!(cfg.providers.is_none());
	assert_eq!(cfg.agents.qa_top_k, 10);
	assert_eq!(cfg.indexer.batch_delay_seconds, 12);
	assert!(cfg.indexer.write_frontmatter);
}

#[test]
fn environment_overrides_service_urls_and_strips_trailing_slash() {
	let mut vars = provider_env();

	vars.insert("COUCHDB_URL", "http://db.internal:5984/");
	vars.insert("NOTES_API_TOKEN", "  env-token  ");
	vars.insert("QDRANT_COLLECTION", "notes_v2");

	let cfg = load_with(SAMPLE_CONFIG_TEMPLATE_TOML.to_string(), vars).expect("Config must load.");

	assert_eq!(cfg.storage.couchdb.url, "http://db.internal:5984");
	assert_eq!(cfg.security.api_token, "env-token");
	assert_eq!(cfg.storage.qdrant.collection, "notes_v2");
}

#[test]
fn embedding_dimensions_override_applies_to_both_sides() {
	let mut vars = provider_env();

	vars.insert("EMBEDDING_DIMENSIONS", "768");

	let cfg = load_with(SAMPLE_CONFIG_TEMPLATE_TOML.to_string(), vars).expect("Config must load.");

	assert_eq!(cfg.storage.qdrant.vector_dim, 768);
	assert_eq!(cfg.providers.expect("Providers must be configured.").embedding.dimensions, 768);
}

#[test]
fn embedding_dimensions_must_match_collection() {
	let mut cfg = base_config();

	cfg.storage.qdrant.vector_dim = 3072;

	let err = brain_config::validate(&cfg).expect_err("Expected dimension mismatch.");

	assert!(
		err.to_string()
			.contains("providers.embedding.dimensions must match storage.qdrant.vector_dim."),
		"Unexpected error: {err}"
	);
}

#[test]
fn default_llm_must_name_a_configured_provider() {
	let mut vars = provider_env();

	vars.insert("DEFAULT_LLM_PROVIDER", "gemini");

	let err = load_with(SAMPLE_CONFIG_TEMPLATE_TOML.to_string(), vars)
		.expect_err("Expected default_llm validation error.");

	assert!(
		err.to_string().contains("providers.default_llm names an unknown provider: gemini."),
		"Unexpected error: {err}"
	);
}

#[test]
fn telegram_token_requires_admin_id() {
	let mut vars = provider_env();

	vars.insert("TELEGRAM_BOT_TOKEN", "123:abc");

	let err = load_with(SAMPLE_CONFIG_TEMPLATE_TOML.to_string(), vars)
		.expect_err("Expected admin_id validation error.");

	assert!(
		err.to_string()
			.contains("telegram.admin_id must be set when telegram.bot_token is configured."),
		"Unexpected error: {err}"
	);
}

#[test]
fn invalid_admin_id_in_environment_is_reported() {
	let mut vars = provider_env();

	vars.insert("TELEGRAM_ADMIN_ID", "not-a-number");

	let err = load_with(SAMPLE_CONFIG_TEMPLATE_TOML.to_string(), vars)
		.expect_err("Expected environment error.");

	assert!(matches!(err, Error::Environment { ref key, .. } if key == "TELEGRAM_ADMIN_ID"));
}

#[test]
fn top_k_cannot_exceed_candidate_limit() {
	let mut cfg = base_config();

	cfg.agents.qa_top_k = 80;

	let err = brain_config::validate(&cfg).expect_err("Expected top_k validation error.");

	assert!(
		err.to_string().contains("agents.qa_top_k must not exceed agents.qa_candidate_limit."),
		"Unexpected error: {err}"
	);
}

#[test]
fn score_threshold_must_be_a_fraction() {
	let mut cfg = base_config();

	cfg.agents.vector_score_threshold = 1.5;

	assert!(brain_config::validate(&cfg).is_err());

	cfg.agents.vector_score_threshold = 0.3;

	assert!(brain_config::validate(&cfg).is_ok());
}

#[test]
fn missing_file_is_a_read_error() {
	let err = brain_config::load_with_env(&PathBuf::from("/nonexistent/brain.toml"), |_| None)
		.expect_err("Expected read error.");

	assert!(matches!(err, Error::ReadConfig { .. }));
}
