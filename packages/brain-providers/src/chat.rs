use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use brain_config::{ApiStyle, LlmProviderConfig};

use crate::{Error, Result};

/// Appended to the prompt when a provider has no native JSON mode.
pub const JSON_ONLY_INSTRUCTION: &str = "Respond with valid JSON only, no markdown formatting.";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
	System,
	User,
	Assistant,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
	pub role: Role,
	pub content: String,
}
impl ChatMessage {
	pub fn system(content: impl Into<String>) -> Self {
		Self { role: Role::System, content: content.into() }
	}

	pub fn user(content: impl Into<String>) -> Self {
		Self { role: Role::User, content: content.into() }
	}

	pub fn assistant(content: impl Into<String>) -> Self {
		Self { role: Role::Assistant, content: content.into() }
	}
}

#[derive(Clone, Debug, PartialEq)]
pub struct ChatRequest {
	pub messages: Vec<ChatMessage>,
	pub temperature: f32,
	/// Falls back to the provider's configured `max_tokens`.
	pub max_tokens: Option<u32>,
	pub json: bool,
}
impl ChatRequest {
	pub fn new(messages: Vec<ChatMessage>) -> Self {
		Self { messages, temperature: 0.7, max_tokens: None, json: false }
	}

	pub fn temperature(mut self, temperature: f32) -> Self {
		self.temperature = temperature;

		self
	}

	pub fn max_tokens(mut self, max_tokens: u32) -> Self {
		self.max_tokens = Some(max_tokens);

		self
	}

	pub fn json(mut self) -> Self {
		self.json = true;

		self
	}
}

pub async fn complete(cfg: &LlmProviderConfig, req: &ChatRequest) -> Result<String> {
	validate_messages(&req.messages)?;

	let client = crate::http_client(cfg.timeout_ms)?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let max_tokens = req.max_tokens.unwrap_or(cfg.max_tokens);

	match cfg.api_style {
		ApiStyle::Anthropic => {
			let body = anthropic_body(&cfg.model, req, max_tokens)?;
			let request = client
				.post(url)
				.headers(crate::anthropic_headers(&cfg.api_key, &cfg.default_headers)?)
				.json(&body);

			parse_anthropic_response(&crate::send_json(request).await?)
		},
		ApiStyle::OpenAi => {
			let body = openai_body(&cfg.model, req, max_tokens);
			let request = client
				.post(url)
				.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
				.json(&body);

			parse_openai_response(&crate::send_json(request).await?)
		},
	}
}

/// Completes in JSON mode with a single request and parses the reply into an object.
pub async fn complete_json(cfg: &LlmProviderConfig, req: &ChatRequest) -> Result<Value> {
	let text = complete(cfg, &req.clone().json()).await?;

	parse_json_reply(&text)
}

/// Parses a model reply that should hold one JSON object.
///
/// Accepts Markdown code fences and leading or trailing prose around the object.
pub fn parse_json_reply(text: &str) -> Result<Value> {
	let trimmed = text.trim();
	let unfenced = trimmed
		.strip_prefix("```json")
		.or_else(|| trimmed.strip_prefix("```"))
		.map(|rest| rest.trim_end().trim_end_matches("```").trim())
		.unwrap_or(trimmed);

	if let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(unfenced) {
		return Ok(value);
	}

	let start = unfenced.find('{');
	let end = unfenced.rfind('}');

	if let (Some(start), Some(end)) = (start, end)
		&& start < end
		&& let Ok(value @ Value::Object(_)) = serde_json::from_str::<Value>(&unfenced[start..=end])
	{
		return Ok(value);
	}

	Err(Error::InvalidResponse { message: "Model reply is not a JSON object.".to_string() })
}

fn validate_messages(messages: &[ChatMessage]) -> Result<()> {
	if messages.is_empty() {
		return Err(Error::InvalidRequest {
			message: "Chat request must contain at least one message.".to_string(),
		});
	}
	if messages.iter().all(|message| message.role == Role::System) {
		return Err(Error::InvalidRequest {
			message: "Chat request must contain a user or assistant message.".to_string(),
		});
	}

	Ok(())
}

fn anthropic_body(model: &str, req: &ChatRequest, max_tokens: u32) -> Result<Value> {
	let system = req
		.messages
		.iter()
		.filter(|message| message.role == Role::System)
		.map(|message| message.content.as_str())
		.collect::<Vec<_>>()
		.join("\n\n");
	let mut messages: Vec<ChatMessage> =
		req.messages.iter().filter(|message| message.role != Role::System).cloned().collect();

	if req.json
		&& let Some(last) = messages.iter_mut().rev().find(|message| message.role == Role::User)
	{
		last.content = format!("{}\n\n{JSON_ONLY_INSTRUCTION}", last.content);
	}

	let mut body = json!({
		"model": model,
		"max_tokens": max_tokens,
		"temperature": req.temperature,
		"messages": serde_json::to_value(&messages)?,
	});

	if !system.is_empty() {
		body["system"] = Value::String(system);
	}

	Ok(body)
}

fn openai_body(model: &str, req: &ChatRequest, max_tokens: u32) -> Value {
	let mut body = json!({
		"model": model,
		"messages": req.messages,
		"temperature": req.temperature,
		"max_tokens": max_tokens,
	});

	if req.json {
		body["response_format"] = json!({ "type": "json_object" });
	}

	body
}

fn parse_anthropic_response(json: &Value) -> Result<String> {
	let blocks = json.get("content").and_then(Value::as_array).ok_or_else(|| {
		Error::InvalidResponse { message: "Anthropic response is missing content.".to_string() }
	})?;
	let text: String = blocks
		.iter()
		.filter(|block| block.get("type").and_then(Value::as_str).unwrap_or("text") == "text")
		.filter_map(|block| block.get("text").and_then(Value::as_str))
		.collect();

	if text.is_empty() {
		return Err(Error::InvalidResponse {
			message: "Anthropic response has no text content.".to_string(),
		});
	}

	Ok(text)
}

fn parse_openai_response(json: &Value) -> Result<String> {
	json.get("choices")
		.and_then(Value::as_array)
		.and_then(|choices| choices.first())
		.and_then(|choice| choice.get("message"))
		.and_then(|message| message.get("content"))
		.and_then(Value::as_str)
		.map(str::to_string)
		.ok_or_else(|| Error::InvalidResponse {
			message: "Chat completion response is missing choices[0].message.content.".to_string(),
		})
}
