pub mod note_taker;
pub mod qa;
pub mod research;
pub mod retrieval;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::BoxFuture;

pub const NOTE_TAKER: &str = "note_taker";
pub const QA: &str = "qa";
pub const RESEARCH: &str = "research";

/// A routing target for free-text messages.
pub trait Agent
where
	Self: Send + Sync,
{
	fn name(&self) -> &'static str;

	fn description(&self) -> &'static str;

	/// Confidence in `0.0..=1.0` that this agent should take the message.
	fn can_handle(&self, message: &str, ctx: &AgentContext) -> f32;

	/// Agents report failures in the response instead of returning errors.
	fn process<'a>(&'a self, message: &'a str, ctx: &'a AgentContext)
	-> BoxFuture<'a, AgentResponse>;
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentContext {
	pub user_id: Option<i64>,
	#[serde(default)]
	pub username: String,
	#[serde(default)]
	pub awaiting_research: bool,
	#[serde(default)]
	pub source: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AgentResponse {
	pub text: String,
	pub success: bool,
	#[serde(default)]
	pub metadata: Map<String, Value>,
	#[serde(default)]
	pub suggested_actions: Vec<String>,
}
impl AgentResponse {
	pub fn ok(text: impl Into<String>) -> Self {
		Self { text: text.into(), success: true, metadata: Map::new(), suggested_actions: Vec::new() }
	}

	pub fn failed(text: impl Into<String>) -> Self {
		Self { success: false, ..Self::ok(text) }
	}

	pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
		self.metadata.insert(key.to_string(), value.into());

		self
	}
}
