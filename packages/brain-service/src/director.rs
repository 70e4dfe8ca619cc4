use std::sync::Arc;

use brain_domain::intent::{self, Intent};
use brain_providers::chat::ChatMessage;

use crate::{
	LlmManager,
	agents::{Agent, AgentContext, AgentResponse, NOTE_TAKER, QA, RESEARCH},
};

/// Agents scoring at or below this are never selected.
const SELECT_THRESHOLD: f32 = 0.3;
const INTENT_TEMPERATURE: f32 = 0.1;
const INTENT_MAX_TOKENS: u32 = 10;

const INTENT_PROMPT: &str = "Classify the user's message as exactly one of: question, note, \
command.

- question: the user asks something or wants information from their notes.
- note: the user wants to save information, an idea or a task.
- command: the user wants the system to perform an action.

Reply with one word only.";

/// Routes free-text messages to registered agents.
pub struct MessageDirector {
	llm: Arc<LlmManager>,
	agents: Vec<Arc<dyn Agent>>,
	note_word_threshold: usize,
}
impl MessageDirector {
	pub fn new(llm: Arc<LlmManager>, note_word_threshold: usize) -> Self {
		Self { llm, agents: Vec::new(), note_word_threshold }
	}

	/// Registers `agent`, replacing any agent with the same name.
	pub fn register(&mut self, agent: Arc<dyn Agent>) {
		self.agents.retain(|existing| existing.name() != agent.name());

		tracing::info!(agent = agent.name(), "Registered agent.");

		self.agents.push(agent);
	}

	pub fn agent(&self, name: &str) -> Option<&Arc<dyn Agent>> {
		self.agents.iter().find(|agent| agent.name() == name)
	}

	pub fn agents(&self) -> Vec<&'static str> {
		self.agents.iter().map(|agent| agent.name()).collect()
	}

	pub async fn route(&self, message: &str, ctx: &AgentContext) -> AgentResponse {
		if ctx.awaiting_research
			&& let Some(agent) = self.agent(RESEARCH)
		{
			tracing::info!(agent = RESEARCH, "Routing message.");

			return agent.process(message, ctx).await;
		}

		let intent = self.analyze_intent(message).await;
		// Questions fall through to the note taker when no qa agent is registered.
		let candidates: &[&str] = match intent {
			Intent::Question => &[QA, NOTE_TAKER],
			Intent::Note | Intent::Command => &[NOTE_TAKER],
		};

		for name in candidates {
			if let Some(agent) = self.agent(name) {
				tracing::info!(intent = intent.as_str(), agent = *name, "Routing message.");

				return agent.process(message, ctx).await;
			}
		}

		tracing::warn!(intent = intent.as_str(), "No agent registered for intent.");

		AgentResponse::failed("No agents available to handle this message.")
	}

	/// Heuristics first, then the default chat model. Falls back to [`Intent::Note`].
	pub async fn analyze_intent(&self, message: &str) -> Intent {
		if let Some(intent) = intent::quick_intent(message, self.note_word_threshold) {
			return intent;
		}

		let messages = vec![ChatMessage::system(INTENT_PROMPT), ChatMessage::user(message)];

		match self.llm.complete(messages, INTENT_TEMPERATURE, Some(INTENT_MAX_TOKENS)).await {
			Ok(reply) => intent::parse_intent(&reply).unwrap_or_else(|| {
				tracing::warn!(reply = %reply, "Unrecognized intent reply.");

				Intent::Note
			}),
			Err(err) => {
				tracing::warn!(error = %err, "Intent classification failed.");

				Intent::Note
			},
		}
	}

	/// Agent with the highest confidence above the selection threshold.
	pub fn select_best(&self, message: &str, ctx: &AgentContext) -> Option<&Arc<dyn Agent>> {
		self.agents
			.iter()
			.map(|agent| (agent, agent.can_handle(message, ctx)))
			.filter(|(_, score)| *score > SELECT_THRESHOLD)
			.max_by(|(_, a), (_, b)| a.total_cmp(b))
			.map(|(agent, _)| agent)
	}
}
