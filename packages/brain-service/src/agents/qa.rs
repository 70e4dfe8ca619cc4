use std::sync::Arc;

use serde_json::json;

use brain_config::Agents;
use brain_domain::{intent, paths::truncate_chars};
use brain_providers::chat::ChatMessage;

use crate::{
	BoxFuture, LlmManager,
	agents::{
		Agent, AgentContext, AgentResponse, QA,
		retrieval::{self, Candidate, LoadedDoc, Retriever},
	},
};

const RERANK_FALLBACK_CHARS: usize = 500;
const DOC_CHARS: usize = 2_000;
const CONTEXT_CHARS: usize = 6_000;
const TEMPERATURE: f32 = 0.5;
const MAX_TOKENS: u32 = 1_000;
const MAX_SOURCES: usize = 5;

const SYSTEM_PROMPT: &str = "You answer questions using the user's personal knowledge base.

Rules:
- Answer in the language of the question.
- Use only information from the provided documents.
- If the documents do not contain enough information, say so.
- Be brief and to the point.
- Refer to specific documents when it helps.";

pub struct QaAgent {
	retriever: Arc<Retriever>,
	llm: Arc<LlmManager>,
	candidate_limit: usize,
	top_k: usize,
}
impl QaAgent {
	pub fn new(retriever: Arc<Retriever>, llm: Arc<LlmManager>, cfg: &Agents) -> Self {
		Self { retriever, llm, candidate_limit: cfg.qa_candidate_limit, top_k: cfg.qa_top_k }
	}

	async fn answer(&self, question: &str) -> AgentResponse {
		tracing::info!(question = truncate_chars(question, 100), "Processing question.");

		let filters = self.retriever.metadata_filters(question);
		let candidates =
			self.retriever.hybrid_search(question, &filters, self.candidate_limit).await;

		if candidates.is_empty() {
			return AgentResponse::ok("🤷 I could not find any notes relevant to your question.")
				.with("found_count", 0);
		}

		let texts = self.rerank_texts(&candidates).await;
		let order = self.retriever.rerank_order(question, &texts, self.top_k).await;
		let top: Vec<&Candidate> = order.iter().filter_map(|&i| candidates.get(i)).collect();
		let docs = self.retriever.load_documents(top.clone(), Some(DOC_CHARS)).await;

		if docs.is_empty() {
			return AgentResponse::ok("🤷 I found matching notes but could not load them.")
				.with("found_count", candidates.len());
		}

		let answer = self.generate(question, &docs).await;
		let sources: Vec<&str> = docs.iter().map(|doc| doc.path.as_str()).collect();

		AgentResponse::ok(format!("{answer}{}", sources_block(&sources)))
			.with("found_count", candidates.len())
			.with("reranked_count", top.len())
			.with("sources", json!(sources))
	}

	/// Summary, else the start of the document, else the note id.
	async fn rerank_texts(&self, candidates: &[Candidate]) -> Vec<String> {
		let mut texts = Vec::with_capacity(candidates.len());

		for candidate in candidates {
			if !candidate.summary.is_empty() {
				texts.push(candidate.summary.clone());

				continue;
			}

			let text = match self.retriever.notes().get_document(&candidate.note_id).await {
				Ok(doc) => truncate_chars(&doc.data, RERANK_FALLBACK_CHARS).to_string(),
				Err(_) => candidate.note_id.clone(),
			};

			texts.push(text);
		}

		texts
	}

	async fn generate(&self, question: &str, docs: &[LoadedDoc]) -> String {
		let context = retrieval::document_context(docs, DOC_CHARS, CONTEXT_CHARS);
		let prompt = format!(
			"Question: {question}\n\nContext from the knowledge base:\n{context}\n\nAnswer the \
			 question using the context."
		);
		let messages = vec![ChatMessage::system(SYSTEM_PROMPT), ChatMessage::user(prompt)];

		match self.llm.complete(messages, TEMPERATURE, Some(MAX_TOKENS)).await {
			Ok(answer) => answer.trim().to_string(),
			Err(err) => {
				tracing::error!(error = %err, "Failed to generate an answer.");

				"❌ Failed to generate an answer.".to_string()
			},
		}
	}
}
impl Agent for QaAgent {
	fn name(&self) -> &'static str {
		QA
	}

	fn description(&self) -> &'static str {
		"Answers questions from the knowledge base."
	}

	fn can_handle(&self, message: &str, _ctx: &AgentContext) -> f32 {
		if intent::is_question(message) { 0.9 } else { 0.1 }
	}

	fn process<'a>(
		&'a self,
		message: &'a str,
		_ctx: &'a AgentContext,
	) -> BoxFuture<'a, AgentResponse> {
		Box::pin(self.answer(message))
	}
}

fn sources_block(sources: &[&str]) -> String {
	let mut block = String::from("\n\n📚 **Sources:**\n");

	for (i, source) in sources.iter().take(MAX_SOURCES).enumerate() {
		block.push_str(&format!("{}. `{source}`\n", i + 1));
	}

	block
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn lists_at_most_five_sources() {
		let sources = ["a.md", "b.md", "c.md", "d.md", "e.md", "f.md"];
		let block = sources_block(&sources);

		assert!(block.contains("5. `e.md`"));
		assert!(!block.contains("f.md"));
	}
}
