use std::sync::Arc;

use serde_json::json;

use brain_config::Agents;
use brain_domain::paths::truncate_chars;
use brain_providers::chat::ChatMessage;

use crate::{
	BoxFuture, LlmManager,
	agents::{
		Agent, AgentContext, AgentResponse, RESEARCH,
		retrieval::{self, Candidate, LoadedDoc, Retriever},
	},
};

const PASS_DOCS: usize = 15;
const OVERVIEW_DOC_CHARS: usize = 1_500;
const CONNECTIONS_DOC_CHARS: usize = 1_000;
const CONTEXT_CHARS: usize = 8_000;
const MAX_TOKENS: u32 = 1_500;
const ANALYSIS_TEMPERATURE: f32 = 0.4;
const SYNTHESIS_TEMPERATURE: f32 = 0.5;
const MAX_SOURCES: usize = 10;
const MAX_SOURCE_TAGS: usize = 3;

const OVERVIEW_FALLBACK: &str = "Could not produce an overview.";
const CONNECTIONS_FALLBACK: &str = "Could not analyze connections.";
const SYNTHESIS_FALLBACK: &str = "Could not synthesize conclusions.";

/// Multi-pass report over a larger candidate set than the QA agent uses.
pub struct ResearchAgent {
	retriever: Arc<Retriever>,
	llm: Arc<LlmManager>,
	candidate_limit: usize,
	top_k: usize,
}
impl ResearchAgent {
	pub fn new(retriever: Arc<Retriever>, llm: Arc<LlmManager>, cfg: &Agents) -> Self {
		Self {
			retriever,
			llm,
			candidate_limit: cfg.research_candidate_limit,
			top_k: cfg.research_top_k,
		}
	}

	async fn research(&self, topic: &str) -> AgentResponse {
		tracing::info!(topic = truncate_chars(topic, 100), "Starting research.");

		let filters = self.retriever.metadata_filters(topic);
		let candidates = self.retriever.hybrid_search(topic, &filters, self.candidate_limit).await;

		if candidates.is_empty() {
			return AgentResponse::ok("🔍 I could not find enough material to research this topic.")
				.with("found_count", 0);
		}

		let texts: Vec<String> = candidates
			.iter()
			.map(|candidate| {
				if candidate.summary.is_empty() {
					candidate.note_id.clone()
				} else {
					candidate.summary.clone()
				}
			})
			.collect();
		let order = self.retriever.rerank_order(topic, &texts, self.top_k).await;
		let top: Vec<&Candidate> = order.iter().filter_map(|&i| candidates.get(i)).collect();
		let docs = self.retriever.load_documents(top, None).await;

		if docs.is_empty() {
			return AgentResponse::ok("🔍 I found matching notes but could not process them.")
				.with("found_count", candidates.len());
		}

		let (overview, connections) =
			tokio::join!(self.overview(topic, &docs), self.connections(topic, &docs));
		let synthesis = self.synthesis(topic, &overview, &connections).await;
		let sources: Vec<&str> =
			docs.iter().take(MAX_SOURCES).map(|doc| doc.path.as_str()).collect();

		AgentResponse::ok(format_report(topic, &overview, &connections, &synthesis, &docs))
			.with("documents_analyzed", docs.len())
			.with("sources", json!(sources))
	}

	async fn overview(&self, topic: &str, docs: &[LoadedDoc]) -> String {
		let context = retrieval::document_context(
			&docs[..docs.len().min(PASS_DOCS)],
			OVERVIEW_DOC_CHARS,
			CONTEXT_CHARS,
		);
		let prompt = format!(
			"Analyze these documents about \"{topic}\" and provide:\n\n1. A brief overview (3-4 \
			 sentences)\n2. Key themes and topics (bullet points)\n3. Main concepts \
			 mentioned\n\nDocuments:\n{context}\n\nRespond in the language of the topic with a \
			 clear structure."
		);

		self.pass(
			"You are a research analyst. Provide clear, structured analysis.",
			prompt,
			ANALYSIS_TEMPERATURE,
			OVERVIEW_FALLBACK,
		)
		.await
	}

	async fn connections(&self, topic: &str, docs: &[LoadedDoc]) -> String {
		let mut context = String::new();

		for (i, doc) in docs.iter().take(PASS_DOCS).enumerate() {
			context.push_str(&format!("\n{}. {}\n", i + 1, doc.path));
			context.push_str(truncate_chars(&doc.content, CONNECTIONS_DOC_CHARS));
			context.push('\n');
		}

		let prompt = format!(
			"Analyze connections and relationships in these documents about \"{topic}\":\n\n{}\n\n\
			 Identify:\n1. How the documents relate to each other\n2. Common patterns or \
			 recurring ideas\n3. Contradictions or different perspectives\n4. Knowledge gaps \
			 (what is missing)\n\nRespond in the language of the topic.",
			truncate_chars(&context, CONTEXT_CHARS)
		);

		self.pass(
			"You are a research analyst focusing on connections and patterns.",
			prompt,
			ANALYSIS_TEMPERATURE,
			CONNECTIONS_FALLBACK,
		)
		.await
	}

	async fn synthesis(&self, topic: &str, overview: &str, connections: &str) -> String {
		let prompt = format!(
			"Based on the research about \"{topic}\", synthesize the \
			 findings:\n\nOverview:\n{overview}\n\nConnections:\n{connections}\n\nProvide:\n1. Key \
			 insights (3-5 main points)\n2. Actionable conclusions\n3. Suggested next steps or \
			 areas for further exploration\n\nRespond in the language of the topic with a clear \
			 structure."
		);

		self.pass(
			"You are a research analyst synthesizing findings.",
			prompt,
			SYNTHESIS_TEMPERATURE,
			SYNTHESIS_FALLBACK,
		)
		.await
	}

	async fn pass(&self, system: &str, prompt: String, temperature: f32, fallback: &str) -> String {
		let messages = vec![ChatMessage::system(system), ChatMessage::user(prompt)];

		match self.llm.complete(messages, temperature, Some(MAX_TOKENS)).await {
			Ok(text) => text.trim().to_string(),
			Err(err) => {
				tracing::error!(error = %err, "Research pass failed.");

				fallback.to_string()
			},
		}
	}
}
impl Agent for ResearchAgent {
	fn name(&self) -> &'static str {
		RESEARCH
	}

	fn description(&self) -> &'static str {
		"Writes a multi-pass research report on a topic."
	}

	fn can_handle(&self, _message: &str, ctx: &AgentContext) -> f32 {
		if ctx.awaiting_research { 1.0 } else { 0.0 }
	}

	fn process<'a>(
		&'a self,
		message: &'a str,
		_ctx: &'a AgentContext,
	) -> BoxFuture<'a, AgentResponse> {
		Box::pin(self.research(message))
	}
}

fn format_report(
	topic: &str,
	overview: &str,
	connections: &str,
	synthesis: &str,
	docs: &[LoadedDoc],
) -> String {
	let sources = &docs[..docs.len().min(MAX_SOURCES)];
	let mut report = format!(
		"🔍 **Research:** {topic}\n\n📊 **OVERVIEW**\n{overview}\n\n🔗 **CONNECTIONS AND \
		 PATTERNS**\n{connections}\n\n💡 **INSIGHTS**\n{synthesis}\n\n📚 **SOURCES** ({} \
		 documents)\n",
		docs.len()
	);

	for (i, doc) in sources.iter().enumerate() {
		report.push_str(&format!("\n{}. `{}`", i + 1, doc.path));

		if !doc.tags.is_empty() {
			let tags: Vec<&str> = doc.tags.iter().take(MAX_SOURCE_TAGS).map(String::as_str).collect();

			report.push_str(&format!(" [{}]", tags.join(", ")));
		}
	}

	report
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn report_counts_every_document_but_lists_ten() {
		let docs: Vec<LoadedDoc> = (0..12)
			.map(|i| LoadedDoc {
				path: format!("Notes/{i}.md"),
				content: String::new(),
				category: String::new(),
				tags: vec!["a".to_string(), "b".to_string(), "c".to_string(), "d".to_string()],
			})
			.collect();
		let report = format_report("rust", "o", "c", "s", &docs);

		assert!(report.contains("(12 documents)"));
		assert!(report.contains("10. `Notes/9.md` [a, b, c]"));
		assert!(!report.contains("Notes/10.md"));
		assert!(!report.contains(", d]"));
	}
}
