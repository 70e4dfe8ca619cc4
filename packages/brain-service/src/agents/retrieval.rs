//! Candidate retrieval shared by the QA and research agents.
//!
//! Vector similarity and CouchDB full-text matches are merged into one candidate list, reranked
//! by the hosted rerank service when one is configured, and resolved to full documents.

use std::{collections::HashSet, sync::Arc};

use serde::Serialize;

use brain_config::Agents;
use brain_domain::{
	intent,
	metadata::DEFAULT_CATEGORY,
	paths::{parent_folder, truncate_chars},
};
use brain_storage::models::SearchFilters;

use crate::{LlmManager, NoteStore, VectorIndex};

/// Full-text matches carry no similarity score; they rank as this.
pub const FULLTEXT_SCORE: f32 = 0.7;

const FULLTEXT_SUMMARY_CHARS: usize = 200;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CandidateSource {
	Vector,
	Fulltext,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Candidate {
	pub note_id: String,
	pub source: CandidateSource,
	pub score: f32,
	pub summary: String,
	pub category: String,
	pub tags: Vec<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LoadedDoc {
	pub path: String,
	pub content: String,
	pub category: String,
	pub tags: Vec<String>,
}

pub struct Retriever {
	notes: Arc<dyn NoteStore>,
	vectors: Arc<dyn VectorIndex>,
	llm: Arc<LlmManager>,
	cfg: Agents,
}
impl Retriever {
	pub fn new(
		notes: Arc<dyn NoteStore>,
		vectors: Arc<dyn VectorIndex>,
		llm: Arc<LlmManager>,
		cfg: Agents,
	) -> Self {
		Self { notes, vectors, llm, cfg }
	}

	pub fn notes(&self) -> &dyn NoteStore {
		self.notes.as_ref()
	}

	/// Stage 1. Payload filters derived from the question.
	///
	/// Keyword hints do not narrow the search yet, so the filter is empty; the plumbing for
	/// categories, tags and `after_mtime` is in place.
	pub fn metadata_filters(&self, question: &str) -> SearchFilters {
		let keywords = intent::extract_keywords(question);

		tracing::debug!(keywords = keywords.len(), "Built metadata filters.");

		SearchFilters::default()
	}

	/// Stage 2. Vector and full-text candidates, deduplicated by note id and cut to `limit`.
	///
	/// Either source failing only removes its candidates.
	pub async fn hybrid_search(
		&self,
		query: &str,
		filters: &SearchFilters,
		limit: usize,
	) -> Vec<Candidate> {
		let mut candidates = Vec::new();

		match self.vector_candidates(query, filters).await {
			Ok(hits) => {
				tracing::info!(count = hits.len(), "Vector search finished.");

				candidates.extend(hits);
			},
			Err(err) => tracing::warn!(error = %err, "Vector search failed."),
		}

		match self.notes.search_documents(query, self.cfg.fulltext_limit).await {
			Ok(docs) => {
				tracing::info!(count = docs.len(), "Full-text search finished.");

				let fulltext = docs.iter().map(|doc| {
					let note_id = if doc.id.is_empty() { doc.path.clone() } else { doc.id.clone() };

					Candidate {
						category: parent_folder(doc.display_path())
							.unwrap_or(DEFAULT_CATEGORY)
							.to_string(),
						note_id,
						source: CandidateSource::Fulltext,
						score: FULLTEXT_SCORE,
						summary: truncate_chars(&doc.data, FULLTEXT_SUMMARY_CHARS).to_string(),
						tags: Vec::new(),
					}
				});

				candidates = merge_candidates(candidates, fulltext);
			},
			Err(err) => tracing::warn!(error = %err, "Full-text search failed."),
		}

		candidates.truncate(limit);

		candidates
	}

	/// Stage 3 ordering. Indices into `texts`, best first, at most `top_k`.
	///
	/// Falls back to the original order when no rerank provider is configured or it fails.
	pub async fn rerank_order(&self, query: &str, texts: &[String], top_k: usize) -> Vec<usize> {
		let top_n = top_k.min(texts.len());

		if top_n == 0 {
			return Vec::new();
		}
		if !self.llm.has_rerank() {
			return (0..top_n).collect();
		}

		match self.llm.rerank(query, texts, top_n).await {
			Ok(hits) => {
				let order: Vec<usize> = hits.into_iter().map(|hit| hit.index).take(top_n).collect();

				tracing::info!(count = order.len(), "Reranked candidates.");

				order
			},
			Err(err) => {
				tracing::warn!(error = %err, "Reranking failed. Keeping search order.");

				(0..top_n).collect()
			},
		}
	}

	/// Loads the documents behind `candidates`, skipping any that cannot be read.
	pub async fn load_documents<'a, I>(
		&self,
		candidates: I,
		max_chars: Option<usize>,
	) -> Vec<LoadedDoc>
	where
		I: IntoIterator<Item = &'a Candidate>,
	{
		let mut docs = Vec::new();

		for candidate in candidates {
			match self.notes.get_document(&candidate.note_id).await {
				Ok(doc) => {
					let content = match max_chars {
						Some(max) => truncate_chars(&doc.data, max).to_string(),
						None => doc.data,
					};

					docs.push(LoadedDoc {
						path: candidate.note_id.clone(),
						content,
						category: candidate.category.clone(),
						tags: candidate.tags.clone(),
					});
				},
				Err(err) => tracing::warn!(
					error = %err,
					note_id = %candidate.note_id,
					"Failed to load candidate document."
				),
			}
		}

		docs
	}

	async fn vector_candidates(
		&self,
		query: &str,
		filters: &SearchFilters,
	) -> crate::Result<Vec<Candidate>> {
		let vector = self.llm.embed_text(query).await?;
		let hits = self
			.vectors
			.search_similar(vector, self.cfg.vector_limit, self.cfg.vector_score_threshold, filters)
			.await?;

		Ok(hits
			.into_iter()
			.map(|hit| Candidate {
				note_id: hit.note_id,
				source: CandidateSource::Vector,
				score: hit.score,
				summary: hit.summary,
				category: hit.category,
				tags: hit.tags,
			})
			.collect())
	}
}

/// Appends `extra` candidates whose note id is not present yet. Order is preserved.
pub fn merge_candidates<I>(mut candidates: Vec<Candidate>, extra: I) -> Vec<Candidate>
where
	I: IntoIterator<Item = Candidate>,
{
	let mut seen: HashSet<String> =
		candidates.iter().map(|candidate| candidate.note_id.clone()).collect();

	for candidate in extra {
		if seen.insert(candidate.note_id.clone()) {
			candidates.push(candidate);
		}
	}

	candidates
}

/// `--- Document {i}: {path} ---` blocks, cut to `max_chars` overall.
pub fn document_context(docs: &[LoadedDoc], per_doc_chars: usize, max_chars: usize) -> String {
	let mut context = String::new();

	for (i, doc) in docs.iter().enumerate() {
		context.push_str(&format!("\n--- Document {}: {} ---\n", i + 1, doc.path));
		context.push_str(truncate_chars(&doc.content, per_doc_chars));
		context.push('\n');
	}

	truncate_chars(&context, max_chars).to_string()
}
