pub mod admin;
pub mod agents;
pub mod director;
pub mod indexer;
pub mod llm;
pub mod metadata;
pub mod notes;

mod error;

pub use admin::{HealthReport, StatsReport};
pub use agents::{Agent, AgentContext, AgentResponse};
pub use director::MessageDirector;
pub use error::{Error, Result};
pub use indexer::{Indexer, IndexerStats, ReindexReport};
pub use llm::LlmManager;
pub use metadata::MetadataGenerator;
pub use notes::{
	DailySummary, NoteCreated, NoteView, QuickNoteRequest, RecentNote, RecentResponse,
	SearchHit, SearchResponse, SummaryNote,
};

use std::{collections::HashSet, future::Future, pin::Pin, sync::Arc};

use serde_json::Value;

use brain_config::{Config, EmbeddingProviderConfig, LlmProviderConfig, ProviderConfig};
use brain_providers::{
	chat::{self, ChatRequest},
	embedding,
	rerank::{self, RerankHit},
};
use brain_storage::{
	couchdb::CouchDb,
	models::{DbInfo, DocWrite, NoteDocument, NotePoint, SearchFilters, VectorHit, VectorStats},
	qdrant::QdrantStore,
};

use crate::agents::{
	note_taker::NoteTaker, qa::QaAgent, research::ResearchAgent, retrieval::Retriever,
};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait ChatProvider
where
	Self: Send + Sync,
{
	fn complete<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		req: &'a ChatRequest,
	) -> BoxFuture<'a, Result<String>>;

	fn complete_json<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		req: &'a ChatRequest,
	) -> BoxFuture<'a, Result<Value>>;
}

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, Result<Vec<Vec<f32>>>>;
}

pub trait RerankProvider
where
	Self: Send + Sync,
{
	fn rerank<'a>(
		&'a self,
		cfg: &'a ProviderConfig,
		query: &'a str,
		docs: &'a [String],
		top_n: usize,
	) -> BoxFuture<'a, Result<Vec<RerankHit>>>;
}

/// Document storage for the vault.
pub trait NoteStore
where
	Self: Send + Sync,
{
	/// Creates the database and the indexes queries rely on.
	fn ensure_ready(&self) -> BoxFuture<'_, Result<()>>;

	fn info(&self) -> BoxFuture<'_, Result<DbInfo>>;

	fn create_document<'a>(&'a self, doc: &'a NoteDocument) -> BoxFuture<'a, Result<DocWrite>>;

	fn get_document<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<NoteDocument>>;

	fn update_document<'a>(&'a self, doc: &'a NoteDocument) -> BoxFuture<'a, Result<DocWrite>>;

	fn delete_document<'a>(&'a self, id: &'a str, rev: &'a str) -> BoxFuture<'a, Result<()>>;

	fn search_documents<'a>(
		&'a self,
		query: &'a str,
		limit: usize,
	) -> BoxFuture<'a, Result<Vec<NoteDocument>>>;

	fn recent_documents(&self, limit: usize) -> BoxFuture<'_, Result<Vec<NoteDocument>>>;

	fn all_documents<'a>(
		&'a self,
		limit: usize,
		fields: &'a [&'a str],
	) -> BoxFuture<'a, Result<Vec<NoteDocument>>>;
}

/// Similarity index over note embeddings.
pub trait VectorIndex
where
	Self: Send + Sync,
{
	fn ensure_ready(&self) -> BoxFuture<'_, Result<()>>;

	fn upsert_note<'a>(&'a self, point: &'a NotePoint, vector: Vec<f32>)
	-> BoxFuture<'a, Result<()>>;

	fn search_similar<'a>(
		&'a self,
		vector: Vec<f32>,
		limit: u64,
		score_threshold: f32,
		filters: &'a SearchFilters,
	) -> BoxFuture<'a, Result<Vec<VectorHit>>>;

	fn delete_note<'a>(&'a self, note_id: &'a str) -> BoxFuture<'a, Result<()>>;

	fn existing_note_ids<'a>(
		&'a self,
		note_ids: &'a [String],
	) -> BoxFuture<'a, Result<HashSet<String>>>;

	fn stats(&self) -> BoxFuture<'_, Result<VectorStats>>;
}

#[derive(Clone)]
pub struct Providers {
	pub chat: Arc<dyn ChatProvider>,
	pub embedding: Arc<dyn EmbeddingProvider>,
	pub rerank: Arc<dyn RerankProvider>,
}
impl Providers {
	pub fn new(
		chat: Arc<dyn ChatProvider>,
		embedding: Arc<dyn EmbeddingProvider>,
		rerank: Arc<dyn RerankProvider>,
	) -> Self {
		Self { chat, embedding, rerank }
	}
}
impl Default for Providers {
	fn default() -> Self {
		let provider = Arc::new(DefaultProviders);

		Self { chat: provider.clone(), embedding: provider.clone(), rerank: provider }
	}
}

/// The AI layer. Absent in basic mode.
pub struct AiServices {
	pub llm: Arc<LlmManager>,
	pub vectors: Arc<dyn VectorIndex>,
	pub director: Arc<MessageDirector>,
	pub indexer: Arc<Indexer>,
}

pub struct BrainService {
	pub cfg: Config,
	pub notes: Arc<dyn NoteStore>,
	pub ai: Option<AiServices>,
}
impl BrainService {
	/// Connects to CouchDB and, when providers are configured, to Qdrant.
	pub fn connect(cfg: Config) -> Result<Self> {
		let notes: Arc<dyn NoteStore> = Arc::new(CouchDb::new(&cfg.storage.couchdb)?);
		let vectors: Option<Arc<dyn VectorIndex>> = match cfg.providers {
			Some(_) => Some(Arc::new(QdrantStore::new(&cfg.storage.qdrant)?)),
			None => None,
		};

		Ok(Self::new(cfg, notes, vectors, Providers::default()))
	}

	pub fn new(
		cfg: Config,
		notes: Arc<dyn NoteStore>,
		vectors: Option<Arc<dyn VectorIndex>>,
		providers: Providers,
	) -> Self {
		let ai = match (&cfg.providers, vectors) {
			(Some(providers_cfg), Some(vectors)) => Some(build_ai(
				&cfg,
				providers_cfg,
				notes.clone(),
				vectors,
				providers,
			)),
			_ => None,
		};

		if ai.is_none() {
			tracing::info!("AI providers are not configured. Running in basic mode.");
		}

		Self { cfg, notes, ai }
	}

	pub fn is_basic_mode(&self) -> bool {
		self.ai.is_none()
	}

	/// Prepares the note database and, outside basic mode, the vector collection.
	pub async fn init_storage(&self) -> Result<()> {
		self.notes.ensure_ready().await?;

		if let Some(ai) = &self.ai {
			ai.vectors.ensure_ready().await?;
		}

		Ok(())
	}
}

fn build_ai(
	cfg: &Config,
	providers_cfg: &brain_config::Providers,
	notes: Arc<dyn NoteStore>,
	vectors: Arc<dyn VectorIndex>,
	providers: Providers,
) -> AiServices {
	let llm = Arc::new(LlmManager::new(providers_cfg, providers));
	let metadata = Arc::new(MetadataGenerator::new(llm.clone()));
	let retriever =
		Arc::new(Retriever::new(notes.clone(), vectors.clone(), llm.clone(), cfg.agents.clone()));
	let mut director = MessageDirector::new(llm.clone(), cfg.agents.note_word_threshold);

	director.register(Arc::new(NoteTaker::new(
		notes.clone(),
		vectors.clone(),
		llm.clone(),
		metadata.clone(),
	)));
	director.register(Arc::new(QaAgent::new(retriever.clone(), llm.clone(), &cfg.agents)));
	director.register(Arc::new(ResearchAgent::new(retriever, llm.clone(), &cfg.agents)));

	let indexer =
		Arc::new(Indexer::new(cfg.indexer.clone(), notes, vectors.clone(), llm.clone(), metadata));

	AiServices { llm, vectors, director: Arc::new(director), indexer }
}

struct DefaultProviders;
impl ChatProvider for DefaultProviders {
	fn complete<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		req: &'a ChatRequest,
	) -> BoxFuture<'a, Result<String>> {
		Box::pin(async move { Ok(chat::complete(cfg, req).await?) })
	}

	fn complete_json<'a>(
		&'a self,
		cfg: &'a LlmProviderConfig,
		req: &'a ChatRequest,
	) -> BoxFuture<'a, Result<Value>> {
		Box::pin(async move { Ok(chat::complete_json(cfg, req).await?) })
	}
}
impl EmbeddingProvider for DefaultProviders {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, Result<Vec<Vec<f32>>>> {
		Box::pin(async move { Ok(embedding::embed(cfg, texts).await?) })
	}
}
impl RerankProvider for DefaultProviders {
	fn rerank<'a>(
		&'a self,
		cfg: &'a ProviderConfig,
		query: &'a str,
		docs: &'a [String],
		top_n: usize,
	) -> BoxFuture<'a, Result<Vec<RerankHit>>> {
		Box::pin(async move { Ok(rerank::rerank(cfg, query, docs, top_n).await?) })
	}
}

impl NoteStore for CouchDb {
	fn ensure_ready(&self) -> BoxFuture<'_, Result<()>> {
		Box::pin(async move {
			CouchDb::ensure_database(self).await?;
			CouchDb::ensure_indexes(self).await?;

			Ok(())
		})
	}

	fn info(&self) -> BoxFuture<'_, Result<DbInfo>> {
		Box::pin(async move { Ok(CouchDb::info(self).await?) })
	}

	fn create_document<'a>(&'a self, doc: &'a NoteDocument) -> BoxFuture<'a, Result<DocWrite>> {
		Box::pin(async move { Ok(CouchDb::create_document(self, doc).await?) })
	}

	fn get_document<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<NoteDocument>> {
		Box::pin(async move { Ok(CouchDb::get_document(self, id).await?) })
	}

	fn update_document<'a>(&'a self, doc: &'a NoteDocument) -> BoxFuture<'a, Result<DocWrite>> {
		Box::pin(async move { Ok(CouchDb::update_document(self, doc).await?) })
	}

	fn delete_document<'a>(&'a self, id: &'a str, rev: &'a str) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			CouchDb::delete_document(self, id, rev).await?;

			Ok(())
		})
	}

	fn search_documents<'a>(
		&'a self,
		query: &'a str,
		limit: usize,
	) -> BoxFuture<'a, Result<Vec<NoteDocument>>> {
		Box::pin(async move { Ok(CouchDb::search_documents(self, query, limit).await?) })
	}

	fn recent_documents(&self, limit: usize) -> BoxFuture<'_, Result<Vec<NoteDocument>>> {
		Box::pin(async move { Ok(CouchDb::recent_documents(self, limit).await?) })
	}

	fn all_documents<'a>(
		&'a self,
		limit: usize,
		fields: &'a [&'a str],
	) -> BoxFuture<'a, Result<Vec<NoteDocument>>> {
		Box::pin(async move { Ok(CouchDb::all_documents(self, limit, fields).await?) })
	}
}

impl VectorIndex for QdrantStore {
	fn ensure_ready(&self) -> BoxFuture<'_, Result<()>> {
		Box::pin(async move { Ok(QdrantStore::ensure_collection(self).await?) })
	}

	fn upsert_note<'a>(
		&'a self,
		point: &'a NotePoint,
		vector: Vec<f32>,
	) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move { Ok(QdrantStore::upsert_note(self, point, vector).await?) })
	}

	fn search_similar<'a>(
		&'a self,
		vector: Vec<f32>,
		limit: u64,
		score_threshold: f32,
		filters: &'a SearchFilters,
	) -> BoxFuture<'a, Result<Vec<VectorHit>>> {
		Box::pin(async move {
			Ok(QdrantStore::search_similar(self, vector, limit, score_threshold, filters).await?)
		})
	}

	fn delete_note<'a>(&'a self, note_id: &'a str) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move { Ok(QdrantStore::delete_note(self, note_id).await?) })
	}

	fn existing_note_ids<'a>(
		&'a self,
		note_ids: &'a [String],
	) -> BoxFuture<'a, Result<HashSet<String>>> {
		Box::pin(async move { Ok(QdrantStore::existing_note_ids(self, note_ids).await?) })
	}

	fn stats(&self) -> BoxFuture<'_, Result<VectorStats>> {
		Box::pin(async move { Ok(QdrantStore::stats(self).await?) })
	}
}
