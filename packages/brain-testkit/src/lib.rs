//! In-memory storage and scripted providers for exercising the service layer without CouchDB,
//! Qdrant or hosted models.

use std::{
	collections::{BTreeMap, HashMap, HashSet},
	sync::{
		Arc, Mutex, MutexGuard, PoisonError,
		atomic::{AtomicBool, AtomicUsize, Ordering},
	},
};

use serde_json::{Map, Value};

use brain_config::{
	Agents, ApiStyle, Config, CouchDb, EmbeddingProviderConfig, Indexer, LlmProviderConfig,
	ProviderConfig, Providers as ProvidersConfig, Qdrant, Security, Service, Storage, Telegram,
};
use brain_providers::{
	chat::{self, ChatRequest},
	rerank::RerankHit,
};
use brain_service::{
	BoxFuture, BrainService, ChatProvider, EmbeddingProvider, Error, NoteStore, Providers,
	RerankProvider, Result, VectorIndex,
};
use brain_storage::models::{
	DbInfo, DocWrite, LEAF_TYPE, NoteDocument, NotePoint, SearchFilters, VectorHit, VectorStats,
};

pub const API_TOKEN: &str = "test-token";
pub const VECTOR_DIM: u32 = 64;

/// A service wired to in-memory fakes, with handles to each fake.
pub struct Harness {
	pub service: Arc<BrainService>,
	pub notes: Arc<MemoryNoteStore>,
	pub vectors: Arc<MemoryVectorIndex>,
	pub chat: Arc<ScriptedChat>,
	pub embedding: Arc<HashEmbedding>,
	pub rerank: Arc<ScriptedRerank>,
}
impl Harness {
	pub fn new(chat: ScriptedChat) -> Self {
		Self::with_config(config(), chat)
	}

	/// No providers configured. The service runs in basic mode.
	pub fn basic() -> Self {
		Self::with_config(basic_config(), ScriptedChat::new(""))
	}

	pub fn with_config(cfg: Config, chat: ScriptedChat) -> Self {
		let notes = Arc::new(MemoryNoteStore::default());
		let vectors = Arc::new(MemoryVectorIndex::new(VECTOR_DIM));
		let chat = Arc::new(chat);
		let embedding = Arc::new(HashEmbedding::new(VECTOR_DIM as usize));
		let rerank = Arc::new(ScriptedRerank::default());
		let providers = Providers::new(chat.clone(), embedding.clone(), rerank.clone());
		let service = BrainService::new(
			cfg,
			notes.clone(),
			Some(vectors.clone() as Arc<dyn VectorIndex>),
			providers,
		);

		Self { service: Arc::new(service), notes, vectors, chat, embedding, rerank }
	}
}

/// Full configuration with every provider set and no indexer delays.
pub fn config() -> Config {
	let mut llm = BTreeMap::new();

	llm.insert(
		"claude".to_string(),
		LlmProviderConfig {
			api_style: ApiStyle::Anthropic,
			api_base: "http://llm.test".to_string(),
			api_key: "key".to_string(),
			path: "/v1/messages".to_string(),
			model: "claude-test".to_string(),
			max_tokens: 1_000,
			timeout_ms: 1_000,
			default_headers: Map::new(),
		},
	);

	Config {
		providers: Some(ProvidersConfig {
			default_llm: "claude".to_string(),
			llm,
			embedding: EmbeddingProviderConfig {
				provider_id: "openai".to_string(),
				api_base: "http://embedding.test".to_string(),
				api_key: "key".to_string(),
				path: "/v1/embeddings".to_string(),
				model: "embedding-test".to_string(),
				dimensions: VECTOR_DIM,
				timeout_ms: 1_000,
				default_headers: Map::new(),
			},
			rerank: Some(ProviderConfig {
				provider_id: "cohere".to_string(),
				api_base: "http://rerank.test".to_string(),
				api_key: "key".to_string(),
				path: "/v1/rerank".to_string(),
				model: "rerank-test".to_string(),
				timeout_ms: 1_000,
				default_headers: Map::new(),
			}),
		}),
		..basic_config()
	}
}

pub fn basic_config() -> Config {
	Config {
		service: Service { http_bind: "127.0.0.1:0".to_string(), log_level: "info".to_string() },
		security: Security { api_token: API_TOKEN.to_string(), cors_allow_any: false },
		storage: Storage {
			couchdb: CouchDb { database: "notes".to_string(), ..CouchDb::default() },
			qdrant: Qdrant { vector_dim: VECTOR_DIM, ..Qdrant::default() },
		},
		providers: None,
		telegram: Telegram::default(),
		agents: Agents::default(),
		indexer: Indexer {
			initial_delay_seconds: 0,
			batch_delay_seconds: 0,
			scan_interval_seconds: 0,
			error_backoff_seconds: 0,
			..Indexer::default()
		},
	}
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
	mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn unavailable(what: &str) -> Error {
	Error::Storage { message: format!("{what} is unavailable.") }
}

/// CouchDB stand-in keyed by document id. Revisions follow the `{n}-{suffix}` shape.
#[derive(Default)]
pub struct MemoryNoteStore {
	docs: Mutex<BTreeMap<String, NoteDocument>>,
	failing: AtomicBool,
}
impl MemoryNoteStore {
	/// Stores `doc` as a first revision, replacing any document with the same id.
	pub fn insert(&self, mut doc: NoteDocument) {
		doc.rev = Some("1-seed".to_string());

		lock(&self.docs).insert(doc.id.clone(), doc);
	}

	pub fn document(&self, id: &str) -> Option<NoteDocument> {
		lock(&self.docs).get(id).cloned()
	}

	pub fn documents(&self) -> Vec<NoteDocument> {
		lock(&self.docs).values().cloned().collect()
	}

	pub fn len(&self) -> usize {
		lock(&self.docs).len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Every call fails with a storage error while set.
	pub fn set_failing(&self, failing: bool) {
		self.failing.store(failing, Ordering::SeqCst);
	}

	fn check(&self) -> Result<()> {
		if self.failing.load(Ordering::SeqCst) { Err(unavailable("CouchDB")) } else { Ok(()) }
	}
}
impl NoteStore for MemoryNoteStore {
	fn ensure_ready(&self) -> BoxFuture<'_, Result<()>> {
		Box::pin(async move { self.check() })
	}

	fn info(&self) -> BoxFuture<'_, Result<DbInfo>> {
		Box::pin(async move {
			self.check()?;

			let docs = lock(&self.docs);

			Ok(DbInfo {
				db_name: "notes".to_string(),
				doc_count: docs.len() as u64,
				data_size: Some(docs.values().map(|doc| doc.size).sum()),
				..DbInfo::default()
			})
		})
	}

	fn create_document<'a>(&'a self, doc: &'a NoteDocument) -> BoxFuture<'a, Result<DocWrite>> {
		Box::pin(async move {
			self.check()?;

			let mut docs = lock(&self.docs);

			if docs.contains_key(&doc.id) {
				return Err(Error::Conflict { message: format!("Document {:?} exists.", doc.id) });
			}

			let rev = "1-new".to_string();
			let mut stored = doc.clone();

			stored.rev = Some(rev.clone());
			docs.insert(doc.id.clone(), stored);

			Ok(DocWrite { id: doc.id.clone(), rev })
		})
	}

	fn get_document<'a>(&'a self, id: &'a str) -> BoxFuture<'a, Result<NoteDocument>> {
		Box::pin(async move {
			self.check()?;

			self.document(id)
				.ok_or_else(|| Error::NotFound { message: format!("Document {id:?} not found.") })
		})
	}

	fn update_document<'a>(&'a self, doc: &'a NoteDocument) -> BoxFuture<'a, Result<DocWrite>> {
		Box::pin(async move {
			self.check()?;

			let mut docs = lock(&self.docs);
			let Some(current) = docs.get(&doc.id) else {
				return Err(Error::NotFound { message: format!("Document {:?} not found.", doc.id) });
			};

			if current.rev != doc.rev {
				return Err(Error::Conflict {
					message: format!("Document {:?} update conflict.", doc.id),
				});
			}

			let rev = format!("{}-update", revision_number(current.rev.as_deref()) + 1);
			let mut stored = doc.clone();

			stored.rev = Some(rev.clone());
			docs.insert(doc.id.clone(), stored);

			Ok(DocWrite { id: doc.id.clone(), rev })
		})
	}

	fn delete_document<'a>(&'a self, id: &'a str, rev: &'a str) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			self.check()?;

			let mut docs = lock(&self.docs);

			match docs.get(id) {
				None => Err(Error::NotFound { message: format!("Document {id:?} not found.") }),
				Some(current) if current.rev.as_deref() != Some(rev) => Err(Error::Conflict {
					message: format!("Document {id:?} delete conflict."),
				}),
				Some(_) => {
					docs.remove(id);

					Ok(())
				},
			}
		})
	}

	fn search_documents<'a>(
		&'a self,
		query: &'a str,
		limit: usize,
	) -> BoxFuture<'a, Result<Vec<NoteDocument>>> {
		Box::pin(async move {
			self.check()?;

			let needle = query.to_lowercase();

			Ok(lock(&self.docs)
				.values()
				.filter(|doc| {
					doc.data.to_lowercase().contains(&needle)
						|| doc.path.to_lowercase().contains(&needle)
				})
				.take(limit)
				.cloned()
				.collect())
		})
	}

	fn recent_documents(&self, limit: usize) -> BoxFuture<'_, Result<Vec<NoteDocument>>> {
		Box::pin(async move {
			self.check()?;

			let mut docs: Vec<NoteDocument> = lock(&self.docs)
				.values()
				.filter(|doc| doc.kind == LEAF_TYPE && doc.mtime > 0)
				.cloned()
				.collect();

			docs.sort_by(|a, b| b.mtime.cmp(&a.mtime));
			docs.truncate(limit);

			Ok(docs)
		})
	}

	fn all_documents<'a>(
		&'a self,
		limit: usize,
		_fields: &'a [&'a str],
	) -> BoxFuture<'a, Result<Vec<NoteDocument>>> {
		Box::pin(async move {
			self.check()?;

			Ok(lock(&self.docs)
				.values()
				.filter(|doc| doc.kind == LEAF_TYPE)
				.take(limit)
				.cloned()
				.collect())
		})
	}
}

fn revision_number(rev: Option<&str>) -> u64 {
	rev.and_then(|rev| rev.split_once('-')).and_then(|(n, _)| n.parse().ok()).unwrap_or(0)
}

/// Qdrant stand-in with exact cosine search and the same payload filters.
pub struct MemoryVectorIndex {
	dim: u32,
	points: Mutex<HashMap<String, (NotePoint, Vec<f32>)>>,
	failing: AtomicBool,
}
impl MemoryVectorIndex {
	pub fn new(dim: u32) -> Self {
		Self { dim, points: Mutex::new(HashMap::new()), failing: AtomicBool::new(false) }
	}

	pub fn point(&self, note_id: &str) -> Option<NotePoint> {
		lock(&self.points).get(note_id).map(|(point, _)| point.clone())
	}

	pub fn len(&self) -> usize {
		lock(&self.points).len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn set_failing(&self, failing: bool) {
		self.failing.store(failing, Ordering::SeqCst);
	}

	fn check(&self) -> Result<()> {
		if self.failing.load(Ordering::SeqCst) { Err(unavailable("Qdrant")) } else { Ok(()) }
	}
}
impl VectorIndex for MemoryVectorIndex {
	fn ensure_ready(&self) -> BoxFuture<'_, Result<()>> {
		Box::pin(async move { self.check() })
	}

	fn upsert_note<'a>(
		&'a self,
		point: &'a NotePoint,
		vector: Vec<f32>,
	) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			self.check()?;

			if vector.len() != self.dim as usize {
				return Err(Error::Storage {
					message: format!(
						"Vector has {} dimensions, expected {}.",
						vector.len(),
						self.dim
					),
				});
			}

			lock(&self.points).insert(point.note_id.clone(), (point.clone(), vector));

			Ok(())
		})
	}

	fn search_similar<'a>(
		&'a self,
		vector: Vec<f32>,
		limit: u64,
		score_threshold: f32,
		filters: &'a SearchFilters,
	) -> BoxFuture<'a, Result<Vec<VectorHit>>> {
		Box::pin(async move {
			self.check()?;

			let mut hits: Vec<VectorHit> = lock(&self.points)
				.values()
				.filter(|(point, _)| matches_filters(point, filters))
				.map(|(point, stored)| VectorHit {
					note_id: point.note_id.clone(),
					score: cosine(&vector, stored),
					category: point.category.clone(),
					tags: point.tags.clone(),
					summary: point.summary.clone(),
					mtime: point.mtime,
				})
				.filter(|hit| hit.score >= score_threshold)
				.collect();

			hits.sort_by(|a, b| b.score.total_cmp(&a.score));
			hits.truncate(limit as usize);

			Ok(hits)
		})
	}

	fn delete_note<'a>(&'a self, note_id: &'a str) -> BoxFuture<'a, Result<()>> {
		Box::pin(async move {
			self.check()?;
			lock(&self.points).remove(note_id);

			Ok(())
		})
	}

	fn existing_note_ids<'a>(
		&'a self,
		note_ids: &'a [String],
	) -> BoxFuture<'a, Result<HashSet<String>>> {
		Box::pin(async move {
			self.check()?;

			let points = lock(&self.points);

			Ok(note_ids.iter().filter(|id| points.contains_key(*id)).cloned().collect())
		})
	}

	fn stats(&self) -> BoxFuture<'_, Result<VectorStats>> {
		Box::pin(async move {
			self.check()?;

			let total = lock(&self.points).len() as u64;

			Ok(VectorStats { total_vectors: total, vector_dimensions: self.dim, indexed_count: total })
		})
	}
}

fn matches_filters(point: &NotePoint, filters: &SearchFilters) -> bool {
	let category = filters.categories.is_empty() || filters.categories.contains(&point.category);
	let tags = filters.tags.is_empty() || point.tags.iter().any(|tag| filters.tags.contains(tag));
	let mtime = filters.after_mtime.is_none_or(|after| point.mtime >= after);

	category && tags && mtime
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
	let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
	let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
	let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();

	if norm_a == 0.0 || norm_b == 0.0 { 0.0 } else { dot / (norm_a * norm_b) }
}

/// Chat provider answering from substring rules.
///
/// A request matches a rule when any of its messages contains the rule's needle. Rules are
/// checked in insertion order; unmatched requests get the fallback reply.
pub struct ScriptedChat {
	rules: Vec<(String, String)>,
	fallback: String,
	failing: AtomicBool,
	requests: Mutex<Vec<ChatRequest>>,
}
impl ScriptedChat {
	pub fn new(fallback: impl Into<String>) -> Self {
		Self {
			rules: Vec::new(),
			fallback: fallback.into(),
			failing: AtomicBool::new(false),
			requests: Mutex::new(Vec::new()),
		}
	}

	pub fn reply_when(mut self, needle: impl Into<String>, reply: impl Into<String>) -> Self {
		self.rules.push((needle.into(), reply.into()));

		self
	}

	pub fn set_failing(&self, failing: bool) {
		self.failing.store(failing, Ordering::SeqCst);
	}

	pub fn requests(&self) -> Vec<ChatRequest> {
		lock(&self.requests).clone()
	}

	/// Number of recorded requests with a message containing `needle`.
	pub fn count_matching(&self, needle: &str) -> usize {
		lock(&self.requests)
			.iter()
			.filter(|req| req.messages.iter().any(|message| message.content.contains(needle)))
			.count()
	}

	fn reply(&self, req: &ChatRequest) -> Result<String> {
		lock(&self.requests).push(req.clone());

		if self.failing.load(Ordering::SeqCst) {
			return Err(Error::Provider { message: "Scripted chat failure.".to_string() });
		}

		let reply = self
			.rules
			.iter()
			.find(|(needle, _)| {
				req.messages.iter().any(|message| message.content.contains(needle.as_str()))
			})
			.map(|(_, reply)| reply.clone())
			.unwrap_or_else(|| self.fallback.clone());

		Ok(reply)
	}
}
impl ChatProvider for ScriptedChat {
	fn complete<'a>(
		&'a self,
		_cfg: &'a LlmProviderConfig,
		req: &'a ChatRequest,
	) -> BoxFuture<'a, Result<String>> {
		Box::pin(async move { self.reply(req) })
	}

	fn complete_json<'a>(
		&'a self,
		_cfg: &'a LlmProviderConfig,
		req: &'a ChatRequest,
	) -> BoxFuture<'a, Result<Value>> {
		Box::pin(async move {
			let text = self.reply(req)?;

			Ok(chat::parse_json_reply(&text)?)
		})
	}
}

/// Deterministic bag-of-words embedding: each lowercased word adds weight to a hashed bucket.
///
/// Texts sharing words get a positive cosine similarity.
pub struct HashEmbedding {
	dim: usize,
	failing: AtomicBool,
	calls: AtomicUsize,
}
impl HashEmbedding {
	pub fn new(dim: usize) -> Self {
		Self { dim, failing: AtomicBool::new(false), calls: AtomicUsize::new(0) }
	}

	pub fn set_failing(&self, failing: bool) {
		self.failing.store(failing, Ordering::SeqCst);
	}

	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}

	pub fn vector(&self, text: &str) -> Vec<f32> {
		let mut vector = vec![0.0; self.dim];

		for word in text.split(|ch: char| !ch.is_alphanumeric()).filter(|word| !word.is_empty()) {
			let hash = blake3::hash(word.to_lowercase().as_bytes());
			let bytes = hash.as_bytes();
			let bucket = u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]) as usize;

			vector[bucket % self.dim] += 1.0;
		}

		vector
	}
}
impl EmbeddingProvider for HashEmbedding {
	fn embed<'a>(
		&'a self,
		_cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, Result<Vec<Vec<f32>>>> {
		Box::pin(async move {
			self.calls.fetch_add(1, Ordering::SeqCst);

			if self.failing.load(Ordering::SeqCst) {
				return Err(Error::Provider { message: "Scripted embedding failure.".to_string() });
			}

			Ok(texts.iter().map(|text| self.vector(text)).collect())
		})
	}
}

/// Ranks documents by how many query words they contain. Ties keep request order.
#[derive(Default)]
pub struct ScriptedRerank {
	failing: AtomicBool,
	calls: AtomicUsize,
}
impl ScriptedRerank {
	pub fn set_failing(&self, failing: bool) {
		self.failing.store(failing, Ordering::SeqCst);
	}

	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}
}
impl RerankProvider for ScriptedRerank {
	fn rerank<'a>(
		&'a self,
		_cfg: &'a ProviderConfig,
		query: &'a str,
		docs: &'a [String],
		top_n: usize,
	) -> BoxFuture<'a, Result<Vec<RerankHit>>> {
		Box::pin(async move {
			self.calls.fetch_add(1, Ordering::SeqCst);

			if self.failing.load(Ordering::SeqCst) {
				return Err(Error::Provider { message: "Scripted rerank failure.".to_string() });
			}

			let words: Vec<String> = query
				.split_whitespace()
				.map(|word| word.trim_matches(|ch: char| !ch.is_alphanumeric()).to_lowercase())
				.filter(|word| word.chars().count() > 2)
				.collect();
			let mut hits: Vec<RerankHit> = docs
				.iter()
				.enumerate()
				.map(|(index, doc)| {
					let doc = doc.to_lowercase();
					let score = words.iter().filter(|word| doc.contains(word.as_str())).count();

					RerankHit { index, score: score as f32 }
				})
				.collect();

			hits.sort_by(|a, b| b.score.total_cmp(&a.score));
			hits.truncate(top_n);

			Ok(hits)
		})
	}
}

/// A leaf document with `ctime` and `mtime` set to `millis`.
pub fn note(path: &str, data: &str, millis: i64) -> NoteDocument {
	NoteDocument::new(path, data, millis)
}
