//! Rate-limited background enrichment of notes written outside the bot.
//!
//! A note is pending when it has no vector point, or when frontmatter write-back is enabled and
//! its content lacks the `ai_indexed:` marker. Pending notes are processed oldest first, in
//! batches separated by a fixed delay.

use std::{
	sync::{
		Arc, Mutex, PoisonError,
		atomic::{AtomicBool, Ordering},
	},
	time::Duration,
};

use serde::Serialize;
use time::OffsetDateTime;

use brain_domain::{frontmatter, metadata::NoteMetadata, paths};
use brain_storage::{
	couchdb::LIST_FIELDS,
	models::{NoteDocument, NotePoint},
};

use crate::{
	Error, LlmManager, MetadataGenerator, NoteStore, Result, VectorIndex, metadata::folders_of,
};

const MIN_CONTENT_CHARS: usize = 10;

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct IndexerStats {
	pub total_notes: usize,
	pub indexed_notes: usize,
	pub pending_notes: usize,
	pub failed_notes: usize,
	pub last_run: Option<String>,
	pub is_running: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ReindexReport {
	pub success: bool,
	pub notes_processed: usize,
	pub failed: usize,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
}

/// Outcome of one pass over a list of notes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IndexRun {
	pub processed: usize,
	pub skipped: usize,
	pub failed: usize,
}

struct Scan {
	pending: Vec<PendingNote>,
	pending_total: usize,
	folders: Vec<String>,
}

struct PendingNote {
	doc: NoteDocument,
	has_vector: bool,
}

pub struct Indexer {
	cfg: brain_config::Indexer,
	notes: Arc<dyn NoteStore>,
	vectors: Arc<dyn VectorIndex>,
	llm: Arc<LlmManager>,
	metadata: Arc<MetadataGenerator>,
	stats: Mutex<IndexerStats>,
	reindexing: Arc<AtomicBool>,
}
impl Indexer {
	pub fn new(
		cfg: brain_config::Indexer,
		notes: Arc<dyn NoteStore>,
		vectors: Arc<dyn VectorIndex>,
		llm: Arc<LlmManager>,
		metadata: Arc<MetadataGenerator>,
	) -> Self {
		Self {
			cfg,
			notes,
			vectors,
			llm,
			metadata,
			stats: Mutex::new(IndexerStats::default()),
			reindexing: Arc::new(AtomicBool::new(false)),
		}
	}

	pub fn config(&self) -> &brain_config::Indexer {
		&self.cfg
	}

	pub fn stats(&self) -> IndexerStats {
		let mut stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner).clone();

		stats.is_running |= self.reindexing.load(Ordering::SeqCst);

		stats
	}

	/// Pending notes, oldest first, at most `max_pending`.
	pub async fn find_pending(&self) -> Result<Vec<NoteDocument>> {
		let scan = self.scan().await?;

		Ok(scan.pending.into_iter().map(|note| note.doc).collect())
	}

	/// Number of pending notes before the per-scan cap.
	pub async fn pending_count(&self) -> Result<usize> {
		Ok(self.scan().await?.pending_total)
	}

	/// Scans once and processes the pending notes in rate-limited batches.
	pub async fn run_once(&self) -> Result<IndexRun> {
		let scan = self.scan().await?;

		if scan.pending.is_empty() {
			tracing::debug!("No pending notes to index.");

			self.update_stats(|stats| stats.last_run = Some(now_rfc3339()));

			return Ok(IndexRun::default());
		}

		tracing::info!(count = scan.pending.len(), "Found notes to index.");

		let run = self.process(&scan.pending, &scan.folders).await;

		self.update_stats(|stats| {
			stats.pending_notes = stats.pending_notes.saturating_sub(run.processed);
			stats.last_run = Some(now_rfc3339());
		});

		Ok(run)
	}

	/// Runs until the future is dropped. Does nothing when the indexer is disabled.
	pub async fn run_forever(&self) {
		if !self.cfg.enabled {
			tracing::info!("Background indexer is disabled.");

			return;
		}

		tracing::info!(
			initial_delay_seconds = self.cfg.initial_delay_seconds,
			batch_size = self.cfg.batch_size,
			"Background indexer started."
		);

		tokio::time::sleep(Duration::from_secs(self.cfg.initial_delay_seconds)).await;

		self.update_stats(|stats| stats.is_running = true);

		loop {
			let pause = match self.run_once().await {
				Ok(run) => {
					if run.processed > 0 || run.failed > 0 {
						tracing::info!(
							processed = run.processed,
							failed = run.failed,
							"Indexing cycle finished."
						);
					}

					self.cfg.scan_interval_seconds
				},
				Err(err) => {
					tracing::error!(error = %err, "Indexing cycle failed.");

					self.cfg.error_backoff_seconds
				},
			};

			tokio::time::sleep(Duration::from_secs(pause)).await;
		}
	}

	/// Re-embeds every note regardless of its marker, with the same rate limit.
	pub async fn reindex_all(&self) -> ReindexReport {
		tracing::info!("Starting full reindex.");

		let docs = match self.notes.all_documents(self.cfg.scan_limit, &LIST_FIELDS).await {
			Ok(docs) => docs,
			Err(err) => {
				tracing::error!(error = %err, "Reindex failed.");

				return ReindexReport {
					success: false,
					notes_processed: 0,
					failed: 0,
					error: Some(err.to_string()),
				};
			},
		};
		let folders = folders_of(docs.iter().map(|doc| doc.display_path()));
		let notes: Vec<PendingNote> = docs
			.into_iter()
			.filter(indexable)
			.map(|doc| PendingNote { doc, has_vector: true })
			.collect();
		let run = self.process(&notes, &folders).await;

		self.update_stats(|stats| stats.last_run = Some(now_rfc3339()));

		tracing::info!(processed = run.processed, failed = run.failed, "Reindex finished.");

		ReindexReport {
			success: true,
			notes_processed: run.processed,
			failed: run.failed,
			error: None,
		}
	}

	/// Spawns [`Indexer::reindex_all`]. Fails with [`Error::Conflict`] while one is running.
	pub fn try_start_reindex(self: &Arc<Self>) -> Result<()> {
		let started =
			self.reindexing.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst);

		if started.is_err() {
			return Err(Error::Conflict { message: "A reindex is already running.".to_string() });
		}

		let indexer = self.clone();
		let guard = ReindexGuard(self.reindexing.clone());

		tokio::spawn(async move {
			let _guard = guard;

			indexer.reindex_all().await;
		});

		Ok(())
	}

	/// Enriches and embeds one note. Returns `false` when the note is too short to index.
	pub async fn index_note(&self, doc: &NoteDocument, folders: &[String]) -> Result<bool> {
		if !indexable(doc) {
			tracing::debug!(note_id = %doc.id, "Skipping empty note.");

			return Ok(false);
		}

		tracing::info!(note_id = %doc.id, "Indexing note.");

		let metadata = self.metadata.extract(&doc.data, folders).await;
		let body = frontmatter::strip(&doc.data);
		let vector = self.llm.embed_text(&format!("{} {body}", metadata.summary)).await?;
		let now = OffsetDateTime::now_utc();
		let point = NotePoint {
			note_id: doc.id.clone(),
			category: metadata.category.clone(),
			tags: metadata.tags.clone(),
			keywords: metadata.keywords.clone(),
			mtime: doc.mtime,
			ctime: doc.ctime,
			summary: metadata.summary.clone(),
			indexed_at: paths::rfc3339(now),
		};

		self.vectors.upsert_note(&point, vector).await?;

		if self.cfg.write_frontmatter && !frontmatter::is_indexed(&doc.data) {
			self.write_back(&doc.id, &metadata, now).await;
		}

		Ok(true)
	}

	async fn scan(&self) -> Result<Scan> {
		let docs = self.notes.all_documents(self.cfg.scan_limit, &LIST_FIELDS).await?;
		let folders = folders_of(docs.iter().map(|doc| doc.display_path()));
		let ids: Vec<String> = docs.iter().map(|doc| doc.id.clone()).collect();
		let vectored = self.vectors.existing_note_ids(&ids).await?;
		let mut pending: Vec<PendingNote> = docs
			.iter()
			.filter(|doc| indexable(doc))
			.filter_map(|doc| {
				let has_vector = vectored.contains(&doc.id);
				let unmarked = self.cfg.write_frontmatter && !frontmatter::is_indexed(&doc.data);

				(!has_vector || unmarked).then(|| PendingNote { doc: doc.clone(), has_vector })
			})
			.collect();

		pending.sort_by_key(|note| note.doc.ctime);

		let pending_total = pending.len();

		pending.truncate(self.cfg.max_pending);

		self.update_stats(|stats| {
			stats.total_notes = docs.len();
			stats.indexed_notes = vectored.len();
			stats.pending_notes = pending_total;
		});

		Ok(Scan { pending, pending_total, folders })
	}

	async fn process(&self, notes: &[PendingNote], folders: &[String]) -> IndexRun {
		let mut run = IndexRun::default();
		let batch_size = self.cfg.batch_size.max(1);
		let batches = notes.chunks(batch_size).count();

		for (i, batch) in notes.chunks(batch_size).enumerate() {
			tracing::info!(count = batch.len(), "Processing indexing batch.");

			for note in batch {
				match self.index_note(&note.doc, folders).await {
					Ok(true) => {
						run.processed += 1;

						if !note.has_vector {
							self.update_stats(|stats| stats.indexed_notes += 1);
						}
					},
					Ok(false) => run.skipped += 1,
					Err(err) => {
						tracing::error!(error = %err, note_id = %note.doc.id, "Failed to index note.");

						run.failed += 1;

						self.update_stats(|stats| stats.failed_notes += 1);
					},
				}
			}

			if i + 1 < batches {
				tokio::time::sleep(Duration::from_secs(self.cfg.batch_delay_seconds)).await;
			}
		}

		run
	}

	/// Rewrites the note's frontmatter against a fresh revision. Failures keep the vector.
	async fn write_back(
		&self,
		note_id: &str,
		metadata: &NoteMetadata,
		now: OffsetDateTime,
	) {
		let result = async {
			let mut doc = self.notes.get_document(note_id).await?;

			if frontmatter::is_indexed(&doc.data) {
				return Ok(());
			}

			let enriched = frontmatter::enrich(&doc.data, metadata, now)?;

			doc.set_data(enriched, paths::unix_millis(now));
			self.notes.update_document(&doc).await?;

			Ok::<_, Error>(())
		}
		.await;

		match result {
			Ok(()) => tracing::debug!(note_id, "Wrote AI frontmatter."),
			Err(Error::Conflict { .. }) => {
				tracing::warn!(note_id, "Note changed while indexing. Frontmatter write skipped.")
			},
			Err(err) => tracing::warn!(error = %err, note_id, "Failed to write AI frontmatter."),
		}
	}

	fn update_stats(&self, f: impl FnOnce(&mut IndexerStats)) {
		f(&mut self.stats.lock().unwrap_or_else(PoisonError::into_inner));
	}
}

/// Clears the reindex flag on drop, including when the run panics.
struct ReindexGuard(Arc<AtomicBool>);

impl Drop for ReindexGuard {
	fn drop(&mut self) {
		self.0.store(false, Ordering::SeqCst);
	}
}

fn indexable(doc: &NoteDocument) -> bool {
	!doc.id.starts_with('_') && doc.data.trim().chars().count() >= MIN_CONTENT_CHARS
}

fn now_rfc3339() -> String {
	paths::rfc3339(OffsetDateTime::now_utc())
}
