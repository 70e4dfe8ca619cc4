use serde::Serialize;
use time::OffsetDateTime;

use brain_domain::paths;
use brain_storage::models::VectorStats;

use crate::{BrainService, Error, IndexerStats, Result};

#[derive(Clone, Debug, Serialize)]
pub struct HealthReport {
	pub status: &'static str,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub couchdb: Option<CouchDbHealth>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<String>,
}
impl HealthReport {
	pub fn is_healthy(&self) -> bool {
		self.error.is_none()
	}
}

#[derive(Clone, Debug, Serialize)]
pub struct CouchDbHealth {
	pub connected: bool,
	pub doc_count: u64,
}

#[derive(Clone, Debug, Serialize)]
pub struct StatsReport {
	pub timestamp: String,
	pub couchdb: CouchDbStats,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub vector_store: Option<VectorStats>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub agents: Option<Vec<String>>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub indexing: Option<IndexingStats>,
}

#[derive(Clone, Debug, Serialize)]
pub struct CouchDbStats {
	pub doc_count: u64,
	pub db_name: String,
	pub data_size: u64,
}

#[derive(Clone, Debug, Serialize)]
pub struct IndexingStats {
	pub pending_notes: usize,
	pub indexer: IndexerStats,
}

impl BrainService {
	/// Never fails: an unreachable CouchDB is reported as unhealthy.
	pub async fn health(&self) -> HealthReport {
		match self.notes.info().await {
			Ok(info) => HealthReport {
				status: "healthy",
				couchdb: Some(CouchDbHealth { connected: true, doc_count: info.doc_count }),
				error: None,
			},
			Err(err) => {
				tracing::error!(error = %err, "Health check failed.");

				HealthReport { status: "unhealthy", couchdb: None, error: Some(err.to_string()) }
			},
		}
	}

	/// CouchDB figures plus, outside basic mode, vector store, agent and indexing state.
	///
	/// Only the CouchDB query is required; the AI sections degrade to absent or cached values.
	pub async fn stats(&self) -> Result<StatsReport> {
		let info = self.notes.info().await?;
		let mut report = StatsReport {
			timestamp: paths::rfc3339(OffsetDateTime::now_utc()),
			couchdb: CouchDbStats {
				doc_count: info.doc_count,
				data_size: info.data_size(),
				db_name: info.db_name,
			},
			vector_store: None,
			agents: None,
			indexing: None,
		};
		let Some(ai) = &self.ai else {
			return Ok(report);
		};

		match ai.vectors.stats().await {
			Ok(stats) => report.vector_store = Some(stats),
			Err(err) => tracing::warn!(error = %err, "Failed to read vector store stats."),
		}

		report.agents =
			Some(ai.director.agents().into_iter().map(str::to_string).collect::<Vec<_>>());

		let cached = ai.indexer.stats();
		let pending_notes = match ai.indexer.pending_count().await {
			Ok(count) => count,
			Err(err) => {
				tracing::warn!(error = %err, "Failed to count pending notes.");

				cached.pending_notes
			},
		};

		report.indexing = Some(IndexingStats { pending_notes, indexer: ai.indexer.stats() });

		Ok(report)
	}

	/// Starts a background reindex of every note.
	pub fn start_reindex(&self) -> Result<()> {
		let Some(ai) = &self.ai else {
			return Err(Error::Unavailable {
				message: "Indexing services are not available.".to_string(),
			});
		};

		ai.indexer.try_start_reindex()?;

		tracing::info!("Reindex started.");

		Ok(())
	}
}
