use std::collections::{HashMap, HashSet};

use qdrant_client::{
	Payload, Qdrant,
	qdrant::{
		Condition, CreateCollectionBuilder, CreateFieldIndexCollectionBuilder,
		DeletePointsBuilder, Distance, FieldType, Filter, GetPointsBuilder, PointId, PointStruct,
		PointsIdsList, Query, QueryPointsBuilder, Range, UpsertPointsBuilder, Value,
		VectorParamsBuilder, value::Kind,
	},
};
use serde_json::Value as JsonValue;
use uuid::Uuid;

use crate::{
	Error, Result,
	models::{NotePoint, SearchFilters, VectorHit, VectorStats},
};

const KEYWORD_FIELDS: [&str; 3] = ["note_id", "category", "tags"];
const LOOKUP_BATCH: usize = 256;

/// Deterministic point id, so re-indexing a note overwrites its previous vector.
pub fn point_id(note_id: &str) -> Uuid {
	Uuid::new_v5(&Uuid::NAMESPACE_OID, note_id.as_bytes())
}

pub struct QdrantStore {
	pub client: Qdrant,
	pub collection: String,
	pub vector_dim: u32,
}
impl QdrantStore {
	pub fn new(cfg: &brain_config::Qdrant) -> Result<Self> {
		let client = Qdrant::from_url(&cfg.url).build()?;

		Ok(Self { client, collection: cfg.collection.clone(), vector_dim: cfg.vector_dim })
	}

	/// Creates the collection and its payload indexes when missing.
	pub async fn ensure_collection(&self) -> Result<()> {
		if self.client.collection_exists(self.collection.clone()).await? {
			return Ok(());
		}

		self.client
			.create_collection(
				CreateCollectionBuilder::new(self.collection.clone()).vectors_config(
					VectorParamsBuilder::new(u64::from(self.vector_dim), Distance::Cosine),
				),
			)
			.await?;

		for field in KEYWORD_FIELDS {
			self.client
				.create_field_index(
					CreateFieldIndexCollectionBuilder::new(
						self.collection.clone(),
						field,
						FieldType::Keyword,
					)
					.wait(true),
				)
				.await?;
		}

		self.client
			.create_field_index(
				CreateFieldIndexCollectionBuilder::new(
					self.collection.clone(),
					"mtime",
					FieldType::Integer,
				)
				.wait(true),
			)
			.await?;

		tracing::info!(
			collection = %self.collection,
			dim = self.vector_dim,
			"Qdrant collection created."
		);

		Ok(())
	}

	pub async fn upsert_note(&self, point: &NotePoint, vector: Vec<f32>) -> Result<()> {
		if vector.len() != self.vector_dim as usize {
			return Err(Error::InvalidPayload(format!(
				"Vector has {} dimensions, the collection expects {}.",
				vector.len(),
				self.vector_dim
			)));
		}

		let point = PointStruct::new(
			point_id(&point.note_id).to_string(),
			vector,
			Payload::from(note_payload(point)),
		);

		self.client
			.upsert_points(UpsertPointsBuilder::new(self.collection.clone(), vec![point]).wait(true))
			.await?;

		Ok(())
	}

	pub async fn search_similar(
		&self,
		vector: Vec<f32>,
		limit: u64,
		score_threshold: f32,
		filters: &SearchFilters,
	) -> Result<Vec<VectorHit>> {
		let mut search = QueryPointsBuilder::new(self.collection.clone())
			.query(Query::new_nearest(vector))
			.limit(limit)
			.score_threshold(score_threshold)
			.with_payload(true);

		if let Some(filter) = search_filter(filters) {
			search = search.filter(filter);
		}

		let response = self.client.query(search).await?;

		Ok(response
			.result
			.into_iter()
			.filter_map(|point| {
				let note_id = payload_str(&point.payload, "note_id")?;

				Some(VectorHit {
					note_id,
					score: point.score,
					category: payload_str(&point.payload, "category").unwrap_or_default(),
					tags: payload_strings(&point.payload, "tags"),
					summary: payload_str(&point.payload, "summary").unwrap_or_default(),
					mtime: payload_i64(&point.payload, "mtime").unwrap_or(0),
				})
			})
			.collect())
	}

	pub async fn delete_note(&self, note_id: &str) -> Result<()> {
		let ids = PointsIdsList { ids: vec![PointId::from(point_id(note_id).to_string())] };

		self.client
			.delete_points(DeletePointsBuilder::new(self.collection.clone()).points(ids).wait(true))
			.await?;

		Ok(())
	}

	/// The subset of `note_ids` that already has a vector.
	pub async fn existing_note_ids(&self, note_ids: &[String]) -> Result<HashSet<String>> {
		let mut found = HashSet::new();

		for batch in note_ids.chunks(LOOKUP_BATCH) {
			let ids: Vec<PointId> =
				batch.iter().map(|id| PointId::from(point_id(id).to_string())).collect();
			let response = self
				.client
				.get_points(
					GetPointsBuilder::new(self.collection.clone(), ids).with_payload(true),
				)
				.await?;

			found.extend(
				response.result.iter().filter_map(|point| payload_str(&point.payload, "note_id")),
			);
		}

		Ok(found)
	}

	pub async fn stats(&self) -> Result<VectorStats> {
		let info = self.client.collection_info(self.collection.clone()).await?.result;
		let (total_vectors, indexed_count) = info
			.map(|info| {
				(info.points_count.unwrap_or(0), info.indexed_vectors_count.unwrap_or(0))
			})
			.unwrap_or((0, 0));

		Ok(VectorStats { total_vectors, vector_dimensions: self.vector_dim, indexed_count })
	}

	/// Drops every vector by recreating the collection.
	pub async fn clear_collection(&self) -> Result<()> {
		if self.client.collection_exists(self.collection.clone()).await? {
			self.client.delete_collection(self.collection.clone()).await?;
		}

		self.ensure_collection().await
	}
}

pub fn search_filter(filters: &SearchFilters) -> Option<Filter> {
	let mut conditions = Vec::new();

	if !filters.categories.is_empty() {
		conditions.push(Condition::matches("category", filters.categories.clone()));
	}
	if !filters.tags.is_empty() {
		conditions.push(Condition::matches("tags", filters.tags.clone()));
	}
	if let Some(after) = filters.after_mtime {
		conditions.push(Condition::range(
			"mtime",
			Range { gte: Some(after as f64), ..Default::default() },
		));
	}

	if conditions.is_empty() { None } else { Some(Filter::must(conditions)) }
}

fn note_payload(point: &NotePoint) -> HashMap<String, Value> {
	let mut payload_map = HashMap::new();

	payload_map.insert("note_id".to_string(), Value::from(point.note_id.clone()));
	payload_map.insert("category".to_string(), Value::from(point.category.clone()));
	payload_map.insert("tags".to_string(), Value::from(JsonValue::from(point.tags.clone())));
	payload_map
		.insert("keywords".to_string(), Value::from(JsonValue::from(point.keywords.clone())));
	payload_map.insert("mtime".to_string(), Value::from(point.mtime));
	payload_map.insert("ctime".to_string(), Value::from(point.ctime));
	payload_map.insert("summary".to_string(), Value::from(point.summary.clone()));
	payload_map.insert("indexed_at".to_string(), Value::from(point.indexed_at.clone()));

	payload_map
}

fn payload_str(payload: &HashMap<String, Value>, key: &str) -> Option<String> {
	match &payload.get(key)?.kind {
		Some(Kind::StringValue(text)) => Some(text.clone()),
		_ => None,
	}
}

fn payload_i64(payload: &HashMap<String, Value>, key: &str) -> Option<i64> {
	match &payload.get(key)?.kind {
		Some(Kind::IntegerValue(value)) => Some(*value),
		Some(Kind::DoubleValue(value)) if value.fract() == 0.0 => Some(*value as i64),
		_ => None,
	}
}

fn payload_strings(payload: &HashMap<String, Value>, key: &str) -> Vec<String> {
	match payload.get(key).and_then(|value| value.kind.as_ref()) {
		Some(Kind::ListValue(list)) => list
			.values
			.iter()
			.filter_map(|value| match &value.kind {
				Some(Kind::StringValue(text)) => Some(text.clone()),
				_ => None,
			})
			.collect(),
		_ => Vec::new(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn point_ids_are_stable_per_note() {
		assert_eq!(point_id("Inbox/a.md"), point_id("Inbox/a.md"));
		assert_ne!(point_id("Inbox/a.md"), point_id("Inbox/b.md"));
	}

	#[test]
	fn empty_filters_do_not_filter() {
		assert!(search_filter(&SearchFilters::default()).is_none());
	}

	#[test]
	fn filters_combine_with_must() {
		let filters = SearchFilters {
			categories: vec!["Projects".to_string()],
			tags: vec!["rust".to_string(), "tokio".to_string()],
			after_mtime: Some(1_000),
		};
		let filter = search_filter(&filters).expect("filter");

		assert_eq!(filter.must.len(), 3);
	}

	#[test]
	fn payload_round_trips_through_readers() {
		let point = NotePoint {
			note_id: "Inbox/a.md".to_string(),
			category: "Inbox".to_string(),
			tags: vec!["rust".to_string()],
			mtime: 1_714_558_830_000,
			..NotePoint::default()
		};
		let payload = note_payload(&point);

		assert_eq!(payload_str(&payload, "note_id").as_deref(), Some("Inbox/a.md"));
		assert_eq!(payload_strings(&payload, "tags"), vec!["rust"]);
		assert_eq!(payload_i64(&payload, "mtime"), Some(1_714_558_830_000));
	}
}
