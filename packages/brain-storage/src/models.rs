use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

pub const LEAF_TYPE: &str = "leaf";

/// A vault file as Obsidian LiveSync stores it in CouchDB.
///
/// `_id` equals `path`. Fields this crate does not model (`children`, `eden`, `deleted`, ...) are
/// kept in `extra` so a read-modify-write cycle does not drop them.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NoteDocument {
	#[serde(rename = "_id")]
	pub id: String,
	#[serde(rename = "_rev", default, skip_serializing_if = "Option::is_none")]
	pub rev: Option<String>,
	#[serde(default)]
	pub path: String,
	#[serde(default)]
	pub data: String,
	#[serde(rename = "type", default = "leaf_type")]
	pub kind: String,
	#[serde(default, deserialize_with = "lenient_millis")]
	pub mtime: i64,
	#[serde(default, deserialize_with = "lenient_millis")]
	pub ctime: i64,
	#[serde(default)]
	pub size: u64,
	#[serde(flatten)]
	pub extra: Map<String, Value>,
}
impl NoteDocument {
	/// A new leaf document whose id is its path.
	pub fn new(path: impl Into<String>, data: impl Into<String>, now_millis: i64) -> Self {
		let path = path.into();
		let data = data.into();

		Self {
			id: path.clone(),
			rev: None,
			size: data.len() as u64,
			path,
			data,
			kind: LEAF_TYPE.to_string(),
			mtime: now_millis,
			ctime: now_millis,
			extra: Map::new(),
		}
	}

	/// Replaces the content and refreshes `mtime` and `size`. `ctime` is kept.
	pub fn set_data(&mut self, data: impl Into<String>, now_millis: i64) {
		self.data = data.into();
		self.size = self.data.len() as u64;
		self.mtime = now_millis;
	}

	/// `path`, falling back to the id for documents written without one.
	pub fn display_path(&self) -> &str {
		if self.path.is_empty() { &self.id } else { &self.path }
	}
}

/// Response of a successful document write.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct DocWrite {
	pub id: String,
	pub rev: String,
}

/// `GET /{db}` response.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct DbInfo {
	#[serde(default)]
	pub db_name: String,
	#[serde(default)]
	pub doc_count: u64,
	#[serde(default)]
	pub sizes: Option<DbSizes>,
	/// Reported by CouchDB 1.x only.
	#[serde(default)]
	pub data_size: Option<u64>,
}
impl DbInfo {
	pub fn data_size(&self) -> u64 {
		self.sizes.as_ref().and_then(|sizes| sizes.active).or(self.data_size).unwrap_or(0)
	}
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct DbSizes {
	pub active: Option<u64>,
	pub external: Option<u64>,
	pub file: Option<u64>,
}

/// Payload filters for vector search. Empty lists do not filter.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SearchFilters {
	pub categories: Vec<String>,
	pub tags: Vec<String>,
	pub after_mtime: Option<i64>,
}
impl SearchFilters {
	pub fn is_empty(&self) -> bool {
		self.categories.is_empty() && self.tags.is_empty() && self.after_mtime.is_none()
	}
}

/// Payload stored next to a note embedding.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NotePoint {
	pub note_id: String,
	pub category: String,
	pub tags: Vec<String>,
	pub keywords: Vec<String>,
	pub mtime: i64,
	pub ctime: i64,
	pub summary: String,
	/// RFC 3339.
	pub indexed_at: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct VectorHit {
	pub note_id: String,
	pub score: f32,
	pub category: String,
	pub tags: Vec<String>,
	pub summary: String,
	pub mtime: i64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct VectorStats {
	pub total_vectors: u64,
	pub vector_dimensions: u32,
	pub indexed_count: u64,
}

fn leaf_type() -> String {
	LEAF_TYPE.to_string()
}

/// LiveSync writes integer milliseconds, older plugins wrote floats.
fn lenient_millis<'de, D>(deserializer: D) -> Result<i64, D::Error>
where
	D: Deserializer<'de>,
{
	let value = Option::<Value>::deserialize(deserializer)?;

	Ok(match value {
		Some(Value::Number(number)) =>
			number.as_i64().or_else(|| number.as_f64().map(|millis| millis as i64)).unwrap_or(0),
		_ => 0,
	})
}

#[cfg(test)]
mod tests {
	use serde_json::json;

	use super::*;

	#[test]
	fn keeps_unknown_livesync_fields() {
		let raw = json!({
			"_id": "Inbox/a.md",
			"_rev": "3-abc",
			"path": "Inbox/a.md",
			"data": "hello",
			"type": "leaf",
			"mtime": 1714558830000.0,
			"ctime": 1714558830000_i64,
			"children": [],
			"eden": {}
		});
		let doc: NoteDocument = serde_json::from_value(raw).expect("decode");

		assert_eq!(doc.mtime, 1_714_558_830_000);
		assert_eq!(doc.rev.as_deref(), Some("3-abc"));

		let encoded = serde_json::to_value(&doc).expect("encode");

		assert_eq!(encoded["children"], json!([]));
		assert_eq!(encoded["type"], "leaf");
	}

	#[test]
	fn new_documents_have_no_revision() {
		let doc = NoteDocument::new("Inbox/b.md", "héllo", 42);
		let encoded = serde_json::to_value(&doc).expect("encode");

		assert!(encoded.get("_rev").is_none());
		assert_eq!(doc.size, 6);
		assert_eq!(doc.ctime, doc.mtime);
	}

	#[test]
	fn projected_documents_decode_with_defaults() {
		let doc: NoteDocument =
			serde_json::from_value(json!({ "_id": "x.md", "mtime": null })).expect("decode");

		assert_eq!(doc.display_path(), "x.md");
		assert_eq!(doc.mtime, 0);
		assert_eq!(doc.kind, LEAF_TYPE);
	}

	#[test]
	fn data_size_prefers_active_size() {
		let info: DbInfo = serde_json::from_value(json!({
			"db_name": "notes",
			"doc_count": 3,
			"sizes": { "active": 100, "file": 400 },
			"data_size": 7
		}))
		.expect("decode");

		assert_eq!(info.data_size(), 100);
	}
}
