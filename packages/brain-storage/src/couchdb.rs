use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::{
	Error, Result,
	models::{DbInfo, DocWrite, LEAF_TYPE, NoteDocument},
};

/// Fields returned by full-text and recency queries.
pub const LIST_FIELDS: [&str; 6] = ["_id", "path", "data", "mtime", "ctime", "size"];

const MTIME_INDEX: &str = "mtime-index";

/// Thin CouchDB client for the LiveSync notes database.
pub struct CouchDb {
	client: Client,
	base: Url,
	database: String,
	user: String,
	password: String,
}
impl CouchDb {
	pub fn new(cfg: &brain_config::CouchDb) -> Result<Self> {
		let base = Url::parse(&cfg.url)
			.map_err(|err| Error::InvalidConfig(format!("CouchDB URL is invalid: {err}.")))?;

		if base.cannot_be_a_base() {
			return Err(Error::InvalidConfig("CouchDB URL must be an HTTP base URL.".to_string()));
		}

		let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;

		Ok(Self {
			client,
			base,
			database: cfg.database.clone(),
			user: cfg.user.clone(),
			password: cfg.password.clone(),
		})
	}

	pub fn database(&self) -> &str {
		&self.database
	}

	pub async fn info(&self) -> Result<DbInfo> {
		let res = self.send(self.request(Method::GET, &[])?, None).await?;

		Ok(res.json().await?)
	}

	/// Creates the database when it does not exist yet.
	pub async fn ensure_database(&self) -> Result<()> {
		let res = self.request(Method::PUT, &[])?.send().await?;

		match res.status() {
			StatusCode::CREATED | StatusCode::ACCEPTED | StatusCode::PRECONDITION_FAILED => Ok(()),
			status => Err(couch_error(status, res).await),
		}
	}

	/// Mango sorts on `mtime` need a matching index.
	pub async fn ensure_indexes(&self) -> Result<()> {
		let body = json!({
			"index": { "fields": ["mtime"] },
			"name": MTIME_INDEX,
			"type": "json",
		});

		self.send(self.request(Method::POST, &["_index"])?.json(&body), None).await?;

		Ok(())
	}

	pub async fn create_document(&self, doc: &NoteDocument) -> Result<DocWrite> {
		let res =
			self.send(self.request(Method::POST, &[])?.json(doc), Some(doc.id.as_str())).await?;

		Ok(res.json().await?)
	}

	pub async fn get_document(&self, id: &str) -> Result<NoteDocument> {
		let res = self.send(self.request(Method::GET, &[id])?, Some(id)).await?;

		Ok(res.json().await?)
	}

	/// Writes `doc` over its current revision. A stale `_rev` yields [`Error::Conflict`].
	pub async fn update_document(&self, doc: &NoteDocument) -> Result<DocWrite> {
		let id = doc.id.as_str();
		let res = self.send(self.request(Method::PUT, &[id])?.json(doc), Some(id)).await?;

		Ok(res.json().await?)
	}

	pub async fn delete_document(&self, id: &str, rev: &str) -> Result<DocWrite> {
		let res =
			self.send(self.request(Method::DELETE, &[id])?.query(&[("rev", rev)]), Some(id)).await?;

		Ok(res.json().await?)
	}

	/// Runs a Mango query and returns the matching documents.
	pub async fn find(&self, query: &Value) -> Result<Vec<NoteDocument>> {
		#[derive(Deserialize)]
		struct FindResponse {
			docs: Vec<NoteDocument>,
		}

		let res = self.send(self.request(Method::POST, &["_find"])?.json(query), None).await?;
		let found: FindResponse = res.json().await?;

		Ok(found.docs)
	}

	/// Case-insensitive substring match on the content or the path.
	pub async fn search_documents(&self, query: &str, limit: usize) -> Result<Vec<NoteDocument>> {
		self.find(&search_query(query, limit)).await
	}

	/// Most recently modified notes first.
	pub async fn recent_documents(&self, limit: usize) -> Result<Vec<NoteDocument>> {
		self.find(&recent_query(limit)).await
	}

	/// Leaf documents projected to `fields`. An empty slice returns whole documents.
	pub async fn all_documents(&self, limit: usize, fields: &[&str]) -> Result<Vec<NoteDocument>> {
		let mut query = json!({
			"selector": { "type": LEAF_TYPE },
			"limit": limit,
		});

		if !fields.is_empty() {
			query["fields"] = json!(fields);
		}

		self.find(&query).await
	}

	fn request(&self, method: Method, segments: &[&str]) -> Result<RequestBuilder> {
		let mut url = self.base.clone();

		{
			let mut path = url.path_segments_mut().map_err(|_| {
				Error::InvalidConfig("CouchDB URL must be an HTTP base URL.".to_string())
			})?;

			path.pop_if_empty().push(&self.database);

			// `push` percent-encodes `/`, so vault paths stay a single document id segment.
			for segment in segments {
				path.push(segment);
			}
		}

		Ok(self.client.request(method, url).basic_auth(&self.user, Some(&self.password)))
	}

	async fn send(&self, request: RequestBuilder, id: Option<&str>) -> Result<Response> {
		let res = request.send().await?;
		let status = res.status();

		if status.is_success() {
			return Ok(res);
		}

		match status {
			StatusCode::NOT_FOUND =>
				Err(Error::NotFound(id.unwrap_or(self.database.as_str()).to_string())),
			StatusCode::CONFLICT => Err(Error::Conflict(id.unwrap_or_default().to_string())),
			_ => Err(couch_error(status, res).await),
		}
	}
}

pub fn search_query(query: &str, limit: usize) -> Value {
	let pattern = format!("(?i){}", regex::escape(query));

	json!({
		"selector": {
			"$or": [
				{ "data": { "$regex": pattern } },
				{ "path": { "$regex": pattern } },
			],
		},
		"limit": limit,
		"fields": LIST_FIELDS,
	})
}

pub fn recent_query(limit: usize) -> Value {
	json!({
		"selector": { "type": LEAF_TYPE, "mtime": { "$gt": 0 } },
		"sort": [{ "mtime": "desc" }],
		"limit": limit,
		"fields": LIST_FIELDS,
	})
}

async fn couch_error(status: StatusCode, res: Response) -> Error {
	#[derive(Deserialize)]
	struct CouchErrorBody {
		error: Option<String>,
		reason: Option<String>,
	}

	let reason = match res.json::<CouchErrorBody>().await {
		Ok(body) => body.reason.or(body.error).unwrap_or_default(),
		Err(_) => String::new(),
	};

	Error::CouchDb { status: status.as_u16(), reason }
}
