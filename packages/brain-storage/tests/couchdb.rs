use serde_json::json;
use wiremock::{
	Mock, MockServer, ResponseTemplate,
	matchers::{basic_auth, body_partial_json, method, path, query_param},
};

use brain_storage::{Error, couchdb::CouchDb, models::NoteDocument};

fn client(server: &MockServer) -> CouchDb {
	let cfg = brain_config::CouchDb {
		url: server.uri(),
		user: "admin".to_string(),
		password: "pw".to_string(),
		database: "notes".to_string(),
		timeout_ms: 5_000,
	};

	CouchDb::new(&cfg).expect("Failed to build CouchDB client.")
}

#[tokio::test]
async fn document_ids_with_slashes_are_one_segment() {
	let server = MockServer::start().await;

	Mock::given(method("GET"))
		.and(path("/notes/Inbox%2Fa.md"))
		.and(basic_auth("admin", "pw"))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({
			"_id": "Inbox/a.md",
			"_rev": "1-a",
			"path": "Inbox/a.md",
			"data": "hello",
			"type": "leaf",
			"mtime": 10,
			"ctime": 5
		})))
		.expect(1)
		.mount(&server)
		.await;

	let doc = client(&server).get_document("Inbox/a.md").await.expect("Lookup failed.");

	assert_eq!(doc.data, "hello");
	assert_eq!(doc.ctime, 5);
}

#[tokio::test]
async fn missing_document_maps_to_not_found() {
	let server = MockServer::start().await;

	Mock::given(method("GET"))
		.and(path("/notes/gone.md"))
		.respond_with(
			ResponseTemplate::new(404)
				.set_body_json(json!({ "error": "not_found", "reason": "missing" })),
		)
		.mount(&server)
		.await;

	let err = client(&server).get_document("gone.md").await.expect_err("Expected an error.");

	assert!(matches!(err, Error::NotFound(ref id) if id == "gone.md"));
}

#[tokio::test]
async fn create_conflict_maps_to_conflict() {
	let server = MockServer::start().await;

	Mock::given(method("POST"))
		.and(path("/notes"))
		.and(body_partial_json(json!({ "_id": "Inbox/a.md", "type": "leaf" })))
		.respond_with(
			ResponseTemplate::new(409)
				.set_body_json(json!({ "error": "conflict", "reason": "Document update conflict." })),
		)
		.mount(&server)
		.await;

	let doc = NoteDocument::new("Inbox/a.md", "hello", 1);
	let err = client(&server).create_document(&doc).await.expect_err("Expected a conflict.");

	assert!(matches!(err, Error::Conflict(_)));
}

#[tokio::test]
async fn other_failures_keep_the_reason() {
	let server = MockServer::start().await;

	Mock::given(method("GET"))
		.and(path("/notes"))
		.respond_with(
			ResponseTemplate::new(401)
				.set_body_json(json!({ "error": "unauthorized", "reason": "Name or password is incorrect." })),
		)
		.mount(&server)
		.await;

	let err = client(&server).info().await.expect_err("Expected an error.");

	assert!(
		matches!(err, Error::CouchDb { status: 401, ref reason } if reason == "Name or password is incorrect.")
	);
}

#[tokio::test]
async fn update_sends_revision_and_delete_sends_rev_query() {
	let server = MockServer::start().await;

	Mock::given(method("PUT"))
		.and(path("/notes/Inbox%2Fa.md"))
		.and(body_partial_json(json!({ "_rev": "1-a", "data": "new" })))
		.respond_with(
			ResponseTemplate::new(201)
				.set_body_json(json!({ "ok": true, "id": "Inbox/a.md", "rev": "2-b" })),
		)
		.expect(1)
		.mount(&server)
		.await;
	Mock::given(method("DELETE"))
		.and(path("/notes/Inbox%2Fa.md"))
		.and(query_param("rev", "2-b"))
		.respond_with(
			ResponseTemplate::new(200)
				.set_body_json(json!({ "ok": true, "id": "Inbox/a.md", "rev": "3-c" })),
		)
		.expect(1)
		.mount(&server)
		.await;

	let couch = client(&server);
	let mut doc = NoteDocument::new("Inbox/a.md", "old", 1);

	doc.rev = Some("1-a".to_string());
	doc.set_data("new", 2);

	let written = couch.update_document(&doc).await.expect("Update failed.");

	assert_eq!(written.rev, "2-b");

	couch.delete_document("Inbox/a.md", &written.rev).await.expect("Delete failed.");
}

#[tokio::test]
async fn search_and_recent_use_mango_queries() {
	let server = MockServer::start().await;

	Mock::given(method("POST"))
		.and(path("/notes/_find"))
		.and(body_partial_json(json!({ "sort": [{ "mtime": "desc" }], "limit": 3 })))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({
			"docs": [
				{ "_id": "b.md", "path": "b.md", "data": "second", "mtime": 20 },
				{ "_id": "a.md", "path": "a.md", "data": "first", "mtime": 10 }
			]
		})))
		.mount(&server)
		.await;
	Mock::given(method("POST"))
		.and(path("/notes/_find"))
		.and(body_partial_json(json!({
			"selector": { "$or": [{ "data": { "$regex": "(?i)milk" } }, { "path": { "$regex": "(?i)milk" } }] }
		})))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({
			"docs": [{ "_id": "Inbox/m.md", "path": "Inbox/m.md", "data": "buy milk", "mtime": 5 }]
		})))
		.mount(&server)
		.await;

	let couch = client(&server);
	let recent = couch.recent_documents(3).await.expect("Recent failed.");
	let found = couch.search_documents("milk", 10).await.expect("Search failed.");

	assert_eq!(recent.iter().map(|doc| doc.id.as_str()).collect::<Vec<_>>(), vec!["b.md", "a.md"]);
	assert_eq!(found.len(), 1);
	assert_eq!(found[0].data, "buy milk");
}

#[tokio::test]
async fn ensure_database_accepts_existing_database() {
	let server = MockServer::start().await;

	Mock::given(method("PUT"))
		.and(path("/notes"))
		.respond_with(
			ResponseTemplate::new(412)
				.set_body_json(json!({ "error": "file_exists", "reason": "The database could not be created." })),
		)
		.mount(&server)
		.await;

	client(&server).ensure_database().await.expect("Existing database should be accepted.");
}

#[tokio::test]
async fn info_reports_active_size() {
	let server = MockServer::start().await;

	Mock::given(method("GET"))
		.and(path("/notes"))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({
			"db_name": "notes",
			"doc_count": 12,
			"sizes": { "active": 2048, "external": 1024, "file": 4096 }
		})))
		.mount(&server)
		.await;

	let info = client(&server).info().await.expect("Info failed.");

	assert_eq!(info.doc_count, 12);
	assert_eq!(info.data_size(), 2048);
}
