use std::env;

use brain_storage::{
	models::{NotePoint, SearchFilters},
	qdrant::QdrantStore,
};

fn store(collection: &str) -> Option<QdrantStore> {
	let url = env::var("BRAIN_QDRANT_URL").ok()?;
	let cfg = brain_config::Qdrant { url, collection: collection.to_string(), vector_dim: 3 };

	Some(QdrantStore::new(&cfg).expect("Failed to build Qdrant client."))
}

fn point(note_id: &str, category: &str) -> NotePoint {
	NotePoint {
		note_id: note_id.to_string(),
		category: category.to_string(),
		tags: vec!["rust".to_string()],
		mtime: 1_000,
		ctime: 1_000,
		summary: format!("Summary of {note_id}."),
		indexed_at: "2024-05-01T10:00:00Z".to_string(),
		..NotePoint::default()
	}
}

#[tokio::test]
#[ignore = "Requires external Qdrant. Set BRAIN_QDRANT_URL to run."]
async fn upsert_search_and_delete_round_trip() {
	let Some(store) = store("brain_storage_round_trip") else {
		eprintln!("Skipping upsert_search_and_delete_round_trip; set BRAIN_QDRANT_URL to run.");

		return;
	};

	store.clear_collection().await.expect("Failed to reset collection.");
	store.upsert_note(&point("Inbox/a.md", "Inbox"), vec![1.0, 0.0, 0.0]).await.expect("upsert");
	store.upsert_note(&point("Ideas/b.md", "Ideas"), vec![0.0, 1.0, 0.0]).await.expect("upsert");
	// Same note again overwrites its point.
	store.upsert_note(&point("Inbox/a.md", "Inbox"), vec![1.0, 0.1, 0.0]).await.expect("upsert");

	let stats = store.stats().await.expect("stats");

	assert_eq!(stats.total_vectors, 2);

	let filters = SearchFilters { categories: vec!["Inbox".to_string()], ..SearchFilters::default() };
	let hits =
		store.search_similar(vec![1.0, 0.0, 0.0], 10, 0.0, &filters).await.expect("search");

	assert_eq!(hits.len(), 1);
	assert_eq!(hits[0].note_id, "Inbox/a.md");
	assert_eq!(hits[0].tags, vec!["rust"]);

	let ids = vec!["Inbox/a.md".to_string(), "missing.md".to_string()];
	let existing = store.existing_note_ids(&ids).await.expect("lookup");

	assert!(existing.contains("Inbox/a.md"));
	assert!(!existing.contains("missing.md"));

	store.delete_note("Inbox/a.md").await.expect("delete");

	let existing = store.existing_note_ids(&ids).await.expect("lookup");

	assert!(existing.is_empty());
}

#[tokio::test]
#[ignore = "Requires external Qdrant. Set BRAIN_QDRANT_URL to run."]
async fn rejects_vectors_of_the_wrong_dimension() {
	let Some(store) = store("brain_storage_dims") else {
		eprintln!("Skipping rejects_vectors_of_the_wrong_dimension; set BRAIN_QDRANT_URL to run.");

		return;
	};

	store.ensure_collection().await.expect("Failed to create collection.");

	assert!(store.upsert_note(&point("x.md", "Inbox"), vec![1.0, 0.0]).await.is_err());
}
