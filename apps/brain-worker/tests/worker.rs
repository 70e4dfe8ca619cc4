use std::time::Duration;

use brain_testkit::{Harness, ScriptedChat, config, note};

#[test]
fn basic_mode_has_no_indexer() {
	let harness = Harness::basic();

	assert!(brain_worker::indexer_of(&harness.service).is_err());
}

#[tokio::test]
async fn indexer_processes_notes_written_elsewhere() {
	let harness = Harness::new(ScriptedChat::new("not json"));

	harness.notes.insert(note("Inbox/synced.md", "Written in Obsidian and synced.", 1_000));

	let indexer = brain_worker::indexer_of(&harness.service).expect("Missing indexer.");
	let run = indexer.run_once().await.expect("Indexing failed.");

	assert_eq!(run.processed, 1);
	assert!(harness.vectors.point("Inbox/synced.md").is_some());
}

#[tokio::test]
async fn disabled_indexer_ends_the_loop() {
	let mut cfg = config();

	cfg.indexer.enabled = false;

	let harness = Harness::with_config(cfg, ScriptedChat::new("not json"));
	let indexer = brain_worker::indexer_of(&harness.service).expect("Missing indexer.");

	tokio::time::timeout(Duration::from_secs(1), brain_worker::run_until_shutdown(indexer))
		.await
		.expect("Worker loop kept running.");
}
