//! CLI smoke check.
//!
//! # Responsibility
//! - Wire the core end to end against in-process stores.
//! - Print a deterministic trace for quick local sanity checks.
//! - Mirror the trace into the core's rolling log under the temp directory.

use log::{info, warn};
use resumekit_core::{
    core_version, default_log_level, init_logging, Document, DocumentEditSession, DocumentStore,
    EditSessionConfig, MemoryDocumentStore, SessionGate, SqliteKeyValueStore,
};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("resumekit smoke check failed: {err}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    println!("resumekit_core version={}", core_version());
    let log_dir = std::env::temp_dir().join("resumekit-logs");
    if let Err(err) = init_logging(default_log_level(), &log_dir.to_string_lossy()) {
        eprintln!("logging disabled: {err}");
    }

    let mut gate = SessionGate::initialized(SqliteKeyValueStore::open_in_memory()?)?;
    let identity = gate.signup("demo@example.com", "demo", "Demo User", "demo-org")?;
    println!(
        "session authenticated={} identity_id={}",
        gate.is_authenticated(),
        identity.id
    );

    let store = Arc::new(MemoryDocumentStore::new());
    let document = Document::new(resumekit_core::DocumentId::new_v4())
        .with_section("personal", json!({"name": identity.display_name}));
    let document_id = document.id();
    store.insert(document);

    let debounce = Duration::from_millis(200);
    let session = DocumentEditSession::with_config(
        Arc::clone(&store) as Arc<dyn DocumentStore>,
        EditSessionConfig { debounce },
    );
    session.open(Some(document_id)).await?;
    session.update_section("summary", json!("Systems engineer"));
    session.update_section("skills", json!(["rust", "sqlite"]));
    println!("phase_after_edit={:?}", session.phase());

    tokio::time::sleep(debounce * 2).await;
    let saved = store.get(document_id).map_or(0, |document| document.revision);
    println!("phase_after_debounce={:?} revision={saved}", session.phase());
    if saved == 0 {
        warn!(
            "event=smoke_check module=cli status=error reason=autosave_missing document_id={document_id}"
        );
    } else {
        info!("event=smoke_check module=cli status=ok document_id={document_id} revision={saved}");
    }

    session.close();
    gate.logout();
    Ok(())
}
