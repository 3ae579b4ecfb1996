//! Core of the resumekit editor: who may edit, and how one open resume is
//! edited and autosaved.
//!
//! - [`SessionGate`] owns the current identity over a persisted credential
//!   directory.
//! - [`DocumentEditSession`] owns one open document and saves section edits
//!   after a debounce window.

pub mod db;
pub mod logging;
pub mod model;
pub mod service;
pub mod store;

pub use logging::{default_log_level, init_logging, logging_status};
pub use model::document::{Document, DocumentId, ResumeSection, SectionUpdates, UnknownSection};
pub use model::identity::{CredentialRecord, Identity, IdentityId};
pub use service::edit_session::{
    DocumentEditSession, EditError, EditSessionConfig, SaveOutcome, SessionPhase,
    DEFAULT_DEBOUNCE,
};
pub use service::session_gate::{GateConfig, SessionError, SessionGate};
pub use store::document::{DocumentStore, MemoryDocumentStore, StoreError, StoreResult};
pub use store::kv::{KeyValueStore, KvError, KvResult, MemoryKeyValueStore, SqliteKeyValueStore};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
