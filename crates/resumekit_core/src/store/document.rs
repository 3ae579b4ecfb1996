//! Remote document store contract and an in-process implementation.
//!
//! # Responsibility
//! - Define the two operations the edit session needs: read by id and
//!   partial update by id.
//! - Provide `MemoryDocumentStore` for the CLI smoke check and tests.
//!
//! # Invariants
//! - A partial update touches only the sections it names.
//! - The store, not the caller, stamps `updated_at` and `revision`.

use crate::model::document::{Document, DocumentId, SectionUpdates};
use async_trait::async_trait;
use log::debug;
use std::collections::HashMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Mutex, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

pub type StoreResult<T> = Result<T, StoreError>;

/// Failure reported by a document store call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    NotFound(DocumentId),
    /// The store rejected the write against its current state.
    Conflict(String),
    /// Transport-level failure; the request may or may not have landed.
    Network(String),
    /// The store answered with something the session cannot accept.
    InvalidResponse(String),
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFound(id) => write!(f, "document not found: {id}"),
            Self::Conflict(message) => write!(f, "update conflict: {message}"),
            Self::Network(message) => write!(f, "network error: {message}"),
            Self::InvalidResponse(message) => write!(f, "invalid store response: {message}"),
        }
    }
}

impl Error for StoreError {}

/// Remote document store as seen by an edit session.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn fetch_document(&self, id: DocumentId) -> StoreResult<Document>;

    /// Writes exactly `fields` and returns the store's full view afterwards.
    async fn apply_partial_update(
        &self,
        id: DocumentId,
        fields: SectionUpdates,
    ) -> StoreResult<Document>;
}

/// Documents kept in a process-local map.
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    documents: Mutex<HashMap<DocumentId, Document>>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a document, e.g. to seed a demo.
    pub fn insert(&self, document: Document) {
        self.documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(document.id(), document);
    }

    /// Current stored copy, bypassing the async contract.
    pub fn get(&self, id: DocumentId) -> Option<Document> {
        self.documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn fetch_document(&self, id: DocumentId) -> StoreResult<Document> {
        self.get(id).ok_or(StoreError::NotFound(id))
    }

    async fn apply_partial_update(
        &self,
        id: DocumentId,
        fields: SectionUpdates,
    ) -> StoreResult<Document> {
        let mut documents = self
            .documents
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let document = documents.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        document.apply(&fields);
        document.revision += 1;
        document.updated_at = Some(now_epoch_ms());
        debug!(
            "event=document_update module=store status=ok document_id={id} sections={} revision={}",
            fields.len(),
            document.revision
        );
        Ok(document.clone())
    }
}

fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
}
