//! Edit session for one open resume document.
//!
//! # Responsibility
//! - Load a document by id and hold it in memory.
//! - Apply section edits locally at once and autosave them after a debounce
//!   window, coalescing rapid edits into one partial update.
//! - Surface load/save failures as a retained error without losing edits.
//!
//! # Invariants
//! - At most one debounce timer is armed; arming cancels the previous one.
//! - At most one save request is in flight, across epochs too; later saves
//!   queue behind it and are sent in order once it settles.
//! - Every `open`/`close` starts a new epoch. Responses and timers from an
//!   older epoch never touch the current state.
//! - `close` drops an armed, unsent edit. Use `flush` first to keep it.

use crate::model::document::{Document, DocumentId, ResumeSection, SectionUpdates, UnknownSection};
use crate::store::document::{DocumentStore, StoreError};
use log::{debug, info, warn};
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;

/// Delay between the last edit and the autosave it triggers.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditSessionConfig {
    pub debounce: Duration,
}

impl Default for EditSessionConfig {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
        }
    }
}

/// Observable state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Never opened, or closed.
    Idle,
    Loading,
    /// Open, nothing outstanding. The document may be absent (`open(None)`).
    Ready,
    /// Local edit applied, autosave timer armed.
    Dirty,
    /// A save request is in flight.
    Saving,
    /// Last load or save failed; see [`DocumentEditSession::last_error`].
    Error,
}

/// Failure retained on the session for the UI to render.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditError {
    LoadFailed(StoreError),
    SaveFailed(StoreError),
}

impl Display for EditError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LoadFailed(err) => write!(f, "failed to load document: {err}"),
            Self::SaveFailed(err) => write!(f, "failed to save document: {err}"),
        }
    }
}

impl Error for EditError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::LoadFailed(err) | Self::SaveFailed(err) => Some(err),
        }
    }
}

/// What happened to one save request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The store accepted it and the local document was replaced.
    Saved,
    /// Another save was in flight; this payload will follow it.
    Queued,
    /// No document loaded, or nothing to send.
    Skipped,
    /// The session was reopened or closed before the response arrived.
    Superseded,
}

/// Payload waiting for the save lane, bound to the document and epoch it
/// was produced for.
struct QueuedSave {
    id: DocumentId,
    epoch: u64,
    updates: SectionUpdates,
}

struct PendingSave {
    timer_id: u64,
    updates: SectionUpdates,
    timer: JoinHandle<()>,
}

#[derive(Default)]
struct SessionState {
    epoch: u64,
    opened: bool,
    loading: bool,
    document: Option<Document>,
    error: Option<EditError>,
    active_section: ResumeSection,
    pending: Option<PendingSave>,
    last_timer_id: u64,
    /// Epoch of the request currently awaiting the store. Only the task
    /// driving the lane clears it.
    in_flight: Option<u64>,
    queued: Option<QueuedSave>,
}

impl SessionState {
    /// Starts a new epoch: cancels the timer and forgets everything tied to
    /// the previous document. Returns how many armed sections were dropped.
    ///
    /// A request already awaiting the store keeps the lane until it settles.
    fn begin_epoch(&mut self) -> usize {
        self.epoch += 1;
        let dropped = self.pending.take().map_or(0, |pending| {
            pending.timer.abort();
            pending.updates.len()
        });
        self.queued = None;
        self.loading = false;
        self.document = None;
        self.error = None;
        dropped
    }

    fn is_saving(&self) -> bool {
        self.in_flight == Some(self.epoch) || self.queued.is_some()
    }
}

struct Shared {
    store: Arc<dyn DocumentStore>,
    config: EditSessionConfig,
    state: Mutex<SessionState>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn fire(self: Arc<Self>, timer_id: u64) {
        let updates = {
            let mut state = self.lock();
            match state.pending.take() {
                Some(pending) if pending.timer_id == timer_id => pending.updates,
                other => {
                    state.pending = other;
                    return;
                }
            }
        };
        // Failures are retained on the session state.
        let _ = self.dispatch(updates).await;
    }

    async fn dispatch(&self, updates: SectionUpdates) -> Result<SaveOutcome, EditError> {
        let (id, epoch) = {
            let mut state = self.lock();
            let Some(id) = state.document.as_ref().map(Document::id) else {
                return Ok(SaveOutcome::Skipped);
            };
            if updates.is_empty() {
                return Ok(SaveOutcome::Skipped);
            }
            let epoch = state.epoch;
            if state.in_flight.is_some() {
                // `begin_epoch` clears the queue, so a queued payload is
                // always for the current document.
                state
                    .queued
                    .get_or_insert_with(|| QueuedSave {
                        id,
                        epoch,
                        updates: SectionUpdates::new(),
                    })
                    .updates
                    .extend(updates);
                debug!("event=document_save module=edit_session status=queued document_id={id}");
                return Ok(SaveOutcome::Queued);
            }
            state.in_flight = Some(epoch);
            (id, epoch)
        };

        let lane = InFlightLane {
            shared: self,
            armed: true,
        };
        let outcome = self.send(id, epoch, updates).await;
        loop {
            let next = {
                let mut state = self.lock();
                match state.queued.take() {
                    Some(next) => {
                        state.in_flight = Some(next.epoch);
                        next
                    }
                    None => {
                        state.in_flight = None;
                        break;
                    }
                }
            };
            let _ = self.send(next.id, next.epoch, next.updates).await;
        }
        lane.disarm();
        outcome
    }

    async fn send(
        &self,
        id: DocumentId,
        epoch: u64,
        updates: SectionUpdates,
    ) -> Result<SaveOutcome, EditError> {
        let started_at = Instant::now();
        let sections = updates.len();
        let result = self.store.apply_partial_update(id, updates).await;

        let mut state = self.lock();
        if state.epoch != epoch {
            debug!("event=document_save module=edit_session status=superseded document_id={id}");
            return Ok(SaveOutcome::Superseded);
        }
        let result = result.and_then(|document| expect_id(id, document));
        match result {
            Ok(mut document) => {
                // The store's copy wins, except for values not yet sent.
                if let Some(queued) = &state.queued {
                    document.apply(&queued.updates);
                }
                if let Some(pending) = &state.pending {
                    document.apply(&pending.updates);
                }
                state.document = Some(document);
                state.error = None;
                info!(
                    "event=document_save module=edit_session status=ok document_id={id} sections={sections} duration_ms={}",
                    started_at.elapsed().as_millis()
                );
                Ok(SaveOutcome::Saved)
            }
            Err(err) => {
                warn!(
                    "event=document_save module=edit_session status=error document_id={id} sections={sections} duration_ms={} error={err}",
                    started_at.elapsed().as_millis()
                );
                let err = EditError::SaveFailed(err);
                state.error = Some(err.clone());
                Err(err)
            }
        }
    }
}

/// Releases the save lane if a dispatching future is dropped mid-request.
struct InFlightLane<'a> {
    shared: &'a Shared,
    armed: bool,
}

impl InFlightLane<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for InFlightLane<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        self.shared.lock().in_flight = None;
    }
}

fn expect_id(id: DocumentId, document: Document) -> Result<Document, StoreError> {
    if document.id() == id {
        Ok(document)
    } else {
        Err(StoreError::InvalidResponse(format!(
            "requested document {id}, store answered with {}",
            document.id()
        )))
    }
}

/// One open document with debounced autosave.
///
/// All operations take `&self`; the session may be shared behind an `Arc`.
/// Dropping the session closes it.
pub struct DocumentEditSession {
    shared: Arc<Shared>,
}

impl DocumentEditSession {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self::with_config(store, EditSessionConfig::default())
    }

    pub fn with_config(store: Arc<dyn DocumentStore>, config: EditSessionConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                store,
                config,
                state: Mutex::new(SessionState::default()),
            }),
        }
    }

    /// Loads `id`, replacing whatever this session held before.
    ///
    /// Any armed autosave for the previous document is cancelled first.
    /// `None` opens an empty session that is immediately ready. Failure is
    /// retained as `LoadFailed` and also returned. If another `open` or
    /// `close` happens while the fetch is pending, its result is discarded.
    pub async fn open(&self, id: Option<DocumentId>) -> Result<(), EditError> {
        let (id, epoch) = {
            let mut state = self.shared.lock();
            let dropped = state.begin_epoch();
            if dropped > 0 {
                warn!("event=document_open module=edit_session status=cancelled_pending dropped_sections={dropped}");
            }
            state.opened = true;
            let Some(id) = id else {
                debug!("event=document_open module=edit_session status=ok mode=empty");
                return Ok(());
            };
            state.loading = true;
            (id, state.epoch)
        };

        let started_at = Instant::now();
        let result = self
            .shared
            .store
            .fetch_document(id)
            .await
            .and_then(|document| expect_id(id, document));

        let mut state = self.shared.lock();
        if state.epoch != epoch {
            debug!("event=document_open module=edit_session status=superseded document_id={id}");
            return Ok(());
        }
        state.loading = false;
        match result {
            Ok(document) => {
                state.document = Some(document);
                state.error = None;
                info!(
                    "event=document_open module=edit_session status=ok document_id={id} duration_ms={}",
                    started_at.elapsed().as_millis()
                );
                Ok(())
            }
            Err(err) => {
                warn!(
                    "event=document_open module=edit_session status=error document_id={id} duration_ms={} error={err}",
                    started_at.elapsed().as_millis()
                );
                let err = EditError::LoadFailed(err);
                state.error = Some(err.clone());
                Err(err)
            }
        }
    }

    /// Applies `value` to section `name` now and (re)arms the autosave timer.
    ///
    /// The armed payload carries the latest value of every section touched
    /// since the last send. Returns `false` when no document is loaded.
    ///
    /// # Panics
    /// Must be called from within a Tokio runtime; the timer is a spawned task.
    pub fn update_section(&self, name: impl Into<String>, value: Value) -> bool {
        let name = name.into();
        let mut state = self.shared.lock();
        let Some(document) = state.document.as_mut() else {
            return false;
        };
        document.sections.insert(name.clone(), value.clone());

        let mut updates = state.pending.take().map_or_else(SectionUpdates::new, |pending| {
            pending.timer.abort();
            pending.updates
        });
        updates.insert(name, value);

        state.last_timer_id += 1;
        let timer_id = state.last_timer_id;
        let shared = Arc::clone(&self.shared);
        let debounce = self.shared.config.debounce;
        let timer = tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            shared.fire(timer_id).await;
        });
        state.pending = Some(PendingSave {
            timer_id,
            updates,
            timer,
        });
        true
    }

    /// Sends exactly `updates` as one partial update.
    ///
    /// Queues behind an in-flight save instead of racing it. On success the
    /// local document is replaced by the store's copy; on failure it is left
    /// as is and `SaveFailed` is retained.
    pub async fn save(&self, updates: SectionUpdates) -> Result<SaveOutcome, EditError> {
        self.shared.dispatch(updates).await
    }

    /// Cancels the armed timer and sends its payload now.
    pub async fn flush(&self) -> Result<SaveOutcome, EditError> {
        let pending = self.shared.lock().pending.take();
        match pending {
            Some(pending) => {
                pending.timer.abort();
                self.shared.dispatch(pending.updates).await
            }
            None => Ok(SaveOutcome::Skipped),
        }
    }

    /// Tears the session down. An armed, unsent edit is dropped.
    pub fn close(&self) {
        let mut state = self.shared.lock();
        if !state.opened && state.pending.is_none() {
            return;
        }
        let dropped = state.begin_epoch();
        state.opened = false;
        if dropped > 0 {
            warn!("event=session_close module=edit_session status=ok dropped_sections={dropped}");
        } else {
            debug!("event=session_close module=edit_session status=ok");
        }
    }

    pub fn phase(&self) -> SessionPhase {
        let state = self.shared.lock();
        if !state.opened {
            SessionPhase::Idle
        } else if state.loading {
            SessionPhase::Loading
        } else if state.is_saving() {
            SessionPhase::Saving
        } else if state.pending.is_some() {
            SessionPhase::Dirty
        } else if state.error.is_some() {
            SessionPhase::Error
        } else {
            SessionPhase::Ready
        }
    }

    /// Snapshot of the in-memory document.
    pub fn document(&self) -> Option<Document> {
        self.shared.lock().document.clone()
    }

    pub fn document_id(&self) -> Option<DocumentId> {
        self.shared.lock().document.as_ref().map(Document::id)
    }

    pub fn is_loading(&self) -> bool {
        self.shared.lock().loading
    }

    /// True while a save for the current document is in flight or queued.
    pub fn is_saving(&self) -> bool {
        self.shared.lock().is_saving()
    }

    pub fn has_pending_save(&self) -> bool {
        self.shared.lock().pending.is_some()
    }

    pub fn last_error(&self) -> Option<EditError> {
        self.shared.lock().error.clone()
    }

    pub fn active_section(&self) -> ResumeSection {
        self.shared.lock().active_section
    }

    /// Moves the display cursor. Not persisted.
    pub fn set_active_section(&self, section: ResumeSection) {
        self.shared.lock().active_section = section;
    }

    /// String form of [`Self::set_active_section`] for UI callers.
    pub fn select_section(&self, name: &str) -> Result<(), UnknownSection> {
        self.set_active_section(name.parse()?);
        Ok(())
    }
}

impl Drop for DocumentEditSession {
    fn drop(&mut self) {
        self.close();
    }
}
