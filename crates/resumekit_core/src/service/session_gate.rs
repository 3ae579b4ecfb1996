//! Identity gate over a persisted credential directory.
//!
//! # Responsibility
//! - Establish, expose and clear the current editing identity.
//! - Register and authenticate against the credential directory.
//! - Restore the identity snapshot at startup, healing corrupt snapshots.
//!
//! # Invariants
//! - No identity state is readable until `init` has completed.
//! - Secrets are never held outside the credential directory.
//! - Signup writes the directory before the snapshot, so an interrupted
//!   signup still leaves a login that succeeds.
//! - A failed `login`/`signup` leaves the current identity untouched.

use crate::model::identity::{CredentialRecord, Identity};
use crate::store::kv::{KeyValueStore, KvError};
use log::{info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));

pub const DEFAULT_DIRECTORY_KEY: &str = "resumekit.credentials";
pub const DEFAULT_SNAPSHOT_KEY: &str = "resumekit.current_identity";

/// Storage keys used by one gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateConfig {
    pub directory_key: String,
    pub snapshot_key: String,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            directory_key: DEFAULT_DIRECTORY_KEY.to_string(),
            snapshot_key: DEFAULT_SNAPSHOT_KEY.to_string(),
        }
    }
}

/// Errors surfaced to callers of the gate.
#[derive(Debug)]
pub enum SessionError {
    /// No directory record matches both email and secret.
    InvalidCredentials,
    /// Signup email already present in the directory.
    DuplicateIdentity(String),
    /// Signup input failed validation.
    InvalidInput(&'static str),
    /// `init` has not completed yet.
    NotReady,
    /// The credential directory itself could not be parsed.
    CorruptDirectory(String),
    Storage(KvError),
}

impl Display for SessionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidCredentials => write!(f, "invalid email or secret"),
            Self::DuplicateIdentity(email) => write!(f, "identity already exists: {email}"),
            Self::InvalidInput(details) => write!(f, "invalid signup input: {details}"),
            Self::NotReady => write!(f, "session gate is still initializing"),
            Self::CorruptDirectory(details) => {
                write!(f, "credential directory is unreadable: {details}")
            }
            Self::Storage(err) => write!(f, "{err}"),
        }
    }
}

impl Error for SessionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Storage(err) => Some(err),
            _ => None,
        }
    }
}

impl From<KvError> for SessionError {
    fn from(value: KvError) -> Self {
        Self::Storage(value)
    }
}

enum GatePhase {
    Loading,
    Ready(Option<Identity>),
}

/// Owns "who is editing" for the lifetime of the application.
///
/// Constructed in the loading state; call [`SessionGate::init`] before use.
/// Callers receive the gate by reference; it is never global.
pub struct SessionGate<S: KeyValueStore> {
    store: S,
    config: GateConfig,
    phase: GatePhase,
}

impl<S: KeyValueStore> SessionGate<S> {
    pub fn new(store: S) -> Self {
        Self::with_config(store, GateConfig::default())
    }

    pub fn with_config(store: S, config: GateConfig) -> Self {
        Self {
            store,
            config,
            phase: GatePhase::Loading,
        }
    }

    /// Shorthand for `new` followed by `init`.
    pub fn initialized(store: S) -> Result<Self, SessionError> {
        let mut gate = Self::new(store);
        gate.init()?;
        Ok(gate)
    }

    /// Restores the persisted identity snapshot.
    ///
    /// An unparsable or malformed snapshot is deleted and the gate comes up
    /// anonymous. Only a storage failure is returned, in which case the gate
    /// stays loading. Calling `init` on a ready gate does nothing.
    pub fn init(&mut self) -> Result<(), SessionError> {
        if matches!(self.phase, GatePhase::Ready(_)) {
            return Ok(());
        }

        let restored = match self.store.get(&self.config.snapshot_key)? {
            None => None,
            Some(raw) => match serde_json::from_str::<Identity>(&raw) {
                Ok(identity) if identity.is_well_formed() => Some(identity),
                Ok(_) => {
                    self.discard_corrupt_snapshot("malformed_identity");
                    None
                }
                Err(err) => {
                    self.discard_corrupt_snapshot(&format!("parse_error line={}", err.line()));
                    None
                }
            },
        };

        match &restored {
            Some(identity) => info!(
                "event=session_restore module=session status=ok identity_id={}",
                identity.id
            ),
            None => info!("event=session_restore module=session status=anonymous"),
        }
        self.phase = GatePhase::Ready(restored);
        Ok(())
    }

    pub fn is_loading(&self) -> bool {
        matches!(self.phase, GatePhase::Loading)
    }

    /// Current identity, or `NotReady` while loading.
    pub fn current_identity(&self) -> Result<Option<&Identity>, SessionError> {
        match &self.phase {
            GatePhase::Loading => Err(SessionError::NotReady),
            GatePhase::Ready(identity) => Ok(identity.as_ref()),
        }
    }

    /// True iff an identity is held. Always false while loading.
    pub fn is_authenticated(&self) -> bool {
        matches!(self.phase, GatePhase::Ready(Some(_)))
    }

    /// Registers a new identity and makes it current.
    pub fn signup(
        &mut self,
        email: &str,
        secret: &str,
        display_name: &str,
        organization_tag: &str,
    ) -> Result<Identity, SessionError> {
        self.ensure_ready()?;
        validate_signup(email, secret, display_name)?;

        let mut directory = self.load_directory()?;
        if directory.iter().any(|record| record.identity.email == email) {
            warn!("event=signup module=session status=rejected reason=duplicate_identity");
            return Err(SessionError::DuplicateIdentity(email.to_string()));
        }

        let identity = Identity {
            id: Uuid::new_v4(),
            email: email.to_string(),
            display_name: display_name.trim().to_string(),
            organization_tag: organization_tag.trim().to_string(),
        };
        directory.push(CredentialRecord {
            identity: identity.clone(),
            secret: secret.to_string(),
        });

        // Directory first: a crash after this line still allows `login`.
        self.store_directory(&directory)?;
        self.store_snapshot(&identity)?;
        self.phase = GatePhase::Ready(Some(identity.clone()));

        info!(
            "event=signup module=session status=ok identity_id={} directory_size={}",
            identity.id,
            directory.len()
        );
        Ok(identity)
    }

    /// Authenticates against the directory and makes the match current.
    pub fn login(&mut self, email: &str, secret: &str) -> Result<Identity, SessionError> {
        self.ensure_ready()?;

        let identity = self
            .load_directory()?
            .into_iter()
            .find(|record| record.matches(email, secret))
            .map(|record| record.identity);
        let Some(identity) = identity else {
            warn!("event=login module=session status=rejected reason=invalid_credentials");
            return Err(SessionError::InvalidCredentials);
        };

        self.store_snapshot(&identity)?;
        self.phase = GatePhase::Ready(Some(identity.clone()));
        info!(
            "event=login module=session status=ok identity_id={}",
            identity.id
        );
        Ok(identity)
    }

    /// Clears the current identity and its snapshot. Never fails; a snapshot
    /// that cannot be removed is logged and left for the next `init`.
    pub fn logout(&mut self) {
        if self.is_loading() {
            return;
        }
        self.phase = GatePhase::Ready(None);
        match self.store.remove(&self.config.snapshot_key) {
            Ok(()) => info!("event=logout module=session status=ok"),
            Err(err) => warn!("event=logout module=session status=degraded error={err}"),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Tears the gate down and hands the store back.
    pub fn dispose(self) -> S {
        self.store
    }

    fn ensure_ready(&self) -> Result<(), SessionError> {
        if self.is_loading() {
            return Err(SessionError::NotReady);
        }
        Ok(())
    }

    fn load_directory(&self) -> Result<Vec<CredentialRecord>, SessionError> {
        match self.store.get(&self.config.directory_key)? {
            None => Ok(Vec::new()),
            Some(raw) => serde_json::from_str(&raw)
                .map_err(|err| SessionError::CorruptDirectory(err.to_string())),
        }
    }

    fn store_directory(&self, directory: &[CredentialRecord]) -> Result<(), SessionError> {
        let raw = serde_json::to_string(directory)
            .map_err(|err| SessionError::CorruptDirectory(err.to_string()))?;
        self.store.set(&self.config.directory_key, &raw)?;
        Ok(())
    }

    fn store_snapshot(&self, identity: &Identity) -> Result<(), SessionError> {
        let raw = serde_json::to_string(identity)
            .map_err(|err| SessionError::CorruptDirectory(err.to_string()))?;
        self.store.set(&self.config.snapshot_key, &raw)?;
        Ok(())
    }

    fn discard_corrupt_snapshot(&self, reason: &str) {
        warn!("event=session_restore module=session status=corrupt reason={reason}");
        if let Err(err) = self.store.remove(&self.config.snapshot_key) {
            warn!("event=session_restore module=session status=degraded error={err}");
        }
    }
}

fn validate_signup(email: &str, secret: &str, display_name: &str) -> Result<(), SessionError> {
    if !EMAIL_RE.is_match(email) {
        return Err(SessionError::InvalidInput("email is not a valid address"));
    }
    if secret.is_empty() {
        return Err(SessionError::InvalidInput("secret cannot be empty"));
    }
    if display_name.trim().is_empty() {
        return Err(SessionError::InvalidInput("display name cannot be empty"));
    }
    Ok(())
}
