//! Identity and credential records.
//!
//! # Invariants
//! - `email` is unique within one credential directory.
//! - `Identity` carries no secret; only `CredentialRecord` does.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type IdentityId = Uuid;

/// Who is currently editing. Held by the session gate and persisted as the
/// current-identity snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub id: IdentityId,
    pub email: String,
    pub display_name: String,
    pub organization_tag: String,
}

impl Identity {
    /// Cheap structural check applied to snapshots read back from storage.
    pub(crate) fn is_well_formed(&self) -> bool {
        !self.id.is_nil() && !self.email.trim().is_empty()
    }
}

/// One entry of the persisted credential directory.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    #[serde(flatten)]
    pub identity: Identity,
    pub secret: String,
}

impl CredentialRecord {
    pub fn matches(&self, email: &str, secret: &str) -> bool {
        self.identity.email == email && self.secret == secret
    }
}

// Keeps secrets out of `{:?}` output and therefore out of log lines.
impl std::fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("identity", &self.identity)
            .field("secret", &"<redacted>")
            .finish()
    }
}
