//! Domain records shared by the session gate and the edit session.
//!
//! # Invariants
//! - A document keeps the id it was loaded with.
//! - Secrets only ever live in `CredentialRecord`, never in `Identity`.

pub mod document;
pub mod identity;
