//! Use-case services driven by the UI layer.
//!
//! # Responsibility
//! - `session_gate`: who is editing, backed by the persisted credential store.
//! - `edit_session`: one open document with debounced, coalesced autosave.
//!
//! # Invariants
//! - Services own their state explicitly; there is no global singleton.
//! - Errors stay scoped to the operation or session that raised them.

pub mod edit_session;
pub mod session_gate;
