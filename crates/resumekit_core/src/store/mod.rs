//! Storage contracts consumed by the core.
//!
//! # Responsibility
//! - `kv`: durable key/value text storage behind the session gate.
//! - `document`: the remote document store seen by edit sessions.
//!
//! # Invariants
//! - Both contracts are narrow: the core relies on nothing beyond the listed
//!   operations.

pub mod document;
pub mod kv;
