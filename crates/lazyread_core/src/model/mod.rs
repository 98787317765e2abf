//! Domain model for the reading queue.
//!
//! # Responsibility
//! - Define queue items, review outcomes and repositioning policies.
//! - Keep every type here free of storage and UI concerns.
//!
//! # Invariants
//! - Card identity is a stable `CardId` and never changes while queued.
//! - Every outcome resolves to at most one rule in a `PolicyTable`.

pub mod item;
pub mod outcome;
pub mod policy;
