//! Storage contracts and SQLite implementations.
//!
//! # Responsibility
//! - Define the queue store contract the scheduling core drives.
//! - Provide a SQLite deck/note/card store that fulfils it.
//!
//! # Invariants
//! - Repository APIs return semantic errors (`CardNotFound`, ...) next to
//!   SQLite transport errors.
//! - SQL stays inside this module.

pub mod card_repo;
pub mod queue_repo;
