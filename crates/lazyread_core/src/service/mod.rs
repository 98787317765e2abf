//! Queue use-case services.
//!
//! # Responsibility
//! - Keep per-deck ordering rules above the storage layer.
//! - Expose answer scheduling and manual reorder as use-case APIs.

pub mod organizer;
pub mod priority;
pub mod queue_service;
pub mod scheduler;
