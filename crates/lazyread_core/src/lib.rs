//! Core queue logic for LazyRead.
//! This crate owns the reading-queue order invariants.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod settings;

pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use logging::{default_log_level, init_logging, logging_status, LogLevel, LoggingError};
pub use model::item::{parse_priority, AnsweredCard, CardId, DeckId, NoteId, QueueItem};
pub use model::outcome::{answer_buttons, interval_label_for_code, AnswerButton, Outcome};
pub use model::policy::{clamp_position, OutcomeRule, Policy, PolicyError, PolicyTable, Target};
pub use repo::card_repo::{CardQueue, CardRecord, CardRepository, SqliteCardRepository};
pub use repo::queue_repo::{ManagedSchema, QueueStore, RepoError, RepoResult, SqliteQueueStore};
pub use service::organizer::{
    MoveOutcome, OrganizerEntry, OrganizerError, OrganizerOptions, OrganizerSession,
};
pub use service::priority::PriorityModel;
pub use service::queue_service::{
    reposition_order, validate_membership, CommitLocks, MembershipMismatch, OrderedQueue,
    QueueError, Repositioned,
};
pub use service::scheduler::{sample_jitter, AnswerEffect, AnswerHook, Notice, Scheduler};
pub use settings::{PolicySetting, PositionMethod, Settings, SettingsError};

/// Minimal health-check API for host integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
