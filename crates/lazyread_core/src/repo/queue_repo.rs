//! Ordered queue store contract and SQLite implementation.
//!
//! # Responsibility
//! - Read the committed order of a deck's active managed cards.
//! - Forget host scheduling state and persist explicit orders.
//!
//! # Invariants
//! - Snapshots exclude suspended cards and cards of unmanaged note types.
//! - `commit_order` replaces the whole order or fails without writing.
//! - A committed order lists every active card of exactly one deck; partial,
//!   cross-deck and unknown ids are rejected before any row changes.

use crate::db::migrations::ensure_current;
use crate::db::DbError;
use crate::model::item::{parse_priority, CardId, DeckId, NoteId, QueueItem};
use log::debug;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use std::collections::{BTreeMap, HashSet};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

pub type RepoResult<T> = Result<T, RepoError>;

/// Errors from deck/card store operations.
#[derive(Debug)]
pub enum RepoError {
    /// Underlying SQLite/bootstrap error.
    Db(DbError),
    CardNotFound(CardId),
    NoteNotFound(NoteId),
    DeckNotFound(DeckId),
    /// Persisted or supplied data cannot be used as-is.
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::CardNotFound(id) => write!(f, "card not found: {id}"),
            Self::NoteNotFound(id) => write!(f, "note not found: {id}"),
            Self::DeckNotFound(id) => write!(f, "deck not found: {id}"),
            Self::InvalidData(message) => write!(f, "invalid card data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Which host notes count as queue items and where their fields live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagedSchema {
    /// Note type name of managed notes.
    pub model_name: String,
    pub title_field: String,
    pub prio_field: String,
    /// Read `prio_field` into `QueueItem::priority`.
    pub prio_enabled: bool,
}

impl ManagedSchema {
    /// Whether a note of `model_name` belongs to the managed schema.
    pub fn is_managed(&self, model_name: &str) -> bool {
        self.model_name == model_name
    }
}

/// External storage collaborator driven by the queue core.
pub trait QueueStore {
    /// Active managed cards of `deck_id` in committed order.
    fn query_active_items(&self, deck_id: DeckId) -> RepoResult<Vec<QueueItem>>;
    /// Forgets host-native due-date scheduling for `ids`.
    fn reset_scheduling_state(&self, ids: &[CardId]) -> RepoResult<()>;
    /// Persists `ordered_ids` as the authoritative order of their deck.
    ///
    /// `ordered_ids` must list every active card of that deck exactly once.
    fn commit_order(&self, ordered_ids: &[CardId]) -> RepoResult<()>;

    /// Resets and writes one deck order as a single unit.
    ///
    /// Stores that can do better than two sequential calls (for example
    /// inside one transaction) should override this.
    fn commit_scoped(&self, ordered_ids: &[CardId]) -> RepoResult<()> {
        self.reset_scheduling_state(ordered_ids)?;
        self.commit_order(ordered_ids)
    }
}

impl<S: QueueStore + ?Sized> QueueStore for &S {
    fn query_active_items(&self, deck_id: DeckId) -> RepoResult<Vec<QueueItem>> {
        (**self).query_active_items(deck_id)
    }

    fn reset_scheduling_state(&self, ids: &[CardId]) -> RepoResult<()> {
        (**self).reset_scheduling_state(ids)
    }

    fn commit_order(&self, ordered_ids: &[CardId]) -> RepoResult<()> {
        (**self).commit_order(ordered_ids)
    }

    fn commit_scoped(&self, ordered_ids: &[CardId]) -> RepoResult<()> {
        (**self).commit_scoped(ordered_ids)
    }
}

/// SQLite-backed queue store.
pub struct SqliteQueueStore<'conn> {
    conn: &'conn Connection,
    schema: ManagedSchema,
}

impl<'conn> SqliteQueueStore<'conn> {
    /// Creates a store from a migrated connection.
    pub fn try_new(conn: &'conn Connection, schema: ManagedSchema) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn, schema })
    }

    pub fn schema(&self) -> &ManagedSchema {
        &self.schema
    }
}

impl QueueStore for SqliteQueueStore<'_> {
    fn query_active_items(&self, deck_id: DeckId) -> RepoResult<Vec<QueueItem>> {
        active_items(self.conn, &self.schema, deck_id)
    }

    fn reset_scheduling_state(&self, ids: &[CardId]) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        reset_cards(&tx, ids)?;
        tx.commit()?;
        Ok(())
    }

    fn commit_order(&self, ordered_ids: &[CardId]) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        ensure_whole_deck(&tx, &self.schema, ordered_ids)?;
        write_order(&tx, ordered_ids)?;
        tx.commit()?;
        Ok(())
    }

    fn commit_scoped(&self, ordered_ids: &[CardId]) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        ensure_whole_deck(&tx, &self.schema, ordered_ids)?;
        reset_cards(&tx, ordered_ids)?;
        write_order(&tx, ordered_ids)?;
        tx.commit()?;
        debug!(
            "event=queue_commit module=repo status=ok cards={}",
            ordered_ids.len()
        );
        Ok(())
    }
}

fn active_items(
    conn: &Connection,
    schema: &ManagedSchema,
    deck_id: DeckId,
) -> RepoResult<Vec<QueueItem>> {
    let mut stmt = conn.prepare(
        "SELECT
            c.card_uuid AS card_uuid,
            c.note_uuid AS note_uuid,
            c.deck_uuid AS deck_uuid,
            n.fields_json AS fields_json
         FROM cards c
         INNER JOIN notes n ON n.note_uuid = c.note_uuid
         WHERE c.deck_uuid = ?1
           AND c.queue <> 'suspended'
           AND n.model_name = ?2
         ORDER BY c.due ASC, c.created_at ASC, c.card_uuid ASC;",
    )?;

    let mut rows = stmt.query(params![deck_id.to_string(), schema.model_name])?;
    let mut items = Vec::new();
    while let Some(row) = rows.next()? {
        items.push(parse_queue_item_row(row, schema)?);
    }
    Ok(items)
}

/// Rejects orders that are not exactly the active set of one deck.
///
/// The deck is the one of the first listed card.
fn ensure_whole_deck(
    conn: &Connection,
    schema: &ManagedSchema,
    ordered_ids: &[CardId],
) -> RepoResult<()> {
    let mut seen = HashSet::with_capacity(ordered_ids.len());
    if let Some(duplicate) = ordered_ids.iter().find(|id| !seen.insert(**id)) {
        return Err(RepoError::InvalidData(format!(
            "card {duplicate} appears more than once in order"
        )));
    }
    let Some(first) = ordered_ids.first() else {
        return Ok(());
    };

    let deck_uuid: Option<String> = conn
        .query_row(
            "SELECT deck_uuid FROM cards WHERE card_uuid = ?1;",
            [first.to_string()],
            |row| row.get(0),
        )
        .optional()?;
    let deck_id = parse_uuid(
        &deck_uuid.ok_or(RepoError::CardNotFound(*first))?,
        "cards.deck_uuid",
    )?;
    let active: HashSet<CardId> = active_items(conn, schema, deck_id)?
        .into_iter()
        .map(|item| item.card_id)
        .collect();

    for id in ordered_ids {
        if active.contains(id) {
            continue;
        }
        let exists: i64 = conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM cards WHERE card_uuid = ?1);",
            [id.to_string()],
            |row| row.get(0),
        )?;
        if exists == 0 {
            return Err(RepoError::CardNotFound(*id));
        }
        return Err(RepoError::InvalidData(format!(
            "card {id} is not an active card of deck {deck_id}"
        )));
    }
    if seen.len() != active.len() {
        return Err(RepoError::InvalidData(format!(
            "order lists {} of {} active cards in deck {deck_id}",
            seen.len(),
            active.len()
        )));
    }
    Ok(())
}

fn reset_cards(conn: &Connection, ids: &[CardId]) -> RepoResult<()> {
    let mut stmt = conn.prepare(
        "UPDATE cards
         SET queue = 'new',
             interval_days = 0,
             updated_at = (strftime('%s', 'now') * 1000)
         WHERE card_uuid = ?1
           AND queue <> 'suspended';",
    )?;
    for id in ids {
        if stmt.execute([id.to_string()])? == 0 {
            return Err(RepoError::CardNotFound(*id));
        }
    }
    Ok(())
}

fn write_order(conn: &Connection, ordered_ids: &[CardId]) -> RepoResult<()> {
    let mut stmt = conn.prepare(
        "UPDATE cards
         SET due = ?2,
             updated_at = (strftime('%s', 'now') * 1000)
         WHERE card_uuid = ?1;",
    )?;
    for (index, id) in ordered_ids.iter().enumerate() {
        if stmt.execute(params![id.to_string(), index as i64 + 1])? == 0 {
            return Err(RepoError::CardNotFound(*id));
        }
    }
    Ok(())
}

fn parse_queue_item_row(row: &Row<'_>, schema: &ManagedSchema) -> RepoResult<QueueItem> {
    let card_id = parse_uuid(&row.get::<_, String>("card_uuid")?, "cards.card_uuid")?;
    let note_id = parse_uuid(&row.get::<_, String>("note_uuid")?, "cards.note_uuid")?;
    let deck_id = parse_uuid(&row.get::<_, String>("deck_uuid")?, "cards.deck_uuid")?;
    let fields = parse_fields(&row.get::<_, String>("fields_json")?)?;

    let title = fields.get(&schema.title_field).cloned().unwrap_or_default();
    let priority = if schema.prio_enabled {
        let raw = fields.get(&schema.prio_field).map_or("", String::as_str);
        let parsed = parse_priority(raw);
        if parsed.is_none() && !raw.trim().is_empty() {
            debug!(
                "event=priority_parse module=repo status=skip card={} reason=not_an_integer",
                card_id
            );
        }
        parsed
    } else {
        None
    };

    Ok(QueueItem {
        card_id,
        note_id,
        deck_id,
        title,
        priority,
    })
}

/// Decodes a note's `fields_json` column.
pub(crate) fn parse_fields(value: &str) -> RepoResult<BTreeMap<String, String>> {
    serde_json::from_str(value)
        .map_err(|err| RepoError::InvalidData(format!("invalid notes.fields_json: {err}")))
}

pub(crate) fn parse_uuid(value: &str, column: &'static str) -> RepoResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|_| RepoError::InvalidData(format!("invalid uuid `{value}` in {column}")))
}

pub(crate) fn ensure_connection_ready(conn: &Connection) -> RepoResult<()> {
    Ok(ensure_current(conn)?)
}
