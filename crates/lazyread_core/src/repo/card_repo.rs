//! Host-side deck/note/card lifecycle for the SQLite store.
//!
//! # Responsibility
//! - Create and remove decks, notes and cards the way a host collection
//!   would, so the queue core has real data to order.
//! - Expose suspension, which removes a card from its deck's queue.
//!
//! # Invariants
//! - New cards are appended after the current last due position of the deck.
//! - Note fields are stored as a JSON object of string values.

use crate::model::item::{CardId, DeckId, NoteId};
use crate::repo::queue_repo::{
    ensure_connection_ready, parse_fields, parse_uuid, RepoError, RepoResult,
};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Host queue state of one card.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardQueue {
    New,
    Learning,
    Review,
    Suspended,
}

/// Stored card row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardRecord {
    pub card_id: CardId,
    pub note_id: NoteId,
    pub deck_id: DeckId,
    pub queue: CardQueue,
    /// Position in the deck's new-card order.
    pub due: i64,
    pub interval_days: i64,
}

/// Repository interface for the host collection lifecycle.
pub trait CardRepository {
    fn create_deck(&self, name: &str) -> RepoResult<DeckId>;
    fn create_note(
        &self,
        model_name: &str,
        fields: &BTreeMap<String, String>,
    ) -> RepoResult<NoteId>;
    /// Replaces one field value of an existing note.
    fn set_note_field(&self, note_id: NoteId, field: &str, value: &str) -> RepoResult<()>;
    fn create_card(&self, note_id: NoteId, deck_id: DeckId) -> RepoResult<CardId>;
    /// Records a native host review, giving the card a due date.
    fn mark_reviewed(&self, card_id: CardId, interval_days: i64) -> RepoResult<()>;
    fn set_suspended(&self, card_id: CardId, suspended: bool) -> RepoResult<()>;
    fn delete_card(&self, card_id: CardId) -> RepoResult<()>;
    fn get_card(&self, card_id: CardId) -> RepoResult<Option<CardRecord>>;
    /// All cards of a deck, suspended ones included, by due position.
    fn list_deck_cards(&self, deck_id: DeckId) -> RepoResult<Vec<CardRecord>>;
}

/// SQLite-backed host collection.
pub struct SqliteCardRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteCardRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl CardRepository for SqliteCardRepository<'_> {
    fn create_deck(&self, name: &str) -> RepoResult<DeckId> {
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return Err(RepoError::InvalidData("deck name must not be blank".to_string()));
        }

        let deck_id = Uuid::new_v4();
        self.conn.execute(
            "INSERT INTO decks (deck_uuid, name) VALUES (?1, ?2);",
            params![deck_id.to_string(), trimmed],
        )?;
        Ok(deck_id)
    }

    fn create_note(
        &self,
        model_name: &str,
        fields: &BTreeMap<String, String>,
    ) -> RepoResult<NoteId> {
        let fields_json = serde_json::to_string(fields)
            .map_err(|err| RepoError::InvalidData(format!("cannot encode note fields: {err}")))?;
        let note_id = Uuid::new_v4();
        self.conn.execute(
            "INSERT INTO notes (note_uuid, model_name, fields_json) VALUES (?1, ?2, ?3);",
            params![note_id.to_string(), model_name, fields_json],
        )?;
        Ok(note_id)
    }

    fn set_note_field(&self, note_id: NoteId, field: &str, value: &str) -> RepoResult<()> {
        let current: Option<String> = self
            .conn
            .query_row(
                "SELECT fields_json FROM notes WHERE note_uuid = ?1;",
                [note_id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        let mut fields = parse_fields(&current.ok_or(RepoError::NoteNotFound(note_id))?)?;
        fields.insert(field.to_string(), value.to_string());

        let fields_json = serde_json::to_string(&fields)
            .map_err(|err| RepoError::InvalidData(format!("cannot encode note fields: {err}")))?;
        self.conn.execute(
            "UPDATE notes
             SET fields_json = ?2,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE note_uuid = ?1;",
            params![note_id.to_string(), fields_json],
        )?;
        Ok(())
    }

    fn create_card(&self, note_id: NoteId, deck_id: DeckId) -> RepoResult<CardId> {
        if !exists(self.conn, "SELECT EXISTS(SELECT 1 FROM notes WHERE note_uuid = ?1);", note_id)? {
            return Err(RepoError::NoteNotFound(note_id));
        }
        if !exists(self.conn, "SELECT EXISTS(SELECT 1 FROM decks WHERE deck_uuid = ?1);", deck_id)? {
            return Err(RepoError::DeckNotFound(deck_id));
        }

        let card_id = Uuid::new_v4();
        self.conn.execute(
            "INSERT INTO cards (card_uuid, note_uuid, deck_uuid, queue, due)
             VALUES (
                ?1,
                ?2,
                ?3,
                'new',
                (SELECT COALESCE(MAX(due), 0) + 1 FROM cards WHERE deck_uuid = ?3)
             );",
            params![card_id.to_string(), note_id.to_string(), deck_id.to_string()],
        )?;
        Ok(card_id)
    }

    fn mark_reviewed(&self, card_id: CardId, interval_days: i64) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE cards
             SET queue = 'review',
                 interval_days = ?2,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE card_uuid = ?1
               AND queue <> 'suspended';",
            params![card_id.to_string(), interval_days],
        )?;
        if changed == 0 {
            return Err(RepoError::CardNotFound(card_id));
        }
        Ok(())
    }

    fn set_suspended(&self, card_id: CardId, suspended: bool) -> RepoResult<()> {
        let queue = if suspended {
            CardQueue::Suspended
        } else {
            CardQueue::New
        };
        let changed = self.conn.execute(
            "UPDATE cards
             SET queue = ?2,
                 updated_at = (strftime('%s', 'now') * 1000)
             WHERE card_uuid = ?1;",
            params![card_id.to_string(), card_queue_to_db(queue)],
        )?;
        if changed == 0 {
            return Err(RepoError::CardNotFound(card_id));
        }
        Ok(())
    }

    fn delete_card(&self, card_id: CardId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM cards WHERE card_uuid = ?1;", [card_id.to_string()])?;
        if changed == 0 {
            return Err(RepoError::CardNotFound(card_id));
        }
        Ok(())
    }

    fn get_card(&self, card_id: CardId) -> RepoResult<Option<CardRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT card_uuid, note_uuid, deck_uuid, queue, due, interval_days
             FROM cards
             WHERE card_uuid = ?1;",
        )?;
        let mut rows = stmt.query([card_id.to_string()])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_card_row(row)?));
        }
        Ok(None)
    }

    fn list_deck_cards(&self, deck_id: DeckId) -> RepoResult<Vec<CardRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT card_uuid, note_uuid, deck_uuid, queue, due, interval_days
             FROM cards
             WHERE deck_uuid = ?1
             ORDER BY due ASC, created_at ASC, card_uuid ASC;",
        )?;
        let mut rows = stmt.query([deck_id.to_string()])?;
        let mut cards = Vec::new();
        while let Some(row) = rows.next()? {
            cards.push(parse_card_row(row)?);
        }
        Ok(cards)
    }
}

fn exists(conn: &Connection, sql: &str, id: Uuid) -> RepoResult<bool> {
    let found: i64 = conn.query_row(sql, [id.to_string()], |row| row.get(0))?;
    Ok(found == 1)
}

fn parse_card_row(row: &Row<'_>) -> RepoResult<CardRecord> {
    let queue_text: String = row.get("queue")?;
    let queue = parse_card_queue(&queue_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid card queue `{queue_text}` in cards.queue"))
    })?;

    Ok(CardRecord {
        card_id: parse_uuid(&row.get::<_, String>("card_uuid")?, "cards.card_uuid")?,
        note_id: parse_uuid(&row.get::<_, String>("note_uuid")?, "cards.note_uuid")?,
        deck_id: parse_uuid(&row.get::<_, String>("deck_uuid")?, "cards.deck_uuid")?,
        queue,
        due: row.get("due")?,
        interval_days: row.get("interval_days")?,
    })
}

fn card_queue_to_db(queue: CardQueue) -> &'static str {
    match queue {
        CardQueue::New => "new",
        CardQueue::Learning => "learning",
        CardQueue::Review => "review",
        CardQueue::Suspended => "suspended",
    }
}

fn parse_card_queue(value: &str) -> Option<CardQueue> {
    match value {
        "new" => Some(CardQueue::New),
        "learning" => Some(CardQueue::Learning),
        "review" => Some(CardQueue::Review),
        "suspended" => Some(CardQueue::Suspended),
        _ => None,
    }
}
