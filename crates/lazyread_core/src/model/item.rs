//! Queue item model.
//!
//! # Invariants
//! - A card belongs to exactly one deck.
//! - `priority` comes from the host note and may be absent.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Stable identifier of one card in the host collection.
pub type CardId = Uuid;

/// Stable identifier of the note a card was generated from.
pub type NoteId = Uuid;

/// Stable identifier of a deck, the scope of one ordered queue.
pub type DeckId = Uuid;

/// One active entry of a deck queue, as reported by the store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueItem {
    pub card_id: CardId,
    pub note_id: NoteId,
    pub deck_id: DeckId,
    /// Raw title field; may still contain markup.
    pub title: String,
    /// Priority rank, when priority mode is on and the note carries one.
    pub priority: Option<u32>,
}

/// The card a review action was performed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnsweredCard {
    pub card_id: CardId,
    pub deck_id: DeckId,
}

impl From<&QueueItem> for AnsweredCard {
    fn from(item: &QueueItem) -> Self {
        Self {
            card_id: item.card_id,
            deck_id: item.deck_id,
        }
    }
}

/// Parses a raw priority field value.
///
/// Blank values mean "no priority". Values that are not a plain
/// non-negative integer are treated the same way.
pub fn parse_priority(raw: &str) -> Option<u32> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<u32>().ok()
}
