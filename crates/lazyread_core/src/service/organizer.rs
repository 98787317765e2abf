//! Manual reorder session ("organizer").
//!
//! # Responsibility
//! - Hold a local, toolkit-free copy of a deck queue with a selection.
//! - Apply move/randomize gestures and hand the final order to the queue.
//!
//! # Invariants
//! - Selection is stored on the entry, so it follows the card through every
//!   mutation.
//! - Moves keep the relative order of selected entries.
//! - The session never writes until `save`; dropping it discards changes.

use crate::model::item::{CardId, DeckId, QueueItem};
use crate::repo::queue_repo::QueueStore;
use crate::service::priority::PriorityModel;
use crate::service::queue_service::{OrderedQueue, QueueError};
use log::{debug, warn};
use once_cell::sync::Lazy;
use rand::seq::SliceRandom;
use rand::Rng;
use regex::Regex;
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

static HTML_TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<[^>]*>").expect("valid html tag regex"));
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));

/// Non-fatal organizer gesture errors, shown to the user as notices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrganizerError {
    /// A move was requested with no entry selected.
    NothingSelected,
    /// The referenced card is not in this session.
    UnknownCard(CardId),
}

impl Display for OrganizerError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NothingSelected => write!(f, "Please select one or several items."),
            Self::UnknownCard(id) => write!(f, "card is not in the organizer: {id}"),
        }
    }
}

impl Error for OrganizerError {}

/// Whether a move changed the order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    Moved,
    /// Selection already touches the target edge; nothing changed.
    AtBoundary,
}

/// Display and ordering options of an organizer session.
#[derive(Debug, Clone, PartialEq)]
pub struct OrganizerOptions {
    /// Label template with `{info}` and `{title}` placeholders.
    pub format: String,
    pub prio_enabled: bool,
    pub priority_model: PriorityModel,
}

/// One row of the organizer list.
#[derive(Debug, Clone, PartialEq)]
pub struct OrganizerEntry {
    pub item: QueueItem,
    pub label: String,
    pub selected: bool,
}

/// Scoped manual reorder session for one deck.
#[derive(Debug, Clone)]
pub struct OrganizerSession {
    deck_id: DeckId,
    options: OrganizerOptions,
    entries: Vec<OrganizerEntry>,
    warnings: Vec<String>,
}

impl OrganizerSession {
    /// Opens a session on the deck's current committed order.
    pub fn open<S: QueueStore>(
        queue: &OrderedQueue<S>,
        deck_id: DeckId,
        options: OrganizerOptions,
    ) -> Result<Self, QueueError> {
        let items = queue.snapshot(deck_id)?;
        if items.is_empty() {
            return Err(QueueError::EmptyQueue(deck_id));
        }
        Ok(Self::from_items(deck_id, items, options))
    }

    /// Builds a session from an already loaded snapshot.
    pub fn from_items(deck_id: DeckId, items: Vec<QueueItem>, options: OrganizerOptions) -> Self {
        let mut session = Self {
            deck_id,
            options,
            entries: Vec::new(),
            warnings: Vec::new(),
        };
        session.load(items, &HashSet::new());
        debug!(
            "event=organizer_open module=organizer status=ok deck={} entries={}",
            deck_id,
            session.entries.len()
        );
        session
    }

    /// Reloads entries from the store, keeping surviving selections.
    ///
    /// Local, unsaved moves are replaced by the committed order.
    pub fn refresh<S: QueueStore>(&mut self, queue: &OrderedQueue<S>) -> Result<(), QueueError> {
        let items = queue.snapshot(self.deck_id)?;
        let selected: HashSet<CardId> = self.selected_ids().into_iter().collect();
        self.load(items, &selected);
        Ok(())
    }

    /// Commits the session order and ends the session.
    pub fn save<S: QueueStore>(self, queue: &OrderedQueue<S>) -> Result<(), QueueError> {
        queue.reorder(self.deck_id, &self.order())
    }

    pub fn deck_id(&self) -> DeckId {
        self.deck_id
    }

    pub fn entries(&self) -> &[OrganizerEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Current local order.
    pub fn order(&self) -> Vec<CardId> {
        self.entries.iter().map(|entry| entry.item.card_id).collect()
    }

    pub fn selected_ids(&self) -> Vec<CardId> {
        self.entries
            .iter()
            .filter(|entry| entry.selected)
            .map(|entry| entry.item.card_id)
            .collect()
    }

    /// Label warnings raised since the last call.
    pub fn take_warnings(&mut self) -> Vec<String> {
        std::mem::take(&mut self.warnings)
    }

    pub fn set_selected(&mut self, card_id: CardId, selected: bool) -> Result<(), OrganizerError> {
        let entry = self
            .entries
            .iter_mut()
            .find(|entry| entry.item.card_id == card_id)
            .ok_or(OrganizerError::UnknownCard(card_id))?;
        entry.selected = selected;
        Ok(())
    }

    /// Replaces the selection with the entries at `indices`.
    ///
    /// Out-of-range indices are ignored.
    pub fn select_indices(&mut self, indices: &[usize]) {
        for (index, entry) in self.entries.iter_mut().enumerate() {
            entry.selected = indices.contains(&index);
        }
    }

    pub fn clear_selection(&mut self) {
        for entry in &mut self.entries {
            entry.selected = false;
        }
    }

    pub fn move_to_top(&mut self) -> Result<MoveOutcome, OrganizerError> {
        self.ensure_selection()?;
        let (mut selected, rest): (Vec<_>, Vec<_>) =
            self.entries.drain(..).partition(|entry| entry.selected);
        selected.extend(rest);
        self.entries = selected;
        Ok(MoveOutcome::Moved)
    }

    pub fn move_to_bottom(&mut self) -> Result<MoveOutcome, OrganizerError> {
        self.ensure_selection()?;
        let (selected, mut rest): (Vec<_>, Vec<_>) =
            self.entries.drain(..).partition(|entry| entry.selected);
        rest.extend(selected);
        self.entries = rest;
        Ok(MoveOutcome::Moved)
    }

    /// Moves every selected entry one row up.
    pub fn move_up(&mut self) -> Result<MoveOutcome, OrganizerError> {
        let rows = self.selected_rows()?;
        if rows[0] == 0 {
            return Ok(MoveOutcome::AtBoundary);
        }
        for row in rows {
            self.entries.swap(row - 1, row);
        }
        Ok(MoveOutcome::Moved)
    }

    /// Moves every selected entry one row down.
    pub fn move_down(&mut self) -> Result<MoveOutcome, OrganizerError> {
        let mut rows = self.selected_rows()?;
        rows.reverse();
        if rows[0] == self.entries.len() - 1 {
            return Ok(MoveOutcome::AtBoundary);
        }
        for row in rows {
            self.entries.swap(row, row + 1);
        }
        Ok(MoveOutcome::Moved)
    }

    /// Randomizes the order with the thread-local generator.
    pub fn randomize(&mut self) {
        self.randomize_with(&mut rand::rng());
    }

    /// Priority mode: sorts by sampled priority scores.
    /// Otherwise: uniform shuffle.
    pub fn randomize_with<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        if self.options.prio_enabled {
            let entries = std::mem::take(&mut self.entries);
            self.entries = self.options.priority_model.order_by_score(
                entries,
                |entry| entry.item.priority,
                rng,
            );
        } else {
            self.entries.shuffle(rng);
        }
    }

    fn ensure_selection(&self) -> Result<(), OrganizerError> {
        if self.entries.iter().any(|entry| entry.selected) {
            Ok(())
        } else {
            Err(OrganizerError::NothingSelected)
        }
    }

    fn selected_rows(&self) -> Result<Vec<usize>, OrganizerError> {
        let rows: Vec<usize> = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.selected)
            .map(|(row, _)| row)
            .collect();
        if rows.is_empty() {
            return Err(OrganizerError::NothingSelected);
        }
        Ok(rows)
    }

    fn load(&mut self, items: Vec<QueueItem>, selected: &HashSet<CardId>) {
        let width = (items.len() + 1).to_string().len();
        let mut entries = Vec::with_capacity(items.len());
        for (index, item) in items.into_iter().enumerate() {
            let info = if self.options.prio_enabled {
                item.priority.map(|p| p.to_string()).unwrap_or_default()
            } else {
                format!("{:0width$}", index + 1)
            };
            let title = plain_title(&item.title);
            let label = match render_label(&self.options.format, &info, &title) {
                Ok(label) => label,
                Err(err) => {
                    warn!(
                        "event=organizer_label module=organizer status=error card={} error={}",
                        item.card_id, err
                    );
                    self.warnings.push(format!("Invalid organizer format: {err}"));
                    title
                }
            };
            entries.push(OrganizerEntry {
                selected: selected.contains(&item.card_id),
                item,
                label,
            });
        }
        self.entries = entries;
    }
}

/// Title text with markup removed and whitespace collapsed.
pub fn plain_title(raw: &str) -> String {
    let without_tags = HTML_TAG_RE.replace_all(raw, " ");
    let decoded = without_tags
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");
    WHITESPACE_RE.replace_all(&decoded, " ").trim().to_string()
}

/// Template rendering failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelFormatError {
    UnknownField(String),
    /// Unbalanced `{` or `}`.
    Malformed(String),
}

impl Display for LabelFormatError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownField(name) => write!(f, "unknown field `{name}`"),
            Self::Malformed(template) => write!(f, "unbalanced braces in `{template}`"),
        }
    }
}

impl Error for LabelFormatError {}

/// Renders an organizer label template.
///
/// Supports `{info}`, `{title}` and `{{`/`}}` escapes.
pub fn render_label(template: &str, info: &str, title: &str) -> Result<String, LabelFormatError> {
    let mut rendered = String::with_capacity(template.len() + title.len());
    let mut chars = template.chars().peekable();

    while let Some(ch) = chars.next() {
        match ch {
            '{' if chars.peek() == Some(&'{') => {
                chars.next();
                rendered.push('{');
            }
            '{' => {
                let mut name = String::new();
                loop {
                    match chars.next() {
                        Some('}') => break,
                        Some('{') | None => {
                            return Err(LabelFormatError::Malformed(template.to_string()))
                        }
                        Some(other) => name.push(other),
                    }
                }
                match name.as_str() {
                    "info" => rendered.push_str(info),
                    "title" => rendered.push_str(title),
                    _ => return Err(LabelFormatError::UnknownField(name)),
                }
            }
            '}' if chars.peek() == Some(&'}') => {
                chars.next();
                rendered.push('}');
            }
            '}' => return Err(LabelFormatError::Malformed(template.to_string())),
            other => rendered.push(other),
        }
    }

    Ok(rendered)
}
