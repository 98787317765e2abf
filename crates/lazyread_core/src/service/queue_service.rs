//! Ordered deck queue: snapshots, repositioning and explicit reorders.
//!
//! # Responsibility
//! - Compute new total orders from a fresh snapshot.
//! - Commit orders through the store as one reset + write unit.
//! - Serialize commits per deck.
//!
//! # Invariants
//! - Every commit is a permutation of the deck's current active set.
//! - Snapshot, computation and commit for one deck happen under that deck's
//!   lock, so two commits for the same deck never interleave.

use crate::model::item::{AnsweredCard, CardId, DeckId, QueueItem};
use crate::repo::queue_repo::{QueueStore, RepoError};
use log::{info, warn};
use std::collections::{HashMap, HashSet};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex, PoisonError};

/// Errors from queue operations.
#[derive(Debug)]
pub enum QueueError {
    /// The deck has no active managed cards.
    EmptyQueue(DeckId),
    /// The card is not part of the deck's active set.
    ItemNotInQueue { card_id: CardId, deck_id: DeckId },
    /// Explicit order is not a permutation of the active set.
    MembershipMismatch(MembershipMismatch),
    /// Store-level failure. Nothing was persisted.
    Store(RepoError),
}

impl Display for QueueError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyQueue(deck_id) => write!(f, "deck {deck_id} has no active cards"),
            Self::ItemNotInQueue { card_id, deck_id } => {
                write!(f, "card {card_id} is not active in deck {deck_id}")
            }
            Self::MembershipMismatch(mismatch) => write!(f, "{mismatch}"),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for QueueError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for QueueError {
    fn from(value: RepoError) -> Self {
        Self::Store(value)
    }
}

/// Difference between a proposed order and the active set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MembershipMismatch {
    /// Active cards absent from the proposed order.
    pub missing: Vec<CardId>,
    /// Proposed cards that are not active in the deck.
    pub unexpected: Vec<CardId>,
    /// Cards listed more than once.
    pub duplicates: Vec<CardId>,
}

impl MembershipMismatch {
    pub fn is_empty(&self) -> bool {
        self.missing.is_empty() && self.unexpected.is_empty() && self.duplicates.is_empty()
    }
}

impl Display for MembershipMismatch {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "order does not match active cards: {} missing, {} unexpected, {} duplicated",
            self.missing.len(),
            self.unexpected.len(),
            self.duplicates.len()
        )
    }
}

/// Checks that `proposed` holds exactly the ids of `current`, once each.
pub fn validate_membership(
    current: &[CardId],
    proposed: &[CardId],
) -> Result<(), MembershipMismatch> {
    let current_set: HashSet<CardId> = current.iter().copied().collect();
    let mut proposed_set = HashSet::with_capacity(proposed.len());
    let mut mismatch = MembershipMismatch::default();

    for id in proposed {
        if !proposed_set.insert(*id) {
            if !mismatch.duplicates.contains(id) {
                mismatch.duplicates.push(*id);
            }
        } else if !current_set.contains(id) {
            mismatch.unexpected.push(*id);
        }
    }
    mismatch.missing = current
        .iter()
        .filter(|id| !proposed_set.contains(*id))
        .copied()
        .collect();

    if mismatch.is_empty() {
        Ok(())
    } else {
        Err(mismatch)
    }
}

/// Moves `card_id` to the 1-based `target` position of `order`.
///
/// Targets past the end land on the tail; `0` behaves like `1`.
/// Returns `None` when `card_id` is not in `order`.
pub fn reposition_order(order: &[CardId], card_id: CardId, target: usize) -> Option<Vec<CardId>> {
    let current = order.iter().position(|id| *id == card_id)?;
    let mut next = order.to_vec();
    next.remove(current);
    let index = target.saturating_sub(1).min(next.len());
    next.insert(index, card_id);
    Some(next)
}

/// Per-deck commit lock registry.
///
/// Share one registry (via `Arc`) between every queue handle that can write
/// the same store. Entries of decks nobody is committing are dropped on the
/// next lookup, so the map stays as small as the set of busy decks.
#[derive(Debug, Default)]
pub struct CommitLocks {
    decks: Mutex<HashMap<DeckId, Arc<Mutex<()>>>>,
}

impl CommitLocks {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, deck_id: DeckId) -> Arc<Mutex<()>> {
        let mut decks = self.decks.lock().unwrap_or_else(PoisonError::into_inner);
        // Only the map holds an idle lock.
        decks.retain(|_, lock| Arc::strong_count(lock) > 1);
        Arc::clone(decks.entry(deck_id).or_default())
    }

    /// Number of decks with a registered lock.
    pub fn tracked_decks(&self) -> usize {
        self.decks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Runs `op` while holding the lock of `deck_id`.
    pub fn with_deck<T>(&self, deck_id: DeckId, op: impl FnOnce() -> T) -> T {
        let lock = self.lock_for(deck_id);
        // Poisoning is ignored: the guard protects no data.
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        op()
    }
}

/// Result of a committed reposition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Repositioned {
    /// Computed 1-based position, never below 1.
    ///
    /// May exceed `total`; the card then sits at the tail.
    pub position: usize,
    /// Number of active cards in the deck.
    pub total: usize,
}

/// Ordered queue facade over a `QueueStore`.
pub struct OrderedQueue<S: QueueStore> {
    store: S,
    locks: Arc<CommitLocks>,
}

impl<S: QueueStore> OrderedQueue<S> {
    /// Creates a queue with its own lock registry.
    pub fn new(store: S) -> Self {
        Self::with_locks(store, Arc::new(CommitLocks::new()))
    }

    /// Creates a queue sharing an existing lock registry.
    pub fn with_locks(store: S, locks: Arc<CommitLocks>) -> Self {
        Self { store, locks }
    }

    pub fn locks(&self) -> &Arc<CommitLocks> {
        &self.locks
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Current committed order of the deck's active cards.
    pub fn snapshot(&self, deck_id: DeckId) -> Result<Vec<QueueItem>, QueueError> {
        Ok(self.store.query_active_items(deck_id)?)
    }

    pub fn snapshot_ids(&self, deck_id: DeckId) -> Result<Vec<CardId>, QueueError> {
        Ok(self
            .snapshot(deck_id)?
            .into_iter()
            .map(|item| item.card_id)
            .collect())
    }

    /// Moves `card` to the 1-based `target` position and commits.
    pub fn reposition(
        &self,
        card: AnsweredCard,
        target: usize,
    ) -> Result<Repositioned, QueueError> {
        self.reposition_by(card, |_| target)
    }

    /// Moves `card` to a position derived from the fresh active count.
    ///
    /// `target_for` runs under the deck lock with the number of active cards
    /// read immediately before, and returns a 1-based position.
    pub fn reposition_by(
        &self,
        card: AnsweredCard,
        target_for: impl FnOnce(usize) -> usize,
    ) -> Result<Repositioned, QueueError> {
        self.locks.with_deck(card.deck_id, || {
            let order = self.snapshot_ids(card.deck_id)?;
            if order.is_empty() {
                return Err(QueueError::EmptyQueue(card.deck_id));
            }

            let total = order.len();
            let target = target_for(total);
            let next = reposition_order(&order, card.card_id, target).ok_or(
                QueueError::ItemNotInQueue {
                    card_id: card.card_id,
                    deck_id: card.deck_id,
                },
            )?;
            let position = target.max(1);

            self.commit_locked(card.deck_id, &next)?;
            info!(
                "event=queue_reposition module=queue status=ok deck={} position={} total={}",
                card.deck_id, position, total
            );
            Ok(Repositioned { position, total })
        })
    }

    /// Commits `explicit_order` verbatim after validating its membership.
    pub fn reorder(&self, deck_id: DeckId, explicit_order: &[CardId]) -> Result<(), QueueError> {
        self.locks.with_deck(deck_id, || {
            let current = self.snapshot_ids(deck_id)?;
            if let Err(mismatch) = validate_membership(&current, explicit_order) {
                warn!(
                    "event=queue_reorder module=queue status=error deck={} missing={} unexpected={} duplicates={}",
                    deck_id,
                    mismatch.missing.len(),
                    mismatch.unexpected.len(),
                    mismatch.duplicates.len()
                );
                return Err(QueueError::MembershipMismatch(mismatch));
            }

            self.commit_locked(deck_id, explicit_order)?;
            info!(
                "event=queue_reorder module=queue status=ok deck={} cards={}",
                deck_id,
                explicit_order.len()
            );
            Ok(())
        })
    }

    fn commit_locked(&self, deck_id: DeckId, order: &[CardId]) -> Result<(), QueueError> {
        self.store.commit_scoped(order).map_err(|err| {
            warn!(
                "event=queue_commit module=queue status=error deck={} error={}",
                deck_id, err
            );
            QueueError::Store(err)
        })
    }
}
