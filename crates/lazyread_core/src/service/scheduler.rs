//! Review-answer scheduling.
//!
//! # Responsibility
//! - Translate a review outcome into a target queue position.
//! - Apply optional Gaussian jitter and commit through `OrderedQueue`.
//! - Decide when the host's own answer handling runs.
//!
//! # Invariants
//! - Positions are computed from the active count read under the deck lock.
//! - Final positions are never below 1.
//! - Outcomes without a rule never touch the queue.

use crate::model::item::{AnsweredCard, DeckId};
use crate::model::outcome::Outcome;
use crate::model::policy::{clamp_position, OutcomeRule, Policy, PolicyTable};
use crate::repo::queue_repo::QueueStore;
use crate::service::queue_service::{OrderedQueue, QueueError};
use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};
use std::sync::{Mutex, PoisonError};

/// User-visible, non-fatal message produced by an answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub message: String,
}

impl Notice {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// What an answer did to the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerEffect {
    /// Policy outcome committed. `position` is the computed target; past
    /// the end of the deck the card sits at the tail.
    Repositioned {
        outcome: Outcome,
        position: usize,
        notice: Option<Notice>,
    },
    /// Priority mode: card appended to the tail.
    MovedToTail { position: usize },
    /// Card is next in line; the caller should open the organizer.
    OpenOrganizer { deck_id: DeckId },
    /// No rule applies; the host fallback handled the answer.
    PassThrough,
    /// Nothing to position.
    Skipped { notice: Notice },
}

impl AnswerEffect {
    pub fn notice(&self) -> Option<&Notice> {
        match self {
            Self::Repositioned { notice, .. } => notice.as_ref(),
            Self::Skipped { notice } => Some(notice),
            _ => None,
        }
    }
}

/// Host interception point for review answers.
///
/// `next` is the host's own answer handling, called with the ease it
/// should record.
pub trait AnswerHook {
    fn on_answer(
        &self,
        card: AnsweredCard,
        ease: u8,
        next: &mut dyn FnMut(u8),
    ) -> Result<AnswerEffect, QueueError>;
}

/// Samples a jittered position around `base` with spread `base / 10`.
pub fn sample_jitter<R: Rng + ?Sized>(base: f64, rng: &mut R) -> f64 {
    match Normal::new(base, (base / 10.0).abs()) {
        Ok(distribution) => distribution.sample(rng),
        Err(_) => base,
    }
}

/// Outcome-driven scheduler over one queue.
pub struct Scheduler<S: QueueStore> {
    queue: OrderedQueue<S>,
    policies: PolicyTable,
    prio_enabled: bool,
    rng: Mutex<StdRng>,
}

impl<S: QueueStore> Scheduler<S> {
    pub fn new(queue: OrderedQueue<S>, policies: PolicyTable, prio_enabled: bool) -> Self {
        Self {
            queue,
            policies,
            prio_enabled,
            rng: Mutex::new(StdRng::from_rng(&mut rand::rng())),
        }
    }

    /// Replaces the jitter generator with a seeded one.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = Mutex::new(StdRng::seed_from_u64(seed));
        self
    }

    pub fn queue(&self) -> &OrderedQueue<S> {
        &self.queue
    }

    pub fn policies(&self) -> &PolicyTable {
        &self.policies
    }

    pub fn prio_enabled(&self) -> bool {
        self.prio_enabled
    }

    /// Handles one review answer on a managed card.
    ///
    /// Unknown ease codes and outcomes without a rule are handed to `next`
    /// unchanged. Policy outcomes call `next` with the host-clamped ease
    /// before repositioning.
    pub fn answer(
        &self,
        card: AnsweredCard,
        ease: u8,
        next: impl FnOnce(u8),
    ) -> Result<AnswerEffect, QueueError> {
        if self.prio_enabled {
            return self.move_to_tail(card);
        }

        let Some((outcome, rule)) = Outcome::from_code(ease)
            .and_then(|outcome| self.policies.rule(outcome).map(|rule| (outcome, *rule)))
        else {
            debug!("event=answer module=scheduler status=skip ease={ease} reason=no_rule");
            next(ease);
            return Ok(AnswerEffect::PassThrough);
        };

        match rule {
            OutcomeRule::ManualReorder => {
                let effect = self.queue.reposition(card, 1).map(|_| AnswerEffect::OpenOrganizer {
                    deck_id: card.deck_id,
                });
                skip_empty(effect, card.deck_id)
            }
            OutcomeRule::Reposition(policy) => {
                next(outcome.host_ease());
                self.apply_policy(card, outcome, policy)
            }
        }
    }

    /// Target position for `policy` in a deck of `total_active` cards.
    pub fn target_position(&self, policy: &Policy, total_active: usize) -> usize {
        let base = policy.base_position(total_active);
        let raw = if policy.jitter {
            let mut rng = self.rng.lock().unwrap_or_else(PoisonError::into_inner);
            sample_jitter(base, &mut *rng)
        } else {
            base
        };
        clamp_position(raw)
    }

    fn apply_policy(
        &self,
        card: AnsweredCard,
        outcome: Outcome,
        policy: Policy,
    ) -> Result<AnswerEffect, QueueError> {
        let effect = self
            .queue
            .reposition_by(card, |total| self.target_position(&policy, total))
            .map(|moved| {
                info!(
                    "event=answer module=scheduler status=ok outcome={:?} position={} total={} jitter={}",
                    outcome, moved.position, moved.total, policy.jitter
                );
                let notice = (outcome != Outcome::Extract)
                    .then(|| Notice::new(format!("Card moved to position {}", moved.position)));
                AnswerEffect::Repositioned {
                    outcome,
                    position: moved.position,
                    notice,
                }
            });
        skip_empty(effect, card.deck_id)
    }

    fn move_to_tail(&self, card: AnsweredCard) -> Result<AnswerEffect, QueueError> {
        let effect = self
            .queue
            .reposition_by(card, |total| total)
            .map(|moved| AnswerEffect::MovedToTail {
                position: moved.position,
            });
        skip_empty(effect, card.deck_id)
    }
}

impl<S: QueueStore> AnswerHook for Scheduler<S> {
    fn on_answer(
        &self,
        card: AnsweredCard,
        ease: u8,
        next: &mut dyn FnMut(u8),
    ) -> Result<AnswerEffect, QueueError> {
        self.answer(card, ease, |host_ease| next(host_ease))
    }
}

fn skip_empty(
    effect: Result<AnswerEffect, QueueError>,
    deck_id: DeckId,
) -> Result<AnswerEffect, QueueError> {
    match effect {
        Err(QueueError::EmptyQueue(_)) => {
            info!("event=answer module=scheduler status=skip deck={deck_id} reason=empty_deck");
            Ok(AnswerEffect::Skipped {
                notice: Notice::new("This deck has no active reading cards."),
            })
        }
        other => other,
    }
}
