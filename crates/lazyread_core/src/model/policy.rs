//! Repositioning policies keyed by review outcome.
//!
//! # Responsibility
//! - Describe how an outcome translates into a target queue position.
//! - Keep the outcome dispatch an explicit finite mapping.
//!
//! # Invariants
//! - Percent values are finite and non-negative.
//! - Positions handed to the queue are 1-based and never below 1.

use crate::model::outcome::Outcome;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// How the target position is derived.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Target {
    /// Share of the deck's active card count, in percent.
    Percent(f64),
    /// Absolute 1-based position.
    Count(u32),
}

impl Target {
    /// Builds a percent target, rejecting negative or non-finite values.
    pub fn percent(value: f64) -> Result<Self, PolicyError> {
        if !value.is_finite() || value < 0.0 {
            return Err(PolicyError::InvalidPercent(value));
        }
        Ok(Self::Percent(value))
    }

    /// Builds a count target from a configured number.
    pub fn count(value: f64) -> Result<Self, PolicyError> {
        if !value.is_finite() || value < 0.0 || value.fract() != 0.0 || value > f64::from(u32::MAX)
        {
            return Err(PolicyError::InvalidCount(value));
        }
        Ok(Self::Count(value as u32))
    }
}

/// Rule for one repositioning outcome.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Policy {
    pub target: Target,
    /// Perturb the base position with `Normal(base, base / 10)`.
    pub jitter: bool,
}

impl Policy {
    pub fn new(target: Target, jitter: bool) -> Self {
        Self { target, jitter }
    }

    /// Unperturbed position for a deck holding `total_active` cards.
    ///
    /// Percent targets are rounded to the nearest whole position.
    pub fn base_position(&self, total_active: usize) -> f64 {
        match self.target {
            Target::Percent(value) => (total_active as f64 * value / 100.0).round(),
            Target::Count(value) => f64::from(value),
        }
    }
}

/// What the scheduler does for one outcome.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OutcomeRule {
    Reposition(Policy),
    /// Move the card to position 1 and open the organizer.
    ManualReorder,
}

/// Finite outcome -> rule mapping.
///
/// Outcomes without an entry are passed through to the host untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PolicyTable {
    rules: BTreeMap<Outcome, OutcomeRule>,
}

impl PolicyTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the rule for `outcome`, returning the one it replaces.
    pub fn insert(&mut self, outcome: Outcome, rule: OutcomeRule) -> Option<OutcomeRule> {
        self.rules.insert(outcome, rule)
    }

    pub fn remove(&mut self, outcome: Outcome) -> Option<OutcomeRule> {
        self.rules.remove(&outcome)
    }

    pub fn rule(&self, outcome: Outcome) -> Option<&OutcomeRule> {
        self.rules.get(&outcome)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

/// Rounds a sampled position and clamps it into the valid 1-based range.
pub fn clamp_position(raw: f64) -> usize {
    if !raw.is_finite() {
        return 1;
    }
    let rounded = raw.round();
    if rounded < 1.0 {
        1
    } else {
        rounded as usize
    }
}

/// Invalid policy definition.
#[derive(Debug, Clone, PartialEq)]
pub enum PolicyError {
    InvalidPercent(f64),
    InvalidCount(f64),
}

impl Display for PolicyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidPercent(value) => {
                write!(f, "percent target must be finite and >= 0, got {value}")
            }
            Self::InvalidCount(value) => {
                write!(f, "count target must be a whole number >= 0, got {value}")
            }
        }
    }
}

impl Error for PolicyError {}
