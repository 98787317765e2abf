//! Priority-weighted ordering.
//!
//! Each prioritized entry gets a continuous virtual position drawn from
//! `Normal(max_priority - priority, max_priority / 20)`; entries are sorted
//! ascending by it. Higher priority values therefore tend to come first,
//! and the small spread shuffles entries of equal priority.
//!
//! Entries without a priority score `+inf` and always sort last.

use rand::Rng;
use rand_distr::{Distribution, Normal};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriorityModel {
    max_priority: u32,
}

impl PriorityModel {
    pub fn new(max_priority: u32) -> Self {
        Self { max_priority }
    }

    /// Model for a configured list of priority labels.
    ///
    /// The highest priority is the last index of the list.
    pub fn from_labels(labels: &[String]) -> Self {
        let max_priority = u32::try_from(labels.len().saturating_sub(1)).unwrap_or(u32::MAX);
        Self::new(max_priority)
    }

    pub fn max_priority(&self) -> u32 {
        self.max_priority
    }

    /// Samples the virtual position of one entry.
    pub fn score<R: Rng + ?Sized>(&self, priority: Option<u32>, rng: &mut R) -> f64 {
        let Some(priority) = priority else {
            return f64::INFINITY;
        };
        let max = f64::from(self.max_priority);
        let mean = max - f64::from(priority);
        match Normal::new(mean, max / 20.0) {
            Ok(distribution) => distribution.sample(rng),
            Err(_) => mean,
        }
    }

    /// Reorders `entries` by freshly sampled scores.
    pub fn order_by_score<T, R: Rng + ?Sized>(
        &self,
        entries: Vec<T>,
        priority_of: impl Fn(&T) -> Option<u32>,
        rng: &mut R,
    ) -> Vec<T> {
        let mut scored: Vec<(f64, T)> = entries
            .into_iter()
            .map(|entry| (self.score(priority_of(&entry), rng), entry))
            .collect();
        scored.sort_by(|left, right| left.0.total_cmp(&right.0));
        scored.into_iter().map(|(_, entry)| entry).collect()
    }
}
