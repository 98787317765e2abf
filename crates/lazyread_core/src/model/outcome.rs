//! Review outcomes ("eases") reported by the host reviewer.
//!
//! # Responsibility
//! - Map raw host ease codes onto a closed outcome enumeration.
//! - Provide the display data that has to stay in sync with scheduling:
//!   interval labels and the answer button set.
//!
//! # Invariants
//! - Codes are the host's button numbers and must never be renumbered.
//! - Unknown codes do not map to an outcome; callers pass them through.

use serde::{Deserialize, Serialize};

/// Highest ease the host reviewer understands natively.
pub const HOST_MAX_EASE: u8 = 4;

/// Outcome of one review action on a managed card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Card was just created from an extract; repositioned silently.
    Extract,
    Soon,
    Soonish,
    Later,
    MuchLater,
    /// Put the card next in line and hand over to the organizer.
    Custom,
    /// Push the card towards the end of the queue.
    Never,
}

impl Outcome {
    pub const ALL: [Outcome; 7] = [
        Outcome::Extract,
        Outcome::Soon,
        Outcome::Soonish,
        Outcome::Later,
        Outcome::MuchLater,
        Outcome::Custom,
        Outcome::Never,
    ];

    /// Resolves a raw host ease code.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Extract),
            1 => Some(Self::Soon),
            2 => Some(Self::Soonish),
            3 => Some(Self::Later),
            4 => Some(Self::MuchLater),
            6 => Some(Self::Custom),
            8 => Some(Self::Never),
            _ => None,
        }
    }

    /// Raw host ease code for this outcome.
    pub fn code(self) -> u8 {
        match self {
            Self::Extract => 0,
            Self::Soon => 1,
            Self::Soonish => 2,
            Self::Later => 3,
            Self::MuchLater => 4,
            Self::Custom => 6,
            Self::Never => 8,
        }
    }

    /// Ease forwarded to the host's own answer handling.
    pub fn host_ease(self) -> u8 {
        self.code().min(HOST_MAX_EASE)
    }

    /// Rough interval shown under the answer button.
    ///
    /// The values are fixed estimates; the queue position, not a date,
    /// decides when the card comes back.
    pub fn interval_label(self) -> &'static str {
        match self {
            Self::Soon => "1d",
            Self::Soonish => "2-4d",
            Self::Later => "8-12d",
            Self::MuchLater => "~20d",
            Self::Never => "Never",
            Self::Custom => "Custom",
            Self::Extract => "",
        }
    }
}

/// Interval label for a raw host code. Unknown codes render blank.
pub fn interval_label_for_code(code: u8) -> &'static str {
    Outcome::from_code(code).map_or("", Outcome::interval_label)
}

/// One answer button offered for a managed card.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnswerButton {
    pub code: u8,
    pub label: &'static str,
}

/// Buttons shown while reviewing a managed card.
///
/// Priority mode has a single "Next" button because the answer does not
/// influence the position.
pub fn answer_buttons(prio_enabled: bool) -> Vec<AnswerButton> {
    if prio_enabled {
        return vec![AnswerButton {
            code: Outcome::Soon.code(),
            label: "Next",
        }];
    }

    [
        (Outcome::Soon, "Soon"),
        (Outcome::Soonish, "Soonish"),
        (Outcome::Later, "Later"),
        (Outcome::MuchLater, "Much Later"),
        (Outcome::Custom, "6 Custom"),
        (Outcome::Never, "8 Never"),
    ]
    .into_iter()
    .map(|(outcome, label)| AnswerButton {
        code: outcome.code(),
        label,
    })
    .collect()
}
