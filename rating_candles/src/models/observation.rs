//! One rating change of the tracked player, already reduced to a calendar day.

use chrono::NaiveDate;

/// A rating value as reported by the rating service. Signed, since deltas are.
pub type Rating = i32;

/// The tracked player's rating before and after a single game.
///
/// Resolving which side of a game belongs to the player, and truncating the
/// game timestamp to a day, happens before an `Observation` is built; see
/// [`crate::providers::lichess::response::LichessGame::resolve`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation {
    /// Calendar day the game counts towards.
    pub date: NaiveDate,
    /// Rating entering the game.
    pub rating_before: Rating,
    /// Rating leaving the game (`rating_before + rating_diff`).
    pub rating_after: Rating,
}

impl Observation {
    pub fn new(date: NaiveDate, rating_before: Rating, rating_after: Rating) -> Self {
        Self {
            date,
            rating_before,
            rating_after,
        }
    }

    /// Builds an observation from a starting rating and a (possibly absent) delta.
    /// An absent delta counts as zero. `None` if the resulting rating overflows.
    pub fn from_diff(date: NaiveDate, rating_before: Rating, rating_diff: Option<Rating>) -> Option<Self> {
        let rating_after = rating_before.checked_add(rating_diff.unwrap_or(0))?;
        Some(Self::new(date, rating_before, rating_after))
    }

    pub(crate) fn min_rating(&self) -> Rating {
        self.rating_before.min(self.rating_after)
    }

    pub(crate) fn max_rating(&self) -> Rating {
        self.rating_before.max(self.rating_after)
    }
}
