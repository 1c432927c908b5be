//! Streaming reduction of rating observations into daily bars.
//!
//! # Delivery order
//!
//! Observations **must** be ingested newest first: days in descending order,
//! and games within a day in descending time order. That is the order the
//! rating service streams a player's games, and the `open` resolution below
//! depends on it. If a provider ever delivers chronological order, every
//! `open` silently becomes the day's last pre-game rating instead of its
//! first.
//!
//! The aggregator holds a single pending day. An observation for the pending
//! day is folded into it; an observation for another day finalizes the
//! pending bar (emitted) and starts a new one. [`DayAggregator::flush`] emits
//! whatever is still pending once the stream is exhausted and must be called,
//! or the oldest day of the run is lost.

use chrono::NaiveDate;
use tracing::{debug, info};

use crate::models::{
    day_bar::DayBar,
    observation::{Observation, Rating},
};

/// The day currently being accumulated.
///
/// `open` is provisional: every fold overwrites it with the folded
/// observation's `rating_before`. Because the last observation folded for a
/// day is the chronologically first game, the value left when the day is
/// finalized is the day's true open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingDay {
    date: NaiveDate,
    open: Rating,
    high: Rating,
    low: Rating,
    close: Rating,
    volume: u32,
}

impl PendingDay {
    /// Seeds every field from the first-delivered (chronologically last) game,
    /// so no sentinel bounds on ratings are needed.
    fn start(obs: &Observation) -> Self {
        Self {
            date: obs.date,
            open: obs.rating_before,
            high: obs.max_rating(),
            low: obs.min_rating(),
            close: obs.rating_after,
            volume: 1,
        }
    }

    fn fold(&mut self, obs: &Observation) {
        debug_assert_eq!(self.date, obs.date);
        self.high = self.high.max(obs.max_rating());
        self.low = self.low.min(obs.min_rating());
        self.volume += 1;
        self.open = obs.rating_before;
    }

    fn finalize(self) -> DayBar {
        DayBar::from_parts(
            self.date, self.open, self.high, self.low, self.close, self.volume,
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum PendingSlot {
    #[default]
    Empty,
    Accumulating(PendingDay),
}

/// Turns a newest-first stream of [`Observation`]s into newest-first [`DayBar`]s.
#[derive(Debug, Default)]
pub struct DayAggregator {
    slot: PendingSlot,
}

impl DayAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Date of the day being accumulated, if any.
    pub fn pending_date(&self) -> Option<NaiveDate> {
        match &self.slot {
            PendingSlot::Empty => None,
            PendingSlot::Accumulating(day) => Some(day.date),
        }
    }

    /// Folds one observation in. Returns the previous day's finalized bar when
    /// `observation` starts a new day.
    #[must_use = "a returned bar is finalized and will not be produced again"]
    pub fn ingest(&mut self, observation: Observation) -> Option<DayBar> {
        match &mut self.slot {
            PendingSlot::Accumulating(day) if day.date == observation.date => {
                day.fold(&observation);
                None
            }
            PendingSlot::Accumulating(day) => {
                let finished = day.finalize();
                debug!(?finished, "finalized day");
                info!("Started computing day {}", observation.date);
                self.slot = PendingSlot::Accumulating(PendingDay::start(&observation));
                Some(finished)
            }
            PendingSlot::Empty => {
                info!("Started computing day {}", observation.date);
                self.slot = PendingSlot::Accumulating(PendingDay::start(&observation));
                None
            }
        }
    }

    /// Finalizes and returns the pending day, leaving the aggregator empty.
    ///
    /// Call once after the last [`ingest`](Self::ingest). Calling it again, or
    /// on an aggregator that never saw an observation, returns `None`.
    #[must_use = "the flushed bar is the oldest day of the run"]
    pub fn flush(&mut self) -> Option<DayBar> {
        match std::mem::take(&mut self.slot) {
            PendingSlot::Empty => None,
            PendingSlot::Accumulating(day) => {
                let finished = day.finalize();
                debug!(?finished, "finalized day on flush");
                Some(finished)
            }
        }
    }
}

/// Runs a complete, infallible aggregation over `observations` (newest first)
/// and returns the bars newest first, flush included.
pub fn aggregate<I>(observations: I) -> Vec<DayBar>
where
    I: IntoIterator<Item = Observation>,
{
    let mut aggregator = DayAggregator::new();
    let mut bars: Vec<DayBar> = observations
        .into_iter()
        .filter_map(|obs| aggregator.ingest(obs))
        .collect();
    bars.extend(aggregator.flush());
    bars
}
