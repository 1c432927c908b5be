//! Finalized daily OHLCV bar.
//!
//! A [`DayBar`] only exists once its `open` is known, so "a bar with an
//! undefined open" cannot be represented. The in-progress accumulator lives in
//! [`crate::aggregator`].

use chrono::NaiveDate;
use snafu::{Snafu, ensure};

use crate::models::observation::Rating;

/// One calendar day of the player's rating trajectory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayBar {
    date: NaiveDate,
    open: Rating,
    high: Rating,
    low: Rating,
    close: Rating,
    volume: u32,
}

/// Raised when bar values read from outside the aggregator violate the OHLC invariants.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum InvalidBarError {
    #[snafu(display("bar {date}: volume must be at least 1"))]
    EmptyVolume { date: NaiveDate },

    #[snafu(display("bar {date}: low {low} / high {high} do not bracket open {open} and close {close}"))]
    OutOfRange {
        date: NaiveDate,
        open: Rating,
        high: Rating,
        low: Rating,
        close: Rating,
    },
}

impl DayBar {
    /// Builds a bar, checking `low <= min(open, close)`, `high >= max(open, close)`
    /// and `volume >= 1`.
    pub fn new(
        date: NaiveDate,
        open: Rating,
        high: Rating,
        low: Rating,
        close: Rating,
        volume: u32,
    ) -> Result<Self, InvalidBarError> {
        ensure!(volume >= 1, EmptyVolumeSnafu { date });
        ensure!(
            low <= open.min(close) && high >= open.max(close),
            OutOfRangeSnafu {
                date,
                open,
                high,
                low,
                close
            }
        );
        Ok(Self {
            date,
            open,
            high,
            low,
            close,
            volume,
        })
    }

    /// Used by the aggregator, whose folding rules already uphold the invariants.
    pub(crate) fn from_parts(
        date: NaiveDate,
        open: Rating,
        high: Rating,
        low: Rating,
        close: Rating,
        volume: u32,
    ) -> Self {
        debug_assert!(volume >= 1);
        debug_assert!(low <= open.min(close) && high >= open.max(close));
        Self {
            date,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn open(&self) -> Rating {
        self.open
    }

    pub fn high(&self) -> Rating {
        self.high
    }

    pub fn low(&self) -> Rating {
        self.low
    }

    pub fn close(&self) -> Rating {
        self.close
    }

    /// Number of games played that day.
    pub fn volume(&self) -> u32 {
        self.volume
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 3).unwrap()
    }

    #[test]
    fn accepts_consistent_values() {
        let bar = DayBar::new(day(), 1480, 1512, 1480, 1512, 2).unwrap();
        assert_eq!(bar.open(), 1480);
        assert_eq!(bar.volume(), 2);
    }

    #[test]
    fn rejects_zero_volume() {
        let err = DayBar::new(day(), 1500, 1500, 1500, 1500, 0).unwrap_err();
        assert!(matches!(err, InvalidBarError::EmptyVolume { .. }));
    }

    #[test]
    fn rejects_low_above_open() {
        let err = DayBar::new(day(), 1400, 1512, 1480, 1512, 2).unwrap_err();
        assert!(err.to_string().contains("do not bracket"));
    }
}
