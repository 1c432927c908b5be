//! Date-keyed collection of finalized [`DayBar`]s for one player and category.
//!
//! During an aggregation run bars arrive newest first, so the map is built
//! backwards and [`Series::finalize_order`] must be called once before the
//! series is persisted or plotted.

use std::path::Path;

use chrono::NaiveDate;
use indexmap::IndexMap;

use crate::{
    io::csv_store::{self, PersistenceError},
    models::day_bar::DayBar,
};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Series {
    bars: IndexMap<NaiveDate, DayBar>,
}

impl Series {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts `bar`, replacing any bar already stored for the same date.
    ///
    /// A replaced date keeps its current position; new dates are appended.
    pub fn merge(&mut self, bar: DayBar) {
        self.bars.insert(bar.date(), bar);
    }

    /// Sorts the bars ascending by date.
    pub fn finalize_order(&mut self) {
        self.bars.sort_unstable_keys();
    }

    /// True when dates are strictly ascending.
    pub fn is_chronological(&self) -> bool {
        self.bars
            .keys()
            .zip(self.bars.keys().skip(1))
            .all(|(a, b)| a < b)
    }

    pub fn get(&self, date: NaiveDate) -> Option<&DayBar> {
        self.bars.get(&date)
    }

    pub fn first(&self) -> Option<&DayBar> {
        self.bars.first().map(|(_, bar)| bar)
    }

    pub fn last(&self) -> Option<&DayBar> {
        self.bars.last().map(|(_, bar)| bar)
    }

    /// Latest date present, regardless of the current ordering.
    pub fn latest_date(&self) -> Option<NaiveDate> {
        self.bars.keys().max().copied()
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.bars.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DayBar> {
        self.bars.values()
    }

    /// Reads a persisted series. A missing file yields an empty series.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        csv_store::read_series(path.as_ref())
    }

    /// Writes the series in its current order, creating parent directories.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), PersistenceError> {
        csv_store::write_series(self, path.as_ref())
    }
}

impl Extend<DayBar> for Series {
    fn extend<T: IntoIterator<Item = DayBar>>(&mut self, iter: T) {
        for bar in iter {
            self.merge(bar);
        }
    }
}

impl FromIterator<DayBar> for Series {
    fn from_iter<T: IntoIterator<Item = DayBar>>(iter: T) -> Self {
        let mut series = Series::new();
        series.extend(iter);
        series
    }
}

impl<'a> IntoIterator for &'a Series {
    type Item = &'a DayBar;
    type IntoIter = indexmap::map::Values<'a, NaiveDate, DayBar>;

    fn into_iter(self) -> Self::IntoIter {
        self.bars.values()
    }
}
