use std::path::PathBuf;

use async_trait::async_trait;

use snafu::ensure;

use crate::{
    io::csv_store::{self, InvalidHandleSnafu, PersistenceError},
    models::{perf_type::PerfType, series::Series},
};

/// Identifies one persisted series: a player and a rating category.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SeriesKey {
    pub user: String,
    pub perf_type: PerfType,
}

impl SeriesKey {
    pub fn new(user: impl Into<String>, perf_type: PerfType) -> Self {
        Self {
            user: user.into(),
            perf_type,
        }
    }

    /// Handles are case-insensitive, so `German11` and `german11` share a file.
    pub fn user_id(&self) -> String {
        self.user.trim().to_lowercase()
    }

    /// True when the handle uses the service's username alphabet
    /// (ASCII letters, digits, `_`, `-`), so it is safe as a path segment.
    pub fn has_valid_handle(&self) -> bool {
        let id = self.user_id();
        !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    }
}

#[async_trait]
pub trait DataSink {
    /// The type of output returned after a successful write operation.
    ///
    /// A file sink returns the path it wrote; other sinks may return a row count.
    type Output;

    /// Reads the series stored under `key`; an absent series reads as empty.
    async fn read(&self, key: &SeriesKey) -> Result<Series, PersistenceError>;

    /// Replaces the series stored under `key`.
    async fn write(&self, key: &SeriesKey, series: &Series) -> Result<Self::Output, PersistenceError>;
}

/// Stores each series as `<data_dir>/<user id>/<perfType>.csv`.
#[derive(Debug, Clone)]
pub struct CsvSink {
    data_dir: PathBuf,
}

impl CsvSink {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn path_for(&self, key: &SeriesKey) -> PathBuf {
        self.data_dir
            .join(key.user_id())
            .join(format!("{}.csv", key.perf_type))
    }

    fn checked_path(&self, key: &SeriesKey) -> Result<PathBuf, PersistenceError> {
        ensure!(key.has_valid_handle(), InvalidHandleSnafu { user: &key.user });
        Ok(self.path_for(key))
    }
}

#[async_trait]
impl DataSink for CsvSink {
    type Output = PathBuf;

    async fn read(&self, key: &SeriesKey) -> Result<Series, PersistenceError> {
        csv_store::read_series(&self.checked_path(key)?)
    }

    async fn write(&self, key: &SeriesKey, series: &Series) -> Result<PathBuf, PersistenceError> {
        let path = self.checked_path(key)?;
        csv_store::write_series(series, &path)?;
        Ok(path)
    }
}
