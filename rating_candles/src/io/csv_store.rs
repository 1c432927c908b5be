//! Tabular persistence of a [`Series`]: one CSV file, one row per day.
//!
//! ```text
//! Datetime,Open,High,Low,Close,Volume
//! 2024-01-02,1450,1480,1450,1480,1
//! 2024-01-03,1480,1512,1480,1512,2
//! ```
//!
//! Values are written as integers. Reading also accepts integral floats
//! (`1480.0`) and datetime-shaped dates (`2024-01-02 00:00:00`), which is what
//! dataframe libraries tend to emit for the same table.

use std::{
    fs::{self, File},
    io,
    path::{Path, PathBuf},
};

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, de};
use snafu::{Backtrace, ResultExt, Snafu};
use tracing::debug;

use crate::models::{day_bar::DayBar, observation::Rating, series::Series};

pub const HEADER: [&str; 6] = ["Datetime", "Open", "High", "Low", "Close", "Volume"];

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum PersistenceError {
    #[snafu(display("Failed to create directory {}: {source}", path.display()))]
    CreateDir {
        path: PathBuf,
        source: io::Error,
        backtrace: Backtrace,
    },

    #[snafu(display("Failed to open {}: {source}", path.display()))]
    Open {
        path: PathBuf,
        source: io::Error,
        backtrace: Backtrace,
    },

    #[snafu(display("Failed to write {}: {source}", path.display()))]
    Write {
        path: PathBuf,
        source: io::Error,
        backtrace: Backtrace,
    },

    #[snafu(display("CSV error in {}: {source}", path.display()))]
    Csv {
        path: PathBuf,
        source: csv::Error,
        backtrace: Backtrace,
    },

    /// The player handle cannot name a directory under the data dir.
    #[snafu(display("Invalid player handle '{user}': only letters, digits, '_' and '-' are allowed"))]
    InvalidHandle { user: String, backtrace: Backtrace },

    #[snafu(display("{} row {row}: {message}", path.display()))]
    Row {
        path: PathBuf,
        row: usize,
        message: String,
        backtrace: Backtrace,
    },
}

#[derive(Debug, Serialize, Deserialize)]
struct CsvRow {
    #[serde(rename = "Datetime", deserialize_with = "de_date")]
    date: NaiveDate,
    #[serde(rename = "Open", deserialize_with = "de_integral")]
    open: Rating,
    #[serde(rename = "High", deserialize_with = "de_integral")]
    high: Rating,
    #[serde(rename = "Low", deserialize_with = "de_integral")]
    low: Rating,
    #[serde(rename = "Close", deserialize_with = "de_integral")]
    close: Rating,
    #[serde(rename = "Volume", deserialize_with = "de_integral")]
    volume: u32,
}

impl From<&DayBar> for CsvRow {
    fn from(bar: &DayBar) -> Self {
        Self {
            date: bar.date(),
            open: bar.open(),
            high: bar.high(),
            low: bar.low(),
            close: bar.close(),
            volume: bar.volume(),
        }
    }
}

fn de_date<'de, D>(d: D) -> Result<NaiveDate, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(d)?;
    let day = raw.trim().split([' ', 'T']).next().unwrap_or_default();
    NaiveDate::parse_from_str(day, "%Y-%m-%d").map_err(de::Error::custom)
}

fn de_integral<'de, D, T>(d: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: TryFrom<i64>,
{
    let raw = String::deserialize(d)?;
    let raw = raw.trim();
    let value = match raw.parse::<i64>() {
        Ok(v) => v,
        Err(_) => {
            let f = raw
                .parse::<f64>()
                .map_err(|_| de::Error::custom(format!("'{raw}' is not a number")))?;
            if !f.is_finite() || f.fract() != 0.0 {
                return Err(de::Error::custom(format!("'{raw}' is not an integer")));
            }
            f as i64
        }
    };
    T::try_from(value).map_err(|_| de::Error::custom(format!("{value} is out of range")))
}

/// Reads the series stored at `path`. A missing file is "no prior data".
pub fn read_series(path: &Path) -> Result<Series, PersistenceError> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no stored series");
            return Ok(Series::new());
        }
        Err(e) => return Err(e).context(OpenSnafu { path }),
    };

    let mut reader = csv::Reader::from_reader(file);
    let mut series = Series::new();
    for (i, row) in reader.deserialize::<CsvRow>().enumerate() {
        let row = row.context(CsvSnafu { path })?;
        let bar = DayBar::new(row.date, row.open, row.high, row.low, row.close, row.volume)
            .map_err(|e| {
                RowSnafu {
                    path,
                    row: i + 1,
                    message: e.to_string(),
                }
                .build()
            })?;
        series.merge(bar);
    }
    debug!(path = %path.display(), days = series.len(), "loaded stored series");
    Ok(series)
}

/// Writes `series` in its current order. The file is written next to `path`
/// first and renamed into place, so a failed write leaves any previous file intact.
pub fn write_series(series: &Series, path: &Path) -> Result<(), PersistenceError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).context(CreateDirSnafu { path: parent })?;
    }

    let tmp = tmp_path(path);
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(&tmp)
        .context(CsvSnafu { path: &tmp })?;
    writer.write_record(HEADER).context(CsvSnafu { path: &tmp })?;
    for bar in series {
        writer
            .serialize(CsvRow::from(bar))
            .context(CsvSnafu { path: &tmp })?;
    }
    writer.flush().context(WriteSnafu { path: &tmp })?;
    drop(writer);

    fs::rename(&tmp, path).context(WriteSnafu { path })?;
    debug!(path = %path.display(), days = series.len(), "saved series");
    Ok(())
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}
