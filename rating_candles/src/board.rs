//! One aggregation run: stored series → (reuse | fetch → aggregate → merge) →
//! chronological order → stored series.
//!
//! A failure while the game stream is being consumed discards the whole run:
//! the stored file is left untouched and nothing aggregated so far is kept,
//! since an interrupted stream never delivered the first games of its oldest day.

use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use futures::StreamExt;
use tracing::{debug, info, warn};

use crate::{
    aggregator::DayAggregator,
    errors::Error,
    io::sink::{DataSink, SeriesKey},
    models::{
        day_bar::DayBar, perf_type::PerfType, request_params::GamesRequestParams, series::Series,
    },
    providers::{GameProvider, ObservationStream, ProviderError},
};

/// What the caller asked for.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub user: String,
    pub perf_type: PerfType,
    /// Upper bound on games fetched.
    pub max: Option<u32>,
    /// Refetch even when a stored series exists.
    pub update: bool,
}

impl RunOptions {
    pub fn new(user: impl Into<String>, perf_type: PerfType) -> Self {
        Self {
            user: user.into(),
            perf_type,
            max: None,
            update: false,
        }
    }
}

#[derive(Debug)]
pub struct RunOutcome<O> {
    /// The full series, chronological.
    pub series: Series,
    /// Sink output (e.g. the file written); `None` when the stored series was reused.
    pub saved: Option<O>,
    /// Games consumed from the provider.
    pub games: usize,
    /// Bars produced by this run.
    pub days: usize,
}

/// Bars from one fully consumed stream, newest first.
#[derive(Debug, Default)]
pub struct Aggregated {
    pub bars: Vec<DayBar>,
    pub games: usize,
}

/// Drains `stream` through a [`DayAggregator`], flushing at the end.
///
/// The first error aborts and is returned; bars finalized before it are dropped.
pub async fn aggregate_stream(mut stream: ObservationStream) -> Result<Aggregated, ProviderError> {
    let mut aggregator = DayAggregator::new();
    let mut out = Aggregated::default();

    while let Some(observation) = stream.next().await {
        let observation = observation?;
        out.games += 1;
        if let Some(bar) = aggregator.ingest(observation) {
            out.bars.push(bar);
        }
    }
    out.bars.extend(aggregator.flush());

    debug!(games = out.games, days = out.bars.len(), "stream aggregated");
    Ok(out)
}

pub struct RatingBoard<P, S> {
    provider: P,
    sink: S,
    time_zone: Tz,
}

impl<P, S> RatingBoard<P, S>
where
    P: GameProvider,
    S: DataSink,
{
    /// `time_zone` must be the one the provider buckets days in; it is used to
    /// turn the last stored day back into an instant for incremental fetches.
    pub fn new(provider: P, sink: S, time_zone: Tz) -> Self {
        Self {
            provider,
            sink,
            time_zone,
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Returns the series for `opts`, fetching and persisting it when needed.
    ///
    /// Without `update`, a non-empty stored series is returned as is. With
    /// `update`, only games since the start of the last stored day are fetched;
    /// that day is rebuilt and replaces the stored bar.
    /// When `opts.max` games were received, the oldest fetched day is left out.
    pub async fn build_series(&self, opts: &RunOptions) -> Result<RunOutcome<S::Output>, Error> {
        let key = SeriesKey::new(opts.user.clone(), opts.perf_type);
        let mut series = self.sink.read(&key).await?;

        if !opts.update && !series.is_empty() {
            info!(
                user = %key.user_id(),
                perf = %opts.perf_type,
                days = series.len(),
                "using stored series; update to refetch"
            );
            series.finalize_order();
            return Ok(RunOutcome {
                series,
                saved: None,
                games: 0,
                days: 0,
            });
        }

        let mut params = GamesRequestParams::new(opts.user.clone(), opts.perf_type);
        params.max = opts.max;
        params.since = series
            .latest_date()
            .and_then(|day| self.start_of_day(day));

        let stream = self.provider.fetch_games(params).await?;
        let Aggregated { mut bars, games } = aggregate_stream(stream).await?;

        // A reached `max` may have cut the oldest fetched day short, leaving it
        // without its first game and so with a wrong open. It is never saved;
        // a stored bar for that date, if any, stays.
        let limit_reached = opts.max.is_some_and(|max| games >= max as usize);
        if limit_reached {
            if let Some(cut) = bars.pop() {
                warn!(
                    date = %cut.date(),
                    stored = series.get(cut.date()).is_some(),
                    "game limit reached; dropping the oldest fetched day"
                );
                if let Some(last_stored) = series.latest_date().filter(|d| *d < cut.date()) {
                    warn!(
                        %last_stored,
                        first_kept = ?bars.last().map(DayBar::date),
                        "days after the last stored day were not fully fetched; raise the game limit to cover them"
                    );
                }
            }
        }

        let days = bars.len();
        for bar in bars {
            series.merge(bar);
        }
        series.finalize_order();

        let saved = self.sink.write(&key, &series).await?;
        info!(games, days, total_days = series.len(), "series updated");

        Ok(RunOutcome {
            series,
            saved: Some(saved),
            games,
            days,
        })
    }

    fn start_of_day(&self, day: NaiveDate) -> Option<chrono::DateTime<Utc>> {
        self.time_zone
            .from_local_datetime(&day.and_time(NaiveTime::MIN))
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
    }
}
