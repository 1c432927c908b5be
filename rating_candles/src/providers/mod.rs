//! Game sources.
//!
//! A [`GameProvider`] fetches one player's rated games for one category and
//! hands them over as a lazy stream of already-resolved [`Observation`]s.
//! Resolving which side of a game is the tracked player, truncating the
//! timestamp to a day and defaulting a missing rating delta all happen inside
//! the provider; the aggregator never sees raw records.
//!
//! Providers must deliver games **newest first** (see [`crate::aggregator`]).
//!
//! # Example
//!
//! ```rust
//! use async_trait::async_trait;
//! use futures::stream::{self, StreamExt};
//! use rating_candles::models::request_params::GamesRequestParams;
//! use rating_candles::providers::{GameProvider, ObservationStream, ProviderError};
//!
//! struct NoGames;
//!
//! #[async_trait]
//! impl GameProvider for NoGames {
//!     async fn fetch_games(
//!         &self,
//!         _params: GamesRequestParams,
//!     ) -> Result<ObservationStream, ProviderError> {
//!         Ok(stream::empty().boxed())
//!     }
//! }
//! ```

pub mod lichess;
pub mod ndjson;
pub mod retry;

use async_trait::async_trait;
use futures::stream::BoxStream;
use shared_utils::env::MissingEnvVarError;
use snafu::{Backtrace, Snafu};

use crate::models::{observation::Observation, request_params::GamesRequestParams};

/// Newest-first observations. The stream ends after the oldest matching game;
/// an `Err` item means the stream is broken and the run should be discarded.
pub type ObservationStream = BoxStream<'static, Result<Observation, ProviderError>>;

/// Trait for fetching a player's game history from a rating service.
#[async_trait]
pub trait GameProvider {
    /// Starts fetching the games described by `params`.
    ///
    /// Errors returned directly mean the request could not be started (after
    /// any retries). Errors yielded by the stream mean it broke part way; it
    /// cannot be resumed and a new fetch starts over.
    async fn fetch_games(&self, params: GamesRequestParams) -> Result<ObservationStream, ProviderError>;
}

/// Errors that can occur during the creation of a provider instance
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ProviderInitError {
    /// A credential was required but its environment variable is not set.
    #[snafu(display("Missing environment variable: {source}"))]
    MissingEnvVar {
        source: MissingEnvVarError,
        backtrace: Backtrace,
    },

    /// failed to init reqwest client
    #[snafu(display("Failed to build HTTP client: {source}"))]
    ClientBuild {
        source: reqwest::Error,
        backtrace: Backtrace,
    },

    /// Token contains characters that cannot go in a header.
    #[snafu(display("Invalid API token format: {source}"))]
    InvalidToken {
        source: reqwest::header::InvalidHeaderValue,
        backtrace: Backtrace,
    },

    #[snafu(display("Invalid base URL '{url}': {message}"))]
    InvalidBaseUrl {
        url: String,
        message: String,
        backtrace: Backtrace,
    },
}

/// Errors that can occur within a `GameProvider` implementation.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ProviderError {
    /// A game record could not be resolved to the tracked player's ratings.
    /// Never retried: it means the upstream data contract was broken.
    #[snafu(display("Malformed observation in game '{game_id}': {reason}; record: {record}"))]
    MalformedObservation {
        game_id: String,
        reason: String,
        record: String,
        backtrace: Backtrace,
    },

    /// A network failure (connect, timeout, broken body stream).
    #[snafu(display("API request failed: {source}"))]
    Transport {
        source: reqwest::Error,
        backtrace: Backtrace,
    },

    /// The service answered with a non-retryable error status.
    #[snafu(display("API error (HTTP {status}): {message}"))]
    Api {
        status: u16,
        message: String,
        backtrace: Backtrace,
    },

    /// Transient failures kept happening until the retry budget ran out.
    #[snafu(display("Giving up after {attempts} attempts; last failure: {last}"))]
    RetriesExhausted {
        attempts: u32,
        last: String,
        backtrace: Backtrace,
    },

    /// The request parameters were invalid for this specific provider.
    #[snafu(display("Invalid parameters for provider: {message}"))]
    Validation {
        message: String,
        backtrace: Backtrace,
    },

    /// An error during provider configuration or initialization.
    #[snafu(display("Provider initialization error: {source}"))]
    Init {
        #[snafu(backtrace)]
        source: ProviderInitError,
    },
}

impl ProviderError {
    pub fn is_malformed_observation(&self) -> bool {
        matches!(self, ProviderError::MalformedObservation { .. })
    }
}
