use thiserror::Error;

use crate::{io::csv_store::PersistenceError, providers::ProviderError};

/// The unified error type for the `rating_candles` crate.
#[derive(Debug, Error)]
pub enum Error {
    /// Fetching or resolving games failed; see [`ProviderError`].
    #[error("Fetch error: {0}")]
    Fetch(#[from] ProviderError),

    /// Reading or writing the stored series failed.
    #[error("Persistence error: {0}")]
    Persistence(#[from] PersistenceError),
}

impl Error {
    /// True when a game record could not be resolved to the tracked player.
    pub fn is_malformed_observation(&self) -> bool {
        matches!(self, Error::Fetch(e) if e.is_malformed_observation())
    }
}
