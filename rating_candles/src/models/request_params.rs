use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::perf_type::PerfType;

/// Provider-agnostic parameters for fetching one player's rated games.
///
/// Every [`GameProvider`](crate::providers::GameProvider) must deliver the
/// matching games newest first; the day aggregator depends on it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GamesRequestParams {
    /// Player handle. Compared case-insensitively against the game records.
    pub user: String,

    /// Which rating category to fetch.
    pub perf_type: PerfType,

    /// Upper bound on the number of games returned, newest first.
    pub max: Option<u32>,

    /// Only games started at or after this instant.
    pub since: Option<DateTime<Utc>>,

    /// Restrict to rated games. Casual games do not move the rating.
    #[serde(default = "default_rated")]
    pub rated: bool,
}

fn default_rated() -> bool {
    true
}

impl GamesRequestParams {
    pub fn new(user: impl Into<String>, perf_type: PerfType) -> Self {
        Self {
            user: user.into(),
            perf_type,
            max: None,
            since: None,
            rated: true,
        }
    }

    /// The handle in the form the service uses for user ids.
    pub fn user_id(&self) -> String {
        self.user.trim().to_lowercase()
    }
}
