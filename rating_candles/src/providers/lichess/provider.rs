use std::time::Duration;

use async_trait::async_trait;
use chrono_tz::Tz;
use futures::StreamExt;
use reqwest::{Client, Response, Url, header};
use secrecy::{ExposeSecret, SecretString};
use snafu::{OptionExt, ResultExt, ensure};
use tracing::{info, warn};

use crate::{
    models::{observation::Observation, request_params::GamesRequestParams},
    providers::{
        ApiSnafu, ClientBuildSnafu, GameProvider, InvalidBaseUrlSnafu, InvalidTokenSnafu,
        MalformedObservationSnafu, ObservationStream, ProviderError, ProviderInitError,
        RetriesExhaustedSnafu, TransportSnafu, ValidationSnafu,
        lichess::{
            params::construct_params,
            response::{DayBoundary, LichessGame},
        },
        ndjson,
        retry::RetryPolicy,
    },
};

pub const DEFAULT_BASE_URL: &str = "https://lichess.org";

/// Everything about the lichess fetcher that is configuration rather than request.
#[derive(Debug, Clone)]
pub struct LichessSettings {
    pub base_url: String,
    pub connect_timeout: Duration,
    pub retry: RetryPolicy,
    /// Timezone whose calendar days bucket the games.
    pub time_zone: Tz,
    pub day_boundary: DayBoundary,
}

impl Default for LichessSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            connect_timeout: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            time_zone: Tz::UTC,
            day_boundary: DayBoundary::CreatedAt,
        }
    }
}

pub struct LichessProvider {
    client: Client,
    base_url: Url,
    retry: RetryPolicy,
    time_zone: Tz,
    day_boundary: DayBoundary,
}

impl LichessProvider {
    /// Creates a new lichess provider.
    ///
    /// With a `token`, every request carries `Authorization: Bearer <token>`,
    /// which raises the service's rate limits. Without one, requests are anonymous.
    pub fn new(settings: LichessSettings, token: Option<SecretString>) -> Result<Self, ProviderInitError> {
        let base_url = Url::parse(&settings.base_url).map_err(|e| {
            InvalidBaseUrlSnafu {
                url: settings.base_url.clone(),
                message: e.to_string(),
            }
            .build()
        })?;

        let mut headers = header::HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            header::HeaderValue::from_static("application/x-ndjson"),
        );
        if let Some(token) = &token {
            let mut value = header::HeaderValue::from_str(&format!("Bearer {}", token.expose_secret()))
                .context(InvalidTokenSnafu)?;
            value.set_sensitive(true);
            headers.insert(header::AUTHORIZATION, value);
        }

        // No overall timeout: a long history streams for minutes.
        let client = Client::builder()
            .default_headers(headers)
            .connect_timeout(settings.connect_timeout)
            .user_agent(concat!("rating_candles/", env!("CARGO_PKG_VERSION")))
            .build()
            .context(ClientBuildSnafu)?;

        Ok(Self {
            client,
            base_url,
            retry: settings.retry,
            time_zone: settings.time_zone,
            day_boundary: settings.day_boundary,
        })
    }

    fn games_url(&self, user_id: &str) -> Result<Url, ProviderError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .ok()
            .context(ValidationSnafu {
                message: format!("base URL {} cannot carry a path", self.base_url),
            })?
            .pop_if_empty()
            .extend(["api", "games", "user", user_id]);
        Ok(url)
    }

    async fn send_with_retry(&self, url: Url, query: &[(String, String)]) -> Result<Response, ProviderError> {
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let (reason, retry_after) = match self.client.get(url.clone()).query(query).send().await {
                Ok(resp) if resp.status().is_success() => return Ok(resp),
                Ok(resp) if self.retry.is_retryable_status(resp.status()) => {
                    let retry_after = resp
                        .headers()
                        .get(header::RETRY_AFTER)
                        .and_then(|v| v.to_str().ok())
                        .and_then(|s| s.trim().parse::<u64>().ok())
                        .map(Duration::from_secs);
                    (format!("HTTP {}", resp.status()), retry_after)
                }
                Ok(resp) => {
                    let status = resp.status().as_u16();
                    let message = resp
                        .text()
                        .await
                        .unwrap_or_else(|_| "Unknown API error".to_string());
                    return ApiSnafu { status, message }.fail();
                }
                Err(e) if RetryPolicy::is_retryable_error(&e) => (e.to_string(), None),
                Err(e) => return Err(e).context(TransportSnafu),
            };

            if attempt > self.retry.max_retries {
                return RetriesExhaustedSnafu {
                    attempts: attempt,
                    last: reason,
                }
                .fail();
            }
            let delay = self.retry.delay_with_hint(attempt, retry_after);
            warn!(attempt, ?delay, %reason, "games request failed, retrying");
            tokio::time::sleep(delay).await;
        }
    }
}

/// Turns raw NDJSON lines into observations for one tracked player.
#[derive(Debug, Clone)]
struct GameResolver {
    user_id: String,
    time_zone: Tz,
    day_boundary: DayBoundary,
}

impl GameResolver {
    fn resolve_line(&self, line: &[u8]) -> Result<Observation, ProviderError> {
        let record = || String::from_utf8_lossy(line).into_owned();
        let game: LichessGame = serde_json::from_slice(line).map_err(|e| {
            MalformedObservationSnafu {
                game_id: "<undecodable>",
                reason: e.to_string(),
                record: record(),
            }
            .build()
        })?;
        game.resolve(&self.user_id, &self.time_zone, self.day_boundary)
            .map_err(|e| {
                MalformedObservationSnafu {
                    game_id: game.id.clone(),
                    reason: e.to_string(),
                    record: record(),
                }
                .build()
            })
    }
}

#[async_trait]
impl GameProvider for LichessProvider {
    async fn fetch_games(&self, params: GamesRequestParams) -> Result<ObservationStream, ProviderError> {
        let user_id = params.user_id();
        ensure!(
            !user_id.is_empty(),
            ValidationSnafu {
                message: "user handle is empty"
            }
        );

        let url = self.games_url(&user_id)?;
        let query = construct_params(&params);
        info!(user = %user_id, perf = %params.perf_type, max = ?params.max, since = ?params.since, "fetching games");

        let response = self.send_with_retry(url, &query).await?;

        let resolver = GameResolver {
            user_id,
            time_zone: self.time_zone,
            day_boundary: self.day_boundary,
        };
        let stream = ndjson::lines(response.bytes_stream().boxed())
            .map(move |line| resolver.resolve_line(&line.context(TransportSnafu)?))
            .boxed();
        Ok(stream)
    }
}
