use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::observation::{Observation, Rating};

/// Which game timestamp decides the day a game counts towards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayBoundary {
    /// When the game was created.
    #[default]
    CreatedAt,
    /// When the last move was played; falls back to creation time if absent.
    LastMoveAt,
}

/// One line of the games export. Only the fields needed for rating history.
#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct LichessGame {
    #[serde(default)]
    pub id: String,
    /// Milliseconds since the Unix epoch.
    pub created_at: i64,
    pub last_move_at: Option<i64>,
    pub players: LichessPlayers,
}

#[derive(Deserialize, Debug)]
pub struct LichessPlayers {
    pub white: LichessPlayer,
    pub black: LichessPlayer,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct LichessPlayer {
    /// Absent for anonymous players and AI opponents.
    pub user: Option<LichessUser>,
    pub rating: Option<Rating>,
    pub rating_diff: Option<Rating>,
}

#[derive(Deserialize, Debug)]
pub struct LichessUser {
    pub id: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("player '{0}' is on neither side of the game")]
    PlayerNotFound(String),

    #[error("{side} player has no rating")]
    MissingRating { side: &'static str },

    #[error("timestamp {0} ms is out of range")]
    BadTimestamp(i64),

    #[error("rating {rating} with diff {diff} is out of range")]
    RatingOutOfRange { rating: Rating, diff: Rating },
}

impl LichessGame {
    pub fn timestamp_ms(&self, boundary: DayBoundary) -> i64 {
        match boundary {
            DayBoundary::CreatedAt => self.created_at,
            DayBoundary::LastMoveAt => self.last_move_at.unwrap_or(self.created_at),
        }
    }

    /// The side `user_id` played, compared case-insensitively with the user id.
    fn side_of(&self, user_id: &str) -> Option<(&'static str, &LichessPlayer)> {
        let plays = |p: &LichessPlayer| {
            p.user
                .as_ref()
                .is_some_and(|u| u.id.eq_ignore_ascii_case(user_id))
        };
        if plays(&self.players.white) {
            Some(("white", &self.players.white))
        } else if plays(&self.players.black) {
            Some(("black", &self.players.black))
        } else {
            None
        }
    }

    /// Reduces the game to the tracked player's observation, dated in `tz`.
    pub fn resolve(
        &self,
        user_id: &str,
        tz: &Tz,
        boundary: DayBoundary,
    ) -> Result<Observation, ResolveError> {
        let (side, player) = self
            .side_of(user_id)
            .ok_or_else(|| ResolveError::PlayerNotFound(user_id.to_string()))?;
        let before = player.rating.ok_or(ResolveError::MissingRating { side })?;

        let ms = self.timestamp_ms(boundary);
        let date = DateTime::<Utc>::from_timestamp_millis(ms)
            .ok_or(ResolveError::BadTimestamp(ms))?
            .with_timezone(tz)
            .date_naive();

        Observation::from_diff(date, before, player.rating_diff).ok_or(ResolveError::RatingOutOfRange {
            rating: before,
            diff: player.rating_diff.unwrap_or(0),
        })
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    // 2024-01-02T23:30:00Z
    const LATE_EVENING_UTC: i64 = 1_704_238_200_000;

    fn game(json: &str) -> LichessGame {
        serde_json::from_str(json).unwrap()
    }

    fn sample() -> LichessGame {
        game(&format!(
            r#"{{"id":"q7ZvsdUF","rated":true,"variant":"standard","speed":"bullet","perf":"bullet",
                "createdAt":{LATE_EVENING_UTC},"lastMoveAt":{},"status":"mate",
                "players":{{
                    "white":{{"user":{{"name":"German11","id":"german11"}},"rating":1500,"ratingDiff":12}},
                    "black":{{"user":{{"name":"Opponent","id":"opponent"}},"rating":1530,"ratingDiff":-12}}
                }}}}"#,
            LATE_EVENING_UTC + 3_600_000
        ))
    }

    #[test]
    fn resolves_white_side() {
        let obs = sample().resolve("german11", &Tz::UTC, DayBoundary::CreatedAt).unwrap();
        assert_eq!(obs, Observation::new(NaiveDate::from_ymd_opt(2024, 1, 2).unwrap(), 1500, 1512));
    }

    #[test]
    fn resolves_black_side_case_insensitively() {
        let obs = sample().resolve("OPPONENT", &Tz::UTC, DayBoundary::CreatedAt).unwrap();
        assert_eq!((obs.rating_before, obs.rating_after), (1530, 1518));
    }

    #[test]
    fn day_follows_timezone_and_boundary() {
        let g = sample();
        let jan3 = NaiveDate::from_ymd_opt(2024, 1, 3).unwrap();
        assert_eq!(
            g.resolve("german11", &Tz::UTC, DayBoundary::LastMoveAt).unwrap().date,
            jan3
        );
        assert_eq!(
            g.resolve("german11", &chrono_tz::Europe::Berlin, DayBoundary::CreatedAt)
                .unwrap()
                .date,
            jan3
        );
    }

    #[test]
    fn missing_rating_diff_counts_as_zero() {
        let g = game(
            r#"{"id":"x","createdAt":1704238200000,"players":{
                "white":{"user":{"id":"german11"},"rating":1500},
                "black":{"aiLevel":3}}}"#,
        );
        let obs = g.resolve("german11", &Tz::UTC, DayBoundary::CreatedAt).unwrap();
        assert_eq!(obs.rating_after, 1500);
    }

    #[test]
    fn unknown_player_is_an_error() {
        let err = sample()
            .resolve("someone_else", &Tz::UTC, DayBoundary::CreatedAt)
            .unwrap_err();
        assert_eq!(err, ResolveError::PlayerNotFound("someone_else".into()));
    }

    #[test]
    fn handle_is_not_matched_by_substring() {
        assert!(sample().resolve("german1", &Tz::UTC, DayBoundary::CreatedAt).is_err());
    }

    #[test]
    fn missing_rating_is_an_error() {
        let g = game(
            r#"{"id":"x","createdAt":1704238200000,"players":{
                "white":{"user":{"id":"german11"}},
                "black":{"user":{"id":"b"},"rating":1400}}}"#,
        );
        let err = g.resolve("german11", &Tz::UTC, DayBoundary::CreatedAt).unwrap_err();
        assert_eq!(err, ResolveError::MissingRating { side: "white" });
    }

    #[test]
    fn overflowing_rating_is_an_error() {
        let g = game(
            r#"{"id":"x","createdAt":1704238200000,"players":{
                "white":{"user":{"id":"german11"},"rating":2147483647,"ratingDiff":1},
                "black":{"user":{"id":"b"},"rating":1400,"ratingDiff":-1}}}"#,
        );
        let err = g.resolve("german11", &Tz::UTC, DayBoundary::CreatedAt).unwrap_err();
        assert_eq!(
            err,
            ResolveError::RatingOutOfRange {
                rating: i32::MAX,
                diff: 1
            }
        );
    }
}
