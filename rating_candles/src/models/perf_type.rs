//! Game categories ("performance types") the rating service tracks separately.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("unknown performance type '{0}'")]
pub struct PerfTypeParseError(pub String);

/// A rating category. Spelled in the service's camelCase both on the wire and
/// in file names.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PerfType {
    UltraBullet,
    Bullet,
    Blitz,
    Rapid,
    Classical,
    Correspondence,
    Chess960,
    Crazyhouse,
    Antichess,
    Atomic,
    Horde,
    KingOfTheHill,
    RacingKings,
    ThreeCheck,
}

impl PerfType {
    pub const ALL: [PerfType; 14] = [
        PerfType::UltraBullet,
        PerfType::Bullet,
        PerfType::Blitz,
        PerfType::Rapid,
        PerfType::Classical,
        PerfType::Correspondence,
        PerfType::Chess960,
        PerfType::Crazyhouse,
        PerfType::Antichess,
        PerfType::Atomic,
        PerfType::Horde,
        PerfType::KingOfTheHill,
        PerfType::RacingKings,
        PerfType::ThreeCheck,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PerfType::UltraBullet => "ultraBullet",
            PerfType::Bullet => "bullet",
            PerfType::Blitz => "blitz",
            PerfType::Rapid => "rapid",
            PerfType::Classical => "classical",
            PerfType::Correspondence => "correspondence",
            PerfType::Chess960 => "chess960",
            PerfType::Crazyhouse => "crazyhouse",
            PerfType::Antichess => "antichess",
            PerfType::Atomic => "atomic",
            PerfType::Horde => "horde",
            PerfType::KingOfTheHill => "kingOfTheHill",
            PerfType::RacingKings => "racingKings",
            PerfType::ThreeCheck => "threeCheck",
        }
    }
}

impl fmt::Display for PerfType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PerfType {
    type Err = PerfTypeParseError;

    /// Case-insensitive, so `--perf Bullet` and `--perf kingofthehill` both work.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        PerfType::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| PerfTypeParseError(s.to_string()))
    }
}
