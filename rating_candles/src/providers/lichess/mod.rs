//! Game history from lichess.org (`GET /api/games/user/{username}`, NDJSON).

pub mod params;
pub mod provider;
pub mod response;

pub use provider::{LichessProvider, LichessSettings};
pub use response::DayBoundary;
