//! Daily OHLCV candles from a player's online rating history.
//!
//! Games stream in newest first from a [`providers::GameProvider`], the
//! [`aggregator::DayAggregator`] folds them into one [`models::day_bar::DayBar`]
//! per calendar day, and the bars are merged into a [`models::series::Series`]
//! that is persisted as CSV. [`board::RatingBoard`] wires one run together.

pub mod aggregator;
pub mod board;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod errors;
pub mod io;
pub mod logging;
pub mod models;
pub mod providers;

pub use errors::Error;
