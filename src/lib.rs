//! Pre-match feature engine for sports match logs.
//!
//! Ratings, form, rest and head-to-head trackers are driven in strict
//! chronological order, one independent pass per league.

pub mod config;
pub mod elo;
pub mod error;
pub mod feature_export;
pub mod features;
pub mod form;
pub mod h2h;
pub mod match_store;
pub mod rest;
pub mod timeline;

pub use config::EngineConfig;
pub use error::{ConfigError, FeatureError};
pub use features::{FeatureAssembler, FeatureEngine, FeatureRow, LeagueRun};
pub use timeline::{LeagueId, MatchId, MatchRecord, RawMatchRow, TeamId};
