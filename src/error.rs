use thiserror::Error;

use crate::timeline::{LeagueId, MatchId};

/// Which side of a fixture a malformed field belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Home,
    Away,
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Home => f.write_str("home"),
            Side::Away => f.write_str("away"),
        }
    }
}

/// Malformed input found while building a league's timeline or pass.
///
/// Every variant names the offending match so the caller can trace it back
/// to the store. A league pass that hits one of these is aborted as a whole.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FeatureError {
    #[error("match {match_id}: missing date")]
    MissingDate { match_id: MatchId },
    #[error("match {match_id}: unparseable date {raw:?}")]
    InvalidDate { match_id: MatchId, raw: String },
    #[error("match {match_id}: unparseable kickoff {raw:?}")]
    InvalidKickoff { match_id: MatchId, raw: String },
    #[error("match {match_id}: missing {side} team id")]
    MissingTeam { match_id: MatchId, side: Side },
    #[error("match {match_id}: team {team_id} listed on both sides")]
    SameTeam { match_id: MatchId, team_id: u32 },
    #[error("match {match_id}: negative {side} score {score}")]
    NegativeScore {
        match_id: MatchId,
        side: Side,
        score: i32,
    },
    #[error("match {match_id}: belongs to league {found}, expected {expected}")]
    LeagueMismatch {
        match_id: MatchId,
        expected: LeagueId,
        found: LeagueId,
    },
    #[error("league {league_id}: pass cancelled before it started")]
    Cancelled { league_id: LeagueId },
}

impl FeatureError {
    /// The match that triggered the error, if any.
    pub fn match_id(&self) -> Option<MatchId> {
        match self {
            FeatureError::MissingDate { match_id }
            | FeatureError::InvalidDate { match_id, .. }
            | FeatureError::InvalidKickoff { match_id, .. }
            | FeatureError::MissingTeam { match_id, .. }
            | FeatureError::SameTeam { match_id, .. }
            | FeatureError::NegativeScore { match_id, .. }
            | FeatureError::LeagueMismatch { match_id, .. } => Some(*match_id),
            FeatureError::Cancelled { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
    #[error("invalid environment variable {key}: {reason}")]
    InvalidEnv { key: String, reason: String },
}

impl ConfigError {
    pub(crate) fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ConfigError::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_errors_name_the_match() {
        let err = FeatureError::MissingTeam {
            match_id: 42,
            side: Side::Away,
        };
        assert_eq!(err.match_id(), Some(42));
        assert_eq!(err.to_string(), "match 42: missing away team id");
        assert_eq!(FeatureError::Cancelled { league_id: 3 }.match_id(), None);
    }
}
