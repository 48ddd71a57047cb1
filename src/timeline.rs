//! Match timeline: raw store rows to validated, chronologically sorted records.

use std::cmp::Ordering;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::error::{FeatureError, Side};

pub type LeagueId = u32;
pub type TeamId = u32;
pub type MatchId = u64;

/// Month that maps to season phase 0.0.
const SEASON_START_MONTH: i32 = 8;

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// A match row as it comes out of the store, before any validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawMatchRow {
    pub match_id: MatchId,
    pub league_id: LeagueId,
    #[serde(default)]
    pub season: String,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub kickoff: Option<String>,
    #[serde(default)]
    pub home_team_id: Option<TeamId>,
    #[serde(default)]
    pub away_team_id: Option<TeamId>,
    #[serde(default)]
    pub home_score: Option<i32>,
    #[serde(default)]
    pub away_score: Option<i32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchRecord {
    pub id: MatchId,
    pub league_id: LeagueId,
    pub season: String,
    pub date: NaiveDate,
    pub timestamp: NaiveDateTime,
    pub home_team_id: TeamId,
    pub away_team_id: TeamId,
    pub home_score: Option<i32>,
    pub away_score: Option<i32>,
    pub season_phase: f64,
}

/// Sort key for the chronological total order: date, then timestamp, then id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ChronoKey {
    pub date: NaiveDate,
    pub timestamp: NaiveDateTime,
    pub id: MatchId,
}

impl MatchRecord {
    pub fn from_raw(row: &RawMatchRow) -> Result<Self, FeatureError> {
        let match_id = row.match_id;
        let raw_date = row
            .date
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or(FeatureError::MissingDate { match_id })?;
        let (date, date_time) =
            parse_match_date(raw_date).ok_or_else(|| FeatureError::InvalidDate {
                match_id,
                raw: raw_date.to_string(),
            })?;

        let kickoff = match row.kickoff.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => {
                let (_, instant) =
                    parse_datetime(raw).ok_or_else(|| FeatureError::InvalidKickoff {
                        match_id,
                        raw: raw.to_string(),
                    })?;
                Some(instant)
            }
            _ => None,
        };
        let timestamp = kickoff
            .or(date_time)
            .unwrap_or_else(|| date.and_time(NaiveTime::MIN));

        let home_team_id = row.home_team_id.ok_or(FeatureError::MissingTeam {
            match_id,
            side: Side::Home,
        })?;
        let away_team_id = row.away_team_id.ok_or(FeatureError::MissingTeam {
            match_id,
            side: Side::Away,
        })?;
        if home_team_id == away_team_id {
            return Err(FeatureError::SameTeam {
                match_id,
                team_id: home_team_id,
            });
        }

        for (side, score) in [(Side::Home, row.home_score), (Side::Away, row.away_score)] {
            if let Some(score) = score
                && score < 0
            {
                return Err(FeatureError::NegativeScore {
                    match_id,
                    side,
                    score,
                });
            }
        }

        Ok(Self {
            id: match_id,
            league_id: row.league_id,
            season: row.season.clone(),
            date,
            timestamp,
            home_team_id,
            away_team_id,
            home_score: row.home_score,
            away_score: row.away_score,
            season_phase: season_phase(date),
        })
    }

    /// Both scores, when the match has been played.
    pub fn score(&self) -> Option<(i32, i32)> {
        match (self.home_score, self.away_score) {
            (Some(home), Some(away)) => Some((home, away)),
            _ => None,
        }
    }

    pub fn is_completed(&self) -> bool {
        self.score().is_some()
    }

    pub fn chrono_key(&self) -> ChronoKey {
        ChronoKey {
            date: self.date,
            timestamp: self.timestamp,
            id: self.id,
        }
    }
}

/// The chronological total order over match records.
pub fn chronological_cmp(a: &MatchRecord, b: &MatchRecord) -> Ordering {
    a.chrono_key().cmp(&b.chrono_key())
}

pub fn sort_chronologically(records: &mut [MatchRecord]) {
    records.sort_by(chronological_cmp);
}

/// Cyclical position within the season calendar: `((month - 8) mod 12) / 11`.
///
/// August is 0.0 and July is 1.0.
pub fn season_phase(date: NaiveDate) -> f64 {
    let month = date.month() as i32;
    (month - SEASON_START_MONTH).rem_euclid(12) as f64 / 11.0
}

/// Validate every row and return the records in chronological order.
///
/// The first malformed row aborts the load.
pub fn load_timeline(rows: &[RawMatchRow]) -> Result<Vec<MatchRecord>, FeatureError> {
    let mut records = rows
        .iter()
        .map(MatchRecord::from_raw)
        .collect::<Result<Vec<_>, _>>()?;
    sort_chronologically(&mut records);
    Ok(records)
}

fn parse_match_date(raw: &str) -> Option<(NaiveDate, Option<NaiveDateTime>)> {
    if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Some((date, None));
    }
    let (date, instant) = parse_datetime(raw)?;
    Some((date, Some(instant)))
}

/// Calendar date as written, in its own offset, plus the UTC instant.
fn parse_datetime(raw: &str) -> Option<(NaiveDate, NaiveDateTime)> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some((dt.date_naive(), dt.naive_utc()));
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|dt| (dt.date(), dt))
}
