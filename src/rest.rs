use std::collections::HashMap;

use chrono::NaiveDate;

use crate::timeline::{LeagueId, TeamId};

/// Last completed-match date per (league, team).
#[derive(Debug, Clone)]
pub struct RestTracker {
    default_days: f64,
    last_played: HashMap<(LeagueId, TeamId), NaiveDate>,
}

impl RestTracker {
    pub fn new(default_days: f64) -> Self {
        Self {
            default_days,
            last_played: HashMap::new(),
        }
    }

    /// Whole days since the team last played in this league.
    pub fn pre_match_rest(
        &self,
        league_id: LeagueId,
        team_id: TeamId,
        match_date: NaiveDate,
    ) -> f64 {
        match self.last_played.get(&(league_id, team_id)) {
            Some(last) => (match_date - *last).num_days() as f64,
            None => self.default_days,
        }
    }

    pub fn last_played(&self, league_id: LeagueId, team_id: TeamId) -> Option<NaiveDate> {
        self.last_played.get(&(league_id, team_id)).copied()
    }

    pub fn apply_result(&mut self, league_id: LeagueId, team_id: TeamId, match_date: NaiveDate) {
        self.last_played.insert((league_id, team_id), match_date);
    }
}
