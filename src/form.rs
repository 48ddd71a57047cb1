use std::collections::HashMap;

use crate::timeline::{LeagueId, TeamId};

#[derive(Debug, Clone)]
struct TeamForm {
    wins: Vec<u8>,
    goal_diffs: Vec<i32>,
    // Prefix sums, one longer than the histories, so any window is O(1).
    wins_prefix: Vec<u32>,
    goal_diff_prefix: Vec<i64>,
}

impl Default for TeamForm {
    fn default() -> Self {
        Self {
            wins: Vec::new(),
            goal_diffs: Vec::new(),
            wins_prefix: vec![0],
            goal_diff_prefix: vec![0],
        }
    }
}

impl TeamForm {
    fn push(&mut self, won: bool, goal_diff: i32) {
        let win = u8::from(won);
        let last_wins = self.wins_prefix.last().copied().unwrap_or(0);
        let last_gd = self.goal_diff_prefix.last().copied().unwrap_or(0);
        self.wins.push(win);
        self.goal_diffs.push(goal_diff);
        self.wins_prefix.push(last_wins + u32::from(win));
        self.goal_diff_prefix.push(last_gd + i64::from(goal_diff));
    }

    fn win_rate(&self, window: usize) -> f64 {
        let n = self.wins.len();
        let w = window.min(n);
        if w == 0 {
            return 0.0;
        }
        f64::from(self.wins_prefix[n] - self.wins_prefix[n - w]) / w as f64
    }

    fn goal_diff_mean(&self, window: usize) -> f64 {
        let n = self.goal_diffs.len();
        let w = window.min(n);
        if w == 0 {
            return 0.0;
        }
        (self.goal_diff_prefix[n] - self.goal_diff_prefix[n - w]) as f64 / w as f64
    }
}

/// Recent results per (league, team), read through any window size.
///
/// A team with no history reads 0.0 for both win rate and goal differential.
/// That reads a newcomer as "always loses", which is an accepted bias.
#[derive(Debug, Clone, Default)]
pub struct FormTracker {
    teams: HashMap<(LeagueId, TeamId), TeamForm>,
}

impl FormTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pre_match_form(&self, league_id: LeagueId, team_id: TeamId, window: usize) -> f64 {
        self.teams
            .get(&(league_id, team_id))
            .map_or(0.0, |t| t.win_rate(window))
    }

    pub fn pre_match_goal_diff_form(
        &self,
        league_id: LeagueId,
        team_id: TeamId,
        window: usize,
    ) -> f64 {
        self.teams
            .get(&(league_id, team_id))
            .map_or(0.0, |t| t.goal_diff_mean(window))
    }

    /// Win indicators for a team, oldest first.
    pub fn win_history(&self, league_id: LeagueId, team_id: TeamId) -> &[u8] {
        self.teams
            .get(&(league_id, team_id))
            .map(|t| t.wins.as_slice())
            .unwrap_or(&[])
    }

    pub fn goal_diff_history(&self, league_id: LeagueId, team_id: TeamId) -> &[i32] {
        self.teams
            .get(&(league_id, team_id))
            .map(|t| t.goal_diffs.as_slice())
            .unwrap_or(&[])
    }

    pub fn apply_result(
        &mut self,
        league_id: LeagueId,
        home_id: TeamId,
        away_id: TeamId,
        home_score: i32,
        away_score: i32,
    ) {
        let diff = home_score - away_score;
        self.teams
            .entry((league_id, home_id))
            .or_default()
            .push(home_score > away_score, diff);
        self.teams
            .entry((league_id, away_id))
            .or_default()
            .push(away_score > home_score, -diff);
    }
}
