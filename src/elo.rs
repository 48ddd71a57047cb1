use std::collections::HashMap;

use crate::config::EloConfig;
use crate::timeline::{LeagueId, TeamId};

/// Running Elo ratings keyed by (league, team).
#[derive(Debug, Clone)]
pub struct EloTracker {
    cfg: EloConfig,
    priors: HashMap<(LeagueId, TeamId), f64>,
    ratings: HashMap<(LeagueId, TeamId), f64>,
}

impl EloTracker {
    pub fn new(cfg: EloConfig) -> Self {
        let priors = cfg
            .priors
            .iter()
            .map(|p| ((p.league_id, p.team_id), p.rating))
            .collect();
        Self {
            cfg,
            priors,
            ratings: HashMap::new(),
        }
    }

    /// Current rating, or the prior / base rating for an unseen team.
    pub fn rating(&self, league_id: LeagueId, team_id: TeamId) -> f64 {
        let key = (league_id, team_id);
        self.ratings
            .get(&key)
            .or_else(|| self.priors.get(&key))
            .copied()
            .unwrap_or(self.cfg.base_rating)
    }

    pub fn pre_match_ratings(
        &self,
        league_id: LeagueId,
        home_id: TeamId,
        away_id: TeamId,
    ) -> (f64, f64) {
        (
            self.rating(league_id, home_id),
            self.rating(league_id, away_id),
        )
    }

    /// Expected score of the home side, home advantage included.
    pub fn expected_home_score(
        &self,
        league_id: LeagueId,
        home_id: TeamId,
        away_id: TeamId,
    ) -> f64 {
        let (home, away) = self.pre_match_ratings(league_id, home_id, away_id);
        expected_score(home, away, self.home_advantage(league_id))
    }

    pub fn home_advantage(&self, league_id: LeagueId) -> f64 {
        if self.cfg.is_neutral(league_id) {
            0.0
        } else {
            self.cfg.home_advantage
        }
    }

    /// League K scaled by where in the season the match falls.
    pub fn k_factor(&self, league_id: LeagueId, season_phase: f64) -> f64 {
        let k = self
            .cfg
            .league_k_factors
            .get(&league_id)
            .copied()
            .unwrap_or(self.cfg.k_factor);
        if season_phase < self.cfg.early_phase_threshold {
            k * self.cfg.early_k_multiplier
        } else if season_phase > self.cfg.late_phase_threshold {
            k * self.cfg.late_k_multiplier
        } else {
            k
        }
    }

    pub fn apply_result(
        &mut self,
        league_id: LeagueId,
        home_id: TeamId,
        away_id: TeamId,
        home_score: i32,
        away_score: i32,
        season_phase: f64,
    ) {
        let (eh, ea) = self.pre_match_ratings(league_id, home_id, away_id);

        let expected_home = expected_score(eh, ea, self.home_advantage(league_id));
        let expected_away = 1.0 - expected_home;
        let s_home = if home_score > away_score {
            1.0
        } else if home_score < away_score {
            0.0
        } else {
            0.5
        };
        let s_away = 1.0 - s_home;

        let k = self.k_factor(league_id, season_phase);
        self.ratings
            .insert((league_id, home_id), eh + k * (s_home - expected_home));
        self.ratings
            .insert((league_id, away_id), ea + k * (s_away - expected_away));
    }
}

/// `1 / (1 + 10^((away + advantage - home) / 400))`
pub fn expected_score(home_rating: f64, away_rating: f64, home_advantage: f64) -> f64 {
    1.0 / (1.0 + 10.0_f64.powf((away_rating + home_advantage - home_rating) / 400.0))
}
