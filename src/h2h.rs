use std::collections::HashMap;

use crate::config::{DrawCredit, H2hConfig};
use crate::timeline::{LeagueId, TeamId};

/// Rate returned for a pairing with no recorded meeting.
pub const H2H_COLD_START: f64 = 0.5;

/// Win counters for an unordered pair, stored against the sorted key.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct PairWins {
    low: f64,
    high: f64,
}

/// Pairwise history, kept venue-aware, venue-neutral, or both.
#[derive(Debug, Clone)]
pub struct H2hTracker {
    cfg: H2hConfig,
    // (league, home, away) -> "home won" indicators, oldest first.
    venue: HashMap<(LeagueId, TeamId, TeamId), Vec<u8>>,
    // (league, min team, max team) -> win counters.
    neutral: HashMap<(LeagueId, TeamId, TeamId), PairWins>,
}

impl H2hTracker {
    pub fn new(cfg: H2hConfig) -> Self {
        Self {
            cfg,
            venue: HashMap::new(),
            neutral: HashMap::new(),
        }
    }

    /// Mean of the last `window` home-won indicators for exactly this
    /// home/away orientation.
    pub fn pre_match_h2h(
        &self,
        league_id: LeagueId,
        home_id: TeamId,
        away_id: TeamId,
        window: usize,
    ) -> f64 {
        let Some(history) = self.venue.get(&(league_id, home_id, away_id)) else {
            return H2H_COLD_START;
        };
        let w = window.min(history.len());
        if w == 0 {
            return H2H_COLD_START;
        }
        let wins: u32 = history[history.len() - w..]
            .iter()
            .map(|v| u32::from(*v))
            .sum();
        f64::from(wins) / w as f64
    }

    /// Share of all meetings between the pair won by `team_a`, regardless of
    /// venue.
    pub fn pre_match_h2h_neutral(
        &self,
        league_id: LeagueId,
        team_a: TeamId,
        team_b: TeamId,
    ) -> f64 {
        let Some(wins) = self.neutral.get(&pair_key(league_id, team_a, team_b)) else {
            return H2H_COLD_START;
        };
        let total = wins.low + wins.high;
        if total <= 0.0 {
            return H2H_COLD_START;
        }
        let a_wins = if team_a <= team_b { wins.low } else { wins.high };
        a_wins / total
    }

    pub fn apply_result(
        &mut self,
        league_id: LeagueId,
        home_id: TeamId,
        away_id: TeamId,
        home_score: i32,
        away_score: i32,
    ) {
        if self.cfg.mode.venue_aware() {
            self.venue
                .entry((league_id, home_id, away_id))
                .or_default()
                .push(u8::from(home_score > away_score));
        }
        if self.cfg.mode.neutral() {
            let (home_credit, away_credit) = if home_score > away_score {
                (1.0, 0.0)
            } else if home_score < away_score {
                (0.0, 1.0)
            } else {
                match self.cfg.neutral_draw_credit {
                    DrawCredit::HomeSide => (0.5, 0.0),
                    DrawCredit::Split => (0.5, 0.5),
                    DrawCredit::None => (0.0, 0.0),
                }
            };
            let wins = self
                .neutral
                .entry(pair_key(league_id, home_id, away_id))
                .or_default();
            if home_id <= away_id {
                wins.low += home_credit;
                wins.high += away_credit;
            } else {
                wins.low += away_credit;
                wins.high += home_credit;
            }
        }
    }
}

fn pair_key(league_id: LeagueId, a: TeamId, b: TeamId) -> (LeagueId, TeamId, TeamId) {
    (league_id, a.min(b), a.max(b))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::H2hMode;

    const L: LeagueId = 3;

    fn tracker(mode: H2hMode, credit: DrawCredit) -> H2hTracker {
        H2hTracker::new(H2hConfig {
            mode,
            window: 5,
            neutral_draw_credit: credit,
        })
    }

    #[test]
    fn cold_start_is_half() {
        let h2h = tracker(H2hMode::Both, DrawCredit::HomeSide);
        assert_eq!(h2h.pre_match_h2h(L, 1, 2, 5), 0.5);
        assert_eq!(h2h.pre_match_h2h_neutral(L, 1, 2), 0.5);
        assert_eq!(h2h.pre_match_h2h_neutral(L, 2, 1), 0.5);
    }

    #[test]
    fn venue_aware_ignores_reverse_fixture() {
        let mut h2h = tracker(H2hMode::VenueAware, DrawCredit::HomeSide);
        h2h.apply_result(L, 1, 2, 2, 0);
        h2h.apply_result(L, 2, 1, 3, 0);
        assert_eq!(h2h.pre_match_h2h(L, 1, 2, 5), 1.0);
        assert_eq!(h2h.pre_match_h2h(L, 2, 1, 5), 1.0);
        // Neutral view is inactive in this mode.
        assert_eq!(h2h.pre_match_h2h_neutral(L, 1, 2), 0.5);
    }

    #[test]
    fn venue_aware_windows_recent_meetings() {
        let mut h2h = tracker(H2hMode::VenueAware, DrawCredit::HomeSide);
        h2h.apply_result(L, 1, 2, 1, 0);
        h2h.apply_result(L, 1, 2, 1, 0);
        h2h.apply_result(L, 1, 2, 0, 0);
        h2h.apply_result(L, 1, 2, 0, 2);
        assert_eq!(h2h.pre_match_h2h(L, 1, 2, 2), 0.0);
        assert_eq!(h2h.pre_match_h2h(L, 1, 2, 10), 0.5);
    }

    #[test]
    fn neutral_rates_are_symmetric() {
        let mut h2h = tracker(H2hMode::Neutral, DrawCredit::Split);
        h2h.apply_result(L, 7, 2, 1, 0);
        h2h.apply_result(L, 2, 7, 1, 0);
        h2h.apply_result(L, 2, 7, 0, 3);
        h2h.apply_result(L, 7, 2, 2, 2);
        let a = h2h.pre_match_h2h_neutral(L, 7, 2);
        let b = h2h.pre_match_h2h_neutral(L, 2, 7);
        assert!((a + b - 1.0).abs() < 1e-12);
        assert!((a - 2.5 / 4.0).abs() < 1e-12);
    }

    #[test]
    fn draw_credit_variants() {
        for (credit, expected) in [
            (DrawCredit::HomeSide, 1.0 / 1.5),
            (DrawCredit::Split, 1.5 / 2.0),
            (DrawCredit::None, 1.0),
        ] {
            let mut h2h = tracker(H2hMode::Neutral, credit);
            h2h.apply_result(L, 1, 2, 20, 10);
            h2h.apply_result(L, 2, 1, 15, 15);
            let rate = h2h.pre_match_h2h_neutral(L, 1, 2);
            assert!((rate - expected).abs() < 1e-12, "{credit:?}: {rate}");
        }
    }

    #[test]
    fn only_draws_with_no_credit_reads_cold_start() {
        let mut h2h = tracker(H2hMode::Neutral, DrawCredit::None);
        h2h.apply_result(L, 1, 2, 0, 0);
        assert_eq!(h2h.pre_match_h2h_neutral(L, 1, 2), 0.5);
    }
}
