//! Pre-match feature rows: one forward pass per league over the timeline.
//!
//! For every match the trackers are read first and the row captured, and only
//! then, if the match has a result, updated. Nothing a match reveals can reach
//! its own row or any earlier one.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::NaiveDate;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::elo::EloTracker;
use crate::error::{ConfigError, FeatureError};
use crate::form::FormTracker;
use crate::h2h::H2hTracker;
use crate::rest::RestTracker;
use crate::timeline::{self, LeagueId, MatchId, MatchRecord, RawMatchRow, TeamId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub match_id: MatchId,
    pub league_id: LeagueId,
    pub season: String,
    pub date: NaiveDate,
    pub home_team_id: TeamId,
    pub away_team_id: TeamId,
    pub completed: bool,
    pub season_phase: f64,

    pub home_elo: f64,
    pub away_elo: f64,
    pub elo_diff: f64,
    pub elo_home_expected: f64,

    pub home_form_short: f64,
    pub away_form_short: f64,
    pub form_short_diff: f64,
    pub home_form_long: f64,
    pub away_form_long: f64,
    pub form_long_diff: f64,

    pub home_goal_diff_short: f64,
    pub away_goal_diff_short: f64,
    pub goal_diff_short_diff: f64,
    pub home_goal_diff_long: f64,
    pub away_goal_diff_long: f64,
    pub goal_diff_long_diff: f64,

    pub home_rest_days: f64,
    pub away_rest_days: f64,
    pub rest_diff: f64,

    /// Venue-aware rate, present when that view is enabled.
    pub h2h_venue: Option<f64>,
    /// Venue-neutral rate for the home side, present when that view is enabled.
    pub h2h_neutral: Option<f64>,
}

impl FeatureRow {
    /// Named numeric columns in a fixed order, for model input.
    ///
    /// Head-to-head columns appear only for the views that are enabled, so
    /// the shape is fixed for a given configuration.
    pub fn feature_columns(&self) -> Vec<(&'static str, f64)> {
        let mut out = vec![
            ("season_phase", self.season_phase),
            ("home_elo", self.home_elo),
            ("away_elo", self.away_elo),
            ("elo_diff", self.elo_diff),
            ("elo_home_expected", self.elo_home_expected),
            ("home_form_short", self.home_form_short),
            ("away_form_short", self.away_form_short),
            ("form_short_diff", self.form_short_diff),
            ("home_form_long", self.home_form_long),
            ("away_form_long", self.away_form_long),
            ("form_long_diff", self.form_long_diff),
            ("home_goal_diff_short", self.home_goal_diff_short),
            ("away_goal_diff_short", self.away_goal_diff_short),
            ("goal_diff_short_diff", self.goal_diff_short_diff),
            ("home_goal_diff_long", self.home_goal_diff_long),
            ("away_goal_diff_long", self.away_goal_diff_long),
            ("goal_diff_long_diff", self.goal_diff_long_diff),
            ("home_rest_days", self.home_rest_days),
            ("away_rest_days", self.away_rest_days),
            ("rest_diff", self.rest_diff),
        ];
        if let Some(v) = self.h2h_venue {
            out.push(("h2h_venue", v));
        }
        if let Some(v) = self.h2h_neutral {
            out.push(("h2h_neutral", v));
        }
        out
    }
}

/// Tracker state for one run. Created empty, dropped at the end of the run.
#[derive(Debug, Clone)]
pub struct FeatureAssembler {
    cfg: EngineConfig,
    elo: EloTracker,
    form: FormTracker,
    rest: RestTracker,
    h2h: H2hTracker,
}

impl FeatureAssembler {
    /// Fresh trackers for one run. The config is checked before anything is
    /// built.
    pub fn new(cfg: &EngineConfig) -> Result<Self, ConfigError> {
        cfg.validate()?;
        Ok(Self::with_checked_config(cfg))
    }

    // Caller has already validated `cfg`.
    fn with_checked_config(cfg: &EngineConfig) -> Self {
        Self {
            cfg: cfg.clone(),
            elo: EloTracker::new(cfg.elo.clone()),
            form: FormTracker::new(),
            rest: RestTracker::new(cfg.rest_default_days),
            h2h: H2hTracker::new(cfg.h2h),
        }
    }

    pub fn elo(&self) -> &EloTracker {
        &self.elo
    }

    pub fn form(&self) -> &FormTracker {
        &self.form
    }

    pub fn rest(&self) -> &RestTracker {
        &self.rest
    }

    pub fn h2h(&self) -> &H2hTracker {
        &self.h2h
    }

    /// Read every tracker for `m` without touching state.
    pub fn pre_match_row(&self, m: &MatchRecord) -> FeatureRow {
        let league = m.league_id;
        let (home, away) = (m.home_team_id, m.away_team_id);
        let short = self.cfg.form.short_window;
        let long = self.cfg.form.long_window;

        let (home_elo, away_elo) = self.elo.pre_match_ratings(league, home, away);
        let elo_home_expected = self.elo.expected_home_score(league, home, away);

        let home_form_short = self.form.pre_match_form(league, home, short);
        let away_form_short = self.form.pre_match_form(league, away, short);
        let home_form_long = self.form.pre_match_form(league, home, long);
        let away_form_long = self.form.pre_match_form(league, away, long);

        let home_goal_diff_short = self.form.pre_match_goal_diff_form(league, home, short);
        let away_goal_diff_short = self.form.pre_match_goal_diff_form(league, away, short);
        let home_goal_diff_long = self.form.pre_match_goal_diff_form(league, home, long);
        let away_goal_diff_long = self.form.pre_match_goal_diff_form(league, away, long);

        let home_rest_days = self.rest.pre_match_rest(league, home, m.date);
        let away_rest_days = self.rest.pre_match_rest(league, away, m.date);

        let mode = self.cfg.h2h.mode;
        let h2h_venue = mode
            .venue_aware()
            .then(|| self.h2h.pre_match_h2h(league, home, away, self.cfg.h2h.window));
        let h2h_neutral = mode
            .neutral()
            .then(|| self.h2h.pre_match_h2h_neutral(league, home, away));

        FeatureRow {
            match_id: m.id,
            league_id: league,
            season: m.season.clone(),
            date: m.date,
            home_team_id: home,
            away_team_id: away,
            completed: m.is_completed(),
            season_phase: m.season_phase,
            home_elo,
            away_elo,
            elo_diff: home_elo - away_elo,
            elo_home_expected,
            home_form_short,
            away_form_short,
            form_short_diff: home_form_short - away_form_short,
            home_form_long,
            away_form_long,
            form_long_diff: home_form_long - away_form_long,
            home_goal_diff_short,
            away_goal_diff_short,
            goal_diff_short_diff: home_goal_diff_short - away_goal_diff_short,
            home_goal_diff_long,
            away_goal_diff_long,
            goal_diff_long_diff: home_goal_diff_long - away_goal_diff_long,
            home_rest_days,
            away_rest_days,
            rest_diff: home_rest_days - away_rest_days,
            h2h_venue,
            h2h_neutral,
        }
    }

    /// Feed a finished match into every tracker. Pending matches are ignored.
    ///
    /// Order is fixed: Elo, form, rest, head-to-head.
    pub fn apply_result(&mut self, m: &MatchRecord) {
        let Some((home_score, away_score)) = m.score() else {
            return;
        };
        let league = m.league_id;
        let (home, away) = (m.home_team_id, m.away_team_id);
        self.elo
            .apply_result(league, home, away, home_score, away_score, m.season_phase);
        self.form
            .apply_result(league, home, away, home_score, away_score);
        self.rest.apply_result(league, home, m.date);
        self.rest.apply_result(league, away, m.date);
        self.h2h
            .apply_result(league, home, away, home_score, away_score);
    }

    /// Capture the row for `m`, then learn from it.
    pub fn process(&mut self, m: &MatchRecord) -> FeatureRow {
        let row = self.pre_match_row(m);
        self.apply_result(m);
        row
    }
}

/// Outcome of one league's pass.
#[derive(Debug, Clone, PartialEq)]
pub struct LeagueRun {
    pub league_id: LeagueId,
    pub result: Result<Vec<FeatureRow>, FeatureError>,
}

/// Validated configuration plus the entry points that run passes.
#[derive(Debug, Clone)]
pub struct FeatureEngine {
    cfg: EngineConfig,
}

impl FeatureEngine {
    pub fn new(cfg: EngineConfig) -> Result<Self, ConfigError> {
        cfg.validate()?;
        Ok(Self { cfg })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.cfg
    }

    /// One row per record, in chronological order.
    pub fn assemble(&self, mut records: Vec<MatchRecord>) -> Vec<FeatureRow> {
        timeline::sort_chronologically(&mut records);
        let mut assembler = FeatureAssembler::with_checked_config(&self.cfg);
        records.iter().map(|m| assembler.process(m)).collect()
    }

    /// Validate, sort and run a single league's rows.
    pub fn build_league(
        &self,
        league_id: LeagueId,
        rows: &[RawMatchRow],
    ) -> Result<Vec<FeatureRow>, FeatureError> {
        if let Some(stray) = rows.iter().find(|r| r.league_id != league_id) {
            return Err(FeatureError::LeagueMismatch {
                match_id: stray.match_id,
                expected: league_id,
                found: stray.league_id,
            });
        }
        let records = timeline::load_timeline(rows)?;
        let pending = records.iter().filter(|m| !m.is_completed()).count();
        debug!(
            league_id,
            matches = records.len(),
            pending,
            "running league pass"
        );
        Ok(self.assemble(records))
    }

    /// Run every league present in `rows` in parallel, one independent pass
    /// each. Results come back in ascending league order.
    pub fn build_leagues(&self, rows: Vec<RawMatchRow>) -> Vec<LeagueRun> {
        self.build_leagues_until(rows, &AtomicBool::new(false))
    }

    /// As [`FeatureEngine::build_leagues`], but leagues that have not started
    /// when `stop` is raised are reported as cancelled. Passes already running
    /// finish normally.
    pub fn build_leagues_until(
        &self,
        rows: Vec<RawMatchRow>,
        stop: &AtomicBool,
    ) -> Vec<LeagueRun> {
        let partitions = partition_by_league(rows).into_iter().collect::<Vec<_>>();
        partitions
            .par_iter()
            .map(|(league_id, league_rows)| {
                let league_id = *league_id;
                if stop.load(Ordering::Relaxed) {
                    return LeagueRun {
                        league_id,
                        result: Err(FeatureError::Cancelled { league_id }),
                    };
                }
                let result = self.build_league(league_id, league_rows);
                if let Err(err) = &result {
                    warn!(league_id, error = %err, "league pass aborted");
                }
                LeagueRun { league_id, result }
            })
            .collect()
    }
}

/// Group rows by league, keeping each league's input order.
pub fn partition_by_league(rows: Vec<RawMatchRow>) -> BTreeMap<LeagueId, Vec<RawMatchRow>> {
    let mut out: BTreeMap<LeagueId, Vec<RawMatchRow>> = BTreeMap::new();
    for row in rows {
        out.entry(row.league_id).or_default().push(row);
    }
    out
}
