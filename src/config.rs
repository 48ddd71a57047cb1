use std::collections::HashMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::timeline::{LeagueId, TeamId};

const ENV_PREFIX: &str = "FEATURES_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub elo: EloConfig,
    pub form: FormConfig,
    pub rest_default_days: f64,
    pub h2h: H2hConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            elo: EloConfig::default(),
            form: FormConfig::default(),
            rest_default_days: 10.0,
            h2h: H2hConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EloConfig {
    pub base_rating: f64,
    pub home_advantage: f64,
    /// Every league is played at neutral venues (no home advantage anywhere).
    pub neutral_venue: bool,
    /// Leagues played at neutral venues, e.g. tournament finals.
    pub neutral_leagues: Vec<LeagueId>,
    pub k_factor: f64,
    pub league_k_factors: HashMap<LeagueId, f64>,
    pub early_phase_threshold: f64,
    pub early_k_multiplier: f64,
    pub late_phase_threshold: f64,
    pub late_k_multiplier: f64,
    pub priors: Vec<EloPrior>,
}

impl Default for EloConfig {
    fn default() -> Self {
        Self {
            base_rating: 1500.0,
            home_advantage: 60.0,
            neutral_venue: false,
            neutral_leagues: Vec::new(),
            k_factor: 20.0,
            league_k_factors: HashMap::new(),
            early_phase_threshold: 0.25,
            early_k_multiplier: 1.5,
            late_phase_threshold: 0.75,
            late_k_multiplier: 1.25,
            priors: Vec::new(),
        }
    }
}

impl EloConfig {
    pub fn is_neutral(&self, league_id: LeagueId) -> bool {
        self.neutral_venue || self.neutral_leagues.contains(&league_id)
    }
}

/// Starting rating for one team, used instead of the base rating.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EloPrior {
    pub league_id: LeagueId,
    pub team_id: TeamId,
    pub rating: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormConfig {
    pub short_window: usize,
    pub long_window: usize,
}

impl Default for FormConfig {
    fn default() -> Self {
        Self {
            short_window: 5,
            long_window: 10,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum H2hMode {
    VenueAware,
    Neutral,
    Both,
}

impl H2hMode {
    pub fn venue_aware(self) -> bool {
        matches!(self, H2hMode::VenueAware | H2hMode::Both)
    }

    pub fn neutral(self) -> bool {
        matches!(self, H2hMode::Neutral | H2hMode::Both)
    }
}

/// How a drawn meeting is credited in the venue-neutral counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrawCredit {
    /// Half a win to the side that hosted the draw.
    HomeSide,
    /// Half a win to each side.
    Split,
    /// Draws leave the counters untouched.
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct H2hConfig {
    pub mode: H2hMode,
    pub window: usize,
    pub neutral_draw_credit: DrawCredit,
}

impl Default for H2hConfig {
    fn default() -> Self {
        Self {
            mode: H2hMode::Both,
            window: 5,
            neutral_draw_credit: DrawCredit::HomeSide,
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(raw: &str) -> Result<Self> {
        serde_json::from_str::<Self>(raw.trim()).context("invalid engine config json")
    }

    pub fn load_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("read engine config {}", path.display()))?;
        Self::from_json_str(&raw)
    }

    /// Apply `FEATURES_*` overrides from the process environment.
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        let vars = std::env::vars()
            .filter(|(k, _)| k.starts_with(ENV_PREFIX))
            .collect::<HashMap<_, _>>();
        self.apply_env_map(&vars)
    }

    pub fn apply_env_map(&mut self, vars: &HashMap<String, String>) -> Result<(), ConfigError> {
        if let Some(v) = env_parse::<f64>(vars, "FEATURES_BASE_RATING")? {
            self.elo.base_rating = v;
        }
        if let Some(v) = env_parse::<f64>(vars, "FEATURES_HOME_ADVANTAGE")? {
            self.elo.home_advantage = v;
        }
        if let Some(raw) = env_value(vars, "FEATURES_NEUTRAL_VENUE") {
            self.elo.neutral_venue = parse_bool(raw).ok_or_else(|| ConfigError::InvalidEnv {
                key: "FEATURES_NEUTRAL_VENUE".to_string(),
                reason: format!("expected true/false, got {raw:?}"),
            })?;
        }
        if let Some(v) = env_parse::<f64>(vars, "FEATURES_K_FACTOR")? {
            self.elo.k_factor = v;
        }
        if let Some(v) = env_parse::<usize>(vars, "FEATURES_SHORT_WINDOW")? {
            self.form.short_window = v;
        }
        if let Some(v) = env_parse::<usize>(vars, "FEATURES_LONG_WINDOW")? {
            self.form.long_window = v;
        }
        if let Some(v) = env_parse::<f64>(vars, "FEATURES_REST_DEFAULT_DAYS")? {
            self.rest_default_days = v;
        }
        if let Some(raw) = env_value(vars, "FEATURES_H2H_MODE") {
            self.h2h.mode = match raw.to_ascii_lowercase().as_str() {
                "venue_aware" => H2hMode::VenueAware,
                "neutral" => H2hMode::Neutral,
                "both" => H2hMode::Both,
                other => {
                    return Err(ConfigError::InvalidEnv {
                        key: "FEATURES_H2H_MODE".to_string(),
                        reason: format!("must be venue_aware, neutral or both, got {other}"),
                    });
                }
            };
        }
        if let Some(v) = env_parse::<usize>(vars, "FEATURES_H2H_WINDOW")? {
            self.h2h.window = v;
        }
        Ok(())
    }

    /// Reject settings that would make the engine misbehave. Runs before any
    /// match is processed.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let elo = &self.elo;
        require_finite("elo.base_rating", elo.base_rating)?;
        require_finite("elo.home_advantage", elo.home_advantage)?;
        require_positive("elo.k_factor", elo.k_factor)?;
        for (league_id, k) in &elo.league_k_factors {
            require_positive(&format!("elo.league_k_factors[{league_id}]"), *k)?;
        }
        require_positive("elo.early_k_multiplier", elo.early_k_multiplier)?;
        require_positive("elo.late_k_multiplier", elo.late_k_multiplier)?;
        require_unit("elo.early_phase_threshold", elo.early_phase_threshold)?;
        require_unit("elo.late_phase_threshold", elo.late_phase_threshold)?;
        if elo.early_phase_threshold > elo.late_phase_threshold {
            return Err(ConfigError::invalid(
                "elo.early_phase_threshold",
                format!(
                    "must not exceed late_phase_threshold ({} > {})",
                    elo.early_phase_threshold, elo.late_phase_threshold
                ),
            ));
        }
        for prior in &elo.priors {
            require_finite(
                &format!("elo.priors[{}:{}]", prior.league_id, prior.team_id),
                prior.rating,
            )?;
        }

        require_window("form.short_window", self.form.short_window)?;
        require_window("form.long_window", self.form.long_window)?;
        require_window("h2h.window", self.h2h.window)?;

        require_finite("rest_default_days", self.rest_default_days)?;
        if self.rest_default_days < 0.0 {
            return Err(ConfigError::invalid(
                "rest_default_days",
                "must not be negative",
            ));
        }
        Ok(())
    }
}

fn env_value<'a>(vars: &'a HashMap<String, String>, key: &str) -> Option<&'a str> {
    vars.get(key).map(|s| s.trim()).filter(|s| !s.is_empty())
}

fn env_parse<T: std::str::FromStr>(
    vars: &HashMap<String, String>,
    key: &str,
) -> Result<Option<T>, ConfigError> {
    let Some(raw) = env_value(vars, key) else {
        return Ok(None);
    };
    raw.parse::<T>()
        .map(Some)
        .map_err(|_| ConfigError::InvalidEnv {
            key: key.to_string(),
            reason: format!("cannot parse {raw:?}"),
        })
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn require_finite(field: &str, v: f64) -> Result<(), ConfigError> {
    if v.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::invalid(field, "must be finite"))
    }
}

fn require_positive(field: &str, v: f64) -> Result<(), ConfigError> {
    if v.is_finite() && v > 0.0 {
        Ok(())
    } else {
        Err(ConfigError::invalid(field, format!("must be > 0, got {v}")))
    }
}

fn require_unit(field: &str, v: f64) -> Result<(), ConfigError> {
    if (0.0..=1.0).contains(&v) {
        Ok(())
    } else {
        Err(ConfigError::invalid(
            field,
            format!("must be within [0, 1], got {v}"),
        ))
    }
}

fn require_window(field: &str, v: usize) -> Result<(), ConfigError> {
    if v == 0 {
        return Err(ConfigError::invalid(field, "window must be at least 1"));
    }
    Ok(())
}
