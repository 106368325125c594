use std::fs;
use std::path::Path;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use crate::state::RoleCategory;

pub const CONFIG_ENV: &str = "CARDRISK_CONFIG";
pub const MIN_NINETIES_ENV: &str = "CARDRISK_MIN_NINETIES";

/// The single named weight table used by the scorer, duel finder and selector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringConfig {
    pub name: String,
    /// Players below this many 90-minute equivalents are never ranked.
    pub min_nineties: f64,
    /// A team with fewer eligible players than this aborts the request.
    pub min_players_per_team: usize,
    pub weights: RiskWeights,
    pub league: LeagueBaselines,
    pub role_base: RoleBaseRates,
    pub referee_blend: RefereeBlend,
    pub venue: VenueFactors,
    pub risk_floor: f64,
    pub risk_ceiling: f64,
    pub odds_min: f64,
    pub odds_max: f64,
    pub matchups: MatchupParams,
    pub selector: SelectorParams,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskWeights {
    pub historical: f64,
    pub foul_rate: f64,
    pub referee: f64,
    pub positional: f64,
    pub matchup: f64,
}

/// League-level reference values (Serie A style averages).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LeagueBaselines {
    pub avg_cards_per_match: f64,
    pub avg_fouls_committed_p90: f64,
    pub avg_fouls_suffered_p90: f64,
    /// Fouls per 90 that saturate the foul-rate term.
    pub foul_rate_ceiling: f64,
    /// A card every this many 90s saturates the frequency sub-score.
    pub reference_nineties_per_card: f64,
    /// A card every this many fouls saturates the impulsiveness sub-score.
    pub reference_fouls_per_card: f64,
    pub neutral_minutes_to_first_card: f64,
    pub card_clock_minutes: f64,
    pub referee_factor_min: f64,
    pub referee_factor_max: f64,
    pub strict_above: f64,
    pub permissive_below: f64,
    pub expected_cards_cap: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleBaseRates {
    pub goalkeeper: f64,
    pub defender: f64,
    pub midfielder: f64,
    pub attacker: f64,
}

/// Multipliers on the raw aggregate for the home side (team A) and the away
/// side (team B).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VenueFactors {
    pub home: f64,
    pub away: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefereeBlend {
    /// Referee severity is one weighted term of the sum.
    Additive,
    /// Referee severity scales the whole aggregate.
    Multiplicative,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchupParams {
    pub aggressor_min_fouls_p90: f64,
    pub victim_min_fouls_suffered_p90: f64,
    pub candidates_per_side: usize,
    pub zone_weight: f64,
    pub min_compatibility: f64,
    pub mirrored_multiplier: f64,
    pub bonus_cap: f64,
    pub victim_share: f64,
    pub max_pairs: usize,
    /// Victims at or above this quantile of the match's fouls suffered are
    /// flagged high risk.
    pub high_risk_victim_quantile: f64,
    /// Multiplier on a flagged victim's term of the pair risk.
    pub victim_priority_bonus: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorParams {
    pub shortlist_size: usize,
    pub dominance_margin: f64,
    pub margin_floor: f64,
    /// How much the team-aggression gap narrows the dominance margin.
    pub aggression_narrowing: f64,
    pub aggression_cap: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            name: "balanced-v5".to_string(),
            min_nineties: 5.0,
            min_players_per_team: 1,
            weights: RiskWeights::default(),
            league: LeagueBaselines::default(),
            role_base: RoleBaseRates::default(),
            referee_blend: RefereeBlend::Additive,
            venue: VenueFactors::default(),
            risk_floor: 0.01,
            risk_ceiling: 0.95,
            odds_min: 1.2,
            odds_max: 20.0,
            matchups: MatchupParams::default(),
            selector: SelectorParams::default(),
        }
    }
}

impl Default for RiskWeights {
    fn default() -> Self {
        Self {
            historical: 0.32,
            foul_rate: 0.25,
            referee: 0.15,
            positional: 0.13,
            matchup: 0.15,
        }
    }
}

impl Default for LeagueBaselines {
    fn default() -> Self {
        Self {
            avg_cards_per_match: 4.2,
            avg_fouls_committed_p90: 1.8,
            avg_fouls_suffered_p90: 1.8,
            foul_rate_ceiling: 2.5,
            reference_nineties_per_card: 4.0,
            reference_fouls_per_card: 6.0,
            neutral_minutes_to_first_card: 90.0,
            card_clock_minutes: 180.0,
            referee_factor_min: 0.7,
            referee_factor_max: 1.4,
            strict_above: 4.8,
            permissive_below: 3.8,
            expected_cards_cap: 8.0,
        }
    }
}

impl Default for VenueFactors {
    fn default() -> Self {
        Self {
            home: 1.1,
            away: 0.95,
        }
    }
}

impl Default for RoleBaseRates {
    fn default() -> Self {
        Self {
            goalkeeper: 0.05,
            defender: 1.0,
            midfielder: 0.8,
            attacker: 0.55,
        }
    }
}

impl Default for MatchupParams {
    fn default() -> Self {
        Self {
            aggressor_min_fouls_p90: 1.5,
            victim_min_fouls_suffered_p90: 1.5,
            candidates_per_side: 10,
            zone_weight: 0.7,
            min_compatibility: 0.6,
            mirrored_multiplier: 1.25,
            bonus_cap: 0.4,
            victim_share: 0.7,
            max_pairs: 12,
            high_risk_victim_quantile: 0.8,
            victim_priority_bonus: 1.2,
        }
    }
}

impl Default for SelectorParams {
    fn default() -> Self {
        Self {
            shortlist_size: 4,
            dominance_margin: 0.40,
            margin_floor: 0.10,
            aggression_narrowing: 0.5,
            aggression_cap: 1.5,
        }
    }
}

impl RoleBaseRates {
    pub fn for_role(&self, role: RoleCategory) -> f64 {
        match role {
            RoleCategory::Goalkeeper => self.goalkeeper,
            RoleCategory::Defender => self.defender,
            RoleCategory::Midfielder => self.midfielder,
            RoleCategory::Attacker => self.attacker,
        }
    }
}

impl ScoringConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("read scoring config {}", path.display()))?;
        let cfg: ScoringConfig = serde_json::from_str(&raw)
            .with_context(|| format!("parse scoring config {}", path.display()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Config file from `CARDRISK_CONFIG` when set, defaults otherwise, then
    /// the `CARDRISK_MIN_NINETIES` override.
    pub fn from_env() -> Result<Self> {
        let mut cfg = match std::env::var(CONFIG_ENV) {
            Ok(path) if !path.trim().is_empty() => Self::load(Path::new(path.trim()))?,
            _ => Self::default(),
        };
        if let Some(min) = parse_f64_env(MIN_NINETIES_ENV) {
            cfg.min_nineties = min;
        }
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            let _ = fs::create_dir_all(parent);
        }
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(self).context("serialize scoring config")?;
        fs::write(&tmp, json).context("write scoring config")?;
        fs::rename(&tmp, path).context("swap scoring config")?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let w = &self.weights;
        for (label, value) in [
            ("historical", w.historical),
            ("foul_rate", w.foul_rate),
            ("referee", w.referee),
            ("positional", w.positional),
            ("matchup", w.matchup),
        ] {
            if !value.is_finite() || value < 0.0 {
                bail!("weight {label} must be a non-negative number, got {value}");
            }
        }
        if !(0.0 < self.risk_floor && self.risk_floor < self.risk_ceiling && self.risk_ceiling <= 1.0)
        {
            bail!(
                "risk band must satisfy 0 < floor < ceiling <= 1, got [{}, {}]",
                self.risk_floor,
                self.risk_ceiling
            );
        }
        if self.min_nineties < 0.0 || !self.min_nineties.is_finite() {
            bail!("min_nineties must be >= 0, got {}", self.min_nineties);
        }
        if self.league.avg_cards_per_match <= 0.0 || self.league.foul_rate_ceiling <= 0.0 {
            bail!("league baselines must be positive");
        }
        let league = &self.league;
        if !league.referee_factor_min.is_finite()
            || !league.referee_factor_max.is_finite()
            || league.referee_factor_min > league.referee_factor_max
        {
            bail!("referee factor band is inverted");
        }
        if self.selector.shortlist_size == 0 {
            bail!("shortlist_size must be at least 1");
        }
        if !self.odds_max.is_finite() || self.odds_min <= 0.0 || self.odds_min > self.odds_max {
            bail!(
                "odds band must satisfy 0 < min <= max, got [{}, {}]",
                self.odds_min,
                self.odds_max
            );
        }
        let m = &self.matchups;
        for (label, value) in [
            ("matchups.bonus_cap", m.bonus_cap),
            ("matchups.victim_priority_bonus", m.victim_priority_bonus),
            ("selector.aggression_cap", self.selector.aggression_cap),
            ("venue.home", self.venue.home),
            ("venue.away", self.venue.away),
        ] {
            if !value.is_finite() || value < 0.0 {
                bail!("{label} must be a non-negative number, got {value}");
            }
        }
        for (label, value) in [
            ("matchups.zone_weight", m.zone_weight),
            ("matchups.high_risk_victim_quantile", m.high_risk_victim_quantile),
        ] {
            if !(0.0..=1.0).contains(&value) {
                bail!("{label} must lie in [0, 1], got {value}");
            }
        }
        let sel = &self.selector;
        if !sel.margin_floor.is_finite()
            || !sel.dominance_margin.is_finite()
            || sel.margin_floor > sel.dominance_margin
        {
            bail!(
                "selector.margin_floor {} exceeds dominance_margin {}",
                sel.margin_floor,
                sel.dominance_margin
            );
        }
        Ok(())
    }
}

fn parse_f64_env(key: &str) -> Option<f64> {
    std::env::var(key)
        .ok()
        .and_then(|val| val.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite())
}
