use std::cmp::Ordering;

use crate::config::{RefereeBlend, ScoringConfig};
use crate::state::{PlayerRecord, RefereeProfile, RefereeRecord, RiskComponents, ScoredPlayer, Severity};

const FREQUENCY_SHARE: f64 = 0.35;
const IMPULSIVENESS_SHARE: f64 = 0.25;
const SPEED_SHARE: f64 = 0.15;
const VOLUME_SHARE: f64 = 0.25;

/// Clamp to [0, 1]; NaN counts as no signal.
pub fn clip01(x: f64) -> f64 {
    if x.is_nan() { 0.0 } else { x.clamp(0.0, 1.0) }
}

/// `reference / denominator`, or 0 when the denominator is zero, missing or
/// the never-booked sentinel.
fn inverse_ratio(reference: f64, denominator: f64) -> f64 {
    if !denominator.is_finite() || denominator <= 0.0 {
        return 0.0;
    }
    clip01(reference / denominator)
}

pub fn severity_for(avg_yellow_per_match: f64, cfg: &ScoringConfig) -> Severity {
    if avg_yellow_per_match > cfg.league.strict_above {
        Severity::Strict
    } else if avg_yellow_per_match < cfg.league.permissive_below {
        Severity::Permissive
    } else {
        Severity::Medium
    }
}

pub fn referee_factor(avg_yellow_per_match: f64, cfg: &ScoringConfig) -> f64 {
    let league = &cfg.league;
    let ratio = if avg_yellow_per_match.is_finite() && avg_yellow_per_match > 0.0 {
        avg_yellow_per_match / league.avg_cards_per_match
    } else {
        1.0
    };
    ratio.clamp(league.referee_factor_min, league.referee_factor_max)
}

pub fn referee_profile(referee: &RefereeRecord, cfg: &ScoringConfig) -> RefereeProfile {
    RefereeProfile {
        name: referee.name.clone(),
        avg_yellow_per_match: referee.avg_yellow_per_match,
        factor: referee_factor(referee.avg_yellow_per_match, cfg),
        severity: severity_for(referee.avg_yellow_per_match, cfg),
    }
}

pub fn mean_cards<'a>(players: impl IntoIterator<Item = &'a PlayerRecord>) -> f64 {
    let (sum, count) = players
        .into_iter()
        .fold((0.0, 0usize), |(s, n), p| (s + p.yellow_cards as f64, n + 1));
    if count == 0 { 0.0 } else { sum / count as f64 }
}

/// Blend of card frequency, impulsiveness, speed to the first card and card
/// volume against the pool mean.
pub fn historical_score(player: &PlayerRecord, pool_mean_cards: f64, cfg: &ScoringConfig) -> f64 {
    let league = &cfg.league;
    let frequency = inverse_ratio(league.reference_nineties_per_card, player.nineties_per_card);
    let impulsiveness = inverse_ratio(league.reference_fouls_per_card, player.fouls_per_card);
    let minutes = player
        .minutes_to_first_card
        .unwrap_or(league.neutral_minutes_to_first_card);
    let speed = if league.card_clock_minutes > 0.0 {
        clip01(1.0 - minutes / league.card_clock_minutes)
    } else {
        0.0
    };
    let volume = if pool_mean_cards > 0.0 {
        clip01(player.yellow_cards as f64 / (2.0 * pool_mean_cards))
    } else {
        0.0
    };
    FREQUENCY_SHARE * frequency
        + IMPULSIVENESS_SHARE * impulsiveness
        + SPEED_SHARE * speed
        + VOLUME_SHARE * volume
}

pub fn foul_rate_score(player: &PlayerRecord, cfg: &ScoringConfig) -> f64 {
    clip01(player.fouls_committed_p90 / cfg.league.foul_rate_ceiling)
}

/// Every component except the matchup bonus, which needs the duel list.
pub fn base_components(
    player: &PlayerRecord,
    referee: &RefereeProfile,
    pool_mean_cards: f64,
    cfg: &ScoringConfig,
) -> RiskComponents {
    RiskComponents {
        historical: historical_score(player, pool_mean_cards, cfg),
        foul_rate: foul_rate_score(player, cfg),
        referee: referee.factor / cfg.league.referee_factor_max,
        positional: cfg.role_base.for_role(player.role),
        matchup_bonus: 0.0,
        venue: 1.0,
    }
}

/// Home advantage multiplier: `home_team` plays at home, everyone else away.
pub fn venue_factor(team: &str, home_team: &str, cfg: &ScoringConfig) -> f64 {
    if team == home_team {
        cfg.venue.home
    } else {
        cfg.venue.away
    }
}

pub fn raw_score(components: &RiskComponents, referee: &RefereeProfile, cfg: &ScoringConfig) -> f64 {
    let w = &cfg.weights;
    let bonus = components.matchup_bonus.clamp(0.0, cfg.matchups.bonus_cap);
    let core = w.historical * components.historical
        + w.foul_rate * components.foul_rate
        + w.positional * components.positional
        + w.matchup * bonus;
    let blended = match cfg.referee_blend {
        RefereeBlend::Additive => core + w.referee * components.referee,
        RefereeBlend::Multiplicative => core * referee.factor,
    };
    blended * components.venue
}

pub fn fair_odds(risk: f64, cfg: &ScoringConfig) -> f64 {
    if risk <= 0.0 || !risk.is_finite() {
        return cfg.odds_max;
    }
    (1.0 / risk).clamp(cfg.odds_min, cfg.odds_max)
}

/// A pool member whose components are known but whose risk is not yet
/// rescaled against the rest of the pool.
#[derive(Debug, Clone, PartialEq)]
pub struct PartialScore {
    pub record: PlayerRecord,
    pub components: RiskComponents,
}

/// Rescale by the pool maximum and clip to the configured band, then rank.
pub fn finalize_scores(
    partials: Vec<PartialScore>,
    referee: &RefereeProfile,
    cfg: &ScoringConfig,
) -> Vec<ScoredPlayer> {
    let raws: Vec<f64> = partials
        .iter()
        .map(|p| raw_score(&p.components, referee, cfg))
        .collect();
    let max_raw = raws
        .iter()
        .copied()
        .filter(|raw| raw.is_finite())
        .fold(0.0_f64, f64::max);
    let mut out: Vec<ScoredPlayer> = partials
        .into_iter()
        .zip(raws)
        .map(|(partial, raw)| {
            let relative = if max_raw > 0.0 && raw.is_finite() {
                raw / max_raw
            } else {
                0.0
            };
            let risk = relative.clamp(cfg.risk_floor, cfg.risk_ceiling);
            ScoredPlayer {
                record: partial.record,
                components: partial.components,
                raw,
                risk,
                fair_odds: fair_odds(risk, cfg),
            }
        })
        .collect();
    out.sort_by(rank_order);
    out
}

/// Risk descending, then team, then name.
pub fn rank_order(a: &ScoredPlayer, b: &ScoredPlayer) -> Ordering {
    b.risk
        .partial_cmp(&a.risk)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.record.team.cmp(&b.record.team))
        .then_with(|| a.record.name.cmp(&b.record.name))
}

/// Team fouls per 90 relative to the league average, capped.
pub fn team_aggression<'a>(
    players: impl IntoIterator<Item = &'a PlayerRecord>,
    cfg: &ScoringConfig,
) -> f64 {
    let (fouls, nineties) = players.into_iter().fold((0.0, 0.0), |(f, n), p| {
        (f + p.fouls_committed_p90 * p.nineties, n + p.nineties)
    });
    if nineties <= 0.0 {
        return 1.0_f64.min(cfg.selector.aggression_cap);
    }
    let per90 = fouls / nineties;
    (per90 / cfg.league.avg_fouls_committed_p90).clamp(0.0, cfg.selector.aggression_cap)
}
