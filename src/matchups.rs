use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::config::ScoringConfig;
use crate::risk::{PartialScore, clip01};
use crate::state::{FieldZone, MatchupCandidate, PlayerKey, RoleCategory};

const VICTIM_SHARE_OF_PAIR: f64 = 0.35;
const AGGRESSOR_SHARE_OF_PAIR: f64 = 0.35;
const HISTORY_SHARE_OF_PAIR: f64 = 0.30;

/// How likely two zones meet on the pitch, aggressor zone first. Zones are
/// described from each player's own side, so a left-back meets the
/// opposing right winger.
pub fn zone_compatibility(aggressor: FieldZone, victim: FieldZone) -> f64 {
    use FieldZone::*;
    if aggressor.mirrors(victim) {
        return 0.95;
    }
    match (aggressor, victim) {
        (LeftFlank, LeftFlank) | (RightFlank, RightFlank) => 0.20,
        (CentralDefensive, CentralAttacking) => 0.92,
        (CentralAttacking, CentralDefensive) => 0.80,
        (CentralMidfield, CentralMidfield) => 0.80,
        (LeftFlank | RightFlank, CentralDefensive) | (CentralDefensive, LeftFlank | RightFlank) => {
            0.70
        }
        (CentralMidfield, CentralAttacking) | (CentralAttacking, CentralMidfield) => 0.65,
        (CentralMidfield, CentralDefensive) | (CentralDefensive, CentralMidfield) => 0.60,
        (LeftFlank | RightFlank, CentralMidfield) | (CentralMidfield, LeftFlank | RightFlank) => {
            0.50
        }
        (LeftFlank | RightFlank, CentralAttacking) | (CentralAttacking, LeftFlank | RightFlank) => {
            0.45
        }
        (CentralDefensive, CentralDefensive) | (CentralAttacking, CentralAttacking) => 0.30,
        _ => 0.40,
    }
}

pub fn role_compatibility(aggressor: RoleCategory, victim: RoleCategory) -> f64 {
    use RoleCategory::*;
    match (aggressor, victim) {
        (Defender, Attacker) => 1.0,
        (Midfielder, Attacker) => 0.8,
        (Defender, Midfielder) => 0.7,
        (Midfielder, Midfielder) => 0.6,
        (Defender, Defender) => 0.2,
        (Goalkeeper, _) | (_, Goalkeeper) => 0.1,
        _ => 0.4,
    }
}

fn by_rate_desc(a: f64, b: f64, ka: &str, kb: &str) -> Ordering {
    b.partial_cmp(&a).unwrap_or(Ordering::Equal).then_with(|| ka.cmp(kb))
}

fn aggressors<'a>(pool: &'a [PartialScore], team: &str, cfg: &ScoringConfig) -> Vec<&'a PartialScore> {
    let params = &cfg.matchups;
    let mut out: Vec<&PartialScore> = pool
        .iter()
        .filter(|p| p.record.team == team)
        .filter(|p| matches!(p.record.role, RoleCategory::Defender | RoleCategory::Midfielder))
        .filter(|p| !p.record.imputed.fouls_committed)
        .filter(|p| p.record.fouls_committed_p90 > params.aggressor_min_fouls_p90)
        .collect();
    out.sort_by(|a, b| {
        by_rate_desc(
            a.record.fouls_committed_p90,
            b.record.fouls_committed_p90,
            &a.record.name,
            &b.record.name,
        )
    });
    out.truncate(params.candidates_per_side);
    out
}

fn victims<'a>(pool: &'a [PartialScore], team: &str, cfg: &ScoringConfig) -> Vec<&'a PartialScore> {
    let params = &cfg.matchups;
    let mut out: Vec<&PartialScore> = pool
        .iter()
        .filter(|p| p.record.team == team)
        .filter(|p| matches!(p.record.role, RoleCategory::Attacker | RoleCategory::Midfielder))
        .filter(|p| !p.record.imputed.fouls_suffered)
        .filter(|p| p.record.fouls_suffered_p90 > params.victim_min_fouls_suffered_p90)
        .collect();
    out.sort_by(|a, b| {
        by_rate_desc(
            a.record.fouls_suffered_p90,
            b.record.fouls_suffered_p90,
            &a.record.name,
            &b.record.name,
        )
    });
    out.truncate(params.candidates_per_side);
    out
}

/// Linear interpolation between closest ranks; `sorted` must be ascending
/// and non-empty.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

/// Players whose measured fouls suffered per 90 sit at or above the
/// configured quantile of their own team. Imputed rates never qualify.
pub fn high_risk_victims(pool: &[PartialScore], cfg: &ScoringConfig) -> BTreeSet<PlayerKey> {
    let mut by_team: BTreeMap<&str, Vec<&PartialScore>> = BTreeMap::new();
    for p in pool.iter().filter(|p| {
        !p.record.imputed.fouls_suffered
            && p.record.fouls_suffered_p90.is_finite()
            && p.record.fouls_suffered_p90 > 0.0
    }) {
        by_team.entry(p.record.team.as_str()).or_default().push(p);
    }
    let mut flagged = BTreeSet::new();
    for (team, members) in by_team {
        let mut rates: Vec<f64> = members.iter().map(|p| p.record.fouls_suffered_p90).collect();
        rates.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
        let threshold = quantile(&rates, cfg.matchups.high_risk_victim_quantile);
        let before = flagged.len();
        flagged.extend(
            members
                .iter()
                .filter(|p| p.record.fouls_suffered_p90 >= threshold)
                .map(|p| p.record.key()),
        );
        debug!(team, threshold, flagged = flagged.len() - before, "high-risk victims");
    }
    flagged
}

fn pair(
    aggressor: &PartialScore,
    victim: &PartialScore,
    priority: &BTreeSet<PlayerKey>,
    cfg: &ScoringConfig,
) -> Option<MatchupCandidate> {
    let params = &cfg.matchups;
    let league = &cfg.league;
    let (a, v) = (&aggressor.record, &victim.record);
    if a.team == v.team {
        return None;
    }
    let zone_score = zone_compatibility(a.zone, v.zone);
    let role_score = role_compatibility(a.role, v.role);
    let compatibility = params.zone_weight * zone_score + (1.0 - params.zone_weight) * role_score;
    if compatibility < params.min_compatibility {
        return None;
    }
    let mirrored = a.zone.mirrors(v.zone);
    let priority_victim = priority.contains(&v.key());
    let mut victim_term =
        VICTIM_SHARE_OF_PAIR * clip01(v.fouls_suffered_p90 / league.foul_rate_ceiling);
    if priority_victim {
        victim_term *= params.victim_priority_bonus;
    }
    let mut pair_risk = compatibility
        * (victim_term
            + AGGRESSOR_SHARE_OF_PAIR * clip01(a.fouls_committed_p90 / league.foul_rate_ceiling)
            + HISTORY_SHARE_OF_PAIR * clip01(aggressor.components.historical));
    if mirrored {
        pair_risk *= params.mirrored_multiplier;
    }
    Some(MatchupCandidate {
        aggressor: a.key(),
        aggressor_role: a.role,
        aggressor_zone: a.zone,
        victim: v.key(),
        victim_role: v.role,
        victim_zone: v.zone,
        zone_score,
        role_score,
        compatibility,
        mirrored,
        priority_victim,
        pair_risk,
        bonus: clip01(pair_risk) * params.bonus_cap,
    })
}

/// Plausible aggressor/victim duels in both directions, strongest first.
/// Players of the same team are never paired.
pub fn find_matchups(
    pool: &[PartialScore],
    team_a: &str,
    team_b: &str,
    cfg: &ScoringConfig,
) -> Vec<MatchupCandidate> {
    let priority = high_risk_victims(pool, cfg);
    let mut duels = Vec::new();
    for (attacking, defending) in [(team_a, team_b), (team_b, team_a)] {
        let victim_list = victims(pool, defending, cfg);
        for aggressor in aggressors(pool, attacking, cfg) {
            duels.extend(
                victim_list
                    .iter()
                    .filter_map(|victim| pair(aggressor, victim, &priority, cfg)),
            );
        }
    }
    duels.sort_by(|a, b| {
        b.pair_risk
            .partial_cmp(&a.pair_risk)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.aggressor.cmp(&b.aggressor))
            .then_with(|| a.victim.cmp(&b.victim))
    });
    duels.truncate(cfg.matchups.max_pairs);
    for duel in &duels {
        debug!(
            aggressor = %duel.aggressor.name,
            victim = %duel.victim.name,
            compatibility = duel.compatibility,
            pair_risk = duel.pair_risk,
            "duel"
        );
    }
    duels
}

/// Per-player bonus: the largest pair touching the player, full for the
/// aggressor and a share for the victim. Never summed across pairs.
pub fn matchup_bonuses(duels: &[MatchupCandidate], cfg: &ScoringConfig) -> BTreeMap<PlayerKey, f64> {
    let mut out: BTreeMap<PlayerKey, f64> = BTreeMap::new();
    let mut raise = |key: &PlayerKey, value: f64| {
        let slot = out.entry(key.clone()).or_insert(0.0);
        if value > *slot {
            *slot = value;
        }
    };
    for duel in duels {
        raise(&duel.aggressor, duel.bonus);
        raise(&duel.victim, duel.bonus * cfg.matchups.victim_share);
    }
    out
}
