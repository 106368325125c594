use crate::config::ScoringConfig;
use crate::risk::{rank_order, team_aggression};
use crate::state::{BalanceDecision, ScoredPlayer, Shortlist, ShortlistEntry};

impl From<&ScoredPlayer> for ShortlistEntry {
    fn from(p: &ScoredPlayer) -> Self {
        ShortlistEntry {
            name: p.record.name.clone(),
            team: p.record.team.clone(),
            role: p.record.role,
            risk: p.risk,
            fair_odds: p.fair_odds,
        }
    }
}

/// Gap the dominant side must clear to keep an unbalanced split, narrowed
/// by the team-aggression gap down to the floor.
pub fn dominance_margin(aggression_a: f64, aggression_b: f64, cfg: &ScoringConfig) -> f64 {
    let s = &cfg.selector;
    (s.dominance_margin - s.aggression_narrowing * (aggression_a - aggression_b).abs())
        .max(s.margin_floor)
}

fn top_of_each<'a>(
    side_a: &[&'a ScoredPlayer],
    side_b: &[&'a ScoredPlayer],
    per_side: usize,
) -> Vec<&'a ScoredPlayer> {
    side_a
        .iter()
        .take(per_side)
        .chain(side_b.iter().take(per_side))
        .copied()
        .collect()
}

fn finish(mut picked: Vec<&ScoredPlayer>, decision: BalanceDecision, margin: f64) -> Shortlist {
    picked.sort_by(|a, b| rank_order(a, b));
    Shortlist {
        entries: picked.into_iter().map(ShortlistEntry::from).collect(),
        decision,
        margin,
    }
}

/// Pick the shortlist from the ranked pool, preferring an even split between
/// the two teams. Depends on nothing but its arguments.
pub fn select_shortlist(
    pool: &[ScoredPlayer],
    team_a: &str,
    team_b: &str,
    cfg: &ScoringConfig,
) -> Shortlist {
    let size = cfg.selector.shortlist_size;
    let half = size / 2;

    let mut ranked: Vec<&ScoredPlayer> = pool
        .iter()
        .filter(|p| p.record.team == team_a || p.record.team == team_b)
        .collect();
    ranked.sort_by(|a, b| rank_order(a, b));

    let side_a: Vec<&ScoredPlayer> = ranked
        .iter()
        .copied()
        .filter(|p| p.record.team == team_a)
        .collect();
    let side_b: Vec<&ScoredPlayer> = ranked
        .iter()
        .copied()
        .filter(|p| p.record.team == team_b)
        .collect();

    let margin = dominance_margin(
        team_aggression(side_a.iter().map(|p| &p.record), cfg),
        team_aggression(side_b.iter().map(|p| &p.record), cfg),
        cfg,
    );

    if side_a.len() < half || side_b.len() < half {
        let mut picked = top_of_each(&side_a, &side_b, half);
        for p in ranked.iter().copied() {
            if picked.len() >= size {
                break;
            }
            if !picked.iter().any(|q| std::ptr::eq(*q, p)) {
                picked.push(p);
            }
        }
        picked.truncate(size);
        return finish(picked, BalanceDecision::Degenerate, margin);
    }

    let naive: Vec<&ScoredPlayer> = ranked.iter().take(size).copied().collect();
    let count_a = naive.iter().filter(|p| p.record.team == team_a).count();
    let count_b = naive.len() - count_a;

    if count_a == count_b {
        return finish(naive, BalanceDecision::Even, margin);
    }
    if count_a == 0 || count_b == 0 {
        return finish(
            top_of_each(&side_a, &side_b, half),
            BalanceDecision::ForcedFromSweep,
            margin,
        );
    }

    let (dominant, minority) = if count_a > count_b {
        (&side_a, &side_b)
    } else {
        (&side_b, &side_a)
    };
    let dominant_next = dominant.get(half).map(|p| p.risk).unwrap_or(0.0);
    let minority_last = minority.get(half.saturating_sub(1)).map(|p| p.risk).unwrap_or(0.0);
    if dominant_next - minority_last > margin {
        finish(naive, BalanceDecision::AcceptedThreeOne, margin)
    } else {
        finish(
            top_of_each(&side_a, &side_b, half),
            BalanceDecision::ForcedFromThreeOne,
            margin,
        )
    }
}
