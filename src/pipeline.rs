use std::collections::BTreeSet;

use tracing::info;

use crate::config::ScoringConfig;
use crate::error::PoolError;
use crate::matchups::{find_matchups, high_risk_victims, matchup_bonuses};
use crate::normalize::PlayerTable;
use crate::risk::{
    PartialScore, base_components, finalize_scores, mean_cards, referee_profile, team_aggression,
    venue_factor,
};
use crate::shortlist::select_shortlist;
use crate::state::{
    Confidence, MatchReport, PlayerKey, PlayerRecord, RefereeRecord, RiskComponents,
    TeamEligibility,
};

/// Duels needed before the summary calls its confidence high.
const HIGH_CONFIDENCE_DUELS: usize = 3;

/// Everything one computation depends on. Excluding a player means building
/// a new request; nothing is cached between calls.
#[derive(Debug, Clone)]
pub struct ShortlistRequest<'a> {
    pub pool: &'a PlayerTable,
    pub team_a: String,
    pub team_b: String,
    pub referee: RefereeRecord,
    pub excluded: BTreeSet<PlayerKey>,
    pub config: ScoringConfig,
}

impl<'a> ShortlistRequest<'a> {
    pub fn new(
        pool: &'a PlayerTable,
        team_a: impl Into<String>,
        team_b: impl Into<String>,
        referee: RefereeRecord,
        config: ScoringConfig,
    ) -> Self {
        Self {
            pool,
            team_a: team_a.into(),
            team_b: team_b.into(),
            referee,
            excluded: BTreeSet::new(),
            config,
        }
    }

    pub fn with_excluded(mut self, keys: impl IntoIterator<Item = PlayerKey>) -> Self {
        self.excluded.extend(keys);
        self
    }

    /// Same request with one more player left out.
    pub fn excluding(&self, key: PlayerKey) -> Self {
        let mut next = self.clone();
        next.excluded.insert(key);
        next
    }
}

fn team_pool<'r>(
    request: &'r ShortlistRequest<'_>,
    team: &str,
) -> Result<(Vec<&'r PlayerRecord>, TeamEligibility), PoolError> {
    if !request.pool.has_team(team) {
        return Err(PoolError::UnknownTeam(team.to_string()));
    }
    let cfg = &request.config;
    let mut excluded_by_minutes = request.pool.excluded_for(team);
    let mut excluded_by_user = 0usize;
    let mut players = Vec::new();
    for p in request.pool.players_of(team) {
        if !p.is_eligible(cfg.min_nineties) {
            excluded_by_minutes += 1;
        } else if request.excluded.contains(&p.key()) {
            excluded_by_user += 1;
        } else {
            players.push(p);
        }
    }
    let eligibility = TeamEligibility {
        team: team.to_string(),
        eligible: players.len(),
        excluded_by_minutes,
        excluded_by_user,
    };
    if players.len() < cfg.min_players_per_team.max(1) {
        return Err(PoolError::InsufficientPool {
            team: eligibility.team,
            eligible: eligibility.eligible,
            excluded_by_minutes,
            excluded_by_user,
        });
    }
    Ok((players, eligibility))
}

/// Score both squads, find the duels and pick the shortlist. `team_a` is
/// the home side.
pub fn compute_shortlist(request: &ShortlistRequest<'_>) -> Result<MatchReport, PoolError> {
    let cfg = &request.config;
    let (team_a, team_b) = (request.team_a.as_str(), request.team_b.as_str());
    if team_a == team_b {
        return Err(PoolError::SameTeam(team_a.to_string()));
    }
    let (players_a, eligibility_a) = team_pool(request, team_a)?;
    let (players_b, eligibility_b) = team_pool(request, team_b)?;

    let referee = referee_profile(&request.referee, cfg);
    let everyone: Vec<&PlayerRecord> = players_a.iter().chain(players_b.iter()).copied().collect();
    let pool_mean = mean_cards(everyone.iter().copied());

    let mut partials: Vec<PartialScore> = everyone
        .iter()
        .map(|p| PartialScore {
            record: (*p).clone(),
            components: RiskComponents {
                venue: venue_factor(&p.team, team_a, cfg),
                ..base_components(p, &referee, pool_mean, cfg)
            },
        })
        .collect();

    let priority_victims: Vec<PlayerKey> =
        high_risk_victims(&partials, cfg).into_iter().collect();
    let duels = find_matchups(&partials, team_a, team_b, cfg);
    let bonuses = matchup_bonuses(&duels, cfg);
    for partial in &mut partials {
        if let Some(bonus) = bonuses.get(&partial.record.key()) {
            partial.components.matchup_bonus = *bonus;
        }
    }

    let ranked = finalize_scores(partials, &referee, cfg);
    let shortlist = select_shortlist(&ranked, team_a, team_b, cfg);

    let mean_risk = if ranked.is_empty() {
        0.0
    } else {
        ranked.iter().map(|p| p.risk).sum::<f64>() / ranked.len() as f64
    };
    let expected_cards =
        (referee.avg_yellow_per_match * (1.0 + mean_risk)).min(cfg.league.expected_cards_cap);
    let confidence = if duels.len() >= HIGH_CONFIDENCE_DUELS {
        Confidence::High
    } else {
        Confidence::Medium
    };

    info!(
        team_a,
        team_b,
        referee = %referee.name,
        pool = ranked.len(),
        duels = duels.len(),
        decision = shortlist.decision.label(),
        "shortlist computed"
    );

    Ok(MatchReport {
        team_a: team_a.to_string(),
        team_b: team_b.to_string(),
        aggression_a: team_aggression(players_a.iter().copied(), cfg),
        aggression_b: team_aggression(players_b.iter().copied(), cfg),
        referee,
        ranked,
        shortlist,
        duels,
        high_risk_victims: priority_victims,
        expected_cards,
        confidence,
        eligibility: vec![eligibility_a, eligibility_b],
    })
}
