use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, warn};

use crate::config::ScoringConfig;
use crate::state::{FieldZone, ImputedRates, PlayerKey, PlayerRecord, RoleCategory};

/// One team-sheet row after column resolution, before defaults are applied.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawPlayerRow {
    pub name: String,
    pub position: String,
    pub heatmap: String,
    pub nineties: Option<f64>,
    pub fouls_committed_p90: Option<f64>,
    pub fouls_committed_total: Option<f64>,
    pub fouls_suffered_p90: Option<f64>,
    pub fouls_suffered_seasonal_p90: Option<f64>,
    pub yellow_cards: Option<f64>,
    pub nineties_per_card: Option<f64>,
    pub fouls_per_card: Option<f64>,
    pub minutes_to_first_card: Option<f64>,
}

/// Eligible players of every team plus how many each team lost to the
/// minutes threshold.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlayerTable {
    pub players: Vec<PlayerRecord>,
    pub excluded_by_minutes: BTreeMap<String, usize>,
}

impl PlayerTable {
    /// Team names in first-seen order, including teams whose whole squad was
    /// filtered out.
    pub fn teams(&self) -> Vec<String> {
        let mut seen = BTreeSet::new();
        let mut out = Vec::new();
        for p in &self.players {
            if seen.insert(p.team.as_str()) {
                out.push(p.team.clone());
            }
        }
        for team in self.excluded_by_minutes.keys() {
            if seen.insert(team.as_str()) {
                out.push(team.clone());
            }
        }
        out
    }

    pub fn has_team(&self, team: &str) -> bool {
        self.excluded_by_minutes.contains_key(team) || self.players.iter().any(|p| p.team == team)
    }

    pub fn players_of<'s>(&'s self, team: &str) -> impl Iterator<Item = &'s PlayerRecord> {
        self.players.iter().filter(move |p| p.team == team)
    }

    pub fn excluded_for(&self, team: &str) -> usize {
        self.excluded_by_minutes.get(team).copied().unwrap_or(0)
    }

    /// Normalize one sheet's rows and add the eligible ones.
    pub fn push_team(&mut self, team: &str, rows: &[RawPlayerRow], cfg: &ScoringConfig) -> usize {
        let mut seen: BTreeSet<PlayerKey> = self
            .players_of(team)
            .map(|p| p.key())
            .collect();
        let mut dropped = 0usize;
        let mut added = 0usize;
        for row in rows {
            let record = normalize_row(team, row, cfg);
            if !record.is_eligible(cfg.min_nineties) {
                debug!(
                    player = %record.name,
                    team,
                    nineties = record.nineties,
                    "below minutes threshold"
                );
                dropped += 1;
                continue;
            }
            if !seen.insert(record.key()) {
                warn!(player = %record.name, team, "duplicate player row ignored");
                continue;
            }
            self.players.push(record);
            added += 1;
        }
        *self.excluded_by_minutes.entry(team.to_string()).or_insert(0) += dropped;
        added
    }
}

pub fn normalize_row(team: &str, raw: &RawPlayerRow, cfg: &ScoringConfig) -> PlayerRecord {
    let league = &cfg.league;
    let nineties = non_negative(raw.nineties).unwrap_or(0.0);

    let committed = non_negative(raw.fouls_committed_p90).or_else(|| {
        let total = non_negative(raw.fouls_committed_total)?;
        (nineties > 0.0).then(|| total / nineties)
    });

    // The all-competitions figure wins unless it is blank or zero.
    let suffered = non_negative(raw.fouls_suffered_p90)
        .filter(|v| *v > 0.0)
        .or_else(|| non_negative(raw.fouls_suffered_seasonal_p90).filter(|v| *v > 0.0))
        .or_else(|| non_negative(raw.fouls_suffered_p90));

    let imputed = ImputedRates {
        fouls_committed: committed.is_none(),
        fouls_suffered: suffered.is_none(),
    };
    if imputed.fouls_committed || imputed.fouls_suffered {
        debug!(player = %raw.name.trim(), team, ?imputed, "foul rates filled with league averages");
    }
    let fouls_committed_p90 = committed.unwrap_or(league.avg_fouls_committed_p90);
    let fouls_suffered_p90 = suffered.unwrap_or(league.avg_fouls_suffered_p90);

    let yellow_cards = non_negative(raw.yellow_cards)
        .filter(|v| v.is_finite())
        .map(|v| v.round() as u32)
        .unwrap_or(0);

    let nineties_per_card = positive_ratio(raw.nineties_per_card).unwrap_or_else(|| {
        if yellow_cards > 0 && nineties > 0.0 {
            nineties / yellow_cards as f64
        } else {
            f64::INFINITY
        }
    });

    let fouls_per_card = positive_ratio(raw.fouls_per_card).unwrap_or_else(|| {
        let fouls_total = raw
            .fouls_committed_total
            .or_else(|| raw.fouls_committed_p90.map(|p90| p90 * nineties))
            .and_then(|v| non_negative(Some(v)));
        match fouls_total {
            Some(total) if yellow_cards > 0 && total > 0.0 => total / yellow_cards as f64,
            _ => f64::INFINITY,
        }
    });

    let minutes_to_first_card = non_negative(raw.minutes_to_first_card).filter(|v| v.is_finite());

    let role = role_from_position(&raw.position);
    let zone = zone_from(&raw.position, &raw.heatmap, role);

    PlayerRecord {
        name: raw.name.trim().to_string(),
        team: team.to_string(),
        position: raw.position.trim().to_string(),
        heatmap: raw.heatmap.trim().to_string(),
        nineties,
        fouls_committed_p90,
        fouls_suffered_p90,
        yellow_cards,
        fouls_per_card,
        nineties_per_card,
        minutes_to_first_card,
        role,
        zone,
        imputed,
    }
}

fn non_negative(v: Option<f64>) -> Option<f64> {
    v.filter(|x| !x.is_nan() && *x >= 0.0)
}

fn positive_ratio(v: Option<f64>) -> Option<f64> {
    v.filter(|x| !x.is_nan() && *x > 0.0)
}

/// Parse a spreadsheet number written as text. `"-"` and blanks are missing,
/// `inf`/`∞` is the never-booked sentinel. With both separators present the
/// last one is the decimal mark. A single comma or dot is a decimal mark,
/// a repeated one groups thousands.
pub fn parse_number(raw: &str) -> Option<f64> {
    let s = raw.trim();
    if s.is_empty() || s == "-" || s == "—" {
        return None;
    }
    let lower = s.to_lowercase();
    if lower == "inf" || lower == "infinity" || lower == "∞" || lower == "+inf" {
        return Some(f64::INFINITY);
    }
    let s = s.trim_end_matches('%');
    // Strip common decorations.
    let cleaned: String = s
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-' || *c == ',')
        .collect();
    let decimal = match (cleaned.rfind(','), cleaned.rfind('.')) {
        (Some(comma), Some(dot)) => Some(comma.max(dot)),
        (Some(comma), None) => (cleaned.matches(',').count() == 1).then_some(comma),
        (None, Some(dot)) => (cleaned.matches('.').count() == 1).then_some(dot),
        (None, None) => None,
    };
    let cleaned: String = cleaned
        .char_indices()
        .filter_map(|(idx, c)| match c {
            ',' | '.' if Some(idx) == decimal => Some('.'),
            ',' | '.' => None,
            other => Some(other),
        })
        .collect();
    if cleaned.is_empty() || cleaned == "-" {
        return None;
    }
    cleaned.parse::<f64>().ok()
}

/// Split a position string into upper-case tokens; the first token is the
/// primary position.
fn position_tokens(position: &str) -> Vec<String> {
    position
        .split(|c: char| c == ',' || c == '/' || c == '-' || c == ';' || c.is_whitespace())
        .map(|t| t.trim().to_uppercase())
        .filter(|t| !t.is_empty())
        .collect()
}

const GOALKEEPER_TOKENS: &[&str] = &["GK", "POR", "G", "P"];
const DEFENDER_TOKENS: &[&str] = &[
    "DF", "D", "CB", "DC", "LB", "RB", "LWB", "RWB", "WB", "FB", "TD", "TS", "DIF",
];
const ATTACKER_TOKENS: &[&str] = &[
    "FW", "A", "ST", "CF", "SS", "LW", "RW", "W", "ATT", "AS", "ALA",
];

pub fn role_from_position(position: &str) -> RoleCategory {
    let tokens = position_tokens(position);
    let Some(primary) = tokens.first() else {
        return RoleCategory::Midfielder;
    };
    let lower = position.to_lowercase();
    if GOALKEEPER_TOKENS.contains(&primary.as_str())
        || lower.contains("goalkeeper")
        || lower.contains("keeper")
        || lower.contains("portiere")
    {
        return RoleCategory::Goalkeeper;
    }
    if DEFENDER_TOKENS.contains(&primary.as_str())
        || lower.starts_with("defender")
        || lower.starts_with("difensore")
        || lower.contains("back")
        || lower.starts_with("terzino")
    {
        return RoleCategory::Defender;
    }
    if ATTACKER_TOKENS.contains(&primary.as_str())
        || lower.contains("wing")
        || lower.contains("forward")
        || lower.contains("striker")
        || lower.contains("attacc")
        || lower.contains("punta")
    {
        return RoleCategory::Attacker;
    }
    RoleCategory::Midfielder
}

fn zone_from_token(token: &str) -> Option<FieldZone> {
    match token {
        "LB" | "LWB" | "LM" | "LW" | "LDM" | "TS" => Some(FieldZone::LeftFlank),
        "RB" | "RWB" | "RM" | "RW" | "RDM" | "TD" => Some(FieldZone::RightFlank),
        "CB" | "DC" | "DM" | "CDM" => Some(FieldZone::CentralDefensive),
        "ST" | "CF" | "SS" | "AM" | "CAM" => Some(FieldZone::CentralAttacking),
        "CM" => Some(FieldZone::CentralMidfield),
        _ => None,
    }
}

fn zone_from_heatmap(heatmap: &str) -> Option<FieldZone> {
    let h = heatmap.to_lowercase();
    if h.is_empty() {
        return None;
    }
    let any = |terms: &[&str]| terms.iter().any(|t| h.contains(t));
    if any(&["left", "sinistra"]) {
        return Some(FieldZone::LeftFlank);
    }
    if any(&["right", "destra"]) {
        return Some(FieldZone::RightFlank);
    }
    if any(&["attacking third", "final third", "penalty area", "box", "trequarti"]) {
        return Some(FieldZone::CentralAttacking);
    }
    if any(&["defensive third", "own half", "difensiva"]) {
        return Some(FieldZone::CentralDefensive);
    }
    if any(&["central", "centrale", "midfield", "half spaces"]) {
        return Some(FieldZone::CentralMidfield);
    }
    None
}

/// Position tokens first (codes, then spelled-out words such as "Left
/// Winger"), then the heatmap description, then the role's natural zone.
pub fn zone_from(position: &str, heatmap: &str, role: RoleCategory) -> FieldZone {
    if let Some(zone) = position_tokens(position).iter().find_map(|t| zone_from_token(t)) {
        return zone;
    }
    if let Some(zone) = zone_from_heatmap(position).or_else(|| zone_from_heatmap(heatmap)) {
        return zone;
    }
    match role {
        RoleCategory::Defender => FieldZone::CentralDefensive,
        RoleCategory::Attacker => FieldZone::CentralAttacking,
        RoleCategory::Goalkeeper | RoleCategory::Midfielder => FieldZone::CentralMidfield,
    }
}
