use std::collections::{BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::config::ScoringConfig;
use crate::error::PoolError;
use crate::normalize::PlayerTable;
use crate::pipeline::{ShortlistRequest, compute_shortlist};
use crate::workbook::Dataset;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RoleCategory {
    Goalkeeper,
    Defender,
    Midfielder,
    Attacker,
}

impl RoleCategory {
    pub fn label(self) -> &'static str {
        match self {
            RoleCategory::Goalkeeper => "Goalkeeper",
            RoleCategory::Defender => "Defender",
            RoleCategory::Midfielder => "Midfielder",
            RoleCategory::Attacker => "Attacker",
        }
    }

    pub fn short(self) -> &'static str {
        match self {
            RoleCategory::Goalkeeper => "GK",
            RoleCategory::Defender => "DF",
            RoleCategory::Midfielder => "MF",
            RoleCategory::Attacker => "FW",
        }
    }
}

/// Where on the pitch a player spends most of the match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FieldZone {
    LeftFlank,
    RightFlank,
    CentralAttacking,
    CentralDefensive,
    CentralMidfield,
}

impl FieldZone {
    pub fn label(self) -> &'static str {
        match self {
            FieldZone::LeftFlank => "Left Flank",
            FieldZone::RightFlank => "Right Flank",
            FieldZone::CentralAttacking => "Central Attacking",
            FieldZone::CentralDefensive => "Central Defensive",
            FieldZone::CentralMidfield => "Central Midfield",
        }
    }

    /// Left against right: the two players face each other on the same touchline.
    pub fn mirrors(self, other: FieldZone) -> bool {
        matches!(
            (self, other),
            (FieldZone::LeftFlank, FieldZone::RightFlank) | (FieldZone::RightFlank, FieldZone::LeftFlank)
        )
    }
}

/// Identity of a player inside one workbook (names are unique per team).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PlayerKey {
    pub team: String,
    pub name: String,
}

impl PlayerKey {
    pub fn new(team: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            team: team.into(),
            name: name.into(),
        }
    }
}

/// Which foul rates were filled with league averages because the sheet had
/// nothing usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ImputedRates {
    pub fouls_committed: bool,
    pub fouls_suffered: bool,
}

/// One normalized spreadsheet row. Ratios that can be "never booked" hold
/// `f64::INFINITY`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub name: String,
    pub team: String,
    pub position: String,
    pub heatmap: String,
    pub nineties: f64,
    pub fouls_committed_p90: f64,
    pub fouls_suffered_p90: f64,
    pub yellow_cards: u32,
    pub fouls_per_card: f64,
    pub nineties_per_card: f64,
    pub minutes_to_first_card: Option<f64>,
    pub role: RoleCategory,
    pub zone: FieldZone,
    #[serde(default)]
    pub imputed: ImputedRates,
}

impl PlayerRecord {
    pub fn key(&self) -> PlayerKey {
        PlayerKey::new(self.team.clone(), self.name.clone())
    }

    pub fn is_eligible(&self, min_nineties: f64) -> bool {
        self.nineties >= min_nineties
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefereeRecord {
    pub name: String,
    pub avg_yellow_per_match: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Strict,
    Medium,
    Permissive,
}

impl Severity {
    pub fn label(self) -> &'static str {
        match self {
            Severity::Strict => "strict",
            Severity::Medium => "medium",
            Severity::Permissive => "permissive",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefereeProfile {
    pub name: String,
    pub avg_yellow_per_match: f64,
    /// Average over the league average, clamped to the configured band.
    pub factor: f64,
    pub severity: Severity,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskComponents {
    pub historical: f64,
    pub foul_rate: f64,
    pub referee: f64,
    pub positional: f64,
    pub matchup_bonus: f64,
    /// Home or away multiplier on the whole aggregate.
    pub venue: f64,
}

impl Default for RiskComponents {
    fn default() -> Self {
        Self {
            historical: 0.0,
            foul_rate: 0.0,
            referee: 0.0,
            positional: 0.0,
            matchup_bonus: 0.0,
            venue: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredPlayer {
    pub record: PlayerRecord,
    pub components: RiskComponents,
    pub raw: f64,
    pub risk: f64,
    pub fair_odds: f64,
}

impl ScoredPlayer {
    pub fn key(&self) -> PlayerKey {
        self.record.key()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchupCandidate {
    pub aggressor: PlayerKey,
    pub aggressor_role: RoleCategory,
    pub aggressor_zone: FieldZone,
    pub victim: PlayerKey,
    pub victim_role: RoleCategory,
    pub victim_zone: FieldZone,
    pub zone_score: f64,
    pub role_score: f64,
    pub compatibility: f64,
    pub mirrored: bool,
    /// Victim is among the match's most fouled players.
    pub priority_victim: bool,
    pub pair_risk: f64,
    pub bonus: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShortlistEntry {
    pub name: String,
    pub team: String,
    pub role: RoleCategory,
    pub risk: f64,
    pub fair_odds: f64,
}

impl ShortlistEntry {
    pub fn key(&self) -> PlayerKey {
        PlayerKey::new(self.team.clone(), self.name.clone())
    }
}

/// Which branch of the rebalancing rule produced the shortlist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BalanceDecision {
    Even,
    ForcedFromSweep,
    ForcedFromThreeOne,
    AcceptedThreeOne,
    Degenerate,
}

impl BalanceDecision {
    pub fn label(self) -> &'static str {
        match self {
            BalanceDecision::Even => "2-2 as ranked",
            BalanceDecision::ForcedFromSweep => "2-2 forced (4-0 ranking)",
            BalanceDecision::ForcedFromThreeOne => "2-2 forced (3-1 gap too small)",
            BalanceDecision::AcceptedThreeOne => "3-1 accepted (decisive gap)",
            BalanceDecision::Degenerate => "short side, filled by rank",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shortlist {
    pub entries: Vec<ShortlistEntry>,
    pub decision: BalanceDecision,
    pub margin: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TeamEligibility {
    pub team: String,
    pub eligible: usize,
    pub excluded_by_minutes: usize,
    pub excluded_by_user: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Confidence {
    High,
    Medium,
}

impl Confidence {
    pub fn label(self) -> &'static str {
        match self {
            Confidence::High => "High",
            Confidence::Medium => "Medium",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchReport {
    pub team_a: String,
    pub team_b: String,
    pub referee: RefereeProfile,
    /// Whole eligible pool, highest risk first.
    pub ranked: Vec<ScoredPlayer>,
    pub shortlist: Shortlist,
    pub duels: Vec<MatchupCandidate>,
    pub high_risk_victims: Vec<PlayerKey>,
    pub aggression_a: f64,
    pub aggression_b: f64,
    pub expected_cards: f64,
    pub confidence: Confidence,
    pub eligibility: Vec<TeamEligibility>,
}

/// Rows shown per team in the top-players view.
pub const TEAM_TOP: usize = 5;

impl MatchReport {
    /// A team's riskiest outfield players, in ranking order.
    pub fn team_top(&self, team: &str, n: usize) -> Vec<&ScoredPlayer> {
        self.ranked
            .iter()
            .filter(|p| p.record.team == team && p.record.role != RoleCategory::Goalkeeper)
            .take(n)
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Setup,
    Report,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupFocus {
    Home,
    Away,
    Referee,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFocus {
    Ranked,
    Shortlist,
}

/// Everything the terminal UI renders. Recomputation always goes through
/// [`compute_shortlist`] with a request rebuilt from these selections.
pub struct AppState {
    pub screen: Screen,
    pub setup_focus: SetupFocus,
    pub report_focus: ReportFocus,
    pub table: PlayerTable,
    pub teams: Vec<String>,
    pub referees: Vec<RefereeRecord>,
    pub home_idx: usize,
    pub away_idx: usize,
    pub referee_idx: usize,
    pub config: ScoringConfig,
    pub excluded: BTreeSet<PlayerKey>,
    pub report: Option<MatchReport>,
    pub ranked_selected: usize,
    pub shortlist_selected: usize,
    pub logs: VecDeque<String>,
    pub help_overlay: bool,
}

impl AppState {
    pub fn new(dataset: Dataset, config: ScoringConfig) -> Self {
        let teams = dataset.players.teams();
        let away_idx = if teams.len() > 1 { 1 } else { 0 };
        let mut state = Self {
            screen: Screen::Setup,
            setup_focus: SetupFocus::Home,
            report_focus: ReportFocus::Ranked,
            table: dataset.players,
            teams,
            referees: dataset.referees,
            home_idx: 0,
            away_idx,
            referee_idx: 0,
            config,
            excluded: BTreeSet::new(),
            report: None,
            ranked_selected: 0,
            shortlist_selected: 0,
            logs: VecDeque::new(),
            help_overlay: false,
        };
        for warning in &dataset.report.warnings {
            state.push_log(format!("[WARN] {warning}"));
        }
        state.push_log(format!(
            "[INFO] Loaded {} players in {} teams, {} referees",
            state.table.players.len(),
            state.teams.len(),
            state.referees.len()
        ));
        state
    }

    pub fn push_log(&mut self, msg: impl Into<String>) {
        const MAX_LOGS: usize = 200;
        self.logs.push_back(msg.into());
        while self.logs.len() > MAX_LOGS {
            self.logs.pop_front();
        }
    }

    pub fn home_team(&self) -> Option<&str> {
        self.teams.get(self.home_idx).map(String::as_str)
    }

    pub fn away_team(&self) -> Option<&str> {
        self.teams.get(self.away_idx).map(String::as_str)
    }

    pub fn referee(&self) -> Option<&RefereeRecord> {
        self.referees.get(self.referee_idx)
    }

    pub fn cycle_focus(&mut self) {
        match self.screen {
            Screen::Setup => {
                self.setup_focus = match self.setup_focus {
                    SetupFocus::Home => SetupFocus::Away,
                    SetupFocus::Away => SetupFocus::Referee,
                    SetupFocus::Referee => SetupFocus::Home,
                }
            }
            Screen::Report => {
                self.report_focus = match self.report_focus {
                    ReportFocus::Ranked => ReportFocus::Shortlist,
                    ReportFocus::Shortlist => ReportFocus::Ranked,
                }
            }
        }
    }

    pub fn select_next(&mut self) {
        self.move_selection(1);
    }

    pub fn select_prev(&mut self) {
        self.move_selection(-1);
    }

    fn move_selection(&mut self, step: isize) {
        let (len, cursor) = match (self.screen, self.setup_focus, self.report_focus) {
            (Screen::Setup, SetupFocus::Home, _) => (self.teams.len(), &mut self.home_idx),
            (Screen::Setup, SetupFocus::Away, _) => (self.teams.len(), &mut self.away_idx),
            (Screen::Setup, SetupFocus::Referee, _) => (self.referees.len(), &mut self.referee_idx),
            (Screen::Report, _, ReportFocus::Ranked) => (
                self.report.as_ref().map(|r| r.ranked.len()).unwrap_or(0),
                &mut self.ranked_selected,
            ),
            (Screen::Report, _, ReportFocus::Shortlist) => (
                self.report
                    .as_ref()
                    .map(|r| r.shortlist.entries.len())
                    .unwrap_or(0),
                &mut self.shortlist_selected,
            ),
        };
        if len == 0 {
            *cursor = 0;
            return;
        }
        let next = (*cursor as isize + step).rem_euclid(len as isize);
        *cursor = next as usize;
    }

    /// Request for the current selections, or `None` when the workbook lacks
    /// teams or referees.
    pub fn request(&self) -> Option<ShortlistRequest<'_>> {
        let home = self.home_team()?;
        let away = self.away_team()?;
        let referee = self.referee()?.clone();
        Some(
            ShortlistRequest::new(&self.table, home, away, referee, self.config.clone())
                .with_excluded(self.excluded.iter().cloned()),
        )
    }

    /// Fresh computation for a newly picked match: exclusions are cleared.
    pub fn start_match(&mut self) -> bool {
        self.excluded.clear();
        let ok = self.recompute();
        if ok {
            self.screen = Screen::Report;
            self.report_focus = ReportFocus::Ranked;
        }
        ok
    }

    pub fn recompute(&mut self) -> bool {
        let outcome = match self.request() {
            Some(request) => compute_shortlist(&request),
            None => {
                self.push_log("[WARN] Pick two teams and a referee first");
                return false;
            }
        };
        self.apply_outcome(outcome)
    }

    fn apply_outcome(&mut self, outcome: Result<MatchReport, PoolError>) -> bool {
        match outcome {
            Ok(report) => {
                let names: Vec<String> = report
                    .shortlist
                    .entries
                    .iter()
                    .map(|e| e.name.clone())
                    .collect();
                self.push_log(format!(
                    "[INFO] {} vs {}: top {} = {}",
                    report.team_a,
                    report.team_b,
                    names.len(),
                    names.join(", ")
                ));
                self.ranked_selected = self
                    .ranked_selected
                    .min(report.ranked.len().saturating_sub(1));
                self.shortlist_selected = self
                    .shortlist_selected
                    .min(report.shortlist.entries.len().saturating_sub(1));
                self.report = Some(report);
                true
            }
            Err(err) => {
                self.push_log(format!("[WARN] {err}"));
                false
            }
        }
    }

    pub fn selected_player(&self) -> Option<PlayerKey> {
        let report = self.report.as_ref()?;
        match self.report_focus {
            ReportFocus::Ranked => report.ranked.get(self.ranked_selected).map(|p| p.key()),
            ReportFocus::Shortlist => report
                .shortlist
                .entries
                .get(self.shortlist_selected)
                .map(|e| e.key()),
        }
    }

    /// Drop the highlighted player (e.g. not in the starting eleven) and
    /// recompute. A recomputation that fails leaves the exclusion undone.
    pub fn exclude_selected(&mut self) -> bool {
        let Some(key) = self.selected_player() else {
            self.push_log("[INFO] No player selected");
            return false;
        };
        if !self.excluded.insert(key.clone()) {
            return false;
        }
        if self.recompute() {
            self.push_log(format!("[INFO] Excluded {} ({})", key.name, key.team));
            true
        } else {
            self.excluded.remove(&key);
            false
        }
    }

    pub fn restore_all(&mut self) -> bool {
        if self.excluded.is_empty() {
            self.push_log("[INFO] Nothing to restore");
            return false;
        }
        let count = self.excluded.len();
        self.excluded.clear();
        let ok = self.recompute();
        if ok {
            self.push_log(format!("[INFO] Restored {count} excluded players"));
        }
        ok
    }
}
