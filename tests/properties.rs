use proptest::prelude::*;

use cardrisk_terminal::config::ScoringConfig;
use cardrisk_terminal::normalize::{PlayerTable, RawPlayerRow};
use cardrisk_terminal::pipeline::{ShortlistRequest, compute_shortlist};
use cardrisk_terminal::state::{BalanceDecision, RefereeRecord};

const POSITIONS: &[&str] = &[
    "GK", "CB", "LB", "RB", "LWB", "DM", "CM", "AM", "LW", "RW", "ST", "CF", "",
];

fn raw_row() -> impl Strategy<Value = RawPlayerRow> {
    (
        0usize..POSITIONS.len(),
        5.0f64..30.0,
        0.0f64..4.0,
        0.0f64..4.0,
        0u32..12,
        proptest::option::of(0.0f64..180.0),
    )
        .prop_map(|(pos, nineties, committed, suffered, cards, minutes)| RawPlayerRow {
            name: String::new(),
            position: POSITIONS[pos].to_string(),
            nineties: Some(nineties),
            fouls_committed_p90: Some(committed),
            fouls_suffered_p90: Some(suffered),
            yellow_cards: Some(cards as f64),
            minutes_to_first_card: minutes,
            ..RawPlayerRow::default()
        })
}

fn named(rows: Vec<RawPlayerRow>, prefix: &str) -> Vec<RawPlayerRow> {
    rows.into_iter()
        .enumerate()
        .map(|(idx, mut row)| {
            row.name = format!("{prefix}{idx}");
            row
        })
        .collect()
}

fn build_table(home: Vec<RawPlayerRow>, away: Vec<RawPlayerRow>, cfg: &ScoringConfig) -> PlayerTable {
    let mut table = PlayerTable::default();
    table.push_team("Home", &named(home, "H"), cfg);
    table.push_team("Away", &named(away, "A"), cfg);
    table
}

proptest! {
    #[test]
    fn risk_stays_in_band_and_duels_cross_teams(
        home in proptest::collection::vec(raw_row(), 1..10),
        away in proptest::collection::vec(raw_row(), 1..10),
        avg in 1.5f64..7.0,
    ) {
        let cfg = ScoringConfig::default();
        let table = build_table(home, away, &cfg);
        let referee = RefereeRecord { name: "R".to_string(), avg_yellow_per_match: avg };
        let request = ShortlistRequest::new(&table, "Home", "Away", referee, cfg.clone());
        let report = compute_shortlist(&request).expect("both squads are eligible");

        for p in &report.ranked {
            prop_assert!(p.risk >= cfg.risk_floor && p.risk <= cfg.risk_ceiling);
            prop_assert!(p.fair_odds >= cfg.odds_min && p.fair_odds <= cfg.odds_max);
        }
        for d in &report.duels {
            prop_assert_ne!(&d.aggressor.team, &d.victim.team);
        }
        prop_assert!(report.duels.len() <= cfg.matchups.max_pairs);
    }

    #[test]
    fn shortlist_is_balanced_unless_the_gap_is_decisive(
        home in proptest::collection::vec(raw_row(), 2..10),
        away in proptest::collection::vec(raw_row(), 2..10),
        avg in 1.5f64..7.0,
    ) {
        let cfg = ScoringConfig::default();
        let table = build_table(home, away, &cfg);
        let referee = RefereeRecord { name: "R".to_string(), avg_yellow_per_match: avg };
        let request = ShortlistRequest::new(&table, "Home", "Away", referee, cfg.clone());
        let report = compute_shortlist(&request).expect("both squads are eligible");
        let list = &report.shortlist;

        prop_assert_eq!(list.entries.len(), 4);
        let home_count = list.entries.iter().filter(|e| e.team == "Home").count();
        prop_assert!((1..=3).contains(&home_count));

        if home_count != 2 {
            prop_assert_eq!(list.decision, BalanceDecision::AcceptedThreeOne);
            let (dominant, minority) = if home_count == 3 { ("Home", "Away") } else { ("Away", "Home") };
            let risks = |team: &str| -> Vec<f64> {
                report.ranked.iter().filter(|p| p.record.team == team).map(|p| p.risk).collect()
            };
            let gap = risks(dominant)[2] - risks(minority)[1];
            prop_assert!(gap > list.margin);
        }
    }

    #[test]
    fn exclusion_never_reselects_and_recompute_is_stable(
        home in proptest::collection::vec(raw_row(), 3..10),
        away in proptest::collection::vec(raw_row(), 3..10),
        pick in 0usize..4,
    ) {
        let cfg = ScoringConfig::default();
        let table = build_table(home, away, &cfg);
        let referee = RefereeRecord { name: "R".to_string(), avg_yellow_per_match: 4.2 };
        let request = ShortlistRequest::new(&table, "Home", "Away", referee, cfg);
        let before = compute_shortlist(&request).expect("before");
        prop_assert_eq!(&before, &compute_shortlist(&request).expect("again"));

        let dropped = before.shortlist.entries[pick].key();
        let after = compute_shortlist(&request.excluding(dropped.clone())).expect("after");
        prop_assert!(after.shortlist.entries.iter().all(|e| e.key() != dropped));
        prop_assert!(after.ranked.iter().all(|p| p.key() != dropped));
    }
}
