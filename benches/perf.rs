use criterion::{Criterion, criterion_group, criterion_main};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::hint::black_box;

use cardrisk_terminal::columns::{PLAYER_COLUMNS, resolve_schema};
use cardrisk_terminal::config::ScoringConfig;
use cardrisk_terminal::matchups::find_matchups;
use cardrisk_terminal::normalize::{PlayerTable, RawPlayerRow, parse_number};
use cardrisk_terminal::pipeline::{ShortlistRequest, compute_shortlist};
use cardrisk_terminal::risk::{PartialScore, base_components, mean_cards, referee_profile};
use cardrisk_terminal::state::{PlayerRecord, RefereeRecord};

const POSITIONS: &[&str] = &["GK", "CB", "LB", "RB", "DM", "CM", "AM", "LW", "RW", "ST"];

fn random_rows(rng: &mut StdRng, count: usize) -> Vec<RawPlayerRow> {
    (0..count)
        .map(|idx| RawPlayerRow {
            name: format!("Player {idx}"),
            position: POSITIONS[rng.gen_range(0..POSITIONS.len())].to_string(),
            nineties: Some(rng.gen_range(0.0..34.0)),
            fouls_committed_p90: Some(rng.gen_range(0.0..3.5)),
            fouls_suffered_p90: Some(rng.gen_range(0.0..3.5)),
            yellow_cards: Some(rng.gen_range(0..12) as f64),
            minutes_to_first_card: Some(rng.gen_range(20.0..400.0)),
            ..RawPlayerRow::default()
        })
        .collect()
}

fn league_table(cfg: &ScoringConfig) -> PlayerTable {
    let mut rng = StdRng::seed_from_u64(7);
    let mut table = PlayerTable::default();
    for team in 0..20 {
        table.push_team(&format!("Team {team}"), &random_rows(&mut rng, 28), cfg);
    }
    table
}

fn referee() -> RefereeRecord {
    RefereeRecord {
        name: "Bench".to_string(),
        avg_yellow_per_match: 4.8,
    }
}

fn bench_parse_number(c: &mut Criterion) {
    let samples = ["1,25", "3.5", "-", "inf", " 12 ", "1,234.5", "88%", ""];
    c.bench_function("parse_number", |b| {
        b.iter(|| {
            for s in samples {
                black_box(parse_number(black_box(s)));
            }
        })
    });
}

fn bench_resolve_schema(c: &mut Criterion) {
    let headers: Vec<String> = [
        "Giocatore",
        "Posizione primaria",
        "Heatmap",
        "90s Giocati Totali",
        "Falli fatti 90s",
        "Falli subiti 90s Totale",
        "Falli subiti 90s stagionale",
        "Cartellini Gialli Totali",
        "90s per Cartellino",
        "Falli per Cartellino",
        "Ritardo Cartellino",
    ]
    .iter()
    .map(|h| h.to_string())
    .collect();
    c.bench_function("resolve_schema", |b| {
        b.iter(|| {
            let schema = resolve_schema(black_box(&headers), PLAYER_COLUMNS);
            black_box(schema.len());
        })
    });
}

fn bench_find_matchups(c: &mut Criterion) {
    let cfg = ScoringConfig::default();
    let table = league_table(&cfg);
    let profile = referee_profile(&referee(), &cfg);
    let pool: Vec<&PlayerRecord> = table
        .players_of("Team 0")
        .chain(table.players_of("Team 1"))
        .collect();
    let mean = mean_cards(pool.iter().copied());
    let partial: Vec<PartialScore> = pool
        .iter()
        .map(|p| PartialScore {
            record: (*p).clone(),
            components: base_components(p, &profile, mean, &cfg),
        })
        .collect();

    c.bench_function("find_matchups", |b| {
        b.iter(|| {
            let duels = find_matchups(black_box(&partial), "Team 0", "Team 1", &cfg);
            black_box(duels.len());
        })
    });
}

fn bench_compute_shortlist(c: &mut Criterion) {
    let cfg = ScoringConfig::default();
    let table = league_table(&cfg);
    let request = ShortlistRequest::new(&table, "Team 0", "Team 1", referee(), cfg.clone());

    c.bench_function("compute_shortlist", |b| {
        b.iter(|| {
            let report = compute_shortlist(black_box(&request)).unwrap();
            black_box(report.shortlist.entries.len());
        })
    });
}

criterion_group!(
    perf,
    bench_parse_number,
    bench_resolve_schema,
    bench_find_matchups,
    bench_compute_shortlist
);
criterion_main!(perf);
