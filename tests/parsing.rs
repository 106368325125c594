use cardrisk_terminal::columns::{
    PLAYER_COLUMNS, PlayerColumn, REFEREE_COLUMNS, RefereeColumn, missing_required,
    normalize_header, resolve_schema,
};
use cardrisk_terminal::config::ScoringConfig;
use cardrisk_terminal::normalize::{
    PlayerTable, RawPlayerRow, normalize_row, parse_number, role_from_position, zone_from,
};
use cardrisk_terminal::state::{FieldZone, RoleCategory};

fn headers(raw: &[&str]) -> Vec<String> {
    raw.iter().map(|h| h.to_string()).collect()
}

#[test]
fn parse_number_handles_sheet_decorations() {
    assert_eq!(parse_number("1,5"), Some(1.5));
    assert_eq!(parse_number(" 2.25 "), Some(2.25));
    assert_eq!(parse_number("12%"), Some(12.0));
    assert_eq!(parse_number("1,234.5"), Some(1234.5));
    assert_eq!(parse_number("-"), None);
    assert_eq!(parse_number(""), None);
    assert_eq!(parse_number("n/a"), None);
    assert_eq!(parse_number("inf"), Some(f64::INFINITY));
    assert_eq!(parse_number("∞"), Some(f64::INFINITY));
}

#[test]
fn parse_number_reads_european_thousands() {
    assert_eq!(parse_number("1.234,5"), Some(1234.5));
    assert_eq!(parse_number("1.234.567"), Some(1234567.0));
    assert_eq!(parse_number("1,234,567"), Some(1234567.0));
    assert_eq!(parse_number("0,75"), Some(0.75));
}

#[test]
fn missing_numbers_fall_back_to_league_defaults() {
    let cfg = ScoringConfig::default();
    let raw = RawPlayerRow {
        name: "  Blank Row ".to_string(),
        position: "CM".to_string(),
        ..RawPlayerRow::default()
    };
    let rec = normalize_row("Team", &raw, &cfg);
    assert_eq!(rec.name, "Blank Row");
    assert_eq!(rec.nineties, 0.0);
    assert_eq!(rec.fouls_committed_p90, 1.8);
    assert_eq!(rec.fouls_suffered_p90, 1.8);
    assert_eq!(rec.yellow_cards, 0);
    assert!(rec.nineties_per_card.is_infinite());
    assert!(rec.fouls_per_card.is_infinite());
    assert_eq!(rec.minutes_to_first_card, None);
    assert!(rec.imputed.fouls_committed);
    assert!(rec.imputed.fouls_suffered);
}

#[test]
fn measured_rates_are_not_flagged_as_imputed() {
    let cfg = ScoringConfig::default();
    let raw = RawPlayerRow {
        name: "Half Known".to_string(),
        position: "CB".to_string(),
        nineties: Some(10.0),
        fouls_committed_p90: Some(2.2),
        ..RawPlayerRow::default()
    };
    let rec = normalize_row("Team", &raw, &cfg);
    assert!(!rec.imputed.fouls_committed);
    assert!(rec.imputed.fouls_suffered);
    assert_eq!(rec.fouls_committed_p90, 2.2);
}

#[test]
fn fouls_per_ninety_derived_from_totals() {
    let cfg = ScoringConfig::default();
    let raw = RawPlayerRow {
        name: "Totals Only".to_string(),
        position: "CB".to_string(),
        nineties: Some(10.0),
        fouls_committed_total: Some(25.0),
        yellow_cards: Some(5.0),
        ..RawPlayerRow::default()
    };
    let rec = normalize_row("Team", &raw, &cfg);
    assert!((rec.fouls_committed_p90 - 2.5).abs() < 1e-9);
    assert!((rec.nineties_per_card - 2.0).abs() < 1e-9);
    assert!((rec.fouls_per_card - 5.0).abs() < 1e-9);
}

#[test]
fn fouls_suffered_uses_seasonal_column_when_total_is_zero() {
    let cfg = ScoringConfig::default();
    let raw = RawPlayerRow {
        name: "Winger".to_string(),
        position: "RW".to_string(),
        nineties: Some(8.0),
        fouls_suffered_p90: Some(0.0),
        fouls_suffered_seasonal_p90: Some(2.7),
        ..RawPlayerRow::default()
    };
    let rec = normalize_row("Team", &raw, &cfg);
    assert!((rec.fouls_suffered_p90 - 2.7).abs() < 1e-9);
}

#[test]
fn roles_come_from_primary_position() {
    assert_eq!(role_from_position("GK"), RoleCategory::Goalkeeper);
    assert_eq!(role_from_position("CB, DM"), RoleCategory::Defender);
    assert_eq!(role_from_position("LWB"), RoleCategory::Defender);
    assert_eq!(role_from_position("RW/ST"), RoleCategory::Attacker);
    assert_eq!(role_from_position("ST"), RoleCategory::Attacker);
    assert_eq!(role_from_position("CM"), RoleCategory::Midfielder);
    assert_eq!(role_from_position("DM, CB"), RoleCategory::Midfielder);
    assert_eq!(role_from_position(""), RoleCategory::Midfielder);
    assert_eq!(role_from_position("Goalkeeper"), RoleCategory::Goalkeeper);
}

#[test]
fn spelled_out_positions_map_to_their_role() {
    assert_eq!(role_from_position("Left Winger"), RoleCategory::Attacker);
    assert_eq!(role_from_position("Right Winger"), RoleCategory::Attacker);
    assert_eq!(role_from_position("Centre-Forward"), RoleCategory::Attacker);
    assert_eq!(role_from_position("Second Striker"), RoleCategory::Attacker);
    assert_eq!(role_from_position("Attaccante"), RoleCategory::Attacker);
    assert_eq!(role_from_position("Wing-Back"), RoleCategory::Defender);
    assert_eq!(role_from_position("Right Wing-Back"), RoleCategory::Defender);
    assert_eq!(role_from_position("Central Midfield"), RoleCategory::Midfielder);
}

#[test]
fn zones_prefer_position_then_heatmap_then_role() {
    assert_eq!(
        zone_from("LB", "High activity on right flank", RoleCategory::Defender),
        FieldZone::LeftFlank
    );
    assert_eq!(
        zone_from("MF", "High activity on right flank in attacking third", RoleCategory::Midfielder),
        FieldZone::RightFlank
    );
    assert_eq!(
        zone_from("FW", "High activity in penalty area", RoleCategory::Attacker),
        FieldZone::CentralAttacking
    );
    assert_eq!(zone_from("DF", "", RoleCategory::Defender), FieldZone::CentralDefensive);
    assert_eq!(zone_from("FW", "", RoleCategory::Attacker), FieldZone::CentralAttacking);
    assert_eq!(zone_from("", "", RoleCategory::Midfielder), FieldZone::CentralMidfield);
}

#[test]
fn header_normalization_collapses_case_and_separators() {
    assert_eq!(normalize_header("  Falli_Fatti   90 "), "falli fatti 90");
}

#[test]
fn team_schema_resolves_italian_headers() {
    let h = headers(&[
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
        "Ritardo Cartellino (min)",
    ]);
    let schema = resolve_schema(&h, PLAYER_COLUMNS);
    assert_eq!(schema.get(PlayerColumn::Name), Some(0));
    assert_eq!(schema.get(PlayerColumn::Position), Some(1));
    assert_eq!(schema.get(PlayerColumn::Heatmap), Some(2));
    assert_eq!(schema.get(PlayerColumn::Nineties), Some(3));
    assert_eq!(schema.get(PlayerColumn::FoulsCommittedP90), Some(4));
    assert_eq!(schema.get(PlayerColumn::FoulsSufferedP90), Some(5));
    assert_eq!(schema.get(PlayerColumn::FoulsSufferedSeasonalP90), Some(6));
    assert_eq!(schema.get(PlayerColumn::YellowCards), Some(7));
    assert_eq!(schema.get(PlayerColumn::NinetiesPerCard), Some(8));
    assert_eq!(schema.get(PlayerColumn::FoulsPerCard), Some(9));
    assert_eq!(schema.get(PlayerColumn::MinutesToFirstCard), Some(10));
    assert_eq!(missing_required(&schema, PLAYER_COLUMNS), None);
}

#[test]
fn team_schema_resolves_english_headers() {
    let h = headers(&[
        "Player", "Pos", "90s", "Fls", "Fld/90", "CrdY", "Fouls per card",
    ]);
    let schema = resolve_schema(&h, PLAYER_COLUMNS);
    assert_eq!(schema.get(PlayerColumn::Name), Some(0));
    assert_eq!(schema.get(PlayerColumn::Position), Some(1));
    assert_eq!(schema.get(PlayerColumn::Nineties), Some(2));
    assert_eq!(schema.get(PlayerColumn::FoulsCommittedTotal), Some(3));
    assert_eq!(schema.get(PlayerColumn::FoulsSufferedP90), Some(4));
    assert_eq!(schema.get(PlayerColumn::YellowCards), Some(5));
    assert_eq!(schema.get(PlayerColumn::FoulsPerCard), Some(6));
    assert_eq!(schema.get(PlayerColumn::FoulsCommittedP90), None);
}

#[test]
fn missing_nineties_column_is_reported() {
    let h = headers(&["Player", "Pos", "Fls/90"]);
    let schema = resolve_schema(&h, PLAYER_COLUMNS);
    assert_eq!(missing_required(&schema, PLAYER_COLUMNS), Some("90s played"));
}

#[test]
fn name_falls_back_to_first_column() {
    let h = headers(&["Rosa", "90s", "Pos"]);
    let schema = resolve_schema(&h, PLAYER_COLUMNS);
    assert_eq!(schema.get(PlayerColumn::Name), Some(0));
}

#[test]
fn referee_schema_prefers_average_column() {
    let h = headers(&["Nome Arbitro", "Partite", "Gialli a partita"]);
    let schema = resolve_schema(&h, REFEREE_COLUMNS);
    assert_eq!(schema.get(RefereeColumn::Name), Some(0));
    assert_eq!(schema.get(RefereeColumn::AvgYellow), Some(2));
    assert_eq!(missing_required(&schema, REFEREE_COLUMNS), None);
}

#[test]
fn push_team_filters_low_minutes_and_duplicates() {
    let cfg = ScoringConfig::default();
    let row = |name: &str, nineties: f64| RawPlayerRow {
        name: name.to_string(),
        position: "CM".to_string(),
        nineties: Some(nineties),
        ..RawPlayerRow::default()
    };
    let mut table = PlayerTable::default();
    let added = table.push_team(
        "Alpha",
        &[row("Regular", 12.0), row("Bench", 3.0), row("Regular", 9.0)],
        &cfg,
    );
    assert_eq!(added, 1);
    assert_eq!(table.excluded_for("Alpha"), 1);
    assert!(table.players.iter().all(|p| p.name != "Bench"));
    assert_eq!(table.players_of("Alpha").next().map(|p| p.nineties), Some(12.0));
}
