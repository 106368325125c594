use std::path::Path;

use calamine::{Reader, open_workbook_auto};
use rust_xlsxwriter::Workbook;

use cardrisk_terminal::config::ScoringConfig;
use cardrisk_terminal::error::LoadError;
use cardrisk_terminal::pipeline::{ShortlistRequest, compute_shortlist};
use cardrisk_terminal::ranking_export::{ExportFormat, default_export_path, export_report};
use cardrisk_terminal::state::{FieldZone, RoleCategory};
use cardrisk_terminal::workbook::load_dataset;

const TEAM_HEADERS: [&str; 9] = [
    "Giocatore",
    "Posizione primaria",
    "Heatmap",
    "90s Giocati Totali",
    "Falli fatti 90s",
    "Falli subiti 90s Totale",
    "Cartellini Gialli Totali",
    "90s per Cartellino",
    "Ritardo Cartellino",
];

type TeamRow = (&'static str, &'static str, &'static str, f64, f64, &'static str, f64, &'static str, f64);

fn write_team(workbook: &mut Workbook, name: &str, rows: &[TeamRow]) {
    let sheet = workbook.add_worksheet();
    sheet.set_name(name).expect("sheet name");
    for (col, header) in TEAM_HEADERS.iter().enumerate() {
        sheet.write_string(0, col as u16, *header).expect("header");
    }
    for (idx, r) in rows.iter().enumerate() {
        let row = idx as u32 + 1;
        sheet.write_string(row, 0, r.0).expect("name");
        sheet.write_string(row, 1, r.1).expect("position");
        sheet.write_string(row, 2, r.2).expect("heatmap");
        sheet.write_number(row, 3, r.3).expect("nineties");
        sheet.write_number(row, 4, r.4).expect("fouls");
        // Suffered stored as text with a decimal comma, as exported sheets often are.
        sheet.write_string(row, 5, r.5).expect("suffered");
        sheet.write_number(row, 6, r.6).expect("cards");
        sheet.write_string(row, 7, r.7).expect("per card");
        sheet.write_number(row, 8, r.8).expect("delay");
    }
}

fn write_sample(path: &Path, with_referees: bool) {
    let mut workbook = Workbook::new();
    write_team(
        &mut workbook,
        "Inter",
        &[
            ("Dimarco", "LWB", "High activity on left flank", 18.0, 1.9, "1,2", 4.0, "4,5", 60.0),
            ("Barella", "CM", "High activity in central midfield", 22.0, 2.1, "2,0", 6.0, "3,7", 55.0),
            ("Lautaro", "ST", "High activity in penalty area", 21.0, 1.2, "2,4", 3.0, "7", 80.0),
            ("Youth", "CM", "", 2.0, 3.0, "1,0", 1.0, "2", 10.0),
        ],
    );
    write_team(
        &mut workbook,
        "Milan",
        &[
            ("Calabria", "RB", "High activity on right flank", 15.0, 2.3, "1,0", 6.0, "2,5", 40.0),
            ("Leao", "LW", "High activity on left flank in attacking third", 20.0, 0.6, "2,8", 2.0, "10", 90.0),
            ("Pulisic", "RW", "", 19.0, 0.8, "2,1", 1.0, "inf", 100.0),
        ],
    );
    if with_referees {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Arbitri").expect("sheet name");
        sheet.write_string(0, 0, "Nome").expect("header");
        sheet.write_string(0, 1, "Gialli a partita").expect("header");
        sheet.write_string(1, 0, "Orsato").expect("name");
        sheet.write_number(1, 1, 5.2).expect("avg");
        sheet.write_string(2, 0, "Mariani").expect("name");
        sheet.write_string(2, 1, "3,5").expect("avg");
        sheet.write_string(3, 0, "Senza Media").expect("name");
        sheet.write_string(3, 1, "-").expect("avg");
    }
    workbook.save(path).expect("save sample workbook");
}

#[test]
fn loads_teams_and_referees_from_xlsx() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("serie_a.xlsx");
    write_sample(&path, true);

    let cfg = ScoringConfig::default();
    let dataset = load_dataset(&path, &cfg).expect("load");
    assert_eq!(dataset.players.teams(), vec!["Inter".to_string(), "Milan".to_string()]);
    assert_eq!(dataset.players.players.len(), 6);
    assert_eq!(dataset.players.excluded_for("Inter"), 1);
    assert!(!dataset.used_fallback_referees);

    let names: Vec<&str> = dataset.referees.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["Orsato", "Mariani"]);
    assert!((dataset.referees[1].avg_yellow_per_match - 3.5).abs() < 1e-9);

    let dimarco = dataset
        .players
        .players
        .iter()
        .find(|p| p.name == "Dimarco")
        .expect("dimarco");
    assert_eq!(dimarco.role, RoleCategory::Defender);
    assert_eq!(dimarco.zone, FieldZone::LeftFlank);
    assert!((dimarco.fouls_suffered_p90 - 1.2).abs() < 1e-9);
    assert!((dimarco.nineties_per_card - 4.5).abs() < 1e-9);
    assert_eq!(dimarco.minutes_to_first_card, Some(60.0));

    let pulisic = dataset
        .players
        .players
        .iter()
        .find(|p| p.name == "Pulisic")
        .expect("pulisic");
    assert!(pulisic.nineties_per_card.is_infinite());
}

#[test]
fn missing_referee_sheet_uses_fallback_table() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("one_team.xlsx");
    let mut workbook = Workbook::new();
    write_team(
        &mut workbook,
        "Inter",
        &[("Barella", "CM", "", 22.0, 2.1, "2,0", 6.0, "3,7", 55.0)],
    );
    workbook.save(&path).expect("save");

    let cfg = ScoringConfig::default();
    let dataset = load_dataset(&path, &cfg).expect("load");
    assert!(dataset.used_fallback_referees);
    assert_eq!(dataset.referees.len(), 1);
    assert_eq!(dataset.referees[0].avg_yellow_per_match, 4.2);
    assert!(!dataset.report.warnings.is_empty());
}

#[test]
fn sheet_without_nineties_is_skipped_and_reported() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("broken.xlsx");
    let mut workbook = Workbook::new();
    write_team(
        &mut workbook,
        "Inter",
        &[("Barella", "CM", "", 22.0, 2.1, "2,0", 6.0, "3,7", 55.0)],
    );
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Broken").expect("sheet name");
        sheet.write_string(0, 0, "Player").expect("header");
        sheet.write_string(0, 1, "Pos").expect("header");
        sheet.write_string(1, 0, "Nobody").expect("name");
    }
    {
        let sheet = workbook.add_worksheet();
        sheet.set_name("Referees").expect("sheet name");
        sheet.write_string(0, 0, "Referee").expect("header");
        sheet.write_string(0, 1, "Yellow per match").expect("header");
        sheet.write_string(1, 0, "Oliver").expect("name");
        sheet.write_number(1, 1, 4.1).expect("avg");
    }
    workbook.save(&path).expect("save");

    let dataset = load_dataset(&path, &ScoringConfig::default()).expect("load");
    assert_eq!(dataset.players.teams(), vec!["Inter".to_string()]);
    assert_eq!(
        dataset.report.skipped_sheets,
        vec![LoadError::MissingColumn {
            sheet: "Broken".to_string(),
            field: "90s played",
        }]
    );
    assert_eq!(dataset.referees[0].name, "Oliver");
}

#[test]
fn missing_workbook_is_an_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("nope.xlsx");
    let err = load_dataset(&path, &ScoringConfig::default()).expect_err("missing");
    assert!(matches!(err, LoadError::WorkbookMissing { .. }));
}

#[test]
fn exports_ranking_as_csv_and_xlsx() {
    let dir = tempfile::tempdir().expect("tempdir");
    let source = dir.path().join("serie_a.xlsx");
    write_sample(&source, true);
    let cfg = ScoringConfig::default();
    let dataset = load_dataset(&source, &cfg).expect("load");
    let referee = dataset.referees[0].clone();
    let request = ShortlistRequest::new(&dataset.players, "Inter", "Milan", referee, cfg);
    let report = compute_shortlist(&request).expect("report");

    let csv_path = dir.path().join("out").join("ranking.csv");
    let done = export_report(&csv_path, &report).expect("csv export");
    assert_eq!(done.players, report.ranked.len());
    let mut reader = csv::Reader::from_path(&csv_path).expect("read csv");
    let headers = reader.headers().expect("headers").clone();
    assert_eq!(headers.get(0), Some("Rank"));
    assert_eq!(headers.get(1), Some("Player"));
    let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.expect("row")).collect();
    assert_eq!(rows.len(), report.ranked.len());
    assert_eq!(rows[0].get(1), Some(report.ranked[0].record.name.as_str()));

    let xlsx_path = default_export_path(Some(dir.path()), &report, ExportFormat::Xlsx);
    let name = xlsx_path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    assert!(name.starts_with("cardrisk_inter_vs_milan_"));
    export_report(&xlsx_path, &report).expect("xlsx export");
    let book = open_workbook_auto(&xlsx_path).expect("reopen");
    assert_eq!(
        book.sheet_names().to_vec(),
        vec!["Ranking".to_string(), "Shortlist".to_string(), "Duels".to_string()]
    );
}

#[test]
fn export_rejects_unknown_extension() {
    let dir = tempfile::tempdir().expect("tempdir");
    assert!(ExportFormat::from_path(&dir.path().join("out.txt")).is_err());
    assert_eq!(
        ExportFormat::from_path(&dir.path().join("OUT.XLSX")).ok(),
        Some(ExportFormat::Xlsx)
    );
}
