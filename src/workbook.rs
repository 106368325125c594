use std::path::Path;

use calamine::{Data, Reader, open_workbook_auto};
use tracing::{info, warn};

use crate::columns::{
    PLAYER_COLUMNS, PlayerColumn, REFEREE_COLUMNS, RefereeColumn, SheetSchema, missing_required,
    resolve_schema,
};
use crate::config::ScoringConfig;
use crate::error::LoadError;
use crate::normalize::{PlayerTable, RawPlayerRow, parse_number};
use crate::state::RefereeRecord;

#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Empty,
    Number(f64),
    Text(String),
}

impl Cell {
    pub fn as_text(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Number(v) => {
                if v.fract() == 0.0 && v.abs() < 1e15 {
                    format!("{}", *v as i64)
                } else {
                    v.to_string()
                }
            }
            Cell::Text(s) => s.trim().to_string(),
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Empty => None,
            Cell::Number(v) => Some(*v),
            Cell::Text(s) => parse_number(s),
        }
    }
}

impl From<&Data> for Cell {
    fn from(value: &Data) -> Self {
        match value {
            Data::Empty => Cell::Empty,
            Data::Float(v) => Cell::Number(*v),
            Data::Int(v) => Cell::Number(*v as f64),
            Data::Bool(b) => Cell::Text(b.to_string()),
            Data::String(s) => Cell::Text(s.clone()),
            Data::DateTime(dt) => Cell::Number(dt.as_f64()),
            Data::DateTimeIso(s) | Data::DurationIso(s) => Cell::Text(s.clone()),
            Data::Error(_) => Cell::Empty,
        }
    }
}

/// One sheet as a grid; the first row is the header.
#[derive(Debug, Clone, PartialEq)]
pub struct RawSheet {
    pub name: String,
    pub rows: Vec<Vec<Cell>>,
}

impl RawSheet {
    pub fn headers(&self) -> Vec<String> {
        self.rows
            .first()
            .map(|row| row.iter().map(Cell::as_text).collect())
            .unwrap_or_default()
    }

    fn body(&self) -> &[Vec<Cell>] {
        if self.rows.is_empty() { &[] } else { &self.rows[1..] }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawWorkbook {
    pub sheets: Vec<RawSheet>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LoadReport {
    pub warnings: Vec<String>,
    pub skipped_sheets: Vec<LoadError>,
}

impl LoadReport {
    fn warn(&mut self, msg: String) {
        warn!("{msg}");
        self.warnings.push(msg);
    }
}

/// Player and referee tables parsed once per process.
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub players: PlayerTable,
    pub referees: Vec<RefereeRecord>,
    pub report: LoadReport,
    pub used_fallback_referees: bool,
}

pub fn fallback_referees(cfg: &ScoringConfig) -> Vec<RefereeRecord> {
    vec![RefereeRecord {
        name: "League average".to_string(),
        avg_yellow_per_match: cfg.league.avg_cards_per_match,
    }]
}

pub fn read_workbook(path: &Path) -> Result<RawWorkbook, LoadError> {
    if !path.exists() {
        return Err(LoadError::WorkbookMissing {
            path: path.display().to_string(),
        });
    }
    let unreadable = |message: String| LoadError::WorkbookUnreadable {
        path: path.display().to_string(),
        message,
    };
    let mut workbook = open_workbook_auto(path).map_err(|err| unreadable(err.to_string()))?;
    let names = workbook.sheet_names().to_vec();
    let mut sheets = Vec::with_capacity(names.len());
    for name in names {
        let range = workbook
            .worksheet_range(&name)
            .map_err(|err| unreadable(format!("sheet {name}: {err}")))?;
        let rows = range
            .rows()
            .map(|row| row.iter().map(Cell::from).collect())
            .collect();
        sheets.push(RawSheet { name, rows });
    }
    Ok(RawWorkbook { sheets })
}

pub fn load_dataset(path: &Path, cfg: &ScoringConfig) -> Result<Dataset, LoadError> {
    let raw = read_workbook(path)?;
    info!(path = %path.display(), sheets = raw.sheets.len(), "workbook read");
    build_dataset(&raw, cfg)
}

fn is_referee_sheet(name: &str) -> bool {
    let lower = name.to_lowercase();
    lower.contains("arbitr") || lower.contains("referee")
}

/// Index of the referee sheet: the one named like it, else the last sheet
/// when the workbook has more than one.
pub fn referee_sheet_index(raw: &RawWorkbook) -> Option<usize> {
    raw.sheets
        .iter()
        .position(|s| is_referee_sheet(&s.name))
        .or_else(|| (raw.sheets.len() > 1).then(|| raw.sheets.len() - 1))
}

pub fn build_dataset(raw: &RawWorkbook, cfg: &ScoringConfig) -> Result<Dataset, LoadError> {
    let mut report = LoadReport::default();
    let referee_idx = referee_sheet_index(raw);

    let mut players = PlayerTable::default();
    for (idx, sheet) in raw.sheets.iter().enumerate() {
        if Some(idx) == referee_idx {
            continue;
        }
        match parse_team_sheet(sheet) {
            Ok(rows) => {
                let team = sheet.name.trim();
                let added = players.push_team(team, &rows, cfg);
                let dropped = players.excluded_for(team);
                info!(team, added, dropped, "team sheet loaded");
                if added == 0 {
                    report.warn(format!(
                        "{team}: no player reaches {:.1} nineties ({dropped} filtered)",
                        cfg.min_nineties
                    ));
                }
            }
            Err(err) => {
                report.warn(format!("skipped sheet: {err}"));
                report.skipped_sheets.push(err);
            }
        }
    }

    if players.teams().is_empty() {
        return Err(LoadError::NoTeams);
    }

    let parsed = match referee_idx.map(|idx| &raw.sheets[idx]) {
        Some(sheet) => match parse_referee_sheet(sheet) {
            Ok(refs) if !refs.is_empty() => Some(refs),
            Ok(_) => {
                report.warn(format!("{}: no usable referee rows", sheet.name));
                None
            }
            Err(err) => {
                report.warn(format!("referee sheet unusable: {err}"));
                report.skipped_sheets.push(err);
                None
            }
        },
        None => {
            report.warn("no referee sheet found".to_string());
            None
        }
    };
    let used_fallback_referees = parsed.is_none();
    let referees = parsed.unwrap_or_else(|| {
        report.warn("using built-in referee table".to_string());
        fallback_referees(cfg)
    });

    Ok(Dataset {
        players,
        referees,
        report,
        used_fallback_referees,
    })
}

fn cell_at(row: &[Cell], idx: Option<usize>) -> Option<&Cell> {
    idx.and_then(|i| row.get(i))
}

fn text_at(row: &[Cell], idx: Option<usize>) -> String {
    cell_at(row, idx).map(Cell::as_text).unwrap_or_default()
}

fn number_at(row: &[Cell], idx: Option<usize>) -> Option<f64> {
    cell_at(row, idx).and_then(Cell::as_number)
}

fn is_summary_row(name: &str) -> bool {
    let lower = name.to_lowercase();
    lower.contains("squad total") || lower.contains("opponent total") || lower == "totale"
}

pub fn parse_team_sheet(sheet: &RawSheet) -> Result<Vec<RawPlayerRow>, LoadError> {
    let headers = sheet.headers();
    if headers.iter().all(|h| h.is_empty()) {
        return Err(LoadError::EmptySheet {
            sheet: sheet.name.clone(),
        });
    }
    let schema = resolve_schema(&headers, PLAYER_COLUMNS);
    if let Some(field) = missing_required(&schema, PLAYER_COLUMNS) {
        return Err(LoadError::MissingColumn {
            sheet: sheet.name.clone(),
            field,
        });
    }
    Ok(sheet
        .body()
        .iter()
        .filter_map(|row| player_row(row, &schema))
        .collect())
}

fn player_row(row: &[Cell], schema: &SheetSchema<PlayerColumn>) -> Option<RawPlayerRow> {
    let name = text_at(row, schema.get(PlayerColumn::Name));
    if name.is_empty() || is_summary_row(&name) {
        return None;
    }
    let num = |column| number_at(row, schema.get(column));
    Some(RawPlayerRow {
        name,
        position: text_at(row, schema.get(PlayerColumn::Position)),
        heatmap: text_at(row, schema.get(PlayerColumn::Heatmap)),
        nineties: num(PlayerColumn::Nineties),
        fouls_committed_p90: num(PlayerColumn::FoulsCommittedP90),
        fouls_committed_total: num(PlayerColumn::FoulsCommittedTotal),
        fouls_suffered_p90: num(PlayerColumn::FoulsSufferedP90),
        fouls_suffered_seasonal_p90: num(PlayerColumn::FoulsSufferedSeasonalP90),
        yellow_cards: num(PlayerColumn::YellowCards),
        nineties_per_card: num(PlayerColumn::NinetiesPerCard),
        fouls_per_card: num(PlayerColumn::FoulsPerCard),
        minutes_to_first_card: num(PlayerColumn::MinutesToFirstCard),
    })
}

pub fn parse_referee_sheet(sheet: &RawSheet) -> Result<Vec<RefereeRecord>, LoadError> {
    let headers = sheet.headers();
    if headers.iter().all(|h| h.is_empty()) {
        return Err(LoadError::EmptySheet {
            sheet: sheet.name.clone(),
        });
    }
    let schema = resolve_schema(&headers, REFEREE_COLUMNS);
    if let Some(field) = missing_required(&schema, REFEREE_COLUMNS) {
        return Err(LoadError::MissingColumn {
            sheet: sheet.name.clone(),
            field,
        });
    }
    let mut out: Vec<RefereeRecord> = Vec::new();
    for row in sheet.body() {
        let name = text_at(row, schema.get(RefereeColumn::Name));
        if name.is_empty() {
            continue;
        }
        let Some(avg) = number_at(row, schema.get(RefereeColumn::AvgYellow))
            .filter(|v| v.is_finite() && *v > 0.0)
        else {
            warn!(referee = %name, "referee row without a usable average");
            continue;
        };
        if out.iter().any(|r| r.name == name) {
            warn!(referee = %name, "duplicate referee row ignored");
            continue;
        }
        out.push(RefereeRecord {
            name,
            avg_yellow_per_match: avg,
        });
    }
    Ok(out)
}
