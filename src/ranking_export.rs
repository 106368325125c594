use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::Local;
use rust_xlsxwriter::{Workbook, Worksheet};

use crate::state::{MatchReport, MatchupCandidate, ScoredPlayer, ShortlistEntry};

pub const EXPORT_DIR_ENV: &str = "CARDRISK_EXPORT_DIR";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Csv,
    Xlsx,
}

impl ExportFormat {
    pub fn from_path(path: &Path) -> Result<Self> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "xlsx" => Ok(ExportFormat::Xlsx),
            other => bail!("unsupported export extension {other:?} (use .csv or .xlsx)"),
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Xlsx => "xlsx",
        }
    }
}

pub struct ExportReport {
    pub path: PathBuf,
    pub players: usize,
    pub shortlist: usize,
    pub duels: usize,
}

fn slug(name: &str) -> String {
    let mut out = String::new();
    for c in name.trim().chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('_') && !out.is_empty() {
            out.push('_');
        }
    }
    out.trim_end_matches('_').to_string()
}

/// `<dir>/cardrisk_<home>_vs_<away>_<timestamp>.<ext>`; the directory comes
/// from `CARDRISK_EXPORT_DIR` when the caller passes none.
pub fn default_export_path(
    dir: Option<&Path>,
    report: &MatchReport,
    format: ExportFormat,
) -> PathBuf {
    let dir = dir.map(Path::to_path_buf).unwrap_or_else(|| {
        std::env::var(EXPORT_DIR_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
    });
    let stamp = Local::now().format("%Y%m%d_%H%M%S");
    dir.join(format!(
        "cardrisk_{}_vs_{}_{stamp}.{}",
        slug(&report.team_a),
        slug(&report.team_b),
        format.extension()
    ))
}

pub fn ranked_rows(report: &MatchReport) -> Vec<Vec<String>> {
    let mut rows = vec![vec![
        "Rank".to_string(),
        "Player".to_string(),
        "Team".to_string(),
        "Role".to_string(),
        "Zone".to_string(),
        "Risk".to_string(),
        "Fair Odds".to_string(),
        "Matchup Bonus".to_string(),
    ]];
    rows.extend(
        report
            .ranked
            .iter()
            .enumerate()
            .map(|(idx, p)| ranked_row(idx + 1, p)),
    );
    rows
}

fn ranked_row(rank: usize, p: &ScoredPlayer) -> Vec<String> {
    vec![
        rank.to_string(),
        p.record.name.clone(),
        p.record.team.clone(),
        p.record.role.label().to_string(),
        p.record.zone.label().to_string(),
        format!("{:.4}", p.risk),
        format!("{:.2}", p.fair_odds),
        format!("{:.4}", p.components.matchup_bonus),
    ]
}

fn shortlist_rows(report: &MatchReport) -> Vec<Vec<String>> {
    let mut rows = vec![vec![
        "Pick".to_string(),
        "Player".to_string(),
        "Team".to_string(),
        "Role".to_string(),
        "Risk".to_string(),
        "Fair Odds".to_string(),
    ]];
    rows.extend(
        report
            .shortlist
            .entries
            .iter()
            .enumerate()
            .map(|(idx, e)| shortlist_row(idx + 1, e)),
    );
    rows.push(Vec::new());
    rows.push(vec![
        "Split".to_string(),
        report.shortlist.decision.label().to_string(),
    ]);
    rows.push(vec![
        "Referee".to_string(),
        report.referee.name.clone(),
        report.referee.severity.label().to_string(),
        format!("{:.2}", report.referee.avg_yellow_per_match),
    ]);
    rows.push(vec![
        "Expected cards".to_string(),
        format!("{:.1}", report.expected_cards),
        report.confidence.label().to_string(),
    ]);
    rows
}

fn shortlist_row(pick: usize, e: &ShortlistEntry) -> Vec<String> {
    vec![
        pick.to_string(),
        e.name.clone(),
        e.team.clone(),
        e.role.label().to_string(),
        format!("{:.4}", e.risk),
        format!("{:.2}", e.fair_odds),
    ]
}

fn duel_rows(report: &MatchReport) -> Vec<Vec<String>> {
    let mut rows = vec![vec![
        "Aggressor".to_string(),
        "Aggressor Team".to_string(),
        "Aggressor Zone".to_string(),
        "Victim".to_string(),
        "Victim Team".to_string(),
        "Victim Zone".to_string(),
        "Compatibility".to_string(),
        "Mirrored".to_string(),
        "Priority Victim".to_string(),
        "Pair Risk".to_string(),
        "Bonus".to_string(),
    ]];
    rows.extend(report.duels.iter().map(duel_row));
    rows
}

fn duel_row(d: &MatchupCandidate) -> Vec<String> {
    vec![
        d.aggressor.name.clone(),
        d.aggressor.team.clone(),
        d.aggressor_zone.label().to_string(),
        d.victim.name.clone(),
        d.victim.team.clone(),
        d.victim_zone.label().to_string(),
        format!("{:.3}", d.compatibility),
        if d.mirrored { "yes" } else { "no" }.to_string(),
        if d.priority_victim { "yes" } else { "no" }.to_string(),
        format!("{:.4}", d.pair_risk),
        format!("{:.4}", d.bonus),
    ]
}

/// Write the ranked pool. `.csv` holds the flat ranking only; `.xlsx` adds
/// the shortlist and duel sheets.
pub fn export_report(path: &Path, report: &MatchReport) -> Result<ExportReport> {
    let format = ExportFormat::from_path(path)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("create export dir {}", parent.display()))?;
    }
    match format {
        ExportFormat::Csv => write_csv(path, &ranked_rows(report))?,
        ExportFormat::Xlsx => {
            let mut workbook = Workbook::new();
            {
                let sheet = workbook.add_worksheet();
                sheet.set_name("Ranking")?;
                write_rows(sheet, &ranked_rows(report))?;
            }
            {
                let sheet = workbook.add_worksheet();
                sheet.set_name("Shortlist")?;
                write_rows(sheet, &shortlist_rows(report))?;
            }
            {
                let sheet = workbook.add_worksheet();
                sheet.set_name("Duels")?;
                write_rows(sheet, &duel_rows(report))?;
            }
            workbook
                .save(path)
                .with_context(|| format!("save workbook {}", path.display()))?;
        }
    }
    Ok(ExportReport {
        path: path.to_path_buf(),
        players: report.ranked.len(),
        shortlist: report.shortlist.entries.len(),
        duels: report.duels.len(),
    })
}

fn write_csv(path: &Path, rows: &[Vec<String>]) -> Result<()> {
    let mut writer =
        csv::Writer::from_path(path).with_context(|| format!("open {}", path.display()))?;
    for (row_idx, row) in rows.iter().enumerate() {
        writer
            .write_record(row)
            .with_context(|| format!("write csv row {row_idx}"))?;
    }
    writer.flush().context("flush csv")?;
    Ok(())
}

fn write_rows(worksheet: &mut Worksheet, rows: &[Vec<String>]) -> Result<()> {
    for (row_idx, row) in rows.iter().enumerate() {
        for (col_idx, value) in row.iter().enumerate() {
            worksheet
                .write_string(row_idx as u32, col_idx as u16, value)
                .with_context(|| format!("write cell ({row_idx},{col_idx})"))?;
        }
    }
    Ok(())
}
