use std::path::PathBuf;

use anyhow::{Context, Result, anyhow, bail};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use cardrisk_terminal::config::ScoringConfig;
use cardrisk_terminal::pipeline::{ShortlistRequest, compute_shortlist};
use cardrisk_terminal::ranking_export::export_report;
use cardrisk_terminal::state::{MatchReport, PlayerKey, TEAM_TOP};
use cardrisk_terminal::workbook::{Dataset, load_dataset};

/// Rank one match's players by booking risk without the terminal UI.
#[derive(Debug, Parser)]
#[command(name = "rank", version)]
struct Args {
    /// Workbook with one sheet per team and a referee sheet.
    #[arg(env = "CARDRISK_WORKBOOK")]
    workbook: PathBuf,

    #[arg(long)]
    home: Option<String>,

    #[arg(long)]
    away: Option<String>,

    /// Referee name; the first referee in the workbook when omitted.
    #[arg(long)]
    referee: Option<String>,

    /// Leave a player out, as `Team:Player` or a bare player name.
    #[arg(short = 'x', long = "exclude")]
    exclude: Vec<String>,

    /// List teams and referees, then exit.
    #[arg(long)]
    list: bool,

    /// Print the full report as JSON.
    #[arg(long)]
    json: bool,

    /// Also write the ranking to this .csv or .xlsx file.
    #[arg(long)]
    export: Option<PathBuf>,

    #[arg(long, env = "CARDRISK_CONFIG")]
    config: Option<PathBuf>,

    #[arg(long, env = "CARDRISK_MIN_NINETIES")]
    min_nineties: Option<f64>,

    /// Write the scoring config used for this run as JSON.
    #[arg(long)]
    save_config: Option<PathBuf>,
}

fn resolve_exclusions(dataset: &Dataset, raw: &[String]) -> Result<Vec<PlayerKey>> {
    let mut out = Vec::new();
    for item in raw {
        let matches: Vec<PlayerKey> = match item.split_once(':') {
            Some((team, name)) => dataset
                .players
                .players
                .iter()
                .filter(|p| p.team.eq_ignore_ascii_case(team.trim()) && p.name == name.trim())
                .map(|p| p.key())
                .collect(),
            None => dataset
                .players
                .players
                .iter()
                .filter(|p| p.name == item.trim())
                .map(|p| p.key())
                .collect(),
        };
        if matches.is_empty() {
            bail!("no eligible player matches {item:?}");
        }
        out.extend(matches);
    }
    Ok(out)
}

fn print_report(report: &MatchReport) {
    println!(
        "{} vs {} | referee {} ({:.2}/match, {}, factor {:.2})",
        report.team_a,
        report.team_b,
        report.referee.name,
        report.referee.avg_yellow_per_match,
        report.referee.severity.label(),
        report.referee.factor
    );
    println!(
        "expected cards {:.1} | confidence {} | aggression {:.2} / {:.2}",
        report.expected_cards,
        report.confidence.label(),
        report.aggression_a,
        report.aggression_b
    );
    for e in &report.eligibility {
        println!(
            "  {}: {} ranked, {} below minutes, {} excluded",
            e.team, e.eligible, e.excluded_by_minutes, e.excluded_by_user
        );
    }

    println!();
    println!("SHORTLIST ({})", report.shortlist.decision.label());
    for (idx, e) in report.shortlist.entries.iter().enumerate() {
        println!(
            "  {}. {:<24} {:<16} {:<3} {:>5.1}%  @{:.2}",
            idx + 1,
            e.name,
            e.team,
            e.role.short(),
            e.risk * 100.0,
            e.fair_odds
        );
    }

    for (team, venue) in [(&report.team_a, "home"), (&report.team_b, "away")] {
        println!();
        println!("TOP {TEAM_TOP} {team} ({venue})");
        for (idx, p) in report.team_top(team, TEAM_TOP).iter().enumerate() {
            println!(
                "  {}. {:<24} {:<3} {:>5.1}%  @{:.2}",
                idx + 1,
                p.record.name,
                p.record.role.short(),
                p.risk * 100.0,
                p.fair_odds
            );
        }
    }

    println!();
    println!("RANKING");
    for (idx, p) in report.ranked.iter().enumerate() {
        println!(
            "  {:>3} {:<24} {:<16} {:<3} {:<18} {:>5.1}%  @{:<5.2} bonus {:.3}",
            idx + 1,
            p.record.name,
            p.record.team,
            p.record.role.short(),
            p.record.zone.label(),
            p.risk * 100.0,
            p.fair_odds,
            p.components.matchup_bonus
        );
    }

    if !report.duels.is_empty() {
        println!();
        println!("DUELS");
        for d in &report.duels {
            println!(
                "  {} ({}) -> {} ({}) compat {:.2} risk {:.3}{}{}",
                d.aggressor.name,
                d.aggressor.team,
                d.victim.name,
                d.victim.team,
                d.compatibility,
                d.pair_risk,
                if d.mirrored { " mirrored" } else { "" },
                if d.priority_victim { " priority-victim" } else { "" }
            );
        }
    }
}

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let mut config = match &args.config {
        Some(path) => ScoringConfig::load(path)?,
        None => ScoringConfig::default(),
    };
    if let Some(min) = args.min_nineties {
        config.min_nineties = min;
    }
    config.validate()?;
    if let Some(path) = &args.save_config {
        config.save(path)?;
        info!(path = %path.display(), "scoring config written");
    }

    let dataset = load_dataset(&args.workbook, &config)
        .with_context(|| format!("load {}", args.workbook.display()))?;

    let teams = dataset.players.teams();
    if args.list {
        println!("Teams:");
        for team in &teams {
            println!(
                "  {team} ({} ranked, {} below minutes)",
                dataset.players.players_of(team).count(),
                dataset.players.excluded_for(team)
            );
        }
        println!("Referees:");
        for r in &dataset.referees {
            println!("  {} ({:.2})", r.name, r.avg_yellow_per_match);
        }
        return Ok(());
    }

    let home = args
        .home
        .clone()
        .or_else(|| teams.first().cloned())
        .ok_or_else(|| anyhow!("workbook has no teams"))?;
    let away = args
        .away
        .clone()
        .or_else(|| teams.iter().find(|t| **t != home).cloned())
        .ok_or_else(|| anyhow!("pass --away; only one team loaded"))?;
    let referee = match &args.referee {
        Some(name) => dataset
            .referees
            .iter()
            .find(|r| r.name.eq_ignore_ascii_case(name.trim()))
            .cloned()
            .ok_or_else(|| anyhow!("unknown referee {name:?}"))?,
        None => dataset
            .referees
            .first()
            .cloned()
            .ok_or_else(|| anyhow!("workbook has no referees"))?,
    };

    let excluded = resolve_exclusions(&dataset, &args.exclude)?;
    let request = ShortlistRequest::new(&dataset.players, home, away, referee, config)
        .with_excluded(excluded);
    let report = compute_shortlist(&request)?;

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("serialize report")?
        );
    } else {
        print_report(&report);
    }

    if let Some(path) = &args.export {
        let done = export_report(path, &report)?;
        info!(path = %done.path.display(), players = done.players, "export written");
    }
    Ok(())
}
