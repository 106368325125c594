use std::fs::OpenOptions;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use clap::Parser;
use crossterm::event::{
    self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEvent, KeyEventKind,
};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::prelude::*;
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Bar, BarChart, BarGroup, Block, Borders, Clear, Paragraph};
use tracing_subscriber::EnvFilter;

use cardrisk_terminal::config::ScoringConfig;
use cardrisk_terminal::ranking_export::{ExportFormat, default_export_path, export_report};
use cardrisk_terminal::state::{AppState, ReportFocus, Screen, SetupFocus, Severity, TEAM_TOP};
use cardrisk_terminal::workbook::load_dataset;

const LOG_FILE_ENV: &str = "CARDRISK_LOG_FILE";

/// Terminal dashboard ranking the players most likely to be booked.
#[derive(Parser, Debug)]
#[command(name = "cardrisk_terminal", version)]
struct Args {
    /// Workbook with one sheet per team and a referee sheet.
    #[arg(env = "CARDRISK_WORKBOOK")]
    workbook: PathBuf,

    /// Scoring config JSON (defaults to the built-in weight table).
    #[arg(long, env = "CARDRISK_CONFIG")]
    config: Option<PathBuf>,

    /// Minimum 90-minute equivalents for a player to be ranked.
    #[arg(long, env = "CARDRISK_MIN_NINETIES")]
    min_nineties: Option<f64>,

    /// Where `e` writes the export.
    #[arg(long, env = "CARDRISK_EXPORT_DIR")]
    export_dir: Option<PathBuf>,
}

struct App {
    state: AppState,
    should_quit: bool,
    export_dir: Option<PathBuf>,
}

impl App {
    fn new(state: AppState, export_dir: Option<PathBuf>) -> Self {
        Self {
            state,
            should_quit: false,
            export_dir,
        }
    }

    fn on_key(&mut self, key: KeyEvent) {
        if self.state.help_overlay {
            match key.code {
                KeyCode::Char('?') | KeyCode::Esc => self.state.help_overlay = false,
                KeyCode::Char('q') => self.should_quit = true,
                _ => {}
            }
            return;
        }
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Char('?') => self.state.help_overlay = true,
            KeyCode::Tab => self.state.cycle_focus(),
            KeyCode::Char('j') | KeyCode::Down => self.state.select_next(),
            KeyCode::Char('k') | KeyCode::Up => self.state.select_prev(),
            KeyCode::Enter => match self.state.screen {
                Screen::Setup => {
                    self.state.start_match();
                }
                Screen::Report => {
                    self.state.recompute();
                }
            },
            KeyCode::Char('x') if self.state.screen == Screen::Report => {
                self.state.exclude_selected();
            }
            KeyCode::Char('r') if self.state.screen == Screen::Report => {
                self.state.restore_all();
            }
            KeyCode::Char('e') => self.export(),
            KeyCode::Char('b') | KeyCode::Esc => self.state.screen = Screen::Setup,
            _ => {}
        }
    }

    fn export(&mut self) {
        let Some(report) = self.state.report.as_ref() else {
            self.state.push_log("[INFO] Nothing to export yet");
            return;
        };
        let path = default_export_path(self.export_dir.as_deref(), report, ExportFormat::Xlsx);
        match export_report(&path, report) {
            Ok(done) => self.state.push_log(format!(
                "[INFO] Exported {} players to {}",
                done.players,
                done.path.display()
            )),
            Err(err) => self.state.push_log(format!("[WARN] Export failed: {err:#}")),
        }
    }
}

fn init_logging() -> Result<()> {
    // The terminal owns stdout, so events only go to a file when asked for.
    let Ok(path) = std::env::var(LOG_FILE_ENV) else {
        return Ok(());
    };
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("open log file {path}"))?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");
    let args = Args::parse();
    init_logging()?;

    let mut config = match &args.config {
        Some(path) => ScoringConfig::load(path)?,
        None => ScoringConfig::from_env()?,
    };
    if let Some(min) = args.min_nineties {
        config.min_nineties = min;
        config.validate()?;
    }
    let dataset = load_dataset(&args.workbook, &config)
        .with_context(|| format!("load {}", args.workbook.display()))?;

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
    let backend = ratatui::backend::CrosstermBackend::new(stdout);
    let mut terminal = ratatui::Terminal::new(backend)?;

    let mut app = App::new(AppState::new(dataset, config), args.export_dir);
    let res = run_app(&mut terminal, &mut app);

    disable_raw_mode()?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture
    )?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        eprintln!("error: {err}");
    }
    Ok(())
}

fn run_app<B: Backend>(terminal: &mut Terminal<B>, app: &mut App) -> io::Result<()> {
    let tick_rate = Duration::from_millis(250);
    let mut last_tick = Instant::now();

    loop {
        terminal.draw(|f| ui(f, app))?;

        let timeout = tick_rate
            .checked_sub(last_tick.elapsed())
            .unwrap_or(Duration::ZERO);
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.on_key(key);
                }
            }
        }

        if last_tick.elapsed() >= tick_rate {
            last_tick = Instant::now();
        }

        if app.should_quit {
            return Ok(());
        }
    }
}

fn ui(frame: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(5),
            Constraint::Length(1),
        ])
        .split(frame.size());

    let header = Paragraph::new(header_text(&app.state))
        .block(Block::default().borders(Borders::BOTTOM));
    frame.render_widget(header, chunks[0]);

    match app.state.screen {
        Screen::Setup => render_setup(frame, chunks[1], &app.state),
        Screen::Report => render_report(frame, chunks[1], &app.state),
    }

    let console = Paragraph::new(console_text(&app.state))
        .block(Block::default().title("Console").borders(Borders::ALL));
    frame.render_widget(console, chunks[2]);

    let footer = Paragraph::new(footer_text(&app.state));
    frame.render_widget(footer, chunks[3]);

    if app.state.help_overlay {
        render_help_overlay(frame, frame.size());
    }
}

fn header_text(state: &AppState) -> String {
    let home = state.home_team().unwrap_or("-");
    let away = state.away_team().unwrap_or("-");
    let referee = state.referee().map(|r| r.name.as_str()).unwrap_or("-");
    let title = match state.screen {
        Screen::Setup => format!("CARD RISK | Setup | {home} vs {away} | Ref: {referee}"),
        Screen::Report => format!(
            "CARD RISK | {home} vs {away} | Ref: {referee} | {} excluded",
            state.excluded.len()
        ),
    };
    let line1 = format!("  [Y]  {title}");
    let line2 = format!("  | |  Weights: {}", state.config.name);
    let line3 = "  '-'".to_string();
    format!("{line1}\n{line2}\n{line3}")
}

fn footer_text(state: &AppState) -> String {
    match state.screen {
        Screen::Setup => {
            "Tab Focus | j/k/↑/↓ Move | Enter Compute | ? Help | q Quit".to_string()
        }
        Screen::Report => {
            "Tab Focus | j/k Move | x Exclude | r Restore | e Export | Enter Recompute | b/Esc Setup | ? Help | q Quit"
                .to_string()
        }
    }
}

fn focus_block(title: &str, focused: bool) -> Block<'_> {
    let style = if focused {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default()
    };
    Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(style)
}

fn render_setup(frame: &mut Frame, area: Rect, state: &AppState) {
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(30),
            Constraint::Percentage(30),
            Constraint::Percentage(40),
        ])
        .split(area);

    let referee_names: Vec<String> = state
        .referees
        .iter()
        .map(|r| format!("{} ({:.2})", r.name, r.avg_yellow_per_match))
        .collect();

    render_pick_list(
        frame,
        columns[0],
        "Home",
        &state.teams,
        state.home_idx,
        state.setup_focus == SetupFocus::Home,
    );
    render_pick_list(
        frame,
        columns[1],
        "Away",
        &state.teams,
        state.away_idx,
        state.setup_focus == SetupFocus::Away,
    );
    render_pick_list(
        frame,
        columns[2],
        "Referee",
        &referee_names,
        state.referee_idx,
        state.setup_focus == SetupFocus::Referee,
    );
}

fn render_pick_list(
    frame: &mut Frame,
    area: Rect,
    title: &str,
    items: &[String],
    selected: usize,
    focused: bool,
) {
    let block = focus_block(title, focused);
    let inner = block.inner(area);
    frame.render_widget(block, area);
    if items.is_empty() {
        let empty = Paragraph::new("Nothing loaded").style(Style::default().fg(Color::DarkGray));
        frame.render_widget(empty, inner);
        return;
    }
    let (start, end) = visible_range(selected, items.len(), inner.height as usize);
    for (i, idx) in (start..end).enumerate() {
        let row_area = Rect {
            x: inner.x,
            y: inner.y + i as u16,
            width: inner.width,
            height: 1,
        };
        let style = if idx == selected {
            Style::default().fg(Color::White).bg(Color::DarkGray)
        } else {
            Style::default()
        };
        render_cell_text(frame, row_area, &items[idx], style);
    }
}

fn render_report(frame: &mut Frame, area: Rect, state: &AppState) {
    let Some(report) = state.report.as_ref() else {
        let empty = Paragraph::new("Press b to pick a match")
            .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(empty, area);
        return;
    };

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(50), Constraint::Length(46)])
        .split(area);
    let right = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(7),
            Constraint::Length(8),
            Constraint::Length(14),
            Constraint::Min(1),
        ])
        .split(columns[1]);

    render_ranked(frame, columns[0], state);

    let picks = Paragraph::new(shortlist_text(state))
        .block(focus_block("Top picks", state.report_focus == ReportFocus::Shortlist));
    frame.render_widget(picks, right[0]);

    let summary = Paragraph::new(summary_text(report))
        .block(Block::default().title("Match").borders(Borders::ALL));
    frame.render_widget(summary, right[1]);

    let top = Paragraph::new(team_top_text(report))
        .block(Block::default().title("Top 5 per team").borders(Borders::ALL));
    frame.render_widget(top, right[2]);

    let duels = Paragraph::new(duels_text(report))
        .block(Block::default().title("Duels").borders(Borders::ALL));
    frame.render_widget(duels, right[3]);
}

fn ranked_columns() -> [Constraint; 7] {
    [
        Constraint::Length(4),
        Constraint::Min(18),
        Constraint::Length(14),
        Constraint::Length(4),
        Constraint::Length(12),
        Constraint::Length(6),
        Constraint::Length(6),
    ]
}

fn render_ranked(frame: &mut Frame, area: Rect, state: &AppState) {
    let block = focus_block("Ranking", state.report_focus == ReportFocus::Ranked);
    let inner = block.inner(area);
    frame.render_widget(block, area);
    let Some(report) = state.report.as_ref() else {
        return;
    };

    let sections = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Min(1)])
        .split(inner);
    let widths = ranked_columns();
    render_ranked_header(frame, sections[0], &widths);

    let list_area = sections[1];
    if report.ranked.is_empty() {
        let empty = Paragraph::new("No eligible players")
            .style(Style::default().fg(Color::DarkGray));
        frame.render_widget(empty, list_area);
        return;
    }

    let (start, end) = visible_range(
        state.ranked_selected,
        report.ranked.len(),
        list_area.height as usize,
    );
    let picked: Vec<_> = report.shortlist.entries.iter().map(|e| e.key()).collect();

    for (i, idx) in (start..end).enumerate() {
        let row_area = Rect {
            x: list_area.x,
            y: list_area.y + i as u16,
            width: list_area.width,
            height: 1,
        };
        let p = &report.ranked[idx];
        let selected = idx == state.ranked_selected && state.report_focus == ReportFocus::Ranked;
        let mut row_style = if selected {
            Style::default().fg(Color::White).bg(Color::DarkGray)
        } else {
            Style::default()
        };
        if picked.contains(&p.key()) {
            row_style = row_style.add_modifier(Modifier::BOLD);
        }
        if selected {
            frame.render_widget(Block::default().style(row_style), row_area);
        }

        let cols = Layout::default()
            .direction(Direction::Horizontal)
            .constraints(widths)
            .split(row_area);

        render_cell_text(frame, cols[0], &format!("{}", idx + 1), row_style);
        render_cell_text(frame, cols[1], &p.record.name, row_style);
        render_cell_text(frame, cols[2], &p.record.team, row_style);
        render_cell_text(frame, cols[3], p.record.role.short(), row_style);
        frame.render_widget(risk_bar_chart(p.risk, selected), cols[4]);
        render_cell_text(frame, cols[5], &format!("{:.0}%", p.risk * 100.0), row_style);
        render_cell_text(frame, cols[6], &format!("{:.2}", p.fair_odds), row_style);
    }
}

fn render_ranked_header(frame: &mut Frame, area: Rect, widths: &[Constraint]) {
    let cols = Layout::default()
        .direction(Direction::Horizontal)
        .constraints(widths)
        .split(area);
    let style = Style::default().add_modifier(Modifier::BOLD);

    render_cell_text(frame, cols[0], "#", style);
    render_cell_text(frame, cols[1], "Player", style);
    render_cell_text(frame, cols[2], "Team", style);
    render_cell_text(frame, cols[3], "R", style);
    render_cell_text(frame, cols[4], "Risk bar", style);
    render_cell_text(frame, cols[5], "Risk", style);
    render_cell_text(frame, cols[6], "Odds", style);
}

fn render_cell_text(frame: &mut Frame, area: Rect, text: &str, style: Style) {
    let text_area = Rect {
        x: area.x,
        y: area.y + (area.height / 2),
        width: area.width,
        height: 1,
    };
    let paragraph = Paragraph::new(text).style(style);
    frame.render_widget(paragraph, text_area);
}

fn risk_bar_chart(risk: f64, selected: bool) -> BarChart<'static> {
    let color = if risk >= 0.7 {
        Color::Red
    } else if risk >= 0.4 {
        Color::Yellow
    } else {
        Color::Green
    };
    let mut style = Style::default().fg(color);
    if selected {
        style = style.bg(Color::DarkGray);
    }
    let bar = Bar::default()
        .value((risk * 100.0).round() as u64)
        .text_value(String::new())
        .style(style);

    BarChart::default()
        .data(BarGroup::default().bars(&[bar]))
        .direction(Direction::Horizontal)
        .bar_width(1)
        .bar_gap(0)
        .group_gap(0)
        .max(100)
}

fn visible_range(selected: usize, total: usize, visible: usize) -> (usize, usize) {
    if total == 0 || visible == 0 {
        return (0, 0);
    }
    if total <= visible {
        return (0, total);
    }

    let mut start = selected.saturating_sub(visible / 2);
    if start + visible > total {
        start = total - visible;
    }
    (start, start + visible)
}

fn shortlist_text(state: &AppState) -> String {
    let Some(report) = state.report.as_ref() else {
        return "No shortlist".to_string();
    };
    let mut lines: Vec<String> = report
        .shortlist
        .entries
        .iter()
        .enumerate()
        .map(|(idx, e)| {
            let marker = if state.report_focus == ReportFocus::Shortlist
                && idx == state.shortlist_selected
            {
                ">"
            } else {
                " "
            };
            format!(
                "{marker}{} {:<18} {:<3} {:>3.0}% @{:.2}",
                idx + 1,
                truncate(&e.name, 18),
                e.role.short(),
                e.risk * 100.0,
                e.fair_odds
            )
        })
        .collect();
    lines.push(format!("  {}", report.shortlist.decision.label()));
    lines.join("\n")
}

fn summary_text(report: &cardrisk_terminal::state::MatchReport) -> String {
    let severity = match report.referee.severity {
        Severity::Strict => "STRICT",
        Severity::Medium => "MEDIUM",
        Severity::Permissive => "PERMISSIVE",
    };
    let mut lines = vec![
        format!(
            "Ref {} {:.2}/match {severity} x{:.2}",
            truncate(&report.referee.name, 14),
            report.referee.avg_yellow_per_match,
            report.referee.factor
        ),
        format!(
            "Aggression {:.2} / {:.2}  margin {:.2}",
            report.aggression_a, report.aggression_b, report.shortlist.margin
        ),
        format!(
            "Expected cards {:.1}  confidence {}",
            report.expected_cards,
            report.confidence.label()
        ),
    ];
    for e in &report.eligibility {
        lines.push(format!(
            "{}: {} in pool, {} low minutes, {} excluded",
            truncate(&e.team, 12),
            e.eligible,
            e.excluded_by_minutes,
            e.excluded_by_user
        ));
    }
    lines.join("\n")
}

fn team_top_text(report: &cardrisk_terminal::state::MatchReport) -> String {
    let mut lines = Vec::new();
    for (team, venue) in [(&report.team_a, "home"), (&report.team_b, "away")] {
        lines.push(format!("{} ({venue})", truncate(team, 30)));
        for (idx, p) in report.team_top(team, TEAM_TOP).iter().enumerate() {
            lines.push(format!(
                " {} {:<20} {:<3} {:>3.0}%",
                idx + 1,
                truncate(&p.record.name, 20),
                p.record.role.short(),
                p.risk * 100.0
            ));
        }
    }
    lines.join("\n")
}

fn duels_text(report: &cardrisk_terminal::state::MatchReport) -> String {
    if report.duels.is_empty() {
        return "No plausible duels".to_string();
    }
    report
        .duels
        .iter()
        .map(|d| {
            format!(
                "{} > {}{} {:.2}{}",
                truncate(&d.aggressor.name, 14),
                truncate(&d.victim.name, 14),
                if d.priority_victim { "*" } else { "" },
                d.pair_risk,
                if d.mirrored { " M" } else { "" }
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let mut out: String = text.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
}

fn console_text(state: &AppState) -> String {
    if state.logs.is_empty() {
        return "No messages yet".to_string();
    }
    state
        .logs
        .iter()
        .rev()
        .take(3)
        .cloned()
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_help_overlay(frame: &mut Frame, area: Rect) {
    let popup_area = centered_rect(60, 60, area);
    frame.render_widget(Clear, popup_area);

    let text = [
        "Card Risk - Help",
        "",
        "Global:",
        "  Tab          Cycle focus",
        "  j/k or ↑/↓   Move",
        "  e            Export ranking (.xlsx)",
        "  ?            Toggle help",
        "  q            Quit",
        "",
        "Setup:",
        "  Enter        Compute for home / away / referee",
        "",
        "Report:",
        "  x            Exclude highlighted player",
        "  r            Restore excluded players",
        "  Enter        Recompute",
        "  b / Esc      Back to setup",
        "",
        "Duels: M mirrored flanks, * high-risk victim",
    ]
    .join("\n");

    let help = Paragraph::new(text)
        .block(Block::default().title("Help").borders(Borders::ALL))
        .style(Style::default());
    frame.render_widget(help, popup_area);
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    let horizontal = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1]);

    horizontal[1]
}
