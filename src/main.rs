use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::io;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use chrono::Utc;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::prelude::*;
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState};

use foe_scout::pipeline::{self, ComputedRow};
use foe_scout::presets;
use foe_scout::provider;
use foe_scout::reveal::Reveal;
use foe_scout::state::{
    apply_delta, AppState, Delta, ProviderCommand, RecruitmentUpdate, SettingsChange,
};

struct App {
    state: AppState,
    should_quit: bool,
    cmd_tx: Option<mpsc::Sender<ProviderCommand>>,
    reveal: Reveal,
    result_fingerprint: u64,
    next_reveal_step: Option<Instant>,
}

impl App {
    fn new(cmd_tx: Option<mpsc::Sender<ProviderCommand>>) -> Self {
        Self {
            state: AppState::new(),
            should_quit: false,
            cmd_tx,
            reveal: Reveal::new(),
            result_fingerprint: 0,
            next_reveal_step: None,
        }
    }

    fn send(&mut self, cmd: ProviderCommand) {
        if let Some(tx) = &self.cmd_tx
            && tx.send(cmd).is_err()
        {
            self.state.push_log("[WARN] Provider channel closed");
        }
    }

    fn request_snapshot_list(&mut self) {
        self.send(ProviderCommand::LoadSnapshotList);
    }

    /// Kick off loads for every snapshot id some tab needs.
    fn sync_loads(&mut self) {
        for snapshot_id in self.state.needed_snapshot_ids() {
            self.state.mark_loading(snapshot_id);
            self.send(ProviderCommand::LoadSnapshot { snapshot_id });
        }
    }

    /// Restart the reveal whenever the active result set changes identity.
    fn sync_reveal(&mut self, rows: &[ComputedRow]) {
        let fingerprint = result_fingerprint(&self.state, rows);
        if fingerprint != self.result_fingerprint {
            self.result_fingerprint = fingerprint;
            self.reveal.reset(rows.len());
            self.next_reveal_step = if self.reveal.is_complete() {
                None
            } else {
                Some(Instant::now() + self.reveal.delay())
            };
        }
    }

    fn tick_reveal(&mut self) {
        if let Some(due) = self.next_reveal_step
            && Instant::now() >= due
        {
            self.reveal.advance(self.reveal.version());
            self.next_reveal_step = if self.reveal.is_complete() {
                None
            } else {
                Some(Instant::now() + self.reveal.delay())
            };
        }
    }

    fn on_key(&mut self, key: KeyEvent, rows: &[ComputedRow]) {
        let shown = rows.len().min(self.reveal.shown());
        match key.code {
            KeyCode::Char('q') => self.should_quit = true,
            KeyCode::Tab => self.state.select_next_tab(),
            KeyCode::Char('x') => {
                let id = self.state.active_tab_id.clone();
                self.state.close_tab(&id);
            }
            KeyCode::Char('j') | KeyCode::Down => self.state.select_next(shown),
            KeyCode::Char('k') | KeyCode::Up => self.state.select_prev(shown),
            KeyCode::Char('s') => self.state.cycle_active_sort_key(),
            KeyCode::Char('r') => self.state.toggle_active_sort_direction(),
            KeyCode::Char('g') | KeyCode::Enter => {
                if let Some(selected) = rows.get(self.state.selected) {
                    let guild_id = selected.row.guild_id;
                    let guild_name = selected.row.guild_name.clone();
                    if guild_id.is_some() || guild_name.is_some() {
                        self.state.open_guild_tab(guild_id, guild_name.as_deref());
                    }
                }
            }
            KeyCode::Char('e') => {
                if let Some(name) = rows
                    .get(self.state.selected)
                    .and_then(|r| r.row.guild_name.clone())
                {
                    self.state
                        .update_active_settings(SettingsChange::AddExcludedGuild(name));
                }
            }
            KeyCode::Char('n') => self.cycle_snapshot(),
            KeyCode::Char('c') => self.cycle_comparison(),
            KeyCode::Char('a') => self.state.apply_settings_to_all(),
            KeyCode::Char('i') => {
                let current = self
                    .state
                    .active_tab()
                    .map(|t| t.settings.exclude_contacted)
                    .unwrap_or(false);
                self.state
                    .update_active_settings(SettingsChange::ExcludeContacted(!current));
            }
            KeyCode::Char('v') => {
                let current = self
                    .state
                    .active_tab()
                    .map(|t| t.settings.show_invitation)
                    .unwrap_or(false);
                self.state
                    .update_active_settings(SettingsChange::ShowInvitation(!current));
            }
            KeyCode::Char('m') => self.mark_contacted(rows),
            KeyCode::Char('1') => self.state.apply_preset("default"),
            KeyCode::Char('2') => self.state.apply_preset("recruit"),
            _ => {}
        }
    }

    fn cycle_snapshot(&mut self) {
        let ids: Vec<u32> = self.state.snapshots.iter().map(|s| s.id).collect();
        if ids.is_empty() {
            return;
        }
        let current = self.state.active_tab().and_then(|t| t.settings.snapshot_id);
        let next = match current.and_then(|id| ids.iter().position(|i| *i == id)) {
            Some(pos) => ids[(pos + 1) % ids.len()],
            None => ids[0],
        };
        self.state
            .update_active_settings(SettingsChange::SnapshotId(Some(next)));
    }

    /// Cycle comparison: none -> each other snapshot by day offset -> none.
    fn cycle_comparison(&mut self) {
        let Some(base_id) = self.state.active_tab().and_then(|t| t.settings.snapshot_id) else {
            return;
        };
        let options = presets::comparison_options(&self.state.snapshots, base_id);
        let current = self
            .state
            .active_tab()
            .and_then(|t| t.settings.comparison_snapshot_id);
        let next = match current.and_then(|id| options.iter().position(|o| o.id == id)) {
            None => options.first().map(|o| o.id),
            Some(pos) if pos + 1 < options.len() => Some(options[pos + 1].id),
            Some(_) => None,
        };
        self.state
            .update_active_settings(SettingsChange::ComparisonSnapshotId(next));
    }

    fn mark_contacted(&mut self, rows: &[ComputedRow]) {
        let Some(snapshot_id) = self.state.active_tab().and_then(|t| t.settings.snapshot_id)
        else {
            return;
        };
        let Some(selected) = rows.get(self.state.selected) else {
            return;
        };
        let update = RecruitmentUpdate {
            recruitment_status: "contacted".to_string(),
            recruitment_note: selected.row.recruitment_note.clone().unwrap_or_default(),
            recruitment_last_contacted_at: Utc::now().format("%Y-%m-%d").to_string(),
        };
        let player_id = selected.row.player_id;
        self.send(ProviderCommand::UpdateRecruitment {
            snapshot_id,
            player_id,
            update,
        });
        self.state
            .push_log(format!("[INFO] Recruitment update sent for player {player_id}"));
    }
}

/// Identity of the active result set: tab, settings, sort and row order. A
/// change here means any pending reveal batch belongs to a stale set.
fn result_fingerprint(state: &AppState, rows: &[ComputedRow]) -> u64 {
    let mut hasher = DefaultHasher::new();
    if let Some(tab) = state.active_tab() {
        tab.id.hash(&mut hasher);
        tab.sort.hash(&mut hasher);
        tab.settings.hash(&mut hasher);
    }
    rows.len().hash(&mut hasher);
    for row in rows {
        row.row.player_id.hash(&mut hasher);
        row.battles_diff.hash(&mut hasher);
    }
    hasher.finish()
}

fn main() -> io::Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = ratatui::backend::CrosstermBackend::new(stdout);
    let mut terminal = ratatui::Terminal::new(backend)?;

    let (tx, rx) = mpsc::channel();
    let (cmd_tx, cmd_rx) = mpsc::channel();
    provider::spawn_provider(tx, cmd_rx);

    let mut app = App::new(Some(cmd_tx));
    app.request_snapshot_list();
    let res = run_app(&mut terminal, &mut app, rx);

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        eprintln!("error: {err}");
    }
    Ok(())
}

fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
    rx: mpsc::Receiver<Delta>,
) -> io::Result<()> {
    let tick_rate = Duration::from_millis(250);

    loop {
        while let Ok(delta) = rx.try_recv() {
            apply_delta(&mut app.state, delta);
        }

        app.sync_loads();

        let rows = match app.state.active_tab() {
            Some(tab) => pipeline::derive_rows(&app.state.player_cache, tab),
            None => Vec::new(),
        };
        app.sync_reveal(&rows);
        app.tick_reveal();
        let shown = rows.len().min(app.reveal.shown());
        app.state.clamp_selection(shown);

        terminal.draw(|f| ui(f, app, &rows))?;

        let timeout = app
            .next_reveal_step
            .map(|due| due.saturating_duration_since(Instant::now()))
            .unwrap_or(tick_rate)
            .min(tick_rate);
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    app.on_key(key, &rows);
                }
            }
        }

        if app.should_quit {
            return Ok(());
        }
    }
}

fn format_thousands(value: i64) -> String {
    let negative = value < 0;
    let digits = value.abs().to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('\'');
        }
        grouped.push(c);
    }
    if negative {
        format!("-{grouped}")
    } else {
        grouped
    }
}

fn diff_cell(diff: Option<i64>) -> String {
    match diff {
        None => "–".to_string(),
        Some(0) => "0".to_string(),
        Some(d) if d > 0 => format!("+{}", format_thousands(d)),
        Some(d) => format_thousands(d),
    }
}

fn era_cell(era_nr: i64) -> String {
    presets::era_name(era_nr)
        .map(str::to_string)
        .unwrap_or_else(|| era_nr.to_string())
}

fn ui(frame: &mut Frame, app: &App, rows: &[ComputedRow]) {
    let show_invitation = app
        .state
        .active_tab()
        .map(|t| t.settings.show_invitation)
        .unwrap_or(false);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(2),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Min(1),
            Constraint::Length(1),
        ])
        .split(frame.size());

    let dataset = match app.state.active_snapshot() {
        Some(snapshot) => format!("Dataset: {} ({})", snapshot.captured_at, snapshot.label),
        None => "Pick a dataset to get started".to_string(),
    };
    let header = Paragraph::new(format!("FOE SCOUT | Player Stats\n{dataset}"));
    frame.render_widget(header, chunks[0]);

    let tabs_line: String = app
        .state
        .tabs
        .iter()
        .map(|tab| {
            if tab.id == app.state.active_tab_id {
                format!("[{}]", tab.label)
            } else {
                format!(" {} ", tab.label)
            }
        })
        .collect::<Vec<_>>()
        .join(" ");
    frame.render_widget(Paragraph::new(tabs_line), chunks[1]);

    let shown = rows.len().min(app.reveal.shown());
    let mut meta = format!("Showing {shown} of {} rows", rows.len());
    let active_settings = app.state.active_tab().map(|t| &t.settings);
    if app
        .state
        .is_loading(active_settings.and_then(|s| s.snapshot_id))
    {
        meta.push_str("  [Loading...]");
    }
    if app
        .state
        .is_loading(active_settings.and_then(|s| s.comparison_snapshot_id))
    {
        meta.push_str("  [Loading comparison...]");
    }
    if let Some(notice) = rows
        .get(app.state.selected)
        .and_then(|r| app.state.row_notices.get(&r.row.player_id))
    {
        meta.push_str(&format!("  [{notice}]"));
    }
    let meta_widget = if let Some(error) = &app.state.error {
        Paragraph::new(format!("{meta}  {error}")).style(Style::default().fg(Color::Red))
    } else {
        Paragraph::new(meta)
    };
    frame.render_widget(meta_widget, chunks[2]);

    render_table(frame, chunks[3], app, rows, shown, show_invitation);

    let footer = Paragraph::new(
        "q Quit | Tab Next tab | x Close | j/k Move | s Sort | r Dir | g Guild | e Exclude | \
         n Dataset | c Compare | 1/2 Preset | a Apply all | i Contacted | v Invite | m Mark",
    )
    .block(Block::default().borders(Borders::TOP));
    frame.render_widget(footer, chunks[4]);
}

fn render_table(
    frame: &mut Frame,
    area: Rect,
    app: &App,
    rows: &[ComputedRow],
    shown: usize,
    show_invitation: bool,
) {
    let sort = app.state.active_tab().map(|t| t.sort);
    let mut titles = vec![
        "Player ID".to_string(),
        "Player".to_string(),
        "Guild".to_string(),
        "Era".to_string(),
        "Points".to_string(),
        "Battles".to_string(),
        "Battles Δ".to_string(),
    ];
    if show_invitation {
        titles.push("Invitation".to_string());
    }
    if let Some(sort) = sort {
        let marker = match sort.direction {
            foe_scout::state::SortDirection::Asc => " ↑",
            foe_scout::state::SortDirection::Desc => " ↓",
        };
        for title in titles.iter_mut() {
            if title.as_str() == sort.key.label() {
                title.push_str(marker);
            }
        }
    }

    // Column widths come from the full sorted set, not just the revealed
    // prefix, so the table doesn't jitter as batches append.
    let cells_for = |r: &ComputedRow| -> Vec<String> {
        let mut cells = vec![
            r.row.player_id.to_string(),
            r.row.player_name.clone(),
            r.row.guild_name.clone().unwrap_or_else(|| "-".to_string()),
            era_cell(r.row.era_nr),
            format_thousands(r.row.points),
            format_thousands(r.row.battles),
            diff_cell(r.battles_diff),
        ];
        if show_invitation {
            let status = r.row.recruitment_status.as_deref().unwrap_or("-");
            let contacted = r
                .row
                .recruitment_last_contacted_at
                .as_deref()
                .unwrap_or("never");
            cells.push(format!("{status} ({contacted})"));
        }
        cells
    };

    let mut widths: Vec<usize> = titles.iter().map(|t| t.chars().count()).collect();
    for row in rows {
        for (i, cell) in cells_for(row).iter().enumerate() {
            widths[i] = widths[i].max(cell.chars().count().min(28));
        }
    }

    let header = Row::new(titles.iter().cloned().map(Cell::from))
        .style(Style::default().add_modifier(Modifier::BOLD));
    let body = rows[..shown].iter().map(|r| Row::new(cells_for(r)));
    let constraints: Vec<Constraint> = widths
        .iter()
        .map(|w| Constraint::Length(*w as u16 + 1))
        .collect();

    let table = Table::new(body, constraints)
        .header(header)
        .highlight_style(Style::default().fg(Color::White).bg(Color::DarkGray));
    let mut table_state = TableState::default();
    table_state.select(if shown == 0 {
        None
    } else {
        Some(app.state.selected.min(shown - 1))
    });
    frame.render_stateful_widget(table, area, &mut table_state);
}
