use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap},
};
use std::io::stdout;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::analytics::AnalyticsSummary;
use crate::error::ClientError;
use crate::export::{DownloadRecord, ExportDispatcher, ExportFormat};
use crate::models::JobRecord;
use crate::session::Session;
use crate::truncate;
use crate::view::{SortField, ViewState};

const TICK: Duration = Duration::from_millis(100);

type DownloadOutcome = (ExportFormat, Result<DownloadRecord, ClientError>);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Browse,
    Filter,
}

struct AppState {
    jobs: Arc<Vec<JobRecord>>,
    analytics: Option<AnalyticsSummary>,
    pages_scraped: usize,
    view: ViewState,
    mode: Mode,
    selected: usize,
    status: Option<String>,
}

impl AppState {
    fn new(session: &mut Session) -> Self {
        Self {
            jobs: Arc::clone(session.jobs()),
            analytics: session.analytics().cloned(),
            pages_scraped: session.pages_scraped(),
            view: ViewState::default(),
            mode: Mode::Browse,
            selected: 0,
            status: session.message().map(str::to_string),
        }
    }

    fn visible(&self) -> Vec<&JobRecord> {
        self.view.apply(&self.jobs)
    }

    fn current_job(&self) -> Option<&JobRecord> {
        self.visible().get(self.selected).copied()
    }

    fn next(&mut self) {
        let len = self.visible().len();
        if len > 0 && self.selected < len - 1 {
            self.selected += 1;
        }
    }

    fn prev(&mut self) {
        self.selected = self.selected.saturating_sub(1);
    }

    /// The row under the cursor may be gone after a filter or sort change.
    fn view_changed(&mut self) {
        self.selected = 0;
    }
}

pub async fn run_browse(session: &mut Session, dispatcher: Arc<ExportDispatcher>) -> Result<()> {
    if session.jobs().is_empty() {
        println!("No jobs found.");
        return Ok(());
    }

    let mut state = AppState::new(session);

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let result = run_loop(&mut terminal, &mut state, &dispatcher).await;

    // Restore terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
}

/// Runs one export in the background; the outcome arrives on `results`.
fn spawn_download(
    dispatcher: &Arc<ExportDispatcher>,
    format: ExportFormat,
    results: &UnboundedSender<DownloadOutcome>,
) {
    let dispatcher = Arc::clone(dispatcher);
    let results = results.clone();
    tokio::spawn(async move {
        let outcome = dispatcher.download_format(format).await;
        // The view may already be closed.
        let _ = results.send((format, outcome));
    });
}

fn download_status(dispatcher: &ExportDispatcher, (format, outcome): DownloadOutcome) -> String {
    match outcome {
        Ok(record) => format!(
            "Saved {} ({} bytes) to {}",
            record.filename,
            record.size,
            dispatcher.download_dir().display()
        ),
        Err(e) => format!("{} download failed: {}", format.label(), e.user_message()),
    }
}

async fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>,
    state: &mut AppState,
    dispatcher: &Arc<ExportDispatcher>,
) -> Result<()> {
    let mut list_state = ListState::default();
    let (results_tx, mut results_rx): (_, UnboundedReceiver<DownloadOutcome>) = mpsc::unbounded_channel();

    loop {
        while let Ok(outcome) = results_rx.try_recv() {
            state.status = Some(download_status(dispatcher, outcome));
        }

        let has_rows = !state.visible().is_empty();
        list_state.select(has_rows.then_some(state.selected));
        terminal.draw(|frame| draw(frame, state, dispatcher, &mut list_state))?;

        // Poll so finished downloads show up without a key press.
        if !event::poll(TICK)? {
            continue;
        }
        let Event::Key(key) = event::read()? else {
            continue;
        };
        if key.kind != KeyEventKind::Press {
            continue;
        }

        if state.mode == Mode::Filter {
            match key.code {
                KeyCode::Enter | KeyCode::Esc => state.mode = Mode::Browse,
                KeyCode::Backspace => {
                    state.view.filter_text.pop();
                    state.view_changed();
                }
                KeyCode::Char(c) => {
                    state.view.filter_text.push(c);
                    state.view_changed();
                }
                _ => {}
            }
            continue;
        }

        match key.code {
            KeyCode::Char('q') | KeyCode::Esc => break,
            KeyCode::Down | KeyCode::Char('j') => state.next(),
            KeyCode::Up | KeyCode::Char('k') => state.prev(),
            KeyCode::Char('/') => state.mode = Mode::Filter,
            KeyCode::Char('u') => {
                state.view.filter_text.clear();
                state.view_changed();
            }
            KeyCode::Char('t') => {
                state.view.toggle_sort(SortField::Title);
                state.view_changed();
            }
            KeyCode::Char('c') => {
                state.view.toggle_sort(SortField::Company);
                state.view_changed();
            }
            KeyCode::Char('l') => {
                state.view.toggle_sort(SortField::Location);
                state.view_changed();
            }
            KeyCode::Char('s') => {
                state.view.clear_sort();
                state.view_changed();
            }
            KeyCode::Char(c @ '1'..='3') => {
                let format = ExportFormat::ALL[(c as u8 - b'1') as usize];
                if dispatcher.is_busy(format) {
                    state.status = Some(format!("{} download already running", format.label()));
                    continue;
                }
                state.status = Some(format!("Downloading {}...", format.label()));
                spawn_download(dispatcher, format, &results_tx);
            }
            _ => {}
        }
    }
    Ok(())
}

fn draw(frame: &mut Frame, state: &AppState, dispatcher: &ExportDispatcher, list_state: &mut ListState) {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(0), Constraint::Length(1), Constraint::Length(1)])
        .split(frame.area());

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(rows[0]);

    let side = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(6), Constraint::Length(14), Constraint::Length(8)])
        .split(columns[1]);

    // Left panel: job table
    let visible = state.visible();
    let items: Vec<ListItem> = visible
        .iter()
        .map(|job| {
            let display = job.normalize();
            let marker = if display.link.is_some() { " " } else { "-" };
            ListItem::new(format!(
                "{} {:<32} {:<22} {}",
                marker,
                truncate(&display.title, 30),
                truncate(&display.company, 20),
                truncate(&display.location, 24)
            ))
        })
        .collect();

    let list = List::new(items)
        .block(Block::default().borders(Borders::ALL).title(list_title(state, visible.len())))
        .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
        .highlight_symbol("> ");
    frame.render_stateful_widget(list, columns[0], list_state);

    // Right panel: detail, analytics, downloads
    let detail = Paragraph::new(build_detail(state))
        .block(Block::default().borders(Borders::ALL).title(" Detail "))
        .wrap(Wrap { trim: false });
    frame.render_widget(detail, side[0]);

    let analytics = Paragraph::new(build_analytics(state))
        .block(Block::default().borders(Borders::ALL).title(" Analytics "));
    frame.render_widget(analytics, side[1]);

    let downloads = Paragraph::new(build_downloads(dispatcher))
        .block(Block::default().borders(Borders::ALL).title(" Downloads "));
    frame.render_widget(downloads, side[2]);

    let status = match state.mode {
        Mode::Filter => Line::from(vec![
            Span::styled(" Filter: ", Style::default().fg(Color::Yellow)),
            Span::raw(format!("{}_", state.view.filter_text)),
        ]),
        Mode::Browse => Line::from(format!(" {}", state.status.as_deref().unwrap_or(""))),
    };
    frame.render_widget(Paragraph::new(status), rows[1]);

    let help = Paragraph::new(
        " j/k:navigate  /:filter u:clear  t/c/l:sort s:unsort  1:csv 2:excel 3:json  q:quit",
    )
    .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(help, rows[2]);
}

fn list_title(state: &AppState, shown: usize) -> String {
    let mut title = format!(" Jobs ({}/{}) ", shown, state.jobs.len());
    if let Some(field) = state.view.sort_field {
        title.push_str(&format!("sort: {} {} ", field.label(), state.view.sort_direction.arrow()));
    }
    if !state.view.filter_text.is_empty() {
        title.push_str(&format!("filter: '{}' ", state.view.filter_text));
    }
    title
}

fn build_detail(state: &AppState) -> Text<'static> {
    let Some(job) = state.current_job() else {
        return Text::raw("No jobs match the filter");
    };
    let display = job.normalize();

    let mut lines: Vec<Line> = Vec::new();
    for line in textwrap::fill(&display.title, 50).lines() {
        lines.push(Line::from(Span::styled(
            line.to_string(),
            Style::default().add_modifier(Modifier::BOLD),
        )));
    }
    lines.push(Line::from(format!("at {}", display.company)));
    lines.push(Line::from(format!("Location: {}", display.location)));
    lines.push(Line::from(""));

    match display.link {
        Some(url) => lines.push(Line::from(Span::styled(
            url,
            Style::default().fg(Color::Cyan).add_modifier(Modifier::UNDERLINED),
        ))),
        None => lines.push(Line::from(Span::styled(
            "(No link available)",
            Style::default().fg(Color::DarkGray),
        ))),
    }

    Text::from(lines)
}

fn build_analytics(state: &AppState) -> Text<'static> {
    let Some(summary) = &state.analytics else {
        return Text::raw("No data");
    };

    let mut lines = vec![
        Line::from(format!(
            "Jobs: {}   Pages: {}   Valid links: {}%",
            summary.total_jobs, state.pages_scraped, summary.valid_link_percentage
        )),
        Line::from(format!(
            "Companies: {}   Locations: {}",
            summary.unique_companies, summary.unique_locations
        )),
        Line::from(""),
        Line::from(Span::styled("TOP COMPANIES", Style::default().fg(Color::Cyan))),
    ];
    for (name, count) in &summary.top_companies {
        lines.push(Line::from(format!("  {:<28} {:>4}", truncate(name, 28), count)));
    }
    lines.push(Line::from(Span::styled("TOP LOCATIONS", Style::default().fg(Color::Cyan))));
    for (name, count) in &summary.top_locations {
        lines.push(Line::from(format!("  {:<28} {:>4}", truncate(name, 28), count)));
    }

    Text::from(lines)
}

fn build_downloads(dispatcher: &ExportDispatcher) -> Text<'static> {
    let history = dispatcher.history();
    if history.is_empty() {
        return Text::from(Line::from(Span::styled(
            "(Nothing downloaded yet)",
            Style::default().fg(Color::DarkGray),
        )));
    }

    let lines: Vec<Line> = history
        .iter()
        .map(|record| {
            Line::from(format!(
                "{} {:<5} {} ({} B)",
                record.timestamp.with_timezone(&chrono::Local).format("%H:%M:%S"),
                record.format.label(),
                record.filename,
                record.size
            ))
        })
        .collect();
    Text::from(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ApiClient;
    use crate::config::Config;
    use axum::Router;
    use axum::routing::get;
    use tokio::net::TcpListener;

    async fn slow_export_backend() -> String {
        let app = Router::new().route(
            "/download/{format}",
            get(|| async {
                tokio::time::sleep(Duration::from_millis(300)).await;
                "Title\nEngineer\n"
            }),
        );
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://127.0.0.1:{}", addr.port())
    }

    #[tokio::test]
    async fn test_spawned_downloads_run_side_by_side() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            api_url: slow_export_backend().await,
            ..Config::default()
        };
        let dispatcher = Arc::new(ExportDispatcher::new(
            ApiClient::new(&config).unwrap(),
            dir.path().to_path_buf(),
        ));
        let (tx, mut rx) = mpsc::unbounded_channel();

        spawn_download(&dispatcher, ExportFormat::Csv, &tx);
        spawn_download(&dispatcher, ExportFormat::Json, &tx);

        // Both are in flight at once, and the key handler sees them as busy.
        let mut both_busy = false;
        for _ in 0..50 {
            if dispatcher.is_busy(ExportFormat::Csv) && dispatcher.is_busy(ExportFormat::Json) {
                both_busy = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert!(both_busy);

        let mut finished = Vec::new();
        for _ in 0..2 {
            let (format, outcome) = rx.recv().await.unwrap();
            assert!(outcome.is_ok());
            finished.push(format);
        }
        finished.sort_by_key(|f| f.as_str());
        assert_eq!(finished, vec![ExportFormat::Csv, ExportFormat::Json]);
        assert!(!dispatcher.is_busy(ExportFormat::Csv));
        assert_eq!(dispatcher.history().len(), 2);
    }

    #[test]
    fn test_failed_download_status_names_the_format() {
        let config = Config {
            api_url: "http://127.0.0.1:9".to_string(),
            ..Config::default()
        };
        let dispatcher = ExportDispatcher::new(ApiClient::new(&config).unwrap(), "out".into());
        let status = download_status(
            &dispatcher,
            (
                ExportFormat::Excel,
                Err(ClientError::Server {
                    status: 404,
                    detail: "No data available. Please scrape jobs first.".to_string(),
                }),
            ),
        );
        assert!(status.starts_with("Excel download failed: "));
        assert!(status.contains("No data available"));
    }
}
