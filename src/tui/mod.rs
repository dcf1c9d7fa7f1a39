//! Terminal user interface.
//!
//! Follows the Elm Architecture: key events become [`Message`]s, the
//! [`App`] processes them, and `ui::draw` renders the resulting state.

pub mod app;
pub mod input;
pub mod message;
pub mod ui;

pub use app::{App, Section, SPINNER_FRAMES};
pub use message::Message;

use crate::api::ApiClient;
use crate::config::Config;
use crate::sync::{DetailFetcher, PageFetcher, SyncController};
use anyhow::{bail, Result};
use crossterm::{
    event::{self, Event, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{backend::CrosstermBackend, Terminal};
use std::io::{self, IsTerminal};
use std::sync::Arc;
use std::time::{Duration, Instant};

const TICK_RATE: Duration = Duration::from_millis(250);

/// Run the TUI application.
pub async fn run(config: Config) -> Result<()> {
    if !io::stdout().is_terminal() {
        bail!("not a terminal; refusing to start the TUI");
    }

    let client = Arc::new(ApiClient::new(&config));

    let page_client = Arc::clone(&client);
    let fetch_page: PageFetcher = Arc::new(move |params, cursor| {
        let client = Arc::clone(&page_client);
        Box::pin(async move { client.fetch_issues_page(&params, cursor.as_deref()).await })
    });

    let detail_client = Arc::clone(&client);
    let fetch_detail: DetailFetcher = Arc::new(move |id| {
        let client = Arc::clone(&detail_client);
        Box::pin(async move { client.fetch_issue(&id).await })
    });

    let mut sync = SyncController::new(fetch_page, fetch_detail);

    // Resolve the current user up front so the My/Other split is right
    // from the first page. A failure here degrades to everything in
    // Other rather than aborting.
    match client.current_user().await {
        Ok(user) => sync.set_owner(user.id),
        Err(e) => tracing::warn!("could not resolve current user: {e:#}"),
    }

    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new(config, sync);
    app.initial_refresh();

    let result = run_app(&mut terminal, &mut app).await;

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

async fn run_app(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    app: &mut App,
) -> Result<()> {
    let mut input_state = input::InputState::new();
    let mut last_tick = Instant::now();

    loop {
        terminal.draw(|f| ui::draw(f, app))?;

        let timeout = TICK_RATE.saturating_sub(last_tick.elapsed());
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    let msg = input::dispatch(app, &mut input_state, key);
                    if app.update(msg)? {
                        return Ok(());
                    }
                }
            }
        }

        if input_state.has_timed_out() {
            input_state.clear();
        }

        if last_tick.elapsed() >= TICK_RATE {
            app.on_tick();
            last_tick = Instant::now();
        }
    }
}
