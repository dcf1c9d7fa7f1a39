use crate::config::Config;
use crate::data::tree::Row;
use crate::data::FetchParams;
use crate::sync::SyncController;
use anyhow::Result;
use std::sync::Arc;

/// Braille spinner frames for loading animation
pub const SPINNER_FRAMES: &[char] = &['⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧', '⠇', '⠏'];

/// Which issue section the cursor lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Section {
    #[default]
    Mine,
    Other,
}

pub struct App {
    pub config: Arc<Config>,
    pub sync: SyncController,
    pub params: FetchParams,

    pub section: Section,
    pub cursor_mine: usize,
    pub cursor_other: usize,

    // Search state
    pub search_mode: bool,
    pub search_input: String,

    // UI state
    pub show_help: bool,
    pub show_details: bool,
    pub spinner_frame: usize,
}

impl App {
    pub fn new(config: Config, sync: SyncController) -> Self {
        let params = FetchParams {
            page_size: config.api.page_size,
            ..Default::default()
        };
        let show_details = config.ui.show_details;
        Self {
            config: Arc::new(config),
            sync,
            params,
            section: Section::Mine,
            cursor_mine: 0,
            cursor_other: 0,
            search_mode: false,
            search_input: String::new(),
            show_help: false,
            show_details,
            spinner_frame: 0,
        }
    }

    /// Kick off the initial fetch (non-blocking; the UI shows immediately
    /// with a loading state).
    pub fn initial_refresh(&mut self) {
        self.sync.request_refresh(self.params.clone(), None, true);
    }

    /// Process a message and update app state (Elm Architecture update
    /// function). Returns `Ok(true)` if the app should quit.
    pub fn update(&mut self, msg: super::Message) -> Result<bool> {
        use super::Message;
        match msg {
            Message::Quit => return Ok(true),
            Message::Refresh => {
                self.sync.request_refresh(self.params.clone(), None, true);
            }
            Message::HardReload => {
                self.sync.reset();
                self.cursor_mine = 0;
                self.cursor_other = 0;
                self.sync.request_refresh(self.params.clone(), None, true);
            }

            Message::MoveUp => self.move_cursor(-1),
            Message::MoveDown => self.move_cursor(1),
            Message::GotoTop => self.set_cursor(0),
            Message::GotoBottom => {
                let last = self.active_rows().len().saturating_sub(1);
                self.set_cursor(last);
            }
            Message::PageUp => self.move_cursor(-10),
            Message::PageDown => self.move_cursor(10),
            Message::SwitchSection => self.switch_section(),

            Message::ExpandRow => {
                if let Some(row) = self.current_row() {
                    if row.has_children && !row.expanded {
                        let id = row.id.clone();
                        self.sync.toggle_expanded(&id);
                    }
                }
            }
            Message::CollapseRow => self.collapse_or_jump_to_parent(),
            Message::ToggleRow => {
                if let Some(row) = self.current_row() {
                    let id = row.id.clone();
                    self.sync.toggle_expanded(&id);
                    self.clamp_cursors();
                }
            }
            Message::ExpandAll => {
                self.sync.expand_all();
            }
            Message::CollapseAll => {
                self.sync.collapse_all();
                self.clamp_cursors();
            }

            Message::EnterSearch => {
                self.search_mode = true;
                self.search_input = self.params.search.clone();
            }
            Message::ExitSearch => {
                self.search_mode = false;
            }
            Message::ConfirmSearch => {
                self.search_mode = false;
                if self.search_input != self.params.search {
                    self.params.search = self.search_input.clone();
                    self.sync.request_refresh(self.params.clone(), None, true);
                }
            }
            Message::SearchInput(c) => {
                self.search_input.push(c);
            }
            Message::SearchBackspace => {
                self.search_input.pop();
            }

            Message::CycleSort => {
                self.params.order_by = self.params.order_by.next();
                self.sync.request_refresh(self.params.clone(), None, false);
            }
            Message::ToggleDetails => self.show_details = !self.show_details,
            Message::ToggleHelp => self.show_help = !self.show_help,
            Message::OpenInBrowser => {
                if let Some(issue) = self.sync.selected() {
                    if !issue.url.is_empty() {
                        open_url(&issue.url)?;
                    }
                }
            }

            Message::None => {}
        }
        Ok(false)
    }

    /// Advance the event-driven parts of the app: spinner animation plus
    /// draining background sync results (non-blocking).
    pub fn on_tick(&mut self) {
        if self.sync.is_busy() {
            self.spinner_frame = (self.spinner_frame + 1) % SPINNER_FRAMES.len();
        }

        let published = self.sync.poll();
        if published > 0 {
            self.clamp_cursors();
            self.align_cursor_to_selection();
        }
        if self.sync.take_focus_request() {
            self.section = if self.sync.mine_rows().is_empty() {
                Section::Other
            } else {
                Section::Mine
            };
        }
    }

    pub fn spinner_char(&self) -> char {
        SPINNER_FRAMES[self.spinner_frame]
    }

    // ─────────────────────────────────────────────────────────────────────
    // Cursor and section handling
    // ─────────────────────────────────────────────────────────────────────

    pub fn active_rows(&self) -> &[Row] {
        match self.section {
            Section::Mine => self.sync.mine_rows(),
            Section::Other => self.sync.other_rows(),
        }
    }

    pub fn cursor(&self) -> usize {
        match self.section {
            Section::Mine => self.cursor_mine,
            Section::Other => self.cursor_other,
        }
    }

    pub fn current_row(&self) -> Option<&Row> {
        self.active_rows().get(self.cursor())
    }

    fn set_cursor(&mut self, value: usize) {
        let len = self.active_rows().len();
        let clamped = if len == 0 { 0 } else { value.min(len - 1) };
        match self.section {
            Section::Mine => self.cursor_mine = clamped,
            Section::Other => self.cursor_other = clamped,
        }
        self.select_under_cursor();
    }

    fn move_cursor(&mut self, delta: i32) {
        let len = self.active_rows().len();
        if len == 0 {
            return;
        }
        let current = self.cursor() as i64;
        let target = (current + delta as i64).clamp(0, len as i64 - 1) as usize;
        self.set_cursor(target);
    }

    fn switch_section(&mut self) {
        let target = match self.section {
            Section::Mine => Section::Other,
            Section::Other => Section::Mine,
        };
        let target_rows = match target {
            Section::Mine => self.sync.mine_rows(),
            Section::Other => self.sync.other_rows(),
        };
        if target_rows.is_empty() {
            return;
        }
        self.section = target;
        self.clamp_cursors();
        self.select_under_cursor();
    }

    fn collapse_or_jump_to_parent(&mut self) {
        let Some(row) = self.current_row() else {
            return;
        };
        if row.expanded {
            let id = row.id.clone();
            self.sync.toggle_expanded(&id);
            self.clamp_cursors();
            return;
        }
        // On an already-collapsed child, jump to its parent row.
        if let Some(parent_id) = row.parent_id.clone() {
            if let Some(pos) = self.active_rows().iter().position(|r| r.id == parent_id) {
                self.set_cursor(pos);
            }
        }
    }

    fn clamp_cursors(&mut self) {
        self.cursor_mine = self
            .cursor_mine
            .min(self.sync.mine_rows().len().saturating_sub(1));
        self.cursor_other = self
            .cursor_other
            .min(self.sync.other_rows().len().saturating_sub(1));
    }

    fn select_under_cursor(&mut self) {
        if let Some(row) = self.current_row() {
            let id = row.id.clone();
            self.sync.select(&id);
        }
    }

    /// Move the cursor to the row holding the authoritative selection, so
    /// a refresh that re-resolves the selection keeps cursor and details
    /// pane consistent.
    fn align_cursor_to_selection(&mut self) {
        let Some(selected_id) = self.sync.selected().map(|i| i.id.clone()) else {
            return;
        };
        if let Some(pos) = self
            .sync
            .mine_rows()
            .iter()
            .position(|r| r.id == selected_id)
        {
            self.section = Section::Mine;
            self.cursor_mine = pos;
        } else if let Some(pos) = self
            .sync
            .other_rows()
            .iter()
            .position(|r| r.id == selected_id)
        {
            self.section = Section::Other;
            self.cursor_other = pos;
        }
    }
}

fn open_url(url: &str) -> Result<()> {
    // Use xdg-open on Linux, which works in WSL
    std::process::Command::new("xdg-open")
        .arg(url)
        .spawn()
        .or_else(|_| {
            // Fallback to wslview for WSL
            std::process::Command::new("wslview").arg(url).spawn()
        })?;
    Ok(())
}
