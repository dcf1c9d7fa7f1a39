//! TUI rendering: header, issue tables, details pane, status bar, help.

use super::app::{App, Section};
use crate::data::tree::Row;
use crate::data::Issue;
use crate::sync::SyncStatus;
use chrono::Utc;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Clear, Paragraph, Wrap},
    Frame,
};
use unicode_width::UnicodeWidthStr;

/// Main draw function - renders the entire TUI.
pub fn draw(f: &mut Frame, app: &App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header/search
            Constraint::Min(0),    // Main content
            Constraint::Length(1), // Status bar
        ])
        .split(f.area());

    draw_header(f, app, chunks[0]);
    draw_main(f, app, chunks[1]);
    draw_status_bar(f, app, chunks[2]);

    if app.show_help {
        draw_help_popup(f);
    }
}

fn draw_header(f: &mut Frame, app: &App, area: Rect) {
    let (text, style) = if app.search_mode {
        (
            format!("/ {}▏", app.search_input),
            Style::default().fg(Color::Yellow),
        )
    } else if !app.params.search.is_empty() {
        (
            format!("search: {}  (press / to edit)", app.params.search),
            Style::default().fg(Color::Cyan),
        )
    } else {
        (
            "trackline".to_string(),
            Style::default().add_modifier(Modifier::BOLD),
        )
    };

    let header = Paragraph::new(text)
        .style(style)
        .block(Block::default().borders(Borders::ALL));
    f.render_widget(header, area);
}

fn draw_main(f: &mut Frame, app: &App, area: Rect) {
    let show_details = app.show_details && app.sync.selected().is_some();
    let columns = if show_details {
        Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
            .split(area)
    } else {
        Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(100)])
            .split(area)
    };

    draw_issue_tables(f, app, columns[0]);
    if show_details {
        if let Some(issue) = app.sync.selected() {
            draw_details(f, app, issue, columns[1]);
        }
    }
}

fn draw_issue_tables(f: &mut Frame, app: &App, area: Rect) {
    let mine = app.sync.mine_rows();
    let other = app.sync.other_rows();

    // My Issues section only appears when non-empty.
    if mine.is_empty() {
        draw_section(f, app, "Issues", other, Section::Other, area);
        return;
    }

    let halves = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);

    draw_section(f, app, "My Issues", mine, Section::Mine, halves[0]);
    draw_section(f, app, "Other Issues", other, Section::Other, halves[1]);
}

fn draw_section(
    f: &mut Frame,
    app: &App,
    title: &str,
    rows: &[Row],
    section: Section,
    area: Rect,
) {
    let active = app.section == section;
    let cursor = match section {
        Section::Mine => app.cursor_mine,
        Section::Other => app.cursor_other,
    };

    let border_style = if active {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(border_style)
        .title(format!(" {} ({}) ", title, rows.len()));

    let inner_height = area.height.saturating_sub(2) as usize;
    let inner_width = area.width.saturating_sub(2) as usize;
    let offset = scroll_offset(cursor, rows.len(), inner_height);

    let lines: Vec<Line> = rows
        .iter()
        .enumerate()
        .skip(offset)
        .take(inner_height)
        .map(|(i, row)| render_row(row, active && i == cursor, inner_width))
        .collect();

    let list = Paragraph::new(lines).block(block);
    f.render_widget(list, area);
}

fn render_row(row: &Row, selected: bool, width: usize) -> Line<'static> {
    let marker = if row.has_children {
        if row.expanded {
            "▾ "
        } else {
            "▸ "
        }
    } else {
        "  "
    };
    let indent = "  ".repeat(row.depth);

    let priority_style = match row.priority {
        crate::data::Priority::Urgent => Style::default().fg(Color::Red),
        crate::data::Priority::High => Style::default().fg(Color::Yellow),
        _ => Style::default().fg(Color::DarkGray),
    };

    let base = if selected {
        Style::default()
            .bg(Color::DarkGray)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default()
    };

    let prefix = format!("{}{}{:<10} ", indent, marker, row.identifier);
    let meta = format!("  [{}]", row.state);
    let title_width = width
        .saturating_sub(prefix.width())
        .saturating_sub(meta.width());
    let title = truncate_to_width(&row.title, title_width);

    Line::from(vec![
        Span::styled(prefix, base),
        Span::styled("● ", priority_style),
        Span::styled(title, base),
        Span::styled(meta, Style::default().fg(Color::DarkGray)),
    ])
}

fn draw_details(f: &mut Frame, app: &App, issue: &Issue, area: Rect) {
    let fetching = app.sync.selection().is_fetching();
    let title = if fetching {
        format!(" {} {} ", issue.identifier, app.spinner_char())
    } else {
        format!(" {} ", issue.identifier)
    };

    let mut lines: Vec<Line> = vec![
        Line::from(Span::styled(
            issue.title.clone(),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(vec![
            Span::styled("State: ", Style::default().fg(Color::DarkGray)),
            Span::raw(issue.state.clone()),
            Span::styled("  Priority: ", Style::default().fg(Color::DarkGray)),
            Span::raw(issue.priority.label()),
        ]),
        Line::from(vec![
            Span::styled("Assignee: ", Style::default().fg(Color::DarkGray)),
            Span::raw(issue.assignee.clone().unwrap_or_else(|| "—".to_string())),
        ]),
    ];

    if !issue.labels.is_empty() {
        let labels = issue
            .labels
            .iter()
            .map(|l| l.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        lines.push(Line::from(vec![
            Span::styled("Labels: ", Style::default().fg(Color::DarkGray)),
            Span::raw(labels),
        ]));
    }

    if let Some(parent) = &issue.parent {
        lines.push(Line::from(vec![
            Span::styled("Parent: ", Style::default().fg(Color::DarkGray)),
            Span::raw(format!("{} {}", parent.identifier, parent.title)),
        ]));
    }

    lines.push(Line::default());
    if let Some(description) = &issue.description {
        for text_line in description.lines() {
            lines.push(Line::from(text_line.to_string()));
        }
    }

    if !issue.comments.is_empty() {
        lines.push(Line::default());
        lines.push(Line::from(Span::styled(
            format!("Comments ({})", issue.comments.len()),
            Style::default().add_modifier(Modifier::UNDERLINED),
        )));
        for comment in &issue.comments {
            let author = comment.author.clone().unwrap_or_else(|| "?".to_string());
            let when = crate::util::relative_time(comment.created_at, Utc::now());
            lines.push(Line::from(Span::styled(
                format!("{} · {}", author, when),
                Style::default().fg(Color::Cyan),
            )));
            for text_line in comment.body.lines() {
                lines.push(Line::from(text_line.to_string()));
            }
            lines.push(Line::default());
        }
    }

    let details = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title(title));
    f.render_widget(details, area);
}

fn draw_status_bar(f: &mut Frame, app: &App, area: Rect) {
    let (text, style) = match app.sync.status() {
        SyncStatus::Loading { page: 0, .. } => (
            format!("{} Loading...", app.spinner_char()),
            Style::default().fg(Color::Yellow),
        ),
        SyncStatus::Loading { page, fetched } => (
            format!(
                "{} Loading more (page {}, fetched {})...",
                app.spinner_char(),
                page,
                fetched
            ),
            Style::default().fg(Color::Yellow),
        ),
        SyncStatus::Error(message) => (
            format!("Error: {}", message),
            Style::default().fg(Color::Red),
        ),
        SyncStatus::Idle => {
            let refreshed = app
                .sync
                .last_refresh()
                .map(|t| crate::util::relative_time(t, Utc::now()))
                .unwrap_or_else(|| "never".to_string());
            (
                format!(
                    "{} issues · sort: {} · refreshed {} · ? help",
                    app.sync.issue_count(),
                    app.params.order_by.label(),
                    refreshed
                ),
                Style::default().fg(Color::DarkGray),
            )
        }
    };

    f.render_widget(Paragraph::new(text).style(style), area);
}

fn draw_help_popup(f: &mut Frame) {
    let area = centered_rect(50, 60, f.area());
    f.render_widget(Clear, area);

    let entries = [
        ("j/k", "move selection"),
        ("gg/G", "top / bottom"),
        ("Ctrl-d/u", "page down / up"),
        ("Tab", "switch section"),
        ("l/h", "expand / collapse"),
        ("Space", "toggle expansion"),
        ("E/C", "expand all / collapse all"),
        ("/", "search"),
        ("o", "cycle sort"),
        ("p", "toggle details pane"),
        ("r", "refresh"),
        ("R", "hard reload"),
        ("Enter", "open in browser"),
        ("q", "quit"),
    ];

    let lines: Vec<Line> = entries
        .iter()
        .map(|(key, action)| {
            Line::from(vec![
                Span::styled(format!("{:>10}  ", key), Style::default().fg(Color::Cyan)),
                Span::raw(*action),
            ])
        })
        .collect();

    let help = Paragraph::new(lines)
        .alignment(Alignment::Left)
        .block(Block::default().borders(Borders::ALL).title(" Help "));
    f.render_widget(help, area);
}

/// Keep the cursor visible within a viewport of `height` lines.
fn scroll_offset(cursor: usize, len: usize, height: usize) -> usize {
    if height == 0 || len <= height {
        return 0;
    }
    let max_offset = len - height;
    cursor.saturating_sub(height / 2).min(max_offset)
}

/// Truncate a string to a display width, appending an ellipsis if cut.
fn truncate_to_width(text: &str, width: usize) -> String {
    if text.width() <= width {
        return text.to_string();
    }
    let mut out = String::new();
    let mut used = 0usize;
    for c in text.chars() {
        let w = unicode_width::UnicodeWidthChar::width(c).unwrap_or(0);
        if used + w + 1 > width {
            break;
        }
        out.push(c);
        used += w;
    }
    out.push('…');
    out
}

/// Centered rect helper for popups.
fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(vertical[1])[1]
}
