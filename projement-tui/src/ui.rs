//! UI rendering module.
//!
//! This module handles all the TUI rendering using ratatui: the project table,
//! the pagination bar, the system log and the modal overlays.

use chrono::NaiveDate;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Clear, List, ListItem, Paragraph, Row, Table, TableState, Wrap},
    Frame,
};

use crate::app::{App, HoursField, HoursForm, LogLevel};
use crate::models::Project;
use crate::pagination::{PageControl, Paginator, BREAK_LABEL};
use crate::store::LoadStatus;
use crate::theme::{colors, styles};

/// Render the entire UI
pub fn render(frame: &mut Frame, app: &App) {
    let today = chrono::Local::now().date_naive();
    render_at(frame, app, today);
}

/// Render with an explicit "today", which decides struck-through titles
pub fn render_at(frame: &mut Frame, app: &App, today: NaiveDate) {
    let area = frame.area();

    let bg_block = Block::default().style(Style::default().bg(colors::BG_DARK));
    frame.render_widget(bg_block, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header / status
            Constraint::Min(8),    // Project table
            Constraint::Length(3), // Pagination
            Constraint::Length(5), // Log area
        ])
        .split(area);

    render_header(frame, app, chunks[0]);

    match app.store.status() {
        LoadStatus::Idle | LoadStatus::Loading => {
            render_placeholder(frame, chunks[1], "Loading projects...", styles::text_dim());
        }
        LoadStatus::Failed(message) => {
            render_placeholder(
                frame,
                chunks[1],
                &format!("Could not load projects: {}  (press r to retry)", message),
                styles::error(),
            );
        }
        LoadStatus::Ready => {
            render_project_table(frame, app, today, chunks[1]);
            render_pagination(frame, &app.paginator, app.store.projects().len(), chunks[2]);
        }
    }

    render_logs(frame, app, chunks[3]);

    if let Some(form) = &app.hours_form {
        render_hours_form(frame, form, area);
    }

    if app.error_popup.is_some() {
        render_error_popup(frame, app, area);
    }

    if app.show_help {
        render_help_overlay(frame, area);
    }
}

fn render_header(frame: &mut Frame, app: &App, area: Rect) {
    let header = Paragraph::new(Line::from(Span::styled(app.status_text(), styles::text_dim())))
        .block(
            Block::default()
                .title(" Projement Dashboard ")
                .title_style(styles::title())
                .borders(Borders::ALL)
                .border_style(styles::border())
                .style(Style::default().bg(colors::BG_MEDIUM)),
        );
    frame.render_widget(header, area);
}

/// Bordered box with a single centered message and nothing else
fn render_placeholder(frame: &mut Frame, area: Rect, message: &str, style: Style) {
    let block = Block::default()
        .title(" Projects ")
        .title_style(styles::title_accent())
        .borders(Borders::ALL)
        .border_style(styles::border())
        .style(Style::default().bg(colors::BG_DARK));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let y = inner.y + inner.height / 2;
    let centered = Rect::new(inner.x, y, inner.width, 1.min(inner.height));
    frame.render_widget(
        Paragraph::new(message).style(style).alignment(Alignment::Center),
        centered,
    );
}

fn title_cell(project: &Project, today: NaiveDate) -> Cell<'static> {
    let title_style = if project.ended_on(today) {
        styles::ended_title()
    } else {
        styles::text()
    };

    let mut spans = vec![Span::styled(project.display_title().to_string(), title_style)];
    if project.is_over_budget {
        spans.push(Span::raw(" "));
        spans.push(Span::styled(" OVER BUDGET ", styles::over_budget_badge()));
    }
    Cell::from(Line::from(spans))
}

fn tags_cell(project: &Project) -> Cell<'static> {
    let mut spans = Vec::with_capacity(project.tags.len() * 2);
    for (i, tag) in project.tags.iter().enumerate() {
        if i > 0 {
            spans.push(Span::raw(" "));
        }
        spans.push(Span::styled(format!(" {} ", tag.name), styles::tag_badge(&tag.color)));
    }
    Cell::from(Line::from(spans))
}

/// Hours as the server sends them: no trailing ".0" for whole numbers
fn format_hours(hours: f64) -> String {
    if hours.fract() == 0.0 {
        format!("{}", hours as i64)
    } else {
        format!("{:.2}", hours)
    }
}

fn project_row(project: &Project, today: NaiveDate) -> Row<'static> {
    Row::new(vec![
        title_cell(project, today),
        tags_cell(project),
        Cell::from(project.company.name.clone()),
        Cell::from(format_hours(project.total_estimated_hours)),
        Cell::from(format_hours(project.total_actual_hours)),
    ])
}

fn render_project_table(frame: &mut Frame, app: &App, today: NaiveDate, area: Rect) {
    let block = Block::default()
        .title(" Projects ")
        .title_style(styles::title_accent())
        .borders(Borders::ALL)
        .border_style(styles::border())
        .style(Style::default().bg(colors::BG_DARK));

    let visible = app.visible_projects();
    if visible.is_empty() {
        render_placeholder(frame, area, "No projects found", styles::text_dim());
        return;
    }

    let header = Row::new(vec!["Project", "Tags", "Company", "Estimated", "Actual"])
        .style(styles::title_accent())
        .bottom_margin(1);

    let rows: Vec<Row> = visible.iter().map(|p| project_row(p, today)).collect();

    let table = Table::new(
        rows,
        [
            Constraint::Percentage(35),
            Constraint::Percentage(30),
            Constraint::Percentage(15),
            Constraint::Length(10),
            Constraint::Length(10),
        ],
    )
    .header(header)
    .block(block)
    .column_spacing(1)
    .style(styles::text())
    .row_highlight_style(styles::selected())
    .highlight_symbol("▶ ");

    let mut state = TableState::default().with_selected(Some(app.selected_row));
    frame.render_stateful_widget(table, area, &mut state);
}

/// Spans of the pagination bar: previous, page numbers, next
pub fn pagination_spans(paginator: &Paginator, count: usize) -> Vec<Span<'static>> {
    let mut spans = Vec::new();

    spans.push(Span::styled(
        " « Prev ",
        if paginator.has_previous() {
            styles::text()
        } else {
            styles::page_disabled()
        },
    ));

    for control in paginator.controls(count) {
        spans.push(match control {
            PageControl::Page { number, active: true } => {
                Span::styled(format!(" {} ", number), styles::page_active())
            }
            PageControl::Page { number, .. } => Span::styled(format!(" {} ", number), styles::text()),
            PageControl::Ellipsis => Span::styled(format!(" {} ", BREAK_LABEL), styles::page_disabled()),
        });
    }

    spans.push(Span::styled(
        " Next » ",
        if paginator.has_next(count) {
            styles::text()
        } else {
            styles::page_disabled()
        },
    ));

    spans
}

fn render_pagination(frame: &mut Frame, paginator: &Paginator, count: usize, area: Rect) {
    let bar = Paragraph::new(Line::from(pagination_spans(paginator, count)))
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(styles::border_dim())
                .style(Style::default().bg(colors::BG_DARK)),
        );
    frame.render_widget(bar, area);
}

/// Render the log area
fn render_logs(frame: &mut Frame, app: &App, area: Rect) {
    let items: Vec<ListItem> = app
        .logs
        .iter()
        .rev()
        .take(area.height.saturating_sub(2) as usize)
        .map(|entry| {
            let (prefix, style) = match entry.level {
                LogLevel::Info => ("i", styles::info()),
                LogLevel::Success => ("+", styles::success()),
                LogLevel::Warning => ("!", styles::warning()),
                LogLevel::Error => ("x", styles::error()),
            };

            ListItem::new(Line::from(vec![
                Span::styled(format!("[{}] ", prefix), style),
                Span::styled(entry.message.as_str(), styles::text_dim()),
            ]))
        })
        .collect();

    let list = List::new(items).block(
        Block::default()
            .title(" System Log ")
            .title_style(Style::default().fg(colors::FG_DIM))
            .borders(Borders::ALL)
            .border_style(styles::border_dim())
            .style(Style::default().bg(colors::BG_DARK)),
    );

    frame.render_widget(list, area);
}

/// Render the "add hours" modal
fn render_hours_form(frame: &mut Frame, form: &HoursForm, area: Rect) {
    let popup_area = centered_rect(60, 19, area);
    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .title(format!(" Add Hours: {} ", form.project_title))
        .title_style(styles::title_accent())
        .borders(Borders::ALL)
        .border_style(styles::border_focused())
        .style(Style::default().bg(colors::BG_MEDIUM));
    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4), // Design
            Constraint::Length(4), // Development
            Constraint::Length(4), // Testing
            Constraint::Length(2), // Form-level error
            Constraint::Length(1), // Buttons
        ])
        .margin(1)
        .split(inner);

    let fields = [HoursField::Design, HoursField::Development, HoursField::Testing];
    for (field, chunk) in fields.iter().zip(chunks.iter()) {
        render_hours_input(frame, form, *field, *chunk);
    }

    let status = if form.submitting {
        Some(Span::styled("Saving...", styles::info()))
    } else {
        form.error
            .as_ref()
            .map(|e| Span::styled(e.clone(), styles::error()))
    };
    if let Some(status) = status {
        frame.render_widget(
            Paragraph::new(Line::from(status)).wrap(Wrap { trim: true }),
            chunks[3],
        );
    }

    render_form_buttons(
        frame,
        form.current_field() == HoursField::SubmitButton,
        form.current_field() == HoursField::CancelButton,
        chunks[4],
    );
}

/// Text input with its label and any server-side messages underneath
fn render_hours_input(frame: &mut Frame, form: &HoursForm, field: HoursField, area: Rect) {
    debug_assert!(field.is_text_input());
    let is_focused = form.current_field() == field;

    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(3), Constraint::Length(1)])
        .split(area);
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Length(14), Constraint::Min(10)])
        .split(rows[0]);

    let label = Paragraph::new(field.label())
        .style(styles::form_label())
        .alignment(Alignment::Right);
    frame.render_widget(label, chunks[0]);

    let input_style = if is_focused {
        styles::form_input_focused()
    } else {
        styles::form_input()
    };
    let cursor = if is_focused { "█" } else { "" };
    let input = Paragraph::new(format!(" {}{}  h", form.value(field), cursor))
        .style(input_style)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(if is_focused {
                    styles::border_focused()
                } else {
                    styles::border_dim()
                }),
        );
    frame.render_widget(input, chunks[1]);

    let messages = form.field_errors(field);
    if !messages.is_empty() {
        let offset = chunks[0].width;
        let message_area = Rect::new(
            rows[1].x + offset,
            rows[1].y,
            rows[1].width.saturating_sub(offset),
            rows[1].height,
        );
        frame.render_widget(
            Paragraph::new(messages.join(" ")).style(styles::error()),
            message_area,
        );
    }
}

/// Render form buttons
fn render_form_buttons(frame: &mut Frame, save_focused: bool, cancel_focused: bool, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(30),
            Constraint::Length(12),
            Constraint::Length(2),
            Constraint::Length(12),
            Constraint::Percentage(30),
        ])
        .split(area);

    let save_style = if save_focused {
        styles::button_focused()
    } else {
        styles::button()
    };
    let save_btn = Paragraph::new("  [ Save ]  ")
        .style(save_style)
        .alignment(Alignment::Center);
    frame.render_widget(save_btn, chunks[1]);

    let cancel_style = if cancel_focused {
        styles::button_danger()
    } else {
        styles::button()
    };
    let cancel_btn = Paragraph::new(" [ Cancel ] ")
        .style(cancel_style)
        .alignment(Alignment::Center);
    frame.render_widget(cancel_btn, chunks[3]);
}

/// Render error popup
fn render_error_popup(frame: &mut Frame, app: &App, area: Rect) {
    let Some(popup) = app.error_popup.as_ref() else {
        return;
    };

    let popup_width = (area.width * 60 / 100).clamp(30, 60);
    let popup_area = centered_rect(popup_width, 7, area);

    frame.render_widget(Clear, popup_area);

    let block = Block::default()
        .title(format!(" {} ", popup.title))
        .title_style(
            Style::default()
                .fg(Color::White)
                .bg(colors::RED)
                .add_modifier(Modifier::BOLD),
        )
        .borders(Borders::ALL)
        .border_style(Style::default().fg(colors::RED))
        .style(Style::default().bg(colors::BG_ERROR));

    let inner = block.inner(popup_area);
    frame.render_widget(block, popup_area);

    let text = Paragraph::new(popup.message.as_str())
        .style(styles::text())
        .wrap(Wrap { trim: true });
    frame.render_widget(text, inner);

    let hint = Paragraph::new("Press ESC or ENTER to dismiss")
        .style(styles::text_hint())
        .alignment(Alignment::Center);
    let hint_area = Rect::new(
        popup_area.x,
        popup_area.y + popup_area.height.saturating_sub(1),
        popup_area.width,
        1,
    );
    frame.render_widget(hint, hint_area);
}

fn help_line(keys: &'static str, action: &'static str) -> Line<'static> {
    Line::from(vec![
        Span::styled(format!("  {:<16}", keys), Style::default().fg(colors::BLUE)),
        Span::raw(action),
    ])
}

fn help_section(title: &'static str) -> Line<'static> {
    Line::from(Span::styled(
        title,
        Style::default().fg(colors::PURPLE).add_modifier(Modifier::BOLD),
    ))
}

/// Render help overlay
fn render_help_overlay(frame: &mut Frame, area: Rect) {
    let popup_area = centered_rect(60, 22, area);
    frame.render_widget(Clear, popup_area);

    let help_text = vec![
        Line::from(Span::styled("Keyboard Shortcuts", styles::title_accent())),
        Line::from(""),
        help_section("Table"),
        help_line("j/k or Up/Down", "Select project"),
        help_line("h/l or Left/Right", "Previous / next page"),
        help_line("g/G or Home/End", "First / last page"),
        help_line("Enter / e", "Add hours to selected project"),
        Line::from(""),
        help_section("Hours Form"),
        help_line("Tab/Shift+Tab", "Move between fields"),
        help_line("0-9 .", "Type hours"),
        help_line("Enter", "Next field / Submit on button"),
        help_line("Esc", "Cancel / Close form"),
        Line::from(""),
        help_section("General"),
        help_line("r", "Refresh projects"),
        help_line("?", "Toggle this help"),
        help_line("q/Ctrl+C", "Quit"),
    ];

    let paragraph = Paragraph::new(help_text)
        .block(
            Block::default()
                .title(" Help ")
                .title_style(styles::title())
                .borders(Borders::ALL)
                .border_style(styles::border())
                .style(Style::default().bg(colors::BG_MEDIUM)),
        )
        .style(styles::text());

    frame.render_widget(paragraph, popup_area);
}

/// Helper to create a centered rectangle
fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let x = area.x + (area.width.saturating_sub(width)) / 2;
    let y = area.y + (area.height.saturating_sub(height)) / 2;
    Rect::new(x, y, width.min(area.width), height.min(area.height))
}
