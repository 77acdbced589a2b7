//! UI rendering for the TUI.
//!
//! Handles layout and widget rendering using ratatui.

use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Clear, Padding, Paragraph, Row, Table, Wrap},
    Frame,
};

use super::Theme;
use crate::app::AppMode;
use crate::backend::ValidationResult;
use crate::report::table::TableView;
use crate::session::{Message, Role, Workflow};
use crate::App;

/// Draw the main UI.
pub fn draw(frame: &mut Frame, app: &App) {
    let area = frame.area();

    let table_height = app.latest_table().and_then(Message::rows).map_or(0, |rows| {
        let shown = rows.len().min(app.config.ui.max_table_rows);
        // borders, header, footer
        u16::try_from(shown + 4).unwrap_or(u16::MAX).min(area.height / 3)
    });

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),            // Header
            Constraint::Min(5),               // Conversation
            Constraint::Length(table_height), // Latest result table
            Constraint::Length(3),            // Input
            Constraint::Length(1),            // Status bar
        ])
        .split(area);

    draw_header(frame, app, chunks[0]);
    draw_conversation(frame, app, chunks[1]);
    if table_height > 0 {
        draw_table(frame, app, chunks[2]);
    }
    draw_input(frame, app, chunks[3]);
    draw_status_bar(frame, app, chunks[4]);

    match app.mode {
        AppMode::Chat => {}
        AppMode::TitlePrompt => draw_title_prompt(frame, app),
        AppMode::ValidationDetails => draw_validation_details(frame, app),
        AppMode::History => draw_history(frame, app),
        AppMode::Help => draw_help(frame, app),
    }
}

fn draw_header(frame: &mut Frame, app: &App, area: Rect) {
    let theme = &app.theme;
    let workflow = app.session.workflow();
    let state = workflow.state();

    let mut spans = vec![
        Span::styled(
            " CricketAI Studio ",
            Style::default().bg(theme.primary).fg(theme.text).add_modifier(Modifier::BOLD),
        ),
        Span::raw(" "),
        Span::styled(
            format!("[{state}]"),
            Style::default().fg(theme.state_color(state)).add_modifier(Modifier::BOLD),
        ),
        Span::raw(" "),
        Span::styled(workflow.status_line(), Style::default().fg(theme.text_dim)),
    ];
    if let Some(title) = workflow.title() {
        spans.push(Span::styled(" │ ", Style::default().fg(theme.border)));
        spans.push(Span::styled(title.to_string(), Style::default().fg(theme.text)));
    }

    let header = Paragraph::new(Line::from(spans)).block(
        Block::default().borders(Borders::BOTTOM).border_style(Style::default().fg(theme.border)),
    );
    frame.render_widget(header, area);
}

fn draw_conversation(frame: &mut Frame, app: &App, area: Rect) {
    let theme = &app.theme;
    let conversation = app.session.conversation();

    let mut lines: Vec<Line> = Vec::new();
    if conversation.is_empty() {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            " Ask about players, matches or trends, e.g. \"Who converts nineties into hundreds most often?\"",
            Style::default().fg(theme.text_dim),
        )));
        lines.push(Line::from(Span::styled(
            " A long first question (over 200 characters) runs a multi-step deep analysis.",
            Style::default().fg(theme.text_muted),
        )));
    }
    for message in conversation.messages() {
        lines.extend(message_lines(message, theme));
        lines.push(Line::from(""));
    }
    lines.extend(workflow_lines(app.session.workflow(), theme));

    // One column of padding on each side, no borders
    let inner_width = area.width.saturating_sub(2) as usize;
    let total_rows: usize = lines.iter().map(|line| wrapped_rows(line, inner_width)).sum();
    let max_scroll = total_rows.saturating_sub(area.height as usize);
    app.set_scroll_limit(u16::try_from(max_scroll).unwrap_or(u16::MAX));
    let scroll_offset = max_scroll.saturating_sub(app.effective_scroll() as usize);

    let body = Paragraph::new(lines)
        .block(Block::default().padding(Padding::horizontal(1)))
        .wrap(Wrap { trim: false })
        .scroll((u16::try_from(scroll_offset).unwrap_or(u16::MAX), 0));
    frame.render_widget(body, area);
}

/// Rows a line occupies once word-wrapped to `width` columns.
fn wrapped_rows(line: &Line, width: usize) -> usize {
    if width == 0 {
        return 1;
    }
    let text: String = line.spans.iter().map(|s| s.content.as_ref()).collect();

    let mut rows = 1;
    let mut column = 0;
    for word in text.split_inclusive(' ') {
        let trimmed = word.trim_end_matches(' ');
        let visible = Span::raw(trimmed).width();
        let spaces = word.len() - trimmed.len();

        if column > 0 && column + visible > width {
            rows += 1;
            column = 0;
        }
        column += visible;
        while column > width {
            rows += 1;
            column -= width;
        }
        // Trailing spaces never start a new row on their own
        column = (column + spaces).min(width);
    }
    rows
}

/// Lines for one chat message.
fn message_lines(message: &Message, theme: &Theme) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    let color = theme.role_color(message.role);

    let label = match message.role {
        Role::User => "You",
        Role::Assistant => "Analyst",
    };
    lines.push(Line::from(vec![
        Span::styled(format!("{label} "), Style::default().fg(color).add_modifier(Modifier::BOLD)),
        Span::styled(
            message.timestamp.with_timezone(&chrono::Local).format("%H:%M").to_string(),
            Style::default().fg(theme.text_muted),
        ),
    ]));

    if message.is_loading {
        lines.push(Line::from(Span::styled(
            "Analyzing...",
            Style::default().fg(theme.warning).add_modifier(Modifier::ITALIC),
        )));
        return lines;
    }

    match message.role {
        Role::User => lines.push(Line::from(Span::styled(
            message.content.clone(),
            Style::default().fg(theme.text),
        ))),
        Role::Assistant => lines.extend(render_markdown(&message.content, theme)),
    }

    if let Some(error) = &message.error {
        lines.push(Line::from(Span::styled(
            format!("Error: {error}"),
            Style::default().fg(theme.error),
        )));
    }

    if let Some(sql) = &message.sql {
        lines.push(Line::from(Span::styled("SQL", Style::default().fg(theme.text_muted))));
        for sql_line in sql.lines() {
            lines.push(Line::from(Span::styled(
                format!("  {sql_line}"),
                Style::default().fg(theme.sql),
            )));
        }
    }

    if let Some(rows) = message.rows() {
        lines.push(Line::from(Span::styled(
            format!("{} rows", rows.len()),
            Style::default().fg(theme.text_dim),
        )));
    }

    lines
}

/// Summary of the finalized project, validation and publish receipt.
fn workflow_lines(workflow: &Workflow, theme: &Theme) -> Vec<Line<'static>> {
    let mut lines = Vec::new();

    if let Some(project) = workflow.project() {
        lines.push(Line::from(Span::styled(
            format!("Draft: {}", project.title),
            Style::default().fg(theme.primary).add_modifier(Modifier::BOLD),
        )));
        if !project.executive_summary.is_empty() {
            lines.push(Line::from(Span::styled(
                project.executive_summary.clone(),
                Style::default().fg(theme.text),
            )));
        }
    }

    if let Some(validation) = workflow.validation() {
        lines.push(Line::from(vec![
            Span::styled(
                validation.recommendation.to_string(),
                Style::default()
                    .fg(theme.recommendation_color(&validation.recommendation))
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(format!("  {}", validation.score_line()), Style::default().fg(theme.text)),
        ]));
        let hint = if workflow.can_publish() {
            "Ctrl+P publish · Ctrl+V claims · Ctrl+R keep exploring"
        } else {
            "Ctrl+V claims · Ctrl+R keep exploring"
        };
        lines.push(Line::from(Span::styled(hint, Style::default().fg(theme.text_muted))));
    } else if workflow.project().is_some() && !workflow.state().is_busy() {
        lines.push(Line::from(Span::styled(
            "Validation did not complete · Ctrl+V retry · Ctrl+R keep exploring",
            Style::default().fg(theme.warning),
        )));
    }

    if let Some(receipt) = workflow.receipt() {
        lines.push(Line::from(Span::styled(
            format!("Published to {}", receipt.project_path),
            Style::default().fg(theme.success).add_modifier(Modifier::BOLD),
        )));
        for file in &receipt.files_created {
            lines.push(Line::from(Span::styled(
                format!("  ✓ {file}"),
                Style::default().fg(theme.text_dim),
            )));
        }
    }

    lines
}

fn draw_table(frame: &mut Frame, app: &App, area: Rect) {
    let theme = &app.theme;
    let Some(rows) = app.latest_table().and_then(Message::rows) else {
        return;
    };
    let sort = app.table_sort();
    let view = TableView::new(rows, &sort, Some(app.config.ui.max_table_rows));

    let header = Row::new(view.columns.iter().map(|c| {
        Cell::from(view.header(c, &sort)).style(
            Style::default().fg(theme.text_dim).add_modifier(Modifier::BOLD),
        )
    }));

    let body: Vec<Row> = view
        .rows
        .iter()
        .enumerate()
        .map(|(i, row)| {
            let cells = view.cells(row).into_iter().zip(&view.columns).map(|(text, column)| {
                let text = if column.numeric { format!("{text:>12}") } else { text };
                let style = if column.highlight {
                    Style::default().fg(theme.primary).add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(theme.text)
                };
                Cell::from(text).style(style)
            });
            let row = Row::new(cells);
            if i == 0 {
                row.style(Style::default().bg(theme.highlight))
            } else {
                row
            }
        })
        .collect();

    let widths: Vec<Constraint> = view
        .columns
        .iter()
        .map(|c| if c.numeric { Constraint::Length(13) } else { Constraint::Min(12) })
        .collect();

    let title = view.footer().map_or_else(
        || format!(" Results ({}) · Ctrl+S sort ", view.total),
        |footer| format!(" Results · {footer} · Ctrl+S sort "),
    );

    let table = Table::new(body, widths).header(header).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(theme.border))
            .title(title)
            .title_style(Style::default().fg(theme.text_dim)),
    );
    frame.render_widget(table, area);
}

fn draw_input(frame: &mut Frame, app: &App, area: Rect) {
    let theme = &app.theme;
    let busy = app.session.is_analyzing() || app.session.workflow().state().is_busy();
    let exploring = app.session.workflow().state() == crate::session::WorkflowState::Exploring;

    let (text, style) = if busy {
        ("Working...".to_string(), Style::default().fg(theme.warning))
    } else if !exploring && app.input.is_empty() {
        (
            "Finalized. Ctrl+R to continue exploring or Ctrl+N for a new conversation".to_string(),
            Style::default().fg(theme.text_muted),
        )
    } else {
        (app.input.clone(), Style::default().fg(theme.text))
    };

    let border_color = if busy { theme.warning } else { theme.primary };
    let input = Paragraph::new(text).style(style).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(border_color))
            .title(" > ")
            .title_style(Style::default().fg(theme.primary)),
    );
    frame.render_widget(input, area);

    if app.mode == AppMode::Chat && !busy {
        let x = area.x + 1 + u16::try_from(app.cursor_position).unwrap_or(u16::MAX);
        frame.set_cursor_position((x.min(area.right().saturating_sub(2)), area.y + 1));
    }
}

fn draw_status_bar(frame: &mut Frame, app: &App, area: Rect) {
    let theme = &app.theme;
    let line = match &app.status_message {
        Some(message) => Line::from(Span::styled(format!(" {message}"), Style::default().fg(theme.text))),
        None => Line::from(Span::styled(
            " Enter send · Ctrl+F finalize · Ctrl+H history · ? help · Esc quit",
            Style::default().fg(theme.text_muted),
        )),
    };
    frame.render_widget(Paragraph::new(line), area);
}

/// Center a popup of the given size inside `area`.
fn centered_rect(width: u16, height: u16, area: Rect) -> Rect {
    let width = width.min(area.width.saturating_sub(4));
    let height = height.min(area.height.saturating_sub(2));
    Rect::new(
        area.x + area.width.saturating_sub(width) / 2,
        area.y + area.height.saturating_sub(height) / 2,
        width,
        height,
    )
}

fn popup_block<'a>(title: &'a str, theme: &Theme) -> Block<'a> {
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(theme.primary))
        .title(title)
        .title_style(Style::default().fg(theme.primary).add_modifier(Modifier::BOLD))
        .style(Style::default().bg(theme.background))
}

fn draw_title_prompt(frame: &mut Frame, app: &App) {
    let theme = &app.theme;
    let area = centered_rect(60, 7, frame.area());
    frame.render_widget(Clear, area);

    let content = vec![
        Line::from(Span::styled(
            "Name this analysis before it is finalized and validated.",
            Style::default().fg(theme.text_dim),
        )),
        Line::from(""),
        Line::from(vec![
            Span::styled("Title: ", Style::default().fg(theme.primary)),
            Span::styled(app.title_input.clone(), Style::default().fg(theme.text)),
        ]),
        Line::from(""),
        Line::from(vec![
            Span::styled("[Enter] Create  ", Style::default().fg(theme.success)),
            Span::styled("[Esc] Cancel", Style::default().fg(theme.text_muted)),
        ]),
    ];

    frame.render_widget(Paragraph::new(content).block(popup_block(" Finalize Analysis ", theme)), area);
}

/// Lines listing each verified claim.
fn claim_lines(validation: &ValidationResult, theme: &Theme) -> Vec<Line<'static>> {
    let mut lines = vec![
        Line::from(vec![
            Span::styled(
                validation.recommendation.to_string(),
                Style::default()
                    .fg(theme.recommendation_color(&validation.recommendation))
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(format!("  {}", validation.score_line()), Style::default().fg(theme.text)),
        ]),
        Line::from(Span::styled(
            format!(
                "{} database queries · {} web searches",
                validation.database_queries_run, validation.web_searches_performed
            ),
            Style::default().fg(theme.text_muted),
        )),
    ];
    if !validation.summary.is_empty() {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(validation.summary.clone(), Style::default().fg(theme.text))));
    }
    lines.push(Line::from(""));

    for claim in &validation.claims {
        let (mark, color) = if claim.is_verified { ("✓", theme.success) } else { ("✗", theme.error) };
        lines.push(Line::from(vec![
            Span::styled(format!("{mark} "), Style::default().fg(color)),
            Span::styled(claim.claim_text.clone(), Style::default().fg(theme.text)),
        ]));

        let mut detail = Vec::new();
        if let Some(expected) = &claim.expected_value {
            detail.push(format!("expected {expected}"));
        }
        if let Some(actual) = &claim.actual_value {
            detail.push(format!("actual {actual}"));
        }
        if let Some(discrepancy) = claim.discrepancy_percent {
            detail.push(format!("off by {discrepancy:.1}%"));
        }
        if !detail.is_empty() {
            lines.push(Line::from(Span::styled(
                format!("    {}", detail.join(" · ")),
                Style::default().fg(theme.text_dim),
            )));
        }
        if !claim.notes.is_empty() {
            lines.push(Line::from(Span::styled(
                format!("    {}", claim.notes),
                Style::default().fg(theme.text_muted),
            )));
        }
    }

    lines
}

fn draw_validation_details(frame: &mut Frame, app: &App) {
    let theme = &app.theme;
    let frame_area = frame.area();
    let area = centered_rect(frame_area.width.saturating_sub(8), frame_area.height.saturating_sub(4), frame_area);
    frame.render_widget(Clear, area);

    let lines = app
        .session
        .workflow()
        .validation()
        .map(|v| claim_lines(v, theme))
        .unwrap_or_default();

    let details = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(popup_block(" Validation Report · Esc close ", theme));
    frame.render_widget(details, area);
}

fn draw_history(frame: &mut Frame, app: &App) {
    let theme = &app.theme;
    let area = centered_rect(70, 16, frame.area());
    frame.render_widget(Clear, area);

    let queries = app.recent_queries();
    let lines: Vec<Line> = if queries.is_empty() {
        vec![
            Line::from(""),
            Line::from(Span::styled("No history yet", Style::default().fg(theme.text_dim))),
        ]
    } else {
        queries
            .iter()
            .enumerate()
            .map(|(i, query)| {
                let style = if i == app.history_selected {
                    Style::default().fg(theme.primary).add_modifier(Modifier::BOLD)
                } else {
                    Style::default().fg(theme.text)
                };
                let marker = if i == app.history_selected { "› " } else { "  " };
                Line::from(Span::styled(format!("{marker}{query}"), style))
            })
            .collect()
    };

    let list = Paragraph::new(lines)
        .alignment(if queries.is_empty() { Alignment::Center } else { Alignment::Left })
        .block(popup_block(" Recent Queries · Enter reuse · c clear ", theme));
    frame.render_widget(list, area);
}

fn help_line(key: &str, description: &str, theme: &Theme) -> Line<'static> {
    Line::from(vec![
        Span::styled(
            format!("  {key:14}"),
            Style::default().fg(theme.primary).add_modifier(Modifier::BOLD),
        ),
        Span::styled(description.to_string(), Style::default().fg(theme.text)),
    ])
}

fn draw_help(frame: &mut Frame, app: &App) {
    let theme = &app.theme;
    let area = centered_rect(64, 20, frame.area());
    frame.render_widget(Clear, area);

    let lines = vec![
        help_line("Enter", "Send question", theme),
        help_line("↑ / ↓", "Scroll conversation", theme),
        help_line("Ctrl+S", "Sort latest table (next column / direction)", theme),
        help_line("Ctrl+H", "Recent queries", theme),
        help_line("Ctrl+N", "New conversation", theme),
        Line::from(""),
        help_line("Ctrl+F", "Finalize into an article (then auto-validate)", theme),
        help_line("Ctrl+V", "Validation details, or retry validation", theme),
        help_line("Ctrl+P", "Publish when ready", theme),
        help_line("Ctrl+R", "Discard draft and keep exploring", theme),
        Line::from(""),
        help_line("?", "Toggle this help", theme),
        help_line("Esc / Ctrl+C", "Quit", theme),
    ];

    frame.render_widget(Paragraph::new(lines).block(popup_block(" Keyboard Shortcuts ", theme)), area);
}

/// Render markdown text into styled lines.
fn render_markdown(text: &str, theme: &Theme) -> Vec<Line<'static>> {
    let mut lines = Vec::new();
    let mut in_code_block = false;

    for line in text.lines() {
        let trimmed = line.trim();

        if trimmed.starts_with("```") {
            in_code_block = !in_code_block;
            continue;
        }

        if in_code_block {
            lines.push(Line::from(Span::styled(format!("  {line}"), Style::default().fg(theme.sql))));
        } else if let Some(content) = trimmed.strip_prefix("- ").or_else(|| trimmed.strip_prefix("* ")) {
            let mut spans = vec![Span::styled("  • ", Style::default().fg(theme.primary))];
            spans.extend(parse_inline(content, theme));
            lines.push(Line::from(spans));
        } else if trimmed.starts_with('#') {
            let content = trimmed.trim_start_matches('#').trim();
            lines.push(Line::from(Span::styled(
                content.to_string(),
                Style::default().fg(theme.primary).add_modifier(Modifier::BOLD),
            )));
        } else if trimmed.is_empty() {
            lines.push(Line::from(""));
        } else {
            lines.push(Line::from(parse_inline(line, theme)));
        }
    }

    lines
}

/// Split a line on backticks and `**`, styling code and bold runs.
fn parse_inline(text: &str, theme: &Theme) -> Vec<Span<'static>> {
    let mut spans = Vec::new();
    let mut current = String::new();
    let mut in_code = false;
    let mut in_bold = false;

    let style_for = |code: bool, bold: bool| {
        if code {
            Style::default().fg(theme.sql)
        } else if bold {
            Style::default().fg(theme.text).add_modifier(Modifier::BOLD)
        } else {
            Style::default().fg(theme.text)
        }
    };

    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        let toggle_bold = !in_code && c == '*' && chars.peek() == Some(&'*');
        if c == '`' || toggle_bold {
            if !current.is_empty() {
                spans.push(Span::styled(std::mem::take(&mut current), style_for(in_code, in_bold)));
            }
            if toggle_bold {
                chars.next();
                in_bold = !in_bold;
            } else {
                in_code = !in_code;
            }
        } else {
            current.push(c);
        }
    }

    if !current.is_empty() {
        spans.push(Span::styled(current, style_for(in_code, in_bold)));
    }
    if spans.is_empty() {
        spans.push(Span::raw(""));
    }

    spans
}
