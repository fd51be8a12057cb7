// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use evadmin_app::{
    AppMode, AppState, CellFormat, CellValue, Column, ConfirmationPrompt, ImportDialog,
    ImportPhase, Pagination, Screen, SortDirection, TableRow, TableState, USER_IMPORT_COLUMNS,
};
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, Tabs, Wrap};
use time::macros::format_description;

use crate::form::{FieldKind, FormUiState};
use crate::screens::{ScreenEntity, ScreenView};
use crate::{LoginUiState, ViewData};

const FILTER_MARK: &str = "▼";
const CURSOR_MARK: &str = "▏";
const PROGRESS_WIDTH: usize = 20;

pub(crate) fn render(frame: &mut ratatui::Frame<'_>, state: &AppState, view_data: &ViewData) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(2),
        ])
        .split(frame.area());

    if state.mode == AppMode::SignedOut {
        let title = Paragraph::new("quản trị sự kiện")
            .block(Block::default().title("evadmin").borders(Borders::ALL));
        frame.render_widget(title, layout[0]);

        let area = centered_rect(50, 40, layout[1]);
        frame.render_widget(Clear, area);
        let login = Paragraph::new(login_text(&view_data.login)).block(
            Block::default()
                .title("Đăng nhập")
                .borders(Borders::ALL)
                .style(Style::default().fg(Color::Cyan)),
        );
        frame.render_widget(login, area);
    } else {
        let selected = Screen::ALL
            .iter()
            .position(|screen| *screen == state.screen)
            .unwrap_or(0);
        let titles = Screen::ALL
            .iter()
            .map(|screen| tab_title(*screen, view_data))
            .collect::<Vec<String>>();
        let header = match &view_data.signed_in_as {
            Some(email) => format!("evadmin · {email}"),
            None => "evadmin".to_owned(),
        };
        let tabs = Tabs::new(titles)
            .block(Block::default().title(header).borders(Borders::ALL))
            .style(Style::default().fg(Color::White))
            .highlight_style(
                Style::default()
                    .fg(Color::Cyan)
                    .add_modifier(Modifier::BOLD),
            )
            .select(selected);
        frame.render_widget(tabs, layout[0]);

        match state.screen {
            Screen::Users => render_screen(frame, layout[1], state.screen, &view_data.users),
            Screen::Events => render_screen(frame, layout[1], state.screen, &view_data.events),
        }
    }

    let status_widget = Paragraph::new(status_text(state, view_data))
        .style(Style::default().fg(Color::Yellow))
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(status_widget, layout[2]);

    if let Some(prompt) = &view_data.search_prompt {
        let area = centered_rect(50, 20, frame.area());
        frame.render_widget(Clear, area);
        let search = Paragraph::new(format!("{prompt}{CURSOR_MARK}\n\nenter apply | esc cancel"))
            .block(Block::default().title("tìm kiếm").borders(Borders::ALL));
        frame.render_widget(search, area);
    }

    if let Some(form) = &view_data.form {
        let area = centered_rect(70, 70, frame.area());
        frame.render_widget(Clear, area);
        let widget = Paragraph::new(render_form_text(form))
            .wrap(Wrap { trim: false })
            .block(Block::default().title(form.title()).borders(Borders::ALL));
        frame.render_widget(widget, area);
    }

    if let Some(prompt) = &view_data.confirm {
        let area = centered_rect(60, 30, frame.area());
        frame.render_widget(Clear, area);
        let color = if prompt.destructive {
            Color::Red
        } else {
            Color::Cyan
        };
        let widget = Paragraph::new(render_confirm_text(prompt))
            .wrap(Wrap { trim: false })
            .block(
                Block::default()
                    .title(prompt.title.clone())
                    .borders(Borders::ALL)
                    .style(Style::default().fg(color)),
            );
        frame.render_widget(widget, area);
    }

    if state.mode == AppMode::Import {
        let area = centered_rect(70, 60, frame.area());
        frame.render_widget(Clear, area);
        let widget = Paragraph::new(render_import_text(&view_data.import))
            .wrap(Wrap { trim: false })
            .block(
                Block::default()
                    .title("Nhập người dùng từ Excel")
                    .borders(Borders::ALL),
            );
        frame.render_widget(widget, area);
    }

    if view_data.help_visible {
        let area = centered_rect(80, 72, frame.area());
        frame.render_widget(Clear, area);
        let help = Paragraph::new(help_overlay_text())
            .block(Block::default().title("help").borders(Borders::ALL));
        frame.render_widget(help, area);
    }
}

fn tab_title(screen: Screen, view_data: &ViewData) -> String {
    let (loaded, total) = match screen {
        Screen::Users => (
            view_data.users.loaded,
            view_data.users.table.pagination.total(),
        ),
        Screen::Events => (
            view_data.events.loaded,
            view_data.events.table.pagination.total(),
        ),
    };
    if loaded {
        format!("{} ({total})", screen.label())
    } else {
        screen.label().to_owned()
    }
}

fn render_screen<T: ScreenEntity>(
    frame: &mut ratatui::Frame<'_>,
    area: Rect,
    screen_kind: Screen,
    screen: &ScreenView<T>,
) {
    let parts = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(1), Constraint::Length(1)])
        .split(area);

    let columns = screen.spec.columns();
    let mut widths = vec![Constraint::Length(3)];
    widths.extend(columns.iter().map(|column| match column.format {
        CellFormat::Avatar => Constraint::Length(6),
        CellFormat::Date | CellFormat::Flag => Constraint::Length(12),
        _ => Constraint::Min(8),
    }));

    let header_check = checkbox(
        screen.selection.is_all_selected(screen.items.len()),
        screen.selection.is_indeterminate(screen.items.len()),
    );
    let mut header_cells = vec![Cell::from(header_check)];
    header_cells.extend(columns.iter().map(|column| {
        Cell::from(header_label(column, &screen.table)).style(
            Style::default()
                .fg(Color::White)
                .add_modifier(Modifier::BOLD),
        )
    }));
    let header = Row::new(header_cells);

    let rows = screen.items.iter().enumerate().map(|(row_index, row)| {
        let cursor_row = row_index == screen.cursor;
        let check = checkbox(screen.selection.is_selected(row), false);
        let mut cells = vec![Cell::from(check)];
        cells.extend(columns.iter().enumerate().map(|(column_index, column)| {
            let mut style = Style::default();
            if column.format == CellFormat::Badge {
                style = style.fg(Color::Magenta);
            }
            if cursor_row {
                style = style.bg(Color::DarkGray);
            }
            if cursor_row && column_index == screen.column {
                style = Style::default()
                    .fg(Color::Black)
                    .bg(Color::Cyan)
                    .add_modifier(Modifier::BOLD);
            }
            Cell::from(cell_text(column, row)).style(style)
        }));
        Row::new(cells)
    });

    let table = Table::new(rows, widths)
        .header(header)
        .column_spacing(1)
        .block(
            Block::default()
                .title(table_title(screen_kind, screen))
                .borders(Borders::ALL),
        );
    frame.render_widget(table, parts[0]);

    let footer = Paragraph::new(pagination_text(&screen.table.pagination))
        .style(Style::default().fg(Color::Gray));
    frame.render_widget(footer, parts[1]);
}

fn checkbox(checked: bool, indeterminate: bool) -> &'static str {
    if checked {
        "[x]"
    } else if indeterminate {
        "[-]"
    } else {
        "[ ]"
    }
}

fn header_label(column: &Column, table: &TableState) -> String {
    let mut label = column.label.to_owned();
    if let Some(sort) = table.sort.as_ref().filter(|sort| sort.key == column.key) {
        label.push_str(match sort.direction {
            SortDirection::Asc => " ↑",
            SortDirection::Desc => " ↓",
        });
    }
    if table.filters.column_filter(column.key).is_some() {
        label.push(' ');
        label.push_str(FILTER_MARK);
    }
    label
}

fn cell_text<T: TableRow>(column: &Column, row: &T) -> String {
    let value = row.field(column.key).unwrap_or(CellValue::Empty);
    match (column.format, value) {
        (CellFormat::Date, CellValue::Timestamp(at)) => at
            .format(format_description!("[day]/[month]/[year]"))
            .unwrap_or_default(),
        (CellFormat::Badge, CellValue::Text(text)) if !text.is_empty() => format!("[{text}]"),
        (CellFormat::Avatar, CellValue::Text(url)) if !url.is_empty() => "●".to_owned(),
        (CellFormat::Avatar, _) => initials(&row.row_label()),
        (CellFormat::Flag, CellValue::Flag(flag)) => {
            let key = if flag { "true" } else { "false" };
            column
                .option_label(key)
                .map_or_else(|| CellValue::Flag(flag).display(), str::to_owned)
        }
        (_, value) => value.display(),
    }
}

fn initials(name: &str) -> String {
    let words: Vec<&str> = name.split_whitespace().collect();
    let mut initials = String::new();
    if let Some(first) = words.first().and_then(|word| word.chars().next()) {
        initials.extend(first.to_uppercase());
    }
    if words.len() > 1
        && let Some(last) = words.last().and_then(|word| word.chars().next())
    {
        initials.extend(last.to_uppercase());
    }
    initials
}

fn table_title<T: ScreenEntity>(screen_kind: Screen, screen: &ScreenView<T>) -> String {
    let table = &screen.table;
    let mut parts = vec![format!(
        "{} ({})",
        screen_kind.label(),
        table.pagination.total()
    )];
    if let Some(sort) = &table.sort {
        parts.push(format!("sort {} {}", sort.key, sort.direction.as_str()));
    }
    let search_column = table.filters.search_column.as_deref().unwrap_or("-");
    if table.filters.search.trim().is_empty() {
        parts.push(format!("search in {search_column}"));
    } else {
        parts.push(format!(
            "{search_column} ~ \"{}\"",
            table.filters.search.trim()
        ));
    }
    for (key, value) in &table.filters.column_filters {
        let label: &str = match screen
            .spec
            .column(key)
            .and_then(|column| column.option_label(value))
        {
            Some(label) => label,
            None => value,
        };
        parts.push(format!("{key} = {label}"));
    }
    if !screen.selection.is_empty() {
        parts.push(format!("{} selected", screen.selection.len()));
    }
    parts.join(" | ")
}

fn pagination_text(pagination: &Pagination) -> String {
    let (start, end) = pagination.item_range();
    format!(
        "{start}-{end} of {} | page {}/{} | {} per page",
        pagination.total(),
        pagination.page(),
        pagination.total_pages().max(1),
        pagination.page_size()
    )
}

fn login_text(login: &LoginUiState) -> String {
    let (email_mark, password_mark) = if login.password_focused {
        ("", CURSOR_MARK)
    } else {
        (CURSOR_MARK, "")
    };
    let mut lines = vec![
        format!("Email:    {}{email_mark}", login.email),
        format!(
            "Mật khẩu: {}{password_mark}",
            "*".repeat(login.password.chars().count())
        ),
        String::new(),
    ];
    if let Some(error) = &login.error {
        lines.push(format!("! {error}"));
        lines.push(String::new());
    }
    lines.push("tab switch field | enter sign in | ctrl+q quit".to_owned());
    lines.join("\n")
}

fn render_form_text(form: &FormUiState) -> String {
    let mut lines = Vec::new();
    for (index, spec) in form.specs().iter().enumerate() {
        let focused = index == form.field_index;
        let marker = if focused { "›" } else { " " };
        let mut value = form.value(spec.key);
        if focused && !form.is_read_only() && spec.kind != FieldKind::Flag {
            value.push_str(CURSOR_MARK);
        }
        lines.push(format!("{marker} {:<16} {value}", spec.label));
    }
    lines.push(String::new());
    if let Some(error) = &form.error {
        lines.push(format!("! {error}"));
        lines.push(String::new());
    }
    let hint = if form.is_read_only() {
        "enter/esc close"
    } else {
        match form.current_spec().map(|spec| spec.kind) {
            Some(FieldKind::Avatar) => {
                "type a local image path, ctrl+u upload | ctrl+s save | esc cancel"
            }
            Some(FieldKind::Flag) => "space toggle | tab next field | ctrl+s save | esc cancel",
            _ => "tab/shift+tab field | enter or ctrl+s save | esc cancel",
        }
    };
    lines.push(hint.to_owned());
    lines.join("\n")
}

fn render_confirm_text(prompt: &ConfirmationPrompt) -> String {
    format!(
        "{}\n\n[y] {}    [n] {}",
        prompt.description, prompt.confirm_text, prompt.cancel_text
    )
}

fn render_import_text(dialog: &ImportDialog) -> String {
    let headers = USER_IMPORT_COLUMNS
        .iter()
        .map(|(header, _)| *header)
        .collect::<Vec<_>>()
        .join(", ");
    match &dialog.phase {
        ImportPhase::ChooseFile | ImportPhase::Ready(_) => [
            format!("file: {}{CURSOR_MARK}", dialog.path_input),
            String::new(),
            "accepted: .xlsx, .xls".to_owned(),
            format!("columns: {headers}"),
            String::new(),
            "enter import | ctrl+t write template | esc close".to_owned(),
        ]
        .join("\n"),
        ImportPhase::Importing(progress) => {
            let percent = usize::from(progress.percent());
            let filled = percent * PROGRESS_WIDTH / 100;
            [
                format!(
                    "[{}{}] {percent}%",
                    "#".repeat(filled),
                    "-".repeat(PROGRESS_WIDTH - filled)
                ),
                format!("{}/{} rows", progress.index, progress.total),
                progress.step.clone(),
            ]
            .join("\n")
        }
        ImportPhase::Finished(report) => {
            let mut lines = vec![report.summary(), String::new()];
            for error in &report.errors {
                lines.push(format!("row {}: {}", error.row, error.error));
            }
            for warning in &report.warnings {
                lines.push(format!("row {}: {}", warning.row, warning.message));
            }
            lines.push(String::new());
            lines.push("enter/esc close".to_owned());
            lines.join("\n")
        }
        ImportPhase::Failed(error) => [
            format!("import failed: {error}"),
            String::new(),
            format!("file: {}{CURSOR_MARK}", dialog.path_input),
            "edit the path and press enter to retry | esc close".to_owned(),
        ]
        .join("\n"),
    }
}

fn status_text(state: &AppState, view_data: &ViewData) -> String {
    if let Some(status) = &state.status_line {
        return status.clone();
    }
    match state.mode {
        AppMode::SignedOut => "sign in to continue".to_owned(),
        AppMode::Nav if view_data.search_prompt.is_some() => "searching".to_owned(),
        AppMode::Nav => "? help | n new | enter view | e edit | d delete | / search".to_owned(),
        AppMode::Form(..) => "form".to_owned(),
        AppMode::Confirm => "confirm".to_owned(),
        AppMode::Import => "import".to_owned(),
    }
}

fn help_overlay_text() -> &'static str {
    "global: ctrl+q quit | ? help\n\
nav: j/k rows | h/l columns | g/G top/bottom | tab/f b screens | r reload | o sign out\n\
table: s sort cycle | </> sort asc/desc | S clear sort | / search | c search column\n\
table: F cycle column filter | C clear filters | [/] page | {/} first/last | z page size\n\
rows: space/x select | X select page | n new | enter view | e edit | d delete | D delete selected\n\
users: i import from excel\n\
form: tab/shift+tab field | space toggle | ctrl+u upload avatar | enter or ctrl+s save | esc cancel\n\
confirm: y/enter confirm | n/esc cancel\n\
import: type path | enter import | ctrl+t template | esc close"
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
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
        .split(popup_layout[1])[1]
}
