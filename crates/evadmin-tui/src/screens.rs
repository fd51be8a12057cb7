// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use evadmin_app::{
    ActionDispatcher, ActionVariant, CellFormat, Column, ConfirmationConfig, Event, EventFormInput,
    EventId, FILTER_ALL, FormKind, FormPayload, ListQuery, PAGE_SIZE_CHOICES, Page, RowAction,
    Selection, TableAction, TableCommand, TableEvent, TableRow, TableSpec, TableState, User,
    UserFormInput, UserId,
};

use crate::form::FormTarget;
use crate::{AppRuntime, ViewData};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    View,
    Edit,
    Delete,
    DeleteSelected,
}

/// Everything one list screen owns: its query state, the rows of the
/// current page, the selection and the action routing.
pub struct ScreenView<T: TableRow> {
    pub spec: TableSpec,
    pub table: TableState,
    pub items: Vec<T>,
    pub selection: Selection<T>,
    pub dispatcher: ActionDispatcher<ActionKind, T>,
    pub cursor: usize,
    pub column: usize,
    pub loaded: bool,
}

impl<T: TableRow + Clone> ScreenView<T> {
    fn new(
        spec: TableSpec,
        search_column: &str,
        page_size: u32,
        dispatcher: ActionDispatcher<ActionKind, T>,
    ) -> Self {
        Self {
            spec,
            table: TableState::new(search_column, page_size),
            items: Vec::new(),
            selection: Selection::new(),
            dispatcher,
            cursor: 0,
            column: 0,
            loaded: false,
        }
    }

    /// Applies a table command and reports what changed.
    pub fn apply(&mut self, command: TableCommand) -> Vec<TableEvent> {
        let next = self.table.reduce(&self.spec, command);
        let events = TableState::diff(&self.table, &next);
        self.table = next;
        events
    }

    /// Stores a fetched page. Returns true when the total moved the current
    /// page out of range and it must be fetched again.
    pub fn load(&mut self, page: Page<T>) -> bool {
        let before = self.table.pagination.page();
        self.table = self.table.with_total(page.total_count);
        self.items = page.items;
        self.cursor = self.cursor.min(self.items.len().saturating_sub(1));
        self.loaded = true;
        self.table.pagination.page() != before
    }

    pub fn current_row(&self) -> Option<&T> {
        self.items.get(self.cursor)
    }

    pub fn current_column(&self) -> Option<&Column> {
        self.spec.columns().get(self.column)
    }

    pub fn move_cursor(&mut self, delta: isize) {
        if self.items.is_empty() {
            self.cursor = 0;
            return;
        }
        let last = self.items.len() as isize - 1;
        self.cursor = (self.cursor as isize + delta).clamp(0, last) as usize;
    }

    pub fn move_column(&mut self, delta: isize) {
        let len = self.spec.columns().len() as isize;
        self.column = (self.column as isize + delta).rem_euclid(len.max(1)) as usize;
    }

    pub fn toggle_current(&mut self) {
        if let Some(row) = self.items.get(self.cursor) {
            let row = row.clone();
            self.selection.flip(&row);
        }
    }

    /// Header checkbox: selects every visible row unless all already are.
    pub fn toggle_all(&mut self) {
        let checked = !self.selection.is_all_selected(self.items.len());
        self.selection.select_all(&self.items, checked);
    }

    /// Next value of the current column's filter menu, wrapping back to
    /// "all".
    pub fn next_filter_command(&self) -> Option<TableCommand> {
        let column = self.current_column()?;
        if column.filter_options.is_empty() {
            return None;
        }
        let current = self.table.filters.column_filter(column.key);
        let next = match current {
            None => column.filter_options.first().map(|option| option.value),
            Some(value) => column
                .filter_options
                .iter()
                .skip_while(|option| option.value != value)
                .nth(1)
                .map(|option| option.value),
        };
        Some(TableCommand::SetColumnFilter {
            key: column.key.to_owned(),
            value: next.unwrap_or(FILTER_ALL).to_owned(),
        })
    }

    pub fn next_search_column_command(&self) -> Option<TableCommand> {
        let searchable: Vec<&Column> = self.spec.searchable_columns().collect();
        if searchable.is_empty() {
            return None;
        }
        let current = self.table.filters.search_column.as_deref();
        let index = searchable
            .iter()
            .position(|column| Some(column.key) == current)
            .map_or(0, |index| (index + 1) % searchable.len());
        Some(TableCommand::SetSearchColumn(searchable[index].key.to_owned()))
    }

    pub fn next_page_size_command(&self) -> TableCommand {
        let current = self.table.pagination.page_size();
        let next = PAGE_SIZE_CHOICES
            .iter()
            .copied()
            .find(|size| *size > current)
            .unwrap_or(PAGE_SIZE_CHOICES[0]);
        TableCommand::ChangePageSize(next)
    }
}

/// A row type with its own list screen.
pub trait ScreenEntity: TableRow + Clone + Sized {
    const FORM: FormKind;
    const NOUN: &'static str;

    fn screen(view_data: &ViewData) -> &ScreenView<Self>;
    fn screen_mut(view_data: &mut ViewData) -> &mut ScreenView<Self>;
    fn fetch<R: AppRuntime>(runtime: &mut R, query: &ListQuery) -> Result<Page<Self>>;
    /// Deletes rows; the string is a follow-up warning that did not undo
    /// the deletion.
    fn delete<R: AppRuntime>(runtime: &mut R, rows: &[Self]) -> Result<Option<String>>;
    fn form_payload(&self) -> FormPayload;
    fn form_target(&self) -> FormTarget;
}

impl ScreenEntity for User {
    const FORM: FormKind = FormKind::User;
    const NOUN: &'static str = "user";

    fn screen(view_data: &ViewData) -> &ScreenView<Self> {
        &view_data.users
    }

    fn screen_mut(view_data: &mut ViewData) -> &mut ScreenView<Self> {
        &mut view_data.users
    }

    fn fetch<R: AppRuntime>(runtime: &mut R, query: &ListQuery) -> Result<Page<Self>> {
        runtime.list_users(query)
    }

    fn delete<R: AppRuntime>(runtime: &mut R, rows: &[Self]) -> Result<Option<String>> {
        let ids: Vec<UserId> = rows.iter().map(|user| user.id.clone()).collect();
        Ok(runtime.delete_users(&ids)?.warning)
    }

    fn form_payload(&self) -> FormPayload {
        FormPayload::User(UserFormInput::from_user(self))
    }

    fn form_target(&self) -> FormTarget {
        FormTarget::User(self.id.clone())
    }
}

impl ScreenEntity for Event {
    const FORM: FormKind = FormKind::Event;
    const NOUN: &'static str = "event";

    fn screen(view_data: &ViewData) -> &ScreenView<Self> {
        &view_data.events
    }

    fn screen_mut(view_data: &mut ViewData) -> &mut ScreenView<Self> {
        &mut view_data.events
    }

    fn fetch<R: AppRuntime>(runtime: &mut R, query: &ListQuery) -> Result<Page<Self>> {
        runtime.list_events(query)
    }

    fn delete<R: AppRuntime>(runtime: &mut R, rows: &[Self]) -> Result<Option<String>> {
        let ids: Vec<EventId> = rows.iter().map(|event| event.id).collect();
        runtime.delete_events(&ids)?;
        Ok(None)
    }

    fn form_payload(&self) -> FormPayload {
        FormPayload::Event(EventFormInput::from_event(self))
    }

    fn form_target(&self) -> FormTarget {
        FormTarget::Event(self.id)
    }
}

pub fn user_screen(page_size: u32) -> Result<ScreenView<User>> {
    let spec = TableSpec::for_rows::<User>(vec![
        Column::new("avatar_image_url", "Avatar").format(CellFormat::Avatar),
        Column::new("full_name", "Họ và tên").sortable().filterable(),
        Column::new("email", "Email").sortable().filterable(),
        Column::new("position", "Chức vụ")
            .sortable()
            .filterable()
            .format(CellFormat::Badge),
        Column::new("created_at", "Ngày tham gia")
            .sortable()
            .format(CellFormat::Date),
    ])
    .context("user table columns")?;

    let dispatcher = ActionDispatcher::new(
        vec![
            RowAction::new(ActionKind::View, "Xem chi tiết"),
            RowAction::new(ActionKind::Edit, "Chỉnh sửa"),
            RowAction::new(ActionKind::Delete, "Xóa")
                .variant(ActionVariant::Destructive)
                .confirm(ConfirmationConfig::new(
                    "Xác nhận xóa người dùng",
                    "Bạn có chắc chắn muốn xóa người dùng \"{row}\"? Hành động này không thể hoàn tác.",
                )
                .confirm_text("Xóa")
                .cancel_text("Hủy")),
        ],
        vec![
            TableAction::new(ActionKind::DeleteSelected, "Xóa nhiều")
                .variant(ActionVariant::Destructive)
                .confirm(ConfirmationConfig::new(
                    "Xác nhận xóa nhiều người dùng",
                    "Bạn có chắc chắn muốn xóa {count} người dùng đã chọn? Hành động này không thể hoàn tác.",
                )
                .confirm_text("Xóa")
                .cancel_text("Hủy")),
        ],
    );

    Ok(ScreenView::new(spec, "full_name", page_size, dispatcher))
}

pub fn event_screen(page_size: u32) -> Result<ScreenView<Event>> {
    let spec = TableSpec::for_rows::<Event>(vec![
        Column::new("title", "Tiêu đề").sortable().filterable(),
        Column::new("slug", "Slug").filterable(),
        Column::new("from_date", "Bắt đầu")
            .sortable()
            .format(CellFormat::Date),
        Column::new("to_date", "Kết thúc")
            .sortable()
            .format(CellFormat::Date),
        Column::new("is_public", "Hiển thị")
            .sortable()
            .format(CellFormat::Flag)
            .with_options(&[("true", "Công khai"), ("false", "Riêng tư")]),
        Column::new("created_at", "Ngày tạo")
            .sortable()
            .format(CellFormat::Date),
    ])
    .context("event table columns")?;

    let dispatcher = ActionDispatcher::new(
        vec![
            RowAction::new(ActionKind::View, "Xem chi tiết"),
            RowAction::new(ActionKind::Edit, "Chỉnh sửa"),
            RowAction::new(ActionKind::Delete, "Xóa")
                .variant(ActionVariant::Destructive)
                .confirm(ConfirmationConfig::new(
                    "Xác nhận xóa sự kiện",
                    "Bạn có chắc chắn muốn xóa sự kiện \"{row}\"? Ảnh và tài liệu của sự kiện cũng bị xóa.",
                )
                .confirm_text("Xóa")
                .cancel_text("Hủy")),
        ],
        vec![
            TableAction::new(ActionKind::DeleteSelected, "Xóa nhiều")
                .variant(ActionVariant::Destructive)
                .confirm(ConfirmationConfig::new(
                    "Xác nhận xóa nhiều sự kiện",
                    "Bạn có chắc chắn muốn xóa {count} sự kiện đã chọn?",
                )
                .confirm_text("Xóa")
                .cancel_text("Hủy")),
        ],
    );

    Ok(ScreenView::new(spec, "title", page_size, dispatcher))
}

#[cfg(test)]
mod tests {
    use super::{ActionKind, event_screen, user_screen};
    use evadmin_app::{Dispatch, Page, SortDirection, TableCommand, TableEvent, User, UserId};
    use serde_json::Map;
    use time::OffsetDateTime;

    fn user(id: &str) -> User {
        User {
            id: UserId::new(id),
            full_name: format!("User {id}"),
            email: format!("{id}@example.com"),
            position: String::new(),
            avatar_image_url: String::new(),
            metadata: Map::new(),
            created_at: OffsetDateTime::UNIX_EPOCH,
            updated_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    fn page(ids: &[&str], total: u64, page: u32) -> Page<User> {
        Page {
            items: ids.iter().map(|id| user(id)).collect(),
            total_count: total,
            current_page: page,
            total_pages: 0,
        }
    }

    #[test]
    fn screens_build_with_checked_columns() {
        assert!(user_screen(10).is_ok());
        assert!(event_screen(10).is_ok());
    }

    #[test]
    fn sort_command_reports_change() {
        let mut screen = user_screen(10).expect("user screen");
        let events = screen.apply(TableCommand::Sort("email".to_owned()));
        assert!(matches!(
            events.as_slice(),
            [TableEvent::SortChanged(Some(sort))] if sort.direction == SortDirection::Asc
        ));
        // Avatar is not sortable.
        assert!(
            screen
                .apply(TableCommand::Sort("avatar_image_url".to_owned()))
                .is_empty()
        );
    }

    #[test]
    fn load_reclamps_page_after_rows_disappear() {
        let mut screen = user_screen(10).expect("user screen");
        assert!(!screen.load(page(&["a"; 10], 25, 1)));
        screen.apply(TableCommand::LastPage);
        assert_eq!(screen.table.pagination.page(), 3);

        // Five rows were deleted elsewhere: page 3 no longer exists.
        assert!(screen.load(page(&[], 20, 3)));
        assert_eq!(screen.table.pagination.page(), 2);
        assert_eq!(screen.cursor, 0);
    }

    #[test]
    fn selection_survives_page_changes() {
        let mut screen = user_screen(2).expect("user screen");
        screen.load(page(&["a", "b"], 4, 1));
        screen.toggle_all();
        assert_eq!(screen.selection.len(), 2);

        screen.apply(TableCommand::NextPage);
        screen.load(page(&["c", "d"], 4, 2));
        assert_eq!(screen.selection.len(), 2);
        assert!(!screen.selection.is_indeterminate(screen.items.len()));
        assert!(!screen.selection.is_selected(&user("c")));

        screen.toggle_current();
        assert!(screen.selection.is_selected(&user("c")));
        assert_eq!(screen.selection.len(), 3);
    }

    #[test]
    fn filter_menu_cycles_through_options_and_back_to_all() {
        let mut screen = event_screen(10).expect("event screen");
        screen.column = 4;
        let mut seen = Vec::new();
        for _ in 0..3 {
            let command = screen.next_filter_command().expect("flag column has options");
            if let TableCommand::SetColumnFilter { value, .. } = &command {
                seen.push(value.clone());
            }
            screen.apply(command);
        }
        assert_eq!(seen, vec!["true", "false", "all"]);
        assert!(screen.table.filters.column_filters.is_empty());

        screen.column = 0;
        assert!(screen.next_filter_command().is_none());
    }

    #[test]
    fn search_column_and_page_size_cycle() {
        let mut screen = user_screen(10).expect("user screen");
        let command = screen.next_search_column_command().expect("searchable");
        assert_eq!(command, TableCommand::SetSearchColumn("email".to_owned()));
        screen.apply(command);
        screen.apply(screen.next_search_column_command().expect("searchable"));
        screen.apply(screen.next_search_column_command().expect("searchable"));
        assert_eq!(
            screen.table.filters.search_column.as_deref(),
            Some("full_name")
        );

        assert_eq!(screen.next_page_size_command(), TableCommand::ChangePageSize(20));
        screen.apply(TableCommand::ChangePageSize(100));
        assert_eq!(screen.next_page_size_command(), TableCommand::ChangePageSize(10));
    }

    #[test]
    fn delete_asks_for_confirmation_with_row_label() {
        let mut screen = user_screen(10).expect("user screen");
        let Dispatch::Confirm(prompt) = screen.dispatcher.invoke_row(ActionKind::Delete, &user("a"))
        else {
            panic!("delete should ask first");
        };
        assert!(prompt.destructive);
        assert!(prompt.description.contains("\"User a\""));
        assert!(matches!(
            screen.dispatcher.invoke_row(ActionKind::View, &user("a")),
            Dispatch::Fire(_)
        ));
        assert!(matches!(
            screen.dispatcher.invoke_bulk(ActionKind::DeleteSelected, Vec::new()),
            Dispatch::Suppressed
        ));
    }
}
