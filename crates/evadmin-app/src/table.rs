// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Table state controller.
//!
//! Sort, filter and pagination state belong to the screen that embeds a
//! table. This module only computes transitions: [`TableState::reduce`]
//! takes the current value and a command and returns the next value, and
//! [`TableState::diff`] tells the owner what changed so it can re-fetch.

use std::collections::BTreeMap;
use std::fmt;

use time::OffsetDateTime;
use time::macros::format_description;

use crate::backend::ListQuery;
use crate::model::SortDirection;

/// Filter value that means "no filter on this column".
pub const FILTER_ALL: &str = "all";
pub const DEFAULT_PAGE_SIZE: u32 = 10;
pub const PAGE_SIZE_CHOICES: [u32; 4] = [10, 20, 50, 100];

#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Integer(i64),
    Flag(bool),
    Timestamp(OffsetDateTime),
    Empty,
}

impl CellValue {
    pub fn display(&self) -> String {
        match self {
            Self::Text(value) => value.clone(),
            Self::Integer(value) => value.to_string(),
            Self::Flag(true) => "yes".to_owned(),
            Self::Flag(false) => "no".to_owned(),
            Self::Timestamp(value) => value
                .format(&format_description!("[year]-[month]-[day] [hour]:[minute]"))
                .unwrap_or_default(),
            Self::Empty => String::new(),
        }
    }
}

/// An entity that can be shown as a table row.
pub trait TableRow {
    type Id: Clone + Eq + Ord + fmt::Debug;

    /// Every key `field` answers for.
    const FIELDS: &'static [&'static str];

    fn row_id(&self) -> Self::Id;

    /// Human-readable name used in confirmation prompts.
    fn row_label(&self) -> String;

    fn field(&self, key: &str) -> Option<CellValue>;
}

/// Declarative stand-in for a per-column cell renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CellFormat {
    #[default]
    Plain,
    Date,
    Badge,
    Avatar,
    Flag,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterOption {
    pub value: &'static str,
    pub label: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub key: &'static str,
    pub label: &'static str,
    pub sortable: bool,
    pub filterable: bool,
    pub filter_options: Vec<FilterOption>,
    pub format: CellFormat,
}

impl Column {
    pub fn new(key: &'static str, label: &'static str) -> Self {
        Self {
            key,
            label,
            sortable: false,
            filterable: false,
            filter_options: Vec::new(),
            format: CellFormat::Plain,
        }
    }

    pub fn sortable(mut self) -> Self {
        self.sortable = true;
        self
    }

    pub fn filterable(mut self) -> Self {
        self.filterable = true;
        self
    }

    pub fn with_options(mut self, options: &[(&'static str, &'static str)]) -> Self {
        self.filter_options = options
            .iter()
            .map(|&(value, label)| FilterOption { value, label })
            .collect();
        self
    }

    pub fn format(mut self, format: CellFormat) -> Self {
        self.format = format;
        self
    }

    pub fn option_label(&self, value: &str) -> Option<&'static str> {
        self.filter_options
            .iter()
            .find(|option| option.value == value)
            .map(|option| option.label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecError {
    Empty,
    DuplicateKey(&'static str),
    UnknownField(&'static str),
}

impl fmt::Display for SpecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("table needs at least one column"),
            Self::DuplicateKey(key) => write!(f, "column key {key:?} is declared twice"),
            Self::UnknownField(key) => {
                write!(f, "column key {key:?} does not address a row field")
            }
        }
    }
}

impl std::error::Error for SpecError {}

/// Column descriptors of one table, checked against the row type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSpec {
    columns: Vec<Column>,
}

impl TableSpec {
    pub fn for_rows<T: TableRow>(columns: Vec<Column>) -> Result<Self, SpecError> {
        if columns.is_empty() {
            return Err(SpecError::Empty);
        }
        for (index, column) in columns.iter().enumerate() {
            if columns[..index].iter().any(|other| other.key == column.key) {
                return Err(SpecError::DuplicateKey(column.key));
            }
            if !T::FIELDS.contains(&column.key) {
                return Err(SpecError::UnknownField(column.key));
            }
        }
        Ok(Self { columns })
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, key: &str) -> Option<&Column> {
        self.columns.iter().find(|column| column.key == key)
    }

    pub fn searchable_columns(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter().filter(|column| column.filterable)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortConfig {
    pub key: String,
    pub direction: SortDirection,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TableFilters {
    pub search: String,
    pub search_column: Option<String>,
    pub column_filters: BTreeMap<String, String>,
}

impl TableFilters {
    pub fn searching(column: &str) -> Self {
        Self {
            search_column: Some(column.to_owned()),
            ..Self::default()
        }
    }

    pub fn column_filter(&self, key: &str) -> Option<&str> {
        self.column_filters.get(key).map(String::as_str)
    }
}

/// Page/size/total/total-pages kept consistent by construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    page: u32,
    page_size: u32,
    total: u64,
    total_pages: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl Pagination {
    pub fn new(page_size: u32) -> Self {
        Self {
            page: 1,
            page_size: page_size.max(1),
            total: 0,
            total_pages: 0,
        }
    }

    pub const fn page(&self) -> u32 {
        self.page
    }

    pub const fn page_size(&self) -> u32 {
        self.page_size
    }

    pub const fn total(&self) -> u64 {
        self.total
    }

    pub const fn total_pages(&self) -> u32 {
        self.total_pages
    }

    pub fn with_total(self, total: u64) -> Self {
        let total_pages = total_pages_for(total, self.page_size);
        Self {
            total,
            total_pages,
            ..self
        }
        .with_page(self.page)
    }

    pub fn with_page(self, page: u32) -> Self {
        let last = self.total_pages.max(1);
        Self {
            page: page.clamp(1, last),
            ..self
        }
    }

    pub fn with_page_size(self, page_size: u32) -> Self {
        let page_size = page_size.max(1);
        Self {
            page: 1,
            page_size,
            total: self.total,
            total_pages: total_pages_for(self.total, page_size),
        }
    }

    pub const fn has_prev(&self) -> bool {
        self.page > 1
    }

    pub const fn has_next(&self) -> bool {
        self.page < self.total_pages
    }

    /// 1-based index of the first and last row on the current page; `(0, 0)`
    /// when there are no rows.
    pub fn item_range(&self) -> (u64, u64) {
        if self.total == 0 {
            return (0, 0);
        }
        let size = u64::from(self.page_size);
        let start = u64::from(self.page - 1) * size + 1;
        let end = (u64::from(self.page) * size).min(self.total);
        (start.min(end), end)
    }
}

pub fn total_pages_for(total: u64, page_size: u32) -> u32 {
    let size = u64::from(page_size.max(1));
    u32::try_from(total.div_ceil(size)).unwrap_or(u32::MAX)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableCommand {
    Sort(String),
    SetSort(String, SortDirection),
    ClearSort,
    SetColumnFilter { key: String, value: String },
    ClearColumnFilter(String),
    ClearAllColumnFilters,
    SetSearch(String),
    SetSearchColumn(String),
    ChangePage(u32),
    ChangePageSize(u32),
    FirstPage,
    PrevPage,
    NextPage,
    LastPage,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableEvent {
    SortChanged(Option<SortConfig>),
    FiltersChanged(TableFilters),
    PaginationChanged { page: u32, page_size: u32 },
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TableState {
    pub filters: TableFilters,
    pub sort: Option<SortConfig>,
    pub pagination: Pagination,
}

impl TableState {
    pub fn new(search_column: &str, page_size: u32) -> Self {
        Self {
            filters: TableFilters::searching(search_column),
            sort: None,
            pagination: Pagination::new(page_size),
        }
    }

    pub fn reduce(&self, spec: &TableSpec, command: TableCommand) -> Self {
        let mut next = self.clone();
        match command {
            TableCommand::Sort(key) => {
                if !is_sortable(spec, &key) {
                    return next;
                }
                next.sort = match &self.sort {
                    Some(current) if current.key == key => match current.direction {
                        SortDirection::Asc => Some(SortConfig {
                            key,
                            direction: SortDirection::Desc,
                        }),
                        SortDirection::Desc => None,
                    },
                    _ => Some(SortConfig {
                        key,
                        direction: SortDirection::Asc,
                    }),
                };
            }
            TableCommand::SetSort(key, direction) => {
                if !is_sortable(spec, &key) {
                    return next;
                }
                let already = self
                    .sort
                    .as_ref()
                    .is_some_and(|sort| sort.key == key && sort.direction == direction);
                next.sort = if already {
                    None
                } else {
                    Some(SortConfig { key, direction })
                };
            }
            TableCommand::ClearSort => {
                next.sort = None;
            }
            TableCommand::SetColumnFilter { key, value } => {
                if spec.column(&key).is_none() {
                    return next;
                }
                if value == FILTER_ALL || value.is_empty() {
                    next.filters.column_filters.remove(&key);
                } else {
                    next.filters.column_filters.insert(key, value);
                }
                next.reset_page_on_filter_change(self);
            }
            TableCommand::ClearColumnFilter(key) => {
                next.filters.column_filters.remove(&key);
                next.reset_page_on_filter_change(self);
            }
            TableCommand::ClearAllColumnFilters => {
                next.filters.column_filters.clear();
                next.reset_page_on_filter_change(self);
            }
            TableCommand::SetSearch(text) => {
                next.filters.search = text;
                next.reset_page_on_filter_change(self);
            }
            TableCommand::SetSearchColumn(key) => {
                if !spec.column(&key).is_some_and(|column| column.filterable) {
                    return next;
                }
                next.filters.search_column = Some(key);
                next.reset_page_on_filter_change(self);
            }
            TableCommand::ChangePage(page) => {
                next.pagination = self.pagination.with_page(page);
            }
            TableCommand::ChangePageSize(size) => {
                next.pagination = self.pagination.with_page_size(size);
            }
            TableCommand::FirstPage => {
                next.pagination = self.pagination.with_page(1);
            }
            TableCommand::PrevPage => {
                next.pagination = self
                    .pagination
                    .with_page(self.pagination.page().saturating_sub(1));
            }
            TableCommand::NextPage => {
                next.pagination = self
                    .pagination
                    .with_page(self.pagination.page().saturating_add(1));
            }
            TableCommand::LastPage => {
                next.pagination = self.pagination.with_page(self.pagination.total_pages());
            }
        }
        next
    }

    /// Applies a fetched row count; the page is re-clamped to the new range.
    pub fn with_total(&self, total: u64) -> Self {
        Self {
            pagination: self.pagination.with_total(total),
            ..self.clone()
        }
    }

    pub fn diff(before: &Self, after: &Self) -> Vec<TableEvent> {
        let mut events = Vec::new();
        if before.sort != after.sort {
            events.push(TableEvent::SortChanged(after.sort.clone()));
        }
        if before.filters != after.filters {
            events.push(TableEvent::FiltersChanged(after.filters.clone()));
        }
        if before.pagination.page() != after.pagination.page()
            || before.pagination.page_size() != after.pagination.page_size()
        {
            events.push(TableEvent::PaginationChanged {
                page: after.pagination.page(),
                page_size: after.pagination.page_size(),
            });
        }
        events
    }

    pub fn query(&self) -> ListQuery {
        let search = self.filters.search.trim();
        ListQuery {
            search: (!search.is_empty()).then(|| search.to_owned()),
            search_column: self.filters.search_column.clone(),
            column_filters: self.filters.column_filters.clone(),
            sort_column: self.sort.as_ref().map(|sort| sort.key.clone()),
            sort_direction: self.sort.as_ref().map(|sort| sort.direction),
            page: self.pagination.page(),
            limit: self.pagination.page_size(),
        }
    }

    fn reset_page_on_filter_change(&mut self, before: &Self) {
        if self.filters != before.filters {
            self.pagination = self.pagination.with_page(1);
        }
    }
}

fn is_sortable(spec: &TableSpec, key: &str) -> bool {
    spec.column(key).is_some_and(|column| column.sortable)
}

#[cfg(test)]
mod tests {
    use super::{
        Column, FILTER_ALL, Pagination, SortConfig, SpecError, TableCommand, TableEvent,
        TableSpec, TableState, total_pages_for,
    };
    use crate::model::{SortDirection, User};

    fn spec() -> TableSpec {
        TableSpec::for_rows::<User>(vec![
            Column::new("avatar_image_url", "Avatar"),
            Column::new("full_name", "Name").sortable().filterable(),
            Column::new("email", "Email").sortable().filterable(),
            Column::new("position", "Position")
                .sortable()
                .filterable()
                .with_options(&[("Staff", "Staff"), ("Manager", "Manager")]),
            Column::new("created_at", "Joined").sortable(),
        ])
        .expect("valid spec")
    }

    fn state_with_total(total: u64) -> TableState {
        TableState::new("full_name", 10).with_total(total)
    }

    #[test]
    fn sort_cycles_none_asc_desc_none() {
        let spec = spec();
        let start = TableState::new("full_name", 10);

        let asc = start.reduce(&spec, TableCommand::Sort("email".to_owned()));
        assert_eq!(
            asc.sort,
            Some(SortConfig {
                key: "email".to_owned(),
                direction: SortDirection::Asc,
            })
        );
        let desc = asc.reduce(&spec, TableCommand::Sort("email".to_owned()));
        assert_eq!(desc.sort.as_ref().map(|s| s.direction), Some(SortDirection::Desc));
        let cleared = desc.reduce(&spec, TableCommand::Sort("email".to_owned()));
        assert_eq!(cleared, start);
    }

    #[test]
    fn sort_on_other_column_restarts_ascending() {
        let spec = spec();
        let state = TableState::new("full_name", 10)
            .reduce(&spec, TableCommand::Sort("email".to_owned()))
            .reduce(&spec, TableCommand::Sort("email".to_owned()))
            .reduce(&spec, TableCommand::Sort("full_name".to_owned()));
        assert_eq!(
            state.sort,
            Some(SortConfig {
                key: "full_name".to_owned(),
                direction: SortDirection::Asc,
            })
        );
    }

    #[test]
    fn sort_on_unsortable_column_is_noop() {
        let spec = spec();
        let state = TableState::new("full_name", 10)
            .reduce(&spec, TableCommand::Sort("email".to_owned()));
        let next = state.reduce(&spec, TableCommand::Sort("avatar_image_url".to_owned()));
        assert_eq!(next, state);
        let unknown = state.reduce(&spec, TableCommand::Sort("nope".to_owned()));
        assert_eq!(unknown, state);
    }

    #[test]
    fn set_sort_same_direction_clears() {
        let spec = spec();
        let state = TableState::new("full_name", 10).reduce(
            &spec,
            TableCommand::SetSort("email".to_owned(), SortDirection::Desc),
        );
        assert_eq!(state.sort.as_ref().map(|s| s.direction), Some(SortDirection::Desc));
        let cleared = state.reduce(
            &spec,
            TableCommand::SetSort("email".to_owned(), SortDirection::Desc),
        );
        assert!(cleared.sort.is_none());
    }

    #[test]
    fn filter_all_equals_never_filtering() {
        let spec = spec();
        let start = TableState::new("full_name", 10);
        let filtered = start.reduce(
            &spec,
            TableCommand::SetColumnFilter {
                key: "position".to_owned(),
                value: "Staff".to_owned(),
            },
        );
        assert_eq!(filtered.filters.column_filter("position"), Some("Staff"));

        let reset = filtered.reduce(
            &spec,
            TableCommand::SetColumnFilter {
                key: "position".to_owned(),
                value: FILTER_ALL.to_owned(),
            },
        );
        assert_eq!(reset, start);

        let direct_all = start.reduce(
            &spec,
            TableCommand::SetColumnFilter {
                key: "position".to_owned(),
                value: FILTER_ALL.to_owned(),
            },
        );
        assert_eq!(direct_all, start);

        let empty = filtered.reduce(
            &spec,
            TableCommand::SetColumnFilter {
                key: "position".to_owned(),
                value: String::new(),
            },
        );
        assert_eq!(empty, start);
    }

    #[test]
    fn clear_filters_one_and_all() {
        let spec = spec();
        let state = TableState::new("full_name", 10)
            .reduce(
                &spec,
                TableCommand::SetColumnFilter {
                    key: "position".to_owned(),
                    value: "Staff".to_owned(),
                },
            )
            .reduce(
                &spec,
                TableCommand::SetColumnFilter {
                    key: "email".to_owned(),
                    value: "a@example.com".to_owned(),
                },
            );
        let one = state.reduce(&spec, TableCommand::ClearColumnFilter("email".to_owned()));
        assert_eq!(one.filters.column_filters.len(), 1);
        let all = state.reduce(&spec, TableCommand::ClearAllColumnFilters);
        assert!(all.filters.column_filters.is_empty());
    }

    #[test]
    fn filter_change_resets_page() {
        let spec = spec();
        let state = state_with_total(95).reduce(&spec, TableCommand::ChangePage(4));
        assert_eq!(state.pagination.page(), 4);
        let searched = state.reduce(&spec, TableCommand::SetSearch("nguyen".to_owned()));
        assert_eq!(searched.pagination.page(), 1);
    }

    #[test]
    fn search_column_must_be_filterable() {
        let spec = spec();
        let state = TableState::new("full_name", 10);
        let next = state.reduce(&spec, TableCommand::SetSearchColumn("created_at".to_owned()));
        assert_eq!(next, state);
        let email = state.reduce(&spec, TableCommand::SetSearchColumn("email".to_owned()));
        assert_eq!(email.filters.search_column.as_deref(), Some("email"));
    }

    #[test]
    fn total_pages_is_ceiling_for_all_inputs() {
        for total in 0..250_u64 {
            for size in 1..25_u32 {
                let pagination = Pagination::new(size).with_total(total);
                let expected = total.div_ceil(u64::from(size));
                assert_eq!(u64::from(pagination.total_pages()), expected);
                assert_eq!(total_pages_for(total, size), pagination.total_pages());
            }
        }
    }

    #[test]
    fn change_page_is_clamped() {
        let spec = spec();
        let state = state_with_total(35);
        assert_eq!(state.pagination.total_pages(), 4);

        for requested in [0_u32, 1, 2, 4, 5, 99, u32::MAX] {
            let next = state.reduce(&spec, TableCommand::ChangePage(requested));
            let page = next.pagination.page();
            assert!((1..=4).contains(&page), "page {page} for request {requested}");
        }
        assert_eq!(
            state
                .reduce(&spec, TableCommand::ChangePage(99))
                .pagination
                .page(),
            4
        );

        let empty = state_with_total(0).reduce(&spec, TableCommand::ChangePage(3));
        assert_eq!(empty.pagination.page(), 1);
    }

    #[test]
    fn change_page_size_resets_to_first_page() {
        let spec = spec();
        let state = state_with_total(100)
            .reduce(&spec, TableCommand::ChangePage(7))
            .reduce(&spec, TableCommand::ChangePageSize(20));
        assert_eq!(state.pagination.page(), 1);
        assert_eq!(state.pagination.page_size(), 20);
        assert_eq!(state.pagination.total_pages(), 5);

        let zero = state.reduce(&spec, TableCommand::ChangePageSize(0));
        assert_eq!(zero.pagination.page_size(), 1);
    }

    #[test]
    fn shrinking_total_reclamps_page() {
        let spec = spec();
        let state = state_with_total(100).reduce(&spec, TableCommand::ChangePage(10));
        let shrunk = state.with_total(12);
        assert_eq!(shrunk.pagination.page(), 2);
        assert_eq!(shrunk.pagination.item_range(), (11, 12));
    }

    #[test]
    fn prev_and_next_stay_in_range() {
        let spec = spec();
        let state = state_with_total(25);
        let prev = state.reduce(&spec, TableCommand::PrevPage);
        assert_eq!(prev.pagination.page(), 1);
        let last = state.reduce(&spec, TableCommand::LastPage);
        assert_eq!(last.pagination.page(), 3);
        assert!(!last.pagination.has_next());
        let next = last.reduce(&spec, TableCommand::NextPage);
        assert_eq!(next.pagination.page(), 3);
    }

    #[test]
    fn diff_reports_each_changed_part() {
        let spec = spec();
        let before = state_with_total(40);
        let after = before
            .reduce(&spec, TableCommand::Sort("email".to_owned()))
            .reduce(&spec, TableCommand::ChangePage(2));
        let events = TableState::diff(&before, &after);
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], TableEvent::SortChanged(Some(_))));
        assert_eq!(
            events[1],
            TableEvent::PaginationChanged {
                page: 2,
                page_size: 10
            }
        );
        assert!(TableState::diff(&after, &after).is_empty());
    }

    #[test]
    fn query_carries_state() {
        let spec = spec();
        let state = state_with_total(40)
            .reduce(&spec, TableCommand::SetSearch("  an ".to_owned()))
            .reduce(&spec, TableCommand::Sort("created_at".to_owned()))
            .reduce(&spec, TableCommand::ChangePage(3));
        let query = state.query();
        assert_eq!(query.search.as_deref(), Some("an"));
        assert_eq!(query.search_column.as_deref(), Some("full_name"));
        assert_eq!(query.sort_column.as_deref(), Some("created_at"));
        assert_eq!(query.sort_direction, Some(SortDirection::Asc));
        assert_eq!(query.page, 3);
        assert_eq!(query.limit, 10);
    }

    #[test]
    fn spec_rejects_duplicate_and_unknown_keys() {
        let duplicate = TableSpec::for_rows::<User>(vec![
            Column::new("email", "Email"),
            Column::new("email", "Email again"),
        ]);
        assert_eq!(duplicate, Err(SpecError::DuplicateKey("email")));

        let unknown = TableSpec::for_rows::<User>(vec![Column::new("slug", "Slug")]);
        assert_eq!(unknown, Err(SpecError::UnknownField("slug")));

        assert_eq!(
            TableSpec::for_rows::<User>(Vec::new()),
            Err(SpecError::Empty)
        );
    }
}
