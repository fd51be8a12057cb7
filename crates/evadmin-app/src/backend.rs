// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::collections::BTreeMap;

use anyhow::{Result, bail};

use crate::model::{
    Event, EventDocument, EventDocumentUpdate, EventImage, EventImageUpdate, EventInput,
    NewEventDocument, NewEventImage, SortDirection, User, UserInput,
};
use crate::table::{DEFAULT_PAGE_SIZE, total_pages_for};
use crate::{EventDocumentId, EventId, EventImageId, UserId};

pub const DEFAULT_SORT_COLUMN: &str = "created_at";

/// One page request against a list endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub search: Option<String>,
    pub search_column: Option<String>,
    pub column_filters: BTreeMap<String, String>,
    pub sort_column: Option<String>,
    pub sort_direction: Option<SortDirection>,
    pub page: u32,
    pub limit: u32,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            search: None,
            search_column: None,
            column_filters: BTreeMap::new(),
            sort_column: None,
            sort_direction: None,
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

impl ListQuery {
    pub fn page(page: u32, limit: u32) -> Self {
        Self {
            page,
            limit,
            ..Self::default()
        }
    }

    pub fn effective_page(&self) -> u32 {
        self.page.max(1)
    }

    pub fn effective_limit(&self) -> u32 {
        if self.limit == 0 {
            DEFAULT_PAGE_SIZE
        } else {
            self.limit
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.effective_page() - 1) * u64::from(self.effective_limit())
    }

    /// Search term and column, only when both are present.
    pub fn search_term(&self) -> Option<(&str, &str)> {
        let column = self.search_column.as_deref()?;
        let search = self.search.as_deref()?.trim();
        if search.is_empty() {
            return None;
        }
        Some((column, search))
    }

    pub fn order(&self) -> (&str, SortDirection) {
        match (&self.sort_column, self.sort_direction) {
            (Some(column), direction) => {
                (column.as_str(), direction.unwrap_or(SortDirection::Asc))
            }
            (None, _) => (DEFAULT_SORT_COLUMN, SortDirection::Desc),
        }
    }

    /// Every column name the query will splice into a request must be a
    /// plain identifier.
    pub fn validate_columns(&self, allowed: &[&str]) -> Result<()> {
        let columns = self
            .search_column
            .iter()
            .chain(self.sort_column.iter())
            .chain(self.column_filters.keys());
        for column in columns {
            if !is_plain_identifier(column) {
                bail!("column name {column:?} is not a plain identifier");
            }
            if !allowed.contains(&column.as_str()) {
                bail!("column {column:?} cannot be queried on this table");
            }
        }
        Ok(())
    }
}

pub fn is_plain_identifier(value: &str) -> bool {
    let mut chars = value.chars();
    chars
        .next()
        .is_some_and(|first| first.is_ascii_lowercase() || first == '_')
        && chars.all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '_')
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_count: u64,
    pub current_page: u32,
    pub total_pages: u32,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total_count: u64, query: &ListQuery) -> Self {
        Self {
            items,
            total_count,
            current_page: query.effective_page(),
            total_pages: total_pages_for(total_count, query.effective_limit()),
        }
    }

    pub fn empty(query: &ListQuery) -> Self {
        Self::new(Vec::new(), 0, query)
    }
}

/// Data operations shared by the remote service and the local store.
pub trait AdminBackend {
    fn list_users(&self, query: &ListQuery) -> Result<Page<User>>;
    fn get_user(&self, id: &UserId) -> Result<User>;
    fn create_user(&self, input: &UserInput) -> Result<User>;
    fn update_user(&self, id: &UserId, input: &UserInput) -> Result<User>;
    fn delete_user(&self, id: &UserId) -> Result<()>;
    fn delete_users(&self, ids: &[UserId]) -> Result<()>;

    fn list_events(&self, query: &ListQuery) -> Result<Page<Event>>;
    fn get_event(&self, id: EventId) -> Result<Event>;
    fn get_event_by_slug(&self, slug: &str) -> Result<Event>;
    fn create_event(&self, input: &EventInput) -> Result<Event>;
    fn update_event(&self, id: EventId, input: &EventInput) -> Result<Event>;
    fn delete_event(&self, id: EventId) -> Result<()>;
    fn delete_events(&self, ids: &[EventId]) -> Result<()>;

    fn add_event_image(&self, input: &NewEventImage) -> Result<EventImage>;
    fn update_event_image(&self, id: EventImageId, update: &EventImageUpdate)
    -> Result<EventImage>;
    fn delete_event_image(&self, id: EventImageId) -> Result<()>;

    fn add_event_document(&self, input: &NewEventDocument) -> Result<EventDocument>;
    fn update_event_document(
        &self,
        id: EventDocumentId,
        update: &EventDocumentUpdate,
    ) -> Result<EventDocument>;
    fn delete_event_document(&self, id: EventDocumentId) -> Result<()>;
}

impl<B: AdminBackend + ?Sized> AdminBackend for Box<B> {
    fn list_users(&self, query: &ListQuery) -> Result<Page<User>> {
        (**self).list_users(query)
    }

    fn get_user(&self, id: &UserId) -> Result<User> {
        (**self).get_user(id)
    }

    fn create_user(&self, input: &UserInput) -> Result<User> {
        (**self).create_user(input)
    }

    fn update_user(&self, id: &UserId, input: &UserInput) -> Result<User> {
        (**self).update_user(id, input)
    }

    fn delete_user(&self, id: &UserId) -> Result<()> {
        (**self).delete_user(id)
    }

    fn delete_users(&self, ids: &[UserId]) -> Result<()> {
        (**self).delete_users(ids)
    }

    fn list_events(&self, query: &ListQuery) -> Result<Page<Event>> {
        (**self).list_events(query)
    }

    fn get_event(&self, id: EventId) -> Result<Event> {
        (**self).get_event(id)
    }

    fn get_event_by_slug(&self, slug: &str) -> Result<Event> {
        (**self).get_event_by_slug(slug)
    }

    fn create_event(&self, input: &EventInput) -> Result<Event> {
        (**self).create_event(input)
    }

    fn update_event(&self, id: EventId, input: &EventInput) -> Result<Event> {
        (**self).update_event(id, input)
    }

    fn delete_event(&self, id: EventId) -> Result<()> {
        (**self).delete_event(id)
    }

    fn delete_events(&self, ids: &[EventId]) -> Result<()> {
        (**self).delete_events(ids)
    }

    fn add_event_image(&self, input: &NewEventImage) -> Result<EventImage> {
        (**self).add_event_image(input)
    }

    fn update_event_image(
        &self,
        id: EventImageId,
        update: &EventImageUpdate,
    ) -> Result<EventImage> {
        (**self).update_event_image(id, update)
    }

    fn delete_event_image(&self, id: EventImageId) -> Result<()> {
        (**self).delete_event_image(id)
    }

    fn add_event_document(&self, input: &NewEventDocument) -> Result<EventDocument> {
        (**self).add_event_document(input)
    }

    fn update_event_document(
        &self,
        id: EventDocumentId,
        update: &EventDocumentUpdate,
    ) -> Result<EventDocument> {
        (**self).update_event_document(id, update)
    }

    fn delete_event_document(&self, id: EventDocumentId) -> Result<()> {
        (**self).delete_event_document(id)
    }
}
