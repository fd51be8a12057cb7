// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::collections::BTreeMap;

use crate::table::TableRow;

/// Checked rows of a table, keyed by row identifier.
///
/// The set is never derived from the visible page: rows selected on one page
/// stay selected after paging away, and only [`Selection::clear`] (or an
/// unchecked select-all) empties it.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection<T: TableRow> {
    rows: BTreeMap<T::Id, T>,
}

impl<T: TableRow> Default for Selection<T> {
    fn default() -> Self {
        Self {
            rows: BTreeMap::new(),
        }
    }
}

impl<T: TableRow + Clone> Selection<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn select_all(&mut self, visible: &[T], checked: bool) {
        self.rows.clear();
        if checked {
            for row in visible {
                self.rows.insert(row.row_id(), row.clone());
            }
        }
    }

    pub fn toggle(&mut self, row: &T, checked: bool) {
        if checked {
            self.rows.insert(row.row_id(), row.clone());
        } else {
            self.rows.remove(&row.row_id());
        }
    }

    pub fn flip(&mut self, row: &T) {
        let checked = !self.is_selected(row);
        self.toggle(row, checked);
    }

    pub fn is_selected(&self, row: &T) -> bool {
        self.rows.contains_key(&row.row_id())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn is_all_selected(&self, visible_len: usize) -> bool {
        self.len() == visible_len && self.len() > 0
    }

    pub fn is_indeterminate(&self, visible_len: usize) -> bool {
        self.len() > 0 && self.len() < visible_len
    }

    pub fn ids(&self) -> Vec<T::Id> {
        self.rows.keys().cloned().collect()
    }

    pub fn rows(&self) -> Vec<T> {
        self.rows.values().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.rows.clear();
    }
}
