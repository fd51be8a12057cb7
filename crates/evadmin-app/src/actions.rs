// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::table::TableRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ActionVariant {
    #[default]
    Default,
    Destructive,
    Outline,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationConfig {
    pub title: String,
    pub description: String,
    pub confirm_text: String,
    pub cancel_text: String,
}

impl ConfirmationConfig {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            confirm_text: "Confirm".to_owned(),
            cancel_text: "Cancel".to_owned(),
        }
    }

    pub fn confirm_text(mut self, text: impl Into<String>) -> Self {
        self.confirm_text = text.into();
        self
    }

    pub fn cancel_text(mut self, text: impl Into<String>) -> Self {
        self.cancel_text = text.into();
        self
    }
}

/// A per-row action. `disabled` is asked again every time the row is
/// rendered or the action is invoked.
pub struct RowAction<K, T> {
    pub kind: K,
    pub label: &'static str,
    pub icon: Option<&'static str>,
    pub variant: ActionVariant,
    pub confirmation: Option<ConfirmationConfig>,
    pub disabled: Option<fn(&T) -> bool>,
}

impl<K, T> RowAction<K, T> {
    pub fn new(kind: K, label: &'static str) -> Self {
        Self {
            kind,
            label,
            icon: None,
            variant: ActionVariant::Default,
            confirmation: None,
            disabled: None,
        }
    }

    pub fn icon(mut self, icon: &'static str) -> Self {
        self.icon = Some(icon);
        self
    }

    pub fn variant(mut self, variant: ActionVariant) -> Self {
        self.variant = variant;
        self
    }

    pub fn confirm(mut self, confirmation: ConfirmationConfig) -> Self {
        self.confirmation = Some(confirmation);
        self
    }

    pub fn disabled_when(mut self, predicate: fn(&T) -> bool) -> Self {
        self.disabled = Some(predicate);
        self
    }

    pub fn is_disabled(&self, row: &T) -> bool {
        self.disabled.is_some_and(|predicate| predicate(row))
    }
}

/// An action over the current selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableAction<K> {
    pub kind: K,
    pub label: &'static str,
    pub icon: Option<&'static str>,
    pub variant: ActionVariant,
    pub confirmation: Option<ConfirmationConfig>,
}

impl<K> TableAction<K> {
    pub fn new(kind: K, label: &'static str) -> Self {
        Self {
            kind,
            label,
            icon: None,
            variant: ActionVariant::Default,
            confirmation: None,
        }
    }

    pub fn icon(mut self, icon: &'static str) -> Self {
        self.icon = Some(icon);
        self
    }

    pub fn variant(mut self, variant: ActionVariant) -> Self {
        self.variant = variant;
        self
    }

    pub fn confirm(mut self, confirmation: ConfirmationConfig) -> Self {
        self.confirmation = Some(confirmation);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ActionRequest<K, T> {
    Row { kind: K, row: T },
    Bulk { kind: K, rows: Vec<T> },
}

impl<K: Copy, T> ActionRequest<K, T> {
    pub fn kind(&self) -> K {
        match self {
            Self::Row { kind, .. } | Self::Bulk { kind, .. } => *kind,
        }
    }
}

/// A confirmation dialog ready to show. `{row}` in the description is
/// replaced by the row label and `{count}` by the number of rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmationPrompt {
    pub title: String,
    pub description: String,
    pub confirm_text: String,
    pub cancel_text: String,
    pub destructive: bool,
}

impl ConfirmationPrompt {
    fn render(
        config: &ConfirmationConfig,
        variant: ActionVariant,
        row: Option<&str>,
        count: usize,
    ) -> Self {
        let fill = |text: &str| {
            let text = text.replace("{count}", &count.to_string());
            match row {
                Some(label) => text.replace("{row}", label),
                None => text,
            }
        };
        Self {
            title: fill(&config.title),
            description: fill(&config.description),
            confirm_text: config.confirm_text.clone(),
            cancel_text: config.cancel_text.clone(),
            destructive: variant == ActionVariant::Destructive,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch<K, T> {
    Fire(ActionRequest<K, T>),
    Confirm(ConfirmationPrompt),
    Suppressed,
}

/// Routes row and bulk actions, parking at most one request behind a
/// confirmation prompt.
pub struct ActionDispatcher<K, T> {
    row_actions: Vec<RowAction<K, T>>,
    table_actions: Vec<TableAction<K>>,
    pending: Option<ActionRequest<K, T>>,
}

impl<K, T> ActionDispatcher<K, T>
where
    K: Copy + PartialEq,
    T: TableRow + Clone,
{
    pub fn new(row_actions: Vec<RowAction<K, T>>, table_actions: Vec<TableAction<K>>) -> Self {
        Self {
            row_actions,
            table_actions,
            pending: None,
        }
    }

    pub fn row_actions(&self) -> &[RowAction<K, T>] {
        &self.row_actions
    }

    pub fn table_actions(&self) -> &[TableAction<K>] {
        &self.table_actions
    }

    /// Row actions with their disabled flag for `row`, for rendering.
    pub fn row_actions_for<'a>(
        &'a self,
        row: &'a T,
    ) -> impl Iterator<Item = (&'a RowAction<K, T>, bool)> + 'a {
        self.row_actions
            .iter()
            .map(move |action| (action, action.is_disabled(row)))
    }

    pub fn invoke_row(&mut self, kind: K, row: &T) -> Dispatch<K, T> {
        let Some(action) = self.row_actions.iter().find(|action| action.kind == kind) else {
            return Dispatch::Suppressed;
        };
        if action.is_disabled(row) {
            return Dispatch::Suppressed;
        }
        let request = ActionRequest::Row {
            kind,
            row: row.clone(),
        };
        match &action.confirmation {
            None => Dispatch::Fire(request),
            Some(config) => {
                let label = row.row_label();
                let prompt = ConfirmationPrompt::render(config, action.variant, Some(&label), 1);
                self.pending = Some(request);
                Dispatch::Confirm(prompt)
            }
        }
    }

    pub fn invoke_bulk(&mut self, kind: K, rows: Vec<T>) -> Dispatch<K, T> {
        let Some(action) = self
            .table_actions
            .iter()
            .find(|action| action.kind == kind)
        else {
            return Dispatch::Suppressed;
        };
        if rows.is_empty() {
            return Dispatch::Suppressed;
        }
        let count = rows.len();
        let request = ActionRequest::Bulk { kind, rows };
        match &action.confirmation {
            None => Dispatch::Fire(request),
            Some(config) => {
                let prompt = ConfirmationPrompt::render(config, action.variant, None, count);
                self.pending = Some(request);
                Dispatch::Confirm(prompt)
            }
        }
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn confirm(&mut self) -> Option<ActionRequest<K, T>> {
        self.pending.take()
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }
}

#[cfg(test)]
mod tests {
    use super::{
        ActionDispatcher, ActionRequest, ActionVariant, ConfirmationConfig, Dispatch, RowAction,
        TableAction,
    };
    use crate::table::{CellValue, TableRow};

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Kind {
        View,
        Delete,
        Export,
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Row {
        id: u32,
        name: &'static str,
        locked: bool,
    }

    impl TableRow for Row {
        type Id = u32;
        const FIELDS: &'static [&'static str] = &["name"];

        fn row_id(&self) -> u32 {
            self.id
        }

        fn row_label(&self) -> String {
            self.name.to_owned()
        }

        fn field(&self, key: &str) -> Option<CellValue> {
            (key == "name").then(|| CellValue::Text(self.name.to_owned()))
        }
    }

    fn dispatcher() -> ActionDispatcher<Kind, Row> {
        ActionDispatcher::new(
            vec![
                RowAction::new(Kind::View, "View"),
                RowAction::new(Kind::Delete, "Delete")
                    .variant(ActionVariant::Destructive)
                    .confirm(ConfirmationConfig::new(
                        "Delete user",
                        "Delete {row}? This cannot be undone.",
                    ))
                    .disabled_when(|row: &Row| row.locked),
            ],
            vec![
                TableAction::new(Kind::Delete, "Delete selected").confirm(
                    ConfirmationConfig::new("Delete users", "Delete {count} users?")
                        .confirm_text("Delete"),
                ),
                TableAction::new(Kind::Export, "Export"),
            ],
        )
    }

    fn row(id: u32, locked: bool) -> Row {
        Row {
            id,
            name: "Nguyen Van A",
            locked,
        }
    }

    #[test]
    fn action_without_confirmation_fires_immediately() {
        let mut dispatcher = dispatcher();
        let dispatch = dispatcher.invoke_row(Kind::View, &row(1, false));
        assert_eq!(
            dispatch,
            Dispatch::Fire(ActionRequest::Row {
                kind: Kind::View,
                row: row(1, false),
            })
        );
        assert!(!dispatcher.has_pending());
    }

    #[test]
    fn confirmation_parks_request_until_confirmed() {
        let mut dispatcher = dispatcher();
        let Dispatch::Confirm(prompt) = dispatcher.invoke_row(Kind::Delete, &row(1, false)) else {
            panic!("delete should ask for confirmation");
        };
        assert_eq!(prompt.description, "Delete Nguyen Van A? This cannot be undone.");
        assert_eq!(prompt.confirm_text, "Confirm");
        assert_eq!(prompt.cancel_text, "Cancel");
        assert!(prompt.destructive);

        let request = dispatcher.confirm().expect("pending request");
        assert_eq!(request.kind(), Kind::Delete);
        assert!(dispatcher.confirm().is_none());
    }

    #[test]
    fn cancel_drops_pending_request() {
        let mut dispatcher = dispatcher();
        dispatcher.invoke_row(Kind::Delete, &row(1, false));
        dispatcher.cancel();
        assert!(dispatcher.confirm().is_none());
    }

    #[test]
    fn disabled_row_action_is_suppressed_each_call() {
        let mut dispatcher = dispatcher();
        let mut target = row(2, true);
        assert_eq!(
            dispatcher.invoke_row(Kind::Delete, &target),
            Dispatch::Suppressed
        );
        let flags: Vec<bool> = dispatcher
            .row_actions_for(&target)
            .map(|(_, disabled)| disabled)
            .collect();
        assert_eq!(flags, vec![false, true]);

        target.locked = false;
        assert!(matches!(
            dispatcher.invoke_row(Kind::Delete, &target),
            Dispatch::Confirm(_)
        ));
    }

    #[test]
    fn bulk_action_requires_selection() {
        let mut dispatcher = dispatcher();
        assert_eq!(
            dispatcher.invoke_bulk(Kind::Export, Vec::new()),
            Dispatch::Suppressed
        );
        assert!(matches!(
            dispatcher.invoke_bulk(Kind::Export, vec![row(1, false)]),
            Dispatch::Fire(ActionRequest::Bulk { .. })
        ));
    }

    #[test]
    fn bulk_confirmation_counts_rows() {
        let mut dispatcher = dispatcher();
        let Dispatch::Confirm(prompt) =
            dispatcher.invoke_bulk(Kind::Delete, vec![row(1, false), row(2, true)])
        else {
            panic!("bulk delete should ask for confirmation");
        };
        assert_eq!(prompt.description, "Delete 2 users?");
        assert_eq!(prompt.confirm_text, "Delete");
        assert!(!prompt.destructive);
        let Some(ActionRequest::Bulk { rows, .. }) = dispatcher.confirm() else {
            panic!("bulk request should be pending");
        };
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn unknown_action_is_suppressed() {
        let mut dispatcher = dispatcher();
        assert_eq!(
            dispatcher.invoke_row(Kind::Export, &row(1, false)),
            Dispatch::Suppressed
        );
    }
}
