// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod form;
mod render;
mod screens;

use anyhow::{Context, Result, anyhow};
use crossterm::event::{self, Event as TermEvent, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::{execute, terminal};
use evadmin_app::{
    ActionRequest, AppCommand, AppMode, AppState, AuthUser, ConfirmationPrompt, Dispatch, Event,
    EventId, EventInput, FormMode, FormPayload, ImportDialog, ImportProgress, ImportReport,
    ListQuery, Page, Screen, SortDirection, TableCommand, TableEvent, User, UserId, UserInput,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;

use form::{FieldKind, FormTarget, FormUiState};
use screens::{ActionKind, ScreenEntity, ScreenView};

/// A write that succeeded, plus a follow-up problem that did not undo it.
#[derive(Debug, Clone, PartialEq)]
pub struct Outcome<T> {
    pub value: T,
    pub warning: Option<String>,
}

impl<T> Outcome<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            warning: None,
        }
    }

    pub fn with_warning(mut self, warning: Option<String>) -> Self {
        self.warning = warning;
        self
    }
}

pub trait AppRuntime {
    /// Operator of a session persisted by an earlier run, if still valid.
    fn restored_user(&mut self) -> Option<AuthUser>;
    fn sign_in(&mut self, email: &str, password: &str) -> Result<AuthUser>;
    fn sign_out(&mut self) -> Result<()>;

    fn list_users(&mut self, query: &ListQuery) -> Result<Page<User>>;
    fn list_events(&mut self, query: &ListQuery) -> Result<Page<Event>>;

    fn create_user(&mut self, input: &UserInput) -> Result<Outcome<User>>;
    fn update_user(&mut self, id: &UserId, input: &UserInput) -> Result<Outcome<User>>;
    fn delete_users(&mut self, ids: &[UserId]) -> Result<Outcome<()>>;

    fn create_event(&mut self, input: &EventInput) -> Result<Event>;
    fn update_event(&mut self, id: EventId, input: &EventInput) -> Result<Event>;
    fn delete_events(&mut self, ids: &[EventId]) -> Result<()>;

    /// Uploads a local image and returns its public URL.
    fn upload_avatar(&mut self, path: &Path) -> Result<String>;
    fn import_users(
        &mut self,
        path: &Path,
        progress: &mut dyn FnMut(ImportProgress),
    ) -> Result<ImportReport>;
    /// Writes the import template and returns where it went.
    fn write_template(&mut self) -> Result<PathBuf>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InternalEvent {
    ClearStatus { token: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
struct LoginUiState {
    email: String,
    password: String,
    password_focused: bool,
    error: Option<String>,
}

struct ViewData {
    users: ScreenView<User>,
    events: ScreenView<Event>,
    login: LoginUiState,
    form: Option<FormUiState>,
    confirm: Option<ConfirmationPrompt>,
    import: ImportDialog,
    pending_import: bool,
    search_prompt: Option<String>,
    help_visible: bool,
    signed_in_as: Option<String>,
    status_token: u64,
}

impl ViewData {
    fn new(page_size: u32) -> Result<Self> {
        Ok(Self {
            users: screens::user_screen(page_size)?,
            events: screens::event_screen(page_size)?,
            login: LoginUiState::default(),
            form: None,
            confirm: None,
            import: ImportDialog::default(),
            pending_import: false,
            search_prompt: None,
            help_visible: false,
            signed_in_as: None,
            status_token: 0,
        })
    }

    fn forget_session(&mut self) {
        self.users.loaded = false;
        self.users.items.clear();
        self.users.selection.clear();
        self.events.loaded = false;
        self.events.items.clear();
        self.events.selection.clear();
        self.form = None;
        self.confirm = None;
        self.import = ImportDialog::default();
        self.search_prompt = None;
        self.signed_in_as = None;
        self.login = LoginUiState::default();
    }
}

pub fn run_app<R: AppRuntime>(state: &mut AppState, runtime: &mut R, page_size: u32) -> Result<()> {
    let mut view_data = ViewData::new(page_size)?;
    let (internal_tx, internal_rx) = mpsc::channel();

    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, terminal::EnterAlternateScreen).context("enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;

    if let Some(user) = runtime.restored_user() {
        complete_sign_in(state, runtime, &mut view_data, &internal_tx, user);
    }

    let mut result = Ok(());
    loop {
        process_internal_events(state, &mut view_data, &internal_rx);

        if let Err(error) = terminal.draw(|frame| render::render(frame, state, &view_data)) {
            result = Err(error).context("draw frame");
            break;
        }

        if view_data.pending_import {
            let mut redraw = |state: &AppState, view_data: &ViewData| {
                if let Err(error) = terminal.draw(|frame| render::render(frame, state, view_data)) {
                    tracing::warn!(%error, "redraw during import failed");
                }
            };
            run_pending_import(state, runtime, &mut view_data, &internal_tx, &mut redraw);
            continue;
        }

        let has_event = event::poll(Duration::from_millis(120)).context("poll event")?;
        if has_event {
            match event::read().context("read event")? {
                TermEvent::Key(key) => {
                    if handle_key_event(state, runtime, &mut view_data, &internal_tx, key) {
                        break;
                    }
                }
                TermEvent::Resize(_, _) => {}
                _ => {}
            }
        }
    }

    disable_raw_mode().context("disable raw mode")?;
    execute!(io::stdout(), terminal::LeaveAlternateScreen).context("leave alternate screen")?;
    result
}

fn process_internal_events(
    state: &mut AppState,
    view_data: &mut ViewData,
    rx: &Receiver<InternalEvent>,
) {
    while let Ok(event) = rx.try_recv() {
        match event {
            InternalEvent::ClearStatus { token } if token == view_data.status_token => {
                state.dispatch(AppCommand::ClearStatus);
            }
            InternalEvent::ClearStatus { .. } => {}
        }
    }
}

fn schedule_status_clear(internal_tx: &Sender<InternalEvent>, token: u64) {
    let sender = internal_tx.clone();
    thread::spawn(move || {
        thread::sleep(Duration::from_secs(4));
        let _ = sender.send(InternalEvent::ClearStatus { token });
    });
}

fn emit_status(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    message: impl Into<String>,
) {
    state.dispatch(AppCommand::SetStatus(message.into()));
    view_data.status_token = view_data.status_token.saturating_add(1);
    schedule_status_clear(internal_tx, view_data.status_token);
}

fn handle_key_event<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    if key.code == KeyCode::Char('q') && key.modifiers.contains(KeyModifiers::CONTROL) {
        return true;
    }

    if view_data.help_visible {
        if matches!(key.code, KeyCode::Esc | KeyCode::Char('?')) {
            view_data.help_visible = false;
        }
        return false;
    }

    match state.mode {
        AppMode::SignedOut => handle_login_key(state, runtime, view_data, internal_tx, key),
        AppMode::Form(..) => handle_form_key(state, runtime, view_data, internal_tx, key),
        AppMode::Confirm => handle_confirm_key(state, runtime, view_data, internal_tx, key),
        AppMode::Import => handle_import_key(state, runtime, view_data, internal_tx, key),
        AppMode::Nav if view_data.search_prompt.is_some() => {
            handle_search_key(state, runtime, view_data, internal_tx, key);
        }
        AppMode::Nav => handle_nav_key(state, runtime, view_data, internal_tx, key),
    }
    false
}

fn handle_login_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    let login = &mut view_data.login;
    match key.code {
        KeyCode::Tab | KeyCode::BackTab | KeyCode::Up | KeyCode::Down => {
            login.password_focused = !login.password_focused;
        }
        KeyCode::Backspace => {
            if login.password_focused {
                login.password.pop();
            } else {
                login.email.pop();
            }
        }
        KeyCode::Char(ch) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
            if login.password_focused {
                login.password.push(ch);
            } else {
                login.email.push(ch);
            }
            login.error = None;
        }
        KeyCode::Enter => {
            let email = login.email.trim().to_owned();
            if email.is_empty() || login.password.is_empty() {
                login.error = Some("enter email and password".to_owned());
                return;
            }
            let password = std::mem::take(&mut login.password);
            match runtime.sign_in(&email, &password) {
                Ok(user) => complete_sign_in(state, runtime, view_data, internal_tx, user),
                Err(error) => {
                    tracing::info!(%email, error = %format!("{error:#}"), "sign-in rejected");
                    view_data.login.error = Some(format!("{error:#}"));
                    view_data.login.password_focused = true;
                }
            }
        }
        _ => {}
    }
}

fn complete_sign_in<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    user: AuthUser,
) {
    view_data.login = LoginUiState::default();
    view_data.signed_in_as = Some(user.email.clone());
    state.dispatch(AppCommand::SignedIn(user.email.clone()));
    emit_status(
        state,
        view_data,
        internal_tx,
        format!("signed in as {}", user.email),
    );
    refresh_current(state, runtime, view_data, internal_tx);
}

fn sign_out<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    if let Err(error) = runtime.sign_out() {
        tracing::warn!(error = %format!("{error:#}"), "sign-out failed; dropping local session");
    }
    view_data.forget_session();
    state.dispatch(AppCommand::SignOut);
    emit_status(state, view_data, internal_tx, "signed out");
}

fn handle_nav_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return;
    }
    match key.code {
        KeyCode::Tab | KeyCode::Char('f') => {
            switch_screen(state, runtime, view_data, internal_tx, AppCommand::NextScreen);
        }
        KeyCode::BackTab | KeyCode::Char('b') => {
            switch_screen(state, runtime, view_data, internal_tx, AppCommand::PrevScreen);
        }
        KeyCode::Char('?') => view_data.help_visible = true,
        KeyCode::Char('o') => sign_out(state, runtime, view_data, internal_tx),
        KeyCode::Char('r') => {
            refresh_current(state, runtime, view_data, internal_tx);
            emit_status(state, view_data, internal_tx, "reloaded");
        }
        KeyCode::Char('i') => {
            if state.screen == Screen::Users {
                view_data.import = ImportDialog::default();
                state.dispatch(AppCommand::OpenImport);
            } else {
                emit_status(
                    state,
                    view_data,
                    internal_tx,
                    "import is only available on the users screen",
                );
            }
        }
        KeyCode::Char('/') => {
            let current = match state.screen {
                Screen::Users => view_data.users.table.filters.search.clone(),
                Screen::Events => view_data.events.table.filters.search.clone(),
            };
            view_data.search_prompt = Some(current);
        }
        _ => match state.screen {
            Screen::Users => {
                handle_screen_key::<User, R>(state, runtime, view_data, internal_tx, key);
            }
            Screen::Events => {
                handle_screen_key::<Event, R>(state, runtime, view_data, internal_tx, key);
            }
        },
    }
}

fn switch_screen<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    command: AppCommand,
) {
    if !state.dispatch(command).is_empty() {
        refresh_current(state, runtime, view_data, internal_tx);
    }
}

fn handle_screen_key<T: ScreenEntity, R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    if let Some(command) = table_command_for_key(T::screen(view_data), key) {
        apply_table_command::<T, R>(state, runtime, view_data, internal_tx, command);
        return;
    }

    match key.code {
        KeyCode::Char('j') | KeyCode::Down => T::screen_mut(view_data).move_cursor(1),
        KeyCode::Char('k') | KeyCode::Up => T::screen_mut(view_data).move_cursor(-1),
        KeyCode::Char('g') | KeyCode::Home => T::screen_mut(view_data).cursor = 0,
        KeyCode::Char('G') | KeyCode::End => T::screen_mut(view_data).move_cursor(isize::MAX),
        KeyCode::Char('h') | KeyCode::Left => T::screen_mut(view_data).move_column(-1),
        KeyCode::Char('l') | KeyCode::Right => T::screen_mut(view_data).move_column(1),
        KeyCode::Char(' ') | KeyCode::Char('x') => T::screen_mut(view_data).toggle_current(),
        KeyCode::Char('X') => T::screen_mut(view_data).toggle_all(),
        KeyCode::Char('n') => {
            let form = FormUiState::new(
                FormPayload::blank_for(T::FORM),
                FormMode::Create,
                FormTarget::New,
            );
            open_form(state, view_data, form);
        }
        KeyCode::Enter => {
            invoke_row_action::<T, R>(state, runtime, view_data, internal_tx, ActionKind::View);
        }
        KeyCode::Char('e') => {
            invoke_row_action::<T, R>(state, runtime, view_data, internal_tx, ActionKind::Edit);
        }
        KeyCode::Char('d') => {
            invoke_row_action::<T, R>(state, runtime, view_data, internal_tx, ActionKind::Delete);
        }
        KeyCode::Char('D') => {
            let screen = T::screen_mut(view_data);
            let rows = screen.selection.rows();
            let dispatch = screen.dispatcher.invoke_bulk(ActionKind::DeleteSelected, rows);
            if matches!(dispatch, Dispatch::Suppressed) {
                emit_status(state, view_data, internal_tx, "select rows first (space or X)");
                return;
            }
            handle_dispatch::<T, R>(state, runtime, view_data, internal_tx, dispatch);
        }
        _ => {}
    }
}

fn table_command_for_key<T: ScreenEntity>(
    screen: &ScreenView<T>,
    key: KeyEvent,
) -> Option<TableCommand> {
    let column_key = || screen.current_column().map(|column| column.key.to_owned());
    match key.code {
        KeyCode::Char('s') => column_key().map(TableCommand::Sort),
        KeyCode::Char('<') => {
            column_key().map(|column| TableCommand::SetSort(column, SortDirection::Asc))
        }
        KeyCode::Char('>') => {
            column_key().map(|column| TableCommand::SetSort(column, SortDirection::Desc))
        }
        KeyCode::Char('S') => Some(TableCommand::ClearSort),
        KeyCode::Char('c') => screen.next_search_column_command(),
        KeyCode::Char('F') => screen.next_filter_command(),
        KeyCode::Char('C') => Some(TableCommand::ClearAllColumnFilters),
        KeyCode::Char(']') | KeyCode::PageDown => Some(TableCommand::NextPage),
        KeyCode::Char('[') | KeyCode::PageUp => Some(TableCommand::PrevPage),
        KeyCode::Char('{') => Some(TableCommand::FirstPage),
        KeyCode::Char('}') => Some(TableCommand::LastPage),
        KeyCode::Char('z') => Some(screen.next_page_size_command()),
        _ => None,
    }
}

fn apply_table_command<T: ScreenEntity, R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    command: TableCommand,
) {
    let is_sort = matches!(command, TableCommand::Sort(_) | TableCommand::SetSort(..));
    let events = T::screen_mut(view_data).apply(command);
    if events.is_empty() {
        if is_sort {
            emit_status(state, view_data, internal_tx, "column is not sortable");
        }
        return;
    }
    for event in &events {
        if let TableEvent::SortChanged(sort) = event {
            let message = match sort {
                Some(sort) => format!("sort: {} {}", sort.key, sort.direction.as_str()),
                None => "sort cleared".to_owned(),
            };
            emit_status(state, view_data, internal_tx, message);
        }
    }
    refresh_screen::<T, R>(state, runtime, view_data, internal_tx);
}

fn handle_search_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    let Some(buffer) = view_data.search_prompt.as_mut() else {
        return;
    };
    match key.code {
        KeyCode::Backspace => {
            buffer.pop();
        }
        KeyCode::Char(ch) if !key.modifiers.contains(KeyModifiers::CONTROL) => buffer.push(ch),
        KeyCode::Esc => view_data.search_prompt = None,
        KeyCode::Enter => {
            let text = view_data.search_prompt.take().unwrap_or_default();
            let command = TableCommand::SetSearch(text);
            match state.screen {
                Screen::Users => {
                    apply_table_command::<User, R>(state, runtime, view_data, internal_tx, command);
                }
                Screen::Events => {
                    apply_table_command::<Event, R>(state, runtime, view_data, internal_tx, command);
                }
            }
        }
        _ => {}
    }
}

fn refresh_current<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    match state.screen {
        Screen::Users => refresh_screen::<User, R>(state, runtime, view_data, internal_tx),
        Screen::Events => refresh_screen::<Event, R>(state, runtime, view_data, internal_tx),
    }
}

/// Fetches the screen's current page. A page that fell out of range after
/// the total shrank is fetched once more at the clamped position.
fn refresh_screen<T: ScreenEntity, R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    for _ in 0..2 {
        let query = T::screen(view_data).table.query();
        match T::fetch(runtime, &query) {
            Ok(page) => {
                if !T::screen_mut(view_data).load(page) {
                    return;
                }
            }
            Err(error) => {
                tracing::warn!(noun = T::NOUN, error = %format!("{error:#}"), "list failed");
                emit_status(
                    state,
                    view_data,
                    internal_tx,
                    format!("load {}s failed: {error:#}", T::NOUN),
                );
                return;
            }
        }
    }
}

fn invoke_row_action<T: ScreenEntity, R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    kind: ActionKind,
) {
    let screen = T::screen_mut(view_data);
    let Some(row) = screen.current_row().cloned() else {
        emit_status(state, view_data, internal_tx, format!("no {} on this page", T::NOUN));
        return;
    };
    let dispatch = screen.dispatcher.invoke_row(kind, &row);
    handle_dispatch::<T, R>(state, runtime, view_data, internal_tx, dispatch);
}

fn handle_dispatch<T: ScreenEntity, R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    dispatch: Dispatch<ActionKind, T>,
) {
    match dispatch {
        Dispatch::Fire(request) => {
            run_action_request::<T, R>(state, runtime, view_data, internal_tx, request);
        }
        Dispatch::Confirm(prompt) => {
            view_data.confirm = Some(prompt);
            state.dispatch(AppCommand::OpenConfirm);
        }
        Dispatch::Suppressed => emit_status(state, view_data, internal_tx, "action unavailable"),
    }
}

fn run_action_request<T: ScreenEntity, R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    request: ActionRequest<ActionKind, T>,
) {
    match request {
        ActionRequest::Row {
            kind: ActionKind::View,
            row,
        } => open_row_form(state, view_data, &row, FormMode::View),
        ActionRequest::Row {
            kind: ActionKind::Edit,
            row,
        } => open_row_form(state, view_data, &row, FormMode::Update),
        ActionRequest::Row { row, .. } => {
            delete_rows::<T, R>(state, runtime, view_data, internal_tx, vec![row]);
        }
        ActionRequest::Bulk { rows, .. } => {
            delete_rows::<T, R>(state, runtime, view_data, internal_tx, rows);
        }
    }
}

fn delete_rows<T: ScreenEntity, R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    rows: Vec<T>,
) {
    match T::delete(runtime, &rows) {
        Ok(warning) => {
            let screen = T::screen_mut(view_data);
            for row in &rows {
                screen.selection.toggle(row, false);
            }
            let mut message = format!("deleted {} {}(s)", rows.len(), T::NOUN);
            if let Some(warning) = warning {
                message.push_str(&format!("; {warning}"));
            }
            emit_status(state, view_data, internal_tx, message);
            refresh_screen::<T, R>(state, runtime, view_data, internal_tx);
        }
        Err(error) => {
            tracing::warn!(noun = T::NOUN, error = %format!("{error:#}"), "delete failed");
            emit_status(
                state,
                view_data,
                internal_tx,
                format!("delete failed: {error:#}"),
            );
        }
    }
}

fn open_form(state: &mut AppState, view_data: &mut ViewData, form: FormUiState) {
    let (kind, mode) = (form.kind(), form.mode);
    view_data.form = Some(form);
    state.dispatch(AppCommand::OpenForm(kind, mode));
}

fn open_row_form<T: ScreenEntity>(
    state: &mut AppState,
    view_data: &mut ViewData,
    row: &T,
    mode: FormMode,
) {
    let form = FormUiState::new(row.form_payload(), mode, row.form_target());
    open_form(state, view_data, form);
}

fn close_form(state: &mut AppState, view_data: &mut ViewData) {
    view_data.form = None;
    state.dispatch(AppCommand::ExitToNav);
}

fn handle_form_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    let Some(form) = view_data.form.as_mut() else {
        state.dispatch(AppCommand::ExitToNav);
        return;
    };
    let control = key.modifiers.contains(KeyModifiers::CONTROL);
    match key.code {
        KeyCode::Esc => close_form(state, view_data),
        KeyCode::Char('s') if control => submit_form(state, runtime, view_data, internal_tx),
        KeyCode::Char('u') if control => upload_form_avatar(state, runtime, view_data, internal_tx),
        KeyCode::Enter if form.is_read_only() => close_form(state, view_data),
        KeyCode::Enter => submit_form(state, runtime, view_data, internal_tx),
        KeyCode::Tab | KeyCode::Down => form.move_field(1),
        KeyCode::BackTab | KeyCode::Up => form.move_field(-1),
        KeyCode::Backspace => {
            form.backspace();
        }
        KeyCode::Char(' ')
            if form
                .current_spec()
                .is_some_and(|spec| spec.kind == FieldKind::Flag) =>
        {
            form.toggle_flag();
        }
        KeyCode::Char(ch) if !control => {
            form.insert_char(ch);
        }
        _ => {}
    }
}

fn submit_form<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let Some(form) = view_data.form.as_mut() else {
        return;
    };
    if form.is_read_only() {
        close_form(state, view_data);
        return;
    }

    let result: Result<(String, Option<String>)> = match (&form.payload, &form.target) {
        (FormPayload::User(input), FormTarget::New) => input
            .to_input()
            .and_then(|input| runtime.create_user(&input))
            .map(|outcome| (format!("created user {}", outcome.value.email), outcome.warning)),
        (FormPayload::User(input), FormTarget::User(id)) => input
            .to_input()
            .and_then(|input| runtime.update_user(id, &input))
            .map(|outcome| (format!("updated user {}", outcome.value.email), outcome.warning)),
        (FormPayload::Event(input), FormTarget::New) => input
            .to_input()
            .and_then(|input| runtime.create_event(&input))
            .map(|event| (format!("created event {}", event.slug), None)),
        (FormPayload::Event(input), FormTarget::Event(id)) => input
            .to_input()
            .and_then(|input| runtime.update_event(*id, &input))
            .map(|event| (format!("updated event {}", event.slug), None)),
        _ => Err(anyhow!("form does not match the row it edits")),
    };

    match result {
        Ok((message, warning)) => {
            close_form(state, view_data);
            let message = match warning {
                Some(warning) => format!("{message}; {warning}"),
                None => message,
            };
            emit_status(state, view_data, internal_tx, message);
            refresh_current(state, runtime, view_data, internal_tx);
        }
        Err(error) => {
            form.error = Some(format!("{error:#}"));
            emit_status(state, view_data, internal_tx, "fix the form and retry");
        }
    }
}

fn upload_form_avatar<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let Some(form) = view_data.form.as_mut() else {
        return;
    };
    let Some(path) = form.avatar_path() else {
        emit_status(
            state,
            view_data,
            internal_tx,
            "type a local image path into the avatar field first",
        );
        return;
    };
    let outcome = runtime
        .upload_avatar(Path::new(&path))
        .map_err(|error| format!("avatar upload failed: {error:#}"));
    let message = match &outcome {
        Ok(_) => "avatar uploaded".to_owned(),
        Err(error) => error.clone(),
    };
    form.apply_avatar_upload(outcome);
    emit_status(state, view_data, internal_tx, message);
}

fn handle_confirm_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    match key.code {
        KeyCode::Char('y') | KeyCode::Enter => {
            view_data.confirm = None;
            state.dispatch(AppCommand::ExitToNav);
            match state.screen {
                Screen::Users => confirm_pending::<User, R>(state, runtime, view_data, internal_tx),
                Screen::Events => {
                    confirm_pending::<Event, R>(state, runtime, view_data, internal_tx);
                }
            }
        }
        KeyCode::Char('n') | KeyCode::Esc => {
            view_data.confirm = None;
            view_data.users.dispatcher.cancel();
            view_data.events.dispatcher.cancel();
            state.dispatch(AppCommand::ExitToNav);
            emit_status(state, view_data, internal_tx, "cancelled");
        }
        _ => {}
    }
}

fn confirm_pending<T: ScreenEntity, R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    if let Some(request) = T::screen_mut(view_data).dispatcher.confirm() {
        run_action_request::<T, R>(state, runtime, view_data, internal_tx, request);
    }
}

fn handle_import_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    let control = key.modifiers.contains(KeyModifiers::CONTROL);
    let editable = !view_data.import.is_importing() && view_data.import.report().is_none();
    match key.code {
        KeyCode::Char('t') if control => {
            let message = match runtime.write_template() {
                Ok(path) => format!("template written to {}", path.display()),
                Err(error) => format!("template failed: {error:#}"),
            };
            emit_status(state, view_data, internal_tx, message);
        }
        KeyCode::Esc => close_import(state, view_data, internal_tx),
        KeyCode::Enter if view_data.import.report().is_some() => {
            close_import(state, view_data, internal_tx);
        }
        KeyCode::Enter => {
            let path = PathBuf::from(view_data.import.path_input.trim());
            match view_data.import.choose_file(path) {
                Ok(()) => view_data.pending_import = true,
                Err(error) => {
                    emit_status(state, view_data, internal_tx, format!("{error:#}"));
                }
            }
        }
        KeyCode::Backspace if editable => {
            view_data.import.path_input.pop();
        }
        KeyCode::Char(ch) if editable && !control => view_data.import.path_input.push(ch),
        _ => {}
    }
}

fn close_import(state: &mut AppState, view_data: &mut ViewData, internal_tx: &Sender<InternalEvent>) {
    if view_data.import.close() {
        state.dispatch(AppCommand::ExitToNav);
    } else {
        emit_status(state, view_data, internal_tx, "import still running");
    }
}

/// Runs the import chosen in the dialog. `redraw` is called after every
/// progress step so the dialog stays live while rows are written.
fn run_pending_import<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    redraw: &mut dyn FnMut(&AppState, &ViewData),
) {
    view_data.pending_import = false;
    let path = match view_data.import.start() {
        Ok(path) => path,
        Err(error) => {
            emit_status(state, view_data, internal_tx, format!("{error:#}"));
            return;
        }
    };
    redraw(state, view_data);

    let outcome = {
        let state = &*state;
        let mut on_progress = |progress: ImportProgress| {
            view_data.import.progress(progress);
            redraw(state, view_data);
        };
        runtime.import_users(&path, &mut on_progress)
    };

    let (message, imported) = match &outcome {
        Ok(report) => (report.summary(), report.success > 0),
        Err(error) => (format!("import failed: {error:#}"), false),
    };
    view_data.import.finish(outcome);
    emit_status(state, view_data, internal_tx, message);
    if imported {
        refresh_screen::<User, R>(state, runtime, view_data, internal_tx);
    }
}
