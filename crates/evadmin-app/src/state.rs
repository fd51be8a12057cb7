// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::{AppMode, FormKind, FormMode, Screen};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppState {
    pub mode: AppMode,
    pub screen: Screen,
    pub status_line: Option<String>,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            mode: AppMode::SignedOut,
            screen: Screen::Users,
            status_line: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppCommand {
    SignedIn(String),
    SignOut,
    NextScreen,
    PrevScreen,
    SwitchScreen(Screen),
    OpenForm(FormKind, FormMode),
    OpenConfirm,
    OpenImport,
    ExitToNav,
    SetStatus(String),
    ClearStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    ModeChanged(AppMode),
    ScreenChanged(Screen),
    StatusUpdated(String),
    StatusCleared,
}

impl AppState {
    pub fn is_signed_in(&self) -> bool {
        self.mode != AppMode::SignedOut
    }

    pub fn dispatch(&mut self, command: AppCommand) -> Vec<AppEvent> {
        let allowed_signed_out = matches!(
            command,
            AppCommand::SignedIn(_) | AppCommand::SetStatus(_) | AppCommand::ClearStatus
        );
        if !self.is_signed_in() && !allowed_signed_out {
            return Vec::new();
        }
        match command {
            AppCommand::SignedIn(email) => {
                self.mode = AppMode::Nav;
                vec![
                    AppEvent::ModeChanged(self.mode),
                    self.set_status(&format!("signed in as {email}")),
                ]
            }
            AppCommand::SignOut => {
                self.mode = AppMode::SignedOut;
                self.screen = Screen::Users;
                vec![
                    AppEvent::ModeChanged(self.mode),
                    self.set_status("signed out"),
                ]
            }
            AppCommand::NextScreen => self.rotate_screen(1),
            AppCommand::PrevScreen => self.rotate_screen(-1),
            AppCommand::SwitchScreen(screen) => {
                if self.screen == screen {
                    return Vec::new();
                }
                self.screen = screen;
                self.mode = AppMode::Nav;
                vec![AppEvent::ScreenChanged(screen)]
            }
            AppCommand::OpenForm(kind, mode) => {
                self.mode = AppMode::Form(kind, mode);
                vec![AppEvent::ModeChanged(self.mode)]
            }
            AppCommand::OpenConfirm => {
                self.mode = AppMode::Confirm;
                vec![AppEvent::ModeChanged(self.mode)]
            }
            AppCommand::OpenImport => {
                self.mode = AppMode::Import;
                vec![AppEvent::ModeChanged(self.mode)]
            }
            AppCommand::ExitToNav => {
                self.mode = AppMode::Nav;
                vec![AppEvent::ModeChanged(self.mode)]
            }
            AppCommand::SetStatus(message) => vec![self.set_status(&message)],
            AppCommand::ClearStatus => {
                self.status_line = None;
                vec![AppEvent::StatusCleared]
            }
        }
    }

    fn rotate_screen(&mut self, delta: isize) -> Vec<AppEvent> {
        let screens = Screen::ALL;
        let current = screens
            .iter()
            .position(|screen| *screen == self.screen)
            .unwrap_or(0) as isize;
        let len = screens.len() as isize;
        let next = (current + delta).rem_euclid(len) as usize;
        self.screen = screens[next];
        self.mode = AppMode::Nav;
        vec![AppEvent::ScreenChanged(self.screen)]
    }

    fn set_status(&mut self, message: &str) -> AppEvent {
        self.status_line = Some(message.to_owned());
        AppEvent::StatusUpdated(message.to_owned())
    }
}
