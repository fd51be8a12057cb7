// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    pub email: String,
}

/// A signed-in operator session as returned by the auth endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
    pub user: AuthUser,
}

impl Session {
    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        now >= self.expires_at
    }
}

/// Sign-in and sign-out against whatever issues sessions.
pub trait AuthProvider {
    fn sign_in(&self, email: &str, password: &str) -> Result<Session>;
    fn sign_out(&self, session: &Session) -> Result<()>;
    fn current_user(&self, session: &Session) -> Result<AuthUser>;
}

impl<A: AuthProvider + ?Sized> AuthProvider for Box<A> {
    fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        (**self).sign_in(email, password)
    }

    fn sign_out(&self, session: &Session) -> Result<()> {
        (**self).sign_out(session)
    }

    fn current_user(&self, session: &Session) -> Result<AuthUser> {
        (**self).current_user(session)
    }
}

/// The session handed down to every screen. There is no global: whoever
/// owns the dashboard owns this value.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionContext {
    session: Option<Session>,
}

impl SessionContext {
    /// Restores a persisted session, dropping it if it has already expired.
    pub fn init(persisted: Option<Session>, now: OffsetDateTime) -> Self {
        Self {
            session: persisted.filter(|session| !session.is_expired(now)),
        }
    }

    pub fn begin(&mut self, session: Session) {
        self.session = Some(session);
    }

    pub fn end(&mut self) -> Option<Session> {
        self.session.take()
    }

    pub fn current(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn is_signed_in(&self) -> bool {
        self.session.is_some()
    }

    pub fn require(&self) -> Result<&Session> {
        self.session
            .as_ref()
            .ok_or_else(|| anyhow!("not signed in -- sign in and retry"))
    }

    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        self.session
            .as_ref()
            .is_some_and(|session| session.is_expired(now))
    }
}
