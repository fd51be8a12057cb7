// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use evadmin_app::{AuthProvider, AuthUser, Session};
use rusqlite::{OptionalExtension, params};
use time::{Duration, OffsetDateTime};

use crate::{Store, checksum_sha256, format_timestamp, now_timestamp, parse_timestamp};

/// Lifetime of a locally issued session.
pub const SESSION_TTL: Duration = Duration::hours(8);

impl Store {
    /// Creates or resets a local operator account. Only the password's
    /// SHA-256 is kept.
    pub fn seed_operator(&self, email: &str, password: &str) -> Result<AuthUser> {
        let email = email.trim().to_lowercase();
        if email.is_empty() || password.is_empty() {
            bail!("operator email and password must not be empty");
        }
        let id = self.new_user_id()?;
        self.conn
            .execute(
                "
                INSERT INTO operators (id, email, password_sha256, created_at)
                VALUES (?, ?, ?, ?)
                ON CONFLICT (email) DO UPDATE SET password_sha256 = excluded.password_sha256
                ",
                params![id, email, checksum_sha256(password.as_bytes()), now_timestamp()?],
            )
            .with_context(|| format!("seed operator {email}"))?;
        self.operator_by_email(&email)?
            .ok_or_else(|| anyhow!("operator {email} missing after seeding"))
    }

    pub fn save_session(&self, session: &Session) -> Result<()> {
        self.conn
            .execute(
                "
                INSERT OR REPLACE INTO sessions (
                  id, access_token, refresh_token, expires_at, user_id, user_email
                ) VALUES (1, ?, ?, ?, ?, ?)
                ",
                params![
                    session.access_token,
                    session.refresh_token,
                    format_timestamp(session.expires_at)?,
                    session.user.id,
                    session.user.email,
                ],
            )
            .context("save session")?;
        tracing::debug!(user = %session.user.email, "session saved");
        Ok(())
    }

    pub fn load_session(&self) -> Result<Option<Session>> {
        let row = self
            .conn
            .query_row(
                "
                SELECT access_token, refresh_token, expires_at, user_id, user_email
                FROM sessions
                WHERE id = 1
                ",
                [],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                },
            )
            .optional()
            .context("load session")?;

        let Some((access_token, refresh_token, expires_at, user_id, user_email)) = row else {
            return Ok(None);
        };
        Ok(Some(Session {
            access_token,
            refresh_token,
            expires_at: parse_timestamp(&expires_at)?,
            user: AuthUser {
                id: user_id,
                email: user_email,
            },
        }))
    }

    pub fn clear_session(&self) -> Result<()> {
        self.conn
            .execute("DELETE FROM sessions", [])
            .context("clear session")?;
        Ok(())
    }

    fn operator_by_email(&self, email: &str) -> Result<Option<AuthUser>> {
        self.conn
            .query_row(
                "SELECT id, email FROM operators WHERE email = ?",
                params![email],
                |row| {
                    Ok(AuthUser {
                        id: row.get(0)?,
                        email: row.get(1)?,
                    })
                },
            )
            .optional()
            .with_context(|| format!("load operator {email}"))
    }

    fn random_token(&self) -> Result<String> {
        self.conn
            .query_row("SELECT lower(hex(randomblob(32)))", [], |row| row.get(0))
            .context("generate session token")
    }
}

impl AuthProvider for Store {
    fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let email = email.trim().to_lowercase();
        let stored: Option<(String, String)> = self
            .conn
            .query_row(
                "SELECT id, password_sha256 FROM operators WHERE email = ?",
                params![email],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()
            .with_context(|| format!("load operator {email}"))?;

        let Some((id, password_sha256)) = stored else {
            tracing::warn!(%email, "sign-in for unknown operator");
            bail!("invalid login credentials");
        };
        if password_sha256 != checksum_sha256(password.as_bytes()) {
            tracing::warn!(%email, "sign-in with wrong password");
            bail!("invalid login credentials");
        }

        tracing::info!(%email, "signed in locally");
        Ok(Session {
            access_token: self.random_token()?,
            refresh_token: self.random_token()?,
            expires_at: OffsetDateTime::now_utc() + SESSION_TTL,
            user: AuthUser { id, email },
        })
    }

    fn sign_out(&self, session: &Session) -> Result<()> {
        self.conn
            .execute(
                "DELETE FROM sessions WHERE access_token = ?",
                params![session.access_token],
            )
            .context("sign out")?;
        tracing::info!(email = %session.user.email, "signed out locally");
        Ok(())
    }

    fn current_user(&self, session: &Session) -> Result<AuthUser> {
        if session.is_expired(OffsetDateTime::now_utc()) {
            bail!("session expired -- sign in again");
        }
        self.operator_by_email(&session.user.email)?
            .filter(|operator| operator.id == session.user.id)
            .ok_or_else(|| anyhow!("operator {} no longer exists", session.user.email))
    }
}
