// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Local SQLite store. Serves the same list/CRUD contract as the hosted
//! service for `--demo` runs and tests, and keeps the signed-in session
//! between runs.

mod auth;

pub use auth::SESSION_TTL;

use anyhow::{Context, Result, anyhow, bail};
use evadmin_app::validation::parse_bool;
use evadmin_app::{
    AdminBackend, Event, EventDocument, EventDocumentId, EventDocumentUpdate, EventId,
    EventImage, EventImageId, EventImageUpdate, EventInput, ListQuery, NewEventDocument,
    NewEventImage, Page, SortDirection, TableRow, User, UserId, UserInput,
};
use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use serde_json::Map;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime, UtcOffset};

pub const APP_NAME: &str = "evadmin";

const REQUIRED_SCHEMA: &[(&str, &[&str])] = &[
    (
        "users",
        &[
            "id",
            "full_name",
            "email",
            "position",
            "avatar_image_url",
            "metadata",
            "created_at",
            "updated_at",
        ],
    ),
    (
        "events",
        &[
            "id",
            "slug",
            "title",
            "description",
            "banner_image_url",
            "from_date",
            "to_date",
            "is_public",
            "user_ids",
            "created_at",
            "updated_at",
        ],
    ),
    (
        "event_images",
        &[
            "id",
            "event_id",
            "raw_image_url",
            "processed_image_url",
            "metadata",
            "created_at",
            "updated_at",
        ],
    ),
    (
        "event_documents",
        &[
            "id",
            "event_id",
            "title",
            "description",
            "document_url",
            "metadata",
            "created_at",
            "updated_at",
        ],
    ),
    ("operators", &["id", "email", "password_sha256", "created_at"]),
    (
        "sessions",
        &[
            "id",
            "access_token",
            "refresh_token",
            "expires_at",
            "user_id",
            "user_email",
        ],
    ),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RequiredIndex {
    name: &'static str,
    create_sql: &'static str,
}

const REQUIRED_INDEXES: &[RequiredIndex] = &[
    RequiredIndex {
        name: "idx_users_email",
        create_sql: "CREATE UNIQUE INDEX IF NOT EXISTS idx_users_email ON users (email);",
    },
    RequiredIndex {
        name: "idx_users_created_at",
        create_sql: "CREATE INDEX IF NOT EXISTS idx_users_created_at ON users (created_at);",
    },
    RequiredIndex {
        name: "idx_events_slug",
        create_sql: "CREATE UNIQUE INDEX IF NOT EXISTS idx_events_slug ON events (slug);",
    },
    RequiredIndex {
        name: "idx_events_created_at",
        create_sql: "CREATE INDEX IF NOT EXISTS idx_events_created_at ON events (created_at);",
    },
    RequiredIndex {
        name: "idx_event_images_event_id",
        create_sql: "CREATE INDEX IF NOT EXISTS idx_event_images_event_id ON event_images (event_id);",
    },
    RequiredIndex {
        name: "idx_event_documents_event_id",
        create_sql: "CREATE INDEX IF NOT EXISTS idx_event_documents_event_id ON event_documents (event_id);",
    },
    RequiredIndex {
        name: "idx_operators_email",
        create_sql: "CREATE UNIQUE INDEX IF NOT EXISTS idx_operators_email ON operators (email);",
    },
];

/// How a listable table maps onto SQL: which columns to select and how
/// filter values must be typed before comparing.
struct ListTable {
    name: &'static str,
    select: &'static str,
    fields: &'static [&'static str],
    flag_columns: &'static [&'static str],
    integer_columns: &'static [&'static str],
}

const USERS_TABLE: ListTable = ListTable {
    name: "users",
    select: "id, full_name, email, position, avatar_image_url, metadata, created_at, updated_at",
    fields: User::FIELDS,
    flag_columns: &[],
    integer_columns: &[],
};

const EVENTS_TABLE: ListTable = ListTable {
    name: "events",
    select: "id, slug, title, description, banner_image_url, from_date, to_date, is_public, \
             user_ids, created_at, updated_at",
    fields: Event::FIELDS,
    flag_columns: &["is_public"],
    integer_columns: &["id"],
};

const IMAGE_COLUMNS: &str =
    "id, event_id, raw_image_url, processed_image_url, metadata, created_at, updated_at";
const DOCUMENT_COLUMNS: &str =
    "id, event_id, title, description, document_url, metadata, created_at, updated_at";

impl ListTable {
    fn filter_value(&self, column: &str, raw: &str) -> Value {
        if self.flag_columns.contains(&column) {
            return Value::Integer(i64::from(parse_bool(raw)));
        }
        if self.integer_columns.contains(&column)
            && let Ok(number) = raw.trim().parse::<i64>()
        {
            return Value::Integer(number);
        }
        Value::Text(raw.to_owned())
    }
}

pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        let printable = path.to_string_lossy().to_string();
        validate_db_path(&printable)?;
        let conn = Connection::open(path)
            .with_context(|| format!("open database at {}", path.display()))?;
        configure_connection(&conn)?;
        // The file holds session tokens.
        if path.exists() {
            set_private_permissions(path)?;
        }
        tracing::debug!(path = %path.display(), "database opened");
        Ok(Self { conn })
    }

    pub fn open_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("open in-memory database")?;
        configure_connection(&conn)?;
        Ok(Self { conn })
    }

    pub fn raw_connection(&self) -> &Connection {
        &self.conn
    }

    pub fn bootstrap(&self) -> Result<()> {
        if has_user_tables(&self.conn)? {
            validate_schema(&self.conn)?;
        } else {
            self.conn
                .execute_batch(include_str!("sql/schema.sql"))
                .context("create schema")?;
            tracing::info!("database schema created");
        }

        ensure_required_indexes(&self.conn)
    }

    /// True when there are neither users nor events yet.
    pub fn is_empty(&self) -> Result<bool> {
        let count: i64 = self
            .conn
            .query_row(
                "SELECT (SELECT COUNT(*) FROM users) + (SELECT COUNT(*) FROM events)",
                [],
                |row| row.get(0),
            )
            .context("count rows")?;
        Ok(count == 0)
    }

    fn list_rows<T, F>(
        &self,
        table: &ListTable,
        query: &ListQuery,
        map_row: F,
    ) -> Result<(Vec<T>, u64)>
    where
        F: FnMut(&rusqlite::Row<'_>) -> rusqlite::Result<T>,
    {
        query.validate_columns(table.fields)?;

        let mut clauses = Vec::new();
        let mut values = Vec::new();
        if let Some((column, text)) = query.search_term() {
            // instr keeps the match case-sensitive, like the hosted `like`.
            clauses.push(format!("instr(CAST({column} AS TEXT), ?) > 0"));
            values.push(Value::Text(text.to_owned()));
        }
        for (column, raw) in &query.column_filters {
            clauses.push(format!("{column} = ?"));
            values.push(table.filter_value(column, raw));
        }
        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", clauses.join(" AND "))
        };

        let total: i64 = self
            .conn
            .query_row(
                &format!("SELECT COUNT(*) FROM {}{where_sql}", table.name),
                params_from_iter(values.iter()),
                |row| row.get(0),
            )
            .with_context(|| format!("count {}", table.name))?;

        let (sort_column, direction) = query.order();
        let direction = match direction {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        };
        let sql = format!(
            "SELECT {} FROM {}{where_sql} ORDER BY {sort_column} {direction}, rowid {direction} LIMIT ? OFFSET ?",
            table.select, table.name
        );
        values.push(Value::Integer(i64::from(query.effective_limit())));
        values.push(Value::Integer(
            i64::try_from(query.offset()).context("page offset out of range")?,
        ));

        let mut stmt = self
            .conn
            .prepare(&sql)
            .with_context(|| format!("prepare {} list query", table.name))?;
        let rows = stmt
            .query_map(params_from_iter(values.iter()), map_row)
            .with_context(|| format!("list {}", table.name))?;
        let items = rows
            .collect::<rusqlite::Result<Vec<_>>>()
            .with_context(|| format!("decode {} rows", table.name))?;

        tracing::debug!(
            table = table.name,
            total,
            returned = items.len(),
            "list query"
        );
        Ok((items, u64::try_from(total).unwrap_or_default()))
    }

    fn new_user_id(&self) -> Result<String> {
        let hex: String = self
            .conn
            .query_row("SELECT lower(hex(randomblob(16)))", [], |row| row.get(0))
            .context("generate user id")?;
        Ok(format!(
            "{}-{}-{}-{}-{}",
            &hex[0..8],
            &hex[8..12],
            &hex[12..16],
            &hex[16..20],
            &hex[20..32]
        ))
    }

    fn with_children(&self, mut event: Event) -> Result<Event> {
        event.images = self.event_images(event.id)?;
        event.documents = self.event_documents(event.id)?;
        Ok(event)
    }

    fn event_images(&self, event_id: EventId) -> Result<Vec<EventImage>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {IMAGE_COLUMNS} FROM event_images WHERE event_id = ? ORDER BY id ASC"
            ))
            .context("prepare event images query")?;
        let rows = stmt
            .query_map(params![event_id.get()], image_from_row)
            .with_context(|| format!("list images for event {event_id}"))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .with_context(|| format!("decode images for event {event_id}"))
    }

    fn event_documents(&self, event_id: EventId) -> Result<Vec<EventDocument>> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {DOCUMENT_COLUMNS} FROM event_documents WHERE event_id = ? ORDER BY id ASC"
            ))
            .context("prepare event documents query")?;
        let rows = stmt
            .query_map(params![event_id.get()], document_from_row)
            .with_context(|| format!("list documents for event {event_id}"))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .with_context(|| format!("decode documents for event {event_id}"))
    }

    fn get_event_image(&self, id: EventImageId) -> Result<EventImage> {
        self.conn
            .query_row(
                &format!("SELECT {IMAGE_COLUMNS} FROM event_images WHERE id = ?"),
                params![id.get()],
                image_from_row,
            )
            .optional()
            .with_context(|| format!("load event image {id}"))?
            .ok_or_else(|| anyhow!("event image {id} not found"))
    }

    fn get_event_document(&self, id: EventDocumentId) -> Result<EventDocument> {
        self.conn
            .query_row(
                &format!("SELECT {DOCUMENT_COLUMNS} FROM event_documents WHERE id = ?"),
                params![id.get()],
                document_from_row,
            )
            .optional()
            .with_context(|| format!("load event document {id}"))?
            .ok_or_else(|| anyhow!("event document {id} not found"))
    }
}

impl AdminBackend for Store {
    fn list_users(&self, query: &ListQuery) -> Result<Page<User>> {
        let (items, total) = self.list_rows(&USERS_TABLE, query, user_from_row)?;
        Ok(Page::new(items, total, query))
    }

    fn get_user(&self, id: &UserId) -> Result<User> {
        self.conn
            .query_row(
                &format!("SELECT {} FROM users WHERE id = ?", USERS_TABLE.select),
                params![id.as_str()],
                user_from_row,
            )
            .optional()
            .with_context(|| format!("load user {id}"))?
            .ok_or_else(|| anyhow!("user {id} not found"))
    }

    fn create_user(&self, input: &UserInput) -> Result<User> {
        let id = self.new_user_id()?;
        let now = now_timestamp()?;
        let metadata = serde_json::to_string(&input.metadata).context("encode user metadata")?;
        self.conn
            .execute(
                "
                INSERT INTO users (
                  id, full_name, email, position, avatar_image_url, metadata,
                  created_at, updated_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                ",
                params![
                    id,
                    input.full_name,
                    input.email,
                    input.position,
                    input.avatar_image_url,
                    metadata,
                    now,
                    now,
                ],
            )
            .with_context(|| format!("create user {}", input.email))?;
        tracing::debug!(user_id = %id, "user created");
        self.get_user(&UserId::new(id))
    }

    fn update_user(&self, id: &UserId, input: &UserInput) -> Result<User> {
        let metadata = serde_json::to_string(&input.metadata).context("encode user metadata")?;
        let changed = self
            .conn
            .execute(
                "
                UPDATE users
                SET full_name = ?, email = ?, position = ?, avatar_image_url = ?,
                    metadata = ?, updated_at = ?
                WHERE id = ?
                ",
                params![
                    input.full_name,
                    input.email,
                    input.position,
                    input.avatar_image_url,
                    metadata,
                    now_timestamp()?,
                    id.as_str(),
                ],
            )
            .with_context(|| format!("update user {id}"))?;
        if changed == 0 {
            bail!("user {id} not found");
        }
        self.get_user(id)
    }

    fn delete_user(&self, id: &UserId) -> Result<()> {
        self.conn
            .execute("DELETE FROM users WHERE id = ?", params![id.as_str()])
            .with_context(|| format!("delete user {id}"))?;
        Ok(())
    }

    fn delete_users(&self, ids: &[UserId]) -> Result<()> {
        let tx = self
            .conn
            .unchecked_transaction()
            .context("begin bulk user delete")?;
        for id in ids {
            tx.execute("DELETE FROM users WHERE id = ?", params![id.as_str()])
                .with_context(|| format!("delete user {id}"))?;
        }
        tx.commit().context("commit bulk user delete")?;
        tracing::debug!(count = ids.len(), "users deleted");
        Ok(())
    }

    fn list_events(&self, query: &ListQuery) -> Result<Page<Event>> {
        let (events, total) = self.list_rows(&EVENTS_TABLE, query, event_from_row)?;
        let items = events
            .into_iter()
            .map(|event| self.with_children(event))
            .collect::<Result<Vec<_>>>()?;
        Ok(Page::new(items, total, query))
    }

    fn get_event(&self, id: EventId) -> Result<Event> {
        let event = self
            .conn
            .query_row(
                &format!("SELECT {} FROM events WHERE id = ?", EVENTS_TABLE.select),
                params![id.get()],
                event_from_row,
            )
            .optional()
            .with_context(|| format!("load event {id}"))?
            .ok_or_else(|| anyhow!("event {id} not found"))?;
        self.with_children(event)
    }

    fn get_event_by_slug(&self, slug: &str) -> Result<Event> {
        let event = self
            .conn
            .query_row(
                &format!("SELECT {} FROM events WHERE slug = ?", EVENTS_TABLE.select),
                params![slug],
                event_from_row,
            )
            .optional()
            .with_context(|| format!("load event {slug:?}"))?
            .ok_or_else(|| anyhow!("event {slug:?} not found"))?;
        self.with_children(event)
    }

    fn create_event(&self, input: &EventInput) -> Result<Event> {
        let user_ids = encode_user_ids(input.user_ids.as_deref())?;
        self.conn
            .execute(
                "
                INSERT INTO events (
                  slug, title, description, banner_image_url, from_date, to_date,
                  is_public, user_ids, created_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                ",
                params![
                    input.slug,
                    input.title,
                    input.description,
                    input.banner_image_url,
                    format_timestamp(input.from_date)?,
                    format_timestamp(input.to_date)?,
                    input.is_public,
                    user_ids,
                    now_timestamp()?,
                ],
            )
            .with_context(|| format!("create event {:?}", input.slug))?;
        let id = EventId::new(self.conn.last_insert_rowid());
        tracing::debug!(event_id = %id, "event created");
        self.get_event(id)
    }

    fn update_event(&self, id: EventId, input: &EventInput) -> Result<Event> {
        let user_ids = encode_user_ids(input.user_ids.as_deref())?;
        let changed = self
            .conn
            .execute(
                "
                UPDATE events
                SET slug = ?, title = ?, description = ?, banner_image_url = ?,
                    from_date = ?, to_date = ?, is_public = ?, user_ids = ?,
                    updated_at = ?
                WHERE id = ?
                ",
                params![
                    input.slug,
                    input.title,
                    input.description,
                    input.banner_image_url,
                    format_timestamp(input.from_date)?,
                    format_timestamp(input.to_date)?,
                    input.is_public,
                    user_ids,
                    now_timestamp()?,
                    id.get(),
                ],
            )
            .with_context(|| format!("update event {id}"))?;
        if changed == 0 {
            bail!("event {id} not found");
        }
        self.get_event(id)
    }

    fn delete_event(&self, id: EventId) -> Result<()> {
        self.conn
            .execute("DELETE FROM events WHERE id = ?", params![id.get()])
            .with_context(|| format!("delete event {id}"))?;
        Ok(())
    }

    fn delete_events(&self, ids: &[EventId]) -> Result<()> {
        let tx = self
            .conn
            .unchecked_transaction()
            .context("begin bulk event delete")?;
        for id in ids {
            tx.execute("DELETE FROM events WHERE id = ?", params![id.get()])
                .with_context(|| format!("delete event {id}"))?;
        }
        tx.commit().context("commit bulk event delete")?;
        tracing::debug!(count = ids.len(), "events deleted");
        Ok(())
    }

    fn add_event_image(&self, input: &NewEventImage) -> Result<EventImage> {
        self.conn
            .execute(
                "
                INSERT INTO event_images (
                  event_id, raw_image_url, processed_image_url, metadata, created_at
                ) VALUES (?, ?, ?, ?, ?)
                ",
                params![
                    input.event_id.get(),
                    input.raw_image_url,
                    input.processed_image_url,
                    encode_metadata(input.metadata.as_ref())?,
                    now_timestamp()?,
                ],
            )
            .with_context(|| format!("add image to event {}", input.event_id))?;
        self.get_event_image(EventImageId::new(self.conn.last_insert_rowid()))
    }

    fn update_event_image(
        &self,
        id: EventImageId,
        update: &EventImageUpdate,
    ) -> Result<EventImage> {
        let changed = self
            .conn
            .execute(
                "
                UPDATE event_images
                SET processed_image_url = COALESCE(?, processed_image_url),
                    metadata = COALESCE(?, metadata),
                    updated_at = ?
                WHERE id = ?
                ",
                params![
                    update.processed_image_url,
                    encode_metadata(update.metadata.as_ref())?,
                    now_timestamp()?,
                    id.get(),
                ],
            )
            .with_context(|| format!("update event image {id}"))?;
        if changed == 0 {
            bail!("event image {id} not found");
        }
        self.get_event_image(id)
    }

    fn delete_event_image(&self, id: EventImageId) -> Result<()> {
        self.conn
            .execute("DELETE FROM event_images WHERE id = ?", params![id.get()])
            .with_context(|| format!("delete event image {id}"))?;
        Ok(())
    }

    fn add_event_document(&self, input: &NewEventDocument) -> Result<EventDocument> {
        self.conn
            .execute(
                "
                INSERT INTO event_documents (
                  event_id, title, description, document_url, metadata, created_at
                ) VALUES (?, ?, ?, ?, ?, ?)
                ",
                params![
                    input.event_id.get(),
                    input.title,
                    input.description,
                    input.document_url,
                    encode_metadata(input.metadata.as_ref())?,
                    now_timestamp()?,
                ],
            )
            .with_context(|| format!("add document to event {}", input.event_id))?;
        self.get_event_document(EventDocumentId::new(self.conn.last_insert_rowid()))
    }

    fn update_event_document(
        &self,
        id: EventDocumentId,
        update: &EventDocumentUpdate,
    ) -> Result<EventDocument> {
        let changed = self
            .conn
            .execute(
                "
                UPDATE event_documents
                SET title = COALESCE(?, title),
                    description = COALESCE(?, description),
                    document_url = COALESCE(?, document_url),
                    metadata = COALESCE(?, metadata),
                    updated_at = ?
                WHERE id = ?
                ",
                params![
                    update.title,
                    update.description,
                    update.document_url,
                    encode_metadata(update.metadata.as_ref())?,
                    now_timestamp()?,
                    id.get(),
                ],
            )
            .with_context(|| format!("update event document {id}"))?;
        if changed == 0 {
            bail!("event document {id} not found");
        }
        self.get_event_document(id)
    }

    fn delete_event_document(&self, id: EventDocumentId) -> Result<()> {
        self.conn
            .execute("DELETE FROM event_documents WHERE id = ?", params![id.get()])
            .with_context(|| format!("delete event document {id}"))?;
        Ok(())
    }
}

fn user_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    let metadata_raw: String = row.get(5)?;
    let created_at_raw: String = row.get(6)?;
    let updated_at_raw: String = row.get(7)?;
    Ok(User {
        id: UserId::new(row.get::<_, String>(0)?),
        full_name: row.get(1)?,
        email: row.get(2)?,
        position: row.get(3)?,
        avatar_image_url: row.get(4)?,
        metadata: parse_metadata(&metadata_raw).map_err(to_sql_error)?,
        created_at: parse_timestamp(&created_at_raw).map_err(to_sql_error)?,
        updated_at: parse_timestamp(&updated_at_raw).map_err(to_sql_error)?,
    })
}

fn event_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Event> {
    let from_date_raw: String = row.get(5)?;
    let to_date_raw: String = row.get(6)?;
    let user_ids_raw: Option<String> = row.get(8)?;
    let created_at_raw: String = row.get(9)?;
    let updated_at_raw: Option<String> = row.get(10)?;
    Ok(Event {
        id: EventId::new(row.get(0)?),
        slug: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        banner_image_url: row.get(4)?,
        from_date: parse_timestamp(&from_date_raw).map_err(to_sql_error)?,
        to_date: parse_timestamp(&to_date_raw).map_err(to_sql_error)?,
        is_public: row.get(7)?,
        user_ids: decode_user_ids(user_ids_raw.as_deref()).map_err(to_sql_error)?,
        created_at: parse_timestamp(&created_at_raw).map_err(to_sql_error)?,
        updated_at: parse_opt_timestamp(updated_at_raw).map_err(to_sql_error)?,
        images: Vec::new(),
        documents: Vec::new(),
    })
}

fn image_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<EventImage> {
    let metadata_raw: Option<String> = row.get(4)?;
    let created_at_raw: String = row.get(5)?;
    let updated_at_raw: Option<String> = row.get(6)?;
    Ok(EventImage {
        id: EventImageId::new(row.get(0)?),
        event_id: EventId::new(row.get(1)?),
        raw_image_url: row.get(2)?,
        processed_image_url: row.get(3)?,
        metadata: parse_opt_metadata(metadata_raw).map_err(to_sql_error)?,
        created_at: parse_timestamp(&created_at_raw).map_err(to_sql_error)?,
        updated_at: parse_opt_timestamp(updated_at_raw).map_err(to_sql_error)?,
    })
}

fn document_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<EventDocument> {
    let metadata_raw: Option<String> = row.get(5)?;
    let created_at_raw: String = row.get(6)?;
    let updated_at_raw: Option<String> = row.get(7)?;
    Ok(EventDocument {
        id: EventDocumentId::new(row.get(0)?),
        event_id: EventId::new(row.get(1)?),
        title: row.get(2)?,
        description: row.get(3)?,
        document_url: row.get(4)?,
        metadata: parse_opt_metadata(metadata_raw).map_err(to_sql_error)?,
        created_at: parse_timestamp(&created_at_raw).map_err(to_sql_error)?,
        updated_at: parse_opt_timestamp(updated_at_raw).map_err(to_sql_error)?,
    })
}

pub fn default_db_path() -> Result<PathBuf> {
    if let Some(override_path) = env::var_os("EVADMIN_DB_PATH") {
        return Ok(PathBuf::from(override_path));
    }

    let data_root = dirs::data_local_dir().ok_or_else(|| {
        anyhow!("cannot resolve data directory; set EVADMIN_DB_PATH to a writable database path")
    })?;

    let app_dir = data_root.join(APP_NAME);
    fs::create_dir_all(&app_dir)
        .with_context(|| format!("create data directory {}", app_dir.display()))?;
    Ok(app_dir.join("evadmin.db"))
}

pub fn validate_db_path(path: &str) -> Result<()> {
    if path.is_empty() {
        bail!("database path must not be empty");
    }
    if path == ":memory:" {
        return Ok(());
    }

    if let Some(index) = path.find("://")
        && index > 0
    {
        let scheme = &path[..index];
        if scheme.chars().all(char::is_alphabetic) {
            bail!(
                "database path {path:?} looks like a URI ({scheme}://); pass a filesystem path instead"
            );
        }
    }

    if path.starts_with("file:") {
        bail!("database path {path:?} uses file: URI syntax; pass a plain filesystem path");
    }

    if path.contains('?') {
        bail!(
            "database path {path:?} contains '?'; remove query parameters and use a plain file path"
        );
    }

    Ok(())
}

fn has_user_tables(conn: &Connection) -> Result<bool> {
    let count: i64 = conn
        .query_row(
            "
            SELECT COUNT(*)
            FROM sqlite_master
            WHERE type = 'table'
              AND name NOT LIKE 'sqlite_%'
            ",
            [],
            |row| row.get(0),
        )
        .context("count user tables")?;
    Ok(count > 0)
}

fn validate_schema(conn: &Connection) -> Result<()> {
    for (table, required_columns) in REQUIRED_SCHEMA {
        let columns = table_columns(conn, table)?;
        if columns.is_empty() {
            bail!(
                "database is missing required table `{table}`; point storage.db_path at an evadmin database"
            );
        }

        let missing: Vec<&str> = required_columns
            .iter()
            .copied()
            .filter(|column| !columns.contains(*column))
            .collect();
        if !missing.is_empty() {
            bail!(
                "table `{table}` is missing required columns: {}; remove the database file to recreate it",
                missing.join(", ")
            );
        }
    }

    Ok(())
}

fn ensure_required_indexes(conn: &Connection) -> Result<()> {
    for index in REQUIRED_INDEXES {
        conn.execute_batch(index.create_sql)
            .with_context(|| format!("ensure required index `{}`", index.name))?;
    }
    Ok(())
}

fn table_columns(conn: &Connection, table: &str) -> Result<BTreeSet<String>> {
    let mut stmt = conn
        .prepare(&format!("PRAGMA table_info({table})"))
        .with_context(|| format!("inspect columns for {table}"))?;
    let rows = stmt
        .query_map([], |row| row.get::<_, String>(1))
        .with_context(|| format!("query column info for {table}"))?;

    rows.collect::<rusqlite::Result<BTreeSet<_>>>()
        .with_context(|| format!("collect columns for {table}"))
}

fn configure_connection(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        PRAGMA foreign_keys = ON;
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        PRAGMA busy_timeout = 5000;
        ",
    )
    .context("configure sqlite pragmas")
}

/// Fixed-width UTC text so that lexical order is chronological order.
fn format_timestamp(value: OffsetDateTime) -> Result<String> {
    value
        .to_offset(UtcOffset::UTC)
        .format(&format_description!(
            "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:6]Z"
        ))
        .context("format timestamp")
}

fn now_timestamp() -> Result<String> {
    format_timestamp(OffsetDateTime::now_utc())
}

fn parse_timestamp(raw: &str) -> Result<OffsetDateTime> {
    if let Ok(value) = PrimitiveDateTime::parse(
        raw,
        &format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:6]Z"),
    ) {
        return Ok(value.assume_utc());
    }

    if let Ok(value) = OffsetDateTime::parse(raw, &Rfc3339) {
        return Ok(value);
    }

    bail!("unsupported timestamp format {raw:?}")
}

fn parse_opt_timestamp(raw: Option<String>) -> Result<Option<OffsetDateTime>> {
    raw.as_deref().map(parse_timestamp).transpose()
}

fn parse_metadata(raw: &str) -> Result<Map<String, serde_json::Value>> {
    serde_json::from_str(raw).with_context(|| format!("decode metadata {raw:?}"))
}

fn parse_opt_metadata(raw: Option<String>) -> Result<Option<Map<String, serde_json::Value>>> {
    raw.as_deref().map(parse_metadata).transpose()
}

fn encode_metadata(value: Option<&Map<String, serde_json::Value>>) -> Result<Option<String>> {
    value
        .map(|metadata| serde_json::to_string(metadata).context("encode metadata"))
        .transpose()
}

fn encode_user_ids(value: Option<&[UserId]>) -> Result<Option<String>> {
    value
        .map(|ids| serde_json::to_string(ids).context("encode event user ids"))
        .transpose()
}

fn decode_user_ids(raw: Option<&str>) -> Result<Option<Vec<UserId>>> {
    raw.map(|raw| serde_json::from_str(raw).with_context(|| format!("decode user ids {raw:?}")))
        .transpose()
}

fn to_sql_error(error: anyhow::Error) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        0,
        rusqlite::types::Type::Text,
        Box::new(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            error.to_string(),
        )),
    )
}

fn checksum_sha256(data: &[u8]) -> String {
    let digest = Sha256::digest(data);
    let mut output = String::with_capacity(64);
    for byte in digest {
        use std::fmt::Write as _;
        let _ = write!(&mut output, "{byte:02x}");
    }
    output
}

fn set_private_permissions(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;

        let mut permissions = fs::metadata(path)
            .with_context(|| format!("stat {}", path.display()))?
            .permissions();
        permissions.set_mode(0o600);
        fs::set_permissions(path, permissions)
            .with_context(|| format!("set permissions on {}", path.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{checksum_sha256, format_timestamp, parse_timestamp};
    use anyhow::Result;
    use time::macros::datetime;

    #[test]
    fn timestamps_sort_lexically_in_time_order() -> Result<()> {
        let early = format_timestamp(datetime!(2025-01-02 03:04:05.5 +07:00))?;
        let late = format_timestamp(datetime!(2025-01-01 23:00:00 UTC))?;
        assert_eq!(early, "2025-01-01T20:04:05.500000Z");
        assert!(early < late);
        assert_eq!(
            parse_timestamp(&early)?,
            datetime!(2025-01-01 20:04:05.5 UTC)
        );
        Ok(())
    }

    #[test]
    fn rfc3339_timestamps_are_accepted() -> Result<()> {
        assert_eq!(
            parse_timestamp("2025-03-01T08:00:00+00:00")?,
            datetime!(2025-03-01 08:00:00 UTC)
        );
        assert!(parse_timestamp("yesterday").is_err());
        Ok(())
    }

    #[test]
    fn checksum_is_lowercase_hex() {
        assert_eq!(
            checksum_sha256(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
