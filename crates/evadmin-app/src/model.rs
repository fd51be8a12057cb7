// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use time::OffsetDateTime;

use crate::ids::*;
use crate::table::{CellValue, TableRow};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Screen {
    Users,
    Events,
}

impl Screen {
    pub const ALL: [Self; 2] = [Self::Users, Self::Events];

    pub const fn label(self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::Events => "events",
        }
    }

    pub const fn table(self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::Events => "events",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormKind {
    User,
    Event,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormMode {
    Create,
    Update,
    View,
}

impl FormMode {
    pub const fn is_read_only(self) -> bool {
        matches!(self, Self::View)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
    SignedOut,
    Nav,
    Form(FormKind, FormMode),
    Confirm,
    Import,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "asc" => Some(Self::Asc),
            "desc" => Some(Self::Desc),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub full_name: String,
    pub email: String,
    #[serde(default)]
    pub position: String,
    #[serde(default)]
    pub avatar_image_url: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

/// Payload for both inserts and full updates of a user row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserInput {
    pub full_name: String,
    pub email: String,
    pub position: String,
    pub avatar_image_url: String,
    pub metadata: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub slug: String,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub banner_image_url: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub from_date: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub to_date: OffsetDateTime,
    pub is_public: bool,
    #[serde(default)]
    pub user_ids: Option<Vec<UserId>>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
    #[serde(default)]
    pub images: Vec<EventImage>,
    #[serde(default)]
    pub documents: Vec<EventDocument>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventInput {
    pub slug: String,
    pub title: String,
    pub description: Option<String>,
    pub banner_image_url: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub from_date: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub to_date: OffsetDateTime,
    pub is_public: bool,
    pub user_ids: Option<Vec<UserId>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventImage {
    pub id: EventImageId,
    pub event_id: EventId,
    pub raw_image_url: String,
    #[serde(default)]
    pub processed_image_url: Option<String>,
    #[serde(default)]
    pub metadata: Option<Map<String, Value>>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEventImage {
    pub event_id: EventId,
    pub raw_image_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EventImageUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDocument {
    pub id: EventDocumentId,
    pub event_id: EventId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub document_url: String,
    #[serde(default)]
    pub metadata: Option<Map<String, Value>>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEventDocument {
    pub event_id: EventId,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub document_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EventDocumentUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl TableRow for User {
    type Id = UserId;

    const FIELDS: &'static [&'static str] = &[
        "id",
        "full_name",
        "email",
        "position",
        "avatar_image_url",
        "created_at",
        "updated_at",
    ];

    fn row_id(&self) -> UserId {
        self.id.clone()
    }

    fn row_label(&self) -> String {
        self.full_name.clone()
    }

    fn field(&self, key: &str) -> Option<CellValue> {
        let value = match key {
            "id" => CellValue::Text(self.id.to_string()),
            "full_name" => CellValue::Text(self.full_name.clone()),
            "email" => CellValue::Text(self.email.clone()),
            "position" => CellValue::Text(self.position.clone()),
            "avatar_image_url" => CellValue::Text(self.avatar_image_url.clone()),
            "created_at" => CellValue::Timestamp(self.created_at),
            "updated_at" => CellValue::Timestamp(self.updated_at),
            _ => return None,
        };
        Some(value)
    }
}

impl TableRow for Event {
    type Id = EventId;

    const FIELDS: &'static [&'static str] = &[
        "id",
        "slug",
        "title",
        "description",
        "banner_image_url",
        "from_date",
        "to_date",
        "is_public",
        "created_at",
        "updated_at",
    ];

    fn row_id(&self) -> EventId {
        self.id
    }

    fn row_label(&self) -> String {
        self.title.clone()
    }

    fn field(&self, key: &str) -> Option<CellValue> {
        let value = match key {
            "id" => CellValue::Integer(self.id.get()),
            "slug" => CellValue::Text(self.slug.clone()),
            "title" => CellValue::Text(self.title.clone()),
            "description" => CellValue::Text(self.description.clone().unwrap_or_default()),
            "banner_image_url" => {
                CellValue::Text(self.banner_image_url.clone().unwrap_or_default())
            }
            "from_date" => CellValue::Timestamp(self.from_date),
            "to_date" => CellValue::Timestamp(self.to_date),
            "is_public" => CellValue::Flag(self.is_public),
            "created_at" => CellValue::Timestamp(self.created_at),
            "updated_at" => self
                .updated_at
                .map_or(CellValue::Empty, CellValue::Timestamp),
            _ => return None,
        };
        Some(value)
    }
}
