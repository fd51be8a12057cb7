// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, bail};
use serde_json::Map;

use crate::model::{Event, EventInput, FormKind, User, UserInput};
use crate::validation::{
    FieldError, format_datetime, normalize_email, parse_required_datetime, required, slugify,
    validate_slug,
};
use crate::UserId;

/// Text fields of the user form as typed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UserFormInput {
    pub full_name: String,
    pub email: String,
    pub position: String,
    pub avatar_image_url: String,
}

/// Text fields of the event form as typed. Dates use `YYYY-MM-DD HH:MM`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EventFormInput {
    pub title: String,
    pub slug: String,
    pub description: String,
    pub banner_image_url: String,
    pub from_date: String,
    pub to_date: String,
    pub is_public: bool,
    pub user_ids: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormPayload {
    User(UserFormInput),
    Event(EventFormInput),
}

impl FormPayload {
    pub fn kind(&self) -> FormKind {
        match self {
            Self::User(_) => FormKind::User,
            Self::Event(_) => FormKind::Event,
        }
    }

    pub fn blank_for(kind: FormKind) -> Self {
        match kind {
            FormKind::User => Self::User(UserFormInput::default()),
            FormKind::Event => Self::Event(EventFormInput::default()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            Self::User(user) => user.to_input().map(|_| ()),
            Self::Event(event) => event.to_input().map(|_| ()),
        }
    }
}

impl UserFormInput {
    pub fn from_user(user: &User) -> Self {
        Self {
            full_name: user.full_name.clone(),
            email: user.email.clone(),
            position: user.position.clone(),
            avatar_image_url: user.avatar_image_url.clone(),
        }
    }

    pub fn to_input(&self) -> Result<UserInput> {
        let full_name = required("full name", &self.full_name)
            .context("enter the user's full name and retry")?;
        let email = normalize_email(&self.email)?;
        Ok(UserInput {
            full_name,
            email,
            position: self.position.trim().to_owned(),
            avatar_image_url: self.avatar_image_url.trim().to_owned(),
            metadata: Map::new(),
        })
    }
}

impl EventFormInput {
    pub fn from_event(event: &Event) -> Self {
        Self {
            title: event.title.clone(),
            slug: event.slug.clone(),
            description: event.description.clone().unwrap_or_default(),
            banner_image_url: event.banner_image_url.clone().unwrap_or_default(),
            from_date: format_datetime(event.from_date),
            to_date: format_datetime(event.to_date),
            is_public: event.is_public,
            user_ids: event
                .user_ids
                .as_deref()
                .unwrap_or_default()
                .iter()
                .map(UserId::to_string)
                .collect::<Vec<_>>()
                .join(", "),
        }
    }

    /// Slug to use: the typed one, or one derived from the title.
    pub fn effective_slug(&self) -> String {
        if self.slug.trim().is_empty() {
            slugify(&self.title)
        } else {
            self.slug.trim().to_owned()
        }
    }

    pub fn to_input(&self) -> Result<EventInput> {
        let title =
            required("title", &self.title).context("enter an event title and retry")?;
        let slug = validate_slug(&self.effective_slug())?;
        let from_date = parse_required_datetime(&self.from_date).context("start date")?;
        let to_date = parse_required_datetime(&self.to_date).context("end date")?;
        if to_date < from_date {
            bail!(FieldError::EndBeforeStart);
        }
        let user_ids: Vec<UserId> = self
            .user_ids
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(UserId::from)
            .collect();
        Ok(EventInput {
            slug,
            title,
            description: non_empty(&self.description),
            banner_image_url: non_empty(&self.banner_image_url),
            from_date,
            to_date,
            is_public: self.is_public,
            user_ids: (!user_ids.is_empty()).then_some(user_ids),
        })
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_owned())
}

#[cfg(test)]
mod tests {
    use super::{EventFormInput, FormPayload, UserFormInput};
    use crate::model::FormKind;
    use crate::validation::FieldError;

    fn event_form() -> EventFormInput {
        EventFormInput {
            title: "Ngày hội Mở".to_owned(),
            from_date: "2025-05-01 08:00".to_owned(),
            to_date: "2025-05-01 17:00".to_owned(),
            ..EventFormInput::default()
        }
    }

    #[test]
    fn blank_payload_matches_kind() {
        assert_eq!(FormPayload::blank_for(FormKind::User).kind(), FormKind::User);
        assert_eq!(
            FormPayload::blank_for(FormKind::Event).kind(),
            FormKind::Event
        );
    }

    #[test]
    fn user_form_requires_name_and_email() {
        assert!(FormPayload::blank_for(FormKind::User).validate().is_err());
        let input = UserFormInput {
            full_name: " Ann ".to_owned(),
            email: "Ann@Example.com".to_owned(),
            ..UserFormInput::default()
        }
        .to_input()
        .expect("valid user form");
        assert_eq!(input.full_name, "Ann");
        assert_eq!(input.email, "ann@example.com");
    }

    #[test]
    fn event_slug_defaults_from_title() {
        let input = event_form().to_input().expect("valid event form");
        assert_eq!(input.slug, "ngay-hoi-mo");
        assert!(input.description.is_none());
        assert!(input.user_ids.is_none());
    }

    #[test]
    fn event_rejects_reversed_dates() {
        let form = EventFormInput {
            to_date: "2025-04-30".to_owned(),
            ..event_form()
        };
        let error = form.to_input().expect_err("reversed dates");
        assert_eq!(
            error.downcast_ref::<FieldError>(),
            Some(&FieldError::EndBeforeStart)
        );
    }

    #[test]
    fn event_parses_attendee_ids() {
        let form = EventFormInput {
            user_ids: "u-1, ,u-2".to_owned(),
            ..event_form()
        };
        let ids = form.to_input().expect("valid").user_ids.expect("ids set");
        assert_eq!(ids.len(), 2);
        assert_eq!(ids[1].as_str(), "u-2");
    }
}
