// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use evadmin_app::{EventId, FormKind, FormMode, FormPayload, UserId};

/// Row a submitted form writes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormTarget {
    New,
    User(UserId),
    Event(EventId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Flag,
    /// Holds a hosted URL; a local path typed here is uploaded with ctrl+u.
    Avatar,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub key: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
}

const fn field(key: &'static str, label: &'static str, kind: FieldKind) -> FieldSpec {
    FieldSpec { key, label, kind }
}

const USER_FIELDS: [FieldSpec; 4] = [
    field("full_name", "Họ và tên", FieldKind::Text),
    field("email", "Email", FieldKind::Text),
    field("position", "Chức vụ", FieldKind::Text),
    field("avatar_image_url", "Ảnh đại diện", FieldKind::Avatar),
];

const EVENT_FIELDS: [FieldSpec; 8] = [
    field("title", "Tiêu đề", FieldKind::Text),
    field("slug", "Slug", FieldKind::Text),
    field("description", "Mô tả", FieldKind::Text),
    field("banner_image_url", "Ảnh bìa", FieldKind::Text),
    field("from_date", "Bắt đầu", FieldKind::Text),
    field("to_date", "Kết thúc", FieldKind::Text),
    field("is_public", "Công khai", FieldKind::Flag),
    field("user_ids", "Người tham gia", FieldKind::Text),
];

pub fn field_specs(kind: FormKind) -> &'static [FieldSpec] {
    match kind {
        FormKind::User => &USER_FIELDS,
        FormKind::Event => &EVENT_FIELDS,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormUiState {
    pub payload: FormPayload,
    pub mode: FormMode,
    pub target: FormTarget,
    pub field_index: usize,
    pub error: Option<String>,
    /// Avatar URL to fall back to when an upload fails.
    pub last_avatar_url: String,
}

impl FormUiState {
    pub fn new(payload: FormPayload, mode: FormMode, target: FormTarget) -> Self {
        let last_avatar_url = match &payload {
            FormPayload::User(user) => user.avatar_image_url.clone(),
            FormPayload::Event(_) => String::new(),
        };
        Self {
            payload,
            mode,
            target,
            field_index: 0,
            error: None,
            last_avatar_url,
        }
    }

    pub fn kind(&self) -> FormKind {
        self.payload.kind()
    }

    pub fn specs(&self) -> &'static [FieldSpec] {
        field_specs(self.kind())
    }

    pub fn current_spec(&self) -> Option<FieldSpec> {
        self.specs().get(self.field_index).copied()
    }

    pub fn is_read_only(&self) -> bool {
        self.mode.is_read_only()
    }

    pub fn move_field(&mut self, delta: isize) {
        let len = self.specs().len() as isize;
        self.field_index = (self.field_index as isize + delta).rem_euclid(len) as usize;
    }

    pub fn value(&self, key: &str) -> String {
        match &self.payload {
            FormPayload::User(user) => match key {
                "full_name" => user.full_name.clone(),
                "email" => user.email.clone(),
                "position" => user.position.clone(),
                "avatar_image_url" => user.avatar_image_url.clone(),
                _ => String::new(),
            },
            FormPayload::Event(event) => match key {
                "title" => event.title.clone(),
                "slug" => event.slug.clone(),
                "description" => event.description.clone(),
                "banner_image_url" => event.banner_image_url.clone(),
                "from_date" => event.from_date.clone(),
                "to_date" => event.to_date.clone(),
                "is_public" => flag_label(event.is_public).to_owned(),
                "user_ids" => event.user_ids.clone(),
                _ => String::new(),
            },
        }
    }

    fn text_mut(&mut self, key: &str) -> Option<&mut String> {
        match &mut self.payload {
            FormPayload::User(user) => match key {
                "full_name" => Some(&mut user.full_name),
                "email" => Some(&mut user.email),
                "position" => Some(&mut user.position),
                "avatar_image_url" => Some(&mut user.avatar_image_url),
                _ => None,
            },
            FormPayload::Event(event) => match key {
                "title" => Some(&mut event.title),
                "slug" => Some(&mut event.slug),
                "description" => Some(&mut event.description),
                "banner_image_url" => Some(&mut event.banner_image_url),
                "from_date" => Some(&mut event.from_date),
                "to_date" => Some(&mut event.to_date),
                "user_ids" => Some(&mut event.user_ids),
                _ => None,
            },
        }
    }

    pub fn set_value(&mut self, key: &str, value: String) {
        if let Some(text) = self.text_mut(key) {
            *text = value;
        }
    }

    /// Types into the focused text field. Returns false when the form is
    /// read-only or the field is not text.
    pub fn insert_char(&mut self, ch: char) -> bool {
        if self.is_read_only() {
            return false;
        }
        let Some(spec) = self.current_spec() else {
            return false;
        };
        match self.text_mut(spec.key) {
            Some(text) => {
                text.push(ch);
                self.error = None;
                true
            }
            None => false,
        }
    }

    pub fn backspace(&mut self) -> bool {
        if self.is_read_only() {
            return false;
        }
        let Some(spec) = self.current_spec() else {
            return false;
        };
        match self.text_mut(spec.key) {
            Some(text) => text.pop().is_some(),
            None => false,
        }
    }

    pub fn toggle_flag(&mut self) -> bool {
        if self.is_read_only() {
            return false;
        }
        let is_flag = self
            .current_spec()
            .is_some_and(|spec| spec.kind == FieldKind::Flag);
        match &mut self.payload {
            FormPayload::Event(event) if is_flag => {
                event.is_public = !event.is_public;
                true
            }
            _ => false,
        }
    }

    /// Local path typed into the avatar field, if one is focused and filled.
    pub fn avatar_path(&self) -> Option<String> {
        let spec = self.current_spec()?;
        if spec.kind != FieldKind::Avatar || self.is_read_only() {
            return None;
        }
        let value = self.value(spec.key);
        let trimmed = value.trim();
        (!trimmed.is_empty() && !trimmed.starts_with("http")).then(|| trimmed.to_owned())
    }

    pub fn apply_avatar_upload(&mut self, outcome: Result<String, String>) {
        match outcome {
            Ok(url) => {
                self.set_value("avatar_image_url", url.clone());
                self.last_avatar_url = url;
                self.error = None;
            }
            Err(error) => {
                let previous = self.last_avatar_url.clone();
                self.set_value("avatar_image_url", previous);
                self.error = Some(error);
            }
        }
    }

    pub fn title(&self) -> String {
        let noun = match self.kind() {
            FormKind::User => "người dùng",
            FormKind::Event => "sự kiện",
        };
        match self.mode {
            FormMode::Create => format!("Thêm {noun}"),
            FormMode::Update => format!("Chỉnh sửa {noun}"),
            FormMode::View => format!("Chi tiết {noun}"),
        }
    }
}

fn flag_label(value: bool) -> &'static str {
    if value { "có" } else { "không" }
}

#[cfg(test)]
mod tests {
    use super::{FieldKind, FormTarget, FormUiState, field_specs};
    use evadmin_app::{FormKind, FormMode, FormPayload, UserFormInput};

    fn user_form(mode: FormMode) -> FormUiState {
        FormUiState::new(
            FormPayload::User(UserFormInput {
                avatar_image_url: "https://cdn.example.com/a.png".to_owned(),
                ..UserFormInput::default()
            }),
            mode,
            FormTarget::New,
        )
    }

    #[test]
    fn field_cursor_wraps() {
        let mut form = user_form(FormMode::Create);
        form.move_field(-1);
        assert_eq!(form.current_spec().map(|spec| spec.key), Some("avatar_image_url"));
        form.move_field(1);
        assert_eq!(form.field_index, 0);
    }

    #[test]
    fn typing_edits_the_focused_field() {
        let mut form = user_form(FormMode::Create);
        for ch in "Lan".chars() {
            assert!(form.insert_char(ch));
        }
        assert!(form.backspace());
        assert_eq!(form.value("full_name"), "La");
    }

    #[test]
    fn view_mode_is_read_only() {
        let mut form = user_form(FormMode::View);
        assert!(!form.insert_char('x'));
        assert!(!form.backspace());
        assert_eq!(form.value("full_name"), "");
    }

    #[test]
    fn flag_field_toggles_only_when_focused() {
        let mut form = FormUiState::new(
            FormPayload::blank_for(FormKind::Event),
            FormMode::Create,
            FormTarget::New,
        );
        assert!(!form.toggle_flag());
        form.field_index = field_specs(FormKind::Event)
            .iter()
            .position(|spec| spec.kind == FieldKind::Flag)
            .expect("flag field");
        assert!(!form.insert_char('x'));
        assert!(form.toggle_flag());
        assert_eq!(form.value("is_public"), "có");
    }

    #[test]
    fn failed_upload_restores_previous_avatar() {
        let mut form = user_form(FormMode::Update);
        form.field_index = 3;
        form.set_value("avatar_image_url", "/tmp/me.png".to_owned());
        assert_eq!(form.avatar_path().as_deref(), Some("/tmp/me.png"));

        form.apply_avatar_upload(Err("upload failed".to_owned()));
        assert_eq!(form.value("avatar_image_url"), "https://cdn.example.com/a.png");
        assert_eq!(form.error.as_deref(), Some("upload failed"));
        assert!(form.avatar_path().is_none());

        form.set_value("avatar_image_url", "/tmp/me.png".to_owned());
        form.apply_avatar_upload(Ok("https://cdn.example.com/b.png".to_owned()));
        assert_eq!(form.last_avatar_url, "https://cdn.example.com/b.png");
        assert!(form.error.is_none());
    }
}
