// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use time::macros::{format_description, time};
use time::{Date, OffsetDateTime, PrimitiveDateTime};

pub const DATE_LAYOUT: &str = "YYYY-MM-DD";
pub const DATETIME_LAYOUT: &str = "YYYY-MM-DD HH:MM";

pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;
pub const ALLOWED_IMAGE_EXTENSIONS: [&str; 4] = ["jpeg", "jpg", "png", "webp"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldError {
    Required(&'static str),
    InvalidEmail,
    InvalidSlug,
    InvalidDate,
    EndBeforeStart,
}

impl std::fmt::Display for FieldError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Required(field) => write!(f, "{field} is required"),
            Self::InvalidEmail => f.write_str("invalid email address"),
            Self::InvalidSlug => {
                f.write_str("slug may only contain lowercase letters, digits and dashes")
            }
            Self::InvalidDate => write!(f, "invalid date, expected {DATETIME_LAYOUT}"),
            Self::EndBeforeStart => f.write_str("end date must be on/after start date"),
        }
    }
}

impl std::error::Error for FieldError {}

pub type FieldResult<T> = std::result::Result<T, FieldError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileValidationError {
    NotAnImage(String),
    TooLarge { size: usize, max: usize },
    UnsupportedExtension(String),
    MissingExtension,
}

impl std::fmt::Display for FileValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotAnImage(mime) => write!(f, "only image files can be uploaded, got {mime}"),
            Self::TooLarge { size, max } => write!(
                f,
                "file is {} KiB, the limit is {} MiB",
                size / 1024,
                max / (1024 * 1024)
            ),
            Self::UnsupportedExtension(ext) => write!(
                f,
                "unsupported image type .{ext}, use {}",
                ALLOWED_IMAGE_EXTENSIONS.join("/")
            ),
            Self::MissingExtension => f.write_str("file name has no extension"),
        }
    }
}

impl std::error::Error for FileValidationError {}

/// Checks an image before it is uploaded; returns the lower-cased extension.
pub fn validate_image_upload(
    file_name: &str,
    mime_type: &str,
    size: usize,
) -> std::result::Result<String, FileValidationError> {
    if !mime_type.starts_with("image/") {
        return Err(FileValidationError::NotAnImage(mime_type.to_owned()));
    }
    if size > MAX_UPLOAD_BYTES {
        return Err(FileValidationError::TooLarge {
            size,
            max: MAX_UPLOAD_BYTES,
        });
    }
    let extension = file_extension(file_name).ok_or(FileValidationError::MissingExtension)?;
    if !ALLOWED_IMAGE_EXTENSIONS.contains(&extension.as_str()) {
        return Err(FileValidationError::UnsupportedExtension(extension));
    }
    Ok(extension)
}

pub fn file_extension(file_name: &str) -> Option<String> {
    let (stem, extension) = file_name.rsplit_once('.')?;
    if stem.is_empty() || extension.is_empty() {
        return None;
    }
    Some(extension.to_ascii_lowercase())
}

pub fn mime_for_extension(extension: &str) -> Option<&'static str> {
    match extension.to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" => Some("image/jpeg"),
        "png" => Some("image/png"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        _ => None,
    }
}

pub fn required(field: &'static str, value: &str) -> FieldResult<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(FieldError::Required(field));
    }
    Ok(trimmed.to_owned())
}

pub fn normalize_email(value: &str) -> FieldResult<String> {
    let email = required("email", value)?.to_lowercase();
    let Some((local, domain)) = email.split_once('@') else {
        return Err(FieldError::InvalidEmail);
    };
    let valid = !local.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.chars().any(char::is_whitespace)
        && !domain.contains('@');
    if !valid {
        return Err(FieldError::InvalidEmail);
    }
    Ok(email)
}

pub fn validate_slug(value: &str) -> FieldResult<String> {
    let slug = required("slug", value)?;
    let valid = slug
        .chars()
        .all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-')
        && !slug.starts_with('-')
        && !slug.ends_with('-')
        && !slug.contains("--");
    if !valid {
        return Err(FieldError::InvalidSlug);
    }
    Ok(slug)
}

/// Builds a slug from a title, folding Vietnamese diacritics to ASCII.
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_dash = false;
    for ch in title.chars().flat_map(char::to_lowercase) {
        let folded = fold_diacritic(ch);
        if folded.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(folded);
        } else {
            pending_dash = true;
        }
    }
    slug
}

fn fold_diacritic(ch: char) -> char {
    match ch {
        'à' | 'á' | 'ả' | 'ã' | 'ạ' | 'ă' | 'ằ' | 'ắ' | 'ẳ' | 'ẵ' | 'ặ' | 'â' | 'ầ' | 'ấ'
        | 'ẩ' | 'ẫ' | 'ậ' => 'a',
        'è' | 'é' | 'ẻ' | 'ẽ' | 'ẹ' | 'ê' | 'ề' | 'ế' | 'ể' | 'ễ' | 'ệ' => 'e',
        'ì' | 'í' | 'ỉ' | 'ĩ' | 'ị' => 'i',
        'ò' | 'ó' | 'ỏ' | 'õ' | 'ọ' | 'ô' | 'ồ' | 'ố' | 'ổ' | 'ỗ' | 'ộ' | 'ơ' | 'ờ' | 'ớ'
        | 'ở' | 'ỡ' | 'ợ' => 'o',
        'ù' | 'ú' | 'ủ' | 'ũ' | 'ụ' | 'ư' | 'ừ' | 'ứ' | 'ử' | 'ữ' | 'ự' => 'u',
        'ỳ' | 'ý' | 'ỷ' | 'ỹ' | 'ỵ' => 'y',
        'đ' => 'd',
        other => other,
    }
}

/// Accepts `YYYY-MM-DD HH:MM` or a bare date (midnight), read as UTC.
pub fn parse_required_datetime(input: &str) -> FieldResult<OffsetDateTime> {
    let trimmed = input.trim();
    if let Ok(value) = PrimitiveDateTime::parse(
        trimmed,
        &format_description!("[year]-[month]-[day] [hour]:[minute]"),
    ) {
        return Ok(value.assume_utc());
    }
    let date = parse_date(trimmed)?;
    Ok(date.with_time(time!(0:00)).assume_utc())
}

pub fn parse_optional_datetime(input: &str) -> FieldResult<Option<OffsetDateTime>> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    parse_required_datetime(trimmed).map(Some)
}

pub fn format_datetime(value: OffsetDateTime) -> String {
    value
        .format(&format_description!("[year]-[month]-[day] [hour]:[minute]"))
        .unwrap_or_default()
}

pub fn format_date(value: Option<OffsetDateTime>) -> String {
    let Some(value) = value else {
        return String::new();
    };
    value
        .format(&format_description!("[year]-[month]-[day]"))
        .unwrap_or_default()
}

fn parse_date(input: &str) -> FieldResult<Date> {
    Date::parse(input, &format_description!("[year]-[month]-[day]"))
        .map_err(|_| FieldError::InvalidDate)
}

pub fn parse_bool(input: &str) -> bool {
    matches!(
        input.trim().to_ascii_lowercase().as_str(),
        "y" | "yes" | "true" | "1" | "x"
    )
}
