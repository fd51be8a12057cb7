// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::fmt::Write as _;
use std::time::Duration;

use anyhow::{Context, Result, anyhow, bail};
use evadmin_app::validation::validate_image_upload;
use evadmin_app::{
    AdminBackend, AuthProvider, AuthUser, Event, EventDocument, EventDocumentId,
    EventDocumentUpdate, EventId, EventImage, EventImageId, EventImageUpdate, EventInput,
    ListQuery, NewEventDocument, NewEventImage, Page, Session, TableRow, User, UserId, UserInput,
};
use reqwest::Method;
use reqwest::blocking::{Client as HttpClient, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use time::OffsetDateTime;
use url::Url;

use crate::{clean_error_response, connection_error};

const USERS_TABLE: &str = "users";
const EVENTS_TABLE: &str = "events";
const EVENT_IMAGES_TABLE: &str = "event_images";
const EVENT_DOCUMENTS_TABLE: &str = "event_documents";

const ALL_COLUMNS: &str = "*";
const EVENT_SELECT: &str = "*,images:event_images(*),documents:event_documents(*)";

const UPLOAD_CACHE_CONTROL: &str = "max-age=3600";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadProgress {
    pub loaded: u64,
    pub total: u64,
    pub percentage: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub url: String,
    pub path: String,
}

/// Client for the hosted backend: row queries, auth and object storage.
#[derive(Clone)]
pub struct RestClient {
    base_url: String,
    anon_key: String,
    access_token: Option<String>,
    timeout: Duration,
    http: HttpClient,
}

impl RestClient {
    pub fn new(base_url: &str, anon_key: &str, timeout: Duration) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_owned();
        if base_url.is_empty() {
            bail!("backend.url must not be empty");
        }
        Url::parse(&base_url).with_context(|| format!("backend.url {base_url:?} is not a URL"))?;
        if anon_key.trim().is_empty() {
            bail!("backend.anon_key must not be empty -- set it in the config or EVADMIN_ANON_KEY");
        }

        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("build HTTP client")?;

        Ok(Self {
            base_url,
            anon_key: anon_key.trim().to_owned(),
            access_token: None,
            timeout,
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Row requests run as the signed-in operator when a session is set and
    /// as the anonymous role otherwise.
    pub fn set_session(&mut self, session: Option<&Session>) {
        self.access_token = session.map(|session| session.access_token.clone());
    }

    pub fn upload_file(
        &self,
        bytes: &[u8],
        file_name: &str,
        mime_type: &str,
        bucket: &str,
        folder: &str,
        mut progress: impl FnMut(UploadProgress),
    ) -> Result<StoredFile> {
        let extension = validate_image_upload(file_name, mime_type, bytes.len())?;
        let millis = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
        let name = object_name(bytes, &extension, millis);
        let path = format!("{}/{name}", folder.trim_matches('/'));
        let total = bytes.len() as u64;

        progress(UploadProgress {
            loaded: 0,
            total,
            percentage: 0,
        });
        let url = self.endpoint(&format!("storage/v1/object/{bucket}/{path}"))?;
        let request = self
            .authorized(Method::POST, url)
            .header("content-type", mime_type)
            .header("cache-control", UPLOAD_CACHE_CONTROL)
            .header("x-upsert", "false")
            .body(bytes.to_vec());
        self.send(request)?;
        progress(UploadProgress {
            loaded: total,
            total,
            percentage: 100,
        });

        tracing::info!(bucket, path = %path, bytes = total, "file uploaded");
        Ok(StoredFile {
            url: self.public_url(&path, bucket),
            path,
        })
    }

    pub fn delete_file(&self, path: &str, bucket: &str) -> Result<()> {
        let url = self.endpoint(&format!("storage/v1/object/{bucket}"))?;
        let request = self
            .authorized(Method::DELETE, url)
            .json(&serde_json::json!({ "prefixes": [path] }));
        self.send(request)?;
        tracing::info!(bucket, path, "file deleted");
        Ok(())
    }

    pub fn public_url(&self, path: &str, bucket: &str) -> String {
        format!(
            "{}/storage/v1/object/public/{bucket}/{}",
            self.base_url,
            path.trim_start_matches('/')
        )
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Url::parse(&format!("{}/{path}", self.base_url))
            .with_context(|| format!("build URL for {path}"))
    }

    fn authorized(&self, method: Method, url: Url) -> RequestBuilder {
        let token = self.access_token.as_deref().unwrap_or(&self.anon_key);
        self.with_token(method, url, token)
    }

    fn with_token(&self, method: Method, url: Url, token: &str) -> RequestBuilder {
        self.http
            .request(method, url)
            .header("apikey", &self.anon_key)
            .bearer_auth(token)
    }

    fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request
            .send()
            .map_err(|error| connection_error(&self.base_url, error))?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(clean_error_response(status, &body));
        }
        Ok(response)
    }

    fn list_rows<T: DeserializeOwned>(
        &self,
        table: &str,
        select: &str,
        query: &ListQuery,
        columns: &[&str],
    ) -> Result<Page<T>> {
        query.validate_columns(columns)?;
        let mut url = self.endpoint(&format!("rest/v1/{table}"))?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("select", select);
            if let Some((column, text)) = query.search_term() {
                pairs.append_pair(column, &format!("like.*{text}*"));
            }
            for (column, value) in &query.column_filters {
                pairs.append_pair(column, &format!("eq.{value}"));
            }
            let (column, direction) = query.order();
            pairs.append_pair("order", &format!("{column}.{}", direction.as_str()));
            pairs.append_pair("offset", &query.offset().to_string());
            pairs.append_pair("limit", &query.effective_limit().to_string());
        }

        tracing::debug!(table, page = query.effective_page(), "list rows");
        let response = self.send(
            self.authorized(Method::GET, url)
                .header("prefer", "count=exact"),
        )?;
        let total = response
            .headers()
            .get("content-range")
            .and_then(|value| value.to_str().ok())
            .and_then(parse_content_range);
        let items: Vec<T> = response
            .json()
            .with_context(|| format!("decode {table} page"))?;
        let total = total.unwrap_or(items.len() as u64);
        Ok(Page::new(items, total, query))
    }

    fn fetch_one<T: DeserializeOwned>(
        &self,
        table: &str,
        select: &str,
        column: &str,
        value: &str,
    ) -> Result<T> {
        let mut url = self.endpoint(&format!("rest/v1/{table}"))?;
        url.query_pairs_mut()
            .append_pair("select", select)
            .append_pair(column, &format!("eq.{value}"))
            .append_pair("limit", "1");
        let response = self.send(self.authorized(Method::GET, url))?;
        let rows: Vec<T> = response
            .json()
            .with_context(|| format!("decode {table} row"))?;
        first_row(rows, table, value)
    }

    fn insert_row<T: DeserializeOwned, B: Serialize>(
        &self,
        table: &str,
        select: &str,
        body: &B,
    ) -> Result<T> {
        let mut url = self.endpoint(&format!("rest/v1/{table}"))?;
        url.query_pairs_mut().append_pair("select", select);
        let response = self.send(
            self.authorized(Method::POST, url)
                .header("prefer", "return=representation")
                .json(body),
        )?;
        let rows: Vec<T> = response
            .json()
            .with_context(|| format!("decode inserted {table} row"))?;
        let row = first_row(rows, table, "new row")?;
        tracing::info!(table, "row inserted");
        Ok(row)
    }

    fn update_row<T: DeserializeOwned, B: Serialize>(
        &self,
        table: &str,
        select: &str,
        id: &str,
        body: &B,
    ) -> Result<T> {
        let mut url = self.endpoint(&format!("rest/v1/{table}"))?;
        url.query_pairs_mut()
            .append_pair("select", select)
            .append_pair("id", &format!("eq.{id}"));
        let response = self.send(
            self.authorized(Method::PATCH, url)
                .header("prefer", "return=representation")
                .json(body),
        )?;
        let rows: Vec<T> = response
            .json()
            .with_context(|| format!("decode updated {table} row"))?;
        let row = first_row(rows, table, id)?;
        tracing::info!(table, id, "row updated");
        Ok(row)
    }

    fn delete_rows(&self, table: &str, ids: &[String]) -> Result<()> {
        if ids.is_empty() {
            return Ok(());
        }
        let filter = match ids {
            [single] => format!("eq.{single}"),
            many => {
                let mut list = String::from("in.(");
                for (index, id) in many.iter().enumerate() {
                    if index > 0 {
                        list.push(',');
                    }
                    let _ = write!(list, "\"{id}\"");
                }
                list.push(')');
                list
            }
        };
        let mut url = self.endpoint(&format!("rest/v1/{table}"))?;
        url.query_pairs_mut().append_pair("id", &filter);
        self.send(self.authorized(Method::DELETE, url))?;
        tracing::info!(table, count = ids.len(), "rows deleted");
        Ok(())
    }
}

fn first_row<T>(rows: Vec<T>, table: &str, key: &str) -> Result<T> {
    rows.into_iter()
        .next()
        .ok_or_else(|| anyhow!("no {table} row matched {key}"))
}

/// Total row count from a `Content-Range` header such as `0-9/42` or `*/0`.
pub fn parse_content_range(value: &str) -> Option<u64> {
    let (_, total) = value.rsplit_once('/')?;
    total.trim().parse().ok()
}

/// Storage object name: upload time in milliseconds plus a content hash.
pub fn object_name(bytes: &[u8], extension: &str, unix_millis: i128) -> String {
    let digest = Sha256::digest(bytes);
    let mut hash = String::with_capacity(12);
    for byte in digest.iter().take(6) {
        let _ = write!(&mut hash, "{byte:02x}");
    }
    format!("{unix_millis}-{hash}.{extension}")
}

impl AdminBackend for RestClient {
    fn list_users(&self, query: &ListQuery) -> Result<Page<User>> {
        self.list_rows(USERS_TABLE, ALL_COLUMNS, query, User::FIELDS)
    }

    fn get_user(&self, id: &UserId) -> Result<User> {
        self.fetch_one(USERS_TABLE, ALL_COLUMNS, "id", id.as_str())
    }

    fn create_user(&self, input: &UserInput) -> Result<User> {
        self.insert_row(USERS_TABLE, ALL_COLUMNS, input)
    }

    fn update_user(&self, id: &UserId, input: &UserInput) -> Result<User> {
        self.update_row(USERS_TABLE, ALL_COLUMNS, id.as_str(), input)
    }

    fn delete_user(&self, id: &UserId) -> Result<()> {
        self.delete_rows(USERS_TABLE, &[id.to_string()])
    }

    fn delete_users(&self, ids: &[UserId]) -> Result<()> {
        let ids: Vec<String> = ids.iter().map(UserId::to_string).collect();
        self.delete_rows(USERS_TABLE, &ids)
    }

    fn list_events(&self, query: &ListQuery) -> Result<Page<Event>> {
        self.list_rows(EVENTS_TABLE, EVENT_SELECT, query, Event::FIELDS)
    }

    fn get_event(&self, id: EventId) -> Result<Event> {
        self.fetch_one(EVENTS_TABLE, EVENT_SELECT, "id", &id.to_string())
    }

    fn get_event_by_slug(&self, slug: &str) -> Result<Event> {
        self.fetch_one(EVENTS_TABLE, EVENT_SELECT, "slug", slug)
    }

    fn create_event(&self, input: &EventInput) -> Result<Event> {
        self.insert_row(EVENTS_TABLE, EVENT_SELECT, input)
    }

    fn update_event(&self, id: EventId, input: &EventInput) -> Result<Event> {
        self.update_row(EVENTS_TABLE, EVENT_SELECT, &id.to_string(), input)
    }

    fn delete_event(&self, id: EventId) -> Result<()> {
        self.delete_rows(EVENTS_TABLE, &[id.to_string()])
    }

    fn delete_events(&self, ids: &[EventId]) -> Result<()> {
        let ids: Vec<String> = ids.iter().map(EventId::to_string).collect();
        self.delete_rows(EVENTS_TABLE, &ids)
    }

    fn add_event_image(&self, input: &NewEventImage) -> Result<EventImage> {
        self.insert_row(EVENT_IMAGES_TABLE, ALL_COLUMNS, input)
    }

    fn update_event_image(
        &self,
        id: EventImageId,
        update: &EventImageUpdate,
    ) -> Result<EventImage> {
        self.update_row(EVENT_IMAGES_TABLE, ALL_COLUMNS, &id.to_string(), update)
    }

    fn delete_event_image(&self, id: EventImageId) -> Result<()> {
        self.delete_rows(EVENT_IMAGES_TABLE, &[id.to_string()])
    }

    fn add_event_document(&self, input: &NewEventDocument) -> Result<EventDocument> {
        self.insert_row(EVENT_DOCUMENTS_TABLE, ALL_COLUMNS, input)
    }

    fn update_event_document(
        &self,
        id: EventDocumentId,
        update: &EventDocumentUpdate,
    ) -> Result<EventDocument> {
        self.update_row(EVENT_DOCUMENTS_TABLE, ALL_COLUMNS, &id.to_string(), update)
    }

    fn delete_event_document(&self, id: EventDocumentId) -> Result<()> {
        self.delete_rows(EVENT_DOCUMENTS_TABLE, &[id.to_string()])
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: i64,
    expires_at: Option<i64>,
    user: UserResponse,
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    id: String,
    #[serde(default)]
    email: Option<String>,
}

impl From<UserResponse> for AuthUser {
    fn from(user: UserResponse) -> Self {
        Self {
            id: user.id,
            email: user.email.unwrap_or_default(),
        }
    }
}

impl AuthProvider for RestClient {
    fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let mut url = self.endpoint("auth/v1/token")?;
        url.query_pairs_mut().append_pair("grant_type", "password");
        let request = self
            .with_token(Method::POST, url, &self.anon_key)
            .json(&serde_json::json!({ "email": email.trim(), "password": password }));
        let response = self.send(request).context("sign in")?;
        let token: TokenResponse = response.json().context("decode sign-in response")?;

        let expires_at = match token.expires_at {
            Some(epoch) => OffsetDateTime::from_unix_timestamp(epoch)
                .context("sign-in response has an invalid expiry")?,
            None => OffsetDateTime::now_utc() + time::Duration::seconds(token.expires_in),
        };
        let session = Session {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_at,
            user: token.user.into(),
        };
        tracing::info!(user = %session.user.email, "signed in");
        Ok(session)
    }

    fn sign_out(&self, session: &Session) -> Result<()> {
        let url = self.endpoint("auth/v1/logout")?;
        self.send(self.with_token(Method::POST, url, &session.access_token))
            .context("sign out")?;
        tracing::info!(user = %session.user.email, "signed out");
        Ok(())
    }

    fn current_user(&self, session: &Session) -> Result<AuthUser> {
        let url = self.endpoint("auth/v1/user")?;
        let response = self.send(self.with_token(Method::GET, url, &session.access_token))?;
        let user: UserResponse = response.json().context("decode current user")?;
        Ok(user.into())
    }
}

#[cfg(test)]
mod tests {
    use super::{object_name, parse_content_range};

    #[test]
    fn content_range_totals() {
        assert_eq!(parse_content_range("0-9/42"), Some(42));
        assert_eq!(parse_content_range("*/0"), Some(0));
        assert_eq!(parse_content_range("0-9/*"), None);
        assert_eq!(parse_content_range("garbage"), None);
    }

    #[test]
    fn object_names_carry_time_and_hash() {
        let name = object_name(b"avatar", "png", 1_700_000_000_123);
        let (millis, rest) = name.split_once('-').expect("dash separator");
        assert_eq!(millis, "1700000000123");
        assert_eq!(rest.len(), "0123456789ab.png".len());
        assert!(rest.ends_with(".png"));
        assert_ne!(name, object_name(b"other", "png", 1_700_000_000_123));
    }
}
