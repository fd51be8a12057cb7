// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::io::Read;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use anyhow::{Result, anyhow};
use evadmin_app::validation::FileValidationError;
use evadmin_app::{AdminBackend, AuthProvider, ListQuery, SortDirection, UserId, UserInput};
use evadmin_backend::{FaceClient, FaceEnrollment, RestClient, TaskState};
use serde_json::{Map, Value};
use tiny_http::{Header, Response, Server};
use url::Url;

struct Reply {
    status: u16,
    body: &'static str,
    headers: Vec<(&'static str, &'static str)>,
}

impl Reply {
    fn json(body: &'static str) -> Self {
        Self {
            status: 200,
            body,
            headers: Vec::new(),
        }
    }
}

#[derive(Debug)]
struct Captured {
    method: String,
    path: String,
    query: Vec<(String, String)>,
    headers: Vec<(String, String)>,
    body: String,
}

impl Captured {
    fn param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    fn json_body(&self) -> Value {
        serde_json::from_str(&self.body).expect("request body should be JSON")
    }
}

fn mock(replies: Vec<Reply>) -> Result<(String, JoinHandle<Vec<Captured>>)> {
    let server =
        Server::http("127.0.0.1:0").map_err(|error| anyhow!("start mock server: {error}"))?;
    let addr = format!("http://{}", server.server_addr());

    let handle = thread::spawn(move || {
        let mut captured = Vec::new();
        for reply in replies {
            let mut request = server.recv().expect("request expected");
            let mut body = String::new();
            request
                .as_reader()
                .read_to_string(&mut body)
                .expect("request body should be readable");
            let url = Url::parse(&format!("http://mock{}", request.url())).expect("valid url");
            captured.push(Captured {
                method: request.method().to_string(),
                path: url.path().to_owned(),
                query: url
                    .query_pairs()
                    .map(|(key, value)| (key.into_owned(), value.into_owned()))
                    .collect(),
                headers: request
                    .headers()
                    .iter()
                    .map(|header| (header.field.to_string(), header.value.to_string()))
                    .collect(),
                body,
            });

            let mut response = Response::from_string(reply.body)
                .with_status_code(reply.status)
                .with_header(
                    Header::from_bytes("Content-Type", "application/json")
                        .expect("valid content type header"),
                );
            for (name, value) in reply.headers {
                response = response
                    .with_header(Header::from_bytes(name, value).expect("valid header"));
            }
            request.respond(response).expect("response should succeed");
        }
        captured
    });

    Ok((addr, handle))
}

fn client(addr: &str) -> Result<RestClient> {
    RestClient::new(addr, "anon-key", Duration::from_secs(2))
}

const USER_ROW: &str = r#"[{
    "id": "9f0e2c1a-0000-4000-8000-000000000001",
    "full_name": "Nguyễn Văn A",
    "email": "nguyenvana@example.com",
    "position": "Nhân viên",
    "avatar_image_url": "",
    "metadata": {},
    "created_at": "2025-03-01T08:00:00+00:00",
    "updated_at": "2025-03-01T08:00:00+00:00"
}]"#;

#[test]
fn unreachable_backend_error_is_actionable() {
    let client = RestClient::new("http://127.0.0.1:1", "anon-key", Duration::from_millis(50))
        .expect("client should initialize");
    let error = client
        .list_users(&ListQuery::default())
        .expect_err("list should fail for unreachable endpoint");
    let message = error.to_string();
    assert!(message.contains("127.0.0.1:1"), "{message}");
}

#[test]
fn client_requires_url_and_key() {
    assert!(RestClient::new("", "key", Duration::from_secs(1)).is_err());
    assert!(RestClient::new("http://localhost", " ", Duration::from_secs(1)).is_err());
}

#[test]
fn list_users_sends_filters_and_reads_total() -> Result<()> {
    let (addr, handle) = mock(vec![Reply {
        status: 206,
        body: USER_ROW,
        headers: vec![("Content-Range", "10-10/21")],
    }])?;

    let mut query = ListQuery::page(2, 10);
    query.search = Some("van".to_owned());
    query.search_column = Some("full_name".to_owned());
    query
        .column_filters
        .insert("position".to_owned(), "Nhân viên".to_owned());
    query.sort_column = Some("email".to_owned());
    query.sort_direction = Some(SortDirection::Desc);

    let page = client(&addr)?.list_users(&query)?;
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.total_count, 21);
    assert_eq!(page.total_pages, 3);
    assert_eq!(page.current_page, 2);

    let requests = handle.join().expect("server thread should join");
    let request = &requests[0];
    assert_eq!(request.method, "GET");
    assert_eq!(request.path, "/rest/v1/users");
    assert_eq!(request.param("select"), Some("*"));
    assert_eq!(request.param("full_name"), Some("like.*van*"));
    assert_eq!(request.param("position"), Some("eq.Nhân viên"));
    assert_eq!(request.param("order"), Some("email.desc"));
    assert_eq!(request.param("offset"), Some("10"));
    assert_eq!(request.param("limit"), Some("10"));
    assert_eq!(request.header("prefer"), Some("count=exact"));
    assert_eq!(request.header("apikey"), Some("anon-key"));
    assert_eq!(request.header("authorization"), Some("Bearer anon-key"));
    Ok(())
}

#[test]
fn list_defaults_to_newest_first() -> Result<()> {
    let (addr, handle) = mock(vec![Reply {
        status: 200,
        body: "[]",
        headers: vec![("Content-Range", "*/0")],
    }])?;
    let page = client(&addr)?.list_events(&ListQuery::default())?;
    assert!(page.items.is_empty());
    assert_eq!(page.total_pages, 0);

    let requests = handle.join().expect("server thread should join");
    assert_eq!(requests[0].param("order"), Some("created_at.desc"));
    assert_eq!(
        requests[0].param("select"),
        Some("*,images:event_images(*),documents:event_documents(*)")
    );
    Ok(())
}

#[test]
fn unknown_filter_column_is_rejected_locally() -> Result<()> {
    let client = RestClient::new("http://127.0.0.1:1", "anon-key", Duration::from_millis(50))?;
    let mut query = ListQuery::default();
    query
        .column_filters
        .insert("password".to_owned(), "x".to_owned());
    let error = client.list_users(&query).expect_err("column not allowed");
    assert!(error.to_string().contains("password"));
    Ok(())
}

#[test]
fn sign_in_then_requests_use_the_access_token() -> Result<()> {
    let (addr, handle) = mock(vec![
        Reply::json(
            r#"{"access_token":"access-1","refresh_token":"refresh-1","expires_in":3600,
                "expires_at":1900000000,"token_type":"bearer",
                "user":{"id":"admin-1","email":"admin@example.com"}}"#,
        ),
        Reply::json(USER_ROW),
    ])?;

    let mut client = client(&addr)?;
    let session = client.sign_in(" admin@example.com ", "secret")?;
    assert_eq!(session.user.email, "admin@example.com");
    assert_eq!(session.expires_at.unix_timestamp(), 1_900_000_000);

    client.set_session(Some(&session));
    let user = client.create_user(&UserInput {
        full_name: "Nguyễn Văn A".to_owned(),
        email: "nguyenvana@example.com".to_owned(),
        position: "Nhân viên".to_owned(),
        avatar_image_url: String::new(),
        metadata: Map::new(),
    })?;
    assert_eq!(user.full_name, "Nguyễn Văn A");

    let requests = handle.join().expect("server thread should join");
    assert_eq!(requests[0].path, "/auth/v1/token");
    assert_eq!(requests[0].param("grant_type"), Some("password"));
    assert_eq!(requests[0].json_body()["email"], "admin@example.com");

    assert_eq!(requests[1].method, "POST");
    assert_eq!(requests[1].path, "/rest/v1/users");
    assert_eq!(requests[1].header("authorization"), Some("Bearer access-1"));
    assert_eq!(requests[1].header("prefer"), Some("return=representation"));
    assert_eq!(requests[1].json_body()["metadata"], serde_json::json!({}));
    Ok(())
}

#[test]
fn bad_credentials_surface_the_server_message() -> Result<()> {
    let (addr, handle) = mock(vec![Reply {
        status: 400,
        body: r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#,
        headers: Vec::new(),
    }])?;
    let error = client(&addr)?
        .sign_in("admin@example.com", "wrong")
        .expect_err("bad password");
    assert!(format!("{error:#}").contains("Invalid login credentials"));
    handle.join().expect("server thread should join");
    Ok(())
}

#[test]
fn bulk_delete_uses_in_filter() -> Result<()> {
    let (addr, handle) = mock(vec![Reply::json("")])?;
    client(&addr)?.delete_users(&[UserId::from("a"), UserId::from("b")])?;
    client(&addr)?.delete_users(&[])?;

    let requests = handle.join().expect("server thread should join");
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, "DELETE");
    assert_eq!(requests[0].param("id"), Some(r#"in.("a","b")"#));
    Ok(())
}

#[test]
fn upload_validates_before_any_request() {
    let client = RestClient::new("http://127.0.0.1:1", "anon-key", Duration::from_millis(50))
        .expect("client should initialize");
    let error = client
        .upload_file(b"%PDF", "cv.pdf", "application/pdf", "avatars", "users", |_| {})
        .expect_err("pdf is rejected");
    assert!(matches!(
        error.downcast_ref::<FileValidationError>(),
        Some(FileValidationError::NotAnImage(_))
    ));
}

#[test]
fn upload_stores_object_and_returns_public_url() -> Result<()> {
    let (addr, handle) = mock(vec![Reply::json(r#"{"Key":"avatars/users/x.png"}"#)])?;
    let mut seen = Vec::new();
    let stored = client(&addr)?.upload_file(
        b"png-bytes",
        "face.png",
        "image/png",
        "avatars",
        "users",
        |progress| seen.push(progress.percentage),
    )?;
    assert!(stored.path.starts_with("users/"));
    assert!(stored.path.ends_with(".png"));
    assert_eq!(
        stored.url,
        format!("{addr}/storage/v1/object/public/avatars/{}", stored.path)
    );
    assert_eq!(seen, vec![0, 100]);

    let requests = handle.join().expect("server thread should join");
    assert_eq!(
        requests[0].path,
        format!("/storage/v1/object/avatars/{}", stored.path)
    );
    assert_eq!(requests[0].header("x-upsert"), Some("false"));
    assert_eq!(requests[0].header("cache-control"), Some("max-age=3600"));
    assert_eq!(requests[0].body, "png-bytes");
    Ok(())
}

#[test]
fn face_batch_register_posts_users() -> Result<()> {
    let (addr, handle) = mock(vec![Reply::json(
        r#"{"task_id":"t-1","message":"queued","total_users":1}"#,
    )])?;
    let face = FaceClient::new(&addr, Duration::from_secs(2))?;
    let job = face.batch_register(&[FaceEnrollment {
        user_id: UserId::from("u-1"),
        avatar_image_url: "https://cdn.example.com/a.png".to_owned(),
    }])?;
    assert_eq!(job.task_id, "t-1");
    assert_eq!(job.total_users, 1);

    let requests = handle.join().expect("server thread should join");
    assert_eq!(requests[0].path, "/faces/batch-register");
    assert_eq!(
        requests[0].json_body(),
        serde_json::json!({"users":[{"user_id":"u-1","avatar_image_url":"https://cdn.example.com/a.png"}]})
    );
    Ok(())
}

#[test]
fn face_batch_delete_and_task_status() -> Result<()> {
    let (addr, handle) = mock(vec![
        Reply::json(r#"{"task_id":"t-2","message":"queued","total_users":2}"#),
        Reply::json(
            r#"{"task_id":"t-2","status":"completed","progress":100.0,"total_items":2,
                "completed_items":2,"failed_items":0,"results":[{"user_id":"a"}],
                "created_at":"2025-01-01T00:00:00Z","updated_at":"2025-01-01T00:00:05Z"}"#,
        ),
    ])?;
    let face = FaceClient::new(&addr, Duration::from_secs(2))?;
    face.batch_delete(&[UserId::from("a"), UserId::from("b")])?;
    let status = face.task_status("t-2")?;
    assert_eq!(status.status, TaskState::Completed);
    assert!(status.is_finished());
    assert_eq!(status.results.as_ref().map(Vec::len), Some(1));

    let requests = handle.join().expect("server thread should join");
    assert_eq!(requests[0].json_body(), serde_json::json!({"user_ids":["a","b"]}));
    assert_eq!(requests[1].path, "/faces/task-status/t-2");
    Ok(())
}

#[test]
fn drive_conversion_reports_detail() -> Result<()> {
    let (addr, handle) = mock(vec![Reply {
        status: 400,
        body: r#"{"detail":"Invalid Google Drive URL"}"#,
        headers: Vec::new(),
    }])?;
    let face = FaceClient::new(&addr, Duration::from_secs(2))?;
    let error = face
        .convert_drive_url("https://example.com/not-drive")
        .expect_err("server rejects the link");
    assert!(error.to_string().contains("Invalid Google Drive URL"));
    handle.join().expect("server thread should join");
    Ok(())
}
