// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::time::Duration;

use anyhow::{Context, Result, bail};
use evadmin_app::UserId;
use reqwest::blocking::Client as HttpClient;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{clean_error_response, connection_error};

/// One user/avatar pair submitted for face enrollment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FaceEnrollment {
    pub user_id: UserId,
    pub avatar_image_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BatchJob {
    pub task_id: String,
    pub message: String,
    pub total_users: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    Processing,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TaskStatus {
    pub task_id: String,
    pub status: TaskState,
    pub progress: f64,
    pub total_items: u64,
    pub completed_items: u64,
    pub failed_items: u64,
    #[serde(default)]
    pub results: Option<Vec<Map<String, Value>>>,
    #[serde(default)]
    pub error_message: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl TaskStatus {
    pub fn is_finished(&self) -> bool {
        self.status != TaskState::Processing
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DriveUpload {
    pub success: bool,
    pub public_url: String,
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub message: String,
}

#[derive(Serialize)]
struct EnrollmentBatch<'a> {
    users: &'a [FaceEnrollment],
}

#[derive(Serialize)]
struct DeleteBatch<'a> {
    user_ids: &'a [UserId],
}

/// Client for the face-recognition service. Jobs are queued server side;
/// this only submits them and reads their status.
#[derive(Debug, Clone)]
pub struct FaceClient {
    base_url: String,
    timeout: Duration,
    http: HttpClient,
}

impl FaceClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = base_url.trim_end_matches('/').to_owned();
        if base_url.is_empty() {
            bail!("face_api.base_url must not be empty");
        }

        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("build HTTP client")?;

        Ok(Self {
            base_url,
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

    /// Copies a shared-drive image into hosted storage and returns its
    /// public URL.
    pub fn convert_drive_url(&self, drive_url: &str) -> Result<DriveUpload> {
        let upload: DriveUpload = self.post(
            "images/process-drive-url",
            &serde_json::json!({ "drive_url": drive_url }),
        )?;
        if !upload.success || upload.public_url.is_empty() {
            bail!("drive link was not converted: {}", upload.message);
        }
        tracing::debug!(url = %upload.public_url, "drive link converted");
        Ok(upload)
    }

    pub fn batch_register(&self, users: &[FaceEnrollment]) -> Result<BatchJob> {
        self.submit("faces/batch-register", &EnrollmentBatch { users })
    }

    pub fn batch_update(&self, users: &[FaceEnrollment]) -> Result<BatchJob> {
        self.submit("faces/batch-update", &EnrollmentBatch { users })
    }

    pub fn batch_delete(&self, user_ids: &[UserId]) -> Result<BatchJob> {
        self.submit("faces/batch-delete", &DeleteBatch { user_ids })
    }

    pub fn task_status(&self, task_id: &str) -> Result<TaskStatus> {
        let response = self
            .http
            .get(format!("{}/faces/task-status/{task_id}", self.base_url))
            .send()
            .map_err(|error| connection_error(&self.base_url, error))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(clean_error_response(status, &body));
        }
        response.json().context("decode task status")
    }

    fn submit<B: Serialize>(&self, path: &str, body: &B) -> Result<BatchJob> {
        let job: BatchJob = self.post(path, body)?;
        tracing::info!(
            endpoint = path,
            task_id = %job.task_id,
            total = job.total_users,
            "face job submitted"
        );
        Ok(job)
    }

    fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let response = self
            .http
            .post(format!("{}/{path}", self.base_url))
            .json(body)
            .send()
            .map_err(|error| connection_error(&self.base_url, error))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(clean_error_response(status, &body));
        }
        response
            .json()
            .with_context(|| format!("decode {path} response"))
    }
}
