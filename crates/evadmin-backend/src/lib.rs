// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! Blocking HTTP clients for the hosted data service and the face API.

mod face;
mod rest;

pub use face::{BatchJob, DriveUpload, FaceClient, FaceEnrollment, TaskState, TaskStatus};
pub use rest::{RestClient, StoredFile, UploadProgress, object_name, parse_content_range};

use anyhow::anyhow;
use reqwest::StatusCode;
use serde::Deserialize;

fn connection_error(base_url: &str, error: reqwest::Error) -> anyhow::Error {
    if error.is_timeout() {
        return anyhow!("{base_url} timed out -- raise the timeout in the config or retry");
    }
    anyhow!(
        "cannot reach {} -- check the url in the config and your network ({})",
        base_url,
        error
    )
}

/// Error bodies seen across the services: the query API sends `message`,
/// auth sends `error_description` or `msg`, the face API sends `detail`.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    message: Option<String>,
    error_description: Option<String>,
    msg: Option<String>,
    detail: Option<serde_json::Value>,
    error: Option<serde_json::Value>,
}

fn clean_error_response(status: StatusCode, body: &str) -> anyhow::Error {
    if let Ok(parsed) = serde_json::from_str::<ErrorEnvelope>(body) {
        let detail = parsed.detail.as_ref().map(|detail| match detail {
            serde_json::Value::String(text) => text.clone(),
            other => other.to_string(),
        });
        let error = parsed.error.as_ref().and_then(|error| error.as_str().map(str::to_owned));
        let message = parsed
            .message
            .or(parsed.error_description)
            .or(parsed.msg)
            .or(detail)
            .or(error)
            .filter(|message| !message.is_empty());
        if let Some(message) = message {
            return anyhow!("server error ({}): {}", status.as_u16(), message);
        }
    }

    if body.len() < 100 && !body.contains('{') && !body.trim().is_empty() {
        return anyhow!("server error ({}): {}", status.as_u16(), body.trim());
    }

    anyhow!("server returned {}", status.as_u16())
}
