// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow};
use std::fs::{self, OpenOptions};
use std::io;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt, layer::SubscriberExt};

/// Where log lines go. The dashboard owns the terminal, so interactive
/// runs log to a file.
pub enum LogTarget<'a> {
    File(&'a Path),
    Stderr,
}

/// `EVADMIN_LOG` wins over the configured level.
pub fn filter_for(level: &str) -> EnvFilter {
    EnvFilter::try_from_env("EVADMIN_LOG").unwrap_or_else(|_| EnvFilter::new(level))
}

pub fn start_logging(level: &str, target: LogTarget<'_>) -> Result<()> {
    let filter = filter_for(level);
    match target {
        LogTarget::File(path) => {
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
            {
                fs::create_dir_all(parent)
                    .with_context(|| format!("create log directory {}", parent.display()))?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("open log file {}", path.display()))?;
            let subscriber = Registry::default().with(
                fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file))
                    .with_filter(filter),
            );
            tracing::subscriber::set_global_default(subscriber)
                .map_err(|error| anyhow!("install log subscriber: {error}"))?;
        }
        LogTarget::Stderr => {
            let subscriber = Registry::default().with(
                fmt::layer()
                    .without_time()
                    .with_writer(io::stderr)
                    .with_filter(filter),
            );
            tracing::subscriber::set_global_default(subscriber)
                .map_err(|error| anyhow!("install log subscriber: {error}"))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::filter_for;
    use crate::config::tests::env_lock;

    #[test]
    fn configured_level_becomes_the_filter() {
        let _guard = env_lock();
        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::remove_var("EVADMIN_LOG");
        }
        assert_eq!(filter_for("debug").to_string(), "debug");
    }

    #[test]
    fn log_env_overrides_configured_level() {
        let _guard = env_lock();
        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::set_var("EVADMIN_LOG", "warn");
        }
        let filter = filter_for("debug").to_string();
        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::remove_var("EVADMIN_LOG");
        }
        assert_eq!(filter, "warn");
    }
}
