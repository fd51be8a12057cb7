// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use evadmin_app::validation::{file_extension, mime_for_extension, validate_image_upload};
use evadmin_app::{
    AdminBackend, AuthProvider, AuthUser, Event, EventId, EventInput, ImportProgress,
    ImportReport, ImportTarget, ListQuery, Page, SessionContext, User, UserId, UserInput,
    run_user_import, validate_import_file_name,
};
use evadmin_backend::{BatchJob, FaceClient, FaceEnrollment, RestClient};
use evadmin_db::Store;
use evadmin_testkit::AdminFaker;
use evadmin_tui::Outcome;
use std::fs;
use std::path::{Path, PathBuf};
use time::OffsetDateTime;

pub const DEMO_OPERATOR_EMAIL: &str = "demo@evadmin.local";
pub const DEMO_OPERATOR_PASSWORD: &str = "demo";

const DEMO_SEED: u64 = 20_260_219;
const DEMO_USERS: usize = 36;
const DEMO_EVENTS: usize = 12;

/// Runtime behind the dashboard. Rows go to the hosted backend when one is
/// configured and to the local store otherwise; the local store always
/// keeps the persisted session.
pub struct AdminRuntime {
    store: Store,
    remote: Option<RestClient>,
    face: Option<FaceClient>,
    avatar_bucket: String,
    avatar_folder: String,
    template_dir: PathBuf,
    session: SessionContext,
}

impl AdminRuntime {
    pub fn local(store: Store) -> Result<Self> {
        Self::build(store, None)
    }

    pub fn remote(store: Store, client: RestClient) -> Result<Self> {
        Self::build(store, Some(client))
    }

    fn build(store: Store, remote: Option<RestClient>) -> Result<Self> {
        let persisted = store.load_session()?;
        Ok(Self {
            store,
            remote,
            face: None,
            avatar_bucket: "avatars".to_owned(),
            avatar_folder: "users".to_owned(),
            template_dir: PathBuf::from("."),
            session: SessionContext::init(persisted, OffsetDateTime::now_utc()),
        })
    }

    pub fn with_face_client(mut self, face: Option<FaceClient>) -> Self {
        self.face = face;
        self
    }

    pub fn with_avatar_storage(mut self, bucket: &str, folder: &str) -> Self {
        bucket.clone_into(&mut self.avatar_bucket);
        folder.clone_into(&mut self.avatar_folder);
        self
    }

    pub fn with_template_dir(mut self, dir: PathBuf) -> Self {
        self.template_dir = dir;
        self
    }

    fn backend(&self) -> &dyn AdminBackend {
        match &self.remote {
            Some(client) => client,
            None => &self.store,
        }
    }

    fn auth(&self) -> &dyn AuthProvider {
        match &self.remote {
            Some(client) => client,
            None => &self.store,
        }
    }

    fn attach_session(&mut self) {
        let session = self.session.current().cloned();
        if let Some(client) = self.remote.as_mut() {
            client.set_session(session.as_ref());
        }
    }

    /// Submits a face job and turns a failure into a warning. The row
    /// change that triggered it stays in place either way.
    fn face_job<F>(&self, label: &str, submit: F) -> Option<String>
    where
        F: FnOnce(&FaceClient) -> Result<BatchJob>,
    {
        let face = self.face.as_ref()?;
        match submit(face) {
            Ok(job) => {
                tracing::info!(task = %job.task_id, users = job.total_users, "face {label} queued");
                None
            }
            Err(error) => {
                tracing::warn!(error = %format!("{error:#}"), "face {label} failed");
                Some(format!("face {label} failed: {error:#}"))
            }
        }
    }

    fn enroll(&self, user: &User, update: bool) -> Option<String> {
        if user.avatar_image_url.trim().is_empty() {
            return None;
        }
        let enrollment = [FaceEnrollment {
            user_id: user.id.clone(),
            avatar_image_url: user.avatar_image_url.clone(),
        }];
        if update {
            self.face_job("update", |face| face.batch_update(&enrollment))
        } else {
            self.face_job("registration", |face| face.batch_register(&enrollment))
        }
    }
}

impl evadmin_tui::AppRuntime for AdminRuntime {
    fn restored_user(&mut self) -> Option<AuthUser> {
        let session = self.session.current()?.clone();
        match self.auth().current_user(&session) {
            Ok(user) => {
                self.attach_session();
                tracing::info!(email = %user.email, "session restored");
                Some(user)
            }
            Err(error) => {
                tracing::warn!(error = %format!("{error:#}"), "saved session rejected");
                self.session.end();
                if let Err(error) = self.store.clear_session() {
                    tracing::warn!(%error, "could not clear saved session");
                }
                None
            }
        }
    }

    fn sign_in(&mut self, email: &str, password: &str) -> Result<AuthUser> {
        if email.trim().is_empty() || password.is_empty() {
            bail!("enter both email and password");
        }
        let session = self.auth().sign_in(email, password)?;
        self.store.save_session(&session)?;
        let user = session.user.clone();
        self.session.begin(session);
        self.attach_session();
        Ok(user)
    }

    fn sign_out(&mut self) -> Result<()> {
        let Some(session) = self.session.end() else {
            return Ok(());
        };
        if let Err(error) = self.auth().sign_out(&session) {
            tracing::warn!(error = %format!("{error:#}"), "remote sign-out failed");
        }
        self.attach_session();
        self.store.clear_session()
    }

    fn list_users(&mut self, query: &ListQuery) -> Result<Page<User>> {
        self.session.require()?;
        self.backend().list_users(query)
    }

    fn list_events(&mut self, query: &ListQuery) -> Result<Page<Event>> {
        self.session.require()?;
        self.backend().list_events(query)
    }

    fn create_user(&mut self, input: &UserInput) -> Result<Outcome<User>> {
        self.session.require()?;
        let user = self.backend().create_user(input)?;
        let warning = self.enroll(&user, false);
        Ok(Outcome::new(user).with_warning(warning))
    }

    fn update_user(&mut self, id: &UserId, input: &UserInput) -> Result<Outcome<User>> {
        self.session.require()?;
        let user = self.backend().update_user(id, input)?;
        let warning = self.enroll(&user, true);
        Ok(Outcome::new(user).with_warning(warning))
    }

    fn delete_users(&mut self, ids: &[UserId]) -> Result<Outcome<()>> {
        self.session.require()?;
        self.backend().delete_users(ids)?;
        let warning = self.face_job("removal", |face| face.batch_delete(ids));
        Ok(Outcome::new(()).with_warning(warning))
    }

    fn create_event(&mut self, input: &EventInput) -> Result<Event> {
        self.session.require()?;
        self.backend().create_event(input)
    }

    fn update_event(&mut self, id: EventId, input: &EventInput) -> Result<Event> {
        self.session.require()?;
        self.backend().update_event(id, input)
    }

    fn delete_events(&mut self, ids: &[EventId]) -> Result<()> {
        self.session.require()?;
        self.backend().delete_events(ids)
    }

    fn upload_avatar(&mut self, path: &Path) -> Result<String> {
        self.session.require()?;
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or_else(|| anyhow!("{} has no usable file name", path.display()))?;
        let mime_type = file_extension(file_name)
            .and_then(|extension| mime_for_extension(&extension))
            .unwrap_or("application/octet-stream");
        let bytes = fs::read(path).with_context(|| format!("read {}", path.display()))?;

        match &self.remote {
            Some(client) => {
                let stored = client.upload_file(
                    &bytes,
                    file_name,
                    mime_type,
                    &self.avatar_bucket,
                    &self.avatar_folder,
                    |progress| {
                        tracing::debug!(
                            loaded = progress.loaded,
                            total = progress.total,
                            "avatar upload {}%",
                            progress.percentage
                        );
                    },
                )?;
                Ok(stored.url)
            }
            None => {
                validate_image_upload(file_name, mime_type, bytes.len())?;
                let absolute = path
                    .canonicalize()
                    .with_context(|| format!("resolve {}", path.display()))?;
                Ok(format!("file://{}", absolute.display()))
            }
        }
    }

    fn import_users(
        &mut self,
        path: &Path,
        progress: &mut dyn FnMut(ImportProgress),
    ) -> Result<ImportReport> {
        self.session.require()?;
        validate_import_file_name(path)?;
        let records = evadmin_sheet::read_user_records(path)?;
        tracing::info!(path = %path.display(), rows = records.len(), "user import started");
        run_user_import(self, &records, |step| progress(step))
    }

    fn write_template(&mut self) -> Result<PathBuf> {
        let path = self.template_dir.join(evadmin_sheet::TEMPLATE_FILE_NAME);
        evadmin_sheet::write_user_template(&path)?;
        Ok(path)
    }
}

impl ImportTarget for AdminRuntime {
    fn convert_avatar_url(&mut self, raw_url: &str) -> Result<String> {
        let Some(face) = self.face.as_ref() else {
            bail!("drive links need the face API; enable [face_api] and retry");
        };
        Ok(face.convert_drive_url(raw_url)?.public_url)
    }

    fn create_user(&mut self, input: &UserInput) -> Result<User> {
        let user = self.backend().create_user(input)?;
        if let Some(warning) = self.enroll(&user, false) {
            tracing::warn!(user = %user.id, "{warning}");
        }
        Ok(user)
    }
}

/// Fills an empty store with a deterministic roster and adds the demo
/// operator account.
pub fn seed_demo_data(store: &Store) -> Result<()> {
    if store.is_empty()? {
        let mut faker = AdminFaker::new(DEMO_SEED);
        let mut user_ids = Vec::with_capacity(DEMO_USERS);
        for input in faker.users(DEMO_USERS) {
            user_ids.push(store.create_user(&input)?.id);
        }
        for (index, chunk) in user_ids.chunks(DEMO_USERS / DEMO_EVENTS).enumerate() {
            let attendees = if index % 3 == 0 { &[][..] } else { chunk };
            store.create_event(&faker.event_with_users(attendees))?;
        }
        tracing::info!(users = DEMO_USERS, events = DEMO_EVENTS, "demo data seeded");
    }
    store.seed_operator(DEMO_OPERATOR_EMAIL, DEMO_OPERATOR_PASSWORD)?;
    Ok(())
}
