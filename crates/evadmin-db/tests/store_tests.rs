// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;
use evadmin_app::{
    AdminBackend, AuthProvider, AuthUser, EventDocumentUpdate, EventImageUpdate, ListQuery,
    NewEventDocument, NewEventImage, Session, SortDirection, UserId,
};
use evadmin_db::{Store, validate_db_path};
use evadmin_testkit::{AdminFaker, fixture_datetime, temp_db_path};
use serde_json::{Map, json};

fn bootstrapped() -> Result<Store> {
    let store = Store::open_memory()?;
    store.bootstrap()?;
    Ok(store)
}

#[test]
fn validate_db_path_rejects_uri_forms() {
    assert!(validate_db_path("file:test.db").is_err());
    assert!(validate_db_path("https://example.com/db.sqlite").is_err());
    assert!(validate_db_path("db.sqlite?mode=ro").is_err());
    assert!(validate_db_path("").is_err());
    assert!(validate_db_path("/tmp/evadmin.db").is_ok());
}

#[test]
fn bootstrap_is_idempotent_on_a_file() -> Result<()> {
    let (_dir, path) = temp_db_path()?;
    {
        let store = Store::open(&path)?;
        store.bootstrap()?;
        assert!(store.is_empty()?);
        store.create_user(&AdminFaker::new(1).user())?;
    }
    let store = Store::open(&path)?;
    store.bootstrap()?;
    assert!(!store.is_empty()?);
    Ok(())
}

#[test]
fn bootstrap_rejects_foreign_database() -> Result<()> {
    let store = Store::open_memory()?;
    store
        .raw_connection()
        .execute_batch("CREATE TABLE projects (id INTEGER PRIMARY KEY);")?;
    let error = store.bootstrap().expect_err("foreign schema");
    assert!(error.to_string().contains("missing required table `users`"));
    Ok(())
}

#[test]
fn bootstrap_rejects_table_missing_column() -> Result<()> {
    let store = bootstrapped()?;
    store.raw_connection().execute_batch(
        "
        DROP TABLE sessions;
        CREATE TABLE sessions (id INTEGER PRIMARY KEY, access_token TEXT);
        ",
    )?;
    let error = store.bootstrap().expect_err("missing columns");
    assert!(error.to_string().contains("refresh_token"), "{error}");
    Ok(())
}

#[test]
fn user_crud_round_trip() -> Result<()> {
    let store = bootstrapped()?;
    let mut input = AdminFaker::new(3).user();
    input.metadata = Map::from_iter([("team".to_owned(), json!("ops"))]);

    let created = store.create_user(&input)?;
    assert_eq!(created.id.as_str().len(), 36);
    assert_eq!(created.email, input.email);
    assert_eq!(created.metadata, input.metadata);
    assert_eq!(store.get_user(&created.id)?, created);

    input.position = "Giám đốc".to_owned();
    let updated = store.update_user(&created.id, &input)?;
    assert_eq!(updated.position, "Giám đốc");
    assert!(updated.updated_at >= created.updated_at);
    assert_eq!(updated.created_at, created.created_at);

    store.delete_user(&created.id)?;
    let error = store.get_user(&created.id).expect_err("deleted");
    assert!(error.to_string().contains("not found"));
    // Deleting again is a no-op.
    store.delete_user(&created.id)?;
    Ok(())
}

#[test]
fn duplicate_email_is_rejected() -> Result<()> {
    let store = bootstrapped()?;
    let input = AdminFaker::new(4).user();
    store.create_user(&input)?;
    let error = store.create_user(&input).expect_err("duplicate email");
    assert!(format!("{error:#}").contains("UNIQUE"), "{error:#}");
    Ok(())
}

#[test]
fn update_missing_user_fails() -> Result<()> {
    let store = bootstrapped()?;
    let input = AdminFaker::new(5).user();
    let error = store
        .update_user(&UserId::new("nope"), &input)
        .expect_err("no such user");
    assert_eq!(error.to_string(), "user nope not found");
    Ok(())
}

#[test]
fn list_users_pages_newest_first_by_default() -> Result<()> {
    let store = bootstrapped()?;
    let mut faker = AdminFaker::new(6);
    let mut created = Vec::new();
    for input in faker.users(12) {
        created.push(store.create_user(&input)?);
    }

    let first = store.list_users(&ListQuery::default())?;
    assert_eq!(first.total_count, 12);
    assert_eq!(first.total_pages, 2);
    assert_eq!(first.current_page, 1);
    assert_eq!(first.items.len(), 10);
    assert_eq!(first.items[0].id, created[11].id);

    let second = store.list_users(&ListQuery::page(2, 10))?;
    assert_eq!(second.items.len(), 2);
    assert_eq!(second.items[1].id, created[0].id);

    let beyond = store.list_users(&ListQuery::page(5, 10))?;
    assert!(beyond.items.is_empty());
    assert_eq!(beyond.total_count, 12);
    Ok(())
}

#[test]
fn list_users_searches_filters_and_sorts() -> Result<()> {
    let store = bootstrapped()?;
    let mut faker = AdminFaker::new(8);
    for (name, position) in [
        ("Lê Văn Nam", "Kỹ sư"),
        ("Trần Thị Lan", "Kế toán"),
        ("Nguyễn Văn An", "Kỹ sư"),
    ] {
        let mut input = faker.user();
        input.full_name = name.to_owned();
        input.position = position.to_owned();
        store.create_user(&input)?;
    }

    let query = ListQuery {
        search: Some("Văn".to_owned()),
        search_column: Some("full_name".to_owned()),
        sort_column: Some("full_name".to_owned()),
        ..ListQuery::default()
    };
    let page = store.list_users(&query)?;
    let names: Vec<_> = page.items.iter().map(|user| user.full_name.as_str()).collect();
    assert_eq!(names, vec!["Lê Văn Nam", "Nguyễn Văn An"]);

    // Case-sensitive, like the hosted service.
    let query = ListQuery {
        search: Some("văn".to_owned()),
        search_column: Some("full_name".to_owned()),
        ..ListQuery::default()
    };
    assert_eq!(store.list_users(&query)?.total_count, 0);

    let mut query = ListQuery {
        sort_column: Some("full_name".to_owned()),
        sort_direction: Some(SortDirection::Desc),
        ..ListQuery::default()
    };
    query
        .column_filters
        .insert("position".to_owned(), "Kỹ sư".to_owned());
    let page = store.list_users(&query)?;
    let names: Vec<_> = page.items.iter().map(|user| user.full_name.as_str()).collect();
    assert_eq!(names, vec!["Nguyễn Văn An", "Lê Văn Nam"]);
    assert_eq!(page.total_count, 2);
    Ok(())
}

#[test]
fn list_rejects_unknown_or_unsafe_columns() -> Result<()> {
    let store = bootstrapped()?;
    let query = ListQuery {
        sort_column: Some("metadata".to_owned()),
        ..ListQuery::default()
    };
    assert!(store.list_users(&query).is_err());

    let query = ListQuery {
        sort_column: Some("id; DROP TABLE users".to_owned()),
        ..ListQuery::default()
    };
    assert!(store.list_users(&query).is_err());
    assert!(store.list_users(&ListQuery::default()).is_ok());
    Ok(())
}

#[test]
fn bulk_delete_removes_only_given_users() -> Result<()> {
    let store = bootstrapped()?;
    let mut faker = AdminFaker::new(9);
    let mut ids = Vec::new();
    for input in faker.users(4) {
        ids.push(store.create_user(&input)?.id);
    }

    store.delete_users(&ids[1..3])?;
    let remaining: Vec<_> = store
        .list_users(&ListQuery::default())?
        .items
        .into_iter()
        .map(|user| user.id)
        .collect();
    assert_eq!(remaining, vec![ids[3].clone(), ids[0].clone()]);
    Ok(())
}

#[test]
fn event_crud_with_attendees_and_slug_lookup() -> Result<()> {
    let store = bootstrapped()?;
    let mut faker = AdminFaker::new(10);
    let user = store.create_user(&faker.user())?;
    let input = faker.event_with_users(std::slice::from_ref(&user.id));

    let event = store.create_event(&input)?;
    assert_eq!(event.slug, input.slug);
    assert_eq!(event.from_date, input.from_date);
    assert_eq!(event.user_ids, Some(vec![user.id.clone()]));
    assert!(event.updated_at.is_none());
    assert_eq!(store.get_event_by_slug(&input.slug)?.id, event.id);

    let mut changed = input.clone();
    changed.title = "Renamed".to_owned();
    changed.user_ids = None;
    let updated = store.update_event(event.id, &changed)?;
    assert_eq!(updated.title, "Renamed");
    assert!(updated.user_ids.is_none());
    assert!(updated.updated_at.is_some());

    let mut clash = faker.event();
    clash.slug = input.slug.clone();
    assert!(store.create_event(&clash).is_err());

    store.delete_event(event.id)?;
    assert!(store.get_event(event.id).is_err());
    Ok(())
}

#[test]
fn events_filter_on_public_flag() -> Result<()> {
    let store = bootstrapped()?;
    let mut faker = AdminFaker::new(12);
    let mut public = 0;
    for _ in 0..8 {
        let event = store.create_event(&faker.event())?;
        if event.is_public {
            public += 1;
        }
    }

    let mut query = ListQuery::default();
    query
        .column_filters
        .insert("is_public".to_owned(), "true".to_owned());
    let page = store.list_events(&query)?;
    assert_eq!(page.total_count, public);
    assert!(page.items.iter().all(|event| event.is_public));

    query
        .column_filters
        .insert("is_public".to_owned(), "false".to_owned());
    assert_eq!(store.list_events(&query)?.total_count, 8 - public);
    Ok(())
}

#[test]
fn event_children_load_and_cascade() -> Result<()> {
    let store = bootstrapped()?;
    let event = store.create_event(&AdminFaker::new(13).event())?;

    let image = store.add_event_image(&NewEventImage {
        event_id: event.id,
        raw_image_url: "https://cdn.example.com/raw.jpg".to_owned(),
        processed_image_url: None,
        metadata: None,
    })?;
    let image = store.update_event_image(
        image.id,
        &EventImageUpdate {
            processed_image_url: Some("https://cdn.example.com/done.jpg".to_owned()),
            metadata: None,
        },
    )?;
    assert_eq!(image.raw_image_url, "https://cdn.example.com/raw.jpg");
    assert_eq!(
        image.processed_image_url.as_deref(),
        Some("https://cdn.example.com/done.jpg")
    );

    let document = store.add_event_document(&NewEventDocument {
        event_id: event.id,
        title: "Agenda".to_owned(),
        description: None,
        document_url: "https://cdn.example.com/agenda.pdf".to_owned(),
        metadata: Some(Map::from_iter([("pages".to_owned(), json!(4))])),
    })?;
    let document = store.update_event_document(
        document.id,
        &EventDocumentUpdate {
            title: Some("Final agenda".to_owned()),
            ..EventDocumentUpdate::default()
        },
    )?;
    assert_eq!(document.title, "Final agenda");
    assert_eq!(document.document_url, "https://cdn.example.com/agenda.pdf");
    assert!(document.metadata.is_some());

    let loaded = store.get_event(event.id)?;
    assert_eq!(loaded.images, vec![image.clone()]);
    assert_eq!(loaded.documents, vec![document.clone()]);

    store.delete_events(&[event.id])?;
    let orphans: i64 = store.raw_connection().query_row(
        "SELECT (SELECT COUNT(*) FROM event_images) + (SELECT COUNT(*) FROM event_documents)",
        [],
        |row| row.get(0),
    )?;
    assert_eq!(orphans, 0);
    Ok(())
}

#[test]
fn image_for_missing_event_is_rejected() -> Result<()> {
    let store = bootstrapped()?;
    let result = store.add_event_image(&NewEventImage {
        event_id: 404.into(),
        raw_image_url: "https://cdn.example.com/raw.jpg".to_owned(),
        processed_image_url: None,
        metadata: None,
    });
    assert!(result.is_err());
    Ok(())
}

#[test]
fn session_persists_across_reopen() -> Result<()> {
    let (_dir, path) = temp_db_path()?;
    let session = Session {
        access_token: "access".to_owned(),
        refresh_token: "refresh".to_owned(),
        expires_at: fixture_datetime(),
        user: AuthUser {
            id: "op-1".to_owned(),
            email: "admin@example.com".to_owned(),
        },
    };
    {
        let store = Store::open(&path)?;
        store.bootstrap()?;
        assert_eq!(store.load_session()?, None);
        store.save_session(&session)?;
    }

    let store = Store::open(&path)?;
    store.bootstrap()?;
    assert_eq!(store.load_session()?, Some(session));
    store.clear_session()?;
    assert_eq!(store.load_session()?, None);
    Ok(())
}

#[test]
fn local_sign_in_checks_password() -> Result<()> {
    let store = bootstrapped()?;
    let operator = store.seed_operator("Admin@Example.com", "hunter2")?;
    assert_eq!(operator.email, "admin@example.com");

    let error = store
        .sign_in("admin@example.com", "wrong")
        .expect_err("bad password");
    assert_eq!(error.to_string(), "invalid login credentials");
    assert!(store.sign_in("nobody@example.com", "hunter2").is_err());

    let session = store.sign_in(" ADMIN@example.com ", "hunter2")?;
    assert_eq!(session.user, operator);
    assert_eq!(session.access_token.len(), 64);
    assert_ne!(session.access_token, session.refresh_token);
    assert_eq!(store.current_user(&session)?, operator);

    store.save_session(&session)?;
    store.sign_out(&session)?;
    assert_eq!(store.load_session()?, None);
    Ok(())
}

#[test]
fn reseeding_operator_resets_password() -> Result<()> {
    let store = bootstrapped()?;
    let first = store.seed_operator("admin@example.com", "old")?;
    let second = store.seed_operator("admin@example.com", "new")?;
    assert_eq!(first.id, second.id);
    assert!(store.sign_in("admin@example.com", "old").is_err());
    assert!(store.sign_in("admin@example.com", "new").is_ok());
    Ok(())
}
