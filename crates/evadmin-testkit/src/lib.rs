// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use evadmin_app::validation::slugify;
use evadmin_app::{EventInput, UserId, UserInput};
use serde_json::Map;
use std::path::PathBuf;
use time::macros::datetime;
use time::{Duration, OffsetDateTime};

const FAMILY_NAMES: [&str; 12] = [
    "Nguyễn", "Trần", "Lê", "Phạm", "Hoàng", "Huỳnh", "Phan", "Vũ", "Võ", "Đặng", "Bùi", "Đỗ",
];

const MIDDLE_NAMES: [&str; 6] = ["Văn", "Thị", "Minh", "Ngọc", "Đức", "Thanh"];

const GIVEN_NAMES: [&str; 14] = [
    "An", "Bình", "Chi", "Dũng", "Giang", "Hà", "Hải", "Khánh", "Lan", "Linh", "Nam", "Phúc",
    "Quân", "Trang",
];

const POSITIONS: [&str; 8] = [
    "Nhân viên",
    "Trưởng nhóm",
    "Quản lý",
    "Giám đốc",
    "Thực tập sinh",
    "Kế toán",
    "Kỹ sư",
    "Điều phối viên",
];

const EVENT_KINDS: [&str; 7] = [
    "Hội thảo",
    "Hội nghị",
    "Tiệc tất niên",
    "Ngày hội việc làm",
    "Lễ ra mắt",
    "Workshop",
    "Team building",
];

const VENUES: [&str; 6] = ["Hà Nội", "Đà Nẵng", "Huế", "Cần Thơ", "Hải Phòng", "Sài Gòn"];

const DESCRIPTION_WORDS: [&str; 16] = [
    "agenda",
    "keynote",
    "check-in",
    "registration",
    "networking",
    "panel",
    "speakers",
    "photos",
    "venue",
    "guests",
    "schedule",
    "catering",
    "badge",
    "stage",
    "welcome",
    "closing",
];

const REFERENCE_NOW: OffsetDateTime = datetime!(2026-01-01 0:00 UTC);

#[derive(Debug, Clone)]
struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    fn new(seed: u64) -> Self {
        let mut state = seed ^ 0x9E37_79B9_7F4A_7C15;
        if state == 0 {
            state = 0xA409_3822_299F_31D0;
        }
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);

        let mut x = self.state;
        x ^= x >> 13;
        x ^= x << 7;
        x ^= x >> 17;
        x
    }

    fn int_n(&mut self, n: usize) -> usize {
        if n <= 1 {
            return 0;
        }
        (self.next_u64() % (n as u64)) as usize
    }

    fn bool(&mut self) -> bool {
        (self.next_u64() & 1) == 1
    }
}

/// Seeded generator for plausible users and events. The same seed always
/// yields the same sequence; emails and slugs stay unique within one faker.
#[derive(Debug, Clone)]
pub struct AdminFaker {
    rng: DeterministicRng,
    serial: u32,
}

impl AdminFaker {
    pub fn new(seed: u64) -> Self {
        let normalized = if seed == 0 { 1 } else { seed };
        Self {
            rng: DeterministicRng::new(normalized),
            serial: 0,
        }
    }

    pub fn user(&mut self) -> UserInput {
        let family = self.pick(&FAMILY_NAMES);
        let middle = self.pick(&MIDDLE_NAMES);
        let given = self.pick(&GIVEN_NAMES);
        let serial = self.next_serial();

        UserInput {
            full_name: format!("{family} {middle} {given}"),
            email: format!(
                "{}.{}{serial}@example.com",
                slugify(given),
                slugify(family)
            ),
            position: self.pick(&POSITIONS).to_owned(),
            avatar_image_url: String::new(),
            metadata: Map::new(),
        }
    }

    pub fn users(&mut self, count: usize) -> Vec<UserInput> {
        (0..count).map(|_| self.user()).collect()
    }

    pub fn event(&mut self) -> EventInput {
        self.event_with_users(&[])
    }

    /// An event inside the reference year lasting between two hours and
    /// three days. An empty attendee list is stored as no list.
    pub fn event_with_users(&mut self, user_ids: &[UserId]) -> EventInput {
        let title = format!("{} {}", self.pick(&EVENT_KINDS), self.pick(&VENUES));
        let serial = self.next_serial();
        let from_date = self.datetime_in_year();
        let to_date = from_date + Duration::hours(self.int_range(2, 72));

        EventInput {
            slug: format!("{}-{serial}", slugify(&title)),
            title,
            description: Some(self.sentence(6, 14)),
            banner_image_url: None,
            from_date,
            to_date,
            is_public: self.rng.bool(),
            user_ids: (!user_ids.is_empty()).then(|| user_ids.to_vec()),
        }
    }

    fn next_serial(&mut self) -> u32 {
        self.serial += 1;
        self.serial
    }

    fn pick<'a>(&mut self, items: &'a [&'a str]) -> &'a str {
        items[self.rng.int_n(items.len())]
    }

    fn int_range(&mut self, min: i64, max: i64) -> i64 {
        if max <= min {
            return min;
        }
        let span = max - min + 1;
        min + (self.rng.next_u64() % (span as u64)) as i64
    }

    fn datetime_in_year(&mut self) -> OffsetDateTime {
        let minutes = self.int_range(0, 365 * 24 * 60 - 1);
        REFERENCE_NOW + Duration::minutes(minutes)
    }

    fn sentence(&mut self, min_words: i64, max_words: i64) -> String {
        let count = self.int_range(min_words, max_words);
        let mut words = Vec::new();
        for _ in 0..count {
            words.push(self.pick(&DESCRIPTION_WORDS));
        }
        let mut sentence = words.join(" ");
        if let Some(first) = sentence.get_mut(0..1) {
            first.make_ascii_uppercase();
        }
        sentence.push('.');
        sentence
    }
}

pub fn temp_db_path() -> Result<(tempfile::TempDir, PathBuf)> {
    let dir = tempfile::tempdir().context("create temp dir")?;
    let db_path = dir.path().join("evadmin.db");
    Ok((dir, db_path))
}

pub fn fixture_datetime() -> OffsetDateTime {
    datetime!(2026-02-19 12:34:56 UTC)
}

pub fn reference_now() -> OffsetDateTime {
    REFERENCE_NOW
}

#[cfg(test)]
mod tests {
    use super::{AdminFaker, reference_now};
    use evadmin_app::UserId;
    use evadmin_app::validation::{normalize_email, validate_slug};
    use std::collections::BTreeSet;
    use time::Duration;

    #[test]
    fn same_seed_same_sequence() {
        let mut left = AdminFaker::new(42);
        let mut right = AdminFaker::new(42);
        assert_eq!(left.users(3), right.users(3));
        assert_eq!(left.event(), right.event());
    }

    #[test]
    fn zero_seed_is_usable() {
        let mut faker = AdminFaker::new(0);
        assert!(!faker.user().full_name.is_empty());
    }

    #[test]
    fn users_have_valid_unique_emails() {
        let mut faker = AdminFaker::new(7);
        let users = faker.users(50);
        let emails: BTreeSet<_> = users.iter().map(|user| user.email.clone()).collect();
        assert_eq!(emails.len(), 50);
        for user in &users {
            assert_eq!(
                normalize_email(&user.email).as_deref(),
                Ok(user.email.as_str())
            );
            assert_eq!(user.full_name.split(' ').count(), 3);
            assert!(!user.position.is_empty());
        }
    }

    #[test]
    fn events_are_valid_and_inside_the_year() {
        let mut faker = AdminFaker::new(9);
        for _ in 0..30 {
            let event = faker.event();
            assert_eq!(validate_slug(&event.slug).as_deref(), Ok(event.slug.as_str()));
            assert!(event.to_date > event.from_date);
            assert!(event.from_date >= reference_now());
            assert!(event.from_date < reference_now() + Duration::days(365));
            assert!(event.user_ids.is_none());
            assert!(event.description.as_deref().is_some_and(|text| text.ends_with('.')));
        }
    }

    #[test]
    fn attendees_are_carried_over() {
        let mut faker = AdminFaker::new(11);
        let ids = vec![UserId::new("a"), UserId::new("b")];
        assert_eq!(faker.event_with_users(&ids).user_ids, Some(ids));
    }
}
