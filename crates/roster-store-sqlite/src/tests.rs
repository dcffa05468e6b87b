//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::{DateTime, TimeZone, Utc};
use roster_core::{
  StoreError,
  entity::{
    BlacklistEntry, Country, DomainOrganization, Enrollment, Identity, Profile,
    ProfileUpdate, UniqueIdentity,
  },
  store::IdentityStore,
};

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn ymd(y: i32, m: u32, d: u32) -> DateTime<Utc> {
  Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
}

fn root(uuid: &str) -> UniqueIdentity {
  UniqueIdentity { uuid: uuid.into(), last_modified: None }
}

fn identity(id: &str, uuid: &str, email: Option<&str>) -> Identity {
  Identity {
    id:            id.into(),
    name:          None,
    email:         email.map(Into::into),
    username:      None,
    source:        "git".into(),
    uuid:          Some(uuid.into()),
    last_modified: None,
  }
}

fn spain() -> Country {
  Country { code: "ES".into(), name: "Spain".into(), alpha3: "ESP".into() }
}

/// A store holding one person `U1` with an empty profile.
async fn store_with_person() -> SqliteStore {
  let s = store().await;
  s.replace_countries(vec![spain()]).await.unwrap();
  s.replace_unique_identities(vec![root("U1")]).await.unwrap();
  s.replace_profiles(vec![Profile { uuid: "U1".into(), ..Default::default() }])
    .await
    .unwrap();
  s
}

// ─── Reference data ──────────────────────────────────────────────────────────

#[tokio::test]
async fn replace_countries_overwrites_table() {
  let s = store().await;
  s.replace_countries(vec![spain()]).await.unwrap();

  let written = s
    .replace_countries(vec![
      Country { code: "PL".into(), name: "Poland".into(), alpha3: "POL".into() },
      Country { code: "US".into(), name: "United States".into(), alpha3: "USA".into() },
    ])
    .await
    .unwrap();
  assert_eq!(written, 2);

  let codes: Vec<_> = s.countries().await.unwrap().into_iter().map(|c| c.code).collect();
  assert_eq!(codes, ["PL", "US"]);
}

#[tokio::test]
async fn replace_organizations_assigns_fresh_ids() {
  let s = store().await;
  let orgs = s
    .replace_organizations(vec!["Acme".into(), "Globex".into()])
    .await
    .unwrap();

  assert_eq!(orgs.len(), 2);
  assert_eq!(orgs[0].name, "Acme");
  assert_ne!(orgs[0].id, orgs[1].id);
  assert_eq!(s.organizations().await.unwrap(), orgs);
}

#[tokio::test]
async fn organization_names_are_unique_ignoring_case() {
  let s = store().await;
  s.add_organization("Foo Inc".into()).await.unwrap();

  let err = s.add_organization("foo inc".into()).await.unwrap_err();
  assert!(err.is_duplicate_key());

  let found = s.find_organization("FOO INC".into()).await.unwrap().unwrap();
  assert_eq!(found.name, "Foo Inc");
}

#[tokio::test]
async fn domains_and_blacklist_roundtrip() {
  let s = store().await;
  let orgs = s.replace_organizations(vec!["Acme".into()]).await.unwrap();

  s.replace_domains(vec![DomainOrganization {
    domain:          "acme.com".into(),
    is_top_domain:   true,
    organization_id: orgs[0].id,
  }])
  .await
  .unwrap();
  s.replace_blacklist(vec![BlacklistEntry { excluded: "root@localhost".into() }])
    .await
    .unwrap();

  let domains = s.domains().await.unwrap();
  assert_eq!(domains.len(), 1);
  assert!(domains[0].is_top_domain);
  assert_eq!(domains[0].organization_id, orgs[0].id);
  assert_eq!(s.blacklist().await.unwrap()[0].excluded, "root@localhost");
}

// ─── People ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn identities_keep_timestamps() {
  let s = store().await;
  s.replace_unique_identities(vec![UniqueIdentity {
    uuid:          "U1".into(),
    last_modified: Some(ymd(2020, 5, 1)),
  }])
  .await
  .unwrap();

  let mut alice = identity("i1", "U1", Some("alice@example.com"));
  alice.last_modified = Some(ymd(2021, 2, 3));
  s.replace_identities(vec![alice.clone()]).await.unwrap();

  assert_eq!(s.unique_identities().await.unwrap()[0].last_modified, Some(ymd(2020, 5, 1)));
  assert_eq!(s.identities().await.unwrap(), vec![alice]);
}

#[tokio::test]
async fn profile_update_reports_real_changes_only() {
  let s = store_with_person().await;
  let update = ProfileUpdate {
    gender:       Some("female".into()),
    gender_acc:   Some(87),
    country_code: Some("ES".into()),
  };

  assert!(s.update_profile("U1".into(), update.clone()).await.unwrap());
  assert!(!s.update_profile("U1".into(), update).await.unwrap());

  let profile = &s.profiles().await.unwrap()[0];
  assert_eq!(profile.gender.as_deref(), Some("female"));
  assert_eq!(profile.gender_acc, Some(87));
  assert_eq!(profile.country_code.as_deref(), Some("ES"));
}

#[tokio::test]
async fn profile_update_of_unknown_uuid_changes_nothing() {
  let s = store_with_person().await;
  let update = ProfileUpdate { gender: Some("male".into()), ..Default::default() };
  assert!(!s.update_profile("nobody".into(), update).await.unwrap());
  assert!(!s.update_profile("U1".into(), ProfileUpdate::default()).await.unwrap());
}

#[tokio::test]
async fn touch_identities_sets_last_modified() {
  let s = store_with_person().await;
  s.replace_unique_identities(vec![root("U1"), root("U2")]).await.unwrap();
  s.replace_identities(vec![
    identity("i1", "U1", None),
    identity("i2", "U1", None),
    identity("i3", "U2", None),
  ])
  .await
  .unwrap();

  let at = ymd(2024, 1, 1);
  assert_eq!(s.touch_identities(vec!["U1".into()], at).await.unwrap(), 2);
  assert_eq!(s.touch_identities(vec![], at).await.unwrap(), 0);

  let touched: Vec<_> = s
    .identities()
    .await
    .unwrap()
    .into_iter()
    .map(|i| (i.id, i.last_modified))
    .collect();
  assert_eq!(
    touched,
    [
      ("i1".to_string(), Some(at)),
      ("i2".to_string(), Some(at)),
      ("i3".to_string(), None),
    ]
  );
}

// ─── Enrollments ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn enrollment_window_lifecycle() {
  let s = store_with_person().await;
  let acme = s.add_organization("Acme".into()).await.unwrap();
  let globex = s.add_organization("Globex".into()).await.unwrap();

  let enrollment = Enrollment {
    uuid:            "U1".into(),
    organization_id: acme.id,
    start:           ymd(1970, 1, 1),
    end:             ymd(2019, 1, 1),
  };
  assert!(!s.enrollment_exists(enrollment.clone()).await.unwrap());
  s.insert_enrollment(enrollment.clone()).await.unwrap();
  assert!(s.enrollment_exists(enrollment.clone()).await.unwrap());

  let moved = Enrollment { organization_id: globex.id, ..enrollment.clone() };
  assert!(!s.enrollment_exists(moved.clone()).await.unwrap());

  let deleted = s
    .delete_enrollment_window("U1".into(), enrollment.start, enrollment.end)
    .await
    .unwrap();
  assert_eq!(deleted, 1);
  s.insert_enrollment(moved.clone()).await.unwrap();
  assert_eq!(s.enrollments().await.unwrap(), vec![moved]);
}

#[tokio::test]
async fn clear_affiliations_empties_both_tables() {
  let s = store_with_person().await;
  let acme = s.add_organization("Acme".into()).await.unwrap();
  s.insert_enrollment(Enrollment {
    uuid:            "U1".into(),
    organization_id: acme.id,
    start:           ymd(1970, 1, 1),
    end:             ymd(2099, 1, 1),
  })
  .await
  .unwrap();

  s.clear_affiliations().await.unwrap();
  assert!(s.enrollments().await.unwrap().is_empty());
  assert!(s.organizations().await.unwrap().is_empty());
}

// ─── Read-only sources ───────────────────────────────────────────────────────

#[tokio::test]
async fn read_only_open_leaves_the_file_untouched() {
  let dir = tempfile::tempdir().expect("tempdir");
  let path = dir.path().join("source.db");
  {
    let raw = rusqlite::Connection::open(&path).unwrap();
    raw
      .execute_batch(
        "CREATE TABLE countries (code TEXT PRIMARY KEY, name TEXT NOT NULL, alpha3 TEXT NOT NULL);
         INSERT INTO countries VALUES ('ES', 'Spain', 'ESP');",
      )
      .unwrap();
  }

  let s = SqliteStore::open_read_only(&path).await.unwrap();
  assert_eq!(s.countries().await.unwrap(), vec![spain()]);
  assert!(s.replace_countries(vec![]).await.is_err());
  drop(s);

  let raw = rusqlite::Connection::open(&path).unwrap();
  let tables: i64 = raw
    .query_row("SELECT count(*) FROM sqlite_master WHERE type = 'table'", [], |row| row.get(0))
    .unwrap();
  let version: i64 = raw.query_row("PRAGMA user_version", [], |row| row.get(0)).unwrap();
  assert_eq!(tables, 1);
  assert_eq!(version, 0);
}

#[tokio::test]
async fn read_only_open_of_missing_file_fails() {
  let dir = tempfile::tempdir().expect("tempdir");
  assert!(SqliteStore::open_read_only(dir.path().join("absent.db")).await.is_err());
}

#[tokio::test]
async fn profile_country_matches_ignoring_case() {
  let s = store().await;
  s.replace_countries(vec![Country { code: "es".into(), ..spain() }]).await.unwrap();
  s.replace_unique_identities(vec![root("U1")]).await.unwrap();
  s.replace_profiles(vec![Profile {
    uuid:         "U1".into(),
    country_code: Some("ES".into()),
    ..Default::default()
  }])
  .await
  .unwrap();

  let update = ProfileUpdate { country_code: Some("Es".into()), ..Default::default() };
  assert!(s.update_profile("U1".into(), update).await.unwrap());
}
