//! The affiliation import driver.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use roster_core::{
  StoreError as _,
  entity::{Enrollment, Identity, ProfileUpdate},
  store::IdentityStore,
};
use tracing::{debug, info, warn};

use crate::{
  CompanyMapper, Error, Result,
  feed::GitHubUser,
  history::{decode_email, parse_history},
};

/// Identity owners bumped per `last_modified` statement.
pub const TOUCH_BATCH: usize = 1000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportOptions {
  /// Delete all enrollments and organizations before importing.
  pub cleanup:      bool,
  /// Load identities, then stop before writing anything.
  pub test_connect: bool,
}

/// End-of-run counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportReport {
  /// Feed records that resolved to at least one identity owner.
  pub hits:                    usize,
  /// Enrollments queued, one per owner and history interval.
  pub affiliations:            usize,
  /// Distinct canonical company names seen.
  pub companies:               usize,
  pub updated_profiles:        usize,
  pub not_updated_profiles:    usize,
  pub updated_enrollments:     usize,
  pub not_updated_enrollments: usize,
  pub updated_uuids:           usize,
  pub not_updated_uuids:       usize,
  /// Identity rows whose `last_modified` was bumped.
  pub touched_identities:      usize,
  /// Set when the run stopped after the connectivity check.
  pub connection_only:         bool,
}

/// Email and login lookups into the owners of stored identities.
#[derive(Debug, Default)]
struct OwnerIndex {
  by_email: HashMap<String, BTreeSet<String>>,
  by_login: HashMap<String, BTreeSet<String>>,
}

impl OwnerIndex {
  fn new(identities: Vec<Identity>) -> Self {
    let mut index = Self::default();
    for identity in identities {
      let Some(uuid) = identity.uuid.clone() else { continue };
      if let Some(email) = identity.email.as_deref().filter(|e| !e.is_empty()) {
        index
          .by_email
          .entry(email.to_lowercase())
          .or_default()
          .insert(uuid.clone());
      }
      if identity.is_login_source()
        && let Some(login) = identity.username.as_deref().filter(|u| !u.is_empty())
      {
        index.by_login.entry(login.to_owned()).or_default().insert(uuid);
      }
    }
    index
  }

  fn owners(&self, email: &str, login: &str) -> BTreeSet<String> {
    let mut owners = BTreeSet::new();
    if !email.is_empty()
      && let Some(found) = self.by_email.get(email)
    {
      owners.extend(found.iter().cloned());
    }
    if !login.is_empty()
      && let Some(found) = self.by_login.get(login)
    {
      owners.extend(found.iter().cloned());
    }
    owners
  }
}

/// An enrollment waiting for its organization id.
struct PendingEnrollment {
  uuid:    String,
  company: String,
  start:   DateTime<Utc>,
  end:     DateTime<Utc>,
}

/// Profile fields a feed record asks to set. `countries` maps lower-cased
/// codes to the spelling the store keeps; other codes are skipped with a
/// warning.
pub fn profile_update(user: &GitHubUser, countries: &HashMap<String, String>) -> ProfileUpdate {
  let gender = match user.sex.as_deref() {
    Some("m") => Some("male".to_owned()),
    Some("f") => Some("female".to_owned()),
    _ => None,
  };
  let gender_acc = user
    .sex_prob
    .map(|p| (p * 100.0).clamp(0.0, 100.0) as u8);
  let country_code = user.country_id.as_deref().and_then(|code| {
    let stored = countries.get(&code.to_lowercase()).cloned();
    if stored.is_none() {
      warn!(login = %user.login, code, "store has no such country code, skipping country update");
    }
    stored
  });

  ProfileUpdate { gender, gender_acc, country_code }
}

/// Import `users` into `store`.
///
/// Every feed record is matched to identity owners by decoded email and by
/// login (for login-bearing sources). Each owner gets its profile updated
/// and one enrollment per history interval, with company names passed
/// through `mapper`. Organizations are created on demand. Owners whose
/// profile or enrollments really changed get their identities' timestamps
/// bumped.
pub async fn import_affiliations<S: IdentityStore>(
  store: &S,
  users: &[GitHubUser],
  mapper: &mut CompanyMapper,
  options: ImportOptions,
) -> Result<ImportReport> {
  let mut report = ImportReport::default();

  let identities = store
    .identities()
    .await
    .map_err(Error::store("loading identities"))?;
  if options.test_connect {
    info!(identities = identities.len(), "test mode: connection ok");
    report.connection_only = true;
    return Ok(report);
  }
  let owners = OwnerIndex::new(identities);

  if options.cleanup {
    store
      .clear_affiliations()
      .await
      .map_err(Error::store("cleaning affiliations"))?;
    info!("current affiliation data cleaned");
  }

  let mut organizations: HashMap<String, i64> = store
    .organizations()
    .await
    .map_err(Error::store("loading organizations"))?
    .into_iter()
    .map(|org| (org.name.to_lowercase(), org.id))
    .collect();
  let countries: HashMap<String, String> = store
    .countries()
    .await
    .map_err(Error::store("loading countries"))?
    .into_iter()
    .map(|country| (country.code.to_lowercase(), country.code))
    .collect();

  // ── Profiles, and enrollments to write ────────────────────────────────

  let mut companies = BTreeSet::new();
  let mut pending = Vec::new();
  let mut updated_profiles = BTreeSet::new();
  let mut not_updated_profiles = BTreeSet::new();

  for user in users {
    let email = decode_email(&user.email);
    let uuids = owners.owners(&email, &user.login);
    if uuids.is_empty() {
      continue;
    }
    report.hits += 1;

    let update = profile_update(user, &countries);
    for uuid in &uuids {
      let changed = !update.is_empty()
        && store
          .update_profile(uuid.clone(), update.clone())
          .await
          .map_err(Error::store("updating profile"))?;
      if changed {
        updated_profiles.insert(uuid.clone());
      } else {
        not_updated_profiles.insert(uuid.clone());
      }
    }

    for segment in parse_history(&user.affiliation)? {
      if segment.company.is_empty() {
        continue;
      }
      let company = mapper.map(&segment.company);
      if company.is_empty() {
        continue;
      }
      for uuid in &uuids {
        pending.push(PendingEnrollment {
          uuid:    uuid.clone(),
          company: company.clone(),
          start:   segment.start,
          end:     segment.end,
        });
        report.affiliations += 1;
      }
      companies.insert(company);
    }
  }

  // ── Organizations ─────────────────────────────────────────────────────

  for company in &companies {
    let key = company.to_lowercase();
    if organizations.contains_key(&key) {
      continue;
    }
    let id = ensure_organization(store, company).await?;
    organizations.insert(key, id);
  }

  // ── Enrollments ───────────────────────────────────────────────────────

  let mut updated_enrollments = BTreeSet::new();
  let mut not_updated_enrollments = BTreeSet::new();

  for PendingEnrollment { uuid, company, start, end } in pending {
    let organization_id = *organizations
      .get(&company.to_lowercase())
      .ok_or_else(|| Error::MissingOrganization(company.clone()))?;
    let enrollment = Enrollment { uuid, organization_id, start, end };

    if add_enrollment(store, enrollment.clone()).await? {
      updated_enrollments.insert(enrollment.uuid);
    } else {
      not_updated_enrollments.insert(enrollment.uuid);
    }
  }

  // ── Timestamps ────────────────────────────────────────────────────────

  let updated_uuids: BTreeSet<String> =
    updated_profiles.union(&updated_enrollments).cloned().collect();
  let not_updated_uuids: BTreeSet<&String> =
    not_updated_profiles.union(&not_updated_enrollments).collect();

  report.touched_identities = touch_identities(store, &updated_uuids).await?;

  report.companies = companies.len();
  report.updated_profiles = updated_profiles.len();
  report.not_updated_profiles = not_updated_profiles.len();
  report.updated_enrollments = updated_enrollments.len();
  report.not_updated_enrollments = not_updated_enrollments.len();
  report.updated_uuids = updated_uuids.len();
  report.not_updated_uuids = not_updated_uuids.len();

  log_report(&report, mapper);
  Ok(report)
}

/// Id of the organization called `name`, inserting it if needed. A
/// case-insensitive collision with an existing row reuses that row.
async fn ensure_organization<S: IdentityStore>(store: &S, name: &str) -> Result<i64> {
  match store.add_organization(name.to_owned()).await {
    Ok(org) => {
      debug!(name, id = org.id, "organization added");
      Ok(org.id)
    }
    Err(err) if err.is_duplicate_key() => {
      let existing = store
        .find_organization(name.to_owned())
        .await
        .map_err(Error::store("looking up organization"))?
        .ok_or_else(|| Error::MissingOrganization(name.to_owned()))?;
      warn!(inserting = name, existing = %existing.name, "organization name collision");
      Ok(existing.id)
    }
    Err(err) => Err(Error::store("adding organization")(err)),
  }
}

/// Store `enrollment` unless exactly it already exists. Anything else in the
/// same owner and window is replaced. Returns whether a write happened.
async fn add_enrollment<S: IdentityStore>(store: &S, enrollment: Enrollment) -> Result<bool> {
  if store
    .enrollment_exists(enrollment.clone())
    .await
    .map_err(Error::store("checking enrollment"))?
  {
    return Ok(false);
  }
  store
    .delete_enrollment_window(enrollment.uuid.clone(), enrollment.start, enrollment.end)
    .await
    .map_err(Error::store("clearing enrollment window"))?;
  store
    .insert_enrollment(enrollment)
    .await
    .map_err(Error::store("inserting enrollment"))?;
  Ok(true)
}

async fn touch_identities<S: IdentityStore>(
  store: &S,
  uuids: &BTreeSet<String>,
) -> Result<usize> {
  if uuids.is_empty() {
    info!("no identities to update");
    return Ok(0);
  }

  let now = Utc::now();
  let uuids: Vec<String> = uuids.iter().cloned().collect();
  let mut touched = 0;
  for (pack, chunk) in uuids.chunks(TOUCH_BATCH).enumerate() {
    let updated = store
      .touch_identities(chunk.to_vec(), now)
      .await
      .map_err(Error::store("updating identity timestamps"))?;
    info!(pack = pack + 1, updated, owners = chunk.len(), "identity pack updated");
    touched += updated;
  }
  Ok(touched)
}

fn log_report(report: &ImportReport, mapper: &CompanyMapper) {
  info!(
    hits = report.hits,
    affiliations = report.affiliations,
    companies = report.companies,
    updated_profiles = report.updated_profiles,
    updated_enrollments = report.updated_enrollments,
    updated_uuids = report.updated_uuids,
    touched_identities = report.touched_identities,
    not_updated_profiles = report.not_updated_profiles,
    not_updated_enrollments = report.not_updated_enrollments,
    not_updated_uuids = report.not_updated_uuids,
    "affiliations imported"
  );

  let unmapped = mapper.unmapped();
  info!(matched = unmapped.matched, cached = unmapped.cached, "non-acquired companies");
  for (company, stats) in mapper.stats() {
    info!(company = company.as_str(), matched = stats.matched, cached = stats.cached, "mapped company");
  }
  for (raw, canonical) in mapper.used_mappings() {
    info!(raw, canonical, "used mapping");
  }
}
