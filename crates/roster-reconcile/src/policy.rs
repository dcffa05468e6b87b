//! Conflict resolvers, one per table kind.
//!
//! Every resolver receives source A's row first and source B's row second and
//! is only called when the two rows differ.

use roster_core::entity::{Identity, Profile, UniqueIdentity};

/// Keep source A's row. Used for reference data and enrollments.
pub fn prefer_a<T>(a: T, _b: T) -> T { a }

/// Field-by-field merge; A wins unless its field is absent.
///
/// Gender and gender confidence travel together: the side with the higher
/// confidence supplies both, provided it actually has a gender. Equal
/// confidences keep A.
pub fn merge_profiles(a: Profile, b: Profile) -> Profile {
  let b_gender_wins =
    b.gender.is_some() && (a.gender.is_none() || b.gender_acc > a.gender_acc);

  let (gender, gender_acc) = if b_gender_wins {
    (b.gender, b.gender_acc)
  } else if a.gender.is_some() {
    (a.gender, a.gender_acc)
  } else {
    (None, a.gender_acc.or(b.gender_acc))
  };

  Profile {
    uuid: a.uuid,
    name: a.name.or(b.name),
    email: a.email.or(b.email),
    gender,
    gender_acc,
    is_bot: a.is_bot.or(b.is_bot),
    country_code: a.country_code.or(b.country_code),
  }
}

/// The side with the newer `last_modified` is primary; a missing timestamp
/// never beats a present one, and a tie keeps A. The primary side supplies
/// `source` and every field it has; the other side only fills gaps.
pub fn merge_identities(a: Identity, b: Identity) -> Identity {
  let b_primary = match (a.last_modified, b.last_modified) {
    (Some(at), Some(bt)) => bt > at,
    (None, Some(_)) => true,
    _ => false,
  };
  let (primary, other) = if b_primary { (b, a) } else { (a, b) };

  Identity {
    id:            primary.id,
    name:          primary.name.or(other.name),
    email:         primary.email.or(other.email),
    username:      primary.username.or(other.username),
    source:        primary.source,
    uuid:          primary.uuid.or(other.uuid),
    last_modified: primary.last_modified.or(other.last_modified),
  }
}

/// Keep the newer `last_modified`.
pub fn merge_unique_identities(a: UniqueIdentity, b: UniqueIdentity) -> UniqueIdentity {
  UniqueIdentity {
    uuid:          a.uuid,
    last_modified: a.last_modified.max(b.last_modified),
  }
}

#[cfg(test)]
mod tests {
  use chrono::{DateTime, TimeZone, Utc};

  use super::*;

  fn profile(gender: Option<&str>, acc: Option<u8>) -> Profile {
    Profile {
      uuid: "U1".into(),
      gender: gender.map(Into::into),
      gender_acc: acc,
      ..Default::default()
    }
  }

  fn ymd(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
  }

  fn identity(source: &str, last_modified: Option<DateTime<Utc>>) -> Identity {
    Identity {
      id: "i1".into(),
      name: None,
      email: None,
      username: None,
      source: source.into(),
      uuid: None,
      last_modified,
    }
  }

  // ─── Profiles ──────────────────────────────────────────────────────────────

  #[test]
  fn higher_confidence_gender_wins_both_ways() {
    let low_male = profile(Some("male"), Some(40));
    let high_female = profile(Some("female"), Some(95));

    let ab = merge_profiles(low_male.clone(), high_female.clone());
    let ba = merge_profiles(high_female, low_male);

    assert_eq!(ab.gender.as_deref(), Some("female"));
    assert_eq!(ab.gender_acc, Some(95));
    assert_eq!((ab.gender, ab.gender_acc), (ba.gender, ba.gender_acc));
  }

  #[test]
  fn equal_confidence_keeps_a() {
    let merged = merge_profiles(profile(Some("male"), Some(70)), profile(Some("female"), Some(70)));
    assert_eq!(merged.gender.as_deref(), Some("male"));
  }

  #[test]
  fn confident_side_without_gender_does_not_win() {
    let merged = merge_profiles(profile(Some("male"), Some(30)), profile(None, Some(99)));
    assert_eq!(merged.gender.as_deref(), Some("male"));
    assert_eq!(merged.gender_acc, Some(30));
  }

  #[test]
  fn absent_gender_is_filled_from_b() {
    let merged = merge_profiles(profile(None, None), profile(Some("female"), Some(10)));
    assert_eq!(merged.gender.as_deref(), Some("female"));
    assert_eq!(merged.gender_acc, Some(10));
  }

  #[test]
  fn optional_fields_prefer_a_then_fill_from_b() {
    let a = Profile {
      name: Some("Alice".into()),
      is_bot: Some(false),
      ..profile(None, None)
    };
    let b = Profile {
      name: Some("Alice Liddell".into()),
      email: Some("alice@example.com".into()),
      country_code: Some("GB".into()),
      is_bot: Some(true),
      ..profile(None, None)
    };

    let merged = merge_profiles(a, b);
    assert_eq!(merged.name.as_deref(), Some("Alice"));
    assert_eq!(merged.email.as_deref(), Some("alice@example.com"));
    assert_eq!(merged.country_code.as_deref(), Some("GB"));
    assert_eq!(merged.is_bot, Some(false));
  }

  // ─── Identities ────────────────────────────────────────────────────────────

  #[test]
  fn newer_identity_supplies_source() {
    let a = identity("git", Some(ymd(2020, 1, 1)));
    let b = Identity { email: Some("b@example.com".into()), ..identity("github", Some(ymd(2021, 1, 1))) };

    let merged = merge_identities(a, b);
    assert_eq!(merged.source, "github");
    assert_eq!(merged.email.as_deref(), Some("b@example.com"));
    assert_eq!(merged.last_modified, Some(ymd(2021, 1, 1)));
  }

  #[test]
  fn null_timestamp_never_overrides() {
    let a = identity("git", None);
    let b = identity("github", Some(ymd(2021, 1, 1)));
    let merged = merge_identities(a.clone(), b.clone());
    assert_eq!(merged.source, "github");

    let merged = merge_identities(b, a);
    assert_eq!(merged.source, "github");
    assert_eq!(merged.last_modified, Some(ymd(2021, 1, 1)));
  }

  #[test]
  fn primary_gaps_are_filled_from_other_side() {
    let a = Identity {
      name: Some("Alice".into()),
      username: Some("alice".into()),
      ..identity("git", Some(ymd(2019, 1, 1)))
    };
    let b = Identity { uuid: Some("U1".into()), ..identity("github", Some(ymd(2022, 1, 1))) };

    let merged = merge_identities(a, b);
    assert_eq!(merged.source, "github");
    assert_eq!(merged.name.as_deref(), Some("Alice"));
    assert_eq!(merged.username.as_deref(), Some("alice"));
    assert_eq!(merged.uuid.as_deref(), Some("U1"));
  }

  #[test]
  fn unique_identity_keeps_newest_timestamp() {
    let merged = merge_unique_identities(
      UniqueIdentity { uuid: "U1".into(), last_modified: Some(ymd(2020, 1, 1)) },
      UniqueIdentity { uuid: "U1".into(), last_modified: Some(ymd(2023, 1, 1)) },
    );
    assert_eq!(merged.last_modified, Some(ymd(2023, 1, 1)));
  }
}
