//! Company name canonicalization through acquisition rules.

use std::collections::{BTreeMap, HashMap};

use regex::Regex;

use crate::{Error, Result};

/// Hit counters for one canonical name, or for the unmapped bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MappingStats {
  /// First encounters resolved by testing the rules.
  pub matched: usize,
  /// Later encounters answered from the cache.
  pub cached:  usize,
}

struct Rule {
  pattern: Regex,
  result:  String,
}

#[derive(Debug, Clone)]
struct CacheEntry {
  result: String,
  mapped: bool,
}

/// Maps raw company names to canonical ones.
///
/// Rules are tested in declaration order and the first match wins. Every
/// outcome, including "no rule matched", is cached per raw name.
pub struct CompanyMapper {
  rules:    Vec<Rule>,
  cache:    BTreeMap<String, CacheEntry>,
  stats:    BTreeMap<String, MappingStats>,
  unmapped: MappingStats,
}

impl CompanyMapper {
  /// Compile and validate `[pattern, canonical name]` pairs.
  ///
  /// The rule set is rejected if a pattern fails to compile, a pattern or a
  /// canonical name appears twice, a pattern matches another rule's
  /// canonical name, or a pattern matches another rule's pattern text while
  /// the two map to different names.
  pub fn new(acquisitions: &[(String, String)]) -> Result<Self> {
    let mut results_by_pattern: HashMap<&str, &str> = HashMap::new();
    let mut seen_results: HashMap<&str, usize> = HashMap::new();
    let mut rules = Vec::with_capacity(acquisitions.len());

    for (index, (pattern, result)) in acquisitions.iter().enumerate() {
      let compiled = Regex::new(pattern).map_err(|source| Error::InvalidPattern {
        index,
        pattern: pattern.clone(),
        source,
      })?;
      if let Some(existing) = results_by_pattern.insert(pattern, result) {
        return Err(Error::DuplicatePattern {
          index,
          pattern: pattern.clone(),
          existing: existing.to_owned(),
        });
      }
      if seen_results.insert(result, index).is_some() {
        return Err(Error::DuplicateResult { index, result: result.clone() });
      }
      rules.push(Rule { pattern: compiled, result: result.clone() });
    }

    for (other, rule) in rules.iter().enumerate() {
      for (index, (pattern, result)) in acquisitions.iter().enumerate() {
        if index != other && rule.pattern.is_match(result) {
          return Err(Error::ResultMatchesOtherPattern {
            index,
            result: result.clone(),
            other,
            pattern: rule.pattern.as_str().to_owned(),
            other_result: rule.result.clone(),
          });
        }
        if rule.pattern.is_match(pattern) && rule.result != *result {
          return Err(Error::ConflictingPatterns {
            index,
            pattern: pattern.clone(),
            result: result.clone(),
            other,
            other_pattern: rule.pattern.as_str().to_owned(),
            other_result: rule.result.clone(),
          });
        }
      }
    }

    Ok(Self {
      rules,
      cache: BTreeMap::new(),
      stats: BTreeMap::new(),
      unmapped: MappingStats::default(),
    })
  }

  /// Canonical name for `company`; the input itself if no rule matches.
  pub fn map(&mut self, company: &str) -> String {
    if let Some(entry) = self.cache.get(company) {
      if entry.mapped {
        self.stats.entry(entry.result.clone()).or_default().cached += 1;
      } else {
        self.unmapped.cached += 1;
      }
      return entry.result.clone();
    }

    let entry = match self.rules.iter().find(|rule| rule.pattern.is_match(company)) {
      Some(rule) => {
        self.stats.entry(rule.result.clone()).or_default().matched += 1;
        CacheEntry { result: rule.result.clone(), mapped: true }
      }
      None => {
        self.unmapped.matched += 1;
        CacheEntry { result: company.to_owned(), mapped: false }
      }
    };
    let result = entry.result.clone();
    self.cache.insert(company.to_owned(), entry);
    result
  }

  /// Counters per canonical name that was produced by a rule.
  pub fn stats(&self) -> &BTreeMap<String, MappingStats> { &self.stats }

  /// Counters for names no rule matched.
  pub fn unmapped(&self) -> MappingStats { self.unmapped }

  /// Raw → canonical pairs that were actually rewritten, ordered by raw name.
  pub fn used_mappings(&self) -> impl Iterator<Item = (&str, &str)> {
    self
      .cache
      .iter()
      .filter(|(_, entry)| entry.mapped)
      .map(|(raw, entry)| (raw.as_str(), entry.result.as_str()))
  }
}
