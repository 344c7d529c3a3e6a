//! Client-version override resolution.
//!
//! A configured table maps version thresholds to method-rerouting rules and
//! a deprecation instant. An incoming client version resolves to the entry
//! with the smallest configured version that is greater than or equal to it
//! under component-wise `(major, minor, patch)` ordering.

use std::collections::{BTreeMap, HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VersionError {
    #[error("incompatible version identifier '{0}'")]
    Malformed(String),
    #[error("invalid override target '{0}', expected \"model.method\"")]
    MalformedTarget(String),
}

/// One `[[versions]]` entry as it appears in configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionEntryConfig {
    pub version: String,
    pub threshold: DateTime<Utc>,
    pub methods: Vec<String>,
}

type VersionKey = (u64, u64, u64);

/// Parse a strict `MAJOR.MINOR.PATCH` identifier with non-negative integer
/// components. Anything else is malformed, including extra segments and
/// non-digit characters.
pub fn parse_version(value: &str) -> Result<VersionKey, VersionError> {
    let malformed = || VersionError::Malformed(value.to_string());
    let mut parts = value.split('.');
    let mut components = [0_u64; 3];
    for slot in &mut components {
        let part = parts.next().ok_or_else(malformed)?;
        if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed());
        }
        *slot = part.parse().map_err(|_| malformed())?;
    }
    if parts.next().is_some() {
        return Err(malformed());
    }
    Ok((components[0], components[1], components[2]))
}

/// Rerouting rules attached to one matched threshold.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverrideDecision {
    pub deprecate_at: DateTime<Utc>,
    pub overrides: HashMap<String, HashSet<String>>,
    pub suffix: String,
}

impl OverrideDecision {
    /// Deprecation fires at or after the configured instant.
    #[must_use]
    pub fn is_deprecated(&self, now: DateTime<Utc>) -> bool {
        self.deprecate_at <= now
    }

    /// Rewritten method name when `(model, method)` is listed, `None`
    /// otherwise.
    #[must_use]
    pub fn rewrite(&self, model: &str, method: &str) -> Option<String> {
        self.overrides
            .get(model)
            .filter(|methods| methods.contains(method))
            .map(|_| format!("{model}.{method}{}", self.suffix))
    }
}

/// Immutable threshold table, built once at startup.
#[derive(Debug, Clone, Default)]
pub struct ApiVersion {
    entries: BTreeMap<VersionKey, OverrideDecision>,
}

impl ApiVersion {
    pub fn from_entries<I>(entries: I) -> Result<Self, VersionError>
    where
        I: IntoIterator<Item = VersionEntryConfig>,
    {
        let mut table = BTreeMap::new();
        for entry in entries {
            let key = parse_version(&entry.version)?;
            let mut overrides: HashMap<String, HashSet<String>> = HashMap::new();
            for target in &entry.methods {
                let (model, method) = target
                    .split_once('.')
                    .filter(|(model, method)| !model.is_empty() && !method.is_empty())
                    .ok_or_else(|| VersionError::MalformedTarget(target.clone()))?;
                overrides
                    .entry(model.to_string())
                    .or_default()
                    .insert(method.to_string());
            }
            table.insert(
                key,
                OverrideDecision {
                    deprecate_at: entry.threshold,
                    overrides,
                    // "1.2.3" reroutes to handlers suffixed "123".
                    suffix: entry.version.replace('.', ""),
                },
            );
        }
        Ok(Self { entries: table })
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve a client-declared version to its override decision: the
    /// smallest configured threshold `>=` the client version, or `None`
    /// when the client is newer than every threshold.
    pub fn resolve(&self, version: &str) -> Result<Option<&OverrideDecision>, VersionError> {
        let key = parse_version(version)?;
        Ok(self.entries.range(key..).next().map(|(_, entry)| entry))
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn entry(version: &str, methods: &[&str]) -> VersionEntryConfig {
        VersionEntryConfig {
            version: version.to_string(),
            threshold: Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).single().expect("ts"),
            methods: methods.iter().map(ToString::to_string).collect(),
        }
    }

    fn table(versions: &[&str]) -> ApiVersion {
        let entries: Vec<_> = versions
            .iter()
            .map(|v| entry(v, &["user.login"]))
            .collect();
        ApiVersion::from_entries(entries).expect("table")
    }

    #[test]
    fn parse_version_accepts_strict_triples_only() {
        assert_eq!(parse_version("1.2.3").expect("triple"), (1, 2, 3));
        assert_eq!(parse_version("0.0.0").expect("zeros"), (0, 0, 0));
        assert!(parse_version("abc").is_err());
        assert!(parse_version("1.2").is_err());
        assert!(parse_version("1.2.3.4").is_err());
        assert!(parse_version("1.2.x").is_err());
        assert!(parse_version("1..3").is_err());
        assert!(parse_version("-1.2.3").is_err());
    }

    #[test]
    fn resolve_returns_smallest_threshold_at_or_above_client() {
        let table = table(&["1.2.0", "1.4.0", "2.0.0"]);
        let matched = table.resolve("1.3.0").expect("resolve").expect("entry");
        assert_eq!(matched.suffix, "140");
    }

    #[test]
    fn resolve_exact_equality_matches_its_own_threshold() {
        let table = table(&["1.2.0", "1.2.1", "1.3.0"]);
        let matched = table.resolve("1.2.1").expect("resolve").expect("entry");
        assert_eq!(matched.suffix, "121");
    }

    #[test]
    fn resolve_skips_thresholds_below_the_client() {
        // Numeric-aware ordering: 1.9.0 < 1.10.0.
        let table = table(&["1.9.0", "1.10.0"]);
        let matched = table.resolve("1.9.5").expect("resolve").expect("entry");
        assert_eq!(matched.suffix, "1100");
    }

    #[test]
    fn resolve_returns_none_above_all_thresholds() {
        let table = table(&["1.2.0", "1.4.0"]);
        assert!(table.resolve("1.4.1").expect("resolve").is_none());
        assert!(table.resolve("9.0.0").expect("resolve").is_none());
    }

    #[test]
    fn resolve_with_empty_table_returns_none() {
        let table = ApiVersion::from_entries(Vec::new()).expect("empty");
        assert!(table.resolve("1.2.3").expect("resolve").is_none());
    }

    #[test]
    fn resolve_rejects_malformed_client_version() {
        let table = table(&["1.2.0"]);
        assert!(matches!(
            table.resolve("abc"),
            Err(VersionError::Malformed(_))
        ));
    }

    #[test]
    fn from_entries_rejects_bad_override_target() {
        let err = ApiVersion::from_entries(vec![entry("1.0.0", &["loginwithoutmodel"])])
            .expect_err("target");
        assert!(matches!(err, VersionError::MalformedTarget(_)));
    }

    #[test]
    fn rewrite_appends_suffix_for_listed_methods_only() {
        let table = ApiVersion::from_entries(vec![entry(
            "1.2.0",
            &["user.login", "user.findprofile"],
        )])
        .expect("table");
        let decision = table.resolve("1.1.0").expect("resolve").expect("entry");
        assert_eq!(
            decision.rewrite("user", "login").as_deref(),
            Some("user.login120")
        );
        assert!(decision.rewrite("user", "logout").is_none());
        assert!(decision.rewrite("catalog", "login").is_none());
    }

    #[test]
    fn deprecation_fires_at_the_threshold_instant() {
        let threshold = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).single().expect("ts");
        let table = table(&["1.2.0"]);
        let decision = table.resolve("1.0.0").expect("resolve").expect("entry");
        assert!(decision.is_deprecated(threshold));
        assert!(decision.is_deprecated(threshold + chrono::Duration::seconds(1)));
        assert!(!decision.is_deprecated(threshold - chrono::Duration::seconds(1)));
    }
}
