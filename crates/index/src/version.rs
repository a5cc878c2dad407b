//! Semantic version parsing and range expressions.
//!
//! Ranges accept the forms registry authors write by hand:
//!
//! - anything `semver::VersionReq` understands (`^1.2`, `~1.2.3`, `>=1.0, <2.0`, `1.*`)
//! - whitespace-separated comparator sets (`>=1.0.0 <2.0.0`)
//! - hyphen ranges (`1.2.0 - 2.0.0`, both ends inclusive)
//! - alternatives joined with `||`
//!
//! A bare full version inside a range (`1.2.3`) is an exact match and a bare
//! partial version (`1.2`) matches every patch of that minor line.

use crate::{Error, Result};
use semver::{Version, VersionReq};

/// Parse a semantic version, tolerating a leading `v` and surrounding whitespace.
pub fn parse_version(raw: &str) -> Result<Version> {
    let trimmed = raw.trim();
    let text = trimmed
        .strip_prefix('v')
        .or_else(|| trimmed.strip_prefix('V'))
        .unwrap_or(trimmed);
    Version::parse(text).map_err(|e| Error::invalid_version(raw, e.to_string()))
}

/// A parsed version range: the union of one or more comparator sets.
#[derive(Debug, Clone)]
pub struct VersionRange {
    raw: String,
    alternatives: Vec<VersionReq>,
}

impl VersionRange {
    /// Parse a range expression.
    pub fn parse(expr: &str) -> Result<Self> {
        let trimmed = expr.trim();
        if trimmed.is_empty() {
            return Err(Error::invalid_range(expr, "range expression is empty"));
        }

        let mut alternatives = Vec::new();
        for alternative in trimmed.split("||") {
            let text = normalize_alternative(alternative.trim())
                .map_err(|message| Error::invalid_range(expr, message))?;
            let req =
                VersionReq::parse(&text).map_err(|e| Error::invalid_range(expr, e.to_string()))?;
            alternatives.push(req);
        }

        Ok(Self {
            raw: trimmed.to_string(),
            alternatives,
        })
    }

    /// Whether `version` satisfies any alternative of this range.
    #[must_use]
    pub fn matches(&self, version: &Version) -> bool {
        self.alternatives.iter().any(|req| req.matches(version))
    }

    /// The expression this range was parsed from.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl std::fmt::Display for VersionRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

impl std::str::FromStr for VersionRange {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Rewrite one `||` alternative into `VersionReq` syntax.
fn normalize_alternative(alternative: &str) -> std::result::Result<String, String> {
    if alternative.is_empty() || alternative == "*" || alternative.eq_ignore_ascii_case("x") {
        return Ok("*".to_string());
    }

    if let Some((low, high)) = alternative.split_once(" - ") {
        let (low, high) = (low.trim(), high.trim());
        if low.is_empty() || high.is_empty() {
            return Err(format!("incomplete hyphen range '{alternative}'"));
        }
        return Ok(format!(">={low}, <={high}"));
    }

    let mut comparators = Vec::new();
    let mut pending_op = String::new();
    for token in alternative.split([' ', '\t', ',']) {
        if token.is_empty() {
            continue;
        }
        if token.chars().all(|c| matches!(c, '<' | '>' | '=' | '~' | '^')) {
            // operator written apart from its version: ">= 1.0.0"
            pending_op.push_str(token);
            continue;
        }
        let comparator = if pending_op.is_empty() {
            bare_comparator(token)
        } else {
            format!("{pending_op}{token}")
        };
        comparators.push(comparator);
        pending_op.clear();
    }

    if !pending_op.is_empty() {
        return Err(format!("operator '{pending_op}' has no version"));
    }
    if comparators.is_empty() {
        return Ok("*".to_string());
    }
    Ok(comparators.join(", "))
}

/// Comparator for a token written without an operator.
fn bare_comparator(token: &str) -> String {
    let starts_with_op = token.starts_with(['<', '>', '=', '~', '^']);
    if starts_with_op {
        return token.to_string();
    }
    let unprefixed = token.strip_prefix(['v', 'V']).unwrap_or(token);
    if Version::parse(unprefixed).is_ok() {
        return format!("={unprefixed}");
    }
    let numeric_parts = unprefixed.split('.').collect::<Vec<_>>();
    if numeric_parts.len() < 3
        && numeric_parts
            .iter()
            .all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()))
    {
        return format!("{unprefixed}.*");
    }
    unprefixed.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn test_parse_version_tolerates_prefix() {
        assert_eq!(parse_version("v1.2.3").unwrap(), v("1.2.3"));
        assert_eq!(parse_version(" 1.2.3 ").unwrap(), v("1.2.3"));
        assert!(parse_version("1.2").is_err());
        assert!(parse_version("latest").is_err());
    }

    #[test]
    fn test_caret_range() {
        let range = VersionRange::parse("^1.0.0").unwrap();
        assert!(range.matches(&v("1.2.3")));
        assert!(!range.matches(&v("2.0.0")));
    }

    #[test]
    fn test_bare_version_is_exact() {
        let range = VersionRange::parse("2.0.0").unwrap();
        assert!(range.matches(&v("2.0.0")));
        assert!(!range.matches(&v("2.0.1")));
    }

    #[test]
    fn test_bare_partial_version_matches_line() {
        let range = VersionRange::parse("1.2").unwrap();
        assert!(range.matches(&v("1.2.9")));
        assert!(!range.matches(&v("1.3.0")));
    }

    #[test]
    fn test_whitespace_comparator_set() {
        let range = VersionRange::parse(">=1.0.0 <2.0.0").unwrap();
        assert!(range.matches(&v("1.5.0")));
        assert!(!range.matches(&v("2.0.0")));

        let spaced = VersionRange::parse(">= 1.0.0 < 2.0.0").unwrap();
        assert!(spaced.matches(&v("1.0.0")));
    }

    #[test]
    fn test_hyphen_range_is_inclusive() {
        let range = VersionRange::parse("1.2.0 - 2.0.0").unwrap();
        assert!(range.matches(&v("1.2.0")));
        assert!(range.matches(&v("2.0.0")));
        assert!(!range.matches(&v("2.0.1")));
    }

    #[test]
    fn test_alternatives() {
        let range = VersionRange::parse("^1.0.0 || ^3.0.0").unwrap();
        assert!(range.matches(&v("1.1.0")));
        assert!(!range.matches(&v("2.1.0")));
        assert!(range.matches(&v("3.0.4")));
    }

    #[test]
    fn test_wildcards() {
        assert!(VersionRange::parse("*").unwrap().matches(&v("9.9.9")));
        assert!(VersionRange::parse("1.x").unwrap().matches(&v("1.4.0")));
    }

    #[test]
    fn test_invalid_ranges() {
        assert!(VersionRange::parse("").is_err());
        assert!(VersionRange::parse(">=").is_err());
        assert!(VersionRange::parse("not-a-version").is_err());
    }
}
