//! Tag classification
//!
//! Decides which upstream tags are mirrored. A tag is in scope when it is not
//! an excluded variant, has the expected `<major>[.minor[.patch]][-variant]`
//! shape, and its version is at or above the configured floor.

use crate::config::FilterConfig;
use crate::error::{Error, Result};
use regex::Regex;
use semver::Version;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Version parsed from the numeric part of a tag
///
/// Missing minor/patch components default to 0, so `2` and `2.0.0` compare
/// equal.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ParsedVersion(Version);

impl ParsedVersion {
    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self(Version::new(major, minor, patch))
    }

    pub fn major(&self) -> u64 {
        self.0.major
    }

    pub fn minor(&self) -> u64 {
        self.0.minor
    }

    pub fn patch(&self) -> u64 {
        self.0.patch
    }

    /// Parse the numeric portion of a tag (everything before the first `-`).
    ///
    /// Returns `None` when the major component is not numeric. Non-numeric
    /// minor or patch components are treated as 0.
    pub fn from_tag(tag: &str) -> Option<Self> {
        let base = tag.split('-').next().unwrap_or(tag);
        let mut parts = base.split('.');

        let major = parts.next()?.parse::<u64>().ok()?;
        let minor = numeric_or_zero(parts.next());
        let patch = numeric_or_zero(parts.next());

        Some(Self::new(major, minor, patch))
    }

    pub fn as_semver(&self) -> &Version {
        &self.0
    }
}

fn numeric_or_zero(part: Option<&str>) -> u64 {
    match part {
        Some(p) if !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit()) => p.parse().unwrap_or(0),
        _ => 0,
    }
}

impl FromStr for ParsedVersion {
    type Err = Error;

    /// Accepts full semver (`2.7.5`) as well as the shortened forms used in
    /// tags (`2`, `2.7`), with an optional leading `v`.
    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        let version_str = trimmed.strip_prefix('v').unwrap_or(trimmed);

        if let Ok(v) = Version::parse(version_str) {
            return Ok(Self::new(v.major, v.minor, v.patch));
        }

        let padded = match version_str.matches('.').count() {
            0 => format!("{}.0.0", version_str),
            1 => format!("{}.0", version_str),
            _ => return Err(Error::invalid_version(s)),
        };

        Version::parse(&padded)
            .map(|v| Self::new(v.major, v.minor, v.patch))
            .map_err(|_| Error::invalid_version(s))
    }
}

impl fmt::Display for ParsedVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Result of classifying a single tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    InScope(ParsedVersion),
    OutOfScope,
}

impl Classification {
    pub fn is_in_scope(&self) -> bool {
        matches!(self, Classification::InScope(_))
    }
}

/// Compiled tag filter
#[derive(Debug, Clone)]
pub struct TagFilter {
    major: u64,
    include: Regex,
    exclude: Vec<Regex>,
    min_version: ParsedVersion,
}

impl TagFilter {
    /// Build a filter from configuration
    pub fn from_config(config: &FilterConfig) -> Result<Self> {
        let min_version: ParsedVersion = config.min_version.parse()?;
        Self::new(config.major, &config.variants, &config.exclude, min_version)
    }

    /// Build a filter for a fixed major version.
    ///
    /// `variants` are literal suffixes (e.g. `alpine`) allowed after a single
    /// `-`. `exclude` are regular expressions that reject a tag outright.
    pub fn new(
        major: u64,
        variants: &[String],
        exclude: &[String],
        min_version: ParsedVersion,
    ) -> Result<Self> {
        let variant_group = if variants.is_empty() {
            String::new()
        } else {
            let alternatives: Vec<String> = variants.iter().map(|v| regex::escape(v)).collect();
            format!("(?:-(?:{}))?", alternatives.join("|"))
        };
        let include_pattern = format!(r"^{}(?:\.?\d+(?:\.\d+)?)?{}$", major, variant_group);
        let include = Regex::new(&include_pattern)
            .map_err(|e| Error::invalid_pattern(include_pattern.clone(), e))?;

        let exclude = exclude
            .iter()
            .map(|p| {
                // Anchored at the start so patterns behave like a prefix match
                let anchored = format!("^(?:{})", p);
                Regex::new(&anchored).map_err(|e| Error::invalid_pattern(p.clone(), e))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            major,
            include,
            exclude,
            min_version,
        })
    }

    pub fn min_version(&self) -> &ParsedVersion {
        &self.min_version
    }

    pub fn major(&self) -> u64 {
        self.major
    }

    /// True when the tag matches any exclusion pattern
    pub fn is_excluded(&self, tag: &str) -> bool {
        self.exclude.iter().any(|re| re.is_match(tag))
    }

    /// Classify one tag
    pub fn classify(&self, tag: &str) -> Classification {
        if self.is_excluded(tag) || !self.include.is_match(tag) {
            return Classification::OutOfScope;
        }

        match ParsedVersion::from_tag(tag) {
            Some(version) if version.major() == self.major && version >= self.min_version => {
                Classification::InScope(version)
            }
            _ => Classification::OutOfScope,
        }
    }

    /// In-scope tags from `tags`, deduplicated and sorted ascending by name
    pub fn filter<I, S>(&self, tags: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        tags.into_iter()
            .filter(|t| self.classify(t.as_ref()).is_in_scope())
            .map(|t| t.as_ref().to_string())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_filter() -> TagFilter {
        TagFilter::from_config(&FilterConfig::default()).unwrap()
    }

    #[test]
    fn test_scenario_from_mixed_upstream_list() {
        let filter = default_filter();
        let tags = [
            "2.7.6",
            "2.7.6-alpine",
            "2.6.0",
            "2.7.6-windowsservercore-ltsc2022",
            "2.7.6-builder",
        ];

        assert_eq!(filter.filter(tags), vec!["2.7.6", "2.7.6-alpine"]);
    }

    #[test]
    fn test_exclusion_takes_precedence() {
        // Both would otherwise match the inclusion shape
        let filter = TagFilter::new(
            2,
            &["alpine".to_string(), "builder".to_string()],
            &[".*-builder$".to_string()],
            ParsedVersion::new(2, 0, 0),
        )
        .unwrap();

        assert!(filter.classify("2.8.0-alpine").is_in_scope());
        assert!(!filter.classify("2.8.0-builder").is_in_scope());
        assert!(filter.is_excluded("2.8.0-builder"));
    }

    #[test]
    fn test_windowsservercore_always_excluded() {
        let filter = default_filter();
        for tag in [
            "2.8.4-windowsservercore",
            "2.8.4-windowsservercore-1809",
            "2-windowsservercore-ltsc2022",
        ] {
            assert!(filter.is_excluded(tag), "{} should be excluded", tag);
            assert_eq!(filter.classify(tag), Classification::OutOfScope);
        }
    }

    #[test]
    fn test_below_floor_is_out_of_scope() {
        let filter = default_filter();
        for tag in ["2.7.4", "2.7.4-alpine", "2.6", "2", "2.0.0"] {
            assert_eq!(
                filter.classify(tag),
                Classification::OutOfScope,
                "{} is below 2.7.5",
                tag
            );
        }
        assert_eq!(
            filter.classify("2.7.5"),
            Classification::InScope(ParsedVersion::new(2, 7, 5))
        );
    }

    #[test]
    fn test_shape_rejections() {
        let filter = default_filter();
        for tag in [
            "latest",
            "alpine",
            "3.0.0",
            "2.8.0-alpine-extra",
            "2.8.0-alpine-alpine",
            "2.8.0-rc.1",
            "2.8.0-beta",
            "2.8.x",
            "v2.8.0",
            "227",
        ] {
            assert!(!filter.classify(tag).is_in_scope(), "{} should be rejected", tag);
        }
    }

    #[test]
    fn test_short_forms_parse_with_zero_defaults() {
        let filter = TagFilter::new(2, &["alpine".to_string()], &[], ParsedVersion::new(2, 0, 0))
            .unwrap();

        assert_eq!(
            filter.classify("2"),
            Classification::InScope(ParsedVersion::new(2, 0, 0))
        );
        assert_eq!(
            filter.classify("2.8"),
            Classification::InScope(ParsedVersion::new(2, 8, 0))
        );
        assert_eq!(
            filter.classify("2.8-alpine"),
            Classification::InScope(ParsedVersion::new(2, 8, 0))
        );
    }

    #[test]
    fn test_filter_dedups_and_sorts() {
        let filter = default_filter();
        let tags = vec!["2.8.0", "2.10.0", "2.8.0", "2.7.6-alpine", "2.10.0", "2.7.6"];

        // Byte-lexical order, not version order
        assert_eq!(
            filter.filter(tags),
            vec!["2.10.0", "2.7.6", "2.7.6-alpine", "2.8.0"]
        );
    }

    #[test]
    fn test_variants_are_literal() {
        let filter = TagFilter::new(2, &["a.b".to_string()], &[], ParsedVersion::new(2, 0, 0))
            .unwrap();
        assert!(filter.classify("2.8.0-a.b").is_in_scope());
        assert!(!filter.classify("2.8.0-axb").is_in_scope());
    }

    #[test]
    fn test_invalid_exclude_pattern() {
        let result = TagFilter::new(2, &[], &["(".to_string()], ParsedVersion::new(2, 0, 0));
        assert!(matches!(result, Err(Error::InvalidPattern { .. })));
    }

    #[test]
    fn test_parsed_version_from_str() {
        assert_eq!("2.7.5".parse::<ParsedVersion>().unwrap(), ParsedVersion::new(2, 7, 5));
        assert_eq!("v2.7".parse::<ParsedVersion>().unwrap(), ParsedVersion::new(2, 7, 0));
        assert_eq!("3".parse::<ParsedVersion>().unwrap(), ParsedVersion::new(3, 0, 0));
        assert!("two".parse::<ParsedVersion>().is_err());
        assert!("2.7.5.1".parse::<ParsedVersion>().is_err());
    }

    #[test]
    fn test_version_ordering() {
        assert!(ParsedVersion::new(2, 10, 0) > ParsedVersion::new(2, 9, 9));
        assert!(ParsedVersion::new(2, 7, 5) > ParsedVersion::new(2, 7, 4));
        assert_eq!(ParsedVersion::from_tag("2-alpine"), Some(ParsedVersion::new(2, 0, 0)));
        assert_eq!(ParsedVersion::from_tag("latest"), None);
    }
}
