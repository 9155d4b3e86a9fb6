//! Quality rule resolver.
//!
//! Rules are flat structs of optional predicates (see `imgforge_config`);
//! each predicate is evaluated independently and specificity scoring is a
//! pure function over the populated fields. Resolution is a last-write-wins
//! fold over matching rules in ascending specificity, so a highly specific
//! rule overrides only the keys it declares while inheriting the rest from
//! broader rules and the defaults.

use glob::{MatchOptions, Pattern};
use imgforge_config::QualityRule;
use std::collections::BTreeMap;
use std::path::Path;

/// Image dimensions from the codec's probe step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageMeta {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

/// Checks if a rule matches a file.
///
/// Every predicate the rule declares must evaluate true; absent predicates
/// are vacuously true. The pattern predicate is a case-insensitive glob over
/// the filename only. The directory predicate is substring containment
/// anywhere in the path. Size predicates require metadata: a rule declaring
/// any size predicate never matches when `meta` is `None`.
pub fn rule_matches(rule: &QualityRule, path: &Path, meta: Option<&ImageMeta>) -> bool {
    if let Some(pattern) = &rule.pattern {
        let filename = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => name,
            None => return false,
        };
        let options = MatchOptions {
            case_sensitive: false,
            require_literal_separator: false,
            require_literal_leading_dot: false,
        };
        // An invalid glob never matches; config validation happens upstream.
        match Pattern::new(pattern) {
            Ok(compiled) => {
                if !compiled.matches_with(filename, options) {
                    return false;
                }
            }
            Err(_) => return false,
        }
    }

    if let Some(directory) = &rule.directory {
        if !path.to_string_lossy().contains(directory.as_str()) {
            return false;
        }
    }

    if rule.has_size_predicate() {
        let meta = match meta {
            Some(m) => m,
            None => return false,
        };
        if let Some(min_width) = rule.min_width {
            if meta.width < min_width {
                return false;
            }
        }
        if let Some(min_height) = rule.min_height {
            if meta.height < min_height {
                return false;
            }
        }
        if let Some(max_width) = rule.max_width {
            if meta.width > max_width {
                return false;
            }
        }
        if let Some(max_height) = rule.max_height {
            if meta.height > max_height {
                return false;
            }
        }
    }

    true
}

/// Computes the specificity score of a rule (higher = more specific).
///
/// - pattern: +4, plus +0.1 per non-wildcard character
/// - directory: +2, plus +0.1 per path segment
/// - any size predicate: +1
/// - compound bonus: +2 per predicate kind beyond the first
pub fn specificity(rule: &QualityRule) -> f64 {
    let mut score = 0.0;
    let mut kinds = 0u32;

    if let Some(pattern) = &rule.pattern {
        kinds += 1;
        let literal_chars = pattern.chars().filter(|c| !matches!(c, '*' | '?')).count();
        score += 4.0 + 0.1 * literal_chars as f64;
    }

    if let Some(directory) = &rule.directory {
        kinds += 1;
        let depth = directory.split('/').filter(|s| !s.is_empty()).count();
        score += 2.0 + 0.1 * depth as f64;
    }

    if rule.has_size_predicate() {
        kinds += 1;
        score += 1.0;
    }

    if kinds > 1 {
        score += 2.0 * (kinds - 1) as f64;
    }

    score
}

/// Computes the effective quality map for a file.
///
/// Collects matching rules, sorts ascending by specificity (stable, so ties
/// keep declaration order), and folds each rule's quality keys onto an
/// accumulator seeded with `defaults`. The most specific rule's keys land
/// last and win; keys no rule sets keep the default value.
pub fn resolve_quality(
    path: &Path,
    meta: Option<&ImageMeta>,
    defaults: &BTreeMap<String, u8>,
    rules: &[QualityRule],
) -> BTreeMap<String, u8> {
    let mut matching: Vec<&QualityRule> = rules
        .iter()
        .filter(|rule| rule_matches(rule, path, meta))
        .collect();

    matching.sort_by(|a, b| {
        specificity(a)
            .partial_cmp(&specificity(b))
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut resolved = defaults.clone();
    for rule in matching {
        for (format, quality) in &rule.quality {
            resolved.insert(format.clone(), *quality);
        }
    }

    resolved
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::path::PathBuf;

    fn quality(pairs: &[(&str, u8)]) -> BTreeMap<String, u8> {
        pairs
            .iter()
            .map(|(format, value)| (format.to_string(), *value))
            .collect()
    }

    fn pattern_rule(pattern: &str, q: &[(&str, u8)]) -> QualityRule {
        QualityRule {
            pattern: Some(pattern.to_string()),
            quality: quality(q),
            ..Default::default()
        }
    }

    fn directory_rule(directory: &str, q: &[(&str, u8)]) -> QualityRule {
        QualityRule {
            directory: Some(directory.to_string()),
            quality: quality(q),
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_rule_matches_everything() {
        let rule = QualityRule::default();
        assert!(rule_matches(&rule, Path::new("/any/file.png"), None));
    }

    #[test]
    fn test_pattern_matches_filename_only() {
        let rule = pattern_rule("*-hero.*", &[]);

        assert!(rule_matches(&rule, Path::new("/site/banner-hero.png"), None));
        // The glob must match the filename, not a path component
        assert!(!rule_matches(
            &rule,
            Path::new("/assets-hero./photo.png"),
            None
        ));
    }

    #[test]
    fn test_pattern_is_case_insensitive() {
        let rule = pattern_rule("*-HERO.*", &[]);
        assert!(rule_matches(&rule, Path::new("/site/banner-hero.PNG"), None));
    }

    #[test]
    fn test_directory_substring_match() {
        let rule = directory_rule("gallery/", &[]);

        assert!(rule_matches(
            &rule,
            Path::new("/photos/gallery/cat.png"),
            None
        ));
        assert!(!rule_matches(&rule, Path::new("/photos/misc/cat.png"), None));
    }

    #[test]
    fn test_size_predicate_requires_metadata() {
        let rule = QualityRule {
            min_width: Some(1920),
            ..Default::default()
        };

        // No metadata: never matches
        assert!(!rule_matches(&rule, Path::new("/a.png"), None));

        let wide = ImageMeta {
            width: 3840,
            height: 2160,
        };
        let narrow = ImageMeta {
            width: 640,
            height: 480,
        };
        assert!(rule_matches(&rule, Path::new("/a.png"), Some(&wide)));
        assert!(!rule_matches(&rule, Path::new("/a.png"), Some(&narrow)));
    }

    #[test]
    fn test_size_bounds_are_inclusive() {
        let rule = QualityRule {
            min_width: Some(1920),
            max_width: Some(1920),
            min_height: Some(1080),
            max_height: Some(1080),
            ..Default::default()
        };
        let exact = ImageMeta {
            width: 1920,
            height: 1080,
        };
        assert!(rule_matches(&rule, Path::new("/a.png"), Some(&exact)));
    }

    #[test]
    fn test_all_declared_predicates_must_hold() {
        let rule = QualityRule {
            pattern: Some("*.png".to_string()),
            directory: Some("gallery/".to_string()),
            ..Default::default()
        };

        assert!(rule_matches(&rule, Path::new("/gallery/cat.png"), None));
        assert!(!rule_matches(&rule, Path::new("/gallery/cat.jpg"), None));
        assert!(!rule_matches(&rule, Path::new("/misc/cat.png"), None));
    }

    #[test]
    fn test_specificity_components() {
        // pattern "*-hero.*": 4 + 0.1 * 6 literal chars ("-hero.")
        let pattern = pattern_rule("*-hero.*", &[]);
        assert!((specificity(&pattern) - 4.6).abs() < 1e-9);

        // directory "gallery/": 2 + 0.1 * 1 segment
        let directory = directory_rule("gallery/", &[]);
        assert!((specificity(&directory) - 2.1).abs() < 1e-9);

        // size only: 1
        let size = QualityRule {
            min_width: Some(100),
            ..Default::default()
        };
        assert!((specificity(&size) - 1.0).abs() < 1e-9);

        // compound pattern+directory: 4.6 + 2.1 + 2 bonus
        let compound = QualityRule {
            pattern: Some("*-hero.*".to_string()),
            directory: Some("gallery/".to_string()),
            ..Default::default()
        };
        assert!((specificity(&compound) - 8.7).abs() < 1e-9);
    }

    #[test]
    fn test_directory_depth_increases_specificity() {
        let shallow = directory_rule("gallery/", &[]);
        let deep = directory_rule("photos/gallery/summer/", &[]);
        assert!(specificity(&deep) > specificity(&shallow));
    }

    #[test]
    fn test_pattern_rule_beats_directory_rule_on_shared_key() {
        let rules = vec![
            directory_rule("gallery/", &[("webp", 80), ("avif", 50)]),
            pattern_rule("*-hero.*", &[("webp", 95)]),
        ];
        let defaults = quality(&[("webp", 75), ("jpeg", 85)]);

        let resolved = resolve_quality(
            Path::new("gallery/site-hero.png"),
            None,
            &defaults,
            &rules,
        );

        // Pattern rule (4.6) outranks directory rule (2.1) on the shared key
        assert_eq!(resolved.get("webp"), Some(&95));
        // Keys only the directory rule sets are still present
        assert_eq!(resolved.get("avif"), Some(&50));
        // Unset keys keep the default
        assert_eq!(resolved.get("jpeg"), Some(&85));
    }

    #[test]
    fn test_tied_specificity_keeps_declaration_order() {
        // Identical patterns, identical specificity: the later rule wins
        let rules = vec![
            pattern_rule("*.png", &[("webp", 60)]),
            pattern_rule("*.png", &[("webp", 70)]),
        ];
        let defaults = quality(&[("webp", 80)]);

        let resolved = resolve_quality(Path::new("a.png"), None, &defaults, &rules);
        assert_eq!(resolved.get("webp"), Some(&70));
    }

    #[test]
    fn test_no_matching_rules_returns_defaults() {
        let rules = vec![directory_rule("gallery/", &[("webp", 60)])];
        let defaults = quality(&[("webp", 80)]);

        let resolved = resolve_quality(Path::new("/misc/cat.png"), None, &defaults, &rules);
        assert_eq!(resolved, defaults);
    }

    // Strategy for rules with an arbitrary mix of predicates
    fn rule_strategy() -> impl Strategy<Value = QualityRule> {
        (
            proptest::option::of("[a-z*?.-]{1,12}"),
            proptest::option::of("[a-z/]{1,12}"),
            proptest::option::of(1u32..5000),
            proptest::option::of(1u32..5000),
            proptest::collection::btree_map("[a-z]{3,5}", 1u8..101, 0..3),
        )
            .prop_map(|(pattern, directory, min_width, max_height, q)| QualityRule {
                pattern,
                directory,
                min_width,
                min_height: None,
                max_width: None,
                max_height,
                quality: q,
            })
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        // Specificity is a pure function of the populated predicate fields
        // and is always non-negative; a rule with any predicate outranks the
        // empty rule.
        #[test]
        fn prop_specificity_is_nonnegative_and_zero_only_for_empty(rule in rule_strategy()) {
            let score = specificity(&rule);
            prop_assert!(score >= 0.0);

            let has_predicate = rule.pattern.is_some()
                || rule.directory.is_some()
                || rule.has_size_predicate();
            prop_assert_eq!(score > 0.0, has_predicate);
        }

        // Resolution never removes a key: the resolved map always contains
        // every default key, and every key set by some matching rule.
        #[test]
        fn prop_resolution_preserves_default_keys(
            rules in proptest::collection::vec(rule_strategy(), 0..6),
            defaults in proptest::collection::btree_map("[a-z]{3,5}", 1u8..101, 1..4),
        ) {
            let path = PathBuf::from("photos/gallery/site-hero.png");
            let meta = ImageMeta { width: 2000, height: 1500 };

            let resolved = resolve_quality(&path, Some(&meta), &defaults, &rules);

            for key in defaults.keys() {
                prop_assert!(resolved.contains_key(key), "default key {} lost", key);
            }
            for rule in &rules {
                if rule_matches(rule, &path, Some(&meta)) {
                    for key in rule.quality.keys() {
                        prop_assert!(resolved.contains_key(key), "rule key {} lost", key);
                    }
                }
            }
        }
    }
}
