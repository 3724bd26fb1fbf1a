//! Feature / feature-option configuration model.
//!
//! # Responsibility
//! - Describe classification axes (`Feature`) and their values
//!   (`FeatureOption`).
//! - Evaluate the per-feature option quota for a selection.
//!
//! # Invariants
//! - Every option belongs to exactly one feature.
//! - A selection violates the quota when, for any single feature, the number
//!   of selected options of that feature exceeds `max_options`. Options of
//!   different features never count against each other.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

/// Primary key of a feature row.
pub type FeatureId = i64;
/// Primary key of a feature option row.
pub type OptionId = i64;

/// Configurable classification axis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feature {
    pub id: FeatureId,
    pub name: String,
    /// Maximum number of this feature's options one case may reference.
    pub max_options: u32,
}

/// One selectable value of a feature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureOption {
    pub id: OptionId,
    pub feature_id: FeatureId,
    pub name: String,
}

/// Selected option joined with its owning feature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedOption {
    pub option: FeatureOption,
    pub feature: Feature,
}

/// One feature whose quota a selection exceeds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaViolation {
    pub feature_id: FeatureId,
    pub feature_name: String,
    pub max_options: u32,
    pub selected: usize,
}

impl Display for QuotaViolation {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "feature \"{}\" allows at most {} options, got {}",
            self.feature_name, self.max_options, self.selected
        )
    }
}

/// Groups a selection by owning feature and reports every exceeded quota.
///
/// Callers must pass each option once; duplicates are counted as given.
/// Violations are ordered by feature id.
pub fn quota_violations(selection: &[ResolvedOption]) -> Vec<QuotaViolation> {
    let mut groups: BTreeMap<FeatureId, (&Feature, usize)> = BTreeMap::new();
    for resolved in selection {
        groups
            .entry(resolved.feature.id)
            .or_insert((&resolved.feature, 0))
            .1 += 1;
    }

    groups
        .into_values()
        .filter(|(feature, selected)| *selected > feature.max_options as usize)
        .map(|(feature, selected)| QuotaViolation {
            feature_id: feature.id,
            feature_name: feature.name.clone(),
            max_options: feature.max_options,
            selected,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{quota_violations, Feature, FeatureOption, ResolvedOption};

    fn feature(id: i64, max_options: u32) -> Feature {
        Feature {
            id,
            name: format!("feature-{id}"),
            max_options,
        }
    }

    fn selection(feature: &Feature, count: usize, first_id: i64) -> Vec<ResolvedOption> {
        (0..count as i64)
            .map(|offset| ResolvedOption {
                option: FeatureOption {
                    id: first_id + offset,
                    feature_id: feature.id,
                    name: format!("option-{}", first_id + offset),
                },
                feature: feature.clone(),
            })
            .collect()
    }

    #[test]
    fn selection_at_limit_is_accepted() {
        let limited = feature(1, 3);
        assert!(quota_violations(&selection(&limited, 3, 10)).is_empty());
    }

    #[test]
    fn selection_over_limit_reports_feature() {
        let limited = feature(1, 3);
        let violations = quota_violations(&selection(&limited, 5, 10));
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].selected, 5);
        assert_eq!(
            violations[0].to_string(),
            "feature \"feature-1\" allows at most 3 options, got 5"
        );
    }

    #[test]
    fn quota_is_counted_per_feature_not_across_features() {
        let first = feature(1, 2);
        let second = feature(2, 2);
        let mut selected = selection(&first, 2, 10);
        selected.extend(selection(&second, 2, 20));
        assert!(quota_violations(&selected).is_empty());
    }

    #[test]
    fn zero_quota_rejects_any_option() {
        let closed = feature(7, 0);
        let violations = quota_violations(&selection(&closed, 1, 1));
        assert_eq!(violations[0].feature_id, 7);
    }
}
