//! Semantic-layer value objects
//!
//! Immutable references used by metric definitions and the dimension
//! consistency check run across data sources.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A named pointer to a metric, optionally qualified by its package
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MetricReference {
    metric_name: String,
    package_name: Option<String>,
}

impl MetricReference {
    pub fn new(metric_name: impl Into<String>) -> Self {
        Self {
            metric_name: metric_name.into(),
            package_name: None,
        }
    }

    pub fn with_package(metric_name: impl Into<String>, package_name: impl Into<String>) -> Self {
        Self {
            metric_name: metric_name.into(),
            package_name: Some(package_name.into()),
        }
    }

    pub fn metric_name(&self) -> &str {
        &self.metric_name
    }

    pub fn package_name(&self) -> Option<&str> {
        self.package_name.as_deref()
    }
}

impl std::fmt::Display for MetricReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.package_name {
            Some(package) => write!(f, "{}.{}", package, self.metric_name),
            None => write!(f, "{}", self.metric_name),
        }
    }
}

/// Kind of a dimension
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DimensionType {
    Categorical,
    Time,
}

/// Properties every occurrence of a dimension name must share
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DimensionInvariants {
    dimension_type: DimensionType,
    is_partition: bool,
}

/// One place a dimension is declared
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DimensionOccurrence {
    pub data_source: String,
    pub dimension_name: String,
    pub invariants: DimensionInvariants,
}

/// A dimension whose occurrences disagree
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DimensionConflict {
    pub dimension_name: String,

    /// data source -> invariants declared there, in declaration order
    pub declarations: BTreeMap<String, Vec<DimensionInvariants>>,
}

impl DimensionInvariants {
    pub const fn new(dimension_type: DimensionType, is_partition: bool) -> Self {
        Self {
            dimension_type,
            is_partition,
        }
    }

    pub fn dimension_type(&self) -> DimensionType {
        self.dimension_type
    }

    pub fn is_partition(&self) -> bool {
        self.is_partition
    }

    /// Find dimensions declared with different invariants
    ///
    /// Disagreement counts whether it spans data sources or sits inside one.
    /// Conflicts are returned sorted by dimension name.
    pub fn check_consistency<I>(occurrences: I) -> Vec<DimensionConflict>
    where
        I: IntoIterator<Item = DimensionOccurrence>,
    {
        let mut by_name: BTreeMap<String, BTreeMap<String, Vec<DimensionInvariants>>> = BTreeMap::new();
        for occurrence in occurrences {
            by_name
                .entry(occurrence.dimension_name)
                .or_default()
                .entry(occurrence.data_source)
                .or_default()
                .push(occurrence.invariants);
        }

        by_name
            .into_iter()
            .filter(|(_, declarations)| {
                let mut values = declarations.values().flatten();
                match values.next() {
                    Some(first) => values.any(|v| v != first),
                    None => false,
                }
            })
            .map(|(dimension_name, declarations)| DimensionConflict {
                dimension_name,
                declarations,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashSet;

    fn occurrence(source: &str, name: &str, inv: DimensionInvariants) -> DimensionOccurrence {
        DimensionOccurrence {
            data_source: source.to_string(),
            dimension_name: name.to_string(),
            invariants: inv,
        }
    }

    #[test]
    fn metric_reference_display() {
        assert_eq!(MetricReference::new("revenue").to_string(), "revenue");
        assert_eq!(
            MetricReference::with_package("revenue", "finance").to_string(),
            "finance.revenue"
        );
    }

    #[test]
    fn metric_reference_value_equality() {
        let a = MetricReference::with_package("revenue", "finance");
        let b = MetricReference::with_package("revenue", "finance");
        assert_eq!(a, b);
        assert_ne!(a, MetricReference::new("revenue"));
    }

    #[test]
    fn invariants_equality_is_structural() {
        let a = DimensionInvariants::new(DimensionType::Time, true);
        let b = DimensionInvariants::new(DimensionType::Time, true);
        assert_eq!(a, b);

        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
        assert!(!set.contains(&DimensionInvariants::new(DimensionType::Time, false)));
    }

    #[test]
    fn consistent_dimensions_have_no_conflicts() {
        let time = DimensionInvariants::new(DimensionType::Time, true);
        let conflicts = DimensionInvariants::check_consistency(vec![
            occurrence("orders", "ds", time),
            occurrence("payments", "ds", time),
        ]);
        assert!(conflicts.is_empty());
    }

    #[test]
    fn mismatched_dimension_is_reported() {
        let conflicts = DimensionInvariants::check_consistency(vec![
            occurrence("orders", "ds", DimensionInvariants::new(DimensionType::Time, true)),
            occurrence("payments", "ds", DimensionInvariants::new(DimensionType::Time, false)),
            occurrence("orders", "country", DimensionInvariants::new(DimensionType::Categorical, false)),
        ]);

        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].dimension_name, "ds");
        assert_eq!(conflicts[0].declarations.len(), 2);
    }

    #[test]
    fn conflict_within_one_source_is_reported() {
        let time = DimensionInvariants::new(DimensionType::Time, true);
        let categorical = DimensionInvariants::new(DimensionType::Categorical, false);
        let conflicts = DimensionInvariants::check_consistency(vec![
            occurrence("orders", "ds", time),
            occurrence("orders", "ds", categorical),
        ]);

        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].declarations["orders"], vec![time, categorical]);
    }

    #[test]
    fn repeated_identical_declaration_is_consistent() {
        let time = DimensionInvariants::new(DimensionType::Time, true);
        let conflicts = DimensionInvariants::check_consistency(vec![
            occurrence("orders", "ds", time),
            occurrence("orders", "ds", time),
            occurrence("payments", "ds", time),
        ]);
        assert!(conflicts.is_empty());
    }
}
