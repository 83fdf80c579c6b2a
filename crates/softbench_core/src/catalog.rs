//! Test-case catalog: which vectors to synthesize, at which size, from which distribution.

use std::{collections::BTreeSet, fmt, path::PathBuf};

use serde::{Deserialize, Serialize};

/// Named policy for synthesizing the values of one input vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DistributionClass {
    /// Uniform over [-10, 10].
    Random,
    /// Uniform over [-100, 100] plus fixed outliers at indices 0..3 when the vector exceeds 100 elements.
    Extreme,
    /// Every element is exactly 1.0.
    Uniform,
    /// Linearly spaced from -5 to 5 inclusive.
    Ascending,
    /// Uniform over [-1e-3, 1e-3].
    SmallValues,
    /// Fallback for unrecognised class names: uniform over [-5, 5].
    Default,
}

impl DistributionClass {
    pub const ALL: [DistributionClass; 6] = [
        DistributionClass::Random,
        DistributionClass::Extreme,
        DistributionClass::Uniform,
        DistributionClass::Ascending,
        DistributionClass::SmallValues,
        DistributionClass::Default,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DistributionClass::Random => "random",
            DistributionClass::Extreme => "extreme",
            DistributionClass::Uniform => "uniform",
            DistributionClass::Ascending => "ascending",
            DistributionClass::SmallValues => "small_values",
            DistributionClass::Default => "default",
        }
    }

    /// Maps a class name onto its policy; anything unknown falls back to [`DistributionClass::Default`].
    pub fn from_name(name: &str) -> Self {
        match name.trim() {
            "random" => DistributionClass::Random,
            "extreme" => DistributionClass::Extreme,
            "uniform" => DistributionClass::Uniform,
            "ascending" => DistributionClass::Ascending,
            "small_values" => DistributionClass::SmallValues,
            _ => DistributionClass::Default,
        }
    }
}

impl fmt::Display for DistributionClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for DistributionClass {
    fn from(value: String) -> Self {
        Self::from_name(&value)
    }
}

impl From<DistributionClass> for String {
    fn from(value: DistributionClass) -> Self {
        value.as_str().to_string()
    }
}

/// One catalog entry. Identifies exactly one generated `<name>.in` file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCaseSpec {
    pub size: usize,
    pub name: String,
    pub distribution: DistributionClass,
}

impl TestCaseSpec {
    pub fn new(size: usize, name: impl Into<String>, distribution: DistributionClass) -> Self {
        Self {
            size,
            name: name.into(),
            distribution,
        }
    }

    /// File name of the input vector produced for this entry.
    pub fn input_file_name(&self) -> String {
        format!("{}.in", self.name)
    }

    /// File name of the output vector each implementation writes for this entry.
    pub fn output_file_name(&self) -> String {
        format!("{}.out", self.name)
    }
}

/// A generated input file paired with the catalog entry it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BenchmarkCase {
    pub spec: TestCaseSpec,
    pub input: PathBuf,
    /// Seed the values were drawn from; `None` for cases discovered on disk rather than synthesized.
    #[serde(default)]
    pub seed: Option<u64>,
}

/// The stock suite: correctness-scale random vectors, performance-scale random vectors up to
/// 10^8 elements, then the numerical-stability special cases.
pub fn default_catalog() -> Vec<TestCaseSpec> {
    use DistributionClass::*;
    vec![
        TestCaseSpec::new(1_000, "small_random", Random),
        TestCaseSpec::new(10_000, "medium_random", Random),
        TestCaseSpec::new(100_000, "large_random", Random),
        TestCaseSpec::new(1_000_000, "1M_random", Random),
        TestCaseSpec::new(5_000_000, "5M_random", Random),
        TestCaseSpec::new(10_000_000, "10M_random", Random),
        TestCaseSpec::new(50_000_000, "50M_random", Random),
        TestCaseSpec::new(100_000_000, "100M_random", Random),
        TestCaseSpec::new(100_000, "extreme_values", Extreme),
        TestCaseSpec::new(100_000, "uniform_values", Uniform),
        TestCaseSpec::new(100_000, "small_values", SmallValues),
        TestCaseSpec::new(100_000, "ascending", Ascending),
    ]
}

/// Narrows a catalog while keeping its order.
#[derive(Debug, Clone, Default)]
pub struct CatalogFilter {
    pub max_size: Option<usize>,
    pub only: Option<BTreeSet<String>>,
}

impl CatalogFilter {
    pub fn is_empty(&self) -> bool {
        self.max_size.is_none() && self.only.is_none()
    }

    pub fn accepts(&self, spec: &TestCaseSpec) -> bool {
        self.admits(&spec.name, spec.size)
    }

    /// Same test as [`CatalogFilter::accepts`] for anything carrying a name and a size.
    pub fn admits(&self, name: &str, size: usize) -> bool {
        if let Some(max) = self.max_size {
            if size > max {
                return false;
            }
        }
        match &self.only {
            Some(names) => names.contains(name),
            None => true,
        }
    }

    pub fn apply(&self, catalog: Vec<TestCaseSpec>) -> Vec<TestCaseSpec> {
        catalog.into_iter().filter(|spec| self.accepts(spec)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_class_names_fall_back_to_default() {
        assert_eq!(DistributionClass::from_name("gaussian"), DistributionClass::Default);
        assert_eq!(DistributionClass::from_name(""), DistributionClass::Default);
        for class in DistributionClass::ALL {
            assert_eq!(DistributionClass::from_name(class.as_str()), class);
        }
    }

    #[test]
    fn default_catalog_spans_correctness_and_performance_sizes() {
        let catalog = default_catalog();
        assert_eq!(catalog.len(), 12);
        assert_eq!(catalog.first().map(|c| c.size), Some(1_000));
        assert_eq!(catalog.iter().map(|c| c.size).max(), Some(100_000_000));

        let names: BTreeSet<_> = catalog.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names.len(), catalog.len(), "catalog names must be unique");
        assert!(catalog
            .iter()
            .any(|c| c.distribution == DistributionClass::Extreme && c.size > 100));
    }

    #[test]
    fn filter_keeps_catalog_order() {
        let filter = CatalogFilter {
            max_size: Some(100_000),
            only: None,
        };
        let kept = filter.apply(default_catalog());
        assert!(kept.iter().all(|c| c.size <= 100_000));
        assert_eq!(kept[0].name, "small_random");
        assert_eq!(kept.last().map(|c| c.name.as_str()), Some("ascending"));

        let filter = CatalogFilter {
            max_size: None,
            only: Some(["ascending".to_string(), "small_random".to_string()].into()),
        };
        let kept: Vec<_> = filter
            .apply(default_catalog())
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(kept, vec!["small_random", "ascending"]);
    }

    #[test]
    fn distribution_serializes_as_its_name() {
        let spec = TestCaseSpec::new(10, "tiny", DistributionClass::SmallValues);
        let json = serde_json::to_string(&spec).unwrap();
        assert!(json.contains("\"small_values\""));
        let parsed: TestCaseSpec =
            serde_json::from_str(r#"{"size": 5, "name": "x", "distribution": "lognormal"}"#)
                .unwrap();
        assert_eq!(parsed.distribution, DistributionClass::Default);
    }
}
