//! Severity scale registry
//!
//! A severity scale is registered against category names and/or
//! diagnostic families. Lookup tries the category itself first, then its
//! family from [`crate::classify::family_of`]. No match means the
//! Severity stage is skipped.

use serde::{Deserialize, Serialize};

use crate::classify::family_of;

/// A registered severity questionnaire
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityScale {
    pub id: String,
    pub name: String,
    /// Number of items the question batch should contain
    pub item_count: usize,
    /// Category or family names this scale applies to
    #[serde(default)]
    pub categories: Vec<String>,
}

impl SeverityScale {
    pub fn new(id: &str, name: &str, item_count: usize, categories: &[&str]) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            item_count,
            categories: categories.iter().map(|c| c.to_string()).collect(),
        }
    }

    /// Built-in scales
    pub fn defaults() -> Vec<SeverityScale> {
        vec![
            SeverityScale::new(
                "phq-9",
                "Patient Health Questionnaire-9",
                9,
                &["Depressive Disorders"],
            ),
            SeverityScale::new(
                "gad-7",
                "Generalized Anxiety Disorder-7",
                7,
                &["Anxiety Disorders"],
            ),
        ]
    }

    fn covers(&self, name: &str) -> bool {
        self.categories.iter().any(|c| c.eq_ignore_ascii_case(name.trim()))
    }
}

/// Lookup over configured scales
#[derive(Debug, Clone, Default)]
pub struct SeverityScaleRegistry {
    scales: Vec<SeverityScale>,
}

impl SeverityScaleRegistry {
    pub fn new(scales: Vec<SeverityScale>) -> Self {
        Self { scales }
    }

    pub fn len(&self) -> usize {
        self.scales.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scales.is_empty()
    }

    /// Scale for a target category, by exact (case-insensitive) name and
    /// then by diagnostic family
    pub fn lookup(&self, category: &str) -> Option<&SeverityScale> {
        self.scales
            .iter()
            .find(|s| s.covers(category))
            .or_else(|| {
                let family = family_of(category)?;
                self.scales.iter().find(|s| s.covers(family))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_family() {
        let registry = SeverityScaleRegistry::new(SeverityScale::defaults());
        let scale = registry.lookup("Major Depressive Disorder").unwrap();
        assert_eq!(scale.id, "phq-9");
        assert_eq!(scale.item_count, 9);
        assert_eq!(registry.lookup("Panic Disorder").unwrap().id, "gad-7");
    }

    #[test]
    fn test_lookup_by_exact_category_wins() {
        let registry = SeverityScaleRegistry::new(vec![
            SeverityScale::new("dep-family", "Family", 9, &["Depressive Disorders"]),
            SeverityScale::new("mdd-only", "Specific", 5, &["major depressive disorder"]),
        ]);
        assert_eq!(registry.lookup("Major Depressive Disorder").unwrap().id, "mdd-only");
    }

    #[test]
    fn test_unregistered_category() {
        let registry = SeverityScaleRegistry::new(SeverityScale::defaults());
        assert!(registry.lookup("Schizophrenia").is_none());
        assert!(registry.lookup("Something Unknown").is_none());
    }
}
