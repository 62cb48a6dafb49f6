//! Catalog Index
//!
//! Immutable lookup table from component type identifier to the metadata of a
//! pre-authored component. Loaded once from a versioned data table and shared
//! read-only by every session.

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use crate::error::CatalogError;
use crate::PropertyBag;

// ═══════════════════════════════════════════════════════════════════════════════
// BUILTIN TABLE
// ═══════════════════════════════════════════════════════════════════════════════

const BUILTIN_CATALOG_JSON: &str = include_str!("../data/catalog.json");

const BUILTIN_TEMPLATES: &[(&str, &str)] = &[
    ("Navbar", include_str!("../data/templates/Navbar.jsx")),
    ("HeroSection", include_str!("../data/templates/HeroSection.jsx")),
    ("FeatureGrid", include_str!("../data/templates/FeatureGrid.jsx")),
    ("Card", include_str!("../data/templates/Card.jsx")),
    ("PricingTable", include_str!("../data/templates/PricingTable.jsx")),
    ("Testimonial", include_str!("../data/templates/Testimonial.jsx")),
    ("ContactForm", include_str!("../data/templates/ContactForm.jsx")),
    ("Footer", include_str!("../data/templates/Footer.jsx")),
];

lazy_static! {
    static ref BUILTIN_CATALOG: Arc<CatalogIndex> = {
        let mut index = CatalogIndex::from_json(BUILTIN_CATALOG_JSON)
            .expect("embedded catalog table is valid");
        for (type_id, template) in BUILTIN_TEMPLATES {
            index.set_template(type_id, template);
        }
        Arc::new(index)
    };
}

// ═══════════════════════════════════════════════════════════════════════════════
// TYPES
// ═══════════════════════════════════════════════════════════════════════════════

/// Closed set of component categories.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ComponentCategory {
    Layout,
    Navigation,
    Hero,
    Content,
    Features,
    Pricing,
    Testimonials,
    Forms,
    Media,
    Footer,
    #[default]
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    /// Hyphenated, human-entered form (`pricing-table`)
    pub id: String,
    pub display_name: String,
    pub category: ComponentCategory,
    /// Canonical capitalized form (`PricingTable`)
    pub type_id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub default_properties: PropertyBag,
    #[serde(default)]
    pub required_packages: BTreeSet<String>,
    pub source_import_path: String,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    /// Component module text, copied verbatim on export
    #[serde(default)]
    pub template: String,
}

impl CatalogEntry {
    pub fn is_exportable(&self) -> bool {
        !self.template.trim().is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct CatalogTable {
    version: String,
    components: Vec<CatalogEntry>,
}

#[derive(Debug, Clone)]
pub struct CatalogIndex {
    version: String,
    entries: Vec<CatalogEntry>,
    by_id: HashMap<String, usize>,
    by_type: HashMap<String, usize>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// TYPE IDENTIFIER FORMS
// ═══════════════════════════════════════════════════════════════════════════════

/// `pricing-card`, `pricing_card` and `pricing card` all become `PricingCard`.
/// Input without separators keeps its inner casing; only the first letter is raised.
pub fn to_canonical_type_id(raw: &str) -> String {
    raw.trim()
        .split(|c: char| c == '-' || c == '_' || c.is_whitespace())
        .filter(|segment| !segment.is_empty())
        .map(|segment| {
            let mut chars = segment.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect()
}

/// `PricingCard` becomes `pricing-card`.
pub fn to_hyphenated_type_id(canonical: &str) -> String {
    let mut out = String::with_capacity(canonical.len() + 4);
    for (i, c) in canonical.trim().chars().enumerate() {
        if c.is_uppercase() {
            if i > 0 {
                out.push('-');
            }
            out.extend(c.to_lowercase());
        } else if c == '_' || c.is_whitespace() {
            out.push('-');
        } else {
            out.push(c);
        }
    }
    out
}

// ═══════════════════════════════════════════════════════════════════════════════
// INDEX
// ═══════════════════════════════════════════════════════════════════════════════

impl CatalogIndex {
    pub fn new(version: impl Into<String>, entries: Vec<CatalogEntry>) -> Result<Self, CatalogError> {
        let mut by_id = HashMap::new();
        let mut by_type = HashMap::new();

        for (idx, entry) in entries.iter().enumerate() {
            if entry.type_id.is_empty() {
                return Err(CatalogError::InvalidEntry {
                    id: entry.id.clone(),
                    reason: "typeId is empty".to_string(),
                });
            }
            if entry.type_id != to_canonical_type_id(&entry.type_id) {
                return Err(CatalogError::InvalidEntry {
                    id: entry.id.clone(),
                    reason: format!("typeId `{}` is not in canonical form", entry.type_id),
                });
            }
            if by_type.insert(entry.type_id.clone(), idx).is_some() {
                return Err(CatalogError::DuplicateType {
                    type_id: entry.type_id.clone(),
                });
            }
            by_id.insert(entry.id.clone(), idx);
        }

        Ok(Self {
            version: version.into(),
            entries,
            by_id,
            by_type,
        })
    }

    /// Parse a `{ "version": ..., "components": [...] }` table.
    pub fn from_json(source: &str) -> Result<Self, CatalogError> {
        let table: CatalogTable = serde_json::from_str(source)?;
        Self::new(table.version, table.components)
    }

    /// The embedded catalog shipped with the crate.
    pub fn builtin() -> Arc<CatalogIndex> {
        Arc::clone(&BUILTIN_CATALOG)
    }

    pub fn empty() -> Self {
        Self {
            version: String::new(),
            entries: Vec::new(),
            by_id: HashMap::new(),
            by_type: HashMap::new(),
        }
    }

    fn set_template(&mut self, type_id: &str, template: &str) {
        if let Some(&idx) = self.by_type.get(type_id) {
            self.entries[idx].template = template.to_string();
        }
    }

    /// Exact `id`, then exact `typeId`, then hyphen-to-capitalized transliteration.
    pub fn resolve(&self, raw: &str) -> Option<&CatalogEntry> {
        let raw = raw.trim();
        if let Some(&idx) = self.by_id.get(raw) {
            return Some(&self.entries[idx]);
        }
        if let Some(&idx) = self.by_type.get(raw) {
            return Some(&self.entries[idx]);
        }
        self.by_type
            .get(&to_canonical_type_id(raw))
            .map(|&idx| &self.entries[idx])
    }

    pub fn contains(&self, raw: &str) -> bool {
        self.resolve(raw).is_some()
    }

    pub fn entries(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.iter()
    }

    pub fn by_category(&self, category: ComponentCategory) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.iter().filter(move |e| e.category == category)
    }

    pub fn with_tag<'s>(&'s self, tag: &'s str) -> impl Iterator<Item = &'s CatalogEntry> + 's {
        self.entries.iter().filter(move |e| e.tags.contains(tag))
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> CatalogIndex {
        CatalogIndex::from_json(
            r#"{
                "version": "test-1",
                "components": [
                    {
                        "id": "pricing-card",
                        "displayName": "Pricing Card",
                        "category": "pricing",
                        "typeId": "PricingCard",
                        "sourceImportPath": "components/PricingCard",
                        "requiredPackages": ["lucide-react"],
                        "tags": ["commerce"]
                    },
                    {
                        "id": "nav",
                        "displayName": "Navigation",
                        "category": "navigation",
                        "typeId": "Navbar",
                        "sourceImportPath": "components/Navbar"
                    }
                ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_canonical_forms() {
        assert_eq!(to_canonical_type_id("pricing-card"), "PricingCard");
        assert_eq!(to_canonical_type_id("pricing_card"), "PricingCard");
        assert_eq!(to_canonical_type_id("PricingCard"), "PricingCard");
        assert_eq!(to_canonical_type_id(" hero "), "Hero");
        assert_eq!(to_hyphenated_type_id("PricingCard"), "pricing-card");
        assert_eq!(to_hyphenated_type_id("Card"), "card");
    }

    #[test]
    fn test_resolve_prefers_exact_forms() {
        let index = table();
        assert_eq!(index.resolve("pricing-card").unwrap().type_id, "PricingCard");
        assert_eq!(index.resolve("PricingCard").unwrap().type_id, "PricingCard");
        // `nav` is an exact id even though it does not transliterate to `Navbar`
        assert_eq!(index.resolve("nav").unwrap().type_id, "Navbar");
        // transliteration fallback
        assert_eq!(index.resolve("navbar").unwrap().type_id, "Navbar");
        assert!(index.resolve("missing").is_none());
    }

    #[test]
    fn test_duplicate_type_rejected() {
        let err = CatalogIndex::from_json(
            r#"{"version": "x", "components": [
                {"id": "a", "displayName": "A", "category": "content", "typeId": "Card", "sourceImportPath": "a"},
                {"id": "b", "displayName": "B", "category": "content", "typeId": "Card", "sourceImportPath": "b"}
            ]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateType { ref type_id } if type_id == "Card"));
    }

    #[test]
    fn test_unknown_category_maps_to_other() {
        let index = CatalogIndex::from_json(
            r#"{"version": "x", "components": [
                {"id": "w", "displayName": "W", "category": "widgets", "typeId": "Widget", "sourceImportPath": "w"}
            ]}"#,
        )
        .unwrap();
        assert_eq!(index.resolve("Widget").unwrap().category, ComponentCategory::Other);
    }

    #[test]
    fn test_queries() {
        let index = table();
        assert_eq!(index.by_category(ComponentCategory::Pricing).count(), 1);
        assert_eq!(index.with_tag("commerce").count(), 1);
        assert_eq!(index.version(), "test-1");
    }

    #[test]
    fn test_builtin_catalog_is_complete() {
        let index = CatalogIndex::builtin();
        assert!(!index.is_empty());
        for entry in index.entries() {
            assert!(entry.is_exportable(), "{} has no template", entry.type_id);
        }
        assert_eq!(index.resolve("hero-section").unwrap().type_id, "HeroSection");
    }
}
