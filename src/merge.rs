//! Provenance-aware merge of one ingested batch.
//!
//! Each list is deduplicated first (last occurrence wins and takes its
//! position), then generated entries are inserted over catalog entries in an
//! ordered map. An overwrite keeps the slot of the catalog entry it replaces.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::catalog::{to_canonical_type_id, CatalogIndex, ComponentCategory};
use crate::PropertyBag;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Provenance {
    Catalog,
    Generated,
}

/// A catalog component requested by the generative service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogPick {
    #[serde(rename = "type", alias = "typeId")]
    pub type_id: String,
    #[serde(default)]
    pub category: Option<ComponentCategory>,
    #[serde(default, alias = "properties")]
    pub props: PropertyBag,
}

impl CatalogPick {
    pub fn new(type_id: impl Into<String>, props: PropertyBag) -> Self {
        Self {
            type_id: type_id.into(),
            category: None,
            props,
        }
    }
}

/// A component whose source text was produced by the generative service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedComponentDefinition {
    #[serde(rename = "type", alias = "typeId")]
    pub type_id: String,
    #[serde(default)]
    pub category: ComponentCategory,
    #[serde(rename = "props", alias = "defaultProperties", default)]
    pub default_properties: PropertyBag,
    #[serde(rename = "code", alias = "sourceText")]
    pub source_text: String,
}

impl GeneratedComponentDefinition {
    pub fn new(type_id: impl Into<String>, source_text: impl Into<String>) -> Self {
        Self {
            type_id: type_id.into(),
            category: ComponentCategory::default(),
            default_properties: PropertyBag::new(),
            source_text: source_text.into(),
        }
    }
}

/// Surviving entry of a merge, tagged with where it came from.
#[derive(Debug, Clone, PartialEq)]
pub enum MergedPick {
    Catalog(CatalogPick),
    Generated(GeneratedComponentDefinition),
}

impl MergedPick {
    pub fn provenance(&self) -> Provenance {
        match self {
            MergedPick::Catalog(_) => Provenance::Catalog,
            MergedPick::Generated(_) => Provenance::Generated,
        }
    }

    pub fn type_id(&self) -> &str {
        match self {
            MergedPick::Catalog(p) => &p.type_id,
            MergedPick::Generated(d) => &d.type_id,
        }
    }
}

/// Keep only the last item per key; survivors sit where their last occurrence was.
pub fn dedupe_last_wins<T, F>(items: Vec<T>, key: F) -> IndexMap<String, T>
where
    F: Fn(&T) -> String,
{
    let mut out = IndexMap::with_capacity(items.len());
    for item in items {
        let k = key(&item);
        out.shift_remove(&k);
        out.insert(k, item);
    }
    out
}

/// Merge key of a catalog pick: the catalog's canonical type when the pick
/// resolves, otherwise the canonical form of what was asked for.
fn catalog_key(catalog: &CatalogIndex, pick: &CatalogPick) -> String {
    catalog
        .resolve(&pick.type_id)
        .map(|entry| entry.type_id.clone())
        .unwrap_or_else(|| to_canonical_type_id(&pick.type_id))
}

pub fn merge_picks(
    catalog: &CatalogIndex,
    catalog_picks: Vec<CatalogPick>,
    generated_picks: Vec<GeneratedComponentDefinition>,
) -> IndexMap<String, MergedPick> {
    let catalog_picks = dedupe_last_wins(catalog_picks, |p| catalog_key(catalog, p));
    let generated_picks = dedupe_last_wins(generated_picks, |d| to_canonical_type_id(&d.type_id));

    let mut merged: IndexMap<String, MergedPick> = catalog_picks
        .into_iter()
        .map(|(k, p)| (k, MergedPick::Catalog(p)))
        .collect();

    for (k, d) in generated_picks {
        // insert() on an existing key replaces the value in place
        merged.insert(k, MergedPick::Generated(d));
    }
    merged
}
