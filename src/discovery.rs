//! Catalog discovery.
//!
//! Builds a catalog index from a directory tree of per-component metadata
//! files (`Card.json`) with sibling template files (`Card.jsx` or
//! `Card.tsx`). Entries that cannot be read are skipped with a warning.

use serde::Deserialize;
use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::catalog::{to_canonical_type_id, to_hyphenated_type_id, CatalogEntry, CatalogIndex, ComponentCategory};
use crate::error::CatalogError;
use crate::PropertyBag;

const TEMPLATE_EXTENSIONS: &[&str] = &["jsx", "tsx"];

/// On-disk metadata; everything but the category can be derived from the path.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ComponentMetadata {
    id: Option<String>,
    display_name: Option<String>,
    #[serde(default)]
    category: ComponentCategory,
    type_id: Option<String>,
    #[serde(default)]
    description: String,
    #[serde(default)]
    default_properties: PropertyBag,
    #[serde(default)]
    required_packages: BTreeSet<String>,
    source_import_path: Option<String>,
    #[serde(default)]
    tags: BTreeSet<String>,
}

/// Discover every component below `dir`.
pub fn discover_catalog(dir: &Path, version: &str) -> Result<CatalogIndex, CatalogError> {
    if !dir.is_dir() {
        return Err(CatalogError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            format!("catalog directory {} does not exist", dir.display()),
        )));
    }

    let mut entries = Vec::new();
    let mut seen = HashSet::new();

    for metadata_path in find_metadata_files(dir) {
        match load_entry(dir, &metadata_path) {
            Ok(entry) => {
                if !seen.insert(entry.type_id.clone()) {
                    warn!(type_id = %entry.type_id, path = %metadata_path.display(), "duplicate catalog type, keeping first");
                    continue;
                }
                debug!(type_id = %entry.type_id, "discovered catalog component");
                entries.push(entry);
            }
            Err(reason) => {
                warn!(path = %metadata_path.display(), "skipping catalog entry: {}", reason);
            }
        }
    }

    CatalogIndex::new(version, entries)
}

/// Recursively find all metadata files, in a stable order
fn find_metadata_files(dir: &Path) -> Vec<PathBuf> {
    WalkDir::new(dir)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .map(|entry| entry.into_path())
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "json"))
        .collect()
}

fn find_template(metadata_path: &Path) -> Option<PathBuf> {
    TEMPLATE_EXTENSIONS
        .iter()
        .map(|ext| metadata_path.with_extension(ext))
        .find(|candidate| candidate.is_file())
}

fn load_entry(root: &Path, metadata_path: &Path) -> Result<CatalogEntry, String> {
    let text = fs::read_to_string(metadata_path).map_err(|e| format!("failed to read metadata: {}", e))?;
    let meta: ComponentMetadata =
        serde_json::from_str(&text).map_err(|e| format!("invalid metadata: {}", e))?;

    let stem = metadata_path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| "invalid file name".to_string())?;
    let type_id = to_canonical_type_id(meta.type_id.as_deref().unwrap_or(stem));
    if type_id.is_empty() {
        return Err("empty type id".to_string());
    }

    let template_path = find_template(metadata_path).ok_or_else(|| "no sibling template".to_string())?;
    let template =
        fs::read_to_string(&template_path).map_err(|e| format!("failed to read template: {}", e))?;

    // `components/content/Card` for `<root>/content/Card.json`
    let source_import_path = meta.source_import_path.unwrap_or_else(|| {
        let relative = metadata_path
            .parent()
            .and_then(|p| p.strip_prefix(root).ok())
            .map(|p| p.to_string_lossy().replace('\\', "/"))
            .unwrap_or_default();
        if relative.is_empty() {
            format!("components/{}", type_id)
        } else {
            format!("components/{}/{}", relative, type_id)
        }
    });

    Ok(CatalogEntry {
        id: meta.id.unwrap_or_else(|| to_hyphenated_type_id(&type_id)),
        display_name: meta.display_name.unwrap_or_else(|| type_id.clone()),
        category: meta.category,
        type_id,
        description: meta.description,
        default_properties: meta.default_properties,
        required_packages: meta.required_packages,
        source_import_path,
        tags: meta.tags,
        template,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(path: &Path, contents: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn test_discovers_nested_components() {
        let dir = tempfile::tempdir().unwrap();
        write(
            &dir.path().join("content/pricing-card.json"),
            r#"{"category": "pricing", "requiredPackages": ["clsx"]}"#,
        );
        write(
            &dir.path().join("content/pricing-card.jsx"),
            "export default function PricingCard() { return <div />; }",
        );

        let index = discover_catalog(dir.path(), "local").unwrap();
        let entry = index.resolve("pricing-card").unwrap();
        assert_eq!(entry.type_id, "PricingCard");
        assert_eq!(entry.source_import_path, "components/content/PricingCard");
        assert_eq!(entry.category, ComponentCategory::Pricing);
        assert!(entry.is_exportable());
        assert_eq!(index.version(), "local");
    }

    #[test]
    fn test_skips_unreadable_entries() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir.path().join("Broken.json"), "{ not json");
        write(&dir.path().join("Broken.jsx"), "export default () => null;");
        write(&dir.path().join("Orphan.json"), r#"{"category": "media"}"#);
        write(&dir.path().join("Footer.json"), r#"{"category": "footer"}"#);
        write(&dir.path().join("Footer.tsx"), "export default function Footer() { return <footer />; }");

        let index = discover_catalog(dir.path(), "local").unwrap();
        assert_eq!(index.len(), 1);
        assert!(index.contains("Footer"));
    }

    #[test]
    fn test_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let err = discover_catalog(&dir.path().join("nope"), "x").unwrap_err();
        assert!(matches!(err, CatalogError::Io(_)));
    }
}
