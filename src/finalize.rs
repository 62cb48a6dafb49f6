//! Project synthesis.
//!
//! Walks the document model in order and produces a standalone Vite + React
//! project: one entry point, one module per distinct referenced type, a
//! manifest and the fixed scaffold.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use tracing::{info, warn};

use crate::catalog::{CatalogEntry, CatalogIndex};
use crate::codegen::emit_markup;
use crate::config::{BuilderConfig, PackageConfig};
use crate::document::{ComponentInstance, DocumentModel, InstanceId};
use crate::error::SynthesisError;
use crate::registry::{ComponentRegistry, GeneratedEntry, ResolvedComponent};
use crate::scaffold::scaffold_files;
use crate::scope::{CapabilityScope, ImportStyle};

lazy_static! {
    static ref NPM_PACKAGE_NAME: Regex =
        Regex::new(r"^(@[a-z0-9][a-z0-9._~-]*/)?[a-z0-9][a-z0-9._~-]*$").unwrap();
}

pub const ENTRY_POINT: &str = "src/App.jsx";
pub const MANIFEST: &str = "package.json";

/// An instance left out of the export.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedInstance {
    pub id: InstanceId,
    pub type_id: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SynthesizedProject {
    /// Relative path → contents
    pub files: BTreeMap<String, String>,
    pub dependencies: BTreeMap<String, String>,
    pub dev_dependencies: BTreeMap<String, String>,
    pub skipped: Vec<SkippedInstance>,
}

impl SynthesizedProject {
    pub fn file(&self, path: &str) -> Option<&str> {
        self.files.get(path).map(String::as_str)
    }

    /// Write every file below `root`, creating directories as needed.
    pub fn write_to(&self, root: &Path) -> std::io::Result<()> {
        for (path, contents) in &self.files {
            let target = root.join(path);
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(target, contents)?;
        }
        Ok(())
    }
}

pub fn is_valid_package_name(name: &str) -> bool {
    name.len() <= 214 && NPM_PACKAGE_NAME.is_match(name)
}

/// Union of the catalog packages of every distinct referenced type.
///
/// Generated types need nothing beyond the baseline. Denylisted and
/// syntactically invalid names are dropped.
pub fn compute_required_packages<'i>(
    instances: impl IntoIterator<Item = &'i ComponentInstance>,
    catalog: &CatalogIndex,
    registry: &ComponentRegistry,
    packages: &PackageConfig,
) -> BTreeSet<String> {
    let type_ids: BTreeSet<&str> = instances.into_iter().map(|i| i.type_id.as_str()).collect();

    type_ids
        .into_iter()
        .filter_map(|type_id| match registry.resolve(catalog, type_id) {
            Some(ResolvedComponent::Catalog(entry)) => Some(entry),
            _ => None,
        })
        .flat_map(|entry| entry.required_packages.iter())
        .filter(|name| {
            let keep = !packages.is_denied(name) && is_valid_package_name(name);
            if !keep {
                warn!(package = %name, "dropping package from manifest");
            }
            keep
        })
        .cloned()
        .collect()
}

/// A type referenced by the document, with the module that backs it.
struct ComponentModule {
    type_id: String,
    /// Project-relative file path
    path: String,
    contents: String,
}

fn catalog_module(entry: &CatalogEntry) -> ComponentModule {
    ComponentModule {
        type_id: entry.type_id.clone(),
        path: format!("src/{}.jsx", entry.source_import_path.trim_matches('/')),
        contents: entry.template.clone(),
    }
}

/// Import lines for the capabilities a generated unit uses, grouped by module.
fn capability_imports(entry: &GeneratedEntry, scope: &CapabilityScope) -> String {
    let mut by_module: BTreeMap<&str, (Option<&str>, Vec<&str>)> = BTreeMap::new();
    for name in &entry.unit.capabilities {
        let Some(cap) = scope.get(name) else { continue };
        let slot = by_module.entry(cap.module.as_str()).or_default();
        match cap.style {
            ImportStyle::Default => slot.0 = Some(cap.name.as_str()),
            ImportStyle::Named => slot.1.push(cap.name.as_str()),
        }
    }

    let mut out = String::new();
    for (module, (default, named)) in by_module {
        let clause = match (default, named.is_empty()) {
            (Some(d), true) => d.to_string(),
            (Some(d), false) => format!("{}, {{ {} }}", d, named.join(", ")),
            (None, _) => format!("{{ {} }}", named.join(", ")),
        };
        out.push_str(&format!("import {} from '{}';\n", clause, module));
    }
    out
}

fn generated_module(entry: &GeneratedEntry, scope: &CapabilityScope, generated_dir: &str) -> ComponentModule {
    let imports = capability_imports(entry, scope);
    let mut contents = String::new();
    if !imports.is_empty() {
        contents.push_str(&imports);
        contents.push('\n');
    }
    contents.push_str(entry.source_text.trim_end());
    contents.push_str(&format!("\n\nexport default {};\n", entry.unit.factory_name));

    ComponentModule {
        type_id: entry.type_id.clone(),
        path: format!("{}/{}.jsx", generated_dir.trim_end_matches('/'), entry.type_id),
        contents,
    }
}

/// `src/components/content/Card.jsx` → `./components/content/Card`
fn entry_relative_import(path: &str) -> String {
    let stem = path.strip_suffix(".jsx").unwrap_or(path);
    format!("./{}", stem.strip_prefix("src/").unwrap_or(stem))
}

fn entry_point(modules: &[ComponentModule], markup: &[String]) -> String {
    let mut out = String::new();
    for module in modules {
        out.push_str(&format!(
            "import {} from '{}';\n",
            module.type_id,
            entry_relative_import(&module.path)
        ));
    }
    if !modules.is_empty() {
        out.push('\n');
    }
    let mut name = "App".to_string();
    // A placed type may itself be called `App`.
    while modules.iter().any(|m| m.type_id == name) {
        name.push_str("Root");
    }
    out.push_str(&format!(
        "export default function {}() {{\n  return (\n    <main className=\"min-h-screen\">\n",
        name
    ));
    for line in markup {
        out.push_str("      ");
        out.push_str(line);
        out.push('\n');
    }
    out.push_str("    </main>\n  );\n}\n");
    out
}

fn manifest(config: &BuilderConfig, dependencies: &BTreeMap<String, String>) -> Result<String, SynthesisError> {
    let manifest = json!({
        "name": config.project.name,
        "private": true,
        "version": config.project.version,
        "type": "module",
        "scripts": {
            "dev": "vite",
            "build": "vite build",
            "preview": "vite preview"
        },
        "dependencies": dependencies,
        "devDependencies": config.packages.dev_baseline,
    });
    let mut text = serde_json::to_string_pretty(&manifest)?;
    text.push('\n');
    Ok(text)
}

/// Build the full file set for the current document.
///
/// Instances whose type no longer resolves, or whose catalog entry has no
/// template, are skipped and reported; a property that cannot be serialized
/// aborts the export.
pub fn synthesize_project(
    document: &DocumentModel,
    catalog: &CatalogIndex,
    registry: &ComponentRegistry,
    config: &BuilderConfig,
) -> Result<SynthesizedProject, SynthesisError> {
    let mut project = SynthesizedProject::default();
    let mut modules: Vec<ComponentModule> = Vec::new();
    let mut markup = Vec::new();
    let mut exported = Vec::new();

    for (id, instance) in document.list_instances() {
        let resolved = registry.resolve(catalog, &instance.type_id);
        let reason = match resolved {
            None => Some("type is neither in the catalog nor registered as generated"),
            Some(ResolvedComponent::Catalog(entry)) if !entry.is_exportable() => {
                Some("catalog entry has no template")
            }
            _ => None,
        };
        let Some(resolved) = resolved.filter(|_| reason.is_none()) else {
            let reason = reason.unwrap_or_default();
            warn!(instance = %id, type_id = %instance.type_id, "skipping instance on export: {}", reason);
            project.skipped.push(SkippedInstance {
                id,
                type_id: instance.type_id.clone(),
                reason: reason.to_string(),
            });
            continue;
        };

        let line = emit_markup(resolved.type_id(), &instance.properties).map_err(|source| SynthesisError::Serialization {
            instance: id,
            type_id: instance.type_id.clone(),
            source,
        })?;
        markup.push(line);
        exported.push(instance);

        if modules.iter().any(|m| m.type_id == resolved.type_id()) {
            continue;
        }
        modules.push(match resolved {
            ResolvedComponent::Catalog(entry) => catalog_module(entry),
            ResolvedComponent::Generated(entry) => {
                generated_module(entry, registry.scope(), &config.project.generated_dir)
            }
        });
    }

    let required = compute_required_packages(exported, catalog, registry, &config.packages);
    project.dependencies = config.packages.baseline.clone();
    for name in required {
        let version = config.packages.version_for(&name).to_string();
        project.dependencies.entry(name).or_insert(version);
    }
    project.dev_dependencies = config.packages.dev_baseline.clone();

    for (path, contents) in scaffold_files(config) {
        project.files.insert(path, contents);
    }
    project
        .files
        .insert(MANIFEST.to_string(), manifest(config, &project.dependencies)?);
    project
        .files
        .insert(ENTRY_POINT.to_string(), entry_point(&modules, &markup));
    for module in modules {
        project.files.insert(module.path, module.contents);
    }

    info!(
        files = project.files.len(),
        dependencies = project.dependencies.len(),
        skipped = project.skipped.len(),
        "synthesized project"
    );
    Ok(project)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_package_name_syntax() {
        assert!(is_valid_package_name("lucide-react"));
        assert!(is_valid_package_name("@vitejs/plugin-react"));
        assert!(!is_valid_package_name("@/lib/utils"));
        assert!(!is_valid_package_name("Bad Name"));
        assert!(!is_valid_package_name(""));
    }

    #[test]
    fn test_entry_relative_import() {
        assert_eq!(
            entry_relative_import("src/components/content/Card.jsx"),
            "./components/content/Card"
        );
        assert_eq!(
            entry_relative_import("src/components/generated/Promo.jsx"),
            "./components/generated/Promo"
        );
    }

    #[test]
    fn test_empty_document_still_scaffolds() {
        let project = synthesize_project(
            &DocumentModel::new(),
            &CatalogIndex::builtin(),
            &ComponentRegistry::default(),
            &BuilderConfig::default(),
        )
        .unwrap();
        assert!(project.file(MANIFEST).is_some());
        assert!(project.file(ENTRY_POINT).unwrap().contains("<main"));
        assert!(project.dependencies.contains_key("react"));
    }
}
