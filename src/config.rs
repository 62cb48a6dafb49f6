//! Configuration for the builder core
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (builder.toml)
//! - Environment variables (BUILDER__*)
//!
//! ## Example config file (builder.toml):
//! ```toml
//! [project]
//! name = "landing-page"
//! version = "0.1.0"
//!
//! [packages]
//! default_version = "latest"
//! denylist = ["@/lib/utils"]
//!
//! [packages.versions]
//! "lucide-react" = "^0.460.0"
//!
//! [layout]
//! origin_x = 40.0
//! origin_y = 40.0
//! row_spacing = 160.0
//!
//! [capabilities]
//! atoms_module = "../ui/primitives"
//! atoms = ["Box", "Stack", "Text", "Button"]
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Main configuration for a builder session
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BuilderConfig {
    /// Exported project settings
    #[serde(default)]
    pub project: ProjectConfig,

    /// Manifest dependency settings
    #[serde(default)]
    pub packages: PackageConfig,

    /// Default canvas placement
    #[serde(default)]
    pub layout: LayoutConfig,

    /// Names injected into generated components
    #[serde(default)]
    pub capabilities: CapabilityConfig,
}

/// Exported project configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Package name written to the manifest
    #[serde(default = "default_project_name")]
    pub name: String,

    /// Package version written to the manifest
    #[serde(default = "default_project_version")]
    pub version: String,

    /// Directory (relative to the project root) for generated component files
    #[serde(default = "default_generated_dir")]
    pub generated_dir: String,
}

/// Dependency configuration for the exported manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackageConfig {
    /// Dependencies every exported project carries
    #[serde(default = "default_baseline")]
    pub baseline: BTreeMap<String, String>,

    /// Dev dependencies every exported project carries
    #[serde(default = "default_dev_baseline")]
    pub dev_baseline: BTreeMap<String, String>,

    /// Version ranges for packages required by catalog components
    #[serde(default = "default_versions")]
    pub versions: BTreeMap<String, String>,

    /// Version used for a required package missing from `versions`
    #[serde(default = "default_package_version")]
    pub default_version: String,

    /// Package names that are never written to the manifest
    #[serde(default = "default_denylist")]
    pub denylist: Vec<String>,
}

/// Default placement of ingested instances
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    #[serde(default = "default_origin")]
    pub origin_x: f64,

    #[serde(default = "default_origin")]
    pub origin_y: f64,

    /// Vertical distance between consecutively placed instances
    #[serde(default = "default_row_spacing")]
    pub row_spacing: f64,
}

/// Capability surface for generated components
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilityConfig {
    /// Module the atoms are imported from, relative to the generated directory
    #[serde(default = "default_atoms_module")]
    pub atoms_module: String,

    /// Primitive UI atoms
    #[serde(default = "default_atoms")]
    pub atoms: Vec<String>,

    /// Host hooks imported by name from the host module
    #[serde(default = "default_hooks")]
    pub hooks: Vec<String>,

    /// Module providing the host namespace and hooks
    #[serde(default = "default_host_module")]
    pub host_module: String,
}

// Default value functions

fn default_project_name() -> String {
    "builder-app".to_string()
}

fn default_project_version() -> String {
    "0.1.0".to_string()
}

fn default_generated_dir() -> String {
    "src/components/generated".to_string()
}

fn default_baseline() -> BTreeMap<String, String> {
    [("react", "^18.3.1"), ("react-dom", "^18.3.1")]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn default_dev_baseline() -> BTreeMap<String, String> {
    [
        ("@vitejs/plugin-react", "^4.3.4"),
        ("autoprefixer", "^10.4.20"),
        ("postcss", "^8.4.49"),
        ("tailwindcss", "^3.4.15"),
        ("vite", "^5.4.11"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

fn default_versions() -> BTreeMap<String, String> {
    [
        ("clsx", "^2.1.1"),
        ("framer-motion", "^11.11.17"),
        ("lucide-react", "^0.460.0"),
        ("react-hook-form", "^7.53.2"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

fn default_package_version() -> String {
    "latest".to_string()
}

fn default_denylist() -> Vec<String> {
    vec![
        "@/components/ui".to_string(),
        "@/lib/utils".to_string(),
        "@shadcn/ui".to_string(),
        "shadcn-ui".to_string(),
    ]
}

fn default_origin() -> f64 {
    40.0
}

fn default_row_spacing() -> f64 {
    160.0
}

fn default_atoms_module() -> String {
    "../ui/primitives".to_string()
}

fn default_atoms() -> Vec<String> {
    [
        "Box", "Stack", "Text", "Heading", "Button", "Image", "Link", "Icon", "Badge", "Input",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_hooks() -> Vec<String> {
    [
        "useState",
        "useEffect",
        "useMemo",
        "useRef",
        "useCallback",
        "Fragment",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_host_module() -> String {
    "react".to_string()
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            name: default_project_name(),
            version: default_project_version(),
            generated_dir: default_generated_dir(),
        }
    }
}

impl Default for PackageConfig {
    fn default() -> Self {
        Self {
            baseline: default_baseline(),
            dev_baseline: default_dev_baseline(),
            versions: default_versions(),
            default_version: default_package_version(),
            denylist: default_denylist(),
        }
    }
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            origin_x: default_origin(),
            origin_y: default_origin(),
            row_spacing: default_row_spacing(),
        }
    }
}

impl Default for CapabilityConfig {
    fn default() -> Self {
        Self {
            atoms_module: default_atoms_module(),
            atoms: default_atoms(),
            hooks: default_hooks(),
            host_module: default_host_module(),
        }
    }
}

impl PackageConfig {
    /// Version range for a required package.
    pub fn version_for(&self, package: &str) -> &str {
        self.versions
            .get(package)
            .map(String::as_str)
            .unwrap_or(&self.default_version)
    }

    pub fn is_denied(&self, package: &str) -> bool {
        self.denylist.iter().any(|d| d == package)
    }
}

impl BuilderConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Load configuration, layering an explicit file over the default locations
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        for location in ["builder.toml", ".builder.toml", "config/builder.toml"] {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix("BUILDER")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = BuilderConfig::default();
        assert_eq!(config.project.generated_dir, "src/components/generated");
        assert!(config.packages.baseline.contains_key("react"));
        assert!(config.packages.is_denied("@/lib/utils"));
        assert!(config.capabilities.atoms.contains(&"Button".to_string()));
    }

    #[test]
    fn test_version_lookup_falls_back() {
        let packages = PackageConfig::default();
        assert_eq!(packages.version_for("lucide-react"), "^0.460.0");
        assert_eq!(packages.version_for("left-pad"), "latest");
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config: BuilderConfig = toml::from_str(
            r#"
            [project]
            name = "landing"

            [layout]
            row_spacing = 200.0
            "#,
        )
        .unwrap();
        assert_eq!(config.project.name, "landing");
        assert_eq!(config.project.version, "0.1.0");
        assert_eq!(config.layout.row_spacing, 200.0);
        assert_eq!(config.layout.origin_x, 40.0);
    }

    #[test]
    fn test_serialize_config() {
        let config = BuilderConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[project]"));
        assert!(toml_str.contains("[capabilities]"));

        let back: BuilderConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(back.packages.denylist, config.packages.denylist);
    }

    #[test]
    fn test_load_from_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "[project]\nname = \"from-file\"\n").unwrap();

        let config = BuilderConfig::load_from(Some(&path)).unwrap();
        assert_eq!(config.project.name, "from-file");
    }
}
