//! # Editing Session
//!
//! One session owns everything mutable about an edit: the compiled-unit
//! registry and the document model. The catalog is shared read-only.
//!
//! ## Key Invariants
//!
//! 1. **No Shared State**: two sessions never observe each other's units or
//!    instances
//! 2. **Generated Wins**: within a batch, a generated definition replaces a
//!    catalog pick of the same type before anything is placed
//! 3. **No Dangling Instances**: an instance is only placed for a type that
//!    resolves at placement time; rejected generated source places nothing
//! 4. **Synchronous Ingestion**: `ingest_batch` runs to completion without
//!    yielding; parallel compilation joins before it returns

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::catalog::{CatalogIndex, ComponentCategory};
use crate::config::BuilderConfig;
use crate::document::{ComponentInstance, DocumentModel, InstanceId, PlacedInstance, Position};
use crate::error::{DocumentError, PayloadError, RenderError, SynthesisError};
use crate::finalize::{compute_required_packages, synthesize_project, SynthesizedProject};
use crate::merge::{merge_picks, CatalogPick, GeneratedComponentDefinition, MergedPick};
use crate::parse::parse_batch_payload;
use crate::registry::{ComponentRegistry, ResolvedComponent};
use crate::scope::CapabilityScope;
use crate::unit::{Evaluated, RenderNode, TagKind};
use crate::validate::CompilerError;
use crate::PropertyBag;

/// A non-fatal problem found while ingesting a batch.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum IngestWarning {
    /// Generated source failed validation; no instance was placed
    #[serde(rename_all = "camelCase")]
    RejectedSource { type_id: String, error: CompilerError },
    /// A catalog pick named a type nobody knows
    #[serde(rename_all = "camelCase")]
    UnknownType { type_id: String },
}

impl IngestWarning {
    pub fn type_id(&self) -> &str {
        match self {
            IngestWarning::RejectedSource { type_id, .. } | IngestWarning::UnknownType { type_id } => {
                type_id
            }
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestReport {
    /// Instances appended to the document, in order
    pub placed: Vec<InstanceId>,
    /// Generated types compiled (or confirmed unchanged) by this batch
    pub registered: Vec<String>,
    pub warnings: Vec<IngestWarning>,
}

/// Overrides win over defaults; a `null` override removes the default.
fn overlay(defaults: &PropertyBag, overrides: PropertyBag) -> PropertyBag {
    let mut props = defaults.clone();
    for (key, value) in overrides {
        if value.is_null() {
            props.remove(&key);
        } else {
            props.insert(key, value);
        }
    }
    props
}

pub struct Session {
    config: BuilderConfig,
    catalog: Arc<CatalogIndex>,
    registry: ComponentRegistry,
    document: DocumentModel,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(CatalogIndex::builtin(), BuilderConfig::default())
    }
}

impl Session {
    pub fn new(catalog: Arc<CatalogIndex>, config: BuilderConfig) -> Self {
        let scope = CapabilityScope::from_config(&config.capabilities);
        Self {
            config,
            catalog,
            registry: ComponentRegistry::new(scope),
            document: DocumentModel::new(),
        }
    }

    pub fn config(&self) -> &BuilderConfig {
        &self.config
    }

    pub fn catalog(&self) -> &CatalogIndex {
        &self.catalog
    }

    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    pub fn document(&self) -> &DocumentModel {
        &self.document
    }

    fn origin(&self) -> Position {
        Position::new(self.config.layout.origin_x, self.config.layout.origin_y)
    }

    fn next_position(&self) -> Position {
        self.document
            .next_default_position(self.origin(), self.config.layout.row_spacing)
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Ingestion
    // ───────────────────────────────────────────────────────────────────────────

    /// Merge one batch from the generative service into the session.
    pub fn ingest_batch(
        &mut self,
        catalog_picks: Vec<CatalogPick>,
        generated_picks: Vec<GeneratedComponentDefinition>,
    ) -> IngestReport {
        let merged = merge_picks(&self.catalog, catalog_picks, generated_picks);

        let generated: Vec<GeneratedComponentDefinition> = merged
            .values()
            .filter_map(|pick| match pick {
                MergedPick::Generated(def) => Some(def.clone()),
                MergedPick::Catalog(_) => None,
            })
            .collect();
        let mut outcomes = self.registry.register_batch(&generated).into_iter();

        let mut report = IngestReport::default();
        for (key, pick) in merged {
            match pick {
                MergedPick::Generated(def) => match outcomes.next() {
                    Some(Ok(unit)) => {
                        let position = self.next_position();
                        let id = self.document.add_instance(
                            unit.type_id.clone(),
                            def.category,
                            def.default_properties,
                            position,
                        );
                        report.registered.push(unit.type_id.clone());
                        report.placed.push(id);
                    }
                    Some(Err(error)) => report.warnings.push(IngestWarning::RejectedSource {
                        type_id: def.type_id,
                        error,
                    }),
                    None => {}
                },
                MergedPick::Catalog(pick) => {
                    let Some(resolved) = self.registry.resolve(&self.catalog, &pick.type_id) else {
                        warn!(type_id = %pick.type_id, "catalog pick names an unknown type");
                        report.warnings.push(IngestWarning::UnknownType { type_id: key });
                        continue;
                    };
                    let type_id = resolved.type_id().to_string();
                    let category = pick.category.unwrap_or_else(|| resolved.category());
                    let properties = overlay(resolved.default_properties(), pick.props);
                    let position = self.next_position();
                    let id = self.document.add_instance(type_id, category, properties, position);
                    report.placed.push(id);
                }
            }
        }

        info!(
            placed = report.placed.len(),
            registered = report.registered.len(),
            warnings = report.warnings.len(),
            "ingested batch"
        );
        report
    }

    /// Parse a raw service response and ingest it.
    pub fn ingest_payload(&mut self, raw: &str) -> Result<IngestReport, PayloadError> {
        let payload = parse_batch_payload(raw)?;
        Ok(self.ingest_batch(payload.components, payload.generated_components))
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Registrar
    // ───────────────────────────────────────────────────────────────────────────

    pub fn compile_and_register(&mut self, definition: &GeneratedComponentDefinition) -> bool {
        self.registry.compile_and_register(definition)
    }

    pub fn is_known_generated(&self, type_id: &str) -> bool {
        self.registry.is_known_generated(type_id)
    }

    pub fn get_source_text(&self, type_id: &str) -> Option<&str> {
        self.registry.get_source_text(type_id)
    }

    pub fn resolve(&self, type_id: &str) -> Option<ResolvedComponent<'_>> {
        self.registry.resolve(&self.catalog, type_id)
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Document
    // ───────────────────────────────────────────────────────────────────────────

    /// Place a component the session can resolve; `position` defaults to the next stack slot.
    pub fn place_component(
        &mut self,
        type_id: &str,
        properties: Option<PropertyBag>,
        position: Option<Position>,
    ) -> Result<InstanceId, DocumentError> {
        let resolved = self
            .resolve(type_id)
            .ok_or_else(|| DocumentError::UnresolvedType(type_id.to_string()))?;
        let canonical = resolved.type_id().to_string();
        let category = resolved.category();
        let properties = match properties {
            Some(props) => overlay(resolved.default_properties(), props),
            None => resolved.default_properties().clone(),
        };
        let position = position.unwrap_or_else(|| self.next_position());
        Ok(self.add_instance(&canonical, category, properties, position))
    }

    pub fn add_instance(
        &mut self,
        type_id: &str,
        category: ComponentCategory,
        properties: PropertyBag,
        position: Position,
    ) -> InstanceId {
        let id = self.document.add_instance(type_id, category, properties, position);
        debug!(instance = %id, type_id, "placed instance");
        id
    }

    pub fn update_properties(&mut self, id: InstanceId, patch: PropertyBag) -> Result<(), DocumentError> {
        self.document.update_properties(id, patch)
    }

    pub fn remove_instance(&mut self, id: InstanceId) -> Result<ComponentInstance, DocumentError> {
        self.document.remove_instance(id)
    }

    pub fn move_instance(&mut self, id: InstanceId, position: Position) -> Result<(), DocumentError> {
        self.document.move_instance(id, position)
    }

    pub fn list_instances(&self) -> Vec<PlacedInstance> {
        self.document.snapshot()
    }

    // ───────────────────────────────────────────────────────────────────────────
    // Render & export
    // ───────────────────────────────────────────────────────────────────────────

    /// Renderable output of one instance.
    ///
    /// Generated instances run their compiled unit; catalog instances render
    /// as a single placeholder element named by type.
    pub fn render_instance(&self, id: InstanceId) -> Result<Vec<RenderNode>, RenderError> {
        let instance = self.document.get(id).ok_or(RenderError::UnknownInstance(id))?;
        match self.resolve(&instance.type_id) {
            Some(ResolvedComponent::Generated(entry)) => entry.unit.instantiate(&instance.properties),
            Some(ResolvedComponent::Catalog(entry)) => Ok(vec![RenderNode::Element {
                tag: entry.type_id.clone(),
                kind: TagKind::Catalog,
                props: instance
                    .properties
                    .iter()
                    .map(|(k, v)| (k.clone(), Evaluated::from(v)))
                    .collect(),
                children: Vec::new(),
            }]),
            None => Err(RenderError::NotCompiled(instance.type_id.clone())),
        }
    }

    pub fn required_packages(&self) -> std::collections::BTreeSet<String> {
        compute_required_packages(
            self.document.list_instances().map(|(_, instance)| instance),
            &self.catalog,
            &self.registry,
            &self.config.packages,
        )
    }

    pub fn synthesize_project(&self) -> Result<SynthesizedProject, SynthesisError> {
        synthesize_project(&self.document, &self.catalog, &self.registry, &self.config)
    }
}
