//! Compiler/registrar for generated components.
//!
//! Compilation is a pure two-phase pipeline (structural validation, then
//! lowering into the unit IR) and can run on any thread. Registration is a
//! per-session store keyed by canonical type id; there is no process-wide
//! cache.

use indexmap::IndexMap;
use oxc_allocator::Allocator;
use oxc_parser::Parser;
use oxc_span::SourceType;
use rayon::prelude::*;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::catalog::{to_canonical_type_id, CatalogEntry, CatalogIndex, ComponentCategory};
use crate::jsx_lowerer::UnitLowerer;
use crate::merge::GeneratedComponentDefinition;
use crate::parse::strip_code_fences;
use crate::scope::CapabilityScope;
use crate::unit::CompiledUnit;
use crate::validate::{syntax_error, validate_program, CompilerError, ERR_EMPTY, ERR_FACTORY_NAME};
use crate::PropertyBag;

pub fn compute_hash(source: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Validate and lower one generated definition.
///
/// Fenced-code markers around `source_text` are ignored. The returned unit
/// carries the hash of `source_text` exactly as given.
pub fn compile_unit(
    type_id: &str,
    source_text: &str,
    scope: &CapabilityScope,
) -> Result<CompiledUnit, CompilerError> {
    let canonical = to_canonical_type_id(type_id);
    if canonical.is_empty() {
        return Err(CompilerError::new(
            ERR_FACTORY_NAME,
            "Generated component has no type identifier.",
            1,
            1,
        ));
    }

    let code = strip_code_fences(source_text);
    if code.is_empty() {
        return Err(CompilerError::new(ERR_EMPTY, "Generated source is empty.", 1, 1));
    }

    let allocator = Allocator::default();
    let source_type = SourceType::default()
        .with_module(true)
        .with_jsx(true)
        .with_typescript(true);
    let ret = Parser::new(&allocator, code, source_type).parse();

    if let Some(diag) = ret.errors.first() {
        let offset = diag
            .labels
            .as_ref()
            .and_then(|labels| labels.first())
            .map(|label| label.offset());
        return Err(syntax_error(code, diag.to_string(), offset));
    }

    let validated = validate_program(&ret.program, code, type_id, scope)?;

    UnitLowerer::new(code, scope)
        .lower_program(
            &ret.program,
            &canonical,
            &validated.factory_name,
            validated.capabilities,
            compute_hash(source_text),
        )
        .ok_or_else(|| {
            CompilerError::new(
                ERR_FACTORY_NAME,
                &format!("`{}` could not be lowered to a component factory.", validated.factory_name),
                1,
                1,
            )
        })
}

/// A registered generated component.
#[derive(Debug, Clone)]
pub struct GeneratedEntry {
    pub type_id: String,
    pub category: ComponentCategory,
    pub default_properties: PropertyBag,
    /// Source text with fenced-code markers removed
    pub source_text: String,
    pub unit: Arc<CompiledUnit>,
}

/// What a type id resolves to once provenance precedence is applied.
#[derive(Debug, Clone, Copy)]
pub enum ResolvedComponent<'a> {
    Generated(&'a GeneratedEntry),
    Catalog(&'a CatalogEntry),
}

impl<'a> ResolvedComponent<'a> {
    pub fn type_id(&self) -> &'a str {
        match self {
            ResolvedComponent::Generated(e) => &e.type_id,
            ResolvedComponent::Catalog(e) => &e.type_id,
        }
    }

    pub fn category(&self) -> ComponentCategory {
        match self {
            ResolvedComponent::Generated(e) => e.category,
            ResolvedComponent::Catalog(e) => e.category,
        }
    }

    pub fn default_properties(&self) -> &'a PropertyBag {
        match self {
            ResolvedComponent::Generated(e) => &e.default_properties,
            ResolvedComponent::Catalog(e) => &e.default_properties,
        }
    }
}

/// Per-session store of compiled generated components.
#[derive(Debug, Clone, Default)]
pub struct ComponentRegistry {
    scope: CapabilityScope,
    entries: IndexMap<String, GeneratedEntry>,
}

impl ComponentRegistry {
    pub fn new(scope: CapabilityScope) -> Self {
        Self {
            scope,
            entries: IndexMap::new(),
        }
    }

    pub fn scope(&self) -> &CapabilityScope {
        &self.scope
    }

    pub fn is_known_generated(&self, type_id: &str) -> bool {
        self.entries.contains_key(&to_canonical_type_id(type_id))
    }

    pub fn get(&self, type_id: &str) -> Option<&GeneratedEntry> {
        self.entries.get(&to_canonical_type_id(type_id))
    }

    /// Generated definitions shadow catalog entries of the same type.
    pub fn resolve<'a>(&'a self, catalog: &'a CatalogIndex, type_id: &str) -> Option<ResolvedComponent<'a>> {
        if let Some(entry) = self.get(type_id) {
            return Some(ResolvedComponent::Generated(entry));
        }
        let entry = catalog.resolve(type_id)?;
        Some(
            self.get(&entry.type_id)
                .map(ResolvedComponent::Generated)
                .unwrap_or(ResolvedComponent::Catalog(entry)),
        )
    }

    pub fn get_source_text(&self, type_id: &str) -> Option<&str> {
        self.get(type_id).map(|e| e.source_text.as_str())
    }

    pub fn get_unit(&self, type_id: &str) -> Option<Arc<CompiledUnit>> {
        self.get(type_id).map(|e| Arc::clone(&e.unit))
    }

    /// Boolean contract of the registrar: failures are logged, never raised.
    pub fn compile_and_register(&mut self, definition: &GeneratedComponentDefinition) -> bool {
        self.try_compile_and_register(definition).is_ok()
    }

    /// Like `compile_and_register`, but hands the diagnostic back.
    ///
    /// Identical source text for an already registered type is a no-op that
    /// returns the existing unit. A failed recompilation keeps the old unit.
    pub fn try_compile_and_register(
        &mut self,
        definition: &GeneratedComponentDefinition,
    ) -> Result<Arc<CompiledUnit>, CompilerError> {
        if let Some(unit) = self.current_unit(definition) {
            debug!(type_id = %definition.type_id, "source unchanged, skipping recompile");
            return Ok(unit);
        }
        let result = compile_unit(&definition.type_id, &definition.source_text, &self.scope);
        self.settle(definition, result)
    }

    /// Compile a batch in parallel, then register sequentially in input order.
    pub fn register_batch(
        &mut self,
        definitions: &[GeneratedComponentDefinition],
    ) -> Vec<Result<Arc<CompiledUnit>, CompilerError>> {
        let scope = &self.scope;
        let existing = &self.entries;
        let compiled: Vec<Option<Result<CompiledUnit, CompilerError>>> = definitions
            .par_iter()
            .map(|def| {
                let unchanged = existing
                    .get(&to_canonical_type_id(&def.type_id))
                    .is_some_and(|e| e.unit.source_hash == compute_hash(&def.source_text));
                if unchanged {
                    None
                } else {
                    Some(compile_unit(&def.type_id, &def.source_text, scope))
                }
            })
            .collect();

        definitions
            .iter()
            .zip(compiled)
            .map(|(def, result)| match result {
                Some(result) => self.settle(def, result),
                None => self.current_unit(def).ok_or_else(|| {
                    CompilerError::new(ERR_EMPTY, "Registered unit disappeared during batch.", 1, 1)
                }),
            })
            .collect()
    }

    fn current_unit(&self, definition: &GeneratedComponentDefinition) -> Option<Arc<CompiledUnit>> {
        self.get(&definition.type_id)
            .filter(|e| e.unit.source_hash == compute_hash(&definition.source_text))
            .map(|e| Arc::clone(&e.unit))
    }

    fn settle(
        &mut self,
        definition: &GeneratedComponentDefinition,
        result: Result<CompiledUnit, CompilerError>,
    ) -> Result<Arc<CompiledUnit>, CompilerError> {
        match result {
            Ok(unit) => {
                let tags = unit.collect_tags();
                debug!(
                    type_id = %unit.type_id,
                    capabilities = ?unit.capabilities,
                    helpers = unit.helpers.len(),
                    locals = ?tags.locals,
                    "registered generated component"
                );
                let unit = Arc::new(unit);
                let key = unit.type_id.clone();
                self.entries.insert(
                    key.clone(),
                    GeneratedEntry {
                        type_id: key,
                        category: definition.category,
                        default_properties: definition.default_properties.clone(),
                        source_text: strip_code_fences(&definition.source_text).to_string(),
                        unit: Arc::clone(&unit),
                    },
                );
                Ok(unit)
            }
            Err(e) => {
                warn!(
                    type_id = %definition.type_id,
                    code = %e.code,
                    line = e.line,
                    column = e.column,
                    "rejected generated component: {}",
                    e.message
                );
                Err(e)
            }
        }
    }

    pub fn type_ids(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
