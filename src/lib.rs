//! # Builder Core
//!
//! Turns untrusted, generated UI component source into live units, keeps the
//! canvas document of placed instances, and synthesizes a buildable project
//! from it.
//!
//! ## Pipeline Invariants
//!
//! 1. **Two-Phase Compilation**: generated source is structurally validated
//!    (`validate`) before it is lowered into the unit IR (`jsx_lowerer`).
//!    Nothing is evaluated from text at runtime.
//!
//! 2. **Explicit Capabilities**: a unit resolves free names only through its
//!    `CapabilityScope` (injected atoms, host hooks, safe globals). An
//!    unresolved name is a compile error (B-ERR-CAPABILITY).
//!
//! 3. **Session Ownership**: the compiled-unit registry and the document model
//!    belong to one `Session`. There are no process-wide mutable singletons;
//!    only the immutable catalog is shared.
//!
//! 4. **Provenance Precedence**: a generated definition shadows a catalog
//!    entry with the same canonical type id, at ingestion, render and export.
//!
//! 5. **Round-Trippable Export**: every exported property is emitted through
//!    `serialize_prop_value`, whose output `parse_prop_value` reads back to an
//!    equal value. Values outside the domain fail with `SerializationError`.

/// Ordered key → value map of an instance's properties.
pub type PropertyBag = serde_json::Map<String, serde_json::Value>;

pub mod catalog;
pub mod codegen;
pub mod config;
pub mod discovery;
pub mod document;
pub mod error;
pub mod finalize;
pub mod jsx_lowerer;
pub mod merge;
pub mod parse;
pub mod registry;
pub mod scaffold;
pub mod scope;
pub mod session;
mod static_eval;
pub mod unit;
pub mod validate;
pub mod visitor;

#[cfg(feature = "napi")]
pub mod bindings;

#[cfg(test)]
mod codegen_tests;
#[cfg(test)]
mod session_tests;

pub use catalog::{to_canonical_type_id, to_hyphenated_type_id, CatalogEntry, CatalogIndex, ComponentCategory};
pub use codegen::{attribute_value, emit_instance_markup, parse_prop_value, serialize_prop_value};
pub use config::BuilderConfig;
pub use discovery::discover_catalog;
pub use document::{ComponentInstance, DocumentModel, InstanceId, PlacedInstance, Position};
pub use error::{
    CatalogError, ConfigError, DocumentError, PayloadError, RenderError, SerializationError,
    SynthesisError, ValueParseError,
};
pub use finalize::{compute_required_packages, synthesize_project, SkippedInstance, SynthesizedProject};
pub use merge::{merge_picks, CatalogPick, GeneratedComponentDefinition, MergedPick, Provenance};
pub use parse::{parse_batch_payload, strip_code_fences, BatchPayload};
pub use registry::{compile_unit, ComponentRegistry, GeneratedEntry, ResolvedComponent};
pub use scope::CapabilityScope;
pub use session::{IngestReport, IngestWarning, Session};
pub use static_eval::{Limits, DEPTH_LIMIT, STEP_BUDGET};
pub use unit::{CompiledUnit, Evaluated, RenderNode, TagKind};
pub use validate::CompilerError;
