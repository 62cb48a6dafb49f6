//! N-API surface for JavaScript hosts.
//!
//! Values cross the boundary as JSON; errors become JS exceptions carrying
//! the Rust error's display text.

use napi::bindgen_prelude::*;
use napi_derive::napi;
use serde_json::Value;
use std::path::Path;

use crate::catalog::CatalogIndex;
use crate::config::BuilderConfig;
use crate::document::{InstanceId, Position};
use crate::merge::{CatalogPick, GeneratedComponentDefinition};
use crate::session::Session;
use crate::PropertyBag;

fn to_napi<E: std::fmt::Display>(e: E) -> Error {
    Error::new(Status::GenericFailure, e.to_string())
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value).map_err(to_napi)
}

fn from_json<T: serde::de::DeserializeOwned>(value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| Error::new(Status::InvalidArg, e.to_string()))
}

fn parse_id(id: &str) -> Result<InstanceId> {
    id.parse().map_err(|e: crate::error::DocumentError| Error::new(Status::InvalidArg, e.to_string()))
}

/// Install a `tracing` subscriber filtered by `RUST_LOG`. Safe to call twice.
#[napi]
pub fn init_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();
}

#[napi]
pub struct BuilderSession {
    inner: Session,
}

#[napi]
impl BuilderSession {
    /// `configPath` layers a TOML file over the defaults; `catalogDir` replaces
    /// the embedded catalog with a discovered one.
    #[napi(constructor)]
    pub fn new(config_path: Option<String>, catalog_dir: Option<String>) -> Result<Self> {
        let config = BuilderConfig::load_from(config_path.as_deref().map(Path::new)).map_err(to_napi)?;
        let catalog = match catalog_dir {
            Some(dir) => std::sync::Arc::new(
                crate::discovery::discover_catalog(Path::new(&dir), "local").map_err(to_napi)?,
            ),
            None => CatalogIndex::builtin(),
        };
        Ok(Self {
            inner: Session::new(catalog, config),
        })
    }

    #[napi]
    pub fn ingest_batch(&mut self, components: Value, generated_components: Value) -> Result<Value> {
        let picks: Vec<CatalogPick> = from_json(components)?;
        let generated: Vec<GeneratedComponentDefinition> = from_json(generated_components)?;
        to_json(&self.inner.ingest_batch(picks, generated))
    }

    #[napi]
    pub fn ingest_payload(&mut self, raw: String) -> Result<Value> {
        let report = self.inner.ingest_payload(&raw).map_err(to_napi)?;
        to_json(&report)
    }

    #[napi]
    pub fn is_known_generated(&self, type_id: String) -> bool {
        self.inner.is_known_generated(&type_id)
    }

    #[napi]
    pub fn get_source_text(&self, type_id: String) -> Option<String> {
        self.inner.get_source_text(&type_id).map(str::to_string)
    }

    #[napi]
    pub fn list_instances(&self) -> Result<Value> {
        to_json(&self.inner.list_instances())
    }

    #[napi]
    pub fn place_component(&mut self, type_id: String, properties: Option<Value>, x: Option<f64>, y: Option<f64>) -> Result<String> {
        let properties: Option<PropertyBag> = properties.map(from_json).transpose()?;
        let position = match (x, y) {
            (Some(x), Some(y)) => Some(Position::new(x, y)),
            _ => None,
        };
        let id = self
            .inner
            .place_component(&type_id, properties, position)
            .map_err(to_napi)?;
        Ok(id.to_string())
    }

    #[napi]
    pub fn update_properties(&mut self, id: String, patch: Value) -> Result<()> {
        let patch: PropertyBag = from_json(patch)?;
        self.inner.update_properties(parse_id(&id)?, patch).map_err(to_napi)
    }

    #[napi]
    pub fn remove_instance(&mut self, id: String) -> Result<()> {
        self.inner.remove_instance(parse_id(&id)?).map(|_| ()).map_err(to_napi)
    }

    #[napi]
    pub fn move_instance(&mut self, id: String, x: f64, y: f64) -> Result<()> {
        self.inner
            .move_instance(parse_id(&id)?, Position::new(x, y))
            .map_err(to_napi)
    }

    #[napi]
    pub fn render_instance(&self, id: String) -> Result<Value> {
        let nodes = self.inner.render_instance(parse_id(&id)?).map_err(to_napi)?;
        to_json(&nodes)
    }

    #[napi]
    pub fn synthesize_project(&self) -> Result<Value> {
        let project = self.inner.synthesize_project().map_err(to_napi)?;
        to_json(&project)
    }
}
