//! Import resolution: mapping import paths to module definitions.

use std::sync::Arc;

use futures::future::BoxFuture;
use rustc_hash::FxHashMap;

use crate::compile::ModuleDefinition;
use crate::error::{Error, Result};
use crate::parse;

/// Registry protocol version appended to fetch URLs.
pub const PROTOCOL_VERSION: u32 = 3;

const DEFAULT_REGISTRY: &str = "https://api.rill-nb.dev/notebooks";

/// Maps an import path to a module definition.
///
/// Pluggable: the lowering core never assumes where module source comes
/// from. Implementations must be cheap to clone into the definitions they
/// return, since transitive imports resolve through the same resolver.
pub trait ModuleResolver: Send + Sync {
    fn resolve<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<ModuleDefinition>>;
}

/// Fetches versioned notebook source from a remote registry.
#[derive(Clone)]
pub struct RegistryResolver {
    client: reqwest::Client,
    base: String,
}

impl RegistryResolver {
    pub fn new(base: impl Into<String>) -> Self {
        Self { client: reqwest::Client::new(), base: base.into() }
    }
}

impl Default for RegistryResolver {
    fn default() -> Self {
        Self::new(DEFAULT_REGISTRY)
    }
}

impl ModuleResolver for RegistryResolver {
    fn resolve<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<ModuleDefinition>> {
        Box::pin(async move {
            let url = format!(
                "{}/{}?v={}",
                self.base.trim_end_matches('/'),
                path,
                PROTOCOL_VERSION
            );
            tracing::debug!(%url, "fetching module source from registry");
            let source = self
                .client
                .get(&url)
                .send()
                .await?
                .error_for_status()?
                .text()
                .await?;
            let parsed = parse::parse_module(&source)?;
            Ok(ModuleDefinition::new(parsed, Arc::new(self.clone())))
        })
    }
}

/// Resolves imports from an in-memory path → source table. The substitute
/// resolver for tests and embedders with local notebooks.
#[derive(Clone, Default)]
pub struct MemoryResolver {
    sources: FxHashMap<String, String>,
}

impl MemoryResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(mut self, path: impl Into<String>, source: impl Into<String>) -> Self {
        self.sources.insert(path.into(), source.into());
        self
    }
}

impl ModuleResolver for MemoryResolver {
    fn resolve<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<ModuleDefinition>> {
        Box::pin(async move {
            let source = self
                .sources
                .get(path)
                .ok_or_else(|| Error::UnknownModule(path.to_string()))?;
            let parsed = parse::parse_module(source)?;
            Ok(ModuleDefinition::new(parsed, Arc::new(self.clone())))
        })
    }
}
