//! Module lowering: a parsed module becomes a deferred graph-population
//! procedure.

use std::sync::Arc;

use futures::future::{BoxFuture, try_join_all};

use crate::ast::ParsedModule;
use crate::error::Result;
use crate::resolve::ModuleResolver;
use crate::runtime::{Module, ObserverFactory, Runtime};

use super::cell::{LowerRequest, lower_cell};
use super::{ImportAnnotator, default_annotator};

/// A deferred module definition: invoking [`define`](Self::define)
/// populates a fresh module in the given runtime.
///
/// Resolvers return these for imports, so transitive imports lower through
/// the same machinery.
#[derive(Clone)]
pub struct ModuleDefinition {
    parsed: Arc<ParsedModule>,
    resolver: Arc<dyn ModuleResolver>,
    annotate: ImportAnnotator,
}

impl ModuleDefinition {
    pub fn new(parsed: ParsedModule, resolver: Arc<dyn ModuleResolver>) -> Self {
        Self { parsed: Arc::new(parsed), resolver, annotate: default_annotator() }
    }

    pub(crate) fn with_annotator(
        parsed: Arc<ParsedModule>,
        resolver: Arc<dyn ModuleResolver>,
        annotate: ImportAnnotator,
    ) -> Self {
        Self { parsed, resolver, annotate }
    }

    /// Number of cells this definition will lower.
    pub fn cell_count(&self) -> usize {
        self.parsed.cells.len()
    }

    /// Create one fresh module and lower every cell into it.
    ///
    /// Per-cell lowering runs concurrently; completion order among
    /// siblings carries no meaning (the dataflow graph, not lowering
    /// order, determines evaluation order later). The first failing cell
    /// fails the whole definition; variables already created are not
    /// retracted.
    pub fn define<'a>(
        &'a self,
        runtime: &'a Runtime,
        observers: Option<&'a dyn ObserverFactory>,
    ) -> BoxFuture<'a, Result<Module>> {
        Box::pin(async move {
            tracing::debug!(cells = self.parsed.cells.len(), "defining module");
            let main = runtime.module();
            try_join_all(self.parsed.cells.iter().map(|cell| {
                lower_cell(LowerRequest {
                    cell,
                    module: &main,
                    runtime,
                    observers,
                    resolver: &self.resolver,
                    annotate: &self.annotate,
                    variable: None,
                    view: None,
                })
            }))
            .await?;
            Ok(main)
        })
    }
}

impl std::fmt::Debug for ModuleDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleDefinition")
            .field("cells", &self.parsed.cells.len())
            .finish_non_exhaustive()
    }
}
