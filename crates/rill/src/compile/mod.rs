//! The lowering compiler: public entry points for cell and module
//! compilation.

mod cell;
mod module;
pub mod prepare;

use std::sync::Arc;

use crate::ast::ImportDecl;
use crate::error::Result;
use crate::parse;
use crate::resolve::{ModuleResolver, RegistryResolver};
use crate::runtime::{Module, ObserverFactory, Runtime, Variable, ViewVariable};

pub use cell::LoweredCell;
pub use module::ModuleDefinition;

/// Renders the documentation text attached to an import cell's variable.
/// Swappable via [`Compiler::with_annotator`]; purely descriptive, never
/// part of dataflow wiring.
pub type ImportAnnotator = Arc<dyn Fn(&ImportDecl) -> String + Send + Sync>;

/// The default annotator: a plain reconstruction of the import statement.
pub(crate) fn default_annotator() -> ImportAnnotator {
    Arc::new(render_import)
}

fn render_import(decl: &ImportDecl) -> String {
    let list = |pairs: &[(String, String)]| -> String {
        pairs
            .iter()
            .map(|(name, alias)| {
                if name == alias {
                    name.clone()
                } else {
                    format!("{} as {}", name, alias)
                }
            })
            .collect::<Vec<_>>()
            .join(", ")
    };
    let specifiers: Vec<(String, String)> = decl
        .specifiers
        .iter()
        .map(|s| (s.name.clone(), s.alias.clone()))
        .collect();
    let injections: Vec<(String, String)> = decl
        .injections
        .iter()
        .map(|i| (i.name.clone(), i.alias.clone()))
        .collect();

    let mut out = format!("import {{ {} }}", list(&specifiers));
    if !injections.is_empty() {
        out.push_str(&format!(" with {{ {} }}", list(&injections)));
    }
    out.push_str(&format!(" from \"{}\"", decl.source));
    out
}

/// Context for lowering a single cell into an existing module.
pub struct CellContext<'a> {
    pub runtime: &'a Runtime,
    pub module: &'a Module,
    pub observers: Option<&'a dyn ObserverFactory>,
    /// Pre-existing target variable, for redefinition.
    pub variable: Option<Variable>,
    /// Pre-existing view variable, for view-cell redefinition.
    pub view: Option<ViewVariable>,
}

/// The lowering compiler. Holds the import resolver and the annotate hook;
/// stateless across calls, so one instance serves any number of
/// compilations.
#[derive(Clone)]
pub struct Compiler {
    resolver: Arc<dyn ModuleResolver>,
    annotate: ImportAnnotator,
}

impl Compiler {
    /// A compiler resolving imports from the default remote registry.
    pub fn new() -> Self {
        Self::with_resolver(Arc::new(RegistryResolver::default()))
    }

    /// A compiler with a custom import resolver.
    pub fn with_resolver(resolver: Arc<dyn ModuleResolver>) -> Self {
        Self { resolver, annotate: default_annotator() }
    }

    /// Replace the import documentation hook.
    pub fn with_annotator(mut self, annotate: ImportAnnotator) -> Self {
        self.annotate = annotate;
        self
    }

    /// Lower one cell from source text into `ctx.module`, returning the
    /// created variable(s).
    pub async fn cell(&self, text: &str, ctx: CellContext<'_>) -> Result<LoweredCell> {
        let parsed = parse::parse_cell(text)?;
        cell::lower_cell(cell::LowerRequest {
            cell: &parsed,
            module: ctx.module,
            runtime: ctx.runtime,
            observers: ctx.observers,
            resolver: &self.resolver,
            annotate: &self.annotate,
            variable: ctx.variable,
            view: ctx.view,
        })
        .await
    }

    /// Lower a module from source text into a deferred graph-population
    /// procedure.
    pub fn module(&self, text: &str) -> Result<ModuleDefinition> {
        let parsed = parse::parse_module(text)?;
        Ok(ModuleDefinition::with_annotator(
            Arc::new(parsed),
            self.resolver.clone(),
            self.annotate.clone(),
        ))
    }
}

impl Default for Compiler {
    fn default() -> Self {
        Self::new()
    }
}
