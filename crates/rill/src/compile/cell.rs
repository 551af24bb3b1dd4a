//! Per-cell lowering: classification, extraction, synthesis, and wiring.

use std::sync::Arc;

use futures::future::BoxFuture;

use crate::ast::{CellBody, CellName, ParsedCell};
use crate::error::{Error, Result};
use crate::resolve::ModuleResolver;
use crate::runtime::{Module, ObserverFactory, Runtime, Variable, ViewVariable};
use crate::synth::Computation;
use crate::value::Value;

use super::ImportAnnotator;
use super::prepare;

/// Everything one cell lowering needs.
pub(crate) struct LowerRequest<'a> {
    pub cell: &'a ParsedCell,
    pub module: &'a Module,
    pub runtime: &'a Runtime,
    pub observers: Option<&'a dyn ObserverFactory>,
    pub resolver: &'a Arc<dyn ModuleResolver>,
    pub annotate: &'a ImportAnnotator,
    /// Pre-existing target variable, for redefinition.
    pub variable: Option<Variable>,
    /// Pre-existing view variable, so redefining a view cell keeps
    /// downstream dependents' identity.
    pub view: Option<ViewVariable>,
}

/// The variable(s) a cell lowered to.
#[derive(Debug, Clone)]
pub struct LoweredCell {
    pub variable: Variable,
    /// The paired public variable, for view cells only.
    pub view: Option<ViewVariable>,
}

pub(crate) fn lower_cell(req: LowerRequest<'_>) -> BoxFuture<'_, Result<LoweredCell>> {
    Box::pin(async move {
        match &req.cell.body {
            CellBody::Import(_) => lower_import(req).await,
            CellBody::Block(_) | CellBody::Expression(_) => lower_regular(req).await,
        }
    })
}

async fn lower_import(req: LowerRequest<'_>) -> Result<LoweredCell> {
    let CellBody::Import(decl) = &req.cell.body else {
        return Err(Error::Parse("not an import cell".into()));
    };
    tracing::debug!(source = %decl.source, specifiers = decl.specifiers.len(), "lowering import cell");

    // The documentation node: a rendered reconstruction of the import
    // statement, inert to dataflow wiring.
    let target = req
        .variable
        .unwrap_or_else(|| req.module.variable(req.observers.map(|f| f.observer())));
    target.define(None, Vec::new(), Computation::constant(Value::Str((req.annotate)(decl))))?;

    let definition = req.resolver.resolve(&decl.source).await.map_err(|err| {
        Error::ImportResolution { path: decl.source.clone(), message: err.to_string() }
    })?;
    let other = definition.define(req.runtime, None).await?;

    let child = other.derive(&decl.injections, req.module);
    for specifier in &decl.specifiers {
        req.module.import(&specifier.name, &specifier.alias, &child);
    }

    Ok(LoweredCell { variable: target, view: None })
}

async fn lower_regular(req: LowerRequest<'_>) -> Result<LoweredCell> {
    // Classify and synthesize before creating any variable, so a bad cell
    // leaves no trace in the module.
    let dependencies = prepare::dependency_names(&req.cell.references)?;
    let (body_text, wrap) = prepare::extract_body(req.cell)?;
    let computation = Computation::synthesize(
        body_text,
        wrap,
        dependencies.clone(),
        req.cell.suspend,
        req.cell.iterate,
    )?;

    let target = req
        .variable
        .unwrap_or_else(|| req.module.variable(req.observers.map(|f| f.observer())));

    if let Some(CellName::View(public)) = &req.cell.name {
        // Hidden variable computes the interactive control; the public one
        // derives its value from it through the runtime's input adapter.
        let hidden = format!("viewof {}", public);
        tracing::debug!(name = %public, "lowering view cell");
        target.define(Some(&hidden), dependencies, computation)?;

        let view = req.view.unwrap_or_else(|| ViewVariable::new(req.module));
        view.variable()
            .define(Some(public), vec![hidden], req.runtime.input_adapter())?;
        return Ok(LoweredCell { variable: target, view: Some(view) });
    }

    let name = match &req.cell.name {
        Some(CellName::Plain(name)) => Some(name.as_str()),
        _ => None,
    };
    tracing::debug!(name = name.unwrap_or("<anonymous>"), "lowering cell");
    target.define(name, dependencies, computation)?;
    Ok(LoweredCell { variable: target, view: None })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile::Compiler;
    use crate::compile::CellContext;
    use crate::resolve::MemoryResolver;

    fn compiler() -> Compiler {
        Compiler::with_resolver(Arc::new(MemoryResolver::new()))
    }

    fn context<'a>(runtime: &'a Runtime, module: &'a Module) -> CellContext<'a> {
        CellContext { runtime, module, observers: None, variable: None, view: None }
    }

    #[tokio::test]
    async fn test_plain_cell_zero_references() {
        let runtime = Runtime::new();
        let module = runtime.module();
        let lowered = compiler().cell("a = 1", context(&runtime, &module)).await.unwrap();

        assert_eq!(lowered.variable.name().as_deref(), Some("a"));
        assert!(lowered.view.is_none());
        let v = lowered.variable.invoke(&[]).await.unwrap().into_value().unwrap();
        assert_eq!(v, Value::Number(1.0));
    }

    #[tokio::test]
    async fn test_references_bind_positionally() {
        let runtime = Runtime::new();
        let module = runtime.module();
        let lowered = compiler().cell("b = a + 1", context(&runtime, &module)).await.unwrap();

        assert_eq!(lowered.variable.dependencies(), vec!["a"]);
        let v = lowered
            .variable
            .invoke(&[Value::Number(41.0)])
            .await
            .unwrap()
            .into_value()
            .unwrap();
        assert_eq!(v, Value::Number(42.0));
    }

    #[tokio::test]
    async fn test_view_cell_produces_twin_variables() {
        let runtime = Runtime::new();
        let module = runtime.module();
        let lowered =
            compiler().cell("viewof x = 10", context(&runtime, &module)).await.unwrap();

        assert_eq!(lowered.variable.name().as_deref(), Some("viewof x"));
        let view = lowered.view.expect("view cell must produce a paired variable");
        assert_eq!(view.variable().name().as_deref(), Some("x"));
        assert_eq!(view.variable().dependencies(), vec!["viewof x"]);

        assert!(module.variable_named("viewof x").is_some());
        assert!(module.variable_named("x").is_some());
    }

    #[tokio::test]
    async fn test_view_variable_identity_preserved_on_redefine() {
        let runtime = Runtime::new();
        let module = runtime.module();
        let first = compiler().cell("viewof x = 10", context(&runtime, &module)).await.unwrap();
        let view = first.view.unwrap();

        let ctx = CellContext {
            runtime: &runtime,
            module: &module,
            observers: None,
            variable: Some(first.variable.clone()),
            view: Some(view.clone()),
        };
        let second = compiler().cell("viewof x = 20", ctx).await.unwrap();
        assert!(second.view.unwrap().variable().same_node(view.variable()));
    }

    #[tokio::test]
    async fn test_view_reference_fails_before_variable_creation() {
        let runtime = Runtime::new();
        let module = runtime.module();
        let err = compiler()
            .cell("y = viewof x + 1", context(&runtime, &module))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ViewReference(name) if name == "x"));
        assert!(module.is_empty());
    }

    #[tokio::test]
    async fn test_import_cell_creates_binding_and_doc_node() {
        let resolver = MemoryResolver::new().with_source("notebook/shared", "foo = 1\n");
        let compiler = Compiler::with_resolver(Arc::new(resolver));
        let runtime = Runtime::new();
        let module = runtime.module();

        let lowered = compiler
            .cell(
                r#"import { foo as bar } from "notebook/shared""#,
                context(&runtime, &module),
            )
            .await
            .unwrap();

        // Exactly one binding: bar <- foo from the derived child.
        let bindings = module.imports();
        assert_eq!(bindings.len(), 1);
        assert_eq!(bindings[0].name, "foo");
        assert_eq!(bindings[0].alias, "bar");
        assert!(bindings[0].from.variable_named("foo").is_some());

        // The import cell itself contributed only the documentation node.
        assert!(lowered.variable.name().is_none());
        assert!(lowered.variable.dependencies().is_empty());
        let doc = lowered.variable.invoke(&[]).await.unwrap().into_value().unwrap();
        assert_eq!(doc, Value::Str(r#"import { foo as bar } from "notebook/shared""#.into()));
    }

    #[tokio::test]
    async fn test_import_injections_bind_from_importer() {
        let resolver = MemoryResolver::new().with_source("d/chart", "chart = data + 1\n");
        let compiler = Compiler::with_resolver(Arc::new(resolver));
        let runtime = Runtime::new();
        let module = runtime.module();

        compiler
            .cell(
                r#"import { chart } with { data as source } from "d/chart""#,
                context(&runtime, &module),
            )
            .await
            .unwrap();

        let binding = module.import_binding("chart").unwrap();
        let injected = binding.from.import_binding("source").unwrap();
        assert_eq!(injected.name, "data");
        assert!(injected.from.same_module(&module));
    }

    #[tokio::test]
    async fn test_unresolved_import_is_wrapped() {
        let runtime = Runtime::new();
        let module = runtime.module();
        let err = compiler()
            .cell(r#"import { x } from "missing/module""#, context(&runtime, &module))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ImportResolution { path, .. } if path == "missing/module"));
    }
}
