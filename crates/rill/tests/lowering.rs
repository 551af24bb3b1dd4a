//! End-to-end lowering tests: source text in, dataflow definitions out.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use rill::{
    CellContext, Compiler, Error, MemoryResolver, Module, Observer, ObserverFactory, Runtime,
    Value,
};

fn compiler() -> Compiler {
    Compiler::with_resolver(Arc::new(MemoryResolver::new()))
}

fn context<'a>(runtime: &'a Runtime, module: &'a Module) -> CellContext<'a> {
    CellContext { runtime, module, observers: None, variable: None, view: None }
}

#[tokio::test]
async fn module_lowering_defines_all_cells() {
    let definition = compiler().module("a = 1\n\nb = a + 1\n\nc = a + b\n").unwrap();
    assert_eq!(definition.cell_count(), 3);

    let runtime = Runtime::new();
    let main = definition.define(&runtime, None).await.unwrap();
    assert_eq!(main.len(), 3);

    let b = main.variable_named("b").unwrap();
    assert_eq!(b.dependencies(), vec!["a"]);
    let v = b.invoke(&[Value::Number(1.0)]).await.unwrap().into_value().unwrap();
    assert_eq!(v, Value::Number(2.0));

    let c = main.variable_named("c").unwrap();
    assert_eq!(c.dependencies(), vec!["a", "b"]);
}

#[tokio::test]
async fn independent_cells_all_defined_regardless_of_settle_order() {
    // Cells with awaits settle in an order the lowerer must not depend on.
    let source = (0..16)
        .map(|i| format!("v{} = await {}", i, i))
        .collect::<Vec<_>>()
        .join("\n\n");
    let definition = compiler().module(&source).unwrap();

    let runtime = Runtime::new();
    let main = definition.define(&runtime, None).await.unwrap();
    assert_eq!(main.len(), 16);
    for i in 0..16 {
        assert!(main.variable_named(&format!("v{}", i)).is_some());
    }
}

#[tokio::test]
async fn one_failing_cell_fails_the_module_definition() {
    // The second cell reads a raw view binding: an upstream contract breach.
    let definition = compiler().module("a = 1\n\nbad = viewof s + 1\n").unwrap();
    let runtime = Runtime::new();
    let err = definition.define(&runtime, None).await.unwrap_err();
    assert!(matches!(err, Error::ViewReference(name) if name == "s"));
}

#[tokio::test]
async fn lowering_twice_yields_independent_equivalent_variables() {
    let compiler = compiler();
    let runtime = Runtime::new();
    let first_module = runtime.module();
    let second_module = runtime.module();

    let first = compiler.cell("n = 2 * 21", context(&runtime, &first_module)).await.unwrap();
    let second = compiler.cell("n = 2 * 21", context(&runtime, &second_module)).await.unwrap();

    assert!(!first.variable.same_node(&second.variable));
    assert_eq!(first.variable.name(), second.variable.name());
    assert_eq!(first.variable.dependencies(), second.variable.dependencies());
    for lowered in [&first, &second] {
        let v = lowered.variable.invoke(&[]).await.unwrap().into_value().unwrap();
        assert_eq!(v, Value::Number(42.0));
    }
}

#[tokio::test]
async fn generator_cell_lowers_to_restartable_sequence() {
    let runtime = Runtime::new();
    let module = runtime.module();
    let lowered = compiler()
        .cell(
            "naturals = { let i = 0; while true { yield i; let i = i + 1 } }",
            context(&runtime, &module),
        )
        .await
        .unwrap();

    let mut seq = lowered.variable.invoke(&[]).await.unwrap().into_sequence().unwrap();
    assert_eq!(
        seq.take(3).await.unwrap(),
        vec![Value::Number(0.0), Value::Number(1.0), Value::Number(2.0)]
    );

    // A fresh invocation restarts from the beginning.
    let mut seq = lowered.variable.invoke(&[]).await.unwrap().into_sequence().unwrap();
    assert_eq!(seq.next().await.unwrap().unwrap(), Value::Number(0.0));
}

#[tokio::test]
async fn transitive_imports_resolve_through_the_same_resolver() {
    let resolver = MemoryResolver::new()
        .with_source("nb/inner", "base = 10\n")
        .with_source(
            "nb/outer",
            "import { base } from \"nb/inner\"\n\nouter = base * 2\n",
        );
    let compiler = Compiler::with_resolver(Arc::new(resolver));
    let runtime = Runtime::new();
    let module = runtime.module();

    compiler
        .cell(r#"import { outer } from "nb/outer""#, context(&runtime, &module))
        .await
        .unwrap();

    let binding = module.import_binding("outer").unwrap();
    // The child module carries its own import edge for the inner notebook.
    assert!(binding.from.import_binding("base").is_some());
}

struct CountingObserver;

impl Observer for CountingObserver {}

struct CountingFactory {
    created: AtomicUsize,
}

impl ObserverFactory for CountingFactory {
    fn observer(&self) -> Arc<dyn Observer> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Arc::new(CountingObserver)
    }
}

#[tokio::test]
async fn observer_factory_invoked_per_cell() {
    let definition = compiler().module("a = 1\n\nb = 2\n").unwrap();
    let runtime = Runtime::new();
    let factory = CountingFactory { created: AtomicUsize::new(0) };
    let main = definition.define(&runtime, Some(&factory)).await.unwrap();

    assert_eq!(factory.created.load(Ordering::SeqCst), 2);
    for variable in main.variables() {
        assert!(variable.observer().is_some());
    }
}

#[tokio::test]
async fn view_cell_twins_via_module_definition() {
    let definition = compiler()
        .module("viewof x = 10\n\ndouble = x * 2\n")
        .unwrap();
    let runtime = Runtime::new();
    let main = definition.define(&runtime, None).await.unwrap();

    let hidden = main.variable_named("viewof x").unwrap();
    let public = main.variable_named("x").unwrap();
    assert_eq!(public.dependencies(), vec!["viewof x"]);
    assert!(!hidden.same_node(&public));

    // The public variable republishes the control's current value.
    let v = public.invoke(&[Value::Number(7.0)]).await.unwrap().into_value().unwrap();
    assert_eq!(v, Value::Number(7.0));
}

#[tokio::test]
async fn suspending_cell_resolves_before_producing() {
    let runtime = Runtime::new();
    let module = runtime.module();
    let lowered = compiler()
        .cell("slow = await fast + 1", context(&runtime, &module))
        .await
        .unwrap();

    let v = lowered
        .variable
        .invoke(&[Value::Number(1.0)])
        .await
        .unwrap()
        .into_value()
        .unwrap();
    assert_eq!(v, Value::Number(2.0));
}
