//! Structural runtime model the lowering core wires into.
//!
//! This is the object model side of the dataflow runtime: modules,
//! variables, import edges, and module derivation. Scheduling and
//! recomputation are the external runtime's responsibility and are not
//! implemented here; namespace registration is mutex-guarded so sibling
//! cells of one lowering pass may define concurrently.

mod variable;

use std::sync::{Arc, Mutex};

use rustc_hash::FxHashMap;

use crate::ast::Injection;
use crate::synth::Computation;

pub use variable::{Observer, ObserverFactory, Variable, ViewVariable};

/// Handle to the dataflow runtime: creates modules and supplies the
/// generic view input adapter.
#[derive(Clone, Default)]
pub struct Runtime {
    inner: Arc<Mutex<RuntimeState>>,
}

#[derive(Default)]
struct RuntimeState {
    modules: Vec<Module>,
}

impl Runtime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a fresh, empty module owned by this runtime.
    pub fn module(&self) -> Module {
        let module = Module::new();
        self.inner.lock().unwrap().modules.push(module.clone());
        module
    }

    pub fn module_count(&self) -> usize {
        self.inner.lock().unwrap().modules.len()
    }

    /// The generic adapter computing a view cell's public value from its
    /// hidden control variable: subscribes to the control's input stream
    /// and republishes the current value. Structurally, arity-1
    /// pass-through; the subscription itself is scheduler territory.
    pub fn input_adapter(&self) -> Computation {
        Computation::builtin(1, |args| {
            args.first()
                .cloned()
                .ok_or(crate::error::Error::Arity { expected: 1, actual: 0 })
        })
    }
}

/// A graph-level import edge: `alias` in the importing module reads the
/// value exported as `name` by `from`.
#[derive(Clone)]
pub struct ImportBinding {
    pub name: String,
    pub alias: String,
    pub from: Module,
}

#[derive(Default)]
pub(crate) struct ModuleState {
    variables: Vec<Variable>,
    names: FxHashMap<String, Variable>,
    imports: Vec<ImportBinding>,
}

/// A named collection of variables forming one dataflow graph.
#[derive(Clone)]
pub struct Module {
    inner: Arc<Mutex<ModuleState>>,
}

impl Module {
    fn new() -> Self {
        Self { inner: Arc::new(Mutex::new(ModuleState::default())) }
    }

    /// Create an undefined variable in this module, optionally observed.
    pub fn variable(&self, observer: Option<Arc<dyn Observer>>) -> Variable {
        let variable = Variable::new(Arc::downgrade(&self.inner), observer);
        self.inner.lock().unwrap().variables.push(variable.clone());
        variable
    }

    /// Record an import edge: local `alias` sourced from `name` exported
    /// by `from`.
    pub fn import(&self, name: &str, alias: &str, from: &Module) {
        self.inner.lock().unwrap().imports.push(ImportBinding {
            name: name.to_string(),
            alias: alias.to_string(),
            from: from.clone(),
        });
    }

    /// Derive a child module scoped to an importer. The child shares this
    /// module's definitions; each injection becomes an override binding
    /// sourced from `within` (the importing module).
    pub fn derive(&self, injections: &[Injection], within: &Module) -> Module {
        let child = Module::new();
        {
            let base = self.inner.lock().unwrap();
            let mut state = child.inner.lock().unwrap();
            state.variables = base.variables.clone();
            state.names = base.names.clone();
            state.imports = base.imports.clone();
        }
        for injection in injections {
            child.import(&injection.name, &injection.alias, within);
        }
        child
    }

    /// Look up a defined variable by name.
    pub fn variable_named(&self, name: &str) -> Option<Variable> {
        self.inner.lock().unwrap().names.get(name).cloned()
    }

    /// Look up an import edge by local alias.
    pub fn import_binding(&self, alias: &str) -> Option<ImportBinding> {
        self.inner
            .lock()
            .unwrap()
            .imports
            .iter()
            .find(|binding| binding.alias == alias)
            .cloned()
    }

    /// Snapshot of all import edges, in creation order.
    pub fn imports(&self) -> Vec<ImportBinding> {
        self.inner.lock().unwrap().imports.clone()
    }

    /// Snapshot of all variables, in creation order.
    pub fn variables(&self) -> Vec<Variable> {
        self.inner.lock().unwrap().variables.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().variables.is_empty()
    }

    /// Whether two handles address the same module.
    pub fn same_module(&self, other: &Module) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for Module {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.lock().unwrap();
        f.debug_struct("Module")
            .field("variables", &state.variables.len())
            .field("names", &state.names.keys().collect::<Vec<_>>())
            .field("imports", &state.imports.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn test_named_definition_registers_in_namespace() {
        let runtime = Runtime::new();
        let module = runtime.module();
        let v = module.variable(None);
        v.define(Some("a"), vec![], Computation::constant(Value::Number(1.0)))
            .unwrap();
        let found = module.variable_named("a").unwrap();
        assert!(found.same_node(&v));
    }

    #[test]
    fn test_anonymous_definition_not_in_namespace() {
        let runtime = Runtime::new();
        let module = runtime.module();
        let v = module.variable(None);
        v.define(None, vec![], Computation::constant(Value::Null)).unwrap();
        assert_eq!(module.len(), 1);
        assert!(module.variable_named("a").is_none());
    }

    #[test]
    fn test_define_checks_arity_against_dependencies() {
        let runtime = Runtime::new();
        let module = runtime.module();
        let v = module.variable(None);
        let err = v
            .define(Some("a"), vec!["x".into()], Computation::constant(Value::Null))
            .unwrap_err();
        assert!(matches!(err, crate::Error::Arity { expected: 1, actual: 0 }));
    }

    #[test]
    fn test_derive_applies_injections() {
        let runtime = Runtime::new();
        let base = runtime.module();
        base.variable(None)
            .define(Some("x"), vec![], Computation::constant(Value::Number(1.0)))
            .unwrap();
        let importer = runtime.module();

        let injections = vec![Injection { name: "x".into(), alias: "y".into() }];
        let child = base.derive(&injections, &importer);

        // Shared definitions plus one override binding from the importer.
        assert!(child.variable_named("x").is_some());
        let binding = child.import_binding("y").unwrap();
        assert_eq!(binding.name, "x");
        assert!(binding.from.same_module(&importer));
    }

    #[tokio::test]
    async fn test_input_adapter_republishes() {
        let runtime = Runtime::new();
        let adapter = runtime.input_adapter();
        assert_eq!(adapter.arity(), 1);
        let v = adapter
            .invoke(&[Value::Str("current".into())])
            .await
            .unwrap()
            .into_value()
            .unwrap();
        assert_eq!(v, Value::Str("current".into()));
    }
}
