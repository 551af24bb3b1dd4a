//! Dataflow graph nodes and observers.

use std::sync::{Arc, Mutex, Weak};

use crate::error::{Error, Result};
use crate::synth::{Computation, Invoked};
use crate::value::Value;

use super::ModuleState;

/// Receives lifecycle notifications for one variable. Attached at creation;
/// invoked by the scheduling runtime, not by the lowering core.
pub trait Observer: Send + Sync {
    /// The variable is waiting on its inputs.
    fn pending(&self) {}
    /// The variable settled to a value.
    fn fulfilled(&self, value: &Value) {
        let _ = value;
    }
    /// The variable's computation failed.
    fn rejected(&self, message: &str) {
        let _ = message;
    }
}

/// Produces one observer per created variable.
pub trait ObserverFactory: Send + Sync {
    fn observer(&self) -> Arc<dyn Observer>;
}

#[derive(Default)]
pub(super) struct VariableState {
    pub(super) name: Option<String>,
    pub(super) dependencies: Vec<String>,
    pub(super) computation: Option<Computation>,
}

/// A single node in a dataflow graph: optional name, ordered dependency
/// names, and a computation.
///
/// Created undefined by [`super::Module::variable`]; defined exactly once
/// by the lowering core and never mutated by it afterwards.
#[derive(Clone)]
pub struct Variable {
    pub(super) module: Weak<Mutex<ModuleState>>,
    pub(super) inner: Arc<Mutex<VariableState>>,
    pub(super) observer: Option<Arc<dyn Observer>>,
}

impl Variable {
    pub(super) fn new(
        module: Weak<Mutex<ModuleState>>,
        observer: Option<Arc<dyn Observer>>,
    ) -> Self {
        Self { module, inner: Arc::new(Mutex::new(VariableState::default())), observer }
    }

    /// Define this variable. The dependency list fixes the computation's
    /// arity; a mismatch is an error. A named definition registers the name
    /// in the owning module's namespace.
    pub fn define(
        &self,
        name: Option<&str>,
        dependencies: Vec<String>,
        computation: Computation,
    ) -> Result<()> {
        if computation.arity() != dependencies.len() {
            return Err(Error::Arity {
                expected: dependencies.len(),
                actual: computation.arity(),
            });
        }
        tracing::debug!(name = name.unwrap_or("<anonymous>"), deps = dependencies.len(), "defining variable");
        {
            let mut state = self.inner.lock().unwrap();
            state.name = name.map(str::to_string);
            state.dependencies = dependencies;
            state.computation = Some(computation);
        }
        if let (Some(name), Some(module)) = (name, self.module.upgrade()) {
            module.lock().unwrap().names.insert(name.to_string(), self.clone());
        }
        Ok(())
    }

    pub fn name(&self) -> Option<String> {
        self.inner.lock().unwrap().name.clone()
    }

    /// Dependency names, in the order inputs bind.
    pub fn dependencies(&self) -> Vec<String> {
        self.inner.lock().unwrap().dependencies.clone()
    }

    pub fn is_defined(&self) -> bool {
        self.inner.lock().unwrap().computation.is_some()
    }

    pub fn computation(&self) -> Option<Computation> {
        self.inner.lock().unwrap().computation.clone()
    }

    pub fn observer(&self) -> Option<Arc<dyn Observer>> {
        self.observer.clone()
    }

    /// Invoke the variable's computation with already-settled inputs.
    pub async fn invoke(&self, args: &[Value]) -> Result<Invoked> {
        let computation = self.computation().ok_or(Error::NotDefined)?;
        computation.invoke(args).await
    }

    /// Whether two handles address the same node.
    pub fn same_node(&self, other: &Variable) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for Variable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.lock().unwrap();
        f.debug_struct("Variable")
            .field("name", &state.name)
            .field("dependencies", &state.dependencies)
            .field("defined", &state.computation.is_some())
            .finish()
    }
}

/// The public half of a view cell: derives its value from the hidden
/// control variable.
///
/// A distinct type from [`Variable`] so the target and view roles cannot be
/// swapped when redefining a cell.
#[derive(Clone, Debug)]
pub struct ViewVariable(Variable);

impl ViewVariable {
    /// Create an undefined view variable in `module`.
    pub fn new(module: &super::Module) -> Self {
        Self(module.variable(None))
    }

    pub fn variable(&self) -> &Variable {
        &self.0
    }
}
