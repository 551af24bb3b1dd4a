//! Computation synthesis: turning extracted body text plus a parameter
//! list into an executable computation.
//!
//! The suspend/iterate flag pair maps through [`ComputationKind::for_flags`]
//! to one of exactly four kinds; [`Computation::synthesize`] is the single
//! factory keyed on that tag. Call sites never branch on the raw flags.

use std::fmt;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::expr::eval::{BlockRun, Env};
use crate::expr::{Program, parser};
use crate::value::Value;

/// How the extracted body text must be wrapped before execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wrap {
    /// A `{ ... }` block, used verbatim; it must contain an explicit
    /// `return`.
    Verbatim,
    /// A bare expression, wrapped so invocation returns its value.
    Expression,
}

/// The four computation shapes a cell can lower to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputationKind {
    /// Returns a plain value.
    Plain,
    /// Returns a value only after a suspension point resolves.
    Suspending,
    /// Lazily produces a sequence of values, each demanded on pull.
    Lazy,
    /// A lazy sequence whose production suspends before each element.
    SuspendingLazy,
}

impl ComputationKind {
    /// The exhaustive (suspend, iterate) table.
    pub fn for_flags(suspend: bool, iterate: bool) -> Self {
        match (suspend, iterate) {
            (false, false) => ComputationKind::Plain,
            (true, false) => ComputationKind::Suspending,
            (false, true) => ComputationKind::Lazy,
            (true, true) => ComputationKind::SuspendingLazy,
        }
    }

    /// Whether invocation produces a sequence rather than a single value.
    pub fn iterates(&self) -> bool {
        matches!(self, ComputationKind::Lazy | ComputationKind::SuspendingLazy)
    }

    /// Whether the computation may suspend before producing.
    pub fn suspends(&self) -> bool {
        matches!(self, ComputationKind::Suspending | ComputationKind::SuspendingLazy)
    }
}

type BuiltinFn = dyn Fn(&[Value]) -> Result<Value> + Send + Sync;

#[derive(Clone)]
enum Body {
    Program(Arc<Program>),
    Builtin(Arc<BuiltinFn>),
}

/// An executable computation: a dataflow node's recipe.
///
/// Accepts exactly `arity()` positional inputs which bind to the parameter
/// names, in order; no other implicit scope is added.
#[derive(Clone)]
pub struct Computation {
    kind: ComputationKind,
    params: Vec<String>,
    body: Body,
}

impl Computation {
    /// Build a computation from extracted body text.
    ///
    /// `source` is the literal substring produced by the body extractor;
    /// `wrap` is its wrapping decision. Parse errors surface here, at
    /// construction time.
    pub fn synthesize(
        source: &str,
        wrap: Wrap,
        params: Vec<String>,
        suspend: bool,
        iterate: bool,
    ) -> Result<Self> {
        let kind = ComputationKind::for_flags(suspend, iterate);
        let program = match wrap {
            Wrap::Expression => Program::returning(parser::parse_expression(source)?),
            Wrap::Verbatim => parser::parse_block(source)?,
        };
        Ok(Self { kind, params, body: Body::Program(Arc::new(program)) })
    }

    /// A zero-input computation producing a fixed value.
    pub fn constant(value: Value) -> Self {
        Self::builtin(0, move |_| Ok(value.clone()))
    }

    /// A host-supplied computation (e.g. the runtime's input adapter).
    pub fn builtin(
        arity: usize,
        f: impl Fn(&[Value]) -> Result<Value> + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind: ComputationKind::Plain,
            params: (0..arity).map(|i| format!("input{}", i)).collect(),
            body: Body::Builtin(Arc::new(f)),
        }
    }

    pub fn kind(&self) -> ComputationKind {
        self.kind
    }

    /// Number of positional inputs, fixed at construction.
    pub fn arity(&self) -> usize {
        self.params.len()
    }

    pub fn params(&self) -> &[String] {
        &self.params
    }

    /// Invoke with positional inputs bound to the parameter names in order.
    pub async fn invoke(&self, args: &[Value]) -> Result<Invoked> {
        if args.len() != self.params.len() {
            return Err(Error::Arity { expected: self.params.len(), actual: args.len() });
        }
        match &self.body {
            Body::Builtin(f) => Ok(Invoked::Value(f(args)?)),
            Body::Program(program) => {
                let env: Env = self
                    .params
                    .iter()
                    .cloned()
                    .zip(args.iter().cloned())
                    .collect();
                if self.kind.iterates() {
                    // Lazy: nothing evaluates until the first pull, and
                    // invoking again restarts the sequence from scratch.
                    Ok(Invoked::Sequence(SequenceIter::new(program.clone(), env)))
                } else {
                    Ok(Invoked::Value(BlockRun::new(program, env).run().await?))
                }
            }
        }
    }
}

impl fmt::Debug for Computation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Computation")
            .field("kind", &self.kind)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// The result of invoking a computation.
pub enum Invoked {
    Value(Value),
    Sequence(SequenceIter),
}

impl fmt::Debug for Invoked {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Invoked::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Invoked::Sequence(_) => f.debug_struct("Sequence").finish_non_exhaustive(),
        }
    }
}

impl Invoked {
    pub fn into_value(self) -> Option<Value> {
        match self {
            Invoked::Value(value) => Some(value),
            Invoked::Sequence(_) => None,
        }
    }

    pub fn into_sequence(self) -> Option<SequenceIter> {
        match self {
            Invoked::Sequence(seq) => Some(seq),
            Invoked::Value(_) => None,
        }
    }
}

/// A lazy, pull-driven sequence of values, finite or infinite.
pub struct SequenceIter {
    run: BlockRun,
}

impl SequenceIter {
    fn new(program: Arc<Program>, env: Env) -> Self {
        Self { run: BlockRun::new(&program, env) }
    }

    /// Demand the next element. `None` once the sequence ends.
    pub async fn next(&mut self) -> Option<Result<Value>> {
        self.run.next_yield().await.transpose()
    }

    /// Collect at most `limit` elements (a guard for infinite sequences).
    pub async fn take(&mut self, limit: usize) -> Result<Vec<Value>> {
        let mut out = Vec::new();
        while out.len() < limit {
            match self.next().await {
                Some(value) => out.push(value?),
                None => break,
            }
        }
        Ok(out)
    }
}
