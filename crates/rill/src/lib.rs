//! Lowering core for reactive notebooks.
//!
//! This crate compiles parsed notebook cells into node definitions for a
//! reactive dataflow runtime:
//! - Classification of each cell into one of several shapes (plain, view,
//!   import)
//! - Reference extraction and body slicing with the correct wrapping
//! - Synthesis of executable computations with suspension/iteration
//!   semantics
//! - Derivation and import bindings between dataflow graphs
//!
//! Scheduling and recomputation belong to the runtime consuming the
//! definitions; this crate is a pure in-memory transformation invoked per
//! compilation request.
//!
//! # Quick start
//!
//! ```rust,ignore
//! use rill::{Compiler, CellContext, Runtime};
//!
//! let compiler = Compiler::new();
//! let runtime = Runtime::new();
//! let module = runtime.module();
//!
//! let lowered = compiler
//!     .cell("b = a + 1", CellContext {
//!         runtime: &runtime,
//!         module: &module,
//!         observers: None,
//!         variable: None,
//!         view: None,
//!     })
//!     .await?;
//!
//! // Or lower a whole module as one deferred definition:
//! let definition = compiler.module("a = 1\n\nb = a + 1\n")?;
//! let main = definition.define(&runtime, None).await?;
//! ```

pub mod ast;
pub mod compile;
pub mod error;
pub mod expr;
pub mod parse;
pub mod resolve;
pub mod runtime;
pub mod synth;
pub mod value;

pub use ast::{
    CellBody, CellName, ImportDecl, ImportSpecifier, Injection, ParsedCell, ParsedModule,
    Reference, Span,
};
pub use compile::{CellContext, Compiler, ImportAnnotator, LoweredCell, ModuleDefinition};
pub use error::{Error, Result};
pub use resolve::{MemoryResolver, ModuleResolver, PROTOCOL_VERSION, RegistryResolver};
pub use runtime::{
    ImportBinding, Module, Observer, ObserverFactory, Runtime, Variable, ViewVariable,
};
pub use synth::{Computation, ComputationKind, Invoked, SequenceIter, Wrap};
pub use value::Value;
