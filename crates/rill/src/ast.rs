//! Parsed representation of notebook cells and modules.
//!
//! These types are produced by the [`crate::parse`] front end (or built
//! directly by an embedding parser) and are immutable inputs to lowering.

/// Byte range into a cell's raw source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }
}

/// The declared name of a cell.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub enum CellName {
    /// `name = ...`
    Plain(String),
    /// `viewof name = ...` - an interactive input bound to a derived value.
    View(String),
}

impl CellName {
    /// The public name the cell binds, regardless of form.
    pub fn public(&self) -> &str {
        match self {
            CellName::Plain(name) | CellName::View(name) => name,
        }
    }
}

/// A free name a cell body reads from its enclosing scope.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Reference {
    pub name: String,
    /// Whether the reference denotes a view binding. A view-flagged
    /// reference must never reach computation wiring; see
    /// [`crate::Error::ViewReference`].
    pub view: bool,
}

impl Reference {
    pub fn plain(name: impl Into<String>) -> Self {
        Self { name: name.into(), view: false }
    }

    pub fn view(name: impl Into<String>) -> Self {
        Self { name: name.into(), view: true }
    }
}

/// Binds a name exported by another module to a local name.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ImportSpecifier {
    /// Name as exported by the source module.
    pub name: String,
    /// Local name in the importing module.
    pub alias: String,
}

/// An override supplied to a derived module, replacing one of its own free
/// variables with a binding supplied by the importer.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Injection {
    pub name: String,
    pub alias: String,
}

/// A parsed `import { ... } [with { ... }] from "path"` declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportDecl {
    pub specifiers: Vec<ImportSpecifier>,
    pub injections: Vec<Injection>,
    /// Import path, resolved to a module by the [`crate::resolve::ModuleResolver`].
    pub source: String,
}

/// The body of a cell. Exactly one shape holds by construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CellBody {
    /// An import declaration.
    Import(ImportDecl),
    /// A `{ ... }` block; must contain an explicit `return`.
    Block(Span),
    /// A bare expression.
    Expression(Span),
}

/// One notebook cell, as produced by the upstream parser.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedCell {
    /// Declared identifier; anonymous cells are permitted.
    pub name: Option<CellName>,
    pub body: CellBody,
    /// Whether the computation may suspend awaiting a value.
    pub suspend: bool,
    /// Whether the computation lazily produces a sequence of values.
    pub iterate: bool,
    /// Free names the body reads, in declaration order.
    pub references: Vec<Reference>,
    /// Raw source text of the cell; body spans index into it.
    pub input: String,
}

impl ParsedCell {
    /// Public name the cell binds, if any.
    pub fn public_name(&self) -> Option<&str> {
        self.name.as_ref().map(CellName::public)
    }
}

/// An ordered sequence of cells. Order has no dataflow meaning; it only
/// affects iteration order during lowering.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedModule {
    pub cells: Vec<ParsedCell>,
}
