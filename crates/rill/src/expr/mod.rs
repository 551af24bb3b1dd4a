//! The cell body language: a small expression/statement AST with a lexer,
//! a Pratt parser, and an async tree-walking evaluator.
//!
//! Extracted body text is parsed into a [`Program`] at synthesis time and
//! evaluated against a parameter environment on each invocation; nothing
//! here touches the dataflow graph.

pub mod eval;
pub mod lexer;
pub mod parser;

use rustc_hash::FxHashSet;

use crate::ast::Reference;

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Not,
}

/// Binary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

/// An expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Str(String),
    Bool(bool),
    Null,
    Ident(String),
    /// `viewof name` - a reference to a view binding. Must be rewritten
    /// upstream; evaluating one is an error.
    View(String),
    List(Vec<Expr>),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Cond {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    /// `await expr` - a suspension point.
    Await(Box<Expr>),
}

/// A statement inside a block body.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    Let { name: String, value: Expr },
    Return(Expr),
    Yield(Expr),
    If { cond: Expr, then: Vec<Stmt>, otherwise: Vec<Stmt> },
    While { cond: Expr, body: Vec<Stmt> },
    Expr(Expr),
}

/// An executable cell body.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub stmts: Vec<Stmt>,
}

impl Program {
    /// A program that returns the value of a single expression.
    pub fn returning(expr: Expr) -> Self {
        Self { stmts: vec![Stmt::Return(expr)] }
    }

    /// Free names the program reads, in first-appearance order.
    pub fn free_references(&self) -> Vec<Reference> {
        let mut walker = FreeWalker::default();
        walker.walk_stmts(&self.stmts, &FxHashSet::default());
        walker.found
    }

    /// Whether any statement contains an `await` suspension point.
    pub fn uses_await(&self) -> bool {
        fn stmts_await(stmts: &[Stmt]) -> bool {
            stmts.iter().any(|stmt| match stmt {
                Stmt::Let { value, .. } | Stmt::Return(value) | Stmt::Yield(value) | Stmt::Expr(value) => {
                    expr_uses_await(value)
                }
                Stmt::If { cond, then, otherwise } => {
                    expr_uses_await(cond) || stmts_await(then) || stmts_await(otherwise)
                }
                Stmt::While { cond, body } => expr_uses_await(cond) || stmts_await(body),
            })
        }
        stmts_await(&self.stmts)
    }

    /// Whether the program yields a sequence of values.
    pub fn uses_yield(&self) -> bool {
        fn stmts_yield(stmts: &[Stmt]) -> bool {
            stmts.iter().any(|stmt| match stmt {
                Stmt::Yield(_) => true,
                Stmt::If { then, otherwise, .. } => stmts_yield(then) || stmts_yield(otherwise),
                Stmt::While { body, .. } => stmts_yield(body),
                _ => false,
            })
        }
        stmts_yield(&self.stmts)
    }
}

/// Whether an expression contains an `await` suspension point.
pub fn expr_uses_await(expr: &Expr) -> bool {
    match expr {
        Expr::Await(_) => true,
        Expr::Unary { operand, .. } => expr_uses_await(operand),
        Expr::Binary { lhs, rhs, .. } => expr_uses_await(lhs) || expr_uses_await(rhs),
        Expr::Cond { cond, then, otherwise } => {
            expr_uses_await(cond) || expr_uses_await(then) || expr_uses_await(otherwise)
        }
        Expr::List(items) => items.iter().any(expr_uses_await),
        _ => false,
    }
}

/// Free names an expression reads, in first-appearance order.
pub fn expr_free_references(expr: &Expr) -> Vec<Reference> {
    let mut walker = FreeWalker::default();
    walker.walk_expr(expr, &FxHashSet::default());
    walker.found
}

#[derive(Default)]
struct FreeWalker {
    found: Vec<Reference>,
    seen: FxHashSet<(String, bool)>,
}

impl FreeWalker {
    fn record(&mut self, name: &str, view: bool) {
        if self.seen.insert((name.to_string(), view)) {
            self.found.push(Reference { name: name.to_string(), view });
        }
    }

    fn walk_expr(&mut self, expr: &Expr, bound: &FxHashSet<String>) {
        match expr {
            Expr::Ident(name) => {
                if !bound.contains(name) {
                    self.record(name, false);
                }
            }
            Expr::View(name) => self.record(name, true),
            Expr::List(items) => {
                for item in items {
                    self.walk_expr(item, bound);
                }
            }
            Expr::Unary { operand, .. } | Expr::Await(operand) => self.walk_expr(operand, bound),
            Expr::Binary { lhs, rhs, .. } => {
                self.walk_expr(lhs, bound);
                self.walk_expr(rhs, bound);
            }
            Expr::Cond { cond, then, otherwise } => {
                self.walk_expr(cond, bound);
                self.walk_expr(then, bound);
                self.walk_expr(otherwise, bound);
            }
            Expr::Number(_) | Expr::Str(_) | Expr::Bool(_) | Expr::Null => {}
        }
    }

    fn walk_stmts(&mut self, stmts: &[Stmt], bound: &FxHashSet<String>) {
        // `let` binds for the remainder of the block only. Execution uses a
        // flat environment (see eval::BlockRun), so this lexical view can
        // only over-report: a name rebound inside a branch stays free here.
        let mut scope = bound.clone();
        for stmt in stmts {
            match stmt {
                Stmt::Let { name, value } => {
                    self.walk_expr(value, &scope);
                    scope.insert(name.clone());
                }
                Stmt::Return(value) | Stmt::Yield(value) | Stmt::Expr(value) => {
                    self.walk_expr(value, &scope);
                }
                Stmt::If { cond, then, otherwise } => {
                    self.walk_expr(cond, &scope);
                    self.walk_stmts(then, &scope);
                    self.walk_stmts(otherwise, &scope);
                }
                Stmt::While { cond, body } => {
                    self.walk_expr(cond, &scope);
                    self.walk_stmts(body, &scope);
                }
            }
        }
    }
}
