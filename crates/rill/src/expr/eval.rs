//! Async tree-walking evaluator for cell body programs.
//!
//! Expressions evaluate recursively; blocks run on an explicit frame stack
//! so that generator bodies can be paused at each `yield` and resumed on
//! the next pull.

use futures::future::BoxFuture;
use rustc_hash::FxHashMap;

use crate::error::{Error, Result};
use crate::value::Value;

use super::{BinaryOp, Expr, Program, Stmt, UnaryOp};

/// Binding environment for one invocation: parameter names plus `let`s.
pub type Env = FxHashMap<String, Value>;

/// Evaluate a single expression against an environment.
pub fn eval_expr<'a>(expr: &'a Expr, env: &'a Env) -> BoxFuture<'a, Result<Value>> {
    Box::pin(async move {
        match expr {
            Expr::Number(n) => Ok(Value::Number(*n)),
            Expr::Str(s) => Ok(Value::Str(s.clone())),
            Expr::Bool(b) => Ok(Value::Bool(*b)),
            Expr::Null => Ok(Value::Null),
            Expr::Ident(name) => env
                .get(name)
                .cloned()
                .ok_or_else(|| Error::Eval(format!("{} is not defined", name))),
            Expr::View(name) => Err(Error::Eval(format!(
                "view reference 'viewof {}' cannot be evaluated",
                name
            ))),
            Expr::List(items) => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    values.push(eval_expr(item, env).await?);
                }
                Ok(Value::List(values))
            }
            Expr::Unary { op, operand } => {
                let value = eval_expr(operand, env).await?;
                match op {
                    UnaryOp::Not => Ok(Value::Bool(!value.is_truthy())),
                    UnaryOp::Neg => match value {
                        Value::Number(n) => Ok(Value::Number(-n)),
                        other => {
                            Err(Error::Eval(format!("cannot negate a {}", other.type_name())))
                        }
                    },
                }
            }
            Expr::Binary { op, lhs, rhs } => {
                let left = eval_expr(lhs, env).await?;
                // Short-circuit operators return an operand value.
                match op {
                    BinaryOp::And if !left.is_truthy() => return Ok(left),
                    BinaryOp::And => return eval_expr(rhs, env).await,
                    BinaryOp::Or if left.is_truthy() => return Ok(left),
                    BinaryOp::Or => return eval_expr(rhs, env).await,
                    _ => {}
                }
                let right = eval_expr(rhs, env).await?;
                apply_binary(*op, left, right)
            }
            Expr::Cond { cond, then, otherwise } => {
                if eval_expr(cond, env).await?.is_truthy() {
                    eval_expr(then, env).await
                } else {
                    eval_expr(otherwise, env).await
                }
            }
            Expr::Await(operand) => {
                let value = eval_expr(operand, env).await?;
                tokio::task::yield_now().await;
                Ok(value)
            }
        }
    })
}

fn apply_binary(op: BinaryOp, lhs: Value, rhs: Value) -> Result<Value> {
    use BinaryOp::*;
    match op {
        Eq => Ok(Value::Bool(lhs == rhs)),
        Ne => Ok(Value::Bool(lhs != rhs)),
        Add => match (lhs, rhs) {
            (Value::Number(a), Value::Number(b)) => Ok(Value::Number(a + b)),
            (Value::List(mut a), Value::List(b)) => {
                a.extend(b);
                Ok(Value::List(a))
            }
            (Value::Str(a), b) => Ok(Value::Str(format!("{}{}", a, b))),
            (a, Value::Str(b)) => Ok(Value::Str(format!("{}{}", a, b))),
            (a, b) => Err(Error::Eval(format!(
                "cannot add {} and {}",
                a.type_name(),
                b.type_name()
            ))),
        },
        Sub | Mul | Div | Rem => match (lhs, rhs) {
            (Value::Number(a), Value::Number(b)) => Ok(Value::Number(match op {
                Sub => a - b,
                Mul => a * b,
                Div => a / b,
                _ => a % b,
            })),
            (a, b) => Err(Error::Eval(format!(
                "arithmetic requires numbers, got {} and {}",
                a.type_name(),
                b.type_name()
            ))),
        },
        Lt | Le | Gt | Ge => {
            let ordering = match (&lhs, &rhs) {
                (Value::Number(a), Value::Number(b)) => a.partial_cmp(b),
                (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
                _ => None,
            };
            let Some(ordering) = ordering else {
                return Err(Error::Eval(format!(
                    "cannot compare {} and {}",
                    lhs.type_name(),
                    rhs.type_name()
                )));
            };
            Ok(Value::Bool(match op {
                Lt => ordering.is_lt(),
                Le => ordering.is_le(),
                Gt => ordering.is_gt(),
                _ => ordering.is_ge(),
            }))
        }
        And | Or => unreachable!("short-circuit operators handled above"),
    }
}

enum Frame {
    Block { stmts: Vec<Stmt>, idx: usize },
    Loop { cond: Expr, body: Vec<Stmt>, idx: usize },
}

enum Control {
    Continue,
    Yield(Value),
    Return(Value),
    Done,
}

/// A running block body: executes statements one at a time, pausing at
/// each `yield`.
///
/// Runs against one flat environment: `let` rebinds its name for the
/// remainder of the run, even after the enclosing branch or loop frame
/// pops. Loop counters rely on this (`let i = i + 1` inside a `while`
/// body updates the `i` the condition reads). The free-reference analysis
/// in [`super::Program::free_references`] is lexical, so a name rebound
/// only inside a branch is still reported free.
pub struct BlockRun {
    frames: Vec<Frame>,
    env: Env,
}

impl BlockRun {
    pub fn new(program: &Program, env: Env) -> Self {
        Self {
            frames: vec![Frame::Block { stmts: program.stmts.clone(), idx: 0 }],
            env,
        }
    }

    /// Run to completion, returning the `return` value (or null when the
    /// block falls off the end without one).
    pub async fn run(mut self) -> Result<Value> {
        loop {
            match self.advance().await? {
                Control::Return(value) => return Ok(value),
                Control::Done => return Ok(Value::Null),
                Control::Continue | Control::Yield(_) => {}
            }
        }
    }

    /// Run until the next `yield`. `return` or the end of the block ends
    /// the sequence; the return value is not emitted.
    pub async fn next_yield(&mut self) -> Result<Option<Value>> {
        loop {
            match self.advance().await? {
                Control::Yield(value) => return Ok(Some(value)),
                Control::Return(_) | Control::Done => return Ok(None),
                Control::Continue => {}
            }
        }
    }

    async fn advance(&mut self) -> Result<Control> {
        enum Next {
            Pop,
            Stmt(Stmt),
            CheckCond(Expr),
        }

        let stmt = loop {
            let action = {
                let Some(frame) = self.frames.last_mut() else {
                    return Ok(Control::Done);
                };
                match frame {
                    Frame::Block { stmts, idx } => {
                        if *idx >= stmts.len() {
                            Next::Pop
                        } else {
                            let stmt = stmts[*idx].clone();
                            *idx += 1;
                            Next::Stmt(stmt)
                        }
                    }
                    Frame::Loop { cond, body, idx } => {
                        if *idx >= body.len() {
                            *idx = 0;
                        }
                        if *idx == 0 {
                            Next::CheckCond(cond.clone())
                        } else {
                            let stmt = body[*idx].clone();
                            *idx += 1;
                            Next::Stmt(stmt)
                        }
                    }
                }
            };
            match action {
                Next::Pop => {
                    self.frames.pop();
                }
                Next::Stmt(stmt) => break stmt,
                Next::CheckCond(cond) => {
                    if eval_expr(&cond, &self.env).await?.is_truthy() {
                        let Some(Frame::Loop { body, idx, .. }) = self.frames.last_mut() else {
                            return Err(Error::Eval("loop frame disappeared".into()));
                        };
                        if body.is_empty() {
                            // An empty body with a true condition would spin forever.
                            return Err(Error::Eval("while body is empty".into()));
                        }
                        let stmt = body[0].clone();
                        *idx = 1;
                        break stmt;
                    }
                    self.frames.pop();
                }
            }
        };

        self.exec(stmt).await
    }

    async fn exec(&mut self, stmt: Stmt) -> Result<Control> {
        match stmt {
            Stmt::Let { name, value } => {
                let value = eval_expr(&value, &self.env).await?;
                self.env.insert(name, value);
                Ok(Control::Continue)
            }
            Stmt::Expr(expr) => {
                eval_expr(&expr, &self.env).await?;
                Ok(Control::Continue)
            }
            Stmt::Return(expr) => {
                let value = eval_expr(&expr, &self.env).await?;
                self.frames.clear();
                Ok(Control::Return(value))
            }
            Stmt::Yield(expr) => {
                let value = eval_expr(&expr, &self.env).await?;
                Ok(Control::Yield(value))
            }
            Stmt::If { cond, then, otherwise } => {
                let branch = if eval_expr(&cond, &self.env).await?.is_truthy() {
                    then
                } else {
                    otherwise
                };
                if !branch.is_empty() {
                    self.frames.push(Frame::Block { stmts: branch, idx: 0 });
                }
                Ok(Control::Continue)
            }
            Stmt::While { cond, body } => {
                self.frames.push(Frame::Loop { cond, body, idx: 0 });
                Ok(Control::Continue)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::parser::{parse_block, parse_expression};

    async fn eval_str(src: &str, env: Env) -> Result<Value> {
        let expr = parse_expression(src)?;
        eval_expr(&expr, &env).await
    }

    #[tokio::test]
    async fn test_arithmetic() {
        let v = eval_str("1 + 2 * 3 - 4 / 2", Env::default()).await.unwrap();
        assert_eq!(v, Value::Number(5.0));
    }

    #[tokio::test]
    async fn test_environment_lookup() {
        let mut env = Env::default();
        env.insert("a".to_string(), Value::Number(41.0));
        let v = eval_str("a + 1", env).await.unwrap();
        assert_eq!(v, Value::Number(42.0));
    }

    #[tokio::test]
    async fn test_undefined_name() {
        let err = eval_str("missing + 1", Env::default()).await.unwrap_err();
        assert!(matches!(err, Error::Eval(_)));
    }

    #[tokio::test]
    async fn test_string_concat() {
        let v = eval_str(r#""n = " + 3"#, Env::default()).await.unwrap();
        assert_eq!(v, Value::Str("n = 3".into()));
    }

    #[tokio::test]
    async fn test_short_circuit_returns_operand() {
        let v = eval_str("0 || 7", Env::default()).await.unwrap();
        assert_eq!(v, Value::Number(7.0));
        // rhs of && is never evaluated when lhs is falsy
        let v = eval_str("false && missing", Env::default()).await.unwrap();
        assert_eq!(v, Value::Bool(false));
    }

    #[tokio::test]
    async fn test_await_passes_value_through() {
        let v = eval_str("await 5 + 1", Env::default()).await.unwrap();
        assert_eq!(v, Value::Number(6.0));
    }

    #[tokio::test]
    async fn test_block_run_to_completion() {
        let program = parse_block("{ let x = 2; let y = x * 3; return y + 1 }").unwrap();
        let v = BlockRun::new(&program, Env::default()).run().await.unwrap();
        assert_eq!(v, Value::Number(7.0));
    }

    #[tokio::test]
    async fn test_block_without_return_is_null() {
        let program = parse_block("{ let x = 2; x + 1 }").unwrap();
        let v = BlockRun::new(&program, Env::default()).run().await.unwrap();
        assert_eq!(v, Value::Null);
    }

    #[tokio::test]
    async fn test_yield_sequence() {
        let program = parse_block("{ let i = 0; while i < 3 { yield i; let i = i + 1 } }").unwrap();
        let mut run = BlockRun::new(&program, Env::default());
        let mut out = Vec::new();
        while let Some(v) = run.next_yield().await.unwrap() {
            out.push(v);
        }
        assert_eq!(
            out,
            vec![Value::Number(0.0), Value::Number(1.0), Value::Number(2.0)]
        );
        // Exhausted sequences stay exhausted.
        assert!(run.next_yield().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_return_ends_sequence_without_emitting() {
        let program = parse_block("{ yield 1; return 99; yield 2 }").unwrap();
        let mut run = BlockRun::new(&program, Env::default());
        assert_eq!(run.next_yield().await.unwrap(), Some(Value::Number(1.0)));
        assert_eq!(run.next_yield().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_let_in_branch_rebinds_for_rest_of_run() {
        let mut env = Env::default();
        env.insert("a".to_string(), Value::Number(1.0));
        let program = parse_block("{ if true { let a = 2 } return a }").unwrap();
        let v = BlockRun::new(&program, env).run().await.unwrap();
        assert_eq!(v, Value::Number(2.0));
    }

    #[tokio::test]
    async fn test_resume_after_yield_inside_nested_if() {
        let program = parse_block(
            "{ let i = 0; while i < 4 { if i % 2 == 0 { yield i } let i = i + 1 } }",
        )
        .unwrap();
        let mut run = BlockRun::new(&program, Env::default());
        let mut out = Vec::new();
        while let Some(v) = run.next_yield().await.unwrap() {
            out.push(v);
        }
        assert_eq!(out, vec![Value::Number(0.0), Value::Number(2.0)]);
    }

    #[tokio::test]
    async fn test_if_else_branches() {
        let program = parse_block("{ if 1 > 2 { return 1 } else { return 2 } }").unwrap();
        let v = BlockRun::new(&program, Env::default()).run().await.unwrap();
        assert_eq!(v, Value::Number(2.0));
    }
}
