//! Pratt parser for cell body expressions and blocks.

use crate::error::{Error, Result};

use super::lexer::{Tok, Token, lex};
use super::{BinaryOp, Expr, Program, Stmt, UnaryOp};

/// Parse a complete expression from source text.
pub fn parse_expression(src: &str) -> Result<Expr> {
    let tokens = lex(src)?;
    parse_expression_tokens(&tokens)
}

/// Parse a `{ ... }` block from source text.
pub fn parse_block(src: &str) -> Result<Program> {
    let tokens = lex(src)?;
    parse_block_tokens(&tokens)
}

/// Parse a complete expression from a token slice.
pub fn parse_expression_tokens(tokens: &[Token]) -> Result<Expr> {
    let mut parser = Parser::new(tokens);
    let expr = parser.expression()?;
    parser.finish()?;
    Ok(expr)
}

/// Parse a braced block from a token slice.
pub fn parse_block_tokens(tokens: &[Token]) -> Result<Program> {
    let mut parser = Parser::new(tokens);
    let stmts = parser.braced_stmts()?;
    parser.finish()?;
    Ok(Program { stmts })
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> Option<&Tok> {
        self.tokens.get(self.pos).map(|t| &t.tok)
    }

    fn bump(&mut self) -> Result<Tok> {
        let token = self
            .tokens
            .get(self.pos)
            .ok_or_else(|| Error::Parse("unexpected end of input".into()))?;
        self.pos += 1;
        Ok(token.tok.clone())
    }

    fn eat(&mut self, tok: &Tok) -> bool {
        if self.peek() == Some(tok) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, tok: Tok) -> Result<()> {
        match self.peek() {
            Some(found) if *found == tok => {
                self.pos += 1;
                Ok(())
            }
            Some(found) => Err(Error::Parse(format!("expected {:?}, found {:?}", tok, found))),
            None => Err(Error::Parse(format!("expected {:?}, found end of input", tok))),
        }
    }

    fn finish(&self) -> Result<()> {
        match self.tokens.get(self.pos) {
            None => Ok(()),
            Some(token) => Err(Error::Parse(format!("unexpected trailing {:?}", token.tok))),
        }
    }

    // --- expressions ---

    fn expression(&mut self) -> Result<Expr> {
        let cond = self.binary(0)?;
        if self.eat(&Tok::Question) {
            let then = self.expression()?;
            self.expect(Tok::Colon)?;
            let otherwise = self.expression()?;
            return Ok(Expr::Cond {
                cond: Box::new(cond),
                then: Box::new(then),
                otherwise: Box::new(otherwise),
            });
        }
        Ok(cond)
    }

    fn binary(&mut self, min_bp: u8) -> Result<Expr> {
        let mut lhs = self.unary()?;
        while let Some(tok) = self.peek() {
            let Some((op, bp)) = binary_op(tok) else { break };
            if bp < min_bp {
                break;
            }
            self.pos += 1;
            let rhs = self.binary(bp + 1)?;
            lhs = Expr::Binary { op, lhs: Box::new(lhs), rhs: Box::new(rhs) };
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> Result<Expr> {
        match self.peek() {
            Some(Tok::Minus) => {
                self.pos += 1;
                Ok(Expr::Unary { op: UnaryOp::Neg, operand: Box::new(self.unary()?) })
            }
            Some(Tok::Not) => {
                self.pos += 1;
                Ok(Expr::Unary { op: UnaryOp::Not, operand: Box::new(self.unary()?) })
            }
            Some(Tok::Await) => {
                self.pos += 1;
                Ok(Expr::Await(Box::new(self.unary()?)))
            }
            _ => self.primary(),
        }
    }

    fn primary(&mut self) -> Result<Expr> {
        match self.bump()? {
            Tok::Number(n) => Ok(Expr::Number(n)),
            Tok::Str(s) => Ok(Expr::Str(s)),
            Tok::True => Ok(Expr::Bool(true)),
            Tok::False => Ok(Expr::Bool(false)),
            Tok::Null => Ok(Expr::Null),
            Tok::Ident(name) => Ok(Expr::Ident(name)),
            Tok::Viewof => match self.bump()? {
                Tok::Ident(name) => Ok(Expr::View(name)),
                other => Err(Error::Parse(format!("expected name after viewof, found {:?}", other))),
            },
            Tok::LParen => {
                let inner = self.expression()?;
                self.expect(Tok::RParen)?;
                Ok(inner)
            }
            Tok::LBracket => {
                let mut items = Vec::new();
                if !self.eat(&Tok::RBracket) {
                    loop {
                        items.push(self.expression()?);
                        if self.eat(&Tok::RBracket) {
                            break;
                        }
                        self.expect(Tok::Comma)?;
                        // Trailing comma before the closing bracket.
                        if self.eat(&Tok::RBracket) {
                            break;
                        }
                    }
                }
                Ok(Expr::List(items))
            }
            other => Err(Error::Parse(format!("unexpected {:?} in expression", other))),
        }
    }

    // --- statements ---

    fn braced_stmts(&mut self) -> Result<Vec<Stmt>> {
        self.expect(Tok::LBrace)?;
        let mut stmts = Vec::new();
        while !self.eat(&Tok::RBrace) {
            stmts.push(self.statement()?);
        }
        Ok(stmts)
    }

    fn statement(&mut self) -> Result<Stmt> {
        let stmt = match self.peek() {
            Some(Tok::Let) => {
                self.pos += 1;
                let name = match self.bump()? {
                    Tok::Ident(name) => name,
                    other => {
                        return Err(Error::Parse(format!("expected name after let, found {:?}", other)));
                    }
                };
                self.expect(Tok::Assign)?;
                Stmt::Let { name, value: self.expression()? }
            }
            Some(Tok::Return) => {
                self.pos += 1;
                Stmt::Return(self.expression()?)
            }
            Some(Tok::Yield) => {
                self.pos += 1;
                Stmt::Yield(self.expression()?)
            }
            Some(Tok::If) => {
                self.pos += 1;
                return self.if_statement();
            }
            Some(Tok::While) => {
                self.pos += 1;
                let cond = self.expression()?;
                let body = self.braced_stmts()?;
                return Ok(Stmt::While { cond, body });
            }
            _ => Stmt::Expr(self.expression()?),
        };
        // Semicolons are accepted but not required.
        self.eat(&Tok::Semi);
        Ok(stmt)
    }

    fn if_statement(&mut self) -> Result<Stmt> {
        let cond = self.expression()?;
        let then = self.braced_stmts()?;
        let otherwise = if self.eat(&Tok::Else) {
            if self.eat(&Tok::If) {
                vec![self.if_statement()?]
            } else {
                self.braced_stmts()?
            }
        } else {
            Vec::new()
        };
        Ok(Stmt::If { cond, then, otherwise })
    }
}

fn binary_op(tok: &Tok) -> Option<(BinaryOp, u8)> {
    Some(match tok {
        Tok::OrOr => (BinaryOp::Or, 1),
        Tok::AndAnd => (BinaryOp::And, 2),
        Tok::EqEq => (BinaryOp::Eq, 3),
        Tok::NotEq => (BinaryOp::Ne, 3),
        Tok::Lt => (BinaryOp::Lt, 4),
        Tok::Le => (BinaryOp::Le, 4),
        Tok::Gt => (BinaryOp::Gt, 4),
        Tok::Ge => (BinaryOp::Ge, 4),
        Tok::Plus => (BinaryOp::Add, 5),
        Tok::Minus => (BinaryOp::Sub, 5),
        Tok::Star => (BinaryOp::Mul, 6),
        Tok::Slash => (BinaryOp::Div, 6),
        Tok::Percent => (BinaryOp::Rem, 6),
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_precedence() {
        let expr = parse_expression("1 + 2 * 3").unwrap();
        assert_eq!(
            expr,
            Expr::Binary {
                op: BinaryOp::Add,
                lhs: Box::new(Expr::Number(1.0)),
                rhs: Box::new(Expr::Binary {
                    op: BinaryOp::Mul,
                    lhs: Box::new(Expr::Number(2.0)),
                    rhs: Box::new(Expr::Number(3.0)),
                }),
            }
        );
    }

    #[test]
    fn test_parens_override_precedence() {
        let expr = parse_expression("(1 + 2) * 3").unwrap();
        assert!(matches!(expr, Expr::Binary { op: BinaryOp::Mul, .. }));
    }

    #[test]
    fn test_ternary_right_associative() {
        let expr = parse_expression("a ? 1 : b ? 2 : 3").unwrap();
        let Expr::Cond { otherwise, .. } = expr else { panic!("expected ternary") };
        assert!(matches!(*otherwise, Expr::Cond { .. }));
    }

    #[test]
    fn test_block_statements() {
        let program = parse_block("{ let x = 1; if x > 0 { return x } return 0 }").unwrap();
        assert_eq!(program.stmts.len(), 3);
        assert!(matches!(program.stmts[1], Stmt::If { .. }));
    }

    #[test]
    fn test_else_if_chain() {
        let program = parse_block("{ if a { return 1 } else if b { return 2 } else { return 3 } }")
            .unwrap();
        let Stmt::If { otherwise, .. } = &program.stmts[0] else { panic!("expected if") };
        assert!(matches!(otherwise[0], Stmt::If { .. }));
    }

    #[test]
    fn test_await_parses_as_prefix() {
        let expr = parse_expression("await a + 1").unwrap();
        // await binds tighter than +, matching unary operators.
        assert!(matches!(expr, Expr::Binary { op: BinaryOp::Add, .. }));
    }

    #[test]
    fn test_trailing_tokens_rejected() {
        assert!(parse_expression("1 2").is_err());
    }

    #[test]
    fn test_list_literal() {
        let expr = parse_expression("[1, 2, 3,]").unwrap();
        assert!(matches!(expr, Expr::List(ref items) if items.len() == 3));
    }
}
