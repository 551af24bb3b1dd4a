//! Front end: turns raw cell/module source text into the parsed
//! representation consumed by lowering.
//!
//! A cell is one of:
//!
//! ```text
//! import { a as b, c } with { x as y } from "path"
//! viewof name = <body>
//! name = <body>
//! <body>
//! ```
//!
//! where `<body>` is a bare expression or a `{ ... }` block. The parser
//! decides the suspend/iterate flags once, from the body's `await`/`yield`
//! use, and computes the reference list as the body's free variables;
//! everything downstream trusts them.

use crate::ast::{
    CellBody, CellName, ImportDecl, ImportSpecifier, Injection, ParsedCell, ParsedModule, Span,
};
use crate::error::{Error, Result};
use crate::expr::lexer::{Tok, Token, lex};
use crate::expr::parser::{parse_block_tokens, parse_expression_tokens};
use crate::expr::{expr_free_references, expr_uses_await};

/// Parse one cell from source text.
pub fn parse_cell(text: &str) -> Result<ParsedCell> {
    let tokens = lex(text)?;
    if tokens.is_empty() {
        return Err(Error::Parse("empty cell".into()));
    }
    parse_cell_tokens(text, &tokens)
}

/// Parse a module: cells separated by one or more blank lines. Blocks must
/// not contain blank lines. Comment-only chunks are skipped.
pub fn parse_module(text: &str) -> Result<ParsedModule> {
    let mut cells = Vec::new();
    for chunk in split_cells(text) {
        let tokens = lex(chunk)?;
        if tokens.is_empty() {
            continue;
        }
        cells.push(parse_cell_tokens(chunk, &tokens)?);
    }
    Ok(ParsedModule { cells })
}

fn parse_cell_tokens(text: &str, tokens: &[Token]) -> Result<ParsedCell> {
    if tokens[0].tok == Tok::Import {
        return parse_import(text, tokens);
    }

    let (name, body_from) = match tokens {
        [first, second, third, ..]
            if first.tok == Tok::Viewof && matches!(third.tok, Tok::Assign) =>
        {
            match &second.tok {
                Tok::Ident(name) => (Some(CellName::View(name.clone())), 3),
                other => {
                    return Err(Error::Parse(format!(
                        "expected name after viewof, found {:?}",
                        other
                    )));
                }
            }
        }
        [first, second, ..] if matches!(second.tok, Tok::Assign) => match &first.tok {
            Tok::Ident(name) => (Some(CellName::Plain(name.clone())), 2),
            other => {
                return Err(Error::Parse(format!("cannot assign to {:?}", other)));
            }
        },
        _ => (None, 0),
    };

    let body_tokens = &tokens[body_from..];
    let (Some(first), Some(last)) = (body_tokens.first(), body_tokens.last()) else {
        return Err(Error::Parse("missing cell body".into()));
    };
    let span = Span::new(first.span.start, last.span.end);

    if first.tok == Tok::LBrace {
        let program = parse_block_tokens(body_tokens)?;
        Ok(ParsedCell {
            name,
            body: CellBody::Block(span),
            suspend: program.uses_await(),
            iterate: program.uses_yield(),
            references: program.free_references(),
            input: text.to_string(),
        })
    } else {
        let expr = parse_expression_tokens(body_tokens)?;
        Ok(ParsedCell {
            name,
            body: CellBody::Expression(span),
            suspend: expr_uses_await(&expr),
            iterate: false,
            references: expr_free_references(&expr),
            input: text.to_string(),
        })
    }
}

fn parse_import(text: &str, tokens: &[Token]) -> Result<ParsedCell> {
    let mut pos = 1; // past `import`
    let specifiers: Vec<ImportSpecifier> = bindings(tokens, &mut pos)?
        .into_iter()
        .map(|(name, alias)| ImportSpecifier { name, alias })
        .collect();

    let injections: Vec<Injection> = if matches!(tokens.get(pos).map(|t| &t.tok), Some(Tok::With))
    {
        pos += 1;
        bindings(tokens, &mut pos)?
            .into_iter()
            .map(|(name, alias)| Injection { name, alias })
            .collect()
    } else {
        Vec::new()
    };

    match tokens.get(pos).map(|t| &t.tok) {
        Some(Tok::From) => pos += 1,
        other => {
            return Err(Error::Parse(format!("expected from, found {:?}", other)));
        }
    }
    let source = match tokens.get(pos).map(|t| &t.tok) {
        Some(Tok::Str(source)) => source.clone(),
        other => {
            return Err(Error::Parse(format!("expected import path string, found {:?}", other)));
        }
    };
    pos += 1;
    if pos != tokens.len() {
        return Err(Error::Parse("unexpected tokens after import declaration".into()));
    }

    Ok(ParsedCell {
        name: None,
        body: CellBody::Import(ImportDecl { specifiers, injections, source }),
        suspend: false,
        iterate: false,
        references: Vec::new(),
        input: text.to_string(),
    })
}

/// Parse `{ name [as alias], ... }`, returning (name, alias) pairs.
fn bindings(tokens: &[Token], pos: &mut usize) -> Result<Vec<(String, String)>> {
    match tokens.get(*pos).map(|t| &t.tok) {
        Some(Tok::LBrace) => *pos += 1,
        other => return Err(Error::Parse(format!("expected {{, found {:?}", other))),
    }
    let mut out = Vec::new();
    loop {
        match tokens.get(*pos).map(|t| &t.tok) {
            Some(Tok::RBrace) => {
                *pos += 1;
                return Ok(out);
            }
            Some(Tok::Ident(name)) => {
                let name = name.clone();
                *pos += 1;
                let alias = if matches!(tokens.get(*pos).map(|t| &t.tok), Some(Tok::As)) {
                    *pos += 1;
                    match tokens.get(*pos).map(|t| &t.tok) {
                        Some(Tok::Ident(alias)) => {
                            let alias = alias.clone();
                            *pos += 1;
                            alias
                        }
                        other => {
                            return Err(Error::Parse(format!(
                                "expected alias after as, found {:?}",
                                other
                            )));
                        }
                    }
                } else {
                    name.clone()
                };
                out.push((name, alias));
                if matches!(tokens.get(*pos).map(|t| &t.tok), Some(Tok::Comma)) {
                    *pos += 1;
                }
            }
            other => {
                return Err(Error::Parse(format!("expected import name, found {:?}", other)));
            }
        }
    }
}

fn split_cells(text: &str) -> Vec<&str> {
    let mut chunks = Vec::new();
    let mut pos = 0;
    let mut chunk_start: Option<usize> = None;
    let mut chunk_end = 0;
    for piece in text.split_inclusive('\n') {
        if piece.trim().is_empty() {
            if let Some(start) = chunk_start.take() {
                chunks.push(&text[start..chunk_end]);
            }
        } else {
            if chunk_start.is_none() {
                chunk_start = Some(pos);
            }
            chunk_end = pos + piece.trim_end().len();
        }
        pos += piece.len();
    }
    if let Some(start) = chunk_start {
        chunks.push(&text[start..chunk_end]);
    }
    chunks
}
