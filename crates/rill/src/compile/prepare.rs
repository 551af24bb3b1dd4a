//! Pre-lowering analysis: reference classification and body extraction.

use crate::ast::{CellBody, ParsedCell, Reference};
use crate::error::{Error, Result};
use crate::synth::Wrap;

/// Classify a cell's reference list into plain dependency names.
///
/// A reference carrying the view flag means the upstream rewrite was
/// skipped; that is a contract breach and fails lowering outright, before
/// any variable is created.
pub fn dependency_names(references: &[Reference]) -> Result<Vec<String>> {
    references
        .iter()
        .map(|reference| {
            if reference.view {
                Err(Error::ViewReference(reference.name.clone()))
            } else {
                Ok(reference.name.clone())
            }
        })
        .collect()
}

/// Slice the literal source substring for a cell's executable body and
/// decide its wrapping.
///
/// Blocks are used verbatim (an explicit `return` is the upstream
/// contract); bare expressions are wrapped so invocation returns their
/// value.
pub fn extract_body(cell: &ParsedCell) -> Result<(&str, Wrap)> {
    let (span, wrap) = match &cell.body {
        CellBody::Block(span) => (span, Wrap::Verbatim),
        CellBody::Expression(span) => (span, Wrap::Expression),
        CellBody::Import(_) => {
            return Err(Error::Parse("import cells have no executable body".into()));
        }
    };
    let text = cell
        .input
        .get(span.start..span.end)
        .ok_or_else(|| Error::Parse("body span exceeds cell source".into()))?;
    Ok((text, wrap))
}
