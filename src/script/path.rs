//! script::path
//!
//! `create path` expressions.
//!
//! ```text
//! create path (sling:Folder) /var/discovery(nt:folder mixin mix:title)/oak
//! ```
//!
//! An optional leading `(TYPE)` applies to every segment that does not name
//! its own. A segment may carry `(TYPE)`, `(TYPE mixin M1, M2)` or
//! `(mixin M1, M2)`.

use super::{split_list, syntax, ParseError};
use crate::engine::operation::Operation;

#[derive(Debug, Default, PartialEq, Eq)]
struct Segment {
    name: String,
    primary_type: Option<String>,
    mixins: Option<Vec<String>>,
}

/// One `CreateNode` per prefix of the expression, shortest first.
pub(super) fn create_path(line: usize, expr: &str) -> Result<Vec<Operation>, ParseError> {
    let (default_type, rest) = match expr.strip_prefix('(') {
        Some(inner) => {
            let (ty, rest) = inner
                .split_once(')')
                .ok_or_else(|| syntax(line, "unclosed '(' in default type"))?;
            let ty = ty.trim();
            if ty.is_empty() || ty.contains(char::is_whitespace) {
                return Err(syntax(line, "expected a single default type"));
            }
            (Some(ty.to_string()), rest.trim_start())
        }
        None => (None, expr),
    };

    let mut path = String::new();
    let mut ops = Vec::new();
    for segment in segments(line, rest)? {
        path.push('/');
        path.push_str(&segment.name);
        ops.push(Operation::CreateNode {
            path: path.clone(),
            primary_type: segment.primary_type.or_else(|| default_type.clone()),
            mixins: segment.mixins,
        });
    }
    Ok(ops)
}

fn segments(line: usize, expr: &str) -> Result<Vec<Segment>, ParseError> {
    if !expr.starts_with('/') {
        return Err(syntax(line, format!("path must start with '/': '{expr}'")));
    }

    let mut out = Vec::new();
    let mut rest = expr;
    while let Some(after) = rest.strip_prefix('/') {
        let end = after.find(|c| c == '/' || c == '(').unwrap_or(after.len());
        let name = after[..end].trim();
        if name.is_empty() {
            return Err(syntax(line, format!("empty segment in '{expr}'")));
        }
        let mut segment = Segment {
            name: name.to_string(),
            ..Segment::default()
        };

        rest = &after[end..];
        if let Some(inner) = rest.strip_prefix('(') {
            let (decl, tail) = inner
                .split_once(')')
                .ok_or_else(|| syntax(line, format!("unclosed '(' after segment '{name}'")))?;
            segment_decl(line, decl, &mut segment)?;
            rest = tail.trim_start();
        }
        out.push(segment);
    }

    if !rest.is_empty() {
        return Err(syntax(line, format!("unexpected '{rest}' in path")));
    }
    Ok(out)
}

fn segment_decl(line: usize, decl: &str, segment: &mut Segment) -> Result<(), ParseError> {
    let words: Vec<&str> = decl.split_whitespace().collect();
    let mixins = match words.as_slice() {
        [] => return Err(syntax(line, format!("empty '()' after '{}'", segment.name))),
        ["mixin", rest @ ..] => rest,
        [ty] => {
            segment.primary_type = Some(ty.to_string());
            return Ok(());
        }
        [ty, "mixin", rest @ ..] => {
            segment.primary_type = Some(ty.to_string());
            rest
        }
        _ => {
            return Err(syntax(
                line,
                format!("expected 'TYPE', 'TYPE mixin ...' or 'mixin ...' in '({decl})'"),
            ))
        }
    };
    segment.mixins = Some(split_list(line, &mixins.join(" "))?);
    Ok(())
}
