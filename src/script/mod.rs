//! script
//!
//! Parser for repoinit scripts.
//!
//! # Architecture
//!
//! Scripts are line oriented. Each statement starts on its own line and
//! most fit on it; two statements own a block of following lines:
//!
//! - `register nodetypes` is followed by a `<<===` ... `===>>` block that is
//!   passed through verbatim, markers included
//! - `set ACL for ...` is followed by `allow`/`deny` lines and closed by `end`
//!
//! Blank lines and lines starting with `#` or `//` are ignored outside
//! definition blocks.
//!
//! Lists expand: `create service user a, b` yields one operation per id and
//! `create path /a/b` yields one operation per path prefix. The parser
//! checks statement shape only; names and paths are validated when a batch
//! is applied.
//!
//! # Example
//!
//! ```
//! use repoinit::engine::Operation;
//! use repoinit::script;
//!
//! let ops = script::parse("create service user svc1, svc2\ncreate path /content/site").unwrap();
//! assert_eq!(ops.len(), 4);
//! assert_eq!(ops[1], Operation::CreateServiceUser { id: "svc2".into(), path: None });
//! ```

mod path;

use thiserror::Error;

use crate::cnd::{END_MARKER, START_MARKER};
use crate::engine::operation::{AclEntry, Operation};
use crate::repo::AclAction;

/// Errors from script parsing. Line numbers are 1-based.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("line {line}: {message}")]
    Syntax { line: usize, message: String },

    #[error("line {line}: {what} is not terminated")]
    Unterminated { line: usize, what: &'static str },
}

impl ParseError {
    /// Line the error refers to.
    pub fn line(&self) -> usize {
        match self {
            ParseError::Syntax { line, .. } | ParseError::Unterminated { line, .. } => *line,
        }
    }
}

pub(crate) fn syntax(line: usize, message: impl Into<String>) -> ParseError {
    ParseError::Syntax {
        line,
        message: message.into(),
    }
}

/// Parse a whole script into operations, in script order.
pub fn parse(text: &str) -> Result<Vec<Operation>, ParseError> {
    Parser::new(text).script()
}

struct Parser<'a> {
    lines: Vec<&'a str>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            lines: text.lines().collect(),
            pos: 0,
        }
    }

    /// Next significant line, trimmed, with its number.
    fn next_line(&mut self) -> Option<(usize, &'a str)> {
        while let Some(&raw) = self.lines.get(self.pos) {
            self.pos += 1;
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with("//") {
                continue;
            }
            return Some((self.pos, line));
        }
        None
    }

    fn script(mut self) -> Result<Vec<Operation>, ParseError> {
        let mut ops = Vec::new();
        while let Some((number, line)) = self.next_line() {
            self.statement(number, line, &mut ops)?;
        }
        Ok(ops)
    }

    fn statement(
        &mut self,
        number: usize,
        line: &'a str,
        ops: &mut Vec<Operation>,
    ) -> Result<(), ParseError> {
        let words: Vec<&str> = line.split_whitespace().collect();
        match words.as_slice() {
            ["create", "service", "user", rest @ ..] => {
                ops.extend(create_principals(number, rest, true)?);
            }
            ["create", "user", rest @ ..] => {
                ops.extend(create_principals(number, rest, false)?);
            }
            ["delete", "service", "user", rest @ ..] => {
                ops.extend(
                    list(number, rest)?
                        .into_iter()
                        .map(|id| Operation::DeleteServiceUser { id }),
                );
            }
            ["delete", "user", rest @ ..] => {
                ops.extend(
                    list(number, rest)?
                        .into_iter()
                        .map(|id| Operation::DeleteUser { id }),
                );
            }
            ["enable", "service", "user", rest @ ..] | ["enable", "user", rest @ ..] => {
                ops.extend(
                    list(number, rest)?
                        .into_iter()
                        .map(|id| Operation::EnableUser { id }),
                );
            }
            ["disable", "service", "user", ..] => {
                ops.extend(disable(number, remainder(line, 3))?);
            }
            ["disable", "user", ..] => {
                ops.extend(disable(number, remainder(line, 2))?);
            }
            ["create", "path", ..] => {
                ops.extend(path::create_path(number, remainder(line, 2))?);
            }
            ["register", "namespace", ..] => {
                ops.push(namespace(number, remainder(line, 2))?);
            }
            ["register", "nodetypes"] => {
                ops.push(self.nodetypes(number)?);
            }
            ["add", "mixin", rest @ ..] => {
                let (mixins, paths) = split_at_keyword(number, rest, "to")?;
                ops.push(Operation::AddMixins { mixins, paths });
            }
            ["remove", "mixin", rest @ ..] => {
                let (mixins, paths) = split_at_keyword(number, rest, "from")?;
                ops.push(Operation::RemoveMixins { mixins, paths });
            }
            ["set", acl, "for", rest @ ..] if acl.eq_ignore_ascii_case("acl") => {
                ops.push(self.acl(number, rest)?);
            }
            _ => return Err(syntax(number, format!("unrecognized statement '{line}'"))),
        }
        Ok(())
    }

    /// The marker-delimited block after `register nodetypes`.
    fn nodetypes(&mut self, number: usize) -> Result<Operation, ParseError> {
        let mut text = String::new();
        let mut opened = false;

        while let Some(&raw) = self.lines.get(self.pos) {
            self.pos += 1;
            let trimmed = raw.trim();
            if !opened {
                if trimmed.is_empty() {
                    continue;
                }
                if trimmed != START_MARKER {
                    return Err(syntax(
                        self.pos,
                        format!("expected '{START_MARKER}' after 'register nodetypes'"),
                    ));
                }
                opened = true;
            }
            text.push_str(raw);
            text.push('\n');
            if trimmed == END_MARKER {
                return Ok(Operation::RegisterNodeTypes { cnd_text: text });
            }
        }

        Err(ParseError::Unterminated {
            line: number,
            what: "node type block",
        })
    }

    /// `allow`/`deny` lines up to `end`.
    fn acl(&mut self, number: usize, principals: &[&str]) -> Result<Operation, ParseError> {
        let principals = list(number, principals)?;
        let mut entries = Vec::new();

        loop {
            let Some((line_no, line)) = self.next_line() else {
                return Err(ParseError::Unterminated {
                    line: number,
                    what: "set ACL block",
                });
            };
            let words: Vec<&str> = line.split_whitespace().collect();
            let (action, rest) = match words.as_slice() {
                ["end"] => break,
                ["allow", rest @ ..] => (AclAction::Allow, rest),
                ["deny", rest @ ..] => (AclAction::Deny, rest),
                _ => {
                    return Err(syntax(
                        line_no,
                        format!("expected 'allow', 'deny' or 'end', found '{line}'"),
                    ))
                }
            };
            let (privileges, paths) = split_at_keyword(line_no, rest, "on")?;
            entries.push(AclEntry {
                action,
                privileges,
                paths,
            });
        }

        Ok(Operation::SetAcl {
            principals,
            entries,
        })
    }
}

/// `<ids> [with password P] [with path P]`
fn create_principals(
    line: usize,
    words: &[&str],
    service: bool,
) -> Result<Vec<Operation>, ParseError> {
    let split = words.iter().position(|w| *w == "with").unwrap_or(words.len());
    let ids = list(line, &words[..split])?;

    let mut path = None;
    let mut password = None;
    let mut options = &words[split..];
    while !options.is_empty() {
        match options {
            ["with", "path", value, rest @ ..] if path.is_none() => {
                path = Some(value.to_string());
                options = rest;
            }
            ["with", "password", value, rest @ ..] if !service && password.is_none() => {
                password = Some(value.to_string());
                options = rest;
            }
            _ => {
                return Err(syntax(
                    line,
                    format!("unexpected '{}'", options.join(" ")),
                ))
            }
        }
    }

    let ops = ids
        .into_iter()
        .map(|id| {
            if service {
                Operation::CreateServiceUser {
                    id,
                    path: path.clone(),
                }
            } else {
                Operation::CreateUser {
                    id,
                    password: password.clone(),
                    path: path.clone(),
                }
            }
        })
        .collect();
    Ok(ops)
}

/// `<ids> [: "reason"]`
fn disable(line: usize, rest: &str) -> Result<Vec<Operation>, ParseError> {
    let (ids, reason) = match rest.split_once(':') {
        Some((ids, reason)) => (ids, unquote(line, reason.trim())?),
        None => (rest, None),
    };
    let words: Vec<&str> = ids.split_whitespace().collect();
    Ok(list(line, &words)?
        .into_iter()
        .map(|id| Operation::DisableUser {
            id,
            reason: reason.clone(),
        })
        .collect())
}

fn unquote(line: usize, raw: &str) -> Result<Option<String>, ParseError> {
    let text = match raw.strip_prefix('"') {
        Some(inner) => inner
            .strip_suffix('"')
            .ok_or_else(|| syntax(line, "unterminated quoted string"))?,
        None => raw,
    };
    Ok((!text.is_empty()).then(|| text.to_string()))
}

/// `(prefix) uri`
fn namespace(line: usize, rest: &str) -> Result<Operation, ParseError> {
    let inner = rest
        .strip_prefix('(')
        .ok_or_else(|| syntax(line, "expected '(prefix)' after 'register namespace'"))?;
    let (prefix, uri) = inner
        .split_once(')')
        .ok_or_else(|| syntax(line, "unclosed '(' in namespace prefix"))?;
    let (prefix, uri) = (prefix.trim(), uri.trim());
    if uri.is_empty() || uri.contains(char::is_whitespace) {
        return Err(syntax(line, "expected a single namespace uri"));
    }
    Ok(Operation::RegisterNamespace {
        prefix: prefix.to_string(),
        uri: uri.to_string(),
    })
}

/// Split `a, b KEYWORD c, d` into its two lists.
fn split_at_keyword(
    line: usize,
    words: &[&str],
    keyword: &str,
) -> Result<(Vec<String>, Vec<String>), ParseError> {
    let at = words
        .iter()
        .position(|w| *w == keyword)
        .ok_or_else(|| syntax(line, format!("expected '{keyword}'")))?;
    Ok((list(line, &words[..at])?, list(line, &words[at + 1..])?))
}

/// A comma separated list spread over whitespace separated words.
pub(crate) fn list(line: usize, words: &[&str]) -> Result<Vec<String>, ParseError> {
    split_list(line, &words.join(" "))
}

pub(crate) fn split_list(line: usize, text: &str) -> Result<Vec<String>, ParseError> {
    if text.trim().is_empty() {
        return Err(syntax(line, "expected a list"));
    }
    text.split(',')
        .map(|item| {
            let item = item.trim();
            if item.is_empty() {
                Err(syntax(line, "empty item in list"))
            } else if item.contains(char::is_whitespace) {
                Err(syntax(line, format!("missing ',' in '{item}'")))
            } else {
                Ok(item.to_string())
            }
        })
        .collect()
}

/// `line` with its first `words` words removed.
fn remainder(line: &str, words: usize) -> &str {
    let mut rest = line.trim_start();
    for _ in 0..words {
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        rest = rest[end..].trim_start();
    }
    rest.trim_end()
}
