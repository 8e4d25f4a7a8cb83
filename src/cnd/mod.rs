//! cnd
//!
//! Compact node type definitions embedded in repoinit scripts.
//!
//! # Architecture
//!
//! A `register nodetypes` directive carries a block delimited by marker
//! lines:
//!
//! ```text
//! register nodetypes
//! <<===
//! <ns='http://example.com/ns'>
//! [ns:foo] > nt:unstructured
//! ===>>
//! ```
//!
//! [`extract_block`] returns the text between the markers, and [`parse`]
//! turns it into namespace declarations and [`NodeTypeDefinition`]s. The
//! grammar covered is the subset scripts use in practice:
//!
//! - `<prefix = 'uri'>` namespace declarations
//! - `[prefix:name] > super1, super2` type clauses, followed by any of the
//!   attributes `mixin`, `abstract`, `orderable`, `query`, `noquery` and
//!   `primaryitem <name>`
//! - `- name (TYPE) attrs...` property and `+ name (TYPE) = DEFAULT attrs...`
//!   child node definitions attached to the preceding type
//! - `//` and `/* */` comments
//!
//! # Example
//!
//! ```
//! use repoinit::cnd;
//!
//! let text = "register nodetypes\n<<===\n<ns='uri'>\n[ns:foo] > nt:unstructured\n===>>\n";
//! let block = cnd::extract_block(text).unwrap();
//! let doc = cnd::parse(&block).unwrap();
//!
//! assert_eq!(doc.namespaces[0].prefix, "ns");
//! assert_eq!(doc.node_types[0].name.as_str(), "ns:foo");
//! ```

mod lexer;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::types::QualifiedName;
use crate::repo::{ItemDefinition, NodeTypeDefinition};
use lexer::{Token, TokenKind};

/// Line opening an embedded definition block.
pub const START_MARKER: &str = "<<===";

/// Line closing an embedded definition block.
pub const END_MARKER: &str = "===>>";

/// Errors from block extraction and parsing.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CndError {
    #[error("missing '{START_MARKER}' line before node type definitions")]
    MissingStartMarker,

    #[error("missing '{END_MARKER}' line after node type definitions")]
    MissingEndMarker,

    #[error("node type definitions are empty")]
    Empty,

    #[error("line {line}: {message}")]
    Syntax { line: usize, message: String },
}

impl CndError {
    fn syntax(line: usize, message: impl Into<String>) -> Self {
        CndError::Syntax {
            line,
            message: message.into(),
        }
    }
}

/// A `<prefix = 'uri'>` declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamespaceDecl {
    pub prefix: String,
    pub uri: String,
}

/// Parsed content of a definition block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CndDocument {
    pub namespaces: Vec<NamespaceDecl>,
    pub node_types: Vec<NodeTypeDefinition>,
}

/// Return the text strictly between the start and end marker lines.
///
/// Markers must stand on their own line; surrounding whitespace is
/// ignored.
pub fn extract_block(text: &str) -> Result<String, CndError> {
    let mut lines = text.lines();
    if !lines.by_ref().any(|l| l.trim() == START_MARKER) {
        return Err(CndError::MissingStartMarker);
    }

    let mut body = Vec::new();
    for line in lines {
        if line.trim() == END_MARKER {
            return Ok(body.join("\n"));
        }
        body.push(line);
    }
    Err(CndError::MissingEndMarker)
}

/// Parse the body of a definition block.
pub fn parse(block: &str) -> Result<CndDocument, CndError> {
    let tokens = lexer::tokenize(block)?;
    let doc = Parser { tokens, pos: 0 }.document()?;
    if doc.namespaces.is_empty() && doc.node_types.is_empty() {
        return Err(CndError::Empty);
    }
    Ok(doc)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&TokenKind> {
        self.tokens.get(self.pos).map(|t| &t.kind)
    }

    fn peek_at(&self, offset: usize) -> Option<&TokenKind> {
        self.tokens.get(self.pos + offset).map(|t| &t.kind)
    }

    /// Line of the current token, or of the last one at end of input.
    fn line(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map(|t| t.line)
            .unwrap_or(1)
    }

    fn check(&self, kind: &TokenKind) -> bool {
        self.peek() == Some(kind)
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn unexpected(&self, expected: &str) -> CndError {
        let found = self
            .peek()
            .map(TokenKind::describe)
            .unwrap_or_else(|| "end of input".to_string());
        CndError::syntax(self.line(), format!("expected {expected}, found {found}"))
    }

    fn expect(&mut self, kind: TokenKind) -> Result<(), CndError> {
        if self.eat(&kind) {
            Ok(())
        } else {
            Err(self.unexpected(&kind.describe()))
        }
    }

    fn expect_word(&mut self, what: &str) -> Result<String, CndError> {
        match self.peek() {
            Some(TokenKind::Word(w)) => {
                let w = w.clone();
                self.pos += 1;
                Ok(w)
            }
            _ => Err(self.unexpected(what)),
        }
    }

    fn expect_name(&mut self, what: &str) -> Result<QualifiedName, CndError> {
        let line = self.line();
        let raw = self.expect_word(what)?;
        QualifiedName::new(raw).map_err(|e| CndError::syntax(line, e.to_string()))
    }

    fn document(mut self) -> Result<CndDocument, CndError> {
        let mut doc = CndDocument::default();
        while let Some(kind) = self.peek() {
            match kind {
                TokenKind::LAngle => doc.namespaces.push(self.namespace()?),
                TokenKind::LBracket => doc.node_types.push(self.node_type()?),
                _ => return Err(self.unexpected("'<' or '['")),
            }
        }
        Ok(doc)
    }

    fn namespace(&mut self) -> Result<NamespaceDecl, CndError> {
        self.expect(TokenKind::LAngle)?;
        let prefix = self.expect_word("namespace prefix")?;
        self.expect(TokenKind::Eq)?;
        let line = self.line();
        let uri = match self.peek() {
            Some(TokenKind::Quoted(uri)) | Some(TokenKind::Word(uri)) => uri.clone(),
            _ => return Err(self.unexpected("namespace uri")),
        };
        self.pos += 1;
        self.expect(TokenKind::RAngle)?;
        if uri.is_empty() {
            return Err(CndError::syntax(line, "namespace uri cannot be empty"));
        }
        Ok(NamespaceDecl { prefix, uri })
    }

    fn node_type(&mut self) -> Result<NodeTypeDefinition, CndError> {
        self.expect(TokenKind::LBracket)?;
        let name = self.expect_name("node type name")?;
        self.expect(TokenKind::RBracket)?;

        let mut supertypes = Vec::new();
        if self.eat(&TokenKind::RAngle) {
            supertypes.push(self.expect_name("supertype")?);
            while self.eat(&TokenKind::Comma) {
                supertypes.push(self.expect_name("supertype")?);
            }
        }

        let mut def = NodeTypeDefinition::primary(name, supertypes);
        while let Some(TokenKind::Word(attr)) = self.peek() {
            let line = self.line();
            match attr.to_ascii_lowercase().as_str() {
                "mixin" | "mix" | "m" => def.mixin = true,
                "abstract" | "abs" | "a" => def.is_abstract = true,
                "orderable" | "ord" | "o" => def.orderable = true,
                "query" | "q" | "noquery" | "nq" => {}
                "primaryitem" | "!" => {
                    self.pos += 1;
                    self.expect_word("primary item name")?;
                    continue;
                }
                other => {
                    return Err(CndError::syntax(
                        line,
                        format!("unknown node type attribute '{other}'"),
                    ))
                }
            }
            self.pos += 1;
        }

        loop {
            if self.eat(&TokenKind::Minus) {
                def.properties.push(self.item("property name")?);
            } else if self.eat(&TokenKind::Plus) {
                def.children.push(self.item("child node name")?);
            } else {
                break;
            }
        }

        Ok(def)
    }

    fn item(&mut self, what: &str) -> Result<ItemDefinition, CndError> {
        let name = self.expect_word(what)?;

        let mut required_type = None;
        if self.eat(&TokenKind::LParen) {
            let mut types = vec![self.expect_word("item type")?];
            while self.eat(&TokenKind::Comma) {
                types.push(self.expect_word("item type")?);
            }
            self.expect(TokenKind::RParen)?;
            required_type = Some(types.join(", "));
        }

        let mut attributes = Vec::new();
        loop {
            match self.peek() {
                Some(TokenKind::Word(w)) => {
                    attributes.push(w.clone());
                    self.pos += 1;
                }
                Some(TokenKind::Eq) => {
                    attributes.push("=".to_string());
                    self.pos += 1;
                }
                Some(TokenKind::Quoted(q)) => {
                    attributes.push(format!("'{q}'"));
                    self.pos += 1;
                }
                Some(TokenKind::Comma) => {
                    self.pos += 1;
                }
                // Value constraint, as opposed to a namespace declaration.
                Some(TokenKind::LAngle)
                    if matches!(self.peek_at(1), Some(TokenKind::Quoted(_))) =>
                {
                    attributes.push("<".to_string());
                    self.pos += 1;
                }
                _ => break,
            }
        }

        Ok(ItemDefinition {
            name,
            required_type,
            attributes,
        })
    }
}
