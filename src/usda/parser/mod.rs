//! Recursive-descent usda parser producing a [`Layer`].
//!
//! The token stream is materialized up front so statements can be
//! rescanned during error recovery. A failing statement is recorded as a
//! diagnostic and parsing resumes at the next statement; the first
//! failure is returned with up to `max_diagnostics` follow-ups attached.

mod hierarchy;
mod metadata;
mod value;

use std::ops::Range;

use logos::Logos;

use super::token::{unquote, LineIndex, Tok};
use crate::sdf::{Layer, PrimParent};
use crate::util::{Error, Limits, Result, ResultExt, SyntaxError, Warnings};

/// Major version accepted in the `#usda` header.
pub const USDA_MAJOR_VERSION: u32 = 1;

/// Parse usda text into a layer.
///
/// Non-fatal findings (unknown metadata keys) are pushed onto `warnings`.
pub fn parse_layer(source: &str, identifier: &str, limits: &Limits, warnings: &mut Warnings) -> Result<Layer> {
    let source = source.strip_prefix('\u{feff}').unwrap_or(source);
    check_header(source)?;
    let mut parser = Parser::new(source, limits)?;
    let result = parser.parse(identifier);
    warnings.extend(std::mem::take(&mut parser.warnings));
    result
}

/// Validate the `#usda MAJOR.MINOR` header. Only the major version is checked.
pub fn check_header(source: &str) -> Result<()> {
    let text = source.trim_start();
    let rest = text
        .strip_prefix("#usda")
        .ok_or_else(|| Error::BadMagic("expected `#usda` header".into()))?;
    let version = rest.lines().next().unwrap_or("").trim();
    let major = version
        .split('.')
        .next()
        .and_then(|m| m.parse::<u32>().ok())
        .ok_or_else(|| Error::UnsupportedVersion(format!("malformed usda version `{version}`")))?;
    if major != USDA_MAJOR_VERSION {
        return Err(Error::UnsupportedVersion(format!("usda {version}")));
    }
    Ok(())
}

/// True if `data` looks like usda text.
pub fn is_usda(data: &[u8]) -> bool {
    let data = data.strip_prefix(b"\xef\xbb\xbf").unwrap_or(data);
    let start = data.iter().position(|b| !b.is_ascii_whitespace()).unwrap_or(data.len());
    data[start..].starts_with(b"#usda")
}

/// Parser state over one source text.
pub struct Parser<'a> {
    source: &'a str,
    lines: LineIndex,
    tokens: Vec<(Tok<'a>, Range<usize>)>,
    pos: usize,
    max_diagnostics: usize,
    diagnostics: Vec<SyntaxError>,
    /// Set once the diagnostic budget is spent; every later error aborts.
    fatal: bool,
    warnings: Warnings,
}

impl<'a> Parser<'a> {
    /// Lex `source`. A character outside the grammar is reported immediately.
    pub fn new(source: &'a str, limits: &Limits) -> Result<Self> {
        let mut parser = Self {
            source,
            lines: LineIndex::new(source),
            tokens: Vec::new(),
            pos: 0,
            max_diagnostics: limits.max_diagnostics,
            diagnostics: Vec::new(),
            fatal: false,
            warnings: Warnings::new(),
        };
        for (tok, span) in Tok::lexer(source).spanned() {
            match tok {
                Ok(tok) => parser.tokens.push((tok, span)),
                Err(()) => {
                    let text = source.get(span.clone()).unwrap_or("");
                    return Err(parser.error_at_offset(span.start, format!("unexpected character `{text}`")));
                }
            }
        }
        Ok(parser)
    }

    /// Parse the whole token stream.
    pub fn parse(&mut self, identifier: &str) -> Result<Layer> {
        let mut layer = Layer::new(identifier);

        if self.peek() == Some(Tok::LParen) {
            let start = self.pos;
            if let Err(e) = self.parse_layer_metas(&mut layer).context("parsing layer metadata") {
                self.record(e)?;
                self.recover(start);
            }
        }

        while let Some(tok) = self.peek() {
            let start = self.pos;
            let result = match tok {
                Tok::Ident("def" | "over" | "class") => self.parse_prim(&mut layer, PrimParent::Root).map(drop),
                other => Err(self.error_here(format!("expected a prim definition, found {}", other.describe()))),
            };
            if let Err(e) = result {
                self.record(e)?;
                self.recover(start);
            }
        }

        if let Some(e) = self.take_diagnostics() {
            return Err(e);
        }
        tracing::debug!(identifier, prims = layer.prim_count(), "parsed usda layer");
        Ok(layer)
    }

    // ---- token stream ----

    #[inline]
    fn peek(&self) -> Option<Tok<'a>> {
        self.tokens.get(self.pos).map(|t| t.0)
    }

    #[inline]
    fn peek_nth(&self, n: usize) -> Option<Tok<'a>> {
        self.tokens.get(self.pos + n).map(|t| t.0)
    }

    fn eat(&mut self, tok: Tok<'_>) -> bool {
        if self.peek() == Some(tok) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_ident(&mut self, keyword: &str) -> bool {
        self.eat(Tok::Ident(keyword))
    }

    /// "expected X, found Y" at the current token.
    fn unexpected(&self, expected: &str) -> Error {
        match self.peek() {
            Some(t) => self.error_here(format!("expected {expected}, found {}", t.describe())),
            None => self.error_here(format!("expected {expected}, found end of input")),
        }
    }

    fn expect(&mut self, tok: Tok<'_>) -> Result<()> {
        if self.eat(tok) {
            Ok(())
        } else {
            Err(self.unexpected(&tok.describe()))
        }
    }

    fn expect_ident(&mut self, what: &str) -> Result<&'a str> {
        match self.peek() {
            Some(Tok::Ident(s)) => {
                self.pos += 1;
                Ok(s)
            }
            _ => Err(self.unexpected(what)),
        }
    }

    fn expect_string(&mut self, what: &str) -> Result<String> {
        match self.peek() {
            Some(Tok::String(raw)) => {
                self.pos += 1;
                Ok(unquote(raw))
            }
            _ => Err(self.unexpected(what)),
        }
    }

    /// `[]` after a type name.
    fn eat_array_brackets(&mut self) -> bool {
        if self.peek() == Some(Tok::LBracket) && self.peek_nth(1) == Some(Tok::RBracket) {
            self.pos += 2;
            true
        } else {
            false
        }
    }

    fn line_of(&self, index: usize) -> usize {
        let offset = self.tokens.get(index).map_or(self.source.len(), |t| t.1.start);
        self.lines.locate(self.source, offset).0
    }

    // ---- diagnostics ----

    fn error_at_offset(&self, offset: usize, message: impl Into<String>) -> Error {
        let (line, column) = self.lines.locate(self.source, offset);
        let text = self.lines.line_text(self.source, line);
        let caret: String = text
            .chars()
            .take(column.saturating_sub(1))
            .map(|c| if c == '\t' { '\t' } else { ' ' })
            .collect();
        Error::Syntax(Box::new(SyntaxError {
            line,
            column,
            message: message.into(),
            rules: Vec::new(),
            highlight: Some(format!("{text}\n{caret}^")),
            continued: Vec::new(),
        }))
    }

    /// Syntax error located at token `index` (end of input past the last token).
    fn error_at(&self, index: usize, message: impl Into<String>) -> Error {
        let offset = self.tokens.get(index).map_or(self.source.len(), |t| t.1.start);
        self.error_at_offset(offset, message)
    }

    fn error_here(&self, message: impl Into<String>) -> Error {
        self.error_at(self.pos, message)
    }

    /// Keep a syntax diagnostic and continue. Other errors, and running
    /// past the diagnostic budget, abort the parse.
    fn record(&mut self, err: Error) -> Result<()> {
        match err {
            Error::Syntax(e) if !self.fatal => {
                self.diagnostics.push(*e);
                if self.diagnostics.len() > self.max_diagnostics {
                    self.fatal = true;
                    if let Some(e) = self.take_diagnostics() {
                        return Err(e);
                    }
                }
                Ok(())
            }
            other => Err(other),
        }
    }

    fn take_diagnostics(&mut self) -> Option<Error> {
        let mut all = std::mem::take(&mut self.diagnostics).into_iter();
        let mut first = all.next()?;
        first.continued = all.collect();
        Some(Error::Syntax(Box::new(first)))
    }

    /// Skip the statement beginning at token `start`: everything up to
    /// balanced nesting followed by a token on a new line. Stops before a
    /// closing bracket that belongs to the enclosing block.
    fn recover(&mut self, start: usize) {
        self.pos = start;
        let mut depth = 0usize;
        while let Some(tok) = self.peek() {
            if self.pos > start && depth == 0 {
                let closes_block = matches!(tok, Tok::RBrace | Tok::RParen | Tok::RBracket);
                let new_line = self.line_of(self.pos) > self.line_of(self.pos - 1);
                let opens = matches!(tok, Tok::LBrace | Tok::LParen);
                if closes_block || (new_line && !opens) {
                    return;
                }
            }
            match tok {
                Tok::LBrace | Tok::LParen | Tok::LBracket => depth += 1,
                Tok::RBrace | Tok::RParen | Tok::RBracket => {
                    if depth == 0 {
                        // Stray closer at the statement start.
                        self.pos += 1;
                        return;
                    }
                    depth -= 1;
                }
                _ => {}
            }
            self.pos += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdf::Path;

    fn parse(src: &str) -> Result<Layer> {
        parse_layer(src, "test.usda", &Limits::default(), &mut Warnings::new())
    }

    #[test]
    fn test_header() {
        assert!(check_header("#usda 1.0\n").is_ok());
        assert!(check_header("  \n#usda 1.1 extra\n").is_ok());
        assert!(matches!(check_header("#usda 2.0"), Err(Error::UnsupportedVersion(_))));
        assert!(matches!(check_header("#sdf 1.0"), Err(Error::BadMagic(_))));
        assert!(is_usda(b"\n#usda 1.0"));
        assert!(!is_usda(b"PXR-USDC"));
    }

    #[test]
    fn test_empty_layer() {
        let layer = parse("#usda 1.0\n").unwrap();
        assert_eq!(layer.prim_count(), 0);
    }

    #[test]
    fn test_lex_error_location() {
        let err = parse("#usda 1.0\ndef \"A\" {\n  float a = 1 $\n}\n").unwrap_err();
        let syn = err.as_syntax().unwrap();
        assert_eq!((syn.line, syn.column), (3, 15));
        assert!(syn.message.contains('$'));
        assert_eq!(syn.highlight.as_deref(), Some("  float a = 1 $\n              ^"));
    }

    #[test]
    fn test_continued_diagnostics() {
        let src = "#usda 1.0\ndef \"A\" {\n    float a = oops\n    float b = 2\n    bogus c = 1\n}\ndef \"B\" {}\n";
        let err = parse(src).unwrap_err();
        let syn = err.as_syntax().unwrap();
        assert_eq!(syn.line, 3);
        assert_eq!(syn.continued.len(), 1);
        assert_eq!(syn.continued[0].line, 5);
        assert!(syn.continued[0].message.contains("bogus"));
    }

    #[test]
    fn test_diagnostic_budget() {
        let mut src = String::from("#usda 1.0\ndef \"A\" {\n");
        for _ in 0..30 {
            src.push_str("    float a = oops\n");
        }
        src.push_str("}\n");
        let limits = Limits {
            max_diagnostics: 3,
            ..Limits::default()
        };
        let err = parse_layer(&src, "t", &limits, &mut Warnings::new()).unwrap_err();
        assert_eq!(err.as_syntax().unwrap().continued.len(), 3);
    }

    #[test]
    fn test_recovery_keeps_later_prims_out_of_result() {
        let err = parse("#usda 1.0\ndef \"A\" ( kind = ) {}\ndef \"B\" {}\n").unwrap_err();
        assert!(err.as_syntax().unwrap().continued.is_empty());
        let ok = parse("#usda 1.0\ndef \"A\" {}\ndef \"B\" {}\n").unwrap();
        assert!(ok.find_prim(&Path::new("/B").unwrap()).is_some());
    }
}
