//! usda lexer.

use logos::Logos;

/// Lexical tokens of the usda grammar.
///
/// Keywords (`def`, `uniform`, `prepend`, ...) arrive as [`Tok::Ident`];
/// the parser interprets them by position, so a property may still be
/// named `kind` or `active`. The `#usda` header line is consumed as a
/// comment after the parser has validated it.
#[derive(Logos, Clone, Copy, Debug, PartialEq)]
#[logos(skip r"[ \t\r\n\f]+")]
#[logos(skip r"#[^\n]*")]
pub enum Tok<'a> {
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token("{")]
    LBrace,
    #[token("}")]
    RBrace,
    #[token("=")]
    Eq,
    #[token(",")]
    Comma,
    #[token(";")]
    Semi,
    #[token(":")]
    Colon,

    /// `-inf`; `inf` and `nan` lex as identifiers.
    #[token("-inf")]
    NegInf,

    #[regex(r"[+-]?([0-9]+(\.[0-9]*)?|\.[0-9]+)([eE][+-]?[0-9]+)?", |lex| lex.slice())]
    Number(&'a str),

    /// Identifier, optionally namespaced and carrying a `.connect` or
    /// `.timeSamples` suffix.
    #[regex(r"[A-Za-z_][A-Za-z0-9_]*(:[A-Za-z0-9_]+)*(\.(connect|timeSamples))?", |lex| lex.slice())]
    Ident(&'a str),

    /// Raw string literal, quotes included.
    #[regex(r#""([^"\\\n]|\\.)*""#, |lex| lex.slice())]
    #[regex(r#"'([^'\\\n]|\\.)*'"#, |lex| lex.slice())]
    #[regex(r#""""([^"]|"[^"]|""[^"])*""""#, |lex| lex.slice())]
    String(&'a str),

    /// Raw asset path, `@` delimiters included.
    #[regex(r"@[^@\n]*@", |lex| lex.slice())]
    #[regex(r"@@@([^@]|@[^@]|@@[^@])*@@@", |lex| lex.slice())]
    Asset(&'a str),

    /// Raw path reference, `<` `>` included.
    #[regex(r"<[^<>\n]*>", |lex| lex.slice())]
    PathRef(&'a str),
}

impl<'a> Tok<'a> {
    /// Source-like spelling for diagnostics.
    pub fn describe(&self) -> String {
        match self {
            Tok::LParen => "'('".into(),
            Tok::RParen => "')'".into(),
            Tok::LBracket => "'['".into(),
            Tok::RBracket => "']'".into(),
            Tok::LBrace => "'{'".into(),
            Tok::RBrace => "'}'".into(),
            Tok::Eq => "'='".into(),
            Tok::Comma => "','".into(),
            Tok::Semi => "';'".into(),
            Tok::Colon => "':'".into(),
            Tok::NegInf => "`-inf`".into(),
            Tok::Number(s) => format!("number `{s}`"),
            Tok::Ident(s) => format!("`{s}`"),
            Tok::String(s) => format!("string {s}"),
            Tok::Asset(s) => format!("asset {s}"),
            Tok::PathRef(s) => format!("path {s}"),
        }
    }
}

/// Decode a raw string token: strip the quotes and resolve escapes.
pub fn unquote(raw: &str) -> String {
    if raw.len() >= 6 && raw.starts_with("\"\"\"") && raw.ends_with("\"\"\"") {
        return raw[3..raw.len() - 3].to_owned();
    }
    let body = raw.get(1..raw.len().saturating_sub(1)).unwrap_or(raw);
    let mut out = String::with_capacity(body.len());
    let mut chars = body.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('t') => out.push('\t'),
            Some('0') => out.push('\0'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

/// Strip `@` or `@@@` delimiters from a raw asset token.
pub fn unasset(raw: &str) -> &str {
    if raw.len() >= 6 && raw.starts_with("@@@") && raw.ends_with("@@@") {
        &raw[3..raw.len() - 3]
    } else {
        raw.trim_start_matches('@').trim_end_matches('@')
    }
}

/// Strip `<` `>` from a raw path token.
pub fn unpath(raw: &str) -> &str {
    raw.strip_prefix('<')
        .and_then(|s| s.strip_suffix('>'))
        .unwrap_or(raw)
        .trim()
}

/// Line and column (both 1-based) of byte offsets into one source text.
pub struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(source: &str) -> Self {
        let mut starts = vec![0];
        starts.extend(source.match_indices('\n').map(|(i, _)| i + 1));
        Self { starts }
    }

    pub fn locate(&self, source: &str, offset: usize) -> (usize, usize) {
        let offset = offset.min(source.len());
        let line = self.starts.partition_point(|&s| s <= offset).saturating_sub(1);
        let start = self.starts[line];
        let column = source
            .get(start..offset)
            .map_or(offset - start, |s| s.chars().count());
        (line + 1, column + 1)
    }

    /// Text of a 1-based line without its terminator.
    pub fn line_text<'s>(&self, source: &'s str, line: usize) -> &'s str {
        let start = self.starts.get(line.wrapping_sub(1)).copied().unwrap_or(source.len());
        let end = self.starts.get(line).map_or(source.len(), |&e| e.saturating_sub(1));
        source.get(start..end.max(start)).unwrap_or("").trim_end_matches('\r')
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(s: &str) -> Vec<Tok<'_>> {
        Tok::lexer(s).map(|t| t.unwrap()).collect()
    }

    #[test]
    fn test_prim_header() {
        let toks = lex("#usda 1.0\ndef Xform \"root\" ( kind = \"group\" ) {}");
        assert_eq!(
            toks,
            vec![
                Tok::Ident("def"),
                Tok::Ident("Xform"),
                Tok::String("\"root\""),
                Tok::LParen,
                Tok::Ident("kind"),
                Tok::Eq,
                Tok::String("\"group\""),
                Tok::RParen,
                Tok::LBrace,
                Tok::RBrace,
            ]
        );
    }

    #[test]
    fn test_property_names() {
        let toks = lex("float3[] primvars:st.timeSamples rel material:binding.connect");
        assert_eq!(toks[0], Tok::Ident("float3"));
        assert_eq!(toks[1], Tok::LBracket);
        assert_eq!(toks[3], Tok::Ident("primvars:st.timeSamples"));
        assert_eq!(toks[5], Tok::Ident("material:binding.connect"));
    }

    #[test]
    fn test_numbers() {
        let toks = lex("1 -2 3.5 -.25 1e-3 -inf inf nan");
        assert_eq!(
            toks,
            vec![
                Tok::Number("1"),
                Tok::Number("-2"),
                Tok::Number("3.5"),
                Tok::Number("-.25"),
                Tok::Number("1e-3"),
                Tok::NegInf,
                Tok::Ident("inf"),
                Tok::Ident("nan"),
            ]
        );
    }

    #[test]
    fn test_literals() {
        let toks = lex(r#"@./a.usda@ @@@we@ird@@@ </World/A.b> """multi
line""" 'single'"#);
        assert_eq!(unasset(match toks[0] {
            Tok::Asset(s) => s,
            _ => panic!(),
        }), "./a.usda");
        assert_eq!(unasset(match toks[1] {
            Tok::Asset(s) => s,
            _ => panic!(),
        }), "we@ird");
        assert_eq!(toks[2], Tok::PathRef("</World/A.b>"));
        assert_eq!(unquote(match toks[3] {
            Tok::String(s) => s,
            _ => panic!(),
        }), "multi\nline");
        assert_eq!(unquote(match toks[4] {
            Tok::String(s) => s,
            _ => panic!(),
        }), "single");
    }

    #[test]
    fn test_unquote_escapes() {
        assert_eq!(unquote(r#""a\"b\\c\n""#), "a\"b\\c\n");
        assert_eq!(unpath("< /A/B >"), "/A/B");
    }

    #[test]
    fn test_line_index() {
        let src = "ab\ncd\n\nxyz";
        let idx = LineIndex::new(src);
        assert_eq!(idx.locate(src, 0), (1, 1));
        assert_eq!(idx.locate(src, 4), (2, 2));
        assert_eq!(idx.locate(src, 8), (4, 2));
        assert_eq!(idx.line_text(src, 2), "cd");
        assert_eq!(idx.line_text(src, 3), "");
    }
}
