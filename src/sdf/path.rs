//! Scene paths: `/World/Geom{lod=high}/mesh.points`.

use std::fmt;
use std::str::FromStr;

use smallvec::SmallVec;

use super::Token;
use crate::util::{Error, Result};

/// One component of a [`Path`].
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PathElement {
    Prim(Token),
    /// `{set=variant}` attached to the preceding prim element.
    VariantSelection(Token, Token),
    Property(Token),
}

impl PathElement {
    /// Name of the element; for a variant selection, the variant set name.
    pub fn name(&self) -> Token {
        match self {
            Self::Prim(t) | Self::Property(t) | Self::VariantSelection(t, _) => *t,
        }
    }
}

/// Immutable path into a scene description.
///
/// Equality is element-wise, so `/a/b.c` parsed from text equals
/// `/a` extended with child `b` and property `c`.
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Path {
    absolute: bool,
    elements: SmallVec<[PathElement; 6]>,
}

/// `[_A-Za-z][_A-Za-z0-9]*`, with unicode letters and digits accepted.
pub fn is_valid_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c == '_' || c.is_alphabetic() => {}
        _ => return false,
    }
    chars.all(|c| c == '_' || c.is_alphanumeric())
}

/// Namespaced identifier: `inputs:diffuseColor`.
pub fn is_valid_property_name(s: &str) -> bool {
    !s.is_empty() && s.split(':').all(is_valid_identifier)
}

impl Path {
    /// The absolute root path `/`.
    pub fn root() -> Self {
        Self {
            absolute: true,
            elements: SmallVec::new(),
        }
    }

    /// The empty path.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse a path string.
    pub fn new(s: &str) -> Result<Self> {
        if s.is_empty() {
            return Err(Error::malformed_path(s, "empty path"));
        }
        if s == "/" {
            return Ok(Self::root());
        }
        let absolute = s.starts_with('/');
        let body = if absolute { &s[1..] } else { s };

        let (prim_part, prop_part) = match body.find('.') {
            Some(i) => (&body[..i], Some(&body[i + 1..])),
            None => (body, None),
        };
        if prim_part.is_empty() {
            return Err(Error::malformed_path(s, "property without a prim element"));
        }

        let mut elements = SmallVec::new();
        for segment in prim_part.split('/') {
            if segment.is_empty() {
                return Err(Error::malformed_path(s, "empty path element"));
            }
            parse_segment(s, segment, &mut elements)?;
        }

        if let Some(prop) = prop_part {
            if prop.contains('/') {
                return Err(Error::malformed_path(s, "'/' inside property name"));
            }
            if prop.contains('.') {
                return Err(Error::malformed_path(s, "more than one '.' in path"));
            }
            if !is_valid_property_name(prop) {
                return Err(Error::malformed_path(s, format!("invalid property name `{prop}`")));
            }
            elements.push(PathElement::Property(Token::new(prop)));
        }

        Ok(Self { absolute, elements })
    }

    #[inline]
    pub fn is_absolute(&self) -> bool {
        self.absolute
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.absolute && self.elements.is_empty()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        !self.absolute && self.elements.is_empty()
    }

    /// Last element is a prim name.
    pub fn is_prim_path(&self) -> bool {
        matches!(self.elements.last(), Some(PathElement::Prim(_)))
    }

    /// Last element is a property name.
    pub fn is_property_path(&self) -> bool {
        matches!(self.elements.last(), Some(PathElement::Property(_)))
    }

    /// Last element is a variant selection.
    pub fn is_variant_selection_path(&self) -> bool {
        matches!(self.elements.last(), Some(PathElement::VariantSelection(..)))
    }

    /// Any element is a variant selection.
    pub fn contains_variant_selection(&self) -> bool {
        self.elements
            .iter()
            .any(|e| matches!(e, PathElement::VariantSelection(..)))
    }

    #[inline]
    pub fn elements(&self) -> &[PathElement] {
        &self.elements
    }

    /// Name of the last prim or property element (empty for the root).
    pub fn name(&self) -> &'static str {
        match self.elements.last() {
            Some(PathElement::Prim(t)) | Some(PathElement::Property(t)) => t.as_str(),
            Some(PathElement::VariantSelection(_, v)) => v.as_str(),
            None => "",
        }
    }

    pub fn name_token(&self) -> Option<Token> {
        match self.elements.last() {
            Some(PathElement::Prim(t)) | Some(PathElement::Property(t)) => Some(*t),
            _ => None,
        }
    }

    /// Parent path. `None` for the root and the empty path.
    pub fn parent(&self) -> Option<Path> {
        if self.elements.is_empty() {
            return None;
        }
        let mut p = self.clone();
        p.elements.pop();
        Some(p)
    }

    /// The owning prim path of a property path; prim paths return themselves.
    pub fn prim_path(&self) -> Path {
        let mut p = self.clone();
        while matches!(p.elements.last(), Some(PathElement::Property(_))) {
            p.elements.pop();
        }
        p
    }

    /// Append a child prim.
    pub fn append_prim(&self, name: &str) -> Result<Path> {
        if self.is_property_path() {
            return Err(Error::malformed_path(
                format!("{self}/{name}"),
                "cannot append a prim to a property path",
            ));
        }
        if !is_valid_identifier(name) {
            return Err(Error::malformed_path(
                format!("{self}/{name}"),
                format!("invalid prim name `{name}`"),
            ));
        }
        let mut p = self.clone();
        p.elements.push(PathElement::Prim(Token::new(name)));
        Ok(p)
    }

    /// Append a property.
    pub fn append_property(&self, name: &str) -> Result<Path> {
        if self.elements.is_empty() || self.is_property_path() {
            return Err(Error::malformed_path(
                format!("{self}.{name}"),
                "properties attach to prims only",
            ));
        }
        if !is_valid_property_name(name) {
            return Err(Error::malformed_path(
                format!("{self}.{name}"),
                format!("invalid property name `{name}`"),
            ));
        }
        let mut p = self.clone();
        p.elements.push(PathElement::Property(Token::new(name)));
        Ok(p)
    }

    /// Append a `{set=variant}` selection to a prim path.
    pub fn append_variant_selection(&self, set: &str, variant: &str) -> Result<Path> {
        if !self.is_prim_path() && !self.is_variant_selection_path() {
            return Err(Error::malformed_path(
                format!("{self}{{{set}={variant}}}"),
                "variant selections attach to prims only",
            ));
        }
        if !is_valid_identifier(set) || !(variant.is_empty() || is_valid_identifier(variant)) {
            return Err(Error::malformed_path(
                format!("{self}{{{set}={variant}}}"),
                "invalid variant selection",
            ));
        }
        let mut p = self.clone();
        p.elements
            .push(PathElement::VariantSelection(Token::new(set), Token::new(variant)));
        Ok(p)
    }

    /// Append one element spelled as a crate element token:
    /// `name`, `{set=variant}` or, when `is_property`, a property name.
    pub fn append_element_str(&self, element: &str, is_property: bool) -> Result<Path> {
        if is_property {
            return self.append_property(element);
        }
        if let Some(body) = element.strip_prefix('{').and_then(|e| e.strip_suffix('}')) {
            let (set, variant) = body
                .split_once('=')
                .ok_or_else(|| Error::malformed_path(element, "variant selection without '='"))?;
            return self.append_variant_selection(set, variant);
        }
        self.append_prim(element)
    }

    /// True if `prefix` equals this path or is an ancestor of it.
    pub fn has_prefix(&self, prefix: &Path) -> bool {
        self.absolute == prefix.absolute && self.elements.starts_with(&prefix.elements)
    }

    /// Replace a leading `old` with `new`. `None` if `old` is not a prefix.
    pub fn replace_prefix(&self, old: &Path, new: &Path) -> Option<Path> {
        if !self.has_prefix(old) {
            return None;
        }
        let mut p = new.clone();
        p.elements
            .extend(self.elements[old.elements.len()..].iter().cloned());
        Some(p)
    }

    /// Longest path that is a prefix of both `self` and `other`.
    pub fn common_prefix(&self, other: &Path) -> Path {
        if self.absolute != other.absolute {
            return Path::empty();
        }
        let n = self
            .elements
            .iter()
            .zip(&other.elements)
            .take_while(|(a, b)| a == b)
            .count();
        Path {
            absolute: self.absolute,
            elements: self.elements[..n].iter().cloned().collect(),
        }
    }

    /// Remove every variant selection element.
    pub fn strip_variant_selections(&self) -> Path {
        Path {
            absolute: self.absolute,
            elements: self
                .elements
                .iter()
                .filter(|e| !matches!(e, PathElement::VariantSelection(..)))
                .cloned()
                .collect(),
        }
    }

    /// Resolve a relative path against an absolute anchor prim path.
    pub fn make_absolute(&self, anchor: &Path) -> Result<Path> {
        if self.absolute {
            return Ok(self.clone());
        }
        if !anchor.absolute {
            return Err(Error::malformed_path(anchor.to_string(), "anchor must be absolute"));
        }
        let mut p = anchor.prim_path();
        p.elements.extend(self.elements.iter().cloned());
        Ok(p)
    }

    /// Number of elements (0 for the root).
    pub fn depth(&self) -> usize {
        self.elements.len()
    }
}

fn parse_segment(full: &str, segment: &str, out: &mut SmallVec<[PathElement; 6]>) -> Result<()> {
    let mut rest = segment;
    let mut first = true;
    loop {
        let brace = rest.find('{').unwrap_or(rest.len());
        let name = &rest[..brace];
        if name.is_empty() {
            if first {
                return Err(Error::malformed_path(full, "variant selection without a prim"));
            }
        } else if is_valid_identifier(name) {
            out.push(PathElement::Prim(Token::new(name)));
        } else {
            return Err(Error::malformed_path(full, format!("invalid prim name `{name}`")));
        }
        first = false;
        if brace == rest.len() {
            return Ok(());
        }

        let close = rest[brace..]
            .find('}')
            .ok_or_else(|| Error::malformed_path(full, "unterminated variant selection"))?;
        let body = &rest[brace + 1..brace + close];
        let (set, variant) = body
            .split_once('=')
            .ok_or_else(|| Error::malformed_path(full, "variant selection without '='"))?;
        let (set, variant) = (set.trim(), variant.trim());
        if !is_valid_identifier(set) || !(variant.is_empty() || is_valid_identifier(variant)) {
            return Err(Error::malformed_path(full, format!("invalid variant selection `{body}`")));
        }
        out.push(PathElement::VariantSelection(Token::new(set), Token::new(variant)));
        rest = &rest[brace + close + 1..];
        if rest.is_empty() {
            return Ok(());
        }
    }
}

impl FromStr for Path {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Path::new(s)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.absolute {
            f.write_str("/")?;
        }
        for (i, e) in self.elements.iter().enumerate() {
            match e {
                PathElement::Prim(n) => {
                    if i > 0 {
                        f.write_str("/")?;
                    }
                    f.write_str(n.as_str())?;
                }
                PathElement::VariantSelection(s, v) => write!(f, "{{{s}={v}}}")?,
                PathElement::Property(n) => write!(f, ".{n}")?,
            }
        }
        Ok(())
    }
}

impl fmt::Debug for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Path({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        for s in ["/", "/a", "/a/b", "/a/b.c", "/a.inputs:diffuseColor", "a/b", "a.b", "/a{v=x}/b"] {
            assert_eq!(Path::new(s).unwrap().to_string(), s);
        }
    }

    #[test]
    fn test_structural_equality() {
        let parsed = Path::new("/a/b.c").unwrap();
        let built = Path::root()
            .append_prim("a")
            .unwrap()
            .append_prim("b")
            .unwrap()
            .append_property("c")
            .unwrap();
        assert_eq!(parsed, built);
    }

    #[test]
    fn test_classification() {
        let p = Path::new("/World/mesh.points").unwrap();
        assert!(p.is_absolute());
        assert!(p.is_property_path());
        assert!(!p.is_prim_path());
        assert_eq!(p.name(), "points");
        assert_eq!(p.prim_path().to_string(), "/World/mesh");
        assert_eq!(p.parent().unwrap().to_string(), "/World/mesh");
        assert!(Path::root().is_root());
        assert!(Path::root().parent().is_none());
        assert!(Path::empty().is_empty());
        assert_eq!(Path::new("/a").unwrap().parent(), Some(Path::root()));
    }

    #[test]
    fn test_malformed() {
        for s in ["", "//a", "/a/", "/a.b/c", "/a.b.c", "/1abc", "/a{v}", "/a{v=x", "/.x", "/a b"] {
            assert!(
                matches!(Path::new(s), Err(Error::MalformedPath { .. })),
                "{s:?} should be rejected"
            );
        }
    }

    #[test]
    fn test_variant_selection_forms() {
        let spec_form = Path::new("/a{v=x}/b").unwrap();
        let usd_form = Path::new("/a{v=x}b").unwrap();
        assert_eq!(spec_form, usd_form);
        assert!(spec_form.contains_variant_selection());
        assert_eq!(spec_form.strip_variant_selections().to_string(), "/a/b");

        let built = Path::new("/a")
            .unwrap()
            .append_element_str("{v=x}", false)
            .unwrap()
            .append_element_str("b", false)
            .unwrap();
        assert_eq!(built, spec_form);
        assert!(Path::new("/a{v=}").unwrap().is_variant_selection_path());
    }

    #[test]
    fn test_prefix_operations() {
        let p = Path::new("/Base/Mat/shader.outputs:surface").unwrap();
        let old = Path::new("/Base").unwrap();
        let new = Path::new("/World/A").unwrap();
        assert!(p.has_prefix(&old));
        assert!(!p.has_prefix(&Path::new("/Bas").unwrap()));
        assert_eq!(
            p.replace_prefix(&old, &new).unwrap().to_string(),
            "/World/A/Mat/shader.outputs:surface"
        );
        assert!(p.replace_prefix(&new, &old).is_none());

        let q = Path::new("/Base/Geo/mesh").unwrap();
        assert_eq!(p.common_prefix(&q), old);
        assert_eq!(p.common_prefix(&new), Path::root());
        assert!(p.common_prefix(&Path::new("a").unwrap()).is_empty());
    }

    #[test]
    fn test_make_absolute() {
        let rel = Path::new("child.attr").unwrap();
        let anchor = Path::new("/root").unwrap();
        assert_eq!(rel.make_absolute(&anchor).unwrap().to_string(), "/root/child.attr");
        assert!(rel.make_absolute(&Path::new("x").unwrap()).is_err());
    }

    #[test]
    fn test_append_rules() {
        let prop = Path::new("/a.b").unwrap();
        assert!(prop.append_prim("c").is_err());
        assert!(prop.append_property("c").is_err());
        assert!(Path::root().append_property("x").is_err());
        assert!(Path::root().append_prim("9").is_err());
    }
}
