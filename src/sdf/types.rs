//! Small scene-description value types: specifiers, arcs, layer offsets.

use std::fmt;

use super::Path;
use crate::value::Dictionary;

/// How a prim spec contributes to the composed prim.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Specifier {
    #[default]
    Def,
    Over,
    Class,
}

impl Specifier {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Def => "def",
            Self::Over => "over",
            Self::Class => "class",
        }
    }

    pub fn from_keyword(s: &str) -> Option<Self> {
        match s {
            "def" => Some(Self::Def),
            "over" => Some(Self::Over),
            "class" => Some(Self::Class),
            _ => None,
        }
    }

    /// Crate file encoding.
    pub const fn from_u32(v: u32) -> Option<Self> {
        match v {
            0 => Some(Self::Def),
            1 => Some(Self::Over),
            2 => Some(Self::Class),
            _ => None,
        }
    }
}

impl fmt::Display for Specifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether an attribute may vary over time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Variability {
    #[default]
    Varying,
    Uniform,
    Config,
}

impl Variability {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Varying => "varying",
            Self::Uniform => "uniform",
            Self::Config => "config",
        }
    }

    pub const fn from_u32(v: u32) -> Option<Self> {
        match v {
            0 => Some(Self::Varying),
            1 => Some(Self::Uniform),
            2 => Some(Self::Config),
            _ => None,
        }
    }
}

impl fmt::Display for Variability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum Permission {
    #[default]
    Public,
    Private,
}

impl Permission {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Public => "public",
            Self::Private => "private",
        }
    }

    pub const fn from_u32(v: u32) -> Option<Self> {
        match v {
            0 => Some(Self::Public),
            1 => Some(Self::Private),
            _ => None,
        }
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An unresolved asset identifier as authored (`@./geom.usda@`).
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AssetPath(pub String);

impl AssetPath {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for AssetPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.contains('@') {
            write!(f, "@@@{}@@@", self.0)
        } else {
            write!(f, "@{}@", self.0)
        }
    }
}

/// Time remapping applied to sublayer and referenced content:
/// `t' = t * scale + offset`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LayerOffset {
    pub offset: f64,
    pub scale: f64,
}

impl Default for LayerOffset {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl LayerOffset {
    pub const IDENTITY: LayerOffset = LayerOffset {
        offset: 0.0,
        scale: 1.0,
    };

    pub fn new(offset: f64, scale: f64) -> Self {
        Self { offset, scale }
    }

    #[inline]
    pub fn is_identity(&self) -> bool {
        self.offset == 0.0 && self.scale == 1.0
    }

    /// Map a time code from the inner layer into the outer one.
    #[inline]
    pub fn apply(&self, t: f64) -> f64 {
        t * self.scale + self.offset
    }

    /// Offset equivalent to applying `inner` first, then `self`.
    pub fn compose(&self, inner: &LayerOffset) -> LayerOffset {
        LayerOffset {
            offset: inner.offset * self.scale + self.offset,
            scale: inner.scale * self.scale,
        }
    }
}

/// A `references` arc. An empty asset path names a prim in the same layer stack.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Reference {
    pub asset_path: AssetPath,
    pub prim_path: Option<Path>,
    pub layer_offset: LayerOffset,
    pub custom_data: Dictionary,
}

impl Reference {
    pub fn new(asset: impl Into<String>, prim_path: Option<Path>) -> Self {
        Self {
            asset_path: AssetPath::new(asset),
            prim_path,
            ..Default::default()
        }
    }

    pub fn is_internal(&self) -> bool {
        self.asset_path.is_empty()
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.asset_path.is_empty() {
            write!(f, "{}", self.asset_path)?;
        }
        if let Some(p) = &self.prim_path {
            write!(f, "<{p}>")?;
        }
        Ok(())
    }
}

/// A `payload` arc: a reference that may be skipped at load time.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Payload {
    pub asset_path: AssetPath,
    pub prim_path: Option<Path>,
    pub layer_offset: LayerOffset,
}

impl Payload {
    pub fn new(asset: impl Into<String>, prim_path: Option<Path>) -> Self {
        Self {
            asset_path: AssetPath::new(asset),
            prim_path,
            layer_offset: LayerOffset::IDENTITY,
        }
    }

    pub fn is_internal(&self) -> bool {
        self.asset_path.is_empty()
    }
}

impl From<Payload> for Reference {
    fn from(p: Payload) -> Self {
        Reference {
            asset_path: p.asset_path,
            prim_path: p.prim_path,
            layer_offset: p.layer_offset,
            custom_data: Dictionary::new(),
        }
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.asset_path.is_empty() {
            write!(f, "{}", self.asset_path)?;
        }
        if let Some(p) = &self.prim_path {
            write!(f, "<{p}>")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layer_offset_compose() {
        let inner = LayerOffset::new(10.0, 2.0);
        let outer = LayerOffset::new(1.0, 0.5);
        let both = outer.compose(&inner);
        for t in [0.0, 1.0, 24.0, -3.5] {
            assert_eq!(both.apply(t), outer.apply(inner.apply(t)));
        }
        assert!(LayerOffset::default().is_identity());
    }

    #[test]
    fn test_enum_codes() {
        assert_eq!(Specifier::from_u32(2), Some(Specifier::Class));
        assert_eq!(Specifier::from_keyword("over"), Some(Specifier::Over));
        assert_eq!(Variability::from_u32(1), Some(Variability::Uniform));
        assert_eq!(Permission::from_u32(7), None);
    }

    #[test]
    fn test_reference_display() {
        let r = Reference::new("./a.usda", Some(Path::new("/Base").unwrap()));
        assert_eq!(r.to_string(), "@./a.usda@</Base>");
        assert!(Reference::new("", Some(Path::new("/X").unwrap())).is_internal());
        assert_eq!(AssetPath::new("a@b").to_string(), "@@@a@b@@@");
    }
}
