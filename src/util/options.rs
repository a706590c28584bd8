//! Load-time configuration.

use std::collections::BTreeMap;
use std::path::PathBuf;

use super::Limits;
use crate::sdf::Path;
use crate::value::VariantSelectionMap;

/// Default ceiling on nested composition arcs.
pub const DEFAULT_MAX_DEPTH: u32 = 1024;

/// Options controlling decoding and composition.
///
/// ```ignore
/// let opts = LoadOptions::default()
///     .with_payload(false)
///     .with_variant_selection("/World/Car", "color", "red")?;
/// ```
#[derive(Clone, Debug)]
pub struct LoadOptions {
    pub limits: Limits,
    /// Follow `payload` arcs.
    pub allow_payload: bool,
    /// Maximum nesting of references, payloads, inherits and specializes.
    pub max_depth: u32,
    /// Decode crate sections on the rayon pool.
    pub parallel: bool,
    /// Caller-supplied variant selections keyed by composed prim path.
    /// These win over authored `variants` metadata.
    pub variant_selection: BTreeMap<Path, VariantSelectionMap>,
    /// Extra directories searched for relative asset paths, after the
    /// directory of the referencing layer.
    pub search_paths: Vec<PathBuf>,
    /// Identifier of a root layer loaded from memory, spelled as the
    /// resolver would name it. Arcs leading back to it are then caught as
    /// cycles on the first edge. Empty when unset.
    pub identifier: Option<String>,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            limits: Limits::default(),
            allow_payload: true,
            max_depth: DEFAULT_MAX_DEPTH,
            parallel: true,
            variant_selection: BTreeMap::new(),
            search_paths: Vec::new(),
            identifier: None,
        }
    }
}

impl LoadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    pub fn with_payload(mut self, allow: bool) -> Self {
        self.allow_payload = allow;
        self
    }

    pub fn with_max_depth(mut self, depth: u32) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Select `variant` of `set` on the prim at `prim_path`.
    pub fn with_variant_selection(mut self, prim_path: &str, set: &str, variant: &str) -> super::Result<Self> {
        let path = Path::new(prim_path)?;
        self.variant_selection
            .entry(path)
            .or_default()
            .insert(set.to_owned(), variant.to_owned());
        Ok(self)
    }

    pub fn with_search_path(mut self, dir: impl Into<PathBuf>) -> Self {
        self.search_paths.push(dir.into());
        self
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    /// Root layer identifier for in-memory loads.
    pub fn root_identifier(&self) -> &str {
        self.identifier.as_deref().unwrap_or("")
    }

    /// Caller selection for `set` on `prim_path`, if any.
    pub fn selected_variant(&self, prim_path: &Path, set: &str) -> Option<&str> {
        self.variant_selection
            .get(prim_path)
            .and_then(|sel| sel.get(set))
            .map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let o = LoadOptions::default();
        assert!(o.allow_payload);
        assert!(o.parallel);
        assert_eq!(o.max_depth, 1024);
        assert_eq!(o.limits, Limits::default());
        assert!(o.search_paths.is_empty());
        assert_eq!(o.root_identifier(), "");
    }

    #[test]
    fn test_builder() {
        let o = LoadOptions::new()
            .with_payload(false)
            .with_max_depth(8)
            .with_parallel(false)
            .with_search_path("/assets")
            .with_identifier("shot.usda")
            .with_variant_selection("/World/Car", "color", "red")
            .unwrap();
        assert!(!o.allow_payload);
        assert_eq!(o.max_depth, 8);
        assert_eq!(o.search_paths, vec![PathBuf::from("/assets")]);
        assert_eq!(o.root_identifier(), "shot.usda");
        let car = Path::new("/World/Car").unwrap();
        assert_eq!(o.selected_variant(&car, "color"), Some("red"));
        assert_eq!(o.selected_variant(&car, "lod"), None);
        assert!(LoadOptions::new().with_variant_selection("bad path/", "a", "b").is_err());
    }
}
