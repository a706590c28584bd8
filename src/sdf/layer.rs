//! A single parsed file: layer metadata plus an arena of prim specs.

use std::collections::HashMap;

use super::{AssetPath, LayerOffset, Path, PrimIndex, PrimSpec, Token, VariantSetSpec, VariantSpec};
use crate::util::{Error, Result};
use crate::value::Dictionary;

/// One `subLayers` entry.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SubLayer {
    pub asset_path: AssetPath,
    pub offset: LayerOffset,
}

/// A `subLayers` entry after loading: the decoded layer and its offset.
#[derive(Clone, Debug)]
pub struct ResolvedSubLayer {
    pub offset: LayerOffset,
    pub layer: Layer,
}

/// Layer-level metadata (the parenthesised block after `#usda 1.0`).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LayerMetas {
    pub doc: Option<String>,
    pub comment: Option<String>,
    pub default_prim: Option<Token>,
    pub up_axis: Option<Token>,
    pub meters_per_unit: Option<f64>,
    pub time_codes_per_second: Option<f64>,
    pub frames_per_second: Option<f64>,
    pub start_time_code: Option<f64>,
    pub end_time_code: Option<f64>,
    pub sub_layers: Vec<SubLayer>,
    pub custom_layer_data: Dictionary,
    /// Unrecognized keys, kept for round-tripping.
    pub other: Dictionary,
}

/// Where a new prim spec is attached.
#[derive(Clone, Debug, PartialEq)]
pub enum PrimParent {
    Root,
    Prim(PrimIndex),
    /// Inside variant `variant` of set `set` on prim `prim`.
    Variant {
        prim: PrimIndex,
        set: String,
        variant: String,
    },
}

/// Parsed scene description of one asset.
///
/// Prim specs live in one arena; parents refer to children by index.
#[derive(Clone, Debug, Default)]
pub struct Layer {
    identifier: String,
    metas: LayerMetas,
    prims: Vec<PrimSpec>,
    root_children: Vec<PrimIndex>,
    path_index: HashMap<Path, PrimIndex>,
    sub_layers: Vec<ResolvedSubLayer>,
}

impl Layer {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            ..Self::default()
        }
    }

    /// Resolved identifier of the asset this layer was read from.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn set_identifier(&mut self, identifier: impl Into<String>) {
        self.identifier = identifier.into();
    }

    pub fn metas(&self) -> &LayerMetas {
        &self.metas
    }

    pub fn metas_mut(&mut self) -> &mut LayerMetas {
        &mut self.metas
    }

    /// Attach a prim spec, computing its path from the parent.
    pub fn add_prim(&mut self, parent: PrimParent, mut spec: PrimSpec) -> Result<PrimIndex> {
        let name = spec.name.as_str();
        let path = match &parent {
            PrimParent::Root => Path::root().append_prim(name)?,
            PrimParent::Prim(p) => self.prim_at(*p)?.path.append_prim(name)?,
            PrimParent::Variant { prim, set, variant } => self
                .prim_at(*prim)?
                .path
                .append_variant_selection(set, variant)?
                .append_prim(name)?,
        };
        if self.path_index.contains_key(&path) {
            return Err(Error::DuplicatePrim(path.to_string()));
        }

        let index = self.prims.len();
        spec.path = path.clone();
        self.prims.push(spec);
        self.path_index.insert(path, index);

        match parent {
            PrimParent::Root => self.root_children.push(index),
            PrimParent::Prim(p) => self.prims[p].children.push(index),
            PrimParent::Variant { prim, set, variant } => {
                self.variant_mut(prim, &set, &variant)?.children.push(index);
            }
        }
        Ok(index)
    }

    /// Variant `variant` of set `set` on `prim`, created on first use.
    pub fn variant_mut(&mut self, prim: PrimIndex, set: &str, variant: &str) -> Result<&mut VariantSpec> {
        let len = self.prims.len();
        let owner = self
            .prims
            .get_mut(prim)
            .ok_or(Error::OutOfRange { index: prim, len })?;
        let set_index = match owner.variant_sets.iter().position(|s| s.name == set) {
            Some(i) => i,
            None => {
                owner.variant_sets.push(VariantSetSpec {
                    name: set.to_owned(),
                    variants: Vec::new(),
                });
                owner.variant_sets.len() - 1
            }
        };
        let vset = &mut owner.variant_sets[set_index];
        let variant_index = match vset.variants.iter().position(|v| v.name == variant) {
            Some(i) => i,
            None => {
                vset.variants.push(VariantSpec {
                    name: variant.to_owned(),
                    ..Default::default()
                });
                vset.variants.len() - 1
            }
        };
        Ok(&mut vset.variants[variant_index])
    }

    fn prim_at(&self, index: PrimIndex) -> Result<&PrimSpec> {
        self.prims
            .get(index)
            .ok_or(Error::OutOfRange {
                index,
                len: self.prims.len(),
            })
    }

    pub fn prim(&self, index: PrimIndex) -> Option<&PrimSpec> {
        self.prims.get(index)
    }

    pub fn prim_mut(&mut self, index: PrimIndex) -> Option<&mut PrimSpec> {
        self.prims.get_mut(index)
    }

    /// Number of prim specs, including those inside variants.
    pub fn prim_count(&self) -> usize {
        self.prims.len()
    }

    pub fn root_indices(&self) -> &[PrimIndex] {
        &self.root_children
    }

    pub fn root_prims(&self) -> impl Iterator<Item = &PrimSpec> {
        self.root_children.iter().map(|&i| &self.prims[i])
    }

    pub fn children<'a>(&'a self, prim: &'a PrimSpec) -> impl Iterator<Item = &'a PrimSpec> {
        prim.children.iter().map(|&i| &self.prims[i])
    }

    pub fn find_prim(&self, path: &Path) -> Option<&PrimSpec> {
        self.path_index.get(path).map(|&i| &self.prims[i])
    }

    pub fn find_prim_index(&self, path: &Path) -> Option<PrimIndex> {
        self.path_index.get(path).copied()
    }

    /// Depth-first pre-order over the prim hierarchy with each prim's
    /// path (variant contents excluded).
    pub fn iter_prims(&self) -> PrimIter<'_> {
        PrimIter {
            layer: self,
            stack: self.root_children.iter().rev().copied().collect(),
        }
    }

    /// Layers loaded from `subLayers`, strongest first.
    pub fn sub_layers(&self) -> &[ResolvedSubLayer] {
        &self.sub_layers
    }

    pub fn push_sub_layer(&mut self, layer: Layer, offset: LayerOffset) {
        self.sub_layers.push(ResolvedSubLayer { offset, layer });
    }

    /// Detach the loaded sublayers.
    pub fn take_sub_layers(&mut self) -> Vec<ResolvedSubLayer> {
        std::mem::take(&mut self.sub_layers)
    }

    /// Prim named by the `defaultPrim` metadata.
    pub fn default_prim(&self) -> Option<&PrimSpec> {
        let name = self.metas.default_prim?;
        self.root_prims().find(|p| p.name == name)
    }
}

/// Pre-order prim iterator returned by [`Layer::iter_prims`].
pub struct PrimIter<'a> {
    layer: &'a Layer,
    stack: Vec<PrimIndex>,
}

impl<'a> Iterator for PrimIter<'a> {
    type Item = (Path, &'a PrimSpec);

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.stack.pop()?;
        let prim = &self.layer.prims[index];
        self.stack.extend(prim.children.iter().rev());
        Some((prim.path.clone(), prim))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdf::Specifier;

    fn sample() -> Layer {
        let mut layer = Layer::new("test.usda");
        let world = layer
            .add_prim(PrimParent::Root, PrimSpec::new("World", Specifier::Def, Some("Xform")))
            .unwrap();
        layer
            .add_prim(PrimParent::Prim(world), PrimSpec::new("a", Specifier::Def, None))
            .unwrap();
        let b = layer
            .add_prim(PrimParent::Prim(world), PrimSpec::new("b", Specifier::Over, None))
            .unwrap();
        layer
            .add_prim(PrimParent::Prim(b), PrimSpec::new("c", Specifier::Def, None))
            .unwrap();
        layer
            .add_prim(PrimParent::Root, PrimSpec::new("Other", Specifier::Class, None))
            .unwrap();
        layer
    }

    #[test]
    fn test_paths_and_lookup() {
        let layer = sample();
        let c = layer.find_prim(&Path::new("/World/b/c").unwrap()).unwrap();
        assert_eq!(c.name, "c");
        assert_eq!(c.path.to_string(), "/World/b/c");
        assert!(layer.find_prim(&Path::new("/World/x").unwrap()).is_none());
    }

    #[test]
    fn test_pre_order() {
        let layer = sample();
        let names: Vec<_> = layer.iter_prims().map(|(_, p)| p.name.as_str()).collect();
        assert_eq!(names, vec!["World", "a", "b", "c", "Other"]);
        let paths: Vec<String> = layer.iter_prims().map(|(path, _)| path.to_string()).collect();
        assert_eq!(paths, vec!["/World", "/World/a", "/World/b", "/World/b/c", "/Other"]);
    }

    #[test]
    fn test_duplicate_prim() {
        let mut layer = sample();
        let err = layer
            .add_prim(PrimParent::Root, PrimSpec::new("World", Specifier::Over, None))
            .unwrap_err();
        assert_eq!(err, Error::DuplicatePrim("/World".into()));
    }

    #[test]
    fn test_variant_children() {
        let mut layer = sample();
        let world = layer.find_prim_index(&Path::new("/World").unwrap()).unwrap();
        let parent = PrimParent::Variant {
            prim: world,
            set: "lod".into(),
            variant: "high".into(),
        };
        layer
            .add_prim(parent, PrimSpec::new("detail", Specifier::Def, None))
            .unwrap();
        let spec = layer.find_prim(&Path::new("/World{lod=high}/detail").unwrap()).unwrap();
        assert_eq!(spec.name, "detail");
        let world = layer.prim(world).unwrap();
        assert_eq!(world.variant_set("lod").unwrap().variant("high").unwrap().children.len(), 1);
        assert_eq!(layer.iter_prims().count(), 5);
    }

    #[test]
    fn test_default_prim() {
        let mut layer = sample();
        assert!(layer.default_prim().is_none());
        layer.metas_mut().default_prim = Some(Token::new("Other"));
        assert_eq!(layer.default_prim().unwrap().path.to_string(), "/Other");
    }
}
