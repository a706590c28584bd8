//! The composed scene.

use std::collections::HashMap;

use super::{HandleAllocator, Prim};
use crate::sdf::{LayerMetas, Path, Specifier, Token};
use crate::util::{Error, Result, Warning};

/// Flattened result of composition.
///
/// Prims live in one arena in depth-first pre-order of insertion; the
/// tree is expressed with indices. Two indices give path and id lookup.
#[derive(Clone, Debug, Default)]
pub struct Stage {
    metas: LayerMetas,
    prims: Vec<Prim>,
    roots: Vec<usize>,
    path_index: HashMap<Path, usize>,
    id_index: HashMap<u64, usize>,
    ids: HandleAllocator,
    warnings: Vec<Warning>,
}

impl Stage {
    /// An empty stage carrying `metas` (sublayer entries are dropped: the
    /// stage is already flat).
    pub fn new(mut metas: LayerMetas) -> Self {
        metas.sub_layers.clear();
        Self {
            metas,
            ..Self::default()
        }
    }

    /// Metadata of the root layer.
    pub fn metas(&self) -> &LayerMetas {
        &self.metas
    }

    pub fn up_axis(&self) -> Option<Token> {
        self.metas.up_axis
    }

    pub fn meters_per_unit(&self) -> Option<f64> {
        self.metas.meters_per_unit
    }

    pub fn time_codes_per_second(&self) -> Option<f64> {
        self.metas.time_codes_per_second
    }

    /// Non-fatal diagnostics collected while loading.
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub(crate) fn set_warnings(&mut self, warnings: Vec<Warning>) {
        self.warnings = warnings;
    }

    pub fn len(&self) -> usize {
        self.prims.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prims.is_empty()
    }

    /// Attach `prim` under `parent` (root when `None`) and give it a fresh id.
    pub(crate) fn insert_prim(&mut self, parent: Option<usize>, mut prim: Prim) -> Result<usize> {
        if self.path_index.contains_key(&prim.path) {
            return Err(Error::DuplicatePrim(prim.path.to_string()));
        }
        let index = self.prims.len();
        prim.id = self.ids.allocate();
        prim.parent = parent;
        match parent {
            Some(p) => self
                .prims
                .get_mut(p)
                .ok_or(Error::OutOfRange { index: p, len: index })?
                .children
                .push(index),
            None => self.roots.push(index),
        }
        self.path_index.insert(prim.path.clone(), index);
        self.id_index.insert(prim.id, index);
        self.prims.push(prim);
        Ok(index)
    }

    /// The root prim named by `defaultPrim`.
    pub fn default_prim(&self) -> Option<&Prim> {
        let name = self.metas.default_prim?;
        self.root_prims().find(|p| p.name() == name.as_str())
    }

    pub fn find_prim_at_path(&self, path: &Path) -> Option<&Prim> {
        self.path_index.get(path).map(|&i| &self.prims[i])
    }

    pub fn find_prim_at_path_mut(&mut self, path: &Path) -> Option<&mut Prim> {
        let index = *self.path_index.get(path)?;
        self.prims.get_mut(index)
    }

    pub fn find_prim_by_id(&self, id: u64) -> Option<&Prim> {
        self.id_index.get(&id).map(|&i| &self.prims[i])
    }

    pub fn root_prims(&self) -> impl Iterator<Item = &Prim> {
        self.roots.iter().map(|&i| &self.prims[i])
    }

    pub fn children<'a>(&'a self, prim: &'a Prim) -> impl Iterator<Item = &'a Prim> {
        prim.children.iter().map(|&i| &self.prims[i])
    }

    pub fn parent(&self, prim: &Prim) -> Option<&Prim> {
        prim.parent.map(|i| &self.prims[i])
    }

    /// Depth-first pre-order iterator over every prim.
    pub fn iter(&self) -> StageIter<'_> {
        StageIter {
            stage: self,
            stack: self.roots.iter().rev().copied().collect(),
        }
    }

    /// Visit every prim in depth-first pre-order.
    pub fn traverse<F: FnMut(&Prim)>(&self, mut visit: F) {
        for prim in self.iter() {
            visit(prim);
        }
    }

    /// Hand out an id not used by any live prim.
    pub fn allocate_prim_id(&mut self) -> u64 {
        self.ids.allocate()
    }

    /// Return an id to the pool. A prim holding `id` keeps its place in the
    /// tree but loses the id (its [`Prim::prim_id`] becomes 0).
    pub fn release_prim_id(&mut self, id: u64) -> bool {
        if !self.ids.release(id) {
            return false;
        }
        if let Some(index) = self.id_index.remove(&id) {
            self.prims[index].id = 0;
        }
        true
    }

    /// Add a `def` prim at `path`; its parent must already exist.
    pub fn define_prim(&mut self, path: &Path, type_name: Option<&str>) -> Result<u64> {
        if !path.is_absolute() || !path.is_prim_path() || path.is_root() || path.contains_variant_selection() {
            return Err(Error::malformed_path(path.to_string(), "expected an absolute prim path"));
        }
        let parent_path = path.parent().unwrap_or_else(Path::root);
        let parent = if parent_path.is_root() {
            None
        } else {
            Some(
                *self
                    .path_index
                    .get(&parent_path)
                    .ok_or_else(|| Error::MissingRequired(format!("parent prim {parent_path}")))?,
            )
        };
        let type_name = type_name.filter(|t| !t.is_empty()).map(Token::new);
        let index = self.insert_prim(parent, Prim::new(path.clone(), Specifier::Def, type_name))?;
        Ok(self.prims[index].id)
    }
}

/// Pre-order iterator returned by [`Stage::iter`].
pub struct StageIter<'a> {
    stage: &'a Stage,
    stack: Vec<usize>,
}

impl<'a> Iterator for StageIter<'a> {
    type Item = &'a Prim;

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.stack.pop()?;
        let prim = &self.stage.prims[index];
        self.stack.extend(prim.children.iter().rev());
        Some(prim)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Stage {
        let mut stage = Stage::new(LayerMetas {
            default_prim: Some(Token::new("World")),
            ..LayerMetas::default()
        });
        for p in ["/World", "/World/a", "/World/a/x", "/World/b", "/Other"] {
            stage.define_prim(&Path::new(p).unwrap(), Some("Xform")).unwrap();
        }
        stage
    }

    #[test]
    fn test_lookup_and_ids() {
        let stage = sample();
        assert_eq!(stage.len(), 5);
        let a = stage.find_prim_at_path(&Path::new("/World/a").unwrap()).unwrap();
        assert_eq!(a.prim_id(), 2);
        assert_eq!(stage.find_prim_by_id(2).unwrap().path(), a.path());
        assert_eq!(stage.default_prim().unwrap().name(), "World");
        assert_eq!(stage.parent(a).unwrap().name(), "World");
        let names: Vec<_> = stage.children(stage.default_prim().unwrap()).map(|p| p.name()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_pre_order() {
        let stage = sample();
        let mut seen = Vec::new();
        stage.traverse(|p| seen.push(p.path().to_string()));
        assert_eq!(seen, vec!["/World", "/World/a", "/World/a/x", "/World/b", "/Other"]);
        assert_eq!(stage.root_prims().count(), 2);
    }

    #[test]
    fn test_define_errors() {
        let mut stage = sample();
        assert!(matches!(
            stage.define_prim(&Path::new("/World/a").unwrap(), None),
            Err(Error::DuplicatePrim(_))
        ));
        assert!(matches!(
            stage.define_prim(&Path::new("/Missing/c").unwrap(), None),
            Err(Error::MissingRequired(_))
        ));
        assert!(stage.define_prim(&Path::new("/World.attr").unwrap(), None).is_err());
    }

    #[test]
    fn test_release_and_reuse() {
        let mut stage = sample();
        assert!(stage.release_prim_id(2));
        assert!(stage.find_prim_by_id(2).is_none());
        assert_eq!(stage.find_prim_at_path(&Path::new("/World/a").unwrap()).unwrap().prim_id(), 0);
        assert!(!stage.release_prim_id(2));

        let reused = stage.allocate_prim_id();
        assert_eq!(reused, 2);
        let fresh = stage.define_prim(&Path::new("/World/c").unwrap(), None).unwrap();
        assert_eq!(fresh, 6);
        let ids: Vec<u64> = stage.iter().map(Prim::prim_id).filter(|&i| i != 0).collect();
        let mut unique = ids.clone();
        unique.sort_unstable();
        unique.dedup();
        assert_eq!(ids.len(), unique.len());
    }
}
