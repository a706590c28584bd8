//! Prim specs and their metadata.

use super::{Path, Payload, Property, Reference, Specifier, Token};
use crate::value::{Dictionary, ListOp, Value, VariantSelectionMap};

/// Index of a [`PrimSpec`] inside its layer's arena.
pub type PrimIndex = usize;

/// Well-known metadata keys.
pub mod keys {
    pub const REFERENCES: &str = "references";
    pub const PAYLOAD: &str = "payload";
    pub const INHERITS: &str = "inherits";
    pub const SPECIALIZES: &str = "specializes";
    pub const VARIANT_SETS: &str = "variantSets";
    pub const VARIANTS: &str = "variants";
    pub const API_SCHEMAS: &str = "apiSchemas";
    pub const KIND: &str = "kind";
    pub const ACTIVE: &str = "active";
    pub const HIDDEN: &str = "hidden";
    pub const INSTANCEABLE: &str = "instanceable";
    pub const CUSTOM_DATA: &str = "customData";
    pub const ASSET_INFO: &str = "assetInfo";
    pub const DOC: &str = "doc";
    pub const COMMENT: &str = "comment";
    pub const DISPLAY_NAME: &str = "displayName";
    pub const PRIM_ORDER: &str = "primOrder";
    pub const PROPERTY_ORDER: &str = "propertyOrder";

    /// Keys describing composition arcs; they are consumed by composition.
    pub const ARCS: &[&str] = &[REFERENCES, PAYLOAD, INHERITS, SPECIALIZES, VARIANT_SETS, VARIANTS];
}

/// One variant of a variant set: a bundle of opinions on the owning prim.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct VariantSpec {
    pub name: String,
    pub metas: Dictionary,
    pub properties: Vec<Property>,
    pub children: Vec<PrimIndex>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct VariantSetSpec {
    pub name: String,
    pub variants: Vec<VariantSpec>,
}

impl VariantSetSpec {
    pub fn variant(&self, name: &str) -> Option<&VariantSpec> {
        self.variants.iter().find(|v| v.name == name)
    }
}

/// A prim as authored in one layer.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PrimSpec {
    pub name: Token,
    pub path: Path,
    pub specifier: Specifier,
    pub type_name: Option<Token>,
    /// In authoring order.
    pub properties: Vec<Property>,
    /// In authoring order.
    pub children: Vec<PrimIndex>,
    pub metas: Dictionary,
    pub variant_sets: Vec<VariantSetSpec>,
}

macro_rules! meta_getter {
    ($name:ident, $key:ident, $variant:ident, $ty:ty) => {
        pub fn $name(&self) -> Option<&$ty> {
            match self.metas.get(keys::$key) {
                Some(Value::$variant(v)) => Some(v),
                _ => None,
            }
        }
    };
}

impl PrimSpec {
    pub fn new(name: &str, specifier: Specifier, type_name: Option<&str>) -> Self {
        Self {
            name: Token::new(name),
            specifier,
            type_name: type_name.filter(|t| !t.is_empty()).map(Token::new),
            ..Self::default()
        }
    }

    meta_getter!(references, REFERENCES, ReferenceListOp, ListOp<Reference>);
    meta_getter!(payloads, PAYLOAD, PayloadListOp, ListOp<Payload>);
    meta_getter!(inherits, INHERITS, PathListOp, ListOp<Path>);
    meta_getter!(specializes, SPECIALIZES, PathListOp, ListOp<Path>);
    meta_getter!(variant_set_names, VARIANT_SETS, StringListOp, ListOp<String>);
    meta_getter!(variant_selection, VARIANTS, VariantSelection, VariantSelectionMap);
    meta_getter!(api_schemas, API_SCHEMAS, TokenListOp, ListOp<Token>);
    meta_getter!(custom_data, CUSTOM_DATA, Dictionary, Dictionary);

    pub fn kind(&self) -> Option<Token> {
        match self.metas.get(keys::KIND) {
            Some(Value::Token(t)) => Some(*t),
            Some(Value::String(s)) => Some(Token::new(s)),
            _ => None,
        }
    }

    pub fn active(&self) -> Option<bool> {
        self.metas.get(keys::ACTIVE).and_then(Value::as_bool)
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn property_mut(&mut self, name: &str) -> Option<&mut Property> {
        self.properties.iter_mut().find(|p| p.name == name)
    }

    pub fn variant_set(&self, name: &str) -> Option<&VariantSetSpec> {
        self.variant_sets.iter().find(|v| v.name == name)
    }

    /// Set a metadata value. List-op values fold into an existing list-op
    /// under the same key as a later edit.
    pub fn set_meta(&mut self, key: &str, value: Value) {
        set_meta(&mut self.metas, key, value);
    }
}

/// Insert `value` under `key`, merging a list-op statement into an
/// existing one from the same block.
pub fn set_meta(metas: &mut Dictionary, key: &str, value: Value) {
    if let Some(existing) = metas.get_mut(key) {
        if existing.merge_list_statement(&value) {
            return;
        }
    }
    metas.insert(key.to_owned(), value);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ListOpKind;

    #[test]
    fn test_list_op_meta_folds() {
        let mut p = PrimSpec::new("X", Specifier::Def, None);
        p.set_meta(
            keys::REFERENCES,
            Value::ReferenceListOp(ListOp::prepended(vec![
                Reference::new("a.usda", None),
                Reference::new("b.usda", None),
            ])),
        );
        p.set_meta(
            keys::REFERENCES,
            Value::ReferenceListOp(ListOp::deleted(vec![Reference::new("a.usda", None)])),
        );
        let refs = p.references().unwrap();
        assert_eq!(refs.resolve(), vec![Reference::new("b.usda", None)]);
        assert_eq!(refs.items(ListOpKind::Deleted).len(), 1);
    }

    #[test]
    fn test_plain_meta_replaces() {
        let mut p = PrimSpec::new("X", Specifier::Def, Some("Xform"));
        p.set_meta(keys::KIND, Value::Token(Token::new("group")));
        p.set_meta(keys::KIND, Value::Token(Token::new("component")));
        assert_eq!(p.kind(), Some(Token::new("component")));
        assert_eq!(p.type_name, Some(Token::new("Xform")));
        assert!(PrimSpec::new("Y", Specifier::Over, Some("")).type_name.is_none());
    }
}
