//! Composed prims.

use crate::sdf::{keys, Attribute, Path, Payload, Property, Reference, Specifier, Token};
use crate::util::{Error, Result};
use crate::value::{Dictionary, Interpolation, SampleTime, Value, VariantSelectionMap};

/// Composition arcs that contributed to a prim, as resolved lists.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PrimArcs {
    pub references: Vec<Reference>,
    pub payloads: Vec<Payload>,
    pub inherits: Vec<Path>,
    pub specializes: Vec<Path>,
    pub variant_sets: Vec<String>,
    /// Variant chosen for each set that contributed.
    pub variant_selection: VariantSelectionMap,
}

impl PrimArcs {
    pub fn is_empty(&self) -> bool {
        self.references.is_empty()
            && self.payloads.is_empty()
            && self.inherits.is_empty()
            && self.specializes.is_empty()
            && self.variant_sets.is_empty()
            && self.variant_selection.is_empty()
    }
}

/// A prim on a [`Stage`](super::Stage): every opinion merged.
#[derive(Clone, Debug, PartialEq)]
pub struct Prim {
    pub(crate) id: u64,
    pub(crate) path: Path,
    pub(crate) specifier: Specifier,
    pub(crate) type_name: Option<Token>,
    pub(crate) properties: Vec<Property>,
    pub(crate) metas: Dictionary,
    pub(crate) arcs: PrimArcs,
    pub(crate) parent: Option<usize>,
    pub(crate) children: Vec<usize>,
}

impl Prim {
    pub(crate) fn new(path: Path, specifier: Specifier, type_name: Option<Token>) -> Self {
        Self {
            id: 0,
            path,
            specifier,
            type_name,
            properties: Vec::new(),
            metas: Dictionary::new(),
            arcs: PrimArcs::default(),
            parent: None,
            children: Vec::new(),
        }
    }

    /// Stage-unique id; 0 once the id has been released.
    #[inline]
    pub fn prim_id(&self) -> u64 {
        self.id
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> &'static str {
        self.path.name()
    }

    pub fn specifier(&self) -> Specifier {
        self.specifier
    }

    pub fn type_name(&self) -> Option<&'static str> {
        self.type_name.map(|t| t.as_str())
    }

    /// Class prims are abstract.
    pub fn is_abstract(&self) -> bool {
        self.specifier == Specifier::Class
    }

    pub fn children_count(&self) -> usize {
        self.children.len()
    }

    /// Properties in composed order.
    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.property(name).and_then(Property::as_attribute)
    }

    /// Add a property, replacing one with the same name.
    pub fn set_property(&mut self, property: Property) {
        match self.properties.iter_mut().find(|p| p.name == property.name) {
            Some(slot) => *slot = property,
            None => self.properties.push(property),
        }
    }

    /// Value of attribute `name` at `time` with held interpolation.
    pub fn get(&self, name: &str, time: SampleTime) -> Result<Value> {
        self.get_interpolated(name, time, Interpolation::Held)
    }

    pub fn get_interpolated(&self, name: &str, time: SampleTime, interpolation: Interpolation) -> Result<Value> {
        self.property(name)
            .ok_or_else(|| Error::NotAuthored(format!("{}.{name}", self.path)))?
            .get_interpolated(time, interpolation)
    }

    /// Targets of relationship (or connections of attribute) `name`.
    pub fn targets(&self, name: &str) -> Vec<Path> {
        self.property(name).map(Property::targets).unwrap_or_default()
    }

    /// Composed prim metadata, composition arcs excluded.
    pub fn metas(&self) -> &Dictionary {
        &self.metas
    }

    pub fn meta(&self, key: &str) -> Option<&Value> {
        self.metas.get(key)
    }

    pub fn kind(&self) -> Option<Token> {
        match self.metas.get(keys::KIND) {
            Some(Value::Token(t)) => Some(*t),
            Some(Value::String(s)) => Some(Token::new(s)),
            _ => None,
        }
    }

    /// `active` metadata; prims are active unless authored otherwise.
    pub fn is_active(&self) -> bool {
        self.metas.get(keys::ACTIVE).and_then(Value::as_bool).unwrap_or(true)
    }

    pub fn arcs(&self) -> &PrimArcs {
        &self.arcs
    }

    pub fn references(&self) -> &[Reference] {
        &self.arcs.references
    }

    pub fn variant_selection(&self) -> &VariantSelectionMap {
        &self.arcs.variant_selection
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{TypeId, ValueTypeName};

    #[test]
    fn test_properties() {
        let mut p = Prim::new(Path::new("/A").unwrap(), Specifier::Def, Some(Token::new("Sphere")));
        p.set_property(Property::attribute(
            "radius",
            Attribute::with_default(ValueTypeName::scalar(TypeId::Double), Value::Double(1.0)),
        ));
        p.set_property(Property::attribute(
            "radius",
            Attribute::with_default(ValueTypeName::scalar(TypeId::Double), Value::Double(2.0)),
        ));
        assert_eq!(p.properties().len(), 1);
        assert_eq!(p.get("radius", SampleTime::Default).unwrap(), Value::Double(2.0));
        assert!(matches!(p.get("height", SampleTime::Default), Err(Error::NotAuthored(_))));
        assert_eq!(p.name(), "A");
        assert_eq!(p.type_name(), Some("Sphere"));
        assert!(p.is_active());
        assert!(p.targets("radius").is_empty());
    }
}
