//! Attribute and relationship specs.

use super::{Path, Token, Variability};
use crate::util::{Error, Result};
use crate::value::{Dictionary, Interpolation, ListOp, SampleTime, TimeSamples, Value, ValueTypeName};

/// A typed, possibly time-varying property.
#[derive(Clone, Debug, PartialEq)]
pub struct Attribute {
    pub type_name: ValueTypeName,
    pub default: Option<Value>,
    pub time_samples: Option<TimeSamples>,
    /// `.connect` targets.
    pub connections: Option<ListOp<Path>>,
}

impl Attribute {
    pub fn new(type_name: ValueTypeName) -> Self {
        Self {
            type_name,
            default: None,
            time_samples: None,
            connections: None,
        }
    }

    pub fn with_default(type_name: ValueTypeName, value: Value) -> Self {
        Self {
            default: Some(value),
            ..Self::new(type_name)
        }
    }

    /// Has a default value or time samples.
    pub fn has_value(&self) -> bool {
        self.default.is_some() || self.time_samples.as_ref().is_some_and(|ts| !ts.is_empty())
    }

    /// Resolve the value at `time`.
    ///
    /// The default query reads the default value, falling back to the
    /// first sample. A time query reads the samples, falling back to the
    /// default. A blocked opinion evaluates to [`Value::Block`].
    pub fn value_at(&self, time: SampleTime, interpolation: Interpolation) -> Option<Value> {
        let sampled = |t: f64| {
            self.time_samples
                .as_ref()
                .and_then(|ts| ts.eval(t, interpolation))
        };
        match time {
            SampleTime::Default => self.default.clone().or_else(|| {
                self.time_samples
                    .as_ref()
                    .and_then(|ts| ts.iter().next().map(|(_, v)| v.clone()))
            }),
            SampleTime::Time(t) => sampled(t).or_else(|| self.default.clone()),
        }
    }
}

/// Targets of a `rel`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Relationship {
    pub targets: Option<ListOp<Path>>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum PropertyKind {
    Attribute(Attribute),
    Relationship(Relationship),
}

/// A named property on a prim spec.
#[derive(Clone, Debug, PartialEq)]
pub struct Property {
    pub name: Token,
    pub custom: bool,
    pub variability: Variability,
    pub kind: PropertyKind,
    pub metas: Dictionary,
}

impl Property {
    pub fn attribute(name: &str, attr: Attribute) -> Self {
        Self {
            name: Token::new(name),
            custom: false,
            variability: Variability::Varying,
            kind: PropertyKind::Attribute(attr),
            metas: Dictionary::new(),
        }
    }

    pub fn relationship(name: &str, targets: Option<ListOp<Path>>) -> Self {
        Self {
            name: Token::new(name),
            custom: false,
            variability: Variability::Uniform,
            kind: PropertyKind::Relationship(Relationship { targets }),
            metas: Dictionary::new(),
        }
    }

    pub fn is_attribute(&self) -> bool {
        matches!(self.kind, PropertyKind::Attribute(_))
    }

    pub fn is_relationship(&self) -> bool {
        matches!(self.kind, PropertyKind::Relationship(_))
    }

    pub fn as_attribute(&self) -> Option<&Attribute> {
        match &self.kind {
            PropertyKind::Attribute(a) => Some(a),
            PropertyKind::Relationship(_) => None,
        }
    }

    pub fn as_attribute_mut(&mut self) -> Option<&mut Attribute> {
        match &mut self.kind {
            PropertyKind::Attribute(a) => Some(a),
            PropertyKind::Relationship(_) => None,
        }
    }

    pub fn as_relationship(&self) -> Option<&Relationship> {
        match &self.kind {
            PropertyKind::Relationship(r) => Some(r),
            PropertyKind::Attribute(_) => None,
        }
    }

    pub fn as_relationship_mut(&mut self) -> Option<&mut Relationship> {
        match &mut self.kind {
            PropertyKind::Relationship(r) => Some(r),
            PropertyKind::Attribute(_) => None,
        }
    }

    /// Attribute value at `time`, or [`Error::NotAuthored`].
    pub fn get(&self, time: SampleTime) -> Result<Value> {
        self.get_interpolated(time, Interpolation::Held)
    }

    pub fn get_interpolated(&self, time: SampleTime, interpolation: Interpolation) -> Result<Value> {
        self.as_attribute()
            .and_then(|a| a.value_at(time, interpolation))
            .ok_or_else(|| Error::NotAuthored(self.name.to_string()))
    }

    /// Relationship targets resolved against an empty weaker list.
    pub fn targets(&self) -> Vec<Path> {
        match &self.kind {
            PropertyKind::Relationship(r) => r.targets.as_ref().map(ListOp::resolve).unwrap_or_default(),
            PropertyKind::Attribute(a) => a.connections.as_ref().map(ListOp::resolve).unwrap_or_default(),
        }
    }

    pub fn meta(&self, key: &str) -> Option<&Value> {
        self.metas.get(key)
    }

    /// Rewrite every target and connection path through `f`.
    pub fn map_paths(&mut self, f: &impl Fn(&Path) -> Path) {
        let op = match &mut self.kind {
            PropertyKind::Relationship(r) => &mut r.targets,
            PropertyKind::Attribute(a) => &mut a.connections,
        };
        if let Some(op) = op {
            *op = op.map(f);
        }
    }
}
