//! Rebuild a [`Layer`] from decoded crate specs.

use super::format::{field_to_meta_key, SpecType};
use super::reader::{CrateFile, Field, Spec};
use crate::sdf::{
    set_meta, AssetPath, Attribute, Layer, LayerMetas, Path, PathElement, PrimIndex, PrimParent, PrimSpec, Property,
    Specifier, SubLayer, Token,
};
use crate::util::{Error, Result, WarningKind, Warnings};
use crate::value::{Dictionary, ListOp, TimeCode, TimeSamples, TypeId, Value, ValueTypeName};

/// Convert a decoded value to the declared attribute type: apply the role
/// and widen doubles stored for `timecode` attributes.
pub fn coerce(value: Value, ty: ValueTypeName) -> Value {
    let (base, role) = ty.id.base_and_role();
    let value = match (base, value) {
        (TypeId::TimeCode, Value::Double(d)) => Value::TimeCode(TimeCode(d)),
        (TypeId::TimeCode, Value::DoubleArray(v)) => Value::TimeCodeArray(v.into_iter().map(TimeCode).collect()),
        (_, v) => v,
    };
    value.with_role(role)
}

/// Where the properties of a spec path live.
enum Owner {
    Prim(PrimIndex),
    Variant(PrimIndex, String, String),
}

/// Child and property order recorded from `primChildren` / `properties`.
#[derive(Default)]
struct Ordering {
    children: Vec<(PrimIndex, Vec<Token>)>,
    properties: Vec<(PrimIndex, Vec<Token>)>,
}

struct Builder<'f, 'a> {
    file: &'f CrateFile<'a>,
    layer: Layer,
    ordering: Ordering,
    warnings: &'f mut Warnings,
}

/// Assemble the prim hierarchy of a crate file.
pub fn build_layer(file: &CrateFile<'_>, identifier: &str, warnings: &mut Warnings) -> Result<Layer> {
    let mut specs: Vec<Spec> = file.specs().to_vec();
    specs.sort_by_key(|s| file.path_order.get(s.path_index as usize).copied().unwrap_or(usize::MAX));

    let mut b = Builder {
        file,
        layer: Layer::new(identifier),
        ordering: Ordering::default(),
        warnings,
    };
    for spec in &specs {
        b.add_spec(spec)?;
    }
    b.apply_ordering();
    tracing::debug!(identifier, prims = b.layer.prim_count(), "crate layer built");
    Ok(b.layer)
}

impl Builder<'_, '_> {
    fn fields(&self, spec: &Spec) -> Result<Vec<(Token, Value)>> {
        self.file
            .fieldset(spec.fieldset_index)?
            .into_iter()
            .map(|Field { name, rep }| Ok((name, self.file.unpack(rep)?)))
            .collect()
    }

    fn add_spec(&mut self, spec: &Spec) -> Result<()> {
        let path = self.file.path(spec.path_index)?.clone();
        match spec.spec_type {
            SpecType::PseudoRoot => {
                let fields = self.fields(spec)?;
                self.apply_layer_metas(fields);
            }
            SpecType::Prim => self.add_prim(spec, &path)?,
            SpecType::Variant => {
                let (owner, set, variant) = split_variant_path(&path)?;
                let prim = self.prim_index(&owner)?;
                let fields = self.fields(spec)?;
                let v = self.layer.variant_mut(prim, &set, &variant)?;
                for (name, value) in fields {
                    set_meta(&mut v.metas, field_to_meta_key(name.as_str()), value);
                }
            }
            SpecType::Attribute | SpecType::Relationship => self.add_property(spec, &path)?,
            other => tracing::trace!(?other, %path, "skipping spec"),
        }
        Ok(())
    }

    fn prim_index(&self, path: &Path) -> Result<PrimIndex> {
        self.layer
            .find_prim_index(path)
            .ok_or_else(|| Error::invalid(format!("spec at {path} has no owning prim spec")))
    }

    fn owner(&self, prim_path: &Path) -> Result<Owner> {
        if prim_path.is_variant_selection_path() {
            let (owner, set, variant) = split_variant_path(prim_path)?;
            return Ok(Owner::Variant(self.prim_index(&owner)?, set, variant));
        }
        Ok(Owner::Prim(self.prim_index(prim_path)?))
    }

    fn add_prim(&mut self, spec: &Spec, path: &Path) -> Result<()> {
        let parent_path = path
            .parent()
            .ok_or_else(|| Error::invalid("prim spec at the pseudo-root"))?;
        let parent = if parent_path.is_root() {
            PrimParent::Root
        } else {
            match self.owner(&parent_path)? {
                Owner::Prim(p) => PrimParent::Prim(p),
                Owner::Variant(prim, set, variant) => PrimParent::Variant { prim, set, variant },
            }
        };

        let mut prim = PrimSpec::new(path.name(), Specifier::Over, None);
        let mut children = None;
        let mut properties = None;
        for (name, value) in self.fields(spec)? {
            match (name.as_str(), value) {
                ("specifier", Value::Specifier(s)) => prim.specifier = s,
                ("typeName", Value::Token(t)) => prim.type_name = (!t.is_empty()).then_some(t),
                ("primChildren", Value::TokenArray(order)) => children = Some(order),
                ("properties", Value::TokenArray(order)) => properties = Some(order),
                ("variantChildren" | "variantSetChildren", _) => {}
                ("payload", Value::Payload(p)) => {
                    prim.set_meta("payload", Value::PayloadListOp(ListOp::explicit(vec![p])))
                }
                (field, value) => prim.set_meta(field_to_meta_key(field), value),
            }
        }

        let index = self.layer.add_prim(parent, prim)?;
        if let Some(order) = children {
            self.ordering.children.push((index, order));
        }
        if let Some(order) = properties {
            self.ordering.properties.push((index, order));
        }
        Ok(())
    }

    fn add_property(&mut self, spec: &Spec, path: &Path) -> Result<()> {
        let name = path.name();
        let mut custom = false;
        let mut variability = None;
        let mut metas = Dictionary::new();
        let mut type_name = None;
        let mut default = None;
        let mut samples = None;
        let mut connections = None;
        let mut targets = None;

        for (field, value) in self.fields(spec)? {
            match (field.as_str(), value) {
                ("typeName", Value::Token(t)) => {
                    type_name = Some(ValueTypeName::parse(t.as_str()).ok_or_else(|| {
                        Error::invalid(format!("attribute {path} has unknown type `{t}`"))
                    })?)
                }
                ("default", v) => default = Some(v),
                ("timeSamples", Value::TimeSamples(ts)) => samples = Some(*ts),
                ("custom", Value::Bool(b)) => custom = b,
                ("variability", Value::Variability(v)) => variability = Some(v),
                ("connectionPaths", Value::PathListOp(op)) => connections = Some(op),
                ("targetPaths", Value::PathListOp(op)) => targets = Some(op),
                ("connectionChildren" | "targetChildren", _) => {}
                (key, v) => {
                    metas.insert(key.to_owned(), v);
                }
            }
        }

        let mut property = if spec.spec_type == SpecType::Relationship {
            Property::relationship(name, targets)
        } else {
            let ty = type_name.ok_or_else(|| Error::MissingRequired(format!("typeName of attribute {path}")))?;
            let mut attr = Attribute::new(ty);
            attr.default = default.map(|v| coerce(v, ty));
            attr.time_samples = samples.map(|ts| coerce_samples(ts, ty)).transpose()?;
            attr.connections = connections;
            Property::attribute(name, attr)
        };
        property.custom = custom;
        if let Some(v) = variability {
            property.variability = v;
        }
        property.metas = metas;

        match self.owner(&path.prim_path())? {
            Owner::Prim(p) => {
                if let Some(prim) = self.layer.prim_mut(p) {
                    prim.properties.push(property);
                }
            }
            Owner::Variant(p, set, variant) => {
                self.layer.variant_mut(p, &set, &variant)?.properties.push(property);
            }
        }
        Ok(())
    }

    fn apply_layer_metas(&mut self, fields: Vec<(Token, Value)>) {
        let mut offsets = Vec::new();
        let metas: &mut LayerMetas = self.layer.metas_mut();
        for (name, value) in fields {
            match (name.as_str(), value) {
                ("defaultPrim", Value::Token(t)) => metas.default_prim = Some(t),
                ("upAxis", Value::Token(t)) => metas.up_axis = Some(t),
                ("metersPerUnit", v) if v.as_f64().is_some() => metas.meters_per_unit = v.as_f64(),
                ("timeCodesPerSecond", v) if v.as_f64().is_some() => metas.time_codes_per_second = v.as_f64(),
                ("framesPerSecond", v) if v.as_f64().is_some() => metas.frames_per_second = v.as_f64(),
                ("startTimeCode", v) if v.as_f64().is_some() => metas.start_time_code = v.as_f64(),
                ("endTimeCode", v) if v.as_f64().is_some() => metas.end_time_code = v.as_f64(),
                ("documentation" | "doc", Value::String(s)) => metas.doc = Some(s),
                ("comment", Value::String(s)) => metas.comment = Some(s),
                ("customLayerData", Value::Dictionary(d)) => metas.custom_layer_data = d,
                ("subLayers", Value::StringArray(layers)) => {
                    metas.sub_layers = layers
                        .into_iter()
                        .map(|s| SubLayer {
                            asset_path: AssetPath::new(s),
                            ..SubLayer::default()
                        })
                        .collect()
                }
                ("subLayerOffsets", Value::LayerOffsetVector(v)) => offsets = v,
                ("primChildren", _) => {}
                (key, v) => {
                    self.warnings.push(
                        WarningKind::UnknownMetadata,
                        format!("unknown layer metadata `{key}`"),
                    );
                    metas.other.insert(key.to_owned(), v);
                }
            }
        }
        let metas = self.layer.metas_mut();
        for (sub, offset) in metas.sub_layers.iter_mut().zip(offsets) {
            sub.offset = offset;
        }
    }

    /// Sort children and properties by the recorded order; unlisted entries
    /// keep their relative position at the end.
    fn apply_ordering(&mut self) {
        let Ordering { children, properties } = std::mem::take(&mut self.ordering);
        for (index, order) in children {
            let Some(prim) = self.layer.prim(index) else { continue };
            let mut keyed: Vec<(usize, PrimIndex)> = prim
                .children
                .iter()
                .map(|&c| {
                    let name = self.layer.prim(c).map(|p| p.name).unwrap_or_default();
                    (order.iter().position(|t| *t == name).unwrap_or(usize::MAX), c)
                })
                .collect();
            keyed.sort_by_key(|(k, _)| *k);
            if let Some(prim) = self.layer.prim_mut(index) {
                prim.children = keyed.into_iter().map(|(_, c)| c).collect();
            }
        }
        for (index, order) in properties {
            if let Some(prim) = self.layer.prim_mut(index) {
                prim.properties
                    .sort_by_key(|p| order.iter().position(|t| *t == p.name).unwrap_or(usize::MAX));
            }
        }
    }
}

fn coerce_samples(ts: TimeSamples, ty: ValueTypeName) -> Result<TimeSamples> {
    let samples = ts
        .iter()
        .map(|(t, v)| (*t, coerce(v.clone(), ty)))
        .collect();
    TimeSamples::from_samples(samples)
}

/// `/A{set=var}` into (`/A`, `set`, `var`).
fn split_variant_path(path: &Path) -> Result<(Path, String, String)> {
    match path.elements().last() {
        Some(PathElement::VariantSelection(set, variant)) => {
            let owner = path
                .parent()
                .ok_or_else(|| Error::invalid(format!("variant path {path} has no owner")))?;
            Ok((owner, set.as_str().to_owned(), variant.as_str().to_owned()))
        }
        _ => Err(Error::invalid(format!("{path} is not a variant selection path"))),
    }
}
