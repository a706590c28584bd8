//! Stage serialization: flattened usda and JSON.

use half::f16;
use serde_json::{json, Map, Value as Json};

use super::{Prim, Stage};
use crate::sdf::{AssetPath, Layer, LayerOffset, Path, PrimParent, PrimSpec, Property, PropertyKind, Token};
use crate::util::Result;
use crate::value::{Matrix2d, Matrix3d, Matrix4d, Matrix4f, Quatd, Quatf, Quath, TimeCode, Value};

impl Stage {
    /// The stage as a single flat layer: composed opinions only, no arcs.
    pub fn to_layer(&self) -> Result<Layer> {
        let mut layer = Layer::new("");
        *layer.metas_mut() = self.metas().clone();

        let mut stack: Vec<(PrimParent, &Prim)> = self.root_prims().map(|p| (PrimParent::Root, p)).collect();
        stack.reverse();
        while let Some((parent, prim)) = stack.pop() {
            let mut spec = PrimSpec::new(prim.name(), prim.specifier(), prim.type_name());
            spec.properties = prim.properties().to_vec();
            spec.metas = prim.metas().clone();
            let index = layer.add_prim(parent, spec)?;
            let children: Vec<&Prim> = self.children(prim).collect();
            stack.extend(children.into_iter().rev().map(|c| (PrimParent::Prim(index), c)));
        }
        Ok(layer)
    }

    /// Flattened usda text of the composed stage. Fails only if a prim
    /// name no longer forms a valid path.
    pub fn export_usda(&self) -> Result<String> {
        Ok(self.to_layer()?.to_usda())
    }

    /// JSON description of the stage for tooling.
    pub fn to_json(&self) -> Json {
        let m = self.metas();
        let mut root = Map::new();
        if let Some(p) = m.default_prim {
            root.insert("defaultPrim".into(), json!(p.as_str()));
        }
        if let Some(a) = m.up_axis {
            root.insert("upAxis".into(), json!(a.as_str()));
        }
        for (key, v) in [
            ("metersPerUnit", m.meters_per_unit),
            ("timeCodesPerSecond", m.time_codes_per_second),
            ("framesPerSecond", m.frames_per_second),
            ("startTimeCode", m.start_time_code),
            ("endTimeCode", m.end_time_code),
        ] {
            if let Some(v) = v {
                root.insert(key.into(), json!(v));
            }
        }
        if let Some(doc) = &m.doc {
            root.insert("doc".into(), json!(doc));
        }
        if !m.custom_layer_data.is_empty() {
            root.insert("customLayerData".into(), dictionary_json(m.custom_layer_data.iter()));
        }
        let prims: Vec<Json> = self.root_prims().map(|p| self.prim_json(p)).collect();
        root.insert("prims".into(), Json::Array(prims));
        Json::Object(root)
    }

    fn prim_json(&self, prim: &Prim) -> Json {
        let mut obj = Map::new();
        obj.insert("name".into(), json!(prim.name()));
        obj.insert("path".into(), json!(prim.path().to_string()));
        obj.insert("id".into(), json!(prim.prim_id()));
        obj.insert("specifier".into(), json!(prim.specifier().as_str()));
        if let Some(t) = prim.type_name() {
            obj.insert("type".into(), json!(t));
        }
        if !prim.metas().is_empty() {
            obj.insert("metadata".into(), dictionary_json(prim.metas().iter()));
        }
        if !prim.properties().is_empty() {
            let props: Map<String, Json> = prim
                .properties()
                .iter()
                .map(|p| (p.name.as_str().to_owned(), property_json(p)))
                .collect();
            obj.insert("properties".into(), Json::Object(props));
        }
        let children: Vec<Json> = self.children(prim).map(|c| self.prim_json(c)).collect();
        if !children.is_empty() {
            obj.insert("children".into(), Json::Array(children));
        }
        Json::Object(obj)
    }
}

fn property_json(p: &Property) -> Json {
    let mut obj = Map::new();
    match &p.kind {
        PropertyKind::Attribute(a) => {
            obj.insert("type".into(), json!(a.type_name.to_string()));
            if let Some(v) = &a.default {
                obj.insert("default".into(), value_json(v));
            }
            if let Some(ts) = &a.time_samples {
                let samples: Vec<Json> = ts.iter().map(|(t, v)| json!([t, value_json(v)])).collect();
                obj.insert("timeSamples".into(), Json::Array(samples));
            }
            let conns = p.targets();
            if !conns.is_empty() {
                obj.insert("connections".into(), paths_json(&conns));
            }
        }
        PropertyKind::Relationship(_) => {
            obj.insert("type".into(), json!("rel"));
            obj.insert("targets".into(), paths_json(&p.targets()));
        }
    }
    if p.custom {
        obj.insert("custom".into(), json!(true));
    }
    if !p.metas.is_empty() {
        obj.insert("metadata".into(), dictionary_json(p.metas.iter()));
    }
    Json::Object(obj)
}

fn paths_json(paths: &[Path]) -> Json {
    Json::Array(paths.iter().map(|p| json!(p.to_string())).collect())
}

fn dictionary_json<'a>(entries: impl Iterator<Item = (&'a String, &'a Value)>) -> Json {
    Json::Object(entries.map(|(k, v)| (k.clone(), value_json(v))).collect())
}

/// Element types with a natural JSON form.
trait ToJson {
    fn to_json(&self) -> Json;
}

macro_rules! json_number {
    ($($t:ty),*) => {
        $( impl ToJson for $t {
            fn to_json(&self) -> Json {
                json!(*self)
            }
        } )*
    };
}

json_number!(bool, u8, i32, u32, i64, u64, f32, f64);

impl ToJson for f16 {
    fn to_json(&self) -> Json {
        json!(self.to_f32())
    }
}

impl ToJson for TimeCode {
    fn to_json(&self) -> Json {
        json!(self.0)
    }
}

impl<T: ToJson, const N: usize> ToJson for [T; N] {
    fn to_json(&self) -> Json {
        Json::Array(self.iter().map(ToJson::to_json).collect())
    }
}

macro_rules! json_wrapper {
    ($($t:ty),*) => {
        $( impl ToJson for $t {
            fn to_json(&self) -> Json {
                self.0.to_json()
            }
        } )*
    };
}

json_wrapper!(Quath, Quatf, Quatd, Matrix2d, Matrix3d, Matrix4d, Matrix4f);

macro_rules! json_string {
    ($($t:ty),*) => {
        $( impl ToJson for $t {
            fn to_json(&self) -> Json {
                json!(self.to_string())
            }
        } )*
    };
}

json_string!(Token, String, AssetPath, Path);

impl ToJson for LayerOffset {
    fn to_json(&self) -> Json {
        json!({ "offset": self.offset, "scale": self.scale })
    }
}

fn slice_json<T: ToJson>(items: &[T]) -> Json {
    Json::Array(items.iter().map(ToJson::to_json).collect())
}

/// JSON form of a value. Numbers and tuples map to JSON numbers and
/// arrays; types without a natural form use their usda spelling.
pub fn value_json(v: &Value) -> Json {
    use Value::*;
    macro_rules! arms {
        ([$($plain:ident),*], [$($role:ident),*], [$($plain_arr:ident),*], [$($role_arr:ident),*]) => {
            match v {
                $( $plain(x) => x.to_json(), )*
                $( $role(x, _) => x.to_json(), )*
                $( $plain_arr(x) => slice_json(x), )*
                $( $role_arr(x, _) => slice_json(x), )*
                Block => Json::Null,
                Dictionary(d) => dictionary_json(d.iter()),
                VariantSelection(m) => Json::Object(m.iter().map(|(k, s)| (k.clone(), json!(s))).collect()),
                TimeSamples(ts) => Json::Array(ts.iter().map(|(t, s)| json!([t, value_json(s)])).collect()),
                other => json!(other.to_string()),
            }
        };
    }
    arms!(
        [
            Bool, UChar, Int, UInt, Int64, UInt64, Half, Float, Double, TimeCode, Int2, Int3, Int4,
            UInt2, UInt3, UInt4, Quath, Quatf, Quatd, Matrix2d, Matrix3d, Matrix4f, Token, String,
            AssetPath, Path, LayerOffset
        ],
        [Half2, Half3, Half4, Float2, Float3, Float4, Double2, Double3, Double4, Matrix4d],
        [
            BoolArray, UCharArray, IntArray, UIntArray, Int64Array, UInt64Array, HalfArray,
            FloatArray, DoubleArray, TimeCodeArray, Int2Array, Int3Array, Int4Array, UInt2Array,
            UInt3Array, UInt4Array, QuathArray, QuatfArray, QuatdArray, Matrix2dArray,
            Matrix3dArray, Matrix4fArray, TokenArray, StringArray, AssetPathArray, PathVector,
            LayerOffsetVector
        ],
        [
            Half2Array, Half3Array, Half4Array, Float2Array, Float3Array, Float4Array,
            Double2Array, Double3Array, Double4Array, Matrix4dArray
        ]
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sdf::{Attribute, LayerMetas};
    use crate::value::{Role, TypeId, ValueTypeName};

    fn stage() -> Stage {
        let mut stage = Stage::new(LayerMetas {
            default_prim: Some(Token::new("World")),
            up_axis: Some(Token::new("Y")),
            ..LayerMetas::default()
        });
        stage.define_prim(&Path::new("/World").unwrap(), Some("Xform")).unwrap();
        stage.define_prim(&Path::new("/World/Ball").unwrap(), Some("Sphere")).unwrap();
        let ball = stage.find_prim_at_path_mut(&Path::new("/World/Ball").unwrap()).unwrap();
        ball.set_property(Property::attribute(
            "radius",
            Attribute::with_default(ValueTypeName::scalar(TypeId::Double), Value::Double(0.5)),
        ));
        ball.set_property(Property::attribute(
            "xformOp:translate",
            Attribute::with_default(
                ValueTypeName::scalar(TypeId::Double3),
                Value::Double3([1.0, 2.0, 3.0], Role::None),
            ),
        ));
        stage
    }

    #[test]
    fn test_json() {
        let j = stage().to_json();
        assert_eq!(j["defaultPrim"], "World");
        assert_eq!(j["upAxis"], "Y");
        let ball = &j["prims"][0]["children"][0];
        assert_eq!(ball["path"], "/World/Ball");
        assert_eq!(ball["type"], "Sphere");
        assert_eq!(ball["id"], 2);
        assert_eq!(ball["properties"]["radius"]["default"], 0.5);
        assert_eq!(ball["properties"]["xformOp:translate"]["default"], json!([1.0, 2.0, 3.0]));
    }

    #[test]
    fn test_export_usda() {
        let text = stage().export_usda().unwrap();
        assert!(text.starts_with("#usda 1.0"));
        assert!(text.contains("def Sphere \"Ball\""));
        assert!(text.contains("double radius = 0.5"));
        assert!(text.contains("defaultPrim = \"World\""));
    }

    #[test]
    fn test_value_json_fallbacks() {
        assert_eq!(value_json(&Value::Block), Json::Null);
        assert_eq!(value_json(&Value::Half(f16::from_f32(1.5))), json!(1.5));
        assert_eq!(value_json(&Value::Token(Token::new("Y"))), json!("Y"));
    }
}
