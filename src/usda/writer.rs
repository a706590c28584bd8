//! usda text output.
//!
//! Output is canonical: layer metadata in a fixed order, prim metadata in
//! key order, properties and children in authoring order. Two layers with
//! the same scene description produce the same text, which is what
//! [`Layer`]'s `PartialEq` compares.

use std::fmt::Write;

use crate::sdf::{keys, Layer, PrimIndex, Property, PropertyKind, Variability};
use crate::value::pprint::{format_f64, quote, write_list, write_value, Literal};
use crate::value::{Dictionary, ListOp, ListOpKind, TimeSamples, Value};

const INDENT: &str = "    ";

impl Layer {
    /// Serialize the layer (without its sublayers) as usda text.
    pub fn to_usda(&self) -> String {
        let mut w = UsdaWriter {
            layer: self,
            out: String::new(),
        };
        w.write_layer();
        w.out
    }
}

impl PartialEq for Layer {
    fn eq(&self, other: &Self) -> bool {
        self.to_usda() == other.to_usda()
    }
}

struct UsdaWriter<'l> {
    layer: &'l Layer,
    out: String,
}

impl<'l> UsdaWriter<'l> {
    fn indent(&mut self, level: usize) {
        for _ in 0..level {
            self.out.push_str(INDENT);
        }
    }

    fn write_layer(&mut self) {
        self.out.push_str("#usda 1.0\n");
        self.write_layer_metas();
        let layer = self.layer;
        for &index in layer.root_indices() {
            self.out.push('\n');
            self.write_prim(index, 0);
        }
    }

    fn write_layer_metas(&mut self) {
        let layer = self.layer;
        let m = layer.metas();
        let mut body = String::new();
        let mut entry = |key: &str, value: String| {
            let _ = writeln!(body, "{INDENT}{key} = {value}");
        };
        if let Some(doc) = &m.doc {
            entry("doc", quote(doc));
        }
        if let Some(comment) = &m.comment {
            entry("comment", quote(comment));
        }
        if !m.custom_layer_data.is_empty() {
            entry("customLayerData", value_text(&Value::Dictionary(m.custom_layer_data.clone()), 1));
        }
        if let Some(prim) = &m.default_prim {
            entry("defaultPrim", quote(prim.as_str()));
        }
        let numbers = [
            ("endTimeCode", m.end_time_code),
            ("framesPerSecond", m.frames_per_second),
            ("metersPerUnit", m.meters_per_unit),
            ("startTimeCode", m.start_time_code),
        ];
        for (key, value) in numbers {
            if let Some(v) = value {
                entry(key, format_f64(v));
            }
        }
        if !m.sub_layers.is_empty() {
            let mut list = String::from("[");
            for (i, sub) in m.sub_layers.iter().enumerate() {
                if i > 0 {
                    list.push_str(", ");
                }
                sub.asset_path.write_literal(&mut list);
                if !sub.offset.is_identity() {
                    list.push(' ');
                    sub.offset.write_literal(&mut list);
                }
            }
            list.push(']');
            entry("subLayers", list);
        }
        if let Some(v) = m.time_codes_per_second {
            entry("timeCodesPerSecond", format_f64(v));
        }
        if let Some(axis) = &m.up_axis {
            entry("upAxis", quote(axis.as_str()));
        }
        for (key, value) in &m.other {
            entry(key, value_text(value, 1));
        }

        if !body.is_empty() {
            self.out.push_str("(\n");
            self.out.push_str(&body);
            self.out.push_str(")\n");
        }
    }

    fn write_prim(&mut self, index: PrimIndex, level: usize) {
        let layer = self.layer;
        let Some(prim) = layer.prim(index) else {
            return;
        };
        self.indent(level);
        self.out.push_str(prim.specifier.as_str());
        if let Some(ty) = &prim.type_name {
            self.out.push(' ');
            self.out.push_str(ty.as_str());
        }
        let _ = write!(self.out, " {}", quote(prim.name.as_str()));
        self.write_prim_metas(&prim.metas, level);
        self.out.push('\n');
        self.indent(level);
        self.out.push_str("{\n");

        let mut first = true;
        self.write_body(&prim.properties, &prim.metas, &prim.children, level + 1, &mut first);
        for set in &prim.variant_sets {
            if !first {
                self.out.push('\n');
            }
            first = false;
            self.indent(level + 1);
            let _ = writeln!(self.out, "variantSet {} = {{", quote(&set.name));
            for variant in &set.variants {
                self.indent(level + 2);
                self.out.push_str(&quote(&variant.name));
                self.write_prim_metas(&variant.metas, level + 2);
                self.out.push_str(" {\n");
                let mut inner_first = true;
                self.write_body(&variant.properties, &variant.metas, &variant.children, level + 3, &mut inner_first);
                self.indent(level + 2);
                self.out.push_str("}\n");
            }
            self.indent(level + 1);
            self.out.push_str("}\n");
        }

        self.indent(level);
        self.out.push_str("}\n");
    }

    fn write_body(
        &mut self,
        properties: &[Property],
        metas: &Dictionary,
        children: &[PrimIndex],
        level: usize,
        first: &mut bool,
    ) {
        for property in properties {
            self.write_property(property, level);
            *first = false;
        }
        for (key, keyword) in [(keys::PROPERTY_ORDER, "properties"), (keys::PRIM_ORDER, "nameChildren")] {
            if let Some(value) = metas.get(key) {
                self.indent(level);
                let _ = writeln!(self.out, "reorder {keyword} = {}", value_text(value, level));
                *first = false;
            }
        }
        for &child in children {
            if !*first {
                self.out.push('\n');
            }
            *first = false;
            self.write_prim(child, level);
        }
    }

    /// ` (\n    key = value\n)` after a prim or variant header.
    fn write_prim_metas(&mut self, metas: &Dictionary, level: usize) {
        let entries: Vec<_> = metas
            .iter()
            .filter(|(k, _)| k.as_str() != keys::PRIM_ORDER && k.as_str() != keys::PROPERTY_ORDER)
            .collect();
        if entries.is_empty() {
            return;
        }
        self.out.push_str(" (\n");
        for (key, value) in entries {
            match value {
                Value::ReferenceListOp(op) => self.list_op_lines(level + 1, key, op),
                Value::PayloadListOp(op) => self.list_op_lines(level + 1, key, op),
                Value::PathListOp(op) => self.list_op_lines(level + 1, key, op),
                Value::StringListOp(op) => self.list_op_lines(level + 1, key, op),
                Value::TokenListOp(op) => self.list_op_lines(level + 1, key, op),
                Value::IntListOp(op) => self.list_op_lines(level + 1, key, op),
                Value::Int64ListOp(op) => self.list_op_lines(level + 1, key, op),
                Value::UIntListOp(op) => self.list_op_lines(level + 1, key, op),
                Value::UInt64ListOp(op) => self.list_op_lines(level + 1, key, op),
                other => {
                    self.indent(level + 1);
                    let _ = writeln!(self.out, "{key} = {}", value_text(other, level + 1));
                }
            }
        }
        self.indent(level);
        self.out.push(')');
    }

    /// One `[qualifier] key = [items]` line per list-op statement.
    fn list_op_lines<T: Literal + Clone + PartialEq>(&mut self, level: usize, key: &str, op: &ListOp<T>) {
        for (kind, items) in op.statements() {
            self.indent(level);
            if kind != ListOpKind::Explicit {
                self.out.push_str(kind.keyword());
                self.out.push(' ');
            }
            let _ = write!(self.out, "{key} = ");
            write_list(&mut self.out, items);
            self.out.push('\n');
        }
    }

    fn write_property(&mut self, property: &Property, level: usize) {
        let mut decl = String::new();
        if property.custom {
            decl.push_str("custom ");
        }
        match &property.kind {
            PropertyKind::Attribute(attr) => {
                match property.variability {
                    Variability::Uniform => decl.push_str("uniform "),
                    Variability::Config => decl.push_str("config "),
                    Variability::Varying => {}
                }
                let _ = write!(decl, "{} {}", attr.type_name, property.name);

                let bare = attr.time_samples.is_none() && attr.connections.is_none();
                if attr.default.is_some() || !property.metas.is_empty() || bare {
                    self.indent(level);
                    self.out.push_str(&decl);
                    if let Some(value) = &attr.default {
                        self.out.push_str(" = ");
                        write_value(&mut self.out, value, level);
                    }
                    self.write_property_metas(&property.metas, level);
                    self.out.push('\n');
                }
                if let Some(samples) = &attr.time_samples {
                    self.indent(level);
                    let _ = write!(self.out, "{decl}.timeSamples = ");
                    self.write_time_samples(samples, level);
                    self.out.push('\n');
                }
                if let Some(op) = &attr.connections {
                    self.list_op_lines(level, &format!("{decl}.connect"), op);
                }
            }
            PropertyKind::Relationship(rel) => {
                let _ = write!(decl, "rel {}", property.name);
                match &rel.targets {
                    Some(op) if op.is_explicit() => {
                        self.indent(level);
                        let _ = write!(self.out, "{decl} = ");
                        write_list(&mut self.out, op.explicit_items());
                        self.write_property_metas(&property.metas, level);
                        self.out.push('\n');
                    }
                    targets => {
                        if targets.is_none() || !property.metas.is_empty() {
                            self.indent(level);
                            self.out.push_str(&decl);
                            self.write_property_metas(&property.metas, level);
                            self.out.push('\n');
                        }
                        if let Some(op) = targets {
                            self.list_op_lines(level, &decl, op);
                        }
                    }
                }
            }
        }
    }

    fn write_property_metas(&mut self, metas: &Dictionary, level: usize) {
        if metas.is_empty() {
            return;
        }
        self.out.push_str(" (\n");
        for (key, value) in metas {
            self.indent(level + 1);
            let _ = writeln!(self.out, "{key} = {}", value_text(value, level + 1));
        }
        self.indent(level);
        self.out.push(')');
    }

    fn write_time_samples(&mut self, samples: &TimeSamples, level: usize) {
        self.out.push_str("{\n");
        for (time, value) in samples.iter() {
            self.indent(level + 1);
            let _ = write!(self.out, "{}: ", format_f64(*time));
            write_value(&mut self.out, value, level + 1);
            self.out.push_str(",\n");
        }
        self.indent(level);
        self.out.push('}');
    }
}

fn value_text(value: &Value, level: usize) -> String {
    let mut s = String::new();
    write_value(&mut s, value, level);
    s
}

#[cfg(test)]
mod tests {
    use crate::sdf::{Layer, Path};
    use crate::usda::parse_layer;
    use crate::util::{Limits, Warnings};

    fn parse(src: &str) -> Layer {
        parse_layer(src, "t.usda", &Limits::default(), &mut Warnings::new()).unwrap()
    }

    const SCENE: &str = r#"#usda 1.0
(
    defaultPrim = "World"
    metersPerUnit = 0.01
    subLayers = [@./base.usda@ (offset = 5; scale = 2)]
    upAxis = "Y"
)

def Xform "World" (
    kind = "assembly"
)
{
    def Mesh "Geo" (
        prepend references = [@./geo.usda@</Geo>]
        delete inherits = [</_bad>]
        variants = {
            string lod = "low"
        }
        prepend variantSets = ["lod"]
    )
    {
        uniform token subdivisionScheme = "none"
        point3f[] points = [(0, 0, 0), (1, 0, 0), (0, 1, 0)] (
            interpolation = "vertex"
        )
        float opacity.timeSamples = {
            0: 1,
            12.5: None,
        }
        prepend rel material:binding = [</World/Mat>]
        custom rel proxy
        variantSet "lod" = {
            "low" {
                int detail = 1
            }
            "high" {
                int detail = 3

                def Scope "Extra"
                {
                }
            }
        }
    }

    def Material "Mat"
    {
        token outputs:surface.connect = [</World/Mat/Shader.outputs:surface>]
    }
}
"#;

    #[test]
    fn test_canonical_output_reparses_identically() {
        let layer = parse(SCENE);
        let text = layer.to_usda();
        let again = parse(&text);
        assert_eq!(again.to_usda(), text);
        assert!(layer == again);
    }

    #[test]
    fn test_output_shape() {
        let text = parse(SCENE).to_usda();
        assert!(text.starts_with("#usda 1.0\n(\n    defaultPrim = \"World\"\n"));
        assert!(text.contains("    subLayers = [@./base.usda@ (offset = 5; scale = 2)]\n"));
        assert!(text.contains("        prepend references = [@./geo.usda@</Geo>]\n"));
        assert!(text.contains("        delete inherits = [</_bad>]\n"));
        assert!(text.contains("        float opacity.timeSamples = {\n            0: 1,\n            12.5: None,\n        }\n"));
        assert!(text.contains("        prepend rel material:binding = [</World/Mat>]\n"));
        assert!(text.contains("        custom rel proxy\n"));
        assert!(text.contains("        variantSet \"lod\" = {\n"));
    }

    #[test]
    fn test_layer_equality_ignores_identifier() {
        let mut a = parse("#usda 1.0\ndef \"A\" {\n    int x = 1\n}\n");
        let b = parse("#usda 1.0\ndef \"A\"\n{\n    int x = 1\n}\n");
        a.set_identifier("other.usda");
        assert!(a == b);
        let c = parse("#usda 1.0\ndef \"A\" {\n    int x = 2\n}\n");
        assert!(a != c);
        assert!(a.find_prim(&Path::new("/A").unwrap()).is_some());
    }
}
