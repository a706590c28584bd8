//! usda literal formatting for [`Value`].

use std::fmt::{self, Write};

use half::f16;

use super::{ListOp, ListOpKind, Matrix2d, Matrix3d, Matrix4d, Matrix4f, Quatd, Quatf, Quath, TimeCode, Value};
use crate::sdf::{is_valid_identifier, AssetPath, LayerOffset, Path, Payload, Reference, Token};

const INDENT: &str = "    ";

/// Format a double the way usda spells it: shortest round-trip digits,
/// `inf` / `-inf` / `nan` for non-finite values.
pub fn format_f64(v: f64) -> String {
    if v.is_nan() {
        "nan".to_owned()
    } else if v.is_infinite() {
        (if v > 0.0 { "inf" } else { "-inf" }).to_owned()
    } else {
        format!("{v}")
    }
}

fn format_f32(v: f32) -> String {
    if v.is_finite() {
        format!("{v}")
    } else {
        format_f64(f64::from(v))
    }
}

/// Double-quote a string, escaping quotes, backslashes and control characters.
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Dictionary keys stay bare when they are identifiers.
pub fn format_key(k: &str) -> String {
    if is_valid_identifier(k) {
        k.to_owned()
    } else {
        quote(k)
    }
}

/// Something with a usda literal spelling.
pub trait Literal {
    fn write_literal(&self, out: &mut String);
}

macro_rules! int_literal {
    ($($ty:ty),*) => {
        $(
            impl Literal for $ty {
                fn write_literal(&self, out: &mut String) {
                    let _ = write!(out, "{self}");
                }
            }
        )*
    };
}

int_literal!(u8, i32, u32, i64, u64);

impl Literal for bool {
    fn write_literal(&self, out: &mut String) {
        out.push_str(if *self { "true" } else { "false" });
    }
}

impl Literal for f16 {
    fn write_literal(&self, out: &mut String) {
        out.push_str(&format_f32(self.to_f32()));
    }
}

impl Literal for f32 {
    fn write_literal(&self, out: &mut String) {
        out.push_str(&format_f32(*self));
    }
}

impl Literal for f64 {
    fn write_literal(&self, out: &mut String) {
        out.push_str(&format_f64(*self));
    }
}

impl Literal for TimeCode {
    fn write_literal(&self, out: &mut String) {
        out.push_str(&format_f64(self.0));
    }
}

impl<T: Literal, const N: usize> Literal for [T; N] {
    fn write_literal(&self, out: &mut String) {
        write_tuple(out, self.iter());
    }
}

fn write_tuple<'a, T: Literal + 'a>(out: &mut String, items: impl Iterator<Item = &'a T>) {
    out.push('(');
    for (i, item) in items.enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        item.write_literal(out);
    }
    out.push(')');
}

macro_rules! quat_literal {
    ($($ty:ty),*) => {
        $(
            impl Literal for $ty {
                fn write_literal(&self, out: &mut String) {
                    let [x, y, z, w] = self.0;
                    [w, x, y, z].write_literal(out);
                }
            }
        )*
    };
}

quat_literal!(Quath, Quatf, Quatd);

macro_rules! matrix_literal {
    ($($ty:ty),*) => {
        $(
            impl Literal for $ty {
                fn write_literal(&self, out: &mut String) {
                    out.push_str("( ");
                    for (i, row) in self.0.iter().enumerate() {
                        if i > 0 {
                            out.push_str(", ");
                        }
                        row.write_literal(out);
                    }
                    out.push_str(" )");
                }
            }
        )*
    };
}

matrix_literal!(Matrix2d, Matrix3d, Matrix4d, Matrix4f);

impl Literal for Token {
    fn write_literal(&self, out: &mut String) {
        out.push_str(&quote(self.as_str()));
    }
}

impl Literal for String {
    fn write_literal(&self, out: &mut String) {
        out.push_str(&quote(self));
    }
}

impl Literal for AssetPath {
    fn write_literal(&self, out: &mut String) {
        let _ = write!(out, "{self}");
    }
}

impl Literal for Path {
    fn write_literal(&self, out: &mut String) {
        let _ = write!(out, "<{self}>");
    }
}

impl Literal for LayerOffset {
    fn write_literal(&self, out: &mut String) {
        let _ = write!(
            out,
            "(offset = {}; scale = {})",
            format_f64(self.offset),
            format_f64(self.scale)
        );
    }
}

fn write_arc_offset(out: &mut String, offset: &LayerOffset) {
    if !offset.is_identity() {
        out.push(' ');
        offset.write_literal(out);
    }
}

impl Literal for Reference {
    fn write_literal(&self, out: &mut String) {
        let _ = write!(out, "{self}");
        write_arc_offset(out, &self.layer_offset);
    }
}

impl Literal for Payload {
    fn write_literal(&self, out: &mut String) {
        let _ = write!(out, "{self}");
        write_arc_offset(out, &self.layer_offset);
    }
}

/// `[a, b, c]`
pub fn write_list<T: Literal>(out: &mut String, items: &[T]) {
    out.push('[');
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        item.write_literal(out);
    }
    out.push(']');
}

fn write_list_op<T: Literal + Clone + PartialEq>(out: &mut String, op: &ListOp<T>) {
    for (i, (kind, items)) in op.statements().into_iter().enumerate() {
        if i > 0 {
            out.push_str("; ");
        }
        if kind != ListOpKind::Explicit {
            out.push_str(kind.keyword());
            out.push(' ');
        }
        write_list(out, items);
    }
}

fn push_indent(out: &mut String, level: usize) {
    for _ in 0..level {
        out.push_str(INDENT);
    }
}

/// Write `v` as a usda literal. Multi-line forms (dictionaries, time
/// samples) indent their body one level deeper than `indent`.
pub fn write_value(out: &mut String, v: &Value, indent: usize) {
    use Value::*;
    macro_rules! lit {
        ([$($plain:ident),*], [$($role:ident),*], [$($plain_arr:ident),*], [$($role_arr:ident),*]) => {
            match v {
                $( $plain(x) => x.write_literal(out), )*
                $( $role(x, _) => x.write_literal(out), )*
                $( $plain_arr(x) => write_list(out, x), )*
                $( $role_arr(x, _) => write_list(out, x), )*
                Block => out.push_str("None"),
                Dictionary(d) => write_dictionary(out, d.iter().map(|(k, v)| (k.as_str(), v)), indent),
                VariantSelection(m) => {
                    let as_values: Vec<(&str, super::Value)> =
                        m.iter().map(|(k, v)| (k.as_str(), super::Value::String(v.clone()))).collect();
                    write_dictionary(out, as_values.iter().map(|(k, v)| (*k, v)), indent);
                }
                TimeSamples(ts) => {
                    out.push_str("{\n");
                    for (t, sample) in ts.iter() {
                        push_indent(out, indent + 1);
                        out.push_str(&format_f64(*t));
                        out.push_str(": ");
                        write_value(out, sample, indent + 1);
                        out.push_str(",\n");
                    }
                    push_indent(out, indent);
                    out.push('}');
                }
                TokenListOp(op) => write_list_op(out, op),
                StringListOp(op) => write_list_op(out, op),
                PathListOp(op) => write_list_op(out, op),
                ReferenceListOp(op) => write_list_op(out, op),
                PayloadListOp(op) => write_list_op(out, op),
                IntListOp(op) => write_list_op(out, op),
                Int64ListOp(op) => write_list_op(out, op),
                UIntListOp(op) => write_list_op(out, op),
                UInt64ListOp(op) => write_list_op(out, op),
                Reference(r) => r.write_literal(out),
                Payload(p) => p.write_literal(out),
                Specifier(s) => out.push_str(s.as_str()),
                Variability(s) => out.push_str(s.as_str()),
                Permission(s) => out.push_str(s.as_str()),
                Opaque(s) => out.push_str(&quote(s)),
            }
        };
    }
    lit!(
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

/// `{ type key = value ... }` with one entry per line.
pub fn write_dictionary<'a>(
    out: &mut String,
    entries: impl Iterator<Item = (&'a str, &'a Value)>,
    indent: usize,
) {
    let mut entries = entries.peekable();
    if entries.peek().is_none() {
        out.push_str("{\n");
        push_indent(out, indent);
        out.push('}');
        return;
    }
    out.push_str("{\n");
    for (k, v) in entries {
        push_indent(out, indent + 1);
        let _ = write!(out, "{} {} = ", v.type_name(), format_key(k));
        write_value(out, v, indent + 1);
        out.push('\n');
    }
    push_indent(out, indent);
    out.push('}');
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = String::new();
        write_value(&mut s, self, 0);
        f.write_str(&s)
    }
}
