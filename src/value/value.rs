//! The dynamically typed [`Value`] container.

use std::collections::BTreeMap;

use half::f16;

use super::typed::{ArrayElement, ValueType};
use super::types::{type_name, Role, TypeId, ARRAY_BIT};
use super::{ListOp, Matrix2d, Matrix3d, Matrix4d, Matrix4f, Quatd, Quatf, Quath, TimeCode, TimeSamples};
use crate::sdf::{AssetPath, LayerOffset, Path, Payload, Permission, Reference, Specifier, Token, Variability};
use crate::util::{Error, Result};

/// String-keyed map of values (`customData`, `assetInfo`, ...). Keys are kept sorted.
pub type Dictionary = BTreeMap<String, Value>;

/// Variant set name to selected variant name.
pub type VariantSelectionMap = BTreeMap<String, String>;

/// A tagged value of any USD type.
///
/// Vector and matrix variants carry a [`Role`]; the role never changes the
/// stored representation.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// Explicit "no value" (`None` in usda).
    Block,

    Bool(bool),
    UChar(u8),
    Int(i32),
    UInt(u32),
    Int64(i64),
    UInt64(u64),
    Half(f16),
    Float(f32),
    Double(f64),
    TimeCode(TimeCode),
    Int2([i32; 2]),
    Int3([i32; 3]),
    Int4([i32; 4]),
    UInt2([u32; 2]),
    UInt3([u32; 3]),
    UInt4([u32; 4]),
    Half2([f16; 2], Role),
    Half3([f16; 3], Role),
    Half4([f16; 4], Role),
    Float2([f32; 2], Role),
    Float3([f32; 3], Role),
    Float4([f32; 4], Role),
    Double2([f64; 2], Role),
    Double3([f64; 3], Role),
    Double4([f64; 4], Role),
    Quath(Quath),
    Quatf(Quatf),
    Quatd(Quatd),
    Matrix2d(Matrix2d),
    Matrix3d(Matrix3d),
    Matrix4d(Matrix4d, Role),
    Matrix4f(Matrix4f),
    Token(Token),
    String(String),
    AssetPath(AssetPath),

    BoolArray(Vec<bool>),
    UCharArray(Vec<u8>),
    IntArray(Vec<i32>),
    UIntArray(Vec<u32>),
    Int64Array(Vec<i64>),
    UInt64Array(Vec<u64>),
    HalfArray(Vec<f16>),
    FloatArray(Vec<f32>),
    DoubleArray(Vec<f64>),
    TimeCodeArray(Vec<TimeCode>),
    Int2Array(Vec<[i32; 2]>),
    Int3Array(Vec<[i32; 3]>),
    Int4Array(Vec<[i32; 4]>),
    UInt2Array(Vec<[u32; 2]>),
    UInt3Array(Vec<[u32; 3]>),
    UInt4Array(Vec<[u32; 4]>),
    Half2Array(Vec<[f16; 2]>, Role),
    Half3Array(Vec<[f16; 3]>, Role),
    Half4Array(Vec<[f16; 4]>, Role),
    Float2Array(Vec<[f32; 2]>, Role),
    Float3Array(Vec<[f32; 3]>, Role),
    Float4Array(Vec<[f32; 4]>, Role),
    Double2Array(Vec<[f64; 2]>, Role),
    Double3Array(Vec<[f64; 3]>, Role),
    Double4Array(Vec<[f64; 4]>, Role),
    QuathArray(Vec<Quath>),
    QuatfArray(Vec<Quatf>),
    QuatdArray(Vec<Quatd>),
    Matrix2dArray(Vec<Matrix2d>),
    Matrix3dArray(Vec<Matrix3d>),
    Matrix4dArray(Vec<Matrix4d>, Role),
    Matrix4fArray(Vec<Matrix4f>),
    TokenArray(Vec<Token>),
    StringArray(Vec<String>),
    AssetPathArray(Vec<AssetPath>),

    Dictionary(Dictionary),
    TimeSamples(Box<TimeSamples>),
    TokenListOp(ListOp<Token>),
    StringListOp(ListOp<String>),
    PathListOp(ListOp<Path>),
    ReferenceListOp(ListOp<Reference>),
    PayloadListOp(ListOp<Payload>),
    IntListOp(ListOp<i32>),
    Int64ListOp(ListOp<i64>),
    UIntListOp(ListOp<u32>),
    UInt64ListOp(ListOp<u64>),
    Path(Path),
    PathVector(Vec<Path>),
    Reference(Reference),
    Payload(Payload),
    LayerOffset(LayerOffset),
    LayerOffsetVector(Vec<LayerOffset>),
    Specifier(Specifier),
    Variability(Variability),
    Permission(Permission),
    VariantSelection(VariantSelectionMap),
    /// A value of a type this reader does not model, kept as text.
    Opaque(String),
}

macro_rules! array_len {
    ($self:expr, [$($plain:ident),*], [$($role:ident),*]) => {
        match $self {
            $( Value::$plain(v) => Some(v.len()), )*
            $( Value::$role(v, _) => Some(v.len()), )*
            _ => None,
        }
    };
}

macro_rules! zip_list_ops {
    ($lhs:expr, $rhs:expr, |$a:ident, $b:ident| $body:expr) => {
        zip_list_ops!(@arms $lhs, $rhs, $a, $b, $body;
            TokenListOp, StringListOp, PathListOp, ReferenceListOp, PayloadListOp, IntListOp,
            Int64ListOp, UIntListOp, UInt64ListOp)
    };
    (@arms $lhs:expr, $rhs:expr, $a:ident, $b:ident, $body:expr; $($v:ident),*) => {
        match ($lhs, $rhs) {
            $( (Value::$v($a), Value::$v($b)) => {
                $body;
                true
            } )*
            _ => false,
        }
    };
}

impl Value {
    /// Wrap a typed scalar.
    pub fn new<T: ValueType>(v: T) -> Value {
        v.into_value()
    }

    /// Wrap a typed array.
    pub fn from_vec<T: ArrayElement>(v: Vec<T>) -> Value {
        T::vec_into_value(v)
    }

    /// Scalar type of the value, role applied, array bit cleared.
    pub fn scalar_type(&self) -> TypeId {
        use Value::*;
        match self {
            Block => TypeId::Block,
            Bool(_) | BoolArray(_) => TypeId::Bool,
            UChar(_) | UCharArray(_) => TypeId::UChar,
            Int(_) | IntArray(_) => TypeId::Int,
            UInt(_) | UIntArray(_) => TypeId::UInt,
            Int64(_) | Int64Array(_) => TypeId::Int64,
            UInt64(_) | UInt64Array(_) => TypeId::UInt64,
            Half(_) | HalfArray(_) => TypeId::Half,
            Float(_) | FloatArray(_) => TypeId::Float,
            Double(_) | DoubleArray(_) => TypeId::Double,
            TimeCode(_) | TimeCodeArray(_) => TypeId::TimeCode,
            Int2(_) | Int2Array(_) => TypeId::Int2,
            Int3(_) | Int3Array(_) => TypeId::Int3,
            Int4(_) | Int4Array(_) => TypeId::Int4,
            UInt2(_) | UInt2Array(_) => TypeId::UInt2,
            UInt3(_) | UInt3Array(_) => TypeId::UInt3,
            UInt4(_) | UInt4Array(_) => TypeId::UInt4,
            Half2(_, r) | Half2Array(_, r) => TypeId::Half2.with_role(*r),
            Half3(_, r) | Half3Array(_, r) => TypeId::Half3.with_role(*r),
            Half4(_, r) | Half4Array(_, r) => TypeId::Half4.with_role(*r),
            Float2(_, r) | Float2Array(_, r) => TypeId::Float2.with_role(*r),
            Float3(_, r) | Float3Array(_, r) => TypeId::Float3.with_role(*r),
            Float4(_, r) | Float4Array(_, r) => TypeId::Float4.with_role(*r),
            Double2(_, r) | Double2Array(_, r) => TypeId::Double2.with_role(*r),
            Double3(_, r) | Double3Array(_, r) => TypeId::Double3.with_role(*r),
            Double4(_, r) | Double4Array(_, r) => TypeId::Double4.with_role(*r),
            Quath(_) | QuathArray(_) => TypeId::Quath,
            Quatf(_) | QuatfArray(_) => TypeId::Quatf,
            Quatd(_) | QuatdArray(_) => TypeId::Quatd,
            Matrix2d(_) | Matrix2dArray(_) => TypeId::Matrix2d,
            Matrix3d(_) | Matrix3dArray(_) => TypeId::Matrix3d,
            Matrix4d(_, r) | Matrix4dArray(_, r) => TypeId::Matrix4d.with_role(*r),
            Matrix4f(_) | Matrix4fArray(_) => TypeId::Matrix4f,
            Token(_) | TokenArray(_) => TypeId::Token,
            String(_) | StringArray(_) => TypeId::String,
            AssetPath(_) | AssetPathArray(_) => TypeId::AssetPath,
            Dictionary(_) => TypeId::Dictionary,
            TimeSamples(_) => TypeId::TimeSamples,
            TokenListOp(_) => TypeId::TokenListOp,
            StringListOp(_) => TypeId::StringListOp,
            PathListOp(_) => TypeId::PathListOp,
            ReferenceListOp(_) => TypeId::ReferenceListOp,
            PayloadListOp(_) => TypeId::PayloadListOp,
            IntListOp(_) => TypeId::IntListOp,
            Int64ListOp(_) => TypeId::Int64ListOp,
            UIntListOp(_) => TypeId::UIntListOp,
            UInt64ListOp(_) => TypeId::UInt64ListOp,
            Path(_) | PathVector(_) => TypeId::Path,
            Reference(_) => TypeId::Reference,
            Payload(_) => TypeId::Payload,
            LayerOffset(_) | LayerOffsetVector(_) => TypeId::LayerOffset,
            Specifier(_) => TypeId::Specifier,
            Variability(_) => TypeId::Variability,
            Permission(_) => TypeId::Permission,
            VariantSelection(_) => TypeId::VariantSelectionMap,
            Opaque(_) => TypeId::Opaque,
        }
    }

    /// Numeric type identifier, with [`ARRAY_BIT`] set for arrays.
    pub fn type_id(&self) -> u32 {
        let id = self.scalar_type() as u32;
        if self.is_array() {
            id | ARRAY_BIT
        } else {
            id
        }
    }

    /// usda spelling of the value's type (`point3f[]`, `token`, ...).
    pub fn type_name(&self) -> &'static str {
        type_name(self.type_id())
    }

    /// Role carried by vector and matrix values.
    pub fn role(&self) -> Role {
        self.scalar_type().base_and_role().1
    }

    pub fn is_array(&self) -> bool {
        self.array_len().is_some()
    }

    #[inline]
    pub fn is_block(&self) -> bool {
        matches!(self, Value::Block)
    }

    /// Element count of an array value.
    pub fn array_len(&self) -> Option<usize> {
        array_len!(
            self,
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

    /// Element count, `0` for scalars.
    pub fn array_size(&self) -> usize {
        self.array_len().unwrap_or(0)
    }

    /// Size in bytes of an array's elements (`len * size_of(element)`).
    pub fn byte_len(&self) -> Option<usize> {
        self.array_len().map(|n| n * self.scalar_type().size_of())
    }

    /// Typed scalar access. Role types match only their exact role; storage
    /// types (`[f32; 3]`) match regardless of role.
    pub fn get<T: ValueType>(&self) -> Option<&T> {
        T::from_value(self)
    }

    /// Typed array access.
    pub fn get_array<T: ArrayElement>(&self) -> Option<&[T]> {
        T::slice_from_value(self)
    }

    /// Typed array access returning an owned copy.
    pub fn get_owned<T: ArrayElement + Clone>(&self) -> Option<Vec<T>> {
        self.get_array::<T>().map(<[T]>::to_vec)
    }

    /// Typed scalar access reporting [`Error::TypeMismatch`].
    pub fn try_get<T: ValueType>(&self) -> Result<&T> {
        T::from_value(self).ok_or_else(|| Error::type_mismatch(T::TYPE_ID.name(), self.type_name()))
    }

    /// Typed array access reporting [`Error::TypeMismatch`].
    pub fn try_get_array<T: ArrayElement>(&self) -> Result<&[T]> {
        T::slice_from_value(self)
            .ok_or_else(|| Error::type_mismatch(T::TYPE_ID.array_name(), self.type_name()))
    }

    /// Bounds-checked element access.
    pub fn index<T: ArrayElement>(&self, i: usize) -> Result<&T> {
        let items = self.try_get_array::<T>()?;
        items.get(i).ok_or(Error::OutOfRange {
            index: i,
            len: items.len(),
        })
    }

    /// String-like payload of token, string and asset values.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Token(t) => Some(t.as_str()),
            Value::String(s) | Value::Opaque(s) => Some(s),
            Value::AssetPath(a) => Some(a.as_str()),
            _ => None,
        }
    }

    /// Numeric scalar widened to `f64`.
    pub fn as_f64(&self) -> Option<f64> {
        match *self {
            Value::Double(v) => Some(v),
            Value::TimeCode(v) => Some(v.0),
            Value::Float(v) => Some(f64::from(v)),
            Value::Half(v) => Some(f64::from(v.to_f32())),
            Value::Int(v) => Some(f64::from(v)),
            Value::UInt(v) => Some(f64::from(v)),
            Value::Int64(v) => Some(v as f64),
            Value::UInt64(v) => Some(v as f64),
            Value::UChar(v) => Some(f64::from(v)),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            Value::Bool(b) => Some(b),
            Value::Int(v) => Some(v != 0),
            _ => None,
        }
    }

    /// Copy the value with a different role. Values that carry no role are
    /// returned unchanged.
    pub fn with_role(mut self, role: Role) -> Value {
        use Value::*;
        match &mut self {
            Half2(_, r) | Half3(_, r) | Half4(_, r) | Float2(_, r) | Float3(_, r) | Float4(_, r)
            | Double2(_, r) | Double3(_, r) | Double4(_, r) | Matrix4d(_, r) | Half2Array(_, r)
            | Half3Array(_, r) | Half4Array(_, r) | Float2Array(_, r) | Float3Array(_, r)
            | Float4Array(_, r) | Double2Array(_, r) | Double3Array(_, r) | Double4Array(_, r)
            | Matrix4dArray(_, r) => *r = role,
            _ => {}
        }
        self
    }

    pub fn is_list_op(&self) -> bool {
        matches!(
            self,
            Value::TokenListOp(_)
                | Value::StringListOp(_)
                | Value::PathListOp(_)
                | Value::ReferenceListOp(_)
                | Value::PayloadListOp(_)
                | Value::IntListOp(_)
                | Value::Int64ListOp(_)
                | Value::UIntListOp(_)
                | Value::UInt64ListOp(_)
        )
    }

    /// Merge a later list-op statement of the same block into this one
    /// (see [`ListOp::merge_statement`]).
    ///
    /// Returns `false`, leaving `self` untouched, unless both values are
    /// list-ops of the same item type.
    pub fn merge_list_statement(&mut self, later: &Value) -> bool {
        zip_list_ops!(self, later, |a, b| a.merge_statement(b))
    }

    /// Compose a stronger layer's list-op over this accumulated one
    /// (see [`ListOp::compose_over`]). Same return contract as
    /// [`merge_list_statement`](Self::merge_list_statement).
    pub fn compose_list_op(&mut self, stronger: &Value) -> bool {
        zip_list_ops!(self, stronger, |a, b| *a = b.compose_over(a))
    }

    /// Linear interpolation between two values of the same type.
    ///
    /// `None` when the type does not interpolate (integers, strings,
    /// matrices, ...), the roles differ, or array lengths differ.
    pub fn lerp(&self, other: &Value, t: f64) -> Option<Value> {
        use Value::*;
        macro_rules! arms {
            ([$($plain:ident),*], [$($role:ident),*], [$($plain_arr:ident),*], [$($role_arr:ident),*]) => {
                match (self, other) {
                    $( ($plain(a), $plain(b)) => $plain(a.lerp(*b, t)), )*
                    $( ($role(a, r), $role(b, s)) if r == s => $role(a.lerp(*b, t), *r), )*
                    $( ($plain_arr(a), $plain_arr(b)) => $plain_arr(lerp_slice(a, b, t)?), )*
                    $( ($role_arr(a, r), $role_arr(b, s)) if r == s => $role_arr(lerp_slice(a, b, t)?, *r), )*
                    _ => return None,
                }
            };
        }
        Some(arms!(
            [Half, Float, Double, TimeCode, Quath, Quatf, Quatd],
            [Half2, Half3, Half4, Float2, Float3, Float4, Double2, Double3, Double4],
            [HalfArray, FloatArray, DoubleArray, TimeCodeArray, QuathArray, QuatfArray, QuatdArray],
            [
                Half2Array, Half3Array, Half4Array, Float2Array, Float3Array, Float4Array,
                Double2Array, Double3Array, Double4Array
            ]
        ))
    }
}

/// Interpolation between two samples: component-wise for scalars and
/// vectors, spherical for quaternions.
pub(crate) trait Lerp: Copy {
    fn lerp(self, other: Self, t: f64) -> Self;
}

impl Lerp for f64 {
    #[inline]
    fn lerp(self, other: Self, t: f64) -> Self {
        self + (other - self) * t
    }
}

impl Lerp for f32 {
    #[inline]
    fn lerp(self, other: Self, t: f64) -> Self {
        self + (other - self) * t as f32
    }
}

impl Lerp for f16 {
    #[inline]
    fn lerp(self, other: Self, t: f64) -> Self {
        f16::from_f32(self.to_f32().lerp(other.to_f32(), t))
    }
}

impl Lerp for TimeCode {
    #[inline]
    fn lerp(self, other: Self, t: f64) -> Self {
        TimeCode(self.0.lerp(other.0, t))
    }
}

impl<T: Lerp, const N: usize> Lerp for [T; N] {
    fn lerp(self, other: Self, t: f64) -> Self {
        let mut out = self;
        for (o, b) in out.iter_mut().zip(other) {
            *o = o.lerp(b, t);
        }
        out
    }
}

fn lerp_slice<T: Lerp>(a: &[T], b: &[T], t: f64) -> Option<Vec<T>> {
    (a.len() == b.len()).then(|| a.iter().zip(b).map(|(x, y)| x.lerp(*y, t)).collect())
}

macro_rules! from_impl {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    v.into_value()
                }
            }
        )*
    };
}

from_impl!(bool, i32, u32, i64, u64, f32, f64, f16, Token, String, AssetPath, Path, Dictionary);

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl<T: ArrayElement> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        T::vec_into_value(v)
    }
}
