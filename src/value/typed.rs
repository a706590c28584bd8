//! Compile-time typed access to [`Value`].
//!
//! Storage types (`f32`, `[f32; 3]`, [`Matrix4d`]) match a value of that
//! layout whatever its role. Role types ([`Point3f`], [`Color4d`],
//! [`Frame4d`]) are transparent wrappers that only match their own role.

use bytemuck::allocation::TransparentWrapperAlloc;
use bytemuck::{Pod, TransparentWrapper, Zeroable};
use half::f16;

use super::types::{Role, TypeId};
use super::{Dictionary, ListOp, TimeSamples, Value, VariantSelectionMap};
use crate::sdf::{AssetPath, LayerOffset, Path, Payload, Permission, Reference, Specifier, Token, Variability};

/// A Rust type that can be stored in and borrowed from a [`Value`].
pub trait ValueType: Sized + Clone {
    const TYPE_ID: TypeId;

    fn from_value(v: &Value) -> Option<&Self>;

    fn into_value(self) -> Value;
}

/// A [`ValueType`] that also has an array form.
pub trait ArrayElement: ValueType {
    fn slice_from_value(v: &Value) -> Option<&[Self]>;

    fn vec_into_value(v: Vec<Self>) -> Value;
}

/// Quaternion with half components stored `[x, y, z, w]`.
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Quath(pub [f16; 4]);

/// Quaternion stored `[x, y, z, w]`. usda spells it `(w, x, y, z)`.
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Quatf(pub [f32; 4]);

#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Quatd(pub [f64; 4]);

impl Default for Quath {
    fn default() -> Self {
        Self([f16::ZERO, f16::ZERO, f16::ZERO, f16::ONE])
    }
}

impl Default for Quatf {
    fn default() -> Self {
        Self([0.0, 0.0, 0.0, 1.0])
    }
}

impl Default for Quatd {
    fn default() -> Self {
        Self([0.0, 0.0, 0.0, 1.0])
    }
}

/// Row-major 2x2 matrix.
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Matrix2d(pub [[f64; 2]; 2]);

/// Row-major 3x3 matrix.
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Matrix3d(pub [[f64; 3]; 3]);

/// Row-major 4x4 matrix (translation in the last row).
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Matrix4d(pub [[f64; 4]; 4]);

#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct Matrix4f(pub [[f32; 4]; 4]);

macro_rules! identity {
    ($name:ident, $n:expr, $one:expr, $zero:expr) => {
        impl Default for $name {
            fn default() -> Self {
                let mut m = [[$zero; $n]; $n];
                for (i, row) in m.iter_mut().enumerate() {
                    row[i] = $one;
                }
                Self(m)
            }
        }
    };
}

identity!(Matrix2d, 2, 1.0f64, 0.0f64);
identity!(Matrix3d, 3, 1.0f64, 0.0f64);
identity!(Matrix4d, 4, 1.0f64, 0.0f64);
identity!(Matrix4f, 4, 1.0f32, 0.0f32);

/// A time code value (`timecode`).
#[derive(Clone, Copy, Debug, Default, PartialEq, PartialOrd, Pod, Zeroable)]
#[repr(transparent)]
pub struct TimeCode(pub f64);

macro_rules! plain {
    ($ty:ty, $scalar:ident, $id:ident) => {
        impl ValueType for $ty {
            const TYPE_ID: TypeId = TypeId::$id;

            fn from_value(v: &Value) -> Option<&Self> {
                match v {
                    Value::$scalar(x) => Some(x),
                    _ => None,
                }
            }

            fn into_value(self) -> Value {
                Value::$scalar(self)
            }
        }
    };
    ($ty:ty, $scalar:ident, $array:ident, $id:ident) => {
        plain!($ty, $scalar, $id);

        impl ArrayElement for $ty {
            fn slice_from_value(v: &Value) -> Option<&[Self]> {
                match v {
                    Value::$array(x) => Some(x),
                    _ => None,
                }
            }

            fn vec_into_value(v: Vec<Self>) -> Value {
                Value::$array(v)
            }
        }
    };
}

macro_rules! role_storage {
    ($ty:ty, $scalar:ident, $array:ident, $id:ident) => {
        impl ValueType for $ty {
            const TYPE_ID: TypeId = TypeId::$id;

            fn from_value(v: &Value) -> Option<&Self> {
                match v {
                    Value::$scalar(x, _) => Some(x),
                    _ => None,
                }
            }

            fn into_value(self) -> Value {
                Value::$scalar(self, Role::None)
            }
        }

        impl ArrayElement for $ty {
            fn slice_from_value(v: &Value) -> Option<&[Self]> {
                match v {
                    Value::$array(x, _) => Some(x),
                    _ => None,
                }
            }

            fn vec_into_value(v: Vec<Self>) -> Value {
                Value::$array(v, Role::None)
            }
        }
    };
}

macro_rules! role_type {
    ($name:ident($inner:ty), $scalar:ident, $array:ident, $role:ident) => {
        #[derive(Clone, Copy, Debug, Default, PartialEq, TransparentWrapper)]
        #[repr(transparent)]
        pub struct $name(pub $inner);

        impl ValueType for $name {
            const TYPE_ID: TypeId = TypeId::$name;

            fn from_value(v: &Value) -> Option<&Self> {
                match v {
                    Value::$scalar(x, Role::$role) => Some(Self::wrap_ref(x)),
                    _ => None,
                }
            }

            fn into_value(self) -> Value {
                Value::$scalar(self.0, Role::$role)
            }
        }

        impl ArrayElement for $name {
            fn slice_from_value(v: &Value) -> Option<&[Self]> {
                match v {
                    Value::$array(x, Role::$role) => Some(Self::wrap_slice(x)),
                    _ => None,
                }
            }

            fn vec_into_value(v: Vec<Self>) -> Value {
                Value::$array(Self::peel_vec(v), Role::$role)
            }
        }
    };
}

plain!(bool, Bool, BoolArray, Bool);
plain!(u8, UChar, UCharArray, UChar);
plain!(i32, Int, IntArray, Int);
plain!(u32, UInt, UIntArray, UInt);
plain!(i64, Int64, Int64Array, Int64);
plain!(u64, UInt64, UInt64Array, UInt64);
plain!(f16, Half, HalfArray, Half);
plain!(f32, Float, FloatArray, Float);
plain!(f64, Double, DoubleArray, Double);
plain!(TimeCode, TimeCode, TimeCodeArray, TimeCode);
plain!([i32; 2], Int2, Int2Array, Int2);
plain!([i32; 3], Int3, Int3Array, Int3);
plain!([i32; 4], Int4, Int4Array, Int4);
plain!([u32; 2], UInt2, UInt2Array, UInt2);
plain!([u32; 3], UInt3, UInt3Array, UInt3);
plain!([u32; 4], UInt4, UInt4Array, UInt4);
plain!(Quath, Quath, QuathArray, Quath);
plain!(Quatf, Quatf, QuatfArray, Quatf);
plain!(Quatd, Quatd, QuatdArray, Quatd);
plain!(Matrix2d, Matrix2d, Matrix2dArray, Matrix2d);
plain!(Matrix3d, Matrix3d, Matrix3dArray, Matrix3d);
plain!(Matrix4f, Matrix4f, Matrix4fArray, Matrix4f);
plain!(Token, Token, TokenArray, Token);
plain!(String, String, StringArray, String);
plain!(AssetPath, AssetPath, AssetPathArray, AssetPath);
plain!(Path, Path, PathVector, Path);
plain!(LayerOffset, LayerOffset, LayerOffsetVector, LayerOffset);

plain!(Dictionary, Dictionary, Dictionary);
plain!(ListOp<Token>, TokenListOp, TokenListOp);
plain!(ListOp<String>, StringListOp, StringListOp);
plain!(ListOp<Path>, PathListOp, PathListOp);
plain!(ListOp<Reference>, ReferenceListOp, ReferenceListOp);
plain!(ListOp<Payload>, PayloadListOp, PayloadListOp);
plain!(ListOp<i32>, IntListOp, IntListOp);
plain!(ListOp<i64>, Int64ListOp, Int64ListOp);
plain!(ListOp<u32>, UIntListOp, UIntListOp);
plain!(ListOp<u64>, UInt64ListOp, UInt64ListOp);
plain!(Reference, Reference, Reference);
plain!(Payload, Payload, Payload);
plain!(Specifier, Specifier, Specifier);
plain!(Variability, Variability, Variability);
plain!(Permission, Permission, Permission);
plain!(VariantSelectionMap, VariantSelection, VariantSelectionMap);

impl ValueType for TimeSamples {
    const TYPE_ID: TypeId = TypeId::TimeSamples;

    fn from_value(v: &Value) -> Option<&Self> {
        match v {
            Value::TimeSamples(ts) => Some(ts),
            _ => None,
        }
    }

    fn into_value(self) -> Value {
        Value::TimeSamples(Box::new(self))
    }
}

role_storage!([f16; 2], Half2, Half2Array, Half2);
role_storage!([f16; 3], Half3, Half3Array, Half3);
role_storage!([f16; 4], Half4, Half4Array, Half4);
role_storage!([f32; 2], Float2, Float2Array, Float2);
role_storage!([f32; 3], Float3, Float3Array, Float3);
role_storage!([f32; 4], Float4, Float4Array, Float4);
role_storage!([f64; 2], Double2, Double2Array, Double2);
role_storage!([f64; 3], Double3, Double3Array, Double3);
role_storage!([f64; 4], Double4, Double4Array, Double4);
role_storage!(Matrix4d, Matrix4d, Matrix4dArray, Matrix4d);

role_type!(Point3h([f16; 3]), Half3, Half3Array, Point);
role_type!(Point3f([f32; 3]), Float3, Float3Array, Point);
role_type!(Point3d([f64; 3]), Double3, Double3Array, Point);
role_type!(Normal3h([f16; 3]), Half3, Half3Array, Normal);
role_type!(Normal3f([f32; 3]), Float3, Float3Array, Normal);
role_type!(Normal3d([f64; 3]), Double3, Double3Array, Normal);
role_type!(Vector3h([f16; 3]), Half3, Half3Array, Vector);
role_type!(Vector3f([f32; 3]), Float3, Float3Array, Vector);
role_type!(Vector3d([f64; 3]), Double3, Double3Array, Vector);
role_type!(Color3h([f16; 3]), Half3, Half3Array, Color);
role_type!(Color3f([f32; 3]), Float3, Float3Array, Color);
role_type!(Color3d([f64; 3]), Double3, Double3Array, Color);
role_type!(Color4h([f16; 4]), Half4, Half4Array, Color);
role_type!(Color4f([f32; 4]), Float4, Float4Array, Color);
role_type!(Color4d([f64; 4]), Double4, Double4Array, Color);
role_type!(TexCoord2h([f16; 2]), Half2, Half2Array, TexCoord);
role_type!(TexCoord2f([f32; 2]), Float2, Float2Array, TexCoord);
role_type!(TexCoord2d([f64; 2]), Double2, Double2Array, TexCoord);
role_type!(TexCoord3h([f16; 3]), Half3, Half3Array, TexCoord);
role_type!(TexCoord3f([f32; 3]), Float3, Float3Array, TexCoord);
role_type!(TexCoord3d([f64; 3]), Double3, Double3Array, TexCoord);
role_type!(Frame4d(Matrix4d), Matrix4d, Matrix4dArray, Frame);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_type_ignores_role() {
        let v = Value::new(Color3f([1.0, 0.5, 0.0]));
        assert_eq!(v.type_name(), "color3f");
        assert_eq!(v.get::<[f32; 3]>(), Some(&[1.0, 0.5, 0.0]));
        assert_eq!(v.get::<Color3f>(), Some(&Color3f([1.0, 0.5, 0.0])));
        assert_eq!(v.get::<Vector3f>(), None);
    }

    #[test]
    fn test_plain_storage_has_no_role() {
        let v = Value::new([1.0f32, 2.0, 3.0]);
        assert_eq!(v.type_name(), "float3");
        assert!(v.get::<Point3f>().is_none());
    }

    #[test]
    fn test_frame() {
        let v = Value::new(Frame4d(Matrix4d::default()));
        assert_eq!(v.type_name(), "frame4d");
        assert_eq!(v.get::<Matrix4d>().unwrap().0[3][3], 1.0);
        assert!(Value::new(Matrix4d::default()).get::<Frame4d>().is_none());
    }

    #[test]
    fn test_array_roundtrip_through_wrapper() {
        let pts = vec![Point3f([0.0, 1.0, 2.0]), Point3f([3.0, 4.0, 5.0])];
        let v = Value::from_vec(pts.clone());
        assert_eq!(v.get_array::<Point3f>(), Some(pts.as_slice()));
        assert_eq!(v.get_array::<[f32; 3]>().unwrap()[1], [3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_identity_defaults() {
        assert_eq!(Matrix3d::default().0, [[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]);
        assert_eq!(Quatf::default().0[3], 1.0);
    }
}
