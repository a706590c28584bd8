//! Type identifiers for every USD value type.

use std::fmt;

/// Bit OR-ed into a [`TypeId`] value to mark a one-dimensional array.
pub const ARRAY_BIT: u32 = 1 << 20;

/// Size of the handle used for values with out-of-line storage
/// (strings, dictionaries, list-ops, time samples).
const HANDLE: usize = std::mem::size_of::<usize>();

/// Semantic role carried by vector and matrix types.
///
/// A role never changes the memory layout: `point3f`, `normal3f`,
/// `vector3f` and `color3f` all store a `float3`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Role {
    #[default]
    None,
    Point,
    Normal,
    Vector,
    Color,
    TexCoord,
    Frame,
}

macro_rules! type_table {
    ($( $variant:ident = $id:expr, $name:literal, $array_name:literal, $size:expr, $comp:expr; )*) => {
        /// Scalar type identifier.
        ///
        /// Role types (`point3f`, `color4d`, ...) have their own identifiers
        /// even though they share the storage of their underlying vector type.
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[repr(u32)]
        pub enum TypeId {
            $( $variant = $id, )*
        }

        impl TypeId {
            /// All known type identifiers.
            pub const ALL: &'static [TypeId] = &[ $( Self::$variant, )* ];

            /// usda spelling of the scalar type.
            #[inline]
            pub const fn name(self) -> &'static str {
                match self { $( Self::$variant => $name, )* }
            }

            /// usda spelling of the array type (`float3[]`).
            #[inline]
            pub const fn array_name(self) -> &'static str {
                match self { $( Self::$variant => $array_name, )* }
            }

            /// Size in bytes of one element.
            #[inline]
            pub const fn size_of(self) -> usize {
                match self { $( Self::$variant => $size, )* }
            }

            /// Number of scalar components in one element.
            #[inline]
            pub const fn components(self) -> u32 {
                match self { $( Self::$variant => $comp, )* }
            }

            /// Convert from the numeric identifier (array bit must be cleared).
            pub const fn from_u32(v: u32) -> Option<Self> {
                match v {
                    $( $id => Some(Self::$variant), )*
                    _ => None,
                }
            }

            /// Look up a scalar type by its usda spelling.
            pub fn from_name(name: &str) -> Option<Self> {
                match name {
                    $( $name => Some(Self::$variant), )*
                    _ => None,
                }
            }
        }
    };
}

type_table! {
    Invalid = 0, "invalid", "invalid", 0, 0;
    Block = 1, "None", "None", 0, 0;
    Token = 2, "token", "token[]", 4, 1;
    String = 3, "string", "string[]", HANDLE, 1;
    Bool = 4, "bool", "bool[]", 1, 1;
    Half = 5, "half", "half[]", 2, 1;
    Int = 6, "int", "int[]", 4, 1;
    Int64 = 7, "int64", "int64[]", 8, 1;
    Half2 = 8, "half2", "half2[]", 4, 2;
    Half3 = 9, "half3", "half3[]", 6, 3;
    Half4 = 10, "half4", "half4[]", 8, 4;
    Int2 = 11, "int2", "int2[]", 8, 2;
    Int3 = 12, "int3", "int3[]", 12, 3;
    Int4 = 13, "int4", "int4[]", 16, 4;
    UChar = 14, "uchar", "uchar[]", 1, 1;
    UInt = 15, "uint", "uint[]", 4, 1;
    UInt64 = 16, "uint64", "uint64[]", 8, 1;
    UInt2 = 17, "uint2", "uint2[]", 8, 2;
    UInt3 = 18, "uint3", "uint3[]", 12, 3;
    UInt4 = 19, "uint4", "uint4[]", 16, 4;
    Float = 20, "float", "float[]", 4, 1;
    Float2 = 21, "float2", "float2[]", 8, 2;
    Float3 = 22, "float3", "float3[]", 12, 3;
    Float4 = 23, "float4", "float4[]", 16, 4;
    Double = 24, "double", "double[]", 8, 1;
    Double2 = 25, "double2", "double2[]", 16, 2;
    Double3 = 26, "double3", "double3[]", 24, 3;
    Double4 = 27, "double4", "double4[]", 32, 4;
    Quath = 28, "quath", "quath[]", 8, 4;
    Quatf = 29, "quatf", "quatf[]", 16, 4;
    Quatd = 30, "quatd", "quatd[]", 32, 4;
    Matrix2d = 31, "matrix2d", "matrix2d[]", 32, 4;
    Matrix3d = 32, "matrix3d", "matrix3d[]", 72, 9;
    Matrix4d = 33, "matrix4d", "matrix4d[]", 128, 16;
    Matrix4f = 34, "matrix4f", "matrix4f[]", 64, 16;
    Color3h = 35, "color3h", "color3h[]", 6, 3;
    Color3f = 36, "color3f", "color3f[]", 12, 3;
    Color3d = 37, "color3d", "color3d[]", 24, 3;
    Color4h = 38, "color4h", "color4h[]", 8, 4;
    Color4f = 39, "color4f", "color4f[]", 16, 4;
    Color4d = 40, "color4d", "color4d[]", 32, 4;
    Point3h = 41, "point3h", "point3h[]", 6, 3;
    Point3f = 42, "point3f", "point3f[]", 12, 3;
    Point3d = 43, "point3d", "point3d[]", 24, 3;
    Normal3h = 44, "normal3h", "normal3h[]", 6, 3;
    Normal3f = 45, "normal3f", "normal3f[]", 12, 3;
    Normal3d = 46, "normal3d", "normal3d[]", 24, 3;
    Vector3h = 47, "vector3h", "vector3h[]", 6, 3;
    Vector3f = 48, "vector3f", "vector3f[]", 12, 3;
    Vector3d = 49, "vector3d", "vector3d[]", 24, 3;
    Frame4d = 50, "frame4d", "frame4d[]", 128, 16;
    TexCoord2h = 51, "texCoord2h", "texCoord2h[]", 4, 2;
    TexCoord2f = 52, "texCoord2f", "texCoord2f[]", 8, 2;
    TexCoord2d = 53, "texCoord2d", "texCoord2d[]", 16, 2;
    TexCoord3h = 54, "texCoord3h", "texCoord3h[]", 6, 3;
    TexCoord3f = 55, "texCoord3f", "texCoord3f[]", 12, 3;
    TexCoord3d = 56, "texCoord3d", "texCoord3d[]", 24, 3;
    LayerOffset = 57, "layerOffset", "layerOffset[]", 16, 2;
    Payload = 58, "payload", "payload", HANDLE, 1;
    TimeCode = 59, "timecode", "timecode[]", 8, 1;
    Dictionary = 60, "dictionary", "dictionary", HANDLE, 1;
    AssetPath = 61, "asset", "asset[]", HANDLE, 1;
    Reference = 62, "reference", "reference", HANDLE, 1;
    Specifier = 63, "specifier", "specifier", 4, 1;
    Permission = 64, "permission", "permission", 4, 1;
    Variability = 65, "variability", "variability", 4, 1;
    TokenListOp = 66, "tokenListOp", "tokenListOp", HANDLE, 1;
    StringListOp = 67, "stringListOp", "stringListOp", HANDLE, 1;
    PathListOp = 68, "pathListOp", "pathListOp", HANDLE, 1;
    ReferenceListOp = 69, "referenceListOp", "referenceListOp", HANDLE, 1;
    IntListOp = 70, "intListOp", "intListOp", HANDLE, 1;
    Int64ListOp = 71, "int64ListOp", "int64ListOp", HANDLE, 1;
    UIntListOp = 72, "uintListOp", "uintListOp", HANDLE, 1;
    UInt64ListOp = 73, "uint64ListOp", "uint64ListOp", HANDLE, 1;
    PayloadListOp = 74, "payloadListOp", "payloadListOp", HANDLE, 1;
    Path = 75, "path", "path[]", HANDLE, 1;
    Relationship = 76, "rel", "rel", HANDLE, 1;
    TimeSamples = 77, "timeSamples", "timeSamples", HANDLE, 1;
    VariantSelectionMap = 78, "variants", "variants", HANDLE, 1;
    Opaque = 79, "opaque", "opaque", HANDLE, 1;
}

impl TypeId {
    /// Split a role type into its storage type and role.
    pub const fn base_and_role(self) -> (TypeId, Role) {
        match self {
            Self::Color3h => (Self::Half3, Role::Color),
            Self::Color3f => (Self::Float3, Role::Color),
            Self::Color3d => (Self::Double3, Role::Color),
            Self::Color4h => (Self::Half4, Role::Color),
            Self::Color4f => (Self::Float4, Role::Color),
            Self::Color4d => (Self::Double4, Role::Color),
            Self::Point3h => (Self::Half3, Role::Point),
            Self::Point3f => (Self::Float3, Role::Point),
            Self::Point3d => (Self::Double3, Role::Point),
            Self::Normal3h => (Self::Half3, Role::Normal),
            Self::Normal3f => (Self::Float3, Role::Normal),
            Self::Normal3d => (Self::Double3, Role::Normal),
            Self::Vector3h => (Self::Half3, Role::Vector),
            Self::Vector3f => (Self::Float3, Role::Vector),
            Self::Vector3d => (Self::Double3, Role::Vector),
            Self::Frame4d => (Self::Matrix4d, Role::Frame),
            Self::TexCoord2h => (Self::Half2, Role::TexCoord),
            Self::TexCoord2f => (Self::Float2, Role::TexCoord),
            Self::TexCoord2d => (Self::Double2, Role::TexCoord),
            Self::TexCoord3h => (Self::Half3, Role::TexCoord),
            Self::TexCoord3f => (Self::Float3, Role::TexCoord),
            Self::TexCoord3d => (Self::Double3, Role::TexCoord),
            other => (other, Role::None),
        }
    }

    /// Combine a storage type and a role into the role type identifier.
    ///
    /// Returns the storage type unchanged when the pair names no role type.
    pub const fn with_role(self, role: Role) -> TypeId {
        match (self, role) {
            (Self::Half3, Role::Color) => Self::Color3h,
            (Self::Float3, Role::Color) => Self::Color3f,
            (Self::Double3, Role::Color) => Self::Color3d,
            (Self::Half4, Role::Color) => Self::Color4h,
            (Self::Float4, Role::Color) => Self::Color4f,
            (Self::Double4, Role::Color) => Self::Color4d,
            (Self::Half3, Role::Point) => Self::Point3h,
            (Self::Float3, Role::Point) => Self::Point3f,
            (Self::Double3, Role::Point) => Self::Point3d,
            (Self::Half3, Role::Normal) => Self::Normal3h,
            (Self::Float3, Role::Normal) => Self::Normal3f,
            (Self::Double3, Role::Normal) => Self::Normal3d,
            (Self::Half3, Role::Vector) => Self::Vector3h,
            (Self::Float3, Role::Vector) => Self::Vector3f,
            (Self::Double3, Role::Vector) => Self::Vector3d,
            (Self::Matrix4d, Role::Frame) => Self::Frame4d,
            (Self::Half2, Role::TexCoord) => Self::TexCoord2h,
            (Self::Float2, Role::TexCoord) => Self::TexCoord2f,
            (Self::Double2, Role::TexCoord) => Self::TexCoord2d,
            (Self::Half3, Role::TexCoord) => Self::TexCoord3h,
            (Self::Float3, Role::TexCoord) => Self::TexCoord3f,
            (Self::Double3, Role::TexCoord) => Self::TexCoord3d,
            (other, _) => other,
        }
    }

    /// True for types that may appear as `T[]`.
    pub const fn has_array_form(self) -> bool {
        !matches!(
            self,
            Self::Invalid
                | Self::Block
                | Self::Payload
                | Self::Dictionary
                | Self::Reference
                | Self::Specifier
                | Self::Permission
                | Self::Variability
                | Self::TokenListOp
                | Self::StringListOp
                | Self::PathListOp
                | Self::ReferenceListOp
                | Self::IntListOp
                | Self::Int64ListOp
                | Self::UIntListOp
                | Self::UInt64ListOp
                | Self::PayloadListOp
                | Self::Relationship
                | Self::TimeSamples
                | Self::VariantSelectionMap
                | Self::Opaque
        )
    }

    /// True for floating point scalars and vectors that interpolate linearly.
    pub const fn is_interpolatable(self) -> bool {
        let (base, _) = self.base_and_role();
        matches!(
            base,
            Self::Half
                | Self::Float
                | Self::Double
                | Self::Half2
                | Self::Half3
                | Self::Half4
                | Self::Float2
                | Self::Float3
                | Self::Float4
                | Self::Double2
                | Self::Double3
                | Self::Double4
                | Self::Quath
                | Self::Quatf
                | Self::Quatd
                | Self::TimeCode
        )
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A declared attribute type: scalar type plus array-ness (`point3f[]`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ValueTypeName {
    pub id: TypeId,
    pub is_array: bool,
}

impl ValueTypeName {
    pub const fn scalar(id: TypeId) -> Self {
        Self { id, is_array: false }
    }

    pub const fn array(id: TypeId) -> Self {
        Self { id, is_array: true }
    }

    /// Parse `float3`, `point3f[]`, ... Only registered types are accepted.
    pub fn parse(name: &str) -> Option<Self> {
        match name.strip_suffix("[]") {
            Some(base) => TypeId::from_name(base)
                .filter(|id| id.has_array_form())
                .map(Self::array),
            None => TypeId::from_name(name).map(Self::scalar),
        }
    }

    /// Numeric identifier with [`ARRAY_BIT`] applied.
    pub const fn raw(self) -> u32 {
        (self.id as u32) | if self.is_array { ARRAY_BIT } else { 0 }
    }

    pub const fn name(self) -> &'static str {
        if self.is_array {
            self.id.array_name()
        } else {
            self.id.name()
        }
    }
}

impl fmt::Display for ValueTypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Name of a type identifier, honoring the array bit.
pub fn type_name(type_id: u32) -> &'static str {
    match TypeId::from_u32(type_id & !ARRAY_BIT) {
        Some(id) if type_id & ARRAY_BIT != 0 => id.array_name(),
        Some(id) => id.name(),
        None => TypeId::Invalid.name(),
    }
}

/// Element size in bytes of a type identifier (array bit ignored).
pub fn type_size(type_id: u32) -> usize {
    TypeId::from_u32(type_id & !ARRAY_BIT).map_or(0, TypeId::size_of)
}

/// Component count of a type identifier (array bit ignored).
pub fn type_components(type_id: u32) -> u32 {
    TypeId::from_u32(type_id & !ARRAY_BIT).map_or(0, TypeId::components)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sizes() {
        assert_eq!(TypeId::Bool.size_of(), 1);
        assert_eq!(TypeId::Half3.size_of(), 6);
        assert_eq!(TypeId::Float3.size_of(), 12);
        assert_eq!(TypeId::Matrix4d.size_of(), 128);
        assert_eq!(TypeId::Point3f.size_of(), TypeId::Float3.size_of());
        assert_eq!(TypeId::Matrix3d.components(), 9);
        assert_eq!(TypeId::Quatf.components(), 4);
    }

    #[test]
    fn test_name_roundtrip() {
        for &id in TypeId::ALL {
            assert_eq!(TypeId::from_u32(id as u32), Some(id));
            if id.has_array_form() {
                assert_eq!(TypeId::from_name(id.name()), Some(id), "{id:?}");
            }
        }
    }

    #[test]
    fn test_roles() {
        assert_eq!(TypeId::Normal3f.base_and_role(), (TypeId::Float3, Role::Normal));
        assert_eq!(TypeId::Float3.with_role(Role::Normal), TypeId::Normal3f);
        assert_eq!(TypeId::Matrix4d.with_role(Role::Frame), TypeId::Frame4d);
        assert_eq!(TypeId::Int3.with_role(Role::Color), TypeId::Int3);
        for &id in TypeId::ALL {
            let (base, role) = id.base_and_role();
            assert_eq!(base.with_role(role), id);
            assert_eq!(base.size_of(), id.size_of());
        }
    }

    #[test]
    fn test_type_name_parse() {
        let t = ValueTypeName::parse("point3f[]").unwrap();
        assert_eq!(t.id, TypeId::Point3f);
        assert!(t.is_array);
        assert_eq!(t.to_string(), "point3f[]");
        assert!(ValueTypeName::parse("float5").is_none());
        assert!(ValueTypeName::parse("dictionary[]").is_none());
        assert_eq!(type_name(t.raw()), "point3f[]");
        assert_eq!(type_size(t.raw()), 12);
        assert_eq!(type_components(TypeId::Double4 as u32), 4);
    }
}
