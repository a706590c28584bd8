//! Crate (usdc) format constants and structures.

/// Magic bytes at the start of a crate file.
pub const USDC_MAGIC: &[u8; 8] = b"PXR-USDC";

/// Size of the bootstrap header in bytes.
pub const BOOTSTRAP_SIZE: usize = 88;

/// Offset of the version bytes in the bootstrap.
pub const VERSION_OFFSET: usize = 8;

/// Offset of the table-of-contents position in the bootstrap.
pub const TOC_POS_OFFSET: usize = 16;

/// Newest version this reader understands (major, minor, patch).
pub const CURRENT_VERSION: [u8; 3] = [0, 8, 0];

/// Oldest minor version accepted for major version 0.
pub const MIN_MINOR_VERSION: u8 = 4;

/// Length of a section name field in the TOC (NUL padded).
pub const SECTION_NAME_LEN: usize = 16;

pub const TOKENS_SECTION: &str = "TOKENS";
pub const STRINGS_SECTION: &str = "STRINGS";
pub const FIELDS_SECTION: &str = "FIELDS";
pub const FIELDSETS_SECTION: &str = "FIELDSETS";
pub const PATHS_SECTION: &str = "PATHS";
pub const SPECS_SECTION: &str = "SPECS";

/// Sections every crate file must carry.
pub const REQUIRED_SECTIONS: [&str; 6] = [
    TOKENS_SECTION,
    STRINGS_SECTION,
    FIELDS_SECTION,
    FIELDSETS_SECTION,
    PATHS_SECTION,
    SPECS_SECTION,
];

/// Terminator between field groups in FIELDSETS, and "no index" marker.
pub const INVALID_INDEX: u32 = u32::MAX;

/// Bytes per SPECS record.
pub const SPEC_RECORD_SIZE: usize = 12;

/// ValueRep flag: the value is an array.
pub const ARRAY_FLAG: u64 = 1 << 63;

/// ValueRep flag: the payload holds the value itself.
pub const INLINED_FLAG: u64 = 1 << 62;

/// ValueRep flag: the out-of-line array is compressed.
pub const COMPRESSED_FLAG: u64 = 1 << 61;

/// Shift of the 8-bit type id inside a ValueRep.
pub const TYPE_SHIFT: u32 = 48;

/// Mask of the 48-bit payload.
pub const PAYLOAD_MASK: u64 = (1 << 48) - 1;

/// Check the array flag of a raw rep.
#[inline]
pub const fn rep_is_array(rep: u64) -> bool {
    rep & ARRAY_FLAG != 0
}

/// Check the inlined flag of a raw rep.
#[inline]
pub const fn rep_is_inlined(rep: u64) -> bool {
    rep & INLINED_FLAG != 0
}

/// Check the compressed flag of a raw rep.
#[inline]
pub const fn rep_is_compressed(rep: u64) -> bool {
    rep & COMPRESSED_FLAG != 0
}

/// Extract the type id byte.
#[inline]
pub const fn rep_type(rep: u64) -> u8 {
    ((rep >> TYPE_SHIFT) & 0xff) as u8
}

/// Extract the 48-bit payload.
#[inline]
pub const fn rep_payload(rep: u64) -> u64 {
    rep & PAYLOAD_MASK
}

/// Assemble a raw rep.
#[inline]
pub const fn make_rep(ty: CrateType, payload: u64, array: bool, inlined: bool, compressed: bool) -> u64 {
    let mut rep = ((ty as u64) << TYPE_SHIFT) | (payload & PAYLOAD_MASK);
    if array {
        rep |= ARRAY_FLAG;
    }
    if inlined {
        rep |= INLINED_FLAG;
    }
    if compressed {
        rep |= COMPRESSED_FLAG;
    }
    rep
}

/// 8-byte value descriptor stored in FIELDS, dictionaries and time samples.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ValueRep(pub u64);

impl ValueRep {
    #[inline]
    pub const fn is_array(self) -> bool {
        rep_is_array(self.0)
    }

    #[inline]
    pub const fn is_inlined(self) -> bool {
        rep_is_inlined(self.0)
    }

    #[inline]
    pub const fn is_compressed(self) -> bool {
        rep_is_compressed(self.0)
    }

    #[inline]
    pub const fn type_byte(self) -> u8 {
        rep_type(self.0)
    }

    #[inline]
    pub const fn payload(self) -> u64 {
        rep_payload(self.0)
    }

    /// Decoded type, `None` for ids this reader does not know.
    #[inline]
    pub const fn crate_type(self) -> Option<CrateType> {
        CrateType::from_u8(self.type_byte())
    }
}

impl std::fmt::Debug for ValueRep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "ValueRep(type={}, array={}, inlined={}, compressed={}, payload=0x{:x})",
            self.type_byte(),
            self.is_array(),
            self.is_inlined(),
            self.is_compressed(),
            self.payload()
        )
    }
}

macro_rules! crate_types {
    ($($variant:ident = $id:literal),* $(,)?) => {
        /// Type ids used inside ValueReps.
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum CrateType {
            $( $variant = $id, )*
        }

        impl CrateType {
            pub const fn from_u8(v: u8) -> Option<Self> {
                match v {
                    $( $id => Some(Self::$variant), )*
                    _ => None,
                }
            }

            pub const fn name(self) -> &'static str {
                match self {
                    $( Self::$variant => stringify!($variant), )*
                }
            }
        }
    };
}

crate_types! {
    Bool = 1,
    UChar = 2,
    Int = 3,
    UInt = 4,
    Int64 = 5,
    UInt64 = 6,
    Half = 7,
    Float = 8,
    Double = 9,
    String = 10,
    Token = 11,
    AssetPath = 12,
    Matrix2d = 13,
    Matrix3d = 14,
    Matrix4d = 15,
    Quatd = 16,
    Quatf = 17,
    Quath = 18,
    Vec2d = 19,
    Vec2f = 20,
    Vec2h = 21,
    Vec2i = 22,
    Vec3d = 23,
    Vec3f = 24,
    Vec3h = 25,
    Vec3i = 26,
    Vec4d = 27,
    Vec4f = 28,
    Vec4h = 29,
    Vec4i = 30,
    Dictionary = 31,
    TokenListOp = 32,
    StringListOp = 33,
    PathListOp = 34,
    ReferenceListOp = 35,
    IntListOp = 36,
    Int64ListOp = 37,
    UIntListOp = 38,
    UInt64ListOp = 39,
    PathVector = 40,
    TokenVector = 41,
    Specifier = 42,
    Permission = 43,
    Variability = 44,
    VariantSelectionMap = 45,
    TimeSamples = 46,
    Payload = 47,
    DoubleVector = 48,
    LayerOffsetVector = 49,
    StringVector = 50,
    ValueBlock = 51,
    Value = 52,
    UnregisteredValue = 53,
    UnregisteredValueListOp = 54,
    PayloadListOp = 55,
    TimeCode = 56,
}

/// Kind of a spec record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum SpecType {
    Unknown = 0,
    Attribute = 1,
    Connection = 2,
    Expression = 3,
    Mapper = 4,
    MapperArg = 5,
    Prim = 6,
    PseudoRoot = 7,
    Relationship = 8,
    RelationshipTarget = 9,
    Variant = 10,
    VariantSet = 11,
}

impl SpecType {
    pub const fn from_u32(v: u32) -> Option<Self> {
        Some(match v {
            0 => Self::Unknown,
            1 => Self::Attribute,
            2 => Self::Connection,
            3 => Self::Expression,
            4 => Self::Mapper,
            5 => Self::MapperArg,
            6 => Self::Prim,
            7 => Self::PseudoRoot,
            8 => Self::Relationship,
            9 => Self::RelationshipTarget,
            10 => Self::Variant,
            11 => Self::VariantSet,
            _ => return None,
        })
    }
}

/// List-op header bits.
pub mod list_op_flags {
    pub const IS_EXPLICIT: u8 = 0x01;
    pub const HAS_EXPLICIT: u8 = 0x02;
    pub const HAS_ADDED: u8 = 0x04;
    pub const HAS_DELETED: u8 = 0x08;
    pub const HAS_ORDERED: u8 = 0x10;
    pub const HAS_PREPENDED: u8 = 0x20;
    pub const HAS_APPENDED: u8 = 0x40;
}

/// Field names whose crate spelling differs from the usda metadata key.
pub fn field_to_meta_key(field: &str) -> &str {
    match field {
        "inheritPaths" => "inherits",
        "variantSelection" => "variants",
        "variantSetNames" => "variantSets",
        other => other,
    }
}
