//! ValueRep materialization.
//!
//! Inlined reps carry the value in their 48-bit payload. Everything else
//! lives at the payload offset: scalars as raw little-endian bytes,
//! arrays as a `u64` count followed by elements (or a compressed frame),
//! and structured values in the layouts below.

use bytemuck::Pod;
use half::f16;

use super::format::{list_op_flags as flags, CrateType, ValueRep, INVALID_INDEX};
use super::reader::CrateFile;
use crate::codec::{self, lz4};
use crate::sdf::{AssetPath, LayerOffset, Payload, Permission, Reference, Specifier, Variability};
use crate::util::{Error, Result, StreamReader};
use crate::value::{
    Dictionary, ListOp, ListOpKind, Matrix2d, Matrix3d, Matrix4d, Quatd, Quatf, Quath, Role, TimeCode,
    TimeSamples, Value, VariantSelectionMap,
};

/// Deepest dictionary / time-sample / value nesting accepted.
const MAX_NESTING: usize = 64;

/// Sign-extended int8 components packed into an inline payload.
#[inline]
fn inline_bytes(payload: u64) -> [i8; 8] {
    payload.to_le_bytes().map(|b| b as i8)
}

fn read_pod_vec<T: Pod>(r: &mut StreamReader<'_>, count: u64) -> Result<Vec<T>> {
    let size = std::mem::size_of::<T>() as u64;
    let needed = count.saturating_mul(size);
    if needed > r.remaining() as u64 {
        return Err(Error::Truncated {
            offset: r.tell(),
            needed,
            available: r.remaining() as u64,
        });
    }
    Ok(bytemuck::pod_collect_to_vec(r.read_bytes(needed as usize)?))
}

fn read_pod<T: Pod>(r: &mut StreamReader<'_>) -> Result<T> {
    let bytes = r.read_bytes(std::mem::size_of::<T>())?;
    Ok(bytemuck::pod_read_unaligned(bytes))
}

fn pod_from_bytes<T: Pod>(bytes: &[u8], count: u64, rep: ValueRep) -> Result<Vec<T>> {
    let expected = count.saturating_mul(std::mem::size_of::<T>() as u64);
    if bytes.len() as u64 != expected {
        return Err(Error::corrupt_rep(
            rep.0,
            format!("compressed array holds {} bytes, expected {expected}", bytes.len()),
        ));
    }
    Ok(bytemuck::pod_collect_to_vec(bytes))
}

fn enum_value<T>(raw: u32, rep: ValueRep, what: &str, f: fn(u32) -> Option<T>) -> Result<T> {
    f(raw).ok_or_else(|| Error::corrupt_rep(rep.0, format!("invalid {what} {raw}")))
}

macro_rules! empty_array {
    ($ty:expr, $rep:expr, [$($plain:ident => $arr:ident),*], [$($role:ident => $rarr:ident),*]) => {
        match $ty {
            $( CrateType::$plain => Value::$arr(Vec::new()), )*
            $( CrateType::$role => Value::$rarr(Vec::new(), Role::None), )*
            other => {
                return Err(Error::corrupt_rep($rep.0, format!("{} has no array form", other.name())))
            }
        }
    };
}

impl<'a> CrateFile<'a> {
    /// Decode the value a rep describes.
    pub fn unpack(&self, rep: ValueRep) -> Result<Value> {
        self.unpack_nested(rep, 0)
    }

    fn unpack_nested(&self, rep: ValueRep, depth: usize) -> Result<Value> {
        if depth > MAX_NESTING {
            return Err(Error::corrupt_rep(rep.0, "values nested too deeply"));
        }
        let ty = rep
            .crate_type()
            .ok_or_else(|| Error::corrupt_rep(rep.0, format!("unknown type id {}", rep.type_byte())))?;
        tracing::trace!(?rep, ty = ty.name(), "unpack");

        if rep.is_inlined() {
            return self.unpack_inlined(ty, rep);
        }
        let mut r = self.reader_at(rep)?;
        if rep.is_array() {
            return self.unpack_array(ty, rep, &mut r);
        }
        self.unpack_scalar(ty, rep, &mut r, depth)
    }

    fn reader_at(&self, rep: ValueRep) -> Result<StreamReader<'a>> {
        let offset = rep.payload();
        if offset >= self.data().len() as u64 {
            return Err(Error::corrupt_rep(
                rep.0,
                format!("offset {offset} outside file of {} bytes", self.data().len()),
            ));
        }
        let mut r = StreamReader::new(self.data());
        r.seek_to(offset)?;
        Ok(r)
    }

    fn empty_array(&self, ty: CrateType, rep: ValueRep) -> Result<Value> {
        Ok(empty_array!(
            ty,
            rep,
            [
                Bool => BoolArray, UChar => UCharArray, Int => IntArray, UInt => UIntArray,
                Int64 => Int64Array, UInt64 => UInt64Array, Half => HalfArray, Float => FloatArray,
                Double => DoubleArray, TimeCode => TimeCodeArray, String => StringArray,
                Token => TokenArray, AssetPath => AssetPathArray, Matrix2d => Matrix2dArray,
                Matrix3d => Matrix3dArray, Quatd => QuatdArray, Quatf => QuatfArray,
                Quath => QuathArray, Vec2i => Int2Array, Vec3i => Int3Array, Vec4i => Int4Array,
                PathVector => PathVector, TokenVector => TokenArray, StringVector => StringArray,
                DoubleVector => DoubleArray, LayerOffsetVector => LayerOffsetVector
            ],
            [
                Matrix4d => Matrix4dArray, Vec2d => Double2Array, Vec3d => Double3Array,
                Vec4d => Double4Array, Vec2f => Float2Array, Vec3f => Float3Array,
                Vec4f => Float4Array, Vec2h => Half2Array, Vec3h => Half3Array, Vec4h => Half4Array
            ]
        ))
    }

    fn unpack_inlined(&self, ty: CrateType, rep: ValueRep) -> Result<Value> {
        let payload = rep.payload();
        if rep.is_array() {
            if payload != 0 {
                return Err(Error::corrupt_rep(rep.0, "inlined array with non-zero payload"));
            }
            return self.empty_array(ty, rep);
        }

        let bits = payload as u32;
        let b = inline_bytes(payload);
        macro_rules! vec_inline {
            ($variant:ident, $conv:expr) => {
                Value::$variant(std::array::from_fn(|i| $conv(b[i])), Role::None)
            };
            ($variant:ident, $conv:expr, plain) => {
                Value::$variant(std::array::from_fn(|i| $conv(b[i])))
            };
        }
        macro_rules! diag {
            ($ty:ident, $n:expr) => {{
                let mut m = [[0.0f64; $n]; $n];
                for (i, row) in m.iter_mut().enumerate() {
                    row[i] = f64::from(b[i]);
                }
                $ty(m)
            }};
        }
        let half = |c: i8| f16::from_f32(f32::from(c));

        Ok(match ty {
            CrateType::Bool => Value::Bool(bits != 0),
            CrateType::UChar => Value::UChar(bits as u8),
            CrateType::Int => Value::Int(bits as i32),
            CrateType::UInt => Value::UInt(bits),
            CrateType::Int64 => Value::Int64(i64::from(bits as i32)),
            CrateType::UInt64 => Value::UInt64(u64::from(bits)),
            CrateType::Half => Value::Half(f16::from_bits(bits as u16)),
            CrateType::Float => Value::Float(f32::from_bits(bits)),
            CrateType::Double => Value::Double(f64::from(f32::from_bits(bits))),
            CrateType::TimeCode => Value::TimeCode(TimeCode(f64::from(f32::from_bits(bits)))),
            CrateType::String => Value::String(self.string(bits)?.to_owned()),
            CrateType::Token => Value::Token(self.token(bits)?),
            CrateType::AssetPath => Value::AssetPath(AssetPath::new(self.token(bits)?.as_str())),
            CrateType::Specifier => Value::Specifier(enum_value(bits, rep, "specifier", Specifier::from_u32)?),
            CrateType::Permission => {
                Value::Permission(enum_value(bits, rep, "permission", Permission::from_u32)?)
            }
            CrateType::Variability => {
                Value::Variability(enum_value(bits, rep, "variability", Variability::from_u32)?)
            }
            CrateType::Vec2d => vec_inline!(Double2, f64::from),
            CrateType::Vec3d => vec_inline!(Double3, f64::from),
            CrateType::Vec4d => vec_inline!(Double4, f64::from),
            CrateType::Vec2f => vec_inline!(Float2, f32::from),
            CrateType::Vec3f => vec_inline!(Float3, f32::from),
            CrateType::Vec4f => vec_inline!(Float4, f32::from),
            CrateType::Vec2h => vec_inline!(Half2, half),
            CrateType::Vec3h => vec_inline!(Half3, half),
            CrateType::Vec4h => vec_inline!(Half4, half),
            CrateType::Vec2i => vec_inline!(Int2, i32::from, plain),
            CrateType::Vec3i => vec_inline!(Int3, i32::from, plain),
            CrateType::Vec4i => vec_inline!(Int4, i32::from, plain),
            CrateType::Matrix2d => Value::Matrix2d(diag!(Matrix2d, 2)),
            CrateType::Matrix3d => Value::Matrix3d(diag!(Matrix3d, 3)),
            CrateType::Matrix4d => Value::Matrix4d(diag!(Matrix4d, 4), Role::None),
            CrateType::ValueBlock => Value::Block,
            CrateType::Dictionary if payload == 0 => Value::Dictionary(Dictionary::new()),
            other => {
                return Err(Error::corrupt_rep(
                    rep.0,
                    format!("{} cannot be inlined", other.name()),
                ))
            }
        })
    }

    fn unpack_array(&self, ty: CrateType, rep: ValueRep, r: &mut StreamReader<'a>) -> Result<Value> {
        let count = r.read_u64_le()?;
        if rep.is_compressed() {
            return self.unpack_compressed(ty, rep, r, count);
        }

        macro_rules! pods {
            ($variant:ident) => {
                Value::$variant(read_pod_vec(r, count)?)
            };
            ($variant:ident, role) => {
                Value::$variant(read_pod_vec(r, count)?, Role::None)
            };
        }

        Ok(match ty {
            CrateType::Bool => Value::BoolArray(read_pod_vec::<u8>(r, count)?.into_iter().map(|b| b != 0).collect()),
            CrateType::UChar => pods!(UCharArray),
            CrateType::Int => pods!(IntArray),
            CrateType::UInt => pods!(UIntArray),
            CrateType::Int64 => pods!(Int64Array),
            CrateType::UInt64 => pods!(UInt64Array),
            CrateType::Half => pods!(HalfArray),
            CrateType::Float => pods!(FloatArray),
            CrateType::Double => pods!(DoubleArray),
            CrateType::TimeCode => pods!(TimeCodeArray),
            CrateType::Vec2i => pods!(Int2Array),
            CrateType::Vec3i => pods!(Int3Array),
            CrateType::Vec4i => pods!(Int4Array),
            CrateType::Vec2h => pods!(Half2Array, role),
            CrateType::Vec3h => pods!(Half3Array, role),
            CrateType::Vec4h => pods!(Half4Array, role),
            CrateType::Vec2f => pods!(Float2Array, role),
            CrateType::Vec3f => pods!(Float3Array, role),
            CrateType::Vec4f => pods!(Float4Array, role),
            CrateType::Vec2d => pods!(Double2Array, role),
            CrateType::Vec3d => pods!(Double3Array, role),
            CrateType::Vec4d => pods!(Double4Array, role),
            CrateType::Quath => pods!(QuathArray),
            CrateType::Quatf => pods!(QuatfArray),
            CrateType::Quatd => pods!(QuatdArray),
            CrateType::Matrix2d => pods!(Matrix2dArray),
            CrateType::Matrix3d => pods!(Matrix3dArray),
            CrateType::Matrix4d => pods!(Matrix4dArray, role),
            CrateType::Token => Value::TokenArray(self.read_indices(r, count, |i| self.token(i))?),
            CrateType::String => {
                Value::StringArray(self.read_indices(r, count, |i| Ok(self.string(i)?.to_owned()))?)
            }
            CrateType::AssetPath => Value::AssetPathArray(
                self.read_indices(r, count, |i| Ok(AssetPath::new(self.token(i)?.as_str())))?,
            ),
            other => {
                return Err(Error::corrupt_rep(
                    rep.0,
                    format!("{} has no array form", other.name()),
                ))
            }
        })
    }

    fn unpack_compressed(&self, ty: CrateType, rep: ValueRep, r: &mut StreamReader<'a>, count: u64) -> Result<Value> {
        let max = self.limits.max_decompressed_size;
        let run = self.limits.max_int_run;
        let check = |len: usize| {
            if len as u64 != count {
                return Err(Error::corrupt_rep(
                    rep.0,
                    format!("compressed array decoded {len} items, expected {count}"),
                ));
            }
            Ok(())
        };

        let value = match ty {
            CrateType::Int => {
                let v = codec::read_coded_i32(r, max, run)?;
                check(v.len())?;
                Value::IntArray(v)
            }
            CrateType::UInt => {
                let v = codec::read_coded_u32(r, max, run)?;
                check(v.len())?;
                Value::UIntArray(v)
            }
            CrateType::Int64 => {
                let v = codec::read_coded_i64(r, max, run)?;
                check(v.len())?;
                Value::Int64Array(v)
            }
            CrateType::UInt64 => {
                let v = codec::read_coded_i64(r, max, run)?;
                check(v.len())?;
                Value::UInt64Array(v.into_iter().map(|x| x as u64).collect())
            }
            CrateType::Half => Value::HalfArray(pod_from_bytes(&lz4::decompress(r, max)?, count, rep)?),
            CrateType::Float => Value::FloatArray(pod_from_bytes(&lz4::decompress(r, max)?, count, rep)?),
            CrateType::Double => Value::DoubleArray(pod_from_bytes(&lz4::decompress(r, max)?, count, rep)?),
            other => {
                return Err(Error::corrupt_rep(
                    rep.0,
                    format!("{} arrays are never compressed", other.name()),
                ))
            }
        };
        Ok(value)
    }

    fn read_indices<T>(
        &self,
        r: &mut StreamReader<'a>,
        count: u64,
        f: impl Fn(u32) -> Result<T>,
    ) -> Result<Vec<T>> {
        read_pod_vec::<u32>(r, count)?.into_iter().map(f).collect()
    }

    fn read_reference(&self, r: &mut StreamReader<'a>) -> Result<Reference> {
        let asset = r.read_u32_le()?;
        let path = r.read_u32_le()?;
        let offset = r.read_f64_le()?;
        let scale = r.read_f64_le()?;
        Ok(Reference {
            asset_path: AssetPath::new(self.string(asset)?),
            prim_path: if path == INVALID_INDEX {
                None
            } else {
                Some(self.path(path)?.clone())
            },
            layer_offset: LayerOffset::new(offset, scale),
            custom_data: Dictionary::new(),
        })
    }

    fn read_payload(&self, r: &mut StreamReader<'a>) -> Result<Payload> {
        let reference = self.read_reference(r)?;
        Ok(Payload {
            asset_path: reference.asset_path,
            prim_path: reference.prim_path,
            layer_offset: reference.layer_offset,
        })
    }

    fn read_list_op<T: Clone + PartialEq>(
        &self,
        r: &mut StreamReader<'a>,
        mut item: impl FnMut(&mut StreamReader<'a>) -> Result<T>,
    ) -> Result<ListOp<T>> {
        let header = r.read_u8()?;
        let mut op = ListOp::new();
        let lists = [
            (flags::HAS_EXPLICIT, ListOpKind::Explicit),
            (flags::HAS_ADDED, ListOpKind::Added),
            (flags::HAS_PREPENDED, ListOpKind::Prepended),
            (flags::HAS_APPENDED, ListOpKind::Appended),
            (flags::HAS_DELETED, ListOpKind::Deleted),
            (flags::HAS_ORDERED, ListOpKind::Ordered),
        ];
        for (flag, kind) in lists {
            if header & flag == 0 {
                continue;
            }
            let count = r.read_u64_le()?;
            if count > r.remaining() as u64 {
                return Err(Error::Truncated {
                    offset: r.tell(),
                    needed: count,
                    available: r.remaining() as u64,
                });
            }
            let items = (0..count).map(|_| item(r)).collect::<Result<Vec<_>>>()?;
            op.set_items(kind, items);
        }
        if header & flags::IS_EXPLICIT != 0 && !op.is_explicit() {
            op = ListOp::explicit(op.explicit_items().to_vec());
        }
        Ok(op)
    }

    fn read_dictionary(&self, r: &mut StreamReader<'a>, depth: usize) -> Result<Dictionary> {
        let count = r.read_u64_le()?;
        let mut dict = Dictionary::new();
        for _ in 0..count {
            let key = self.string(r.read_u32_le()?)?;
            let rep = ValueRep(r.read_u64_le()?);
            dict.insert(key.to_owned(), self.unpack_nested(rep, depth + 1)?);
        }
        Ok(dict)
    }

    fn read_time_samples(&self, r: &mut StreamReader<'a>, rep: ValueRep, depth: usize) -> Result<TimeSamples> {
        let count = r.read_u64_le()?;
        let times: Vec<f64> = read_pod_vec(r, count)?;
        let reps: Vec<u64> = read_pod_vec(r, count)?;
        let samples = times
            .into_iter()
            .zip(reps)
            .map(|(t, v)| Ok((t, self.unpack_nested(ValueRep(v), depth + 1)?)))
            .collect::<Result<Vec<_>>>()?;
        TimeSamples::from_samples(samples).map_err(|e| Error::corrupt_rep(rep.0, e.to_string()))
    }

    fn unpack_scalar(&self, ty: CrateType, rep: ValueRep, r: &mut StreamReader<'a>, depth: usize) -> Result<Value> {
        Ok(match ty {
            CrateType::Bool => Value::Bool(r.read_u8()? != 0),
            CrateType::UChar => Value::UChar(r.read_u8()?),
            CrateType::Int => Value::Int(r.read_i32_le()?),
            CrateType::UInt => Value::UInt(r.read_u32_le()?),
            CrateType::Int64 => Value::Int64(r.read_i64_le()?),
            CrateType::UInt64 => Value::UInt64(r.read_u64_le()?),
            CrateType::Half => Value::Half(f16::from_bits(r.read_u16_le()?)),
            CrateType::Float => Value::Float(r.read_f32_le()?),
            CrateType::Double => Value::Double(r.read_f64_le()?),
            CrateType::TimeCode => Value::TimeCode(TimeCode(r.read_f64_le()?)),
            CrateType::String => Value::String(self.string(r.read_u32_le()?)?.to_owned()),
            CrateType::Token => Value::Token(self.token(r.read_u32_le()?)?),
            CrateType::AssetPath => Value::AssetPath(AssetPath::new(self.token(r.read_u32_le()?)?.as_str())),
            CrateType::Vec2i => Value::Int2(read_pod(r)?),
            CrateType::Vec3i => Value::Int3(read_pod(r)?),
            CrateType::Vec4i => Value::Int4(read_pod(r)?),
            CrateType::Vec2h => Value::Half2(read_pod(r)?, Role::None),
            CrateType::Vec3h => Value::Half3(read_pod(r)?, Role::None),
            CrateType::Vec4h => Value::Half4(read_pod(r)?, Role::None),
            CrateType::Vec2f => Value::Float2(read_pod(r)?, Role::None),
            CrateType::Vec3f => Value::Float3(read_pod(r)?, Role::None),
            CrateType::Vec4f => Value::Float4(read_pod(r)?, Role::None),
            CrateType::Vec2d => Value::Double2(read_pod(r)?, Role::None),
            CrateType::Vec3d => Value::Double3(read_pod(r)?, Role::None),
            CrateType::Vec4d => Value::Double4(read_pod(r)?, Role::None),
            CrateType::Quath => Value::Quath(read_pod::<Quath>(r)?),
            CrateType::Quatf => Value::Quatf(read_pod::<Quatf>(r)?),
            CrateType::Quatd => Value::Quatd(read_pod::<Quatd>(r)?),
            CrateType::Matrix2d => Value::Matrix2d(read_pod::<Matrix2d>(r)?),
            CrateType::Matrix3d => Value::Matrix3d(read_pod::<Matrix3d>(r)?),
            CrateType::Matrix4d => Value::Matrix4d(read_pod::<Matrix4d>(r)?, Role::None),
            CrateType::Dictionary => Value::Dictionary(self.read_dictionary(r, depth)?),
            CrateType::TokenListOp => Value::TokenListOp(self.read_list_op(r, |r| self.token(r.read_u32_le()?))?),
            CrateType::StringListOp => Value::StringListOp(
                self.read_list_op(r, |r| Ok(self.string(r.read_u32_le()?)?.to_owned()))?,
            ),
            CrateType::UnregisteredValueListOp => Value::StringListOp(
                self.read_list_op(r, |r| Ok(self.string(r.read_u32_le()?)?.to_owned()))?,
            ),
            CrateType::PathListOp => {
                Value::PathListOp(self.read_list_op(r, |r| Ok(self.path(r.read_u32_le()?)?.clone()))?)
            }
            CrateType::ReferenceListOp => Value::ReferenceListOp(self.read_list_op(r, |r| self.read_reference(r))?),
            CrateType::PayloadListOp => Value::PayloadListOp(self.read_list_op(r, |r| self.read_payload(r))?),
            CrateType::IntListOp => Value::IntListOp(self.read_list_op(r, |r| r.read_i32_le())?),
            CrateType::Int64ListOp => Value::Int64ListOp(self.read_list_op(r, |r| r.read_i64_le())?),
            CrateType::UIntListOp => Value::UIntListOp(self.read_list_op(r, |r| r.read_u32_le())?),
            CrateType::UInt64ListOp => Value::UInt64ListOp(self.read_list_op(r, |r| r.read_u64_le())?),
            CrateType::PathVector => {
                let count = r.read_u64_le()?;
                Value::PathVector(self.read_indices(r, count, |i| Ok(self.path(i)?.clone()))?)
            }
            CrateType::TokenVector => {
                let count = r.read_u64_le()?;
                Value::TokenArray(self.read_indices(r, count, |i| self.token(i))?)
            }
            CrateType::StringVector => {
                let count = r.read_u64_le()?;
                Value::StringArray(self.read_indices(r, count, |i| Ok(self.string(i)?.to_owned()))?)
            }
            CrateType::DoubleVector => {
                let count = r.read_u64_le()?;
                Value::DoubleArray(read_pod_vec(r, count)?)
            }
            CrateType::LayerOffsetVector => {
                let count = r.read_u64_le()?;
                let raw: Vec<[f64; 2]> = read_pod_vec(r, count)?;
                Value::LayerOffsetVector(raw.into_iter().map(|[o, s]| LayerOffset::new(o, s)).collect())
            }
            CrateType::Specifier => {
                Value::Specifier(enum_value(r.read_u32_le()?, rep, "specifier", Specifier::from_u32)?)
            }
            CrateType::Permission => {
                Value::Permission(enum_value(r.read_u32_le()?, rep, "permission", Permission::from_u32)?)
            }
            CrateType::Variability => {
                Value::Variability(enum_value(r.read_u32_le()?, rep, "variability", Variability::from_u32)?)
            }
            CrateType::VariantSelectionMap => {
                let count = r.read_u64_le()?;
                let mut map = VariantSelectionMap::new();
                for _ in 0..count {
                    let set = self.string(r.read_u32_le()?)?;
                    let variant = self.string(r.read_u32_le()?)?;
                    map.insert(set.to_owned(), variant.to_owned());
                }
                Value::VariantSelection(map)
            }
            CrateType::TimeSamples => Value::TimeSamples(Box::new(self.read_time_samples(r, rep, depth)?)),
            CrateType::Payload => Value::Payload(self.read_payload(r)?),
            CrateType::ValueBlock => Value::Block,
            CrateType::Value => self.unpack_nested(ValueRep(r.read_u64_le()?), depth + 1)?,
            CrateType::UnregisteredValue => Value::Opaque(self.string(r.read_u32_le()?)?.to_owned()),
        })
    }
}
