//! Value literals: typed scalars and arrays, untyped metadata values,
//! dictionaries, time samples and arc targets.

use half::f16;

use super::Parser;
use crate::sdf::{AssetPath, LayerOffset, Path, Payload, Reference, Token};
use crate::usda::token::{unasset, unpath, unquote, Tok};
use crate::util::{Error, Result, ResultExt};
use crate::value::pprint::format_f64;
use crate::value::{
    Dictionary, ListOp, ListOpKind, Matrix2d, Matrix3d, Matrix4d, Matrix4f, Quatd, Quatf, Quath, Role,
    TimeCode, TimeSamples, TypeId, Value, ValueTypeName,
};

/// Unqualified lists are explicit; a qualifier selects the edit kind.
pub(super) fn list_op<T: Clone + PartialEq>(qualifier: Option<ListOpKind>, items: Vec<T>) -> ListOp<T> {
    match qualifier {
        None => ListOp::explicit(items),
        Some(kind) => ListOp::with(kind, items),
    }
}

impl<'a> Parser<'a> {
    /// A value of declared type `ty`. `None` is a block.
    pub(super) fn parse_typed_value(&mut self, ty: ValueTypeName) -> Result<Value> {
        if self.eat_ident("None") {
            return Ok(Value::Block);
        }
        let (base, role) = ty.id.base_and_role();
        let value = if ty.is_array {
            self.parse_array_value(base)?
        } else {
            self.parse_scalar_value(base)?
        };
        Ok(value.with_role(role))
    }

    pub(super) fn parse_scalar_value(&mut self, base: TypeId) -> Result<Value> {
        use TypeId as T;
        Ok(match base {
            T::Bool => Value::Bool(self.parse_bool()?),
            T::UChar => Value::UChar(self.parse_uchar()?),
            T::Int => Value::Int(self.parse_int()?),
            T::UInt => Value::UInt(self.parse_uint()?),
            T::Int64 => Value::Int64(self.parse_int64()?),
            T::UInt64 => Value::UInt64(self.parse_uint64()?),
            T::Half => Value::Half(self.parse_half()?),
            T::Float => Value::Float(self.parse_f32()?),
            T::Double => Value::Double(self.parse_f64()?),
            T::TimeCode => Value::TimeCode(TimeCode(self.parse_f64()?)),
            T::Int2 => Value::Int2(self.parse_tuple(Self::parse_int)?),
            T::Int3 => Value::Int3(self.parse_tuple(Self::parse_int)?),
            T::Int4 => Value::Int4(self.parse_tuple(Self::parse_int)?),
            T::UInt2 => Value::UInt2(self.parse_tuple(Self::parse_uint)?),
            T::UInt3 => Value::UInt3(self.parse_tuple(Self::parse_uint)?),
            T::UInt4 => Value::UInt4(self.parse_tuple(Self::parse_uint)?),
            T::Half2 => Value::Half2(self.parse_tuple(Self::parse_half)?, Role::None),
            T::Half3 => Value::Half3(self.parse_tuple(Self::parse_half)?, Role::None),
            T::Half4 => Value::Half4(self.parse_tuple(Self::parse_half)?, Role::None),
            T::Float2 => Value::Float2(self.parse_tuple(Self::parse_f32)?, Role::None),
            T::Float3 => Value::Float3(self.parse_tuple(Self::parse_f32)?, Role::None),
            T::Float4 => Value::Float4(self.parse_tuple(Self::parse_f32)?, Role::None),
            T::Double2 => Value::Double2(self.parse_tuple(Self::parse_f64)?, Role::None),
            T::Double3 => Value::Double3(self.parse_tuple(Self::parse_f64)?, Role::None),
            T::Double4 => Value::Double4(self.parse_tuple(Self::parse_f64)?, Role::None),
            T::Quath => Value::Quath(Quath(self.parse_quat(Self::parse_half)?)),
            T::Quatf => Value::Quatf(Quatf(self.parse_quat(Self::parse_f32)?)),
            T::Quatd => Value::Quatd(Quatd(self.parse_quat(Self::parse_f64)?)),
            T::Matrix2d => Value::Matrix2d(Matrix2d(self.parse_matrix("matrix2d", Self::parse_f64)?)),
            T::Matrix3d => Value::Matrix3d(Matrix3d(self.parse_matrix("matrix3d", Self::parse_f64)?)),
            T::Matrix4d => Value::Matrix4d(Matrix4d(self.parse_matrix("matrix4d", Self::parse_f64)?), Role::None),
            T::Matrix4f => Value::Matrix4f(Matrix4f(self.parse_matrix("matrix4f", Self::parse_f32)?)),
            T::Token => Value::Token(self.parse_token()?),
            T::String => Value::String(self.expect_string("a string")?),
            T::AssetPath => Value::AssetPath(self.parse_asset()?),
            T::Path => Value::Path(self.parse_path_ref(None)?),
            T::Dictionary => Value::Dictionary(self.parse_dictionary()?),
            T::Opaque => Value::Opaque(self.expect_string("a string")?),
            other => {
                return Err(self.error_here(format!("values of type `{}` cannot be written inline", other.name())));
            }
        })
    }

    pub(super) fn parse_array_value(&mut self, base: TypeId) -> Result<Value> {
        use TypeId as T;
        Ok(match base {
            T::Bool => Value::BoolArray(self.parse_array(Self::parse_bool)?),
            T::UChar => Value::UCharArray(self.parse_array(Self::parse_uchar)?),
            T::Int => Value::IntArray(self.parse_array(Self::parse_int)?),
            T::UInt => Value::UIntArray(self.parse_array(Self::parse_uint)?),
            T::Int64 => Value::Int64Array(self.parse_array(Self::parse_int64)?),
            T::UInt64 => Value::UInt64Array(self.parse_array(Self::parse_uint64)?),
            T::Half => Value::HalfArray(self.parse_array(Self::parse_half)?),
            T::Float => Value::FloatArray(self.parse_array(Self::parse_f32)?),
            T::Double => Value::DoubleArray(self.parse_array(Self::parse_f64)?),
            T::TimeCode => Value::TimeCodeArray(self.parse_array(|p| p.parse_f64().map(TimeCode))?),
            T::Int2 => Value::Int2Array(self.parse_array(|p| p.parse_tuple(Self::parse_int))?),
            T::Int3 => Value::Int3Array(self.parse_array(|p| p.parse_tuple(Self::parse_int))?),
            T::Int4 => Value::Int4Array(self.parse_array(|p| p.parse_tuple(Self::parse_int))?),
            T::UInt2 => Value::UInt2Array(self.parse_array(|p| p.parse_tuple(Self::parse_uint))?),
            T::UInt3 => Value::UInt3Array(self.parse_array(|p| p.parse_tuple(Self::parse_uint))?),
            T::UInt4 => Value::UInt4Array(self.parse_array(|p| p.parse_tuple(Self::parse_uint))?),
            T::Half2 => Value::Half2Array(self.parse_array(|p| p.parse_tuple(Self::parse_half))?, Role::None),
            T::Half3 => Value::Half3Array(self.parse_array(|p| p.parse_tuple(Self::parse_half))?, Role::None),
            T::Half4 => Value::Half4Array(self.parse_array(|p| p.parse_tuple(Self::parse_half))?, Role::None),
            T::Float2 => Value::Float2Array(self.parse_array(|p| p.parse_tuple(Self::parse_f32))?, Role::None),
            T::Float3 => Value::Float3Array(self.parse_array(|p| p.parse_tuple(Self::parse_f32))?, Role::None),
            T::Float4 => Value::Float4Array(self.parse_array(|p| p.parse_tuple(Self::parse_f32))?, Role::None),
            T::Double2 => Value::Double2Array(self.parse_array(|p| p.parse_tuple(Self::parse_f64))?, Role::None),
            T::Double3 => Value::Double3Array(self.parse_array(|p| p.parse_tuple(Self::parse_f64))?, Role::None),
            T::Double4 => Value::Double4Array(self.parse_array(|p| p.parse_tuple(Self::parse_f64))?, Role::None),
            T::Quath => Value::QuathArray(self.parse_array(|p| p.parse_quat(Self::parse_half).map(Quath))?),
            T::Quatf => Value::QuatfArray(self.parse_array(|p| p.parse_quat(Self::parse_f32).map(Quatf))?),
            T::Quatd => Value::QuatdArray(self.parse_array(|p| p.parse_quat(Self::parse_f64).map(Quatd))?),
            T::Matrix2d => Value::Matrix2dArray(
                self.parse_array(|p| p.parse_matrix("matrix2d", Self::parse_f64).map(Matrix2d))?,
            ),
            T::Matrix3d => Value::Matrix3dArray(
                self.parse_array(|p| p.parse_matrix("matrix3d", Self::parse_f64).map(Matrix3d))?,
            ),
            T::Matrix4d => Value::Matrix4dArray(
                self.parse_array(|p| p.parse_matrix("matrix4d", Self::parse_f64).map(Matrix4d))?,
                Role::None,
            ),
            T::Matrix4f => Value::Matrix4fArray(
                self.parse_array(|p| p.parse_matrix("matrix4f", Self::parse_f32).map(Matrix4f))?,
            ),
            T::Token => Value::TokenArray(self.parse_array(Self::parse_token)?),
            T::String => Value::StringArray(self.parse_array(|p| p.expect_string("a string"))?),
            T::AssetPath => Value::AssetPathArray(self.parse_array(Self::parse_asset)?),
            T::Path => Value::PathVector(self.parse_array(|p| p.parse_path_ref(None))?),
            other => {
                return Err(self.error_here(format!("arrays of `{}` are not supported", other.name())));
            }
        })
    }

    // ---- scalars ----

    pub(super) fn number_text(&mut self, what: &str) -> Result<(usize, &'a str)> {
        match self.peek() {
            Some(Tok::Number(s)) => {
                self.pos += 1;
                Ok((self.pos - 1, s))
            }
            _ => Err(self.unexpected(what)),
        }
    }

    pub(super) fn parse_integer<T: std::str::FromStr>(&mut self, what: &str) -> Result<T> {
        let (at, text) = self.number_text(what)?;
        text.parse::<T>()
            .map_err(|_| self.error_at(at, format!("`{text}` is not a valid {what}")))
    }

    pub(super) fn parse_int(&mut self) -> Result<i32> {
        self.parse_integer("int")
    }

    pub(super) fn parse_uint(&mut self) -> Result<u32> {
        self.parse_integer("uint")
    }

    pub(super) fn parse_int64(&mut self) -> Result<i64> {
        self.parse_integer("int64")
    }

    pub(super) fn parse_uint64(&mut self) -> Result<u64> {
        self.parse_integer("uint64")
    }

    pub(super) fn parse_uchar(&mut self) -> Result<u8> {
        self.parse_integer("uchar")
    }

    pub(super) fn parse_bool(&mut self) -> Result<bool> {
        match self.peek() {
            Some(Tok::Ident("true")) | Some(Tok::Number("1")) => {
                self.pos += 1;
                Ok(true)
            }
            Some(Tok::Ident("false")) | Some(Tok::Number("0")) => {
                self.pos += 1;
                Ok(false)
            }
            _ => Err(self.unexpected("a bool")),
        }
    }

    pub(super) fn parse_f64(&mut self) -> Result<f64> {
        let v = match self.peek() {
            Some(Tok::NegInf) => f64::NEG_INFINITY,
            Some(Tok::Ident("inf")) => f64::INFINITY,
            Some(Tok::Ident("nan")) => f64::NAN,
            Some(Tok::Number(s)) => s
                .parse::<f64>()
                .map_err(|_| self.error_here(format!("`{s}` is not a valid number")))?,
            _ => return Err(self.unexpected("a number")),
        };
        self.pos += 1;
        Ok(v)
    }

    pub(super) fn parse_f32(&mut self) -> Result<f32> {
        self.parse_f64().map(|v| v as f32)
    }

    pub(super) fn parse_half(&mut self) -> Result<f16> {
        self.parse_f64().map(f16::from_f64)
    }

    pub(super) fn parse_token(&mut self) -> Result<Token> {
        self.expect_string("a token string").map(|s| Token::new(&s))
    }

    pub(super) fn parse_asset(&mut self) -> Result<AssetPath> {
        match self.peek() {
            Some(Tok::Asset(raw)) => {
                self.pos += 1;
                Ok(AssetPath::new(unasset(raw)))
            }
            _ => Err(self.unexpected("an asset path")),
        }
    }

    // ---- compound literals ----

    /// `(a, b, c)` with exactly `N` components.
    pub(super) fn parse_tuple<T, const N: usize>(&mut self, mut item: impl FnMut(&mut Self) -> Result<T>) -> Result<[T; N]> {
        let start = self.pos;
        self.expect(Tok::LParen)?;
        let mut items = Vec::with_capacity(N);
        loop {
            if self.eat(Tok::RParen) {
                break;
            }
            items.push(item(self)?);
            if !self.eat(Tok::Comma) {
                self.expect(Tok::RParen)?;
                break;
            }
        }
        let found = items.len();
        items
            .try_into()
            .map_err(|_| self.error_at(start, format!("expected {N} components, found {found}")))
    }

    /// Quaternions are written `(w, x, y, z)` and stored `[x, y, z, w]`.
    pub(super) fn parse_quat<T>(&mut self, item: impl FnMut(&mut Self) -> Result<T>) -> Result<[T; 4]> {
        let [w, x, y, z] = self.parse_tuple(item)?;
        Ok([x, y, z, w])
    }

    /// `( (row0), (row1), ... )`
    pub(super) fn parse_matrix<T, const N: usize>(
        &mut self,
        name: &str,
        mut item: impl FnMut(&mut Self) -> Result<T>,
    ) -> Result<[[T; N]; N]> {
        let start = self.pos;
        self.expect(Tok::LParen)?;
        let mut rows: Vec<[T; N]> = Vec::with_capacity(N);
        loop {
            if self.eat(Tok::RParen) {
                break;
            }
            let row = self
                .parse_tuple(&mut item)
                .with_context(|| format!("parsing {name} row {}", rows.len()))?;
            rows.push(row);
            if !self.eat(Tok::Comma) {
                self.expect(Tok::RParen)?;
                break;
            }
        }
        let found = rows.len();
        rows.try_into()
            .map_err(|_| self.error_at(start, format!("expected {N} rows, found {found}")))
    }

    /// `[a, b, ...]`, trailing comma allowed.
    pub(super) fn parse_array<T>(&mut self, mut item: impl FnMut(&mut Self) -> Result<T>) -> Result<Vec<T>> {
        self.expect(Tok::LBracket)?;
        let mut items = Vec::new();
        loop {
            if self.eat(Tok::RBracket) {
                return Ok(items);
            }
            let value = item(self).with_context(|| format!("parsing array element {}", items.len()))?;
            items.push(value);
            if !self.eat(Tok::Comma) {
                self.expect(Tok::RBracket)?;
                return Ok(items);
            }
        }
    }

    /// Right-hand side of a list-op statement: `None`, `[..]`, or a single item.
    pub(super) fn parse_list_items<T>(&mut self, mut item: impl FnMut(&mut Self) -> Result<T>) -> Result<Vec<T>> {
        if self.eat_ident("None") {
            return Ok(Vec::new());
        }
        if self.peek() == Some(Tok::LBracket) {
            return self.parse_array(item);
        }
        Ok(vec![item(self)?])
    }

    /// `{ type key = value ... }`. Entries may be separated by `;` or `,`.
    pub(super) fn parse_dictionary(&mut self) -> Result<Dictionary> {
        let open = self.pos;
        self.expect(Tok::LBrace)?;
        let mut dict = Dictionary::new();
        loop {
            match self.peek() {
                Some(Tok::RBrace) => {
                    self.pos += 1;
                    return Ok(dict);
                }
                None => return Err(self.error_at(open, "unterminated dictionary")),
                _ => {}
            }
            let (key, value) = self.parse_dictionary_entry().context("parsing dictionary entry")?;
            dict.insert(key, value);
            if !self.eat(Tok::Semi) {
                self.eat(Tok::Comma);
            }
        }
    }

    pub(super) fn parse_dictionary_entry(&mut self) -> Result<(String, Value)> {
        let ty = self.parse_type_name()?;
        let key = match self.peek() {
            Some(Tok::Ident(s)) => s.to_owned(),
            Some(Tok::String(raw)) => unquote(raw),
            _ => return Err(self.unexpected("a dictionary key")),
        };
        self.pos += 1;
        self.expect(Tok::Eq)?;
        let value = self
            .parse_typed_value(ty)
            .with_context(|| format!("parsing value for `{key}`"))?;
        Ok((key, value))
    }

    /// `float3`, `point3f[]`, ...
    pub(super) fn parse_type_name(&mut self) -> Result<ValueTypeName> {
        let at = self.pos;
        let base = self.expect_ident("a value type")?;
        let spelled = if self.eat_array_brackets() {
            format!("{base}[]")
        } else {
            base.to_owned()
        };
        ValueTypeName::parse(&spelled).ok_or_else(|| self.error_at(at, format!("unknown value type `{spelled}`")))
    }

    /// `{ time: value, ... }`
    pub(super) fn parse_time_samples(&mut self, ty: ValueTypeName) -> Result<TimeSamples> {
        let open = self.pos;
        self.expect(Tok::LBrace)?;
        let mut samples = TimeSamples::new();
        loop {
            match self.peek() {
                Some(Tok::RBrace) => {
                    self.pos += 1;
                    return Ok(samples);
                }
                None => return Err(self.error_at(open, "unterminated time samples")),
                _ => {}
            }
            let at = self.pos;
            let time = self.parse_f64()?;
            self.expect(Tok::Colon)?;
            let value = self
                .parse_typed_value(ty)
                .with_context(|| format!("parsing sample at time {}", format_f64(time)))?;
            samples
                .insert(time, value)
                .map_err(|e| self.error_at(at, e.to_string()))?;
            if !self.eat(Tok::Comma) {
                self.expect(Tok::RBrace)?;
                return Ok(samples);
            }
        }
    }

    // ---- untyped values (unknown metadata) ----

    /// A value whose type is inferred from its literal.
    pub(super) fn parse_untyped_value(&mut self) -> Result<Value> {
        let at = self.pos;
        let value = match self.peek() {
            Some(Tok::String(raw)) => Value::String(unquote(raw)),
            Some(Tok::Asset(raw)) => Value::AssetPath(AssetPath::new(unasset(raw))),
            Some(Tok::PathRef(_)) => return self.parse_path_ref(None).map(Value::Path),
            Some(Tok::Number(s)) => untyped_number(s),
            Some(Tok::NegInf) => Value::Double(f64::NEG_INFINITY),
            Some(Tok::Ident("inf")) => Value::Double(f64::INFINITY),
            Some(Tok::Ident("nan")) => Value::Double(f64::NAN),
            Some(Tok::Ident("true")) => Value::Bool(true),
            Some(Tok::Ident("false")) => Value::Bool(false),
            Some(Tok::Ident("None")) => Value::Block,
            Some(Tok::Ident(s)) => Value::Token(Token::new(s)),
            Some(Tok::LBrace) => return self.parse_dictionary().map(Value::Dictionary),
            Some(Tok::LParen) => return self.parse_untyped_tuple(),
            Some(Tok::LBracket) => {
                let items = self.parse_array(Self::parse_untyped_value)?;
                return self.homogeneous_array(at, items);
            }
            _ => return Err(self.unexpected("a value")),
        };
        self.pos += 1;
        Ok(value)
    }

    pub(super) fn parse_untyped_tuple(&mut self) -> Result<Value> {
        let start = self.pos;
        self.expect(Tok::LParen)?;
        let mut items = Vec::new();
        loop {
            if self.eat(Tok::RParen) {
                break;
            }
            items.push(self.parse_f64()?);
            if !self.eat(Tok::Comma) {
                self.expect(Tok::RParen)?;
                break;
            }
        }
        match items[..] {
            [a, b] => Ok(Value::Double2([a, b], Role::None)),
            [a, b, c] => Ok(Value::Double3([a, b, c], Role::None)),
            [a, b, c, d] => Ok(Value::Double4([a, b, c, d], Role::None)),
            _ => Err(self.error_at(start, format!("expected 2 to 4 tuple components, found {}", items.len()))),
        }
    }

    pub(super) fn homogeneous_array(&self, at: usize, items: Vec<Value>) -> Result<Value> {
        macro_rules! gather {
            ($variant:ident) => {
                items
                    .iter()
                    .map(|v| match v {
                        Value::$variant(x) => Some(x.clone()),
                        _ => None,
                    })
                    .collect::<Option<Vec<_>>>()
            };
            ($variant:ident, role) => {
                items
                    .iter()
                    .map(|v| match v {
                        Value::$variant(x, _) => Some(*x),
                        _ => None,
                    })
                    .collect::<Option<Vec<_>>>()
            };
        }
        let Some(first) = items.first() else {
            return Ok(Value::TokenArray(Vec::new()));
        };
        let array = match first {
            Value::String(_) => gather!(String).map(Value::StringArray),
            Value::Token(_) => gather!(Token).map(Value::TokenArray),
            Value::AssetPath(_) => gather!(AssetPath).map(Value::AssetPathArray),
            Value::Path(_) => gather!(Path).map(Value::PathVector),
            Value::Bool(_) => gather!(Bool).map(Value::BoolArray),
            Value::Double2(..) => gather!(Double2, role).map(|v| Value::Double2Array(v, Role::None)),
            Value::Double3(..) => gather!(Double3, role).map(|v| Value::Double3Array(v, Role::None)),
            Value::Double4(..) => gather!(Double4, role).map(|v| Value::Double4Array(v, Role::None)),
            Value::Int(_) | Value::Int64(_) | Value::Double(_) => gather!(Int)
                .map(Value::IntArray)
                .or_else(|| {
                    items
                        .iter()
                        .map(|v| match v {
                            Value::Int(x) => Some(i64::from(*x)),
                            Value::Int64(x) => Some(*x),
                            _ => None,
                        })
                        .collect::<Option<Vec<_>>>()
                        .map(Value::Int64Array)
                })
                .or_else(|| items.iter().map(Value::as_f64).collect::<Option<Vec<_>>>().map(Value::DoubleArray)),
            _ => None,
        };
        array.ok_or_else(|| self.error_at(at, "array elements must share one type"))
    }

    // ---- paths and arcs ----

    /// `<path>`. Relative paths resolve against `anchor`; `<.prop>` names
    /// a property of the anchor prim.
    pub(super) fn parse_path_ref(&mut self, anchor: Option<&Path>) -> Result<Path> {
        let at = self.pos;
        let raw = match self.peek() {
            Some(Tok::PathRef(raw)) => raw,
            _ => return Err(self.unexpected("a path")),
        };
        self.pos += 1;
        let text = unpath(raw);
        let invalid = |e: Error| {
            let reason = match e {
                Error::MalformedPath { reason, .. } => reason,
                other => other.to_string(),
            };
            self.error_at(at, format!("invalid path <{text}>: {reason}"))
        };
        match (text.strip_prefix('.'), anchor) {
            (Some(prop), Some(anchor)) => anchor.append_property(prop).map_err(invalid),
            _ => {
                let path = Path::new(text).map_err(invalid)?;
                match anchor {
                    Some(anchor) if !path.is_absolute() => path.make_absolute(anchor).map_err(invalid),
                    _ => Ok(path),
                }
            }
        }
    }

    /// `@asset@</prim> (offset = 1; scale = 2)` or an internal `</prim>`.
    pub(super) fn parse_reference(&mut self, anchor: &Path) -> Result<Reference> {
        let mut reference = Reference::default();
        match self.peek() {
            Some(Tok::Asset(raw)) => {
                self.pos += 1;
                reference.asset_path = AssetPath::new(unasset(raw));
                if let Some(Tok::PathRef(_)) = self.peek() {
                    reference.prim_path = Some(self.parse_path_ref(None)?);
                }
            }
            Some(Tok::PathRef(_)) => reference.prim_path = Some(self.parse_path_ref(Some(anchor))?),
            _ => return Err(self.unexpected("an asset or prim path")),
        }
        if self.peek() == Some(Tok::LParen) {
            self.parse_arc_options(&mut reference.layer_offset, Some(&mut reference.custom_data))
                .context("parsing reference options")?;
        }
        Ok(reference)
    }

    pub(super) fn parse_payload(&mut self, anchor: &Path) -> Result<Payload> {
        let start = self.pos;
        let reference = self.parse_reference(anchor)?;
        if !reference.custom_data.is_empty() {
            return Err(self.error_at(start, "payloads do not carry customData"));
        }
        Ok(Payload {
            asset_path: reference.asset_path,
            prim_path: reference.prim_path,
            layer_offset: reference.layer_offset,
        })
    }

    /// `(offset = f; scale = f; customData = {..})`
    pub(super) fn parse_arc_options(
        &mut self,
        offset: &mut LayerOffset,
        mut custom_data: Option<&mut Dictionary>,
    ) -> Result<()> {
        self.expect(Tok::LParen)?;
        loop {
            if self.eat(Tok::RParen) {
                return Ok(());
            }
            let at = self.pos;
            let key = self.expect_ident("`offset` or `scale`")?;
            self.expect(Tok::Eq)?;
            match (key, custom_data.as_deref_mut()) {
                ("offset", _) => offset.offset = self.parse_f64()?,
                ("scale", _) => offset.scale = self.parse_f64()?,
                ("customData", Some(dict)) => *dict = self.parse_dictionary()?,
                (other, _) => return Err(self.error_at(at, format!("unknown option `{other}`"))),
            }
            if !self.eat(Tok::Semi) {
                self.eat(Tok::Comma);
            }
        }
    }
}

fn untyped_number(text: &str) -> Value {
    let is_integer = !text.contains(['.', 'e', 'E']);
    if is_integer {
        if let Ok(v) = text.parse::<i32>() {
            return Value::Int(v);
        }
        if let Ok(v) = text.parse::<i64>() {
            return Value::Int64(v);
        }
    }
    Value::Double(text.parse::<f64>().unwrap_or(f64::NAN))
}
