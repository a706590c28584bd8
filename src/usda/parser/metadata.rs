//! Metadata blocks: layer, prim and property `( ... )`.

use super::value::list_op;
use super::Parser;
use crate::sdf::{keys, set_meta, Layer, LayerMetas, LayerOffset, Path, SubLayer};
use crate::usda::token::{unquote, Tok};
use crate::util::{Result, ResultExt, WarningKind};
use crate::value::{Dictionary, ListOpKind, Value, VariantSelectionMap};

impl<'a> Parser<'a> {
    /// `add` / `prepend` / `append` / `delete` / `reorder` before a field name.
    pub(super) fn parse_qualifier(&mut self) -> Option<ListOpKind> {
        match (self.peek(), self.peek_nth(1)) {
            (Some(Tok::Ident(kw)), Some(Tok::Ident(_))) => {
                let kind = ListOpKind::from_keyword(kw)?;
                self.pos += 1;
                Some(kind)
            }
            _ => None,
        }
    }

    /// Run `entry` for each statement of a parenthesised block, recovering
    /// from failed entries.
    fn parse_meta_block(&mut self, rule: &str, mut entry: impl FnMut(&mut Self) -> Result<()>) -> Result<()> {
        let open = self.pos;
        self.expect(Tok::LParen)?;
        loop {
            match self.peek() {
                Some(Tok::RParen) => {
                    self.pos += 1;
                    return Ok(());
                }
                None => return Err(self.error_at(open, "unterminated `(`")),
                _ => {}
            }
            let start = self.pos;
            if let Err(e) = entry(self).context(rule) {
                self.record(e)?;
                self.recover(start);
            }
            self.eat(Tok::Semi);
        }
    }

    pub(super) fn parse_layer_metas(&mut self, layer: &mut Layer) -> Result<()> {
        let metas = layer.metas_mut();
        self.parse_meta_block("parsing layer metadata", |p| p.parse_layer_meta(metas))
    }

    fn parse_layer_meta(&mut self, metas: &mut LayerMetas) -> Result<()> {
        if let Some(Tok::String(raw)) = self.peek() {
            self.pos += 1;
            metas.doc = Some(unquote(raw));
            return Ok(());
        }
        let key = self.expect_ident("a metadata key")?;
        self.expect(Tok::Eq)?;
        match key {
            "doc" | "documentation" => metas.doc = Some(self.expect_string("a string")?),
            "comment" => metas.comment = Some(self.expect_string("a string")?),
            "defaultPrim" => metas.default_prim = Some(self.parse_token()?),
            "upAxis" => metas.up_axis = Some(self.parse_token()?),
            "metersPerUnit" => metas.meters_per_unit = Some(self.parse_f64()?),
            "timeCodesPerSecond" => metas.time_codes_per_second = Some(self.parse_f64()?),
            "framesPerSecond" => metas.frames_per_second = Some(self.parse_f64()?),
            "startTimeCode" => metas.start_time_code = Some(self.parse_f64()?),
            "endTimeCode" => metas.end_time_code = Some(self.parse_f64()?),
            "subLayers" => metas.sub_layers = self.parse_list_items(Self::parse_sub_layer)?,
            "customLayerData" => metas.custom_layer_data = self.parse_dictionary()?,
            other => {
                self.warnings
                    .push(WarningKind::UnknownMetadata, format!("unknown layer metadata `{other}`"));
                let value = self.parse_untyped_value()?;
                metas.other.insert(other.to_owned(), value);
            }
        }
        Ok(())
    }

    fn parse_sub_layer(&mut self) -> Result<SubLayer> {
        let asset_path = self.parse_asset()?;
        let mut offset = LayerOffset::IDENTITY;
        if self.peek() == Some(Tok::LParen) {
            self.parse_arc_options(&mut offset, None)?;
        }
        Ok(SubLayer { asset_path, offset })
    }

    /// Prim (or variant) metadata. Relative paths resolve against `anchor`.
    pub(super) fn parse_prim_metas(&mut self, metas: &mut Dictionary, anchor: &Path) -> Result<()> {
        self.parse_meta_block("parsing prim metadata", |p| p.parse_prim_meta(metas, anchor))
    }

    fn parse_prim_meta(&mut self, metas: &mut Dictionary, anchor: &Path) -> Result<()> {
        if let Some(Tok::String(raw)) = self.peek() {
            self.pos += 1;
            metas.insert(keys::DOC.to_owned(), Value::String(unquote(raw)));
            return Ok(());
        }
        let qualifier = self.parse_qualifier();
        let key_at = self.pos;
        let key = self.expect_ident("a metadata key")?;
        self.expect(Tok::Eq)?;
        let value = match key {
            keys::REFERENCES => {
                Value::ReferenceListOp(list_op(qualifier, self.parse_list_items(|p| p.parse_reference(anchor))?))
            }
            keys::PAYLOAD => {
                Value::PayloadListOp(list_op(qualifier, self.parse_list_items(|p| p.parse_payload(anchor))?))
            }
            keys::INHERITS | keys::SPECIALIZES => Value::PathListOp(list_op(
                qualifier,
                self.parse_list_items(|p| p.parse_path_ref(Some(anchor)))?,
            )),
            keys::VARIANT_SETS => Value::StringListOp(list_op(
                qualifier,
                self.parse_list_items(|p| p.expect_string("a variant set name"))?,
            )),
            keys::API_SCHEMAS => Value::TokenListOp(list_op(qualifier, self.parse_list_items(Self::parse_token)?)),
            _ if qualifier.is_some() => {
                return Err(self.error_at(key_at, format!("`{key}` does not take list edits")));
            }
            keys::VARIANTS => Value::VariantSelection(self.parse_variant_selection()?),
            keys::KIND => Value::Token(self.parse_token()?),
            keys::ACTIVE | keys::HIDDEN | keys::INSTANCEABLE => Value::Bool(self.parse_bool()?),
            keys::DOC | keys::COMMENT | keys::DISPLAY_NAME => Value::String(self.expect_string("a string")?),
            keys::CUSTOM_DATA | keys::ASSET_INFO => Value::Dictionary(self.parse_dictionary()?),
            other => {
                self.warnings
                    .push(WarningKind::UnknownMetadata, format!("unknown prim metadata `{other}` at {anchor}"));
                self.parse_untyped_value()?
            }
        };
        set_meta(metas, key, value);
        Ok(())
    }

    /// `variants = { string set = "variant" ... }`
    fn parse_variant_selection(&mut self) -> Result<VariantSelectionMap> {
        let start = self.pos;
        let mut selection = VariantSelectionMap::new();
        for (set, value) in self.parse_dictionary()? {
            match value {
                Value::String(variant) => {
                    selection.insert(set, variant);
                }
                other => {
                    return Err(self.error_at(
                        start,
                        format!("variant selection for `{set}` must be a string, found {}", other.type_name()),
                    ));
                }
            }
        }
        Ok(selection)
    }

    /// Attribute and relationship metadata.
    pub(super) fn parse_property_metas(&mut self, metas: &mut Dictionary) -> Result<()> {
        self.parse_meta_block("parsing property metadata", |p| p.parse_property_meta(metas))
    }

    fn parse_property_meta(&mut self, metas: &mut Dictionary) -> Result<()> {
        if let Some(Tok::String(raw)) = self.peek() {
            self.pos += 1;
            metas.insert(keys::DOC.to_owned(), Value::String(unquote(raw)));
            return Ok(());
        }
        let key_at = self.pos;
        let key = self.expect_ident("a metadata key")?;
        self.expect(Tok::Eq)?;
        let value = match key {
            "interpolation" | "colorSpace" | "connectability" | "renderType" | "outputName" | "bindMaterialAs" => {
                Value::Token(self.parse_token()?)
            }
            "doc" | "comment" | "displayName" | "displayGroup" => Value::String(self.expect_string("a string")?),
            "elementSize" | "unauthoredValuesIndex" => Value::Int(self.parse_int()?),
            "hidden" => Value::Bool(self.parse_bool()?),
            "customData" | "sdrMetadata" | "assetInfo" => Value::Dictionary(self.parse_dictionary()?),
            "allowedTokens" => Value::TokenArray(self.parse_array(Self::parse_token)?),
            other => return Err(self.error_at(key_at, format!("unknown property metadata `{other}`"))),
        };
        metas.insert(key.to_owned(), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::super::parse_layer;
    use crate::sdf::{LayerOffset, Path, Reference, Token};
    use crate::util::{Limits, WarningKind, Warnings};
    use crate::value::{ListOpKind, Value};

    #[test]
    fn test_layer_metas() {
        let src = r#"#usda 1.0
(
    "Top doc"
    defaultPrim = "World"
    upAxis = "Z"
    metersPerUnit = 0.01
    timeCodesPerSecond = 24
    subLayers = [@./base.usda@ (offset = 10), @./extra.usda@]
    customLayerData = { string creator = "hand" }
    renderSettingsPrimPath = "/Render"
)
"#;
        let mut warnings = Warnings::new();
        let layer = parse_layer(src, "l.usda", &Limits::default(), &mut warnings).unwrap();
        let m = layer.metas();
        assert_eq!(m.doc.as_deref(), Some("Top doc"));
        assert_eq!(m.default_prim, Some(Token::new("World")));
        assert_eq!(m.up_axis, Some(Token::new("Z")));
        assert_eq!(m.meters_per_unit, Some(0.01));
        assert_eq!(m.time_codes_per_second, Some(24.0));
        assert_eq!(m.sub_layers.len(), 2);
        assert_eq!(m.sub_layers[0].offset, LayerOffset::new(10.0, 1.0));
        assert_eq!(m.custom_layer_data["creator"], Value::String("hand".into()));
        assert_eq!(m.other["renderSettingsPrimPath"], Value::String("/Render".into()));
        assert!(warnings.has(WarningKind::UnknownMetadata));
    }

    #[test]
    fn test_prim_arc_metas_fold() {
        let src = r#"#usda 1.0
def "A" (
    prepend references = [@a.usda@, @b.usda@</B>]
    delete references = @a.usda@
    inherits = </_class>
    variants = { string lod = "high" }
    kind = "component"
    instanceable = true
)
{
}
"#;
        let layer = parse_layer(src, "l.usda", &Limits::default(), &mut Warnings::new()).unwrap();
        let a = layer.find_prim(&Path::new("/A").unwrap()).unwrap();
        let refs = a.references().unwrap();
        assert_eq!(refs.resolve(), vec![Reference::new("b.usda", Some(Path::new("/B").unwrap()))]);
        assert_eq!(refs.items(ListOpKind::Deleted).len(), 1);
        assert_eq!(a.inherits().unwrap().resolve(), vec![Path::new("/_class").unwrap()]);
        assert_eq!(a.variant_selection().unwrap()["lod"], "high");
        assert_eq!(a.kind(), Some(Token::new("component")));
        assert_eq!(a.metas["instanceable"], Value::Bool(true));
    }

    #[test]
    fn test_qualifier_on_plain_field_rejected() {
        let src = "#usda 1.0\ndef \"A\" (\n    prepend kind = \"x\"\n) {}\n";
        let err = parse_layer(src, "l", &Limits::default(), &mut Warnings::new()).unwrap_err();
        let syn = err.as_syntax().unwrap();
        assert_eq!(syn.line, 3);
        assert!(syn.message.contains("kind"));
    }

    #[test]
    fn test_unknown_property_metadata_rejected() {
        let src = "#usda 1.0\ndef \"A\" {\n    float a = 1 (\n        bogusKey = 1\n    )\n}\n";
        let err = parse_layer(src, "l", &Limits::default(), &mut Warnings::new()).unwrap_err();
        assert!(err.as_syntax().unwrap().message.contains("bogusKey"));
    }
}
