//! Prim blocks, variant sets and property statements.

use super::value::list_op;
use super::Parser;
use crate::sdf::{
    is_valid_identifier, is_valid_property_name, keys, set_meta, Attribute, Layer, Path, PrimIndex, PrimParent,
    PrimSpec, Property, PropertyKind, Specifier, Variability,
};
use crate::usda::token::Tok;
use crate::util::{Error, Result, ResultExt};
use crate::value::{Dictionary, ListOp, ListOpKind, Value};

/// The spec that receives body statements.
#[derive(Clone, Debug)]
enum Owner {
    Prim(PrimIndex),
    Variant {
        prim: PrimIndex,
        set: String,
        variant: String,
    },
}

impl Owner {
    fn parent(&self) -> PrimParent {
        match self {
            Owner::Prim(i) => PrimParent::Prim(*i),
            Owner::Variant { prim, set, variant } => PrimParent::Variant {
                prim: *prim,
                set: set.clone(),
                variant: variant.clone(),
            },
        }
    }
}

fn dangling(index: PrimIndex) -> Error {
    Error::invalid(format!("prim index {index} is not in the layer"))
}

fn owner_properties<'l>(layer: &'l mut Layer, owner: &Owner) -> Result<&'l mut Vec<Property>> {
    match owner {
        Owner::Prim(i) => layer.prim_mut(*i).map(|p| &mut p.properties).ok_or_else(|| dangling(*i)),
        Owner::Variant { prim, set, variant } => Ok(&mut layer.variant_mut(*prim, set, variant)?.properties),
    }
}

fn owner_metas<'l>(layer: &'l mut Layer, owner: &Owner) -> Result<&'l mut Dictionary> {
    match owner {
        Owner::Prim(i) => layer.prim_mut(*i).map(|p| &mut p.metas).ok_or_else(|| dangling(*i)),
        Owner::Variant { prim, set, variant } => Ok(&mut layer.variant_mut(*prim, set, variant)?.metas),
    }
}

impl<'a> Parser<'a> {
    /// `def Type "name" ( metas ) { body }`
    pub(super) fn parse_prim(&mut self, layer: &mut Layer, parent: PrimParent) -> Result<PrimIndex> {
        let specifier = match self.peek() {
            Some(Tok::Ident(kw)) => Specifier::from_keyword(kw),
            _ => None,
        }
        .ok_or_else(|| self.unexpected("`def`, `over` or `class`"))?;
        self.pos += 1;

        let type_name = match self.peek() {
            Some(Tok::Ident(t)) => {
                self.pos += 1;
                Some(t)
            }
            _ => None,
        };
        let name_at = self.pos;
        let name = self.expect_string("a prim name")?;
        if !is_valid_identifier(&name) {
            return Err(self.error_at(name_at, format!("invalid prim name \"{name}\"")));
        }

        let index = layer
            .add_prim(parent, PrimSpec::new(&name, specifier, type_name))
            .map_err(|e| match e {
                Error::MalformedPath { reason, .. } => self.error_at(name_at, reason),
                other => other,
            })?;
        let path = layer.prim(index).map(|p| p.path.clone()).ok_or_else(|| dangling(index))?;

        if self.peek() == Some(Tok::LParen) {
            let mut metas = Dictionary::new();
            self.parse_prim_metas(&mut metas, &path.strip_variant_selections())?;
            owner_metas(layer, &Owner::Prim(index))?.extend(metas);
        }
        self.parse_body(layer, &Owner::Prim(index), &path)?;
        Ok(index)
    }

    fn parse_body(&mut self, layer: &mut Layer, owner: &Owner, path: &Path) -> Result<()> {
        let open = self.pos;
        self.expect(Tok::LBrace)?;
        loop {
            match self.peek() {
                Some(Tok::RBrace) => {
                    self.pos += 1;
                    return Ok(());
                }
                None => return Err(self.error_at(open, "unterminated `{`")),
                _ => {}
            }
            let start = self.pos;
            if let Err(e) = self
                .parse_body_item(layer, owner, path)
                .with_context(|| format!("parsing prim `{path}`"))
            {
                self.record(e)?;
                self.recover(start);
            }
        }
    }

    fn parse_body_item(&mut self, layer: &mut Layer, owner: &Owner, path: &Path) -> Result<()> {
        match (self.peek(), self.peek_nth(1)) {
            (Some(Tok::Ident("def" | "over" | "class")), _) => self.parse_prim(layer, owner.parent()).map(drop),
            (Some(Tok::Ident("variantSet")), Some(Tok::String(_))) => self.parse_variant_set(layer, owner, path),
            (Some(Tok::Ident("reorder")), Some(Tok::Ident("nameChildren" | "properties"))) => {
                self.parse_reorder(layer, owner)
            }
            _ => self.parse_property(layer, owner, path),
        }
    }

    /// `variantSet "set" = { "name" ( metas ) { body } ... }`
    fn parse_variant_set(&mut self, layer: &mut Layer, owner: &Owner, path: &Path) -> Result<()> {
        let Owner::Prim(prim) = *owner else {
            return Err(self.error_here("variant sets inside a variant are not supported"));
        };
        self.pos += 1;
        let set = self.expect_string("a variant set name")?;
        self.expect(Tok::Eq)?;
        let open = self.pos;
        self.expect(Tok::LBrace)?;
        loop {
            match self.peek() {
                Some(Tok::RBrace) => {
                    self.pos += 1;
                    return Ok(());
                }
                None => return Err(self.error_at(open, "unterminated variant set")),
                _ => {}
            }
            let name_at = self.pos;
            let name = self.expect_string("a variant name")?;
            let variant_path = path
                .append_variant_selection(&set, &name)
                .map_err(|e| self.error_at(name_at, e.to_string()))?;
            layer.variant_mut(prim, &set, &name)?;
            let owner = Owner::Variant {
                prim,
                set: set.clone(),
                variant: name,
            };
            if self.peek() == Some(Tok::LParen) {
                let mut metas = Dictionary::new();
                self.parse_prim_metas(&mut metas, &path.strip_variant_selections())?;
                let target = owner_metas(layer, &owner)?;
                for (key, value) in metas {
                    set_meta(target, &key, value);
                }
            }
            self.parse_body(layer, &owner, &variant_path)?;
        }
    }

    /// `reorder nameChildren = [..]` / `reorder properties = [..]`
    fn parse_reorder(&mut self, layer: &mut Layer, owner: &Owner) -> Result<()> {
        self.pos += 1;
        let key = match self.expect_ident("`nameChildren` or `properties`")? {
            "nameChildren" => keys::PRIM_ORDER,
            _ => keys::PROPERTY_ORDER,
        };
        self.expect(Tok::Eq)?;
        let names = self.parse_array(Self::parse_token)?;
        owner_metas(layer, owner)?.insert(key.to_owned(), Value::TokenArray(names));
        Ok(())
    }

    /// Attribute, connection, time-sample or relationship statement.
    fn parse_property(&mut self, layer: &mut Layer, owner: &Owner, path: &Path) -> Result<()> {
        let start = self.pos;
        let qualifier = self.parse_qualifier();
        let custom = self.eat_ident("custom");
        let variability = if self.eat_ident("uniform") {
            Variability::Uniform
        } else if self.eat_ident("config") {
            Variability::Config
        } else {
            self.eat_ident("varying");
            Variability::Varying
        };
        let anchor = path.strip_variant_selections();

        let mut property = if self.eat_ident("rel") {
            self.parse_relationship(&anchor, qualifier)?
        } else {
            self.parse_attribute(&anchor, qualifier, start)?
        };
        property.custom = custom;
        if property.is_attribute() {
            property.variability = variability;
        }
        self.merge_property(layer, owner, property, start)
    }

    fn parse_attribute(&mut self, anchor: &Path, qualifier: Option<ListOpKind>, start: usize) -> Result<Property> {
        let ty = self.parse_type_name()?;
        let name_at = self.pos;
        let raw_name = self.expect_ident("an attribute name")?;
        let (name, suffix) = split_suffix(raw_name);
        if !is_valid_property_name(name) {
            return Err(self.error_at(name_at, format!("invalid attribute name `{name}`")));
        }

        let mut attr = Attribute::new(ty);
        let mut metas = Dictionary::new();
        match suffix {
            Some("connect") => {
                self.expect(Tok::Eq)?;
                let targets = self.parse_list_items(|p| p.parse_path_ref(Some(anchor)))?;
                attr.connections = Some(list_op(qualifier, targets));
            }
            Some(_) => {
                if qualifier.is_some() {
                    return Err(self.error_at(start, "time samples do not take list edits"));
                }
                self.expect(Tok::Eq)?;
                let samples = self
                    .parse_time_samples(ty)
                    .with_context(|| format!("parsing time samples for `{name}`"))?;
                attr.time_samples = Some(samples);
            }
            None => {
                if let Some(kind) = qualifier {
                    return Err(self.error_at(start, format!("`{}` applies only to connections", kind.keyword())));
                }
                if self.peek() == Some(Tok::LParen) {
                    self.parse_property_metas(&mut metas)?;
                }
                if self.eat(Tok::Eq) {
                    let value = self
                        .parse_typed_value(ty)
                        .with_context(|| format!("parsing value for `{name}`"))?;
                    attr.default = Some(value);
                    if self.peek() == Some(Tok::LParen) {
                        self.parse_property_metas(&mut metas)?;
                    }
                }
            }
        }

        let mut property = Property::attribute(name, attr);
        property.metas = metas;
        Ok(property)
    }

    fn parse_relationship(&mut self, anchor: &Path, qualifier: Option<ListOpKind>) -> Result<Property> {
        let name_at = self.pos;
        let name = self.expect_ident("a relationship name")?;
        if !is_valid_property_name(name) {
            return Err(self.error_at(name_at, format!("invalid relationship name `{name}`")));
        }
        let mut metas = Dictionary::new();
        if self.peek() == Some(Tok::LParen) {
            self.parse_property_metas(&mut metas)?;
        }
        let mut targets = None;
        if self.eat(Tok::Eq) {
            let items = self.parse_list_items(|p| p.parse_path_ref(Some(anchor)))?;
            targets = Some(list_op(qualifier, items));
            if self.peek() == Some(Tok::LParen) {
                self.parse_property_metas(&mut metas)?;
            }
        } else if qualifier.is_some() {
            return Err(self.error_at(name_at, "list edit without targets"));
        }
        let mut property = Property::relationship(name, targets);
        property.metas = metas;
        Ok(property)
    }

    /// Statements naming the same property accumulate into one spec.
    fn merge_property(&mut self, layer: &mut Layer, owner: &Owner, property: Property, at: usize) -> Result<()> {
        let properties = owner_properties(layer, owner)?;
        match properties.iter_mut().find(|p| p.name == property.name) {
            None => {
                properties.push(property);
                Ok(())
            }
            Some(existing) => merge_into(existing, property).map_err(|msg| self.error_at(at, msg)),
        }
    }
}

/// `name.connect` / `name.timeSamples` split into the name and suffix.
fn split_suffix(raw: &str) -> (&str, Option<&str>) {
    for suffix in ["connect", "timeSamples"] {
        if let Some(name) = raw.strip_suffix(suffix).and_then(|n| n.strip_suffix('.')) {
            return (name, Some(suffix));
        }
    }
    (raw, None)
}

fn merge_list<T: Clone + PartialEq>(slot: &mut Option<ListOp<T>>, later: Option<ListOp<T>>) {
    if let Some(later) = later {
        match slot {
            Some(op) => op.merge_statement(&later),
            None => *slot = Some(later),
        }
    }
}

fn merge_into(existing: &mut Property, later: Property) -> std::result::Result<(), String> {
    let name = later.name;
    for (key, value) in later.metas {
        set_meta(&mut existing.metas, &key, value);
    }
    existing.custom |= later.custom;
    if later.variability != Variability::Varying {
        existing.variability = later.variability;
    }
    match (&mut existing.kind, later.kind) {
        (PropertyKind::Attribute(a), PropertyKind::Attribute(b)) => {
            if a.type_name != b.type_name {
                return Err(format!("`{name}` redeclared as `{}`, was `{}`", b.type_name, a.type_name));
            }
            if b.default.is_some() {
                a.default = b.default;
            }
            if let Some(mut samples) = b.time_samples {
                if let Some(earlier) = &a.time_samples {
                    samples.merge_weaker(earlier);
                }
                a.time_samples = Some(samples);
            }
            merge_list(&mut a.connections, b.connections);
            Ok(())
        }
        (PropertyKind::Relationship(a), PropertyKind::Relationship(b)) => {
            merge_list(&mut a.targets, b.targets);
            Ok(())
        }
        _ => Err(format!("`{name}` declared as both an attribute and a relationship")),
    }
}
