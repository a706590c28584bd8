//! Fixture builders shared by the integration tests.
//!
//! [`CrateBuilder`] writes crate files with the library's own codecs;
//! [`build_zip`] writes a store-only zip with 64-byte aligned members.

#![allow(dead_code)]

use std::collections::HashMap;

use tinyusdz::codec::{self, lz4};
use tinyusdz::usdc::format::*;

#[derive(Debug)]
struct PathNode {
    name: String,
    is_property: bool,
    children: Vec<usize>,
}

/// In-memory crate file under construction.
///
/// Out-of-line values go into a blob placed right after the bootstrap, so
/// a rep's offset is known the moment the value is written.
pub struct CrateBuilder {
    tokens: Vec<String>,
    token_ids: HashMap<String, u32>,
    strings: Vec<u32>,
    fields: Vec<(u32, u64)>,
    fieldsets: Vec<u32>,
    nodes: Vec<PathNode>,
    specs: Vec<(u32, u32, u32)>,
    values: Vec<u8>,
    version: [u8; 3],
}

impl Default for CrateBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl CrateBuilder {
    pub fn new() -> Self {
        let mut b = Self {
            tokens: Vec::new(),
            token_ids: HashMap::new(),
            strings: Vec::new(),
            fields: Vec::new(),
            fieldsets: Vec::new(),
            nodes: vec![PathNode {
                name: String::new(),
                is_property: false,
                children: Vec::new(),
            }],
            specs: Vec::new(),
            values: Vec::new(),
            version: [0, 8, 0],
        };
        // Index 0 can't carry the property sign.
        b.token("");
        b
    }

    pub fn version(mut self, version: [u8; 3]) -> Self {
        self.version = version;
        self
    }

    pub fn token(&mut self, s: &str) -> u32 {
        if let Some(&id) = self.token_ids.get(s) {
            return id;
        }
        let id = self.tokens.len() as u32;
        self.tokens.push(s.to_owned());
        self.token_ids.insert(s.to_owned(), id);
        id
    }

    pub fn string(&mut self, s: &str) -> u32 {
        let token = self.token(s);
        if let Some(i) = self.strings.iter().position(|&t| t == token) {
            return i as u32;
        }
        self.strings.push(token);
        (self.strings.len() - 1) as u32
    }

    /// Register `/A/B` or `/A/B.prop`, creating ancestors; returns the path index.
    pub fn path(&mut self, path: &str) -> u32 {
        let body = path.trim_start_matches('/');
        if body.is_empty() {
            return 0;
        }
        let (prims, prop) = match body.split_once('.') {
            Some((p, q)) => (p, Some(q)),
            None => (body, None),
        };
        let mut cur = 0usize;
        for name in prims.split('/') {
            cur = self.child(cur, name, false);
        }
        if let Some(prop) = prop {
            cur = self.child(cur, prop, true);
        }
        cur as u32
    }

    fn child(&mut self, parent: usize, name: &str, is_property: bool) -> usize {
        let existing = self.nodes[parent]
            .children
            .iter()
            .copied()
            .find(|&c| self.nodes[c].name == name && self.nodes[c].is_property == is_property);
        if let Some(c) = existing {
            return c;
        }
        self.token(name);
        self.nodes.push(PathNode {
            name: name.to_owned(),
            is_property,
            children: Vec::new(),
        });
        let index = self.nodes.len() - 1;
        self.nodes[parent].children.push(index);
        index
    }

    fn offset(&self) -> u64 {
        (BOOTSTRAP_SIZE + self.values.len()) as u64
    }

    fn out_of_line(&mut self, ty: CrateType, array: bool, compressed: bool, bytes: &[u8]) -> u64 {
        let at = self.offset();
        self.values.extend_from_slice(bytes);
        make_rep(ty, at, array, false, compressed)
    }

    pub fn inline(ty: CrateType, payload: u64) -> u64 {
        make_rep(ty, payload, false, true, false)
    }

    pub fn token_value(&mut self, s: &str) -> u64 {
        let t = self.token(s);
        Self::inline(CrateType::Token, u64::from(t))
    }

    pub fn string_value(&mut self, s: &str) -> u64 {
        let i = self.string(s);
        Self::inline(CrateType::String, u64::from(i))
    }

    pub fn specifier(&mut self, raw: u32) -> u64 {
        Self::inline(CrateType::Specifier, u64::from(raw))
    }

    pub fn float(&mut self, v: f32) -> u64 {
        Self::inline(CrateType::Float, u64::from(v.to_bits()))
    }

    pub fn int(&mut self, v: i32) -> u64 {
        Self::inline(CrateType::Int, u64::from(v as u32))
    }

    pub fn double(&mut self, v: f64) -> u64 {
        self.out_of_line(CrateType::Double, false, false, &v.to_le_bytes())
    }

    pub fn double3(&mut self, v: [f64; 3]) -> u64 {
        let bytes: Vec<u8> = v.iter().flat_map(|c| c.to_le_bytes()).collect();
        self.out_of_line(CrateType::Vec3d, false, false, &bytes)
    }

    /// `(x, y, z)` with every component a small integer, inlined as bytes.
    pub fn float3_inline(v: [i8; 3]) -> u64 {
        let payload = u64::from(v[0] as u8) | u64::from(v[1] as u8) << 8 | u64::from(v[2] as u8) << 16;
        Self::inline(CrateType::Vec3f, payload)
    }

    pub fn float_array(&mut self, v: &[f32]) -> u64 {
        let mut bytes = (v.len() as u64).to_le_bytes().to_vec();
        bytes.extend(v.iter().flat_map(|f| f.to_le_bytes()));
        self.out_of_line(CrateType::Float, true, false, &bytes)
    }

    pub fn float3_array(&mut self, v: &[[f32; 3]]) -> u64 {
        let mut bytes = (v.len() as u64).to_le_bytes().to_vec();
        bytes.extend(v.iter().flatten().flat_map(|f| f.to_le_bytes()));
        self.out_of_line(CrateType::Vec3f, true, false, &bytes)
    }

    pub fn int_array_compressed(&mut self, v: &[i32]) -> u64 {
        let mut bytes = (v.len() as u64).to_le_bytes().to_vec();
        bytes.extend(codec::write_coded_i32(v));
        self.out_of_line(CrateType::Int, true, true, &bytes)
    }

    pub fn float_array_compressed(&mut self, v: &[f32]) -> u64 {
        let raw: Vec<u8> = v.iter().flat_map(|f| f.to_le_bytes()).collect();
        let mut bytes = (v.len() as u64).to_le_bytes().to_vec();
        bytes.extend(lz4::compress(&raw));
        self.out_of_line(CrateType::Float, true, true, &bytes)
    }

    pub fn token_vector(&mut self, items: &[&str]) -> u64 {
        let ids: Vec<u32> = items.iter().map(|s| self.token(s)).collect();
        let mut bytes = (ids.len() as u64).to_le_bytes().to_vec();
        bytes.extend(ids.iter().flat_map(|i| i.to_le_bytes()));
        self.out_of_line(CrateType::TokenVector, false, false, &bytes)
    }

    pub fn time_samples(&mut self, samples: &[(f64, u64)]) -> u64 {
        let mut bytes = (samples.len() as u64).to_le_bytes().to_vec();
        bytes.extend(samples.iter().flat_map(|(t, _)| t.to_le_bytes()));
        bytes.extend(samples.iter().flat_map(|(_, rep)| rep.to_le_bytes()));
        self.out_of_line(CrateType::TimeSamples, false, false, &bytes)
    }

    /// Reference list-op with only prepended items: `(asset, prim path)`.
    pub fn prepended_references(&mut self, items: &[(&str, Option<&str>)]) -> u64 {
        let mut bytes = vec![list_op_flags::HAS_PREPENDED];
        bytes.extend((items.len() as u64).to_le_bytes());
        for (asset, prim) in items {
            let asset = self.string(asset);
            let prim = prim.map_or(INVALID_INDEX, |p| self.path(p));
            bytes.extend(asset.to_le_bytes());
            bytes.extend(prim.to_le_bytes());
            bytes.extend(0f64.to_le_bytes());
            bytes.extend(1f64.to_le_bytes());
        }
        self.out_of_line(CrateType::ReferenceListOp, false, false, &bytes)
    }

    /// Dictionary of already-encoded reps.
    pub fn dictionary(&mut self, entries: &[(&str, u64)]) -> u64 {
        let mut bytes = (entries.len() as u64).to_le_bytes().to_vec();
        for (key, rep) in entries {
            bytes.extend(self.string(key).to_le_bytes());
            bytes.extend(rep.to_le_bytes());
        }
        self.out_of_line(CrateType::Dictionary, false, false, &bytes)
    }

    pub fn field(&mut self, name: &str, rep: u64) -> u32 {
        let name = self.token(name);
        self.fields.push((name, rep));
        (self.fields.len() - 1) as u32
    }

    /// Group fields into a fieldset; returns its start index.
    pub fn fieldset(&mut self, fields: &[u32]) -> u32 {
        let start = self.fieldsets.len() as u32;
        self.fieldsets.extend_from_slice(fields);
        self.fieldsets.push(INVALID_INDEX);
        start
    }

    /// Add a spec whose fields are given by name.
    pub fn spec(&mut self, path: &str, spec_type: SpecType, fields: &[(&str, u64)]) {
        let path = self.path(path);
        let ids: Vec<u32> = fields.iter().map(|(name, rep)| self.field(name, *rep)).collect();
        let set = self.fieldset(&ids);
        self.specs.push((path, set, spec_type as u32));
    }

    fn path_tables(&self) -> (Vec<i32>, Vec<i32>, Vec<i32>) {
        let mut indices = Vec::new();
        let mut elements = Vec::new();
        let mut jumps = Vec::new();

        fn subtree(nodes: &[PathNode], n: usize) -> usize {
            1 + nodes[n].children.iter().map(|&c| subtree(nodes, c)).sum::<usize>()
        }

        // (node, has next sibling)
        let mut stack = vec![(0usize, false)];
        while let Some((n, has_sibling)) = stack.pop() {
            let node = &self.nodes[n];
            let token = self.token_ids[&node.name] as i32;
            indices.push(n as i32);
            elements.push(if node.is_property { -token } else { token });
            let has_child = !node.children.is_empty();
            jumps.push(match (has_child, has_sibling) {
                (true, true) => subtree(&self.nodes, n) as i32,
                (true, false) => -1,
                (false, true) => 0,
                (false, false) => -2,
            });
            let last = node.children.len().saturating_sub(1);
            for (i, &c) in node.children.iter().enumerate().rev() {
                stack.push((c, i < last));
            }
        }
        (indices, elements, jumps)
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = vec![0u8; BOOTSTRAP_SIZE];
        out[..8].copy_from_slice(USDC_MAGIC);
        out[VERSION_OFFSET..VERSION_OFFSET + 3].copy_from_slice(&self.version);
        out.extend_from_slice(&self.values);

        let mut sections: Vec<(&str, Vec<u8>)> = Vec::new();

        let mut text = Vec::new();
        for t in &self.tokens {
            text.extend_from_slice(t.as_bytes());
            text.push(0);
        }
        let mut tokens = (self.tokens.len() as u64).to_le_bytes().to_vec();
        tokens.extend((text.len() as u64).to_le_bytes());
        tokens.extend(lz4::compress(&text));
        sections.push((TOKENS_SECTION, tokens));

        let mut strings = (self.strings.len() as u64).to_le_bytes().to_vec();
        strings.extend(self.strings.iter().flat_map(|s| s.to_le_bytes()));
        sections.push((STRINGS_SECTION, strings));

        let names: Vec<u32> = self.fields.iter().map(|f| f.0).collect();
        let reps: Vec<u8> = self.fields.iter().flat_map(|f| f.1.to_le_bytes()).collect();
        let mut fields = (self.fields.len() as u64).to_le_bytes().to_vec();
        fields.extend(codec::write_coded_u32(&names));
        fields.extend(lz4::compress(&reps));
        sections.push((FIELDS_SECTION, fields));

        let mut fieldsets = (self.fieldsets.len() as u64).to_le_bytes().to_vec();
        fieldsets.extend(codec::write_coded_u32(&self.fieldsets));
        sections.push((FIELDSETS_SECTION, fieldsets));

        let (indices, elements, jumps) = self.path_tables();
        let mut paths = (indices.len() as u64).to_le_bytes().to_vec();
        paths.extend(codec::write_coded_i32(&indices));
        paths.extend(codec::write_coded_i32(&elements));
        paths.extend(codec::write_coded_i32(&jumps));
        sections.push((PATHS_SECTION, paths));

        let mut specs = (self.specs.len() as u64).to_le_bytes().to_vec();
        for (path, set, ty) in &self.specs {
            specs.extend(path.to_le_bytes());
            specs.extend(set.to_le_bytes());
            specs.extend(ty.to_le_bytes());
        }
        sections.push((SPECS_SECTION, specs));

        let mut toc = (sections.len() as u64).to_le_bytes().to_vec();
        for (name, body) in &sections {
            let start = out.len() as i64;
            out.extend_from_slice(body);
            let mut raw = [0u8; SECTION_NAME_LEN];
            raw[..name.len()].copy_from_slice(name.as_bytes());
            toc.extend_from_slice(&raw);
            toc.extend(start.to_le_bytes());
            toc.extend((body.len() as i64).to_le_bytes());
        }
        let toc_at = out.len() as u64;
        out.extend_from_slice(&toc);
        out[TOC_POS_OFFSET..TOC_POS_OFFSET + 8].copy_from_slice(&toc_at.to_le_bytes());
        out
    }
}

/// Pseudo-root plus a `def Xform "World"` prim with `size` and `points`.
pub fn world_crate() -> Vec<u8> {
    let mut b = CrateBuilder::new();
    let world = b.token_value("World");
    let up = b.token_value("Z");
    let children = b.token_vector(&["World"]);
    b.spec("/", SpecType::PseudoRoot, &[("defaultPrim", world), ("upAxis", up), ("primChildren", children)]);

    let def = b.specifier(0);
    let xform = b.token_value("Xform");
    let props = b.token_vector(&["size", "points"]);
    b.spec("/World", SpecType::Prim, &[("specifier", def), ("typeName", xform), ("properties", props)]);

    let double = b.token_value("double");
    let size = b.double(2.5);
    b.spec("/World.size", SpecType::Attribute, &[("typeName", double), ("default", size)]);

    let point3f = b.token_value("point3f[]");
    let points = b.float3_array(&[[0.0, 0.0, 0.0], [1.0, 2.0, 3.0]]);
    b.spec("/World.points", SpecType::Attribute, &[("typeName", point3f), ("default", points)]);
    b.build()
}

/// Store-only zip. Member data starts on a 64-byte boundary, padded through
/// the local header's extra field. `method` is written verbatim.
pub fn build_zip(entries: &[(&str, &[u8])], method: u16) -> Vec<u8> {
    let mut out = Vec::new();
    let mut central = Vec::new();
    for (name, data) in entries {
        let header_at = out.len() as u32;
        let base = out.len() + 30 + name.len();
        let mut extra = (64 - base % 64) % 64;
        if extra > 0 && extra < 4 {
            extra += 64;
        }
        let crc = crc32(data);

        out.extend_from_slice(&0x0403_4b50u32.to_le_bytes());
        out.extend_from_slice(&20u16.to_le_bytes());
        out.extend_from_slice(&0u16.to_le_bytes());
        out.extend_from_slice(&method.to_le_bytes());
        out.extend_from_slice(&[0; 4]);
        out.extend_from_slice(&crc.to_le_bytes());
        out.extend_from_slice(&(data.len() as u32).to_le_bytes());
        out.extend_from_slice(&(data.len() as u32).to_le_bytes());
        out.extend_from_slice(&(name.len() as u16).to_le_bytes());
        out.extend_from_slice(&(extra as u16).to_le_bytes());
        out.extend_from_slice(name.as_bytes());
        if extra > 0 {
            out.extend_from_slice(&0xCAFEu16.to_le_bytes());
            out.extend_from_slice(&((extra - 4) as u16).to_le_bytes());
            out.resize(out.len() + extra - 4, 0);
        }
        out.extend_from_slice(data);

        central.extend_from_slice(&0x0201_4b50u32.to_le_bytes());
        central.extend_from_slice(&20u16.to_le_bytes());
        central.extend_from_slice(&20u16.to_le_bytes());
        central.extend_from_slice(&0u16.to_le_bytes());
        central.extend_from_slice(&method.to_le_bytes());
        central.extend_from_slice(&[0; 4]);
        central.extend_from_slice(&crc.to_le_bytes());
        central.extend_from_slice(&(data.len() as u32).to_le_bytes());
        central.extend_from_slice(&(data.len() as u32).to_le_bytes());
        central.extend_from_slice(&(name.len() as u16).to_le_bytes());
        central.extend_from_slice(&[0; 12]);
        central.extend_from_slice(&header_at.to_le_bytes());
        central.extend_from_slice(name.as_bytes());
    }
    let cd_at = out.len() as u32;
    out.extend_from_slice(&central);
    out.extend_from_slice(&0x0605_4b50u32.to_le_bytes());
    out.extend_from_slice(&[0; 4]);
    out.extend_from_slice(&(entries.len() as u16).to_le_bytes());
    out.extend_from_slice(&(entries.len() as u16).to_le_bytes());
    out.extend_from_slice(&(central.len() as u32).to_le_bytes());
    out.extend_from_slice(&cd_at.to_le_bytes());
    out.extend_from_slice(&0u16.to_le_bytes());
    out
}

fn crc32(data: &[u8]) -> u32 {
    let mut crc = !0u32;
    for &b in data {
        crc ^= u32::from(b);
        for _ in 0..8 {
            crc = if crc & 1 != 0 { (crc >> 1) ^ 0xEDB8_8320 } else { crc >> 1 };
        }
    }
    !crc
}
