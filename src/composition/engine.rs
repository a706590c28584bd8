//! Composition engine.
//!
//! Every stage prim is composed from an ordered list of *sites*: a prim
//! path inside a layer stack plus the mapping that carries that stack's
//! namespace and time onto the stage. Expanding a site yields *nodes*
//! (one per layer holding a spec there) in strength order, following the
//! arcs authored on those specs. Nodes are then merged weakest first.

use std::collections::{HashMap, HashSet};
use std::path::{Path as FsPath, PathBuf};

use tracing::{debug, trace};

use crate::loader::{anchor_of, LoadContext};
use crate::sdf::{
    keys, AssetPath, Layer, LayerOffset, Path, PathElement, Payload, PrimIndex, Property, PropertyKind,
    Reference, Specifier, Token, VariantSetSpec,
};
use crate::stage::{Prim, PrimArcs, Stage};
use crate::util::{Error, Result, WarningKind};
use crate::value::{Dictionary, ListOp, ListOpKind, Value, VariantSelectionMap};

type StackId = usize;

/// Prefix rewrites applied in order, innermost arc first.
type PathMap = Vec<(Path, Path)>;

/// Compose `root` into a stage. `base_dir` anchors the root layer's
/// relative asset paths. Sublayers not yet attached to `root` are loaded
/// through the context's resolver.
pub fn compose(mut ctx: LoadContext<'_>, mut root: Layer, base_dir: &FsPath) -> Result<Stage> {
    if root.sub_layers().is_empty() && !root.metas().sub_layers.is_empty() {
        let mut visiting = vec![root.identifier().to_owned()];
        ctx.load_sub_layers(&mut root, base_dir, &mut visiting)?;
    }
    let metas = root.metas().clone();
    let identifier = root.identifier().to_owned();

    let mut composer = Composer {
        ctx,
        stacks: Vec::new(),
        stack_index: HashMap::new(),
    };
    let root_stack = composer.add_stack(LayerStack::build(root, base_dir.to_path_buf()));
    let root_site = Site {
        stack: root_stack,
        path: Path::root(),
        map: PathMap::new(),
        offset: LayerOffset::IDENTITY,
        assets: vec![identifier],
        depth: 0,
        classes: Vec::new(),
    };

    let mut stage = Stage::new(metas);
    let mut work: Vec<(Option<usize>, Path, Vec<Site>)> = Vec::new();
    for name in composer.root_children(root_stack).into_iter().rev() {
        work.push((None, Path::root().append_prim(name.as_str())?, vec![root_site.child(name)?]));
    }

    while let Some((parent, path, sites)) = work.pop() {
        let Some(composed) = composer.compose_prim(&path, &sites)? else {
            continue;
        };
        let index = stage.insert_prim(parent, composed.prim)?;
        for name in composed.children.into_iter().rev() {
            let child_sites = composed.sites.iter().map(|s| s.child(name)).collect::<Result<Vec<_>>>()?;
            work.push((Some(index), path.append_prim(name.as_str())?, child_sites));
        }
    }

    debug!(prims = stage.len(), stacks = composer.stacks.len(), "composed stage");
    stage.set_warnings(composer.ctx.warnings.into_vec());
    Ok(stage)
}

/// One layer of a stack with its offset relative to the stack root.
struct StackLayer {
    layer: Layer,
    offset: LayerOffset,
    /// Directory relative asset paths in this layer resolve against.
    anchor: PathBuf,
}

/// A root layer and its sublayers, flattened strongest first.
struct LayerStack {
    identifier: String,
    layers: Vec<StackLayer>,
}

impl LayerStack {
    fn build(root: Layer, anchor: PathBuf) -> Self {
        let identifier = root.identifier().to_owned();
        let mut layers = Vec::new();
        flatten(root, LayerOffset::IDENTITY, anchor, &mut layers);
        Self { identifier, layers }
    }

    fn default_prim_path(&self) -> Option<Path> {
        let name = self.layers.first()?.layer.metas().default_prim?;
        Path::root().append_prim(name.as_str()).ok()
    }

    fn has_prim(&self, path: &Path) -> bool {
        self.layers.iter().any(|l| locate(&l.layer, path).is_some())
    }
}

fn flatten(mut layer: Layer, offset: LayerOffset, anchor: PathBuf, out: &mut Vec<StackLayer>) {
    let subs = layer.take_sub_layers();
    out.push(StackLayer { layer, offset, anchor });
    for sub in subs {
        let anchor = anchor_of(sub.layer.identifier());
        flatten(sub.layer, offset.compose(&sub.offset), anchor, out);
    }
}

/// Where a spec lives inside a layer.
#[derive(Clone, Debug, PartialEq)]
enum SpecLoc {
    Root,
    Prim(PrimIndex),
    Variant {
        prim: PrimIndex,
        set: String,
        variant: String,
    },
}

fn locate(layer: &Layer, path: &Path) -> Option<SpecLoc> {
    if path.is_root() {
        return Some(SpecLoc::Root);
    }
    if let Some(PathElement::VariantSelection(set, variant)) = path.elements().last() {
        let prim = layer.find_prim_index(&path.parent()?)?;
        layer.prim(prim)?.variant_set(set.as_str())?.variant(variant.as_str())?;
        return Some(SpecLoc::Variant {
            prim,
            set: set.as_str().to_owned(),
            variant: variant.as_str().to_owned(),
        });
    }
    layer.find_prim_index(path).map(SpecLoc::Prim)
}

/// A prim path in a layer stack, and how it maps onto the stage.
#[derive(Clone, Debug)]
struct Site {
    stack: StackId,
    path: Path,
    map: PathMap,
    offset: LayerOffset,
    /// Identifiers of the assets on the current arc chain.
    assets: Vec<String>,
    depth: u32,
    /// Classes on the current inherit/specialize chain.
    classes: Vec<Path>,
}

impl Site {
    fn child(&self, name: Token) -> Result<Site> {
        Ok(Site {
            path: self.path.append_prim(name.as_str())?,
            ..self.clone()
        })
    }

    /// Site for an arc targeting `target` in `stack`.
    fn arc(&self, stack: StackId, target: &Path, offset: LayerOffset) -> Site {
        let mut map = vec![(target.strip_variant_selections(), self.path.strip_variant_selections())];
        map.extend(self.map.iter().cloned());
        Site {
            stack,
            path: target.clone(),
            map,
            offset,
            assets: self.assets.clone(),
            depth: self.depth + 1,
            classes: self.classes.clone(),
        }
    }
}

/// One spec contributing opinions to a stage prim.
#[derive(Clone, Debug)]
struct Node {
    stack: StackId,
    layer: usize,
    loc: SpecLoc,
    offset: LayerOffset,
    map: PathMap,
}

/// Borrowed opinions of one node.
#[derive(Default)]
struct SpecView<'a> {
    specifier: Option<Specifier>,
    type_name: Option<Token>,
    metas: Option<&'a Dictionary>,
    properties: &'a [Property],
    children: Vec<Token>,
    variant_sets: &'a [VariantSetSpec],
}

/// A list-op item together with the layer that authored it.
#[derive(Clone, Debug)]
struct Anchored<T> {
    item: T,
    stack: StackId,
    layer: usize,
    offset: LayerOffset,
}

impl<T: PartialEq> PartialEq for Anchored<T> {
    fn eq(&self, other: &Self) -> bool {
        self.item == other.item
    }
}

/// Arcs authored across one site's local nodes, composed.
#[derive(Default)]
struct SiteArcs {
    references: Vec<Anchored<Reference>>,
    payloads: Vec<Anchored<Payload>>,
    inherits: Vec<Path>,
    specializes: Vec<Path>,
    variant_sets: Vec<String>,
}

/// Accumulated expansion of one stage prim.
#[derive(Default)]
struct Expansion {
    nodes: Vec<Node>,
    sites: Vec<Site>,
    seen: HashSet<(StackId, Path)>,
    selections: VariantSelectionMap,
    arcs: PrimArcs,
}

struct Composed {
    prim: Prim,
    children: Vec<Token>,
    sites: Vec<Site>,
}

struct Composer<'r> {
    ctx: LoadContext<'r>,
    stacks: Vec<LayerStack>,
    stack_index: HashMap<String, StackId>,
}

impl Composer<'_> {
    fn add_stack(&mut self, stack: LayerStack) -> StackId {
        let id = self.stacks.len();
        self.stack_index.insert(stack.identifier.clone(), id);
        self.stacks.push(stack);
        id
    }

    fn warn(&mut self, kind: WarningKind, message: String) {
        self.ctx.warnings.push(kind, message);
    }

    /// Root prim names across the root stack, weakest layer first.
    fn root_children(&self, stack: StackId) -> Vec<Token> {
        let mut names = Vec::new();
        for l in self.stacks[stack].layers.iter().rev() {
            for prim in l.layer.root_prims() {
                if !names.contains(&prim.name) {
                    names.push(prim.name);
                }
            }
        }
        names
    }

    fn view(&self, node: &Node) -> SpecView<'_> {
        let layer = &self.stacks[node.stack].layers[node.layer].layer;
        match &node.loc {
            SpecLoc::Root => SpecView {
                children: layer.root_prims().map(|p| p.name).collect(),
                ..SpecView::default()
            },
            SpecLoc::Prim(i) => match layer.prim(*i) {
                Some(spec) => SpecView {
                    specifier: Some(spec.specifier),
                    type_name: spec.type_name,
                    metas: Some(&spec.metas),
                    properties: &spec.properties,
                    children: layer.children(spec).map(|c| c.name).collect(),
                    variant_sets: &spec.variant_sets,
                },
                None => SpecView::default(),
            },
            SpecLoc::Variant { prim, set, variant } => {
                let found = layer
                    .prim(*prim)
                    .and_then(|p| p.variant_set(set))
                    .and_then(|s| s.variant(variant));
                match found {
                    Some(v) => SpecView {
                        metas: Some(&v.metas),
                        properties: &v.properties,
                        children: v.children.iter().filter_map(|&c| layer.prim(c)).map(|p| p.name).collect(),
                        ..SpecView::default()
                    },
                    None => SpecView::default(),
                }
            }
        }
    }

    fn local_nodes(&self, site: &Site) -> Vec<Node> {
        self.stacks[site.stack]
            .layers
            .iter()
            .enumerate()
            .filter_map(|(i, l)| {
                locate(&l.layer, &site.path).map(|loc| Node {
                    stack: site.stack,
                    layer: i,
                    loc,
                    offset: site.offset.compose(&l.offset),
                    map: site.map.clone(),
                })
            })
            .collect()
    }

    /// Compose the arc list-ops of `local` (strongest first) by applying
    /// them to the empty list from weakest to strongest, and record variant
    /// selections not already chosen by a stronger site.
    fn collect_arcs(&self, local: &[Node], selections: &mut VariantSelectionMap) -> SiteArcs {
        let mut arcs = SiteArcs::default();
        for node in local.iter().rev() {
            let Some(metas) = self.view(node).metas else {
                continue;
            };
            let anchored = |item: &Reference| Anchored {
                item: item.clone(),
                stack: node.stack,
                layer: node.layer,
                offset: node.offset,
            };
            if let Some(Value::ReferenceListOp(op)) = metas.get(keys::REFERENCES) {
                op.map(anchored).apply_to(&mut arcs.references);
            }
            if let Some(Value::PayloadListOp(op)) = metas.get(keys::PAYLOAD) {
                op.map(|p| Anchored {
                    item: p.clone(),
                    stack: node.stack,
                    layer: node.layer,
                    offset: node.offset,
                })
                .apply_to(&mut arcs.payloads);
            }
            if let Some(Value::PathListOp(op)) = metas.get(keys::INHERITS) {
                op.apply_to(&mut arcs.inherits);
            }
            if let Some(Value::PathListOp(op)) = metas.get(keys::SPECIALIZES) {
                op.apply_to(&mut arcs.specializes);
            }
        }

        for node in local.iter().rev() {
            if let Some(Value::StringListOp(op)) = self.view(node).metas.and_then(|m| m.get(keys::VARIANT_SETS)) {
                op.apply_to(&mut arcs.variant_sets);
            }
        }
        for node in local {
            let view = self.view(node);
            for set in view.variant_sets {
                if !arcs.variant_sets.contains(&set.name) {
                    arcs.variant_sets.push(set.name.clone());
                }
            }
            if let Some(Value::VariantSelection(sel)) = view.metas.and_then(|m| m.get(keys::VARIANTS)) {
                for (set, variant) in sel {
                    selections.entry(set.clone()).or_insert_with(|| variant.clone());
                }
            }
        }
        arcs
    }

    /// Append the nodes of `site` and everything its arcs reach to `acc`,
    /// strongest first: the stack root layer, variants, references and
    /// payloads, inherits, specializes, then the remaining sublayers.
    fn expand(&mut self, site: &Site, stage_path: &Path, acc: &mut Expansion) -> Result<()> {
        if !acc.seen.insert((site.stack, site.path.clone())) {
            return Ok(());
        }
        let local = self.local_nodes(site);
        if local.is_empty() {
            return Ok(());
        }
        trace!(stack = site.stack, path = %site.path, nodes = local.len(), "expand site");
        acc.sites.push(site.clone());
        let arcs = self.collect_arcs(&local, &mut acc.selections);
        let (own, sub): (Vec<Node>, Vec<Node>) = local.into_iter().partition(|n| n.layer == 0);
        acc.nodes.extend(own);

        for set in &arcs.variant_sets {
            push_unique(&mut acc.arcs.variant_sets, set.clone());
            let chosen = self
                .ctx
                .options
                .selected_variant(stage_path, set)
                .or_else(|| acc.selections.get(set).map(String::as_str))
                .filter(|v| !v.is_empty())
                .map(str::to_owned);
            let Some(variant) = chosen else {
                continue;
            };
            acc.arcs
                .variant_selection
                .entry(set.clone())
                .or_insert_with(|| variant.clone());
            let path = site.path.append_variant_selection(set, &variant)?;
            if !self.stacks[site.stack].has_prim(&path) {
                self.warn(
                    WarningKind::Composition,
                    format!("{stage_path}: variant `{variant}` not found in set `{set}`"),
                );
                continue;
            }
            let variant_site = Site {
                path,
                ..site.clone()
            };
            self.expand(&variant_site, stage_path, acc)?;
        }

        for r in &arcs.references {
            push_unique(&mut acc.arcs.references, r.item.clone());
            let offset = r.offset.compose(&r.item.layer_offset);
            let prim_path = r.item.prim_path.clone();
            self.expand_reference(site, stage_path, &r.item.asset_path, prim_path, offset, (r.stack, r.layer), acc)?;
        }

        for p in &arcs.payloads {
            push_unique(&mut acc.arcs.payloads, p.item.clone());
            if !self.ctx.options.allow_payload {
                debug!(prim = %stage_path, asset = %p.item.asset_path, "payload not loaded");
                continue;
            }
            let offset = p.offset.compose(&p.item.layer_offset);
            let prim_path = p.item.prim_path.clone();
            self.expand_reference(site, stage_path, &p.item.asset_path, prim_path, offset, (p.stack, p.layer), acc)?;
        }

        for class in &arcs.inherits {
            push_unique(&mut acc.arcs.inherits, class.clone());
            self.expand_class(site, stage_path, class, acc)?;
        }
        for class in &arcs.specializes {
            push_unique(&mut acc.arcs.specializes, class.clone());
            self.expand_class(site, stage_path, class, acc)?;
        }

        acc.nodes.extend(sub);
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn expand_reference(
        &mut self,
        site: &Site,
        stage_path: &Path,
        asset: &AssetPath,
        prim_path: Option<Path>,
        offset: LayerOffset,
        (stack, layer): (StackId, usize),
        acc: &mut Expansion,
    ) -> Result<()> {
        if site.depth >= self.ctx.options.max_depth {
            self.warn(
                WarningKind::Composition,
                format!("{stage_path}: arc to @{asset}@ exceeds the nesting limit of {}", self.ctx.options.max_depth),
            );
            return Ok(());
        }

        let (target_stack, assets) = if asset.is_empty() {
            (site.stack, site.assets.clone())
        } else {
            let anchor = self.stacks[stack].layers[layer].anchor.clone();
            let Some(id) = self.open_stack(asset.as_str(), &anchor, &site.assets, stage_path)? else {
                return Ok(());
            };
            let mut assets = site.assets.clone();
            assets.push(self.stacks[id].identifier.clone());
            (id, assets)
        };

        let target = match prim_path.or_else(|| self.stacks[target_stack].default_prim_path()) {
            Some(p) => p,
            None => {
                self.warn(
                    WarningKind::Composition,
                    format!("{stage_path}: @{asset}@ names no prim and has no defaultPrim"),
                );
                return Ok(());
            }
        };
        if !self.stacks[target_stack].has_prim(&target) {
            self.warn(
                WarningKind::Composition,
                format!("{stage_path}: prim {target} not found in @{asset}@"),
            );
            return Ok(());
        }

        debug!(prim = %stage_path, asset = %asset, target = %target, "reference");
        let mut child = site.arc(target_stack, &target, offset);
        child.assets = assets;
        child.classes.clear();
        self.expand(&child, stage_path, acc)
    }

    fn expand_class(&mut self, site: &Site, stage_path: &Path, class: &Path, acc: &mut Expansion) -> Result<()> {
        let here = site.path.strip_variant_selections();
        let class = class.make_absolute(&here)?;
        if site.classes.contains(&class) || here.has_prefix(&class) {
            self.warn(
                WarningKind::CompositionCycle,
                format!("{stage_path}: class arc to {class} loops back; arc dropped"),
            );
            return Ok(());
        }
        if site.depth >= self.ctx.options.max_depth {
            self.warn(
                WarningKind::Composition,
                format!("{stage_path}: arc to {class} exceeds the nesting limit of {}", self.ctx.options.max_depth),
            );
            return Ok(());
        }
        if !self.stacks[site.stack].has_prim(&class) {
            self.warn(WarningKind::Composition, format!("{stage_path}: class {class} not found"));
            return Ok(());
        }
        let mut child = site.arc(site.stack, &class, site.offset);
        child.classes.push(class);
        self.expand(&child, stage_path, acc)
    }

    /// Resolve and load the stack for `asset`, reusing a loaded one.
    /// `None` when the arc must be dropped.
    fn open_stack(
        &mut self,
        asset: &str,
        anchor: &FsPath,
        chain: &[String],
        stage_path: &Path,
    ) -> Result<Option<StackId>> {
        let resolved = match self.ctx.resolve(asset, anchor) {
            Ok(r) => r,
            Err(Error::UnresolvedAsset(_)) => {
                self.warn(WarningKind::UnresolvedAsset, format!("{stage_path}: cannot resolve @{asset}@"));
                return Ok(None);
            }
            Err(e) => return Err(e),
        };
        if chain.contains(&resolved.identifier) {
            self.warn(
                WarningKind::CompositionCycle,
                format!("{stage_path}: @{asset}@ ({}) is already being composed; arc dropped", resolved.identifier),
            );
            return Ok(None);
        }
        if let Some(&id) = self.stack_index.get(&resolved.identifier) {
            return Ok(Some(id));
        }
        let mut layer = self.ctx.decode(&resolved.data, &resolved.identifier)?;
        let anchor = anchor_of(&resolved.identifier);
        let mut visiting = vec![resolved.identifier.clone()];
        self.ctx.load_sub_layers(&mut layer, &anchor, &mut visiting)?;
        debug!(asset, identifier = %resolved.identifier, "opened layer stack");
        Ok(Some(self.add_stack(LayerStack::build(layer, anchor))))
    }

    fn compose_prim(&mut self, stage_path: &Path, sites: &[Site]) -> Result<Option<Composed>> {
        let mut acc = Expansion::default();
        for site in sites {
            self.expand(site, stage_path, &mut acc)?;
        }
        if acc.nodes.is_empty() {
            return Ok(None);
        }
        let (prim, children) = self.merge(stage_path, &acc.nodes)?;
        let mut prim = prim;
        prim.arcs = acc.arcs;
        Ok(Some(Composed {
            prim,
            children,
            sites: acc.sites,
        }))
    }

    /// Merge `nodes` (strongest first) into one prim.
    fn merge(&mut self, stage_path: &Path, nodes: &[Node]) -> Result<(Prim, Vec<Token>)> {
        let mut specifier = None;
        let mut type_name = None;
        let mut prim_order = None;
        let mut property_order = None;
        for node in nodes {
            let view = self.view(node);
            if let Some(s) = view.specifier {
                if s != Specifier::Over && specifier.is_none() {
                    specifier = Some(s);
                }
            }
            if type_name.is_none() {
                type_name = view.type_name;
            }
            if let Some(metas) = view.metas {
                if prim_order.is_none() {
                    prim_order = metas.get(keys::PRIM_ORDER).and_then(order_tokens);
                }
                if property_order.is_none() {
                    property_order = metas.get(keys::PROPERTY_ORDER).and_then(order_tokens);
                }
            }
        }

        let mut prim = Prim::new(stage_path.clone(), specifier.unwrap_or(Specifier::Over), type_name);
        let mut properties: Vec<Property> = Vec::new();
        let mut by_name: HashMap<Token, usize> = HashMap::new();
        let mut children: Vec<Token> = Vec::new();
        let mut conflicts = Vec::new();

        for node in nodes.iter().rev() {
            let view = self.view(node);
            if let Some(metas) = view.metas {
                for (key, value) in metas {
                    if keys::ARCS.contains(&key.as_str()) || key == keys::PRIM_ORDER || key == keys::PROPERTY_ORDER {
                        continue;
                    }
                    merge_meta(&mut prim.metas, key, value);
                }
            }
            for authored in view.properties {
                let property = localize(authored, node);
                match by_name.get(&property.name) {
                    Some(&i) => {
                        if merge_property(&mut properties[i], property) {
                            conflicts.push(properties[i].name);
                        }
                    }
                    None => {
                        by_name.insert(property.name, properties.len());
                        properties.push(property);
                    }
                }
            }
            for name in view.children {
                if !children.contains(&name) {
                    children.push(name);
                }
            }
        }
        for name in conflicts {
            self.warn(
                WarningKind::Composition,
                format!("{stage_path}.{name}: stronger opinion changes the property kind"),
            );
        }

        prim.properties = apply_order(properties, property_order, |p| p.name);
        let children = apply_order(children, prim_order, |n| *n);
        Ok((prim, children))
    }
}

fn push_unique<T: PartialEq>(list: &mut Vec<T>, item: T) {
    if !list.contains(&item) {
        list.push(item);
    }
}

fn map_path(map: &[(Path, Path)], path: &Path) -> Path {
    map.iter()
        .fold(path.clone(), |p, (src, dst)| p.replace_prefix(src, dst).unwrap_or(p))
}

/// Copy of `property` in stage namespace and stage time.
fn localize(property: &Property, node: &Node) -> Property {
    let mut p = property.clone();
    if !node.map.is_empty() {
        p.map_paths(&|path: &Path| map_path(&node.map, path));
    }
    if let PropertyKind::Attribute(a) = &mut p.kind {
        if let Some(ts) = &a.time_samples {
            a.time_samples = Some(ts.retimed(&node.offset));
        }
    }
    p
}

fn fold_list<T: Clone + PartialEq>(weaker: Option<ListOp<T>>, stronger: Option<ListOp<T>>) -> Option<ListOp<T>> {
    match (weaker, stronger) {
        (Some(w), Some(s)) => Some(s.compose_over(&w)),
        (w, s) => s.or(w),
    }
}

/// Merge a stronger opinion into `slot`. Returns `true` when the kinds
/// disagree and the stronger property replaced the weaker one.
fn merge_property(slot: &mut Property, stronger: Property) -> bool {
    let Property {
        custom,
        variability,
        kind,
        metas,
        ..
    } = stronger;
    let replaced = match (&mut slot.kind, kind) {
        (PropertyKind::Attribute(w), PropertyKind::Attribute(s)) => {
            w.type_name = s.type_name;
            if s.default.is_some() {
                w.default = s.default;
            }
            w.time_samples = match (w.time_samples.take(), s.time_samples) {
                (Some(weak), Some(mut strong)) => {
                    strong.merge_weaker(&weak);
                    Some(strong)
                }
                (weak, strong) => strong.or(weak),
            };
            w.connections = fold_list(w.connections.take(), s.connections);
            None
        }
        (PropertyKind::Relationship(w), PropertyKind::Relationship(s)) => {
            w.targets = fold_list(w.targets.take(), s.targets);
            None
        }
        (_, other) => Some(other),
    };
    let conflict = replaced.is_some();
    if let Some(kind) = replaced {
        slot.kind = kind;
    }
    slot.custom |= custom;
    slot.variability = variability;
    for (key, value) in &metas {
        merge_meta(&mut slot.metas, key, value);
    }
    conflict
}

/// Merge a stronger metadata value: list-ops compose, dictionaries merge
/// key by key, anything else replaces.
fn merge_meta(metas: &mut Dictionary, key: &str, value: &Value) {
    if let Some(existing) = metas.get_mut(key) {
        if let (Value::Dictionary(weaker), Value::Dictionary(stronger)) = (&mut *existing, value) {
            for (k, v) in stronger {
                merge_meta(weaker, k, v);
            }
            return;
        }
        if existing.compose_list_op(value) {
            return;
        }
    }
    metas.insert(key.to_owned(), value.clone());
}

/// Names listed by a `reorder` statement.
fn order_tokens(value: &Value) -> Option<Vec<Token>> {
    match value {
        Value::TokenArray(v) => Some(v.clone()),
        Value::StringArray(v) => Some(v.iter().map(|s| Token::new(s)).collect()),
        Value::TokenListOp(op) => {
            let ordered = op.items(ListOpKind::Ordered);
            Some(if ordered.is_empty() { op.resolve() } else { ordered.to_vec() })
        }
        _ => None,
    }
}

fn apply_order<T>(items: Vec<T>, order: Option<Vec<Token>>, name: impl Fn(&T) -> Token) -> Vec<T> {
    let Some(order) = order else {
        return items;
    };
    let mut names: Vec<Token> = items.iter().map(&name).collect();
    ListOp::with(ListOpKind::Ordered, order).apply_to(&mut names);
    let mut slots: Vec<Option<T>> = items.into_iter().map(Some).collect();
    names
        .iter()
        .filter_map(|n| {
            slots
                .iter_mut()
                .find(|s| s.as_ref().is_some_and(|x| name(x) == *n))
                .and_then(Option::take)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composition::{AssetResolver, MemoryResolver};
    use crate::usda::parse_layer;
    use crate::util::{Limits, LoadOptions, Warnings};
    use crate::value::{Role, SampleTime};

    fn layer(id: &str, text: &str) -> Layer {
        parse_layer(text, id, &Limits::default(), &mut Warnings::new()).unwrap()
    }

    fn stage_with(root: &str, resolver: &MemoryResolver, options: &LoadOptions) -> Stage {
        let ctx = LoadContext::new(resolver as &dyn AssetResolver, options);
        compose(ctx, layer("root.usda", root), FsPath::new("")).unwrap()
    }

    fn stage(root: &str, resolver: &MemoryResolver) -> Stage {
        stage_with(root, resolver, &LoadOptions::default())
    }

    fn p(s: &str) -> Path {
        Path::new(s).unwrap()
    }

    fn value(stage: &Stage, path: &str, attr: &str) -> Value {
        stage.find_prim_at_path(&p(path)).unwrap().get(attr, SampleTime::Default).unwrap()
    }

    #[test]
    fn test_local_beats_reference() {
        let r = MemoryResolver::new().with(
            "base.usda",
            "#usda 1.0\n(defaultPrim = \"A\")\ndef Xform \"A\" { float radius = 2.5\n float height = 1 }\n",
        );
        let s = stage(
            "#usda 1.0\ndef Xform \"A\" ( references = @base.usda@ ) { float radius = 7.0 }\n",
            &r,
        );
        assert_eq!(value(&s, "/A", "radius"), Value::Float(7.0));
        assert_eq!(value(&s, "/A", "height"), Value::Float(1.0));
        assert!(s.warnings().is_empty());
        assert_eq!(s.find_prim_at_path(&p("/A")).unwrap().references().len(), 1);
    }

    #[test]
    fn test_reference_subtree_and_targets() {
        let r = MemoryResolver::new().with(
            "model.usda",
            r#"#usda 1.0
def "Model" {
    def "Geo" { rel material:binding = </Model/Mat> }
    def "Mat" {}
}
"#,
        );
        let s = stage(
            "#usda 1.0\ndef \"World\" { def \"Car\" ( references = @model.usda@</Model> ) {} }\n",
            &r,
        );
        let geo = s.find_prim_at_path(&p("/World/Car/Geo")).unwrap();
        assert_eq!(geo.targets("material:binding"), vec![p("/World/Car/Mat")]);
        assert!(s.find_prim_at_path(&p("/World/Car/Mat")).is_some());
    }

    #[test]
    fn test_list_op_prepend_delete() {
        let r = MemoryResolver::new();
        let s = stage(
            "#usda 1.0\ndef \"X\" (\n prepend references = [@a.usda@, @b.usda@]\n delete references = [@a.usda@]\n) {}\n",
            &r,
        );
        let x = s.find_prim_at_path(&p("/X")).unwrap();
        assert_eq!(x.references(), &[Reference::new("b.usda", None)]);
        assert!(s.warnings().iter().any(|w| w.kind == WarningKind::UnresolvedAsset));
    }

    #[test]
    fn test_cycle_dropped() {
        let r = MemoryResolver::new()
            .with("p.usda", "#usda 1.0\n(defaultPrim = \"root\")\ndef \"root\" ( references = @q.usda@ ) { def \"own\" {} }\n")
            .with("q.usda", "#usda 1.0\n(defaultPrim = \"root\")\ndef \"root\" ( references = @p.usda@ ) {}\n");
        let root = r.resolve("p.usda", &[]).unwrap();
        let text = std::str::from_utf8(&root.data).unwrap();
        let options = LoadOptions::default();
        let ctx = LoadContext::new(&r as &dyn AssetResolver, &options);
        let s = compose(ctx, layer("p.usda", text), FsPath::new("")).unwrap();

        assert!(s.warnings().iter().any(|w| w.kind == WarningKind::CompositionCycle));
        let root = s.find_prim_at_path(&p("/root")).unwrap();
        let names: Vec<_> = s.children(root).map(|c| c.name()).collect();
        assert_eq!(names, vec!["own"]);
    }

    #[test]
    fn test_variant_selection() {
        let text = r#"#usda 1.0
def "Car" (
    variants = { string color = "red" }
    prepend variantSets = "color"
) {
    variantSet "color" = {
        "red" { float3 rgb = (1, 0, 0) }
        "blue" { float3 rgb = (0, 0, 1) }
    }
}
"#;
        let r = MemoryResolver::new();
        let s = stage(text, &r);
        let car = s.find_prim_at_path(&p("/Car")).unwrap();
        assert_eq!(car.variant_selection().get("color").map(String::as_str), Some("red"));
        assert_eq!(car.get("rgb", SampleTime::Default).unwrap(), Value::Float3([1.0, 0.0, 0.0], Role::None));

        let options = LoadOptions::default().with_variant_selection("/Car", "color", "blue").unwrap();
        let s = stage_with(text, &r, &options);
        let car = s.find_prim_at_path(&p("/Car")).unwrap();
        assert_eq!(car.get("rgb", SampleTime::Default).unwrap(), Value::Float3([0.0, 0.0, 1.0], Role::None));
    }

    #[test]
    fn test_inherits_weaker_than_local() {
        let s = stage(
            r#"#usda 1.0
class "Base" { double size = 1
    double weight = 3 }
def "Thing" ( inherits = </Base> ) { double size = 2 }
"#,
            &MemoryResolver::new(),
        );
        assert_eq!(value(&s, "/Thing", "size"), Value::Double(2.0));
        assert_eq!(value(&s, "/Thing", "weight"), Value::Double(3.0));
        assert!(s.find_prim_at_path(&p("/Base")).unwrap().is_abstract());
        assert_eq!(s.find_prim_at_path(&p("/Thing")).unwrap().specifier(), Specifier::Def);
    }

    #[test]
    fn test_reference_offset_retimes_samples() {
        let r = MemoryResolver::new().with(
            "anim.usda",
            "#usda 1.0\n(defaultPrim = \"A\")\ndef \"A\" { double x.timeSamples = { 0: 0, 10: 100 } }\n",
        );
        let s = stage(
            "#usda 1.0\ndef \"A\" ( references = @anim.usda@ (offset = 5; scale = 2) ) {}\n",
            &r,
        );
        let a = s.find_prim_at_path(&p("/A")).unwrap();
        let ts = a.attribute("x").unwrap().time_samples.as_ref().unwrap();
        assert_eq!(ts.times().collect::<Vec<_>>(), vec![5.0, 25.0]);
    }

    #[test]
    fn test_payload_skipped() {
        let r = MemoryResolver::new().with("heavy.usda", "#usda 1.0\n(defaultPrim = \"H\")\ndef \"H\" { def \"Mesh\" {} }\n");
        let text = "#usda 1.0\ndef \"H\" ( payload = @heavy.usda@ ) {}\n";
        let s = stage(text, &r);
        assert!(s.find_prim_at_path(&p("/H/Mesh")).is_some());

        let s = stage_with(text, &r, &LoadOptions::default().with_payload(false));
        assert!(s.find_prim_at_path(&p("/H/Mesh")).is_none());
        assert_eq!(s.find_prim_at_path(&p("/H")).unwrap().arcs().payloads.len(), 1);
    }

    #[test]
    fn test_internal_reference() {
        let s = stage(
            "#usda 1.0\nclass \"Proto\" { int n = 4\n def \"Leaf\" {} }\ndef \"Inst\" ( references = </Proto> ) {}\n",
            &MemoryResolver::new(),
        );
        assert_eq!(value(&s, "/Inst", "n"), Value::Int(4));
        assert!(s.find_prim_at_path(&p("/Inst/Leaf")).is_some());
    }

    #[test]
    fn test_sublayer_strength_and_ids() {
        let r = MemoryResolver::new().with("weak.usda", "#usda 1.0\ndef \"A\" { int v = 1\n int w = 1 }\ndef \"B\" {}\n");
        let s = stage("#usda 1.0\n(subLayers = [@weak.usda@])\nover \"A\" { int v = 2 }\n", &r);
        assert_eq!(value(&s, "/A", "v"), Value::Int(2));
        assert_eq!(value(&s, "/A", "w"), Value::Int(1));
        assert_eq!(s.find_prim_at_path(&p("/A")).unwrap().specifier(), Specifier::Def);
        let ids: Vec<u64> = s.iter().map(Prim::prim_id).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn test_time_samples_merge() {
        let r = MemoryResolver::new().with("weak.usda", "#usda 1.0\ndef \"A\" { double x.timeSamples = { 0: 1, 5: 5 } }\n");
        let s = stage(
            "#usda 1.0\n(subLayers = [@weak.usda@])\nover \"A\" { double x.timeSamples = { 5: 50, 9: 90 } }\n",
            &r,
        );
        let a = s.find_prim_at_path(&p("/A")).unwrap();
        let ts = a.attribute("x").unwrap().time_samples.as_ref().unwrap();
        let samples: Vec<(f64, Value)> = ts.iter().cloned().collect();
        assert_eq!(
            samples,
            vec![(0.0, Value::Double(1.0)), (5.0, Value::Double(50.0)), (9.0, Value::Double(90.0))]
        );
    }

    #[test]
    fn test_prim_order() {
        let s = stage(
            "#usda 1.0\ndef \"W\" {\n reorder nameChildren = [\"b\", \"a\"]\n def \"a\" {}\n def \"b\" {}\n}\n",
            &MemoryResolver::new(),
        );
        let w = s.find_prim_at_path(&p("/W")).unwrap();
        let names: Vec<_> = s.children(w).map(|c| c.name()).collect();
        assert_eq!(names, vec!["b", "a"]);
    }
}
