//! Load entry points: bytes or files in, composed [`Stage`] out.
//!
//! Format detection looks at the leading bytes: `PXR-USDC` for crate
//! files, a zip local header for USDZ, otherwise usda text.

use std::fs::File;
use std::path::{Path, PathBuf};

use memmap2::Mmap;
use tracing::{debug, info};

use crate::composition::{compose, AssetResolver, FileResolver, ResolvedAsset, UsdzResolver};
use crate::sdf::Layer;
use crate::stage::Stage;
use crate::usdz::{is_usdz, UsdzArchive};
use crate::util::{Error, LoadOptions, Result, Warning, WarningKind, Warnings};
use crate::{usda, usdc};

/// On-disk encodings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Format {
    Usda,
    Usdc,
    Usdz,
}

impl Format {
    pub const fn name(self) -> &'static str {
        match self {
            Self::Usda => "usda",
            Self::Usdc => "usdc",
            Self::Usdz => "usdz",
        }
    }

    /// Guess from the leading bytes; `None` if nothing matches.
    pub fn detect(data: &[u8]) -> Option<Self> {
        if usdc::is_crate(data) {
            Some(Self::Usdc)
        } else if is_usdz(data) {
            Some(Self::Usdz)
        } else if usda::is_usda(data) {
            Some(Self::Usda)
        } else {
            None
        }
    }

    /// Guess from a file extension.
    pub fn from_extension(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "usda" => Some(Self::Usda),
            "usdc" => Some(Self::Usdc),
            "usdz" => Some(Self::Usdz),
            _ => None,
        }
    }
}

/// Directory relative asset paths inside the asset `identifier` resolve against.
pub fn anchor_of(identifier: &str) -> PathBuf {
    Path::new(identifier)
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default()
}

/// State threaded through one load: resolver, options and the warning sink.
pub struct LoadContext<'r> {
    pub resolver: &'r dyn AssetResolver,
    pub options: &'r LoadOptions,
    pub warnings: Warnings,
}

impl<'r> LoadContext<'r> {
    pub fn new(resolver: &'r dyn AssetResolver, options: &'r LoadOptions) -> Self {
        Self {
            resolver,
            options,
            warnings: Warnings::new(),
        }
    }

    /// Resolve `asset` relative to `anchor`, then the configured search paths.
    pub fn resolve(&self, asset: &str, anchor: &Path) -> Result<ResolvedAsset<'r>> {
        let resolver: &'r dyn AssetResolver = self.resolver;
        let mut search: Vec<&Path> = vec![anchor];
        search.extend(self.options.search_paths.iter().map(PathBuf::as_path));
        resolver.resolve(asset, &search)
    }

    /// Decode one layer, picking the decoder from the leading bytes.
    pub fn decode(&mut self, data: &[u8], identifier: &str) -> Result<Layer> {
        self.options.limits.check_file_size(data.len() as u64)?;
        match Format::detect(data) {
            Some(Format::Usdc) => self.decode_usdc(data, identifier),
            Some(Format::Usdz) => {
                let archive = UsdzArchive::open(data, &self.options.limits)?;
                let root = archive
                    .default_root()
                    .ok_or_else(|| Error::MissingRequired(format!("{identifier}: usdz holds no layer")))?;
                let bytes = archive.slice(root);
                if is_usdz(bytes) {
                    return Err(Error::Unsupported(format!("{identifier}: nested usdz root layer")));
                }
                let inner = format!("{identifier}[{}]", root.name);
                self.decode(bytes, &inner)
            }
            _ => self.decode_usda(data, identifier),
        }
    }

    pub fn decode_usda(&mut self, data: &[u8], identifier: &str) -> Result<Layer> {
        let text = std::str::from_utf8(data)
            .map_err(|e| Error::invalid(format!("{identifier}: usda is not UTF-8 ({e})")))?;
        usda::parse_layer(text, identifier, &self.options.limits, &mut self.warnings)
    }

    pub fn decode_usdc(&mut self, data: &[u8], identifier: &str) -> Result<Layer> {
        usdc::read_layer(
            data,
            identifier,
            self.options.limits,
            self.options.parallel,
            &mut self.warnings,
        )
    }

    /// Load the `subLayers` of `layer` (recursively) and attach them.
    /// `visiting` holds the identifiers on the current sublayer chain.
    pub fn load_sub_layers(&mut self, layer: &mut Layer, anchor: &Path, visiting: &mut Vec<String>) -> Result<()> {
        let entries = layer.metas().sub_layers.clone();
        for entry in entries {
            let asset = entry.asset_path.as_str();
            let resolved = match self.resolve(asset, anchor) {
                Ok(r) => r,
                Err(Error::UnresolvedAsset(_)) => {
                    self.warnings.push(
                        WarningKind::UnresolvedAsset,
                        format!("{}: cannot resolve sublayer @{asset}@", layer.identifier()),
                    );
                    continue;
                }
                Err(e) => return Err(e),
            };
            if visiting.contains(&resolved.identifier) {
                self.warnings.push(
                    WarningKind::CompositionCycle,
                    format!("{}: sublayer @{asset}@ is already in the stack", layer.identifier()),
                );
                continue;
            }
            let mut sub = self.decode(&resolved.data, &resolved.identifier)?;
            visiting.push(resolved.identifier.clone());
            self.load_sub_layers(&mut sub, &anchor_of(&resolved.identifier), visiting)?;
            visiting.pop();
            debug!(parent = layer.identifier(), sublayer = %resolved.identifier, "loaded sublayer");
            layer.push_sub_layer(sub, entry.offset);
        }
        Ok(())
    }
}

/// Load and compose any supported encoding, detected from the bytes.
pub fn load(data: &[u8], base_dir: impl AsRef<Path>, resolver: &dyn AssetResolver, options: &LoadOptions) -> Result<Stage> {
    match Format::detect(data) {
        Some(Format::Usdz) => load_usdz(data, base_dir, resolver, options),
        Some(Format::Usdc) => load_usdc(data, base_dir, resolver, options),
        _ => load_usda(data, base_dir, resolver, options),
    }
}

/// Load and compose usda text.
pub fn load_usda(
    data: &[u8],
    base_dir: impl AsRef<Path>,
    resolver: &dyn AssetResolver,
    options: &LoadOptions,
) -> Result<Stage> {
    let mut ctx = LoadContext::new(resolver, options);
    options.limits.check_file_size(data.len() as u64)?;
    let layer = ctx.decode_usda(data, options.root_identifier())?;
    compose(ctx, layer, base_dir.as_ref())
}

/// Load and compose a crate file.
pub fn load_usdc(
    data: &[u8],
    base_dir: impl AsRef<Path>,
    resolver: &dyn AssetResolver,
    options: &LoadOptions,
) -> Result<Stage> {
    let mut ctx = LoadContext::new(resolver, options);
    options.limits.check_file_size(data.len() as u64)?;
    let layer = ctx.decode_usdc(data, options.root_identifier())?;
    compose(ctx, layer, base_dir.as_ref())
}

/// Load and compose a USDZ package. Asset paths resolve against the
/// package members first, then through `resolver` with `base_dir` searched.
pub fn load_usdz(
    data: &[u8],
    base_dir: impl AsRef<Path>,
    resolver: &dyn AssetResolver,
    options: &LoadOptions,
) -> Result<Stage> {
    options.limits.check_file_size(data.len() as u64)?;
    let archive = UsdzArchive::open(data, &options.limits)?;
    let root = archive
        .default_root()
        .cloned()
        .ok_or_else(|| Error::MissingRequired("usdz holds no usda or usdc layer".into()))?;
    let root_data = archive.slice(&root);
    let resolver = UsdzResolver::new(archive, resolver);
    let options = options.clone().with_search_path(base_dir.as_ref());

    let mut ctx = LoadContext::new(&resolver, &options);
    let layer = ctx.decode(root_data, &root.name)?;
    info!(root = %root.name, "loading usdz package");
    compose(ctx, layer, &anchor_of(&root.name))
}

/// Load a file from disk, memory-mapping it. Asset paths resolve relative
/// to the file's directory.
pub fn load_file(path: impl AsRef<Path>, options: &LoadOptions) -> Result<Stage> {
    let path = path.as_ref();
    let canonical = std::fs::canonicalize(path).map_err(|e| Error::Io(format!("{}: {e}", path.display())))?;
    let file = File::open(&canonical).map_err(|e| Error::Io(format!("{}: {e}", path.display())))?;
    let size = file
        .metadata()
        .map_err(|e| Error::Io(format!("{}: {e}", path.display())))?
        .len();
    options.limits.check_file_size(size)?;

    let mapped;
    let owned;
    let data: &[u8] = if size > 0 {
        // Safety: the map is read-only and dropped before returning.
        mapped = unsafe { Mmap::map(&file) }.map_err(|e| Error::Io(format!("{}: mmap: {e}", path.display())))?;
        &mapped[..]
    } else {
        owned = Vec::<u8>::new();
        &owned[..]
    };

    let base_dir = canonical.parent().map(Path::to_path_buf).unwrap_or_default();
    let identifier = canonical.to_string_lossy().into_owned();
    let resolver = FileResolver::new();
    info!(file = %identifier, bytes = size, "loading");

    let format = Format::detect(data).or_else(|| Format::from_extension(path));
    if format == Some(Format::Usdz) {
        return load_usdz(data, &base_dir, &resolver, options);
    }
    let mut ctx = LoadContext::new(&resolver, options);
    let layer = match format {
        Some(Format::Usdc) => ctx.decode_usdc(data, &identifier)?,
        _ => ctx.decode_usda(data, &identifier)?,
    };
    compose(ctx, layer, &base_dir)
}

/// Read a single layer from a file without composing it. Sublayers are
/// attached when `with_sub_layers` is set.
pub fn read_layer_file(
    path: impl AsRef<Path>,
    options: &LoadOptions,
    with_sub_layers: bool,
) -> Result<(Layer, Vec<Warning>)> {
    let path = path.as_ref();
    let data = std::fs::read(path).map_err(|e| Error::Io(format!("{}: {e}", path.display())))?;
    let canonical = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    let identifier = canonical.to_string_lossy().into_owned();
    let resolver = FileResolver::new();
    let mut ctx = LoadContext::new(&resolver, options);
    let mut layer = ctx.decode(&data, &identifier)?;
    if with_sub_layers {
        let mut visiting = vec![identifier.clone()];
        ctx.load_sub_layers(&mut layer, &anchor_of(&identifier), &mut visiting)?;
    }
    Ok((layer, ctx.warnings.into_vec()))
}

impl Layer {
    /// Parse usda text and attach its sublayers.
    pub fn from_usda(data: &[u8], base_dir: impl AsRef<Path>, resolver: &dyn AssetResolver) -> Result<Layer> {
        let options = LoadOptions::default();
        let mut ctx = LoadContext::new(resolver, &options);
        let mut layer = ctx.decode_usda(data, "")?;
        ctx.load_sub_layers(&mut layer, base_dir.as_ref(), &mut Vec::new())?;
        Ok(layer)
    }

    /// Decode a crate file and attach its sublayers.
    pub fn from_crate(data: &[u8], base_dir: impl AsRef<Path>, resolver: &dyn AssetResolver) -> Result<Layer> {
        let options = LoadOptions::default();
        let mut ctx = LoadContext::new(resolver, &options);
        let mut layer = ctx.decode_usdc(data, "")?;
        ctx.load_sub_layers(&mut layer, base_dir.as_ref(), &mut Vec::new())?;
        Ok(layer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::composition::{MemoryResolver, NullResolver};
    use crate::sdf::Path as SdfPath;
    use crate::value::{Role, SampleTime, Value};

    #[test]
    fn test_detect() {
        assert_eq!(Format::detect(b"#usda 1.0\n"), Some(Format::Usda));
        assert_eq!(Format::detect(b"PXR-USDC\0\0"), Some(Format::Usdc));
        assert_eq!(Format::detect(b"PK\x03\x04...."), Some(Format::Usdz));
        assert_eq!(Format::detect(b"garbage"), None);
        assert_eq!(Format::from_extension(Path::new("a/b.USDZ")), Some(Format::Usdz));
        assert_eq!(anchor_of("dir/sub/a.usda"), PathBuf::from("dir/sub"));
        assert_eq!(anchor_of("a.usda"), PathBuf::from(""));
    }

    #[test]
    fn test_load_usda() {
        let text = b"#usda 1.0\ndef Xform \"root\" { double3 xformOp:translate = (1, 2, 3) }\n";
        let stage = load(text, "", &NullResolver, &LoadOptions::default()).unwrap();
        let root = stage.find_prim_at_path(&SdfPath::new("/root").unwrap()).unwrap();
        assert_eq!(root.type_name(), Some("Xform"));
        assert_eq!(
            root.get("xformOp:translate", SampleTime::Default).unwrap(),
            Value::Double3([1.0, 2.0, 3.0], Role::None)
        );
        assert!(stage.warnings().is_empty());
    }

    #[test]
    fn test_layer_from_usda_attaches_sublayers() {
        let r = MemoryResolver::new().with("lib/base.usda", "#usda 1.0\ndef \"B\" {}\n");
        let layer = Layer::from_usda(b"#usda 1.0\n(subLayers = [@base.usda@])\n", "lib", &r).unwrap();
        assert_eq!(layer.sub_layers().len(), 1);
        assert_eq!(layer.sub_layers()[0].layer.identifier(), "lib/base.usda");
    }

    #[test]
    fn test_load_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("base.usda"),
            "#usda 1.0\n(defaultPrim = \"A\")\ndef Xform \"A\" { float radius = 2.5 }\n",
        )
        .unwrap();
        let main = dir.path().join("main.usda");
        std::fs::write(&main, "#usda 1.0\ndef Xform \"A\" ( references = @./base.usda@ ) { float radius = 7.0 }\n")
            .unwrap();

        let stage = load_file(&main, &LoadOptions::default()).unwrap();
        let a = stage.find_prim_at_path(&SdfPath::new("/A").unwrap()).unwrap();
        assert_eq!(a.get("radius", SampleTime::Default).unwrap(), Value::Float(7.0));
        assert!(stage.warnings().is_empty());

        let missing = load_file(dir.path().join("nope.usda"), &LoadOptions::default());
        assert!(matches!(missing, Err(Error::Io(_))));
    }
}
