//! Asset resolution: authored `@asset@` identifiers to bytes.

use std::borrow::Cow;
use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};

use crate::usdz::UsdzArchive;
use crate::util::{Error, Result};

/// Bytes of a resolved asset plus the identifier it resolved to.
///
/// Two references that resolve to the same `identifier` name the same
/// asset; composition keys caching and cycle detection on it.
#[derive(Clone, Debug)]
pub struct ResolvedAsset<'r> {
    pub identifier: String,
    pub data: Cow<'r, [u8]>,
}

/// Maps an authored asset path to its contents.
///
/// `search_paths` lists the directories to try for relative paths, the
/// directory of the referencing layer first. Resolvers return
/// [`Error::UnresolvedAsset`] when nothing matches; composition records
/// that as a warning and drops the arc. Any other error aborts the load.
pub trait AssetResolver {
    fn resolve(&self, asset_path: &str, search_paths: &[&Path]) -> Result<ResolvedAsset<'_>>;
}

impl<R: AssetResolver + ?Sized> AssetResolver for &R {
    fn resolve(&self, asset_path: &str, search_paths: &[&Path]) -> Result<ResolvedAsset<'_>> {
        (**self).resolve(asset_path, search_paths)
    }
}

/// Lexically normalize a relative or absolute path (`a/./b/../c` to `a/c`).
pub fn normalize_path(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for c in path.components() {
        match c {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Candidate locations for `asset_path`: itself when absolute, otherwise
/// joined onto each search path and finally taken as-is.
fn candidates(asset_path: &str, search_paths: &[&Path]) -> Vec<PathBuf> {
    let asset = Path::new(asset_path);
    if asset.is_absolute() {
        return vec![normalize_path(asset)];
    }
    let mut out: Vec<PathBuf> = search_paths
        .iter()
        .map(|dir| normalize_path(&dir.join(asset)))
        .collect();
    let bare = normalize_path(asset);
    if !out.contains(&bare) {
        out.push(bare);
    }
    out
}

/// Resolves against the file system.
#[derive(Clone, Debug, Default)]
pub struct FileResolver {
    search_paths: Vec<PathBuf>,
}

impl FileResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Directories tried after those supplied per call.
    pub fn with_search_path(mut self, dir: impl Into<PathBuf>) -> Self {
        self.search_paths.push(dir.into());
        self
    }
}

impl AssetResolver for FileResolver {
    fn resolve(&self, asset_path: &str, search_paths: &[&Path]) -> Result<ResolvedAsset<'_>> {
        let mut dirs: Vec<&Path> = search_paths.to_vec();
        dirs.extend(self.search_paths.iter().map(PathBuf::as_path));

        for candidate in candidates(asset_path, &dirs) {
            if !candidate.is_file() {
                continue;
            }
            let data = std::fs::read(&candidate)
                .map_err(|e| Error::Io(format!("{}: {e}", candidate.display())))?;
            let identifier = std::fs::canonicalize(&candidate)
                .unwrap_or(candidate)
                .to_string_lossy()
                .into_owned();
            tracing::debug!(asset = asset_path, %identifier, "resolved asset");
            return Ok(ResolvedAsset {
                identifier,
                data: Cow::Owned(data),
            });
        }
        Err(Error::UnresolvedAsset(asset_path.to_owned()))
    }
}

/// Resolves against an in-memory table of named assets.
#[derive(Clone, Debug, Default)]
pub struct MemoryResolver {
    assets: HashMap<String, Vec<u8>>,
}

impl MemoryResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `data` under `name` (stored normalized, `./` stripped).
    pub fn insert(&mut self, name: &str, data: impl Into<Vec<u8>>) {
        let key = normalize_path(Path::new(name)).to_string_lossy().into_owned();
        self.assets.insert(key, data.into());
    }

    pub fn with(mut self, name: &str, data: impl Into<Vec<u8>>) -> Self {
        self.insert(name, data);
        self
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

impl AssetResolver for MemoryResolver {
    fn resolve(&self, asset_path: &str, search_paths: &[&Path]) -> Result<ResolvedAsset<'_>> {
        for candidate in candidates(asset_path, search_paths) {
            let key = candidate.to_string_lossy();
            if let Some((name, data)) = self.assets.get_key_value(key.as_ref()) {
                return Ok(ResolvedAsset {
                    identifier: name.clone(),
                    data: Cow::Borrowed(data),
                });
            }
        }
        Err(Error::UnresolvedAsset(asset_path.to_owned()))
    }
}

/// Resolves against the members of a USDZ package, then `fallback`.
pub struct UsdzResolver<'a, R> {
    archive: UsdzArchive<'a>,
    fallback: R,
}

impl<'a, R: AssetResolver> UsdzResolver<'a, R> {
    pub fn new(archive: UsdzArchive<'a>, fallback: R) -> Self {
        Self { archive, fallback }
    }

    pub fn archive(&self) -> &UsdzArchive<'a> {
        &self.archive
    }
}

impl<R: AssetResolver> AssetResolver for UsdzResolver<'_, R> {
    fn resolve(&self, asset_path: &str, search_paths: &[&Path]) -> Result<ResolvedAsset<'_>> {
        for candidate in candidates(asset_path, search_paths) {
            let name = candidate.to_string_lossy();
            if let Some(member) = self.archive.member(&name) {
                return Ok(ResolvedAsset {
                    identifier: member.name.clone(),
                    data: Cow::Borrowed(self.archive.slice(member)),
                });
            }
        }
        self.fallback.resolve(asset_path, search_paths)
    }
}

/// A resolver that resolves nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullResolver;

impl AssetResolver for NullResolver {
    fn resolve(&self, asset_path: &str, _search_paths: &[&Path]) -> Result<ResolvedAsset<'_>> {
        Err(Error::UnresolvedAsset(asset_path.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize() {
        assert_eq!(normalize_path(Path::new("./a/b/../c.usda")), PathBuf::from("a/c.usda"));
        assert_eq!(normalize_path(Path::new("../x.usda")), PathBuf::from("../x.usda"));
    }

    #[test]
    fn test_memory_resolver_search_order() {
        let r = MemoryResolver::new()
            .with("base.usda", b"root".to_vec())
            .with("./sub/base.usda", b"sub".to_vec());
        let sub = Path::new("sub");

        let a = r.resolve("./base.usda", &[sub]).unwrap();
        assert_eq!(a.identifier, "sub/base.usda");
        assert_eq!(a.data.as_ref(), b"sub");

        let a = r.resolve("base.usda", &[]).unwrap();
        assert_eq!(a.data.as_ref(), b"root");

        let a = r.resolve("../base.usda", &[sub]).unwrap();
        assert_eq!(a.identifier, "base.usda");

        assert!(matches!(r.resolve("missing.usda", &[sub]), Err(Error::UnresolvedAsset(_))));
    }

    #[test]
    fn test_file_resolver() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("assets")).unwrap();
        std::fs::write(dir.path().join("assets/geo.usda"), b"#usda 1.0\n").unwrap();

        let r = FileResolver::new().with_search_path(dir.path().join("assets"));
        let a = r.resolve("geo.usda", &[dir.path()]).unwrap();
        assert_eq!(a.data.as_ref(), b"#usda 1.0\n");
        assert!(a.identifier.ends_with("geo.usda"));

        let again = r.resolve("./assets/geo.usda", &[dir.path()]).unwrap();
        assert_eq!(again.identifier, a.identifier);
        assert!(matches!(r.resolve("nope.usda", &[dir.path()]), Err(Error::UnresolvedAsset(_))));
    }

    #[test]
    fn test_null_resolver() {
        assert!(matches!(NullResolver.resolve("a.usda", &[]), Err(Error::UnresolvedAsset(_))));
    }
}
