//! Store-only zip archive view over a borrowed byte slice.

use std::io::Cursor;

use zip::result::ZipError;
use zip::{CompressionMethod, ZipArchive};

use crate::util::{Error, Limits, Result};

/// Required alignment of every member's data, in bytes.
pub const USDZ_ALIGNMENT: u64 = 64;

/// Extensions that mark a member as a scene layer.
pub const LAYER_EXTENSIONS: &[&str] = &["usda", "usdc", "usd"];

/// One archive member: name and byte range of its data.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Member {
    pub name: String,
    pub offset: u64,
    pub size: u64,
}

impl Member {
    /// Lowercase file extension, if any.
    pub fn extension(&self) -> Option<String> {
        let file = self.name.rsplit('/').next()?;
        let (_, ext) = file.rsplit_once('.')?;
        Some(ext.to_ascii_lowercase())
    }

    /// True for `.usda` / `.usdc` / `.usd` members.
    pub fn is_layer(&self) -> bool {
        self.extension()
            .is_some_and(|e| LAYER_EXTENSIONS.contains(&e.as_str()))
    }
}

fn zip_error(err: ZipError) -> Error {
    match err {
        ZipError::Io(e) => Error::Io(e.to_string()),
        ZipError::InvalidArchive(msg) => Error::invalid(format!("usdz: {msg}")),
        ZipError::UnsupportedArchive(msg) => Error::Unsupported(format!("usdz: {msg}")),
        ZipError::FileNotFound => Error::MissingRequired("usdz member".into()),
        other => Error::invalid(format!("usdz: {other}")),
    }
}

/// A parsed USDZ package.
///
/// The central directory is read once on open. Member data is never
/// copied: [`UsdzArchive::read`] hands out sub-slices of the input.
#[derive(Debug)]
pub struct UsdzArchive<'a> {
    data: &'a [u8],
    members: Vec<Member>,
}

impl<'a> UsdzArchive<'a> {
    /// Parse the central directory of `data` and validate every member.
    pub fn open(data: &'a [u8], limits: &Limits) -> Result<Self> {
        limits.check_file_size(data.len() as u64)?;
        let mut zip = ZipArchive::new(Cursor::new(data)).map_err(zip_error)?;

        let mut members = Vec::with_capacity(zip.len());
        for i in 0..zip.len() {
            let file = zip.by_index_raw(i).map_err(zip_error)?;
            if file.is_dir() {
                continue;
            }
            let name = file.name().to_owned();
            if file.compression() != CompressionMethod::Stored {
                return Err(Error::Unsupported(format!(
                    "USDZ members must be stored uncompressed (`{name}` uses {})",
                    file.compression()
                )));
            }
            let offset = file.data_start();
            let size = file.size();
            if offset % USDZ_ALIGNMENT != 0 {
                return Err(Error::invalid(format!(
                    "usdz member `{name}` data at offset {offset} is not {USDZ_ALIGNMENT}-byte aligned"
                )));
            }
            let end = offset.checked_add(size).unwrap_or(u64::MAX);
            if end > data.len() as u64 {
                return Err(Error::Truncated {
                    offset,
                    needed: size,
                    available: (data.len() as u64).saturating_sub(offset),
                });
            }
            tracing::trace!(%name, offset, size, "usdz member");
            members.push(Member { name, offset, size });
        }
        tracing::debug!(count = members.len(), "opened usdz archive");
        Ok(Self { data, members })
    }

    /// Members in central-directory order.
    pub fn members(&self) -> &[Member] {
        &self.members
    }

    pub fn member(&self, name: &str) -> Option<&Member> {
        let name = name.strip_prefix("./").unwrap_or(name);
        self.members.iter().find(|m| m.name == name)
    }

    /// Borrow the data of member `name`.
    pub fn read(&self, name: &str) -> Result<&'a [u8]> {
        let member = self
            .member(name)
            .ok_or_else(|| Error::UnresolvedAsset(format!("`{name}` is not in the usdz archive")))?;
        Ok(self.slice(member))
    }

    pub fn slice(&self, member: &Member) -> &'a [u8] {
        let start = member.offset as usize;
        &self.data[start..start + member.size as usize]
    }

    /// Layer members, in central-directory order.
    pub fn layers(&self) -> impl Iterator<Item = &Member> {
        self.members.iter().filter(|m| m.is_layer())
    }

    /// The first layer member: the package's root layer.
    pub fn default_root(&self) -> Option<&Member> {
        self.layers().next()
    }
}
