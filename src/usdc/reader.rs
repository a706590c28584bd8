//! Crate file section reader.
//!
//! Parses the bootstrap, the table of contents and the six structural
//! sections. Values stay packed as [`ValueRep`]s until a caller asks for
//! them (see `value.rs`).

use super::format::*;
use crate::codec::{self, lz4};
use crate::sdf::{Path, Token};
use crate::util::{Error, Limits, Result, StreamReader};

/// One entry of the table of contents.
#[derive(Clone, Debug, PartialEq)]
pub struct Section {
    pub name: String,
    pub start: u64,
    pub size: u64,
}

/// A field: name plus packed value.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Field {
    pub name: Token,
    pub rep: ValueRep,
}

/// A spec record from SPECS.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Spec {
    pub path_index: u32,
    pub fieldset_index: u32,
    pub spec_type: SpecType,
}

/// Structural contents of a crate file. Borrows the file bytes so that
/// out-of-line values are decoded straight from the input.
pub struct CrateFile<'a> {
    data: &'a [u8],
    pub(crate) limits: Limits,
    version: [u8; 3],
    sections: Vec<Section>,
    pub(crate) tokens: Vec<Token>,
    pub(crate) strings: Vec<u32>,
    pub(crate) fields: Vec<Field>,
    pub(crate) fieldsets: Vec<u32>,
    pub(crate) paths: Vec<Path>,
    /// Position of each path in the PATHS tree walk (pre-order).
    pub(crate) path_order: Vec<usize>,
    pub(crate) specs: Vec<Spec>,
}

/// Raw PATHS streams before tree reconstruction.
struct PathTables {
    path_indices: Vec<i32>,
    element_tokens: Vec<i32>,
    jumps: Vec<i32>,
}

/// Run two closures, on the rayon pool when `parallel` is set.
fn join<A, B, RA, RB>(parallel: bool, a: A, b: B) -> (RA, RB)
where
    A: FnOnce() -> RA + Send,
    B: FnOnce() -> RB + Send,
    RA: Send,
    RB: Send,
{
    if parallel {
        rayon::join(a, b)
    } else {
        (a(), b())
    }
}

/// Validate the bootstrap; returns the version and TOC offset.
pub fn read_bootstrap(data: &[u8]) -> Result<([u8; 3], u64)> {
    if data.len() < USDC_MAGIC.len() || &data[..USDC_MAGIC.len()] != USDC_MAGIC {
        let head = &data[..data.len().min(USDC_MAGIC.len())];
        return Err(Error::BadMagic(String::from_utf8_lossy(head).into_owned()));
    }
    if data.len() < BOOTSTRAP_SIZE {
        return Err(Error::Truncated {
            offset: 0,
            needed: BOOTSTRAP_SIZE as u64,
            available: data.len() as u64,
        });
    }

    let version = [data[VERSION_OFFSET], data[VERSION_OFFSET + 1], data[VERSION_OFFSET + 2]];
    if version[0] > CURRENT_VERSION[0] || (version[0] == 0 && version[1] < MIN_MINOR_VERSION) {
        return Err(Error::UnsupportedVersion(format!(
            "{}.{}.{}",
            version[0], version[1], version[2]
        )));
    }

    let mut r = StreamReader::new(data);
    r.seek_to(TOC_POS_OFFSET as u64)?;
    let toc = r.read_u64_le()?;
    Ok((version, toc))
}

fn read_toc(data: &[u8], toc_offset: u64) -> Result<Vec<Section>> {
    let mut r = StreamReader::new(data);
    r.seek_to(toc_offset)?;
    let count = r.read_u64_le()?;
    let record = (SECTION_NAME_LEN + 16) as u64;
    if count.saturating_mul(record) > r.remaining() as u64 {
        return Err(Error::Truncated {
            offset: r.tell(),
            needed: count.saturating_mul(record),
            available: r.remaining() as u64,
        });
    }

    let mut sections = Vec::with_capacity(count as usize);
    for _ in 0..count {
        let raw = r.read_bytes(SECTION_NAME_LEN)?;
        let len = raw.iter().position(|&b| b == 0).unwrap_or(SECTION_NAME_LEN);
        let name = std::str::from_utf8(&raw[..len])?.to_owned();
        let start = r.read_i64_le()?;
        let size = r.read_i64_le()?;
        if start < 0 || size < 0 || (start as u64).saturating_add(size as u64) > data.len() as u64 {
            return Err(Error::invalid(format!(
                "section {name} [{start}, +{size}) outside file of {} bytes",
                data.len()
            )));
        }
        sections.push(Section {
            name,
            start: start as u64,
            size: size as u64,
        });
    }
    Ok(sections)
}

impl<'a> CrateFile<'a> {
    /// Parse the structural sections of `data`.
    ///
    /// With `parallel` set, the independent sections are decoded on the
    /// rayon pool.
    pub fn open(data: &'a [u8], limits: Limits, parallel: bool) -> Result<Self> {
        limits.check_file_size(data.len() as u64)?;
        let (version, toc_offset) = read_bootstrap(data)?;
        let sections = read_toc(data, toc_offset)?;
        tracing::debug!(
            version = ?version,
            toc_offset,
            sections = sections.len(),
            "crate bootstrap"
        );

        let mut file = Self {
            data,
            limits,
            version,
            sections,
            tokens: Vec::new(),
            strings: Vec::new(),
            fields: Vec::new(),
            fieldsets: Vec::new(),
            paths: Vec::new(),
            path_order: Vec::new(),
            specs: Vec::new(),
        };
        for name in REQUIRED_SECTIONS {
            file.section(name)?;
        }

        let this = &file;
        let ((tokens, strings), ((raw_fields, fieldsets), (paths, specs))) = join(
            parallel,
            || join(parallel, || this.read_tokens(), || this.read_strings()),
            || {
                join(
                    parallel,
                    || join(parallel, || this.read_fields(), || this.read_fieldsets()),
                    || join(parallel, || this.read_path_tables(), || this.read_specs()),
                )
            },
        );

        file.tokens = tokens?;
        file.strings = strings?;
        file.fieldsets = fieldsets?;
        file.specs = specs?;
        file.fields = raw_fields?
            .into_iter()
            .map(|(name, rep)| {
                Ok(Field {
                    name: file.token(name)?,
                    rep: ValueRep(rep),
                })
            })
            .collect::<Result<_>>()?;
        let (paths, order) = file.build_paths(&paths?)?;
        file.paths = paths;
        file.path_order = order;

        tracing::debug!(
            tokens = file.tokens.len(),
            strings = file.strings.len(),
            fields = file.fields.len(),
            paths = file.paths.len(),
            specs = file.specs.len(),
            "crate sections"
        );
        Ok(file)
    }

    /// `(major, minor, patch)` from the bootstrap.
    pub fn version(&self) -> [u8; 3] {
        self.version
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn specs(&self) -> &[Spec] {
        &self.specs
    }

    pub fn paths(&self) -> &[Path] {
        &self.paths
    }

    #[inline]
    pub(crate) fn data(&self) -> &'a [u8] {
        self.data
    }

    fn section(&self, name: &str) -> Result<StreamReader<'a>> {
        let s = self
            .sections
            .iter()
            .find(|s| s.name == name)
            .ok_or_else(|| Error::MissingRequired(format!("crate section {name}")))?;
        let start = s.start as usize;
        Ok(StreamReader::new(&self.data[start..start + s.size as usize]))
    }

    pub(crate) fn token(&self, index: u32) -> Result<Token> {
        self.tokens.get(index as usize).copied().ok_or(Error::OutOfRange {
            index: index as usize,
            len: self.tokens.len(),
        })
    }

    pub(crate) fn string(&self, index: u32) -> Result<&'static str> {
        let token = self.strings.get(index as usize).copied().ok_or(Error::OutOfRange {
            index: index as usize,
            len: self.strings.len(),
        })?;
        Ok(self.token(token)?.as_str())
    }

    pub(crate) fn path(&self, index: u32) -> Result<&Path> {
        self.paths.get(index as usize).ok_or(Error::OutOfRange {
            index: index as usize,
            len: self.paths.len(),
        })
    }

    /// Fields of one fieldset, starting at `index` and ending at the terminator.
    pub(crate) fn fieldset(&self, index: u32) -> Result<Vec<Field>> {
        let start = index as usize;
        if start > self.fieldsets.len() {
            return Err(Error::OutOfRange {
                index: start,
                len: self.fieldsets.len(),
            });
        }
        self.fieldsets[start..]
            .iter()
            .take_while(|&&f| f != INVALID_INDEX)
            .map(|&f| {
                self.fields.get(f as usize).copied().ok_or(Error::OutOfRange {
                    index: f as usize,
                    len: self.fields.len(),
                })
            })
            .collect()
    }

    fn read_tokens(&self) -> Result<Vec<Token>> {
        let mut r = self.section(TOKENS_SECTION)?;
        let count = r.read_u64_le()?;
        let size = r.read_u64_le()?;
        self.limits.check_decompressed_size(size)?;
        let raw = lz4::decompress(&mut r, self.limits.max_decompressed_size)?;
        if raw.len() as u64 != size {
            return Err(Error::invalid(format!(
                "TOKENS decompressed to {} bytes, header says {size}",
                raw.len()
            )));
        }

        let mut text = StreamReader::new(&raw);
        let mut tokens = Vec::with_capacity((count as usize).min(raw.len() + 1));
        for _ in 0..count {
            tokens.push(Token::new(text.read_cstr()?));
        }
        Ok(tokens)
    }

    fn read_strings(&self) -> Result<Vec<u32>> {
        let mut r = self.section(STRINGS_SECTION)?;
        let count = r.read_u64_le()?;
        if count.saturating_mul(4) > r.remaining() as u64 {
            return Err(Error::Truncated {
                offset: r.tell(),
                needed: count.saturating_mul(4),
                available: r.remaining() as u64,
            });
        }
        (0..count).map(|_| r.read_u32_le()).collect()
    }

    fn read_fields(&self) -> Result<Vec<(u32, u64)>> {
        let mut r = self.section(FIELDS_SECTION)?;
        let count = r.read_u64_le()?;
        let names = codec::read_coded_u32(&mut r, self.limits.max_decompressed_size, self.limits.max_int_run)?;
        let reps = lz4::decompress(&mut r, self.limits.max_decompressed_size)?;
        if names.len() as u64 != count || reps.len() as u64 != count.saturating_mul(8) {
            return Err(Error::invalid(format!(
                "FIELDS count {count} disagrees with {} names / {} rep bytes",
                names.len(),
                reps.len()
            )));
        }
        let mut reps = StreamReader::new(&reps);
        names
            .into_iter()
            .map(|name| Ok((name, reps.read_u64_le()?)))
            .collect()
    }

    fn read_fieldsets(&self) -> Result<Vec<u32>> {
        let mut r = self.section(FIELDSETS_SECTION)?;
        let count = r.read_u64_le()?;
        let sets = codec::read_coded_u32(&mut r, self.limits.max_decompressed_size, self.limits.max_int_run)?;
        if sets.len() as u64 != count {
            return Err(Error::invalid(format!(
                "FIELDSETS count {count} disagrees with {} entries",
                sets.len()
            )));
        }
        Ok(sets)
    }

    fn read_path_tables(&self) -> Result<PathTables> {
        let mut r = self.section(PATHS_SECTION)?;
        let count = r.read_u64_le()?;
        self.limits.check_path_count(count)?;
        let max = self.limits.max_decompressed_size;
        let run = self.limits.max_int_run;
        let tables = PathTables {
            path_indices: codec::read_coded_i32(&mut r, max, run)?,
            element_tokens: codec::read_coded_i32(&mut r, max, run)?,
            jumps: codec::read_coded_i32(&mut r, max, run)?,
        };
        for len in [tables.path_indices.len(), tables.element_tokens.len(), tables.jumps.len()] {
            if len as u64 != count {
                return Err(Error::invalid(format!("PATHS count {count} disagrees with stream of {len}")));
            }
        }
        Ok(tables)
    }

    fn read_specs(&self) -> Result<Vec<Spec>> {
        let mut r = self.section(SPECS_SECTION)?;
        let count = r.read_u64_le()?;
        if count.saturating_mul(SPEC_RECORD_SIZE as u64) > r.remaining() as u64 {
            return Err(Error::Truncated {
                offset: r.tell(),
                needed: count.saturating_mul(SPEC_RECORD_SIZE as u64),
                available: r.remaining() as u64,
            });
        }
        (0..count)
            .map(|_| {
                let path_index = r.read_u32_le()?;
                let fieldset_index = r.read_u32_le()?;
                let raw = r.read_u32_le()?;
                let spec_type = SpecType::from_u32(raw)
                    .ok_or_else(|| Error::invalid(format!("unknown spec type {raw}")))?;
                Ok(Spec {
                    path_index,
                    fieldset_index,
                    spec_type,
                })
            })
            .collect()
    }

    /// Rebuild absolute paths from the jump-encoded tree walk.
    ///
    /// Jump `-2`: leaf; `-1`: child follows, no sibling; `0`: sibling
    /// follows, no child; `> 0`: child follows and the sibling entry is
    /// `jump` entries ahead.
    fn build_paths(&self, t: &PathTables) -> Result<(Vec<Path>, Vec<usize>)> {
        let n = t.path_indices.len();
        let mut paths: Vec<Option<Path>> = vec![None; n];
        let mut order = vec![usize::MAX; n];
        let mut visited = vec![false; n];
        if n == 0 {
            return Ok((Vec::new(), Vec::new()));
        }

        let mut walk = 0usize;
        let mut stack: Vec<(usize, Option<Path>)> = vec![(0, None)];
        while let Some((start, mut parent)) = stack.pop() {
            let mut cur = start;
            loop {
                let this = cur;
                cur += 1;
                if this >= n {
                    return Err(Error::invalid(format!("path entry {this} out of range ({n})")));
                }
                if visited[this] {
                    return Err(Error::CyclicPath(this));
                }
                visited[this] = true;

                let slot = usize::try_from(t.path_indices[this])
                    .ok()
                    .filter(|&i| i < n)
                    .ok_or_else(|| Error::invalid(format!("bad path index {}", t.path_indices[this])))?;
                let path = match &parent {
                    None => Path::root(),
                    Some(p) => {
                        let raw = t.element_tokens[this];
                        let is_property = raw < 0;
                        let element = self.token(raw.unsigned_abs())?;
                        p.append_element_str(element.as_str(), is_property)?
                    }
                };
                if paths[slot].is_some() {
                    return Err(Error::CyclicPath(this));
                }
                paths[slot] = Some(path);
                order[slot] = walk;
                walk += 1;

                let jump = t.jumps[this];
                let has_child = jump > 0 || jump == -1;
                let has_sibling = jump >= 0;
                if has_child {
                    if has_sibling {
                        stack.push((this + jump as usize, parent.clone()));
                    }
                    parent = paths[slot].clone();
                }
                if !has_child && !has_sibling {
                    break;
                }
            }
        }

        let paths = paths
            .into_iter()
            .enumerate()
            .map(|(i, p)| p.ok_or_else(|| Error::invalid(format!("path {i} never assigned"))))
            .collect::<Result<Vec<_>>>()?;
        Ok((paths, order))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bootstrap(version: [u8; 3]) -> Vec<u8> {
        let mut data = vec![0u8; BOOTSTRAP_SIZE];
        data[..8].copy_from_slice(USDC_MAGIC);
        data[VERSION_OFFSET..VERSION_OFFSET + 3].copy_from_slice(&version);
        data[TOC_POS_OFFSET..TOC_POS_OFFSET + 8].copy_from_slice(&(BOOTSTRAP_SIZE as u64).to_le_bytes());
        data
    }

    #[test]
    fn test_bootstrap() {
        let data = bootstrap([0, 8, 0]);
        assert_eq!(read_bootstrap(&data).unwrap(), ([0, 8, 0], BOOTSTRAP_SIZE as u64));
    }

    #[test]
    fn test_bad_magic() {
        let mut data = bootstrap([0, 8, 0]);
        data[0] = b'X';
        assert!(matches!(read_bootstrap(&data), Err(Error::BadMagic(_))));
        assert!(matches!(read_bootstrap(b"#usda 1.0"), Err(Error::BadMagic(_))));
    }

    #[test]
    fn test_versions() {
        assert!(matches!(
            read_bootstrap(&bootstrap([1, 0, 0])),
            Err(Error::UnsupportedVersion(_))
        ));
        assert!(matches!(
            read_bootstrap(&bootstrap([0, 3, 0])),
            Err(Error::UnsupportedVersion(_))
        ));
        assert!(read_bootstrap(&bootstrap([0, 4, 0])).is_ok());
    }

    #[test]
    fn test_truncated_bootstrap() {
        let data = bootstrap([0, 8, 0]);
        assert!(matches!(read_bootstrap(&data[..40]), Err(Error::Truncated { .. })));
    }

    #[test]
    fn test_missing_section() {
        let mut data = bootstrap([0, 8, 0]);
        data.extend_from_slice(&0u64.to_le_bytes());
        let err = CrateFile::open(&data, Limits::default(), false).err().unwrap();
        assert!(matches!(err, Error::MissingRequired(ref s) if s.contains("TOKENS")));
    }

    #[test]
    fn test_section_out_of_bounds() {
        let mut data = bootstrap([0, 8, 0]);
        data.extend_from_slice(&1u64.to_le_bytes());
        let mut name = [0u8; SECTION_NAME_LEN];
        name[..6].copy_from_slice(b"TOKENS");
        data.extend_from_slice(&name);
        data.extend_from_slice(&0i64.to_le_bytes());
        data.extend_from_slice(&4096i64.to_le_bytes());
        assert!(matches!(
            CrateFile::open(&data, Limits::default(), false),
            Err(Error::InvalidStructure(_))
        ));
    }
}
