//! Metadata sidecar: the record describing how to reassemble a part set.
//!
//! On disk the sidecar is a small magic + version header followed by a CBOR
//! map. Serde ignores unknown map keys on decode, so an older reader can
//! open a sidecar written by a newer tool as long as the fields below are
//! present.

use crate::error::{Result, ShardError};
use crate::hash::HashAlgorithm;
use crate::layout;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

pub const MAGIC: &[u8; 6] = b"SHARD1";
pub const VERSION: u16 = 1;

/// Recorded whole-file digest, present only when hashing was requested at
/// split time.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RecordedDigest {
    pub algorithm: HashAlgorithm,
    pub value: Vec<u8>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Sidecar {
    /// Base name to restore on join when no output override is given.
    pub original_name: String,
    pub original_size: u64,
    /// Nominal part size; every part except the last has exactly this length.
    pub chunk_size: u64,
    pub part_count: u64,
    pub digest: Option<RecordedDigest>,
}

impl Sidecar {
    pub fn new(original_name: String, original_size: u64, chunk_size: u64) -> Result<Self> {
        if chunk_size == 0 {
            return Err(ShardError::Usage("chunk size must be > 0".into()));
        }
        Ok(Self {
            original_name,
            original_size,
            chunk_size,
            part_count: layout::part_count(original_size, chunk_size),
            digest: None,
        })
    }

    /// Expected byte length of part `index` (1-based).
    pub fn part_size(&self, index: u64) -> u64 {
        layout::part_size(self.original_size, self.chunk_size, index)
    }

    /// Byte offset of part `index` in the reconstructed file.
    pub fn part_offset(&self, index: u64) -> u64 {
        layout::part_offset(self.chunk_size, index)
    }

    pub fn part_file_name(&self, index: u64) -> String {
        layout::part_file_name(&self.original_name, index)
    }

    /// Structural invariants a decoded record must satisfy before any join
    /// is attempted with it.
    fn validate(&self) -> Result<()> {
        if self.original_name.is_empty() {
            return Err(ShardError::Parse("empty original_name".into()));
        }
        if self.chunk_size == 0 {
            return Err(ShardError::Parse("chunk_size must be > 0".into()));
        }
        let expect = layout::part_count(self.original_size, self.chunk_size);
        if self.part_count != expect {
            return Err(ShardError::Parse(format!(
                "part_count {} inconsistent with size {} / chunk {} (expected {})",
                self.part_count, self.original_size, self.chunk_size, expect
            )));
        }
        if let Some(d) = &self.digest
            && d.value.len() != d.algorithm.digest_len()
        {
            return Err(ShardError::Parse(format!(
                "{} digest must be {} bytes, got {}",
                d.algorithm,
                d.algorithm.digest_len(),
                d.value.len()
            )));
        }
        Ok(())
    }

    pub fn write_to(&self, mut w: impl Write) -> Result<()> {
        let mut payload = Vec::new();
        ciborium::ser::into_writer(self, &mut payload)
            .map_err(|e| ShardError::Parse(format!("sidecar encode: {e}")))?;
        w.write_all(MAGIC)?;
        w.write_all(&VERSION.to_le_bytes())?;
        w.write_all(&payload)?;
        Ok(())
    }

    pub fn read_from(mut r: impl Read) -> Result<Self> {
        let mut magic = [0u8; 6];
        r.read_exact(&mut magic)
            .map_err(|e| ShardError::Parse(format!("sidecar header: {e}")))?;
        if &magic != MAGIC {
            return Err(ShardError::Parse("bad sidecar magic".into()));
        }
        let mut v = [0u8; 2];
        r.read_exact(&mut v)
            .map_err(|e| ShardError::Parse(format!("sidecar header: {e}")))?;
        let version = u16::from_le_bytes(v);
        if version != VERSION {
            return Err(ShardError::Parse(format!(
                "unsupported sidecar version {version} (expected {VERSION})"
            )));
        }
        let mut payload = Vec::new();
        r.read_to_end(&mut payload)?;
        let sidecar: Sidecar = ciborium::de::from_reader(&payload[..])
            .map_err(|e| ShardError::Parse(format!("sidecar decode: {e}")))?;
        sidecar.validate()?;
        Ok(sidecar)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let mut f = File::create(path)?;
        self.write_to(&mut f)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let f = File::open(path)?;
        Self::read_from(f)
    }
}

/// Locate the single `*.info` sidecar inside a parts directory.
///
/// Zero sidecars means the directory is not a part set; more than one means
/// the set is ambiguous. Both are fatal before any reconstruction starts.
pub fn find_sidecar(dir: &Path) -> Result<PathBuf> {
    let mut found: Option<PathBuf> = None;
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.extension().is_some_and(|e| e == "info") {
            if found.is_some() {
                return Err(ShardError::Corruption(format!(
                    "multiple sidecar files in {}",
                    dir.display()
                )));
            }
            found = Some(path);
        }
    }
    found.ok_or_else(|| {
        ShardError::Parse(format!("no sidecar (*.info) file in {}", dir.display()))
    })
}
