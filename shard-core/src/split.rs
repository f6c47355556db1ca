//! Split engine: one sequential pass over the source, fixed-size parts out.

use crate::DEFAULT_BUFFER_SIZE;
use crate::error::{Result, ShardError};
use crate::hash::{HashAlgorithm, Hasher};
use crate::layout;
use crate::sidecar::{RecordedDigest, Sidecar};
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Clone, Debug)]
pub struct SplitOptions {
    /// Nominal part size in bytes; must be > 0.
    pub chunk_size: u64,
    /// Read buffer size; throughput knob only, must be > 0.
    pub buffer_size: usize,
    /// When set, record a whole-file digest in the sidecar.
    pub hash: Option<HashAlgorithm>,
    /// Parts directory override; defaults to `<name>_parts` in the current
    /// working directory.
    pub out_dir: Option<PathBuf>,
}

impl SplitOptions {
    pub fn new(chunk_size: u64) -> Self {
        Self {
            chunk_size,
            buffer_size: DEFAULT_BUFFER_SIZE,
            hash: None,
            out_dir: None,
        }
    }
}

/// Split `source` into sequential parts plus a sidecar.
///
/// Returns the sidecar that was written. The source is read exactly once;
/// a single read buffer may span a part boundary, in which case its tail and
/// head land in the two parts independently.
///
/// There is no atomicity across the part set: a failure mid-split leaves a
/// partial directory the caller must discard.
pub fn split(source: &Path, opts: &SplitOptions) -> Result<Sidecar> {
    if opts.chunk_size == 0 {
        return Err(ShardError::Usage("chunk size must be > 0".into()));
    }
    if opts.buffer_size == 0 {
        return Err(ShardError::Usage("buffer size must be > 0".into()));
    }
    let base = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| {
            ShardError::Usage(format!("source path {} has no file name", source.display()))
        })?;

    let original_size = std::fs::metadata(source)?.len();
    let mut sidecar = Sidecar::new(base.clone(), original_size, opts.chunk_size)?;

    let dir = opts
        .out_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from(layout::parts_dir_name(&base)));
    std::fs::create_dir_all(&dir)?;

    info!(
        source = %source.display(),
        size = original_size,
        chunk_size = opts.chunk_size,
        parts = sidecar.part_count,
        dir = %dir.display(),
        "splitting"
    );

    let mut src = File::open(source)?;
    let mut hasher = opts.hash.map(Hasher::new);
    let mut buf = vec![0u8; opts.buffer_size];

    let mut part_index: u64 = 0;
    let mut part_file: Option<File> = None;
    let mut part_remaining: u64 = 0;
    let mut total: u64 = 0;

    loop {
        let n = src.read(&mut buf)?;
        if n == 0 {
            break;
        }
        total += n as u64;
        if let Some(h) = hasher.as_mut() {
            h.update(&buf[..n]);
        }

        let mut slice = &buf[..n];
        while !slice.is_empty() {
            if part_remaining == 0 {
                part_index += 1;
                let path = dir.join(layout::part_file_name(&base, part_index));
                part_file = Some(File::create(&path)?);
                part_remaining = opts.chunk_size;
            }
            let take = part_remaining.min(slice.len() as u64) as usize;
            if let Some(f) = part_file.as_mut() {
                f.write_all(&slice[..take])?;
            }
            part_remaining -= take as u64;
            slice = &slice[take..];
            if part_remaining == 0 {
                debug!(part = part_index, size = opts.chunk_size, "part written");
            }
        }
    }
    drop(part_file);

    if total != original_size {
        return Err(io::Error::new(
            io::ErrorKind::Other,
            format!("source size changed during split: read {total}, expected {original_size}"),
        )
        .into());
    }
    if part_index > 0 && part_remaining > 0 {
        debug!(
            part = part_index,
            size = opts.chunk_size - part_remaining,
            "final part written"
        );
    }

    if let (Some(h), Some(algorithm)) = (hasher, opts.hash) {
        let value = h.finalize();
        debug!(algorithm = %algorithm, digest = %hex::encode(&value), "source digest");
        sidecar.digest = Some(RecordedDigest { algorithm, value });
    }

    sidecar.save(&dir.join(layout::sidecar_file_name(&base)))?;
    info!(parts = sidecar.part_count, dir = %dir.display(), "split complete");
    Ok(sidecar)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn write_source(dir: &Path, name: &str, data: &[u8]) -> PathBuf {
        let p = dir.join(name);
        fs::write(&p, data).unwrap();
        p
    }

    fn opts(chunk: u64, dir: &Path) -> SplitOptions {
        let mut o = SplitOptions::new(chunk);
        o.out_dir = Some(dir.to_path_buf());
        o
    }

    #[test]
    fn parts_have_exact_sizes() {
        let tmp = tempdir().unwrap();
        let data: Vec<u8> = (0u32..1000).map(|i| (i % 256) as u8).collect();
        let src = write_source(tmp.path(), "d.bin", &data);
        let parts = tmp.path().join("parts");

        let sc = split(&src, &opts(300, &parts)).unwrap();
        assert_eq!(sc.part_count, 4);
        for i in 1..=3u64 {
            let len = fs::metadata(parts.join(format!("d.bin.part00{i}")))
                .unwrap()
                .len();
            assert_eq!(len, 300);
        }
        assert_eq!(fs::metadata(parts.join("d.bin.part004")).unwrap().len(), 100);
        assert!(parts.join("d.bin.info").exists());
    }

    #[test]
    fn buffer_spanning_part_boundary_keeps_byte_accounting() {
        let tmp = tempdir().unwrap();
        let data: Vec<u8> = (0u32..500).map(|i| (i * 7 % 256) as u8).collect();
        let src = write_source(tmp.path(), "d.bin", &data);
        let parts = tmp.path().join("parts");

        // buffer (64) does not divide chunk (100): reads straddle boundaries
        let mut o = opts(100, &parts);
        o.buffer_size = 64;
        split(&src, &o).unwrap();

        let mut reassembled = Vec::new();
        for i in 1..=5u64 {
            reassembled.extend(fs::read(parts.join(format!("d.bin.part00{i}"))).unwrap());
        }
        assert_eq!(reassembled, data);
    }

    #[test]
    fn zero_byte_source_writes_sidecar_and_no_parts() {
        let tmp = tempdir().unwrap();
        let src = write_source(tmp.path(), "empty.bin", b"");
        let parts = tmp.path().join("parts");

        let sc = split(&src, &opts(1024, &parts)).unwrap();
        assert_eq!(sc.part_count, 0);
        assert_eq!(sc.original_size, 0);
        // only the sidecar in the directory
        let entries: Vec<_> = fs::read_dir(&parts).unwrap().collect();
        assert_eq!(entries.len(), 1);
        assert!(parts.join("empty.bin.info").exists());
    }

    #[test]
    fn requested_hash_lands_in_sidecar() {
        let tmp = tempdir().unwrap();
        let data = vec![0x5Au8; 777];
        let src = write_source(tmp.path(), "d.bin", &data);
        let parts = tmp.path().join("parts");

        let mut o = opts(256, &parts);
        o.hash = Some(HashAlgorithm::Blake3);
        let sc = split(&src, &o).unwrap();

        let d = sc.digest.unwrap();
        assert_eq!(d.algorithm, HashAlgorithm::Blake3);
        assert_eq!(d.value, blake3::hash(&data).as_bytes().to_vec());

        // and the persisted sidecar agrees
        let loaded = Sidecar::load(&parts.join("d.bin.info")).unwrap();
        assert_eq!(loaded.digest.unwrap().value, blake3::hash(&data).as_bytes());
    }

    #[test]
    fn zero_chunk_size_is_usage_error() {
        let tmp = tempdir().unwrap();
        let src = write_source(tmp.path(), "d.bin", b"abc");
        let err = split(&src, &opts(0, tmp.path())).unwrap_err();
        assert!(matches!(err, ShardError::Usage(_)));
    }

    #[test]
    fn missing_source_is_io_error() {
        let tmp = tempdir().unwrap();
        let err = split(&tmp.path().join("nope.bin"), &opts(10, tmp.path())).unwrap_err();
        assert!(matches!(err, ShardError::Io(_)));
    }
}
