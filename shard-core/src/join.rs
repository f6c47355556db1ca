//! Join engine: manifest validation up front, then sequential or pooled
//! positioned writes, then optional digest verification.

use crate::DEFAULT_BUFFER_SIZE;
use crate::error::{Result, ShardError};
use crate::hash::hash_file;
use crate::sidecar::{Sidecar, find_sidecar};
use rayon::prelude::*;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Clone, Debug)]
pub struct JoinOptions {
    /// Output path override; defaults to the sidecar's original name in the
    /// current working directory.
    pub output: Option<PathBuf>,
    /// Worker threads; 0 or 1 selects the sequential baseline path.
    pub threads: usize,
    /// Copy buffer size; throughput knob only, must be > 0.
    pub buffer_size: usize,
    /// When false, skip digest verification even if the sidecar records one.
    pub verify: bool,
}

impl Default for JoinOptions {
    fn default() -> Self {
        Self {
            output: None,
            threads: 0,
            buffer_size: DEFAULT_BUFFER_SIZE,
            verify: true,
        }
    }
}

/// Reassemble the part set in `parts_dir` into the original file.
///
/// Returns the path of the reconstructed file. The full manifest is
/// validated before any output byte is written; on a multi-threaded join
/// the first worker failure aborts the operation and the output may be left
/// partially written.
pub fn join(parts_dir: &Path, opts: &JoinOptions) -> Result<PathBuf> {
    if opts.buffer_size == 0 {
        return Err(ShardError::Usage("buffer size must be > 0".into()));
    }

    let sidecar = Sidecar::load(&find_sidecar(parts_dir)?)?;
    validate_manifest(parts_dir, &sidecar)?;

    let out_path = opts
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(&sidecar.original_name));

    info!(
        dir = %parts_dir.display(),
        parts = sidecar.part_count,
        size = sidecar.original_size,
        threads = opts.threads,
        out = %out_path.display(),
        "joining"
    );

    if sidecar.part_count == 0 {
        File::create(&out_path)?;
    } else if opts.threads <= 1 {
        join_sequential(parts_dir, &sidecar, &out_path, opts.buffer_size)?;
    } else {
        join_parallel(parts_dir, &sidecar, &out_path, opts)?;
    }

    if opts.verify
        && let Some(recorded) = &sidecar.digest
    {
        let actual = hash_file(&out_path, recorded.algorithm, opts.buffer_size)?;
        if actual != recorded.value {
            return Err(ShardError::Integrity(format!(
                "{} mismatch: expected {}, got {}",
                recorded.algorithm,
                hex::encode(&recorded.value),
                hex::encode(&actual)
            )));
        }
        debug!(algorithm = %recorded.algorithm, "digest verified");
    }

    info!(out = %out_path.display(), "join complete");
    Ok(out_path)
}

/// Check every expected part exists with exactly its expected size, and
/// that no stray part files sit beyond the declared count. Runs before any
/// output byte is written.
fn validate_manifest(parts_dir: &Path, sidecar: &Sidecar) -> Result<()> {
    for index in 1..=sidecar.part_count {
        let path = parts_dir.join(sidecar.part_file_name(index));
        let md = std::fs::metadata(&path).map_err(|_| {
            ShardError::Corruption(format!("part {index} missing: {}", path.display()))
        })?;
        let expect = sidecar.part_size(index);
        if md.len() != expect {
            return Err(ShardError::Corruption(format!(
                "part {index} has {} bytes, expected {expect}",
                md.len()
            )));
        }
    }

    let prefix = format!("{}.part", sidecar.original_name);
    for entry in std::fs::read_dir(parts_dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(suffix) = name.to_string_lossy().strip_prefix(&prefix).map(str::to_owned) else {
            continue;
        };
        match suffix.parse::<u64>() {
            Ok(index) if index >= 1 && index <= sidecar.part_count => {}
            _ => {
                return Err(ShardError::Corruption(format!(
                    "unexpected part file {:?} (manifest declares {} parts)",
                    name, sidecar.part_count
                )));
            }
        }
    }
    Ok(())
}

/// Baseline path: parts appended strictly in ascending index order.
fn join_sequential(
    parts_dir: &Path,
    sidecar: &Sidecar,
    out_path: &Path,
    buffer_size: usize,
) -> Result<()> {
    let mut out = File::create(out_path)?;
    let mut buf = vec![0u8; buffer_size];
    for index in 1..=sidecar.part_count {
        let part_path = parts_dir.join(sidecar.part_file_name(index));
        let mut part = File::open(&part_path)?;
        copy_buffered(&mut part, &mut out, &mut buf)?;
        debug!(part = index, "part appended");
    }
    Ok(())
}

/// Pooled path: the output is pre-sized so every worker can write its part
/// at `(index - 1) * chunk_size` through its own handle. Offset ranges are
/// disjoint, so no locking of output data is needed; `try_for_each` waits
/// for all workers and surfaces the first failure.
fn join_parallel(
    parts_dir: &Path,
    sidecar: &Sidecar,
    out_path: &Path,
    opts: &JoinOptions,
) -> Result<()> {
    let out = File::create(out_path)?;
    out.set_len(sidecar.original_size)?;
    drop(out);

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(opts.threads)
        .build()
        .map_err(|e| ShardError::Io(io::Error::new(io::ErrorKind::Other, e)))?;

    pool.install(|| {
        (1..=sidecar.part_count)
            .into_par_iter()
            .try_for_each(|index| -> Result<()> {
                let part_path = parts_dir.join(sidecar.part_file_name(index));
                let mut part = File::open(&part_path)?;
                let mut out = OpenOptions::new().write(true).open(out_path)?;
                out.seek(SeekFrom::Start(sidecar.part_offset(index)))?;
                let mut buf = vec![0u8; opts.buffer_size];
                copy_buffered(&mut part, &mut out, &mut buf)?;
                debug!(part = index, "part written");
                Ok(())
            })
    })
}

fn copy_buffered(src: &mut impl Read, dst: &mut impl Write, buf: &mut [u8]) -> Result<()> {
    loop {
        let n = src.read(buf)?;
        if n == 0 {
            return Ok(());
        }
        dst.write_all(&buf[..n])?;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::HashAlgorithm;
    use crate::split::{SplitOptions, split};
    use std::fs;
    use tempfile::tempdir;

    fn split_fixture(data: &[u8], chunk: u64, hash: Option<HashAlgorithm>) -> (tempfile::TempDir, PathBuf) {
        let tmp = tempdir().unwrap();
        let src = tmp.path().join("data.bin");
        fs::write(&src, data).unwrap();
        let parts = tmp.path().join("parts");
        let mut o = SplitOptions::new(chunk);
        o.out_dir = Some(parts.clone());
        o.hash = hash;
        split(&src, &o).unwrap();
        (tmp, parts)
    }

    fn join_to(parts: &Path, out: PathBuf, threads: usize) -> Result<PathBuf> {
        let opts = JoinOptions {
            output: Some(out),
            threads,
            ..Default::default()
        };
        join(parts, &opts)
    }

    #[test]
    fn missing_part_is_corruption() {
        let data = vec![1u8; 1000];
        let (tmp, parts) = split_fixture(&data, 300, None);
        fs::remove_file(parts.join("data.bin.part002")).unwrap();

        let err = join_to(&parts, tmp.path().join("out.bin"), 0).unwrap_err();
        match err {
            ShardError::Corruption(msg) => assert!(msg.contains("part 2"), "{msg}"),
            other => panic!("expected Corruption, got {other:?}"),
        }
        assert!(!tmp.path().join("out.bin").exists());
    }

    #[test]
    fn truncated_part_is_corruption() {
        let data = vec![2u8; 1000];
        let (tmp, parts) = split_fixture(&data, 300, None);
        let victim = parts.join("data.bin.part003");
        let bytes = fs::read(&victim).unwrap();
        fs::write(&victim, &bytes[..bytes.len() - 1]).unwrap();

        let err = join_to(&parts, tmp.path().join("out.bin"), 0).unwrap_err();
        assert!(matches!(err, ShardError::Corruption(_)));
        assert!(!tmp.path().join("out.bin").exists());
    }

    #[test]
    fn extra_part_is_corruption() {
        let data = vec![3u8; 1000];
        let (tmp, parts) = split_fixture(&data, 300, None);
        fs::write(parts.join("data.bin.part005"), b"stray").unwrap();

        let err = join_to(&parts, tmp.path().join("out.bin"), 0).unwrap_err();
        assert!(matches!(err, ShardError::Corruption(_)));
    }

    #[test]
    fn flipped_byte_fails_verification() {
        let data: Vec<u8> = (0u32..5000).map(|i| (i % 255) as u8).collect();
        let (tmp, parts) = split_fixture(&data, 1024, Some(HashAlgorithm::Sha256));

        let victim = parts.join("data.bin.part002");
        let mut bytes = fs::read(&victim).unwrap();
        bytes[10] ^= 0xFF; // same size, different content
        fs::write(&victim, &bytes).unwrap();

        let err = join_to(&parts, tmp.path().join("out.bin"), 0).unwrap_err();
        assert!(matches!(err, ShardError::Integrity(_)));
        // output is kept for the caller to inspect
        assert!(tmp.path().join("out.bin").exists());
    }

    #[test]
    fn flipped_byte_without_hash_silently_produces_wrong_file() {
        let data: Vec<u8> = (0u32..5000).map(|i| (i % 255) as u8).collect();
        let (tmp, parts) = split_fixture(&data, 1024, None);

        let victim = parts.join("data.bin.part002");
        let mut bytes = fs::read(&victim).unwrap();
        bytes[10] ^= 0xFF;
        fs::write(&victim, &bytes).unwrap();

        let out = join_to(&parts, tmp.path().join("out.bin"), 0).unwrap();
        assert_ne!(fs::read(out).unwrap(), data);
    }

    #[test]
    fn verification_can_be_disabled() {
        let data = vec![9u8; 2000];
        let (tmp, parts) = split_fixture(&data, 512, Some(HashAlgorithm::Blake3));

        let victim = parts.join("data.bin.part001");
        let mut bytes = fs::read(&victim).unwrap();
        bytes[0] ^= 1;
        fs::write(&victim, &bytes).unwrap();

        let opts = JoinOptions {
            output: Some(tmp.path().join("out.bin")),
            verify: false,
            ..Default::default()
        };
        join(&parts, &opts).unwrap();
    }

    #[test]
    fn empty_part_set_reconstructs_empty_file() {
        let (tmp, parts) = split_fixture(b"", 1024, Some(HashAlgorithm::Sha256));
        let out = join_to(&parts, tmp.path().join("out.bin"), 4).unwrap();
        assert_eq!(fs::metadata(out).unwrap().len(), 0);
    }

    #[test]
    fn parallel_failure_surfaces() {
        let data = vec![5u8; 10_000];
        let (tmp, parts) = split_fixture(&data, 1000, None);
        // corrupt after validation would be needed to fail a worker, so
        // instead point the output at a directory to force a create error
        let opts = JoinOptions {
            output: Some(tmp.path().to_path_buf()),
            threads: 4,
            ..Default::default()
        };
        assert!(matches!(join(&parts, &opts), Err(ShardError::Io(_))));
    }

    #[test]
    fn zero_buffer_size_is_usage_error() {
        let (tmp, parts) = split_fixture(b"abc", 2, None);
        let opts = JoinOptions {
            output: Some(tmp.path().join("out.bin")),
            buffer_size: 0,
            ..Default::default()
        };
        assert!(matches!(join(&parts, &opts), Err(ShardError::Usage(_))));
    }
}
