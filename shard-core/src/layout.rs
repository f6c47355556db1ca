//! Part-file naming and chunk boundary arithmetic.
//!
//! Everything here is pure; the split and join engines both derive part
//! paths and sizes from these functions so the two sides can never disagree.

/// Number of parts a file of `original_size` bytes splits into.
///
/// Zero-byte files produce zero parts.
pub fn part_count(original_size: u64, chunk_size: u64) -> u64 {
    original_size.div_ceil(chunk_size)
}

/// Byte offset of part `index` (1-based) in the original file.
pub fn part_offset(chunk_size: u64, index: u64) -> u64 {
    (index - 1) * chunk_size
}

/// Expected byte length of part `index` (1-based).
///
/// Every part except the last has exactly `chunk_size` bytes; the last has
/// whatever remains, which is always in `(0, chunk_size]`.
pub fn part_size(original_size: u64, chunk_size: u64, index: u64) -> u64 {
    let count = part_count(original_size, chunk_size);
    if index < count {
        chunk_size
    } else {
        original_size - chunk_size * (count - 1)
    }
}

/// File name for part `index` (1-based), e.g. `data.bin.part003`.
///
/// Indices are zero-padded to three digits and widen naturally past 999,
/// so lexical order matches numeric order for the common case.
pub fn part_file_name(base: &str, index: u64) -> String {
    format!("{base}.part{index:03}")
}

/// Conventional sidecar file name, e.g. `data.bin.info`.
pub fn sidecar_file_name(base: &str) -> String {
    format!("{base}.info")
}

/// Conventional parts directory name, e.g. `data.bin_parts`.
pub fn parts_dir_name(base: &str) -> String {
    format!("{base}_parts")
}
