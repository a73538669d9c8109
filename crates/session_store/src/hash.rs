//! Content fingerprints for lines, files and workspace-relative paths.
//!
//! A line hash only covers the first [`LINE_HASH_PREFIX_CHARS`] characters of the
//! trimmed line plus its line number. Edits past the prefix keep the hash stable;
//! edits inside the prefix, or the same text at another position, change it.

use sha2::{Digest, Sha256};

pub const LINE_HASH_PREFIX_CHARS: usize = 40;
pub const LINE_HASH_LEN: usize = 8;
pub const PATH_HASH_LEN: usize = 6;
pub const FILE_HASH_LEN: usize = 16;

#[must_use]
pub fn line_hash(line_content: &str, line_num: usize) -> String {
    let prefix: String = line_content
        .trim()
        .chars()
        .take(LINE_HASH_PREFIX_CHARS)
        .collect();
    truncated_hex(format!("{line_num}:{prefix}").as_bytes(), LINE_HASH_LEN)
}

/// Whole-file fingerprint captured at session start.
#[must_use]
pub fn file_content_hash(content: &str) -> String {
    truncated_hex(content.as_bytes(), FILE_HASH_LEN)
}

pub(crate) fn truncated_hex(bytes: &[u8], len: usize) -> String {
    let mut hex = format!("{:x}", Sha256::digest(bytes));
    hex.truncate(len);
    hex
}
