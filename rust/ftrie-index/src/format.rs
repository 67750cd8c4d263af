//! On-disk layout of the trie index files.
//!
//! An index consists of three headerless files sharing a base path `B`:
//!
//! - `B.postings`: per-token posting payloads, back-to-back VInts.
//! - `B.nodes`: trie node records in depth-first preorder, root first.
//! - `B.offsets`: big-endian `i32` start offset of every node record in
//!   `B.nodes`, followed by the total size of `B.nodes`.
//!
//! # Node record
//!
//! ```text
//! u8     key_len
//! u8[L]  key                     // key fragment, empty for the root
//! repeated per child, ordered by first byte:
//!   i32  child_index             // preorder index of the child
//!   u8   first_byte              // first byte of the child's key fragment
//! [i32   ptr_high, i32 ptr_low]  // only for extended data pointers
//! i32    data_size               // number of postings, 0 if none
//! u40    data_ptr                // offset into B.postings
//! ```
//!
//! All integers are big-endian. The child count is not stored; it follows from
//! the record length `offsets[i + 1] - offsets[i]`. A `data_ptr` equal to
//! [`NO_DATA_POINTER`] marks a node without postings. Offsets that do not fit
//! below [`MAX_INLINE_POINTER`] are written as two 32-bit words in front of
//! `data_size`, and `data_ptr` carries [`EXTENDED_POINTER`].
//!
//! # Posting payloads
//!
//! In the interleaved layout a payload is `pre0 pos0 pre1 pos1 ...`; in the
//! split layout it is `pre0 pre1 ... pos0 pos1 ...`. The layout is not
//! recorded in the files.

use std::path::{Path, PathBuf};

/// Size of the key length prefix.
pub const KEY_LEN_SIZE: usize = 1;

/// Size of a child slot: `i32` index plus the first key byte.
pub const CHILD_SLOT_SIZE: usize = 5;

/// Size of the record trailer: `i32` data size plus the `u40` data pointer.
pub const TRAILER_SIZE: usize = 9;

/// Size of the two extra words carried by an extended data pointer.
pub const EXTENDED_POINTER_SIZE: usize = 8;

/// Size of one entry in the offsets file.
pub const OFFSET_ENTRY_SIZE: usize = 4;

/// Width in bytes of the inline data pointer.
pub const DATA_POINTER_WIDTH: usize = 5;

/// Inline data pointer of a node without postings.
pub const NO_DATA_POINTER: u64 = 0xFF_FFFF_FFFF;

/// Inline data pointer announcing an extended (two-word) pointer.
pub const EXTENDED_POINTER: u64 = 0xFF_FFFF_FFFE;

/// Largest posting offset stored inline.
pub const MAX_INLINE_POINTER: u64 = (1 << 39) - 1;

/// Longest key fragment a record can describe.
pub const MAX_KEY_LEN: usize = u8::MAX as usize;

/// Size of the record written for the root of an empty index.
pub const EMPTY_ROOT_RECORD_SIZE: usize = KEY_LEN_SIZE + TRAILER_SIZE;

pub const POSTINGS_EXTENSION: &str = "postings";
pub const NODES_EXTENSION: &str = "nodes";
pub const OFFSETS_EXTENSION: &str = "offsets";

/// Paths of the three files making up one index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexPaths {
    pub postings: PathBuf,
    pub nodes: PathBuf,
    pub offsets: PathBuf,
}

impl IndexPaths {
    /// Derives the file paths by appending the file extensions to `base`.
    ///
    /// The extension is appended rather than substituted, so a base of
    /// `db/text.v1` yields `db/text.v1.nodes`.
    pub fn from_base(base: impl AsRef<Path>) -> IndexPaths {
        let base = base.as_ref();
        let with_ext = |ext: &str| {
            let mut path = base.as_os_str().to_owned();
            path.push(".");
            path.push(ext);
            PathBuf::from(path)
        };
        IndexPaths {
            postings: with_ext(POSTINGS_EXTENSION),
            nodes: with_ext(NODES_EXTENSION),
            offsets: with_ext(OFFSETS_EXTENSION),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Path> {
        [
            self.postings.as_path(),
            self.nodes.as_path(),
            self.offsets.as_path(),
        ]
        .into_iter()
    }
}

/// Number of children of a node record, derived from its length.
///
/// Returns `None` if the length does not match any child count.
pub fn child_count(record_len: usize, key_len: usize, extended: bool) -> Option<usize> {
    let fixed = KEY_LEN_SIZE
        + key_len
        + TRAILER_SIZE
        + if extended { EXTENDED_POINTER_SIZE } else { 0 };
    let slots = record_len.checked_sub(fixed)?;
    (slots % CHILD_SLOT_SIZE == 0).then_some(slots / CHILD_SLOT_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_from_base() {
        let paths = IndexPaths::from_base("db/text.v1");
        assert_eq!(paths.postings, PathBuf::from("db/text.v1.postings"));
        assert_eq!(paths.nodes, PathBuf::from("db/text.v1.nodes"));
        assert_eq!(paths.offsets, PathBuf::from("db/text.v1.offsets"));
        assert_eq!(paths.iter().count(), 3);
    }

    #[test]
    fn test_child_count() {
        assert_eq!(child_count(EMPTY_ROOT_RECORD_SIZE, 0, false), Some(0));
        assert_eq!(child_count(10 + 2 * CHILD_SLOT_SIZE, 0, false), Some(2));
        assert_eq!(child_count(1 + 3 + 5 + 8 + 9, 3, true), Some(1));
        assert_eq!(child_count(12, 0, false), None);
        assert_eq!(child_count(5, 0, false), None);
    }

    #[test]
    fn test_pointer_constants() {
        assert!(MAX_INLINE_POINTER < EXTENDED_POINTER);
        assert!(EXTENDED_POINTER < NO_DATA_POINTER);
        assert_eq!(NO_DATA_POINTER, (1 << (8 * DATA_POINTER_WIDTH)) - 1);
    }
}
