//! Serialization of the trie into the node and offset files.

use std::io::Write;

use byteorder::{BigEndian, WriteBytesExt};
use ftrie_common::{Result, error::Error};

use super::trie::Trie;
use crate::format::{
    DATA_POINTER_WIDTH, EXTENDED_POINTER, MAX_INLINE_POINTER, MAX_KEY_LEN, NO_DATA_POINTER,
};

/// Sizes reported by [`serialize_trie`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerializedTrie {
    /// Number of node records written.
    pub nodes: usize,
    /// Size of the node file in bytes.
    pub nodes_bytes: u64,
    /// Size of the offsets file in bytes.
    pub offsets_bytes: u64,
}

/// Writes every trie node in depth-first preorder to `nodes` and its start
/// offset to `offsets`, followed by the final size of `nodes`.
///
/// Child references are preorder indices, so node `i` of the files is the
/// `i`-th record and the root is record 0.
pub fn serialize_trie<N, O>(
    trie: &Trie,
    arena: &[u8],
    nodes: &mut N,
    offsets: &mut O,
    extended_pointers: bool,
) -> Result<SerializedTrie>
where
    N: Write,
    O: Write,
{
    let order = trie.preorder();
    to_i32("node count", order.len() as u64)?;

    let mut rank = vec![0u32; trie.len()];
    for (index, &id) in order.iter().enumerate() {
        rank[id as usize] = index as u32;
    }

    let mut record = Vec::new();
    let mut children = Vec::new();
    let mut position = 0u64;
    for &id in &order {
        let node = trie.node(id);
        children.clear();
        children.extend(
            node.children()
                .iter()
                .map(|&(first, child)| (first, rank[child as usize])),
        );

        record.clear();
        encode_record(
            &mut record,
            node.key().bytes(arena),
            &children,
            node.data_size(),
            node.data_ptr(),
            extended_pointers,
        )?;

        offsets
            .write_i32::<BigEndian>(to_i32("node offset", position)?)
            .map_err(|e| Error::io("offsets", e))?;
        nodes
            .write_all(&record)
            .map_err(|e| Error::io("nodes", e))?;
        position += record.len() as u64;
    }
    offsets
        .write_i32::<BigEndian>(to_i32("node file size", position)?)
        .map_err(|e| Error::io("offsets", e))?;

    Ok(SerializedTrie {
        nodes: order.len(),
        nodes_bytes: position,
        offsets_bytes: (order.len() as u64 + 1) * 4,
    })
}

/// Appends one node record to `buf`.
///
/// `children` holds `(first byte, preorder index)` pairs in first-byte order.
///
/// # Errors
///
/// Returns `PointerOverflow` if `data_ptr` does not fit the inline field and
/// `extended_pointers` is off, or if a child index or `data_size` exceeds the
/// `i32` range.
pub fn encode_record(
    buf: &mut Vec<u8>,
    key: &[u8],
    children: &[(u8, u32)],
    data_size: u32,
    data_ptr: Option<u64>,
    extended_pointers: bool,
) -> Result<()> {
    debug_assert!(key.len() <= MAX_KEY_LEN);
    buf.push(key.len() as u8);
    buf.extend_from_slice(key);
    for &(first, child) in children {
        buf.write_i32::<BigEndian>(to_i32("child index", child as u64)?)?;
        buf.push(first);
    }

    let inline_ptr = match data_ptr {
        None => NO_DATA_POINTER,
        Some(ptr) if ptr <= MAX_INLINE_POINTER => ptr,
        Some(ptr) if extended_pointers => {
            buf.write_u32::<BigEndian>((ptr >> 32) as u32)?;
            buf.write_u32::<BigEndian>(ptr as u32)?;
            EXTENDED_POINTER
        }
        Some(ptr) => {
            return Err(Error::pointer_overflow(
                "data pointer",
                ptr,
                MAX_INLINE_POINTER,
            ));
        }
    };
    buf.write_i32::<BigEndian>(to_i32("data size", data_size as u64)?)?;
    buf.write_uint::<BigEndian>(inline_ptr, DATA_POINTER_WIDTH)?;
    Ok(())
}

fn to_i32(element: &str, value: u64) -> Result<i32> {
    i32::try_from(value).map_err(|_| Error::pointer_overflow(element, value, i32::MAX as u64))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::EMPTY_ROOT_RECORD_SIZE;
    use crate::write::token_hash::TokenRange;
    use ftrie_common::error::ErrorKind;

    #[test]
    fn test_empty_trie_root_record() {
        let trie = Trie::new();
        let (mut nodes, mut offsets) = (Vec::new(), Vec::new());
        let sizes = serialize_trie(&trie, &[], &mut nodes, &mut offsets, true).unwrap();
        assert_eq!(
            nodes,
            vec![0x00, 0x00, 0x00, 0x00, 0x00, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]
        );
        assert_eq!(nodes.len(), EMPTY_ROOT_RECORD_SIZE);
        assert_eq!(offsets, vec![0, 0, 0, 0, 0, 0, 0, 10]);
        assert_eq!(
            sizes,
            SerializedTrie {
                nodes: 1,
                nodes_bytes: 10,
                offsets_bytes: 8
            }
        );
    }

    #[test]
    fn test_children_use_preorder_indices() {
        // "carbon" then "car": the split node "car" is allocated after the
        // leaf, but must be numbered before it.
        let arena = b"carboncar".to_vec();
        let mut trie = Trie::new();
        trie.insert(&arena, TokenRange { start: 0, len: 6 }, 0, 1)
            .unwrap();
        trie.insert(&arena, TokenRange { start: 6, len: 3 }, 2, 1)
            .unwrap();

        let (mut nodes, mut offsets) = (Vec::new(), Vec::new());
        let sizes = serialize_trie(&trie, &arena, &mut nodes, &mut offsets, true).unwrap();
        assert_eq!(sizes.nodes, 3);

        let mut expected = vec![0x00, 0, 0, 0, 1, b'c', 0, 0, 0, 0];
        expected.extend_from_slice(&[0xFF; 5]);
        expected.extend_from_slice(&[3, b'c', b'a', b'r', 0, 0, 0, 2, b'b']);
        expected.extend_from_slice(&[0, 0, 0, 1, 0, 0, 0, 0, 2]);
        expected.extend_from_slice(&[3, b'b', b'o', b'n', 0, 0, 0, 1, 0, 0, 0, 0, 0]);
        assert_eq!(nodes, expected);

        let offsets: Vec<i32> = offsets
            .chunks_exact(4)
            .map(|c| i32::from_be_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        assert_eq!(offsets, vec![0, 15, 33, 46]);
        assert_eq!(*offsets.last().unwrap() as usize, nodes.len());
    }

    #[test]
    fn test_inline_pointer_limit() {
        let mut buf = Vec::new();
        encode_record(&mut buf, b"x", &[], 1, Some(MAX_INLINE_POINTER), false).unwrap();
        assert_eq!(&buf[buf.len() - 5..], &[0x7F, 0xFF, 0xFF, 0xFF, 0xFF]);
        assert_eq!(buf.len(), 1 + 1 + 9);
    }

    #[test]
    fn test_extended_pointer() {
        let ptr = (MAX_INLINE_POINTER + 1) | 0x1234;
        let mut buf = Vec::new();
        encode_record(&mut buf, b"x", &[(b'y', 2)], 3, Some(ptr), true).unwrap();

        let mut expected = vec![1, b'x', 0, 0, 0, 2, b'y'];
        expected.extend_from_slice(&((ptr >> 32) as u32).to_be_bytes());
        expected.extend_from_slice(&(ptr as u32).to_be_bytes());
        expected.extend_from_slice(&[0, 0, 0, 3]);
        expected.extend_from_slice(&[0xFF, 0xFF, 0xFF, 0xFF, 0xFE]);
        assert_eq!(buf, expected);
        assert_eq!(
            crate::format::child_count(buf.len(), 1, true),
            Some(1)
        );
    }

    #[test]
    fn test_pointer_overflow_without_extension() {
        let mut buf = Vec::new();
        let err = encode_record(&mut buf, b"x", &[], 1, Some(1 << 39), false).unwrap_err();
        assert!(matches!(
            err.kind(),
            ErrorKind::PointerOverflow { value, .. } if *value == 1 << 39
        ));
    }

    #[test]
    fn test_data_size_limit() {
        let mut buf = Vec::new();
        encode_record(&mut buf, b"x", &[], i32::MAX as u32, Some(0), false).unwrap();
        assert_eq!(&buf[2..6], &[0x7F, 0xFF, 0xFF, 0xFF]);

        buf.clear();
        let err = encode_record(&mut buf, b"x", &[], i32::MAX as u32 + 1, Some(0), false)
            .unwrap_err();
        assert!(matches!(
            err.kind(),
            ErrorKind::PointerOverflow { element, .. } if element == "data size"
        ));
    }
}
