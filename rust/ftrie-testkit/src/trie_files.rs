//! Decoder for built trie indexes.
//!
//! Loads the three index files into memory and exposes the node records,
//! token lookup and posting lists. The decoder checks structural properties
//! as it goes and reports violations as errors, so tests can rely on it to
//! reject malformed output.

use std::path::Path;

use anyhow::{Context, bail, ensure};
use byteorder::{BigEndian, ByteOrder};
use ftrie_index::{
    IndexPaths, PostingsLayout,
    format::{
        CHILD_SLOT_SIZE, DATA_POINTER_WIDTH, EXTENDED_POINTER, KEY_LEN_SIZE, NO_DATA_POINTER,
        OFFSET_ENTRY_SIZE, child_count,
    },
    vint::read_vint,
};

/// One decoded node record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeRecord {
    /// Preorder index of the record.
    pub index: usize,
    pub key: Vec<u8>,
    /// `(first byte, child index)` pairs in file order.
    pub children: Vec<(u8, u32)>,
    pub data_size: u32,
    /// Offset of the postings, `None` for nodes without data.
    pub data_ptr: Option<u64>,
    /// Whether the pointer used the extended encoding.
    pub extended: bool,
}

/// In-memory view of the files of one index.
pub struct TrieFiles {
    postings: Vec<u8>,
    nodes: Vec<u8>,
    offsets: Vec<u32>,
}

impl TrieFiles {
    /// Reads `<base>.postings`, `<base>.nodes` and `<base>.offsets`.
    pub fn open(base: impl AsRef<Path>) -> anyhow::Result<TrieFiles> {
        let paths = IndexPaths::from_base(base);
        let read = |path: &Path| {
            std::fs::read(path).with_context(|| format!("reading {}", path.display()))
        };
        TrieFiles::from_bytes(
            read(&paths.postings)?,
            read(&paths.nodes)?,
            &read(&paths.offsets)?,
        )
    }

    /// Builds the view from raw file contents.
    pub fn from_bytes(
        postings: Vec<u8>,
        nodes: Vec<u8>,
        offsets: &[u8],
    ) -> anyhow::Result<TrieFiles> {
        ensure!(
            offsets.len() % OFFSET_ENTRY_SIZE == 0 && offsets.len() >= 2 * OFFSET_ENTRY_SIZE,
            "offsets file has invalid size {}",
            offsets.len()
        );
        let offsets = offsets
            .chunks_exact(OFFSET_ENTRY_SIZE)
            .map(|entry| {
                let value = BigEndian::read_i32(entry);
                u32::try_from(value).with_context(|| format!("negative offset {value}"))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        ensure!(offsets[0] == 0, "first record starts at {}", offsets[0]);
        ensure!(
            offsets.windows(2).all(|w| w[0] < w[1]),
            "offsets are not strictly increasing"
        );
        let total = *offsets.last().unwrap_or(&0) as usize;
        ensure!(
            total == nodes.len(),
            "final offset {total} does not match node file size {}",
            nodes.len()
        );
        Ok(TrieFiles {
            postings,
            nodes,
            offsets,
        })
    }

    pub fn node_count(&self) -> usize {
        self.offsets.len() - 1
    }

    pub fn offsets(&self) -> &[u32] {
        &self.offsets
    }

    pub fn postings_bytes(&self) -> &[u8] {
        &self.postings
    }

    pub fn nodes_bytes(&self) -> &[u8] {
        &self.nodes
    }

    pub fn root(&self) -> anyhow::Result<NodeRecord> {
        self.node(0)
    }

    /// Decodes the record at preorder `index`.
    pub fn node(&self, index: usize) -> anyhow::Result<NodeRecord> {
        ensure!(index < self.node_count(), "node {index} out of range");
        let start = self.offsets[index] as usize;
        let end = self.offsets[index + 1] as usize;
        let record = &self.nodes[start..end];

        let key_len = record[0] as usize;
        let trailer = record.len().saturating_sub(DATA_POINTER_WIDTH);
        ensure!(
            record.len() >= KEY_LEN_SIZE + key_len + 4 + DATA_POINTER_WIDTH,
            "node {index}: record of {} bytes too short",
            record.len()
        );
        let raw_ptr = BigEndian::read_uint(&record[trailer..], DATA_POINTER_WIDTH);
        let extended = raw_ptr == EXTENDED_POINTER;
        let Some(count) = child_count(record.len(), key_len, extended) else {
            bail!("node {index}: record length {} is inconsistent", record.len());
        };

        let key = record[KEY_LEN_SIZE..KEY_LEN_SIZE + key_len].to_vec();
        let mut at = KEY_LEN_SIZE + key_len;
        let mut children = Vec::with_capacity(count);
        for _ in 0..count {
            let child = BigEndian::read_i32(&record[at..]);
            let child =
                u32::try_from(child).with_context(|| format!("node {index}: child {child}"))?;
            children.push((record[at + 4], child));
            at += CHILD_SLOT_SIZE;
        }

        let data_ptr = if extended {
            let high = BigEndian::read_u32(&record[at..]) as u64;
            let low = BigEndian::read_u32(&record[at + 4..]) as u64;
            at += 8;
            Some((high << 32) | low)
        } else if raw_ptr == NO_DATA_POINTER {
            None
        } else {
            Some(raw_ptr)
        };
        let data_size = BigEndian::read_i32(&record[at..]);
        let data_size =
            u32::try_from(data_size).with_context(|| format!("node {index}: size {data_size}"))?;

        Ok(NodeRecord {
            index,
            key,
            children,
            data_size,
            data_ptr,
            extended,
        })
    }

    /// Finds the node terminating `token`, if the token is indexed.
    pub fn lookup(&self, token: &[u8]) -> anyhow::Result<Option<NodeRecord>> {
        let mut node = self.root()?;
        let mut rest = token;
        while !rest.is_empty() {
            let Some(&(_, child)) = node.children.iter().find(|(b, _)| *b == rest[0]) else {
                return Ok(None);
            };
            node = self.node(child as usize)?;
            let Some(tail) = rest.strip_prefix(node.key.as_slice()) else {
                return Ok(None);
            };
            rest = tail;
        }
        Ok(node.data_ptr.is_some().then_some(node))
    }

    /// Decodes the `(pre, pos)` postings of a node.
    pub fn postings(
        &self,
        node: &NodeRecord,
        layout: PostingsLayout,
    ) -> anyhow::Result<Vec<(u32, u32)>> {
        let Some(ptr) = node.data_ptr else {
            return Ok(Vec::new());
        };
        let count = node.data_size as usize;
        let mut offset = usize::try_from(ptr)?;
        let mut values = Vec::with_capacity(2 * count);
        for _ in 0..2 * count {
            let (value, len) = read_vint(&self.postings, offset)
                .with_context(|| format!("postings of node {} at {offset}", node.index))?;
            values.push(value);
            offset += len;
        }
        let pairs = match layout {
            PostingsLayout::Interleaved => values.chunks_exact(2).map(|p| (p[0], p[1])).collect(),
            PostingsLayout::Split => {
                let (pres, poss) = values.split_at(count);
                pres.iter().copied().zip(poss.iter().copied()).collect()
            }
        };
        Ok(pairs)
    }

    /// Walks the trie depth-first and returns every data-bearing node with its
    /// full token, in visiting order.
    ///
    /// Fails if the walk does not visit the records in file order, if sibling
    /// first bytes are not strictly increasing or do not match the child key,
    /// or if a non-root node has an empty key or neither children nor data.
    pub fn tokens(&self) -> anyhow::Result<Vec<(Vec<u8>, NodeRecord)>> {
        let mut result = Vec::new();
        let mut stack = vec![(0usize, Vec::new())];
        let mut expected = 0usize;
        while let Some((index, prefix)) = stack.pop() {
            ensure!(index == expected, "visited node {index}, expected {expected}");
            expected += 1;

            let node = self.node(index)?;
            if index != 0 {
                ensure!(!node.key.is_empty(), "node {index} has an empty key");
                ensure!(
                    !node.children.is_empty() || node.data_size > 0,
                    "node {index} is empty"
                );
            }
            ensure!(
                node.children.windows(2).all(|w| w[0].0 < w[1].0),
                "children of node {index} are not ordered"
            );

            let mut token = prefix;
            token.extend_from_slice(&node.key);
            for &(first, child) in node.children.iter().rev() {
                let key = self.node(child as usize)?.key;
                ensure!(
                    key.first() == Some(&first),
                    "node {index}: slot byte {first:#04x} does not match child {child}"
                );
                stack.push((child as usize, token.clone()));
            }
            if node.data_ptr.is_some() {
                result.push((token, node));
            }
        }
        ensure!(
            expected == self.node_count(),
            "walk reached {expected} of {} nodes",
            self.node_count()
        );
        Ok(result)
    }
}
