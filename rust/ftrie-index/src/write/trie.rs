use ftrie_common::{Result, error::Error, verify_arg};

use super::token_hash::TokenRange;

/// A vertex of the compressed prefix tree.
#[derive(Debug, Clone)]
pub struct TrieNode {
    /// Key fragment, as a range of the token arena. Empty only for the root.
    key: TokenRange,
    /// `(first byte of the child's key, child node id)`, sorted by first byte.
    children: Vec<(u8, u32)>,
    /// Offset of the node's postings, if the node terminates a token.
    data_ptr: Option<u64>,
    /// Number of postings at `data_ptr`.
    data_size: u32,
}

impl TrieNode {
    fn new(key: TokenRange) -> TrieNode {
        TrieNode {
            key,
            children: Vec::new(),
            data_ptr: None,
            data_size: 0,
        }
    }

    fn leaf(key: TokenRange, data_ptr: u64, data_size: u32) -> TrieNode {
        TrieNode {
            data_ptr: Some(data_ptr),
            data_size,
            ..TrieNode::new(key)
        }
    }

    pub fn key(&self) -> TokenRange {
        self.key
    }

    pub fn children(&self) -> &[(u8, u32)] {
        &self.children
    }

    pub fn data_ptr(&self) -> Option<u64> {
        self.data_ptr
    }

    pub fn data_size(&self) -> u32 {
        self.data_size
    }

    fn set_data(&mut self, data_ptr: u64, data_size: u32) -> Result<()> {
        if self.data_ptr.is_some() {
            return Err(Error::invalid_operation(
                "trie node already carries postings (duplicate token)",
            ));
        }
        self.data_ptr = Some(data_ptr);
        self.data_size = data_size;
        Ok(())
    }

    fn add_child(&mut self, first_byte: u8, id: u32) {
        let at = self.children.partition_point(|&(b, _)| b < first_byte);
        debug_assert!(self.children.get(at).is_none_or(|&(b, _)| b != first_byte));
        self.children.insert(at, (first_byte, id));
    }
}

/// Compressed trie over the distinct tokens of an index.
///
/// Nodes live in a flat vector and refer to their children by id; the root
/// is node 0. Key fragments are ranges of the token arena owned by the
/// caller, so splitting a node only adjusts offsets and lengths.
///
/// Tokens are normally inserted in lexicographic order, in which case every
/// insertion either appends a leaf or performs a single split on the path of
/// the previous token. Any insertion order yields the same tree.
pub struct Trie {
    nodes: Vec<TrieNode>,
}

impl Default for Trie {
    fn default() -> Self {
        Self::new()
    }
}

impl Trie {
    pub fn new() -> Trie {
        Trie {
            nodes: vec![TrieNode::new(TokenRange { start: 0, len: 0 })],
        }
    }

    /// Number of nodes, root included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.len() == 1
    }

    pub fn node(&self, id: u32) -> &TrieNode {
        &self.nodes[id as usize]
    }

    pub fn root(&self) -> &TrieNode {
        &self.nodes[0]
    }

    /// Inserts the token at `token` with its postings location.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for an empty token or one outside `arena`,
    /// and `InvalidOperation` if the token already carries postings.
    pub fn insert(
        &mut self,
        arena: &[u8],
        token: TokenRange,
        data_ptr: u64,
        data_size: u32,
    ) -> Result<()> {
        verify_arg!(token, token.len > 0);
        verify_arg!(token, token.start + token.len <= arena.len());
        let mut parent = 0usize;
        let mut rest = token;
        loop {
            let first = arena[rest.start];
            let slot = match self.nodes[parent]
                .children
                .binary_search_by_key(&first, |&(b, _)| b)
            {
                Ok(slot) => slot,
                Err(at) => {
                    let leaf = self.push(TrieNode::leaf(rest, data_ptr, data_size))?;
                    self.nodes[parent].children.insert(at, (first, leaf));
                    return Ok(());
                }
            };

            let child = self.nodes[parent].children[slot].1 as usize;
            let key = self.nodes[child].key;
            let common = common_prefix_len(key.bytes(arena), rest.bytes(arena));

            if common == key.len {
                if common == rest.len {
                    return self.nodes[child].set_data(data_ptr, data_size);
                }
                parent = child;
                rest = rest.suffix(common);
                continue;
            }

            // The token diverges inside the child's fragment: split it.
            let tail = key.suffix(common);
            let mid = self.push(TrieNode::new(key.prefix(common)))?;
            self.nodes[parent].children[slot].1 = mid;
            self.nodes[child].key = tail;
            self.nodes[mid as usize].add_child(arena[tail.start], child as u32);

            if common == rest.len {
                self.nodes[mid as usize].set_data(data_ptr, data_size)?;
            } else {
                let leaf_key = rest.suffix(common);
                let leaf = self.push(TrieNode::leaf(leaf_key, data_ptr, data_size))?;
                self.nodes[mid as usize].add_child(arena[leaf_key.start], leaf);
            }
            return Ok(());
        }
    }

    /// Node ids in depth-first preorder, children visited by first byte.
    pub fn preorder(&self) -> Vec<u32> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![0u32];
        while let Some(id) = stack.pop() {
            order.push(id);
            let children = &self.nodes[id as usize].children;
            stack.extend(children.iter().rev().map(|&(_, child)| child));
        }
        order
    }

    fn push(&mut self, node: TrieNode) -> Result<u32> {
        let id = u32::try_from(self.nodes.len()).map_err(|_| {
            Error::pointer_overflow("trie node id", self.nodes.len() as u64, u32::MAX as u64)
        })?;
        self.nodes.push(node);
        Ok(id)
    }
}

#[inline]
fn common_prefix_len(a: &[u8], b: &[u8]) -> usize {
    a.iter().zip(b).take_while(|(x, y)| x == y).count()
}
