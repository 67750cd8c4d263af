//! Full-text trie index builder.
//!
//! This crate builds a full-text index over a collection of text records. Each
//! record is identified by a `pre` value and split into tokens; the index maps
//! every distinct token to the list of `(pre, pos)` places it occurs at.
//!
//! # Overview
//!
//! The index is stored in three files sharing a base path `B`:
//!
//! 1. **`B.postings`**: the VInt-encoded `(pre, pos)` lists of all tokens.
//! 2. **`B.nodes`**: a compressed trie over the tokens, one record per node in
//!    depth-first preorder. Nodes that terminate a token point into
//!    `B.postings`.
//! 3. **`B.offsets`**: the start offset of every node record.
//!
//! A reader finds a token by walking the trie from record 0, looking up child
//! indices through the offsets file. See [`format`] for the byte layout.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use ftrie_index::{TrieIndexBuilder, TrieIndexBuilderConfig};
//!
//! let records = [(1, "The quick brown fox"), (2, "jumps over the lazy dog")];
//! let config = TrieIndexBuilderConfig {
//!     case_fold: true,
//!     ..Default::default()
//! };
//! let stats = TrieIndexBuilder::new(config, "db/text")?.build(records)?;
//! println!("{} distinct tokens in {} nodes", stats.unique_tokens, stats.nodes);
//! # Ok::<(), ftrie_common::error::Error>(())
//! ```

pub mod cancel;
pub mod format;
pub mod tokenizer;
pub mod vint;
pub mod write;

pub use cancel::CancellationToken;
pub use format::IndexPaths;
pub use tokenizer::Tokenizer;
pub use write::{
    builder::{BuildStats, TrieIndexBuilder, TrieIndexBuilderConfig},
    postings::PostingsLayout,
};
