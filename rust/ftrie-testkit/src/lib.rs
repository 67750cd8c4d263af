//! Test utilities for the ftrie crates.
//!
//! This crate provides:
//! - A decoder for the postings, node and offsets files of a built index
//! - Synthetic corpus generation with a reference model of the expected postings
//! - Scratch directory helpers
//!
//! # Usage
//!
//! This crate is intended for the test suites of the ftrie workspace only.

pub mod data_gen;
pub mod trie_files;

pub use trie_files::{NodeRecord, TrieFiles};

/// Creates a scratch directory and returns it together with an index base
/// path inside it.
pub fn temp_index_base(name: &str) -> anyhow::Result<(tempfile::TempDir, std::path::PathBuf)> {
    let dir = tempfile::Builder::new().prefix("ftrie-").tempdir()?;
    let base = dir.path().join(name);
    Ok((dir, base))
}
