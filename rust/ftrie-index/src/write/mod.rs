//! Index construction components.
//!
//! The write side turns text records into the postings, node and offsets
//! files described in [`crate::format`].
//!
//! # Components
//!
//! - [`builder::TrieIndexBuilder`]: drives the build and owns the output files
//! - [`token_hash::TokenHash`]: deduplicates tokens and collects their postings
//! - [`trie::Trie`]: compressed trie assembled from the sorted tokens
//! - [`postings::PostingsWriter`]: appends posting payloads to the postings file
//! - [`nodes`]: preorder serialization of the trie
//!
//! Only the builder is needed for regular use. The other components are public
//! for tooling that inspects intermediate state.

pub mod builder;
pub mod nodes;
mod output;
pub mod postings;
pub mod token_hash;
pub mod trie;
