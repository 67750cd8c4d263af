//! # Trie Index Builder
//!
//! This module provides the driver that turns a sequence of text records into
//! the three files of a full-text trie index.
//!
//! ## Phases
//!
//! 1. **Staging**: every record is tokenized and each token occurrence is
//!    recorded as a `(pre, pos)` pair in the [`TokenHash`], which deduplicates
//!    tokens and accumulates VInt-encoded postings per token.
//! 2. **Assembly**: the hash is visited in lexicographic token order. Each
//!    token's postings are appended to the postings file and the token is
//!    inserted into the [`Trie`] together with the offset and count of its
//!    postings. The postings buffers are released afterwards.
//! 3. **Serialization**: the trie is written in preorder to the node file,
//!    with the record offsets going to the offsets file.
//!
//! The builder is single-use: [`TrieIndexBuilder::finish`] consumes it. If a
//! build fails, is cancelled, or the builder is dropped before finishing, the
//! output files are removed.

use std::{path::Path, time::Instant};

use ftrie_common::{Result, error::Error, verify_arg};

use crate::{
    cancel::CancellationToken,
    format::{IndexPaths, MAX_KEY_LEN},
    tokenizer::{DEFAULT_MAX_TOKEN_LEN, Tokenizer},
    write::{
        nodes::serialize_trie,
        output::OutputFiles,
        postings::{PostingsLayout, PostingsWriter},
        token_hash::TokenHash,
        trie::Trie,
    },
};

/// Configuration parameters for building a trie index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrieIndexBuilderConfig {
    /// Fold ASCII letters to lower case before indexing.
    pub case_fold: bool,

    /// Arrangement of pre and pos values in the postings file.
    pub layout: PostingsLayout,

    /// Tokens longer than this many bytes are skipped. Must be in `1..=255`,
    /// the range a node record can describe.
    pub max_token_len: usize,

    /// Allow posting offsets beyond the 40-bit inline field by switching the
    /// affected nodes to the extended pointer encoding. When disabled, such
    /// offsets fail the build.
    pub extended_pointers: bool,
}

impl Default for TrieIndexBuilderConfig {
    fn default() -> Self {
        TrieIndexBuilderConfig {
            case_fold: false,
            layout: PostingsLayout::Interleaved,
            max_token_len: DEFAULT_MAX_TOKEN_LEN,
            extended_pointers: true,
        }
    }
}

impl TrieIndexBuilderConfig {
    fn validate(&self) -> Result<()> {
        let max_token_len = self.max_token_len;
        verify_arg!(max_token_len, max_token_len >= 1);
        verify_arg!(max_token_len, max_token_len <= MAX_KEY_LEN);
        Ok(())
    }
}

/// Summary of a completed build.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildStats {
    /// Text records fed to the builder.
    pub records: u64,
    /// Token occurrences indexed (overlong tokens excluded).
    pub tokens: u64,
    /// Distinct tokens.
    pub unique_tokens: usize,
    /// Trie nodes written, root included.
    pub nodes: usize,
    pub postings_bytes: u64,
    pub nodes_bytes: u64,
    pub offsets_bytes: u64,
}

/// Builds a full-text trie index from text records.
///
/// ```no_run
/// use ftrie_index::{TrieIndexBuilder, TrieIndexBuilderConfig};
///
/// let config = TrieIndexBuilderConfig {
///     case_fold: true,
///     ..Default::default()
/// };
/// let mut builder = TrieIndexBuilder::new(config, "db/text")?;
/// builder.index_text(1, b"Hello, world")?;
/// builder.index_text(2, b"hello again")?;
/// let stats = builder.finish()?;
/// assert_eq!(stats.unique_tokens, 3);
/// # Ok::<(), ftrie_common::error::Error>(())
/// ```
pub struct TrieIndexBuilder {
    config: TrieIndexBuilderConfig,
    tokenizer: Tokenizer,
    hash: TokenHash,
    files: OutputFiles,
    cancellation: CancellationToken,
    /// Insertions since the cancellation token was last polled.
    unpolled: usize,
    records: u64,
    /// `pre` of the previous record and the position its text ended at.
    last_pre: Option<u32>,
    next_position: u32,
    /// Set once a record failed; the builder then refuses further work.
    failed: bool,
    started: Instant,
}

impl TrieIndexBuilder {
    /// Number of token insertions between two cancellation polls.
    pub const CANCELLATION_POLL_INTERVAL: usize = 1024;

    /// Creates a builder writing to `<base>.postings`, `<base>.nodes` and
    /// `<base>.offsets`. Existing files are truncated.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for an unusable configuration and `Io` if a
    /// file cannot be created.
    pub fn new(config: TrieIndexBuilderConfig, base: impl AsRef<Path>) -> Result<Self> {
        config.validate()?;
        let files = OutputFiles::create(IndexPaths::from_base(base))?;
        log::debug!(
            "trie index build started: {} (case_fold={}, layout={:?})",
            files.paths().nodes.display(),
            config.case_fold,
            config.layout
        );
        Ok(TrieIndexBuilder {
            tokenizer: Tokenizer::new(config.case_fold),
            config,
            hash: TokenHash::new(),
            files,
            cancellation: CancellationToken::new(),
            unpolled: 0,
            records: 0,
            last_pre: None,
            next_position: 0,
            failed: false,
            started: Instant::now(),
        })
    }

    /// Attaches a cancellation token that is polled during the build.
    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    pub fn config(&self) -> &TrieIndexBuilderConfig {
        &self.config
    }

    pub fn paths(&self) -> &IndexPaths {
        self.files.paths()
    }

    /// Number of distinct tokens staged so far.
    pub fn unique_tokens(&self) -> usize {
        self.hash.len()
    }

    /// Tokenizes one text record and stages its tokens under `pre`.
    ///
    /// Positions count tokens within the text of one `pre` value. Consecutive
    /// records with the same `pre` continue the numbering of the previous
    /// one; a different `pre` restarts it at 0. Tokens longer than
    /// `max_token_len` are skipped but still consume a position.
    ///
    /// # Errors
    ///
    /// Returns `Cancelled` if the cancellation token fired; the output files
    /// are removed and the builder cannot be used any further.
    pub fn index_text(&mut self, pre: u32, text: &[u8]) -> Result<()> {
        if self.failed {
            return Err(Error::invalid_operation("index_text on a failed builder"));
        }
        let result = self.stage_record(pre, text);
        if result.is_err() {
            self.failed = true;
            self.files.abort();
        }
        result
    }

    /// Feeds all `records` and finishes the index.
    pub fn build<I, T>(mut self, records: I) -> Result<BuildStats>
    where
        I: IntoIterator<Item = (u32, T)>,
        T: AsRef<[u8]>,
    {
        for (pre, text) in records {
            self.index_text(pre, text.as_ref())?;
        }
        self.finish()
    }

    /// Writes the postings, node and offsets files and closes them.
    ///
    /// # Errors
    ///
    /// `Io` on write failures, `PointerOverflow` if a posting offset does not
    /// fit and extended pointers are disabled, `Cancelled` if the token fired.
    /// The output files are removed on any error.
    pub fn finish(self) -> Result<BuildStats> {
        if self.failed {
            return Err(Error::invalid_operation("finish on a failed builder"));
        }
        let TrieIndexBuilder {
            config,
            hash,
            mut files,
            cancellation,
            records,
            started,
            ..
        } = self;
        cancellation.check()?;

        let tokens = hash.token_count();
        let unique_tokens = hash.len();
        log::debug!(
            "staged {records} records, {tokens} tokens ({unique_tokens} distinct, ~{} bytes) in {:?}",
            hash.memory_usage(),
            started.elapsed()
        );

        let phase = Instant::now();
        let writers = files.writers()?;
        let mut postings = PostingsWriter::new(&mut writers.postings, config.layout);
        let mut trie = Trie::new();
        for (i, entry) in hash.iter_sorted().enumerate() {
            if i % Self::CANCELLATION_POLL_INTERVAL == 0 {
                cancellation.check()?;
            }
            let (data_ptr, data_size) = postings.append(entry)?;
            trie.insert(hash.arena(), entry.key(), data_ptr, data_size)?;
        }
        let postings_bytes = postings.position();
        let arena = hash.into_arena();
        log::debug!(
            "wrote {postings_bytes} postings bytes, assembled {} trie nodes in {:?}",
            trie.len(),
            phase.elapsed()
        );

        let phase = Instant::now();
        cancellation.check()?;
        let serialized = serialize_trie(
            &trie,
            &arena,
            &mut writers.nodes,
            &mut writers.offsets,
            config.extended_pointers,
        )?;
        files.commit()?;
        log::debug!(
            "serialized {} nodes ({} bytes) in {:?}",
            serialized.nodes,
            serialized.nodes_bytes,
            phase.elapsed()
        );

        let stats = BuildStats {
            records,
            tokens,
            unique_tokens,
            nodes: serialized.nodes,
            postings_bytes,
            nodes_bytes: serialized.nodes_bytes,
            offsets_bytes: serialized.offsets_bytes,
        };
        log::info!(
            "trie index built in {:?}: {} records, {} distinct tokens, {} nodes",
            started.elapsed(),
            stats.records,
            stats.unique_tokens,
            stats.nodes
        );
        Ok(stats)
    }

    fn stage_record(&mut self, pre: u32, text: &[u8]) -> Result<()> {
        self.cancellation.check()?;
        self.records += 1;

        if self.last_pre != Some(pre) {
            self.last_pre = Some(pre);
            self.next_position = 0;
        }

        let max_token_len = self.config.max_token_len;
        let mut tokens = self.tokenizer.tokenize_at(text, self.next_position);
        while let Some((token, pos)) = tokens.next_token() {
            if token.len() > max_token_len {
                continue;
            }
            self.hash.index(token, pre, pos)?;
            self.unpolled += 1;
            if self.unpolled >= Self::CANCELLATION_POLL_INTERVAL {
                self.unpolled = 0;
                self.cancellation.check()?;
            }
        }
        self.next_position = tokens.position();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ftrie_common::error::ErrorKind;

    fn base(dir: &tempfile::TempDir) -> std::path::PathBuf {
        dir.path().join("text")
    }

    #[test]
    fn test_config_validation() {
        let dir = tempfile::tempdir().unwrap();
        for max_token_len in [0, 256] {
            let config = TrieIndexBuilderConfig {
                max_token_len,
                ..Default::default()
            };
            let err = TrieIndexBuilder::new(config, base(&dir)).err().unwrap();
            assert!(matches!(err.kind(), ErrorKind::InvalidArgument { .. }));
        }
        // Nothing is created for a rejected configuration.
        assert!(std::fs::read_dir(dir.path()).unwrap().next().is_none());
    }

    #[test]
    fn test_single_token_files() {
        let dir = tempfile::tempdir().unwrap();
        let builder =
            TrieIndexBuilder::new(TrieIndexBuilderConfig::default(), base(&dir)).unwrap();
        let paths = builder.paths().clone();
        let stats = builder.build([(7u32, "hi")]).unwrap();

        assert_eq!(
            stats,
            BuildStats {
                records: 1,
                tokens: 1,
                unique_tokens: 1,
                nodes: 2,
                postings_bytes: 2,
                nodes_bytes: 15 + 12,
                offsets_bytes: 12,
            }
        );
        assert_eq!(std::fs::read(&paths.postings).unwrap(), vec![0x07, 0x00]);

        let mut nodes = vec![0x00, 0, 0, 0, 1, b'h', 0, 0, 0, 0, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF];
        nodes.extend_from_slice(&[2, b'h', b'i', 0, 0, 0, 1, 0, 0, 0, 0, 0]);
        assert_eq!(std::fs::read(&paths.nodes).unwrap(), nodes);
        assert_eq!(
            std::fs::read(&paths.offsets).unwrap(),
            vec![0, 0, 0, 0, 0, 0, 0, 15, 0, 0, 0, 27]
        );
    }

    #[test]
    fn test_overlong_tokens_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let config = TrieIndexBuilderConfig {
            max_token_len: 4,
            ..Default::default()
        };
        let mut builder = TrieIndexBuilder::new(config, base(&dir)).unwrap();
        builder.index_text(1, b"tiny enormous word").unwrap();
        assert_eq!(builder.unique_tokens(), 2);
        let stats = builder.finish().unwrap();
        assert_eq!(stats.tokens, 2);
    }

    #[test]
    fn test_positions_run_across_records_of_one_pre() {
        let dir = tempfile::tempdir().unwrap();
        let config = TrieIndexBuilderConfig {
            max_token_len: 3,
            ..Default::default()
        };
        let mut builder = TrieIndexBuilder::new(config, base(&dir)).unwrap();
        let paths = builder.paths().clone();
        builder.index_text(1, b"a").unwrap();
        // The overlong token still takes position 1.
        builder.index_text(1, b"toolong a").unwrap();
        builder.index_text(2, b"a").unwrap();
        builder.finish().unwrap();

        // "a": pre 1 pos 0, pre 1 pos 2, pre 2 pos 0.
        assert_eq!(
            std::fs::read(&paths.postings).unwrap(),
            vec![0x01, 0x00, 0x01, 0x02, 0x02, 0x00]
        );
    }

    #[test]
    fn test_cancel_before_finish_removes_files() {
        let dir = tempfile::tempdir().unwrap();
        let cancellation = CancellationToken::new();
        let mut builder = TrieIndexBuilder::new(TrieIndexBuilderConfig::default(), base(&dir))
            .unwrap()
            .with_cancellation(cancellation.clone());
        let paths = builder.paths().clone();
        builder.index_text(1, b"some text").unwrap();

        cancellation.cancel();
        let err = builder.index_text(2, b"more text").unwrap_err();
        assert!(err.is_cancelled());
        assert!(!paths.iter().any(Path::exists));

        // The builder is unusable after a failure.
        assert!(builder.index_text(3, b"x").is_err());
        assert!(builder.finish().is_err());
    }

    #[test]
    fn test_cancel_during_finish_removes_files() {
        let dir = tempfile::tempdir().unwrap();
        let cancellation = CancellationToken::new();
        let mut builder = TrieIndexBuilder::new(TrieIndexBuilderConfig::default(), base(&dir))
            .unwrap()
            .with_cancellation(cancellation.clone());
        let paths = builder.paths().clone();
        builder.index_text(1, b"alpha beta").unwrap();
        cancellation.cancel();
        assert!(builder.finish().unwrap_err().is_cancelled());
        assert!(!paths.iter().any(Path::exists));
    }

    #[test]
    fn test_drop_without_finish_removes_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut builder =
            TrieIndexBuilder::new(TrieIndexBuilderConfig::default(), base(&dir)).unwrap();
        let paths = builder.paths().clone();
        builder.index_text(1, b"abandoned").unwrap();
        assert!(paths.iter().all(Path::exists));
        drop(builder);
        assert!(!paths.iter().any(Path::exists));
    }
}
