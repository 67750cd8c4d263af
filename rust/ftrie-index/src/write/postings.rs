use std::io::Write;

use ftrie_common::{Result, error::Error};

use super::token_hash::TokenEntry;

/// Arrangement of the (pre, pos) values inside a token's posting payload.
///
/// The layout is chosen when the builder is created and is not recorded in
/// the index files; readers must be configured with the same layout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PostingsLayout {
    /// `pre0 pos0 pre1 pos1 ...`
    #[default]
    Interleaved,
    /// `pre0 pre1 ... pos0 pos1 ...`
    Split,
}

/// Appends per-token posting payloads to the postings stream.
///
/// The VInt byte runs staged in the token hash are copied verbatim; values
/// are never decoded and re-encoded.
pub struct PostingsWriter<W> {
    out: W,
    layout: PostingsLayout,
    /// Bytes written so far, i.e. the offset of the next payload.
    position: u64,
    buffer: Vec<u8>,
}

impl<W: Write> PostingsWriter<W> {
    pub fn new(out: W, layout: PostingsLayout) -> PostingsWriter<W> {
        PostingsWriter {
            out,
            layout,
            position: 0,
            buffer: Vec::new(),
        }
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn layout(&self) -> PostingsLayout {
        self.layout
    }

    /// Writes the payload of `entry` and returns its offset and posting count.
    pub fn append(&mut self, entry: &TokenEntry) -> Result<(u64, u32)> {
        let offset = self.position;
        let count = entry.occurrences();

        self.buffer.clear();
        match self.layout {
            PostingsLayout::Interleaved => {
                for (pre, pos) in entry.pre().raw_values().zip(entry.pos().raw_values()) {
                    self.buffer.extend_from_slice(pre);
                    self.buffer.extend_from_slice(pos);
                }
            }
            PostingsLayout::Split => {
                self.buffer.extend_from_slice(entry.pre().payload());
                self.buffer.extend_from_slice(entry.pos().payload());
            }
        }

        self.out
            .write_all(&self.buffer)
            .map_err(|e| Error::io("postings", e))?;
        self.position += self.buffer.len() as u64;
        Ok((offset, count))
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::write::token_hash::TokenHash;

    fn staged() -> TokenHash {
        let mut hash = TokenHash::new();
        hash.index(b"a", 1, 0).unwrap();
        hash.index(b"a", 1, 1).unwrap();
        hash.index(b"a", 2, 0).unwrap();
        hash.index(b"b", 300, 7).unwrap();
        hash
    }

    #[test]
    fn test_interleaved_payload() {
        let hash = staged();
        let mut writer = PostingsWriter::new(Vec::new(), PostingsLayout::Interleaved);
        let appended: Vec<_> = hash
            .iter_sorted()
            .map(|entry| writer.append(entry).unwrap())
            .collect();
        assert_eq!(appended, vec![(0, 3), (6, 1)]);
        assert_eq!(writer.position(), 9);
        assert_eq!(
            writer.into_inner(),
            vec![0x01, 0x00, 0x01, 0x01, 0x02, 0x00, 0x82, 0x2C, 0x07]
        );
    }

    #[test]
    fn test_split_payload() {
        let hash = staged();
        let mut writer = PostingsWriter::new(Vec::new(), PostingsLayout::Split);
        for entry in hash.iter_sorted() {
            writer.append(entry).unwrap();
        }
        assert_eq!(writer.layout(), PostingsLayout::Split);
        assert_eq!(
            writer.into_inner(),
            vec![0x01, 0x01, 0x02, 0x00, 0x01, 0x00, 0x82, 0x2C, 0x07]
        );
    }

    #[test]
    fn test_write_failure_is_reported() {
        struct Broken;
        impl Write for Broken {
            fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
                Err(std::io::Error::other("device gone"))
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let hash = staged();
        let mut writer = PostingsWriter::new(Broken, PostingsLayout::default());
        let entry = hash.iter_sorted().next().unwrap();
        let err = writer.append(entry).unwrap_err();
        assert!(matches!(
            err.kind(),
            ftrie_common::error::ErrorKind::Io { .. }
        ));
        assert_eq!(writer.position(), 0);
    }
}
