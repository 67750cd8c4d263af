use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use ftrie_common::{Result, error::Error};

use crate::format::IndexPaths;

/// Buffered writers of the three index files.
pub struct IndexWriters {
    pub postings: BufWriter<File>,
    pub nodes: BufWriter<File>,
    pub offsets: BufWriter<File>,
}

/// Exclusive owner of the output files of one build.
///
/// The files are created (truncated) up front. Unless [`OutputFiles::commit`]
/// succeeds, they are closed and removed when the value is aborted or dropped,
/// so a failed or abandoned build leaves nothing behind.
pub struct OutputFiles {
    paths: IndexPaths,
    writers: Option<IndexWriters>,
    closed: bool,
}

impl OutputFiles {
    const BUFFER_SIZE: usize = 64 * 1024;

    pub fn create(paths: IndexPaths) -> Result<OutputFiles> {
        let mut files = OutputFiles {
            paths,
            writers: None,
            closed: false,
        };
        // Any error below drops `files`, which removes what was created.
        let postings = Self::create_file(&files.paths.postings)?;
        let nodes = Self::create_file(&files.paths.nodes)?;
        let offsets = Self::create_file(&files.paths.offsets)?;
        files.writers = Some(IndexWriters {
            postings,
            nodes,
            offsets,
        });
        Ok(files)
    }

    pub fn paths(&self) -> &IndexPaths {
        &self.paths
    }

    pub fn writers(&mut self) -> Result<&mut IndexWriters> {
        self.writers
            .as_mut()
            .ok_or_else(|| Error::invalid_operation("index output files are closed"))
    }

    /// Flushes and closes all files, keeping them on disk.
    pub fn commit(mut self) -> Result<()> {
        let writers = self
            .writers
            .take()
            .ok_or_else(|| Error::invalid_operation("index output files are closed"))?;
        for (mut writer, path) in [
            (writers.postings, &self.paths.postings),
            (writers.nodes, &self.paths.nodes),
            (writers.offsets, &self.paths.offsets),
        ] {
            writer
                .flush()
                .map_err(|e| Error::io(path.display().to_string(), e))?;
        }
        self.closed = true;
        Ok(())
    }

    /// Closes and removes all files.
    pub fn abort(&mut self) {
        if self.closed {
            return;
        }
        log::warn!(
            "discarding incomplete index files at {}",
            self.paths.nodes.with_extension("*").display()
        );
        // Dropping the writers closes the files; buffered bytes are discarded.
        if let Some(writers) = self.writers.take() {
            for writer in [writers.postings, writers.nodes, writers.offsets] {
                let (_file, _unflushed) = writer.into_parts();
            }
        }
        for path in self.paths.iter() {
            match std::fs::remove_file(path) {
                Ok(()) => log::debug!("removed partial index file {}", path.display()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => log::warn!("failed to remove {}: {e}", path.display()),
            }
        }
        self.closed = true;
    }

    fn create_file(path: &Path) -> Result<BufWriter<File>> {
        let file = File::create(path)
            .map_err(|e| Error::io(format!("create {}", path.display()), e))?;
        Ok(BufWriter::with_capacity(Self::BUFFER_SIZE, file))
    }
}

impl Drop for OutputFiles {
    fn drop(&mut self) {
        self.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_commit_keeps_files() {
        let dir = tempfile::tempdir().unwrap();
        let paths = IndexPaths::from_base(dir.path().join("idx"));
        let mut files = OutputFiles::create(paths.clone()).unwrap();
        files.writers().unwrap().nodes.write_all(b"abc").unwrap();
        files.commit().unwrap();

        assert_eq!(std::fs::read(&paths.nodes).unwrap(), b"abc");
        assert!(paths.postings.exists());
        assert!(paths.offsets.exists());
    }

    #[test]
    fn test_drop_removes_files() {
        let dir = tempfile::tempdir().unwrap();
        let paths = IndexPaths::from_base(dir.path().join("idx"));
        {
            let mut files = OutputFiles::create(paths.clone()).unwrap();
            files.writers().unwrap().postings.write_all(b"x").unwrap();
            assert!(paths.iter().all(Path::exists));
        }
        assert!(!paths.iter().any(Path::exists));
    }

    #[test]
    fn test_abort_closes_writers() {
        let dir = tempfile::tempdir().unwrap();
        let paths = IndexPaths::from_base(dir.path().join("idx"));
        let mut files = OutputFiles::create(paths.clone()).unwrap();
        files.abort();
        assert!(files.writers().is_err());
        assert!(!paths.iter().any(Path::exists));
    }

    #[test]
    fn test_create_failure_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let paths = IndexPaths::from_base(dir.path().join("missing").join("idx"));
        assert!(OutputFiles::create(paths.clone()).is_err());
        assert!(!paths.iter().any(Path::exists));
    }
}
