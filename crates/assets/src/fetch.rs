use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Read};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

/// Bytes read per chunk by [`FsFetcher`].
pub const FETCH_CHUNK_SIZE: usize = 64 * 1024;

/// Source of model bytes.
///
/// `fetch` reports the length of every chunk it receives through
/// `on_chunk`; returning [`ControlFlow::Break`] aborts the transfer with
/// [`io::ErrorKind::Interrupted`].
pub trait Fetcher: Send + Sync {
    /// Size of the resource if it is known before transferring it.
    fn size_hint(&self, path: &Path) -> Option<u64>;

    fn fetch(
        &self,
        path: &Path,
        on_chunk: &mut dyn FnMut(usize) -> ControlFlow<()>,
    ) -> io::Result<Vec<u8>>;
}

fn interrupted() -> io::Error {
    io::Error::new(io::ErrorKind::Interrupted, "transfer aborted")
}

/// Reads from the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsFetcher;

impl Fetcher for FsFetcher {
    fn size_hint(&self, path: &Path) -> Option<u64> {
        std::fs::metadata(path).ok().filter(|m| m.is_file()).map(|m| m.len())
    }

    fn fetch(
        &self,
        path: &Path,
        on_chunk: &mut dyn FnMut(usize) -> ControlFlow<()>,
    ) -> io::Result<Vec<u8>> {
        let mut file = File::open(path)?;
        let mut out = Vec::with_capacity(self.size_hint(path).unwrap_or(0) as usize);
        let mut chunk = vec![0u8; FETCH_CHUNK_SIZE];
        loop {
            let n = match file.read(&mut chunk) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            };
            out.extend_from_slice(&chunk[..n]);
            if on_chunk(n).is_break() {
                return Err(interrupted());
            }
        }
        Ok(out)
    }
}

/// Serves files from memory in fixed-size chunks.
#[derive(Debug, Clone)]
pub struct MemoryFetcher {
    files: HashMap<PathBuf, Vec<u8>>,
    chunk_size: usize,
    report_sizes: bool,
}

impl Default for MemoryFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self {
            files: HashMap::new(),
            chunk_size: FETCH_CHUNK_SIZE,
            report_sizes: true,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Stop answering `size_hint`, like a server that omits content length.
    pub fn without_size_hints(mut self) -> Self {
        self.report_sizes = false;
        self
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>, bytes: impl Into<Vec<u8>>) {
        self.files.insert(path.into(), bytes.into());
    }

    pub fn with_file(mut self, path: impl Into<PathBuf>, bytes: impl Into<Vec<u8>>) -> Self {
        self.insert(path, bytes);
        self
    }
}

impl Fetcher for MemoryFetcher {
    fn size_hint(&self, path: &Path) -> Option<u64> {
        if !self.report_sizes {
            return None;
        }
        self.files.get(path).map(|b| b.len() as u64)
    }

    fn fetch(
        &self,
        path: &Path,
        on_chunk: &mut dyn FnMut(usize) -> ControlFlow<()>,
    ) -> io::Result<Vec<u8>> {
        let bytes = self.files.get(path).ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("{} not found", path.display()))
        })?;
        for chunk in bytes.chunks(self.chunk_size) {
            if on_chunk(chunk.len()).is_break() {
                return Err(interrupted());
            }
        }
        Ok(bytes.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn fs_fetcher_reads_in_chunks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blob.bin");
        let data = vec![7u8; FETCH_CHUNK_SIZE * 2 + 10];
        File::create(&path).unwrap().write_all(&data).unwrap();

        let fetcher = FsFetcher;
        assert_eq!(fetcher.size_hint(&path), Some(data.len() as u64));

        let mut chunks = Vec::new();
        let got = fetcher
            .fetch(&path, &mut |n| {
                chunks.push(n);
                ControlFlow::Continue(())
            })
            .unwrap();
        assert_eq!(got, data);
        assert_eq!(chunks.iter().sum::<usize>(), data.len());
        assert!(chunks.len() >= 3);
    }

    #[test]
    fn fs_fetcher_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.gltf");
        assert_eq!(FsFetcher.size_hint(&path), None);
        let err = FsFetcher
            .fetch(&path, &mut |_| ControlFlow::Continue(()))
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn break_aborts_transfer() {
        let fetcher = MemoryFetcher::new()
            .with_chunk_size(4)
            .with_file("a", vec![0u8; 32]);
        let mut seen = 0;
        let err = fetcher
            .fetch(Path::new("a"), &mut |n| {
                seen += n;
                if seen >= 8 {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            })
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::Interrupted);
        assert_eq!(seen, 8);
    }

    #[test]
    fn size_hints_can_be_withheld() {
        let fetcher = MemoryFetcher::new().with_file("a", vec![1u8; 5]);
        assert_eq!(fetcher.size_hint(Path::new("a")), Some(5));
        let fetcher = fetcher.without_size_hints();
        assert_eq!(fetcher.size_hint(Path::new("a")), None);
    }
}
