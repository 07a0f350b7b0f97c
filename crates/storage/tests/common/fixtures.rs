use bytes::Bytes;
use futures::Stream;
use stash_core::StorageName;
use stash_storage::StorageError;
use std::path::Path;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::task::{Context, Poll};

/// Generate deterministic test data using a seeded pseudo-random generator
/// Same seed produces same output (reproducible tests)
pub fn seeded_bytes(seed: u64, len: usize) -> Bytes {
    let mut data = vec![0u8; len];
    let mut state = seed;

    for chunk in data.chunks_mut(8) {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
        let bytes = state.to_le_bytes();
        for (i, byte) in chunk.iter_mut().enumerate() {
            *byte = bytes[i % 8];
        }
    }

    Bytes::from(data)
}

pub fn name(s: &str) -> StorageName {
    StorageName::parse(s).unwrap()
}

/// File names directly under `dir`, sorted.
pub fn dir_entries(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

/// Chunk source that counts how many chunks were pulled and can fail or
/// stall after a given number of chunks.
pub struct CountingSource {
    chunks: Vec<Bytes>,
    next: usize,
    fail_at: Option<usize>,
    stall_at: Option<usize>,
    pulled: Arc<AtomicUsize>,
}

#[allow(dead_code)]
impl CountingSource {
    pub fn new(chunks: Vec<Bytes>) -> (Self, Arc<AtomicUsize>) {
        let pulled = Arc::new(AtomicUsize::new(0));
        (
            Self {
                chunks,
                next: 0,
                fail_at: None,
                stall_at: None,
                pulled: pulled.clone(),
            },
            pulled,
        )
    }

    /// Yield an error instead of the chunk at `index`.
    pub fn fail_at(mut self, index: usize) -> Self {
        self.fail_at = Some(index);
        self
    }

    /// Stay pending forever once `index` chunks have been yielded.
    pub fn stall_at(mut self, index: usize) -> Self {
        self.stall_at = Some(index);
        self
    }
}

impl Stream for CountingSource {
    type Item = Result<Bytes, StorageError>;

    fn poll_next(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.stall_at == Some(this.next) {
            return Poll::Pending;
        }
        if this.next >= this.chunks.len() {
            return Poll::Ready(None);
        }
        let index = this.next;
        this.next += 1;
        this.pulled.fetch_add(1, Ordering::SeqCst);
        if this.fail_at == Some(index) {
            return Poll::Ready(Some(Err(StorageError::Io(std::io::Error::other(
                "client went away",
            )))));
        }
        Poll::Ready(Some(Ok(this.chunks[index].clone())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_bytes_deterministic() {
        assert_eq!(seeded_bytes(42, 1000), seeded_bytes(42, 1000));
        assert_ne!(seeded_bytes(42, 1000), seeded_bytes(43, 1000));
    }
}
