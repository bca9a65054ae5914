//! Per-session output coalescing.
//!
//! Floods of small output chunks (e.g. `yes`, large compiles) are merged
//! into one write per task-queue turn to amortize parse cost, while a
//! single keystroke echo on an idle session is written through
//! synchronously for latency. Whatever the path, the bytes reaching the
//! sink are exactly the pushed bytes, in push order.

use parking_lot::Mutex;
use settings::constants::batcher::{FLUSH_BUFFER_CAPACITY, IMMEDIATE_WRITE_LIMIT};
use smallvec::SmallVec;
use std::sync::{Arc, Weak};

/// Destination for coalesced output bytes.
///
/// The registry implements this over the terminal emulator; tests use a
/// capturing sink.
pub trait WriteSink: Send {
    fn write(&mut self, bytes: &[u8]);
}

struct BatcherInner {
    pending: SmallVec<[Vec<u8>; 8]>,
    flush_scheduled: bool,
    /// Reused across flushes to avoid reallocating during sustained floods.
    merge_buf: Vec<u8>,
    sink: Box<dyn WriteSink>,
}

impl BatcherInner {
    fn flush(&mut self) {
        self.flush_scheduled = false;
        if self.pending.is_empty() {
            return;
        }
        self.merge_buf.clear();
        for chunk in self.pending.drain(..) {
            self.merge_buf.extend_from_slice(&chunk);
        }
        self.sink.write(&self.merge_buf);
    }
}

/// FIFO coalescing buffer in front of one terminal instance.
///
/// Clones share the same queue and sink.
#[derive(Clone)]
pub struct OutputBatcher {
    inner: Arc<Mutex<BatcherInner>>,
}

impl OutputBatcher {
    pub fn new(sink: Box<dyn WriteSink>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(BatcherInner {
                pending: SmallVec::new(),
                flush_scheduled: false,
                merge_buf: Vec::with_capacity(FLUSH_BUFFER_CAPACITY),
                sink,
            })),
        }
    }

    /// Accept one output chunk.
    ///
    /// Small chunks hitting an idle queue are written straight through;
    /// everything else is queued, and a flush is scheduled on the next
    /// task-queue turn if one is not pending already. Must be called from
    /// within a tokio runtime.
    pub fn push(&self, chunk: Vec<u8>) {
        let mut inner = self.inner.lock();
        if inner.pending.is_empty()
            && !inner.flush_scheduled
            && chunk.len() < IMMEDIATE_WRITE_LIMIT
        {
            inner.sink.write(&chunk);
            return;
        }

        inner.pending.push(chunk);
        if !inner.flush_scheduled {
            inner.flush_scheduled = true;
            let weak: Weak<Mutex<BatcherInner>> = Arc::downgrade(&self.inner);
            tokio::spawn(async move {
                if let Some(inner) = weak.upgrade() {
                    inner.lock().flush();
                }
            });
        }
    }

    /// Write out everything queued, as one merged buffer. No-op when the
    /// queue is empty. A flush on a disposed entry is harmless; the sink
    /// checks disposal itself.
    pub fn flush(&self) {
        self.inner.lock().flush();
    }

    #[cfg(test)]
    fn pending_chunks(&self) -> usize {
        self.inner.lock().pending.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Records each write as a separate entry so tests can assert on
    /// both content and write boundaries.
    #[derive(Clone, Default)]
    struct CaptureSink {
        writes: Arc<Mutex<Vec<Vec<u8>>>>,
    }

    impl WriteSink for CaptureSink {
        fn write(&mut self, bytes: &[u8]) {
            self.writes.lock().push(bytes.to_vec());
        }
    }

    impl CaptureSink {
        fn writes(&self) -> Vec<Vec<u8>> {
            self.writes.lock().clone()
        }

        fn concatenated(&self) -> Vec<u8> {
            self.writes.lock().concat()
        }
    }

    #[tokio::test]
    async fn small_chunk_on_idle_queue_writes_through() {
        let sink = CaptureSink::default();
        let batcher = OutputBatcher::new(Box::new(sink.clone()));

        batcher.push(vec![b'x'; 32]);

        assert_eq!(sink.writes(), vec![vec![b'x'; 32]]);
        assert_eq!(batcher.pending_chunks(), 0);
    }

    #[tokio::test]
    async fn large_chunk_is_deferred_and_flushed_once() {
        let sink = CaptureSink::default();
        let batcher = OutputBatcher::new(Box::new(sink.clone()));

        batcher.push(vec![b'a'; 10_000]);
        assert_eq!(sink.writes().len(), 0, "large chunk must not write inline");
        assert_eq!(batcher.pending_chunks(), 1);

        // Let the scheduled flush task run
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;

        assert_eq!(sink.writes(), vec![vec![b'a'; 10_000]]);
    }

    #[tokio::test]
    async fn burst_is_merged_into_one_write() {
        let sink = CaptureSink::default();
        let batcher = OutputBatcher::new(Box::new(sink.clone()));

        batcher.push(vec![b'a'; 5000]);
        batcher.push(b"bb".to_vec());
        batcher.push(b"ccc".to_vec());

        tokio::task::yield_now().await;
        tokio::task::yield_now().await;

        let writes = sink.writes();
        assert_eq!(writes.len(), 1, "burst should flush as a single write");
        assert_eq!(writes[0].len(), 5005);
    }

    #[tokio::test]
    async fn bytes_survive_any_mix_of_paths_in_order() {
        let sink = CaptureSink::default();
        let batcher = OutputBatcher::new(Box::new(sink.clone()));

        let chunks: Vec<Vec<u8>> = vec![
            b"prompt$ ".to_vec(),
            vec![b'A'; 4096], // exactly at the limit: deferred
            b"tail".to_vec(),
            vec![b'B'; 3],
            vec![b'C'; 9000],
        ];
        let expected: Vec<u8> = chunks.concat();

        for chunk in chunks {
            batcher.push(chunk);
        }
        batcher.flush();
        tokio::task::yield_now().await;

        assert_eq!(sink.concatenated(), expected);
    }

    #[tokio::test]
    async fn explicit_flush_with_nothing_pending_is_a_noop() {
        let sink = CaptureSink::default();
        let batcher = OutputBatcher::new(Box::new(sink.clone()));

        batcher.flush();
        assert_eq!(sink.writes().len(), 0);
    }

    #[tokio::test]
    async fn small_chunk_behind_pending_queue_stays_queued() {
        let sink = CaptureSink::default();
        let batcher = OutputBatcher::new(Box::new(sink.clone()));

        batcher.push(vec![b'a'; 8000]);
        batcher.push(b"k".to_vec()); // must not overtake the queued chunk

        assert_eq!(sink.writes().len(), 0);
        batcher.flush();

        let writes = sink.writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0][writes[0].len() - 1], b'k');
    }
}
