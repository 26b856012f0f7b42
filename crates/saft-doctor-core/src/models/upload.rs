use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Chunk size used when the backend does not suggest one (5 MiB).
pub const DEFAULT_CHUNK_SIZE: u64 = 5 * 1024 * 1024;

/// Request to start a chunked upload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartUploadRequest {
    /// Original filename
    pub filename: String,
    /// Total file size in bytes
    pub size: u64,
}

/// Response for starting a chunked upload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartUploadResponse {
    /// Upload session ID; missing means the backend refused the session
    #[serde(default)]
    pub upload_id: Option<String>,
    /// Suggested chunk size in bytes
    #[serde(default)]
    pub chunk_size: Option<u64>,
}

/// Request to finish a chunked upload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinishUploadRequest {
    pub upload_id: String,
}

/// Client-side view of a server-assigned upload session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UploadSession {
    pub upload_id: String,
    pub chunk_size: u64,
    pub total_size: u64,
    pub bytes_sent: u64,
    finished: bool,
}

impl UploadSession {
    /// Build a session from the backend's start response. A missing or zero chunk
    /// size falls back to `fallback_chunk_size`.
    pub fn new(
        upload_id: String,
        chunk_size: Option<u64>,
        total_size: u64,
        fallback_chunk_size: u64,
    ) -> Self {
        let chunk_size = match chunk_size {
            Some(size) if size > 0 => size,
            _ => fallback_chunk_size.max(1),
        };
        Self {
            upload_id,
            chunk_size,
            total_size,
            bytes_sent: 0,
            finished: false,
        }
    }

    /// Number of chunk calls needed to transfer the whole file.
    pub fn total_chunks(&self) -> u64 {
        self.total_size.div_ceil(self.chunk_size)
    }

    /// Byte ranges of every chunk, in send order.
    pub fn ranges(&self) -> ChunkRanges {
        chunk_ranges(self.total_size, self.chunk_size)
    }

    /// Record an acknowledged chunk.
    pub fn record_chunk(&mut self, len: u64) {
        self.bytes_sent += len;
    }

    pub fn mark_finished(&mut self) {
        self.finished = true;
    }

    pub fn is_fully_sent(&self) -> bool {
        self.bytes_sent == self.total_size
    }

    /// Complete only when every byte was acknowledged and finish succeeded.
    pub fn is_complete(&self) -> bool {
        self.finished && self.is_fully_sent()
    }

    /// Upload progress percentage (0-100)
    pub fn percent(&self) -> u8 {
        if self.total_size == 0 {
            return 100;
        }
        ((self.bytes_sent as f64 / self.total_size as f64) * 100.0).round() as u8
    }
}

/// Partition `[0, total_size)` into consecutive ranges of at most `chunk_size`
/// bytes. The last range holds the remainder. Ranges are produced on demand.
pub fn chunk_ranges(total_size: u64, chunk_size: u64) -> ChunkRanges {
    ChunkRanges {
        next_start: 0,
        total_size,
        chunk_size: chunk_size.max(1),
    }
}

/// Iterator returned by [`chunk_ranges`].
#[derive(Debug, Clone)]
pub struct ChunkRanges {
    next_start: u64,
    total_size: u64,
    chunk_size: u64,
}

impl Iterator for ChunkRanges {
    type Item = Range<u64>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next_start >= self.total_size {
            return None;
        }
        let start = self.next_start;
        let end = start.saturating_add(self.chunk_size).min(self.total_size);
        self.next_start = end;
        Some(start..end)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.total_size - self.next_start.min(self.total_size))
            .div_ceil(self.chunk_size);
        match usize::try_from(remaining) {
            Ok(n) => (n, Some(n)),
            Err(_) => (usize::MAX, None),
        }
    }
}

/// Progress event emitted after each acknowledged chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UploadProgress {
    /// Chunk index (0-based) that was just acknowledged
    pub index: u64,
    pub total_chunks: u64,
    pub bytes_sent: u64,
    pub total_size: u64,
    pub percent: u8,
}
