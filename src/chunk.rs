//! Chunked transfer of series data larger than one message may carry.
//!
//! The sender splits the raw bytes into consecutive ranges of at most the
//! chunk ceiling ([`ChunkPlan`]). Every physical message carries the same
//! figure/series ids plus a [`ChunkInfo`]. The receiver ([`ChunkAssembler`])
//! applies the logical write only once all chunks arrived in order.
//!
//! # Example
//!
//! ```
//! use spectra_client::chunk::{ChunkPlan, CHUNK_SIZE};
//!
//! let plan = ChunkPlan::new(300_000_000, CHUNK_SIZE, 4).unwrap();
//! let indices: Vec<u32> = plan.chunks().map(|c| c.info.index).collect();
//! assert_eq!(indices, vec![0, 1, 2]);
//! ```

use std::collections::HashMap;
use std::ops::Range;

use tracing::{debug, warn};

use crate::codec::messages::{ChunkInfo, DataMessage};
use crate::error::{Result, SpectraError};

/// Largest raw byte range sent in one message (128 MiB).
pub const CHUNK_SIZE: usize = 128 * 1024 * 1024;

/// How one logical transfer splits into messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPlan {
    total_bytes: usize,
    chunk_bytes: usize,
    elem_size: usize,
    chunk_count: u32,
    total_count: u32,
}

/// One planned message: its chunk tags and the byte range it carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedChunk {
    pub info: ChunkInfo,
    pub range: Range<usize>,
}

impl PlannedChunk {
    /// Elements carried by this chunk.
    pub fn element_count(&self, elem_size: usize) -> u32 {
        (self.range.len() / elem_size) as u32
    }
}

impl ChunkPlan {
    /// Plan `total_bytes` in ranges of at most `ceiling` bytes.
    ///
    /// The ceiling is rounded down to a whole number of elements so no
    /// element straddles two chunks.
    pub fn new(total_bytes: usize, ceiling: usize, elem_size: usize) -> Result<Self> {
        if elem_size == 0 || ceiling < elem_size {
            return Err(SpectraError::Protocol(format!(
                "Chunk ceiling {} cannot hold an element of {} bytes",
                ceiling, elem_size
            )));
        }
        let chunk_bytes = ceiling - ceiling % elem_size;
        let chunk_count = total_bytes.div_ceil(chunk_bytes);
        let too_large = || {
            SpectraError::Protocol(format!(
                "Transfer of {} bytes exceeds chunk protocol limits",
                total_bytes
            ))
        };
        Ok(Self {
            total_bytes,
            chunk_bytes,
            elem_size,
            chunk_count: u32::try_from(chunk_count).map_err(|_| too_large())?,
            total_count: u32::try_from(total_bytes / elem_size).map_err(|_| too_large())?,
        })
    }

    /// True if `total_bytes` must go out in chunks.
    #[inline]
    pub fn needs_chunking(total_bytes: usize, ceiling: usize) -> bool {
        total_bytes > ceiling
    }

    #[inline]
    pub fn chunk_count(&self) -> u32 {
        self.chunk_count
    }

    /// Elements across all chunks.
    #[inline]
    pub fn total_count(&self) -> u32 {
        self.total_count
    }

    #[inline]
    pub fn elem_size(&self) -> usize {
        self.elem_size
    }

    /// Chunks in send order.
    pub fn chunks(&self) -> impl Iterator<Item = PlannedChunk> + '_ {
        (0..self.chunk_count).map(move |index| {
            let start = index as usize * self.chunk_bytes;
            let end = (start + self.chunk_bytes).min(self.total_bytes);
            PlannedChunk {
                info: ChunkInfo {
                    index,
                    count: self.chunk_count,
                    total_count: self.total_count,
                },
                range: start..end,
            }
        })
    }
}

/// A completed logical write.
#[derive(Debug, Clone, PartialEq)]
pub struct AssembledData {
    pub figure_id: u64,
    pub series_index: u32,
    pub values: Vec<f32>,
}

#[derive(Debug)]
struct PendingTransfer {
    chunk_count: u32,
    total_count: u32,
    next_index: u32,
    values: Vec<f32>,
}

/// Receiver-side reassembly, one pending transfer per figure/series.
///
/// Chunks must arrive in order starting at 0. A duplicate, a gap, an index
/// outside `0..chunk_count`, or a `chunk_count`/`total_count` differing
/// from the first chunk is rejected with a protocol error and the pending
/// transfer is discarded. A finished transfer whose element count differs
/// from `total_count` is rejected the same way.
#[derive(Debug, Default)]
pub struct ChunkAssembler {
    pending: HashMap<(u64, u32), PendingTransfer>,
}

impl ChunkAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Transfers started but not finished.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Feed one decoded data message. Returns the logical write once complete.
    ///
    /// A message without chunk tags is a complete write by itself; it also
    /// aborts any transfer pending for the same series.
    pub fn accept(&mut self, msg: DataMessage) -> Result<Option<AssembledData>> {
        let key = (msg.figure_id, msg.series_index);
        let Some(chunk) = msg.chunk else {
            if self.pending.remove(&key).is_some() {
                return Err(reject(key, "plain write interrupted a chunked transfer"));
            }
            return Ok(Some(AssembledData {
                figure_id: msg.figure_id,
                series_index: msg.series_index,
                values: msg.values,
            }));
        };

        if chunk.count == 0 || chunk.index >= chunk.count {
            self.pending.remove(&key);
            return Err(reject(
                key,
                &format!("chunk index {} outside 0..{}", chunk.index, chunk.count),
            ));
        }

        if !self.pending.contains_key(&key) {
            if chunk.index != 0 {
                return Err(reject(
                    key,
                    &format!("chunk {} arrived before chunk 0", chunk.index),
                ));
            }
            debug!(
                figure_id = key.0,
                series_index = key.1,
                chunks = chunk.count,
                total = chunk.total_count,
                "chunked transfer started"
            );
        }
        let pending = self.pending.entry(key).or_insert_with(|| PendingTransfer {
            chunk_count: chunk.count,
            total_count: chunk.total_count,
            next_index: 0,
            values: Vec::new(),
        });

        let violation = if pending.chunk_count != chunk.count {
            Some(format!(
                "chunk_count changed from {} to {}",
                pending.chunk_count, chunk.count
            ))
        } else if pending.total_count != chunk.total_count {
            Some(format!(
                "total_count changed from {} to {}",
                pending.total_count, chunk.total_count
            ))
        } else if chunk.index < pending.next_index {
            Some(format!("duplicate chunk {}", chunk.index))
        } else if chunk.index > pending.next_index {
            Some(format!(
                "expected chunk {}, got {}",
                pending.next_index, chunk.index
            ))
        } else if pending.values.len() + msg.values.len() > pending.total_count as usize {
            Some(format!(
                "chunks carry more than total_count {} elements",
                pending.total_count
            ))
        } else {
            None
        };
        if let Some(reason) = violation {
            self.pending.remove(&key);
            return Err(reject(key, &reason));
        }

        pending.values.extend_from_slice(&msg.values);
        pending.next_index += 1;
        if pending.next_index < pending.chunk_count {
            return Ok(None);
        }

        let Some(done) = self.pending.remove(&key) else {
            return Ok(None);
        };
        if done.values.len() != done.total_count as usize {
            return Err(reject(
                key,
                &format!(
                    "received {} elements, total_count is {}",
                    done.values.len(),
                    done.total_count
                ),
            ));
        }
        Ok(Some(AssembledData {
            figure_id: key.0,
            series_index: key.1,
            values: done.values,
        }))
    }
}

fn reject(key: (u64, u32), reason: &str) -> SpectraError {
    warn!(
        figure_id = key.0,
        series_index = key.1,
        reason,
        "chunked transfer rejected"
    );
    SpectraError::Protocol(format!(
        "Chunked transfer for figure {} series {} rejected: {}",
        key.0, key.1, reason
    ))
}
