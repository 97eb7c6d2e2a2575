//! Byte-range mapping onto block operations.
//!
//! An arbitrary `[offset, offset + size)` request becomes a head span that
//! may start mid-block, whole-block body spans, and a tail span for the
//! remainder. Head and tail are merged through a scratch buffer so bytes
//! adjacent to the request are never touched; body spans move data directly.

use crate::bus::SpiBusOps;
use crate::constants::BLOCK_SIZE;
use crate::host::{SdHost, SdHostError, SdHostResult, SdIoError};

/// One mapper invocation: where the bytes come from or go to.
///
/// Erase is a write whose source is a constant `0xFF` fill.
pub(crate) enum RangeOp<'a> {
    Read(&'a mut [u8]),
    Write(&'a [u8]),
    Erase(u64),
}

impl RangeOp<'_> {
    fn len(&self) -> u64 {
        match self {
            RangeOp::Read(dest) => dest.len() as u64,
            RangeOp::Write(src) => src.len() as u64,
            RangeOp::Erase(size) => *size,
        }
    }
}

/// The portion of one block covered by a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Span {
    pub block: u64,
    /// Offset within the block.
    pub start: usize,
    pub len: usize,
    /// Whether the block must be read-modify-merged rather than moved
    /// directly.
    pub merge: bool,
}

/// Splits a request into spans: a merged head (even when it covers the whole
/// first block), direct body blocks while more than one block remains, and a
/// merged tail for the rest.
pub(crate) struct BlockSpans {
    block: u64,
    skew: u64,
    remaining: u64,
    block_size: u64,
    first: bool,
}

impl BlockSpans {
    pub(crate) fn new(offset: u64, size: u64, block_size: u64) -> Self {
        BlockSpans {
            block: offset / block_size,
            skew: offset % block_size,
            remaining: size,
            block_size,
            first: true,
        }
    }
}

impl Iterator for BlockSpans {
    type Item = Span;

    fn next(&mut self) -> Option<Span> {
        if self.remaining == 0 {
            return None;
        }

        let span = if self.first {
            let len = self.remaining.min(self.block_size - self.skew);
            Span {
                block: self.block,
                start: self.skew as usize,
                len: len as usize,
                merge: true,
            }
        } else if self.remaining > self.block_size {
            Span {
                block: self.block,
                start: 0,
                len: self.block_size as usize,
                merge: false,
            }
        } else {
            Span {
                block: self.block,
                start: 0,
                len: self.remaining as usize,
                merge: true,
            }
        };

        self.first = false;
        self.block += 1;
        self.remaining -= span.len as u64;
        Some(span)
    }
}

impl<T: SpiBusOps> SdHost<T> {
    /// Run one byte-range request, reporting bytes moved before any fault.
    ///
    /// Validation happens before any bus traffic; a zero-length request is a
    /// no-op. Block failures abort immediately with the partial count; there
    /// is no retry and no rollback of completed blocks.
    pub(crate) fn apply_range(&mut self, offset: u64, mut op: RangeOp<'_>) -> Result<u64, SdIoError> {
        if !self.card.is_initialized() {
            return Err(SdIoError::rejected(SdHostError::NotInitialized));
        }

        let size = op.len();
        let end = offset
            .checked_add(size)
            .ok_or(SdIoError::rejected(SdHostError::OutOfBounds))?;
        if end > self.card.capacity_bytes() {
            return Err(SdIoError::rejected(SdHostError::OutOfBounds));
        }
        if size == 0 {
            return Ok(0);
        }

        let mut scratch = [0u8; BLOCK_SIZE];
        let mut transferred: u64 = 0;
        for span in BlockSpans::new(offset, size, BLOCK_SIZE as u64) {
            if let Err(cause) = self.apply_span(&span, &mut op, transferred, &mut scratch) {
                return Err(SdIoError { transferred, cause });
            }
            transferred += span.len as u64;
        }
        Ok(transferred)
    }

    // Apply one per-block operation: copy-out, copy-in or fill. `cursor` is
    // the caller-buffer position reached so far.
    fn apply_span(
        &mut self,
        span: &Span,
        op: &mut RangeOp<'_>,
        cursor: u64,
        scratch: &mut [u8; BLOCK_SIZE],
    ) -> SdHostResult {
        let cursor = cursor as usize;
        match op {
            RangeOp::Read(dest) => {
                let chunk = &mut dest[cursor..cursor + span.len];
                if span.merge {
                    self.read_blocks(span.block, scratch)?;
                    chunk.copy_from_slice(&scratch[span.start..span.start + span.len]);
                } else {
                    self.read_blocks(span.block, chunk)?;
                }
            }
            RangeOp::Write(src) => {
                let chunk = &src[cursor..cursor + span.len];
                if span.merge {
                    self.read_blocks(span.block, scratch)?;
                    scratch[span.start..span.start + span.len].copy_from_slice(chunk);
                    self.write_blocks(span.block, scratch)?;
                } else {
                    self.write_blocks(span.block, chunk)?;
                }
            }
            RangeOp::Erase(_) => {
                if span.merge {
                    self.read_blocks(span.block, scratch)?;
                    scratch[span.start..span.start + span.len].fill(0xFF);
                } else {
                    scratch.fill(0xFF);
                }
                self.write_blocks(span.block, scratch)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spans(offset: u64, size: u64) -> Vec<Span> {
        BlockSpans::new(offset, size, 512).collect()
    }

    fn span(block: u64, start: usize, len: usize, merge: bool) -> Span {
        Span {
            block,
            start,
            len,
            merge,
        }
    }

    #[test]
    fn within_one_block() {
        assert_eq!(spans(100, 50), vec![span(0, 100, 50, true)]);
        assert_eq!(spans(1024, 512), vec![span(2, 0, 512, true)]);
    }

    #[test]
    fn unaligned_head_and_tail() {
        assert_eq!(
            spans(500, 1000),
            vec![
                span(0, 500, 12, true),
                span(1, 0, 512, false),
                span(2, 0, 476, true),
            ]
        );
    }

    #[test]
    fn aligned_multi_block_keeps_merged_edges() {
        // First and last blocks go through the merge path even when the
        // request covers them entirely.
        assert_eq!(
            spans(0, 1536),
            vec![
                span(0, 0, 512, true),
                span(1, 0, 512, false),
                span(2, 0, 512, true),
            ]
        );
    }

    #[test]
    fn head_crossing_into_exact_tail() {
        assert_eq!(
            spans(510, 514),
            vec![span(0, 510, 2, true), span(1, 0, 512, true)]
        );
    }

    #[test]
    fn covers_every_requested_byte_once() {
        for (offset, size) in [(0u64, 1u64), (511, 2), (512, 512), (13, 5000), (1000, 24)] {
            let spans = spans(offset, size);
            let total: u64 = spans.iter().map(|s| s.len as u64).sum();
            assert_eq!(total, size, "offset {offset} size {size}");

            let mut cursor = offset;
            for s in &spans {
                assert_eq!(s.block * 512 + s.start as u64, cursor);
                cursor += s.len as u64;
            }
        }
    }

    #[test]
    fn zero_size_yields_nothing() {
        assert_eq!(spans(777, 0), vec![]);
    }
}
