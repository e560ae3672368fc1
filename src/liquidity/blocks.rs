/// Inclusive block range scanned for one chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockWindow {
    pub start: u64,
    pub end: u64,
}

impl BlockWindow {
    /// Window ending at `head`. An explicit `start_block` wins over the lookback size.
    pub fn plan(head: u64, blocks_to_analyze: u64, start_block: Option<u64>) -> Self {
        let start = match start_block {
            Some(start) => start.min(head),
            None => head.saturating_sub(blocks_to_analyze.saturating_sub(1)),
        };
        Self { start, end: head }
    }

    /// Number of blocks in the window; never zero.
    pub fn block_count(&self) -> u64 {
        self.end - self.start + 1
    }

    /// Ascending, contiguous sub-ranges of at most `chunk_size` blocks.
    pub fn chunks(&self, chunk_size: u64) -> BlockChunks {
        BlockChunks {
            next: Some(self.start),
            end: self.end,
            size: chunk_size.max(1),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BlockChunks {
    next: Option<u64>,
    end: u64,
    size: u64,
}

impl Iterator for BlockChunks {
    type Item = (u64, u64);

    fn next(&mut self) -> Option<Self::Item> {
        let from = self.next?;
        if from > self.end {
            self.next = None;
            return None;
        }
        let to = from.saturating_add(self.size - 1).min(self.end);
        self.next = to.checked_add(1);
        Some((from, to))
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn test_plan_uses_lookback() {
        let window = BlockWindow::plan(20_000_999, 1000, None);
        assert_eq!(window, BlockWindow { start: 20_000_000, end: 20_000_999 });
        assert_eq!(window.block_count(), 1000);
    }

    #[test]
    fn test_plan_near_genesis_saturates() {
        assert_eq!(BlockWindow::plan(5, 1000, None), BlockWindow { start: 0, end: 5 });
    }

    #[rstest]
    #[case(Some(100), 100)]
    #[case(Some(5_000), 1_000)]
    fn test_plan_with_explicit_start(#[case] start: Option<u64>, #[case] expected: u64) {
        let window = BlockWindow::plan(1_000, 10, start);
        assert_eq!(window.start, expected);
        assert_eq!(window.end, 1_000);
    }

    #[test]
    fn test_chunks_cover_window_without_overlap() {
        let window = BlockWindow { start: 100, end: 124 };
        let chunks: Vec<_> = window.chunks(10).collect();
        assert_eq!(chunks, vec![(100, 109), (110, 119), (120, 124)]);

        let covered: u64 = chunks.iter().map(|(from, to)| to - from + 1).sum();
        assert_eq!(covered, window.block_count());
    }

    #[test]
    fn test_single_block_window() {
        let window = BlockWindow { start: 7, end: 7 };
        assert_eq!(window.chunks(10).collect::<Vec<_>>(), vec![(7, 7)]);
    }

    #[test]
    fn test_chunk_at_u64_max_terminates() {
        let window = BlockWindow { start: u64::MAX - 1, end: u64::MAX };
        assert_eq!(window.chunks(1).count(), 2);
    }
}
