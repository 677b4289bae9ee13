//! Scroll-back search
//!
//! Finds the regex match nearest to a cursor position across the combined
//! on-screen and scroll-back text of an emulation. The history is never
//! materialized whole: each half of the wrap-around range is exported in
//! blocks of at most 10 000 lines through the plain-text decoder, and the
//! recorded line-start offsets map match offsets back to (line, column)
//! coordinates.
//!
//! A search is one-shot: `run` scans synchronously and returns a single
//! outcome. Hosts that must not block a UI context run it on a background
//! task and use the [`CancelToken`], which is checked between blocks.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use regex::Regex;
use thiserror::Error;

use crate::decoder::PlainTextDecoder;
use crate::emulation::Emulation;

/// Lines exported per block.
const BLOCK_LINES: usize = 10_000;

#[derive(Debug, Error)]
pub enum SearchError {
    /// The pattern is not a valid regular expression. Surfaced as an error
    /// rather than silently reporting no match.
    #[error("invalid search pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SearchDirection {
    Forward,
    Backward,
}

/// Cooperative cancellation flag, checked between blocks.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Result of one search invocation. Line/column pairs are inclusive on
/// both ends, line numbers counting scroll-back first.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SearchOutcome {
    Match {
        start_line: usize,
        start_column: usize,
        end_line: usize,
        end_column: usize,
    },
    NoMatch,
    Cancelled,
}

/// One-shot regex search over an emulation's screen and scroll-back.
pub struct HistorySearch {
    regex: Regex,
    direction: SearchDirection,
    start_column: usize,
    start_line: usize,
    cancel: CancelToken,
    block_lines: usize,
}

enum ScanResult {
    Found(SearchOutcome),
    NotFound { blocks_scanned: usize },
    Cancelled,
}

impl HistorySearch {
    /// Build a search task. An unparsable pattern is rejected here; an
    /// empty pattern is accepted and reports `NoMatch` without scanning.
    pub fn new(
        pattern: &str,
        direction: SearchDirection,
        start_column: usize,
        start_line: usize,
    ) -> Result<Self, SearchError> {
        Ok(Self {
            regex: Regex::new(pattern)?,
            direction,
            start_column,
            start_line,
            cancel: CancelToken::new(),
            block_lines: BLOCK_LINES,
        })
    }

    /// Token for cancelling this search from another context.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Scan the emulation and return the single outcome.
    ///
    /// The direction-consistent half of the wrap-around range is scanned
    /// first: forward searches try `[start..end)` before `[0..start]`,
    /// backward searches the reverse.
    pub fn run(&self, emulation: &Emulation) -> SearchOutcome {
        if self.regex.as_str().is_empty() {
            return SearchOutcome::NoMatch;
        }

        let last_line = emulation.line_count().saturating_sub(1);
        let ahead = (self.start_column, self.start_line, None, last_line);
        let behind = (0, 0, Some(self.start_column), self.start_line);

        let halves = match self.direction {
            SearchDirection::Forward => [ahead, behind],
            SearchDirection::Backward => [behind, ahead],
        };

        for (start_column, start_line, end_column, end_line) in halves {
            match self.scan_range(emulation, start_column, start_line, end_column, end_line) {
                ScanResult::Found(outcome) => return outcome,
                ScanResult::Cancelled => return SearchOutcome::Cancelled,
                ScanResult::NotFound { .. } => {}
            }
        }
        SearchOutcome::NoMatch
    }

    /// Scan `start_line..=end_line` block by block. `end_column`, when
    /// set, bounds matches inside the block holding `end_line` (the half
    /// ends at that column).
    fn scan_range(
        &self,
        emulation: &Emulation,
        start_column: usize,
        start_line: usize,
        end_column: Option<usize>,
        end_line: usize,
    ) -> ScanResult {
        if start_line > end_line {
            return ScanResult::NotFound { blocks_scanned: 0 };
        }
        let lines_to_read = end_line - start_line + 1;
        let mut lines_read = 0;
        let mut blocks_scanned = 0;

        loop {
            let block_size = self.block_lines.min(lines_to_read - lines_read);
            if block_size == 0 {
                return ScanResult::NotFound { blocks_scanned };
            }
            if self.cancel.is_cancelled() {
                return ScanResult::Cancelled;
            }

            // Forward walks blocks from the front of the range, backward
            // from the back.
            let block_start = match self.direction {
                SearchDirection::Forward => start_line + lines_read,
                SearchDirection::Backward => (end_line + 1) - lines_read - block_size,
            };
            let block_end = block_start + block_size - 1;

            blocks_scanned += 1;
            let mut decoder = PlainTextDecoder::new();
            decoder.record_line_positions(true);
            decoder.begin();
            emulation.write_to_stream(&mut decoder, block_start, block_end);
            decoder.end();

            let text = decoder.text();
            let positions = decoder.line_positions();
            let decoded_lines = positions.len().saturating_sub(1);

            // The column bounds only apply inside the blocks that hold the
            // half's first and last lines; other blocks are covered whole.
            let from = if block_start == start_line {
                start_column.min(text.len())
            } else {
                0
            };
            let end_position = match end_column {
                Some(column) if block_end == end_line && decoded_lines > 0 => {
                    positions[decoded_lines - 1] + column
                }
                _ => text.len(),
            };

            let found = match self.direction {
                SearchDirection::Forward => self
                    .regex
                    .find_at(text, from)
                    .filter(|m| m.start() < end_position),
                SearchDirection::Backward => {
                    // Matches arrive in ascending order: keep the last one
                    // inside the bounds, stop once past the end bound.
                    // O(matches) per block, unlike the forward early exit.
                    let mut last = None;
                    for m in self.regex.find_iter(text) {
                        if m.start() >= end_position {
                            break;
                        }
                        if m.start() >= from {
                            last = Some(m);
                        }
                    }
                    last
                }
            };

            if let Some(m) = found {
                let match_start = m.start();
                // Inclusive end; an empty match collapses onto its start.
                let match_end = m.end().saturating_sub(1).max(match_start);

                let start_index = line_for_offset(positions, match_start);
                let end_index = line_for_offset(positions, match_end);
                tracing::debug!(match_start, match_end, block_start, "history search hit");

                return ScanResult::Found(SearchOutcome::Match {
                    start_line: block_start + start_index,
                    start_column: match_start - positions[start_index],
                    end_line: block_start + end_index,
                    end_column: match_end - positions[end_index],
                });
            }

            lines_read += block_size;
        }
    }
}

/// Largest recorded line index whose offset is at or before `offset`.
fn line_for_offset(positions: &[usize], offset: usize) -> usize {
    let mut line = 0;
    while line + 1 < positions.len().saturating_sub(1) && positions[line + 1] <= offset {
        line += 1;
    }
    line
}
