//! Screen buffer: character grid plus scroll-back
//!
//! This module provides the grid storage the emulation drives: cursor motion
//! primitives, glyph placement, resize, the scroll-back store and the
//! per-redraw counters the update coalescer resets.

use std::sync::{Arc, Mutex};

use bitflags::bitflags;
use unicode_width::UnicodeWidthChar;

use crate::chartable::ExtendedCharTable;
use crate::decoder::PlainTextDecoder;

bitflags! {
    /// Per-cell rendition attributes, set by the escape-sequence layer.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct Rendition: u16 {
        const BOLD          = 0b0000_0001;
        const DIM           = 0b0000_0010;
        const ITALIC        = 0b0000_0100;
        const UNDERLINE     = 0b0000_1000;
        const BLINK         = 0b0001_0000;
        const INVERSE       = 0b0010_0000;
        const STRIKETHROUGH = 0b0100_0000;
    }
}

/// What a cell displays.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum CellContent {
    /// Nothing written yet; reads as a space.
    #[default]
    Blank,
    /// A single code point.
    Glyph(char),
    /// Handle into the shared [`ExtendedCharTable`] for a combining
    /// sequence too long for one code unit.
    Extended(u16),
}

/// A single grid cell.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Cell {
    pub content: CellContent,
    pub rendition: Rendition,
    /// Display width: 1 or 2; 0 marks the continuation half of a wide glyph.
    pub width: u8,
}

impl Cell {
    fn blank() -> Self {
        Self {
            content: CellContent::Blank,
            rendition: Rendition::empty(),
            width: 1,
        }
    }

    fn continuation(rendition: Rendition) -> Self {
        Self {
            content: CellContent::Blank,
            rendition,
            width: 0,
        }
    }

    pub fn is_continuation(&self) -> bool {
        self.width == 0
    }

    /// Append the cell's text to `out`, resolving extended handles.
    pub fn append_text(&self, out: &mut String, table: &ExtendedCharTable) {
        match self.content {
            CellContent::Blank => out.push(' '),
            CellContent::Glyph(ch) => out.push(ch),
            CellContent::Extended(handle) => match table.lookup(handle) {
                Some(seq) => out.extend(seq.iter()),
                None => out.push('\u{fffd}'),
            },
        }
    }
}

/// A grid row.
#[derive(Clone, Debug)]
pub struct Row {
    pub cells: Vec<Cell>,
    /// Set when the line continued onto the next row instead of ending in
    /// a hard newline.
    pub wrapped: bool,
}

impl Row {
    fn new(columns: usize) -> Self {
        Self {
            cells: vec![Cell::blank(); columns],
            wrapped: false,
        }
    }

    fn resize(&mut self, columns: usize) {
        self.cells.resize(columns, Cell::blank());
    }
}

/// Retention policy for the scroll-back store.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HistoryPolicy {
    /// Lines scrolled off the top are discarded.
    None,
    /// Keep at most this many lines, dropping the oldest.
    Fixed { max_lines: usize },
    /// Keep everything.
    Unlimited,
}

impl Default for HistoryPolicy {
    fn default() -> Self {
        HistoryPolicy::Fixed { max_lines: 10_000 }
    }
}

/// Addressable character grid with attached scroll-back.
pub struct Screen {
    lines: usize,
    columns: usize,
    image: Vec<Row>,
    history: Vec<Row>,
    history_policy: HistoryPolicy,
    cursor_line: usize,
    cursor_column: usize,
    current_rendition: Rendition,
    /// Lines scrolled into history since the last redraw notification.
    scrolled_lines: usize,
    /// Lines dropped from history since the last redraw notification.
    dropped_lines: usize,
    char_table: Arc<Mutex<ExtendedCharTable>>,
}

impl Screen {
    pub fn new(lines: usize, columns: usize, char_table: Arc<Mutex<ExtendedCharTable>>) -> Self {
        Self {
            lines,
            columns,
            image: (0..lines).map(|_| Row::new(columns)).collect(),
            history: Vec::new(),
            history_policy: HistoryPolicy::default(),
            cursor_line: 0,
            cursor_column: 0,
            current_rendition: Rendition::empty(),
            scrolled_lines: 0,
            dropped_lines: 0,
            char_table,
        }
    }

    pub fn lines(&self) -> usize {
        self.lines
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn cursor(&self) -> (usize, usize) {
        (self.cursor_line, self.cursor_column)
    }

    pub fn set_rendition(&mut self, rendition: Rendition) {
        self.current_rendition = rendition;
    }

    /// Move the cursor back one column.
    pub fn back_space(&mut self) {
        self.cursor_column = self.cursor_column.saturating_sub(1);
    }

    /// Advance to the next 8-column tab stop.
    pub fn tab(&mut self) {
        self.cursor_column = ((self.cursor_column / 8) + 1) * 8;
        if self.cursor_column >= self.columns {
            self.cursor_column = self.columns.saturating_sub(1);
        }
    }

    /// Move the cursor to the start of the current line.
    pub fn to_start_of_line(&mut self) {
        self.cursor_column = 0;
    }

    /// Advance one line, scrolling the top line into history at the bottom.
    pub fn new_line(&mut self) {
        if self.cursor_line + 1 < self.lines {
            self.cursor_line += 1;
        } else {
            self.scroll_one_line();
        }
    }

    fn scroll_one_line(&mut self) {
        let row = if self.image.is_empty() {
            Row::new(self.columns)
        } else {
            self.image.remove(0)
        };
        self.image.push(Row::new(self.columns));
        self.scrolled_lines += 1;

        match self.history_policy {
            HistoryPolicy::None => {
                self.dropped_lines += 1;
            }
            HistoryPolicy::Fixed { max_lines } => {
                self.history.push(row);
                while self.history.len() > max_lines {
                    self.history.remove(0);
                    self.dropped_lines += 1;
                }
            }
            HistoryPolicy::Unlimited => {
                self.history.push(row);
            }
        }
    }

    /// Place a glyph at the cursor and advance.
    ///
    /// Zero-width combining characters fold into the previous cell through
    /// the shared intern table; wide glyphs take two cells.
    pub fn display_character(&mut self, ch: char) {
        let width = match ch.width() {
            Some(w) => w,
            None => return, // control character, not printable
        };

        if width == 0 {
            self.combine_with_previous(ch);
            return;
        }

        if self.cursor_column >= self.columns {
            self.image[self.cursor_line].wrapped = true;
            self.cursor_column = 0;
            self.new_line();
        }

        let line = self.cursor_line;
        let column = self.cursor_column;
        let rendition = self.current_rendition;

        self.image[line].cells[column] = Cell {
            content: CellContent::Glyph(ch),
            rendition,
            width: width as u8,
        };
        if width == 2 && column + 1 < self.columns {
            self.image[line].cells[column + 1] = Cell::continuation(rendition);
        }
        self.cursor_column += width;
    }

    fn combine_with_previous(&mut self, mark: char) {
        if self.cursor_column == 0 {
            return;
        }
        let line = self.cursor_line;
        let mut column = self.cursor_column - 1;
        // A wide glyph leaves a continuation cell; the mark belongs to
        // its base.
        while column > 0 && self.image[line].cells[column].is_continuation() {
            column -= 1;
        }

        let mut table = self.char_table.lock().expect("char table poisoned");
        let cell = &mut self.image[line].cells[column];
        let sequence: Vec<char> = match cell.content {
            CellContent::Glyph(base) => vec![base, mark],
            CellContent::Extended(handle) => {
                let Some(existing) = table.lookup(handle) else {
                    return;
                };
                let mut seq = existing.to_vec();
                seq.push(mark);
                seq
            }
            CellContent::Blank => return,
        };

        match table.create(&sequence) {
            Ok(handle) => cell.content = CellContent::Extended(handle),
            Err(err) => {
                // Table full: drop the combining mark, keep the base glyph.
                tracing::warn!(%err, "could not intern combining sequence");
            }
        }
    }

    /// Resize the grid; history rows keep their width until trimmed.
    pub fn resize_image(&mut self, lines: usize, columns: usize) {
        while self.image.len() < lines {
            self.image.push(Row::new(columns));
        }
        self.image.truncate(lines);
        for row in &mut self.image {
            row.resize(columns);
        }
        self.lines = lines;
        self.columns = columns;
        self.cursor_line = self.cursor_line.min(lines.saturating_sub(1));
        self.cursor_column = self.cursor_column.min(columns.saturating_sub(1));
    }

    /// Number of lines in the scroll-back store.
    pub fn history_line_count(&self) -> usize {
        self.history.len()
    }

    pub fn history_policy(&self) -> HistoryPolicy {
        self.history_policy
    }

    /// Install a new retention policy. With `retain_contents` false the
    /// store is emptied; otherwise existing lines are kept and trimmed to
    /// the new limit.
    pub fn set_history_policy(&mut self, policy: HistoryPolicy, retain_contents: bool) {
        self.history_policy = policy;
        if !retain_contents {
            self.history.clear();
        }
        match policy {
            HistoryPolicy::None => self.history.clear(),
            HistoryPolicy::Fixed { max_lines } => {
                while self.history.len() > max_lines {
                    self.history.remove(0);
                    self.dropped_lines += 1;
                }
            }
            HistoryPolicy::Unlimited => {}
        }
    }

    pub fn scrolled_lines(&self) -> usize {
        self.scrolled_lines
    }

    pub fn dropped_lines(&self) -> usize {
        self.dropped_lines
    }

    pub fn reset_scrolled_lines(&mut self) {
        self.scrolled_lines = 0;
    }

    pub fn reset_dropped_lines(&mut self) {
        self.dropped_lines = 0;
    }

    /// Cells of line `index`, counting scroll-back first, then the image.
    pub fn line_cells(&self, index: usize) -> Option<&Row> {
        if index < self.history.len() {
            self.history.get(index)
        } else {
            self.image.get(index - self.history.len())
        }
    }

    /// Export lines `start..=end` (clamped) through `decoder`.
    pub fn write_lines_to_stream(
        &self,
        decoder: &mut PlainTextDecoder,
        start_line: usize,
        end_line: usize,
    ) {
        let total = self.history.len() + self.image.len();
        if total == 0 || start_line >= total {
            return;
        }
        let end = end_line.min(total - 1);

        let table = self.char_table.lock().expect("char table poisoned");
        for index in start_line..=end {
            let row = self
                .line_cells(index)
                .expect("line index clamped to total line count");
            decoder.decode_line(&row.cells, &table);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn screen(lines: usize, columns: usize) -> Screen {
        Screen::new(
            lines,
            columns,
            Arc::new(Mutex::new(ExtendedCharTable::new())),
        )
    }

    fn line_text(screen: &Screen, index: usize) -> String {
        let mut decoder = PlainTextDecoder::new();
        decoder.begin();
        screen.write_lines_to_stream(&mut decoder, index, index);
        decoder.end();
        decoder.text().trim_end_matches('\n').to_string()
    }

    #[test]
    fn display_and_cursor_motion() {
        let mut s = screen(4, 10);
        for ch in "hi".chars() {
            s.display_character(ch);
        }
        assert_eq!(s.cursor(), (0, 2));

        s.to_start_of_line();
        assert_eq!(s.cursor(), (0, 0));
        s.display_character('H');
        assert_eq!(line_text(&s, 0), "Hi");

        s.new_line();
        s.to_start_of_line();
        s.tab();
        assert_eq!(s.cursor(), (1, 8));
        s.back_space();
        assert_eq!(s.cursor(), (1, 7));
    }

    #[test]
    fn wide_glyph_takes_two_cells() {
        let mut s = screen(2, 10);
        s.display_character('漢');
        assert_eq!(s.cursor(), (0, 2));
        let row = s.line_cells(0).unwrap();
        assert_eq!(row.cells[0].width, 2);
        assert!(row.cells[1].is_continuation());
    }

    #[test]
    fn combining_mark_interns_sequence() {
        let mut s = screen(2, 10);
        s.display_character('e');
        s.display_character('\u{0301}');

        let row = s.line_cells(0).unwrap();
        match row.cells[0].content {
            CellContent::Extended(handle) => {
                let table = s.char_table.lock().unwrap();
                assert_eq!(table.lookup(handle), Some(&['e', '\u{0301}'][..]));
            }
            other => panic!("expected extended cell, got {other:?}"),
        }
        // Cursor did not advance for the zero-width mark.
        assert_eq!(s.cursor(), (0, 1));
        assert_eq!(line_text(&s, 0), "e\u{0301}");
    }

    #[test]
    fn combining_mark_attaches_to_wide_base() {
        let mut s = screen(2, 10);
        s.display_character('漢');
        s.display_character('\u{0301}');

        // The cursor sits past the continuation cell; the mark must land
        // on the wide base, not the continuation half.
        let row = s.line_cells(0).unwrap();
        match row.cells[0].content {
            CellContent::Extended(handle) => {
                let table = s.char_table.lock().unwrap();
                assert_eq!(table.lookup(handle), Some(&['漢', '\u{0301}'][..]));
            }
            other => panic!("expected extended cell, got {other:?}"),
        }
        assert_eq!(row.cells[0].width, 2);
        assert!(row.cells[1].is_continuation());
        assert_eq!(s.cursor(), (0, 2));
    }

    #[test]
    fn scrolling_feeds_history_and_counters() {
        let mut s = screen(2, 5);
        for ch in "a".chars() {
            s.display_character(ch);
        }
        s.new_line(); // line 0 -> 1
        s.to_start_of_line();
        s.display_character('b');
        s.new_line(); // bottom: scrolls "a" into history
        s.to_start_of_line();
        s.display_character('c');

        assert_eq!(s.history_line_count(), 1);
        assert_eq!(s.scrolled_lines(), 1);
        assert_eq!(line_text(&s, 0), "a");
        assert_eq!(line_text(&s, 1), "b");
        assert_eq!(line_text(&s, 2), "c");

        s.reset_scrolled_lines();
        assert_eq!(s.scrolled_lines(), 0);
    }

    #[test]
    fn fixed_history_drops_oldest() {
        let mut s = screen(1, 5);
        s.set_history_policy(HistoryPolicy::Fixed { max_lines: 2 }, false);
        for i in 0..4u8 {
            s.display_character(char::from(b'a' + i));
            s.new_line();
            s.to_start_of_line();
        }
        assert_eq!(s.history_line_count(), 2);
        assert_eq!(s.dropped_lines(), 2);
        assert_eq!(line_text(&s, 0), "c");
        assert_eq!(line_text(&s, 1), "d");
    }

    #[test]
    fn resize_clamps_cursor() {
        let mut s = screen(4, 10);
        s.new_line();
        s.new_line();
        s.new_line();
        s.tab();
        s.resize_image(2, 4);
        assert_eq!(s.lines(), 2);
        assert_eq!(s.columns(), 4);
        let (line, column) = s.cursor();
        assert!(line < 2 && column < 4);
    }
}
