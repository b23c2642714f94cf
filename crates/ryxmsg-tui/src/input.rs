//! Line editing and wrapping for the input box.
//!
//! [`InputState`] is a plain value owned by [`crate::App`]; rendering reads
//! it, key handling mutates it, nothing else holds editing state.

use crossterm::event::{Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

/// Keyboard input relevant to the shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyInput {
    /// Printable character.
    Char(char),
    /// Delete the character before the cursor.
    Backspace,
    /// Submit the current line.
    Enter,
    /// Move the cursor left.
    Left,
    /// Move the cursor right.
    Right,
    /// Ctrl-C or Ctrl-Q.
    Quit,
    /// The terminal was resized.
    Resize,
    /// Anything else.
    Ignored,
}

impl KeyInput {
    /// Classify a terminal event.
    pub fn from_event(event: &Event) -> Self {
        match event {
            Event::Key(key) => Self::from_key(key),
            Event::Resize(..) => Self::Resize,
            _ => Self::Ignored,
        }
    }

    fn from_key(key: &KeyEvent) -> Self {
        if key.kind != KeyEventKind::Press {
            return Self::Ignored;
        }
        if key.modifiers.contains(KeyModifiers::CONTROL) {
            return match key.code {
                KeyCode::Char('c' | 'q') => Self::Quit,
                _ => Self::Ignored,
            };
        }
        match key.code {
            KeyCode::Char(c) => Self::Char(c),
            KeyCode::Backspace => Self::Backspace,
            KeyCode::Enter => Self::Enter,
            KeyCode::Left => Self::Left,
            KeyCode::Right => Self::Right,
            _ => Self::Ignored,
        }
    }
}

/// Contents of the input box.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InputState {
    buffer: String,
    /// Cursor position in characters.
    cursor: usize,
}

impl InputState {
    /// Current text.
    pub fn text(&self) -> &str {
        &self.buffer
    }

    /// Cursor position in characters.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Whether the box is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    fn byte_offset(&self, chars: usize) -> usize {
        self.buffer.char_indices().nth(chars).map_or(self.buffer.len(), |(i, _)| i)
    }

    /// Insert `c` at the cursor.
    pub fn insert(&mut self, c: char) {
        let at = self.byte_offset(self.cursor);
        self.buffer.insert(at, c);
        self.cursor += 1;
    }

    /// Delete the character before the cursor.
    pub fn backspace(&mut self) {
        if self.cursor == 0 {
            return;
        }
        self.cursor -= 1;
        let at = self.byte_offset(self.cursor);
        self.buffer.remove(at);
    }

    /// Move the cursor one character left.
    pub fn left(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    /// Move the cursor one character right.
    pub fn right(&mut self) {
        self.cursor = (self.cursor + 1).min(self.buffer.chars().count());
    }

    /// Take the text out, leaving the box empty.
    pub fn take(&mut self) -> String {
        self.cursor = 0;
        std::mem::take(&mut self.buffer)
    }

    /// Text wrapped to `width` columns.
    pub fn wrap(&self, width: usize) -> Vec<String> {
        wrap(&self.buffer, width)
    }

    /// Number of rows the text occupies at `width` columns.
    pub fn height(&self, width: usize) -> usize {
        spans(&self.buffer.chars().collect::<Vec<_>>(), width).len()
    }

    /// Row and column of the cursor once wrapped to `width` columns.
    ///
    /// The column stays below `width`: at the end of a full line the cursor
    /// sits on its last character.
    pub fn cursor_position(&self, width: usize) -> (usize, usize) {
        let chars: Vec<char> = self.buffer.chars().collect();
        let spans = spans(&chars, width);
        let row = spans.iter().position(|&(_, end)| self.cursor <= end).unwrap_or(spans.len() - 1);
        let (start, _) = spans[row];
        (row, self.cursor.saturating_sub(start).min(width.max(1) - 1))
    }
}

/// Wrap `text` to lines of at most `width` characters.
///
/// Breaks at the last space that fits, dropping it; a word longer than the
/// width is split where it overflows.
pub fn wrap(text: &str, width: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    spans(&chars, width).into_iter().map(|(start, end)| chars[start..end].iter().collect()).collect()
}

/// `(start, end)` character ranges of each wrapped line. Never empty.
fn spans(chars: &[char], width: usize) -> Vec<(usize, usize)> {
    let width = width.max(1);
    let mut spans = Vec::new();
    let mut start = 0;

    while chars.len() - start > width {
        // One past the width so a space right at the edge can be the break.
        let window = &chars[start..=start + width];
        match window.iter().rposition(|c| *c == ' ') {
            Some(at) if at > 0 => {
                spans.push((start, start + at));
                start += at + 1;
            },
            _ => {
                spans.push((start, start + width));
                start += width;
            },
        }
    }
    spans.push((start, chars.len()));
    spans
}
