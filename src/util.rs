use once_cell::unsync::OnceCell;
use std::fmt::{Display, Formatter};

/// A wrapper around the source expression text, with lazily computed line-break
/// positions for reporting [Position]s in diagnostics.
pub struct Code<'c> {
    pub value: &'c [u8],
    line_breaks: OnceCell<Vec<usize>>,
}

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq)]
/// The line and column of a byte offset into a [Code] value.
pub struct Position {
    pub line: usize,
    pub column: usize,
}

impl<'c> From<&'c [u8]> for Code<'c> {
    fn from(value: &'c [u8]) -> Self {
        Code::new(value)
    }
}
impl<'c> From<&'c str> for Code<'c> {
    fn from(value: &'c str) -> Self {
        Code::new(value.as_bytes())
    }
}

impl<'c> Code<'c> {
    pub fn new(value: &'c [u8]) -> Self {
        Self {
            value,
            line_breaks: OnceCell::new(),
        }
    }

    fn obtain_line_breaks(&self) -> &Vec<usize> {
        self.line_breaks.get_or_init(|| {
            self.value
                .iter()
                .enumerate()
                .filter_map(|(index, b)| if *b == b'\n' { Some(index) } else { None })
                .collect()
        })
    }

    /// Resolve a byte offset into the source text to a 1-indexed line/column.
    pub fn obtain_position(&self, pointer: usize) -> Position {
        let line_breaks = self.obtain_line_breaks();
        let index = match line_breaks.binary_search(&pointer) {
            Ok(index) | Err(index) => index,
        };

        if index == 0 {
            let s = String::from_utf8_lossy(&self.value[..pointer.min(self.value.len())]);
            Position::new(1, s.len() + 1)
        } else {
            let break_point = line_breaks[index - 1] + 1;
            let end = pointer.max(break_point).min(self.value.len());
            let s = String::from_utf8_lossy(&self.value[break_point..end]);
            Position::new(index + 1, s.len() + 1)
        }
    }
}

impl Position {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl Display for Position {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "line {}, column {}", self.line, self.column)
    }
}
