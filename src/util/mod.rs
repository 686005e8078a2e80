mod code;
mod position;
use once_cell::unsync::OnceCell;

#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
/// Line/column position within a source buffer, 1-indexed.
pub struct Position {
    pub line: usize,
    pub column: usize,
}

/// Source buffer with a lazily-computed line-break index, used to turn
/// byte offsets into [Position]s for diagnostics.
pub struct Code<'c> {
    pub value: &'c [u8],
    line_breaks: OnceCell<Vec<usize>>,
}
