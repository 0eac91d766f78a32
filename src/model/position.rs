use std::fmt;

/// A position in a host document.
///
/// Both coordinates are zero-based. Ordering is lexicographic: first by line,
/// then by column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct HostPosition {
    pub line: usize,
    pub column: usize,
}

impl HostPosition {
    pub const fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for HostPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// An ordered span between two host positions (`start <= end`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct HostRange {
    pub start: HostPosition,
    pub end: HostPosition,
}

impl HostRange {
    /// Create a range from two endpoints in either order
    pub fn new(a: HostPosition, b: HostPosition) -> Self {
        if a <= b {
            Self { start: a, end: b }
        } else {
            Self { start: b, end: a }
        }
    }

    /// A zero-width range at `position`
    pub fn point(position: HostPosition) -> Self {
        Self {
            start: position,
            end: position,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Check if the range contains a position (end-exclusive)
    pub fn contains(&self, position: HostPosition) -> bool {
        self.start <= position && position < self.end
    }
}

impl fmt::Display for HostRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}
