use super::position::{HostPosition, HostRange};

/// A selection in a host view
///
/// `active` is where edits happen and what moves when the selection is
/// extended. `anchor` is the end that stays put. The two may be in either
/// order; a selection made by dragging backwards has `active < anchor`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Selection {
    pub anchor: HostPosition,
    pub active: HostPosition,
}

impl Selection {
    pub fn new(anchor: HostPosition, active: HostPosition) -> Self {
        Self { anchor, active }
    }

    /// Create an empty selection (a plain cursor) at a position
    pub fn collapsed(position: HostPosition) -> Self {
        Self {
            anchor: position,
            active: position,
        }
    }

    /// Create a forward selection covering `range` (anchor at start, active at end)
    pub fn from_range(range: HostRange) -> Self {
        Self {
            anchor: range.start,
            active: range.end,
        }
    }

    /// Is the selection collapsed to a single point?
    pub fn is_empty(&self) -> bool {
        self.anchor == self.active
    }

    /// Is the active end before the anchor?
    pub fn is_reversed(&self) -> bool {
        self.active < self.anchor
    }

    /// Get the start of the selection (min of active and anchor)
    pub fn start(&self) -> HostPosition {
        self.anchor.min(self.active)
    }

    /// Get the end of the selection (max of active and anchor)
    pub fn end(&self) -> HostPosition {
        self.anchor.max(self.active)
    }

    pub fn range(&self) -> HostRange {
        HostRange::new(self.anchor, self.active)
    }
}
