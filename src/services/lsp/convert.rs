//! Type conversions between host coordinates and protocol coordinates
//!
//! Both sides are zero-based line/column pairs, so these are plain field
//! copies. Columns are passed through unchanged: the backend and the host
//! agree on the column unit. Values above `u32::MAX` saturate; callers must
//! not pass positions outside the document.

use crate::model::{HostPosition, HostRange, Selection};
use lsp_types::{Position, Range};

fn to_u32(value: usize) -> u32 {
    u32::try_from(value).unwrap_or(u32::MAX)
}

pub fn to_protocol_position(position: HostPosition) -> Position {
    Position {
        line: to_u32(position.line),
        character: to_u32(position.column),
    }
}

pub fn to_host_position(position: Position) -> HostPosition {
    HostPosition {
        line: position.line as usize,
        column: position.character as usize,
    }
}

pub fn to_protocol_range(range: HostRange) -> Range {
    Range {
        start: to_protocol_position(range.start),
        end: to_protocol_position(range.end),
    }
}

/// Convert a protocol range, keeping its endpoints exactly as sent
pub fn to_host_range(range: Range) -> HostRange {
    HostRange {
        start: to_host_position(range.start),
        end: to_host_position(range.end),
    }
}

/// The span a selection covers, direction dropped
pub fn selection_to_protocol_range(selection: &Selection) -> Range {
    to_protocol_range(selection.range())
}

/// A forward selection covering a protocol range
pub fn protocol_range_to_selection(range: Range) -> Selection {
    Selection::new(to_host_position(range.start), to_host_position(range.end))
}
