//! Server-pushed syntax decorations
//!
//! The backend pushes a flat list of `(range, tag)` pairs for a document.
//! This module partitions the list by tag and hands every tag's ranges to
//! the host as a full replacement, so overlays from the previous push are
//! always cleared, including for tags that no longer occur.

use crate::host::Host;
use crate::model::HostRange;
use crate::services::lsp::convert::to_host_range;
use crate::services::lsp::ext::Decoration;
use crate::view::overlay::{Overlay, OverlayFace, OverlayNamespace, Priority};
use lsp_types::Uri;
use ratatui::style::Color;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

const DECORATION_NAMESPACE_PREFIX: &str = "syntax-decoration-";
const DECORATION_PRIORITY: Priority = 5;
const ERROR_PRIORITY: Priority = 100;

/// The closed set of classification tags the backend may push
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DecorationTag {
    Background,
    Error,
    Comment,
    String,
    Keyword,
    Function,
    Parameter,
    Builtin,
    Text,
    Attribute,
    Literal,
}

impl DecorationTag {
    pub const ALL: [DecorationTag; 11] = [
        DecorationTag::Background,
        DecorationTag::Error,
        DecorationTag::Comment,
        DecorationTag::String,
        DecorationTag::Keyword,
        DecorationTag::Function,
        DecorationTag::Parameter,
        DecorationTag::Builtin,
        DecorationTag::Text,
        DecorationTag::Attribute,
        DecorationTag::Literal,
    ];

    /// Wire name of the tag
    pub fn as_str(self) -> &'static str {
        match self {
            DecorationTag::Background => "background",
            DecorationTag::Error => "error",
            DecorationTag::Comment => "comment",
            DecorationTag::String => "string",
            DecorationTag::Keyword => "keyword",
            DecorationTag::Function => "function",
            DecorationTag::Parameter => "parameter",
            DecorationTag::Builtin => "builtin",
            DecorationTag::Text => "text",
            DecorationTag::Attribute => "attribute",
            DecorationTag::Literal => "literal",
        }
    }

    /// Visual style for the tag
    pub fn face(self) -> OverlayFace {
        let fg = |r, g, b| OverlayFace::Foreground {
            color: Color::Rgb(r, g, b),
        };
        match self {
            DecorationTag::Background => fg(0x3F, 0x3F, 0x3F),
            DecorationTag::Error => OverlayFace::DashedUnderline { color: Color::Red },
            DecorationTag::Comment => fg(0x7F, 0x9F, 0x7F),
            DecorationTag::String => fg(0xCC, 0x93, 0x93),
            DecorationTag::Keyword => fg(0xF0, 0xDF, 0xAF),
            DecorationTag::Function => fg(0x93, 0xE0, 0xE3),
            DecorationTag::Parameter => fg(0x94, 0xBF, 0xF3),
            DecorationTag::Builtin => fg(0xDD, 0x67, 0x18),
            DecorationTag::Text => fg(0xDC, 0xDC, 0xCC),
            DecorationTag::Attribute => fg(0xBF, 0xEB, 0xBF),
            DecorationTag::Literal => fg(0xDF, 0xAF, 0x8F),
        }
    }

    pub fn priority(self) -> Priority {
        match self {
            DecorationTag::Error => ERROR_PRIORITY,
            _ => DECORATION_PRIORITY,
        }
    }

    /// Overlay namespace holding this tag's ranges
    pub fn namespace(self) -> OverlayNamespace {
        OverlayNamespace::from_string(format!("{DECORATION_NAMESPACE_PREFIX}{}", self.as_str()))
    }

    /// Build the overlays for a set of ranges carrying this tag
    pub fn overlays(self, ranges: &[HostRange]) -> Vec<Overlay> {
        let namespace = self.namespace();
        ranges
            .iter()
            .map(|range| {
                Overlay::new(*range, self.face(), namespace.clone())
                    .with_priority_value(self.priority())
            })
            .collect()
    }
}

impl fmt::Display for DecorationTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a wire tag is not in the known set
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownTag(pub String);

impl fmt::Display for UnknownTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown decoration tag {:?}", self.0)
    }
}

impl std::error::Error for UnknownTag {}

impl FromStr for DecorationTag {
    type Err = UnknownTag;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DecorationTag::ALL
            .into_iter()
            .find(|tag| tag.as_str() == s)
            .ok_or_else(|| UnknownTag(s.to_string()))
    }
}

/// Decorations partitioned by tag, with a bucket for every known tag
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DecorationBuckets {
    buckets: HashMap<DecorationTag, Vec<HostRange>>,
    /// Wire tags that were not recognised, in arrival order
    pub unknown: Vec<String>,
}

impl DecorationBuckets {
    pub fn partition(decorations: &[Decoration]) -> Self {
        let mut buckets: HashMap<DecorationTag, Vec<HostRange>> = DecorationTag::ALL
            .into_iter()
            .map(|tag| (tag, Vec::new()))
            .collect();
        let mut unknown = Vec::new();

        for decoration in decorations {
            match decoration.tag.parse::<DecorationTag>() {
                Ok(tag) => buckets
                    .entry(tag)
                    .or_default()
                    .push(to_host_range(decoration.range)),
                Err(UnknownTag(tag)) => {
                    tracing::warn!("unknown decoration tag {tag}");
                    unknown.push(tag);
                }
            }
        }

        Self { buckets, unknown }
    }

    /// Ranges for one tag (empty if the batch had none)
    pub fn ranges(&self, tag: DecorationTag) -> &[HostRange] {
        self.buckets.get(&tag).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of decorations that landed in a known bucket
    pub fn known_len(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    /// Consume into `(tag, ranges)` pairs in [`DecorationTag::ALL`] order
    pub fn into_tagged(mut self) -> Vec<(DecorationTag, Vec<HostRange>)> {
        DecorationTag::ALL
            .into_iter()
            .map(|tag| (tag, self.buckets.remove(&tag).unwrap_or_default()))
            .collect()
    }
}

/// Summary of one decoration push
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecorationReport {
    pub applied: usize,
    pub dropped_tags: Vec<String>,
}

/// Apply a decoration batch to the visible view showing `uri`.
///
/// Returns None (and touches nothing) when no visible view shows the
/// document.
pub fn apply_decorations(
    host: &dyn Host,
    uri: &Uri,
    decorations: &[Decoration],
) -> Option<DecorationReport> {
    let Some(view) = host.visible_view_for(uri) else {
        tracing::debug!(
            "dropping {} decorations for {}: no visible view",
            decorations.len(),
            uri.as_str()
        );
        return None;
    };

    let buckets = DecorationBuckets::partition(decorations);
    let applied = buckets.known_len();
    let dropped_tags = buckets.unknown.clone();

    for (tag, ranges) in buckets.into_tagged() {
        host.set_decorations(view, tag, ranges);
    }

    tracing::trace!("applied {applied} decorations to {view}");
    Some(DecorationReport {
        applied,
        dropped_tags,
    })
}
