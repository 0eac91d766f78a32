use crate::model::HostRange;
use ratatui::style::Color;

/// Overlay face - defines the visual appearance of an overlay
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OverlayFace {
    /// Dashed underline, used to flag errors
    DashedUnderline { color: Color },
    /// Foreground (text) color
    Foreground { color: Color },
}

/// Priority for overlay z-ordering
/// Higher priority overlays are rendered on top of lower priority ones
pub type Priority = i32;

/// Namespace for grouping overlays so a whole group can be replaced at once
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OverlayNamespace(pub String);

impl OverlayNamespace {
    pub fn from_string(s: String) -> Self {
        Self(s)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// An overlay represents a visual decoration over a range of text
#[derive(Debug, Clone, PartialEq)]
pub struct Overlay {
    pub range: HostRange,

    /// Visual appearance of the overlay
    pub face: OverlayFace,

    /// Priority for z-ordering (higher = on top)
    pub priority: Priority,

    /// Group this overlay belongs to
    pub namespace: OverlayNamespace,
}

impl Overlay {
    pub fn new(range: HostRange, face: OverlayFace, namespace: OverlayNamespace) -> Self {
        Self {
            range,
            face,
            priority: 0,
            namespace,
        }
    }

    /// Set the priority
    pub fn with_priority_value(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }
}

/// Manages overlays for a view
/// Overlays are kept sorted by priority for rendering
#[derive(Debug, Clone, Default)]
pub struct OverlayManager {
    overlays: Vec<Overlay>,
}

impl OverlayManager {
    pub fn new() -> Self {
        Self {
            overlays: Vec::new(),
        }
    }

    /// Add an overlay
    pub fn add(&mut self, overlay: Overlay) {
        self.overlays.push(overlay);
        // Stable sort keeps insertion order within a priority
        self.overlays.sort_by_key(|o| o.priority);
    }

    /// Replace every overlay in `namespace` with `overlays`.
    ///
    /// An empty `overlays` clears the namespace.
    pub fn replace_namespace(&mut self, namespace: &OverlayNamespace, overlays: Vec<Overlay>) {
        self.overlays.retain(|o| &o.namespace != namespace);
        self.overlays.extend(overlays);
        self.overlays.sort_by_key(|o| o.priority);
    }

    /// Iterate overlays of one namespace in insertion order
    pub fn in_namespace<'a>(
        &'a self,
        namespace: &'a OverlayNamespace,
    ) -> impl Iterator<Item = &'a Overlay> + 'a {
        self.overlays.iter().filter(move |o| &o.namespace == namespace)
    }

    pub fn all(&self) -> &[Overlay] {
        &self.overlays
    }

    pub fn len(&self) -> usize {
        self.overlays.len()
    }

    pub fn is_empty(&self) -> bool {
        self.overlays.is_empty()
    }
}
