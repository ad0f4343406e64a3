// ─── Config ───────────────────────────────────────────────────────────────

/// Configuration for a `DrawController`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerConfig {
    /// Dimension the viewer scrolls through (the slice axis by default).
    /// Used to place the scroll value when decoding group keys.
    pub scroll_index: usize,
    /// Return an error on duplicate position groups instead of falling back
    /// to the first match.
    pub strict_groups: bool,
    /// Maximum undo depth of a `CommandStack` built from this config.
    pub history_depth: usize,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            scroll_index: 2,
            strict_groups: false,
            history_depth: 100,
        }
    }
}
