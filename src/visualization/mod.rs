pub mod export;
pub mod layout;
pub mod topology;

/// Canvas width used when no other size is configured.
pub const DEFAULT_CANVAS_WIDTH: f64 = 1200.0;
/// Canvas height used when no other size is configured.
pub const DEFAULT_CANVAS_HEIGHT: f64 = 800.0;

/// How node positions are computed for an export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LayoutStrategy {
    /// The largest component on the right, every other component in its
    /// own grid cell on the left.
    #[default]
    Islands,
    /// One simulation over every node on the whole canvas.
    Whole,
}

/// Parameters of the visualization export.
#[derive(Debug, Clone, PartialEq)]
pub struct VisualizationConfig {
    pub width: f64,
    pub height: f64,
    pub strategy: LayoutStrategy,
}

impl VisualizationConfig {
    pub fn new(width: f64, height: f64, strategy: LayoutStrategy) -> VisualizationConfig {
        VisualizationConfig { width, height, strategy }
    }
}

impl Default for VisualizationConfig {
    fn default() -> Self {
        VisualizationConfig::new(DEFAULT_CANVAS_WIDTH, DEFAULT_CANVAS_HEIGHT, LayoutStrategy::Islands)
    }
}
