// Web front-end wiring: element ids, attributes and defaults.

// DOM
pub const CANVAS_ID: &str = "app-canvas";
pub const FALLBACK_ID: &str = "fallback";
pub const STATUS_ID: &str = "presence-status";
// Optional `data-*` attributes on the canvas
pub const PATTERN_ATTR: &str = "data-breath-pattern";
pub const GRID_WIDTH_ATTR: &str = "data-grid-width";

// Breathing
pub const DEFAULT_PATTERN: &str = "box";

// Surface
pub const PREFERRED_FORMATS: [wgpu::TextureFormat; 2] = [
    wgpu::TextureFormat::Bgra8UnormSrgb,
    wgpu::TextureFormat::Rgba8UnormSrgb,
];
