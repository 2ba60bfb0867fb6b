// Shared simulation/visual tuning constants used by both web and native frontends.

// Particle grid
pub const DEFAULT_GRID_WIDTH: u32 = 32; // capacity = width², 1024 slots
pub const MAX_GRID_WIDTH: u32 = 256;

// Sphere layout (world units)
pub const CONTRACTED_RADIUS: f32 = 0.9; // fully inhaled
pub const EXPANDED_RADIUS: f32 = 2.2; // fully exhaled

// Spring model
pub const SPRING_STIFFNESS: f32 = 6.0;
pub const VELOCITY_DAMPING: f32 = 0.92; // per tick, must stay below 1
pub const NOISE_STRENGTH: f32 = 0.35;
pub const VARIANCE_MIN: f32 = 0.8;
pub const VARIANCE_MAX: f32 = 1.2;
pub const VARIANCE_RADIUS_WEIGHT: f32 = 0.15; // share of variance applied to target radius

// Integration
pub const MAX_DELTA_TIME: f32 = 0.1; // seconds; guards against backgrounded tabs
pub const LIFE_STEP: f32 = 0.015; // max life change per tick

// Rendering
pub const BASE_POINT_SIZE: f32 = 0.045;
pub const VISIBILITY_THRESHOLD: f32 = 0.01;
pub const SIZE_ATTENUATION: f32 = 1.2; // ~ 1 / (2 tan(fov/2)) for a 45° lens
pub const SHIMMER_RATE: f32 = 1.7;
pub const SHIMMER_DEPTH: f32 = 0.15;

// Presence overlay
pub const SPARK_DURATION_SEC: f32 = 1.2;
pub const SPARK_BOOST: f32 = 1.8;
pub const FIREFLY_CAP: usize = 24;
pub const FIREFLY_FADE_IN_SEC: f32 = 1.5;
pub const FIREFLY_FADE_OUT_SEC: f32 = 2.0;
pub const FIREFLY_RING_SCALE: f32 = 1.3; // ring radius relative to expanded radius
pub const FIREFLY_SIZE: f32 = 0.09;

// Default palette, one entry per mood id (wraps for larger ids)
pub const DEFAULT_MOOD_COLORS: [[f32; 3]; 4] = [
    [0.55, 0.75, 1.00], // calm blue
    [0.65, 0.95, 0.75], // grateful green
    [1.00, 0.78, 0.55], // warm amber
    [0.90, 0.62, 0.95], // connected violet
];

// Bulk particle tint
pub const PARTICLE_BASE_COLOR: [f32; 3] = [0.70, 0.82, 1.00];
