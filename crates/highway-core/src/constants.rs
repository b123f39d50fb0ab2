// Shared timing/layout tuning constants used by the frame driver and frontends.

// Timing
pub const HORIZON_MS: f64 = 2500.0; // visible highway lookahead per frame
pub const PROGRESS_MIN_INTERVAL_MS: f64 = 250.0; // progress callback throttle

// Highway layout
pub const HIGHWAY_LENGTH: f32 = 12.0; // world-space depth of the visible highway
pub const LANE_SPACING: f32 = 0.9; // world-space gap between fret lanes
pub const STRIKE_LINE_Z: f32 = 0.0; // where a note's start time meets "now"

// Audio
pub const DEFAULT_VOLUME: f64 = 0.8; // perceptual volume for a fresh instance
