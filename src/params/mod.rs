//! Parameter definitions with physical units and documented semantics.
//!
//! All magic numbers are extracted here with:
//! - Physical units (meters, seconds, kilometers, etc.)
//! - Documented ranges and meanings
//! - Clamping at the setter so downstream stages never see degenerate input

mod cascade;
mod simulation;

// Re-export all types
pub use cascade::{default_cascades, spectrum_constants, CascadeParameters};
pub use simulation::{MapResolution, SimulationSettings, UpdateGate, MAX_MAP_SIZE, MIN_MAP_SIZE};
