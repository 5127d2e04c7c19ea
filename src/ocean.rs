//! Multi-cascade FFT ocean: spectrum synthesis, time evolution, inverse
//! transform and map composition, orchestrated by [`CascadeManager`].

pub mod arena;
pub mod compose;
pub mod evolve;
pub mod fft;
pub mod manager;
pub mod spectrum;

pub use arena::{CascadeArena, MapScale, OceanFrame, TextureArray, MIN_ARRAY_LAYERS};
pub use compose::{compose, compose_into, jacobian, ComposeTargets, ComposedMaps, SpatialFields};
pub use evolve::{evolve, evolve_fields_into, EvolvedSpectrum, SPECTRAL_CHANNELS};
pub use fft::{inverse_transform, ButterflyTable, SpectralTransform};
pub use manager::{CascadeManager, CascadeState};
pub use spectrum::{dispersion, mirror_index, synthesize, synthesize_into, wavevector, InitialSpectrum};
