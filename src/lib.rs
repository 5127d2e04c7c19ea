//! oceanfft - Multi-cascade spectral ocean wave synthesis

pub mod cli;
pub mod error;
pub mod gpu;
pub mod ocean;
pub mod params;
