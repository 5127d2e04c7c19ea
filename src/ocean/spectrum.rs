//! Initial wave spectrum synthesis.
//!
//! Spectral model: the directional wavenumber spectrum is
//!
//! ```text
//! S(k) = S_TMA(ω) · D(ω, θ) · F(k) · |dω/dk| / |k|
//! ```
//!
//! - `S_TMA`: JONSWAP (Hasselmann et al. 1973) with fetch-limited α and peak
//!   frequency, times the Kitaigorodskii finite-depth attenuation.
//! - `D`: Hasselmann (1980) cosine-power spread around the wind direction, the
//!   power raised by `swell`, blended towards an isotropic spread by `spread`.
//! - `F`: Gaussian fade of short waves, controlled by `detail`.
//! - `ω(k) = sqrt(g·k·tanh(k·h))`, finite-depth dispersion.
//!
//! Only one half of the grid is drawn; the other half is its conjugate mirror,
//! so the inverse transform of the spectrum is real. The DC texel and the
//! Nyquist row/column carry no energy.

use std::f32::consts::PI;

use glam::{IVec2, Vec2};
use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use rustfft::num_complex::Complex32;

use super::arena::try_filled;
use crate::error::Result;
use crate::params::spectrum_constants::{DEPTH_M, GRAVITY};
use crate::params::{CascadeParameters, MapResolution};

/// Short-wave fade length at `detail = 0` (meters)
const FADE_LENGTH_M: f32 = 1.0;

/// Time-invariant spectrum of one cascade, baked by [`synthesize`]
#[derive(Debug, Clone)]
pub struct InitialSpectrum {
    resolution: MapResolution,
    tile_length: Vec2,
    /// h0(k), Hermitian: h0(-k) == conj(h0(k))
    coefficients: Vec<Complex32>,
    /// Angular frequency ω(k) (rad/s)
    omega: Vec<f32>,
    /// Share of the (k, -k) pair's energy travelling along +k, in [0, 1]
    travel: Vec<f32>,
}

impl InitialSpectrum {
    /// Zeroed spectrum buffers for `resolution`, reserved fallibly
    pub fn zeroed(resolution: MapResolution) -> Result<Self> {
        let cells = resolution.cells();
        Ok(Self {
            resolution,
            tile_length: Vec2::ONE,
            coefficients: try_filled(cells, Complex32::new(0.0, 0.0), "initial spectrum")?,
            omega: try_filled(cells, 0.0, "dispersion table")?,
            travel: try_filled(cells, 0.5, "travel weights")?,
        })
    }

    pub fn resolution(&self) -> MapResolution {
        self.resolution
    }

    pub fn tile_length(&self) -> Vec2 {
        self.tile_length
    }

    pub fn coefficients(&self) -> &[Complex32] {
        &self.coefficients
    }

    pub fn omega(&self) -> &[f32] {
        &self.omega
    }

    pub fn travel(&self) -> &[f32] {
        &self.travel
    }

    /// Coefficient at texel (x, y)
    pub fn coefficient(&self, x: usize, y: usize) -> Complex32 {
        self.coefficients[y * self.resolution.size() + x]
    }

    /// Wavevector (rad/m) of texel `index`
    pub fn wavevector(&self, index: usize) -> Vec2 {
        wavevector(self.resolution, self.tile_length, index)
    }
}

/// Wavevector of texel `index`: the grid is centered, texel N/2 holds k = 0.
pub fn wavevector(resolution: MapResolution, tile_length: Vec2, index: usize) -> Vec2 {
    let n = resolution.size();
    let (x, y) = (index % n, index / n);
    let half = (n / 2) as f32;
    let dk = 2.0 * PI / tile_length;
    Vec2::new(x as f32 - half, y as f32 - half) * dk
}

/// Index of the texel holding -k for texel `index`
pub fn mirror_index(resolution: MapResolution, index: usize) -> usize {
    let n = resolution.size();
    let (x, y) = (index % n, index / n);
    ((n - y) % n) * n + (n - x) % n
}

/// Builds the initial spectrum for one cascade.
pub fn synthesize(
    params: &CascadeParameters,
    resolution: MapResolution,
    seed: IVec2,
) -> Result<InitialSpectrum> {
    let mut spectrum = InitialSpectrum::zeroed(resolution)?;
    synthesize_into(params, seed, &mut spectrum);
    Ok(spectrum)
}

/// Rebuilds `spectrum` in place (its resolution is kept).
pub fn synthesize_into(params: &CascadeParameters, seed: IVec2, spectrum: &mut InitialSpectrum) {
    let resolution = spectrum.resolution;
    let n = resolution.size();
    spectrum.tile_length = params.tile_length();

    let model = SpectrumModel::new(params);
    let tile_length = spectrum.tile_length;
    let dk = 2.0 * PI / tile_length;
    let cell_area = dk.x * dk.y;

    spectrum
        .coefficients
        .par_chunks_mut(n)
        .zip(spectrum.omega.par_chunks_mut(n))
        .zip(spectrum.travel.par_chunks_mut(n))
        .enumerate()
        .for_each(|(y, ((coefficients, omega), travel))| {
            for x in 0..n {
                let index = y * n + x;
                let mirror = mirror_index(resolution, index);
                // DC keeps the mean height at zero. The Nyquist row and column
                // alias onto themselves, where odd-in-k fields (slopes,
                // horizontal displacement) cannot stay conjugate-symmetric.
                if index == mirror || x == 0 || y == 0 {
                    coefficients[x] = Complex32::new(0.0, 0.0);
                    omega[x] = 0.0;
                    travel[x] = 0.5;
                    continue;
                }

                let k = wavevector(resolution, tile_length, index);
                let k_mirror = wavevector(resolution, tile_length, mirror);
                let density = model.density(k);
                let density_mirror = model.density(k_mirror);
                let pair_density = 0.5 * (density + density_mirror);
                let amplitude = (pair_density * cell_area * 0.5).sqrt();

                // The lower index of each pair owns the draw; the other half mirrors it
                let owner = index.min(mirror);
                let (g1, g2) = gaussian_pair(seed, owner);
                let drawn = Complex32::new(g1, g2) * amplitude;
                coefficients[x] = if index < mirror { drawn } else { drawn.conj() };

                omega[x] = dispersion(k.length()).0;
                let total = density + density_mirror;
                travel[x] = if total > 0.0 { density / total } else { 0.5 };
            }
        });

    debug!(
        "Synthesized {} spectrum (tile {:?} m, seed {:?})",
        resolution, tile_length, seed
    );
}

/// Spectrum terms that depend only on the cascade parameters
#[derive(Debug, Clone, Copy)]
struct SpectrumModel {
    alpha: f32,
    peak_omega: f32,
    wind_speed: f32,
    wind_angle: f32,
    swell: f32,
    spread: f32,
    fade_length_sq: f32,
}

impl SpectrumModel {
    fn new(params: &CascadeParameters) -> Self {
        let wind_speed = params.wind_speed();
        let fetch_m = params.fetch_length() * 1000.0;
        let fade_length = (1.0 - params.detail()) * FADE_LENGTH_M;
        Self {
            alpha: 0.076 * (wind_speed * wind_speed / (fetch_m * GRAVITY)).powf(0.22),
            peak_omega: 22.0 * (GRAVITY * GRAVITY / (wind_speed * fetch_m)).powf(1.0 / 3.0),
            wind_speed,
            wind_angle: params.wind_direction().to_radians(),
            swell: params.swell(),
            spread: params.spread(),
            fade_length_sq: fade_length * fade_length,
        }
    }

    /// Directional wavenumber spectral density at `k` (m⁴ per rad²/m²)
    fn density(&self, k: Vec2) -> f32 {
        let k_length = k.length();
        if k_length <= f32::EPSILON {
            return 0.0;
        }
        let (omega, d_omega) = dispersion(k_length);
        let theta = k.y.atan2(k.x) - self.wind_angle;

        let density = self.tma(omega)
            * self.directional_spread(omega, theta)
            * (-k_length * k_length * self.fade_length_sq).exp()
            * d_omega.abs()
            / k_length;
        if density.is_finite() {
            density.max(0.0)
        } else {
            0.0
        }
    }

    fn tma(&self, omega: f32) -> f32 {
        const BETA: f32 = 1.25;
        const GAMMA: f32 = 3.3;
        let peak = self.peak_omega;
        let sigma = if omega <= peak { 0.07 } else { 0.09 };
        let r = (-(omega - peak).powi(2) / (2.0 * sigma * sigma * peak * peak)).exp();
        let jonswap = self.alpha * GRAVITY * GRAVITY / omega.powi(5)
            * (-BETA * (peak / omega).powi(4)).exp()
            * GAMMA.powf(r);

        let omega_h = (omega * (DEPTH_M / GRAVITY).sqrt()).min(2.0);
        let depth_attenuation = if omega_h <= 1.0 {
            0.5 * omega_h * omega_h
        } else {
            1.0 - 0.5 * (2.0 - omega_h).powi(2)
        };
        jonswap * depth_attenuation
    }

    fn directional_spread(&self, omega: f32, theta: f32) -> f32 {
        let ratio = omega / self.peak_omega;
        let s = if omega <= self.peak_omega {
            6.97 * ratio.powf(4.06)
        } else {
            let exponent = -2.33 - 1.45 * (self.wind_speed * self.peak_omega / GRAVITY - 1.17);
            9.77 * ratio.powf(exponent)
        };
        let s_swell = 16.0 * (self.peak_omega / omega).tanh() * self.swell * self.swell;
        let s = s + s_swell;

        let hasselmann = spread_normalization(s) * (0.5 * theta).cos().abs().powf(2.0 * s);
        let isotropic = 1.0 / (2.0 * PI);
        hasselmann + (isotropic - hasselmann) * self.spread
    }
}

/// Normalization of `|cos(θ/2)|^(2s)` over a full turn (polynomial fit)
fn spread_normalization(s: f32) -> f32 {
    let (s2, s3, s4) = (s * s, s * s * s, s * s * s * s);
    if s < 5.0 {
        -0.000564 * s4 + 0.00776 * s3 - 0.044 * s2 + 0.192 * s + 0.163
    } else {
        -4.80e-08 * s4 + 1.07e-05 * s3 - 9.53e-04 * s2 + 5.90e-02 * s + 3.93e-01
    }
}

/// Finite-depth dispersion: returns (ω, dω/dk)
pub fn dispersion(k: f32) -> (f32, f32) {
    let a = k * DEPTH_M;
    let b = a.tanh();
    let omega = (GRAVITY * k * b).sqrt();
    if omega <= 0.0 {
        return (0.0, 0.0);
    }
    let d_omega = 0.5 * GRAVITY * (b + a * (1.0 - b * b)) / omega;
    (omega, d_omega)
}

/// Two independent unit Gaussians for texel `index` (Box-Muller).
///
/// Seeded from the cascade seed and the texel index alone, so any texel can
/// be drawn in any order and always gets the same values.
fn gaussian_pair(seed: IVec2, index: usize) -> (f32, f32) {
    let mut rng = StdRng::seed_from_u64(cell_seed(seed, index));
    let u1 = 1.0 - rng.gen::<f32>(); // (0, 1], keeps ln finite
    let u2 = rng.gen::<f32>();
    let radius = (-2.0 * u1.ln()).sqrt();
    let angle = 2.0 * PI * u2;
    (radius * angle.cos(), radius * angle.sin())
}

fn cell_seed(seed: IVec2, index: usize) -> u64 {
    let mut h = ((seed.x as u32 as u64) << 32) | seed.y as u32 as u64;
    h ^= (index as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    // splitmix64 finalizer
    h = (h ^ (h >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    h = (h ^ (h >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    h ^ (h >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference_spectrum() -> InitialSpectrum {
        let params = CascadeParameters::default()
            .with_wind(20.0, 0.0)
            .with_fetch_length(550.0);
        synthesize(&params, MapResolution::R256, IVec2::ZERO).unwrap()
    }

    #[test]
    fn test_hermitian_symmetry() {
        let spectrum = reference_spectrum();
        let resolution = spectrum.resolution();
        for (index, value) in spectrum.coefficients().iter().enumerate() {
            let mirror = spectrum.coefficients()[mirror_index(resolution, index)];
            assert_eq!(mirror, value.conj(), "texel {}", index);
        }
    }

    #[test]
    fn test_reference_scenario() {
        let spectrum = reference_spectrum();
        let n = spectrum.resolution().size();

        // DC term exactly zero
        assert_eq!(spectrum.coefficient(n / 2, n / 2), Complex32::new(0.0, 0.0));

        // Not degenerate
        let energy: f32 = spectrum.coefficients().iter().map(|c| c.norm_sqr()).sum();
        assert!(energy > 0.0);
        assert!(spectrum.coefficients().iter().all(|c| c.re.is_finite() && c.im.is_finite()));

        // Amplitudes symmetric about k = 0
        for y in 1..n {
            for x in 1..n {
                let a = spectrum.coefficient(x, y).norm();
                let b = spectrum.coefficient(n - x, n - y).norm();
                assert_eq!(a, b);
            }
        }
    }

    #[test]
    fn test_deterministic_for_seed() {
        let params = CascadeParameters::default();
        let a = synthesize(&params, MapResolution::R128, IVec2::new(3, 9)).unwrap();
        let b = synthesize(&params, MapResolution::R128, IVec2::new(3, 9)).unwrap();
        let c = synthesize(&params, MapResolution::R128, IVec2::new(4, 9)).unwrap();
        assert_eq!(a.coefficients(), b.coefficients());
        assert_ne!(a.coefficients(), c.coefficients());
    }

    #[test]
    fn test_travel_weights_pair_up() {
        let spectrum = reference_spectrum();
        let resolution = spectrum.resolution();
        for index in 0..resolution.cells() {
            let mirror = mirror_index(resolution, index);
            let (p, q) = (spectrum.travel()[index], spectrum.travel()[mirror]);
            assert!((0.0..=1.0).contains(&p));
            if index != mirror {
                assert!((p + q - 1.0).abs() < 1e-5);
            }
        }
    }

    #[test]
    fn test_waves_travel_downwind() {
        let spectrum = reference_spectrum();
        let n = spectrum.resolution().size();
        // Wind blows along +x: a texel on the +x axis should favour +k travel
        let downwind = (n / 2) * n + n / 2 + 4;
        assert!(spectrum.wavevector(downwind).x > 0.0);
        assert!(spectrum.travel()[downwind] > 0.5);
    }

    #[test]
    fn test_dispersion_deep_water_limit() {
        // Deep water (k·h >> 1): ω ≈ sqrt(g·k)
        let k = 2.0;
        let (omega, d_omega) = dispersion(k);
        assert!((omega - (GRAVITY * k).sqrt()).abs() < 1e-3);
        assert!((d_omega - 0.5 * omega / k).abs() < 1e-3);
    }

    #[test]
    fn test_detail_attenuates_short_waves() {
        let sharp = synthesize(&CascadeParameters::default(), MapResolution::R128, IVec2::ZERO)
            .unwrap();
        let mut soft_params = CascadeParameters::default();
        soft_params.set_detail(0.0);
        let soft = synthesize(&soft_params, MapResolution::R128, IVec2::ZERO).unwrap();

        // Highest-frequency texel off the Nyquist row/column
        assert!(soft.coefficient(1, 1).norm() < sharp.coefficient(1, 1).norm());
    }
}
