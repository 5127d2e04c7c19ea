//! Time evolution of a baked spectrum.
//!
//! `h(k, t) = h0(k)·w⁺·e^{iωt} + conj(h0(-k))·w⁻·e^{-iωt}`
//!
//! `w⁻ = sqrt(p)` weights the part of the (k, -k) pair travelling along +k and
//! `w⁺ = sqrt(1 - p)` the part travelling along -k. Both weights come from the
//! directional spread at synthesis, so downwind waves travel downwind. The
//! result is Hermitian at every t and the field is never re-randomized.

use std::f64::consts::TAU;

use rayon::prelude::*;
use rustfft::num_complex::Complex32;

use super::arena::try_filled;
use super::spectrum::{mirror_index, InitialSpectrum};
use crate::error::Result;
use crate::params::MapResolution;

/// Complex channels per cascade handed to the inverse transform.
///
/// Two real fields share each channel as `a + i·b` (both Hermitian), so the
/// transform yields `a` in the real part and `b` in the imaginary part:
///
/// | channel | real part    | imaginary part |
/// |---------|--------------|----------------|
/// | 0       | height       | x displacement |
/// | 1       | z displacement | x slope      |
/// | 2       | z slope      | ∂Dx/∂x         |
/// | 3       | ∂Dz/∂z       | ∂Dx/∂z         |
pub const SPECTRAL_CHANNELS: usize = 4;

/// Height spectrum at one simulation time
#[derive(Debug, Clone)]
pub struct EvolvedSpectrum {
    resolution: MapResolution,
    values: Vec<Complex32>,
}

impl EvolvedSpectrum {
    pub fn resolution(&self) -> MapResolution {
        self.resolution
    }

    pub fn values(&self) -> &[Complex32] {
        &self.values
    }

    pub fn into_values(self) -> Vec<Complex32> {
        self.values
    }
}

/// Advances `initial` to `time_s` seconds.
pub fn evolve(initial: &InitialSpectrum, time_s: f64) -> Result<EvolvedSpectrum> {
    let resolution = initial.resolution();
    let mut values = try_filled(resolution.cells(), Complex32::new(0.0, 0.0), "evolved spectrum")?;
    let n = resolution.size();
    values
        .par_chunks_mut(n)
        .enumerate()
        .for_each(|(y, row)| {
            for (x, value) in row.iter_mut().enumerate() {
                *value = evolved_coefficient(initial, y * n + x, time_s);
            }
        });
    Ok(EvolvedSpectrum { resolution, values })
}

/// Advances `initial` to `time_s` and expands it into the packed
/// [`SPECTRAL_CHANNELS`] layout, channel-major, in `out`.
pub fn evolve_fields_into(initial: &InitialSpectrum, time_s: f64, out: &mut [Complex32]) {
    let resolution = initial.resolution();
    let cells = resolution.cells();
    let n = resolution.size();
    assert_eq!(out.len(), SPECTRAL_CHANNELS * cells);

    let (height_channel, rest) = out.split_at_mut(cells);
    let (displacement_channel, rest) = rest.split_at_mut(cells);
    let (slope_channel, gradient_channel) = rest.split_at_mut(cells);

    height_channel
        .par_chunks_mut(n)
        .zip(displacement_channel.par_chunks_mut(n))
        .zip(slope_channel.par_chunks_mut(n))
        .zip(gradient_channel.par_chunks_mut(n))
        .enumerate()
        .for_each(|(y, (((ch0, ch1), ch2), ch3))| {
            for x in 0..n {
                let index = y * n + x;
                let k = initial.wavevector(index);
                let k_length = k.length();
                if k_length <= f32::EPSILON {
                    ch0[x] = Complex32::new(0.0, 0.0);
                    ch1[x] = Complex32::new(0.0, 0.0);
                    ch2[x] = Complex32::new(0.0, 0.0);
                    ch3[x] = Complex32::new(0.0, 0.0);
                    continue;
                }

                let h = evolved_coefficient(initial, index, time_s);
                let ih = times_i(h);
                let displacement_x = ih * (k.x / k_length);
                let displacement_z = ih * (k.y / k_length);
                let slope_x = ih * k.x;
                let slope_z = ih * k.y;
                let dxdx = h * (-k.x * k.x / k_length);
                let dzdz = h * (-k.y * k.y / k_length);
                let dxdz = h * (-k.x * k.y / k_length);

                ch0[x] = h + times_i(displacement_x);
                ch1[x] = displacement_z + times_i(slope_x);
                ch2[x] = slope_z + times_i(dxdx);
                ch3[x] = dzdz + times_i(dxdz);
            }
        });
}

fn evolved_coefficient(initial: &InitialSpectrum, index: usize, time_s: f64) -> Complex32 {
    let h0 = initial.coefficients()[index];
    let h0_mirror = initial.coefficients()[mirror_index(initial.resolution(), index)].conj();
    let along_k = initial.travel()[index];

    let phase = (initial.omega()[index] as f64 * time_s).rem_euclid(TAU) as f32;
    let (sin, cos) = phase.sin_cos();
    let forward = Complex32::new(cos, sin);

    h0 * forward * (1.0 - along_k).sqrt() + h0_mirror * forward.conj() * along_k.sqrt()
}

#[inline]
fn times_i(value: Complex32) -> Complex32 {
    Complex32::new(-value.im, value.re)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocean::spectrum::synthesize;
    use crate::params::CascadeParameters;
    use glam::IVec2;

    fn spectrum() -> InitialSpectrum {
        synthesize(&CascadeParameters::default(), MapResolution::R128, IVec2::new(11, 5)).unwrap()
    }

    #[test]
    fn test_evolution_stays_hermitian() {
        let initial = spectrum();
        let resolution = initial.resolution();
        for time in [0.0, 1.5, 123.25] {
            let evolved = evolve(&initial, time).unwrap();
            for (index, value) in evolved.values().iter().enumerate() {
                let mirror = evolved.values()[mirror_index(resolution, index)];
                let error = (mirror - value.conj()).norm();
                let scale = initial.coefficients()[index].norm().max(f32::MIN_POSITIVE);
                assert!(error <= 1e-5 * scale, "texel {} t={}", index, time);
            }
        }
    }

    #[test]
    fn test_energy_is_stationary() {
        // Travelling components keep |h(k, t)|² near the baked energy on average
        let initial = spectrum();
        let baked: f32 = initial.coefficients().iter().map(|c| c.norm_sqr()).sum();
        let mean: f32 = (0..32)
            .map(|step| {
                let evolved = evolve(&initial, step as f64 * 0.37).unwrap();
                evolved.values().iter().map(|c| c.norm_sqr()).sum::<f32>()
            })
            .sum::<f32>()
            / 32.0;
        assert!(mean > 0.5 * baked && mean < 1.5 * baked, "baked {} mean {}", baked, mean);
    }

    #[test]
    fn test_evolution_is_deterministic() {
        let initial = spectrum();
        let a = evolve(&initial, 42.0).unwrap();
        let b = evolve(&initial, 42.0).unwrap();
        assert_eq!(a.values(), b.values());
        let c = evolve(&initial, 43.0).unwrap();
        assert_ne!(a.values(), c.values());
    }

    #[test]
    fn test_dc_stays_zero() {
        let initial = spectrum();
        let n = initial.resolution().size();
        let mut fields = vec![Complex32::new(1.0, 1.0); SPECTRAL_CHANNELS * initial.resolution().cells()];
        evolve_fields_into(&initial, 7.0, &mut fields);
        let dc = (n / 2) * n + n / 2;
        for channel in 0..SPECTRAL_CHANNELS {
            assert_eq!(fields[channel * n * n + dc], Complex32::new(0.0, 0.0));
        }
    }
}
