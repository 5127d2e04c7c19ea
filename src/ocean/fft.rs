//! Batched 2D inverse FFT.
//!
//! Each 1D transform is radix-2 decimation in time: a bit-reversal reorder
//! followed by log2(N) butterfly passes reading a precomputed twiddle table.
//! A 2D transform runs a row pass, a transpose, a second row pass and a
//! transpose back. Every pass covers all rows of all layers (every channel of
//! every cascade) in one parallel dispatch.
//!
//! Spectra are stored centered (texel N/2 holds k = 0), which makes the raw
//! output alternate sign per texel; the final pass multiplies by (-1)^(x+y).
//! No 1/N² normalization is applied: amplitudes are already physical.

use std::f64::consts::TAU;

use rayon::prelude::*;
use rustfft::num_complex::Complex32;

use super::arena::try_filled;
use crate::error::Result;
use crate::params::MapResolution;

/// Bit-reversal permutation and inverse twiddles for one transform size
#[derive(Debug, Clone)]
pub struct ButterflyTable {
    size: usize,
    bit_reverse: Vec<u32>,
    /// e^{+2πik/N} for k in 0..N/2
    twiddles: Vec<Complex32>,
}

impl ButterflyTable {
    pub fn new(resolution: MapResolution) -> Result<Self> {
        let size = resolution.size();
        let stages = resolution.fft_stages();

        let mut bit_reverse = try_filled(size, 0u32, "bit-reversal table")?;
        for (i, slot) in bit_reverse.iter_mut().enumerate() {
            *slot = (i as u32).reverse_bits() >> (32 - stages);
        }

        let mut twiddles = try_filled(size / 2, Complex32::new(1.0, 0.0), "butterfly factors")?;
        for (k, slot) in twiddles.iter_mut().enumerate() {
            let angle = TAU * k as f64 / size as f64;
            *slot = Complex32::new(angle.cos() as f32, angle.sin() as f32);
        }

        Ok(Self {
            size,
            bit_reverse,
            twiddles,
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Unnormalized inverse DFT of one row, in place
    pub fn inverse_in_place(&self, row: &mut [Complex32]) {
        let n = self.size;
        debug_assert_eq!(row.len(), n);

        for i in 0..n {
            let j = self.bit_reverse[i] as usize;
            if i < j {
                row.swap(i, j);
            }
        }

        let mut half = 1;
        while half < n {
            let twiddle_stride = n / (2 * half);
            for start in (0..n).step_by(2 * half) {
                for k in 0..half {
                    let w = self.twiddles[k * twiddle_stride];
                    let a = row[start + k];
                    let b = row[start + k + half] * w;
                    row[start + k] = a + b;
                    row[start + k + half] = a - b;
                }
            }
            half *= 2;
        }
    }
}

/// Inverse transform for a batch of N×N layers, owning its transpose buffer
#[derive(Debug)]
pub struct SpectralTransform {
    resolution: MapResolution,
    table: ButterflyTable,
    scratch: Vec<Complex32>,
}

impl SpectralTransform {
    /// Transform able to process up to `max_layers` layers per call
    pub fn new(resolution: MapResolution, max_layers: usize) -> Result<Self> {
        Ok(Self {
            resolution,
            table: ButterflyTable::new(resolution)?,
            scratch: try_filled(
                resolution.cells() * max_layers,
                Complex32::new(0.0, 0.0),
                "transform scratch",
            )?,
        })
    }

    pub fn resolution(&self) -> MapResolution {
        self.resolution
    }

    /// Bytes held by the twiddle table and transpose buffer
    pub fn allocated_bytes(&self) -> usize {
        (self.scratch.len() + self.table.twiddles.len()) * std::mem::size_of::<Complex32>()
            + self.table.bit_reverse.len() * std::mem::size_of::<u32>()
    }

    /// In-place 2D inverse transform of every layer in `layers`
    pub fn inverse_2d(&mut self, layers: &mut [Complex32]) {
        let n = self.resolution.size();
        let cells = self.resolution.cells();
        assert_eq!(layers.len() % cells, 0, "batch is not a whole number of layers");
        assert!(layers.len() <= self.scratch.len(), "batch exceeds transform capacity");

        let table = &self.table;
        let scratch = &mut self.scratch[..layers.len()];

        layers
            .par_chunks_mut(n)
            .for_each(|row| table.inverse_in_place(row));
        transpose_layers(layers, scratch, n);
        scratch
            .par_chunks_mut(n)
            .for_each(|row| table.inverse_in_place(row));
        transpose_layers(scratch, layers, n);

        layers.par_chunks_mut(n).enumerate().for_each(|(row_index, row)| {
            let y = row_index % n;
            for (x, value) in row.iter_mut().enumerate() {
                if (x + y) % 2 == 1 {
                    *value = -*value;
                }
            }
        });
    }
}

/// Inverse transform of a single centered N×N field
pub fn inverse_transform(field: &[Complex32], resolution: MapResolution) -> Result<Vec<Complex32>> {
    let mut transform = SpectralTransform::new(resolution, 1)?;
    let mut output = try_filled(field.len(), Complex32::new(0.0, 0.0), "spatial field")?;
    output.copy_from_slice(field);
    transform.inverse_2d(&mut output);
    Ok(output)
}

fn transpose_layers(src: &[Complex32], dst: &mut [Complex32], n: usize) {
    dst.par_chunks_mut(n * n)
        .zip(src.par_chunks(n * n))
        .for_each(|(dst_layer, src_layer)| {
            for y in 0..n {
                for x in 0..n {
                    dst_layer[x * n + y] = src_layer[y * n + x];
                }
            }
        });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocean::evolve::evolve;
    use crate::ocean::spectrum::synthesize;
    use crate::params::CascadeParameters;
    use glam::IVec2;
    use rustfft::FftPlanner;

    /// Reference: rustfft inverse over rows then columns, then the sign fix
    fn reference_inverse(field: &[Complex32], n: usize) -> Vec<Complex32> {
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_inverse(n);
        let mut data = field.to_vec();
        for row in data.chunks_mut(n) {
            fft.process(row);
        }
        let mut column = vec![Complex32::new(0.0, 0.0); n];
        for x in 0..n {
            for y in 0..n {
                column[y] = data[y * n + x];
            }
            fft.process(&mut column);
            for y in 0..n {
                let sign = if (x + y) % 2 == 1 { -1.0 } else { 1.0 };
                data[y * n + x] = column[y] * sign;
            }
        }
        data
    }

    fn test_field(n: usize) -> Vec<Complex32> {
        (0..n * n)
            .map(|i| {
                let t = i as f32;
                Complex32::new((t * 0.37).sin(), (t * 0.11).cos() * 0.5)
            })
            .collect()
    }

    #[test]
    fn test_matches_rustfft() {
        let resolution = MapResolution::new(32).unwrap();
        let field = test_field(32);
        let ours = inverse_transform(&field, resolution).unwrap();
        let reference = reference_inverse(&field, 32);
        for (a, b) in ours.iter().zip(&reference) {
            assert!((a - b).norm() < 1e-3, "{} vs {}", a, b);
        }
    }

    #[test]
    fn test_batched_layers_are_independent() {
        let resolution = MapResolution::new(16).unwrap();
        let first = test_field(16);
        let second: Vec<Complex32> = first.iter().map(|c| c * 2.0 + 1.0).collect();

        let mut batch = first.clone();
        batch.extend_from_slice(&second);
        let mut transform = SpectralTransform::new(resolution, 2).unwrap();
        transform.inverse_2d(&mut batch);

        let a = inverse_transform(&first, resolution).unwrap();
        let b = inverse_transform(&second, resolution).unwrap();
        assert_eq!(&batch[..256], &a[..]);
        assert_eq!(&batch[256..], &b[..]);
    }

    #[test]
    fn test_single_mode_produces_plane_wave() {
        // One Hermitian pair at k = (1, 0) texels from center: cos(2πx/N)
        let n = 16;
        let resolution = MapResolution::new(n as u32).unwrap();
        let mut field = vec![Complex32::new(0.0, 0.0); n * n];
        field[(n / 2) * n + n / 2 + 1] = Complex32::new(0.5, 0.0);
        field[(n / 2) * n + n / 2 - 1] = Complex32::new(0.5, 0.0);
        let spatial = inverse_transform(&field, resolution).unwrap();
        for y in 0..n {
            for x in 0..n {
                let expected = (TAU as f32 * x as f32 / n as f32).cos();
                assert!((spatial[y * n + x].re - expected).abs() < 1e-5);
                assert!(spatial[y * n + x].im.abs() < 1e-5);
            }
        }
    }

    #[test]
    fn test_height_field_is_real_with_zero_mean() {
        let params = CascadeParameters::default();
        let initial = synthesize(&params, MapResolution::R256, IVec2::ZERO).unwrap();
        for time in [0.0, 17.5] {
            let evolved = evolve(&initial, time).unwrap();
            let height = inverse_transform(evolved.values(), MapResolution::R256).unwrap();

            let magnitude = height.iter().map(|c| c.re.abs()).fold(0.0f32, f32::max);
            assert!(magnitude > 0.0);
            let residual = height.iter().map(|c| c.im.abs()).fold(0.0f32, f32::max);
            assert!(residual < 1e-4 * magnitude, "imaginary residual {}", residual);

            let mean = height.iter().map(|c| c.re as f64).sum::<f64>() / height.len() as f64;
            assert!(mean.abs() < 1e-4 * magnitude as f64, "mean {}", mean);
        }
    }
}
