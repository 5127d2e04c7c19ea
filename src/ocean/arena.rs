//! Storage for every cascade: baked spectra, the batched spectral buffer,
//! the transform and the double-buffered output frame.
//!
//! An arena is built completely before it replaces the previous one, so a
//! failed allocation leaves the old arena (and the manager) untouched.

use bytemuck::{Pod, Zeroable};
use glam::Vec4;
use log::info;
use rayon::prelude::*;
use rustfft::num_complex::Complex32;

use super::compose::{compose_into, ComposeTargets, SpatialFields};
use super::evolve::{evolve_fields_into, SPECTRAL_CHANNELS};
use super::fft::SpectralTransform;
use super::spectrum::InitialSpectrum;
use crate::error::{OceanError, Result};
use crate::params::{CascadeParameters, MapResolution};

/// Texture arrays always have at least this many layers
pub const MIN_ARRAY_LAYERS: usize = 2;

/// Vec of `len` copies of `value`, reserved without aborting on failure
pub(crate) fn try_filled<T: Clone>(len: usize, value: T, what: &'static str) -> Result<Vec<T>> {
    let mut data = Vec::new();
    data.try_reserve_exact(len)
        .map_err(|_| OceanError::ResourceExhausted {
            what,
            bytes: len.saturating_mul(std::mem::size_of::<T>()),
        })?;
    data.resize(len, value);
    Ok(data)
}

/// Layered N×N float texture, layer-major then row-major, channels interleaved
#[derive(Debug, Clone)]
pub struct TextureArray {
    size: usize,
    layers: usize,
    channels: usize,
    data: Vec<f32>,
}

impl TextureArray {
    pub fn new(resolution: MapResolution, layers: usize, channels: usize, what: &'static str) -> Result<Self> {
        let size = resolution.size();
        Ok(Self {
            size,
            layers,
            channels,
            data: try_filled(size * size * channels * layers, 0.0, what)?,
        })
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn layers(&self) -> usize {
        self.layers
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    /// Floats per layer
    pub fn layer_len(&self) -> usize {
        self.size * self.size * self.channels
    }

    pub fn layer(&self, layer: usize) -> &[f32] {
        let len = self.layer_len();
        &self.data[layer * len..(layer + 1) * len]
    }

    pub fn layer_mut(&mut self, layer: usize) -> &mut [f32] {
        let len = self.layer_len();
        &mut self.data[layer * len..(layer + 1) * len]
    }

    /// All channels of texel (x, y) in `layer`
    pub fn texel(&self, layer: usize, x: usize, y: usize) -> &[f32] {
        let start = layer * self.layer_len() + (y * self.size + x) * self.channels;
        &self.data[start..start + self.channels]
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.data)
    }

    pub fn clear_layer(&mut self, layer: usize) {
        self.layer_mut(layer).fill(0.0);
    }

    fn allocated_bytes(&self) -> usize {
        self.data.len() * std::mem::size_of::<f32>()
    }
}

/// Per-cascade uniform consumed when sampling the maps.
///
/// The displacement and normal maps already include `displacement_scale`
/// (as choppiness) and `normal_scale`. A consumer samples with `uv_scale`
/// and must not multiply the maps by the other two again; they are
/// published for weighting cascades against each other.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct MapScale {
    /// 1 / tile length (per meter), maps world xz to texture uv
    pub uv_scale: [f32; 2],
    /// Already applied to the displacement map
    pub displacement_scale: f32,
    /// Already applied to the normal map
    pub normal_scale: f32,
}

impl MapScale {
    pub fn from_parameters(params: &CascadeParameters) -> Self {
        let tile = params.tile_length();
        Self {
            uv_scale: [1.0 / tile.x, 1.0 / tile.y],
            displacement_scale: params.displacement_scale(),
            normal_scale: params.normal_scale(),
        }
    }

    pub fn to_vec4(self) -> Vec4 {
        Vec4::new(
            self.uv_scale[0],
            self.uv_scale[1],
            self.displacement_scale,
            self.normal_scale,
        )
    }
}

/// One published set of output maps
#[derive(Debug, Clone)]
pub struct OceanFrame {
    /// (x offset, height, z offset) per texel
    displacement: TextureArray,
    /// Unit surface normal per texel
    normal: TextureArray,
    /// Foam coverage in [0, 1]
    foam: TextureArray,
    map_scales: Vec<MapScale>,
    cascade_count: usize,
    sequence: u64,
}

impl OceanFrame {
    fn new(resolution: MapResolution, cascade_count: usize) -> Result<Self> {
        let layers = cascade_count.max(MIN_ARRAY_LAYERS);
        Ok(Self {
            displacement: TextureArray::new(resolution, layers, 3, "displacement maps")?,
            normal: TextureArray::new(resolution, layers, 3, "normal maps")?,
            foam: TextureArray::new(resolution, layers, 1, "foam maps")?,
            map_scales: try_filled(cascade_count, MapScale::zeroed(), "map scales")?,
            cascade_count,
            sequence: 0,
        })
    }

    pub fn displacement(&self) -> &TextureArray {
        &self.displacement
    }

    pub fn normal(&self) -> &TextureArray {
        &self.normal
    }

    pub fn foam(&self) -> &TextureArray {
        &self.foam
    }

    pub fn map_scales(&self) -> &[MapScale] {
        &self.map_scales
    }

    pub fn cascade_count(&self) -> usize {
        self.cascade_count
    }

    /// Number of steps published before this frame (0 for the initial frame)
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Layers in each texture array: max(2, cascade count)
    pub fn layers(&self) -> usize {
        self.foam.layers()
    }
}

/// Every per-cascade buffer for one (resolution, cascade count) pair
#[derive(Debug)]
pub struct CascadeArena {
    resolution: MapResolution,
    cascade_count: usize,
    pub(crate) spectra: Vec<InitialSpectrum>,
    /// Packed spectral channels, cascade-major: count × SPECTRAL_CHANNELS × N²
    spectral: Vec<Complex32>,
    transform: SpectralTransform,
    front: OceanFrame,
    back: OceanFrame,
}

impl CascadeArena {
    pub fn allocate(resolution: MapResolution, cascade_count: usize) -> Result<Self> {
        let channel_layers = cascade_count * SPECTRAL_CHANNELS;
        let mut spectra = Vec::new();
        spectra
            .try_reserve_exact(cascade_count)
            .map_err(|_| OceanError::ResourceExhausted {
                what: "spectrum slots",
                bytes: cascade_count * std::mem::size_of::<InitialSpectrum>(),
            })?;
        for _ in 0..cascade_count {
            spectra.push(InitialSpectrum::zeroed(resolution)?);
        }

        let arena = Self {
            resolution,
            cascade_count,
            spectra,
            spectral: try_filled(
                channel_layers * resolution.cells(),
                Complex32::new(0.0, 0.0),
                "spectral channels",
            )?,
            transform: SpectralTransform::new(resolution, channel_layers)?,
            front: OceanFrame::new(resolution, cascade_count)?,
            back: OceanFrame::new(resolution, cascade_count)?,
        };

        info!(
            "Allocated cascade arena: {} cascades at {} ({:.1} MiB)",
            cascade_count,
            resolution,
            arena.allocated_bytes() as f64 / (1024.0 * 1024.0)
        );
        Ok(arena)
    }

    pub fn resolution(&self) -> MapResolution {
        self.resolution
    }

    pub fn cascade_count(&self) -> usize {
        self.cascade_count
    }

    /// Last published frame
    pub fn front(&self) -> &OceanFrame {
        &self.front
    }

    pub fn allocated_bytes(&self) -> usize {
        let spectra: usize = self
            .spectra
            .iter()
            .map(|s| {
                s.coefficients().len() * std::mem::size_of::<Complex32>()
                    + (s.omega().len() + s.travel().len()) * std::mem::size_of::<f32>()
            })
            .sum();
        let frame = |f: &OceanFrame| {
            f.displacement.allocated_bytes() + f.normal.allocated_bytes() + f.foam.allocated_bytes()
        };
        spectra
            + self.spectral.len() * std::mem::size_of::<Complex32>()
            + self.transform.allocated_bytes()
            + frame(&self.front)
            + frame(&self.back)
    }

    pub(crate) fn publish_scales(&mut self, map_scales: &[MapScale]) {
        self.front.map_scales.copy_from_slice(map_scales);
        self.back.map_scales.copy_from_slice(map_scales);
    }

    /// Zeroes a cascade's foam history in both frames
    pub(crate) fn clear_foam(&mut self, cascade: usize) {
        self.front.foam.clear_layer(cascade);
        self.back.foam.clear_layer(cascade);
    }

    /// Evolves, transforms and composes every cascade into the back frame,
    /// then publishes it.
    pub(crate) fn compute(
        &mut self,
        cascades: &[CascadeParameters],
        times_s: &[f64],
        delta_s: f32,
        map_scales: &[MapScale],
    ) {
        let cells = self.resolution.cells();
        let block = SPECTRAL_CHANNELS * cells;
        let count = self.cascade_count;
        debug_assert_eq!(cascades.len(), count);

        self.spectral
            .par_chunks_mut(block)
            .zip(self.spectra.par_iter())
            .zip(times_s.par_iter())
            .for_each(|((fields, spectrum), &time_s)| {
                evolve_fields_into(spectrum, time_s, fields);
            });

        self.transform.inverse_2d(&mut self.spectral);

        let back = &mut self.back;
        let displacement_len = back.displacement.layer_len();
        let normal_len = back.normal.layer_len();
        let resolution = self.resolution;
        back.displacement.data[..count * displacement_len]
            .par_chunks_mut(displacement_len)
            .zip(back.normal.data[..count * normal_len].par_chunks_mut(normal_len))
            .zip(back.foam.data[..count * cells].par_chunks_mut(cells))
            .zip(self.front.foam.data[..count * cells].par_chunks(cells))
            .zip(self.spectral.par_chunks(block))
            .zip(cascades.par_iter())
            .for_each(|(((((displacement, normal), foam), prev_foam), spatial), params)| {
                let fields = SpatialFields::new(resolution, spatial);
                let targets = ComposeTargets {
                    displacement,
                    normal,
                    foam,
                };
                compose_into(&fields, params, delta_s, prev_foam, targets);
            });

        back.map_scales.copy_from_slice(map_scales);
        back.sequence = self.front.sequence + 1;
        std::mem::swap(&mut self.front, &mut self.back);
    }
}
