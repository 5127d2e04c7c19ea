//! Turns transformed spatial fields into displacement, normal and foam maps.
//!
//! Foam is the only state carried between steps: it grows where the surface
//! Jacobian drops below the whitecap threshold and decays exponentially
//! elsewhere, integrated with the caller's step delta.

use glam::Vec3;
use rayon::prelude::*;
use rustfft::num_complex::Complex32;

use super::arena::try_filled;
use super::evolve::SPECTRAL_CHANNELS;
use crate::error::Result;
use crate::params::{CascadeParameters, MapResolution};

/// Read access to one cascade's transformed channels
#[derive(Debug, Clone, Copy)]
pub struct SpatialFields<'a> {
    resolution: MapResolution,
    data: &'a [Complex32],
}

impl<'a> SpatialFields<'a> {
    pub fn new(resolution: MapResolution, data: &'a [Complex32]) -> Self {
        assert_eq!(data.len(), SPECTRAL_CHANNELS * resolution.cells());
        Self { resolution, data }
    }

    pub fn resolution(&self) -> MapResolution {
        self.resolution
    }

    #[inline]
    fn channel(&self, channel: usize, index: usize) -> Complex32 {
        self.data[channel * self.resolution.cells() + index]
    }

    pub fn height(&self, index: usize) -> f32 {
        self.channel(0, index).re
    }

    /// Horizontal displacement (x, z) before choppiness
    pub fn displacement(&self, index: usize) -> (f32, f32) {
        (self.channel(0, index).im, self.channel(1, index).re)
    }

    /// Height slope (∂h/∂x, ∂h/∂z)
    pub fn slope(&self, index: usize) -> (f32, f32) {
        (self.channel(1, index).im, self.channel(2, index).re)
    }

    /// (∂Dx/∂x, ∂Dz/∂z, ∂Dx/∂z)
    pub fn displacement_gradient(&self, index: usize) -> (f32, f32, f32) {
        let ch2 = self.channel(2, index);
        let ch3 = self.channel(3, index);
        (ch2.im, ch3.re, ch3.im)
    }
}

/// Mutable output layers for one cascade
#[derive(Debug)]
pub struct ComposeTargets<'a> {
    /// 3 floats per texel
    pub displacement: &'a mut [f32],
    /// 3 floats per texel
    pub normal: &'a mut [f32],
    /// 1 float per texel
    pub foam: &'a mut [f32],
}

/// Owned output of [`compose`]
#[derive(Debug, Clone)]
pub struct ComposedMaps {
    pub displacement: Vec<f32>,
    pub normal: Vec<f32>,
    pub foam: Vec<f32>,
}

/// Floor for the horizontal stretch; keeps folded texels finite
const MIN_STRETCH: f32 = 0.1;

/// Local horizontal stretch `1 + λ·∂D/∂x`: below 1 on compressed crests,
/// which steepens their normals, above 1 in stretched troughs.
fn stretch(choppiness: f32, gradient: f32) -> f32 {
    (1.0 + choppiness * gradient).max(MIN_STRETCH)
}

/// Surface Jacobian of the horizontal displacement, scaled by `choppiness`
pub fn jacobian(choppiness: f32, dxdx: f32, dzdz: f32, dxdz: f32) -> f32 {
    (1.0 + choppiness * dxdx) * (1.0 + choppiness * dzdz) - (choppiness * dxdz).powi(2)
}

/// Writes one cascade's maps into `targets`; `prev_foam` is the previous
/// step's foam layer.
pub fn compose_into(
    fields: &SpatialFields<'_>,
    params: &CascadeParameters,
    delta_s: f32,
    prev_foam: &[f32],
    targets: ComposeTargets<'_>,
) {
    let n = fields.resolution().size();
    let cells = fields.resolution().cells();
    assert_eq!(prev_foam.len(), cells);
    assert_eq!(targets.foam.len(), cells);

    let choppiness = params.choppiness();
    let normal_scale = params.normal_scale();
    let threshold = params.foam_threshold();
    let grow = params.foam_grow_rate(delta_s.max(0.0));
    let decay = (-params.foam_decay_rate(delta_s.max(0.0))).exp();

    targets
        .displacement
        .par_chunks_mut(3 * n)
        .zip(targets.normal.par_chunks_mut(3 * n))
        .zip(targets.foam.par_chunks_mut(n))
        .zip(prev_foam.par_chunks(n))
        .enumerate()
        .for_each(|(y, (((displacement, normal), foam), prev))| {
            for x in 0..n {
                let index = y * n + x;
                let (dx, dz) = fields.displacement(index);
                let (sx, sz) = fields.slope(index);
                let (dxdx, dzdz, dxdz) = fields.displacement_gradient(index);

                displacement[3 * x] = choppiness * dx;
                displacement[3 * x + 1] = fields.height(index);
                displacement[3 * x + 2] = choppiness * dz;

                let gradient_x = sx * normal_scale / stretch(choppiness, dxdx);
                let gradient_z = sz * normal_scale / stretch(choppiness, dzdz);
                let n_vec = Vec3::new(-gradient_x, 1.0, -gradient_z).normalize();
                normal[3 * x] = n_vec.x;
                normal[3 * x + 1] = n_vec.y;
                normal[3 * x + 2] = n_vec.z;

                let crest = (threshold - jacobian(choppiness, dxdx, dzdz, dxdz)).max(0.0);
                let value = prev[x] * decay + crest * grow;
                // NaN from a degenerate field collapses to no foam
                foam[x] = if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) };
            }
        });
}

/// Allocating variant of [`compose_into`]; starts from no foam when
/// `prev_foam` is `None`.
pub fn compose(
    fields: &SpatialFields<'_>,
    params: &CascadeParameters,
    delta_s: f32,
    prev_foam: Option<&[f32]>,
) -> Result<ComposedMaps> {
    let cells = fields.resolution().cells();
    let mut maps = ComposedMaps {
        displacement: try_filled(3 * cells, 0.0, "displacement map")?,
        normal: try_filled(3 * cells, 0.0, "normal map")?,
        foam: try_filled(cells, 0.0, "foam map")?,
    };
    let empty;
    let prev = match prev_foam {
        Some(prev) => prev,
        None => {
            empty = try_filled(cells, 0.0, "foam map")?;
            &empty[..]
        }
    };
    compose_into(
        fields,
        params,
        delta_s,
        prev,
        ComposeTargets {
            displacement: &mut maps.displacement,
            normal: &mut maps.normal,
            foam: &mut maps.foam,
        },
    );
    Ok(maps)
}
