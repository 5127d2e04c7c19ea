//! Cascade orchestration: configuration, dirty-flag handling and stepping.

use std::f32::consts::PI;

use glam::IVec2;
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::arena::{CascadeArena, MapScale, OceanFrame};
use super::spectrum::{synthesize_into, InitialSpectrum};
use crate::error::{OceanError, Result};
use crate::params::spectrum_constants::BASE_TIME_OFFSET_S;
use crate::params::{CascadeParameters, MapResolution, SimulationSettings};

/// Range of each spectrum seed component handed out by `configure`
const SEED_RANGE: std::ops::RangeInclusive<i32> = -10000..=10000;

/// Lifecycle of one cascade slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CascadeState {
    /// No buffers allocated
    Unconfigured,
    /// Buffers allocated, spectrum will be rebuilt on the next step
    SpectrumStale,
    /// Spectrum baked, evolving every step
    Ready,
}

/// Owns every cascade and its buffers; produces one frame per [`step`](Self::step)
#[derive(Debug)]
pub struct CascadeManager {
    master_seed: u64,
    cascades: Vec<CascadeParameters>,
    map_scales: Vec<MapScale>,
    arena: Option<CascadeArena>,
    /// Accumulated step time since the last `configure` (seconds)
    elapsed_s: f64,
}

impl CascadeManager {
    pub fn new(master_seed: u64) -> Self {
        Self {
            master_seed,
            cascades: Vec::new(),
            map_scales: Vec::new(),
            arena: None,
            elapsed_s: 0.0,
        }
    }

    pub fn from_settings(settings: &SimulationSettings) -> Self {
        Self::new(settings.master_seed)
    }

    /// Replaces the cascade set and resolution.
    ///
    /// Errors leave the previous configuration running.
    pub fn configure(&mut self, cascades: &[CascadeParameters], resolution: MapResolution) -> Result<()> {
        if cascades.is_empty() {
            return Err(OceanError::NoCascades);
        }

        let mut rng = StdRng::seed_from_u64(self.master_seed);
        let snapshots: Vec<CascadeParameters> = cascades
            .iter()
            .enumerate()
            .map(|(i, params)| {
                // Always draw so pinning one seed does not shift the others
                let seed = IVec2::new(rng.gen_range(SEED_RANGE), rng.gen_range(SEED_RANGE));
                let mut snapshot = params.clone();
                snapshot.assign_slot(seed, BASE_TIME_OFFSET_S + PI * i as f32);
                snapshot
            })
            .collect();

        let reusable = self
            .arena
            .take_if(|arena| arena.resolution() == resolution && arena.cascade_count() == snapshots.len());
        let mut arena = match reusable {
            Some(arena) => arena,
            None => match CascadeArena::allocate(resolution, snapshots.len()) {
                Ok(arena) => arena,
                Err(err) => {
                    warn!("Keeping previous configuration: {}", err);
                    return Err(err);
                }
            },
        };

        self.cascades = snapshots;
        self.elapsed_s = 0.0;
        for index in 0..self.cascades.len() {
            Self::resynthesize(&mut self.cascades[index], &mut arena, index);
        }
        self.map_scales = self.cascades.iter().map(MapScale::from_parameters).collect();
        self.cascades.iter_mut().for_each(CascadeParameters::mark_scales_refreshed);
        arena.publish_scales(&self.map_scales);
        self.arena = Some(arena);

        info!(
            "Configured {} cascades at {} (seeds {:?})",
            self.cascades.len(),
            resolution,
            self.cascades.iter().map(|c| c.spectrum_seed()).collect::<Vec<_>>()
        );
        Ok(())
    }

    /// [`configure`](Self::configure) with an unvalidated map side
    pub fn configure_with_size(&mut self, cascades: &[CascadeParameters], map_size: u32) -> Result<()> {
        self.configure(cascades, MapResolution::new(map_size)?)
    }

    /// Advances every cascade by `delta_s` and publishes a new frame.
    pub fn step(&mut self, delta_s: f32) -> Result<&OceanFrame> {
        let arena = self.arena.as_mut().ok_or(OceanError::NotConfigured)?;

        let delta_s = if delta_s.is_finite() && delta_s >= 0.0 {
            delta_s
        } else {
            warn!("Ignoring invalid step delta {}", delta_s);
            0.0
        };

        for (index, params) in self.cascades.iter_mut().enumerate() {
            if params.needs_resynthesis() {
                Self::resynthesize(params, arena, index);
            }
        }

        let mut scales_changed = false;
        for (scale, params) in self.map_scales.iter_mut().zip(self.cascades.iter_mut()) {
            if params.scales_dirty() {
                *scale = MapScale::from_parameters(params);
                params.mark_scales_refreshed();
                scales_changed = true;
            }
        }
        if scales_changed {
            debug!("Refreshed map scales");
        }

        self.elapsed_s += delta_s as f64;
        let times_s: Vec<f64> = self
            .cascades
            .iter()
            .map(|c| c.time_offset() as f64 + self.elapsed_s)
            .collect();

        arena.compute(&self.cascades, &times_s, delta_s, &self.map_scales);
        let frame = arena.front();
        debug!(
            "Step {} (dt {:.4} s, elapsed {:.3} s)",
            frame.sequence(),
            delta_s,
            self.elapsed_s
        );
        Ok(frame)
    }

    fn resynthesize(params: &mut CascadeParameters, arena: &mut CascadeArena, index: usize) {
        synthesize_into(params, params.spectrum_seed(), &mut arena.spectra[index]);
        arena.clear_foam(index);
        params.mark_synthesized();
    }

    /// Releases every buffer; the manager returns to the unconfigured state.
    pub fn teardown(&mut self) {
        if self.arena.take().is_some() {
            info!("Released {} cascades", self.cascades.len());
        }
        self.cascades.clear();
        self.map_scales.clear();
        self.elapsed_s = 0.0;
    }

    /// Last published frame, `None` before `configure`
    pub fn frame(&self) -> Option<&OceanFrame> {
        self.arena.as_ref().map(CascadeArena::front)
    }

    pub fn cascade_count(&self) -> usize {
        self.cascades.len()
    }

    pub fn resolution(&self) -> Option<MapResolution> {
        self.arena.as_ref().map(CascadeArena::resolution)
    }

    pub fn is_configured(&self) -> bool {
        self.arena.is_some()
    }

    pub fn cascades(&self) -> &[CascadeParameters] {
        &self.cascades
    }

    pub fn cascade(&self, index: usize) -> Result<&CascadeParameters> {
        let count = self.cascades.len();
        self.cascades
            .get(index)
            .ok_or(OceanError::CascadeIndex { index, count })
    }

    /// Edits take effect on the next step through the dirty flags.
    pub fn cascade_mut(&mut self, index: usize) -> Result<&mut CascadeParameters> {
        let count = self.cascades.len();
        self.cascades
            .get_mut(index)
            .ok_or(OceanError::CascadeIndex { index, count })
    }

    pub fn cascade_state(&self, index: usize) -> CascadeState {
        match self.cascades.get(index) {
            None => CascadeState::Unconfigured,
            Some(params) if params.needs_resynthesis() => CascadeState::SpectrumStale,
            Some(_) => CascadeState::Ready,
        }
    }

    /// Baked spectrum of a cascade (stale until the next step if its
    /// parameters changed)
    pub fn initial_spectrum(&self, index: usize) -> Result<&InitialSpectrum> {
        let arena = self.arena.as_ref().ok_or(OceanError::NotConfigured)?;
        let count = self.cascades.len();
        arena
            .spectra
            .get(index)
            .ok_or(OceanError::CascadeIndex { index, count })
    }

    /// Map scales as of the last step or configure
    pub fn scale_uniforms(&self) -> &[MapScale] {
        &self.map_scales
    }

    /// Seconds stepped since the last `configure`
    pub fn elapsed(&self) -> f64 {
        self.elapsed_s
    }

    /// Simulation time of one cascade: its offset plus elapsed time
    pub fn cascade_time(&self, index: usize) -> Result<f64> {
        Ok(self.cascade(index)?.time_offset() as f64 + self.elapsed_s)
    }

    pub fn master_seed(&self) -> u64 {
        self.master_seed
    }
}

impl Default for CascadeManager {
    fn default() -> Self {
        Self::from_settings(&SimulationSettings::default())
    }
}
