//! Per-cascade wave spectrum parameters.
//!
//! Every spectrum-affecting setter raises `needs_resynthesis`; scale-only
//! setters raise `scales_dirty`. The cascade manager inspects both flags once
//! per step instead of reacting to each edit.

use glam::{IVec2, Vec2};

/// Physical constants shared by the spectrum and composer stages
pub mod spectrum_constants {
    /// Gravitational acceleration (m/s²)
    pub const GRAVITY: f32 = 9.81;

    /// Water depth used by the finite-depth dispersion relation (meters)
    pub const DEPTH_M: f32 = 20.0;

    /// Lower bound for wind speed and fetch length; keeps the JONSWAP terms finite
    pub const MIN_FORCING: f32 = 0.0001;

    /// Smallest allowed tile side (meters)
    pub const MIN_TILE_LENGTH_M: f32 = 0.01;

    /// Base time offset given to cascade 0 (seconds)
    pub const BASE_TIME_OFFSET_S: f32 = 120.0;
}

use spectrum_constants::{MIN_FORCING, MIN_TILE_LENGTH_M};

/// Physical description of one wave cascade
#[derive(Debug, Clone, PartialEq)]
pub struct CascadeParameters {
    /// Distance the cascade's tile covers (meters)
    tile_length: Vec2,

    /// Horizontal/vertical displacement multiplier, range [0, 2].
    /// Should be reduced as the number of cascades increases.
    displacement_scale: f32,

    /// Normal perturbation multiplier, range [0, 2]
    normal_scale: f32,

    /// Average wind speed above the water (m/s). Higher is steeper and more chaotic.
    wind_speed: f32,

    /// Wind direction (degrees), range [-360, 360]
    wind_direction: f32,

    /// Distance from shoreline (kilometers). Higher is steeper but less choppy.
    fetch_length: f32,

    /// Long-period swell contribution, range [0, 2]
    swell: f32,

    /// How little wind and swell constrain wave direction, range [0, 1]
    spread: f32,

    /// Attenuation of high-frequency waves (1 = no attenuation), range [0, 1]
    detail: f32,

    /// How steep a wave must be before foam accumulates, range [0, 2]
    whitecap: f32,

    /// Foam growth strength, range [0, 10].
    /// Wispier foam: raise `foam_amount`, lower `whitecap`.
    foam_amount: f32,

    spectrum_seed: IVec2,
    seed_pinned: bool,
    time_offset: f32,

    needs_resynthesis: bool,
    scales_dirty: bool,
}

impl Default for CascadeParameters {
    fn default() -> Self {
        Self {
            tile_length: Vec2::new(50.0, 50.0),
            displacement_scale: 1.0,
            normal_scale: 1.0,
            wind_speed: 20.0,
            wind_direction: 0.0,
            fetch_length: 550.0,
            swell: 0.8,
            spread: 0.2,
            detail: 1.0,
            whitecap: 0.5,
            foam_amount: 5.0,
            spectrum_seed: IVec2::ZERO,
            seed_pinned: false,
            time_offset: 0.0,
            needs_resynthesis: true,
            scales_dirty: true,
        }
    }
}

/// Assigns `value` to `field` and reports whether it changed
fn replace<T: PartialEq>(field: &mut T, value: T) -> bool {
    if *field == value {
        return false;
    }
    *field = value;
    true
}

impl CascadeParameters {
    pub fn tile_length(&self) -> Vec2 {
        self.tile_length
    }

    pub fn displacement_scale(&self) -> f32 {
        self.displacement_scale
    }

    pub fn normal_scale(&self) -> f32 {
        self.normal_scale
    }

    pub fn wind_speed(&self) -> f32 {
        self.wind_speed
    }

    pub fn wind_direction(&self) -> f32 {
        self.wind_direction
    }

    pub fn fetch_length(&self) -> f32 {
        self.fetch_length
    }

    pub fn swell(&self) -> f32 {
        self.swell
    }

    pub fn spread(&self) -> f32 {
        self.spread
    }

    pub fn detail(&self) -> f32 {
        self.detail
    }

    pub fn whitecap(&self) -> f32 {
        self.whitecap
    }

    pub fn foam_amount(&self) -> f32 {
        self.foam_amount
    }

    pub fn spectrum_seed(&self) -> IVec2 {
        self.spectrum_seed
    }

    /// True once the caller fixed the seed with [`Self::set_spectrum_seed`]
    pub fn seed_pinned(&self) -> bool {
        self.seed_pinned
    }

    /// Phase offset of this cascade's clock (seconds)
    pub fn time_offset(&self) -> f32 {
        self.time_offset
    }

    pub fn needs_resynthesis(&self) -> bool {
        self.needs_resynthesis
    }

    pub fn scales_dirty(&self) -> bool {
        self.scales_dirty
    }

    /// Tile length feeds both the wavenumber grid and the UV scale uniform.
    pub fn set_tile_length(&mut self, value: Vec2) {
        let value = value.max(Vec2::splat(MIN_TILE_LENGTH_M));
        if replace(&mut self.tile_length, value) {
            self.needs_resynthesis = true;
            self.scales_dirty = true;
        }
    }

    pub fn set_displacement_scale(&mut self, value: f32) {
        if replace(&mut self.displacement_scale, value.clamp(0.0, 2.0)) {
            self.scales_dirty = true;
        }
    }

    pub fn set_normal_scale(&mut self, value: f32) {
        if replace(&mut self.normal_scale, value.clamp(0.0, 2.0)) {
            self.scales_dirty = true;
        }
    }

    /// Clamped to a small positive minimum, never zero
    pub fn set_wind_speed(&mut self, value: f32) {
        if replace(&mut self.wind_speed, value.max(MIN_FORCING)) {
            self.needs_resynthesis = true;
        }
    }

    pub fn set_wind_direction(&mut self, degrees: f32) {
        if replace(&mut self.wind_direction, degrees.clamp(-360.0, 360.0)) {
            self.needs_resynthesis = true;
        }
    }

    /// Clamped to a small positive minimum, never zero
    pub fn set_fetch_length(&mut self, kilometers: f32) {
        if replace(&mut self.fetch_length, kilometers.max(MIN_FORCING)) {
            self.needs_resynthesis = true;
        }
    }

    pub fn set_swell(&mut self, value: f32) {
        if replace(&mut self.swell, value.clamp(0.0, 2.0)) {
            self.needs_resynthesis = true;
        }
    }

    pub fn set_spread(&mut self, value: f32) {
        if replace(&mut self.spread, value.clamp(0.0, 1.0)) {
            self.needs_resynthesis = true;
        }
    }

    pub fn set_detail(&mut self, value: f32) {
        if replace(&mut self.detail, value.clamp(0.0, 1.0)) {
            self.needs_resynthesis = true;
        }
    }

    /// Read by the composer every step; no resynthesis needed
    pub fn set_whitecap(&mut self, value: f32) {
        self.whitecap = value.clamp(0.0, 2.0);
    }

    /// Read by the composer every step; no resynthesis needed
    pub fn set_foam_amount(&mut self, value: f32) {
        self.foam_amount = value.clamp(0.0, 10.0);
    }

    /// Pins the seed so `configure` keeps it instead of drawing a fresh one
    pub fn set_spectrum_seed(&mut self, seed: IVec2) {
        self.seed_pinned = true;
        if replace(&mut self.spectrum_seed, seed) {
            self.needs_resynthesis = true;
        }
    }

    pub fn with_tile_length(mut self, value: Vec2) -> Self {
        self.set_tile_length(value);
        self
    }

    pub fn with_displacement_scale(mut self, value: f32) -> Self {
        self.set_displacement_scale(value);
        self
    }

    pub fn with_normal_scale(mut self, value: f32) -> Self {
        self.set_normal_scale(value);
        self
    }

    pub fn with_wind(mut self, speed: f32, direction_degrees: f32) -> Self {
        self.set_wind_speed(speed);
        self.set_wind_direction(direction_degrees);
        self
    }

    pub fn with_fetch_length(mut self, kilometers: f32) -> Self {
        self.set_fetch_length(kilometers);
        self
    }

    pub fn with_whitecap(mut self, value: f32) -> Self {
        self.set_whitecap(value);
        self
    }

    pub fn with_foam_amount(mut self, value: f32) -> Self {
        self.set_foam_amount(value);
        self
    }

    pub fn with_spectrum_seed(mut self, seed: IVec2) -> Self {
        self.set_spectrum_seed(seed);
        self
    }

    /// Horizontal displacement multiplier with a soft ceiling above 1.0.
    ///
    /// Identity up to 1.0; beyond that the excess saturates towards 1.5 so large
    /// scales sharpen crests without folding the surface over itself.
    pub fn choppiness(&self) -> f32 {
        let scale = self.displacement_scale;
        if scale <= 1.0 {
            scale
        } else {
            1.0 + 0.5 * (1.0 - (-(scale - 1.0)).exp())
        }
    }

    /// Jacobian value below which the surface counts as cresting
    pub fn foam_threshold(&self) -> f32 {
        1.0 - self.whitecap
    }

    /// Foam added per unit of crest strength over `delta_s` seconds
    pub fn foam_grow_rate(&self, delta_s: f32) -> f32 {
        delta_s * self.foam_amount * 7.5
    }

    /// Exponential decay exponent for foam over `delta_s` seconds
    pub fn foam_decay_rate(&self, delta_s: f32) -> f32 {
        delta_s * (10.0 - self.foam_amount).max(0.5) * 1.15
    }

    /// Factory-assigned fields; only the cascade manager writes these.
    pub(crate) fn assign_slot(&mut self, seed: IVec2, time_offset: f32) {
        if !self.seed_pinned {
            self.spectrum_seed = seed;
        }
        self.time_offset = time_offset;
        self.needs_resynthesis = true;
        self.scales_dirty = true;
    }

    pub(crate) fn mark_synthesized(&mut self) {
        self.needs_resynthesis = false;
    }

    pub(crate) fn mark_scales_refreshed(&mut self) {
        self.scales_dirty = false;
    }

    /// Forces resynthesis on the next step (also resets the cascade's foam)
    pub fn request_resynthesis(&mut self) {
        self.needs_resynthesis = true;
    }
}

/// Three cascades covering swells down to ripples
pub fn default_cascades() -> Vec<CascadeParameters> {
    vec![
        CascadeParameters::default()
            .with_tile_length(Vec2::new(250.0, 250.0))
            .with_displacement_scale(1.0)
            .with_normal_scale(1.0),
        CascadeParameters::default()
            .with_tile_length(Vec2::new(67.0, 67.0))
            .with_displacement_scale(0.75)
            .with_normal_scale(1.0)
            .with_wind(20.0, 15.0),
        CascadeParameters::default()
            .with_tile_length(Vec2::new(16.0, 16.0))
            .with_displacement_scale(0.25)
            .with_normal_scale(0.6)
            .with_foam_amount(3.0),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clean() -> CascadeParameters {
        let mut params = CascadeParameters::default();
        params.mark_synthesized();
        params.mark_scales_refreshed();
        params
    }

    #[test]
    fn test_forcing_never_reaches_zero() {
        let mut params = clean();
        params.set_wind_speed(0.0);
        params.set_fetch_length(-5.0);
        assert!(params.wind_speed() > 0.0);
        assert!(params.fetch_length() > 0.0);
        assert!(params.needs_resynthesis());
    }

    #[test]
    fn test_scale_edits_do_not_request_resynthesis() {
        let mut params = clean();
        params.set_displacement_scale(0.5);
        params.set_normal_scale(0.3);
        assert!(params.scales_dirty());
        assert!(!params.needs_resynthesis());
    }

    #[test]
    fn test_tile_length_marks_both_flags() {
        let mut params = clean();
        params.set_tile_length(Vec2::new(10.0, 20.0));
        assert!(params.scales_dirty());
        assert!(params.needs_resynthesis());
    }

    #[test]
    fn test_unchanged_value_keeps_flags_clear() {
        let mut params = clean();
        params.set_wind_speed(params.wind_speed());
        params.set_displacement_scale(params.displacement_scale());
        assert!(!params.needs_resynthesis());
        assert!(!params.scales_dirty());
    }

    #[test]
    fn test_foam_fields_are_compose_only() {
        let mut params = clean();
        params.set_whitecap(1.5);
        params.set_foam_amount(20.0);
        assert_eq!(params.foam_amount(), 10.0);
        assert!(!params.needs_resynthesis());
        assert!(!params.scales_dirty());
    }

    #[test]
    fn test_choppiness_soft_ceiling() {
        let params = CascadeParameters::default().with_displacement_scale(0.8);
        assert_eq!(params.choppiness(), 0.8);

        let params = CascadeParameters::default().with_displacement_scale(2.0);
        assert!(params.choppiness() > 1.0);
        assert!(params.choppiness() < 1.5);
    }

    #[test]
    fn test_pinned_seed_survives_slot_assignment() {
        let mut params = CascadeParameters::default().with_spectrum_seed(IVec2::new(7, -3));
        params.assign_slot(IVec2::new(100, 200), 42.0);
        assert_eq!(params.spectrum_seed(), IVec2::new(7, -3));
        assert_eq!(params.time_offset(), 42.0);

        let mut params = CascadeParameters::default();
        params.assign_slot(IVec2::new(100, 200), 1.0);
        assert_eq!(params.spectrum_seed(), IVec2::new(100, 200));
    }
}
