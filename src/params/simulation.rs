//! Map resolution, update-rate and seeding configuration.

use std::fmt;

use crate::error::{OceanError, Result};

/// Smallest accepted map side (texels)
pub const MIN_MAP_SIZE: u32 = 16;

/// Largest accepted map side (texels)
pub const MAX_MAP_SIZE: u32 = 1024;

/// Side length of the square spectrum/output maps (power of two)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MapResolution(u32);

impl MapResolution {
    pub const R128: Self = Self(128);
    pub const R256: Self = Self(256);
    pub const R512: Self = Self(512);
    pub const R1024: Self = Self(1024);

    pub fn new(size: u32) -> Result<Self> {
        if !size.is_power_of_two() || !(MIN_MAP_SIZE..=MAX_MAP_SIZE).contains(&size) {
            return Err(OceanError::InvalidResolution(size));
        }
        Ok(Self(size))
    }

    /// Texels per side
    pub fn size(self) -> usize {
        self.0 as usize
    }

    /// Texels per layer
    pub fn cells(self) -> usize {
        self.size() * self.size()
    }

    /// Butterfly passes per 1D transform (log2 of the side)
    pub fn fft_stages(self) -> u32 {
        self.0.trailing_zeros()
    }
}

impl Default for MapResolution {
    fn default() -> Self {
        Self::R256
    }
}

impl TryFrom<u32> for MapResolution {
    type Error = OceanError;

    fn try_from(size: u32) -> Result<Self> {
        Self::new(size)
    }
}

impl fmt::Display for MapResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.0, self.0)
    }
}

/// Simulation-wide settings supplied by the configuration layer
#[derive(Debug, Clone)]
pub struct SimulationSettings {
    /// Spectrum and output map resolution
    pub resolution: MapResolution,

    /// Simulation updates per second, range [0, 120].
    /// 0 updates on every frame. Only gates how often `step` is called.
    pub updates_per_second: f32,

    /// Seed of the generator that hands out per-cascade spectrum seeds
    pub master_seed: u64,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            resolution: MapResolution::default(),
            updates_per_second: 50.0,
            master_seed: 1234, // Gives big waves with the default cascades
        }
    }
}

impl SimulationSettings {
    pub fn update_gate(&self) -> UpdateGate {
        UpdateGate::new(self.updates_per_second)
    }
}

/// Decides on which frames the simulation steps, and by how much.
///
/// Rendering frames arrive at an arbitrary rate; the gate turns them into
/// simulation steps at the configured rate, carrying overshoot forward so the
/// simulated time tracks wall time.
#[derive(Debug, Clone)]
pub struct UpdateGate {
    /// Seconds between updates (0 = every frame)
    update_interval_s: f32,
    time_s: f32,
    next_update_time_s: f32,
}

impl UpdateGate {
    pub fn new(updates_per_second: f32) -> Self {
        let updates_per_second = updates_per_second.clamp(0.0, 120.0);
        let update_interval_s = if updates_per_second > 0.0 {
            1.0 / updates_per_second
        } else {
            0.0
        };
        Self {
            update_interval_s,
            time_s: 0.0,
            next_update_time_s: 0.0,
        }
    }

    /// Seconds between updates (0 = every frame)
    pub fn update_interval(&self) -> f32 {
        self.update_interval_s
    }

    /// Advance wall time by `frame_delta_s`; returns the step delta when an update is due.
    pub fn advance(&mut self, frame_delta_s: f32) -> Option<f32> {
        let due = self.update_interval_s == 0.0 || self.time_s >= self.next_update_time_s;
        let step = due.then(|| {
            if self.update_interval_s == 0.0 {
                frame_delta_s
            } else {
                let overshoot = self.time_s - self.next_update_time_s;
                self.next_update_time_s = self.time_s + self.update_interval_s;
                self.update_interval_s + overshoot
            }
        });
        self.time_s += frame_delta_s;
        step
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_validation() {
        assert_eq!(MapResolution::new(256).unwrap().size(), 256);
        assert_eq!(MapResolution::new(512).unwrap().fft_stages(), 9);
        assert_eq!(
            MapResolution::new(300),
            Err(OceanError::InvalidResolution(300))
        );
        assert!(MapResolution::new(0).is_err());
        assert!(MapResolution::new(2048).is_err());
        assert!(MapResolution::try_from(8).is_err());
        assert_eq!(MapResolution::R128.to_string(), "128x128");
    }

    #[test]
    fn test_gate_every_frame_when_rate_is_zero() {
        let mut gate = UpdateGate::new(0.0);
        assert_eq!(gate.advance(0.016), Some(0.016));
        assert_eq!(gate.advance(0.033), Some(0.033));
    }

    #[test]
    fn test_gate_throttles_to_rate() {
        // 10 updates per second with 100 frames per second
        let mut gate = UpdateGate::new(10.0);
        let steps: Vec<f32> = (0..100).filter_map(|_| gate.advance(0.01)).collect();

        assert!((9..=11).contains(&steps.len()), "got {} steps", steps.len());
        for delta in &steps {
            assert!((delta - 0.1).abs() < 0.011, "step delta {}", delta);
        }
    }

    #[test]
    fn test_gate_clamps_rate() {
        let gate = UpdateGate::new(1000.0);
        assert!((gate.update_interval() - 1.0 / 120.0).abs() < 1e-6);
    }
}
