//! Command-line argument parsing.

use std::path::PathBuf;

use clap::Parser;
use glam::Vec2;
use log::warn;

use crate::error::Result;
use crate::params::{default_cascades, CascadeParameters, MapResolution, SimulationSettings};

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "oceanfft")]
#[command(about = "Headless multi-cascade FFT ocean simulator", long_about = None)]
pub struct Args {
    /// Map resolution (power of two, 16-1024)
    #[arg(long, value_name = "TEXELS", default_value_t = 256)]
    pub size: u32,

    /// Number of wave cascades
    #[arg(long, default_value_t = 3)]
    pub cascades: usize,

    /// Rendering frames to simulate
    #[arg(long, default_value_t = 120)]
    pub frames: usize,

    /// Seconds between rendering frames
    #[arg(long, value_name = "SECONDS", default_value_t = 1.0 / 60.0)]
    pub frame_dt: f32,

    /// Simulation updates per second (0 = every frame)
    #[arg(long, default_value_t = 50.0)]
    pub updates_per_second: f32,

    /// Master seed for per-cascade spectrum seeds
    #[arg(long, default_value_t = 1234)]
    pub seed: u64,

    /// Override wind speed for every cascade (m/s)
    #[arg(long, value_name = "M/S")]
    pub wind_speed: Option<f32>,

    /// Override wind direction for every cascade (degrees)
    #[arg(long, value_name = "DEGREES")]
    pub wind_direction: Option<f32>,

    /// Directory for per-cascade PNG previews of the final frame
    #[arg(long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Mirror every step into GPU textures
    #[arg(long)]
    pub gpu: bool,
}

impl Args {
    pub fn simulation_settings(&self) -> Result<SimulationSettings> {
        Ok(SimulationSettings {
            resolution: MapResolution::new(self.size)?,
            updates_per_second: self.updates_per_second,
            master_seed: self.seed,
        })
    }

    /// Default cascades, extended with ever shorter tiles when more are asked for
    pub fn cascade_parameters(&self) -> Vec<CascadeParameters> {
        let count = if self.cascades == 0 {
            warn!("At least one cascade is required, using 1");
            1
        } else {
            self.cascades
        };

        let mut cascades = default_cascades();
        while cascades.len() < count {
            let Some(last) = cascades.last() else { break };
            let next = last
                .clone()
                .with_tile_length(last.tile_length() * 0.25)
                .with_displacement_scale(last.displacement_scale() * 0.5);
            cascades.push(next);
        }
        cascades.truncate(count);

        for cascade in &mut cascades {
            if let Some(speed) = self.wind_speed {
                cascade.set_wind_speed(speed);
            }
            if let Some(direction) = self.wind_direction {
                cascade.set_wind_direction(direction);
            }
            cascade.set_tile_length(cascade.tile_length().max(Vec2::splat(1.0)));
        }
        cascades
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::OceanError;

    #[test]
    fn test_defaults() {
        let args = Args::try_parse_from(["oceanfft"]).unwrap();
        let settings = args.simulation_settings().unwrap();
        assert_eq!(settings.resolution, MapResolution::R256);
        assert_eq!(settings.master_seed, 1234);
        assert_eq!(args.cascade_parameters().len(), 3);
        assert!(!args.gpu);
    }

    #[test]
    fn test_invalid_size() {
        let args = Args::try_parse_from(["oceanfft", "--size", "100"]).unwrap();
        assert_eq!(
            args.simulation_settings().unwrap_err(),
            OceanError::InvalidResolution(100)
        );
    }

    #[test]
    fn test_cascade_overrides() {
        let args = Args::try_parse_from([
            "oceanfft",
            "--cascades",
            "5",
            "--wind-speed",
            "8",
            "--wind-direction",
            "45",
        ])
        .unwrap();
        let cascades = args.cascade_parameters();
        assert_eq!(cascades.len(), 5);
        for cascade in &cascades {
            assert_eq!(cascade.wind_speed(), 8.0);
            assert_eq!(cascade.wind_direction(), 45.0);
        }
        assert!(cascades[4].tile_length().x < cascades[2].tile_length().x);
    }
}
