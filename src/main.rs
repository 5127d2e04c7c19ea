//! oceanfft - headless runner for the cascade ocean simulation
//!
//! Steps the simulation at the configured update rate, logs per-cascade
//! statistics and optionally writes PNG previews or mirrors frames to a GPU.

use std::path::Path;
use std::time::Instant;

use clap::Parser;
use image::{GrayImage, Luma, Rgb, RgbImage};
use log::{info, warn};

use oceanfft::cli::Args;
use oceanfft::gpu::{GpuContext, GpuOceanUploader};
use oceanfft::ocean::{CascadeManager, OceanFrame};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let settings = args.simulation_settings()?;
    let cascades = args.cascade_parameters();
    let mut manager = CascadeManager::from_settings(&settings);
    manager.configure(&cascades, settings.resolution)?;

    let mut uploader = if args.gpu {
        match GpuContext::headless() {
            Ok(context) => Some(GpuOceanUploader::new(context)),
            Err(e) => {
                warn!("GPU upload disabled: {}", e);
                None
            }
        }
    } else {
        None
    };

    let mut gate = settings.update_gate();
    let start = Instant::now();
    let mut updates = 0usize;
    for _ in 0..args.frames {
        if let Some(delta) = gate.advance(args.frame_dt) {
            let frame = manager.step(delta)?;
            if let Some(uploader) = uploader.as_mut() {
                uploader.upload(frame)?;
            }
            updates += 1;
        }
    }
    let elapsed = start.elapsed();

    info!(
        "{} updates over {} frames in {:.2}ms ({:.3}ms per update)",
        updates,
        args.frames,
        elapsed.as_secs_f64() * 1000.0,
        elapsed.as_secs_f64() * 1000.0 / updates.max(1) as f64
    );

    let frame = manager.frame().ok_or("simulation was not configured")?;
    for cascade in 0..frame.cascade_count() {
        let (low, high) = height_range(frame, cascade);
        let foam = frame.foam().layer(cascade);
        let mean_foam = foam.iter().sum::<f32>() / foam.len() as f32;
        let coverage = foam.iter().filter(|&&f| f > 0.1).count() as f32 / foam.len() as f32;
        info!(
            "Cascade {}: tile {:.1} m, height [{:.3}, {:.3}] m, foam mean {:.3}, coverage {:.1}%",
            cascade,
            manager.cascade(cascade)?.tile_length().x,
            low,
            high,
            mean_foam,
            coverage * 100.0
        );
    }

    if let Some(dir) = &args.output {
        std::fs::create_dir_all(dir)?;
        write_previews(frame, dir)?;
        info!("Wrote previews to {}", dir.display());
    }

    Ok(())
}

fn height_range(frame: &OceanFrame, cascade: usize) -> (f32, f32) {
    frame
        .displacement()
        .layer(cascade)
        .chunks(3)
        .fold((f32::MAX, f32::MIN), |(low, high), d| (low.min(d[1]), high.max(d[1])))
}

/// Height (grayscale), normal (RGB) and foam (grayscale) per cascade
fn write_previews(frame: &OceanFrame, dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let size = frame.foam().size() as u32;

    for cascade in 0..frame.cascade_count() {
        let (low, high) = height_range(frame, cascade);
        let span = (high - low).max(f32::EPSILON);

        let mut height = GrayImage::new(size, size);
        let mut normal = RgbImage::new(size, size);
        let mut foam = GrayImage::new(size, size);
        for y in 0..size {
            for x in 0..size {
                let (xs, ys) = (x as usize, y as usize);
                let h = frame.displacement().texel(cascade, xs, ys)[1];
                height.put_pixel(x, y, Luma([((h - low) / span * 255.0) as u8]));

                let n = frame.normal().texel(cascade, xs, ys);
                let encode = |v: f32| ((v * 0.5 + 0.5) * 255.0).clamp(0.0, 255.0) as u8;
                normal.put_pixel(x, y, Rgb([encode(n[0]), encode(n[1]), encode(n[2])]));

                let f = frame.foam().texel(cascade, xs, ys)[0];
                foam.put_pixel(x, y, Luma([(f * 255.0) as u8]));
            }
        }

        height.save(dir.join(format!("cascade{}_height.png", cascade)))?;
        normal.save(dir.join(format!("cascade{}_normal.png", cascade)))?;
        foam.save(dir.join(format!("cascade{}_foam.png", cascade)))?;
    }
    Ok(())
}
