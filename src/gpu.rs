//! GPU mirror of the published ocean frame.
//!
//! Textures are `D2Array` with one layer per cascade slot:
//! - displacement: `Rgba32Float` (x offset, height, z offset, 0)
//! - normal: `Rgba32Float` (normal xyz, foam)
//! - foam: `R32Float`
//!
//! plus a storage buffer of [`MapScale`]. Allocation failures are captured
//! with error scopes and reported as [`OceanError::Device`].

use bytemuck::Zeroable;
use log::{debug, info};

use crate::error::{OceanError, Result};
use crate::ocean::{MapScale, OceanFrame, TextureArray};

/// Headless device and queue
pub struct GpuContext {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    adapter_name: String,
}

impl GpuContext {
    /// Blocks on adapter and device creation; no surface needed.
    pub fn headless() -> Result<Self> {
        pollster::block_on(Self::request())
    }

    async fn request() -> Result<Self> {
        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .ok_or(OceanError::NoAdapter)?;

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Ocean Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await
            .map_err(|e| OceanError::Device(e.to_string()))?;

        let adapter_name = adapter.get_info().name;
        info!("Using GPU adapter: {}", adapter_name);
        Ok(Self {
            device,
            queue,
            adapter_name,
        })
    }

    pub fn adapter_name(&self) -> &str {
        &self.adapter_name
    }

    /// Blocks until all submitted work has finished
    pub fn drain(&self) {
        let _ = self.device.poll(wgpu::Maintain::Wait);
    }
}

/// Texture arrays and scale buffer sized for one (resolution, layer count)
pub struct GpuOceanTextures {
    size: u32,
    layers: u32,
    pub displacement: wgpu::Texture,
    pub normal: wgpu::Texture,
    pub foam: wgpu::Texture,
    pub map_scales: wgpu::Buffer,
    /// Interleaving scratch for the RGBA uploads
    staging: Vec<f32>,
}

impl GpuOceanTextures {
    pub fn new(context: &GpuContext, frame: &OceanFrame) -> Result<Self> {
        let size = frame.foam().size() as u32;
        let layers = frame.layers() as u32;
        let device = &context.device;

        device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let texture = |label: &'static str, format: wgpu::TextureFormat| {
            device.create_texture(&wgpu::TextureDescriptor {
                label: Some(label),
                size: wgpu::Extent3d {
                    width: size,
                    height: size,
                    depth_or_array_layers: layers,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format,
                usage: wgpu::TextureUsages::TEXTURE_BINDING
                    | wgpu::TextureUsages::COPY_DST
                    | wgpu::TextureUsages::COPY_SRC,
                view_formats: &[],
            })
        };
        let displacement = texture("Displacement Maps", wgpu::TextureFormat::Rgba32Float);
        let normal = texture("Normal Maps", wgpu::TextureFormat::Rgba32Float);
        let foam = texture("Foam Maps", wgpu::TextureFormat::R32Float);
        let map_scales = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Map Scales"),
            size: layers as u64 * std::mem::size_of::<MapScale>() as u64,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let validation = pollster::block_on(device.pop_error_scope());
        let out_of_memory = pollster::block_on(device.pop_error_scope());
        if let Some(error) = out_of_memory.or(validation) {
            return Err(OceanError::Device(error.to_string()));
        }

        info!("Created GPU ocean textures: {} layers of {}x{}", layers, size, size);
        Ok(Self {
            size,
            layers,
            displacement,
            normal,
            foam,
            map_scales,
            staging: Vec::new(),
        })
    }

    /// True when `frame` fits these textures without reallocation
    pub fn matches(&self, frame: &OceanFrame) -> bool {
        self.size == frame.foam().size() as u32 && self.layers == frame.layers() as u32
    }

    pub fn layers(&self) -> u32 {
        self.layers
    }

    /// Copies every layer of `frame` into the textures.
    pub fn upload(&mut self, context: &GpuContext, frame: &OceanFrame) -> Result<()> {
        if !self.matches(frame) {
            return Err(OceanError::Device(format!(
                "frame of {} layers at {} does not fit textures of {} layers at {}",
                frame.layers(),
                frame.foam().size(),
                self.layers,
                self.size
            )));
        }
        let queue = &context.queue;

        pad_to_rgba(frame.displacement(), None, &mut self.staging);
        write_layers(
            queue,
            &self.displacement,
            bytemuck::cast_slice(&self.staging),
            self.size,
            self.layers,
            16,
        );

        pad_to_rgba(frame.normal(), Some(frame.foam()), &mut self.staging);
        write_layers(
            queue,
            &self.normal,
            bytemuck::cast_slice(&self.staging),
            self.size,
            self.layers,
            16,
        );

        write_layers(queue, &self.foam, frame.foam().as_bytes(), self.size, self.layers, 4);

        let mut scales = vec![MapScale::zeroed(); self.layers as usize];
        scales[..frame.map_scales().len()].copy_from_slice(frame.map_scales());
        queue.write_buffer(&self.map_scales, 0, bytemuck::cast_slice(&scales));
        queue.submit(None);

        debug!("Uploaded frame {} to GPU", frame.sequence());
        Ok(())
    }

    /// Waits for the queue to drain, then frees the GPU memory.
    pub fn destroy(self, context: &GpuContext) {
        context.drain();
        self.displacement.destroy();
        self.normal.destroy();
        self.foam.destroy();
        self.map_scales.destroy();
    }
}

/// Keeps GPU textures in step with a changing frame shape
pub struct GpuOceanUploader {
    context: GpuContext,
    textures: Option<GpuOceanTextures>,
}

impl GpuOceanUploader {
    pub fn new(context: GpuContext) -> Self {
        Self {
            context,
            textures: None,
        }
    }

    pub fn context(&self) -> &GpuContext {
        &self.context
    }

    pub fn textures(&self) -> Option<&GpuOceanTextures> {
        self.textures.as_ref()
    }

    /// Uploads `frame`, recreating the textures first when its shape changed.
    ///
    /// New textures are built before the old ones are released.
    pub fn upload(&mut self, frame: &OceanFrame) -> Result<()> {
        if !self.textures.as_ref().is_some_and(|t| t.matches(frame)) {
            let replacement = GpuOceanTextures::new(&self.context, frame)?;
            if let Some(old) = self.textures.replace(replacement) {
                old.destroy(&self.context);
            }
        }
        match self.textures.as_mut() {
            Some(textures) => textures.upload(&self.context, frame),
            None => Err(OceanError::NotConfigured),
        }
    }

    /// Releases every GPU resource after the queue drains.
    pub fn teardown(&mut self) {
        if let Some(textures) = self.textures.take() {
            textures.destroy(&self.context);
        }
    }
}

impl Drop for GpuOceanUploader {
    fn drop(&mut self) {
        self.teardown();
    }
}

/// Expands a 3-channel array to RGBA; alpha from `alpha` or zero
fn pad_to_rgba(source: &TextureArray, alpha: Option<&TextureArray>, out: &mut Vec<f32>) {
    let texels = source.data().len() / source.channels();
    out.clear();
    out.reserve(texels * 4);
    for (i, texel) in source.data().chunks(source.channels()).enumerate() {
        out.extend_from_slice(texel);
        out.push(alpha.map_or(0.0, |a| a.data()[i]));
    }
}

fn write_layers(
    queue: &wgpu::Queue,
    texture: &wgpu::Texture,
    bytes: &[u8],
    size: u32,
    layers: u32,
    bytes_per_texel: u32,
) {
    queue.write_texture(
        wgpu::ImageCopyTexture {
            texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        bytes,
        wgpu::ImageDataLayout {
            offset: 0,
            bytes_per_row: Some(size * bytes_per_texel),
            rows_per_image: Some(size),
        },
        wgpu::Extent3d {
            width: size,
            height: size,
            depth_or_array_layers: layers,
        },
    );
}
