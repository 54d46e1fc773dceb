//! The GPU dispatch manager: sizes and uploads the light buffer, binds the
//! G-buffer and output target to the compute kernel, and issues exactly one
//! dispatch per activation. Presentation happens later on the same queue, so
//! submission order is what guarantees the blit observes a finished dispatch.

use bytemuck::Zeroable;
use log::{debug, info};
use wgpu::util::DeviceExt;

use crate::error::{GiError, GiResult};
use crate::gfx::context::GpuContext;
use crate::gfx::light::{self, PointLight, PointLightRaw};
use crate::gfx::texture::Texture;

/// Kernel tile size. Dispatch counts are in tiles, not pixels.
pub const WORKGROUP_SIZE: u32 = 8;
pub const DEFAULT_SAMPLES_PER_PIXEL: u32 = 16;

const KERNEL_ENTRY: &str = "cs_main";

/// The output target's resolution is a single explicit decision. Computing at
/// the G-buffer's resolution and displaying at a different fixed size are both
/// valid; the caller has to pick one, there is no default.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputSize {
    /// Compute at the G-buffer's resolution, display scaled.
    MatchInput,
    /// Compute and display at a fixed resolution, sampling the G-buffer.
    Fixed { width: u32, height: u32 },
}

#[derive(Debug, Clone, Copy)]
pub struct GiConfig {
    pub output: OutputSize,
    pub samples_per_pixel: u32,
}

impl GiConfig {
    pub fn new(output: OutputSize) -> Self {
        Self {
            output,
            samples_per_pixel: DEFAULT_SAMPLES_PER_PIXEL,
        }
    }
}

/// The three input textures the kernel reads. All must share one resolution.
pub struct GBuffer {
    pub albedo: Texture,
    pub normal: Texture,
    pub position: Texture,
}

impl GBuffer {
    pub fn new(albedo: Texture, normal: Texture, position: Texture) -> Self {
        Self {
            albedo,
            normal,
            position,
        }
    }

    /// Flat-lit test scene: checkered albedo, up-facing normals, and positions
    /// spread over a plane. Used by the demo when no images are supplied and
    /// by the integration tests.
    pub fn synthetic(ctx: &GpuContext, width: u32, height: u32) -> GiResult<Self> {
        let mut albedo = Vec::with_capacity((width * height * 4) as usize);
        let mut normal = Vec::with_capacity((width * height * 4) as usize);
        let mut position = Vec::with_capacity((width * height * 4) as usize);

        for y in 0..height {
            for x in 0..width {
                let checker = ((x / 8) + (y / 8)) % 2 == 0;
                let shade = if checker { 220 } else { 64 };
                albedo.extend_from_slice(&[shade, shade, shade, 255]);
                // +Y in the usual 0.5-biased normal-map encoding
                normal.extend_from_slice(&[128, 255, 128, 255]);
                let px = (x as f32 / width.max(1) as f32 * 255.0) as u8;
                let pz = (y as f32 / height.max(1) as f32 * 255.0) as u8;
                position.extend_from_slice(&[px, 0, pz, 255]);
            }
        }

        let device = &ctx.device;
        let queue = &ctx.queue;
        Ok(Self {
            albedo: Texture::from_pixels(device, queue, &albedo, (width, height), Some("albedo"))?,
            normal: Texture::from_pixels(device, queue, &normal, (width, height), Some("normal"))?,
            position: Texture::from_pixels(
                device,
                queue,
                &position,
                (width, height),
                Some("position"),
            )?,
        })
    }

    pub fn dimensions(&self) -> GiResult<(u32, u32)> {
        validate_gbuffer_dims(
            (self.albedo.size.x, self.albedo.size.y),
            (self.normal.size.x, self.normal.size.y),
            (self.position.size.x, self.position.size.y),
        )
    }
}

/// Scalar uniforms the kernel reads alongside the bound resources.
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct GiUniforms {
    light_count: u32,
    width: u32,
    height: u32,
    samples_per_pixel: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Uninitialized,
    Initialized,
    Released,
}

struct GpuResources {
    // Held so re-initialization and release can destroy them explicitly.
    light_buffer: wgpu::Buffer,
    uniform_buffer: wgpu::Buffer,
    output: Texture,
}

/// Configures and executes one compute dispatch per activation.
///
/// Lifecycle: `Uninitialized` -> `Initialized` (after a successful
/// [`GiCompute::initialize`]) -> `Released` (terminal). Re-initializing while
/// `Initialized` releases the previous activation's resources first.
pub struct GiCompute {
    state: State,
    resources: Option<GpuResources>,
}

impl GiCompute {
    pub fn new() -> Self {
        Self {
            state: State::Uninitialized,
            resources: None,
        }
    }

    /// Validates inputs, uploads the light buffer, binds everything to the
    /// kernel and submits a single dispatch covering the output resolution.
    ///
    /// `output` overrides the crate-created target; it must match the
    /// configured resolution. On any validation failure nothing is allocated
    /// and a previous activation stays intact.
    pub fn initialize(
        &mut self,
        ctx: &GpuContext,
        gbuffer: &GBuffer,
        lights: &[PointLight],
        config: GiConfig,
        output: Option<Texture>,
    ) -> GiResult<()> {
        if self.state == State::Released {
            return Err(GiError::configuration(
                "initialize called after release; the dispatcher is terminal once released",
            ));
        }

        let (input_w, input_h) = gbuffer.dimensions()?;
        let (out_w, out_h) = match config.output {
            OutputSize::MatchInput => (input_w, input_h),
            OutputSize::Fixed { width, height } => (width, height),
        };
        if out_w == 0 || out_h == 0 {
            return Err(GiError::configuration(format!(
                "output resolution must be non-zero, got {}x{}",
                out_w, out_h
            )));
        }
        if let Some(tex) = &output {
            if tex.size.x != out_w || tex.size.y != out_h {
                return Err(GiError::configuration(format!(
                    "supplied output target is {}x{}, configured resolution is {}x{}",
                    tex.size.x, tex.size.y, out_w, out_h
                )));
            }
        }

        let limits = ctx.device.limits();
        if out_w > limits.max_texture_dimension_2d || out_h > limits.max_texture_dimension_2d {
            return Err(GiError::resource(format!(
                "output resolution {}x{} exceeds device limit {}",
                out_w, out_h, limits.max_texture_dimension_2d
            )));
        }
        let light_bytes = light_buffer_size(lights.len());
        if light_bytes > limits.max_buffer_size {
            return Err(GiError::resource(format!(
                "light buffer of {} bytes exceeds device limit {}",
                light_bytes, limits.max_buffer_size
            )));
        }

        // Validation passed; the previous activation's resources go now so
        // repeated initialization never leaks.
        self.release_resources();

        let device = &ctx.device;

        let raw_lights = light::to_raw_records(lights);
        // wgpu rejects zero-sized buffers; an empty scene keeps one zeroed
        // record behind a light_count of 0.
        let backing = [PointLightRaw::zeroed()];
        let contents: &[u8] = if raw_lights.is_empty() {
            bytemuck::cast_slice(&backing)
        } else {
            bytemuck::cast_slice(&raw_lights)
        };
        let light_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("gi light buffer"),
            contents,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
        });

        let uniforms = GiUniforms {
            light_count: lights.len() as u32,
            width: out_w,
            height: out_h,
            samples_per_pixel: config.samples_per_pixel,
        };
        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("gi uniform buffer"),
            contents: bytemuck::bytes_of(&uniforms),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let output = match output {
            Some(tex) => tex,
            None => Texture::output_target(device, out_w, out_h, Some("gi output"))?,
        };

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("gi kernel"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../shaders/gi.wgsl").into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("gi_bind_group_layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Storage { read_only: true },
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                texture_entry(2),
                texture_entry(3),
                texture_entry(4),
                wgpu::BindGroupLayoutEntry {
                    binding: 5,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::StorageTexture {
                        access: wgpu::StorageTextureAccess::WriteOnly,
                        format: Texture::FORMAT,
                        view_dimension: wgpu::TextureViewDimension::D2,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("gi pipeline layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("gi pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: KERNEL_ENTRY,
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("gi_bind_group"),
            layout: &bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: light_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&gbuffer.albedo.view),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(&gbuffer.normal.view),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::TextureView(&gbuffer.position.view),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: wgpu::BindingResource::TextureView(&output.view),
                },
            ],
        });

        let mut encoder = ctx.create_command_encoder(Some("gi encoder"));
        {
            let mut cpass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("gi pass"),
            });
            cpass.set_pipeline(&pipeline);
            cpass.set_bind_group(0, &bind_group, &[]);
            let (gx, gy) = workgroup_counts(out_w, out_h);
            cpass.dispatch_workgroups(gx, gy, 1);
        }
        ctx.queue.submit(std::iter::once(encoder.finish()));

        info!(
            "dispatched gi kernel: {}x{} output, {} lights, {} spp",
            out_w,
            out_h,
            lights.len(),
            config.samples_per_pixel
        );

        self.resources = Some(GpuResources {
            light_buffer,
            uniform_buffer,
            output,
        });
        self.state = State::Initialized;
        Ok(())
    }

    /// The texture the kernel wrote into. Only valid while `Initialized`.
    pub fn output(&self) -> GiResult<&Texture> {
        if self.state != State::Initialized {
            return Err(GiError::configuration(
                "no active dispatch; call initialize first",
            ));
        }
        self.resources
            .as_ref()
            .map(|r| &r.output)
            .ok_or_else(|| GiError::configuration("no active dispatch; call initialize first"))
    }

    /// Releases the light buffer and the output target. Idempotent, and
    /// terminal: the dispatcher cannot be re-initialized afterwards.
    pub fn release(&mut self) {
        self.release_resources();
        self.state = State::Released;
    }

    fn release_resources(&mut self) {
        if let Some(res) = self.resources.take() {
            res.light_buffer.destroy();
            res.uniform_buffer.destroy();
            res.output.handle.destroy();
            debug!("released gi dispatch resources");
        }
    }
}

impl Default for GiCompute {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for GiCompute {
    fn drop(&mut self) {
        self.release_resources();
    }
}

fn texture_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Texture {
            multisampled: false,
            view_dimension: wgpu::TextureViewDimension::D2,
            sample_type: wgpu::TextureSampleType::Float { filterable: false },
        },
        count: None,
    }
}

/// Tiles needed to cover `width` x `height` pixels. Ceiling division: a
/// resolution that is not a multiple of the tile size still gets its trailing
/// pixels covered, and the kernel guards the overhang.
pub fn workgroup_counts(width: u32, height: u32) -> (u32, u32) {
    (
        (width + WORKGROUP_SIZE - 1) / WORKGROUP_SIZE,
        (height + WORKGROUP_SIZE - 1) / WORKGROUP_SIZE,
    )
}

/// Byte size of the structured light buffer backing `count` lights. An empty
/// scene still allocates one record since zero-sized buffers are invalid.
pub fn light_buffer_size(count: usize) -> u64 {
    (count.max(1) * PointLightRaw::STRIDE) as u64
}

fn validate_gbuffer_dims(
    albedo: (u32, u32),
    normal: (u32, u32),
    position: (u32, u32),
) -> GiResult<(u32, u32)> {
    let (w, h) = albedo;
    if w == 0 || h == 0 {
        return Err(GiError::configuration(format!(
            "albedo texture must have non-zero dimensions, got {}x{}",
            w, h
        )));
    }
    for (name, dims) in [("normal", normal), ("position", position)] {
        if dims != (w, h) {
            return Err(GiError::configuration(format!(
                "{} texture is {}x{} but albedo is {}x{}",
                name, dims.0, dims.1, w, h
            )));
        }
    }
    Ok((w, h))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn workgroups_cover_trailing_pixels() {
        assert_eq!(workgroup_counts(64, 64), (8, 8));
        assert_eq!(workgroup_counts(65, 63), (9, 8));
        assert_eq!(workgroup_counts(1, 1), (1, 1));
        assert_eq!(workgroup_counts(256, 8), (32, 1));
    }

    #[test]
    fn light_buffer_never_zero_sized() {
        assert_eq!(light_buffer_size(0), 32);
        assert_eq!(light_buffer_size(1), 32);
        assert_eq!(light_buffer_size(7), 7 * 32);
    }

    #[test]
    fn gbuffer_dims_must_agree() {
        assert!(validate_gbuffer_dims((64, 64), (64, 64), (64, 64)).is_ok());

        let err = validate_gbuffer_dims((64, 64), (64, 32), (64, 64)).unwrap_err();
        assert!(matches!(err, GiError::Configuration(_)));

        let err = validate_gbuffer_dims((0, 64), (0, 64), (0, 64)).unwrap_err();
        assert!(matches!(err, GiError::Configuration(_)));
    }

    #[test]
    fn default_config_uses_16_samples() {
        let config = GiConfig::new(OutputSize::MatchInput);
        assert_eq!(config.samples_per_pixel, DEFAULT_SAMPLES_PER_PIXEL);
        assert_eq!(config.samples_per_pixel, 16);
    }

    #[test]
    fn uniforms_are_four_packed_words() {
        assert_eq!(std::mem::size_of::<GiUniforms>(), 16);
    }

    #[test]
    fn output_requires_initialization() {
        let gi = GiCompute::new();
        assert!(matches!(gi.output(), Err(GiError::Configuration(_))));
    }

    #[test]
    fn release_is_idempotent_and_terminal() {
        let mut gi = GiCompute::new();
        gi.release();
        gi.release();
        assert!(matches!(gi.output(), Err(GiError::Configuration(_))));
    }
}
